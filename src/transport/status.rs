use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    static ref XML_STATUS_ELEMENT: Regex = Regex::new(r"<Status\b[^>]*>").expect("valid regex");
    static ref XML_STATUS_ATTR: Regex = Regex::new(r#"\bStatus\s*=\s*"([^"]*)""#).expect("valid regex");
    static ref XML_MESSAGE_ATTR: Regex = Regex::new(r#"\bMessage\s*=\s*"([^"]*)""#).expect("valid regex");
}

const FAILURE: &str = "FAILURE";

/// Status reported in a subscriber's response body.
///
/// Accepts a JSON object with `status`/`message` keys (any case) or an XML
/// document whose `Status` element carries `Status` and `Message` attributes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StatusDocument {
    pub status: Option<String>,
    pub message: Option<String>,
}

impl StatusDocument {
    pub fn parse(body: &str) -> Self {
        let body = body.trim();
        if body.is_empty() {
            return Self::default();
        }
        if body.starts_with('{') {
            if let Ok(serde_json::Value::Object(map)) = serde_json::from_str(body) {
                let field = |name: &str| {
                    map.iter()
                        .find(|(k, _)| k.eq_ignore_ascii_case(name))
                        .and_then(|(_, v)| v.as_str())
                        .map(str::to_string)
                };
                return Self {
                    status: field("status"),
                    message: field("message"),
                };
            }
        }
        match XML_STATUS_ELEMENT.find(body) {
            Some(element) => {
                let tag = element.as_str();
                let attr = |re: &Regex| re.captures(tag).map(|c| c[1].to_string());
                Self {
                    status: attr(&XML_STATUS_ATTR),
                    message: attr(&XML_MESSAGE_ATTR),
                }
            }
            None => Self::default(),
        }
    }

    pub fn is_failure(&self) -> bool {
        self.status
            .as_deref()
            .is_some_and(|s| s.trim().eq_ignore_ascii_case(FAILURE))
    }

    pub fn message_or(
        &self,
        fallback: &str,
    ) -> String {
        self.message.clone().unwrap_or_else(|| fallback.to_string())
    }
}
