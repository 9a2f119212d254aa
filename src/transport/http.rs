use async_trait::async_trait;
use reqwest::header::AUTHORIZATION;
use reqwest::header::CONTENT_DISPOSITION;
use reqwest::header::CONTENT_LENGTH;
use reqwest::header::CONTENT_TYPE;
use tokio_util::io::ReaderStream;
use tracing::debug;

use super::StatusDocument;
use super::Transport;
use crate::CandidateFile;
use crate::Result;
use crate::TransportConfig;
use crate::TransportError;

/// Posts file bytes with the archive's disposition metadata.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
    authorization: Option<String>,
}

impl HttpTransport {
    pub fn new(config: &TransportConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout())
            .connect_timeout(config.connect_timeout())
            .user_agent(config.user_agent.clone())
            .build()
            .map_err(|e| TransportError::Request {
                url: String::new(),
                message: format!("failed to build HTTP client: {e}"),
            })?;
        Ok(Self {
            client,
            authorization: config.authorization.clone(),
        })
    }
}

/// `attachment; filename="<base>"; file_id=<id>; no_versioning=1`
pub fn content_disposition(file: &CandidateFile) -> String {
    format!(
        "attachment; filename=\"{}\"; file_id={}; no_versioning=1",
        escape_quoted(&file.base_name()),
        file.file_id
    )
}

/// Backslash-escapes `"` and `\` for a header quoted-string.
fn escape_quoted(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        if matches!(c, '"' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

#[async_trait]
impl Transport for HttpTransport {
    async fn deliver(
        &self,
        url: &str,
        file: &CandidateFile,
    ) -> Result<()> {
        let handle = tokio::fs::File::open(&file.file_name)
            .await
            .map_err(|e| TransportError::FileRead {
                path: file.file_name.clone(),
                source: e,
            })?;
        let size = handle
            .metadata()
            .await
            .map_err(|e| TransportError::FileRead {
                path: file.file_name.clone(),
                source: e,
            })?
            .len();

        let mut request = self
            .client
            .post(url)
            .header(CONTENT_TYPE, file.mime_type.as_str())
            .header(CONTENT_DISPOSITION, content_disposition(file))
            .header(CONTENT_LENGTH, size)
            .body(reqwest::Body::wrap_stream(ReaderStream::new(handle)));
        if let Some(authorization) = &self.authorization {
            request = request.header(AUTHORIZATION, authorization.as_str());
        }

        let response = request.send().await.map_err(|e| TransportError::Request {
            url: url.to_string(),
            message: e.to_string(),
        })?;
        let status = response.status();
        let body = response.text().await.map_err(|e| TransportError::Request {
            url: url.to_string(),
            message: format!("failed to read response body: {e}"),
        })?;
        let document = StatusDocument::parse(&body);
        debug!(url, file = %file.key(), http_status = status.as_u16(), ?document, "subscriber answered");

        if !status.is_success() {
            return Err(TransportError::HttpStatus {
                url: url.to_string(),
                status: status.as_u16(),
                message: document.message_or(status.canonical_reason().unwrap_or("")),
            }
            .into());
        }
        if document.is_failure() {
            return Err(TransportError::Rejected {
                url: url.to_string(),
                message: document.message_or("FAILURE"),
            }
            .into());
        }
        Ok(())
    }
}
