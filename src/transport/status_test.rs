use super::*;

#[test]
fn test_parse_should_read_json_status_in_any_case() {
    let doc = StatusDocument::parse(r#"{"Status": "FAILURE", "Message": "disk full"}"#);
    assert!(doc.is_failure());
    assert_eq!(doc.message.as_deref(), Some("disk full"));

    let doc = StatusDocument::parse(r#"{"status": "SUCCESS"}"#);
    assert!(!doc.is_failure());
}

#[test]
fn test_parse_should_read_xml_status_element_attributes() {
    let body = r#"<?xml version="1.0" encoding="UTF-8"?>
<NgamsStatus>
  <Status Date="2024-01-01T00:00:00.000" HostId="node-a" Message="Successfully handled Archive Push Request" State="ONLINE" Status="SUCCESS" Version="v4.0"/>
</NgamsStatus>"#;
    let doc = StatusDocument::parse(body);
    assert_eq!(doc.status.as_deref(), Some("SUCCESS"));
    assert_eq!(
        doc.message.as_deref(),
        Some("Successfully handled Archive Push Request")
    );
    assert!(!doc.is_failure());

    let failed = StatusDocument::parse(r#"<NgamsStatus><Status Status="failure" Message="bad checksum"/></NgamsStatus>"#);
    assert!(failed.is_failure());
}

#[test]
fn test_unrecognized_or_empty_body_should_not_be_failure() {
    assert_eq!(StatusDocument::parse(""), StatusDocument::default());
    assert!(!StatusDocument::parse("OK").is_failure());
    assert!(!StatusDocument::parse("{not json").is_failure());
}
