//! `<Error>` XML body and odata JSON error envelope parsing, per spec section 4.6.

use serde::Deserialize;

/// The XML error document Blob/Queue/File services return on failure, e.g.:
/// `<Error><Code>ContainerNotFound</Code><Message>...</Message></Error>`.
#[derive(Debug, Deserialize)]
#[serde(rename = "Error")]
struct XmlErrorBody {
    #[serde(rename = "Code")]
    code: String,
    #[serde(rename = "Message")]
    message: String,
    /// Present on auth failures (`AuthenticationFailed`, `InvalidAuthenticationInfo`),
    /// per spec section 4.6/3's `detail` field.
    #[serde(rename = "AuthenticationErrorDetail", default)]
    authentication_error_detail: Option<String>,
}

/// Parses an `<Error>` XML body into `(code, message, detail)`. Returns `None` on
/// any parse failure so the caller can synthesize a without-code error instead.
pub fn parse_xml_error_body(payload: &[u8]) -> Option<(String, String, Option<String>)> {
    let body: XmlErrorBody = quick_xml::de::from_reader(payload).ok()?;
    Some((body.code, body.message, body.authentication_error_detail))
}

/// The odata JSON error envelope Table returns, e.g.:
/// `{"odata.error":{"code":"EntityNotFound","message":{"lang":"en-US","value":"..."}}}`.
#[derive(Debug, Deserialize)]
struct ODataErrorEnvelope {
    #[serde(rename = "odata.error")]
    error: ODataError,
}

#[derive(Debug, Deserialize)]
struct ODataError {
    code: String,
    message: ODataErrorMessage,
}

#[derive(Debug, Deserialize)]
struct ODataErrorMessage {
    value: String,
}

/// Parses a Table-style odata JSON error body. Returns `None` on parse failure.
pub fn parse_json_error_body(payload: &[u8]) -> Option<(String, String, Option<String>)> {
    let envelope: ODataErrorEnvelope = serde_json::from_slice(payload).ok()?;
    Some((envelope.error.code, envelope.error.message.value, None))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_blob_style_xml_error() {
        let body = br#"<?xml version="1.0" encoding="utf-8"?>
<Error><Code>ContainerNotFound</Code><Message>The specified container does not exist.
RequestId:abc</Message></Error>"#;
        let (code, message, _) = parse_xml_error_body(body).expect("must parse");
        assert_eq!(code, "ContainerNotFound");
        assert!(message.starts_with("The specified container does not exist."));
    }

    #[test]
    fn parses_table_style_odata_json_error() {
        let body = br#"{"odata.error":{"code":"EntityNotFound","message":{"lang":"en-US","value":"The specified entity does not exist."}}}"#;
        let (code, message, _) = parse_json_error_body(body).expect("must parse");
        assert_eq!(code, "EntityNotFound");
        assert_eq!(message, "The specified entity does not exist.");
    }

    #[test]
    fn captures_authentication_error_detail() {
        let body = br#"<?xml version="1.0" encoding="utf-8"?>
<Error><Code>AuthenticationFailed</Code><Message>Server failed to authenticate.</Message>
<AuthenticationErrorDetail>Signature did not match.</AuthenticationErrorDetail></Error>"#;
        let (code, _, detail) = parse_xml_error_body(body).expect("must parse");
        assert_eq!(code, "AuthenticationFailed");
        assert_eq!(detail.as_deref(), Some("Signature did not match."));
    }

    #[test]
    fn malformed_xml_returns_none() {
        assert!(parse_xml_error_body(b"not xml at all").is_none());
    }

    #[test]
    fn malformed_json_returns_none() {
        assert!(parse_json_error_body(b"{not json").is_none());
    }
}
