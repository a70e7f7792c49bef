//! Response classification, per spec section 4.6.
//!
//! A 2xx response is handed back to the caller unopened; a non-2xx response is
//! parsed as an error body (XML `<Error>` for Blob/Queue/File, odata JSON envelope
//! for Table, dispatched on `Content-Type`) and turned into a typed [`Error`]. When
//! the body itself fails to parse, spec section 4.6 calls for a synthetic
//! `InternalErrorWithoutCode`/`ErrorWithoutCode` rather than propagating the parse
//! failure — a caller should never see "invalid XML" when the real problem was a
//! 500 with an empty body.

use crate::error::{Error, ErrorKind, ServiceError};
use crate::executor::Response;
use crate::xml::error::{parse_json_error_body, parse_xml_error_body};

/// Maps an HTTP status code to the taxonomy in spec section 3/7. A status code
/// alone never makes a response transient, including 429/5xx — per spec section
/// 4.5, only `transient_error_codes` (matched against the server's `<Code>` in
/// `classify`) decides that, so a 500 `OperationTimedOut` is `Permanent` unless
/// the caller has explicitly added that code to the set.
fn kind_for_status(status_code: u16) -> ErrorKind {
    match status_code {
        404 => ErrorKind::NotFound,
        409 => ErrorKind::Conflict,
        401 | 403 => ErrorKind::Auth,
        408 => ErrorKind::Timeout,
        _ => ErrorKind::Permanent,
    }
}

/// Classifies a completed HTTP response. Successes pass through untouched;
/// failures are parsed into a [`ServiceError`], consulting `transient_error_codes`
/// to decide whether the server-reported `code` (not just the status) makes the
/// error transient, per spec section 6's configurable transient-code set.
pub fn classify(
    response: Response,
    transient_error_codes: &std::collections::HashSet<String>,
) -> Result<Response, Error> {
    if response.is_success() {
        return Ok(response);
    }

    let is_json = response
        .content_type()
        .map(|ct| ct.contains("json"))
        .unwrap_or(false);

    let (code, message, detail) = if is_json {
        parse_json_error_body(&response.payload)
    } else {
        parse_xml_error_body(&response.payload)
    }
    .unwrap_or_else(|| synthesize_without_code(response.status_code, &response.payload));

    let mut kind = kind_for_status(response.status_code);
    if transient_error_codes.contains(&code) {
        kind = ErrorKind::Transient;
    }

    let mut service_err = ServiceError::new(kind, code, message).with_status(response.status_code);
    if let Some(detail) = detail {
        service_err = service_err.with_detail(detail);
    }

    Err(Error::Service(service_err))
}

/// Caps how much of an unparseable body gets embedded in the synthesized error
/// message — a misbehaving proxy can return megabytes of HTML, and that shouldn't
/// balloon every retry's logged `Error::Service` message.
const MAX_ECHOED_PAYLOAD_BYTES: usize = 1024;

/// Spec section 4.6: when the body cannot be parsed as an error document, synthesize
/// `InternalErrorWithoutCode` for 5xx and `ErrorWithoutCode` otherwise, with the
/// message echoing the raw payload (truncated if oversized).
fn synthesize_without_code(status_code: u16, raw_payload: &[u8]) -> (String, String, Option<String>) {
    let code = if (500..600).contains(&status_code) {
        "InternalErrorWithoutCode"
    } else {
        "ErrorWithoutCode"
    };
    let truncated = raw_payload.len() > MAX_ECHOED_PAYLOAD_BYTES;
    let raw = String::from_utf8_lossy(&raw_payload[..raw_payload.len().min(MAX_ECHOED_PAYLOAD_BYTES)]);
    let suffix = if truncated { "...(truncated)" } else { "" };
    (
        code.to_string(),
        format!("No error message given, in payload '{raw}{suffix}'"),
        None,
    )
}
