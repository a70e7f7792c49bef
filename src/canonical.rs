//! Canonicalization of the shared-key "string-to-sign", per spec section 4.1.
//!
//! Generalizes the teacher's single fixed queue-message canonical string
//! (`construct_signature`/`canonical_headers`/`canonical_resource` in
//! `zeph1rus-rust-azure-table-queue`) into the general x-ms-header-scan +
//! supported-query-parameter-list algorithm, following the shape in
//! `examples/xxchan-reqsign/src/azure/storage/signer.rs`.

use std::collections::BTreeMap;

/// A minimal, lowercase-keyed header bag — enough to canonicalize against without
/// depending on a particular HTTP client's header type.
pub type HeaderBag = BTreeMap<String, String>;

/// Which signing form to use: the "full" form (Blob/Queue/File) or the "lite" form
/// (Table), per spec section 4.1.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SigningForm {
    Full,
    Lite,
}

fn header_or_empty<'a>(headers: &'a HeaderBag, name: &str) -> &'a str {
    headers.get(name).map(|s| s.as_str()).unwrap_or("")
}

/// Builds the canonicalized `x-ms-*` header block: every header whose name starts
/// with `x-ms-`, values trimmed, sorted ascending by name, joined as `name:value`
/// with `\n` — no leading or trailing newline (the caller supplies the surrounding
/// newlines), per spec section 4.1.
fn canonicalize_ms_headers(headers: &HeaderBag) -> String {
    headers
        .iter()
        .filter(|(k, _)| k.starts_with("x-ms-"))
        .map(|(k, v)| format!("{}:{}", k, v.trim()))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Builds the canonicalized resource: `/<accountId><path>`, followed by one
/// `\n<param>:<value>` line per supported query parameter (already sorted
/// lexicographically by the caller) that is present and non-empty in `query`.
/// Parameters outside `supported_params` are never signed.
pub fn canonicalize_resource(
    account_id: &str,
    path: &str,
    query: &BTreeMap<String, String>,
    supported_params: &[&str],
) -> String {
    let mut s = format!("/{}{}", account_id, path);
    let mut sorted: Vec<&&str> = supported_params.iter().collect();
    sorted.sort();
    for param in sorted {
        if let Some(value) = query.get(*param) {
            if !value.is_empty() {
                s.push('\n');
                s.push_str(param);
                s.push(':');
                s.push_str(value);
            }
        }
    }
    s
}

/// Builds the "full" canonical string used for Blob/Queue/File shared-key signing.
///
/// `headers` must already carry `x-ms-date` and (unless omitted) `x-ms-version`;
/// canonicalization does not set them — that is the credential strategy's job.
pub fn canonical_string_full(
    method: &str,
    headers: &HeaderBag,
    account_id: &str,
    path: &str,
    query: &BTreeMap<String, String>,
    supported_params: &[&str],
) -> String {
    let content_length = match header_or_empty(headers, "content-length") {
        "0" => "",
        other => other,
    };

    let lines = [
        method,
        header_or_empty(headers, "content-encoding"),
        header_or_empty(headers, "content-language"),
        content_length,
        header_or_empty(headers, "content-md5"),
        header_or_empty(headers, "content-type"),
        "", // Date line is always empty; x-ms-date carries the timestamp instead.
        header_or_empty(headers, "if-modified-since"),
        header_or_empty(headers, "if-match"),
        header_or_empty(headers, "if-none-match"),
        header_or_empty(headers, "if-unmodified-since"),
        header_or_empty(headers, "range"),
    ];

    let mut s = lines.join("\n");
    s.push('\n');
    s.push_str(&canonicalize_ms_headers(headers));
    s.push('\n');
    s.push_str(&canonicalize_resource(account_id, path, query, supported_params));
    s
}

/// Builds the "lite" canonical string used for Table shared-key signing: only
/// `comp` participates in the resource, per spec section 4.1.
pub fn canonical_string_lite(
    method: &str,
    headers: &HeaderBag,
    account_id: &str,
    path: &str,
    query: &BTreeMap<String, String>,
) -> String {
    let lines = [
        method,
        header_or_empty(headers, "content-md5"),
        header_or_empty(headers, "content-type"),
        header_or_empty(headers, "x-ms-date"),
    ];
    let mut s = lines.join("\n");
    s.push('\n');
    s.push_str(&canonicalize_resource(account_id, path, query, &["comp"]));
    s
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signer::sign;

    fn headers(pairs: &[(&str, &str)]) -> HeaderBag {
        pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    /// Scenario 1 from spec section 8: `PUT /container?restype=container`.
    #[test]
    fn scenario_put_container_restype() {
        let hdrs = headers(&[
            ("x-ms-date", "Mon, 01 Jan 2024 00:00:00 GMT"),
            ("x-ms-version", "2016-05-31"),
            ("content-length", "0"),
        ]);
        let mut query = BTreeMap::new();
        query.insert("restype".to_string(), "container".to_string());

        let canonical = canonical_string_full(
            "PUT",
            &hdrs,
            "acct",
            "/container",
            &query,
            &["comp", "restype", "timeout"],
        );

        assert!(canonical.ends_with("/acct/container\nrestype:container"));

        let signature = sign(b"key", &canonical);
        assert_eq!(signature, "+7XyEBMCYz/qn5IeJ3MGG3fuEdWeub7mGMdOnbgx//I=");
    }

    #[test]
    fn content_length_zero_is_emitted_as_empty_string() {
        let with_zero = headers(&[("content-length", "0")]);
        let with_absent = headers(&[]);
        let query = BTreeMap::new();
        assert_eq!(
            canonical_string_full("GET", &with_zero, "a", "/p", &query, &[]),
            canonical_string_full("GET", &with_absent, "a", "/p", &query, &[]),
        );
    }

    #[test]
    fn unsupported_query_params_are_never_signed() {
        let mut query = BTreeMap::new();
        query.insert("restype".to_string(), "container".to_string());
        query.insert("sv".to_string(), "2016-05-31".to_string());
        let resource = canonicalize_resource("acct", "/c", &query, &["restype"]);
        assert_eq!(resource, "/acct/c\nrestype:container");
        assert!(!resource.contains("sv:"));
    }

    #[test]
    fn ms_headers_sorted_ascending_and_trimmed() {
        let hdrs = headers(&[
            ("x-ms-version", "  2016-05-31  "),
            ("x-ms-date", "Mon, 01 Jan 2024 00:00:00 GMT"),
            ("x-ms-meta-foo", "bar"),
        ]);
        let block = canonicalize_ms_headers(&hdrs);
        assert_eq!(
            block,
            "x-ms-date:Mon, 01 Jan 2024 00:00:00 GMT\nx-ms-meta-foo:bar\nx-ms-version:2016-05-31"
        );
    }

    #[test]
    fn lite_form_only_signs_comp() {
        let hdrs = headers(&[("x-ms-date", "Mon, 01 Jan 2024 00:00:00 GMT")]);
        let mut query = BTreeMap::new();
        query.insert("comp".to_string(), "list".to_string());
        query.insert("timeout".to_string(), "30".to_string());
        let canonical = canonical_string_lite("GET", &hdrs, "acct", "/Tables", &query);
        assert_eq!(
            canonical,
            "GET\n\n\nMon, 01 Jan 2024 00:00:00 GMT\n/acct/Tables\ncomp:list"
        );
    }
}
