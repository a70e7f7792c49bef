//! Shared Access Signature generation, per spec section 4.1 / 6 / 8.
//!
//! Grounded on the fixed-position `\n`-joined string-to-sign and
//! HMAC-SHA256-over-base64-key signing shown in
//! `examples/other_examples/6c2f4bae_infraweave-io-infraweave__env_azure-src-sas.rs.rs`
//! and the permission-ordering idiom in
//! `examples/other_examples/f0a6e8e5_gucio1200-sas__src-sas.rs.rs`, adapted to the
//! service-SAS (container/blob) shape this spec's example 2 describes rather than
//! the user-delegation SAS those examples build.

use chrono::{DateTime, Utc};
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};

use crate::signer::sign;

/// Characters that must be percent-encoded in a SAS query value. Azure SAS
/// encoding keeps very little unescaped; `NON_ALPHANUMERIC` minus the handful of
/// separators the corpus's SAS builders leave alone matches observed signatures.
const SAS_VALUE_ENCODE_SET: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'.')
    .remove(b'_')
    .remove(b'~');

/// The resource a SAS grants access to, per spec section 6 (`sr`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SasResourceType {
    Container,
    Blob,
}

impl SasResourceType {
    fn letter(self) -> &'static str {
        match self {
            SasResourceType::Container => "c",
            SasResourceType::Blob => "b",
        }
    }
}

/// Requested permissions. Serialized in the fixed `r,a,c,w,d,l` order regardless of
/// the order fields are set in — spec section 4.1 invariant (i) / section 8.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SasPermissions {
    pub read: bool,
    pub add: bool,
    pub create: bool,
    pub write: bool,
    pub delete: bool,
    pub list: bool,
}

impl SasPermissions {
    pub fn to_signed_string(self) -> String {
        let mut s = String::new();
        if self.read {
            s.push('r');
        }
        if self.add {
            s.push('a');
        }
        if self.create {
            s.push('c');
        }
        if self.write {
            s.push('w');
        }
        if self.delete {
            s.push('d');
        }
        if self.list {
            s.push('l');
        }
        s
    }

    /// Parses a permission-letter string (e.g. an `AccessPolicy`'s `<Permission>`, or
    /// a caller-supplied `sp=` value) into flags, defaulting every field to `false`
    /// for letters that are absent or unrecognized.
    pub fn from_letters(letters: &str) -> Self {
        let mut perms = Self::default();
        for c in letters.chars() {
            match c {
                'r' => perms.read = true,
                'a' => perms.add = true,
                'c' => perms.create = true,
                'w' => perms.write = true,
                'd' => perms.delete = true,
                'l' => perms.list = true,
                _ => {}
            }
        }
        perms
    }
}

/// Optional response-header overrides (`rscc`, `rscd`, `rsce`, `rscl`, `rsct`).
#[derive(Debug, Clone, Default)]
pub struct ResponseOverrides {
    pub cache_control: Option<String>,
    pub content_disposition: Option<String>,
    pub content_encoding: Option<String>,
    pub content_language: Option<String>,
    pub content_type: Option<String>,
}

/// Inputs to a single SAS generation, per spec section 4.1 / 6.
#[derive(Debug, Clone)]
pub struct SasRequest<'a> {
    pub account_id: &'a str,
    pub container: &'a str,
    pub blob: Option<&'a str>,
    pub resource_type: SasResourceType,
    pub permissions: SasPermissions,
    pub expiry: DateTime<Utc>,
    pub start: Option<DateTime<Utc>>,
    pub stored_policy_id: Option<&'a str>,
    pub signed_ip: Option<&'a str>,
    pub api_version: &'a str,
    pub overrides: ResponseOverrides,
}

fn format_iso8601(dt: DateTime<Utc>) -> String {
    // ISO-8601 without milliseconds, per spec section 4.1 invariant (ii).
    dt.format("%Y-%m-%dT%H:%M:%SZ").to_string()
}

fn canonicalized_resource(account_id: &str, container: &str, blob: Option<&str>) -> String {
    // Spec section 4.1 invariant (iii): the account id is lowercased for SAS.
    let account = account_id.to_lowercase();
    match blob {
        Some(blob) => format!("/blob/{}/{}/{}", account, container, blob),
        None => format!("/blob/{}/{}", account, container),
    }
}

/// `true` only for a well-formed `YYYY-MM-DD` service API version string — the shape
/// every real Azure Storage version uses. Guards the lexicographic comparison in
/// `has_signed_snapshot_time` below against non-date strings (e.g. `"latest"`), for
/// which ASCII ordering against `"2018-11-09"` would be meaningless.
fn is_date_shaped_version(api_version: &str) -> bool {
    let bytes = api_version.as_bytes();
    bytes.len() == 10
        && bytes[4] == b'-'
        && bytes[7] == b'-'
        && bytes.iter().enumerate().all(|(i, b)| match i {
            4 | 7 => true,
            _ => b.is_ascii_digit(),
        })
}

/// The signed-snapshot-time string-to-sign position only exists from service-SAS
/// version `2018-11-09` onward; `api_version` strings sort lexicographically the
/// same as chronologically (`YYYY-MM-DD`), so a plain string compare decides it for
/// any recognized date-shaped version. An unrecognized version string (not
/// `YYYY-MM-DD`) falls back to the spec's documented default shape (no snapshot
/// line) rather than comparing ASCII bytes that carry no date meaning.
fn has_signed_snapshot_time(api_version: &str) -> bool {
    is_date_shaped_version(api_version) && api_version >= "2018-11-09"
}

fn string_to_sign(req: &SasRequest<'_>) -> String {
    let signed_start = req.start.map(format_iso8601).unwrap_or_default();
    let signed_expiry = format_iso8601(req.expiry);
    let resource = canonicalized_resource(req.account_id, req.container, req.blob);
    let identifier = req.stored_policy_id.unwrap_or("");
    let ip = req.signed_ip.unwrap_or("");

    let mut lines = vec![
        req.permissions.to_signed_string(),
        signed_start,
        signed_expiry,
        resource,
        identifier.to_string(),
        ip.to_string(),
        "https".to_string(),
        req.api_version.to_string(),
        req.resource_type.letter().to_string(),
    ];
    if has_signed_snapshot_time(req.api_version) {
        lines.push(String::new());
    }
    lines.extend([
        req.overrides.cache_control.clone().unwrap_or_default(),
        req.overrides.content_disposition.clone().unwrap_or_default(),
        req.overrides.content_encoding.clone().unwrap_or_default(),
        req.overrides.content_language.clone().unwrap_or_default(),
        req.overrides.content_type.clone().unwrap_or_default(),
    ]);
    lines.join("\n")
}

fn encode(value: &str) -> String {
    utf8_percent_encode(value, SAS_VALUE_ENCODE_SET).to_string()
}

/// Generates a SAS query string (without the leading `?`), per spec section 4.1/6.
pub fn generate(req: &SasRequest<'_>, key_bytes: &[u8]) -> String {
    let to_sign = string_to_sign(req);
    let signature = sign(key_bytes, &to_sign);

    let mut parts: Vec<(String, String)> = vec![
        ("sv".to_string(), req.api_version.to_string()),
        ("sr".to_string(), req.resource_type.letter().to_string()),
        ("sp".to_string(), req.permissions.to_signed_string()),
    ];
    if let Some(start) = req.start {
        parts.push(("st".to_string(), format_iso8601(start)));
    }
    parts.push(("se".to_string(), format_iso8601(req.expiry)));
    if let Some(id) = req.stored_policy_id {
        parts.push(("si".to_string(), id.to_string()));
    }
    if let Some(ip) = req.signed_ip {
        parts.push(("sip".to_string(), ip.to_string()));
    }
    parts.push(("spr".to_string(), "https".to_string()));
    if let Some(v) = &req.overrides.cache_control {
        parts.push(("rscc".to_string(), v.clone()));
    }
    if let Some(v) = &req.overrides.content_disposition {
        parts.push(("rscd".to_string(), v.clone()));
    }
    if let Some(v) = &req.overrides.content_encoding {
        parts.push(("rsce".to_string(), v.clone()));
    }
    if let Some(v) = &req.overrides.content_language {
        parts.push(("rscl".to_string(), v.clone()));
    }
    if let Some(v) = &req.overrides.content_type {
        parts.push(("rsct".to_string(), v.clone()));
    }
    parts.push(("sig".to_string(), signature));

    parts
        .into_iter()
        .map(|(k, v)| format!("{}={}", k, encode(&v)))
        .collect::<Vec<_>>()
        .join("&")
}

/// Extracts the `se` (expiry) parameter from a previously-generated SAS string, so
/// `RefreshingSas` (section 4.2) can compute its next refresh deadline.
pub fn parse_expiry(sas: &str) -> Option<DateTime<Utc>> {
    for pair in sas.split('&') {
        let mut kv = pair.splitn(2, '=');
        let key = kv.next()?;
        let value = kv.next()?;
        if key == "se" {
            let decoded = percent_encoding::percent_decode_str(value)
                .decode_utf8()
                .ok()?;
            return DateTime::parse_from_rfc3339(&decoded)
                .ok()
                .map(|dt| dt.with_timezone(&Utc));
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn base_req<'a>(account: &'a str, container: &'a str) -> SasRequest<'a> {
        SasRequest {
            account_id: account,
            container,
            blob: None,
            resource_type: SasResourceType::Container,
            permissions: SasPermissions::default(),
            expiry: Utc.with_ymd_and_hms(2030, 1, 1, 0, 0, 0).unwrap(),
            start: None,
            stored_policy_id: None,
            signed_ip: None,
            api_version: "2016-05-31",
            overrides: ResponseOverrides::default(),
        }
    }

    /// Scenario 2 from spec section 8.
    #[test]
    fn scenario_container_read_list_sas() {
        let mut req = base_req("acct", "container");
        req.permissions = SasPermissions {
            read: true,
            list: true,
            ..Default::default()
        };

        let query = generate(&req, b"key");
        assert!(query.contains("sp=rl"));
        assert!(query.contains("sr=c"));
        assert!(query.contains("se=2030-01-01T00%3A00%3A00Z"));
        assert!(query.contains("sv=2016-05-31"));
        assert!(query.contains("spr=https"));
        assert!(query.contains("sig="));
    }

    #[test]
    fn permissions_always_serialize_in_racwdl_order_regardless_of_set_order() {
        let perms = SasPermissions {
            list: true,
            delete: true,
            read: true,
            write: true,
            add: true,
            create: true,
        };
        assert_eq!(perms.to_signed_string(), "racwdl");

        // A subset still preserves relative order.
        let subset = SasPermissions {
            write: true,
            read: true,
            ..Default::default()
        };
        assert_eq!(subset.to_signed_string(), "rw");
    }

    #[test]
    fn default_api_version_omits_signed_snapshot_time_line() {
        let req = base_req("acct", "c");
        assert_eq!(req.api_version, "2016-05-31");
        let to_sign = string_to_sign(&req);
        // No adjacent "\n\n" from an empty snapshot-time line between sr and rscc.
        assert!(!to_sign.contains("c\n\n"));
        assert_eq!(to_sign.lines().count(), 14);
    }

    #[test]
    fn version_2018_11_09_and_later_includes_signed_snapshot_time_line() {
        let mut req = base_req("acct", "c");
        req.api_version = "2018-11-09";
        let to_sign = string_to_sign(&req);
        assert_eq!(to_sign.lines().count(), 15);
    }

    #[test]
    fn non_date_shaped_version_falls_back_to_omitting_snapshot_line() {
        let mut req = base_req("acct", "c");
        req.api_version = "latest";
        let to_sign = string_to_sign(&req);
        assert_eq!(to_sign.lines().count(), 14);
    }

    #[test]
    fn from_letters_defaults_unset_permissions_to_false() {
        let perms = SasPermissions::from_letters("rl");
        assert!(perms.read);
        assert!(perms.list);
        assert!(!perms.add);
        assert!(!perms.create);
        assert!(!perms.write);
        assert!(!perms.delete);
    }

    #[test]
    fn account_id_is_lowercased_in_canonical_resource_but_not_mutated_elsewhere() {
        let resource = canonicalized_resource("ACCT", "container", None);
        assert_eq!(resource, "/blob/acct/container");
    }

    #[test]
    fn round_trips_expiry_through_parse_expiry() {
        let req = base_req("acct", "c");
        let query = generate(&req, b"key");
        let parsed = parse_expiry(&query).expect("se must be present");
        assert_eq!(parsed, req.expiry);
    }

    #[test]
    fn signature_is_deterministic_for_same_inputs() {
        let req = base_req("acct", "c");
        assert_eq!(generate(&req, b"key"), generate(&req, b"key"));
    }
}
