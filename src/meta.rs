//! Metadata header casing recovery, per spec section 4.6/9.
//!
//! HTTP header names are case-insensitive on the wire, so a lowercased header map
//! cannot tell you whether a caller's metadata key was `Foo` or `foo`. Azure returns
//! `x-ms-meta-<Name>` with the original casing preserved; this module walks the raw,
//! insertion-ordered `(name, value)` pairs captured by the executor (spec section
//! 4.6's "parallel list" contract) to recover it, rather than the lowercased map.

const META_PREFIX: &str = "x-ms-meta-";

/// Recovers `{OriginalCaseName: value}` from the response's raw header pairs.
/// Order of first occurrence is preserved; a header repeated is extremely unlikely
/// for metadata but later occurrences win, matching `HeaderMap`'s own semantics.
pub fn recover_metadata(raw_headers: &[(String, String)]) -> Vec<(String, String)> {
    let mut result = Vec::new();
    for (name, value) in raw_headers {
        if name.len() > META_PREFIX.len() && name.as_bytes()[..META_PREFIX.len()].eq_ignore_ascii_case(META_PREFIX.as_bytes()) {
            let original_case_name = &name[META_PREFIX.len()..];
            result.push((original_case_name.to_string(), value.clone()));
        }
    }
    result
}
