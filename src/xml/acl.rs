//! Container ACL documents: the `<SignedIdentifiers>` list used to build and read
//! stored access policies (`si=` in a SAS), per spec GLOSSARY "stored access policy".

use chrono::{DateTime, Utc};
use serde::Deserialize;

use crate::sas::SasPermissions;

#[derive(Debug, Deserialize, Default, PartialEq, Eq)]
#[serde(rename = "SignedIdentifiers")]
pub struct SignedIdentifiers {
    #[serde(rename = "SignedIdentifier", default)]
    pub items: Vec<SignedIdentifier>,
}

#[derive(Debug, Deserialize, PartialEq, Eq)]
pub struct SignedIdentifier {
    #[serde(rename = "Id")]
    pub id: String,
    #[serde(rename = "AccessPolicy")]
    pub access_policy: AccessPolicy,
}

#[derive(Debug, Deserialize, PartialEq, Eq)]
pub struct AccessPolicy {
    #[serde(rename = "Start", default)]
    pub start: Option<String>,
    #[serde(rename = "Expiry", default)]
    pub expiry: Option<String>,
    #[serde(rename = "Permission", default)]
    pub permission: Option<String>,
}

impl AccessPolicy {
    /// Parses `Expiry` as RFC3339, mirroring `sas::parse_expiry`'s contract so
    /// `RefreshingSas`-style callers can treat a stored policy's expiry the same
    /// way as an ad-hoc SAS's `se`.
    pub fn expiry_as_datetime(&self) -> Option<DateTime<Utc>> {
        self.expiry
            .as_deref()
            .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
            .map(|dt| dt.with_timezone(&Utc))
    }

    /// Parses `Permission` into per-letter flags, defaulting every flag to `false`
    /// when the element is absent — spec section 4.6's "`AccessPolicy` with
    /// default-false permission fields".
    pub fn permissions(&self) -> SasPermissions {
        self.permission
            .as_deref()
            .map(SasPermissions::from_letters)
            .unwrap_or_default()
    }
}

pub fn parse_signed_identifiers(payload: &[u8]) -> Result<SignedIdentifiers, crate::error::Error> {
    quick_xml::de::from_reader(payload).map_err(|e| crate::error::Error::Malformed(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_signed_identifier_with_full_access_policy() {
        let body = br#"<?xml version="1.0" encoding="utf-8"?>
<SignedIdentifiers>
  <SignedIdentifier>
    <Id>policy1</Id>
    <AccessPolicy>
      <Start>2024-01-01T00:00:00Z</Start>
      <Expiry>2024-02-01T00:00:00Z</Expiry>
      <Permission>rl</Permission>
    </AccessPolicy>
  </SignedIdentifier>
</SignedIdentifiers>"#;
        let parsed = parse_signed_identifiers(body).unwrap();
        assert_eq!(parsed.items.len(), 1);
        assert_eq!(parsed.items[0].id, "policy1");
        assert!(parsed.items[0].access_policy.expiry_as_datetime().is_some());
        let perms = parsed.items[0].access_policy.permissions();
        assert!(perms.read);
        assert!(perms.list);
        assert!(!perms.write);
    }

    #[test]
    fn missing_permission_element_defaults_all_flags_to_false() {
        let body = br#"<?xml version="1.0" encoding="utf-8"?>
<SignedIdentifiers>
  <SignedIdentifier>
    <Id>policy2</Id>
    <AccessPolicy>
      <Expiry>2024-02-01T00:00:00Z</Expiry>
    </AccessPolicy>
  </SignedIdentifier>
</SignedIdentifiers>"#;
        let parsed = parse_signed_identifiers(body).unwrap();
        let perms = parsed.items[0].access_policy.permissions();
        assert_eq!(perms, SasPermissions::default());
    }

    #[test]
    fn empty_identifier_list_parses_to_empty_vec() {
        let body = br#"<?xml version="1.0" encoding="utf-8"?><SignedIdentifiers></SignedIdentifiers>"#;
        let parsed = parse_signed_identifiers(body).unwrap();
        assert!(parsed.items.is_empty());
    }
}
