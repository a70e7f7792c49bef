//! Service properties document (`?restype=service&comp=properties`): logging,
//! hour/minute metrics, and CORS rules, per spec GLOSSARY.

use serde::Deserialize;

#[derive(Debug, Deserialize, PartialEq, Eq)]
#[serde(rename = "StorageServiceProperties")]
pub struct StorageServiceProperties {
    #[serde(rename = "Logging", default)]
    pub logging: Option<Logging>,
    #[serde(rename = "HourMetrics", default)]
    pub hour_metrics: Option<Metrics>,
    #[serde(rename = "MinuteMetrics", default)]
    pub minute_metrics: Option<Metrics>,
    #[serde(rename = "Cors", default)]
    pub cors: Cors,
}

#[derive(Debug, Deserialize, PartialEq, Eq)]
pub struct Logging {
    #[serde(rename = "Version")]
    pub version: String,
    #[serde(rename = "Delete")]
    pub delete: bool,
    #[serde(rename = "Read")]
    pub read: bool,
    #[serde(rename = "Write")]
    pub write: bool,
    #[serde(rename = "RetentionPolicy")]
    pub retention_policy: RetentionPolicy,
}

#[derive(Debug, Deserialize, PartialEq, Eq)]
pub struct Metrics {
    #[serde(rename = "Version")]
    pub version: String,
    #[serde(rename = "Enabled")]
    pub enabled: bool,
    #[serde(rename = "IncludeAPIs", default)]
    pub include_apis: Option<bool>,
    #[serde(rename = "RetentionPolicy")]
    pub retention_policy: RetentionPolicy,
}

#[derive(Debug, Deserialize, PartialEq, Eq)]
pub struct RetentionPolicy {
    #[serde(rename = "Enabled")]
    pub enabled: bool,
    #[serde(rename = "Days", default)]
    pub days: Option<u32>,
}

#[derive(Debug, Deserialize, Default, PartialEq, Eq)]
pub struct Cors {
    #[serde(rename = "CorsRule", default)]
    pub rules: Vec<CorsRule>,
}

#[derive(Debug, Deserialize, PartialEq, Eq)]
pub struct CorsRule {
    #[serde(rename = "AllowedOrigins")]
    pub allowed_origins: String,
    #[serde(rename = "AllowedMethods")]
    pub allowed_methods: String,
    #[serde(rename = "AllowedHeaders")]
    pub allowed_headers: String,
    #[serde(rename = "ExposedHeaders")]
    pub exposed_headers: String,
    #[serde(rename = "MaxAgeInSeconds")]
    pub max_age_in_seconds: u32,
}

pub fn parse_service_properties(
    payload: &[u8],
) -> Result<StorageServiceProperties, crate::error::Error> {
    quick_xml::de::from_reader(payload).map_err(|e| crate::error::Error::Malformed(e.to_string()))
}
