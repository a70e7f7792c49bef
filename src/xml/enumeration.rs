//! Listing ("enumeration") result documents: containers, queues, blobs.
//!
//! Spec section 9 calls out a historical bug where `Delimiter` was written into the
//! same field as `NextMarker`, corrupting the next page's continuation token
//! whenever a hierarchical listing was paginated. `delimiter` and `next_marker` are
//! kept as distinct fields throughout this module — see `DESIGN.md` → Open Questions.

use serde::Deserialize;

/// A page of container names, e.g. from `GET /?comp=list`.
#[derive(Debug, Deserialize, PartialEq, Eq)]
#[serde(rename = "EnumerationResults")]
pub struct ContainerEnumerationResults {
    #[serde(rename = "Prefix", default)]
    pub prefix: Option<String>,
    #[serde(rename = "Marker", default)]
    pub marker: Option<String>,
    #[serde(rename = "MaxResults", default)]
    pub max_results: Option<u32>,
    #[serde(rename = "Containers", default)]
    pub containers: ContainerList,
    #[serde(rename = "NextMarker", default)]
    pub next_marker: Option<String>,
}

#[derive(Debug, Deserialize, Default, PartialEq, Eq)]
pub struct ContainerList {
    #[serde(rename = "Container", default)]
    pub items: Vec<ContainerItem>,
}

#[derive(Debug, Deserialize, PartialEq, Eq)]
pub struct ContainerItem {
    #[serde(rename = "Name")]
    pub name: String,
}

/// A page of queue names, e.g. from `GET /?comp=list`.
#[derive(Debug, Deserialize, PartialEq, Eq)]
#[serde(rename = "EnumerationResults")]
pub struct QueueEnumerationResults {
    #[serde(rename = "Prefix", default)]
    pub prefix: Option<String>,
    #[serde(rename = "Marker", default)]
    pub marker: Option<String>,
    #[serde(rename = "MaxResults", default)]
    pub max_results: Option<u32>,
    #[serde(rename = "Queues", default)]
    pub queues: QueueList,
    #[serde(rename = "NextMarker", default)]
    pub next_marker: Option<String>,
}

#[derive(Debug, Deserialize, Default, PartialEq, Eq)]
pub struct QueueList {
    #[serde(rename = "Queue", default)]
    pub items: Vec<QueueItem>,
}

#[derive(Debug, Deserialize, PartialEq, Eq)]
pub struct QueueItem {
    #[serde(rename = "Name")]
    pub name: String,
}

/// A page of blob names/prefixes, e.g. from `GET /<container>?restype=container&comp=list`.
/// `delimiter` is its own field — never overwritten by, or written into, `next_marker`.
#[derive(Debug, Deserialize, PartialEq, Eq)]
#[serde(rename = "EnumerationResults")]
pub struct BlobEnumerationResults {
    #[serde(rename = "Prefix", default)]
    pub prefix: Option<String>,
    #[serde(rename = "Delimiter", default)]
    pub delimiter: Option<String>,
    #[serde(rename = "Marker", default)]
    pub marker: Option<String>,
    #[serde(rename = "MaxResults", default)]
    pub max_results: Option<u32>,
    #[serde(rename = "Blobs", default)]
    pub blobs: BlobList,
    #[serde(rename = "NextMarker", default)]
    pub next_marker: Option<String>,
}

#[derive(Debug, Deserialize, Default, PartialEq, Eq)]
pub struct BlobList {
    #[serde(rename = "Blob", default)]
    pub items: Vec<BlobItem>,
    #[serde(rename = "BlobPrefix", default)]
    pub prefixes: Vec<BlobPrefix>,
}

#[derive(Debug, Deserialize, PartialEq, Eq)]
pub struct BlobItem {
    #[serde(rename = "Name")]
    pub name: String,
    #[serde(rename = "Properties", default)]
    pub properties: BlobProperties,
}

#[derive(Debug, Deserialize, Default, PartialEq, Eq)]
pub struct BlobProperties {
    #[serde(rename = "Content-Length", default)]
    pub content_length: Option<u64>,
    #[serde(rename = "Content-Type", default)]
    pub content_type: Option<String>,
    #[serde(rename = "Etag", default)]
    pub etag: Option<String>,
    #[serde(rename = "Last-Modified", default)]
    pub last_modified: Option<String>,
}

#[derive(Debug, Deserialize, PartialEq, Eq)]
pub struct BlobPrefix {
    #[serde(rename = "Name")]
    pub name: String,
}

pub fn parse_container_enumeration(payload: &[u8]) -> Result<ContainerEnumerationResults, crate::error::Error> {
    quick_xml::de::from_reader(payload).map_err(|e| crate::error::Error::Malformed(e.to_string()))
}

pub fn parse_queue_enumeration(payload: &[u8]) -> Result<QueueEnumerationResults, crate::error::Error> {
    quick_xml::de::from_reader(payload).map_err(|e| crate::error::Error::Malformed(e.to_string()))
}

pub fn parse_blob_enumeration(payload: &[u8]) -> Result<BlobEnumerationResults, crate::error::Error> {
    quick_xml::de::from_reader(payload).map_err(|e| crate::error::Error::Malformed(e.to_string()))
}
