//! Queue message documents: "peek" (no pop receipt) vs "get" (with pop receipt and
//! visibility timeout), per spec section 4.7.

use serde::Deserialize;

/// A message returned by `GET /<queue>/messages?peekonly=true` — no `PopReceipt` or
/// `TimeNextVisible`, since peeking never dequeues.
#[derive(Debug, Deserialize, PartialEq, Eq)]
pub struct PeekedMessage {
    #[serde(rename = "MessageId")]
    pub message_id: String,
    #[serde(rename = "InsertionTime")]
    pub insertion_time: String,
    #[serde(rename = "ExpirationTime")]
    pub expiration_time: String,
    #[serde(rename = "DequeueCount")]
    pub dequeue_count: u32,
    #[serde(rename = "MessageText")]
    pub message_text: String,
}

#[derive(Debug, Deserialize, Default, PartialEq, Eq)]
#[serde(rename = "QueueMessagesList")]
pub struct PeekedMessageList {
    #[serde(rename = "QueueMessage", default)]
    pub items: Vec<PeekedMessage>,
}

/// A message returned by `GET /<queue>/messages` — carries the `PopReceipt` and
/// `TimeNextVisible` needed to delete or update the message later.
#[derive(Debug, Deserialize, PartialEq, Eq)]
pub struct DequeuedMessage {
    #[serde(rename = "MessageId")]
    pub message_id: String,
    #[serde(rename = "InsertionTime")]
    pub insertion_time: String,
    #[serde(rename = "ExpirationTime")]
    pub expiration_time: String,
    #[serde(rename = "PopReceipt")]
    pub pop_receipt: String,
    #[serde(rename = "TimeNextVisible")]
    pub time_next_visible: String,
    #[serde(rename = "DequeueCount")]
    pub dequeue_count: u32,
    #[serde(rename = "MessageText")]
    pub message_text: String,
}

#[derive(Debug, Deserialize, Default, PartialEq, Eq)]
#[serde(rename = "QueueMessagesList")]
pub struct DequeuedMessageList {
    #[serde(rename = "QueueMessage", default)]
    pub items: Vec<DequeuedMessage>,
}

pub fn parse_peeked_messages(payload: &[u8]) -> Result<PeekedMessageList, crate::error::Error> {
    quick_xml::de::from_reader(payload).map_err(|e| crate::error::Error::Malformed(e.to_string()))
}

pub fn parse_dequeued_messages(payload: &[u8]) -> Result<DequeuedMessageList, crate::error::Error> {
    quick_xml::de::from_reader(payload).map_err(|e| crate::error::Error::Malformed(e.to_string()))
}
