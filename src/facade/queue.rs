//! Representative Queue service operations: list/create/delete queues, put/peek/get
//! messages, delete a message by pop receipt.
//!
//! Generalizes the teacher's fixed single-queue message-send flow
//! (`zeph1rus-rust-azure-table-queue`'s `queuemsg`) into operations that go through
//! the shared [`Client::execute`] pipeline instead of building their own signing.

use std::collections::BTreeMap;

use tokio_util::sync::CancellationToken;

use crate::canonical::{HeaderBag, SigningForm};
use crate::client::{Client, OperationRequest};
use crate::error::Error;
use crate::xml::enumeration::{parse_queue_enumeration, QueueEnumerationResults};
use crate::xml::messages::{
    parse_dequeued_messages, parse_peeked_messages, DequeuedMessageList, PeekedMessageList,
};

fn host(client: &Client) -> String {
    format!("{}.queue.core.windows.net", client.config().account_id)
}

/// `GET /?comp=list` — list queues in the account.
pub async fn list_queues(
    client: &Client,
    prefix: Option<&str>,
    cancel: &CancellationToken,
) -> Result<QueueEnumerationResults, Error> {
    let mut query = BTreeMap::new();
    query.insert("comp".to_string(), "list".to_string());
    if let Some(prefix) = prefix {
        query.insert("prefix".to_string(), prefix.to_string());
    }

    let req = OperationRequest {
        method: "GET",
        host: host(client),
        path: "/".to_string(),
        query,
        headers: HeaderBag::new(),
        payload: None,
        supported_query_params: &["comp", "prefix", "marker", "maxresults", "include", "timeout"],
        signing_form: SigningForm::Full,
    };

    let response = client.execute(req, cancel).await?;
    parse_queue_enumeration(&response.payload)
}

/// `PUT /<queue>` — create a queue.
pub async fn create_queue(client: &Client, queue: &str, cancel: &CancellationToken) -> Result<(), Error> {
    let mut headers = HeaderBag::new();
    headers.insert("content-length".to_string(), "0".to_string());

    let req = OperationRequest {
        method: "PUT",
        host: host(client),
        path: format!("/{queue}"),
        query: BTreeMap::new(),
        headers,
        payload: None,
        supported_query_params: &["comp", "timeout"],
        signing_form: SigningForm::Full,
    };

    client.execute(req, cancel).await?;
    Ok(())
}

/// `DELETE /<queue>` — delete a queue.
pub async fn delete_queue(client: &Client, queue: &str, cancel: &CancellationToken) -> Result<(), Error> {
    let req = OperationRequest {
        method: "DELETE",
        host: host(client),
        path: format!("/{queue}"),
        query: BTreeMap::new(),
        headers: HeaderBag::new(),
        payload: None,
        supported_query_params: &["comp", "timeout"],
        signing_form: SigningForm::Full,
    };

    client.execute(req, cancel).await?;
    Ok(())
}

fn escape_xml(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

/// `POST /<queue>/messages` — enqueue a message.
pub async fn put_message(
    client: &Client,
    queue: &str,
    message_text: &str,
    visibility_timeout: Option<u32>,
    message_ttl: Option<u32>,
    cancel: &CancellationToken,
) -> Result<(), Error> {
    let body = format!(
        "<QueueMessage><MessageText>{}</MessageText></QueueMessage>",
        escape_xml(message_text)
    );
    let body_bytes = body.into_bytes();

    let mut query = BTreeMap::new();
    if let Some(v) = visibility_timeout {
        query.insert("visibilitytimeout".to_string(), v.to_string());
    }
    if let Some(ttl) = message_ttl {
        query.insert("messagettl".to_string(), ttl.to_string());
    }

    let mut headers = HeaderBag::new();
    headers.insert("content-length".to_string(), body_bytes.len().to_string());
    headers.insert("content-type".to_string(), "application/xml".to_string());

    let req = OperationRequest {
        method: "POST",
        host: host(client),
        path: format!("/{queue}/messages"),
        query,
        headers,
        payload: Some(body_bytes),
        supported_query_params: &["visibilitytimeout", "messagettl", "timeout"],
        signing_form: SigningForm::Full,
    };

    client.execute(req, cancel).await?;
    Ok(())
}

/// `GET /<queue>/messages` — dequeue up to `num_messages`, making them invisible
/// for `visibility_timeout`.
pub async fn get_messages(
    client: &Client,
    queue: &str,
    num_messages: u32,
    visibility_timeout: u32,
    cancel: &CancellationToken,
) -> Result<DequeuedMessageList, Error> {
    let mut query = BTreeMap::new();
    query.insert("numofmessages".to_string(), num_messages.to_string());
    query.insert("visibilitytimeout".to_string(), visibility_timeout.to_string());

    let req = OperationRequest {
        method: "GET",
        host: host(client),
        path: format!("/{queue}/messages"),
        query,
        headers: HeaderBag::new(),
        payload: None,
        supported_query_params: &["numofmessages", "visibilitytimeout", "timeout"],
        signing_form: SigningForm::Full,
    };

    let response = client.execute(req, cancel).await?;
    parse_dequeued_messages(&response.payload)
}

/// `GET /<queue>/messages?peekonly=true` — peek without dequeuing.
pub async fn peek_messages(
    client: &Client,
    queue: &str,
    num_messages: u32,
    cancel: &CancellationToken,
) -> Result<PeekedMessageList, Error> {
    let mut query = BTreeMap::new();
    query.insert("peekonly".to_string(), "true".to_string());
    query.insert("numofmessages".to_string(), num_messages.to_string());

    let req = OperationRequest {
        method: "GET",
        host: host(client),
        path: format!("/{queue}/messages"),
        query,
        headers: HeaderBag::new(),
        payload: None,
        supported_query_params: &["peekonly", "numofmessages", "timeout"],
        signing_form: SigningForm::Full,
    };

    let response = client.execute(req, cancel).await?;
    parse_peeked_messages(&response.payload)
}

/// `DELETE /<queue>/messages/<message_id>?popreceipt=<receipt>` — delete a
/// previously-dequeued message.
pub async fn delete_message(
    client: &Client,
    queue: &str,
    message_id: &str,
    pop_receipt: &str,
    cancel: &CancellationToken,
) -> Result<(), Error> {
    let mut query = BTreeMap::new();
    query.insert("popreceipt".to_string(), pop_receipt.to_string());

    let req = OperationRequest {
        method: "DELETE",
        host: host(client),
        path: format!("/{queue}/messages/{message_id}"),
        query,
        headers: HeaderBag::new(),
        payload: None,
        supported_query_params: &["popreceipt", "timeout"],
        signing_form: SigningForm::Full,
    };

    client.execute(req, cancel).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn escapes_reserved_xml_characters_in_message_text() {
        assert_eq!(escape_xml("a & b < c > d"), "a &amp; b &lt; c &gt; d");
    }
}
