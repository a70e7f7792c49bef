//! Representative Table service operations: insert and get an entity.
//!
//! Table uses the shared-key *lite* canonicalization form (`src/canonical.rs`'s
//! `canonical_string_lite`, only `comp` participates) and a JSON/odata wire format
//! rather than Blob/Queue's XML, per spec section 4.1/4.7.

use std::collections::BTreeMap;

use serde_json::{Map, Value};
use tokio_util::sync::CancellationToken;

use crate::canonical::{HeaderBag, SigningForm};
use crate::client::{Client, OperationRequest};
use crate::error::Error;

fn host(client: &Client) -> String {
    format!("{}.table.core.windows.net", client.config().account_id)
}

fn odata_headers(body_len: usize) -> HeaderBag {
    let mut headers = HeaderBag::new();
    headers.insert("content-type".to_string(), "application/json".to_string());
    headers.insert(
        "accept".to_string(),
        "application/json;odata=nometadata".to_string(),
    );
    headers.insert("content-length".to_string(), body_len.to_string());
    headers
}

/// `POST /<table>` — insert an entity. `entity` must carry `PartitionKey` and
/// `RowKey` properties, per spec GLOSSARY.
pub async fn insert_entity(
    client: &Client,
    table: &str,
    entity: &Map<String, Value>,
    cancel: &CancellationToken,
) -> Result<(), Error> {
    let body = serde_json::to_vec(entity).map_err(|e| Error::Malformed(e.to_string()))?;
    let headers = odata_headers(body.len());

    let req = OperationRequest {
        method: "POST",
        host: host(client),
        path: format!("/{table}"),
        query: BTreeMap::new(),
        headers,
        payload: Some(body),
        supported_query_params: &["timeout"],
        signing_form: SigningForm::Lite,
    };

    client.execute(req, cancel).await?;
    Ok(())
}

/// `GET /<table>(PartitionKey='<pk>',RowKey='<rk>')` — retrieve a single entity.
pub async fn get_entity(
    client: &Client,
    table: &str,
    partition_key: &str,
    row_key: &str,
    cancel: &CancellationToken,
) -> Result<Map<String, Value>, Error> {
    let path = format!(
        "/{table}(PartitionKey='{}',RowKey='{}')",
        odata_key_escape(partition_key),
        odata_key_escape(row_key)
    );

    let mut headers = HeaderBag::new();
    headers.insert(
        "accept".to_string(),
        "application/json;odata=nometadata".to_string(),
    );

    let req = OperationRequest {
        method: "GET",
        host: host(client),
        path,
        query: BTreeMap::new(),
        headers,
        payload: None,
        supported_query_params: &["timeout", "$select"],
        signing_form: SigningForm::Lite,
    };

    let response = client.execute(req, cancel).await?;
    let value: Value =
        serde_json::from_slice(&response.payload).map_err(|e| Error::Malformed(e.to_string()))?;
    match value {
        Value::Object(map) => Ok(map),
        other => Err(Error::Malformed(format!("expected a JSON object, got {other}"))),
    }
}

/// Single quotes inside an odata key predicate are escaped by doubling, per the
/// odata URL-literal convention (e.g. `O'Brien` -> `O''Brien`).
fn odata_key_escape(key: &str) -> String {
    key.replace('\'', "''")
}
