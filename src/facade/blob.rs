//! Representative Blob service operations: list/create/delete containers, list
//! blobs in a container.
//!
//! Spec section 9 calls out a historical bug where the `include` flags for
//! `listBlobs` were joined with the literal string `%82` instead of a comma,
//! corrupting every multi-flag listing. `include_query_value` below always joins
//! with `,` — see `DESIGN.md` → Open Questions.

use std::collections::BTreeMap;

use tokio_util::sync::CancellationToken;

use crate::canonical::{HeaderBag, SigningForm};
use crate::client::{Client, OperationRequest};
use crate::error::Error;
use crate::xml::enumeration::{
    parse_blob_enumeration, parse_container_enumeration, BlobEnumerationResults,
    ContainerEnumerationResults,
};

fn host(client: &Client) -> String {
    format!("{}.blob.core.windows.net", client.config().account_id)
}

fn include_query_value(include: &[&str]) -> String {
    include.join(",")
}

/// `GET /?comp=list` — list containers in the account.
pub async fn list_containers(
    client: &Client,
    prefix: Option<&str>,
    cancel: &CancellationToken,
) -> Result<ContainerEnumerationResults, Error> {
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
    parse_container_enumeration(&response.payload)
}

/// `PUT /<container>?restype=container` — create a container.
pub async fn create_container(
    client: &Client,
    container: &str,
    cancel: &CancellationToken,
) -> Result<(), Error> {
    let mut query = BTreeMap::new();
    query.insert("restype".to_string(), "container".to_string());
    let mut headers = HeaderBag::new();
    headers.insert("content-length".to_string(), "0".to_string());

    let req = OperationRequest {
        method: "PUT",
        host: host(client),
        path: format!("/{container}"),
        query,
        headers,
        payload: None,
        supported_query_params: &["comp", "restype", "timeout"],
        signing_form: SigningForm::Full,
    };

    client.execute(req, cancel).await?;
    Ok(())
}

/// `DELETE /<container>?restype=container` — delete a container.
pub async fn delete_container(
    client: &Client,
    container: &str,
    cancel: &CancellationToken,
) -> Result<(), Error> {
    let mut query = BTreeMap::new();
    query.insert("restype".to_string(), "container".to_string());

    let req = OperationRequest {
        method: "DELETE",
        host: host(client),
        path: format!("/{container}"),
        query,
        headers: HeaderBag::new(),
        payload: None,
        supported_query_params: &["comp", "restype", "timeout"],
        signing_form: SigningForm::Full,
    };

    client.execute(req, cancel).await?;
    Ok(())
}

/// `GET /<container>?restype=container&comp=list` — list blobs, with the
/// `include` flags joined as a comma-separated list.
pub async fn list_blobs(
    client: &Client,
    container: &str,
    delimiter: Option<&str>,
    include: &[&str],
    cancel: &CancellationToken,
) -> Result<BlobEnumerationResults, Error> {
    let mut query = BTreeMap::new();
    query.insert("restype".to_string(), "container".to_string());
    query.insert("comp".to_string(), "list".to_string());
    if let Some(delimiter) = delimiter {
        query.insert("delimiter".to_string(), delimiter.to_string());
    }
    if !include.is_empty() {
        query.insert("include".to_string(), include_query_value(include));
    }

    let req = OperationRequest {
        method: "GET",
        host: host(client),
        path: format!("/{container}"),
        query,
        headers: HeaderBag::new(),
        payload: None,
        supported_query_params: &[
            "comp",
            "restype",
            "prefix",
            "delimiter",
            "marker",
            "maxresults",
            "include",
            "timeout",
        ],
        signing_form: SigningForm::Full,
    };

    let response = client.execute(req, cancel).await?;
    parse_blob_enumeration(&response.payload)
}
