//! Request executor, per spec section 4.4.
//!
//! Generalizes the teacher's `create_request` (reqwest `Client::post` + header
//! setting + `.bytes().await`) into a reusable single-attempt primitive: open/borrow
//! a connection through the [`Agent`], enforce the client-side deadline with
//! `tokio::time::timeout`, and read the whole body into memory (streaming is
//! explicitly out of scope, per spec section 1).

use std::collections::BTreeMap;
use std::time::Duration;

use reqwest::Method;
use tokio_util::sync::CancellationToken;

use crate::agent::Agent;
use crate::credential::RequestDescriptor;
use crate::error::Error;
use std::error::Error as StdError;

/// A fully-read HTTP response, per spec section 3.
#[derive(Debug, Clone)]
pub struct Response {
    pub status_code: u16,
    /// Lowercased header name -> value, for canonicalization-style lookups.
    pub headers: BTreeMap<String, String>,
    /// Original-case `(name, value)` pairs in server response order, so metadata
    /// keys (`x-ms-meta-<Name>`) can recover their original casing (spec 4.6/9).
    pub raw_headers: Vec<(String, String)>,
    pub payload: Vec<u8>,
}

impl Response {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status_code)
    }

    pub fn content_type(&self) -> Option<&str> {
        self.headers.get("content-type").map(|s| s.as_str())
    }
}

fn parse_method(method: &str) -> Result<Method, Error> {
    Method::from_bytes(method.as_bytes()).map_err(|_| Error::Network {
        message: format!("invalid method {method}"),
        code: None,
        retries: 0,
    })
}

/// Classifies a `reqwest::Error` into one of [`crate::error::TRANSIENT_NETWORK_CODES`]
/// where the underlying failure matches, so the retry loop can tell a transient
/// connect/reset/timeout from a permanent one (TLS validation, DNS `ENOTFOUND`,
/// "connection closed before message completed") instead of retrying both alike.
fn classify_transport_error(err: &reqwest::Error) -> Option<String> {
    if err.is_timeout() {
        return Some("ETIMEDOUT".to_string());
    }
    if err.is_connect() {
        let mut source: Option<&(dyn StdError + 'static)> = StdError::source(err);
        while let Some(cause) = source {
            if let Some(io_err) = cause.downcast_ref::<std::io::Error>() {
                let code = match io_err.kind() {
                    std::io::ErrorKind::ConnectionRefused => Some("ECONNREFUSED"),
                    std::io::ErrorKind::ConnectionReset => Some("ECONNRESET"),
                    std::io::ErrorKind::TimedOut => Some("ETIMEDOUT"),
                    _ => None,
                };
                if let Some(code) = code {
                    return Some(code.to_string());
                }
            }
            source = cause.source();
        }
        let lowered = err.to_string().to_lowercase();
        if lowered.contains("dns") || lowered.contains("resolve") || lowered.contains("lookup") {
            return Some("EAI_AGAIN".to_string());
        }
    }
    None
}

/// Issues exactly one HTTP attempt. Returns `Timeout`/`Network`/`Cancelled` errors
/// as typed `Error`s rather than panicking, so the retry loop can classify them
/// without downcasting.
pub async fn execute_once(
    agent: &Agent,
    descriptor: &RequestDescriptor,
    client_timeout: Duration,
    cancel: &CancellationToken,
) -> Result<Response, Error> {
    let attempt = async {
        let _lease = agent.acquire(&descriptor.host).await;

        // `host` is normally a bare authority (`acct.blob.core.windows.net`), always
        // reached over TLS; tests and storage emulators (Azurite-style) may instead
        // supply a full `http://…` authority, which is used as-is.
        let url = if descriptor.host.contains("://") {
            format!("{}{}", descriptor.host, descriptor.path_and_query)
        } else {
            format!("https://{}{}", descriptor.host, descriptor.path_and_query)
        };
        let method = parse_method(&descriptor.method)?;
        let mut builder = agent.http_client().request(method, &url);
        for (name, value) in &descriptor.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(body) = &descriptor.payload {
            builder = builder.body(body.clone());
        }

        let resp = builder.send().await.map_err(|e| Error::Network {
            code: classify_transport_error(&e),
            message: e.to_string(),
            retries: 0,
        })?;

        let status_code = resp.status().as_u16();
        let raw_headers: Vec<(String, String)> = resp
            .headers()
            .iter()
            .map(|(name, value)| {
                (
                    name.to_string(),
                    value.to_str().unwrap_or_default().to_string(),
                )
            })
            .collect();
        let headers: BTreeMap<String, String> = raw_headers
            .iter()
            .map(|(k, v)| (k.to_lowercase(), v.clone()))
            .collect();

        let payload = resp
            .bytes()
            .await
            .map_err(|e| Error::Network {
                code: classify_transport_error(&e),
                message: e.to_string(),
                retries: 0,
            })?
            .to_vec();

        Ok(Response {
            status_code,
            headers,
            raw_headers,
            payload,
        })
    };

    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(Error::Cancelled),
        result = tokio::time::timeout(client_timeout, attempt) => match result {
            Ok(inner) => inner,
            Err(_) => Err(Error::Timeout { retries: 0 }),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::canonical::HeaderBag;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn reads_full_body_and_status() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/container"))
            .respond_with(ResponseTemplate::new(200).set_body_string("hello"))
            .mount(&server)
            .await;

        let agent = Agent::new(10, Duration::from_secs(60));
        let descriptor = RequestDescriptor {
            host: format!("http://{}", server.address()),
            method: "GET".to_string(),
            path_and_query: "/container".to_string(),
            headers: HeaderBag::new(),
            payload: None,
        };
        let cancel = CancellationToken::new();
        let response = execute_once(&agent, &descriptor, Duration::from_secs(5), &cancel)
            .await
            .unwrap();
        assert_eq!(response.status_code, 200);
        assert_eq!(response.payload, b"hello".to_vec());
    }

    #[tokio::test]
    async fn cancellation_short_circuits_the_attempt() {
        let agent = Agent::new(10, Duration::from_secs(60));
        let descriptor = RequestDescriptor {
            host: "10.255.255.1".to_string(),
            method: "GET".to_string(),
            path_and_query: "/".to_string(),
            headers: HeaderBag::new(),
            payload: None,
        };
        let cancel = CancellationToken::new();
        cancel.cancel();

        let result = execute_once(&agent, &descriptor, Duration::from_secs(30), &cancel).await;
        assert!(matches!(result, Err(Error::Cancelled)));
    }

    /// An invalid method never reaches the network, so there's no transport code
    /// to classify — `is_transient` (in `retry`) must not treat this as retryable.
    #[tokio::test]
    async fn invalid_method_yields_network_error_with_no_code() {
        let agent = Agent::new(10, Duration::from_secs(60));
        let descriptor = RequestDescriptor {
            host: "example.invalid".to_string(),
            method: "BAD METHOD".to_string(),
            path_and_query: "/".to_string(),
            headers: HeaderBag::new(),
            payload: None,
        };
        let cancel = CancellationToken::new();
        let result = execute_once(&agent, &descriptor, Duration::from_secs(5), &cancel).await;
        match result {
            Err(Error::Network { code, .. }) => assert_eq!(code, None),
            other => panic!("expected Network error, got {other:?}"),
        }
    }

    /// A refused TCP connection should classify as `ECONNREFUSED`, one of the
    /// fixed transient network codes retried per spec section 4.5.
    #[tokio::test]
    async fn connection_refused_classifies_as_econnrefused() {
        let agent = Agent::new(10, Duration::from_secs(60));
        let descriptor = RequestDescriptor {
            host: "http://127.0.0.1:1".to_string(),
            method: "GET".to_string(),
            path_and_query: "/".to_string(),
            headers: HeaderBag::new(),
            payload: None,
        };
        let cancel = CancellationToken::new();
        let result = execute_once(&agent, &descriptor, Duration::from_secs(5), &cancel).await;
        match result {
            Err(Error::Network { code, .. }) => assert_eq!(code.as_deref(), Some("ECONNREFUSED")),
            other => panic!("expected Network error, got {other:?}"),
        }
    }
}
