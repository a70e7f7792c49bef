//! Credential strategies, per spec section 4.2.
//!
//! `CredentialStrategy` renders the spec's "runtime dispatch over four concrete
//! functions" (section 9) as a trait with one implementation per strategy, selected
//! once at [`crate::client::Client`] construction — grounded on the tagged-union
//! shape of `StorageCredentials` in
//! `examples/other_examples/f21b51d8_hanhossain-azure-sdk-for-rust__sdk-storage-src-clients-storage_client.rs.rs`.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use chrono::Utc;
use futures::future::{FutureExt, Shared};
use tokio::sync::{broadcast, Mutex};
use tracing::trace;
use url::form_urlencoded;

use crate::canonical::{canonical_string_full, canonical_string_lite, HeaderBag};
use crate::config::SasProviderFn;
use crate::error::{Error, ServiceError};
use crate::sas;
use crate::signer::sign;

/// A fully-authorized request, ready for the executor (spec section 3).
#[derive(Debug, Clone)]
pub struct RequestDescriptor {
    pub host: String,
    pub method: String,
    /// Path including the serialized (and, for SharedKey, never modified) query string.
    pub path_and_query: String,
    pub headers: HeaderBag,
    pub payload: Option<Vec<u8>>,
}

/// Which canonicalization form a request needs, per spec section 4.1.
pub use crate::canonical::SigningForm;

/// Everything a credential strategy needs to produce a [`RequestDescriptor`].
pub struct AuthorizeRequest<'a> {
    pub method: &'a str,
    pub host: String,
    pub path: String,
    pub query: BTreeMap<String, String>,
    pub headers: HeaderBag,
    pub payload: Option<Vec<u8>>,
    pub supported_query_params: &'a [&'a str],
    pub signing_form: SigningForm,
}

fn serialize_query(path: &str, query: &BTreeMap<String, String>) -> String {
    if query.is_empty() {
        return path.to_string();
    }
    let encoded: String = form_urlencoded::Serializer::new(String::new())
        .extend_pairs(query.iter())
        .finish();
    format!("{}?{}", path, encoded)
}

#[async_trait]
pub trait CredentialStrategy: Send + Sync {
    async fn authorize(&self, req: AuthorizeRequest<'_>) -> Result<RequestDescriptor, Error>;
}

/// SharedKey: synchronous canonicalize-then-sign, per spec section 4.2.
pub struct SharedKeyCredential {
    pub account_id: String,
    pub key_bytes: Arc<[u8]>,
}

impl SharedKeyCredential {
    pub fn new(account_id: impl Into<String>, key_bytes: Arc<[u8]>) -> Self {
        Self {
            account_id: account_id.into(),
            key_bytes,
        }
    }
}

#[async_trait]
impl CredentialStrategy for SharedKeyCredential {
    async fn authorize(&self, req: AuthorizeRequest<'_>) -> Result<RequestDescriptor, Error> {
        let (canonical, scheme) = match req.signing_form {
            SigningForm::Full => (
                canonical_string_full(
                    req.method,
                    &req.headers,
                    &self.account_id,
                    &req.path,
                    &req.query,
                    req.supported_query_params,
                ),
                "SharedKey",
            ),
            SigningForm::Lite => (
                canonical_string_lite(req.method, &req.headers, &self.account_id, &req.path, &req.query),
                "SharedKeyLite",
            ),
        };

        let signature = sign(&self.key_bytes, &canonical);
        let mut headers = req.headers;
        headers.insert(
            "authorization".to_string(),
            format!("{} {}:{}", scheme, self.account_id, signature),
        );

        Ok(RequestDescriptor {
            host: req.host,
            method: req.method.to_string(),
            path_and_query: serialize_query(&req.path, &req.query),
            headers,
            payload: req.payload,
        })
    }
}

/// StaticSas: no signing, the SAS string is just appended to the query, per
/// spec section 4.2.
pub struct StaticSasCredential {
    pub sas: String,
}

impl StaticSasCredential {
    pub fn new(sas: impl Into<String>) -> Self {
        Self { sas: sas.into() }
    }
}

fn append_sas(path: &str, query: &BTreeMap<String, String>, sas: &str) -> String {
    let serialized = serialize_query(path, query);
    if serialized.contains('?') {
        format!("{}&{}", serialized, sas)
    } else {
        format!("{}?{}", serialized, sas)
    }
}

#[async_trait]
impl CredentialStrategy for StaticSasCredential {
    async fn authorize(&self, req: AuthorizeRequest<'_>) -> Result<RequestDescriptor, Error> {
        Ok(RequestDescriptor {
            host: req.host,
            method: req.method.to_string(),
            path_and_query: append_sas(&req.path, &req.query, &self.sas),
            headers: req.headers,
            payload: req.payload,
        })
    }
}

/// Anonymous: just serializes the query, per spec section 4.2.
pub struct AnonymousCredential;

#[async_trait]
impl CredentialStrategy for AnonymousCredential {
    async fn authorize(&self, req: AuthorizeRequest<'_>) -> Result<RequestDescriptor, Error> {
        Ok(RequestDescriptor {
            host: req.host,
            method: req.method.to_string(),
            path_and_query: serialize_query(&req.path, &req.query),
            headers: req.headers,
            payload: req.payload,
        })
    }
}

/// Emitted on the side channel (spec section 4.2/7/9) when a SAS refresh either
/// fails outright or returns a SAS too close to expiry.
#[derive(Debug, Clone)]
pub struct SasRefreshFailure {
    pub message: String,
}

type RefreshFuture = Shared<futures::future::BoxFuture<'static, Result<String, String>>>;

struct SasState {
    current_sas: String,
    /// `None` models the spec's `nextRefreshAtMs = 0` sentinel: "never refreshed
    /// yet" and "refresh currently running" are both "must refresh before use".
    next_refresh_at: Option<Instant>,
    in_flight: Option<RefreshFuture>,
}

/// RefreshingSas: refreshes on demand, single-flight, per spec section 4.2/5.
pub struct RefreshingSasCredential {
    state: Mutex<SasState>,
    provider: SasProviderFn,
    min_sas_auth_expiry: Duration,
    failures: broadcast::Sender<SasRefreshFailure>,
}

impl RefreshingSasCredential {
    pub fn new(provider: SasProviderFn, min_sas_auth_expiry: Duration) -> Self {
        let (failures, _rx) = broadcast::channel(16);
        Self {
            state: Mutex::new(SasState {
                current_sas: String::new(),
                next_refresh_at: None,
                in_flight: None,
            }),
            provider,
            min_sas_auth_expiry,
            failures,
        }
    }

    /// Subscribe to refresh-failure / too-close-to-expiry events (spec section 7's
    /// "error event on the client").
    pub fn subscribe_failures(&self) -> broadcast::Receiver<SasRefreshFailure> {
        self.failures.subscribe()
    }

    /// Returns the currently-committed SAS, refreshing first if it is due.
    /// Concurrent callers observing a refresh already in flight share it, per the
    /// "at most one refresh in progress" invariant.
    async fn current_sas(&self) -> Result<String, Error> {
        let (in_flight, is_owner) = {
            let mut state = self.state.lock().await;
            let needs_refresh = match state.next_refresh_at {
                Some(at) => Instant::now() >= at,
                None => true,
            };
            if !needs_refresh {
                return Ok(state.current_sas.clone());
            }
            if let Some(existing) = &state.in_flight {
                trace!("SAS refresh already in flight, joining it");
                (existing.clone(), false)
            } else {
                trace!("starting SAS refresh");
                let provider = self.provider.clone();
                let fut: futures::future::BoxFuture<'static, Result<String, String>> =
                    Box::pin(async move { provider().await });
                let shared = fut.shared();
                state.in_flight = Some(shared.clone());
                (shared, true)
            }
        };

        match in_flight.await {
            // Only the caller that started the refresh (`is_owner`) commits the
            // result and broadcasts failures — followers that joined the same
            // `Shared` future just take the resolved value, so one refresh never
            // produces duplicate state commits or duplicate failure events.
            Ok(new_sas) => {
                if !is_owner {
                    return Ok(new_sas);
                }

                let expiry = sas::parse_expiry(&new_sas);
                let now = Instant::now();
                let next_refresh_at = expiry.map(|e| {
                    let now_utc = Utc::now();
                    let delta = (e - now_utc).to_std().unwrap_or(Duration::ZERO);
                    now + delta.saturating_sub(self.min_sas_auth_expiry)
                });

                let mut state = self.state.lock().await;
                state.current_sas = new_sas.clone();
                state.next_refresh_at = next_refresh_at;
                state.in_flight = None;
                let too_close = match next_refresh_at {
                    Some(at) => now >= at,
                    None => true,
                };
                drop(state);

                // Never log the SAS string itself — it carries `sig`.
                trace!(too_close, "SAS refresh committed");
                if too_close {
                    let _ = self.failures.send(SasRefreshFailure {
                        message: "SAS provider returned a token too close to expiry".to_string(),
                    });
                }
                Ok(new_sas)
            }
            Err(message) => {
                if is_owner {
                    let mut state = self.state.lock().await;
                    state.in_flight = None;
                    drop(state);
                    let _ = self.failures.send(SasRefreshFailure {
                        message: message.clone(),
                    });
                }
                Err(Error::Service(
                    ServiceError::new(crate::error::ErrorKind::Auth, "SasRefreshFailed", message),
                ))
            }
        }
    }
}

#[async_trait]
impl CredentialStrategy for RefreshingSasCredential {
    async fn authorize(&self, req: AuthorizeRequest<'_>) -> Result<RequestDescriptor, Error> {
        let sas = self.current_sas().await?;
        Ok(RequestDescriptor {
            host: req.host,
            method: req.method.to_string(),
            path_and_query: append_sas(&req.path, &req.query, &sas),
            headers: req.headers,
            payload: req.payload,
        })
    }
}
