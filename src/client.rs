//! The client façade: wires configuration, credential, connection pool, executor,
//! retry loop and response classifier behind one `execute` entry point, per spec
//! section 2 item 8 / section 5.
//!
//! Grounded on the teacher's end-to-end `create_request` flow (build body → sign →
//! send → interpret response), generalized here so every `src/facade/*.rs` operation
//! goes through the same pipeline instead of repeating it.

use std::collections::BTreeMap;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument};

use crate::agent::Agent;
use crate::canonical::{HeaderBag, SigningForm};
use crate::classify::classify;
use crate::config::{ClientConfig, CredentialSource};
use crate::credential::{
    AnonymousCredential, AuthorizeRequest, CredentialStrategy, RefreshingSasCredential,
    SharedKeyCredential, StaticSasCredential,
};
use crate::error::Error;
use crate::executor::{execute_once, Response};
use crate::retry::{run_with_retry, RetryPolicy};

/// One logical operation, independent of which Azure service it targets — spec
/// section 2 item 8's "plug contract". `src/facade/*.rs` builds these; `Client`
/// doesn't know or care whether it's a blob, queue or table operation.
pub struct OperationRequest<'a> {
    pub method: &'a str,
    pub host: String,
    pub path: String,
    pub query: BTreeMap<String, String>,
    pub headers: HeaderBag,
    pub payload: Option<Vec<u8>>,
    pub supported_query_params: &'a [&'a str],
    pub signing_form: SigningForm,
}

/// Builds the credential strategy, plus — only for `RefreshingSas` — a typed handle
/// kept alongside the trait object so [`Client::subscribe_sas_failures`] doesn't
/// need to downcast a `dyn CredentialStrategy`.
fn build_credential(
    config: &ClientConfig,
) -> (Arc<dyn CredentialStrategy>, Option<Arc<RefreshingSasCredential>>) {
    match &config.credential {
        CredentialSource::SharedKey(key_bytes) => (
            Arc::new(SharedKeyCredential::new(config.account_id.clone(), key_bytes.clone())),
            None,
        ),
        CredentialSource::StaticSas(sas) => (Arc::new(StaticSasCredential::new(sas.clone())), None),
        CredentialSource::RefreshingSas { provider } => {
            let refreshing = Arc::new(RefreshingSasCredential::new(
                provider.clone(),
                config.min_sas_auth_expiry,
            ));
            (refreshing.clone() as Arc<dyn CredentialStrategy>, Some(refreshing))
        }
        CredentialSource::Anonymous => (Arc::new(AnonymousCredential), None),
    }
}

/// Stamps the per-request headers spec section 6 requires on every attempt:
/// `x-ms-date` (fresh on every attempt — a retry must not reuse a stale timestamp),
/// `x-ms-version` and `x-ms-client-request-id` (filled from config only if the
/// façade didn't already set them).
fn stamp_headers(base: &HeaderBag, api_version: &str, client_id: &str) -> HeaderBag {
    let mut headers = base.clone();
    headers.insert(
        "x-ms-date".to_string(),
        chrono::Utc::now().format("%a, %d %b %Y %H:%M:%S GMT").to_string(),
    );
    headers
        .entry("x-ms-version".to_string())
        .or_insert_with(|| api_version.to_string());
    if !client_id.is_empty() {
        headers
            .entry("x-ms-client-request-id".to_string())
            .or_insert_with(|| client_id.to_string());
    }
    headers
}

/// Stamps the `timeout` query parameter (server-side timeout in seconds) from
/// config onto every request that doesn't already carry one, per spec section 6:
/// "`timeout` … defaulted from config".
fn stamp_query(base: &BTreeMap<String, String>, server_timeout: std::time::Duration) -> BTreeMap<String, String> {
    let mut query = base.clone();
    query
        .entry("timeout".to_string())
        .or_insert_with(|| server_timeout.as_secs().to_string());
    query
}

/// Redacts the `sig` query parameter's value before a path is ever handed to
/// `debug!`/`trace!`, per spec section 6.1: the `Authorization` header and SAS
/// signature must never appear verbatim in logs.
fn redact_sig(path_and_query: &str) -> String {
    let Some((path, query)) = path_and_query.split_once('?') else {
        return path_and_query.to_string();
    };
    let redacted: Vec<String> = query
        .split('&')
        .map(|pair| match pair.split_once('=') {
            Some((key, _)) if key.eq_ignore_ascii_case("sig") => format!("{key}=<redacted>"),
            _ => pair.to_string(),
        })
        .collect();
    format!("{path}?{}", redacted.join("&"))
}

/// Ties config + credential + agent + executor + retry + classifier together.
/// One instance is normally built per `ClientConfig` and shared (it is cheap to
/// clone: `Arc`-backed config, `Arc<dyn _>` credential, `Clone` agent).
#[derive(Clone)]
pub struct Client {
    config: Arc<ClientConfig>,
    credential: Arc<dyn CredentialStrategy>,
    refreshing_sas: Option<Arc<RefreshingSasCredential>>,
    agent: Agent,
}

impl Client {
    pub fn new(config: ClientConfig) -> Self {
        let agent = config.agent.clone();
        let (credential, refreshing_sas) = build_credential(&config);
        Self {
            config: Arc::new(config),
            credential,
            refreshing_sas,
            agent,
        }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Subscribes to SAS-refresh failures, if this client's credential is a
    /// [`RefreshingSasCredential`]. Returns `None` for every other strategy.
    pub fn subscribe_sas_failures(
        &self,
    ) -> Option<tokio::sync::broadcast::Receiver<crate::credential::SasRefreshFailure>> {
        self.refreshing_sas.as_ref().map(|cred| cred.subscribe_failures())
    }

    /// Runs one logical operation through sign → send → classify, retrying
    /// transient failures with backoff, per spec section 4.5/5.
    #[instrument(skip(self, req, cancel), fields(host = %req.host, method = %req.method))]
    pub async fn execute(
        &self,
        req: OperationRequest<'_>,
        cancel: &CancellationToken,
    ) -> Result<Response, Error> {
        let policy = RetryPolicy {
            max_attempts: self.config.retries + 1,
            delay_factor: self.config.delay_factor,
            randomization_factor: self.config.randomization_factor,
            max_delay: self.config.max_delay,
        };
        let client_timeout = self.config.client_timeout();

        run_with_retry(policy, |attempt_index| {
            let headers = stamp_headers(&req.headers, &self.config.api_version, &self.config.client_id);
            let query = stamp_query(&req.query, self.config.server_timeout);
            let authorize_req = AuthorizeRequest {
                method: req.method,
                host: req.host.clone(),
                path: req.path.clone(),
                query,
                headers,
                payload: req.payload.clone(),
                supported_query_params: req.supported_query_params,
                signing_form: req.signing_form,
            };
            let credential = self.credential.clone();
            let agent = self.agent.clone();
            let transient_codes = self.config.transient_error_codes.clone();
            async move {
                debug!(attempt = attempt_index, "dispatching attempt");
                let descriptor = credential.authorize(authorize_req).await?;
                debug!(path = %redact_sig(&descriptor.path_and_query), "signed request");
                let response = execute_once(&agent, &descriptor, client_timeout, cancel).await?;
                classify(response, &transient_codes)
            }
        })
        .await
    }
}
