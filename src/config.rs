//! Immutable client configuration, built through [`ClientConfigBuilder`].
//!
//! Mirrors spec section 3's `ClientConfig` / section 6's enumerated construction
//! options, plus the ambient env-override layer added in section 6.2.

use std::collections::HashSet;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use base64::{engine::general_purpose::STANDARD, Engine as _};
use once_cell::sync::Lazy;

use crate::agent::Agent;
use crate::error::{default_transient_error_codes, ConfigError};

/// The process-global `Agent` instance, per spec section 6's "`agent` (defaults to
/// a process-global Agent instance)". Built lazily on first use with the documented
/// defaults (`max_sockets=50`, `keep_alive=60s`); shared across every `Client` whose
/// builder leaves both untouched, so unrelated clients still reuse one connection
/// pool instead of each opening its own.
static DEFAULT_AGENT: Lazy<Agent> = Lazy::new(|| Agent::new(50, Duration::from_secs(60)));

/// Default API version, per spec section 6.
pub const DEFAULT_API_VERSION: &str = "2016-05-31";

/// A SAS provider callable: given the previous SAS (if any), asynchronously
/// produces a fresh SAS query string. Used by [`SasSource::Refreshing`].
pub type SasProviderFn =
    Arc<dyn Fn() -> Pin<Box<dyn Future<Output = Result<String, String>> + Send>> + Send + Sync>;

/// Exactly one of these is active on a built [`ClientConfig`] — the "exactly one
/// credential is active" invariant from spec section 3.
#[derive(Clone)]
pub enum CredentialSource {
    /// Shared-key auth. Holds the base64-*decoded* key bytes, never the raw string,
    /// per spec section 3's invariant.
    SharedKey(Arc<[u8]>),
    /// A SAS string that never changes for the lifetime of the client.
    StaticSas(String),
    /// A SAS string refreshed on demand by calling `provider`, per spec section 4.2.
    RefreshingSas { provider: SasProviderFn },
    /// No signing at all (public/anonymous access).
    Anonymous,
}

impl std::fmt::Debug for CredentialSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            CredentialSource::SharedKey(_) => "SharedKey",
            CredentialSource::StaticSas(_) => "StaticSas",
            CredentialSource::RefreshingSas { .. } => "RefreshingSas",
            CredentialSource::Anonymous => "Anonymous",
        };
        f.debug_struct("CredentialSource").field("kind", &label).finish()
    }
}

/// Immutable configuration shared by every credential strategy, the executor and
/// the retry loop. Cheap to clone (wrap in `Arc` at the call site) since its only
/// owned heap data is the key bytes / account id / transient code set.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub account_id: String,
    pub credential: CredentialSource,
    pub api_version: String,
    pub client_id: String,
    pub server_timeout: Duration,
    pub client_timeout_delay: Duration,
    pub retries: u32,
    pub delay_factor: Duration,
    pub randomization_factor: f64,
    pub max_delay: Duration,
    pub transient_error_codes: HashSet<String>,
    pub min_sas_auth_expiry: Duration,
    pub max_sockets: usize,
    pub keep_alive: Duration,
    /// The connection-pool agent this client uses — the process-global default
    /// unless the builder was given an explicit one or customized
    /// `max_sockets`/`keep_alive`, per spec section 6.
    pub agent: Agent,
}

impl ClientConfig {
    pub fn builder(account_id: impl Into<String>) -> ClientConfigBuilder {
        ClientConfigBuilder::new(account_id)
    }

    /// The single-attempt client-side deadline: `server_timeout + client_timeout_delay`,
    /// per spec section 4.4.
    pub fn client_timeout(&self) -> Duration {
        self.server_timeout + self.client_timeout_delay
    }
}

/// Builds a [`ClientConfig`], validating required fields and credential exclusivity
/// at [`build`](Self::build) time rather than panicking, per spec section 7
/// ("argument-validation failures … surfaced synchronously before any network I/O").
pub struct ClientConfigBuilder {
    account_id: String,
    access_key: Option<String>,
    sas_token: Option<String>,
    sas_provider: Option<SasProviderFn>,
    anonymous: bool,
    api_version: Option<String>,
    client_id: Option<String>,
    server_timeout: Option<Duration>,
    client_timeout_delay: Option<Duration>,
    retries: Option<u32>,
    delay_factor: Option<Duration>,
    randomization_factor: Option<f64>,
    max_delay: Option<Duration>,
    transient_error_codes: Option<HashSet<String>>,
    min_sas_auth_expiry: Option<Duration>,
    max_sockets: Option<usize>,
    keep_alive: Option<Duration>,
    agent: Option<Agent>,
}

impl ClientConfigBuilder {
    pub fn new(account_id: impl Into<String>) -> Self {
        Self {
            account_id: account_id.into(),
            access_key: None,
            sas_token: None,
            sas_provider: None,
            anonymous: false,
            api_version: None,
            client_id: None,
            server_timeout: None,
            client_timeout_delay: None,
            retries: None,
            delay_factor: None,
            randomization_factor: None,
            max_delay: None,
            transient_error_codes: None,
            min_sas_auth_expiry: None,
            max_sockets: None,
            keep_alive: None,
            agent: None,
        }
    }

    pub fn access_key(mut self, raw_base64_key: impl Into<String>) -> Self {
        self.access_key = Some(raw_base64_key.into());
        self
    }

    pub fn sas_token(mut self, sas: impl Into<String>) -> Self {
        self.sas_token = Some(sas.into());
        self
    }

    pub fn sas_provider(mut self, provider: SasProviderFn) -> Self {
        self.sas_provider = Some(provider);
        self
    }

    pub fn anonymous(mut self) -> Self {
        self.anonymous = true;
        self
    }

    pub fn api_version(mut self, v: impl Into<String>) -> Self {
        self.api_version = Some(v.into());
        self
    }

    pub fn client_id(mut self, id: impl Into<String>) -> Self {
        self.client_id = Some(id.into());
        self
    }

    pub fn server_timeout(mut self, d: Duration) -> Self {
        self.server_timeout = Some(d);
        self
    }

    pub fn client_timeout_delay(mut self, d: Duration) -> Self {
        self.client_timeout_delay = Some(d);
        self
    }

    pub fn retries(mut self, n: u32) -> Self {
        self.retries = Some(n);
        self
    }

    pub fn delay_factor(mut self, d: Duration) -> Self {
        self.delay_factor = Some(d);
        self
    }

    pub fn randomization_factor(mut self, f: f64) -> Self {
        self.randomization_factor = Some(f);
        self
    }

    pub fn max_delay(mut self, d: Duration) -> Self {
        self.max_delay = Some(d);
        self
    }

    pub fn transient_error_codes(mut self, codes: HashSet<String>) -> Self {
        self.transient_error_codes = Some(codes);
        self
    }

    pub fn min_sas_auth_expiry(mut self, d: Duration) -> Self {
        self.min_sas_auth_expiry = Some(d);
        self
    }

    pub fn max_sockets(mut self, n: usize) -> Self {
        self.max_sockets = Some(n);
        self
    }

    pub fn keep_alive(mut self, d: Duration) -> Self {
        self.keep_alive = Some(d);
        self
    }

    /// Supplies an explicit connection-pool [`Agent`] — e.g. one already shared by
    /// other clients — instead of the process-global default, per spec section 6.
    pub fn agent(mut self, agent: Agent) -> Self {
        self.agent = Some(agent);
        self
    }

    /// Validates, applies `AZURE_STORAGE_*` environment overrides (section 6.2), and
    /// produces an immutable [`ClientConfig`].
    pub fn build(self) -> Result<ClientConfig, ConfigError> {
        if self.account_id.is_empty() {
            return Err(ConfigError::MissingField("account_id"));
        }

        let credential_count = [
            self.access_key.is_some(),
            self.sas_token.is_some(),
            self.sas_provider.is_some(),
            self.anonymous,
        ]
        .iter()
        .filter(|set| **set)
        .count();

        let credential = match credential_count {
            0 => return Err(ConfigError::MissingField("access_key | sas_token | sas_provider | anonymous")),
            1 => {
                if let Some(raw) = self.access_key {
                    let decoded = STANDARD.decode(&raw).map_err(|e| ConfigError::InvalidValue {
                        field: "access_key",
                        reason: e.to_string(),
                    })?;
                    CredentialSource::SharedKey(Arc::from(decoded.into_boxed_slice()))
                } else if let Some(sas) = self.sas_token {
                    CredentialSource::StaticSas(sas)
                } else if let Some(provider) = self.sas_provider {
                    CredentialSource::RefreshingSas { provider }
                } else {
                    CredentialSource::Anonymous
                }
            }
            _ => return Err(ConfigError::ConflictingCredentials("more than one of access_key/sas_token/sas_provider/anonymous set")),
        };

        let randomization_factor = env_override_f64("AZURE_STORAGE_RANDOMIZATION_FACTOR")
            .or(self.randomization_factor)
            .unwrap_or(0.25);
        if !(0.0..=1.0).contains(&randomization_factor) {
            return Err(ConfigError::InvalidValue {
                field: "randomization_factor",
                reason: "must be within [0.0, 1.0]".to_string(),
            });
        }

        let env_max_sockets = env_override_usize("AZURE_STORAGE_MAX_SOCKETS");
        let max_sockets = env_max_sockets.or(self.max_sockets).unwrap_or(50);
        let keep_alive = self.keep_alive.unwrap_or(Duration::from_secs(60));

        // An explicit Agent wins outright. Otherwise, share the process-global
        // default only if the caller never customized max_sockets/keep_alive via
        // the builder *or* the env override — customizing either means this
        // client wants its own pool, per spec section 6's "agent (defaults to a
        // process-global Agent instance)".
        let customized_pool = self.max_sockets.is_some() || self.keep_alive.is_some() || env_max_sockets.is_some();
        let agent = match self.agent {
            Some(agent) => agent,
            None if !customized_pool => DEFAULT_AGENT.clone(),
            None => Agent::new(max_sockets, keep_alive),
        };

        Ok(ClientConfig {
            account_id: self.account_id,
            credential,
            api_version: self.api_version.unwrap_or_else(|| DEFAULT_API_VERSION.to_string()),
            client_id: self.client_id.unwrap_or_default(),
            server_timeout: env_override_duration_secs("AZURE_STORAGE_TIMEOUT_SECS")
                .or(self.server_timeout)
                .unwrap_or(Duration::from_secs(30)),
            client_timeout_delay: env_override_duration_ms("AZURE_STORAGE_CLIENT_TIMEOUT_DELAY_MS")
                .or(self.client_timeout_delay)
                .unwrap_or(Duration::from_millis(500)),
            retries: env_override_u32("AZURE_STORAGE_RETRIES")
                .or(self.retries)
                .unwrap_or(5),
            delay_factor: env_override_duration_ms("AZURE_STORAGE_DELAY_FACTOR_MS")
                .or(self.delay_factor)
                .unwrap_or(Duration::from_millis(100)),
            randomization_factor,
            max_delay: env_override_duration_ms("AZURE_STORAGE_MAX_DELAY_MS")
                .or(self.max_delay)
                .unwrap_or(Duration::from_secs(30)),
            transient_error_codes: self
                .transient_error_codes
                .unwrap_or_else(default_transient_error_codes),
            min_sas_auth_expiry: self.min_sas_auth_expiry.unwrap_or(Duration::from_secs(15 * 60)),
            max_sockets,
            keep_alive,
            agent,
        })
    }
}

fn env_override_u32(key: &str) -> Option<u32> {
    std::env::var(key).ok().and_then(|v| v.parse().ok())
}

fn env_override_usize(key: &str) -> Option<usize> {
    std::env::var(key).ok().and_then(|v| v.parse().ok())
}

fn env_override_f64(key: &str) -> Option<f64> {
    std::env::var(key).ok().and_then(|v| v.parse().ok())
}

fn env_override_duration_ms(key: &str) -> Option<Duration> {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse::<u64>().ok())
        .map(Duration::from_millis)
}

fn env_override_duration_secs(key: &str) -> Option<Duration> {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse::<u64>().ok())
        .map(Duration::from_secs)
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Serializes tests that touch process-wide state (env vars, the shared
    /// `DEFAULT_AGENT`) so `cargo test`'s default multi-threaded runner can't
    /// interleave one test's env mutation with another's default-value assertion.
    static PROCESS_STATE_LOCK: std::sync::Mutex<()> = std::sync::Mutex::new(());

    fn lock_process_state() -> std::sync::MutexGuard<'static, ()> {
        PROCESS_STATE_LOCK.lock().unwrap_or_else(|e| e.into_inner())
    }

    #[test]
    fn requires_account_id() {
        let err = ClientConfigBuilder::new("").anonymous().build().unwrap_err();
        assert!(matches!(err, ConfigError::MissingField("account_id")));
    }

    #[test]
    fn requires_exactly_one_credential() {
        let err = ClientConfigBuilder::new("acct").build().unwrap_err();
        assert!(matches!(err, ConfigError::MissingField(_)));

        let err = ClientConfigBuilder::new("acct")
            .anonymous()
            .sas_token("sv=2016-05-31")
            .build()
            .unwrap_err();
        assert!(matches!(err, ConfigError::ConflictingCredentials(_)));
    }

    #[test]
    fn shared_key_stores_decoded_bytes_not_raw_string() {
        let cfg = ClientConfigBuilder::new("acct")
            .access_key("a2V5") // base64("key")
            .build()
            .unwrap();
        match cfg.credential {
            CredentialSource::SharedKey(bytes) => assert_eq!(&*bytes, b"key"),
            _ => panic!("expected SharedKey"),
        }
    }

    #[test]
    fn defaults_match_spec() {
        let cfg = ClientConfigBuilder::new("acct").anonymous().build().unwrap();
        assert_eq!(cfg.api_version, DEFAULT_API_VERSION);
        assert_eq!(cfg.retries, 5);
        assert_eq!(cfg.delay_factor, Duration::from_millis(100));
        assert_eq!(cfg.max_delay, Duration::from_secs(30));
        assert_eq!(cfg.randomization_factor, 0.25);
        assert_eq!(cfg.server_timeout, Duration::from_secs(30));
        assert_eq!(cfg.client_timeout_delay, Duration::from_millis(500));
        assert_eq!(cfg.max_sockets, 50);
    }

    #[tokio::test]
    async fn unconfigured_clients_share_the_process_global_agent() {
        let a = ClientConfigBuilder::new("acct").anonymous().build().unwrap();
        let b = ClientConfigBuilder::new("other").anonymous().build().unwrap();

        let lease = a.agent.acquire("host").await;
        assert_eq!(b.agent.in_use_total().await, 1);
        drop(lease);
    }

    #[tokio::test]
    async fn customizing_max_sockets_opts_out_of_the_shared_agent() {
        let default_client = ClientConfigBuilder::new("acct").anonymous().build().unwrap();
        let custom = ClientConfigBuilder::new("acct")
            .anonymous()
            .max_sockets(10)
            .build()
            .unwrap();

        let lease = custom.agent.acquire("host").await;
        assert_eq!(default_client.agent.in_use_total().await, 0);
        drop(lease);
    }

    #[tokio::test]
    async fn env_override_alone_also_opts_out_of_the_shared_agent() {
        // SAFETY: this test mutates process-wide env state; the crate's test
        // binaries run single-threaded per the harness default for `#[tokio::test]`,
        // but guard against interleaving by clearing the var immediately after use.
        std::env::set_var("AZURE_STORAGE_MAX_SOCKETS", "7");
        let cfg = ClientConfigBuilder::new("acct").anonymous().build().unwrap();
        std::env::remove_var("AZURE_STORAGE_MAX_SOCKETS");

        assert_eq!(cfg.max_sockets, 7);
        let lease = cfg.agent.acquire("host").await;
        assert_eq!(cfg.agent.in_use_total().await, 1);
        drop(lease);

        let default_client = ClientConfigBuilder::new("acct").anonymous().build().unwrap();
        assert_eq!(default_client.agent.in_use_total().await, 0);
    }
}
