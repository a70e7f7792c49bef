//! Connection pool / agent, per spec section 4.3.
//!
//! `reqwest`/`hyper` already own the real TLS handshake and socket keep-alive (see
//! `src/executor.rs`), and expose no hook to introspect idle-socket lifetime or
//! per-host in-use counts. The Agent therefore models the spec's *admission
//! control* contract — total outstanding requests bounded by `max_sockets`, FIFO
//! fairness with host-matching preference, no cross-host lease reuse — as an
//! explicit permit ledger layered in front of one shared `reqwest::Client`,
//! grounded on the "build the transport stack once, share it" shape of `Pipeline`
//! in `examples/other_examples/f21b51d8_hanhossain-azure-sdk-for-rust__sdk-storage-src-clients-storage_client.rs.rs`.
//! See `DESIGN.md` → Open Questions for why this split was chosen over hand-rolling
//! raw socket pooling.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::oneshot;
use tracing::trace;

/// Tracks, per host, how many leases are currently checked out. Idle-socket
/// eviction after `keep_alive` is delegated to `reqwest`'s own pool
/// (`pool_idle_timeout`), configured from the same value this struct is built
/// with, so the *cap* enforced here and the *keep-alive* enforced by `reqwest`
/// stay consistent with one `ClientConfig`.
#[derive(Default, Debug)]
struct AgentState {
    in_use_total: usize,
    in_use_per_host: HashMap<String, usize>,
    /// FIFO queue of borrowers waiting for a permit, each tagged with the host
    /// they want and a unique id so a cancelled waiter can find and remove its own
    /// entry. Dequeue scans for a host match first (fairness across hosts),
    /// falling back to the oldest waiter of any host, per spec section 4.3.
    pending: VecDeque<(u64, String, oneshot::Sender<()>)>,
    next_waiter_id: u64,
}

/// A held connection-pool permit. Releases its slot to the next matching waiter
/// (or the oldest waiter of any host) when dropped.
pub struct Lease {
    agent: Arc<AgentInner>,
    host: String,
}

impl Drop for Lease {
    fn drop(&mut self) {
        self.agent.release(&self.host);
    }
}

/// Removes a queued waiter's entry if `acquire()` is cancelled before it receives
/// a permit. Disarmed with `mem::forget` once the waiter is actually woken.
struct CancelOnDrop<'a> {
    agent: &'a AgentInner,
    id: u64,
}

impl Drop for CancelOnDrop<'_> {
    fn drop(&mut self) {
        self.agent.cancel_waiter(self.id);
    }
}

#[derive(Debug)]
struct AgentInner {
    max_sockets: usize,
    state: Mutex<AgentState>,
}

impl AgentInner {
    /// Synchronous so [`Lease`]'s `Drop` impl can release its permit directly,
    /// without spawning onto a Tokio runtime that may not be running (e.g. a
    /// `Lease` dropped during executor/runtime shutdown).
    fn release(&self, host: &str) {
        let mut state = self.state.lock().expect("agent state mutex poisoned");
        state.in_use_total = state.in_use_total.saturating_sub(1);
        if let Some(count) = state.in_use_per_host.get_mut(host) {
            *count = count.saturating_sub(1);
        }
        trace!(host, in_use_total = state.in_use_total, "released lease");

        // Prefer waking a waiter for the host that just freed up, per spec section
        // 4.3's "dequeue scans for matching-host waiters first".
        if let Some(pos) = state.pending.iter().position(|(_, h, _)| h == host) {
            let (_, h, tx) = state.pending.remove(pos).unwrap();
            state.in_use_total += 1;
            *state.in_use_per_host.entry(h.clone()).or_insert(0) += 1;
            trace!(host = %h, "woke matching-host waiter");
            let _ = tx.send(());
            return;
        }

        if let Some((_, h, tx)) = state.pending.pop_front() {
            state.in_use_total += 1;
            *state.in_use_per_host.entry(h.clone()).or_insert(0) += 1;
            trace!(host = %h, "woke oldest waiter of any host");
            let _ = tx.send(());
        }
    }

    /// Removes a still-queued waiter by id, for a caller whose `acquire()` was
    /// cancelled (e.g. by `tokio::time::timeout`) before a permit reached it. If the
    /// id is no longer present, `release()` already popped it and granted the
    /// permit concurrently with the cancellation — nothing to clean up here.
    fn cancel_waiter(&self, id: u64) {
        let mut state = self.state.lock().expect("agent state mutex poisoned");
        if let Some(pos) = state.pending.iter().position(|(waiter_id, _, _)| *waiter_id == id) {
            state.pending.remove(pos);
            trace!(id, "removed cancelled waiter from the queue");
        }
    }
}

/// The connection pool / admission-control agent. One instance is normally shared
/// process-wide (spec section 6: "agent (defaults to a process-global Agent
/// instance)"), but a client may own a dedicated one.
#[derive(Clone, Debug)]
pub struct Agent {
    inner: Arc<AgentInner>,
    client: reqwest::Client,
}

impl Agent {
    pub fn new(max_sockets: usize, keep_alive: Duration) -> Self {
        let client = reqwest::Client::builder()
            .pool_max_idle_per_host(max_sockets)
            .pool_idle_timeout(keep_alive)
            .build()
            .expect("TLS backend initialization must succeed");

        Self {
            inner: Arc::new(AgentInner {
                max_sockets,
                state: Mutex::new(AgentState::default()),
            }),
            client,
        }
    }

    /// The shared `reqwest::Client` executors issue requests through. Never
    /// rebuilt per request — that would defeat connection reuse.
    pub fn http_client(&self) -> &reqwest::Client {
        &self.client
    }

    /// Acquires a permit for `host`, queueing FIFO behind other borrowers if the
    /// pool is saturated, per spec section 4.3.
    ///
    /// Cancellation-safe: if this future is dropped while still queued (e.g. a
    /// caller wrapping the whole attempt in `tokio::time::timeout`), the queued
    /// waiter entry is removed so the permit it would have received isn't lost.
    pub async fn acquire(&self, host: &str) -> Lease {
        let waiter = {
            let mut state = self.inner.state.lock().expect("agent state mutex poisoned");
            if state.in_use_total < self.inner.max_sockets {
                state.in_use_total += 1;
                *state.in_use_per_host.entry(host.to_string()).or_insert(0) += 1;
                trace!(host, in_use_total = state.in_use_total, "acquired lease immediately");
                None
            } else {
                let (tx, rx) = oneshot::channel();
                let id = state.next_waiter_id;
                state.next_waiter_id += 1;
                state.pending.push_back((id, host.to_string(), tx));
                trace!(host, pending = state.pending.len(), "queued for a lease");
                Some((id, rx))
            }
        };

        if let Some((id, rx)) = waiter {
            let guard = CancelOnDrop {
                agent: &self.inner,
                id,
            };
            let _ = rx.await;
            // Reached only if `rx` resolved (woken by `release()`), never on
            // cancellation — disarm so the guard's `Drop` doesn't remove an entry
            // `release()` already took out of the queue.
            std::mem::forget(guard);
        }

        Lease {
            agent: self.inner.clone(),
            host: host.to_string(),
        }
    }

    pub async fn in_use_total(&self) -> usize {
        self.inner.state.lock().expect("agent state mutex poisoned").in_use_total
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lease_drop_releases_synchronously_without_a_tokio_runtime() {
        let rt = tokio::runtime::Runtime::new().unwrap();
        let agent = rt.block_on(async { Agent::new(1, Duration::from_secs(60)) });
        let lease = rt.block_on(agent.acquire("host"));
        drop(rt);

        // No Tokio runtime is current here; releasing must not rely on `tokio::spawn`.
        drop(lease);

        let rt2 = tokio::runtime::Runtime::new().unwrap();
        assert_eq!(rt2.block_on(agent.in_use_total()), 0);
    }

    #[tokio::test]
    async fn admits_up_to_max_sockets_without_queueing() {
        let agent = Agent::new(2, Duration::from_secs(60));
        let l1 = agent.acquire("a").await;
        let l2 = agent.acquire("b").await;
        assert_eq!(agent.in_use_total().await, 2);
        drop(l1);
        drop(l2);
    }

    #[tokio::test]
    async fn queued_borrower_proceeds_once_a_permit_frees_up() {
        let agent = Agent::new(1, Duration::from_secs(60));
        let l1 = agent.acquire("host-a").await;

        let agent_clone = agent.clone();
        let waiter = tokio::spawn(async move {
            let _lease = agent_clone.acquire("host-b").await;
        });

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!waiter.is_finished());

        drop(l1);
        tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .expect("waiter should complete once a permit frees up")
            .unwrap();
    }

    #[tokio::test]
    async fn cancelled_queued_waiter_does_not_leak_a_permit() {
        let agent = Agent::new(1, Duration::from_secs(60));
        let l1 = agent.acquire("host-a").await;

        {
            let agent_clone = agent.clone();
            let acquire_fut = agent_clone.acquire("host-b");
            tokio::pin!(acquire_fut);
            // Cancel the queued acquire before it ever receives a permit, the way
            // `tokio::time::timeout` would when the attempt it wraps times out.
            tokio::time::timeout(Duration::from_millis(10), &mut acquire_fut)
                .await
                .expect_err("should still be queued and time out");
        }

        drop(l1);

        // The cancelled waiter's entry must be gone — a fresh acquire should be
        // admitted immediately rather than queueing behind a dead entry.
        let l2 = tokio::time::timeout(Duration::from_millis(50), agent.acquire("host-c"))
            .await
            .expect("fresh acquire should not be stuck behind the cancelled waiter");
        assert_eq!(agent.in_use_total().await, 1);
        drop(l2);
    }

    #[tokio::test]
    async fn matching_host_waiter_is_preferred_on_release() {
        let agent = Agent::new(1, Duration::from_secs(60));
        let l1 = agent.acquire("host-a").await;

        let agent_clone = agent.clone();
        let other_host = tokio::spawn(async move {
            let _lease = agent_clone.acquire("host-other").await;
            tokio::time::sleep(Duration::from_millis(200)).await;
        });
        tokio::time::sleep(Duration::from_millis(10)).await;

        let agent_clone = agent.clone();
        let same_host_order = Arc::new(tokio::sync::Mutex::new(Vec::new()));
        let order_clone = same_host_order.clone();
        let same_host = tokio::spawn(async move {
            let _lease = agent_clone.acquire("host-a").await;
            order_clone.lock().await.push("host-a");
        });
        tokio::time::sleep(Duration::from_millis(10)).await;

        drop(l1);

        tokio::time::timeout(Duration::from_secs(1), same_host)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(*same_host_order.lock().await, vec!["host-a"]);

        other_host.abort();
    }
}
