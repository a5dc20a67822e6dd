use std::path::PathBuf;
use std::sync::Arc;

use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use super::rules;
use crate::config::{Config, ConfigError};
use crate::exec::{CommandExecutor, ExecError, SystemExecutor};
use crate::store::{ExpiringStore, StoreEvent};

/// Jump target used when the caller does not supply one.
pub const DEFAULT_TARGET: &str = "ACCEPT";

/// Controller event channel capacity.
const EVENT_CAPACITY: usize = 64;

/// Notification emitted by the controller.
#[derive(Debug, Clone)]
pub enum Event {
    /// A host lease lapsed; the entry was removed and a rebuild attempted.
    Expired {
        /// The expired host.
        host: String,
    },
    /// Internal store fault. The controller keeps running.
    Fault(String),
}

/// Caching front-end over one packet-filter chain.
///
/// The controller assumes exclusive ownership of the configured chain:
/// nothing else appends to or flushes it while a controller instance is
/// alive, and the controller never reads the live rules back. Its stores
/// are the single source of truth.
///
/// Callers are expected to serialize operations on a given key. Overlapping
/// calls for the same key are not corrupted, since every rebuild re-derives
/// the full chain from final store state, but may cost a redundant
/// flush/rebuild cycle.
///
/// Must be created within a Tokio runtime (the expiry listener and the host
/// store's sweep run as spawned tasks; both stop when the controller is
/// dropped).
pub struct Controller {
    inner: Arc<Inner>,
    expiry_task: JoinHandle<()>,
}

struct Inner {
    config: Config,
    tool: PathBuf,
    hosts: ExpiringStore,
    interfaces: ExpiringStore,
    executor: Arc<dyn CommandExecutor>,
    events: broadcast::Sender<Event>,
}

impl Controller {
    /// Create a controller with the given executor.
    ///
    /// Fails if the configuration is invalid. Issues no commands: the chain
    /// is assumed empty (or about to be flushed by the caller).
    pub fn new(config: Config, executor: Arc<dyn CommandExecutor>) -> Result<Self, ConfigError> {
        config.validate()?;

        let hosts = ExpiringStore::new(config.ttl());
        let interfaces = ExpiringStore::never_expiring();
        let store_events = hosts.subscribe();
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        let tool = config.effective_tool_path();

        info!(
            chain = %config.chain,
            family = ?config.family,
            tool = %tool.display(),
            ttl_secs = config.ttl_secs,
            "controller created"
        );

        let inner = Arc::new(Inner {
            config,
            tool,
            hosts,
            interfaces,
            executor,
            events,
        });
        let expiry_task = spawn_expiry_listener(&inner, store_events);

        Ok(Self { inner, expiry_task })
    }

    /// Create a controller that spawns the real rule-table tool.
    pub fn with_system_executor(config: Config) -> Result<Self, ConfigError> {
        Self::new(config, Arc::new(SystemExecutor::new()))
    }

    /// Add a source-host jump rule.
    ///
    /// Issues one incremental append if the host is not currently tracked;
    /// a re-add only refreshes the store entry (target bookkeeping and TTL),
    /// assuming the existing live rule is still in place. Changing a known
    /// host's target therefore does NOT retract the old rule; callers who
    /// need to retarget must remove and re-add, forcing a rebuild.
    ///
    /// The host is not pre-validated; an address the configured family
    /// rejects surfaces as the tool's own error.
    pub async fn add_host(&self, host: &str, target: &str) -> Result<(), ExecError> {
        if self.inner.hosts.contains(host) {
            debug!(host, target, "host already tracked, refreshing lease");
        } else {
            self.inner
                .run(rules::append_host(&self.inner.config.chain, host, target))
                .await?;
            info!(host, target, chain = %self.inner.config.chain, "host rule appended");
        }

        self.inner.hosts.set(host, target);
        Ok(())
    }

    /// Add an incoming-interface jump rule. Interface entries never expire.
    pub async fn add_interface(&self, iface: &str, target: &str) -> Result<(), ExecError> {
        if self.inner.interfaces.contains(iface) {
            debug!(iface, target, "interface already tracked");
        } else {
            self.inner
                .run(rules::append_interface(
                    &self.inner.config.chain,
                    iface,
                    target,
                ))
                .await?;
            info!(iface, target, chain = %self.inner.config.chain, "interface rule appended");
        }

        self.inner.interfaces.set(iface, target);
        Ok(())
    }

    /// Remove a host and rebuild the chain.
    ///
    /// Returns `Ok(false)` without issuing any command when the host is not
    /// tracked. Otherwise the store entry is removed first (it stays gone
    /// even if the rebuild then fails) and the result mirrors the rebuild:
    /// `Ok(true)` on a full rebuild, `Ok(false)` when the flush failed (live
    /// chain unchanged, now diverged from desired state until the next
    /// successful rebuild), `Err` when an append failed mid-rebuild.
    pub async fn remove_host(&self, host: &str) -> Result<bool, ExecError> {
        if !self.inner.hosts.remove(host) {
            return Ok(false);
        }

        info!(host, chain = %self.inner.config.chain, "host removed, rebuilding chain");
        self.inner.rebuild().await
    }

    /// Remove an interface and rebuild the chain. Same contract as
    /// [`remove_host`](Self::remove_host).
    pub async fn remove_interface(&self, iface: &str) -> Result<bool, ExecError> {
        if !self.inner.interfaces.remove(iface) {
            return Ok(false);
        }

        info!(iface, chain = %self.inner.config.chain, "interface removed, rebuilding chain");
        self.inner.rebuild().await
    }

    /// Refresh a host's lease.
    ///
    /// Re-adds with the stored target when the host is known, or performs a
    /// fresh add with [`DEFAULT_TARGET`] when it is not (including when its
    /// lease already lapsed).
    pub async fn keep_alive(&self, host: &str) -> Result<(), ExecError> {
        let target = self
            .inner
            .hosts
            .get(host)
            .unwrap_or_else(|| DEFAULT_TARGET.to_string());
        self.add_host(host, &target).await
    }

    /// Flush every rule in the chain. Propagates tool failure; callers that
    /// want best-effort semantics ignore the result.
    pub async fn flush(&self) -> Result<(), ExecError> {
        self.inner.flush().await
    }

    /// Flush the chain and drop all host entries.
    ///
    /// Interface entries are intentionally kept: interfaces are static
    /// infrastructure, unlike transient host bans. Re-render them with
    /// [`rebuild`](Self::rebuild) if needed.
    pub async fn flush_all(&self) -> Result<(), ExecError> {
        self.inner.flush().await?;
        self.inner.hosts.clear();
        info!(chain = %self.inner.config.chain, "chain flushed, host entries cleared");
        Ok(())
    }

    /// Atomically replace the live chain with a fresh rendering of the
    /// stores: one flush, then one append per host entry and one per
    /// interface entry, in store order.
    ///
    /// Flush failure is swallowed into `Ok(false)` because rebuilds also
    /// run on the background expiry path where no caller can catch an
    /// error. An append failure propagates and leaves the chain partially
    /// rebuilt; it is not retried.
    pub async fn rebuild(&self) -> Result<bool, ExecError> {
        self.inner.rebuild().await
    }

    /// Subscribe to [`Event`] notifications.
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.inner.events.subscribe()
    }

    /// The chain this controller owns.
    pub fn chain(&self) -> &str {
        &self.inner.config.chain
    }

    /// Number of live host entries.
    pub fn host_count(&self) -> usize {
        self.inner.hosts.len()
    }

    /// Number of interface entries.
    pub fn interface_count(&self) -> usize {
        self.inner.interfaces.len()
    }

    /// Snapshot of (host, target) pairs in insertion order.
    pub fn hosts(&self) -> Vec<(String, String)> {
        self.inner.hosts.entries()
    }

    /// Snapshot of (interface, target) pairs in insertion order.
    pub fn interfaces(&self) -> Vec<(String, String)> {
        self.inner.interfaces.entries()
    }
}

impl Drop for Controller {
    fn drop(&mut self) {
        self.expiry_task.abort();
    }
}

impl Inner {
    async fn run(&self, args: Vec<String>) -> Result<(), ExecError> {
        self.executor.run(&self.tool, &args).await
    }

    async fn flush(&self) -> Result<(), ExecError> {
        self.run(rules::flush(&self.config.chain)).await
    }

    async fn rebuild(&self) -> Result<bool, ExecError> {
        if let Err(err) = self.flush().await {
            warn!(error = %err, chain = %self.config.chain, "flush failed, chain not rebuilt");
            return Ok(false);
        }

        // Appends are serialized so the rebuilt chain matches store order.
        // Concurrent issuance would be faster but the tool gives no FIFO
        // guarantee across invocations.
        for (host, target) in self.hosts.entries() {
            self.run(rules::append_host(&self.config.chain, &host, &target))
                .await?;
        }
        for (iface, target) in self.interfaces.entries() {
            self.run(rules::append_interface(&self.config.chain, &iface, &target))
                .await?;
        }

        debug!(
            chain = %self.config.chain,
            hosts = self.hosts.len(),
            interfaces = self.interfaces.len(),
            "chain rebuilt"
        );
        Ok(true)
    }
}

/// Route the host store's sweep notifications: an expired host triggers the
/// same rebuild a removal would, then the event is forwarded to controller
/// subscribers. Nothing on this path is ever thrown into caller code.
fn spawn_expiry_listener(
    inner: &Arc<Inner>,
    mut events: broadcast::Receiver<StoreEvent>,
) -> JoinHandle<()> {
    let weak = Arc::downgrade(inner);

    tokio::spawn(async move {
        loop {
            let event = match events.recv().await {
                Ok(event) => event,
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(skipped, "expiry listener lagged, notifications dropped");
                    continue;
                }
                Err(broadcast::error::RecvError::Closed) => break,
            };

            let Some(inner) = weak.upgrade() else { break };

            match event {
                StoreEvent::Expired { key } => {
                    info!(host = %key, chain = %inner.config.chain, "host lease expired, rebuilding chain");
                    match inner.rebuild().await {
                        Ok(true) => {}
                        Ok(false) => {
                            warn!(host = %key, "rebuild after expiry skipped: flush failed");
                        }
                        Err(err) => {
                            error!(host = %key, error = %err, "rebuild after expiry failed");
                        }
                    }
                    let _ = inner.events.send(Event::Expired { host: key });
                }
                StoreEvent::Fault(message) => {
                    error!(%message, "store fault");
                    let _ = inner.events.send(Event::Fault(message));
                }
            }
        }
    })
}
