//! Bounded pool of adapters for one OLT.
//!
//! A session serves one operation at a time, so concurrent work against the
//! same OLT checks out separate adapters. The pool caps how many sessions
//! are open at once and keeps returned ones for reuse.
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use oltlink::{AdapterConfig, AdapterFactory, AdapterPool, PoolConfig};
//! use secrecy::SecretString;
//!
//! # async fn example() -> oltlink::Result<()> {
//! let config = AdapterConfig::new("10.0.0.1", "admin", SecretString::from("secret"));
//! let pool = AdapterPool::new(Arc::new(AdapterFactory::new()), "zte", config, PoolConfig::default());
//!
//! let mut adapter = pool.checkout().await?;
//! let onts = adapter.get_ont_list(None).await?;
//! println!("{} ONTs", onts.len());
//! # Ok(())
//! # }
//! ```

use std::ops::{Deref, DerefMut};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use log::{debug, warn};
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

use crate::adapter::{AdapterConfig, OltAdapter};
use crate::error::{Error, Result, TransportError};
use crate::factory::AdapterFactory;

/// Pool sizing.
#[derive(Debug, Clone)]
pub struct PoolConfig {
    /// Most adapters checked out at once.
    pub max_size: usize,
    /// How long [`AdapterPool::checkout`] waits for a free slot.
    pub checkout_timeout: Duration,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_size: 4,
            checkout_timeout: Duration::from_secs(30),
        }
    }
}

impl PoolConfig {
    pub fn with_max_size(mut self, max_size: usize) -> Self {
        self.max_size = max_size;
        self
    }

    pub fn with_checkout_timeout(mut self, timeout: Duration) -> Self {
        self.checkout_timeout = timeout;
        self
    }
}

struct Shared {
    factory: Arc<AdapterFactory>,
    vendor: String,
    config: AdapterConfig,
    pool: PoolConfig,
    permits: Arc<Semaphore>,
    idle: Mutex<Vec<Box<dyn OltAdapter>>>,
}

impl Shared {
    fn pop_idle(&self) -> Option<Box<dyn OltAdapter>> {
        self.idle.lock().ok().and_then(|mut idle| idle.pop())
    }
}

/// Adapters for one OLT, at most [`PoolConfig::max_size`] in use at once.
///
/// Cloning is cheap and clones share the same pool.
#[derive(Clone)]
pub struct AdapterPool {
    shared: Arc<Shared>,
}

impl AdapterPool {
    pub fn new(
        factory: Arc<AdapterFactory>,
        vendor: impl Into<String>,
        config: AdapterConfig,
        pool: PoolConfig,
    ) -> Self {
        let permits = Arc::new(Semaphore::new(pool.max_size));
        Self {
            shared: Arc::new(Shared {
                factory,
                vendor: vendor.into(),
                config,
                pool,
                permits,
                idle: Mutex::new(Vec::new()),
            }),
        }
    }

    /// Take a connected adapter, waiting up to the checkout timeout for a
    /// free slot.
    ///
    /// Idle adapters that fail the liveness probe are disconnected and
    /// dropped; when none is left a new one is created and connected.
    pub async fn checkout(&self) -> Result<PooledAdapter> {
        let shared = &self.shared;
        let started = Instant::now();

        let permit = match tokio::time::timeout(
            shared.pool.checkout_timeout,
            shared.permits.clone().acquire_owned(),
        )
        .await
        {
            Ok(Ok(permit)) => permit,
            Ok(Err(_)) | Err(_) => {
                warn!(
                    "No {} session to {} free after {:?}",
                    shared.vendor,
                    shared.config.host,
                    started.elapsed()
                );
                return Err(Error::PoolExhausted {
                    capacity: shared.pool.max_size,
                    waited: started.elapsed(),
                });
            }
        };

        while let Some(mut adapter) = shared.pop_idle() {
            if adapter.is_connected().await {
                debug!("Reusing idle session to {}", shared.config.host);
                return Ok(PooledAdapter::new(adapter, permit, shared.clone()));
            }
            debug!("Dropping stale idle session to {}", shared.config.host);
            adapter.disconnect().await;
        }

        let mut adapter = shared
            .factory
            .create_adapter(&shared.vendor, shared.config.clone())?;
        if !adapter.connect().await {
            return Err(Error::Connection(TransportError::NotConnected));
        }
        debug!("Opened pooled session to {}", shared.config.host);
        Ok(PooledAdapter::new(adapter, permit, shared.clone()))
    }

    /// Adapters waiting for reuse.
    pub fn idle_count(&self) -> usize {
        self.shared.idle.lock().map(|idle| idle.len()).unwrap_or(0)
    }

    /// Slots free for checkout right now.
    pub fn available(&self) -> usize {
        self.shared.permits.available_permits()
    }
}

impl std::fmt::Debug for AdapterPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdapterPool")
            .field("vendor", &self.shared.vendor)
            .field("host", &self.shared.config.host)
            .field("max_size", &self.shared.pool.max_size)
            .field("available", &self.available())
            .field("idle", &self.idle_count())
            .finish()
    }
}

/// A checked-out adapter. Returns to the pool on drop.
pub struct PooledAdapter {
    adapter: Option<Box<dyn OltAdapter>>,
    shared: Arc<Shared>,
    _permit: OwnedSemaphorePermit,
}

impl PooledAdapter {
    fn new(adapter: Box<dyn OltAdapter>, permit: OwnedSemaphorePermit, shared: Arc<Shared>) -> Self {
        Self {
            adapter: Some(adapter),
            shared,
            _permit: permit,
        }
    }

    /// Drop the adapter instead of returning it, e.g. after a command got
    /// stuck. The slot is freed; the next checkout opens a new session.
    pub fn discard(mut self) {
        if let Some(adapter) = self.adapter.take() {
            debug!("Discarding pooled session to {}", adapter.host());
        }
    }
}

impl Deref for PooledAdapter {
    type Target = dyn OltAdapter;

    fn deref(&self) -> &Self::Target {
        match self.adapter {
            Some(ref adapter) => &**adapter,
            None => unreachable!("adapter is only taken on discard or drop"),
        }
    }
}

impl DerefMut for PooledAdapter {
    fn deref_mut(&mut self) -> &mut Self::Target {
        match self.adapter {
            Some(ref mut adapter) => &mut **adapter,
            None => unreachable!("adapter is only taken on discard or drop"),
        }
    }
}

impl Drop for PooledAdapter {
    fn drop(&mut self) {
        if let Some(adapter) = self.adapter.take() {
            if let Ok(mut idle) = self.shared.idle.lock() {
                idle.push(adapter);
            }
        }
    }
}

impl std::fmt::Debug for PooledAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PooledAdapter")
            .field("vendor", &self.shared.vendor)
            .field("host", &self.shared.config.host)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use secrecy::SecretString;

    use super::*;
    use crate::error::ErrorKind;
    use crate::testing::MockTransport;
    use crate::transport::Protocol;
    use crate::vendors::zte::ZteAdapter;

    /// A factory whose `mock` vendor runs over in-memory transports.
    fn mock_factory(created: Arc<AtomicUsize>, reachable: bool) -> Arc<AdapterFactory> {
        let mut factory = AdapterFactory::empty();
        factory.register_adapter("mock", Protocol::Telnet, move |config: AdapterConfig| {
            created.fetch_add(1, Ordering::SeqCst);
            let (transport, handle) = MockTransport::new("ZXAN#");
            if !reachable {
                handle.fail_next_opens(usize::MAX);
            }
            Ok(Box::new(ZteAdapter::with_transport(config, Box::new(transport))?) as Box<dyn OltAdapter>)
        });
        Arc::new(factory)
    }

    fn config() -> AdapterConfig {
        AdapterConfig::new("192.0.2.20", "admin", SecretString::from("secret"))
            .with_option("command_delay_ms", "5")
    }

    fn pool_config() -> PoolConfig {
        PoolConfig::default()
            .with_max_size(1)
            .with_checkout_timeout(Duration::from_millis(50))
    }

    #[tokio::test]
    async fn test_exhausted_pool_times_out() {
        let created = Arc::new(AtomicUsize::new(0));
        let pool = AdapterPool::new(mock_factory(created, true), "mock", config(), pool_config());

        let held = pool.checkout().await.unwrap();
        assert_eq!(pool.available(), 0);

        let err = pool.checkout().await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::PoolExhausted);
        assert!(matches!(err, Error::PoolExhausted { capacity: 1, .. }));
        drop(held);
        assert_eq!(pool.available(), 1);
    }

    #[tokio::test]
    async fn test_checked_in_adapter_is_reused() {
        let created = Arc::new(AtomicUsize::new(0));
        let pool = AdapterPool::new(
            mock_factory(created.clone(), true),
            "mock",
            config(),
            pool_config(),
        );

        {
            let adapter = pool.checkout().await.unwrap();
            assert_eq!(adapter.vendor(), "zte");
        }
        assert_eq!(pool.idle_count(), 1);

        let adapter = pool.checkout().await.unwrap();
        assert_eq!(pool.idle_count(), 0);
        assert_eq!(created.load(Ordering::SeqCst), 1);

        adapter.discard();
        assert_eq!(pool.idle_count(), 0);
        assert_eq!(pool.available(), 1);

        let _fresh = pool.checkout().await.unwrap();
        assert_eq!(created.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_unreachable_olt_is_connection_error() {
        let created = Arc::new(AtomicUsize::new(0));
        let pool = AdapterPool::new(mock_factory(created, false), "mock", config(), pool_config());

        let err = pool.checkout().await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Connection);
        assert_eq!(pool.available(), 1);
        assert_eq!(pool.idle_count(), 0);
    }

    #[tokio::test]
    async fn test_unknown_vendor_fails_checkout() {
        let pool = AdapterPool::new(Arc::new(AdapterFactory::new()), "nokia", config(), pool_config());
        let err = pool.checkout().await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnsupportedVendor);
    }
}
