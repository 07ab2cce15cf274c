//! Bounded pool of reusable browser drivers.
//!
//! Launching Chrome takes seconds, so drivers are kept on a free list and
//! handed out again once a request is done with them. The pool never holds
//! more than `capacity` drivers; callers beyond that wait for a slot.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use serde::Serialize;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tracing::{debug, info, warn};

use crate::driver::{Driver, DriverFactory, DriverPage};
use crate::{Result, ScrapeError};

/// Configuration for the driver pool.
#[derive(Debug, Clone)]
pub struct PoolConfig {
    /// Maximum number of drivers alive at once.
    pub capacity: usize,
    /// How long `acquire` waits for a free slot.
    pub acquire_timeout: Duration,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            capacity: 2,
            acquire_timeout: Duration::from_secs(60),
        }
    }
}

/// Snapshot of pool occupancy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PoolStats {
    pub capacity: usize,
    /// Drivers waiting on the free list.
    pub idle: usize,
    /// Drivers currently checked out.
    pub in_use: usize,
    /// Drivers alive (idle + in use).
    pub launched: usize,
}

#[derive(Default)]
struct PoolInner {
    idle: Mutex<Vec<Box<dyn Driver>>>,
    closed: std::sync::atomic::AtomicBool,
    in_use: AtomicUsize,
    launched: AtomicUsize,
}

impl PoolInner {
    fn idle(&self) -> MutexGuard<'_, Vec<Box<dyn Driver>>> {
        self.idle.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn pop_idle(&self) -> Option<Box<dyn Driver>> {
        self.idle().pop()
    }

    fn forget(&self, mut driver: Box<dyn Driver>) {
        self.launched.fetch_sub(1, Ordering::SeqCst);
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(async move { driver.quit().await });
            }
            // Without a runtime the driver's own Drop tears the browser down.
            Err(_) => drop(driver),
        }
    }
}

/// A free list of drivers with a bounded number of slots.
pub struct DriverPool {
    factory: Arc<dyn DriverFactory>,
    config: PoolConfig,
    slots: Arc<Semaphore>,
    inner: Arc<PoolInner>,
}

impl DriverPool {
    /// Creates an empty pool. Drivers are launched lazily on demand.
    pub fn new(factory: Arc<dyn DriverFactory>, config: PoolConfig) -> Self {
        let capacity = config.capacity.max(1);
        Self {
            factory,
            config: PoolConfig { capacity, ..config },
            slots: Arc::new(Semaphore::new(capacity)),
            inner: Arc::new(PoolInner::default()),
        }
    }

    /// Returns the pool configuration.
    pub fn config(&self) -> &PoolConfig {
        &self.config
    }

    /// Checks out a driver, reusing an idle one when possible.
    ///
    /// Idle drivers that fail their health check are discarded. When the
    /// free list is empty a new driver is launched in the acquired slot.
    pub async fn acquire(&self) -> Result<PooledDriver> {
        let permit = match tokio::time::timeout(
            self.config.acquire_timeout,
            Arc::clone(&self.slots).acquire_owned(),
        )
        .await
        {
            Ok(Ok(permit)) => permit,
            Ok(Err(_)) => return Err(ScrapeError::PoolClosed),
            Err(_) => {
                warn!(
                    "No browser slot freed within {}s",
                    self.config.acquire_timeout.as_secs()
                );
                return Err(ScrapeError::PoolTimeout(self.config.acquire_timeout.as_secs()));
            }
        };

        while let Some(mut driver) = self.inner.pop_idle() {
            if driver.is_alive().await {
                debug!("Reusing pooled browser");
                return Ok(PooledDriver::new(driver, permit, Arc::clone(&self.inner)));
            }
            warn!("Pooled browser failed health check, discarding it");
            self.inner.launched.fetch_sub(1, Ordering::SeqCst);
            driver.quit().await;
        }

        debug!("Launching a new browser for the pool");
        let driver = self.factory.launch().await?;
        self.inner.launched.fetch_add(1, Ordering::SeqCst);
        info!(
            "Browser launched ({} of {} slots)",
            self.inner.launched.load(Ordering::SeqCst),
            self.config.capacity
        );
        Ok(PooledDriver::new(driver, permit, Arc::clone(&self.inner)))
    }

    /// Returns current occupancy.
    pub fn stats(&self) -> PoolStats {
        PoolStats {
            capacity: self.config.capacity,
            idle: self.inner.idle().len(),
            in_use: self.inner.in_use.load(Ordering::SeqCst),
            launched: self.inner.launched.load(Ordering::SeqCst),
        }
    }

    /// Returns true once [`shutdown`](Self::shutdown) has run.
    pub fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::SeqCst)
    }

    /// Stops handing out drivers and quits every idle one.
    ///
    /// Drivers still checked out are quit when their guard is dropped.
    pub async fn shutdown(&self) {
        self.slots.close();
        let drained = {
            let mut idle = self.inner.idle();
            self.inner.closed.store(true, Ordering::SeqCst);
            std::mem::take(&mut *idle)
        };

        let count = drained.len();
        for mut driver in drained {
            driver.quit().await;
            self.inner.launched.fetch_sub(1, Ordering::SeqCst);
        }
        info!("Browser pool shut down, {} idle browsers closed", count);
    }
}

/// A driver checked out of the pool.
///
/// Dropping the guard returns the driver to the free list, unless
/// [`discard`](Self::discard) was called or the pool has shut down, in
/// which case the browser is quit.
pub struct PooledDriver {
    driver: Option<Box<dyn Driver>>,
    inner: Arc<PoolInner>,
    discard: bool,
    _permit: OwnedSemaphorePermit,
}

impl PooledDriver {
    fn new(driver: Box<dyn Driver>, permit: OwnedSemaphorePermit, inner: Arc<PoolInner>) -> Self {
        inner.in_use.fetch_add(1, Ordering::SeqCst);
        Self {
            driver: Some(driver),
            inner,
            discard: false,
            _permit: permit,
        }
    }

    /// Opens a new tab on the checked-out browser.
    pub async fn open_page(&self) -> Result<Box<dyn DriverPage>> {
        match &self.driver {
            Some(driver) => driver.open_page().await,
            None => Err(ScrapeError::PoolClosed),
        }
    }

    /// Marks the driver as broken so it is not returned to the pool.
    pub fn discard(&mut self) {
        self.discard = true;
    }
}

impl Drop for PooledDriver {
    fn drop(&mut self) {
        self.inner.in_use.fetch_sub(1, Ordering::SeqCst);
        let Some(driver) = self.driver.take() else {
            return;
        };

        let mut idle = self.inner.idle();
        if self.discard || self.inner.closed.load(Ordering::SeqCst) {
            drop(idle);
            debug!("Discarding browser instead of returning it to the pool");
            self.inner.forget(driver);
        } else {
            idle.push(driver);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::fake::{FakeBrowser, FakeFactory};

    fn make_pool(state: &Arc<FakeBrowser>, capacity: usize, timeout_ms: u64) -> DriverPool {
        DriverPool::new(
            Arc::new(FakeFactory(Arc::clone(state))),
            PoolConfig {
                capacity,
                acquire_timeout: Duration::from_millis(timeout_ms),
            },
        )
    }

    #[test]
    fn test_pool_config_default() {
        let config = PoolConfig::default();
        assert_eq!(config.capacity, 2);
        assert_eq!(config.acquire_timeout, Duration::from_secs(60));
    }

    #[tokio::test]
    async fn test_zero_capacity_is_raised_to_one() {
        let state = FakeBrowser::new();
        let pool = make_pool(&state, 0, 100);
        assert_eq!(pool.config().capacity, 1);
    }

    #[tokio::test]
    async fn test_drivers_are_created_lazily_and_reused() {
        let state = FakeBrowser::new();
        let pool = make_pool(&state, 2, 100);
        assert_eq!(pool.stats().launched, 0);

        let driver = pool.acquire().await.unwrap();
        assert_eq!(pool.stats().in_use, 1);
        drop(driver);

        let stats = pool.stats();
        assert_eq!(stats.idle, 1);
        assert_eq!(stats.in_use, 0);

        let _again = pool.acquire().await.unwrap();
        assert_eq!(state.launches.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_acquire_times_out_when_full() {
        let state = FakeBrowser::new();
        let pool = make_pool(&state, 1, 50);
        let _held = pool.acquire().await.unwrap();
        let err = pool.acquire().await.err().unwrap();
        assert!(matches!(err, ScrapeError::PoolTimeout(_)));
    }

    #[tokio::test]
    async fn test_waiter_gets_released_driver() {
        let state = FakeBrowser::new();
        let pool = Arc::new(make_pool(&state, 1, 2_000));
        let held = pool.acquire().await.unwrap();

        let waiter = {
            let pool = Arc::clone(&pool);
            tokio::spawn(async move { pool.acquire().await.map(|_| ()) })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        drop(held);

        waiter.await.unwrap().unwrap();
        assert_eq!(state.launches.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_discarded_driver_is_not_reused() {
        let state = FakeBrowser::new();
        let pool = make_pool(&state, 2, 100);

        let mut driver = pool.acquire().await.unwrap();
        driver.discard();
        drop(driver);
        tokio::task::yield_now().await;

        assert_eq!(pool.stats().idle, 0);
        assert_eq!(pool.stats().launched, 0);
        let _fresh = pool.acquire().await.unwrap();
        assert_eq!(state.launches.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_dead_idle_driver_is_replaced() {
        let state = FakeBrowser::new();
        let pool = make_pool(&state, 1, 100);
        drop(pool.acquire().await.unwrap());

        state.dead.store(true, Ordering::SeqCst);
        let _driver = pool.acquire().await.unwrap();
        assert_eq!(state.launches.load(Ordering::SeqCst), 2);
        assert_eq!(state.quits.load(Ordering::SeqCst), 1);
        assert_eq!(pool.stats().launched, 1);
    }

    #[tokio::test]
    async fn test_launch_failure_releases_slot() {
        let state = FakeBrowser::new();
        let pool = make_pool(&state, 1, 100);
        state.fail_launch.store(true, Ordering::SeqCst);
        assert!(pool.acquire().await.is_err());

        state.fail_launch.store(false, Ordering::SeqCst);
        assert!(pool.acquire().await.is_ok());
    }

    #[tokio::test]
    async fn test_shutdown_drains_idle_and_rejects_acquire() {
        let state = FakeBrowser::new();
        let pool = make_pool(&state, 2, 100);
        let a = pool.acquire().await.unwrap();
        let b = pool.acquire().await.unwrap();
        drop(a);

        pool.shutdown().await;
        assert!(pool.is_closed());
        assert_eq!(state.quits.load(Ordering::SeqCst), 1);
        assert!(matches!(pool.acquire().await, Err(ScrapeError::PoolClosed)));

        // A driver returned after shutdown is quit rather than pooled.
        drop(b);
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(state.quits.load(Ordering::SeqCst), 2);
        assert_eq!(pool.stats().idle, 0);
        assert_eq!(pool.stats().launched, 0);
    }
}
