//! Monitor service: one pipeline bound to one account
//!
//! Owns the dedup cache, the priority queue and the failover controller, and
//! starts the ingestion drivers for the requested mode.

pub mod failover;
pub mod historical;
pub mod realtime;

pub use failover::FailoverController;
pub use historical::{HistoricalWalker, WalkSummary};
pub use realtime::RealtimeSubscriber;

use crate::configs::Configs;
use crate::errors::{MonitorError, MonitorResult};
use crate::logger::{self, LogTag};
use crate::rpc::utils::parse_pubkey;
use crate::rpc::{validate_connection, LedgerClient};
use crate::transactions::{DedupCache, PriorityQueue, TradingCallback, TransactionPipeline};
use parking_lot::Mutex;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::Notify;
use tokio::task::JoinHandle;

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum MonitorMode {
    Realtime,
    Historical,
    Both,
}

impl MonitorMode {
    pub fn includes_realtime(&self) -> bool {
        matches!(self, MonitorMode::Realtime | MonitorMode::Both)
    }

    pub fn includes_historical(&self) -> bool {
        matches!(self, MonitorMode::Historical | MonitorMode::Both)
    }
}

impl fmt::Display for MonitorMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            MonitorMode::Realtime => "realtime",
            MonitorMode::Historical => "historical",
            MonitorMode::Both => "both",
        };
        write!(f, "{}", name)
    }
}

pub struct Monitor {
    configs: Configs,
    failover: Arc<FailoverController>,
    pipeline: TransactionPipeline,
    address: Mutex<Option<String>>,
    realtime: Mutex<Option<Arc<RealtimeSubscriber>>>,
    historical: Mutex<Option<Arc<HistoricalWalker>>>,
    stopped: AtomicBool,
    sweeper_shutdown: Arc<Notify>,
    sweeper: Mutex<Option<JoinHandle<()>>>,
}

impl Monitor {
    pub fn new(
        configs: &Configs,
        primary: Arc<dyn LedgerClient>,
        backup: Option<Arc<dyn LedgerClient>>,
    ) -> Self {
        let pipeline = TransactionPipeline::with_recording_handler(
            configs.max_cache_size,
            configs.flush_interval(),
            configs.min_trade_amount,
            configs.parallel_limit,
        );
        Self {
            configs: configs.clone(),
            failover: Arc::new(FailoverController::new(primary, backup)),
            pipeline,
            address: Mutex::new(None),
            realtime: Mutex::new(None),
            historical: Mutex::new(None),
            stopped: AtomicBool::new(false),
            sweeper_shutdown: Arc::new(Notify::new()),
            sweeper: Mutex::new(None),
        }
    }

    pub fn set_trading_callback(&self, callback: Arc<dyn TradingCallback>) {
        self.pipeline.cache().set_trading_callback(callback);
    }

    pub fn cache(&self) -> &Arc<DedupCache> {
        self.pipeline.cache()
    }

    pub fn queue(&self) -> &Arc<PriorityQueue> {
        self.pipeline.queue()
    }

    pub fn pipeline(&self) -> &TransactionPipeline {
        &self.pipeline
    }

    pub fn failover(&self) -> &Arc<FailoverController> {
        &self.failover
    }

    pub fn address(&self) -> Option<String> {
        self.address.lock().clone()
    }

    /// Bind the monitor to `address`; rebinding to another account is refused
    fn bind_address(&self, address: &str) -> MonitorResult<()> {
        parse_pubkey(address)?;
        let mut bound = self.address.lock();
        match bound.as_deref() {
            Some(existing) if existing != address => Err(MonitorError::Config(format!(
                "monitor is bound to {}, cannot start for {}",
                existing, address
            ))),
            Some(_) => Ok(()),
            None => {
                *bound = Some(address.to_string());
                Ok(())
            }
        }
    }

    async fn log_endpoint_health(&self) {
        let mut endpoints = vec![self.failover.primary().clone()];
        if let Some(backup) = self.failover.backup() {
            endpoints.push(backup.clone());
        }
        for endpoint in endpoints {
            if !validate_connection(endpoint.as_ref()).await {
                logger::warning(
                    LogTag::Monitor,
                    &format!("Endpoint {} is unhealthy; continuing", endpoint.endpoint()),
                );
            }
        }
    }

    fn start_sweeper(&self) {
        let mut sweeper = self.sweeper.lock();
        if sweeper.is_none() {
            let cache = self.pipeline.cache().clone();
            *sweeper = Some(tokio::spawn(cache.run_sweeper(self.sweeper_shutdown.clone())));
        }
    }

    /// Start the drivers for `mode`.
    ///
    /// Realtime subscribes first; the historical walk is then awaited to
    /// completion. Returns the walk summary when a backfill ran.
    pub async fn start(&self, address: &str, mode: MonitorMode) -> MonitorResult<Option<WalkSummary>> {
        self.bind_address(address)?;
        if self.stopped.load(Ordering::SeqCst) {
            return Err(MonitorError::Config("monitor already stopped".to_string()));
        }

        logger::info(
            LogTag::Monitor,
            &format!("Starting monitor for {} (mode: {})", address, mode),
        );
        self.log_endpoint_health().await;
        self.start_sweeper();

        if mode.includes_realtime() {
            let subscriber = Arc::new(RealtimeSubscriber::new(
                address,
                self.failover.clone(),
                self.pipeline.clone(),
            ));
            *self.realtime.lock() = Some(subscriber.clone());

            if let Err(e) = subscriber.subscribe().await {
                if mode == MonitorMode::Realtime {
                    return Err(e);
                }
                logger::error(
                    LogTag::Monitor,
                    &format!("Realtime monitoring unavailable, continuing with backfill: {}", e),
                );
            }
        }

        if !mode.includes_historical() {
            return Ok(None);
        }

        let walker = Arc::new(HistoricalWalker::new(
            self.failover.active(),
            self.pipeline.clone(),
            self.configs.batch_size,
            self.configs.history_delay(),
            self.configs.retry_delay(),
            self.configs.max_retry_delay(),
        ));
        *self.historical.lock() = Some(walker.clone());
        if self.stopped.load(Ordering::SeqCst) {
            walker.stop();
        }

        let summary = walker.run(address).await;
        logger::info(
            LogTag::Historical,
            &format!(
                "Backfill summary: {} pages, {} admitted, {} skipped, {} failed items, {} failed pages",
                summary.pages, summary.admitted, summary.skipped, summary.failed_items, summary.failed_pages
            ),
        );
        Ok(Some(summary))
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
    }

    pub async fn stop(&self) {
        if self.stopped.swap(true, Ordering::SeqCst) {
            return;
        }
        logger::info(LogTag::Monitor, "Stopping monitor...");

        let walker = self.historical.lock().clone();
        if let Some(walker) = walker {
            walker.stop();
        }

        let subscriber = self.realtime.lock().clone();
        if let Some(subscriber) = subscriber {
            subscriber.stop().await;
        }

        self.sweeper_shutdown.notify_one();
        let sweeper = self.sweeper.lock().take();
        if let Some(handle) = sweeper {
            if let Err(e) = handle.await {
                logger::debug(LogTag::Cache, &format!("Sweeper task ended abnormally: {}", e));
            }
        }

        let stats = self.pipeline.cache().stats();
        logger::info(
            LogTag::Monitor,
            &format!(
                "Monitor stopped: {} cached ({} processed), {} admitted, {} duplicates, {} evicted, {} swept, {} queued",
                stats.cached,
                stats.processed,
                stats.admitted,
                stats.duplicates,
                stats.evicted,
                stats.swept,
                self.pipeline.queue().len()
            ),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rpc::testing::{transfer_of, MockLedgerClient};
    use std::time::Duration;

    const ADDRESS: &str = "9WzDXwBbmkg8ZTbNMqUxvQRAyrZzDsGYdLVL9zYtAWWM";
    const OTHER: &str = "11111111111111111111111111111111";

    fn configs() -> Configs {
        Configs {
            rpc_url: "http://127.0.0.1:8899".to_string(),
            wallet_address: ADDRESS.to_string(),
            history_delay_ms: 1,
            retry_delay_ms: 1,
            max_retry_delay_ms: 5,
            ..Default::default()
        }
    }

    fn monitor(primary: &Arc<MockLedgerClient>, backup: Option<&Arc<MockLedgerClient>>) -> Monitor {
        Monitor::new(
            &configs(),
            primary.clone(),
            backup.map(|b| b.clone() as Arc<dyn LedgerClient>),
        )
    }

    #[test]
    fn test_mode_flags() {
        assert!(MonitorMode::Both.includes_realtime());
        assert!(MonitorMode::Both.includes_historical());
        assert!(!MonitorMode::Realtime.includes_historical());
        assert!(!MonitorMode::Historical.includes_realtime());
        assert_eq!(MonitorMode::Historical.to_string(), "historical");
    }

    #[tokio::test]
    async fn test_address_binding() {
        let primary = Arc::new(MockLedgerClient::new("primary"));
        let monitor = monitor(&primary, None);

        assert!(monitor.start("not-a-key", MonitorMode::Historical).await.is_err());
        assert!(monitor.address().is_none());

        monitor.start(ADDRESS, MonitorMode::Historical).await.unwrap();
        assert!(matches!(
            monitor.start(OTHER, MonitorMode::Historical).await,
            Err(MonitorError::Config(_))
        ));
        assert_eq!(monitor.address().as_deref(), Some(ADDRESS));
        monitor.stop().await;
    }

    #[tokio::test]
    async fn test_historical_mode_end_to_end() {
        let primary = Arc::new(MockLedgerClient::new("primary"));
        primary.push_page(&["a", "b"]);
        primary.push_page(&["c"]);
        primary.add_transaction(transfer_of("a", 1));
        primary.add_transaction(transfer_of("b", 250));
        primary.add_transaction(transfer_of("c", 1));
        let monitor = monitor(&primary, None);

        let summary = monitor
            .start(ADDRESS, MonitorMode::Historical)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(summary.admitted, 3);
        assert_eq!(primary.subscribe_calls(), 0);

        monitor.queue().wait_idle().await;
        for sig in ["a", "b", "c"] {
            assert!(monitor.cache().get(sig).unwrap().processed);
        }
        monitor.stop().await;
        assert!(monitor.is_stopped());
    }

    #[tokio::test]
    async fn test_both_mode_dedups_across_drivers() {
        let primary = Arc::new(MockLedgerClient::new("primary"));
        primary.push_page(&["shared"]);
        primary.add_transaction(transfer_of("shared", 2));
        primary.add_transaction(transfer_of("live", 2));
        let monitor = monitor(&primary, None);

        let summary = monitor.start(ADDRESS, MonitorMode::Both).await.unwrap().unwrap();
        assert_eq!(summary.admitted, 1);
        assert_eq!(primary.live_subscriptions(), 1);

        primary.emit("shared", None);
        primary.emit("live", None);
        tokio::time::sleep(Duration::from_millis(50)).await;
        monitor.queue().wait_idle().await;

        assert_eq!(monitor.cache().len(), 2);
        assert_eq!(monitor.cache().stats().duplicates, 1);

        monitor.stop().await;
        assert_eq!(primary.live_subscriptions(), 0);
    }

    #[tokio::test]
    async fn test_realtime_start_failure_by_mode() {
        let primary = Arc::new(MockLedgerClient::new("primary"));
        primary.set_fail_subscribe(true);
        let realtime_only = monitor(&primary, None);
        assert!(realtime_only.start(ADDRESS, MonitorMode::Realtime).await.is_err());
        realtime_only.stop().await;

        let both = monitor(&primary, None);
        assert!(both.start(ADDRESS, MonitorMode::Both).await.unwrap().is_some());
        both.stop().await;
    }

    #[tokio::test]
    async fn test_realtime_failover_through_monitor() {
        let primary = Arc::new(MockLedgerClient::new("primary"));
        let backup = Arc::new(MockLedgerClient::new("backup"));
        primary.set_fail_fetches(true);
        let monitor = monitor(&primary, Some(&backup));

        assert!(monitor.start(ADDRESS, MonitorMode::Realtime).await.unwrap().is_none());
        primary.emit("sig-1", None);
        tokio::time::sleep(Duration::from_millis(50)).await;

        assert!(monitor.failover().is_on_backup());
        assert_eq!(backup.subscribe_calls(), 1);

        monitor.stop().await;
        assert_eq!(backup.live_subscriptions(), 0);
    }
}
