//! Historical backfill: walks the address's signatures backwards page by page
//!
//! The walker keeps the connection it was built with for its whole run.

use crate::errors::MonitorResult;
use crate::logger::{self, LogTag};
use crate::rpc::utils::{backoff_delay, short_signature};
use crate::rpc::{LedgerClient, SignatureInfo};
use crate::transactions::{IngestSource, TransactionPipeline};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WalkSummary {
    pub pages: usize,
    pub admitted: usize,
    pub skipped: usize,
    pub failed_items: usize,
    pub failed_pages: usize,
}

pub struct HistoricalWalker {
    client: Arc<dyn LedgerClient>,
    pipeline: TransactionPipeline,
    running: AtomicBool,
    batch_size: usize,
    history_delay: Duration,
    retry_delay: Duration,
    max_retry_delay: Duration,
}

impl HistoricalWalker {
    pub fn new(
        client: Arc<dyn LedgerClient>,
        pipeline: TransactionPipeline,
        batch_size: usize,
        history_delay: Duration,
        retry_delay: Duration,
        max_retry_delay: Duration,
    ) -> Self {
        Self {
            client,
            pipeline,
            running: AtomicBool::new(true),
            batch_size: batch_size.max(1),
            history_delay,
            retry_delay,
            max_retry_delay,
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Ask the loop to exit; the page in progress still completes
    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
    }

    pub async fn run(&self, address: &str) -> WalkSummary {
        let mut summary = WalkSummary::default();
        let mut cursor: Option<String> = None;
        let mut consecutive_failures: u32 = 0;

        logger::info(
            LogTag::Historical,
            &format!("Starting historical backfill for {} on {}", address, self.client.endpoint()),
        );

        while self.is_running() {
            let page = match self
                .client
                .list_signatures(address, cursor.as_deref(), self.batch_size)
                .await
            {
                Ok(page) => {
                    consecutive_failures = 0;
                    page
                }
                Err(e) if !e.is_recoverable() => {
                    summary.failed_pages += 1;
                    logger::error(
                        LogTag::Historical,
                        &format!("Historical backfill aborted: {}", e),
                    );
                    break;
                }
                Err(e) => {
                    consecutive_failures = consecutive_failures.saturating_add(1);
                    summary.failed_pages += 1;
                    let delay = self.page_retry_delay(consecutive_failures);
                    logger::warning(
                        LogTag::Historical,
                        &format!(
                            "Failed to fetch signature page (attempt {}): {}; retrying in {}ms",
                            consecutive_failures,
                            e,
                            delay.as_millis()
                        ),
                    );
                    tokio::time::sleep(delay).await;
                    continue;
                }
            };

            if page.is_empty() {
                logger::info(LogTag::Historical, "Historical backfill complete");
                break;
            }

            summary.pages += 1;
            logger::debug(
                LogTag::Historical,
                &format!("Processing page {} with {} signatures", summary.pages, page.len()),
            );

            for info in &page {
                match self.process_item(info).await {
                    Ok(true) => summary.admitted += 1,
                    Ok(false) => summary.skipped += 1,
                    Err(e) => {
                        summary.failed_items += 1;
                        logger::error(
                            LogTag::Historical,
                            &format!("Error processing historical transaction {}: {}", info.signature, e),
                        );
                    }
                }
            }

            cursor = page.last().map(|info| info.signature.clone());
            tokio::time::sleep(self.history_delay).await;
        }

        summary
    }

    /// Wait before retrying a page; the first retry waits the base delay
    fn page_retry_delay(&self, consecutive_failures: u32) -> Duration {
        backoff_delay(
            self.retry_delay,
            consecutive_failures.saturating_sub(1),
            self.max_retry_delay,
        )
    }

    /// True when the transaction was admitted into the pipeline
    async fn process_item(&self, info: &SignatureInfo) -> MonitorResult<bool> {
        match self.client.fetch_transaction(&info.signature).await? {
            Some(transaction) => {
                self.pipeline
                    .ingest_transaction(transaction, IngestSource::Historical)
                    .await
            }
            None => {
                logger::debug(
                    LogTag::Historical,
                    &format!("{} not returned by ledger, skipping", short_signature(&info.signature)),
                );
                Ok(false)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::MonitorError;
    use crate::rpc::testing::{transfer_of, MockLedgerClient};
    use crate::transactions::pipeline::test_pipeline;

    const ADDRESS: &str = "9WzDXwBbmkg8ZTbNMqUxvQRAyrZzDsGYdLVL9zYtAWWM";

    fn walker(client: Arc<MockLedgerClient>, pipeline: TransactionPipeline) -> HistoricalWalker {
        HistoricalWalker::new(
            client,
            pipeline,
            2,
            Duration::from_millis(1),
            Duration::from_millis(1),
            Duration::from_millis(5),
        )
    }

    #[tokio::test]
    async fn test_empty_page_terminates() {
        let client = Arc::new(MockLedgerClient::new("primary"));
        let summary = walker(client.clone(), test_pipeline()).run(ADDRESS).await;

        assert_eq!(summary, WalkSummary::default());
        assert_eq!(client.list_calls(), vec![None]);
        assert!(client.fetch_calls().is_empty());
    }

    #[tokio::test]
    async fn test_pages_advance_cursor() {
        let client = Arc::new(MockLedgerClient::new("primary"));
        client.push_page(&["a", "b"]);
        client.push_page(&["c"]);
        for sig in ["a", "b", "c"] {
            client.add_transaction(transfer_of(sig, 1));
        }
        let pipeline = test_pipeline();

        let summary = walker(client.clone(), pipeline.clone()).run(ADDRESS).await;

        assert_eq!(summary.pages, 2);
        assert_eq!(summary.admitted, 3);
        assert_eq!(
            client.list_calls(),
            vec![None, Some("b".to_string()), Some("c".to_string())]
        );
        assert_eq!(client.fetch_calls(), vec!["a", "b", "c"]);
        assert_eq!(pipeline.cache().len(), 3);
    }

    #[tokio::test]
    async fn test_item_errors_are_skipped() {
        let client = Arc::new(MockLedgerClient::new("primary"));
        client.push_page(&["good", "missing", "broken"]);
        client.add_transaction(transfer_of("good", 1));
        let mut broken = transfer_of("broken", 1);
        broken.transaction.message.account_keys.truncate(1);
        client.add_transaction(broken);
        let pipeline = test_pipeline();

        let summary = walker(client.clone(), pipeline.clone()).run(ADDRESS).await;

        assert_eq!(summary.admitted, 1);
        assert_eq!(summary.skipped, 1);
        assert_eq!(summary.failed_items, 1);
        assert!(pipeline.cache().contains("good"));
        assert!(!pipeline.cache().contains("broken"));
    }

    #[tokio::test]
    async fn test_page_error_retries_same_cursor() {
        let client = Arc::new(MockLedgerClient::new("primary"));
        client.push_page(&["a"]);
        client.push_page_error("timeout");
        client.push_page_error("timeout");
        client.add_transaction(transfer_of("a", 1));

        let summary = walker(client.clone(), test_pipeline()).run(ADDRESS).await;

        assert_eq!(summary.failed_pages, 2);
        assert_eq!(
            client.list_calls(),
            vec![
                None,
                Some("a".to_string()),
                Some("a".to_string()),
                Some("a".to_string())
            ]
        );
    }

    #[tokio::test]
    async fn test_unrecoverable_page_error_ends_walk() {
        let client = Arc::new(MockLedgerClient::new("primary"));
        client.push_page_failure(MonitorError::Config("bad address".to_string()));
        client.push_page(&["a"]);

        let summary = walker(client.clone(), test_pipeline()).run(ADDRESS).await;

        assert_eq!(summary.failed_pages, 1);
        assert_eq!(summary.pages, 0);
        assert_eq!(client.list_calls(), vec![None]);
    }

    #[test]
    fn test_page_retry_delay_starts_at_base() {
        let walker = HistoricalWalker::new(
            Arc::new(MockLedgerClient::new("primary")),
            test_pipeline(),
            2,
            Duration::from_millis(1),
            Duration::from_millis(500),
            Duration::from_secs(10),
        );

        assert_eq!(walker.page_retry_delay(1), Duration::from_millis(500));
        assert_eq!(walker.page_retry_delay(2), Duration::from_millis(1_000));
        assert_eq!(walker.page_retry_delay(3), Duration::from_millis(2_000));
        assert_eq!(walker.page_retry_delay(30), Duration::from_secs(10));
    }

    #[tokio::test]
    async fn test_stop_before_run() {
        let client = Arc::new(MockLedgerClient::new("primary"));
        client.push_page(&["a"]);
        let walker = walker(client.clone(), test_pipeline());
        walker.stop();

        let summary = walker.run(ADDRESS).await;
        assert_eq!(summary.pages, 0);
        assert!(client.list_calls().is_empty());
    }
}
