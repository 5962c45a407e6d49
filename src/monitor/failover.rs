//! Primary/backup connection switch for the realtime path
//!
//! Holds the one active ledger connection. Callers clone the `Arc` they need, so
//! in-flight operations keep using the handle they started with. The switch
//! happens at most once per controller.

use crate::logger::{self, LogTag};
use crate::rpc::{LedgerClient, SubscriptionId};
use parking_lot::RwLock;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

pub struct FailoverController {
    primary: Arc<dyn LedgerClient>,
    backup: Option<Arc<dyn LedgerClient>>,
    active: RwLock<Arc<dyn LedgerClient>>,
    switched: AtomicBool,
}

impl FailoverController {
    pub fn new(primary: Arc<dyn LedgerClient>, backup: Option<Arc<dyn LedgerClient>>) -> Self {
        Self {
            active: RwLock::new(primary.clone()),
            primary,
            backup,
            switched: AtomicBool::new(false),
        }
    }

    pub fn active(&self) -> Arc<dyn LedgerClient> {
        self.active.read().clone()
    }

    pub fn primary(&self) -> &Arc<dyn LedgerClient> {
        &self.primary
    }

    pub fn backup(&self) -> Option<&Arc<dyn LedgerClient>> {
        self.backup.as_ref()
    }

    pub fn is_on_backup(&self) -> bool {
        self.switched.load(Ordering::SeqCst)
    }

    /// Make the backup the active connection.
    ///
    /// `stale` is the subscription that failed; it is cancelled through the new
    /// (backup) handle, where it is unknown and therefore a no-op. Returns true
    /// only for the call that actually switched.
    pub async fn switch_to_backup(&self, stale: Option<SubscriptionId>) -> bool {
        let Some(backup) = self.backup.clone() else {
            logger::warning(
                LogTag::Failover,
                "Connection error on primary RPC and no backup configured; continuing on primary",
            );
            return false;
        };

        if self.switched.swap(true, Ordering::SeqCst) {
            logger::debug(
                LogTag::Failover,
                "Failover already performed; ignoring further connection errors",
            );
            return false;
        }

        *self.active.write() = backup.clone();
        logger::warning(
            LogTag::Failover,
            &format!(
                "Switching to backup RPC {} (was {})",
                backup.endpoint(),
                self.primary.endpoint()
            ),
        );

        if let Some(id) = stale {
            if let Err(e) = backup.unsubscribe(id).await {
                logger::debug(
                    LogTag::Failover,
                    &format!("Unsubscribe of stale {} failed: {}", id, e),
                );
            }
        }
        true
    }
}
