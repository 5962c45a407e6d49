//! Wire types returned by the ledger endpoint
//!
//! These mirror the `jsonParsed` shape of `getTransaction`, the
//! `getSignaturesForAddress` entries and the `logsNotification` payload.
//! Only the fields the monitor reads are modelled; everything else is ignored.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::mpsc;

/// Full transaction as fetched from the ledger
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct FetchedTransaction {
    pub slot: u64,
    #[serde(default)]
    pub block_time: Option<i64>,
    pub transaction: TransactionEnvelope,
    #[serde(default)]
    pub meta: Option<TransactionMeta>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TransactionEnvelope {
    #[serde(default)]
    pub signatures: Vec<String>,
    pub message: TransactionMessage,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TransactionMessage {
    #[serde(default)]
    pub account_keys: Vec<AccountKey>,
    #[serde(default)]
    pub instructions: Vec<InstructionRef>,
}

/// Account key in either parsed (`{pubkey, signer, writable}`) or raw string form
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum AccountKey {
    Parsed {
        pubkey: String,
        #[serde(default)]
        signer: bool,
        #[serde(default)]
        writable: bool,
    },
    Plain(String),
}

impl AccountKey {
    pub fn pubkey(&self) -> &str {
        match self {
            AccountKey::Parsed { pubkey, .. } => pubkey,
            AccountKey::Plain(pubkey) => pubkey,
        }
    }
}

/// Instruction reference; parsed encodings carry `programId`, raw ones an index
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct InstructionRef {
    #[serde(default)]
    pub program_id: Option<String>,
    #[serde(default)]
    pub program_id_index: Option<usize>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TransactionMeta {
    #[serde(default)]
    pub err: Option<Value>,
    #[serde(default)]
    pub fee: u64,
    #[serde(default)]
    pub pre_balances: Vec<u64>,
    #[serde(default)]
    pub post_balances: Vec<u64>,
}

impl FetchedTransaction {
    pub fn first_signature(&self) -> Option<&str> {
        self.transaction.signatures.first().map(String::as_str)
    }

    pub fn account_key(&self, index: usize) -> Option<&str> {
        self.transaction
            .message
            .account_keys
            .get(index)
            .map(AccountKey::pubkey)
    }
}

/// One entry of a signatures-for-address page, newest first
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SignatureInfo {
    pub signature: String,
    pub slot: u64,
    #[serde(default)]
    pub err: Option<String>,
    #[serde(default)]
    pub block_time: Option<i64>,
}

/// Single event pushed by an account subscription
#[derive(Debug, Clone, PartialEq)]
pub struct ActivityNotification {
    pub signature: String,
    pub slot: u64,
    pub err: Option<Value>,
}

impl ActivityNotification {
    /// Failed transactions are reported with a non-null `err`
    pub fn has_error(&self) -> bool {
        matches!(&self.err, Some(value) if !value.is_null())
    }
}

/// Locally assigned handle for a live subscription
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(pub u64);

impl std::fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Live subscription: the handle to cancel it plus the event stream.
/// The stream ends when the subscription is cancelled or the connection drops.
#[derive(Debug)]
pub struct ActivitySubscription {
    pub id: SubscriptionId,
    pub events: mpsc::UnboundedReceiver<ActivityNotification>,
}
