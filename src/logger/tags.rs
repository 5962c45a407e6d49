/// Log tags identify the subsystem a line comes from.
///
/// Each tag has a debug key used by the `--debug-<key>` command-line flags.

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum LogTag {
    System,
    Monitor,
    Realtime,
    Historical,
    Cache,
    Queue,
    Rpc,
    Failover,
    Trader,
    Transactions,
    Other(String),
}

impl LogTag {
    /// Every fixed tag, used to register `--debug-<key>` flags
    pub const ALL: [LogTag; 10] = [
        LogTag::System,
        LogTag::Monitor,
        LogTag::Realtime,
        LogTag::Historical,
        LogTag::Cache,
        LogTag::Queue,
        LogTag::Rpc,
        LogTag::Failover,
        LogTag::Trader,
        LogTag::Transactions,
    ];

    /// Key used in `--debug-<key>` / `--verbose-<key>` flags
    pub fn to_debug_key(&self) -> String {
        match self {
            LogTag::System => "system".to_string(),
            LogTag::Monitor => "monitor".to_string(),
            LogTag::Realtime => "realtime".to_string(),
            LogTag::Historical => "historical".to_string(),
            LogTag::Cache => "cache".to_string(),
            LogTag::Queue => "queue".to_string(),
            LogTag::Rpc => "rpc".to_string(),
            LogTag::Failover => "failover".to_string(),
            LogTag::Trader => "trader".to_string(),
            LogTag::Transactions => "transactions".to_string(),
            LogTag::Other(name) => name.to_lowercase(),
        }
    }

    /// Label used in the file sink (no colors, no padding)
    pub fn to_plain_string(&self) -> String {
        match self {
            LogTag::System => "SYSTEM".to_string(),
            LogTag::Monitor => "MONITOR".to_string(),
            LogTag::Realtime => "REALTIME".to_string(),
            LogTag::Historical => "HISTORY".to_string(),
            LogTag::Cache => "CACHE".to_string(),
            LogTag::Queue => "QUEUE".to_string(),
            LogTag::Rpc => "RPC".to_string(),
            LogTag::Failover => "FAILOVER".to_string(),
            LogTag::Trader => "TRADER".to_string(),
            LogTag::Transactions => "TX".to_string(),
            LogTag::Other(name) => name.to_uppercase(),
        }
    }
}

impl std::fmt::Display for LogTag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.to_plain_string())
    }
}
