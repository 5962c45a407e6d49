/// Command-line handling
///
/// `build_cli` declares the accepted flags with clap; `Cli` is the parsed result
/// and also yields the logger configuration. The raw process arguments are kept
/// in `CMD_ARGS`.
use crate::constants::DEFAULT_CONFIG_PATH;
use crate::logger::{LogLevel, LogTag, LoggerConfig};
use crate::monitor::MonitorMode;
use clap::{value_parser, Arg, ArgAction, ArgMatches, Command};
use once_cell::sync::Lazy;
use std::env;
use std::path::PathBuf;

/// Process arguments, captured once
pub static CMD_ARGS: Lazy<Vec<String>> = Lazy::new(|| env::args().collect());

pub fn get_cmd_args() -> Vec<String> {
    CMD_ARGS.clone()
}

#[derive(Debug, Clone, PartialEq)]
pub struct Cli {
    pub mode: MonitorMode,
    pub address: Option<String>,
    pub config: PathBuf,
    pub verbose: bool,
    pub quiet: bool,
    pub debug_all: bool,
    /// Debug keys given as `--debug-<key>`
    pub debug_tags: Vec<String>,
    /// Keys given as `--verbose-<key>`
    pub verbose_tags: Vec<String>,
}

pub fn build_cli() -> Command {
    let mut command = Command::new("solana-monitor")
        .about("Realtime and historical native-transfer monitor for a Solana account")
        .arg(
            Arg::new("mode")
                .long("mode")
                .value_parser(value_parser!(MonitorMode))
                .default_value("both")
                .help("Which ingestion drivers to run"),
        )
        .arg(
            Arg::new("address")
                .long("address")
                .value_name("PUBKEY")
                .help("Account to monitor (overrides WALLET_ADDRESS)"),
        )
        .arg(
            Arg::new("config")
                .long("config")
                .value_name("PATH")
                .value_parser(value_parser!(PathBuf))
                .default_value(DEFAULT_CONFIG_PATH)
                .help("JSON config file"),
        )
        .arg(
            Arg::new("verbose")
                .long("verbose")
                .short('v')
                .action(ArgAction::SetTrue)
                .help("Show verbose lines for every tag"),
        )
        .arg(
            Arg::new("quiet")
                .long("quiet")
                .short('q')
                .action(ArgAction::SetTrue)
                .help("Only warnings and errors"),
        )
        .arg(
            Arg::new("debug-all")
                .long("debug-all")
                .action(ArgAction::SetTrue)
                .help("Debug output for every tag"),
        );

    for tag in LogTag::ALL.iter() {
        let key = tag.to_debug_key();
        command = command
            .arg(
                Arg::new(format!("debug-{}", key))
                    .long(format!("debug-{}", key))
                    .action(ArgAction::SetTrue)
                    .help(format!("Debug output for {}", tag)),
            )
            .arg(
                Arg::new(format!("verbose-{}", key))
                    .long(format!("verbose-{}", key))
                    .action(ArgAction::SetTrue)
                    .hide(true),
            );
    }
    command
}

impl Cli {
    fn from_matches(matches: &ArgMatches) -> Self {
        let flagged = |prefix: &str| -> Vec<String> {
            LogTag::ALL
                .iter()
                .map(LogTag::to_debug_key)
                .filter(|key| matches.get_flag(&format!("{}-{}", prefix, key)))
                .collect()
        };

        Cli {
            mode: matches
                .get_one::<MonitorMode>("mode")
                .copied()
                .unwrap_or(MonitorMode::Both),
            address: matches.get_one::<String>("address").cloned(),
            config: matches
                .get_one::<PathBuf>("config")
                .cloned()
                .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH)),
            verbose: matches.get_flag("verbose"),
            quiet: matches.get_flag("quiet"),
            debug_all: matches.get_flag("debug-all"),
            debug_tags: flagged("debug"),
            verbose_tags: flagged("verbose"),
        }
    }

    /// Logger settings for these flags; `--verbose` wins over `--quiet`
    pub fn logger_config(&self) -> LoggerConfig {
        let min_level = if self.verbose {
            LogLevel::Verbose
        } else if self.quiet {
            LogLevel::Warning
        } else {
            LogLevel::Info
        };
        LoggerConfig {
            min_level,
            debug_tags: self.debug_tags.iter().cloned().collect(),
            verbose_tags: self.verbose_tags.iter().cloned().collect(),
            debug_all: self.debug_all,
        }
    }

    pub fn try_parse_from<I, T>(args: I) -> Result<Self, clap::Error>
    where
        I: IntoIterator<Item = T>,
        T: Into<std::ffi::OsString> + Clone,
    {
        let matches = build_cli().try_get_matches_from(args)?;
        Ok(Self::from_matches(&matches))
    }

    /// Parse the stored process arguments; prints usage and exits on error
    pub fn parse() -> Self {
        match Self::try_parse_from(get_cmd_args()) {
            Ok(cli) => cli,
            Err(e) => e.exit(),
        }
    }
}
