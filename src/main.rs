use anyhow::{Context, Result};
use solana_monitor::{
    arguments::Cli,
    configs::{read_configs, Configs},
    logger::{self, LogTag},
    LedgerClient, Monitor, MonitorMode, RpcLedgerClient,
};
use std::sync::Arc;
use std::time::Duration;

/// Entry point for the account monitor
///
/// Loads configuration (file, then `.env`/environment, then `--address`), starts
/// the requested drivers and runs until a shutdown signal. Historical-only runs
/// exit on their own once the backfill and queue are done.
#[tokio::main]
async fn main() {
    dotenv::dotenv().ok();
    let cli = Cli::parse();
    logger::init(cli.logger_config());

    let configs = match load(&cli) {
        Ok(configs) => configs,
        Err(e) => {
            logger::error(LogTag::System, &format!("Startup failed: {:#}", e));
            logger::flush();
            std::process::exit(1);
        }
    };

    if let Err(e) = run(cli.mode, configs).await {
        logger::error(LogTag::System, &format!("Monitor failed: {:#}", e));
        logger::flush();
        std::process::exit(1);
    }
    logger::flush();
}

fn load(cli: &Cli) -> Result<Configs> {
    let mut configs = read_configs(&cli.config)
        .with_context(|| format!("reading {}", cli.config.display()))?;
    configs.apply_env_overrides(|key| std::env::var(key).ok());
    if let Some(address) = &cli.address {
        configs.wallet_address = address.clone();
    }
    configs.validate()?;

    if configs.debug {
        logger::update_logger_config(|config| config.debug_all = true);
    }
    Ok(configs)
}

async fn run(mode: MonitorMode, configs: Configs) -> Result<()> {
    let primary: Arc<dyn LedgerClient> = Arc::new(RpcLedgerClient::new(
        &configs.rpc_url,
        &configs.primary_websocket_url()?,
    ));
    let backup: Option<Arc<dyn LedgerClient>> =
        match (&configs.backup_rpc_url, configs.backup_websocket_url()?) {
            (Some(http), Some(ws)) => Some(Arc::new(RpcLedgerClient::new(http, &ws)) as Arc<dyn LedgerClient>),
            _ => None,
        };

    logger::info(
        LogTag::System,
        &format!(
            "Solana monitor starting: rpc {}{}",
            configs.rpc_url,
            configs
                .backup_rpc_url
                .as_deref()
                .map(|b| format!(", backup {}", b))
                .unwrap_or_default()
        ),
    );

    let address = configs.wallet_address.clone();
    let monitor = Arc::new(Monitor::new(&configs, primary, backup));

    let mut runner = {
        let monitor = monitor.clone();
        tokio::spawn(async move { monitor.start(&address, mode).await })
    };

    tokio::select! {
        signal = wait_for_shutdown_signal() => {
            let name = signal.map_err(anyhow::Error::msg)?;
            logger::warning(
                LogTag::System,
                &format!("Shutdown signal received ({}), stopping...", name),
            );
            monitor.stop().await;
            if tokio::time::timeout(Duration::from_secs(5), &mut runner).await.is_err() {
                logger::warning(LogTag::System, "Drivers did not finish within 5s");
                runner.abort();
            }
        }
        finished = &mut runner => {
            finished.context("monitor task panicked")??;
            if !mode.includes_realtime() {
                monitor.queue().wait_idle().await;
                monitor.stop().await;
                logger::info(LogTag::System, "Historical backfill finished, exiting");
                return Ok(());
            }

            logger::info(LogTag::System, "Backfill done, realtime monitoring continues (Ctrl+C to stop)");
            let name = wait_for_shutdown_signal().await.map_err(anyhow::Error::msg)?;
            logger::warning(
                LogTag::System,
                &format!("Shutdown signal received ({}), stopping...", name),
            );
            monitor.stop().await;
        }
    }

    Ok(())
}

/// Wait for Ctrl+C, or SIGTERM on Unix
async fn wait_for_shutdown_signal() -> Result<&'static str, String> {
    #[cfg(unix)]
    let signal_name = {
        use tokio::signal::unix::{signal, SignalKind};

        let mut sigterm = signal(SignalKind::terminate())
            .map_err(|e| format!("Failed to bind SIGTERM: {}", e))?;

        tokio::select! {
            result = tokio::signal::ctrl_c() => {
                result.map_err(|e| format!("Failed to listen for Ctrl+C: {}", e))?;
                "SIGINT"
            }
            _ = sigterm.recv() => "SIGTERM",
        }
    };

    #[cfg(not(unix))]
    let signal_name = {
        tokio::signal::ctrl_c()
            .await
            .map_err(|e| format!("Failed to listen for Ctrl+C: {}", e))?;
        "CTRL_C"
    };

    Ok(signal_name)
}
