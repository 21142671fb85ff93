// # ipmond - Local IP Monitor Daemon
//
// Thin integration layer around `ipmon-core`:
// 1. Parse the command line
// 2. Initialize logging
// 3. Load and validate the configuration file
// 4. Build the interface source and the configured store
// 5. Run one cycle (`--once`) or the scheduler until SIGTERM/SIGINT
//
// ## Configuration
//
// A JSON file, `config.json` by default (`--config <PATH>`). When the file
// does not exist a template is written there and the daemon exits so it can
// be edited.
//
// Logs go to stdout, and are also appended to `--log-file <PATH>` when given.
//
// Environment:
// - `IPMON_GITHUB_TOKEN`: overrides `store.token`
// - `IPMON_LOG_LEVEL`: trace, debug, info (default), warn, error
//
// ## Example
//
// ```bash
// export IPMON_GITHUB_TOKEN=ghp_...
// ipmond --config /etc/ipmon/config.json
// ipmond --once --log-file logs/ip_monitor.log
// ```

use anyhow::{Context, Result};
use clap::Parser;
use ipmon_core::{
    FileRemoteStore, InterfaceSelector, InterfaceSource, MonitorConfig, Reconciler, RemoteStore,
    Scheduler, StoreConfig,
};
use ipmon_iface_local::LocalInterfaceSource;
use std::fs::{File, OpenOptions};
use std::future::Future;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Mutex;
use std::time::Duration;
use tracing::{Level, debug, error, info};
use tracing_subscriber::FmtSubscriber;
use tracing_subscriber::fmt::writer::MakeWriterExt;

#[cfg(unix)]
use tokio::signal::unix::{SignalKind, signal};

/// Environment variable selecting the log level
const LOG_LEVEL_ENV_VAR: &str = "IPMON_LOG_LEVEL";

/// Capacity of the scheduler event channel
const EVENT_CAPACITY: usize = 32;

/// Publish this host's local IPv4 address to a remote JSON document
#[derive(Debug, Parser)]
#[command(name = "ipmond", version, about)]
struct Cli {
    /// Run a single check/publish cycle and exit
    #[arg(long)]
    once: bool,

    /// Path of the JSON configuration file
    #[arg(short, long, default_value = "config.json")]
    config: PathBuf,

    /// Also append log output to this file
    #[arg(long, value_name = "PATH")]
    log_file: Option<PathBuf>,
}

/// Exit codes for different termination scenarios
///
/// - 0: Clean shutdown, or a successful `--once` cycle
/// - 1: Configuration error, or a failed `--once` cycle
/// - 2: Runtime error (unexpected)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MonitorExitCode {
    Success,
    ConfigError,
    CycleFailed,
    RuntimeError,
}

impl From<MonitorExitCode> for ExitCode {
    fn from(code: MonitorExitCode) -> Self {
        match code {
            MonitorExitCode::Success => ExitCode::from(0),
            MonitorExitCode::ConfigError | MonitorExitCode::CycleFailed => ExitCode::from(1),
            MonitorExitCode::RuntimeError => ExitCode::from(2),
        }
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let log_level = match std::env::var(LOG_LEVEL_ENV_VAR) {
        Ok(value) => match parse_log_level(&value) {
            Some(level) => level,
            None => {
                eprintln!(
                    "{} '{}' is not valid. Valid levels: trace, debug, info, warn, error",
                    LOG_LEVEL_ENV_VAR, value
                );
                return MonitorExitCode::ConfigError.into();
            }
        },
        Err(_) => Level::INFO,
    };

    let builder = FmtSubscriber::builder().with_max_level(log_level);
    let installed = match &cli.log_file {
        Some(path) => match open_log_file(path) {
            Ok(file) => {
                let writer = std::io::stdout.and(Mutex::new(file));
                let subscriber = builder.with_ansi(false).with_writer(writer).finish();
                tracing::subscriber::set_global_default(subscriber)
            }
            Err(e) => {
                eprintln!("{:#}", e);
                return MonitorExitCode::ConfigError.into();
            }
        },
        None => tracing::subscriber::set_global_default(builder.finish()),
    };

    if let Err(e) = installed {
        eprintln!("Failed to set tracing subscriber: {}", e);
        return MonitorExitCode::ConfigError.into();
    }

    let config = match load_config(&cli.config) {
        Ok(config) => config,
        Err(e) => {
            error!("{:#}", e);
            return MonitorExitCode::ConfigError.into();
        }
    };

    info!("Starting ipmond");
    info!(
        "Configuration loaded: store {}, document {}, interval {}s",
        config.store.type_name(),
        config.data_file,
        config.monitor.interval
    );

    let rt = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            error!("Failed to create tokio runtime: {}", e);
            return MonitorExitCode::RuntimeError.into();
        }
    };

    let source = Box::new(LocalInterfaceSource::new());
    rt.block_on(run_daemon(cli.once, config, source)).into()
}

fn parse_log_level(value: &str) -> Option<Level> {
    match value.trim().to_lowercase().as_str() {
        "trace" => Some(Level::TRACE),
        "debug" => Some(Level::DEBUG),
        "info" => Some(Level::INFO),
        "warn" => Some(Level::WARN),
        "error" => Some(Level::ERROR),
        _ => None,
    }
}

/// Open the log file for appending, creating missing parent directories
fn open_log_file(path: &Path) -> Result<File> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }

    OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("Failed to open log file {}", path.display()))
}

/// Load, override and validate the configuration
///
/// A missing file is replaced by a template and reported as an error.
fn load_config(path: &Path) -> Result<MonitorConfig> {
    if !path.exists() {
        write_template(path)?;
        anyhow::bail!(
            "Config file {} not found. A template was created there; edit it and restart.",
            path.display()
        );
    }

    let mut config = MonitorConfig::load(path)?;
    config.apply_env_overrides();
    config.validate()?;
    Ok(config)
}

fn write_template(path: &Path) -> Result<()> {
    let template = MonitorConfig::template().to_json()?;

    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }

    std::fs::write(path, template)
        .with_context(|| format!("Failed to write config template {}", path.display()))
}

/// Build the configured remote store
async fn build_store(config: &StoreConfig) -> Result<Box<dyn RemoteStore>> {
    match config {
        #[cfg(feature = "github")]
        StoreConfig::Github { .. } => {
            let store = ipmon_store_github::GitHubStore::from_config(config)?;
            Ok(Box::new(store))
        }
        #[cfg(not(feature = "github"))]
        StoreConfig::Github { .. } => {
            anyhow::bail!("GitHub store support was not compiled in (feature \"github\")")
        }
        StoreConfig::File { root } => Ok(Box::new(FileRemoteStore::new(root).await?)),
    }
}

/// Run the daemon
async fn run_daemon(
    once: bool,
    config: MonitorConfig,
    source: Box<dyn InterfaceSource>,
) -> MonitorExitCode {
    let store = match build_store(&config.store).await {
        Ok(store) => store,
        Err(e) => {
            error!("Failed to create {} store: {:#}", config.store.type_name(), e);
            return MonitorExitCode::ConfigError;
        }
    };

    let selector = InterfaceSelector::new(source, config.monitor.policy());
    let mut reconciler = Reconciler::new(selector, store, config.data_file.clone());
    reconciler.load().await;

    if once {
        return if reconciler.run_cycle().await {
            MonitorExitCode::Success
        } else {
            MonitorExitCode::CycleFailed
        };
    }

    let interval = Duration::from_secs(config.monitor.interval);
    let scheduler = Scheduler::new(reconciler, interval, EVENT_CAPACITY);
    let (mut scheduler, mut event_rx) = match scheduler {
        Ok(pair) => pair,
        Err(e) => {
            error!("{}", e);
            return MonitorExitCode::ConfigError;
        }
    };

    tokio::spawn(async move {
        while let Some(event) = event_rx.recv().await {
            debug!("Scheduler event: {:?}", event);
        }
    });

    let shutdown = match shutdown_signal() {
        Ok(shutdown) => shutdown,
        Err(e) => {
            error!("{}", e);
            return MonitorExitCode::RuntimeError;
        }
    };

    match scheduler.run_until(shutdown).await {
        Ok(()) => {
            info!("Shutting down ipmond");
            MonitorExitCode::Success
        }
        Err(e) => {
            error!("Daemon error: {}", e);
            MonitorExitCode::RuntimeError
        }
    }
}

/// Future that completes on SIGTERM or SIGINT
///
/// Handlers are installed before the scheduler starts, so a signal that
/// arrives during the first cycle is not lost.
#[cfg(unix)]
fn shutdown_signal() -> Result<impl Future<Output = ()>> {
    let mut sigterm = signal(SignalKind::terminate())
        .map_err(|e| anyhow::anyhow!("Failed to setup SIGTERM handler: {}", e))?;
    let mut sigint = signal(SignalKind::interrupt())
        .map_err(|e| anyhow::anyhow!("Failed to setup SIGINT handler: {}", e))?;

    Ok(async move {
        let name = tokio::select! {
            _ = sigterm.recv() => "SIGTERM",
            _ = sigint.recv() => "SIGINT",
        };
        info!("Received shutdown signal: {}", name);
    })
}

/// Future that completes on Ctrl-C
///
/// Fallback implementation for non-Unix platforms.
#[cfg(not(unix))]
fn shutdown_signal() -> Result<impl Future<Output = ()>> {
    Ok(async {
        match tokio::signal::ctrl_c().await {
            Ok(()) => info!("Received Ctrl-C"),
            Err(e) => {
                error!("Failed to wait for Ctrl-C: {}", e);
                std::future::pending::<()>().await;
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use ipmon_core::traits::InterfaceCandidate;
    use ipmon_core::{MonitorSettings, MonitorState};
    use std::net::{IpAddr, Ipv4Addr};

    struct FixedSource(Vec<InterfaceCandidate>);

    impl InterfaceSource for FixedSource {
        fn interfaces(&self) -> ipmon_core::Result<Vec<InterfaceCandidate>> {
            Ok(self.0.clone())
        }

        fn source_name(&self) -> &'static str {
            "fixed"
        }
    }

    fn file_config(root: &Path) -> MonitorConfig {
        MonitorConfig {
            store: StoreConfig::File {
                root: root.display().to_string(),
            },
            monitor: MonitorSettings::default(),
            data_file: "data.json".to_string(),
        }
    }

    #[test]
    fn test_cli_defaults() {
        let cli = Cli::try_parse_from(["ipmond"]).unwrap();
        assert!(!cli.once);
        assert_eq!(cli.config, PathBuf::from("config.json"));
        assert!(cli.log_file.is_none());
    }

    #[test]
    fn test_cli_log_file() {
        let cli = Cli::try_parse_from(["ipmond", "--log-file", "logs/ip_monitor.log"]).unwrap();
        assert_eq!(cli.log_file, Some(PathBuf::from("logs/ip_monitor.log")));
    }

    #[test]
    fn test_log_file_appends_and_creates_directory() {
        use std::io::Write;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("logs").join("ip_monitor.log");

        writeln!(open_log_file(&path).unwrap(), "first").unwrap();
        writeln!(open_log_file(&path).unwrap(), "second").unwrap();

        assert_eq!(std::fs::read_to_string(&path).unwrap(), "first\nsecond\n");
    }

    #[test]
    fn test_cli_once_and_config() {
        let cli = Cli::try_parse_from(["ipmond", "--once", "--config", "/etc/ipmon.json"]).unwrap();
        assert!(cli.once);
        assert_eq!(cli.config, PathBuf::from("/etc/ipmon.json"));
    }

    #[test]
    fn test_cli_rejects_unknown_flag() {
        assert!(Cli::try_parse_from(["ipmond", "--forever"]).is_err());
    }

    #[test]
    fn test_parse_log_level() {
        assert_eq!(parse_log_level("debug"), Some(Level::DEBUG));
        assert_eq!(parse_log_level(" WARN "), Some(Level::WARN));
        assert_eq!(parse_log_level("verbose"), None);
    }

    #[test]
    fn test_exit_codes() {
        assert_eq!(ExitCode::from(MonitorExitCode::Success), ExitCode::from(0));
        assert_eq!(ExitCode::from(MonitorExitCode::ConfigError), ExitCode::from(1));
        assert_eq!(ExitCode::from(MonitorExitCode::CycleFailed), ExitCode::from(1));
        assert_eq!(ExitCode::from(MonitorExitCode::RuntimeError), ExitCode::from(2));
    }

    #[tokio::test]
    async fn test_once_publishes_and_succeeds() {
        let dir = tempfile::tempdir().unwrap();
        let source = FixedSource(vec![InterfaceCandidate::new(
            "eth0",
            vec![IpAddr::V4(Ipv4Addr::new(10, 0, 0, 2))],
            true,
        )]);

        let code = run_daemon(true, file_config(dir.path()), Box::new(source)).await;
        assert_eq!(code, MonitorExitCode::Success);

        let content = std::fs::read_to_string(dir.path().join("data.json")).unwrap();
        let doc = MonitorState::from_json(&content).unwrap();
        assert_eq!(doc.local_ip, Some(Ipv4Addr::new(10, 0, 0, 2)));
        assert_eq!(doc.network_interface.as_deref(), Some("eth0"));
    }

    #[tokio::test]
    async fn test_once_without_usable_interface_fails() {
        let dir = tempfile::tempdir().unwrap();
        let source = FixedSource(vec![InterfaceCandidate::new(
            "lo",
            vec![IpAddr::V4(Ipv4Addr::LOCALHOST)],
            true,
        )]);

        let code = run_daemon(true, file_config(dir.path()), Box::new(source)).await;
        assert_eq!(code, MonitorExitCode::CycleFailed);
        assert_eq!(ExitCode::from(code), ExitCode::from(1));
        assert!(!dir.path().join("data.json").exists());
    }

    #[test]
    fn test_missing_config_writes_template() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("etc").join("config.json");

        let result = load_config(&path);
        assert!(result.is_err());
        assert!(path.exists());

        // The template parses but is rejected until edited
        let template = MonitorConfig::load(&path).unwrap();
        assert!(template.validate().is_err());
    }
}
