// # ipamctl - IPAM network container reconciler
//
// This binary is a THIN integration layer only:
// - No attribute comparison, wire handling or retry logic here
// - All reconciliation logic lives in ipam-core
// - Configuration is via environment variables only
//
// ipamctl is responsible for:
// 1. Reading configuration from environment variables
// 2. Initializing logging and the runtime
// 3. Building the connector, state store and reconciler
// 4. Running one command and mapping the outcome to an exit code
//
// ## Commands
//
// - `ipamctl apply`: bring every container in the desired-state file up to date
// - `ipamctl plan`: show what `apply` would do, without writing
// - `ipamctl destroy`: delete every tracked container, then verify it is gone
// - `ipamctl verify <ref>...`: check that the given references no longer resolve
//
// ## Configuration
//
// ### Connector
// - `IPAM_WAPI_HOST`: Grid master host name (required)
// - `IPAM_WAPI_USERNAME`: WAPI user (required)
// - `IPAM_WAPI_PASSWORD`: WAPI password (required)
// - `IPAM_WAPI_VERSION`: WAPI version (default: 2.12)
// - `IPAM_WAPI_VERIFY_TLS`: Verify the server certificate (default: true)
// - `IPAM_WAPI_TIMEOUT_SECS`: Request timeout, 1-300 (default: 30)
// - `IPAM_MODE`: `live` or `dry-run` (default: live)
//
// ### Desired State
// - `IPAM_DESIRED_STATE`: Path to a JSON array of containers (apply, plan)
//
// ### State Store
// - `IPAM_STATE_STORE_TYPE`: Type of state store (file, memory)
// - `IPAM_STATE_STORE_PATH`: Path to state file (for file store)
//
// ### Engine
// - `IPAM_EA_MODE`: `managed` or `exclusive` (default: managed)
// - `IPAM_TENANT_ID`: Tenant written on create (optional)
// - `IPAM_LOG_LEVEL`: trace, debug, info, warn, error (default: info)
//
// ## Example
//
// ```bash
// export IPAM_WAPI_HOST=gm.example.net
// export IPAM_WAPI_USERNAME=admin
// export IPAM_WAPI_PASSWORD=...
// export IPAM_DESIRED_STATE=/etc/ipam/containers.json
// export IPAM_STATE_STORE_TYPE=file
// export IPAM_STATE_STORE_PATH=/var/lib/ipam/state.json
//
// ipamctl apply
// ```

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use ipam_core::config::{
    ConnectorConfig, ContainerSpec, EngineConfig, StateStoreConfig, SyncConfig,
};
use ipam_core::{DiffMode, EngineEvent, ObjectRef, Plan, Reconciler};
use std::env;
use std::process::ExitCode;
use tokio::task::JoinHandle;
use tracing::{Level, debug, error, info, warn};
use tracing_subscriber::FmtSubscriber;

/// Exit codes for different termination scenarios
///
/// - 0: Command completed
/// - 1: Configuration or startup error
/// - 2: Runtime error (remote failure, verification failure)
#[derive(Debug, Clone, Copy)]
enum IpamExitCode {
    /// Command completed
    Success = 0,
    /// Configuration error or startup failure
    ConfigError = 1,
    /// Runtime error
    RuntimeError = 2,
}

impl From<IpamExitCode> for ExitCode {
    fn from(code: IpamExitCode) -> Self {
        ExitCode::from(code as u8)
    }
}

#[derive(Parser, Debug)]
#[command(name = "ipamctl")]
#[command(about = "Reconcile IPAM network containers against an Infoblox grid")]
#[command(version)]
#[command(after_help = "Connector, state store and engine settings are read from IPAM_* environment variables.")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
enum Command {
    /// Bring every container in the desired-state file up to date
    Apply,

    /// Show what apply would do, without writing
    Plan,

    /// Delete every tracked container, then verify it is gone
    Destroy,

    /// Check that the given references no longer resolve
    Verify {
        /// Object references, e.g. networkcontainer/ZG5z...:10.0.0.0/16/default
        #[arg(required = true)]
        references: Vec<String>,
    },
}

impl Command {
    fn needs_desired_state(&self) -> bool {
        matches!(self, Command::Apply | Command::Plan)
    }
}

/// Application configuration
struct Config {
    wapi_host: String,
    wapi_username: String,
    wapi_password: String,
    wapi_version: String,
    wapi_verify_tls: bool,
    wapi_timeout_secs: u64,
    dry_run: bool,
    desired_state_path: Option<String>,
    state_store_type: String,
    state_store_path: Option<String>,
    ea_mode: String,
    tenant_id: Option<String>,
    log_level: String,
}

impl Config {
    /// Load configuration from environment variables
    fn from_env() -> Result<Self> {
        Ok(Self {
            wapi_host: env::var("IPAM_WAPI_HOST").context("IPAM_WAPI_HOST is required")?,
            wapi_username: env::var("IPAM_WAPI_USERNAME")
                .context("IPAM_WAPI_USERNAME is required")?,
            wapi_password: env::var("IPAM_WAPI_PASSWORD")
                .context("IPAM_WAPI_PASSWORD is required")?,
            wapi_version: env::var("IPAM_WAPI_VERSION").unwrap_or_else(|_| "2.12".to_string()),
            wapi_verify_tls: match env::var("IPAM_WAPI_VERIFY_TLS") {
                Ok(value) => parse_bool("IPAM_WAPI_VERIFY_TLS", &value)?,
                Err(_) => true,
            },
            wapi_timeout_secs: match env::var("IPAM_WAPI_TIMEOUT_SECS") {
                Ok(value) => value
                    .parse()
                    .with_context(|| format!("IPAM_WAPI_TIMEOUT_SECS '{}' is not a number", value))?,
                Err(_) => 30,
            },
            dry_run: env::var("IPAM_MODE")
                .unwrap_or_default()
                .eq_ignore_ascii_case("dry-run"),
            desired_state_path: env::var("IPAM_DESIRED_STATE").ok(),
            state_store_type: env::var("IPAM_STATE_STORE_TYPE")
                .unwrap_or_else(|_| "file".to_string()),
            state_store_path: env::var("IPAM_STATE_STORE_PATH").ok(),
            ea_mode: env::var("IPAM_EA_MODE").unwrap_or_else(|_| "managed".to_string()),
            tenant_id: env::var("IPAM_TENANT_ID").ok().filter(|s| !s.is_empty()),
            log_level: env::var("IPAM_LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
        })
    }

    /// Validate the values that only the binary knows about
    ///
    /// Everything that ends up in `SyncConfig` is validated again by
    /// `SyncConfig::validate`.
    fn validate(&self, command: &Command) -> Result<()> {
        if self.wapi_password.is_empty() {
            anyhow::bail!(
                "IPAM_WAPI_PASSWORD is required. \
                Set it via: export IPAM_WAPI_PASSWORD=your_password"
            );
        }

        if !(1..=300).contains(&self.wapi_timeout_secs) {
            anyhow::bail!(
                "IPAM_WAPI_TIMEOUT_SECS must be between 1 and 300 seconds. Got: {}",
                self.wapi_timeout_secs
            );
        }

        match self.state_store_type.as_str() {
            "file" | "memory" => {}
            _ => anyhow::bail!(
                "IPAM_STATE_STORE_TYPE '{}' is not supported. \
                Supported types: file, memory",
                self.state_store_type
            ),
        }

        if self.state_store_type == "file" {
            match self.state_store_path.as_deref() {
                None | Some("") => anyhow::bail!(
                    "IPAM_STATE_STORE_PATH is required when IPAM_STATE_STORE_TYPE=file. \
                    Set it via: export IPAM_STATE_STORE_PATH=/var/lib/ipam/state.json"
                ),
                Some(_) => {}
            }
        } else {
            eprintln!(
                "WARNING: IPAM_STATE_STORE_TYPE=memory forgets every container on exit. \
                Use it for testing only."
            );
        }

        parse_ea_mode(&self.ea_mode)?;

        if command.needs_desired_state() && self.desired_state_path.is_none() {
            anyhow::bail!(
                "IPAM_DESIRED_STATE is required for this command. \
                Set it via: export IPAM_DESIRED_STATE=/etc/ipam/containers.json"
            );
        }

        match self.log_level.to_lowercase().as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => {}
            _ => anyhow::bail!(
                "IPAM_LOG_LEVEL '{}' is not valid. \
                Valid levels: trace, debug, info, warn, error",
                self.log_level
            ),
        }

        Ok(())
    }

    /// Build the library configuration, reading the desired-state file
    fn to_sync_config(&self) -> Result<SyncConfig> {
        let containers = match &self.desired_state_path {
            Some(path) => load_desired_state(path)?,
            None => Vec::new(),
        };

        let state_store = match self.state_store_type.as_str() {
            "memory" => StateStoreConfig::Memory,
            _ => StateStoreConfig::File {
                path: self.state_store_path.clone().unwrap_or_default(),
            },
        };

        let config = SyncConfig {
            connector: ConnectorConfig::Wapi {
                host: self.wapi_host.clone(),
                username: self.wapi_username.clone(),
                password: self.wapi_password.clone(),
                version: self.wapi_version.clone(),
                verify_tls: self.wapi_verify_tls,
                timeout_secs: self.wapi_timeout_secs,
                dry_run: self.dry_run,
            },
            state_store,
            engine: EngineConfig {
                diff_mode: parse_ea_mode(&self.ea_mode)?,
                tenant_id: self.tenant_id.clone(),
                ..Default::default()
            },
            containers,
        };

        config.validate()?;
        Ok(config)
    }
}

fn parse_bool(name: &str, value: &str) -> Result<bool> {
    match value.to_lowercase().as_str() {
        "1" | "true" | "yes" => Ok(true),
        "0" | "false" | "no" => Ok(false),
        _ => anyhow::bail!("{} must be true or false. Got: {}", name, value),
    }
}

fn parse_ea_mode(value: &str) -> Result<DiffMode> {
    match value.to_lowercase().as_str() {
        "managed" => Ok(DiffMode::Managed),
        "exclusive" => Ok(DiffMode::Exclusive),
        _ => anyhow::bail!(
            "IPAM_EA_MODE '{}' is not valid. Valid modes: managed, exclusive",
            value
        ),
    }
}

fn load_desired_state(path: &str) -> Result<Vec<ContainerSpec>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read desired state file {}", path))?;
    serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse desired state file {}", path))
}

fn main() -> ExitCode {
    let command = match Cli::try_parse() {
        Ok(cli) => cli.command,
        Err(e) => {
            // --help and --version also come back as errors
            let _ = e.print();
            return if e.use_stderr() {
                IpamExitCode::ConfigError.into()
            } else {
                IpamExitCode::Success.into()
            };
        }
    };

    // Load configuration from environment
    let config = match Config::from_env() {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Configuration error: {:#}", e);
            return IpamExitCode::ConfigError.into();
        }
    };

    if let Err(e) = config.validate(&command) {
        eprintln!("Configuration validation error: {}", e);
        return IpamExitCode::ConfigError.into();
    }

    // Initialize tracing
    let log_level = match config.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let subscriber = FmtSubscriber::builder().with_max_level(log_level).finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
        return IpamExitCode::ConfigError.into();
    }

    let sync_config = match config.to_sync_config() {
        Ok(sync_config) => sync_config,
        Err(e) => {
            error!("Configuration error: {:#}", e);
            return IpamExitCode::ConfigError.into();
        }
    };

    info!(
        "Configuration loaded: {} container(s), connector {:?}",
        sync_config.containers.len(),
        sync_config.connector
    );

    let rt = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            error!("Failed to create tokio runtime: {}", e);
            return IpamExitCode::RuntimeError.into();
        }
    };

    rt.block_on(async {
        let (reconciler, event_logger) = match build_reconciler(&sync_config).await {
            Ok(built) => built,
            Err(e) => {
                error!("Startup error: {:#}", e);
                return IpamExitCode::ConfigError;
            }
        };

        let code = match run_command(&reconciler, &command, &sync_config).await {
            Ok(()) => IpamExitCode::Success,
            Err(e) => {
                error!("{:#}", e);
                IpamExitCode::RuntimeError
            }
        };

        // Dropping the reconciler closes the event channel
        drop(reconciler);
        if let Err(e) = event_logger.await {
            warn!("Event logger stopped abnormally: {}", e);
        }
        code
    })
    .into()
}

/// Build the reconciler and start logging its events
async fn build_reconciler(config: &SyncConfig) -> Result<(Reconciler, JoinHandle<()>)> {
    let connector = create_connector(&config.connector)?;
    let state_store = ipam_core::state::from_config(&config.state_store).await?;

    let (reconciler, mut events) =
        Reconciler::new(connector, state_store, config.engine.clone())?;

    let event_logger = tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            log_event(&event);
        }
    });

    Ok((reconciler, event_logger))
}

#[cfg(feature = "wapi")]
fn create_connector(config: &ConnectorConfig) -> Result<Box<dyn ipam_core::Connector>> {
    use ipam_core::traits::ConnectorFactory;

    info!("Using {} connector", config.type_name());
    Ok(ipam_connector_wapi::WapiFactory.create(config)?)
}

#[cfg(not(feature = "wapi"))]
fn create_connector(config: &ConnectorConfig) -> Result<Box<dyn ipam_core::Connector>> {
    anyhow::bail!(
        "Connector '{}' is not compiled in. Rebuild with --features wapi",
        config.type_name()
    )
}

fn log_event(event: &EngineEvent) {
    match event {
        EngineEvent::StateChanged { name, from, to } => {
            debug!("{}: {:?} -> {:?}", name, from, to)
        }
        EngineEvent::Created { name, reference } => info!("{}: created {}", name, reference),
        EngineEvent::Updated {
            name,
            reference,
            comment_changed,
            attributes_set,
            attributes_removed,
        } => info!(
            "{}: updated {} (comment {}, {} attribute(s) set, {} removed)",
            name,
            reference,
            if *comment_changed { "changed" } else { "unchanged" },
            attributes_set,
            attributes_removed
        ),
        EngineEvent::Unchanged { name, reference } => info!("{}: {} up to date", name, reference),
        EngineEvent::Vanished { name, reference } => {
            warn!("{}: {} no longer exists remotely", name, reference)
        }
        EngineEvent::Deleted { name, reference } => info!("{}: deleted {}", name, reference),
        EngineEvent::Failed {
            name,
            operation,
            error,
        } => error!("{}: {} failed: {}", name, operation, error),
    }
}

/// Run one command to completion
async fn run_command(reconciler: &Reconciler, command: &Command, config: &SyncConfig) -> Result<()> {
    match command {
        Command::Apply => apply(reconciler, config).await?,
        Command::Plan => plan(reconciler, config).await?,
        Command::Destroy => destroy(reconciler, config).await?,
        Command::Verify { references } => {
            let refs: Vec<ObjectRef> = references.iter().map(ObjectRef::new).collect();
            let report = reconciler.verify_destroyed(&refs).await;
            info!("{}", report);
            report.into_result()?;
        }
    }

    reconciler.flush().await?;
    Ok(())
}

/// Apply every container; keep going after a failure and report at the end
async fn apply(reconciler: &Reconciler, config: &SyncConfig) -> Result<()> {
    if is_dry_run(config) {
        warn!("Dry-run mode: showing the plan instead of applying");
        return plan(reconciler, config).await;
    }

    let mut failed = Vec::new();
    for spec in &config.containers {
        let desired = spec.to_container()?;
        if let Err(e) = reconciler.apply(&spec.name, &desired).await {
            error!("{}: {}", spec.name, e);
            failed.push(spec.name.clone());
        }
    }

    if !failed.is_empty() {
        anyhow::bail!("{} container(s) failed: {}", failed.len(), failed.join(", "));
    }
    info!("Applied {} container(s)", config.containers.len());
    Ok(())
}

async fn plan(reconciler: &Reconciler, config: &SyncConfig) -> Result<()> {
    for spec in &config.containers {
        let desired = spec.to_container()?;
        let plan = reconciler
            .plan(&spec.name, &desired)
            .await
            .with_context(|| format!("Failed to plan {}", spec.name))?;

        match plan {
            Plan::Create => info!(
                "{}: will create {} {}",
                spec.name,
                desired.object_type(),
                desired.cidr()
            ),
            Plan::Recreate { stale } => {
                info!("{}: {} is gone, will create it again", spec.name, stale)
            }
            Plan::Update { observed, changes } => info!(
                "{}: will update {}: {}",
                spec.name,
                observed.reference().map(ObjectRef::as_str).unwrap_or_default(),
                serde_json::to_string(&changes.to_fields())?
            ),
            Plan::NoOp { .. } => info!("{}: up to date", spec.name),
        }
    }
    Ok(())
}

async fn destroy(reconciler: &Reconciler, config: &SyncConfig) -> Result<()> {
    if is_dry_run(config) {
        warn!("Dry-run mode: listing what destroy would delete");
        for reference in reconciler.tracked_references().await? {
            info!("would destroy {}", reference);
        }
        return Ok(());
    }

    let destroyed = reconciler.destroy_all().await?;
    info!("Destroyed {} container(s), verifying", destroyed.len());

    let report = reconciler.verify_destroyed(&destroyed).await;
    info!("{}", report);
    report.into_result()?;
    Ok(())
}

fn is_dry_run(config: &SyncConfig) -> bool {
    match &config.connector {
        ConnectorConfig::Wapi { dry_run, .. } => *dry_run,
    }
}
