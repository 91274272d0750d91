//! guestctl CLI entrypoint.
//!
//! This is the main entrypoint for the guestctl command-line tool. It
//! translates reconciliation outcomes into the process-level response
//! convention: a report on stdout and a non-zero exit on any fatal
//! failure, never a partial-success report.

use std::io::Write;
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use guestctl::cli::{Cli, Commands, OutputFormatter, ToolsStateArg};
use guestctl::config::{
    ConfigParser, ConfigValidator, GuestctlConfig, ToolsConfig, find_config_file,
};
use guestctl::error::Result;
use guestctl::planner::ApplyMode;
use guestctl::reconciler::Reconciler;
use guestctl::vsphere::{ConnectOptions, GuestObserver, ObjectKind, VsphereClient, WaitOptions};

use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Main entrypoint.
fn main() -> ExitCode {
    let cli = Cli::parse();

    // Initialize logging
    init_logging(cli.verbose);

    // Run async runtime
    let runtime = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("Failed to create async runtime: {e}");
            return ExitCode::FAILURE;
        }
    };

    match runtime.block_on(run(cli)) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}

/// Initializes the logging system.
fn init_logging(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

/// Main async entry point.
async fn run(cli: Cli) -> Result<()> {
    let formatter = OutputFormatter::new(cli.output);

    match cli.command {
        Commands::Init { path, force } => cmd_init(&path, force),
        Commands::Validate { warnings } => cmd_validate(cli.config.as_ref(), warnings, &formatter),
        Commands::Plan => cmd_plan(cli.config.as_ref(), &formatter).await,
        Commands::Apply { yes, timeout_secs } => {
            cmd_apply(cli.config.as_ref(), yes, timeout_secs, &formatter).await
        }
        Commands::Facts => cmd_facts(cli.config.as_ref(), &formatter).await,
        Commands::MigratePool {
            dry_run,
            no_wait,
            timeout_secs,
        } => cmd_migrate_pool(cli.config.as_ref(), dry_run, no_wait, timeout_secs, &formatter).await,
        Commands::Tools {
            state,
            dry_run,
            timeout_secs,
        } => cmd_tools(cli.config.as_ref(), state, dry_run, timeout_secs, &formatter).await,
    }
}

/// Initialize a new guestctl configuration.
fn cmd_init(path: &PathBuf, force: bool) -> Result<()> {
    info!("Initializing guestctl configuration in: {}", path.display());

    let config_path = path.join("guestctl.yaml");
    let env_path = path.join(".env.example");

    if !force && config_path.exists() {
        eprintln!("Configuration file already exists: {}", config_path.display());
        eprintln!("Use --force to overwrite.");
        return Ok(());
    }

    if !path.exists() {
        std::fs::create_dir_all(path)?;
    }

    let config_template = include_str!("../templates/guestctl.yaml");
    std::fs::write(&config_path, config_template)?;
    eprintln!("Created: {}", config_path.display());

    let env_template = include_str!("../templates/.env.example");
    std::fs::write(&env_path, env_template)?;
    eprintln!("Created: {}", env_path.display());

    eprintln!("\nConfiguration initialized!");
    eprintln!("Next steps:");
    eprintln!("  1. Copy .env.example to .env and fill in VSPHERE_PASSWORD");
    eprintln!("  2. Edit guestctl.yaml with your guest specification");
    eprintln!("  3. Run 'guestctl validate' to check your configuration");
    eprintln!("  4. Run 'guestctl plan' to see the pending changes");
    eprintln!("  5. Run 'guestctl apply' to reconcile the guest");

    Ok(())
}

/// Validate configuration.
fn cmd_validate(
    config_path: Option<&PathBuf>,
    show_warnings: bool,
    formatter: &OutputFormatter,
) -> Result<()> {
    let (config, result) = load_config(config_path)?;

    println!("{}", formatter.format_validation(&result, show_warnings));

    info!(
        "Validated guest {} on {}",
        config.guest.name,
        config.server()
    );
    Ok(())
}

/// Report the pending changes without applying them.
async fn cmd_plan(config_path: Option<&PathBuf>, formatter: &OutputFormatter) -> Result<()> {
    let (config, _) = load_config(config_path)?;
    let client = connect(&config).await?;

    let reconciler = Reconciler::new(&config, &client);
    let outcome = reconciler.reconcile(ApplyMode::DryRun).await?;

    println!("{}", formatter.format_report(&outcome.into_report()));
    Ok(())
}

/// Reconcile the guest to the desired state.
async fn cmd_apply(
    config_path: Option<&PathBuf>,
    yes: bool,
    timeout_secs: Option<u64>,
    formatter: &OutputFormatter,
) -> Result<()> {
    let (config, _) = load_config(config_path)?;

    if !yes && !confirm(&format!("Apply changes to guest {}?", config.guest.name))? {
        eprintln!("Aborted.");
        return Ok(());
    }

    let client = connect(&config).await?;
    let reconciler =
        Reconciler::new(&config, &client).with_wait_options(wait_options(timeout_secs));
    let outcome = reconciler.reconcile(ApplyMode::Apply).await?;

    println!("{}", formatter.format_report(&outcome.into_report()));
    Ok(())
}

/// Show the observed facts of the guest.
async fn cmd_facts(config_path: Option<&PathBuf>, formatter: &OutputFormatter) -> Result<()> {
    let (config, _) = load_config(config_path)?;
    let client = connect(&config).await?;

    let mut observer = GuestObserver::new(&client);
    let vm = observer
        .resolve(ObjectKind::VirtualMachine, &config.guest.name)
        .await?;
    let observed = observer.observe(&vm).await?;

    println!("{}", formatter.format_facts(&observed.facts()));
    Ok(())
}

/// Migrate the guest to the configured resource pool.
async fn cmd_migrate_pool(
    config_path: Option<&PathBuf>,
    dry_run: bool,
    no_wait: bool,
    timeout_secs: Option<u64>,
    formatter: &OutputFormatter,
) -> Result<()> {
    let (config, _) = load_config(config_path)?;
    let client = connect(&config).await?;

    let mode = if dry_run { ApplyMode::DryRun } else { ApplyMode::Apply };
    let reconciler =
        Reconciler::new(&config, &client).with_wait_options(wait_options(timeout_secs));
    let outcome = reconciler.migrate_pool(mode, !no_wait).await?;

    println!("{}", formatter.format_report(&outcome.into_report()));
    Ok(())
}

/// Check and optionally upgrade the in-guest tools.
async fn cmd_tools(
    config_path: Option<&PathBuf>,
    state: Option<ToolsStateArg>,
    dry_run: bool,
    timeout_secs: Option<u64>,
    formatter: &OutputFormatter,
) -> Result<()> {
    let (mut config, _) = load_config(config_path)?;

    // A --state flag overrides the configured policy for this run.
    if let Some(state) = state {
        let installer_options = config.guest.tools_installer_options().to_string();
        config.guest.tools = Some(ToolsConfig {
            state: state.into(),
            installer_options,
        });
    }

    let client = connect(&config).await?;
    let mode = if dry_run { ApplyMode::DryRun } else { ApplyMode::Apply };
    let reconciler =
        Reconciler::new(&config, &client).with_wait_options(wait_options(timeout_secs));
    let outcome = reconciler.ensure_tools(mode).await?;

    println!("{}", formatter.format_report(&outcome.into_report()));
    Ok(())
}

/// Loads, parses and validates the configuration.
fn load_config(
    config_path: Option<&PathBuf>,
) -> Result<(GuestctlConfig, guestctl::config::ValidationResult)> {
    let config_file = match config_path {
        Some(path) => path.clone(),
        None => find_config_file(std::env::current_dir()?)?,
    };

    let parser = ConfigParser::new().with_base_path(
        config_file
            .parent()
            .unwrap_or_else(|| std::path::Path::new(".")),
    );
    parser.load_dotenv()?;

    let config = parser.load_with_env(&config_file)?;
    let result = ConfigValidator::new().validate(&config)?;

    Ok((config, result))
}

/// Connects to the configured vCenter server.
async fn connect(config: &GuestctlConfig) -> Result<VsphereClient> {
    let password = ConfigParser::get_vsphere_password()?;

    let options = ConnectOptions {
        host: config.vcenter.host.clone(),
        port: config.vcenter.port,
        username: config.vcenter.username.clone(),
        password,
        insecure: config.vcenter.insecure,
    };

    VsphereClient::connect(&options).await
}

/// Builds the waiting parameters from CLI flags.
fn wait_options(timeout_secs: Option<u64>) -> WaitOptions {
    WaitOptions {
        deadline: timeout_secs.map(Duration::from_secs),
        ..WaitOptions::default()
    }
}

/// Asks the user for confirmation on stdin.
fn confirm(prompt: &str) -> Result<bool> {
    eprint!("{prompt} [y/N] ");
    std::io::stderr().flush()?;

    let mut answer = String::new();
    std::io::stdin().read_line(&mut answer)?;

    let answer = answer.trim().to_lowercase();
    Ok(answer == "y" || answer == "yes")
}
