mod cli; // Admin console

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use log::{error, info};

use hearth_core::kernel::bootstrap::Application;
use hearth_core::kernel::error::Result;
use hearth_core::plugin_system::{MountPoint, PackageBuilder, PluginManager};
use hearth_core::storage::config::HostConfig;
use hearth_core::utils::error_chain;

/// Hearth: an extension host for long-running servers
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct CliArgs {
    /// Directory scanned for plugin packages (overrides the config file)
    #[arg(long, global = true)]
    plugins_dir: Option<PathBuf>,

    /// Host configuration file (.json, .yaml or .toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Log at debug level
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Boot the host and read admin commands from stdin (the default)
    Run,
    /// Scan the plugins directory and print the load plan
    Scan,
    /// Build a plugin package
    Pack {
        /// Package name (the archive is written as <name>.<extension>)
        name: String,
        /// Load stage: before, after or no-load
        #[arg(long, default_value = "after", value_parser = parse_mount_point)]
        mount_point: MountPoint,
        /// Package this one depends on (repeatable)
        #[arg(long = "depends", value_name = "PACKAGE")]
        dependencies: Vec<String>,
        /// Entry symbol named in the manifest
        #[arg(long)]
        entry_point: String,
        /// Native library to bundle
        #[arg(long)]
        library: Option<PathBuf>,
        /// Output directory (defaults to the plugins directory)
        #[arg(long)]
        out: Option<PathBuf>,
    },
}

fn parse_mount_point(value: &str) -> std::result::Result<MountPoint, String> {
    MountPoint::parse(value).ok_or_else(|| format!("invalid mount point '{}' (use before, after or no-load)", value))
}

fn load_config(args: &CliArgs) -> Result<HostConfig> {
    let mut config = match &args.config {
        Some(path) => HostConfig::load(path)?,
        None => HostConfig::default(),
    };
    if let Some(dir) = &args.plugins_dir {
        config.plugins_dir = dir.clone();
    }
    Ok(config)
}

fn init_logging(args: &CliArgs, config: &HostConfig) {
    let level = if args.verbose {
        "debug".to_string()
    } else {
        config.log_level.clone().unwrap_or_else(|| "info".to_string())
    };
    let _ = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).try_init();
}

fn join_or_none(items: &[String]) -> String {
    if items.is_empty() {
        "(none)".to_string()
    } else {
        items.join(", ")
    }
}

async fn run(config: HostConfig) -> Result<()> {
    let mut app = Application::new(config);
    let report = app.boot().await?;
    for (name, reason) in report.pre_world.failed.iter().chain(report.post_world.failed.iter()) {
        println!("Failed to activate {}: {}", name, reason);
    }

    let manager = app.plugin_manager();
    println!("Hearth ready. Plugins: {}", manager.readable_plugin_list().await);

    let console_result = cli::run_console(manager.as_ref()).await;

    println!("Shutting down...");
    app.shutdown().await?;
    console_result
}

async fn scan(config: HostConfig) -> Result<()> {
    let app = Application::new(config);
    let summary = app.plugin_manager().scan().await?;
    println!("Pre-world order: {}", join_or_none(&summary.pre_order));
    println!("Post-world order: {}", join_or_none(&summary.post_order));
    println!("No-load: {}", join_or_none(&summary.no_load));
    println!("Skipped: {}", summary.skipped);
    Ok(())
}

fn pack(
    config: &HostConfig,
    name: &str,
    mount_point: MountPoint,
    dependencies: &[String],
    entry_point: &str,
    library: Option<&PathBuf>,
    out: Option<&PathBuf>,
) -> Result<()> {
    let mut builder = PackageBuilder::new(name)
        .mount_point(mount_point)
        .dependencies(dependencies)
        .entry_point(entry_point);
    if let Some(library) = library {
        let data = std::fs::read(library).map_err(|e| hearth_core::KernelError::io(e, "read_library", library.clone()))?;
        let entry = library
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .ok_or_else(|| format!("'{}' is not a file", library.display()))?;
        builder = builder.native_library(&entry, data);
    }

    let out_dir = out.unwrap_or(&config.plugins_dir);
    std::fs::create_dir_all(out_dir).map_err(|e| hearth_core::KernelError::io(e, "create_dir_all", out_dir.clone()))?;
    let path = builder.write_to_dir(out_dir, &config.package_extension)?;
    println!("Wrote {}", path.display());
    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = CliArgs::parse();

    let config = match load_config(&args) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load configuration: {}", error_chain(&e));
            return ExitCode::FAILURE;
        }
    };
    init_logging(&args, &config);
    info!("Plugins directory: {}", config.plugins_dir.display());

    let result = match args.command.unwrap_or(Commands::Run) {
        Commands::Run => run(config).await,
        Commands::Scan => scan(config).await,
        Commands::Pack {
            name,
            mount_point,
            dependencies,
            entry_point,
            library,
            out,
        } => pack(
            &config,
            &name,
            mount_point,
            &dependencies,
            &entry_point,
            library.as_ref(),
            out.as_ref(),
        ),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            let chain = error_chain(&e);
            error!("{}", chain);
            eprintln!("Error: {}", chain);
            ExitCode::FAILURE
        }
    }
}
