//! ctup - command line frontend
//!
//! Lists, installs and removes compatibility tools for Steam, Lutris, Heroic,
//! Bottles and WineZGUI.

use std::io::Write;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::atomic::Ordering;
use std::sync::{mpsc, Arc};
use std::time::Duration;

use clap::{Parser, Subcommand};

use ctup::config::AppConfig;
use ctup::ctmods::{find_variant, variants_for_launcher, CompatTool, ToolModule, ToolVariant, VARIANTS};
use ctup::installed::{list_installed, remove_tool};
use ctup::launcher::{
    available_install_locations, create_compatibilitytools_folders, get_launcher_from_installdir,
    possible_install_locations, LauncherKind,
};
use ctup::logging::{init_logger, log_info, log_warning};
use ctup::registry::{is_online, RegistryClient, UreqTransport};
use ctup::worker::{InstallRequest, InstallWorker, WorkerEvent};
use ctup::ErrorKind;

#[derive(Parser, Debug)]
#[command(
    name = "ctup",
    version,
    about = "Install and update Proton/Wine compatibility tools for Linux game launchers"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// List tool variants
    Tools {
        /// Only variants supported by this launcher
        #[arg(long)]
        launcher: Option<LauncherKind>,
    },
    /// List launcher install locations
    Locations {
        /// Include locations of launchers that are not installed
        #[arg(long)]
        all: bool,
    },
    /// List available releases of a tool
    Releases {
        tool: String,
        #[arg(long, default_value_t = 30)]
        count: u32,
        #[arg(long, default_value_t = 1)]
        page: u32,
    },
    /// Install a tool (latest release when no version is given)
    Install {
        tool: String,
        version: Option<String>,
        #[arg(long, short = 'd')]
        install_dir: Option<PathBuf>,
        #[arg(long)]
        temp_dir: Option<PathBuf>,
    },
    /// List installed tools
    Installed {
        #[arg(long, short = 'd')]
        install_dir: Option<PathBuf>,
    },
    /// Remove an installed tool
    Remove {
        name: String,
        #[arg(long, short = 'd')]
        install_dir: Option<PathBuf>,
    },
    /// Print the info page of a tool version
    Info { tool: String, version: Option<String> },
}

fn registry_client(config: &AppConfig) -> RegistryClient {
    RegistryClient::new(Arc::new(UreqTransport::new()), config.access_tokens())
}

fn lookup_variant(name: &str) -> Result<&'static ToolVariant, String> {
    find_variant(name).ok_or_else(|| {
        let known: Vec<&str> = VARIANTS.iter().map(|v| v.name).collect();
        format!("Unknown tool '{}'. Known tools: {}", name, known.join(", "))
    })
}

/// Explicit directory, then the last used one if it fits the tool, then the
/// first available location accepting the tool.
fn pick_install_dir(
    explicit: Option<PathBuf>,
    variant: &ToolVariant,
    config: &AppConfig,
) -> Option<PathBuf> {
    explicit
        .or_else(|| {
            config
                .install_dir
                .clone()
                .filter(|d| d.is_dir() && variant.supports(get_launcher_from_installdir(d)))
        })
        .or_else(|| {
            available_install_locations(config)
                .into_iter()
                .find(|l| l.accepts(variant.launchers, variant.flavor))
                .map(|l| l.install_dir)
        })
}

fn default_install_dir(explicit: Option<PathBuf>, config: &AppConfig) -> Option<PathBuf> {
    explicit.or_else(|| config.install_dir.clone()).or_else(|| {
        available_install_locations(config)
            .into_iter()
            .next()
            .map(|l| l.install_dir)
    })
}

fn install(
    config: &mut AppConfig,
    tool: &str,
    version: Option<String>,
    install_dir: Option<PathBuf>,
    temp_dir: Option<PathBuf>,
) -> Result<ExitCode, String> {
    let variant = lookup_variant(tool)?;
    create_compatibilitytools_folders();
    let install_dir = pick_install_dir(install_dir, variant, config)
        .ok_or_else(|| format!("No install location found for {}; pass --install-dir", variant.name))?;
    let temp_dir = temp_dir.unwrap_or_else(|| config.get_temp_dir());

    let module = Arc::new(ToolModule::new(variant, registry_client(config)));
    let cancel = module.cancel_handle();
    if let Err(e) = ctrlc::set_handler(move || cancel.store(true, Ordering::SeqCst)) {
        log_warning(&format!("Could not install Ctrl-C handler: {}", e));
    }

    let (tx, rx) = mpsc::channel();
    let worker = InstallWorker::spawn(tx);
    worker.submit(InstallRequest {
        module: module.clone(),
        version: version.unwrap_or_default(),
        install_dir: install_dir.clone(),
        temp_dir,
    });

    let mut exit = ExitCode::FAILURE;
    for event in rx.iter() {
        match event {
            WorkerEvent::Started { tool, version } => {
                let version = if version.is_empty() { "latest" } else { version.as_str() };
                println!("Installing {} {} into {}", tool, version, install_dir.display());
            }
            WorkerEvent::Progress { tool, percent } if percent >= 0 => {
                print!("\r{}: {:>3}%", tool, percent);
                let _ = std::io::stdout().flush();
            }
            WorkerEvent::Progress { .. } => {}
            WorkerEvent::Finished { result, .. } => {
                println!();
                match result {
                    Ok(path) => {
                        println!("Installed {}", path.display());
                        config.install_dir = Some(install_dir.clone());
                        config.save();
                        exit = ExitCode::SUCCESS;
                    }
                    Err(e) if e.kind() == ErrorKind::AlreadyInstalled => {
                        println!("{}", e);
                        exit = ExitCode::SUCCESS;
                    }
                    Err(e) => eprintln!("{}", e),
                }
                break;
            }
        }
    }

    worker.shutdown();
    Ok(exit)
}

fn run(cli: Cli) -> Result<ExitCode, String> {
    let mut config = AppConfig::load();

    match cli.command {
        Commands::Tools { launcher } => {
            let variants: Vec<&ToolVariant> = match launcher {
                Some(l) => variants_for_launcher(l).collect(),
                None => VARIANTS.iter().collect(),
            };
            for v in variants {
                let launchers: Vec<&str> = v.launchers.iter().map(|l| l.as_str()).collect();
                println!("{:<16} [{}] {}", v.name, launchers.join(", "), v.description);
            }
        }
        Commands::Locations { all } => {
            let locations = if all {
                possible_install_locations()
            } else {
                available_install_locations(&config)
            };
            for l in locations {
                println!("{:<22} {}", l.display_name, l.install_dir.display());
            }
        }
        Commands::Releases { tool, count, page } => {
            let variant = lookup_variant(&tool)?;
            if !is_online(variant.registry_url(), Duration::from_secs(5)) {
                return Err(format!("{} is not reachable", variant.registry_url()));
            }
            let module = ToolModule::new(variant, registry_client(&config));
            for version in module.fetch_releases(count, page).map_err(|e| e.to_string())? {
                println!("{}", version);
            }
        }
        Commands::Install {
            tool,
            version,
            install_dir,
            temp_dir,
        } => return install(&mut config, &tool, version, install_dir, temp_dir),
        Commands::Installed { install_dir } => {
            let dir = default_install_dir(install_dir, &config)
                .ok_or("No install location found; pass --install-dir")?;
            for t in list_installed(&dir) {
                println!(
                    "{:<32} {:>8.1} MiB{}",
                    t.name,
                    t.size_bytes as f64 / (1024.0 * 1024.0),
                    if t.verified { "" } else { "  (unverified)" }
                );
            }
        }
        Commands::Remove { name, install_dir } => {
            let dir = default_install_dir(install_dir, &config)
                .ok_or("No install location found; pass --install-dir")?;
            if !remove_tool(&dir, &name).map_err(|e| e.to_string())? {
                return Err(format!("{} is not installed in {}", name, dir.display()));
            }
            println!("Removed {}", name);
        }
        Commands::Info { tool, version } => {
            let variant = lookup_variant(&tool)?;
            let module = ToolModule::new(variant, registry_client(&config));
            println!("{}", module.get_info_url(version.as_deref().unwrap_or_default()));
        }
    }

    Ok(ExitCode::SUCCESS)
}

fn main() -> ExitCode {
    init_logger();
    log_info("ctup starting up...");

    match run(Cli::parse()) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}
