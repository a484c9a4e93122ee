use std::{path::PathBuf, process::ExitCode};

use anyhow::Result;
use clap::{CommandFactory, Parser, Subcommand};
use display::controller_for;
use rotation::{Catalog, EngineOptions, RotationEngine};
use shared::{domain::WallpaperPath, error::RotationError};
use storage::Storage;
use tracing::debug;
use tracing_subscriber::EnvFilter;

mod config;

use config::{default_config_path, load_settings, write_default_config, InitOutcome, Settings};

#[derive(Parser, Debug)]
#[command(name = "wallman", version, about)]
struct Cli {
    /// Config file to read instead of ~/.config/wallman.yaml.
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Wallpaper backend (hyprpaper or macos).
    #[arg(long, global = true)]
    manager: Option<String>,
    /// Record the change without touching the desktop.
    #[arg(long, global = true)]
    dry_run: bool,
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Switch to the next wallpaper in the catalog.
    Next,
    /// Switch back to the wallpaper shown before the current one.
    Previous,
    /// Switch to a random wallpaper without repeats until all were shown.
    Random {
        /// Draw independently on every call; repeats are possible.
        #[arg(long)]
        true_random: bool,
    },
    /// Print the active wallpaper.
    Current,
    /// Print recent wallpapers, newest first.
    History {
        #[arg(long)]
        json: bool,
        limit: Option<usize>,
    },
    /// Set a specific image file as wallpaper.
    Set { path: String },
    /// Print every wallpaper in the configured directories.
    List {
        #[arg(long)]
        json: bool,
    },
    /// Print the effective configuration.
    Config {
        #[arg(long)]
        json: bool,
    },
    /// Write a default config file.
    Init,
}

#[tokio::main]
async fn main() -> ExitCode {
    init_tracing();

    let cli = Cli::parse();
    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => match err.downcast_ref::<RotationError>() {
            Some(rotation_err) => {
                eprintln!("error: {rotation_err}");
                ExitCode::from(rotation_err.code().exit_status() as u8)
            }
            None => {
                eprintln!("error: {err:#}");
                ExitCode::FAILURE
            }
        },
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

async fn run(cli: Cli) -> Result<()> {
    let Some(command) = cli.command else {
        Cli::command().print_help()?;
        println!();
        return Ok(());
    };

    if let Command::Init = command {
        let path = match cli.config {
            Some(path) => path,
            None => default_config_path()?,
        };
        match write_default_config(&path)? {
            InitOutcome::Created(path) => println!("wrote default config to {}", path.display()),
            InitOutcome::AlreadyExists(path) => {
                println!("config already exists at {}", path.display())
            }
        }
        return Ok(());
    }

    let settings = load_settings(cli.config.as_deref())?;
    debug!(?settings, "settings loaded");

    match command {
        Command::Config { json } => {
            let rendered = if json {
                serde_json::to_string_pretty(&settings)?
            } else {
                serde_yaml::to_string(&settings)?
            };
            print!("{}", rendered.trim_end());
            println!();
            return Ok(());
        }
        Command::List { json } => {
            let catalog = scan_catalog(&settings)?;
            if json {
                println!("{}", serde_json::to_string_pretty(catalog.as_slice())?);
            } else {
                for wallpaper in catalog.iter() {
                    println!("{wallpaper}");
                }
            }
            return Ok(());
        }
        _ => {}
    }

    let catalog = match command {
        Command::Next | Command::Random { .. } => scan_catalog(&settings)?,
        _ => Catalog::default(),
    };
    let storage = Storage::new(&settings.database_url()?)
        .await
        .map_err(RotationError::Storage)?;
    let display = controller_for(settings.manager_kind(cli.manager.as_deref())?);
    let mut engine = RotationEngine::new(
        storage,
        catalog,
        display,
        EngineOptions {
            dry_run: cli.dry_run,
        },
    );

    match command {
        Command::Next => report_change(engine.next().await?, cli.dry_run),
        Command::Previous => report_change(engine.previous().await?, cli.dry_run),
        Command::Random { true_random } => {
            report_change(engine.random(true_random).await?, cli.dry_run)
        }
        Command::Set { path } => report_change(engine.set(&path).await?, cli.dry_run),
        Command::Current => println!("{}", engine.current().await?),
        Command::History { json, limit } => {
            let history = engine
                .history(limit.unwrap_or(settings.history_limit))
                .await?;
            if json {
                let paths: Vec<&WallpaperPath> = history.iter().map(|entry| &entry.path).collect();
                println!("{}", serde_json::to_string_pretty(&paths)?);
            } else {
                for entry in &history {
                    println!(
                        "{}  {}",
                        entry.set_at.format("%Y-%m-%d %H:%M:%S"),
                        entry.path
                    );
                }
            }
        }
        Command::List { .. } | Command::Config { .. } | Command::Init => {}
    }

    Ok(())
}

fn scan_catalog(settings: &Settings) -> Result<Catalog> {
    let dirs = settings.wallpaper_dirs()?;
    let catalog = Catalog::scan(&dirs, settings.travel_sub_directories)
        .map_err(|err| RotationError::validation(err.to_string()))?;
    debug!(count = catalog.len(), "catalog scanned");
    Ok(catalog)
}

fn report_change(path: WallpaperPath, dry_run: bool) {
    if dry_run {
        println!("dry run: would set {path}");
    } else {
        println!("{path}");
    }
}
