//! aclgen - network ACL generator
//!
//! Renders a vendor-neutral policy (JSON object graph) into configuration
//! artifacts for Arista EOS and OpenConfig.
//!
//! # Usage
//!
//! ```bash
//! aclgen render policies/edge.json                   # Every configured backend
//! aclgen render policies/edge.json --backend arista  # One backend
//! aclgen render policies/edge.json --stdout          # Print instead of writing
//! aclgen tokens openconfig                           # Supported tokens
//! aclgen diff policies/edge.json --backend arista --against filters/edge.eos
//! ```
//!
//! Rendering is all-or-nothing: every requested backend is rendered before
//! any artifact is written.

use aclgen::config::{AppConfig, load_config};
use aclgen::core::generator::RenderOptions;
use aclgen::core::naming::Definitions;
use aclgen::core::policy::{Platform, Policy};
use aclgen::core::{platform_tokens, render_platform};
use aclgen::utils::{checksum, compute_diff, ensure_state_dir, write_atomic};
use aclgen::{Error, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::{Level, debug, info};

shadow_rs::shadow!(build);

#[derive(Parser)]
#[command(name = "aclgen")]
#[command(about = "Render network ACL policies into platform configuration", long_about = None)]
#[command(version, long_version = build::CLAP_LONG_VERSION)]
struct Cli {
    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,
    /// Config file (default: <config dir>/aclgen/config.json)
    #[arg(long, value_name = "PATH", global = true)]
    config: Option<PathBuf>,
    /// Write logs to aclgen.log in the state directory instead of stderr
    #[arg(long, global = true)]
    log_file: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Render a policy for one or more backends
    Render {
        /// Policy object graph (JSON)
        policy: PathBuf,
        /// Backend to render (repeatable; default: backends from config)
        #[arg(short, long = "backend", value_name = "BACKEND")]
        backends: Vec<Platform>,
        /// Output directory (default: output_dir from config)
        #[arg(short, long, value_name = "DIR")]
        out: Option<PathBuf>,
        /// Directory of .net/.svc definitions (default: definitions_dir from config)
        #[arg(short, long, value_name = "DIR")]
        defs: Option<PathBuf>,
        /// Print artifacts instead of writing them
        #[arg(long)]
        stdout: bool,
    },
    /// List the tokens and restricted values a backend supports
    Tokens {
        /// Backend to describe
        backend: Platform,
    },
    /// Render a policy and diff it against an existing artifact
    Diff {
        /// Policy object graph (JSON)
        policy: PathBuf,
        /// Backend to render
        #[arg(short, long)]
        backend: Platform,
        /// Artifact on disk to compare with
        #[arg(long, value_name = "FILE")]
        against: PathBuf,
        /// Directory of .net/.svc definitions (default: definitions_dir from config)
        #[arg(short, long, value_name = "DIR")]
        defs: Option<PathBuf>,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose, cli.log_file);

    match run(cli) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {e}");
            if let Some(hint) = e.suggestion() {
                eprintln!("Hint: {hint}");
            }
            ExitCode::FAILURE
        }
    }
}

fn init_logging(verbose: u8, log_file: bool) {
    let level = match verbose {
        0 => Level::WARN,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    };

    if log_file
        && let Ok(Some(mut log_path)) = ensure_state_dir()
    {
        log_path.push("aclgen.log");
        if let Ok(file) = std::fs::File::create(&log_path) {
            tracing_subscriber::fmt()
                .with_max_level(level)
                .with_ansi(false)
                .with_writer(file)
                .init();
            return;
        }
    }

    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .init();
}

fn run(cli: Cli) -> Result<ExitCode> {
    let config = load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Render {
            policy,
            backends,
            out,
            defs,
            stdout,
        } => {
            let backends = if backends.is_empty() {
                config.backends.clone()
            } else {
                backends
            };
            let definitions = load_definitions(&config, defs.as_deref())?;
            let parsed = Policy::load(&policy)?;
            let options = RenderOptions::new(config.exp_info_weeks);

            let mut artifacts = Vec::with_capacity(backends.len());
            for platform in backends {
                debug!("Rendering {} for {platform}", policy.display());
                let text = render_platform(platform, &parsed, &definitions, &options)?;
                artifacts.push((platform, text));
            }

            if stdout {
                for (_, text) in &artifacts {
                    print!("{text}");
                }
                return Ok(ExitCode::SUCCESS);
            }

            let out_dir = out.unwrap_or_else(|| config.output_dir.clone());
            let stem = policy
                .file_stem()
                .and_then(|s| s.to_str())
                .ok_or_else(|| {
                    Error::Config(format!(
                        "cannot derive an artifact name from {}",
                        policy.display()
                    ))
                })?;
            for (platform, text) in &artifacts {
                let path = out_dir.join(format!("{stem}.{}", platform.file_extension()));
                write_atomic(&path, text)?;
                info!("Wrote {}", path.display());
                println!("{}  {}", checksum(text), path.display());
            }
        }
        Commands::Tokens { backend } => {
            let (tokens, sub_tokens) = platform_tokens(backend);
            println!("Supported tokens for {backend}:");
            for token in &tokens {
                match sub_tokens.get(token) {
                    Some(values) => println!(
                        "  {token}: {}",
                        values.iter().copied().collect::<Vec<_>>().join(", ")
                    ),
                    None => println!("  {token}"),
                }
            }
        }
        Commands::Diff {
            policy,
            backend,
            against,
            defs,
        } => {
            let definitions = load_definitions(&config, defs.as_deref())?;
            let parsed = Policy::load(&policy)?;
            let options = RenderOptions::new(config.exp_info_weeks);
            let rendered = render_platform(backend, &parsed, &definitions, &options)?;
            let existing = std::fs::read_to_string(&against)?;

            let old_name = against.display().to_string();
            let new_name = format!("{} ({backend})", policy.display());
            if let Some(diff) = compute_diff(&existing, &rendered, &old_name, &new_name) {
                print!("{diff}");
                return Ok(ExitCode::from(1));
            }
            println!("No differences");
        }
    }
    Ok(ExitCode::SUCCESS)
}

/// Loads definitions from `explicit` or the configured directory.
///
/// A missing configured directory yields empty definitions; any symbolic
/// name then fails as unresolved. An explicitly given directory must exist.
fn load_definitions(config: &AppConfig, explicit: Option<&Path>) -> Result<Definitions> {
    if let Some(dir) = explicit {
        return Definitions::load_dir(dir);
    }
    if config.definitions_dir.is_dir() {
        Definitions::load_dir(&config.definitions_dir)
    } else {
        debug!(
            "Definitions directory {} not found; continuing without definitions",
            config.definitions_dir.display()
        );
        Ok(Definitions::new())
    }
}
