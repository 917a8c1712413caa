use anyhow::Result;
use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::{generate, Shell};
use std::io;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

mod commands;
mod config;
mod sources;

/// Generate vinyl install manifests from Alpine package repositories.
///
/// apkvin reads APKINDEX files, resolves every package's dependencies
/// against the union of all configured repositories, and writes one
/// manifest.toml per package version under <output>/<name>/<version>/.
///
/// EXAMPLES:
///     apkvin generate                       Use apkvin.toml or the defaults
///     apkvin generate -o manifests -j 8     Parallel run into ./manifests
///     apkvin resolve 'so:libssl.so.3>=3'    Show the chosen provider
///     apkvin check-trigger foo-1.0-r0.apk   Does the package ship a trigger?
///
/// ENVIRONMENT VARIABLES:
///     APKVIN_CONFIG        Path to apkvin.toml
///     APKVIN_MIRROR        Mirror base URL
///     APKVIN_OUTPUT_DIR    Manifest output directory
///     APKVIN_DOWNLOAD_DIR  Scratch directory for downloads
///     APKVIN_JOBS          Worker threads
///     RUST_LOG             Log filter (default: warn)
#[derive(Parser)]
#[command(name = "apkvin")]
#[command(version)]
#[command(propagate_version = true)]
struct Cli {
    /// Configuration file (default: nearest apkvin.toml upward)
    #[arg(long, short = 'c', global = true, env = "APKVIN_CONFIG")]
    config: Option<PathBuf>,

    /// Log progress at info level
    #[arg(long, short = 'v', global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write manifests for every package in the configured repositories
    ///
    /// Existing manifests are left untouched, so re-running only fills in
    /// new package versions. Packages whose dependencies cannot be
    /// resolved are reported at the end and get no manifest.
    ///
    /// EXAMPLES:
    ///     apkvin generate
    ///     apkvin generate --output-dir manifests --jobs 8
    ///     apkvin generate -r https://dl-cdn.alpinelinux.org/alpine/edge/main/x86_64
    ///     apkvin generate -r /srv/mirror/v3.15/main/x86_64
    #[command(visible_alias = "g")]
    Generate {
        /// Root of the manifest tree
        #[arg(long, short = 'o')]
        output_dir: Option<PathBuf>,
        /// Worker threads
        #[arg(long, short = 'j')]
        jobs: Option<usize>,
        /// Repository base URL or mirror directory (repeatable; replaces
        /// the configured list)
        #[arg(long = "repository", short = 'r')]
        repositories: Vec<String>,
        /// No progress bar or summary
        #[arg(long, short = 'q')]
        quiet: bool,
    },

    /// Show which package a dependency string resolves to
    ///
    /// EXAMPLES:
    ///     apkvin resolve musl
    ///     apkvin resolve 'so:libcrypto.so.1.1>=1.1.1'
    Resolve {
        /// Dependency string, e.g. "libfoo>=1.2" or "!bar"
        dependency: String,
        /// Repository base URL or mirror directory (repeatable)
        #[arg(long = "repository", short = 'r')]
        repositories: Vec<String>,
    },

    /// Check whether a package archive contains a .trigger file
    ///
    /// Prints true or false. With --quiet nothing is printed and the exit
    /// status is 0 when a trigger is present, 1 otherwise.
    CheckTrigger {
        /// Path to a .apk (gzip-compressed tar) archive
        archive: PathBuf,
        /// Report through the exit status only
        #[arg(long, short = 'q')]
        quiet: bool,
    },

    /// Generate shell completions
    ///
    /// EXAMPLES:
    ///     apkvin completions bash > ~/.bash_completions/apkvin.bash
    ///     apkvin completions zsh > ~/.zfunc/_apkvin
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

/// Install the stderr log subscriber. RUST_LOG wins over --verbose.
fn init_tracing(verbose: bool) {
    let default = if verbose { "info" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .init();
}

fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Commands::Generate {
            output_dir,
            jobs,
            repositories,
            quiet,
        } => {
            let overrides = config::Overrides {
                output_dir,
                jobs,
                repositories,
            };
            let args = commands::generate::GenerateArgs {
                config: config::Config::load(cli.config.as_deref(), overrides)?,
                quiet,
            };
            commands::generate::run(args)?;
        }
        Commands::Resolve {
            dependency,
            repositories,
        } => {
            let overrides = config::Overrides {
                repositories,
                ..Default::default()
            };
            let config = config::Config::load(cli.config.as_deref(), overrides)?;
            commands::resolve::run(&config, &dependency)?;
        }
        Commands::CheckTrigger { archive, quiet } => {
            let found = commands::check_trigger::run(&archive, quiet)?;
            if quiet && !found {
                return Ok(ExitCode::FAILURE);
            }
        }
        Commands::Completions { shell } => {
            let mut cmd = Cli::command();
            let name = cmd.get_name().to_string();
            generate(shell, &mut cmd, name, &mut io::stdout());
        }
    }

    Ok(ExitCode::SUCCESS)
}
