//! Generate manifests (apkvin generate)

use crate::config::Config;
use crate::sources::{Fetchers, Indexes};
use anyhow::{Context, Result};
use apkvin_package::{Pipeline, Progress, RunReport, Synthesizer};
use indicatif::{ProgressBar, ProgressStyle};

/// Arguments for the generate command
#[derive(Debug, Clone)]
pub struct GenerateArgs {
    pub config: Config,
    /// Hide the progress bar
    pub quiet: bool,
}

/// indicatif bar over the synthesis pass
struct BarProgress {
    bar: ProgressBar,
}

impl BarProgress {
    fn new(quiet: bool) -> Result<Self> {
        if quiet {
            return Ok(Self {
                bar: ProgressBar::hidden(),
            });
        }

        let bar = ProgressBar::new(0);
        bar.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} {msg}")
                .context("Invalid progress template")?
                .progress_chars("#>-"),
        );
        Ok(Self { bar })
    }
}

impl Progress for BarProgress {
    fn start(&self, total: usize) {
        self.bar.set_length(total as u64);
    }

    fn advance(&self, package: &str) {
        self.bar.set_message(package.to_string());
        self.bar.inc(1);
    }

    fn finish(&self) {
        self.bar.finish_and_clear();
    }
}

/// Run the generate command
pub fn run(args: GenerateArgs) -> Result<()> {
    let settings = &args.config.settings;
    let repositories = args.config.repositories();
    let output_dir = settings.output_dir();
    let download_dir = settings
        .download_dir()
        .context("Failed to determine download directory")?;

    let synthesizer = Synthesizer::new(
        &output_dir,
        Fetchers::new(&download_dir, settings.timeout())?,
    )
    .with_commands(args.config.command_template())
    .with_install_script(settings.install_script());

    let pipeline = Pipeline::new(Indexes::new(settings.timeout())?, synthesizer)
        .with_jobs(settings.jobs());

    if !args.quiet {
        println!(
            "Indexing {} repositories into {}",
            repositories.len(),
            output_dir.display()
        );
    }

    let loaded = pipeline
        .build_index(&repositories)
        .context("Failed to load repository indexes")?;
    for repository in &loaded.unreachable {
        eprintln!("warning: skipped unreachable repository {}", repository);
    }

    let progress = BarProgress::new(args.quiet)?;
    let report = pipeline.run(&loaded, &progress);

    print_report(&report, args.quiet);
    Ok(())
}

fn print_report(report: &RunReport, quiet: bool) {
    if !quiet {
        println!(
            "Wrote {} manifests ({} already present, {} failed, {} records dropped)",
            report.written,
            report.skipped,
            report.failures.len(),
            report.dropped.len()
        );
    }

    if !report.dropped.is_empty() {
        eprintln!("\nDropped index records:");
        for (record, error) in &report.dropped {
            eprintln!("  {}: {}", record, error);
        }
    }

    if !report.failures.is_empty() {
        eprintln!("\nPackages without a manifest:");
        for (package, error) in &report.failures {
            eprintln!("  {}: {}", package, error);
        }
    }
}
