//! Show which package satisfies a dependency (apkvin resolve)

use crate::config::Config;
use crate::sources::Indexes;
use anyhow::{Context, Result};
use apkvin_package::{load_index, Constraint, Resolver};

/// Run the resolve command
pub fn run(config: &Config, dependency: &str) -> Result<()> {
    let constraint = Constraint::parse(dependency).context("Invalid dependency")?;

    let source = Indexes::new(config.settings.timeout())?;
    let loaded = load_index(&source, &config.repositories())
        .context("Failed to load repository indexes")?;

    match Resolver::new(&loaded.index)
        .resolve(&constraint)
        .with_context(|| format!("Failed to resolve {}", constraint))?
    {
        Some(package) => println!(
            "{} {} ({})",
            package.name,
            package.version,
            package.tarball_url()
        ),
        None => println!("{} is an anti-dependency; nothing to install", constraint),
    }

    Ok(())
}
