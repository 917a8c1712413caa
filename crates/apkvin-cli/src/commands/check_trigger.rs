//! Report whether a package archive ships a trigger (apkvin check-trigger)

use anyhow::{Context, Result};
use apkvin_package::{has_trigger, TRIGGER_FILE};
use std::path::Path;

/// Run the check-trigger command
///
/// Prints `true` or `false`. With `quiet`, prints nothing and reports
/// through the exit code instead.
pub fn run(archive: &Path, quiet: bool) -> Result<bool> {
    let found = has_trigger(archive)
        .with_context(|| format!("Failed to read {}", archive.display()))?;

    if !quiet {
        println!("{}", found);
    }
    tracing::info!(
        "{}: {} {}",
        archive.display(),
        TRIGGER_FILE,
        if found { "present" } else { "absent" }
    );

    Ok(found)
}
