//! Declaration loading and output handling.

use std::fs;
use std::io::{self, Write};
use std::path::Path;

use anyhow::{bail, Context};
use oxide_reconcile::declaration::Declaration;

/// Reads and parses a JSON declaration document.
///
/// # Errors
///
/// Returns an error if the file cannot be read or is not a valid
/// declaration document.
pub fn load_declaration(path: &Path) -> anyhow::Result<Declaration> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("Failed to read declaration {}", path.display()))?;
    serde_json::from_str(&text)
        .with_context(|| format!("Failed to parse declaration {}", path.display()))
}

/// Picks the target database: the command-line value wins over the document.
///
/// # Errors
///
/// Returns an error if neither names a non-empty database.
pub fn resolve_database(flag: Option<&str>, declaration: &Declaration) -> anyhow::Result<String> {
    match flag.or(declaration.database.as_deref()) {
        Some(database) if !database.is_empty() => Ok(database.to_string()),
        _ => bail!("No target database: pass --database or set `database` in the declaration"),
    }
}

/// Writes the script to `output`, or to stdout when absent.
///
/// # Errors
///
/// Returns an error if the file or stdout cannot be written.
pub fn write_script(output: Option<&Path>, script: &str) -> anyhow::Result<()> {
    match output {
        Some(path) => fs::write(path, script)
            .with_context(|| format!("Failed to write script {}", path.display())),
        None => {
            let mut stdout = io::stdout().lock();
            stdout.write_all(script.as_bytes())?;
            stdout.flush()?;
            Ok(())
        }
    }
}
