use anyhow::{Context, Result};
use std::path::Path;
use std::process::Command;

/// Programs that open a file in the default browser, with their leading args
#[cfg(target_os = "macos")]
const OPENERS: &[(&str, &[&str])] = &[("open", &[])];

#[cfg(target_os = "windows")]
const OPENERS: &[(&str, &[&str])] = &[("cmd", &["/C", "start", ""])];

#[cfg(not(any(target_os = "macos", target_os = "windows")))]
const OPENERS: &[(&str, &[&str])] = &[
    ("xdg-open", &[]),
    ("gio", &["open"]),
    ("sensible-browser", &[]),
];

/// Open a local file in the system browser
pub fn open(path: &Path) -> Result<()> {
    let path = path
        .canonicalize()
        .with_context(|| format!("Cannot open {}", path.display()))?;

    let mut command = opener_command()?;
    command.arg(&path);
    log::debug!("Opening map with {:?}", command);

    let status = command.status().context("Failed to launch browser")?;
    if !status.success() {
        anyhow::bail!("Browser launcher exited with {}", status);
    }
    Ok(())
}

fn opener_command() -> Result<Command> {
    for (program, args) in OPENERS {
        if let Ok(found) = which::which(program) {
            let mut command = Command::new(found);
            command.args(*args);
            return Ok(command);
        }
    }

    let tried: Vec<&str> = OPENERS.iter().map(|(program, _)| *program).collect();
    anyhow::bail!("No browser launcher found (tried {})", tried.join(", "))
}
