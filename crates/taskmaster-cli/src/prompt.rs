//! Interactive prompts

use anyhow::{bail, Result};
use std::io::{self, Write};

/// Prompt for confirmation
///
/// Returns true if user confirms, false otherwise.
/// In non-interactive mode (no TTY), returns false.
pub fn confirm(prompt: &str) -> Result<bool> {
    if !atty::is(atty::Stream::Stdin) {
        return Ok(false);
    }

    print!("{} [y/N] ", prompt);
    io::stdout().flush()?;

    let input = read_line()?.to_lowercase();
    Ok(input == "y" || input == "yes")
}

/// Prompt with a default value, returns None if user keeps default
pub fn prompt_with_default(prompt: &str, default: &str) -> Result<Option<String>> {
    if default.is_empty() {
        print!("{}: ", prompt);
    } else {
        print!("{} [{}]: ", prompt, default);
    }
    io::stdout().flush()?;

    let input = read_line()?;
    Ok(if input.is_empty() { None } else { Some(input) })
}

/// Read a password from `TASKMASTER_PASSWORD` or standard input
///
/// Typed input is echoed to the terminal. Set `TASKMASTER_PASSWORD` (or pass
/// `--password`) to keep it off the screen.
pub fn password(prompt: &str) -> Result<String> {
    if let Some(value) = env_password(std::env::var("TASKMASTER_PASSWORD").ok()) {
        return Ok(value);
    }

    if atty::is(atty::Stream::Stdin) {
        eprintln!("Note: the password is echoed. Set TASKMASTER_PASSWORD to avoid typing it here.");
        print!("{}: ", prompt);
        io::stdout().flush()?;
    }

    require_password(read_line()?)
}

fn env_password(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}

fn require_password(input: String) -> Result<String> {
    if input.is_empty() {
        bail!("Password is required. Pass --password or set TASKMASTER_PASSWORD.");
    }
    Ok(input)
}

fn read_line() -> Result<String> {
    let mut input = String::new();
    io::stdin().read_line(&mut input)?;
    Ok(input.trim().to_string())
}
