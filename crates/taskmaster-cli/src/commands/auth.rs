//! Account command handlers

use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::Utc;

use taskmaster_core::{Config, PocketBaseBackend};

use crate::output::Output;
use crate::prompt;

/// Log in and store the session token in the config file
pub async fn login(
    mut config: Config,
    config_path: Option<&PathBuf>,
    email: String,
    password: Option<String>,
    output: &Output,
) -> Result<()> {
    let password = match password {
        Some(p) => p,
        None => prompt::password("Password")?,
    };

    let backend = PocketBaseBackend::from_config(&config);
    let session = backend
        .authenticate(&email, &password)
        .await
        .context("Login failed")?;

    if !session.is_valid(Utc::now()) {
        output.warning("The backend returned a token that is already expired.");
    }

    config.auth_token = Some(session.token);
    save(&config, config_path)?;

    let who = if session.user.name.is_empty() {
        session.user.email
    } else {
        session.user.name
    };
    output.success(&format!("Logged in as {}", who));
    Ok(())
}

/// Forget the stored session token
pub fn logout(mut config: Config, config_path: Option<&PathBuf>, output: &Output) -> Result<()> {
    if config.auth_token.take().is_none() {
        output.message("Not logged in.");
        return Ok(());
    }

    save(&config, config_path)?;
    output.success("Logged out");
    Ok(())
}

/// Create an account; logging in is a separate step
pub async fn signup(
    config: &Config,
    email: String,
    password: Option<String>,
    output: &Output,
) -> Result<()> {
    let password = match password {
        Some(p) => p,
        None => prompt::password("Choose a password")?,
    };

    let backend = PocketBaseBackend::from_config(config);
    let user = backend
        .sign_up(&email, &password)
        .await
        .context("Failed to create account")?;

    output.success(&format!("Created account {} ({})", user.email, user.id));
    output.message(&format!("Log in with: taskmaster login {}", email));
    Ok(())
}

fn save(config: &Config, config_path: Option<&PathBuf>) -> Result<()> {
    let path = config_path
        .cloned()
        .unwrap_or_else(Config::config_file_path);
    config
        .save_to_path(&path)
        .context("Failed to save configuration")
}
