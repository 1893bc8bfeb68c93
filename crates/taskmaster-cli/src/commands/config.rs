//! Config command handlers

use std::path::PathBuf;

use anyhow::{bail, Context, Result};

use taskmaster_core::Config;

use crate::output::{Output, OutputFormat};

const KEYS: &str =
    "data_dir, backend_url, collection, auth_collection, probe_interval_secs, cache_enabled, log_file";

/// Show current configuration
pub fn show(config_path: Option<&PathBuf>, output: &Output) -> Result<()> {
    let config =
        Config::load_with_cli_override(config_path).context("Failed to load configuration")?;

    match output.format {
        OutputFormat::Json => {
            println!(
                "{}",
                serde_json::json!({
                    "data_dir": config.data_dir,
                    "backend_url": config.backend_url,
                    "collection": config.collection,
                    "auth_collection": config.auth_collection,
                    "logged_in": config.auth_token.is_some(),
                    "probe_interval_secs": config.probe_interval_secs,
                    "cache_enabled": config.cache_enabled,
                    "log_file": config.log_file
                })
            );
        }
        OutputFormat::Quiet => {
            println!("{}", config.backend_url);
        }
        OutputFormat::Human => {
            let effective_path = config_path
                .cloned()
                .unwrap_or_else(Config::config_file_path);
            println!("Configuration:");
            println!("  data_dir:            {}", config.data_dir.display());
            println!("  backend_url:         {}", config.backend_url);
            println!("  collection:          {}", config.collection);
            println!("  auth_collection:     {}", config.auth_collection);
            println!(
                "  auth_token:          {}",
                if config.auth_token.is_some() {
                    "(set)"
                } else {
                    "(not set)"
                }
            );
            println!("  probe_interval_secs: {}", config.probe_interval_secs);
            println!("  cache_enabled:       {}", config.cache_enabled);
            println!(
                "  log_file:            {}",
                config
                    .log_file
                    .as_ref()
                    .map(|p| p.display().to_string())
                    .unwrap_or_else(|| "(not set)".to_string())
            );
            println!();
            println!("Config file: {}", effective_path.display());
        }
    }

    Ok(())
}

/// Set a configuration value
pub fn set(
    key: String,
    value: String,
    config_path: Option<&PathBuf>,
    output: &Output,
) -> Result<()> {
    let mut config =
        Config::load_with_cli_override(config_path).context("Failed to load configuration")?;

    apply(&mut config, &key, &value)?;

    // Save to the CLI-specified path or default
    let save_path = config_path
        .cloned()
        .unwrap_or_else(Config::config_file_path);
    config
        .save_to_path(&save_path)
        .context("Failed to save configuration")?;

    output.success(&format!("Set {} = {}", key, value));

    Ok(())
}

fn apply(config: &mut Config, key: &str, value: &str) -> Result<()> {
    match key {
        "data_dir" => {
            config.data_dir = value.into();
        }
        "backend_url" => {
            if value.is_empty() {
                bail!("backend_url cannot be empty");
            }
            config.backend_url = value.trim_end_matches('/').to_string();
        }
        "collection" => {
            config.collection = value.to_string();
        }
        "auth_collection" => {
            config.auth_collection = value.to_string();
        }
        "probe_interval_secs" => {
            config.probe_interval_secs = value
                .parse()
                .context("Invalid value for probe_interval_secs. Use a number of seconds.")?;
        }
        "cache_enabled" => {
            config.cache_enabled = value
                .parse()
                .context("Invalid value for cache_enabled. Use 'true' or 'false'.")?;
        }
        "log_file" => {
            config.log_file = if value.is_empty() || value == "none" {
                None
            } else {
                Some(value.into())
            };
        }
        "auth_token" => {
            bail!("auth_token is managed by `taskmaster login` and `taskmaster logout`");
        }
        _ => {
            bail!(
                "Unknown configuration key: '{}'\nValid keys: {}",
                key,
                KEYS
            );
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_apply_known_keys() {
        let mut config = Config::default();

        apply(&mut config, "backend_url", "https://pb.example.com/").unwrap();
        apply(&mut config, "probe_interval_secs", "30").unwrap();
        apply(&mut config, "cache_enabled", "false").unwrap();
        apply(&mut config, "log_file", "/tmp/tm.log").unwrap();

        assert_eq!(config.backend_url, "https://pb.example.com");
        assert_eq!(config.probe_interval(), Duration::from_secs(30));
        assert!(!config.cache_enabled);
        assert_eq!(config.log_file, Some(PathBuf::from("/tmp/tm.log")));

        apply(&mut config, "log_file", "none").unwrap();
        assert!(config.log_file.is_none());
    }

    #[test]
    fn test_apply_rejects_bad_input() {
        let mut config = Config::default();

        assert!(apply(&mut config, "cache_enabled", "maybe").is_err());
        assert!(apply(&mut config, "probe_interval_secs", "soon").is_err());
        assert!(apply(&mut config, "auth_token", "x").is_err());
        assert!(apply(&mut config, "favorite_color", "blue").is_err());
    }

    #[test]
    fn test_set_writes_file() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let path = temp_dir.path().join("config.toml");
        std::fs::write(
            &path,
            format!("data_dir = {:?}\n", temp_dir.path().join("data")),
        )
        .unwrap();
        let output = Output::new(OutputFormat::Quiet);

        set("collection".to_string(), "todos".to_string(), Some(&path), &output).unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.contains("collection = \"todos\""));
    }
}
