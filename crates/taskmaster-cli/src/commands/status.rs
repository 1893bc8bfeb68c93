//! Status command handler

use anyhow::Result;
use chrono::Utc;

use taskmaster_core::backend::token_expiry;
use taskmaster_core::{Config, Connectivity, ConnectivityProbe};

use super::Store;
use crate::output::{Output, OutputFormat};

/// Show backend, auth and cache status
pub async fn show(store: &Store, config: &Config, output: &Output) -> Result<()> {
    let connectivity = ConnectivityProbe::check(store.backend()).await;
    let snapshot = store.snapshot();
    let now = Utc::now();

    let expiry = config.auth_token.as_deref().and_then(token_expiry);
    let auth = match (&config.auth_token, expiry) {
        (None, _) => "not logged in",
        (Some(_), Some(exp)) if exp <= now => "session expired",
        (Some(_), _) => "logged in",
    };

    match output.format {
        OutputFormat::Json => {
            println!(
                "{}",
                serde_json::json!({
                    "backend_url": config.backend_url,
                    "collection": config.collection,
                    "connectivity": connectivity.to_string(),
                    "auth": auth,
                    "token_expires": expiry.map(|e| e.to_rfc3339()),
                    "cache": {
                        "enabled": config.cache_enabled,
                        "path": config.cache_path(),
                        "tasks": snapshot.tasks().len(),
                        "last_synced": snapshot.last_synced().map(|t| t.to_rfc3339()),
                    }
                })
            );
        }
        OutputFormat::Quiet => {
            println!("{}", connectivity);
        }
        OutputFormat::Human => {
            println!("Taskmaster Status");
            println!("=================");
            println!();
            println!("Backend:");
            println!("  URL:        {}", config.backend_url);
            println!("  Collection: {}", config.collection);
            println!(
                "  Status:     {}",
                match connectivity {
                    Connectivity::Online => "online",
                    Connectivity::Offline => "offline (unreachable)",
                }
            );
            println!();
            println!("Account:");
            println!("  {}", auth);
            if let Some(exp) = expiry {
                println!("  Expires:    {}", exp.format("%Y-%m-%d %H:%M"));
            }
            println!();
            println!("Cache:");
            if config.cache_enabled {
                println!("  Location:   {}", config.cache_path().display());
                println!("  Tasks:      {}", snapshot.tasks().len());
                println!(
                    "  Last sync:  {}",
                    snapshot
                        .last_synced()
                        .map(|t| t.format("%Y-%m-%d %H:%M").to_string())
                        .unwrap_or_else(|| "never".to_string())
                );
            } else {
                println!("  disabled");
            }
        }
    }

    Ok(())
}
