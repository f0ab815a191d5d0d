//! CLI command implementations: thin forwarding into the library

use std::path::Path;

use anyhow::{Context, Result};

use malsieve::config::Config;
use malsieve::engine::Selection;
use malsieve::identity;
use malsieve::submission::SubmissionManager;
use malsieve::DeclaredType;

pub fn identify_command(file: &Path) -> Result<()> {
    let declared = declared_from_path(file, None);
    let identity = identity::identify_path(file, declared)
        .with_context(|| format!("Failed to identify {}", file.display()))?;
    println!("{}", serde_json::to_string_pretty(&identity)?);
    Ok(())
}

pub fn select_command(config: &Config, declared_type: &str) -> Result<()> {
    let selector = config.selector.build();
    match selector.select(&DeclaredType::new(declared_type)) {
        Selection::Engines(engines) => {
            for engine in engines {
                println!("{engine}");
            }
        }
        Selection::Unsupported => println!("unsupported"),
    }
    Ok(())
}

pub async fn analyze_command(
    config: &Config,
    file: &Path,
    declared_type: Option<&str>,
) -> Result<()> {
    let declared = declared_from_path(file, declared_type);
    let identity = identity::identify_path(file, declared)
        .with_context(|| format!("Failed to identify {}", file.display()))?;
    tracing::info!(digest = %identity.short_digest(), "artifact identified");

    let manager = SubmissionManager::from_config(config);
    let analysis = manager
        .analyze(&identity, file)
        .await
        .context("Analysis could not be started")?;

    println!("{}", serde_json::to_string_pretty(&analysis)?);
    Ok(())
}

fn declared_from_path(file: &Path, declared_override: Option<&str>) -> DeclaredType {
    match declared_override {
        Some(raw) => DeclaredType::new(raw),
        None => file
            .file_name()
            .and_then(|n| n.to_str())
            .map(DeclaredType::from_file_name)
            .unwrap_or_else(|| DeclaredType::new("")),
    }
}
