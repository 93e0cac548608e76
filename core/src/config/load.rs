use std::path::{Path, PathBuf};

use super::types::SwarmConfig;

/// Get the default swarm data directory: ~/.swarm
pub fn get_swarm_data_dir() -> anyhow::Result<PathBuf> {
    let home = std::env::var("HOME")
        .or_else(|_| std::env::var("USERPROFILE"))
        .map_err(|_| anyhow::anyhow!("Cannot determine home directory"))?;
    Ok(PathBuf::from(home).join(".swarm"))
}

pub fn load_default() -> anyhow::Result<SwarmConfig> {
    // Priority 1: ~/.swarm/config.toml (highest)
    let swarm_dir = get_swarm_data_dir()?;
    let home_config = swarm_dir.join("config.toml");

    // Priority 2: ./swarm.toml (current directory)
    let local_config = Path::new("swarm.toml");

    let mut cfg = if home_config.exists() {
        read_config(&home_config)?
    } else if local_config.exists() {
        read_config(local_config)?
    } else {
        SwarmConfig::default()
    };

    if cfg.logging.file
        && cfg
            .logging
            .directory
            .as_deref()
            .map(|s| s.trim().is_empty())
            .unwrap_or(true)
    {
        cfg.logging.directory = Some(swarm_dir.join("logs").to_string_lossy().to_string());
    }

    apply_env_overrides(&mut cfg);
    cfg.validate()?;
    Ok(cfg)
}

pub fn load_from_path(path: &Path) -> anyhow::Result<SwarmConfig> {
    let mut cfg = read_config(path)?;
    apply_env_overrides(&mut cfg);
    cfg.validate()?;
    Ok(cfg)
}

fn read_config(path: &Path) -> anyhow::Result<SwarmConfig> {
    let s = std::fs::read_to_string(path)
        .map_err(|e| anyhow::anyhow!("read {}: {e}", path.display()))?;
    let cfg = toml::from_str::<SwarmConfig>(&s)
        .map_err(|e| anyhow::anyhow!("parse {}: {e}", path.display()))?;
    Ok(cfg)
}

/// Environment variable overrides (highest priority)
fn apply_env_overrides(cfg: &mut SwarmConfig) {
    if let Ok(v) = std::env::var("SWARM_LOG_LEVEL") {
        if !v.trim().is_empty() {
            cfg.logging.level = v;
        }
    }

    if let Ok(v) = std::env::var("SWARM_MAX_CONCURRENCY") {
        match v.trim().parse::<usize>() {
            Ok(n) if n > 0 => cfg.execution.max_concurrency = Some(n),
            _ => tracing::warn!("ignoring invalid SWARM_MAX_CONCURRENCY={v:?}"),
        }
    }
}
