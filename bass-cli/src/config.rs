use bass_core::config::AnalyzerConfig;
use std::path::{Path, PathBuf};

/// Local config file name checked in the working directory.
const LOCAL_CONFIG: &str = "bass.toml";

/// Picks the config file: an explicit path, `./bass.toml`, or
/// `<config dir>/bass/config.toml`.
pub fn resolve_config_path(explicit: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit {
        return Some(path.to_path_buf());
    }
    let local = PathBuf::from(LOCAL_CONFIG);
    if local.exists() {
        return Some(local);
    }
    let platform = dirs::config_dir()?.join("bass").join("config.toml");
    platform.exists().then_some(platform)
}

pub fn parse_config(content: &str) -> Result<AnalyzerConfig, toml::de::Error> {
    toml::from_str(content)
}

/// Loads the analysis config, falling back to defaults when there is no file
/// or it cannot be read.
pub fn load_config(explicit: Option<&Path>) -> AnalyzerConfig {
    let Some(path) = resolve_config_path(explicit) else {
        return AnalyzerConfig::default();
    };
    let parsed = std::fs::read_to_string(&path)
        .map_err(|e| e.to_string())
        .and_then(|content| parse_config(&content).map_err(|e| e.to_string()));
    match parsed {
        Ok(config) => {
            log::info!("Loaded config from {}", path.display());
            config
        }
        Err(e) => {
            log::warn!("Failed to load config from {}: {}", path.display(), e);
            AnalyzerConfig::default()
        }
    }
}
