// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Configuration loading from files.
//!
//! Handles loading configuration from JSON and YAML files in various locations.

use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::ConfigError;

use super::types::WorkspaceConfig;

/// Workspace config file names, searched in order.
pub const CONFIG_FILES: &[&str] = &[
    ".tracelint.json",
    ".tracelint.yaml",
    ".tracelint.yml",
    "tracelint.config.json",
];

/// Local config file name (for personal, uncommitted overrides).
pub const LOCAL_CONFIG_FILE: &str = ".tracelint.local.json";

/// Global config directory name.
pub const GLOBAL_CONFIG_DIR: &str = ".tracelint";

/// Global config file name.
pub const GLOBAL_CONFIG_FILE: &str = "config.json";

/// Get the global config directory path.
pub fn get_global_config_dir() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(GLOBAL_CONFIG_DIR))
}

/// Get the global config file path.
pub fn get_global_config_path() -> Option<PathBuf> {
    get_global_config_dir().map(|dir| dir.join(GLOBAL_CONFIG_FILE))
}

/// Load global configuration from ~/.tracelint/config.json.
pub fn load_global_config() -> Result<Option<WorkspaceConfig>, ConfigError> {
    let path = match get_global_config_path() {
        Some(p) => p,
        None => return Ok(None),
    };

    if !path.exists() {
        return Ok(None);
    }

    load_config_file(&path).map(Some)
}

/// Load the first workspace config file found in `workspace_root`.
pub fn load_workspace_config(workspace_root: &Path) -> Result<Option<WorkspaceConfig>, ConfigError> {
    for filename in CONFIG_FILES {
        let path = workspace_root.join(filename);
        if path.exists() {
            debug!(path = %path.display(), "Loading workspace config");
            return load_config_file(&path).map(Some);
        }
    }
    Ok(None)
}

/// Load local configuration from .tracelint.local.json.
pub fn load_local_config(workspace_root: &Path) -> Result<Option<WorkspaceConfig>, ConfigError> {
    let path = workspace_root.join(LOCAL_CONFIG_FILE);
    if !path.exists() {
        return Ok(None);
    }
    load_config_file(&path).map(Some)
}

/// Load a configuration file (JSON or YAML).
pub fn load_config_file(path: &Path) -> Result<WorkspaceConfig, ConfigError> {
    let content = std::fs::read_to_string(path)?;

    let extension = path.extension().and_then(|e| e.to_str()).unwrap_or("");

    match extension.to_lowercase().as_str() {
        "yaml" | "yml" => serde_yaml::from_str(&content).map_err(ConfigError::from),
        _ => serde_json::from_str(&content).map_err(ConfigError::from),
    }
}

/// Save workspace configuration as `.tracelint.json` (or `filename`).
pub fn save_workspace_config(
    workspace_root: &Path,
    config: &WorkspaceConfig,
    filename: Option<&str>,
) -> Result<PathBuf, ConfigError> {
    let filename = filename.unwrap_or(CONFIG_FILES[0]);
    let path = workspace_root.join(filename);

    let content = serde_json::to_string_pretty(config)?;
    std::fs::write(&path, content)?;

    Ok(path)
}

/// Write a starter config, refusing to overwrite an existing one.
pub fn init_config(
    workspace_root: &Path,
    config: Option<WorkspaceConfig>,
) -> Result<PathBuf, ConfigError> {
    if let Some(existing) = CONFIG_FILES
        .iter()
        .map(|f| workspace_root.join(f))
        .find(|p| p.exists())
    {
        return Err(ConfigError::InvalidValue {
            field: "init".to_string(),
            message: format!("{} already exists", existing.display()),
        });
    }
    let config = config.unwrap_or_else(get_example_config);
    save_workspace_config(workspace_root, &config, None)
}

/// Find the workspace root for `start`.
///
/// Walks up the directory tree until a directory holds a config file or a
/// `.git` entry. Returns `None` at the filesystem root.
pub fn find_workspace_root(start: &Path) -> Option<PathBuf> {
    let mut current = if start.is_file() {
        start.parent()?.to_path_buf()
    } else {
        start.to_path_buf()
    };

    loop {
        if CONFIG_FILES.iter().any(|f| current.join(f).exists()) || current.join(".git").exists()
        {
            return Some(current);
        }

        match current.parent() {
            Some(parent) => current = parent.to_path_buf(),
            None => return None,
        }
    }
}

/// Starter configuration written by `tracelint init`.
pub fn get_example_config() -> WorkspaceConfig {
    WorkspaceConfig {
        provider: Some("auto".to_string()),
        retrieval: Some(crate::rag::RetrievalMode::Auto),
        top_k: Some(3),
        max_concurrency: Some(4),
        oracle_timeout_ms: Some(30_000),
        max_retries: Some(2),
        confidence_threshold: Some(0.5),
        exclude_patterns: Some(
            super::types::DEFAULT_EXCLUDES
                .iter()
                .map(|s| s.to_string())
                .collect(),
        ),
        entry_functions: Some(Vec::new()),
        ..Default::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_config_files_order() {
        assert_eq!(CONFIG_FILES.len(), 4);
        assert_eq!(CONFIG_FILES[0], ".tracelint.json");
    }

    #[test]
    fn test_global_config_dir() {
        if let Some(dir) = get_global_config_dir() {
            assert!(dir.ends_with(".tracelint"));
        }
    }

    #[test]
    fn test_load_workspace_config_not_found() {
        let temp = TempDir::new().unwrap();
        let result = load_workspace_config(temp.path()).unwrap();
        assert!(result.is_none());
    }

    #[test]
    fn test_load_workspace_config_json() {
        let temp = TempDir::new().unwrap();
        std::fs::write(
            temp.path().join(".tracelint.json"),
            r#"{"provider": "openai", "model": "gpt-4o-mini"}"#,
        )
        .unwrap();

        let config = load_workspace_config(temp.path()).unwrap().unwrap();
        assert_eq!(config.provider, Some("openai".to_string()));
        assert_eq!(config.model, Some("gpt-4o-mini".to_string()));
    }

    #[test]
    fn test_load_workspace_config_yaml() {
        let temp = TempDir::new().unwrap();
        std::fs::write(
            temp.path().join(".tracelint.yaml"),
            "provider: ollama\nmodel: llama3.2\ntopK: 4\n",
        )
        .unwrap();

        let config = load_workspace_config(temp.path()).unwrap().unwrap();
        assert_eq!(config.provider, Some("ollama".to_string()));
        assert_eq!(config.top_k, Some(4));
    }

    #[test]
    fn test_json_wins_over_yaml() {
        let temp = TempDir::new().unwrap();
        std::fs::write(temp.path().join(".tracelint.json"), r#"{"provider": "offline"}"#).unwrap();
        std::fs::write(temp.path().join(".tracelint.yml"), "provider: ollama\n").unwrap();

        let config = load_workspace_config(temp.path()).unwrap().unwrap();
        assert_eq!(config.provider, Some("offline".to_string()));
    }

    #[test]
    fn test_malformed_config_is_an_error() {
        let temp = TempDir::new().unwrap();
        std::fs::write(temp.path().join(".tracelint.json"), "{ not json").unwrap();
        assert!(matches!(
            load_workspace_config(temp.path()),
            Err(ConfigError::JsonError(_))
        ));
    }

    #[test]
    fn test_find_workspace_root() {
        let temp = TempDir::new().unwrap();
        let subdir = temp.path().join("a").join("b").join("c");
        std::fs::create_dir_all(&subdir).unwrap();
        std::fs::write(temp.path().join(".tracelint.json"), "{}").unwrap();

        assert_eq!(find_workspace_root(&subdir), Some(temp.path().to_path_buf()));
    }

    #[test]
    fn test_find_workspace_root_from_git() {
        let temp = TempDir::new().unwrap();
        std::fs::create_dir(temp.path().join(".git")).unwrap();
        let file = temp.path().join("main.go");
        std::fs::write(&file, "package main\n").unwrap();

        assert_eq!(find_workspace_root(&file), Some(temp.path().to_path_buf()));
    }

    #[test]
    fn test_init_config() {
        let temp = TempDir::new().unwrap();
        let path = init_config(temp.path(), None).unwrap();
        assert_eq!(path.file_name().unwrap(), ".tracelint.json");

        let saved = load_config_file(&path).unwrap();
        assert_eq!(saved, get_example_config());

        assert!(init_config(temp.path(), None).is_err());
    }
}
