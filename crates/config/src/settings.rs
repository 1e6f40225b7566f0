// User settings
// Loaded from ~/.config/rosterlink/settings.json

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// AI provider selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AIProvider {
    /// Correspondence oracle disabled (default); only cached mappings work
    #[default]
    None,
    /// OpenAI-compatible server on this machine (Ollama, llama.cpp, vLLM)
    Local,
    /// OpenAI API
    #[serde(rename = "openai")]
    OpenAI,
}

impl AIProvider {
    pub fn is_enabled(&self) -> bool {
        !matches!(self, AIProvider::None)
    }

    pub fn needs_api_key(&self) -> bool {
        matches!(self, AIProvider::OpenAI)
    }

    pub fn name(&self) -> &'static str {
        match self {
            AIProvider::None => "none",
            AIProvider::Local => "local",
            AIProvider::OpenAI => "openai",
        }
    }

    pub fn default_model(&self) -> &'static str {
        match self {
            AIProvider::None => "",
            AIProvider::Local => "qwen2.5:7b",
            AIProvider::OpenAI => "gpt-4o",
        }
    }

    /// Base URL of the chat-completions API, without the `/chat/completions` suffix
    pub fn default_endpoint(&self) -> &'static str {
        match self {
            AIProvider::None => "",
            AIProvider::Local => "http://localhost:11434/v1",
            AIProvider::OpenAI => "https://api.openai.com/v1",
        }
    }
}

/// AI-specific settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AISettings {
    pub provider: AIProvider,

    /// Model identifier; empty means the provider default
    pub model: String,

    /// API base URL override
    pub endpoint: Option<String>,

    /// Per-request timeout in seconds
    pub timeout_secs: u64,
}

impl Default for AISettings {
    fn default() -> Self {
        Self {
            provider: AIProvider::None,
            model: String::new(),
            endpoint: None,
            timeout_secs: 60,
        }
    }
}

impl AISettings {
    pub fn effective_model(&self) -> &str {
        if self.model.is_empty() {
            self.provider.default_model()
        } else {
            &self.model
        }
    }

    pub fn effective_endpoint(&self) -> &str {
        match self.endpoint.as_deref() {
            Some(e) if !e.trim().is_empty() => e.trim_end_matches('/'),
            _ => self.provider.default_endpoint(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Correspondence cache file; `mapping_cache.json` in the config dir when unset
    #[serde(rename = "cache.path")]
    pub cache_path: Option<String>,

    #[serde(rename = "ai", default)]
    pub ai: AISettings,
}

impl Settings {
    pub fn config_path() -> PathBuf {
        crate::config_dir().join("settings.json")
    }

    /// Load settings from disk, writing a commented default file on first run
    pub fn load() -> Self {
        let path = Self::config_path();

        if !path.exists() {
            let settings = Self::default();
            settings.create_default_file(&path);
            return settings;
        }

        Self::load_from(&path)
    }

    /// Load from an explicit file. Missing or unreadable files give defaults.
    pub fn load_from(path: &Path) -> Self {
        match fs::read_to_string(path) {
            Ok(contents) => match Self::parse(&contents) {
                Ok(settings) => settings,
                Err(e) => {
                    log::warn!("Error parsing {}: {}; using default settings", path.display(), e);
                    Self::default()
                }
            },
            Err(e) => {
                if path.exists() {
                    log::warn!("Error reading {}: {}", path.display(), e);
                }
                Self::default()
            }
        }
    }

    /// Parse settings JSON, ignoring whole-line `//` comments
    pub fn parse(contents: &str) -> Result<Self, String> {
        let cleaned: String = contents
            .lines()
            .filter(|line| !line.trim().starts_with("//"))
            .collect::<Vec<_>>()
            .join("\n");

        serde_json::from_str(&cleaned).map_err(|e| e.to_string())
    }

    /// Cache file to use when a merge config does not name one
    pub fn effective_cache_path(&self) -> PathBuf {
        match self.cache_path.as_deref() {
            Some(p) if !p.trim().is_empty() => PathBuf::from(p),
            _ => crate::config_dir().join("mapping_cache.json"),
        }
    }

    fn create_default_file(&self, path: &Path) {
        if let Some(parent) = path.parent() {
            if let Err(e) = fs::create_dir_all(parent) {
                log::warn!("Error creating config directory: {}", e);
                return;
            }
        }

        let default_config = r#"{
    // Correspondence cache file (default: mapping_cache.json next to this file)
    "cache.path": null,

    // Correspondence oracle (disabled by default)
    // Provider options: "none", "local", "openai"
    // API keys are stored in the system keychain or ROSTERLINK_<PROVIDER>_KEY, not in this file
    "ai": {
        "provider": "none",
        "model": "",
        "endpoint": null,
        "timeout_secs": 60
    }
}
"#;

        if let Err(e) = fs::write(path, default_config) {
            log::warn!("Error writing default settings.json: {}", e);
        }
    }
}
