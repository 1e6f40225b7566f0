// AI configuration and secrets management
//
// API keys are looked up in:
// 1. System keychain (preferred)
// 2. Environment variables (fallback for CI/headless)
//
// Keys are NEVER stored in settings.json

use std::env;

use crate::settings::{AIProvider, AISettings};

/// Service name for keychain storage
const KEYCHAIN_SERVICE: &str = "rosterlink";

/// Source of an API key
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeySource {
    Keychain,
    Environment,
    None,
}

impl KeySource {
    pub fn as_str(&self) -> &'static str {
        match self {
            KeySource::Keychain => "keychain",
            KeySource::Environment => "environment",
            KeySource::None => "none",
        }
    }
}

#[derive(Debug, Clone)]
pub struct KeyLookup {
    pub key: Option<String>,
    pub source: KeySource,
}

/// Environment variable holding a provider's key, e.g. `ROSTERLINK_OPENAI_KEY`
pub fn env_var_name(provider: &str) -> String {
    format!("ROSTERLINK_{}_KEY", provider.to_uppercase())
}

fn keychain_account(provider: &str) -> String {
    format!("ai/{}", provider.to_lowercase())
}

/// Get an API key for the specified provider: keychain first, then environment.
pub fn get_api_key(provider: &str) -> KeyLookup {
    #[cfg(feature = "keychain")]
    {
        if let Ok(entry) = keyring::Entry::new(KEYCHAIN_SERVICE, &keychain_account(provider)) {
            if let Ok(key) = entry.get_password() {
                return KeyLookup {
                    key: Some(key),
                    source: KeySource::Keychain,
                };
            }
        }
    }

    let env_name = env_var_name(provider);
    if let Ok(key) = env::var(&env_name) {
        if !key.is_empty() {
            return KeyLookup {
                key: Some(key),
                source: KeySource::Environment,
            };
        }
    }

    KeyLookup {
        key: None,
        source: KeySource::None,
    }
}

pub fn keychain_available() -> bool {
    #[cfg(feature = "keychain")]
    {
        keyring::Entry::new(KEYCHAIN_SERVICE, "test").is_ok()
    }
    #[cfg(not(feature = "keychain"))]
    {
        false
    }
}

// ============================================================================
// Resolved AI Configuration
// ============================================================================

/// Status of the AI configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AIConfigStatus {
    /// provider = none
    Disabled,
    Ready,
    MissingKey,
}

impl AIConfigStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Disabled => "disabled",
            Self::Ready => "ready",
            Self::MissingKey => "missing_key",
        }
    }

    pub fn is_ready(&self) -> bool {
        matches!(self, Self::Ready)
    }
}

/// The effective AI configuration, fully resolved from settings and secrets.
#[derive(Debug, Clone)]
pub struct ResolvedAIConfig {
    pub provider: AIProvider,
    pub model: String,
    /// API base URL (no trailing slash)
    pub endpoint: String,
    pub timeout_secs: u64,
    pub api_key: Option<String>,
    pub key_source: KeySource,
    pub status: AIConfigStatus,
    /// Human-readable reason if not ready
    pub blocking_reason: Option<String>,
}

impl ResolvedAIConfig {
    pub fn from_settings(settings: &AISettings) -> Self {
        Self::resolve(settings, get_api_key)
    }

    /// Resolution with an injectable key lookup.
    pub fn resolve(settings: &AISettings, lookup_key: impl Fn(&str) -> KeyLookup) -> Self {
        let provider = settings.provider;

        if !provider.is_enabled() {
            return Self {
                provider,
                model: String::new(),
                endpoint: String::new(),
                timeout_secs: settings.timeout_secs,
                api_key: None,
                key_source: KeySource::None,
                status: AIConfigStatus::Disabled,
                blocking_reason: Some("AI provider is 'none' in settings.json".to_string()),
            };
        }

        let model = settings.effective_model().to_string();
        let endpoint = settings.effective_endpoint().to_string();

        let (api_key, key_source, status, blocking_reason) = if provider.needs_api_key() {
            let lookup = lookup_key(provider.name());
            match lookup.key {
                Some(key) => (Some(key), lookup.source, AIConfigStatus::Ready, None),
                None => (
                    None,
                    KeySource::None,
                    AIConfigStatus::MissingKey,
                    Some(format!(
                        "No API key found. Set via keychain or {}",
                        env_var_name(provider.name())
                    )),
                ),
            }
        } else {
            // Local servers run without a key
            (None, KeySource::None, AIConfigStatus::Ready, None)
        };

        Self {
            provider,
            model,
            endpoint,
            timeout_secs: settings.timeout_secs,
            api_key,
            key_source,
            status,
            blocking_reason,
        }
    }

    /// Load settings and resolve in one call
    pub fn load() -> Self {
        let settings = crate::settings::Settings::load();
        Self::from_settings(&settings.ai)
    }
}

// ============================================================================
// Diagnostics (for `rosterlink ai doctor`)
// ============================================================================

#[derive(Debug, serde::Serialize)]
pub struct AIDiagnostics {
    pub provider: String,
    pub model: String,
    pub endpoint: String,
    pub timeout_secs: u64,
    pub status: &'static str,
    pub key_present: bool,
    pub key_source: &'static str,
    pub keychain_available: bool,
    pub blocking_reason: Option<String>,
}

impl AIDiagnostics {
    pub fn from_resolved(config: &ResolvedAIConfig) -> Self {
        Self {
            provider: config.provider.name().to_string(),
            model: config.model.clone(),
            endpoint: config.endpoint.clone(),
            timeout_secs: config.timeout_secs,
            status: config.status.as_str(),
            key_present: config.api_key.is_some(),
            key_source: config.key_source.as_str(),
            keychain_available: keychain_available(),
            blocking_reason: config.blocking_reason.clone(),
        }
    }
}

impl std::fmt::Display for AIDiagnostics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "AI Configuration")?;
        writeln!(f, "──────────────────────────────")?;
        writeln!(f, "Provider:          {}", self.provider)?;
        writeln!(f, "Status:            {}", self.status)?;
        if !self.model.is_empty() {
            writeln!(f, "Model:             {}", self.model)?;
            writeln!(f, "Endpoint:          {}", self.endpoint)?;
            writeln!(f, "Timeout:           {}s", self.timeout_secs)?;
        }
        writeln!(f, "Key present:       {}", if self.key_present { "yes" } else { "no" })?;
        writeln!(f, "Key source:        {}", self.key_source)?;
        writeln!(f, "Keychain available:{}", if self.keychain_available { "yes" } else { "no" })?;
        if let Some(reason) = &self.blocking_reason {
            writeln!(f, "Blocked:           {}", reason)?;
        }
        Ok(())
    }
}
