use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

use crate::launcher::LauncherKind;
use crate::registry::HostFamily;

// ============================================================================
// Main App Config
// ============================================================================

#[derive(Serialize, Deserialize, Default, Clone, Debug)]
pub struct AppConfig {
    /// Last selected install directory
    pub install_dir: Option<PathBuf>,
    /// User-defined install directory not in the known location table
    pub custom_install_dir: Option<PathBuf>,
    pub custom_install_launcher: Option<LauncherKind>,
    /// Where archives are downloaded before extraction
    pub temp_dir: Option<PathBuf>,
    /// Read from the file if present, never written back
    #[serde(default, skip_serializing)]
    pub github_token: Option<String>,
    #[serde(default, skip_serializing)]
    pub gitlab_token: Option<String>,
}

impl AppConfig {
    fn get_path() -> PathBuf {
        crate::ctup_path!("config.json")
    }

    pub fn load() -> Self {
        let path = Self::get_path();
        if path.exists() {
            if let Ok(content) = fs::read_to_string(&path) {
                if let Ok(config) = serde_json::from_str(&content) {
                    return config;
                }
            }
        }
        Self::default()
    }

    pub fn save(&self) {
        let path = Self::get_path();
        if let Some(parent) = path.parent() {
            let _ = fs::create_dir_all(parent);
        }
        if let Ok(json) = serde_json::to_string_pretty(self) {
            let _ = fs::write(path, json);
        }
    }

    pub fn get_temp_dir(&self) -> PathBuf {
        self.temp_dir
            .clone()
            .unwrap_or_else(|| crate::ctup_path!("tmp"))
    }

    /// Tokens from `CTUP_GITHUB_TOKEN` / `CTUP_GITLAB_TOKEN`, falling back to the config file.
    pub fn access_tokens(&self) -> AccessTokens {
        let from_env = |name: &str| std::env::var(name).ok().filter(|t| !t.is_empty());
        AccessTokens {
            github: from_env("CTUP_GITHUB_TOKEN").or_else(|| self.github_token.clone()),
            gitlab: from_env("CTUP_GITLAB_TOKEN").or_else(|| self.gitlab_token.clone()),
        }
    }
}

// ============================================================================
// Access Tokens
// ============================================================================

/// Opaque registry tokens, one per host family
#[derive(Clone, Default, Debug)]
pub struct AccessTokens {
    pub github: Option<String>,
    pub gitlab: Option<String>,
}

impl AccessTokens {
    pub fn for_family(&self, family: HostFamily) -> Option<&str> {
        match family {
            HostFamily::GitHub => self.github.as_deref(),
            HostFamily::GitLab => self.gitlab.as_deref(),
            HostFamily::Unknown => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tokens_are_not_serialized() {
        let config = AppConfig {
            install_dir: Some(PathBuf::from("/games/compatibilitytools.d")),
            github_token: Some("gha_secret".to_string()),
            gitlab_token: Some("glpat-secret".to_string()),
            ..Default::default()
        };
        let json = serde_json::to_string(&config).unwrap();
        assert!(!json.contains("secret"));
        assert!(json.contains("compatibilitytools.d"));
    }

    #[test]
    fn test_tokens_are_read_from_file() {
        let json = r#"{"install_dir": null, "github_token": "gha_abc"}"#;
        let config: AppConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.github_token.as_deref(), Some("gha_abc"));
        assert!(config.gitlab_token.is_none());
    }

    #[test]
    fn test_token_for_family() {
        let tokens = AccessTokens {
            github: Some("gh".into()),
            gitlab: None,
        };
        assert_eq!(tokens.for_family(HostFamily::GitHub), Some("gh"));
        assert_eq!(tokens.for_family(HostFamily::GitLab), None);
        assert_eq!(tokens.for_family(HostFamily::Unknown), None);
    }
}
