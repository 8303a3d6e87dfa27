//! Configuration loader and validator for the Feedly annotation sync.
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

pub const DEFAULT_ANNOTATIONS_FOLDER: &str = "Feedly Annotations";
pub const DEFAULT_BASE_URL: &str = "https://cloud.feedly.com/v3/";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("YAML parse error: {0}")]
    Parse(#[from] serde_yaml::Error),
    #[error("Invalid configuration: {0}")]
    Invalid(&'static str),
}

/// Root configuration struct mirroring the YAML schema.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Config {
    pub app: App,
    pub feedly: Feedly,
}

/// Local layout: where documents and sync state live.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct App {
    /// Root of the document store (the notes vault).
    pub vault_dir: String,
    /// Folder inside the vault that receives annotation documents.
    #[serde(default = "default_annotations_folder")]
    pub annotations_folder: String,
    /// Directory holding the checkpoint database.
    pub data_dir: String,
}

/// Feedly credentials. Both may be blank in the file; commands refuse to run
/// until they are filled in.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Feedly {
    #[serde(default)]
    pub user_id: String,
    #[serde(default)]
    pub access_token: String,
    #[serde(default = "default_base_url")]
    pub base_url: String,
}

fn default_annotations_folder() -> String {
    DEFAULT_ANNOTATIONS_FOLDER.to_string()
}

fn default_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}

impl Config {
    /// Ensure required directories exist (creates `app.data_dir` and `app.vault_dir`).
    pub fn ensure_dirs(&self) -> Result<(), std::io::Error> {
        fs::create_dir_all(expand_home(&self.app.data_dir))?;
        fs::create_dir_all(expand_home(&self.app.vault_dir))
    }

    pub fn vault_path(&self) -> PathBuf {
        expand_home(&self.app.vault_dir)
    }

    pub fn data_path(&self) -> PathBuf {
        expand_home(&self.app.data_dir)
    }

    /// True when both credentials are present.
    pub fn has_credentials(&self) -> bool {
        !self.feedly.user_id.trim().is_empty() && !self.feedly.access_token.trim().is_empty()
    }
}

fn expand_home(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Ok(home) = std::env::var("HOME") {
            return Path::new(&home).join(rest);
        }
    }
    PathBuf::from(path)
}

/// Load configuration from a YAML file and validate it.
/// - If `path` is None, uses `config.yaml` in the current working directory.
pub fn load(path: Option<&Path>) -> Result<Config, ConfigError> {
    let path = path.unwrap_or_else(|| Path::new("config.yaml"));
    let content = fs::read_to_string(path)?;
    let cfg: Config = serde_yaml::from_str(&content)?;
    validate(&cfg)?;
    Ok(cfg)
}

/// Validate a configuration instance.
///
/// Credentials are not checked here: a missing token is reported by the
/// command that needs it, without touching the network.
fn validate(cfg: &Config) -> Result<(), ConfigError> {
    if cfg.app.vault_dir.trim().is_empty() {
        return Err(ConfigError::Invalid("app.vault_dir must be non-empty"));
    }
    if cfg.app.data_dir.trim().is_empty() {
        return Err(ConfigError::Invalid("app.data_dir must be non-empty"));
    }
    if cfg.app.annotations_folder.trim().is_empty() {
        return Err(ConfigError::Invalid("app.annotations_folder must be non-empty"));
    }
    if cfg.app.annotations_folder.contains("..") {
        return Err(ConfigError::Invalid("app.annotations_folder must stay inside the vault"));
    }
    if reqwest::Url::parse(&cfg.feedly.base_url).is_err() {
        return Err(ConfigError::Invalid("feedly.base_url must be a valid URL"));
    }
    Ok(())
}

/// Returns the example YAML content.
pub fn example() -> &'static str {
    r#"app:
  vault_dir: "./vault"
  annotations_folder: "Feedly Annotations"
  data_dir: "./data"

feedly:
  user_id: "YOUR_FEEDLY_USER_ID"
  access_token: "YOUR_FEEDLY_ACCESS_TOKEN"
"#
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn parse_example_ok() {
        let cfg: Config = serde_yaml::from_str(example()).unwrap();
        validate(&cfg).unwrap();
        assert_eq!(cfg.feedly.base_url, DEFAULT_BASE_URL);
        assert!(cfg.has_credentials());
    }

    #[test]
    fn annotations_folder_defaults_when_absent() {
        let yaml = r#"app:
  vault_dir: "./vault"
  data_dir: "./data"
feedly:
  user_id: "u"
  access_token: "t"
"#;
        let cfg: Config = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(cfg.app.annotations_folder, DEFAULT_ANNOTATIONS_FOLDER);
    }

    #[test]
    fn blank_credentials_parse_but_are_reported() {
        let yaml = r#"app:
  vault_dir: "./vault"
  data_dir: "./data"
feedly: {}
"#;
        let cfg: Config = serde_yaml::from_str(yaml).unwrap();
        validate(&cfg).unwrap();
        assert!(!cfg.has_credentials());
    }

    #[test]
    fn invalid_dirs() {
        let mut cfg: Config = serde_yaml::from_str(example()).unwrap();
        cfg.app.vault_dir = " ".into();
        let err = validate(&cfg).unwrap_err();
        match err {
            ConfigError::Invalid(msg) => assert!(msg.contains("vault_dir")),
            _ => panic!("wrong error"),
        }

        let mut cfg: Config = serde_yaml::from_str(example()).unwrap();
        cfg.app.annotations_folder = "../outside".into();
        assert!(matches!(validate(&cfg), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn invalid_base_url() {
        let mut cfg: Config = serde_yaml::from_str(example()).unwrap();
        cfg.feedly.base_url = "not a url".into();
        let err = validate(&cfg).unwrap_err();
        match err {
            ConfigError::Invalid(msg) => assert!(msg.contains("base_url")),
            _ => panic!("wrong error"),
        }
    }

    #[test]
    fn ensure_dirs_creates_data_and_vault() {
        let td = tempdir().unwrap();
        let mut cfg: Config = serde_yaml::from_str(example()).unwrap();
        cfg.app.data_dir = td.path().join("data").to_string_lossy().to_string();
        cfg.app.vault_dir = td.path().join("vault").to_string_lossy().to_string();
        cfg.ensure_dirs().unwrap();
        assert!(td.path().join("data").exists());
        assert!(td.path().join("vault").exists());
    }

    #[test]
    fn load_from_file_ok() {
        let td = tempdir().unwrap();
        let p = td.path().join("config.yaml");
        fs::write(&p, example()).unwrap();
        let cfg = load(Some(&p)).unwrap();
        assert_eq!(cfg.feedly.user_id, "YOUR_FEEDLY_USER_ID");
    }
}
