use std::fs;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Chainable, Result};

pub const CONFIG_FILE: &str = "config.toml";
pub const CONTENT_DIR: &str = "content";

/// The configuration written by `bcms init`.
pub const DEFAULT_CONFIG: &str = r#"# bassclef site configuration.

# Prefix for `/images/...` urls in rendered pages. Leave empty when the site
# is served from the web server's root.
webroot = ""

# Directory holding the site's markdown sources.
content = "content"

[check]
# Names of document checks to skip, e.g. ["unused-definition"].
disable = []
"#;

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct Settings {
    pub webroot: String,
    pub content: PathBuf,
    pub check: CheckSettings,
    #[serde(flatten)]
    pub extra: BTreeMap<String, toml::Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct CheckSettings {
    pub disable: Vec<String>,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            webroot: String::new(),
            content: PathBuf::from(CONTENT_DIR),
            check: CheckSettings::default(),
            extra: BTreeMap::new(),
        }
    }
}

impl Settings {
    pub fn from_toml(string: &str) -> Result<Self> {
        Ok(toml::from_str(string)?)
    }

    pub fn read<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let string = fs::read_to_string(path).chain_with(|| error! {
            "failed to read configuration file",
            "path" => path.display(),
        })?;

        Self::from_toml(&string).chain_with(|| error! {
            "invalid configuration file",
            "path" => path.display(),
        })
    }

    /// Reads `config.toml` in `root`, or returns the default settings if
    /// there is no such file.
    pub fn discover<P: AsRef<Path>>(root: P) -> Result<Self> {
        let path = root.as_ref().join(CONFIG_FILE);
        if !path.is_file() {
            tracing::debug!(path = %path.display(), "no configuration file; using defaults");
            return Ok(Settings::default());
        }

        tracing::debug!(path = %path.display(), "reading configuration");
        Self::read(path)
    }

    /// Writes [`DEFAULT_CONFIG`] into `dir`. An existing file is only
    /// replaced when `force` is set.
    pub fn init<P: AsRef<Path>>(dir: P, force: bool) -> Result<PathBuf> {
        let dir = dir.as_ref();
        let path = dir.join(CONFIG_FILE);
        if path.exists() && !force {
            return err! {
                "refusing to overwrite existing configuration",
                "path" => path.display(),
                "hint" => "pass --force to replace it",
            };
        }

        fs::create_dir_all(dir).chain_with(|| error! {
            "failed to create site directory",
            "path" => dir.display(),
        })?;

        fs::write(&path, DEFAULT_CONFIG).chain_with(|| error! {
            "failed to write configuration file",
            "path" => path.display(),
        })?;

        tracing::info!(path = %path.display(), "wrote configuration");
        Ok(path)
    }

    /// Returns `false` if the check named `rule` is disabled.
    pub fn is_enabled(&self, rule: &str) -> bool {
        !self.check.disable.iter().any(|r| r == rule)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_parses_to_defaults() {
        let settings = Settings::from_toml(DEFAULT_CONFIG).unwrap();
        assert_eq!(settings, Settings::default());
    }

    #[test]
    fn unknown_keys_are_kept() {
        let settings = Settings::from_toml(r#"
            webroot = "/blog"
            author = "T. Duck"

            [check]
            disable = ["unused-definition"]
        "#).unwrap();

        assert_eq!(settings.webroot, "/blog");
        assert_eq!(settings.content, Path::new("content"));
        assert_eq!(settings.extra["author"].as_str(), Some("T. Duck"));
        assert!(!settings.is_enabled("unused-definition"));
        assert!(settings.is_enabled("undefined-reference"));
    }

    #[test]
    fn bad_types_are_errors() {
        assert!(Settings::from_toml("webroot = 3").is_err());
        assert!(Settings::from_toml("[check]\ndisable = \"all\"").is_err());
    }

    #[test]
    fn init_refuses_to_overwrite() {
        let dir = tempfile::tempdir().unwrap();
        let path = Settings::init(dir.path(), false).unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), DEFAULT_CONFIG);

        fs::write(&path, "webroot = \"/x\"").unwrap();
        let e = Settings::init(dir.path(), false).unwrap_err();
        assert!(e.message().contains("refusing to overwrite"));
        assert_eq!(Settings::discover(dir.path()).unwrap().webroot, "/x");

        Settings::init(dir.path(), true).unwrap();
        assert_eq!(Settings::discover(dir.path()).unwrap(), Settings::default());
    }

    #[test]
    fn discover_without_file_is_default() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(Settings::discover(dir.path()).unwrap(), Settings::default());
    }
}
