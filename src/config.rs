//! Site configuration module.
//!
//! Handles loading and validating the optional `site.toml` at the publishing
//! root. Every key has a default, so the file only needs the values it wants
//! to change:
//!
//! ```toml
//! title = "BitWorking"                 # Site title exposed to templates
//! domain = "https://bitworking.org/"   # Absolute base URL (trailing slash)
//! feed_len = 4                         # Entries on the index page and feed
//! stylesheet = "css/b.css"             # Root-relative stylesheet inlined into pages
//!
//! [latex]
//! command = "tex2im"                   # LaTeX-to-PNG converter
//! timeout_secs = 600                   # Upper bound per conversion
//! ```
//!
//! Unknown keys are rejected to catch typos early. The file itself is never
//! published, and its modification time counts as a dependency of every
//! rendered page.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Name of the config file within the publishing root.
pub const CONFIG_FILENAME: &str = "site.toml";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("Config validation error: {0}")]
    Validation(String),
}

/// Site configuration loaded from `site.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SiteConfig {
    /// Site title, shown in page headers and the feed.
    pub title: String,
    /// Absolute URL the site is served from.
    pub domain: String,
    /// Number of most recent entries on the index page and in the feed.
    pub feed_len: usize,
    /// Root-relative path of the stylesheet inlined into every page.
    pub stylesheet: String,
    /// LaTeX image conversion settings.
    pub latex: LatexConfig,
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            title: "BitWorking".to_string(),
            domain: "https://bitworking.org/".to_string(),
            feed_len: 4,
            stylesheet: "css/b.css".to_string(),
            latex: LatexConfig::default(),
        }
    }
}

impl SiteConfig {
    /// Validate config values are within acceptable ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.feed_len == 0 {
            return Err(ConfigError::Validation("feed_len must be at least 1".into()));
        }
        if !(self.domain.starts_with("http://") || self.domain.starts_with("https://")) {
            return Err(ConfigError::Validation(
                "domain must be an absolute http(s) URL".into(),
            ));
        }
        if !self.domain.ends_with('/') {
            return Err(ConfigError::Validation("domain must end with '/'".into()));
        }
        if self.stylesheet.is_empty() || Path::new(&self.stylesheet).is_absolute() {
            return Err(ConfigError::Validation(
                "stylesheet must be a path relative to the root".into(),
            ));
        }
        if self.latex.command.is_empty() {
            return Err(ConfigError::Validation(
                "latex.command must not be empty".into(),
            ));
        }
        if self.latex.timeout_secs == 0 {
            return Err(ConfigError::Validation(
                "latex.timeout_secs must be at least 1".into(),
            ));
        }
        Ok(())
    }
}

/// LaTeX image conversion settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LatexConfig {
    /// Executable invoked as `<command> -z -a -o OUTPUT INPUT`.
    pub command: String,
    /// Seconds before a conversion is killed.
    pub timeout_secs: u64,
}

impl Default for LatexConfig {
    fn default() -> Self {
        Self {
            command: "tex2im".to_string(),
            timeout_secs: 600,
        }
    }
}

impl LatexConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Path of the config file for a publishing root.
pub fn config_path(root: &Path) -> PathBuf {
    root.join(CONFIG_FILENAME)
}

/// Load `site.toml` from the root, falling back to defaults when absent.
pub fn load_config(root: &Path) -> Result<SiteConfig, ConfigError> {
    let path = config_path(root);
    if !path.exists() {
        return Ok(SiteConfig::default());
    }
    let content = fs::read_to_string(&path)?;
    let config: SiteConfig = toml::from_str(&content)?;
    config.validate()?;
    Ok(config)
}

/// Returns a fully-commented stock `site.toml` with all keys and explanations.
///
/// Used by the `gen-config` CLI command.
pub fn stock_config_toml() -> &'static str {
    r##"# Piccolo Site Configuration
# ==========================
# All settings are optional. Remove or comment out any you don't need.
# Values shown below are the defaults.
#
# Place this file next to the .root marker. It is never copied into dst/.
# Unknown keys will cause an error.

# Site title, available to templates as `site_title`.
title = "BitWorking"

# Absolute URL the site is served from, available as `domain`.
# Must end with a slash.
domain = "https://bitworking.org/"

# Number of most recent entries on the main index page and in the feed.
feed_len = 4

# Stylesheet inlined into every page as `inline_css`, relative to the root.
stylesheet = "css/b.css"

# ---------------------------------------------------------------------------
# LaTeX images
# ---------------------------------------------------------------------------
[latex]
# Converter run as: <command> -z -a -o OUTPUT.png INPUT.tex
command = "tex2im"

# A conversion running longer than this is killed and the <latex-pic>
# element is left as-is.
timeout_secs = 600
"##
}
