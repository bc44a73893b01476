//! Project configuration module.
//!
//! Handles loading, validating, and merging `_data/oko.toml`. The user file
//! is sparse: it is merged key-by-key on top of the stock defaults, so a
//! project only needs to state what differs.
//!
//! ## Configuration Options
//!
//! ```toml
//! domain = "https://example.com"   # required
//! output = "public"                # output directory
//! title = ""                       # site title, available as `project.title`
//! favicon = "/favicon.png"         # .ico, .png or .gif
//! image_path_prefix = ""           # prepended to relative image paths
//! sitemap = false                  # write sitemap.xml
//! render_all = false               # ignore timestamps, render every document
//! drafts = false                   # render documents marked `draft: true`
//! style = []                       # global style sheets
//! include = []                     # static files/directories copied to output
//!
//! [meta]
//! description = "Default description for search engines and embeds"
//! image = "default_card.png"
//! twitter = "@someone"
//! ```
//!
//! Unknown keys are rejected to catch typos early.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Directory holding plates, snippets, functions and the config file.
pub const DATA_DIR: &str = "_data";
/// Config file name inside [`DATA_DIR`].
pub const CONFIG_FILE: &str = "oko.toml";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("no project config found at {0}")]
    Missing(PathBuf),
    #[error("Config validation error: {0}")]
    Validation(String),
}

/// Project configuration loaded from `_data/oko.toml`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct ProjectConfig {
    /// Canonical site origin, used for `og:url`, meta images and the sitemap.
    pub domain: String,
    /// Output directory, relative to the project root.
    pub output: String,
    pub title: String,
    /// Favicon path; the extension picks the link type.
    pub favicon: String,
    pub image_path_prefix: String,
    pub sitemap: bool,
    /// Render every document regardless of timestamps.
    pub render_all: bool,
    /// Render documents marked `draft: true`.
    pub drafts: bool,
    /// Global style sheets, inherited by documents without a plate.
    pub style: Vec<String>,
    /// Static files and directories copied verbatim into the output.
    pub include: Vec<String>,
    pub meta: BTreeMap<String, String>,
}

impl Default for ProjectConfig {
    fn default() -> Self {
        Self {
            domain: String::new(),
            output: "public".to_string(),
            title: String::new(),
            favicon: String::new(),
            image_path_prefix: String::new(),
            sitemap: false,
            render_all: false,
            drafts: false,
            style: Vec::new(),
            include: Vec::new(),
            meta: BTreeMap::new(),
        }
    }
}

impl ProjectConfig {
    /// Validate required settings.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.domain.trim().is_empty() {
            return Err(ConfigError::Validation(format!(
                "no domain name in {DATA_DIR}/{CONFIG_FILE}"
            )));
        }
        if self.output.trim().is_empty() {
            return Err(ConfigError::Validation("output must not be empty".into()));
        }
        if !self.favicon.is_empty() && crate::media::favicon_tag(&self.favicon).is_none() {
            return Err(ConfigError::Validation(format!(
                "favicon must be .ico, .png or .gif: {}",
                self.favicon
            )));
        }
        Ok(())
    }

    /// Whether a `project.<name>` condition holds.
    ///
    /// Strings are true when non-empty, lists and tables when they have
    /// entries. Unknown names are false.
    pub fn has_value(&self, name: &str) -> bool {
        match name {
            "domain" => !self.domain.is_empty(),
            "output" => !self.output.is_empty(),
            "title" => !self.title.is_empty(),
            "favicon" => !self.favicon.is_empty(),
            "image_path_prefix" => !self.image_path_prefix.is_empty(),
            "sitemap" => self.sitemap,
            "style" => !self.style.is_empty(),
            "include" => !self.include.is_empty(),
            "meta" => !self.meta.is_empty(),
            _ => false,
        }
    }
}

// =============================================================================
// Config loading, merging, and validation
// =============================================================================

/// Returns the stock default config as a `toml::Value::Table`.
pub fn stock_defaults_value() -> toml::Value {
    toml::Value::try_from(ProjectConfig::default()).expect("default config must serialize")
}

/// Recursively merge `overlay` on top of `base`.
///
/// - Tables are merged key-by-key (overlay keys override base keys).
/// - Non-table values in overlay replace base values entirely.
/// - Keys in base that are not in overlay are preserved.
pub fn merge_toml(base: toml::Value, overlay: toml::Value) -> toml::Value {
    match (base, overlay) {
        (toml::Value::Table(mut base_table), toml::Value::Table(overlay_table)) => {
            for (key, overlay_val) in overlay_table {
                let merged = match base_table.remove(&key) {
                    Some(base_val) => merge_toml(base_val, overlay_val),
                    None => overlay_val,
                };
                base_table.insert(key, merged);
            }
            toml::Value::Table(base_table)
        }
        (_, overlay) => overlay,
    }
}

/// Path of the config file for a project root.
pub fn config_path(root: &Path) -> PathBuf {
    root.join(DATA_DIR).join(CONFIG_FILE)
}

/// Merge an overlay onto the stock defaults, then deserialize and validate.
pub fn resolve_config(overlay: toml::Value) -> Result<ProjectConfig, ConfigError> {
    let merged = merge_toml(stock_defaults_value(), overlay);
    let config: ProjectConfig = merged.try_into()?;
    config.validate()?;
    Ok(config)
}

/// Load the project config from `<root>/_data/oko.toml`.
///
/// A missing file is an error: without a domain there is no project.
pub fn load_config(root: &Path) -> Result<ProjectConfig, ConfigError> {
    let path = config_path(root);
    if !path.exists() {
        return Err(ConfigError::Missing(path));
    }
    let content = fs::read_to_string(&path)?;
    let overlay: toml::Value = toml::from_str(&content)?;
    resolve_config(overlay)
}

/// Create the `_data/` skeleton of a new project with the stock config.
///
/// Refuses to overwrite an existing config file.
pub fn init_project(root: &Path) -> Result<PathBuf, ConfigError> {
    let path = config_path(root);
    if path.exists() {
        return Err(ConfigError::Validation(format!(
            "{} already exists",
            path.display()
        )));
    }
    let data = root.join(DATA_DIR);
    for dir in ["plates", "snippets", "functions"] {
        fs::create_dir_all(data.join(dir))?;
    }
    fs::write(&path, stock_config_toml())?;
    Ok(path)
}

/// Returns a fully-commented stock `oko.toml`.
///
/// Used by the `gen-config` and `init` CLI commands.
pub fn stock_config_toml() -> &'static str {
    r##"# oko project configuration
# ==========================
# Lives at _data/oko.toml. Only `domain` is required; every other value
# shown here is the default.

# Canonical origin of the published site.
domain = "https://website.com"

# Output directory, relative to the project root.
output = "public"

# Site title, testable with `if project.title { ... }`.
title = ""

# Favicon (.ico, .png or .gif).
favicon = ""

# Prepended to relative image paths in `%` images and *image* variables.
image_path_prefix = ""

# Write sitemap.xml after each build that rendered something.
sitemap = false

# Ignore timestamps and render everything (same as --all).
render_all = false

# Render documents marked `draft: true` (same as --drafts).
drafts = false

# Global style sheets for documents that declare no plate.
style = []

# Static files or directories copied into the output as-is.
include = []

# ---------------------------------------------------------------------------
# Embed / search engine defaults
# ---------------------------------------------------------------------------
[meta]
# description = "Default description for search engines and embeds"
# image = "default_card.png"
# twitter = "@someone"
"##
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write_config(root: &Path, content: &str) {
        fs::create_dir_all(root.join(DATA_DIR)).unwrap();
        fs::write(config_path(root), content).unwrap();
    }

    #[test]
    fn default_config_values() {
        let config = ProjectConfig::default();
        assert_eq!(config.output, "public");
        assert!(!config.render_all);
        assert!(!config.drafts);
        assert!(config.style.is_empty());
    }

    #[test]
    fn parse_partial_config() {
        let config: ProjectConfig = toml::from_str(
            r#"
domain = "https://a.org"
style = ["/main.css"]
"#,
        )
        .unwrap();
        assert_eq!(config.domain, "https://a.org");
        assert_eq!(config.style, vec!["/main.css"]);
        assert_eq!(config.output, "public");
    }

    // =========================================================================
    // load_config tests
    // =========================================================================

    #[test]
    fn load_config_missing_file_is_error() {
        let tmp = TempDir::new().unwrap();
        assert!(matches!(load_config(tmp.path()), Err(ConfigError::Missing(_))));
    }

    #[test]
    fn load_config_reads_file() {
        let tmp = TempDir::new().unwrap();
        write_config(
            tmp.path(),
            r#"
domain = "https://a.org"
output = "dist"

[meta]
description = "hello"
"#,
        );
        let config = load_config(tmp.path()).unwrap();
        assert_eq!(config.output, "dist");
        assert_eq!(config.meta["description"], "hello");
    }

    #[test]
    fn load_config_requires_domain() {
        let tmp = TempDir::new().unwrap();
        write_config(tmp.path(), "output = \"dist\"\n");
        let err = load_config(tmp.path()).unwrap_err();
        assert!(matches!(err, ConfigError::Validation(_)));
        assert!(err.to_string().contains("domain"));
    }

    #[test]
    fn load_config_invalid_toml_is_error() {
        let tmp = TempDir::new().unwrap();
        write_config(tmp.path(), "this is not valid toml [[[");
        assert!(matches!(load_config(tmp.path()), Err(ConfigError::Toml(_))));
    }

    #[test]
    fn unknown_key_rejected() {
        let tmp = TempDir::new().unwrap();
        write_config(tmp.path(), "domain = \"https://a.org\"\nsitemapp = true\n");
        let err = load_config(tmp.path()).unwrap_err();
        assert!(err.to_string().contains("unknown field"));
    }

    #[test]
    fn bad_favicon_extension_rejected() {
        let tmp = TempDir::new().unwrap();
        write_config(tmp.path(), "domain = \"https://a.org\"\nfavicon = \"/f.svg\"\n");
        assert!(matches!(
            load_config(tmp.path()),
            Err(ConfigError::Validation(_))
        ));
    }

    // =========================================================================
    // merge_toml tests
    // =========================================================================

    #[test]
    fn merge_toml_table_merge() {
        let base: toml::Value = toml::from_str("[meta]\na = \"1\"\nb = \"2\"\n").unwrap();
        let overlay: toml::Value = toml::from_str("[meta]\nb = \"3\"\n").unwrap();
        let merged = merge_toml(base, overlay);
        let meta = merged.get("meta").unwrap();
        assert_eq!(meta.get("a").unwrap().as_str(), Some("1"));
        assert_eq!(meta.get("b").unwrap().as_str(), Some("3"));
    }

    #[test]
    fn merge_toml_arrays_replace() {
        let base: toml::Value = toml::from_str("style = [\"a\", \"b\"]").unwrap();
        let overlay: toml::Value = toml::from_str("style = [\"c\"]").unwrap();
        let merged = merge_toml(base, overlay);
        assert_eq!(merged.get("style").unwrap().as_array().unwrap().len(), 1);
    }

    // =========================================================================
    // Project conditions
    // =========================================================================

    #[test]
    fn has_value_checks_presence() {
        let mut config = ProjectConfig::default();
        assert!(!config.has_value("domain"));
        assert!(!config.has_value("style"));
        assert!(config.has_value("output"));
        config.domain = "https://a.org".into();
        config.style.push("/s.css".into());
        assert!(config.has_value("domain"));
        assert!(config.has_value("style"));
        assert!(!config.has_value("no_such_field"));
    }

    // =========================================================================
    // stock_config_toml tests
    // =========================================================================

    #[test]
    fn stock_config_toml_is_loadable() {
        let overlay: toml::Value = toml::from_str(stock_config_toml()).unwrap();
        let config = resolve_config(overlay).unwrap();
        assert_eq!(config.domain, "https://website.com");
        assert_eq!(config.output, "public");
    }

    #[test]
    fn init_project_writes_skeleton_once() {
        let tmp = TempDir::new().unwrap();
        let path = init_project(tmp.path()).unwrap();
        assert_eq!(path, config_path(tmp.path()));
        assert!(tmp.path().join("_data/plates").is_dir());
        assert!(tmp.path().join("_data/snippets").is_dir());
        assert!(tmp.path().join("_data/functions").is_dir());
        assert!(load_config(tmp.path()).is_ok());

        let err = init_project(tmp.path()).unwrap_err();
        assert!(matches!(err, ConfigError::Validation(_)));
    }
}
