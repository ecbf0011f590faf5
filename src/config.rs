//! `aliasgen.toml` configuration.
//!
//! Every key is optional; a missing file is the same as an empty one.
//!
//! ```toml
//! attribute = "customjson"
//! placeholder = "$"
//! suffix = "_json.rs"
//! exclude = ["target"]
//!
//! [signatures]
//! "DateTime::timestamp" = "i64"
//! ```

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use aliasgen_core::directive;
use aliasgen_core::lang::conventions;
use serde::Deserialize;
use thiserror::Error;

use crate::frontend::evaluator::{SignatureError, SignatureTable};
use crate::frontend::record::ScanOptions;

/// File name looked up in the current directory when `--config` is not given.
pub const DEFAULT_CONFIG_FILE: &str = "aliasgen.toml";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file `{}`: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config file `{}`: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Field attribute carrying directives.
    pub attribute: String,
    /// Reserved placeholder character.
    pub placeholder: char,
    /// Output file suffix.
    pub suffix: String,
    /// Directory names never scanned. Hidden directories are always skipped.
    pub exclude: Vec<String>,
    /// Extra signatures for the type evaluator, `Type::member` or `function` → output type.
    pub signatures: BTreeMap<String, String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            attribute: conventions::DEFAULT_ATTRIBUTE.to_string(),
            placeholder: directive::PLACEHOLDER,
            suffix: conventions::DEFAULT_SUFFIX.to_string(),
            exclude: vec!["target".to_string()],
            signatures: BTreeMap::new(),
        }
    }
}

impl Config {
    /// Load and validate configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::parse(path, &contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Like [`Config::load`], returning `None` when the file does not exist.
    pub fn load_optional(path: impl AsRef<Path>) -> Result<Option<Self>, ConfigError> {
        let path = path.as_ref();
        if !path.exists() {
            return Ok(None);
        }
        Self::load(path).map(Some)
    }

    fn parse(path: &Path, contents: &str) -> Result<Self, ConfigError> {
        toml::from_str(contents).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !is_identifier(&self.attribute) {
            return Err(ConfigError::Invalid(format!(
                "attribute `{}` is not a valid identifier",
                self.attribute
            )));
        }
        if self.placeholder.is_whitespace() || is_ident_char(self.placeholder) {
            return Err(ConfigError::Invalid(format!(
                "placeholder `{}` must be a single non-identifier, non-whitespace character",
                self.placeholder
            )));
        }
        if self.suffix.len() <= ".rs".len() || !self.suffix.ends_with(".rs") || self.suffix.contains(['/', '\\']) {
            return Err(ConfigError::Invalid(format!(
                "suffix `{}` must be a file name suffix ending in `.rs`",
                self.suffix
            )));
        }
        self.signature_table()?;
        Ok(())
    }

    /// Configured signatures as an evaluator table.
    pub fn signature_table(&self) -> Result<SignatureTable, ConfigError> {
        SignatureTable::from_entries(self.signatures.iter().map(|(k, v)| (k.as_str(), v.as_str())))
            .map_err(|e: SignatureError| ConfigError::Invalid(e.to_string()))
    }

    pub fn scan_options(&self) -> ScanOptions {
        ScanOptions {
            attribute: self.attribute.clone(),
            placeholder: self.placeholder,
        }
    }
}

fn is_ident_char(c: char) -> bool {
    c == '_' || c.is_alphanumeric()
}

fn is_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) if first == '_' || first.is_alphabetic() => {}
        _ => return false,
    }
    s != "_" && chars.all(is_ident_char)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(text: &str) -> Result<Config, ConfigError> {
        let config = Config::parse(Path::new("aliasgen.toml"), text)?;
        config.validate()?;
        Ok(config)
    }

    #[test]
    fn test_empty_file_is_default() {
        assert_eq!(parse("").unwrap(), Config::default());
    }

    #[test]
    fn test_full_file() {
        let config = parse(
            r#"
            attribute = "wire"
            placeholder = "@"
            suffix = "_wire.rs"
            exclude = ["vendor"]

            [signatures]
            "DateTime::timestamp" = "i64"
            "now" = "DateTime<Utc>"
            "#,
        )
        .unwrap();
        assert_eq!(config.attribute, "wire");
        assert_eq!(config.placeholder, '@');
        assert_eq!(config.scan_options().placeholder, '@');
        assert_eq!(config.exclude, ["vendor"]);
        let table = config.signature_table().unwrap();
        assert!(table.member("DateTime", "timestamp").is_some());
        assert!(table.function("now").is_some());
    }

    #[test]
    fn test_unknown_keys_are_rejected() {
        assert!(matches!(parse("atribute = \"x\""), Err(ConfigError::Parse { .. })));
    }

    #[test]
    fn test_invalid_values() {
        for text in [
            "attribute = \"1x\"",
            "attribute = \"\"",
            "placeholder = \"a\"",
            "placeholder = \" \"",
            "suffix = \".rs\"",
            "suffix = \"_json.txt\"",
            "[signatures]\n\"\" = \"i64\"",
            "[signatures]\n\"A::b\" = \"Vec<\"",
        ] {
            assert!(matches!(parse(text), Err(ConfigError::Invalid(_))), "{text}");
        }
    }

    #[test]
    fn test_missing_file_is_none() {
        let tmp = tempfile::tempdir().unwrap();
        assert!(Config::load_optional(tmp.path().join("aliasgen.toml")).unwrap().is_none());

        let path = tmp.path().join("aliasgen.toml");
        fs::write(&path, "attribute = \"wire\"\n").unwrap();
        assert_eq!(Config::load_optional(&path).unwrap().unwrap().attribute, "wire");
    }
}
