//! Session configuration and record modes

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{Result, RewindError};
use crate::filter::{FilterSpec, Replacement};

/// Record/replay policy for a session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordMode {
    /// Recording on, replay on; unmatched calls are appended to an existing
    /// recording
    Append,
    /// Recording off, replay off; any live call fails
    Block,
    /// Recording on, replay on; an existing recording is a closed contract
    Once,
    /// Recording on, replay off; an existing recording is overwritten
    Overwrite,
    /// Recording off, replay on; new requests fail
    ReplayOnly,
}

impl RecordMode {
    /// Whether live calls may be captured and persisted
    #[must_use]
    pub fn can_record(self) -> bool {
        matches!(
            self,
            RecordMode::Append | RecordMode::Once | RecordMode::Overwrite
        )
    }

    /// Whether an existing recording may be served
    #[must_use]
    pub fn can_replay(self) -> bool {
        matches!(
            self,
            RecordMode::Append | RecordMode::Once | RecordMode::ReplayOnly
        )
    }

    /// Lowercase mode name
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            RecordMode::Append => "append",
            RecordMode::Block => "block",
            RecordMode::Once => "once",
            RecordMode::Overwrite => "overwrite",
            RecordMode::ReplayOnly => "replay_only",
        }
    }
}

impl Default for RecordMode {
    fn default() -> Self {
        RecordMode::Once
    }
}

impl fmt::Display for RecordMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RecordMode {
    type Err = RewindError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "append" => Ok(RecordMode::Append),
            "block" => Ok(RecordMode::Block),
            "once" => Ok(RecordMode::Once),
            "overwrite" => Ok(RecordMode::Overwrite),
            "replay_only" => Ok(RecordMode::ReplayOnly),
            other => Err(RewindError::Config(format!("unknown record mode: {other}"))),
        }
    }
}

/// Session configuration
///
/// Built programmatically, or loaded from a TOML file where filter
/// replacements are a literal string or `{ delete = true }`; computed
/// replacements are code-only.
#[derive(Debug, Clone, Default)]
pub struct ReplayConfig {
    /// Recording file location; the codec suffix is applied later
    pub path: PathBuf,
    /// Persist even when the scope exits via an error
    pub record_on_error: bool,
    /// Header redaction rules
    pub filter_headers: FilterSpec,
    /// Querystring redaction rules
    pub filter_querystring: FilterSpec,
    /// URI redaction rules
    pub filter_uri: FilterSpec,
    /// Record/replay policy
    pub record_mode: RecordMode,
}

impl ReplayConfig {
    /// Configuration with defaults: mode `once`, no filters
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            ..Self::default()
        }
    }

    /// Configuration whose recording path derives from a qualified name
    ///
    /// The decorator-style entry point: closure qualifiers are stripped and
    /// the remaining segments become the file name under `directory`.
    pub fn for_qualname(directory: impl AsRef<Path>, qualname: &str) -> Self {
        Self::new(crate::naming::recording_path(directory, qualname))
    }

    /// Set the record mode
    #[must_use]
    pub fn record_mode(mut self, mode: RecordMode) -> Self {
        self.record_mode = mode;
        self
    }

    /// Persist even on error exits
    #[must_use]
    pub fn record_on_error(mut self, enabled: bool) -> Self {
        self.record_on_error = enabled;
        self
    }

    /// Set the header redaction rules
    #[must_use]
    pub fn filter_headers(mut self, spec: FilterSpec) -> Self {
        self.filter_headers = spec;
        self
    }

    /// Set the querystring redaction rules
    #[must_use]
    pub fn filter_querystring(mut self, spec: FilterSpec) -> Self {
        self.filter_querystring = spec;
        self
    }

    /// Set the URI redaction rules
    #[must_use]
    pub fn filter_uri(mut self, spec: FilterSpec) -> Self {
        self.filter_uri = spec;
        self
    }

    /// Load configuration from a TOML file
    ///
    /// # Errors
    ///
    /// Returns error if the file cannot be read or parsed, or if a filter
    /// entry is malformed
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| RewindError::Config(format!("failed to read config file: {e}")))?;

        let raw: RawConfig = toml::from_str(&content)
            .map_err(|e| RewindError::Config(format!("failed to parse config: {e}")))?;

        let config = Self {
            path: raw.path,
            record_on_error: raw.record_on_error,
            filter_headers: convert_filter(raw.filter_headers)?,
            filter_querystring: convert_filter(raw.filter_querystring)?,
            filter_uri: convert_filter(raw.filter_uri)?,
            record_mode: raw.record_mode,
        };

        config.validate()?;
        Ok(config)
    }

    /// Validate configuration
    ///
    /// # Errors
    ///
    /// Returns error if the recording path is empty
    pub fn validate(&self) -> Result<()> {
        if self.path.as_os_str().is_empty() {
            return Err(RewindError::Config(
                "recording path cannot be empty".to_string(),
            ));
        }

        Ok(())
    }
}

#[derive(Deserialize)]
struct RawConfig {
    path: PathBuf,
    #[serde(default)]
    record_on_error: bool,
    #[serde(default)]
    record_mode: RecordMode,
    #[serde(default)]
    filter_headers: BTreeMap<String, ReplacementSpec>,
    #[serde(default)]
    filter_querystring: BTreeMap<String, ReplacementSpec>,
    #[serde(default)]
    filter_uri: BTreeMap<String, ReplacementSpec>,
}

/// Declarative replacement: a literal string or `{ delete = true }`
#[derive(Deserialize)]
#[serde(untagged)]
enum ReplacementSpec {
    Literal(String),
    Delete { delete: bool },
}

fn convert_filter(raw: BTreeMap<String, ReplacementSpec>) -> Result<FilterSpec> {
    let mut spec = FilterSpec::new();

    for (key, replacement) in raw {
        let replacement = match replacement {
            ReplacementSpec::Literal(value) => Replacement::Literal(value),
            ReplacementSpec::Delete { delete: true } => Replacement::Delete,
            ReplacementSpec::Delete { delete: false } => {
                return Err(RewindError::Config(format!(
                    "filter entry '{key}': delete must be true or the entry omitted"
                )));
            }
        };
        spec.insert(key, replacement);
    }

    Ok(spec)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_mode_matrix() {
        let matrix = [
            (RecordMode::Append, true, true),
            (RecordMode::Once, true, true),
            (RecordMode::Overwrite, true, false),
            (RecordMode::Block, false, false),
            (RecordMode::ReplayOnly, false, true),
        ];

        for (mode, record, replay) in matrix {
            assert_eq!(mode.can_record(), record, "{mode} record");
            assert_eq!(mode.can_replay(), replay, "{mode} replay");
        }
    }

    #[test]
    fn test_mode_from_str() {
        assert_eq!("once".parse::<RecordMode>().unwrap(), RecordMode::Once);
        assert_eq!(
            "replay_only".parse::<RecordMode>().unwrap(),
            RecordMode::ReplayOnly
        );
        assert!("sometimes".parse::<RecordMode>().is_err());
    }

    #[test]
    fn test_default_mode_is_once() {
        assert_eq!(ReplayConfig::new("recordings/x").record_mode, RecordMode::Once);
    }

    #[test]
    fn test_for_qualname_derives_path() {
        let config = ReplayConfig::for_qualname("recordings", "api::users::{{closure}}::list");
        assert_eq!(config.path, Path::new("recordings/list"));
    }

    #[test]
    fn test_config_parse() {
        let config_toml = r#"
            path = "recordings/users"
            record_mode = "append"
            record_on_error = true

            [filter_headers]
            Authorization = { delete = true }
            X-Api-Key = "REDACTED"

            [filter_querystring]
            token = "REDACTED"
        "#;

        let mut file = NamedTempFile::new().unwrap();
        file.write_all(config_toml.as_bytes()).unwrap();

        let config = ReplayConfig::from_file(file.path()).unwrap();
        assert_eq!(config.record_mode, RecordMode::Append);
        assert!(config.record_on_error);
        assert!(matches!(
            config.filter_headers["Authorization"],
            Replacement::Delete
        ));
        assert!(matches!(
            config.filter_headers["X-Api-Key"],
            Replacement::Literal(ref v) if v == "REDACTED"
        ));
        assert!(config.filter_uri.is_empty());
    }

    #[test]
    fn test_config_rejects_delete_false() {
        let config_toml = r#"
            path = "recordings/users"

            [filter_headers]
            Authorization = { delete = false }
        "#;

        let mut file = NamedTempFile::new().unwrap();
        file.write_all(config_toml.as_bytes()).unwrap();

        assert!(ReplayConfig::from_file(file.path()).is_err());
    }

    #[test]
    fn test_validate_empty_path() {
        let config = ReplayConfig::new("");
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_builder() {
        let config = ReplayConfig::new("recordings/x")
            .record_mode(RecordMode::Block)
            .record_on_error(true)
            .filter_headers(FilterSpec::from([(
                "Authorization".to_string(),
                Replacement::Delete,
            )]));

        assert_eq!(config.record_mode, RecordMode::Block);
        assert!(config.record_on_error);
        assert_eq!(config.filter_headers.len(), 1);
    }
}
