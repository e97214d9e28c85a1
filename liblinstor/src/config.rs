//! Driver configuration.
//!
//! Configuration is layered: built-in defaults, then an optional YAML file,
//! then environment variables.
//!
//! Environment variables:
//! - `LS_CONTROLLERS`: comma separated LINSTOR controller URIs, overriding
//!   `controllers` from the file.
//! - `LINSTOR_CSI_DEBUG`: set to `1` to force debug logging.
//!
//! ```yaml
//! controllers: "linstor://ctrl-0,linstor://ctrl-1"
//! annotations_key: csi-volume-annotations
//! fallback_prefix: csi-
//! log:
//!   level: info
//!   format: json
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::codec::DEFAULT_ANNOTATIONS_KEY;
use crate::error::LinstorError;
use crate::name;

/// Prefix of randomly generated resource names.
pub const DEFAULT_FALLBACK_PREFIX: &str = "csi-";

/// A UUID with no letters: the worst case a fallback prefix must survive.
const DIGITS_ONLY_UUID: &str = "00000000-0000-4000-8000-000000000000";

/// Top-level configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct LinstorConfig {
    /// Comma separated controller URIs; empty uses the client's default.
    pub controllers: String,
    /// Key of the annotation that stores the serialized volume.
    pub annotations_key: String,
    /// Prefix for randomly generated resource names.
    pub fallback_prefix: String,
    /// `linstor` client executable used by the CLI controller client.
    pub linstor_bin: String,
    pub log: LogConfig,
}

impl Default for LinstorConfig {
    fn default() -> Self {
        Self {
            controllers: String::new(),
            annotations_key: DEFAULT_ANNOTATIONS_KEY.to_owned(),
            fallback_prefix: DEFAULT_FALLBACK_PREFIX.to_owned(),
            linstor_bin: "linstor".to_owned(),
            log: LogConfig::default(),
        }
    }
}

/// Log output settings, consumed by [`crate::logging::init`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct LogConfig {
    /// `EnvFilter` directive, e.g. `info` or `liblinstor=debug`.
    pub level: String,
    pub format: LogFormat,
    /// Debug level plus source locations on every event.
    pub debug: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_owned(),
            format: LogFormat::Text,
            debug: false,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

impl LinstorConfig {
    /// Load configuration from `path` (if any) and the process environment.
    pub fn load(path: Option<&Path>) -> Result<Self, LinstorError> {
        let mut config = match path {
            Some(path) => {
                let raw = std::fs::read_to_string(path).map_err(|e| {
                    LinstorError::Config(format!("failed to read {}: {e}", path.display()))
                })?;
                Self::from_yaml(&raw)?
            }
            None => Self::default(),
        };
        config.apply_overrides(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    /// Parse a YAML document; missing fields take their defaults.
    pub fn from_yaml(raw: &str) -> Result<Self, LinstorError> {
        serde_yaml::from_str(raw)
            .map_err(|e| LinstorError::Config(format!("failed to parse configuration: {e}")))
    }

    /// Apply environment overrides read through `lookup`.
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(controllers) = lookup("LS_CONTROLLERS").filter(|v| !v.is_empty()) {
            self.controllers = controllers;
        }
        if lookup("LINSTOR_CSI_DEBUG").is_some_and(|v| v == "1") {
            self.log.debug = true;
        }
    }

    /// Reject settings that would make the store produce illegal names or
    /// unreadable annotations.
    pub fn validate(&self) -> Result<(), LinstorError> {
        if self.annotations_key.is_empty() {
            return Err(LinstorError::Config("annotations_key must not be empty".into()));
        }
        name::validate(&format!("{}{DIGITS_ONLY_UUID}", self.fallback_prefix)).map_err(|e| {
            LinstorError::Config(format!(
                "fallback_prefix {:?} does not yield legal resource names: {e}",
                self.fallback_prefix
            ))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    #[test]
    fn defaults() {
        let config = LinstorConfig::default();
        assert_eq!(config.annotations_key, "csi-volume-annotations");
        assert_eq!(config.fallback_prefix, "csi-");
        assert_eq!(config.log.format, LogFormat::Text);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn partial_yaml_keeps_defaults() {
        let config = LinstorConfig::from_yaml(
            "controllers: linstor://ctrl-0\nlog:\n  format: json\n",
        )
        .unwrap();
        assert_eq!(config.controllers, "linstor://ctrl-0");
        assert_eq!(config.log.format, LogFormat::Json);
        assert_eq!(config.log.level, "info");
        assert_eq!(config.fallback_prefix, "csi-");
    }

    #[test]
    fn malformed_yaml_is_config_error() {
        assert!(matches!(
            LinstorConfig::from_yaml("log: [unclosed"),
            Err(LinstorError::Config(_))
        ));
    }

    #[test]
    fn environment_overrides() {
        let env = HashMap::from([
            ("LS_CONTROLLERS", "linstor://env-ctrl"),
            ("LINSTOR_CSI_DEBUG", "1"),
        ]);
        let mut config = LinstorConfig::default();
        config.apply_overrides(|k| env.get(k).map(|v| (*v).to_owned()));
        assert_eq!(config.controllers, "linstor://env-ctrl");
        assert!(config.log.debug);

        let mut untouched = LinstorConfig::default();
        untouched.apply_overrides(|_| None);
        assert_eq!(untouched, LinstorConfig::default());
    }

    #[test]
    fn bad_fallback_prefix_is_rejected() {
        let config = LinstorConfig {
            fallback_prefix: "9".into(),
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(LinstorError::Config(_))));

        let config = LinstorConfig {
            fallback_prefix: "a-very-long-prefix-that-overflows-".into(),
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "annotations_key: my-annotations").unwrap();
        writeln!(file, "linstor_bin: /opt/linstor/bin/linstor").unwrap();

        let config = LinstorConfig::load(Some(file.path())).unwrap();
        assert_eq!(config.annotations_key, "my-annotations");
        assert_eq!(config.linstor_bin, "/opt/linstor/bin/linstor");
    }

    #[test]
    fn load_missing_file_fails() {
        let err = LinstorConfig::load(Some(Path::new("/nonexistent/linstor-csi.yaml")))
            .unwrap_err();
        assert!(matches!(err, LinstorError::Config(_)));
    }
}
