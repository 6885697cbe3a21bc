//! Process-wide settings for locating key material.
//!
//! Values are read from `ENCRYPTED_FIELDS_*` environment variables:
//!
//! | Variable                              | Meaning                                  |
//! |---------------------------------------|------------------------------------------|
//! | `ENCRYPTED_FIELDS_KEYDIR`             | default keyset location                  |
//! | `ENCRYPTED_FIELDS_KEY_ROOT`           | root directory for named keys            |
//! | `ENCRYPTED_FIELDS_ENFORCE_MAX_LENGTH` | reject over-long ciphertext on every field |

use std::path::PathBuf;

use common::{FieldError, Result};
use serde::Deserialize;

pub const ENV_PREFIX: &str = "ENCRYPTED_FIELDS";

/// Validated settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct Settings {
    /// Keyset location used by fields without a `key_name`.
    #[serde(default)]
    pub keydir: Option<PathBuf>,

    /// Directory holding one keyset per `key_name`.
    #[serde(default)]
    pub key_root: Option<PathBuf>,

    /// Enforce `max_length` on every field, not only those that opt in.
    #[serde(default)]
    pub enforce_max_length: bool,
}

impl Settings {
    /// Load settings from the process environment.
    ///
    /// # Errors
    ///
    /// Returns [`FieldError::Config`] if a variable cannot be parsed or a
    /// configured path is blank.
    pub fn from_env() -> Result<Self> {
        Self::from_source(config::Environment::with_prefix(ENV_PREFIX))
    }

    fn from_source(source: config::Environment) -> Result<Self> {
        let cfg = config::Config::builder()
            .add_source(source.try_parsing(true))
            .build()
            .map_err(|e| FieldError::Config(format!("failed to read settings: {e}")))?;

        let settings: Settings = cfg
            .try_deserialize()
            .map_err(|e| FieldError::Config(format!("failed to deserialise settings: {e}")))?;

        settings.validate()?;
        Ok(settings)
    }

    pub fn with_keydir(mut self, keydir: impl Into<PathBuf>) -> Self {
        self.keydir = Some(keydir.into());
        self
    }

    pub fn with_key_root(mut self, key_root: impl Into<PathBuf>) -> Self {
        self.key_root = Some(key_root.into());
        self
    }

    pub fn enforcing_max_length(mut self) -> Self {
        self.enforce_max_length = true;
        self
    }

    fn validate(&self) -> Result<()> {
        ensure_non_blank(self.keydir.as_ref(), "ENCRYPTED_FIELDS_KEYDIR")?;
        ensure_non_blank(self.key_root.as_ref(), "ENCRYPTED_FIELDS_KEY_ROOT")?;
        Ok(())
    }
}

fn ensure_non_blank(path: Option<&PathBuf>, name: &str) -> Result<()> {
    match path {
        Some(p) if p.as_os_str().to_string_lossy().trim().is_empty() => Err(FieldError::Config(
            format!("{name} must not be empty when set"),
        )),
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn env(vars: &[(&str, &str)]) -> config::Environment {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
            .collect();
        config::Environment::with_prefix(ENV_PREFIX).source(Some(map))
    }

    #[test]
    fn defaults_when_unset() {
        let s = Settings::from_source(env(&[])).unwrap();
        assert_eq!(s, Settings::default());
        assert!(!s.enforce_max_length);
    }

    #[test]
    fn reads_all_variables() {
        let s = Settings::from_source(env(&[
            ("ENCRYPTED_FIELDS_KEYDIR", "/etc/keys/default"),
            ("ENCRYPTED_FIELDS_KEY_ROOT", "/etc/keys"),
            ("ENCRYPTED_FIELDS_ENFORCE_MAX_LENGTH", "true"),
        ]))
        .unwrap();
        assert_eq!(s.keydir.as_deref(), Some(std::path::Path::new("/etc/keys/default")));
        assert_eq!(s.key_root.as_deref(), Some(std::path::Path::new("/etc/keys")));
        assert!(s.enforce_max_length);
    }

    #[test]
    fn ignores_unprefixed_variables() {
        let s = Settings::from_source(env(&[("KEYDIR", "/nope")])).unwrap();
        assert_eq!(s.keydir, None);
    }

    #[test]
    fn rejects_unparseable_flag() {
        let res = Settings::from_source(env(&[("ENCRYPTED_FIELDS_ENFORCE_MAX_LENGTH", "sometimes")]));
        assert!(matches!(res, Err(FieldError::Config(_))));
    }

    #[test]
    fn rejects_blank_keydir() {
        let res = Settings::from_source(env(&[("ENCRYPTED_FIELDS_KEYDIR", "  ")]));
        assert!(matches!(res, Err(FieldError::Config(_))));
    }

    #[test]
    fn builder_helpers() {
        let s = Settings::default()
            .with_keydir("/a")
            .with_key_root("/b")
            .enforcing_max_length();
        assert_eq!(s.keydir, Some(PathBuf::from("/a")));
        assert_eq!(s.key_root, Some(PathBuf::from("/b")));
        assert!(s.enforce_max_length);
    }
}
