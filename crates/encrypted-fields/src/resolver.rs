//! Binds field declarations to keysets.
//!
//! The keyset location of a field is resolved in order:
//!
//! 1. `key_name` set: `<key_root>/<key_name>`. A missing `key_root` is an error.
//! 2. `keydir` from [`Settings`].
//! 3. Otherwise there is no key material and the field cannot be built.
//!
//! Each `(source, location)` pair is loaded once and shared by every field
//! that resolves to it.

use std::{
    collections::HashMap,
    fmt,
    path::{Component, Path, PathBuf},
    sync::Arc,
};

use common::{FieldError, FieldSpec, Result};
use tracing::info;

use crate::codec::Codec;
use crate::config::Settings;
use crate::field::{EncryptedField, FieldPolicy};
use crate::keyset::{FileKeysetSource, Keyset, KeysetCache, KeysetSource};

/// Name under which the filesystem source is registered.
pub const FILE_SOURCE: &str = "file";

/// A field's keyset and policy, before a codec is chosen.
pub struct ResolvedField {
    pub keyset: Arc<dyn Keyset>,
    pub policy: FieldPolicy,
}

impl fmt::Debug for ResolvedField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResolvedField")
            .field("keyset", &self.keyset.fingerprint())
            .field("policy", &self.policy)
            .finish()
    }
}

/// Resolves [`FieldSpec`]s against [`Settings`] and registered key sources.
pub struct Resolver {
    settings: Settings,
    sources: HashMap<String, Arc<dyn KeysetSource>>,
    cache: KeysetCache,
}

impl Resolver {
    /// A resolver with only the filesystem source registered.
    pub fn new(settings: Settings) -> Self {
        let mut sources: HashMap<String, Arc<dyn KeysetSource>> = HashMap::new();
        sources.insert(FILE_SOURCE.to_owned(), Arc::new(FileKeysetSource));
        Self {
            settings,
            sources,
            cache: KeysetCache::new(),
        }
    }

    /// Build a resolver from `ENCRYPTED_FIELDS_*` environment variables.
    ///
    /// # Errors
    ///
    /// Returns [`FieldError::Config`] if the environment is invalid.
    pub fn from_env() -> Result<Self> {
        Ok(Self::new(Settings::from_env()?))
    }

    /// Register an alternative key source, selected by fields whose
    /// `keyset_source` equals `name`. Re-registering a name replaces it.
    pub fn register_source(&mut self, name: impl Into<String>, source: Arc<dyn KeysetSource>) {
        self.sources.insert(name.into(), source);
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn cache(&self) -> &KeysetCache {
        &self.cache
    }

    /// The keyset location `spec` resolves to.
    ///
    /// # Errors
    ///
    /// Returns [`FieldError::Config`] when a named key has no root or would
    /// escape it, or when no key material is configured at all.
    pub fn keyset_location(&self, spec: &FieldSpec) -> Result<PathBuf> {
        if let Some(key_name) = spec.key_name.as_deref() {
            let root = self.settings.key_root.as_ref().ok_or_else(|| {
                FieldError::Config(format!(
                    "field {}: key_name {key_name:?} requires ENCRYPTED_FIELDS_KEY_ROOT",
                    spec.name
                ))
            })?;
            if !is_relative_name(key_name) {
                return Err(FieldError::Config(format!(
                    "field {}: key_name {key_name:?} must be a relative path below the key root",
                    spec.name
                )));
            }
            return Ok(root.join(key_name));
        }
        self.settings.keydir.clone().ok_or_else(|| {
            FieldError::Config(format!("field {}: no key material configured", spec.name))
        })
    }

    /// Resolve the keyset and policy for `spec`, loading the keyset on first use.
    ///
    /// # Errors
    ///
    /// Returns [`FieldError::Config`] for an unknown key source or missing
    /// location, and [`FieldError::KeyLoad`] if the keyset cannot be loaded.
    pub fn resolve(&self, spec: &FieldSpec) -> Result<ResolvedField> {
        let source_name = spec.keyset_source.as_deref().unwrap_or(FILE_SOURCE);
        let source = self.sources.get(source_name).ok_or_else(|| {
            FieldError::Config(format!(
                "field {}: unknown keyset source {source_name:?}",
                spec.name
            ))
        })?;
        let location = self.keyset_location(spec)?;

        let (keyset, loaded) = self
            .cache
            .get_or_load(source_name, &location, source.as_ref())?;
        if loaded {
            info!(
                source = source_name,
                location = %location.display(),
                fingerprint = %keyset.fingerprint(),
                capability = ?keyset.capability(),
                "keyset loaded"
            );
        }

        Ok(ResolvedField {
            keyset,
            policy: FieldPolicy::from_spec(spec, self.settings.enforce_max_length),
        })
    }

    /// Resolve `spec` into a typed field using codec `C`.
    ///
    /// # Errors
    ///
    /// As [`Self::resolve`], plus [`FieldError::Config`] if `C` does not
    /// serve the declared type or the keyset cannot encrypt for a writable field.
    pub fn field<C: Codec>(&self, spec: &FieldSpec) -> Result<EncryptedField<C>> {
        if !C::supports(spec.semantic_type) {
            return Err(FieldError::Config(format!(
                "field {}: codec does not support type {}",
                spec.name, spec.semantic_type
            )));
        }
        let ResolvedField { keyset, policy } = self.resolve(spec)?;
        EncryptedField::new(spec.name.clone(), spec.semantic_type, keyset, policy)
    }
}

/// Non-empty, and made only of plain components: no root, prefix, `.` or `..`.
fn is_relative_name(key_name: &str) -> bool {
    let path = Path::new(key_name);
    path.components().next().is_some()
        && path
            .components()
            .all(|c| matches!(c, Component::Normal(_)))
}

impl fmt::Debug for Resolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<&str> = self.sources.keys().map(String::as_str).collect();
        names.sort_unstable();
        f.debug_struct("Resolver")
            .field("settings", &self.settings)
            .field("sources", &names)
            .field("cache", &self.cache)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use common::SemanticType;

    use super::*;
    use crate::codec::{IntegerCodec, TextCodec};
    use crate::keyset::{Capability, KeyLoadError, KeysetFile, MockKeyset};

    fn keydir() -> (tempfile::TempDir, Settings) {
        let dir = tempfile::tempdir().unwrap();
        KeysetFile::generate("default").write_to(dir.path()).unwrap();
        let settings = Settings::default().with_keydir(dir.path());
        (dir, settings)
    }

    #[test]
    fn location_precedence() {
        let settings = Settings::default()
            .with_keydir("/keys/default")
            .with_key_root("/keys");
        let r = Resolver::new(settings);
        let plain = FieldSpec::new("a", SemanticType::Text);
        assert_eq!(r.keyset_location(&plain).unwrap(), Path::new("/keys/default"));
        let named = FieldSpec::new("b", SemanticType::Text).with_key_name("billing");
        assert_eq!(r.keyset_location(&named).unwrap(), Path::new("/keys/billing"));
    }

    #[test]
    fn key_names_must_stay_below_root() {
        let r = Resolver::new(Settings::default().with_key_root("/keys"));
        for bad in ["/etc/keys", "../outside", "billing/../../etc", "", "./billing"] {
            let spec = FieldSpec::new("b", SemanticType::Text).with_key_name(bad);
            assert!(
                matches!(r.keyset_location(&spec), Err(FieldError::Config(_))),
                "accepted {bad:?}"
            );
        }
        let nested = FieldSpec::new("b", SemanticType::Text).with_key_name("team/billing");
        assert_eq!(
            r.keyset_location(&nested).unwrap(),
            Path::new("/keys/team/billing")
        );
    }

    #[test]
    fn named_key_without_root_is_config_error() {
        let r = Resolver::new(Settings::default().with_keydir("/keys/default"));
        let named = FieldSpec::new("b", SemanticType::Text).with_key_name("billing");
        assert!(matches!(r.keyset_location(&named), Err(FieldError::Config(_))));
    }

    #[test]
    fn nothing_configured_is_config_error() {
        let r = Resolver::new(Settings::default());
        let err = r
            .keyset_location(&FieldSpec::new("a", SemanticType::Text))
            .unwrap_err();
        assert!(err.to_string().contains("no key material configured"));
    }

    #[test]
    fn resolves_and_caches_keyset() {
        let (_dir, settings) = keydir();
        let r = Resolver::new(settings);
        let a = r.resolve(&FieldSpec::new("a", SemanticType::Text)).unwrap();
        let b = r.resolve(&FieldSpec::new("b", SemanticType::Integer)).unwrap();
        assert!(Arc::ptr_eq(&a.keyset, &b.keyset));
        assert_eq!(r.cache().len(), 1);
    }

    #[test]
    fn missing_keyset_is_key_load_error() {
        let dir = tempfile::tempdir().unwrap();
        let r = Resolver::new(Settings::default().with_keydir(dir.path().join("absent")));
        assert!(matches!(
            r.resolve(&FieldSpec::new("a", SemanticType::Text)),
            Err(FieldError::KeyLoad(_))
        ));
    }

    #[test]
    fn global_enforcement_is_or_ed() {
        let (_dir, settings) = keydir();
        let r = Resolver::new(settings.enforcing_max_length());
        let spec = FieldSpec::new("a", SemanticType::Char).with_max_length(20);
        assert!(r.resolve(&spec).unwrap().policy.enforce_max_length);
    }

    #[test]
    fn unknown_source_is_config_error() {
        let (_dir, settings) = keydir();
        let r = Resolver::new(settings);
        let spec = FieldSpec::new("a", SemanticType::Text).with_keyset_source("vault");
        assert!(matches!(r.resolve(&spec), Err(FieldError::Config(_))));
    }

    struct FixtureSource;

    impl KeysetSource for FixtureSource {
        fn load(&self, location: &Path) -> std::result::Result<Arc<dyn Keyset>, KeyLoadError> {
            if location.ends_with("broken") {
                return Err(KeyLoadError::Source {
                    source_name: "fixture".into(),
                    message: "unavailable".into(),
                });
            }
            let mut ks = MockKeyset::new();
            ks.expect_capability().return_const(Capability::DecryptOnly);
            ks.expect_fingerprint().return_const("fixture".to_string());
            Ok(Arc::new(ks))
        }
    }

    #[test]
    fn registered_source_is_used() {
        let mut r = Resolver::new(Settings::default().with_keydir("/anywhere"));
        r.register_source("fixture", Arc::new(FixtureSource));
        let spec = FieldSpec::new("a", SemanticType::Text)
            .with_keyset_source("fixture")
            .decrypt_only();
        let field = r.field::<TextCodec>(&spec).unwrap();
        assert!(field.policy().decrypt_only);
    }

    #[test]
    fn custom_source_failure_is_key_load_error() {
        let mut r = Resolver::new(Settings::default().with_keydir("/broken"));
        r.register_source("fixture", Arc::new(FixtureSource));
        let spec = FieldSpec::new("a", SemanticType::Text).with_keyset_source("fixture");
        assert!(matches!(r.resolve(&spec), Err(FieldError::KeyLoad(_))));
    }

    #[test]
    fn writable_field_on_decrypt_only_keyset_is_config_error() {
        let mut r = Resolver::new(Settings::default().with_keydir("/anywhere"));
        r.register_source("fixture", Arc::new(FixtureSource));
        let spec = FieldSpec::new("a", SemanticType::Text).with_keyset_source("fixture");
        assert!(matches!(r.field::<TextCodec>(&spec), Err(FieldError::Config(_))));
    }

    #[test]
    fn codec_mismatch_is_checked_before_loading() {
        let r = Resolver::new(Settings::default());
        let spec = FieldSpec::new("n", SemanticType::Integer);
        let err = r.field::<TextCodec>(&spec).unwrap_err();
        assert!(err.to_string().contains("does not support"));
        assert!(r.field::<IntegerCodec>(&spec).is_err());
    }
}
