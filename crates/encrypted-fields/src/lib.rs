//! `encrypted-fields`: transparent field-level encryption for stored records.
//!
//! Values are canonicalised by a per-type [`codec`], encrypted with a
//! [`keyset`], and stored as text. Reads reverse the pipeline and tolerate
//! legacy plaintext written before encryption was enabled.
//!
//! Typical setup:
//! 1. Load [`Settings`] from `ENCRYPTED_FIELDS_*` environment variables.
//! 2. Build a [`Resolver`]; register extra [`KeysetSource`]s if needed.
//! 3. Resolve typed fields with [`Resolver::field`], or a whole
//!    [`RecordSchema`] for JSON records.
//!
//! ```no_run
//! use encrypted_fields::{codec::IntegerCodec, FieldSpec, Resolver, SemanticType};
//!
//! # fn main() -> encrypted_fields::Result<()> {
//! let resolver = Resolver::from_env()?;
//! let age = resolver.field::<IntegerCodec>(&FieldSpec::new("age", SemanticType::Integer))?;
//! let stored = age.to_stored(Some(&42))?;
//! assert_eq!(age.from_stored(stored.as_deref())?, Some(42));
//! # Ok(())
//! # }
//! ```

pub mod codec;
pub mod config;
pub mod crypto;
pub mod field;
pub mod keyset;
pub mod record;
pub mod resolver;

pub use common::{FieldError, FieldSpec, Result, SemanticType};
pub use config::Settings;
pub use field::{EncryptedField, FieldPolicy};
pub use keyset::{Capability, Keyset, KeysetFile, KeysetSource};
pub use record::{AnyField, RecordSchema};
pub use resolver::{ResolvedField, Resolver};
