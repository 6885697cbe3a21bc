//! AES-256-GCM-SIV primitives for sealing canonical field bytes.
//!
//! This module knows nothing about fields, codecs, or configuration.
//! It provides the low-level seal/open operations used by the keyset layer.
//!
//! # Sealed value format
//!
//! ```text
//! v1.<base64url-no-pad(nonce)>.<base64url-no-pad(ciphertext+tag)>
//! ```
//!
//! The format is pure ASCII, so it survives any text-capable column.

pub mod cipher;

pub use cipher::{sealed_len, CipherError, SealedValue, KEY_LEN};
