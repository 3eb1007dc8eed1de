#![forbid(unsafe_code)]

//! The contract a native PKCS#12 library has to fulfil.
//!
//! A backend owns all of the actual decoding, key derivation, MAC checking
//! and bag decryption. This crate only manages the handles it hands back.
//!
//! Handle lifetimes map onto Rust ownership:
//!
//! | native operation | Rust expression          |
//! |------------------|--------------------------|
//! | `decode`         | [`Backend::decode`]      |
//! | `extract`        | [`Backend::extract`]     |
//! | `free`           | `Drop` of the handle     |
//! | `ref_increment`  | `Clone` of the handle    |
//!
//! The container handle is deliberately not required to be `Clone`: it has
//! exactly one owner and is released exactly once.

use pfxkit_core::Result;

/// A native PKCS#12 implementation.
pub trait Backend: Sized {
    /// Decoded, still encrypted container.
    type Container;
    /// Reference-counted private key handle. `clone` takes a new reference.
    type Key: Clone;
    /// Reference-counted X.509 certificate handle. `clone` takes a new reference.
    type Cert: Clone;

    /// Decode a serialized container. Must fail with
    /// [`Error::Decode`](pfxkit_core::Error::Decode) on malformed input.
    fn decode(der: &[u8]) -> Result<Self::Container>;

    /// Recover the key, end-entity certificate and CA certificates.
    ///
    /// Must fail with [`Error::Extract`](pfxkit_core::Error::Extract) on a
    /// wrong password or a corrupted MAC, and must not hand back any handle
    /// in that case.
    fn extract(container: &Self::Container, password: &str) -> Result<Extracted<Self>>;

    /// Whether `key` is the private half of the key certified by `cert`.
    fn key_matches(cert: &Self::Cert, key: &Self::Key) -> Result<bool>;
}

/// Handles produced by a successful [`Backend::extract`].
pub struct Extracted<B: Backend> {
    pub key: Option<B::Key>,
    pub cert: Option<B::Cert>,
    pub ca: Option<Vec<B::Cert>>,
}

impl<B: Backend> Default for Extracted<B> {
    fn default() -> Self {
        Self {
            key: None,
            cert: None,
            ca: None,
        }
    }
}
