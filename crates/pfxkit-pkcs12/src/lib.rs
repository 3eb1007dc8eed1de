#![forbid(unsafe_code)]

//! PKCS#12 (.p12/.pfx) container binding for pfxkit.
//!
//! Decoding, key derivation, MAC verification and decryption are done by a
//! native library behind the [`Backend`] trait (OpenSSL by default). This
//! crate owns the handles that come back: every [`PrivateKey`],
//! [`Certificate`] and [`CaChain`] holds its own reference, and a [`Pkcs12`]
//! releases what it owns exactly once.
//!
//! ```no_run
//! use pfxkit_pkcs12::Pkcs12;
//!
//! let der = std::fs::read("identity.p12")?;
//! let p12: Pkcs12 = Pkcs12::parse(&der, "secret")?;
//! if let Some(cert) = p12.certificate() {
//!     println!("{}", cert.subject());
//! }
//! # Ok::<(), pfxkit_core::Error>(())
//! ```

pub mod backend;
pub mod builder;
pub mod container;
pub mod handle;
pub mod info;
pub mod ossl;

#[cfg(test)]
pub(crate) mod testutil;

pub use backend::{Backend, Extracted};
pub use builder::{MacDigest, Pkcs12Builder};
pub use container::Pkcs12;
pub use handle::{CaChain, Certificate, PrivateKey};
pub use info::{Algorithm, MacInfo, Pkcs12Info, SafeContents};
pub use ossl::OpenSsl;
