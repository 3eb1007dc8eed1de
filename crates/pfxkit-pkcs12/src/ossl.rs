#![forbid(unsafe_code)]

//! OpenSSL backend.
//!
//! `X509` and `PKey` are reference counted inside OpenSSL: cloning one calls
//! `X509_up_ref` / `EVP_PKEY_up_ref` and dropping one calls the matching
//! `*_free`. That is exactly the shared-handle behaviour the wrappers need.

use log::debug;
use openssl::error::ErrorStack;
use openssl::pkcs12::Pkcs12 as NativePkcs12;
use openssl::pkey::{Id, PKey, Private};
use openssl::x509::{X509NameRef, X509};
use pfxkit_core::{Error, Result};

use crate::backend::{Backend, Extracted};
use crate::handle::{CaChain, Certificate, PrivateKey};

/// [`Backend`] implemented over OpenSSL's `d2i_PKCS12` / `PKCS12_parse`.
#[derive(Debug, Clone, Copy, Default)]
pub struct OpenSsl;

impl Backend for OpenSsl {
    type Container = NativePkcs12;
    type Key = PKey<Private>;
    type Cert = X509;

    fn decode(der: &[u8]) -> Result<NativePkcs12> {
        openssl::init();
        NativePkcs12::from_der(der).map_err(|e| {
            debug!("d2i_PKCS12 failed: {e}");
            Error::Decode {
                reason: describe(&e),
                code: first_code(&e),
            }
        })
    }

    fn extract(container: &NativePkcs12, password: &str) -> Result<Extracted<Self>> {
        if password.contains('\0') {
            return Err(Error::Extract {
                reason: "password contains a NUL byte".into(),
                code: None,
            });
        }
        let parsed = container.parse2(password).map_err(|e| {
            debug!("PKCS12_parse failed: {e}");
            Error::Extract {
                reason: describe(&e),
                code: first_code(&e),
            }
        })?;

        Ok(Extracted {
            key: parsed.pkey,
            cert: parsed.cert,
            ca: parsed.ca.map(|stack| stack.into_iter().collect()),
        })
    }

    fn key_matches(cert: &X509, key: &PKey<Private>) -> Result<bool> {
        let public = cert
            .public_key()
            .map_err(|e| Error::Certificate(format!("cannot read public key: {e}")))?;
        Ok(key.public_eq(&public))
    }
}

/// Text for an error queue snapshot. OpenSSL sometimes fails without queueing
/// anything, which would otherwise render as an empty reason.
pub(crate) fn describe(e: &ErrorStack) -> String {
    if e.errors().is_empty() {
        "no error reported by OpenSSL".into()
    } else {
        e.to_string()
    }
}

pub(crate) fn first_code(e: &ErrorStack) -> Option<u64> {
    e.errors().first().map(|err| err.code() as u64)
}

// ── OpenSSL-specific conveniences ────────────────────────────────────────

impl PrivateKey<OpenSsl> {
    /// Load a private key from PEM (PKCS#8, PKCS#1 or SEC1).
    pub fn from_pem(pem: &[u8]) -> Result<Self> {
        PKey::private_key_from_pem(pem)
            .map(Self::from_handle)
            .map_err(|e| Error::Key(format!("invalid PEM private key: {e}")))
    }

    /// Short algorithm name, e.g. `RSA` or `EC`.
    pub fn algorithm(&self) -> &'static str {
        match self.handle().id() {
            Id::RSA => "RSA",
            Id::EC => "EC",
            Id::DSA => "DSA",
            Id::DH => "DH",
            Id::ED25519 => "Ed25519",
            Id::ED448 => "Ed448",
            Id::X25519 => "X25519",
            Id::X448 => "X448",
            _ => "unknown",
        }
    }

    /// Key size in bits.
    pub fn bits(&self) -> u32 {
        self.handle().bits()
    }

    /// Unencrypted PKCS#8 PEM.
    pub fn to_pkcs8_pem(&self) -> Result<Vec<u8>> {
        self.handle()
            .private_key_to_pem_pkcs8()
            .map_err(|e| Error::Key(format!("PKCS#8 PEM encoding failed: {e}")))
    }

    /// Unencrypted PKCS#8 DER.
    pub fn to_pkcs8_der(&self) -> Result<Vec<u8>> {
        self.handle()
            .private_key_to_pkcs8()
            .map_err(|e| Error::Key(format!("PKCS#8 DER encoding failed: {e}")))
    }
}

impl Certificate<OpenSsl> {
    /// Load a single certificate from PEM.
    pub fn from_pem(pem: &[u8]) -> Result<Self> {
        X509::from_pem(pem)
            .map(Self::from_handle)
            .map_err(|e| Error::Certificate(format!("invalid PEM certificate: {e}")))
    }

    pub fn subject(&self) -> String {
        format_name(self.handle().subject_name())
    }

    pub fn issuer(&self) -> String {
        format_name(self.handle().issuer_name())
    }

    /// Serial number as upper-case hex.
    pub fn serial_hex(&self) -> Result<String> {
        let serial = self
            .handle()
            .serial_number()
            .to_bn()
            .and_then(|bn| bn.to_hex_str())
            .map_err(|e| Error::Certificate(format!("unreadable serial number: {e}")))?;
        Ok(serial.to_string())
    }

    pub fn not_before(&self) -> String {
        self.handle().not_before().to_string()
    }

    pub fn not_after(&self) -> String {
        self.handle().not_after().to_string()
    }

    pub fn to_der(&self) -> Result<Vec<u8>> {
        self.handle()
            .to_der()
            .map_err(|e| Error::Certificate(format!("DER encoding failed: {e}")))
    }

    pub fn to_pem(&self) -> Result<Vec<u8>> {
        self.handle()
            .to_pem()
            .map_err(|e| Error::Certificate(format!("PEM encoding failed: {e}")))
    }
}

impl CaChain<OpenSsl> {
    /// Load every certificate found in a PEM bundle, in file order.
    pub fn from_pem(pem: &[u8]) -> Result<Self> {
        let certs = X509::stack_from_pem(pem)
            .map_err(|e| Error::Certificate(format!("invalid PEM certificate bundle: {e}")))?;
        Ok(Self::from_handles(certs))
    }

    /// Concatenated PEM of every certificate in the chain.
    pub fn to_pem(&self) -> Result<Vec<u8>> {
        let mut out = Vec::new();
        for cert in self {
            out.extend_from_slice(&cert.to_pem()?);
        }
        Ok(out)
    }
}

/// Render a distinguished name as `CN=foo, O=bar`, in encoding order.
fn format_name(name: &X509NameRef) -> String {
    name.entries()
        .map(|entry| {
            let field = entry.object().nid().short_name().unwrap_or("?");
            let value = entry
                .data()
                .as_utf8()
                .map(|s| s.to_string())
                .unwrap_or_else(|_| String::from("<unprintable>"));
            format!("{field}={value}")
        })
        .collect::<Vec<_>>()
        .join(", ")
}
