#![forbid(unsafe_code)]

//! Assembling new PKCS#12 containers with OpenSSL's `PKCS12_create`.

use openssl::hash::MessageDigest;
use openssl::pkcs12::Pkcs12 as NativePkcs12;
use openssl::stack::Stack;
use openssl::x509::X509;
use pfxkit_core::{Error, Result};

use crate::handle::{Certificate, PrivateKey};
use crate::ossl::{self, OpenSsl};

/// Digest used for the container MAC.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MacDigest {
    Sha1,
    Sha256,
    Sha384,
    Sha512,
}

impl MacDigest {
    fn message_digest(self) -> MessageDigest {
        match self {
            Self::Sha1 => MessageDigest::sha1(),
            Self::Sha256 => MessageDigest::sha256(),
            Self::Sha384 => MessageDigest::sha384(),
            Self::Sha512 => MessageDigest::sha512(),
        }
    }
}

/// Builder for a DER-encoded PKCS#12 container.
///
/// Holds its own references to the key and certificates handed to it.
/// Algorithms not set explicitly follow the OpenSSL defaults of the linked
/// library version.
#[derive(Debug, Default)]
pub struct Pkcs12Builder {
    name: Option<String>,
    private_key: Option<PrivateKey<OpenSsl>>,
    certificate: Option<Certificate<OpenSsl>>,
    ca: Vec<Certificate<OpenSsl>>,
    key_iterations: Option<u32>,
    mac_iterations: Option<u32>,
    mac_digest: Option<MacDigest>,
}

impl Pkcs12Builder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Friendly name attached to the key and certificate bags.
    pub fn name(&mut self, name: &str) -> &mut Self {
        self.name = Some(name.to_owned());
        self
    }

    pub fn private_key(&mut self, key: &PrivateKey<OpenSsl>) -> &mut Self {
        self.private_key = Some(key.clone());
        self
    }

    /// End-entity certificate. If it carries a private key and none was set
    /// with [`private_key`](Self::private_key), that key is used.
    pub fn certificate(&mut self, cert: &Certificate<OpenSsl>) -> &mut Self {
        if self.private_key.is_none() {
            self.private_key = cert.private_key().cloned();
        }
        self.certificate = Some(cert.clone());
        self
    }

    /// Append CA certificates, in order.
    pub fn ca_certificates<I>(&mut self, certs: I) -> &mut Self
    where
        I: IntoIterator<Item = Certificate<OpenSsl>>,
    {
        self.ca.extend(certs);
        self
    }

    /// Iteration count for key and certificate encryption.
    pub fn key_iterations(&mut self, iterations: u32) -> &mut Self {
        self.key_iterations = Some(iterations);
        self
    }

    pub fn mac_iterations(&mut self, iterations: u32) -> &mut Self {
        self.mac_iterations = Some(iterations);
        self
    }

    pub fn mac_digest(&mut self, digest: MacDigest) -> &mut Self {
        self.mac_digest = Some(digest);
        self
    }

    /// Encrypt and MAC everything with `password`, returning DER.
    pub fn build(&self, password: &str) -> Result<Vec<u8>> {
        if self.private_key.is_none() && self.certificate.is_none() && self.ca.is_empty() {
            return Err(Error::Encode {
                reason: "nothing to put in the container".into(),
                code: None,
            });
        }

        if self.name.as_deref().is_some_and(|name| name.contains('\0')) {
            return Err(Error::Encode {
                reason: "friendly name contains a NUL byte".into(),
                code: None,
            });
        }
        if password.contains('\0') {
            return Err(Error::Encode {
                reason: "password contains a NUL byte".into(),
                code: None,
            });
        }

        openssl::init();
        let mut builder = NativePkcs12::builder();
        if let Some(name) = &self.name {
            builder.name(name);
        }
        if let Some(key) = &self.private_key {
            builder.pkey(key.handle());
        }
        if let Some(cert) = &self.certificate {
            builder.cert(cert.handle());
        }
        if !self.ca.is_empty() {
            let mut stack = Stack::<X509>::new().map_err(encode_error)?;
            for cert in &self.ca {
                stack.push(cert.handle().clone()).map_err(encode_error)?;
            }
            builder.ca(stack);
        }
        if let Some(iterations) = self.key_iterations {
            builder.key_iter(iterations);
        }
        if let Some(iterations) = self.mac_iterations {
            builder.mac_iter(iterations);
        }
        if let Some(digest) = self.mac_digest {
            builder.mac_md(digest.message_digest());
        }

        let container = builder.build2(password).map_err(encode_error)?;
        container.to_der().map_err(encode_error)
    }
}

fn encode_error(e: openssl::error::ErrorStack) -> Error {
    Error::Encode {
        reason: ossl::describe(&e),
        code: ossl::first_code(&e),
    }
}
