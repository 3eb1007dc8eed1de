#![forbid(unsafe_code)]

//! Owning wrappers around backend key and certificate handles.
//!
//! Every wrapper owns exactly one reference to its native object. Cloning a
//! wrapper takes another reference; dropping it gives one back.

use std::fmt;

use pfxkit_core::Result;

use crate::backend::Backend;
use crate::ossl::OpenSsl;

/// A private key held by one reference.
pub struct PrivateKey<B: Backend = OpenSsl> {
    handle: B::Key,
}

impl<B: Backend> PrivateKey<B> {
    /// Wrap a handle, taking over the reference it represents.
    pub fn from_handle(handle: B::Key) -> Self {
        Self { handle }
    }

    pub fn handle(&self) -> &B::Key {
        &self.handle
    }

    pub fn into_handle(self) -> B::Key {
        self.handle
    }
}

impl<B: Backend> Clone for PrivateKey<B> {
    fn clone(&self) -> Self {
        Self {
            handle: self.handle.clone(),
        }
    }
}

impl<B: Backend> fmt::Debug for PrivateKey<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PrivateKey").finish_non_exhaustive()
    }
}

/// An X.509 certificate, optionally paired with its private key.
pub struct Certificate<B: Backend = OpenSsl> {
    handle: B::Cert,
    private_key: Option<PrivateKey<B>>,
}

impl<B: Backend> Certificate<B> {
    /// Wrap a handle, taking over the reference it represents.
    pub fn from_handle(handle: B::Cert) -> Self {
        Self {
            handle,
            private_key: None,
        }
    }

    /// Attach the private key belonging to this certificate.
    pub fn with_private_key(mut self, key: PrivateKey<B>) -> Self {
        self.private_key = Some(key);
        self
    }

    pub fn set_private_key(&mut self, key: Option<PrivateKey<B>>) {
        self.private_key = key;
    }

    pub fn private_key(&self) -> Option<&PrivateKey<B>> {
        self.private_key.as_ref()
    }

    pub fn handle(&self) -> &B::Cert {
        &self.handle
    }

    /// Give up the wrapper, keeping the certificate reference. The attached
    /// key reference, if any, is released.
    pub fn into_handle(self) -> B::Cert {
        self.handle
    }

    /// Whether `key` is the private half of this certificate's public key.
    pub fn key_matches(&self, key: &PrivateKey<B>) -> Result<bool> {
        B::key_matches(&self.handle, &key.handle)
    }

    /// Whether an attached private key exists and matches. `false` when no
    /// key is attached.
    pub fn has_matching_key(&self) -> Result<bool> {
        match &self.private_key {
            Some(key) => self.key_matches(key),
            None => Ok(false),
        }
    }
}

impl<B: Backend> Clone for Certificate<B> {
    fn clone(&self) -> Self {
        Self {
            handle: self.handle.clone(),
            private_key: self.private_key.clone(),
        }
    }
}

impl<B: Backend> fmt::Debug for Certificate<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Certificate")
            .field("has_private_key", &self.private_key.is_some())
            .finish_non_exhaustive()
    }
}

/// Ordered CA certificates shipped alongside the end-entity certificate.
pub struct CaChain<B: Backend = OpenSsl> {
    certs: Vec<Certificate<B>>,
}

impl<B: Backend> CaChain<B> {
    pub fn new() -> Self {
        Self { certs: Vec::new() }
    }

    pub fn from_handles(handles: Vec<B::Cert>) -> Self {
        handles.into_iter().map(Certificate::from_handle).collect()
    }

    pub fn push(&mut self, cert: Certificate<B>) {
        self.certs.push(cert);
    }

    pub fn len(&self) -> usize {
        self.certs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.certs.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Certificate<B>> {
        self.certs.get(index)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Certificate<B>> {
        self.certs.iter()
    }
}

impl<B: Backend> Default for CaChain<B> {
    fn default() -> Self {
        Self::new()
    }
}

impl<B: Backend> Clone for CaChain<B> {
    fn clone(&self) -> Self {
        Self {
            certs: self.certs.clone(),
        }
    }
}

impl<B: Backend> fmt::Debug for CaChain<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CaChain")
            .field("len", &self.certs.len())
            .finish()
    }
}

impl<B: Backend> FromIterator<Certificate<B>> for CaChain<B> {
    fn from_iter<I: IntoIterator<Item = Certificate<B>>>(iter: I) -> Self {
        Self {
            certs: iter.into_iter().collect(),
        }
    }
}

impl<B: Backend> IntoIterator for CaChain<B> {
    type Item = Certificate<B>;
    type IntoIter = std::vec::IntoIter<Certificate<B>>;

    fn into_iter(self) -> Self::IntoIter {
        self.certs.into_iter()
    }
}

impl<'a, B: Backend> IntoIterator for &'a CaChain<B> {
    type Item = &'a Certificate<B>;
    type IntoIter = std::slice::Iter<'a, Certificate<B>>;

    fn into_iter(self) -> Self::IntoIter {
        self.certs.iter()
    }
}
