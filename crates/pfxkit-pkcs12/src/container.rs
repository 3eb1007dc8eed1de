#![forbid(unsafe_code)]

//! The decoded PKCS#12 container and its extracted contents.

use std::fmt;
use std::io::Read;

use log::debug;
use pfxkit_core::{Error, Result};

use crate::backend::{Backend, Extracted};
use crate::handle::{CaChain, Certificate, PrivateKey};
use crate::ossl::{self, OpenSsl};

/// A PKCS#12 container opened with its password.
///
/// Owns the native container handle plus one reference each to the private
/// key, the end-entity certificate and the CA certificates found inside.
/// Everything is released on [`dispose`](Self::dispose) or drop, whichever
/// comes first.
pub struct Pkcs12<B: Backend = OpenSsl> {
    container: Option<B::Container>,
    private_key: Option<PrivateKey<B>>,
    certificate: Option<Certificate<B>>,
    ca_certificates: Option<CaChain<B>>,
}

impl<B: Backend> Pkcs12<B> {
    /// Decode `der` and extract its contents with `password`.
    ///
    /// Malformed input fails with [`Error::Decode`] before any extraction is
    /// attempted. A wrong password or bad MAC fails with [`Error::Extract`].
    pub fn parse(der: &[u8], password: &str) -> Result<Self> {
        let container = B::decode(der)?;
        debug!("decoded PKCS#12 container ({} bytes)", der.len());
        Self::from_container(container, password)
    }

    /// Read the whole stream and [`parse`](Self::parse) it.
    pub fn from_reader<R: Read>(mut reader: R, password: &str) -> Result<Self> {
        let mut der = Vec::new();
        reader.read_to_end(&mut der)?;
        Self::parse(&der, password)
    }

    /// Take ownership of an already decoded container and extract from it.
    /// The container is released if extraction fails.
    pub fn from_container(container: B::Container, password: &str) -> Result<Self> {
        let Extracted { key, cert, ca } = B::extract(&container, password)?;

        let private_key = key.map(PrivateKey::from_handle);
        let certificate = cert.map(|cert| {
            let cert = Certificate::from_handle(cert);
            match &private_key {
                Some(key) => cert.with_private_key(key.clone()),
                None => cert,
            }
        });
        let ca_certificates = ca.map(CaChain::from_handles);

        debug!(
            "extracted PKCS#12 contents: key={}, certificate={}, ca={}",
            private_key.is_some(),
            certificate.is_some(),
            ca_certificates.as_ref().map_or(0, CaChain::len),
        );

        Ok(Self {
            container: Some(container),
            private_key,
            certificate,
            ca_certificates,
        })
    }

    /// A new reference to the end-entity certificate.
    ///
    /// When the container holds a private key the returned certificate
    /// carries its own reference to it. Dropping the result never affects
    /// the container's copy.
    pub fn certificate(&self) -> Option<Certificate<B>> {
        self.certificate.clone()
    }

    /// A new reference to the private key.
    pub fn private_key(&self) -> Option<PrivateKey<B>> {
        self.private_key.clone()
    }

    /// The CA certificates, borrowed from the container.
    ///
    /// No reference is taken; the borrow cannot outlive the container. Clone
    /// the chain to keep it past that point.
    pub fn ca_certificates(&self) -> Option<&CaChain<B>> {
        self.ca_certificates.as_ref()
    }

    /// The raw container handle, until disposal.
    pub fn container(&self) -> Option<&B::Container> {
        self.container.as_ref()
    }

    pub fn is_disposed(&self) -> bool {
        self.container.is_none()
    }

    /// Release the certificate, private key, CA certificates and finally the
    /// container. Calling it again does nothing.
    pub fn dispose(&mut self) {
        let Some(container) = self.container.take() else {
            return;
        };
        drop(self.certificate.take());
        drop(self.private_key.take());
        drop(self.ca_certificates.take());
        drop(container);
        debug!("disposed PKCS#12 container");
    }
}

impl Pkcs12<OpenSsl> {
    /// Re-serialize the container as DER.
    pub fn to_der(&self) -> Result<Vec<u8>> {
        let container = self.container.as_ref().ok_or(Error::Disposed)?;
        container.to_der().map_err(|e| Error::Encode {
            reason: ossl::describe(&e),
            code: ossl::first_code(&e),
        })
    }
}

impl<B: Backend> Drop for Pkcs12<B> {
    fn drop(&mut self) {
        self.dispose();
    }
}

impl<B: Backend> fmt::Debug for Pkcs12<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pkcs12")
            .field("disposed", &self.is_disposed())
            .field("private_key", &self.private_key.is_some())
            .field("certificate", &self.certificate.is_some())
            .field("ca_certificates", &self.ca_certificates)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil;
    use crate::testutil::mock::{self, Kind, MockBackend};

    // ── OpenSSL ──────────────────────────────────────────────────────────

    #[test]
    fn test_parse_with_ca_chain() {
        let der = testutil::bundle("secret123", true);
        let p12 = Pkcs12::<OpenSsl>::parse(&der, "secret123").expect("parse should succeed");

        let key = p12.private_key().expect("private key");
        let cert = p12.certificate().expect("certificate");
        assert_eq!(cert.subject(), "CN=leaf.example");
        assert_eq!(cert.issuer(), "CN=Test Root CA");
        assert!(cert.key_matches(&key).unwrap());
        assert!(cert.has_matching_key().unwrap());

        let ca = p12.ca_certificates().expect("ca chain");
        assert_eq!(ca.len(), 1);
        assert_eq!(ca.get(0).unwrap().subject(), "CN=Test Root CA");
        assert!(ca.get(0).unwrap().private_key().is_none());
    }

    #[test]
    fn test_parse_without_ca_chain() {
        let der = testutil::bundle("secret123", false);
        let p12 = Pkcs12::<OpenSsl>::parse(&der, "secret123").unwrap();
        assert!(p12.private_key().is_some());
        assert!(p12.certificate().is_some());
        assert!(p12.ca_certificates().map_or(true, CaChain::is_empty));
    }

    #[test]
    fn test_parse_rsa() {
        let key = testutil::rsa_key();
        let cert = testutil::self_signed(&key, "rsa.example", false);
        let der = testutil::bundle_from(&key, &cert, &[], "pw");

        let p12 = Pkcs12::<OpenSsl>::parse(&der, "pw").unwrap();
        let extracted = p12.private_key().unwrap();
        assert_eq!(extracted.algorithm(), "RSA");
        assert!(p12.certificate().unwrap().key_matches(&extracted).unwrap());
    }

    #[test]
    fn test_wrong_password() {
        let der = testutil::bundle("secret123", true);
        let err = Pkcs12::<OpenSsl>::parse(&der, "wrong_password").unwrap_err();
        assert!(err.is_extract(), "expected extract error, got: {err}");
    }

    #[test]
    fn test_nul_in_password_is_an_extract_error() {
        let der = testutil::bundle("pw", true);
        let err = Pkcs12::<OpenSsl>::parse(&der, "p\0w").unwrap_err();
        assert!(err.is_extract(), "expected extract error, got: {err}");
        assert_eq!(err.library_code(), None);
    }

    #[test]
    fn test_malformed_input() {
        let err = Pkcs12::<OpenSsl>::parse(b"\x30\x03\x02\x01", "secret123").unwrap_err();
        assert!(err.is_decode(), "expected decode error, got: {err}");

        let der = testutil::bundle("secret123", false);
        let err = Pkcs12::<OpenSsl>::parse(&der[..der.len() / 2], "secret123").unwrap_err();
        assert!(err.is_decode(), "truncated input: {err}");
    }

    #[test]
    fn test_from_reader() {
        let der = testutil::bundle("pw", true);
        let p12 = Pkcs12::<OpenSsl>::from_reader(std::io::Cursor::new(der), "pw").unwrap();
        assert!(p12.certificate().is_some());
    }

    #[test]
    fn test_from_decoded_container() {
        let der = testutil::bundle("pw", false);
        let native = OpenSsl::decode(&der).unwrap();
        let p12 = Pkcs12::<OpenSsl>::from_container(native, "pw").unwrap();
        assert!(p12.private_key().is_some());
    }

    #[test]
    fn test_dropping_accessor_result_keeps_internal_copy() {
        let der = testutil::bundle("pw", true);
        let p12 = Pkcs12::<OpenSsl>::parse(&der, "pw").unwrap();

        let first = p12.certificate().unwrap();
        let subject = first.subject();
        drop(first);
        drop(p12.private_key().unwrap());

        let second = p12.certificate().unwrap();
        assert_eq!(second.subject(), subject);
        assert!(second.has_matching_key().unwrap());
    }

    #[test]
    fn test_accessor_results_outlive_container() {
        let der = testutil::bundle("pw", true);
        let mut p12 = Pkcs12::<OpenSsl>::parse(&der, "pw").unwrap();
        let cert = p12.certificate().unwrap();
        let key = p12.private_key().unwrap();
        let chain = p12.ca_certificates().cloned().unwrap();

        p12.dispose();
        drop(p12);

        assert_eq!(cert.subject(), "CN=leaf.example");
        assert!(cert.key_matches(&key).unwrap());
        assert_eq!(chain.get(0).unwrap().subject(), "CN=Test Root CA");
    }

    #[test]
    fn test_to_der_reparses() {
        let der = testutil::bundle("pw", true);
        let p12 = Pkcs12::<OpenSsl>::parse(&der, "pw").unwrap();
        let again = Pkcs12::<OpenSsl>::parse(&p12.to_der().unwrap(), "pw").unwrap();
        assert_eq!(again.ca_certificates().unwrap().len(), 1);
    }

    #[test]
    fn test_dispose_twice() {
        let der = testutil::bundle("pw", true);
        let mut p12 = Pkcs12::<OpenSsl>::parse(&der, "pw").unwrap();
        p12.dispose();
        assert!(p12.is_disposed());
        p12.dispose();
        assert!(p12.is_disposed());

        assert!(p12.certificate().is_none());
        assert!(p12.private_key().is_none());
        assert!(p12.ca_certificates().is_none());
        assert!(p12.container().is_none());
        assert!(matches!(p12.to_der(), Err(Error::Disposed)));
    }

    // ── reference counting, via the counting backend ─────────────────────

    #[test]
    fn test_mock_parse_takes_one_extra_key_reference_for_certificate() {
        mock::reset();
        let der = mock::container_bytes(Some(5), Some(5), 2);
        let p12 = Pkcs12::<MockBackend>::parse(&der, mock::PASSWORD).unwrap();

        assert_eq!(mock::live(Kind::Container), 1);
        // The container's own key plus the certificate's back-reference.
        assert_eq!(mock::live(Kind::Key), 2);
        assert_eq!(mock::live(Kind::Cert), 3);
        assert!(p12.certificate().unwrap().has_matching_key().unwrap());

        drop(p12);
        assert_eq!(mock::live(Kind::Container), 0);
        assert_eq!(mock::live(Kind::Key), 0);
        assert_eq!(mock::live(Kind::Cert), 0);
    }

    #[test]
    fn test_mock_accessors_return_independent_references() {
        mock::reset();
        let der = mock::container_bytes(Some(1), Some(1), 0);
        let p12 = Pkcs12::<MockBackend>::parse(&der, mock::PASSWORD).unwrap();
        let keys_before = mock::live(Kind::Key);
        let certs_before = mock::live(Kind::Cert);

        let key = p12.private_key().unwrap();
        assert_eq!(mock::live(Kind::Key), keys_before + 1);

        let cert = p12.certificate().unwrap();
        assert_eq!(mock::live(Kind::Cert), certs_before + 1);
        assert_eq!(mock::live(Kind::Key), keys_before + 2);

        drop(key);
        drop(cert);
        assert_eq!(mock::live(Kind::Key), keys_before);
        assert_eq!(mock::live(Kind::Cert), certs_before);
        assert!(p12.private_key().is_some());
        assert!(p12.certificate().is_some());
    }

    #[test]
    fn test_mock_borrowed_ca_chain_takes_no_reference() {
        mock::reset();
        let der = mock::container_bytes(None, Some(1), 3);
        let p12 = Pkcs12::<MockBackend>::parse(&der, mock::PASSWORD).unwrap();
        let before = mock::live(Kind::Cert);

        let chain = p12.ca_certificates().unwrap();
        assert_eq!(chain.len(), 3);
        assert_eq!(mock::live(Kind::Cert), before);

        let owned = chain.clone();
        assert_eq!(mock::live(Kind::Cert), before + 3);
        drop(owned);
        assert_eq!(mock::live(Kind::Cert), before);
    }

    #[test]
    fn test_mock_wrong_password_leaks_nothing() {
        mock::reset();
        let der = mock::container_bytes(Some(1), Some(1), 2);
        let err = Pkcs12::<MockBackend>::parse(&der, "not it").unwrap_err();
        assert!(err.is_extract());
        assert_eq!(mock::extract_calls(), 1);
        assert_eq!(mock::live(Kind::Container), 0);
        assert_eq!(mock::live(Kind::Key), 0);
        assert_eq!(mock::live(Kind::Cert), 0);
    }

    #[test]
    fn test_mock_decode_failure_skips_extraction() {
        mock::reset();
        let err = Pkcs12::<MockBackend>::parse(b"garbage", mock::PASSWORD).unwrap_err();
        assert!(err.is_decode());
        assert_eq!(mock::extract_calls(), 0);
        assert_eq!(mock::live(Kind::Container), 0);
    }

    #[test]
    fn test_mock_dispose_releases_everything_once() {
        mock::reset();
        let der = mock::container_bytes(Some(2), Some(2), 1);
        let mut p12 = Pkcs12::<MockBackend>::parse(&der, mock::PASSWORD).unwrap();
        let outside = p12.certificate().unwrap();

        p12.dispose();
        assert_eq!(mock::live(Kind::Container), 0);
        // Only the caller's certificate and its key reference survive.
        assert_eq!(mock::live(Kind::Cert), 1);
        assert_eq!(mock::live(Kind::Key), 1);

        p12.dispose();
        drop(p12);
        assert_eq!(mock::live(Kind::Cert), 1);
        assert_eq!(mock::live(Kind::Key), 1);
        assert!(outside.has_matching_key().unwrap());

        drop(outside);
        assert_eq!(mock::live(Kind::Cert), 0);
        assert_eq!(mock::live(Kind::Key), 0);
    }

    #[test]
    fn test_mock_certificate_without_key() {
        mock::reset();
        let der = mock::container_bytes(None, Some(4), 0);
        let p12 = Pkcs12::<MockBackend>::parse(&der, mock::PASSWORD).unwrap();
        assert!(p12.private_key().is_none());
        let cert = p12.certificate().unwrap();
        assert!(cert.private_key().is_none());
        assert!(p12.ca_certificates().is_none());
    }

    #[test]
    fn test_mock_empty_container() {
        mock::reset();
        let der = mock::container_bytes(None, None, 0);
        let p12 = Pkcs12::<MockBackend>::parse(&der, mock::PASSWORD).unwrap();
        assert!(p12.private_key().is_none());
        assert!(p12.certificate().is_none());
        assert!(!p12.is_disposed());
        assert_eq!(
            format!("{p12:?}"),
            "Pkcs12 { disposed: false, private_key: false, certificate: false, ca_certificates: None }"
        );
    }
}
