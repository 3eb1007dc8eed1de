//! Test fixtures: keys, certificates and containers generated with OpenSSL.

pub mod mock;

use openssl::asn1::Asn1Time;
use openssl::bn::BigNum;
use openssl::ec::{EcGroup, EcKey};
use openssl::hash::MessageDigest;
use openssl::nid::Nid;
use openssl::pkey::{PKey, Private};
use openssl::rsa::Rsa;
use openssl::x509::extension::BasicConstraints;
use openssl::x509::{X509NameBuilder, X509};

use crate::builder::Pkcs12Builder;
use crate::handle::{Certificate, PrivateKey};

pub fn ec_key() -> PKey<Private> {
    let group = EcGroup::from_curve_name(Nid::X9_62_PRIME256V1).unwrap();
    PKey::from_ec_key(EcKey::generate(&group).unwrap()).unwrap()
}

pub fn rsa_key() -> PKey<Private> {
    PKey::from_rsa(Rsa::generate(2048).unwrap()).unwrap()
}

/// Self-signed certificate with serial number 1.
pub fn self_signed(key: &PKey<Private>, cn: &str, is_ca: bool) -> X509 {
    build_cert(key, cn, None, is_ca, 1)
}

/// End-entity certificate issued by `ca_cert`, serial number 2.
pub fn issued_by(key: &PKey<Private>, cn: &str, ca_cert: &X509, ca_key: &PKey<Private>) -> X509 {
    build_cert(key, cn, Some((ca_cert, ca_key)), false, 2)
}

fn build_cert(
    key: &PKey<Private>,
    cn: &str,
    issuer: Option<(&X509, &PKey<Private>)>,
    is_ca: bool,
    serial: u32,
) -> X509 {
    let mut name = X509NameBuilder::new().unwrap();
    name.append_entry_by_text("CN", cn).unwrap();
    let name = name.build();

    let mut builder = X509::builder().unwrap();
    builder.set_version(2).unwrap();
    let serial = BigNum::from_u32(serial).unwrap();
    builder
        .set_serial_number(&serial.to_asn1_integer().unwrap())
        .unwrap();
    builder.set_subject_name(&name).unwrap();
    match issuer {
        Some((ca_cert, _)) => builder.set_issuer_name(ca_cert.subject_name()).unwrap(),
        None => builder.set_issuer_name(&name).unwrap(),
    }
    builder.set_pubkey(key).unwrap();
    builder
        .set_not_before(&Asn1Time::days_from_now(0).unwrap())
        .unwrap();
    builder
        .set_not_after(&Asn1Time::days_from_now(365).unwrap())
        .unwrap();
    if is_ca {
        let constraints = BasicConstraints::new().critical().ca().build().unwrap();
        builder.append_extension(constraints).unwrap();
    }

    let signing_key = issuer.map_or(key, |(_, ca_key)| ca_key);
    builder.sign(signing_key, MessageDigest::sha256()).unwrap();
    builder.build()
}

/// A leaf certificate for `leaf.example` issued by `Test Root CA`, with or
/// without the CA certificate included.
pub fn bundle(password: &str, with_ca: bool) -> Vec<u8> {
    let ca_key = ec_key();
    let ca = self_signed(&ca_key, "Test Root CA", true);
    let key = ec_key();
    let leaf = issued_by(&key, "leaf.example", &ca, &ca_key);

    let chain: &[X509] = if with_ca { std::slice::from_ref(&ca) } else { &[] };
    bundle_from(&key, &leaf, chain, password)
}

pub fn bundle_with_two_cas(password: &str) -> Vec<u8> {
    let ca_key = ec_key();
    let ca = self_signed(&ca_key, "Test Root CA", true);
    let other_key = ec_key();
    let other = self_signed(&other_key, "Test Other CA", true);
    let key = ec_key();
    let leaf = issued_by(&key, "leaf.example", &ca, &ca_key);

    bundle_from(&key, &leaf, &[ca, other], password)
}

pub fn bundle_from(key: &PKey<Private>, cert: &X509, ca: &[X509], password: &str) -> Vec<u8> {
    let key: PrivateKey = PrivateKey::from_handle(key.clone());
    let cert: Certificate = Certificate::from_handle(cert.clone());
    let mut builder = Pkcs12Builder::new();
    builder
        .name("test")
        .private_key(&key)
        .certificate(&cert)
        .ca_certificates(ca.iter().cloned().map(Certificate::from_handle));
    builder.build(password).unwrap()
}
