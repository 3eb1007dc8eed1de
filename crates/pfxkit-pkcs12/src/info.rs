#![forbid(unsafe_code)]

//! Password-free view of a PFX envelope (RFC 7292).
//!
//! Reads the outer structure only: version, MAC parameters, and which
//! authenticated safes are encrypted with what. Nothing is decrypted and the
//! MAC is not checked.
//!
//! Uses `yasna::parse_ber` since PKCS#12 files may use BER, not strict DER.

use std::fmt;

use pfxkit_core::{Error, Result};
use yasna::models::ObjectIdentifier;
use yasna::{ASN1Error, ASN1ErrorKind, BERReader, Tag};

// Content types (PKCS#7)
const OID_DATA: &[u64] = &[1, 2, 840, 113549, 1, 7, 1];
const OID_SIGNED_DATA: &[u64] = &[1, 2, 840, 113549, 1, 7, 2];
const OID_ENVELOPED_DATA: &[u64] = &[1, 2, 840, 113549, 1, 7, 3];
const OID_ENCRYPTED_DATA: &[u64] = &[1, 2, 840, 113549, 1, 7, 6];

const OID_PBES2: &[u64] = &[1, 2, 840, 113549, 1, 5, 13];
const OID_PBKDF2: &[u64] = &[1, 2, 840, 113549, 1, 5, 12];

fn oid(components: &[u64]) -> ObjectIdentifier {
    ObjectIdentifier::from_slice(components)
}

fn dotted(oid: &ObjectIdentifier) -> String {
    oid.components()
        .iter()
        .map(u64::to_string)
        .collect::<Vec<_>>()
        .join(".")
}

// ── Algorithms ───────────────────────────────────────────────────────────

/// Digest, PRF or encryption algorithm named in the envelope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Algorithm {
    Sha1,
    Sha224,
    Sha256,
    Sha384,
    Sha512,
    HmacSha1,
    HmacSha224,
    HmacSha256,
    HmacSha384,
    HmacSha512,
    PbeSha1And128BitRc4,
    PbeSha1And40BitRc4,
    PbeSha1And3KeyTripleDes,
    PbeSha1And2KeyTripleDes,
    PbeSha1And128BitRc2,
    PbeSha1And40BitRc2,
    /// PBES2 with PBKDF2 using `prf`, encrypting with `cipher`.
    Pbes2 {
        prf: Box<Algorithm>,
        cipher: Box<Algorithm>,
    },
    Aes128Cbc,
    Aes192Cbc,
    Aes256Cbc,
    DesEde3Cbc,
    /// Anything else, as a dotted OID.
    Other(String),
}

impl Algorithm {
    fn from_oid(oid: &ObjectIdentifier) -> Self {
        match &oid.components()[..] {
            [1, 3, 14, 3, 2, 26] => Self::Sha1,
            [2, 16, 840, 1, 101, 3, 4, 2, 4] => Self::Sha224,
            [2, 16, 840, 1, 101, 3, 4, 2, 1] => Self::Sha256,
            [2, 16, 840, 1, 101, 3, 4, 2, 2] => Self::Sha384,
            [2, 16, 840, 1, 101, 3, 4, 2, 3] => Self::Sha512,
            [1, 2, 840, 113549, 2, 7] => Self::HmacSha1,
            [1, 2, 840, 113549, 2, 8] => Self::HmacSha224,
            [1, 2, 840, 113549, 2, 9] => Self::HmacSha256,
            [1, 2, 840, 113549, 2, 10] => Self::HmacSha384,
            [1, 2, 840, 113549, 2, 11] => Self::HmacSha512,
            [1, 2, 840, 113549, 1, 12, 1, 1] => Self::PbeSha1And128BitRc4,
            [1, 2, 840, 113549, 1, 12, 1, 2] => Self::PbeSha1And40BitRc4,
            [1, 2, 840, 113549, 1, 12, 1, 3] => Self::PbeSha1And3KeyTripleDes,
            [1, 2, 840, 113549, 1, 12, 1, 4] => Self::PbeSha1And2KeyTripleDes,
            [1, 2, 840, 113549, 1, 12, 1, 5] => Self::PbeSha1And128BitRc2,
            [1, 2, 840, 113549, 1, 12, 1, 6] => Self::PbeSha1And40BitRc2,
            [2, 16, 840, 1, 101, 3, 4, 1, 2] => Self::Aes128Cbc,
            [2, 16, 840, 1, 101, 3, 4, 1, 22] => Self::Aes192Cbc,
            [2, 16, 840, 1, 101, 3, 4, 1, 42] => Self::Aes256Cbc,
            [1, 2, 840, 113549, 3, 7] => Self::DesEde3Cbc,
            _ => Self::Other(dotted(oid)),
        }
    }
}

impl fmt::Display for Algorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Sha1 => f.write_str("SHA-1"),
            Self::Sha224 => f.write_str("SHA-224"),
            Self::Sha256 => f.write_str("SHA-256"),
            Self::Sha384 => f.write_str("SHA-384"),
            Self::Sha512 => f.write_str("SHA-512"),
            Self::HmacSha1 => f.write_str("HMAC-SHA1"),
            Self::HmacSha224 => f.write_str("HMAC-SHA224"),
            Self::HmacSha256 => f.write_str("HMAC-SHA256"),
            Self::HmacSha384 => f.write_str("HMAC-SHA384"),
            Self::HmacSha512 => f.write_str("HMAC-SHA512"),
            Self::PbeSha1And128BitRc4 => f.write_str("pbeWithSHAAnd128BitRC4"),
            Self::PbeSha1And40BitRc4 => f.write_str("pbeWithSHAAnd40BitRC4"),
            Self::PbeSha1And3KeyTripleDes => f.write_str("pbeWithSHAAnd3-KeyTripleDES-CBC"),
            Self::PbeSha1And2KeyTripleDes => f.write_str("pbeWithSHAAnd2-KeyTripleDES-CBC"),
            Self::PbeSha1And128BitRc2 => f.write_str("pbeWithSHAAnd128BitRC2-CBC"),
            Self::PbeSha1And40BitRc2 => f.write_str("pbeWithSHAAnd40BitRC2-CBC"),
            Self::Pbes2 { prf, cipher } => write!(f, "PBES2 (PBKDF2/{prf}, {cipher})"),
            Self::Aes128Cbc => f.write_str("AES-128-CBC"),
            Self::Aes192Cbc => f.write_str("AES-192-CBC"),
            Self::Aes256Cbc => f.write_str("AES-256-CBC"),
            Self::DesEde3Cbc => f.write_str("DES-EDE3-CBC"),
            Self::Other(oid) => write!(f, "OID {oid}"),
        }
    }
}

// ── Envelope ─────────────────────────────────────────────────────────────

/// Password-integrity MAC parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MacInfo {
    pub digest: Algorithm,
    pub salt_len: usize,
    pub iterations: u64,
}

/// One entry of the authenticated safe.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SafeContents {
    /// Plain `data`; bags inside may still be individually shrouded.
    Data { len: usize },
    /// `encryptedData` under a password-based scheme.
    Encrypted { algorithm: Algorithm },
    /// `envelopedData`, encrypted to a recipient's public key.
    Enveloped,
    Other(String),
}

/// Structure of a PFX envelope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pkcs12Info {
    pub version: u64,
    /// `true` if the authenticated safe is a `signedData` (public-key
    /// integrity mode). Its entries are then not listed.
    pub signed: bool,
    pub mac: Option<MacInfo>,
    pub safes: Vec<SafeContents>,
}

impl Pkcs12Info {
    /// Read the envelope of a serialized container.
    pub fn inspect(data: &[u8]) -> Result<Self> {
        let (version, auth_safe, mac) = yasna::parse_ber(data, |r| {
            r.read_sequence(|r| {
                let version = r.next().read_u64()?;
                let auth_safe = parse_auth_safe(r.next())?;
                let mac = r.read_optional(parse_mac_data)?;
                Ok((version, auth_safe, mac))
            })
        })
        .map_err(|e| Error::Inspect(format!("invalid PFX envelope: {e}")))?;

        let (signed, safes) = match auth_safe {
            AuthSafe::Data(content) => {
                let safes = yasna::parse_ber(&content, |r| {
                    r.collect_sequence_of(parse_safe_contents)
                })
                .map_err(|e| Error::Inspect(format!("invalid authenticated safe: {e}")))?;
                (false, safes)
            }
            AuthSafe::Signed => (true, Vec::new()),
        };

        Ok(Self {
            version,
            signed,
            mac,
            safes,
        })
    }

    pub fn encrypted_safes(&self) -> usize {
        self.safes
            .iter()
            .filter(|s| matches!(s, SafeContents::Encrypted { .. } | SafeContents::Enveloped))
            .count()
    }
}

enum AuthSafe {
    Data(Vec<u8>),
    Signed,
}

/// Top-level ContentInfo that wraps the authenticated safe.
fn parse_auth_safe(r: BERReader) -> std::result::Result<AuthSafe, ASN1Error> {
    r.read_sequence(|r| {
        let content_type = r.next().read_oid()?;
        if content_type == oid(OID_DATA) {
            // [0] EXPLICIT OCTET STRING
            let data = r
                .next()
                .read_tagged(Tag::context(0), |r| r.read_bytes())?;
            Ok(AuthSafe::Data(data))
        } else if content_type == oid(OID_SIGNED_DATA) {
            let _content = r.next().read_der()?;
            Ok(AuthSafe::Signed)
        } else {
            Err(ASN1Error::new(ASN1ErrorKind::Invalid))
        }
    })
}

/// A ContentInfo inside the authenticated safe.
fn parse_safe_contents(r: BERReader) -> std::result::Result<SafeContents, ASN1Error> {
    r.read_sequence(|r| {
        let content_type = r.next().read_oid()?;

        if content_type == oid(OID_DATA) {
            let data = r
                .next()
                .read_tagged(Tag::context(0), |r| r.read_bytes())?;
            Ok(SafeContents::Data { len: data.len() })
        } else if content_type == oid(OID_ENCRYPTED_DATA) {
            // [0] EXPLICIT EncryptedData
            r.next().read_tagged(Tag::context(0), |r| {
                r.read_sequence(|r| {
                    let _version = r.next().read_u64()?;
                    // EncryptedContentInfo
                    r.next().read_sequence(|r| {
                        let _content_type = r.next().read_oid()?;
                        let algorithm = parse_algorithm_identifier(r.next())?;
                        // [0] IMPLICIT encrypted content, optional
                        let _ciphertext = r.read_optional(|r| r.read_der())?;
                        Ok(SafeContents::Encrypted { algorithm })
                    })
                })
            })
        } else {
            let _content = r.read_optional(|r| r.read_der())?;
            if content_type == oid(OID_ENVELOPED_DATA) {
                Ok(SafeContents::Enveloped)
            } else {
                Ok(SafeContents::Other(dotted(&content_type)))
            }
        }
    })
}

fn parse_algorithm_identifier(r: BERReader) -> std::result::Result<Algorithm, ASN1Error> {
    r.read_sequence(|r| {
        let alg_oid = r.next().read_oid()?;

        if alg_oid != oid(OID_PBES2) {
            let _params = r.read_optional(|r| r.read_der())?;
            return Ok(Algorithm::from_oid(&alg_oid));
        }

        // PBES2-params: SEQUENCE { keyDerivationFunc AlgId, encryptionScheme AlgId }
        r.next().read_sequence(|r| {
            let prf = r.next().read_sequence(|r| {
                let kdf_oid = r.next().read_oid()?;
                if kdf_oid != oid(OID_PBKDF2) {
                    let _params = r.read_optional(|r| r.read_der())?;
                    return Ok(Algorithm::from_oid(&kdf_oid));
                }
                // PBKDF2-params: SEQUENCE { salt, iterationCount, keyLength?, prf? }
                r.next().read_sequence(|r| {
                    let _salt = r.next().read_der()?;
                    let _iterations = r.next().read_u64()?;

                    // keyLength is an INTEGER, prf a SEQUENCE; both optional.
                    let mut prf = Algorithm::HmacSha1;
                    if let Some(der) = r.read_optional(|r| r.read_der())? {
                        if der.first() == Some(&0x30) {
                            prf = parse_digest_from_der(&der)?;
                        } else if let Some(prf_der) = r.read_optional(|r| r.read_der())? {
                            prf = parse_digest_from_der(&prf_der)?;
                        }
                    }
                    Ok(prf)
                })
            })?;

            let cipher = r.next().read_sequence(|r| {
                let enc_oid = r.next().read_oid()?;
                let _iv = r.read_optional(|r| r.read_der())?;
                Ok(Algorithm::from_oid(&enc_oid))
            })?;

            Ok(Algorithm::Pbes2 {
                prf: Box::new(prf),
                cipher: Box::new(cipher),
            })
        })
    })
}

/// `SEQUENCE { algorithm OID, parameters NULL OPTIONAL }`
fn parse_digest_algorithm(r: BERReader) -> std::result::Result<Algorithm, ASN1Error> {
    r.read_sequence(|r| {
        let alg_oid = r.next().read_oid()?;
        let _null = r.read_optional(|r| r.read_null())?;
        Ok(Algorithm::from_oid(&alg_oid))
    })
}

fn parse_digest_from_der(der: &[u8]) -> std::result::Result<Algorithm, ASN1Error> {
    yasna::parse_der(der, parse_digest_algorithm)
}

fn parse_mac_data(r: BERReader) -> std::result::Result<MacInfo, ASN1Error> {
    r.read_sequence(|r| {
        // DigestInfo: SEQUENCE { digestAlgorithm, digest }
        let digest = r.next().read_sequence(|r| {
            let algorithm = parse_digest_algorithm(r.next())?;
            let _digest = r.next().read_bytes()?;
            Ok(algorithm)
        })?;
        let salt = r.next().read_bytes()?;
        let iterations = r.read_optional(|r| r.read_u64())?.unwrap_or(1);

        Ok(MacInfo {
            digest,
            salt_len: salt.len(),
            iterations,
        })
    })
}
