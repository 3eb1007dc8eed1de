#![forbid(unsafe_code)]

pub use pfxkit_core as core;
pub use pfxkit_pkcs12 as pkcs12;
