#![forbid(unsafe_code)]

//! Core types shared by the pfxkit crates.

pub mod error;

pub use error::{Error, Result};
