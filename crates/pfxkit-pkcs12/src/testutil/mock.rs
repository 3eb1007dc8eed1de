//! A backend whose handles count themselves.
//!
//! Counters are thread-local, and every test runs on its own thread.

use std::cell::Cell;

use pfxkit_core::{Error, Result};

use crate::backend::{Backend, Extracted};

pub const PASSWORD: &str = "secret";

const MAGIC: &[u8] = b"MOCK";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Kind {
    Container,
    Key,
    Cert,
}

thread_local! {
    static LIVE: [Cell<isize>; 3] = const { [Cell::new(0), Cell::new(0), Cell::new(0)] };
    static EXTRACT_CALLS: Cell<usize> = const { Cell::new(0) };
}

fn slot(kind: Kind) -> usize {
    match kind {
        Kind::Container => 0,
        Kind::Key => 1,
        Kind::Cert => 2,
    }
}

fn adjust(kind: Kind, delta: isize) {
    LIVE.with(|live| {
        let cell = &live[slot(kind)];
        cell.set(cell.get() + delta);
    });
}

/// Outstanding references of `kind`.
pub fn live(kind: Kind) -> isize {
    LIVE.with(|live| live[slot(kind)].get())
}

pub fn extract_calls() -> usize {
    EXTRACT_CALLS.with(Cell::get)
}

pub fn reset() {
    LIVE.with(|live| live.iter().for_each(|cell| cell.set(0)));
    EXTRACT_CALLS.with(|calls| calls.set(0));
}

/// One reference to a mock native object.
#[derive(Debug)]
pub struct MockHandle {
    pub kind: Kind,
    pub id: u32,
}

pub fn handle(kind: Kind, id: u32) -> MockHandle {
    adjust(kind, 1);
    MockHandle { kind, id }
}

impl Clone for MockHandle {
    fn clone(&self) -> Self {
        handle(self.kind, self.id)
    }
}

impl Drop for MockHandle {
    fn drop(&mut self) {
        adjust(self.kind, -1);
    }
}

pub struct MockContainer {
    key: Option<u32>,
    cert: Option<u32>,
    ca: u32,
    _handle: MockHandle,
}

/// Serialized mock container: `MOCK`, key id, cert id, CA count. An id of
/// zero means absent.
pub fn container_bytes(key: Option<u8>, cert: Option<u8>, ca: u8) -> Vec<u8> {
    let mut out = MAGIC.to_vec();
    out.extend_from_slice(&[key.unwrap_or(0), cert.unwrap_or(0), ca]);
    out
}

pub struct MockBackend;

impl Backend for MockBackend {
    type Container = MockContainer;
    type Key = MockHandle;
    type Cert = MockHandle;

    fn decode(der: &[u8]) -> Result<MockContainer> {
        match der.strip_prefix(MAGIC) {
            Some(&[key, cert, ca]) => Ok(MockContainer {
                key: (key != 0).then_some(u32::from(key)),
                cert: (cert != 0).then_some(u32::from(cert)),
                ca: u32::from(ca),
                _handle: handle(Kind::Container, 0),
            }),
            _ => Err(Error::Decode {
                reason: "bad mock container".into(),
                code: None,
            }),
        }
    }

    fn extract(container: &MockContainer, password: &str) -> Result<Extracted<Self>> {
        EXTRACT_CALLS.with(|calls| calls.set(calls.get() + 1));

        // Allocate before checking the password, like a library that fails
        // halfway through; the partial handle must still be released.
        let key = container.key.map(|id| handle(Kind::Key, id));
        if password != PASSWORD {
            return Err(Error::Extract {
                reason: "mac verify failure".into(),
                code: Some(0x71),
            });
        }

        let cert = container.cert.map(|id| handle(Kind::Cert, id));
        let ca = (container.ca > 0)
            .then(|| (0..container.ca).map(|i| handle(Kind::Cert, 100 + i)).collect());
        Ok(Extracted { key, cert, ca })
    }

    fn key_matches(cert: &MockHandle, key: &MockHandle) -> Result<bool> {
        Ok(cert.id == key.id)
    }
}
