use pfxkit::pkcs12::{Pkcs12, Pkcs12Info, SafeContents};

fn main() -> pfxkit::core::Result<()> {
    let mut args = std::env::args().skip(1);
    let path = args.next().expect("usage: dump_p12 <p12_file> [password]");
    let password = args.next().unwrap_or_default();
    let data = std::fs::read(&path)?;

    let info = Pkcs12Info::inspect(&data)?;
    eprintln!("=== {path}: version {}, {} safe(s)", info.version, info.safes.len());
    if let Some(mac) = &info.mac {
        eprintln!("MAC: {} ({} iterations, {}-byte salt)", mac.digest, mac.iterations, mac.salt_len);
    }
    for (i, safe) in info.safes.iter().enumerate() {
        match safe {
            SafeContents::Data { len } => eprintln!("  [{i}] data, {len} bytes"),
            SafeContents::Encrypted { algorithm } => eprintln!("  [{i}] encrypted with {algorithm}"),
            SafeContents::Enveloped => eprintln!("  [{i}] enveloped"),
            SafeContents::Other(oid) => eprintln!("  [{i}] {oid}"),
        }
    }

    let mut p12 = Pkcs12::parse(&data, &password)?;
    eprintln!("{p12:?}");
    if let Some(cert) = p12.certificate() {
        eprintln!("Subject: {}", cert.subject());
        eprintln!("Key matches: {}", cert.has_matching_key()?);
    }
    if let Some(chain) = p12.ca_certificates() {
        for cert in chain {
            eprintln!("CA: {}", cert.subject());
        }
    }

    p12.dispose();
    eprintln!("disposed: {}", p12.is_disposed());
    Ok(())
}
