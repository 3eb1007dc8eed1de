#![forbid(unsafe_code)]

//! pfxkit CLI: inspect, export and create PKCS#12 containers.

use clap::{Args, Parser, Subcommand};
use log::{debug, warn};
use pfxkit_core::Error;
use pfxkit_pkcs12::{
    CaChain, Certificate, MacDigest, Pkcs12, Pkcs12Builder, Pkcs12Info, PrivateKey,
    SafeContents,
};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process;

#[derive(Parser)]
#[command(
    name = "pfxkit",
    about = "Inspect, export and create PKCS#12 (.p12/.pfx) containers",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Verbose output (RUST_LOG overrides)
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Open a container and describe its key, certificate and CA chain
    Inspect {
        /// Input PKCS#12 file
        file: PathBuf,

        #[command(flatten)]
        password: PasswordArgs,
    },

    /// Show the container structure without decrypting anything
    Info {
        /// Input PKCS#12 file
        file: PathBuf,
    },

    /// Write the key, certificate and CA chain as PEM
    Export {
        /// Input PKCS#12 file
        file: PathBuf,

        #[command(flatten)]
        password: PasswordArgs,

        /// Output file (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Leave the private key out
        #[arg(long = "no-key")]
        no_key: bool,

        /// Leave the CA certificates out
        #[arg(long = "no-chain")]
        no_chain: bool,
    },

    /// Build a container from PEM inputs
    Create {
        /// Private key (PEM)
        #[arg(short = 'k', long)]
        key: PathBuf,

        /// End-entity certificate (PEM)
        #[arg(short = 'c', long)]
        cert: PathBuf,

        /// CA certificates (PEM, may hold several; repeatable)
        #[arg(long)]
        ca: Vec<PathBuf>,

        /// Friendly name
        #[arg(short, long)]
        name: Option<String>,

        /// Iteration count for key and certificate encryption
        #[arg(long = "iter")]
        iterations: Option<u32>,

        /// MAC iteration count
        #[arg(long = "mac-iter")]
        mac_iterations: Option<u32>,

        /// MAC digest: sha1, sha256, sha384 or sha512
        #[arg(long = "mac-digest", value_parser = parse_mac_digest)]
        mac_digest: Option<MacDigest>,

        #[command(flatten)]
        password: PasswordArgs,

        /// Output file
        #[arg(short, long)]
        output: PathBuf,
    },
}

/// Where the container password comes from. Defaults to the empty password.
#[derive(Args, Debug, Default)]
struct PasswordArgs {
    /// Password given on the command line
    #[arg(short = 'p', long, conflicts_with_all = ["password_env", "password_file"])]
    password: Option<String>,

    /// Read the password from this environment variable
    #[arg(long = "password-env", conflicts_with = "password_file")]
    password_env: Option<String>,

    /// Read the password from the first line of this file
    #[arg(long = "password-file")]
    password_file: Option<PathBuf>,
}

impl PasswordArgs {
    fn resolve(&self) -> Result<String, Error> {
        if let Some(password) = &self.password {
            return Ok(password.clone());
        }
        if let Some(var) = &self.password_env {
            return std::env::var(var)
                .map_err(|e| Error::Other(format!("password variable {var}: {e}")));
        }
        if let Some(path) = &self.password_file {
            let text = read_text(path)?;
            return Ok(text.lines().next().unwrap_or_default().to_owned());
        }
        Ok(String::new())
    }
}

fn parse_mac_digest(s: &str) -> Result<MacDigest, String> {
    match s.to_ascii_lowercase().as_str() {
        "sha1" => Ok(MacDigest::Sha1),
        "sha256" => Ok(MacDigest::Sha256),
        "sha384" => Ok(MacDigest::Sha384),
        "sha512" => Ok(MacDigest::Sha512),
        other => Err(format!("unknown MAC digest: {other}")),
    }
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let result = match cli.command {
        Commands::Inspect { file, password } => cmd_inspect(&file, &password),

        Commands::Info { file } => cmd_info(&file),

        Commands::Export {
            file,
            password,
            output,
            no_key,
            no_chain,
        } => cmd_export(&file, &password, output, !no_key, !no_chain),

        Commands::Create {
            key,
            cert,
            ca,
            name,
            iterations,
            mac_iterations,
            mac_digest,
            password,
            output,
        } => cmd_create(CreateOptions {
            key,
            cert,
            ca,
            name,
            iterations,
            mac_iterations,
            mac_digest,
            password,
            output,
        }),
    };

    if let Err(e) = result {
        eprintln!("Error: {e}");
        process::exit(1);
    }
}

fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default)).init();
}

fn cmd_inspect(file: &Path, password: &PasswordArgs) -> Result<(), Error> {
    let p12 = open(file, password)?;
    let mut out = std::io::stdout().lock();
    describe(&p12, &mut out).map_err(|e| Error::Other(format!("stdout: {e}")))
}

fn cmd_info(file: &Path) -> Result<(), Error> {
    let data = read_bytes(file)?;
    let info = Pkcs12Info::inspect(&data)?;
    let mut out = std::io::stdout().lock();
    describe_info(&info, &mut out).map_err(|e| Error::Other(format!("stdout: {e}")))
}

fn cmd_export(
    file: &Path,
    password: &PasswordArgs,
    output: Option<PathBuf>,
    with_key: bool,
    with_chain: bool,
) -> Result<(), Error> {
    let p12 = open(file, password)?;
    let pem = export_pem(&p12, with_key, with_chain)?;
    write_output(output, &pem)
}

struct CreateOptions {
    key: PathBuf,
    cert: PathBuf,
    ca: Vec<PathBuf>,
    name: Option<String>,
    iterations: Option<u32>,
    mac_iterations: Option<u32>,
    mac_digest: Option<MacDigest>,
    password: PasswordArgs,
    output: PathBuf,
}

fn cmd_create(opts: CreateOptions) -> Result<(), Error> {
    let key = PrivateKey::from_pem(&read_bytes(&opts.key)?)?;
    let cert = Certificate::from_pem(&read_bytes(&opts.cert)?)?;
    if !cert.key_matches(&key)? {
        warn!(
            "{} does not match the public key in {}",
            opts.key.display(),
            opts.cert.display()
        );
    }

    let mut builder = Pkcs12Builder::new();
    builder.private_key(&key).certificate(&cert);
    for path in &opts.ca {
        let chain = CaChain::from_pem(&read_bytes(path)?)?;
        debug!("{}: {} CA certificate(s)", path.display(), chain.len());
        builder.ca_certificates(chain);
    }
    if let Some(name) = &opts.name {
        builder.name(name);
    }
    if let Some(iterations) = opts.iterations {
        builder.key_iterations(iterations);
    }
    if let Some(iterations) = opts.mac_iterations {
        builder.mac_iterations(iterations);
    }
    if let Some(digest) = opts.mac_digest {
        builder.mac_digest(digest);
    }

    let der = builder.build(&opts.password.resolve()?)?;
    write_output(Some(opts.output), &der)
}

// ── Rendering ────────────────────────────────────────────────────────

fn describe(p12: &Pkcs12, out: &mut impl Write) -> std::io::Result<()> {
    let key = p12.private_key();
    match &key {
        Some(key) => writeln!(out, "Private key: {} ({} bits)", key.algorithm(), key.bits())?,
        None => writeln!(out, "Private key: none")?,
    }

    match p12.certificate() {
        Some(cert) => {
            writeln!(out, "Certificate:")?;
            describe_certificate(&cert, "  ", out)?;
            if let Some(key) = &key {
                writeln!(out, "  Key matches: {}", match_verdict(cert.key_matches(key)))?;
            }
        }
        None => writeln!(out, "Certificate: none")?,
    }

    match p12.ca_certificates().filter(|chain| !chain.is_empty()) {
        Some(chain) => {
            writeln!(out, "CA certificates: {}", chain.len())?;
            for (i, cert) in chain.iter().enumerate() {
                writeln!(out, "  [{i}]")?;
                describe_certificate(cert, "    ", out)?;
            }
        }
        None => writeln!(out, "CA certificates: none")?,
    }
    Ok(())
}

fn match_verdict(result: Result<bool, Error>) -> &'static str {
    match result {
        Ok(true) => "yes",
        Ok(false) => {
            warn!("private key does not match the certificate");
            "no"
        }
        Err(e) => {
            warn!("cannot compare private key with certificate: {e}");
            "unknown"
        }
    }
}

fn describe_certificate(cert: &Certificate, indent: &str, out: &mut impl Write) -> std::io::Result<()> {
    writeln!(out, "{indent}Subject: {}", cert.subject())?;
    writeln!(out, "{indent}Issuer: {}", cert.issuer())?;
    if let Ok(serial) = cert.serial_hex() {
        writeln!(out, "{indent}Serial: {serial}")?;
    }
    writeln!(out, "{indent}Not before: {}", cert.not_before())?;
    writeln!(out, "{indent}Not after: {}", cert.not_after())?;
    Ok(())
}

fn describe_info(info: &Pkcs12Info, out: &mut impl Write) -> std::io::Result<()> {
    writeln!(out, "Version: {}", info.version)?;
    match &info.mac {
        Some(mac) => writeln!(
            out,
            "MAC: {}, {} iteration(s), {}-byte salt",
            mac.digest, mac.iterations, mac.salt_len
        )?,
        None => writeln!(out, "MAC: none")?,
    }
    if info.signed {
        writeln!(out, "Integrity: public-key (signedData)")?;
        return Ok(());
    }
    writeln!(out, "Safes: {}", info.safes.len())?;
    for (i, safe) in info.safes.iter().enumerate() {
        match safe {
            SafeContents::Data { len } => writeln!(out, "  [{i}] data ({len} bytes)")?,
            SafeContents::Encrypted { algorithm } => {
                writeln!(out, "  [{i}] encrypted: {algorithm}")?
            }
            SafeContents::Enveloped => writeln!(out, "  [{i}] enveloped")?,
            SafeContents::Other(oid) => writeln!(out, "  [{i}] unknown content type {oid}")?,
        }
    }
    Ok(())
}

/// Key (PKCS#8), certificate, then CA certificates, all PEM.
fn export_pem(p12: &Pkcs12, with_key: bool, with_chain: bool) -> Result<Vec<u8>, Error> {
    let mut pem = Vec::new();
    if with_key {
        if let Some(key) = p12.private_key() {
            pem.extend_from_slice(&key.to_pkcs8_pem()?);
        }
    }
    if let Some(cert) = p12.certificate() {
        pem.extend_from_slice(&cert.to_pem()?);
    }
    if with_chain {
        if let Some(chain) = p12.ca_certificates() {
            pem.extend_from_slice(&chain.to_pem()?);
        }
    }
    Ok(pem)
}

// ── Utility functions ────────────────────────────────────────────────

fn open(file: &Path, password: &PasswordArgs) -> Result<Pkcs12, Error> {
    let data = read_bytes(file)?;
    debug!("opening {}", file.display());
    Pkcs12::parse(&data, &password.resolve()?)
}

fn read_bytes(path: &Path) -> Result<Vec<u8>, Error> {
    std::fs::read(path).map_err(|e| Error::Other(format!("{}: {e}", path.display())))
}

fn read_text(path: &Path) -> Result<String, Error> {
    std::fs::read_to_string(path).map_err(|e| Error::Other(format!("{}: {e}", path.display())))
}

fn write_output(path: Option<PathBuf>, data: &[u8]) -> Result<(), Error> {
    match path {
        Some(p) => {
            std::fs::write(&p, data).map_err(|e| Error::Other(format!("{}: {e}", p.display())))
        }
        None => std::io::stdout()
            .write_all(data)
            .map_err(|e| Error::Other(format!("stdout: {e}"))),
    }
}
