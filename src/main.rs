//! Given a uid and a file containing an OpenPGP public key, print the
//! matching OPENPGPKEY DNS record in presentation format.

use std::io::IsTerminal;
use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use openpgpkey::{Config, Error, Generator, RecordFormat};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "openpgpkey")]
#[command(version)]
#[command(
    about = "Generate a DNS OPENPGPKEY record for an email address from a GPG public key",
    long_about = None
)]
struct Cli {
    /// Email address (or `Name <address>` uid) to publish the key for
    #[arg(value_name = "EMAIL")]
    uid: String,

    /// File containing the GPG public key (armored or binary)
    #[arg(value_name = "GPGKEYFILE")]
    keyfile: PathBuf,

    /// Output DNS generic RDATA format (rather than OPENPGPKEY)
    #[arg(short, long)]
    generic: bool,

    /// gpg binary to run
    #[arg(long, value_name = "PATH", env = "OPENPGPKEY_GPG", default_value = openpgpkey::DEFAULT_GPG_PROGRAM)]
    gpg: PathBuf,

    /// Seconds to wait for each gpg invocation
    #[arg(long, value_name = "SECS", env = "OPENPGPKEY_TIMEOUT", default_value_t = openpgpkey::DEFAULT_TIMEOUT.as_secs())]
    timeout: u64,

    /// Directory in which the temporary gpg home directory is created
    #[arg(long, value_name = "DIR", env = "OPENPGPKEY_DIR", default_value = openpgpkey::DEFAULT_KEYSTORE_BASE)]
    keystore_dir: PathBuf,

    /// Print a summary of the parsed key to stderr
    #[arg(long)]
    show_key: bool,

    /// Verbose logging
    #[arg(short, long)]
    verbose: bool,
}

impl Cli {
    fn config(&self) -> Config {
        Config {
            gpg_program: self.gpg.clone(),
            timeout: Duration::from_secs(self.timeout),
            keystore_base: self.keystore_dir.clone(),
            format: if self.generic {
                RecordFormat::Generic
            } else {
                RecordFormat::Typed
            },
        }
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_target(false)
        .with_ansi(std::io::stderr().is_terminal())
        .with_writer(std::io::stderr)
        .init();

    if let Err(e) = run(cli).await {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> openpgpkey::Result<()> {
    openpgpkey::validate_uid(&cli.uid)?;

    let keydata = tokio::fs::read(&cli.keyfile)
        .await
        .map_err(|source| Error::ReadKeyFile {
            path: cli.keyfile.clone(),
            source,
        })?;

    let generated = Generator::new(cli.config())
        .generate(&cli.uid, &keydata)
        .await?;

    if cli.show_key {
        eprintln!("{}", generated.key);
    }
    println!("{}", generated.record);

    // the record is already out; a leftover keystore still fails the run
    match generated.cleanup_error {
        Some(err) => Err(err),
        None => Ok(()),
    }
}
