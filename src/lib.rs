//! Generate DNS OPENPGPKEY resource records (RFC 7929) from OpenPGP keys.
//!
//! The key is imported into a throwaway gpg home directory, listed in gpg's
//! colon format, checked for the requested uid and exported in minimal form.
//! The exported bytes are published under
//! `<sha256(local-part)[..28]>._openpgpkey.<domain>.`, written either as a
//! typed `OPENPGPKEY` record or as RFC 3597 generic RDATA.
//!
//! # Example
//!
//! ```no_run
//! use openpgpkey::{Config, Generator, RecordFormat};
//!
//! #[tokio::main]
//! async fn main() -> openpgpkey::Result<()> {
//!     let config = Config {
//!         format: RecordFormat::Generic,
//!         ..Config::default()
//!     };
//!     let keydata = std::fs::read("jane.asc")?;
//!
//!     let generated = Generator::new(config)
//!         .generate("jane@example.com", &keydata)
//!         .await?;
//!     println!("{}", generated.record);
//!
//!     Ok(())
//! }
//! ```
//!
//! # Requirements
//!
//! - A `gpg` binary (GnuPG 1.x or 2.x)
//! - A writable keystore base directory (default `/var/tmp/openpgpkey`)

mod config;
mod error;
mod generator;
mod keystore;
mod parse;
mod record;
mod runner;
mod types;
mod validation;

pub use config::{Config, DEFAULT_GPG_PROGRAM, DEFAULT_KEYSTORE_BASE, DEFAULT_TIMEOUT};
pub use error::{Error, ParseError, Result};
pub use generator::{Generated, Generator};
pub use keystore::Keystore;
pub use parse::parse_key_listing;
pub use record::{RecordFormat, format_record, owner_name};
pub use runner::{ExitState, ProcessOutput, TIMEOUT_NOTICE, run_bounded};
pub use types::{IdentityBinding, Key, PublicKeyAlgorithm};
pub use validation::{Address, validate_uid};
