use std::path::PathBuf;
use std::time::Duration;

use crate::record::RecordFormat;

pub const DEFAULT_GPG_PROGRAM: &str = "gpg";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);
pub const DEFAULT_KEYSTORE_BASE: &str = "/var/tmp/openpgpkey";

/// Settings for a [`Generator`](crate::Generator).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// The gpg binary to invoke.
    pub gpg_program: PathBuf,
    /// Upper bound on each gpg invocation.
    pub timeout: Duration,
    /// Directory under which the per-run keystore is created.
    pub keystore_base: PathBuf,
    pub format: RecordFormat,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            gpg_program: PathBuf::from(DEFAULT_GPG_PROGRAM),
            timeout: DEFAULT_TIMEOUT,
            keystore_base: PathBuf::from(DEFAULT_KEYSTORE_BASE),
            format: RecordFormat::Typed,
        }
    }
}
