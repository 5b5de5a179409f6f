use std::path::PathBuf;
use std::time::Duration;

use tokio::process::Command;
use tracing::debug;

use crate::error::{Error, Result};
use crate::runner::{ProcessOutput, run_bounded};
use crate::validation::Address;

/// A gpg home directory driven through the three invocations needed to turn
/// a key file into a record: import, list and export.
///
/// Every invocation runs with `LC_ALL=C` and is killed if it outlives the
/// configured timeout.
///
/// # Example
///
/// ```no_run
/// # async fn example() -> openpgpkey::Result<()> {
/// use std::time::Duration;
/// use openpgpkey::Keystore;
///
/// let keystore = Keystore::new("gpg", "/var/tmp/openpgpkey/xk3j", Duration::from_secs(5));
/// keystore.import(&std::fs::read("jane.asc")?).await?;
/// let listing = keystore.list_keys().await?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct Keystore {
    gpg_program: PathBuf,
    homedir: PathBuf,
    timeout: Duration,
}

impl Keystore {
    #[must_use]
    pub fn new(
        gpg_program: impl Into<PathBuf>,
        homedir: impl Into<PathBuf>,
        timeout: Duration,
    ) -> Self {
        Self {
            gpg_program: gpg_program.into(),
            homedir: homedir.into(),
            timeout,
        }
    }

    async fn run_gpg(
        &self,
        step: &'static str,
        args: &[&str],
        input: Option<&[u8]>,
    ) -> Result<ProcessOutput> {
        let mut cmd = Command::new(&self.gpg_program);
        cmd.env("LC_ALL", "C")
            .arg("--homedir")
            .arg(&self.homedir)
            .args(args);

        debug!(step, ?args, homedir = %self.homedir.display(), "running gpg");
        let output = run_bounded(&mut cmd, input, self.timeout).await?;

        if !output.status.success() {
            return Err(check_gpg_error(step, &output));
        }

        Ok(output)
    }

    /// Imports `keydata` (armored or binary) from stdin.
    pub async fn import(&self, keydata: &[u8]) -> Result<()> {
        self.run_gpg("import", &["--batch", "--import"], Some(keydata))
            .await?;
        Ok(())
    }

    /// Lists the keystore in gpg's machine-readable colon format.
    pub async fn list_keys(&self) -> Result<String> {
        let output = self
            .run_gpg(
                "list-keys",
                &[
                    "--fixed-list-mode",
                    "--with-colons",
                    "--list-keys",
                    "--with-fingerprint",
                    "--with-fingerprint",
                ],
                None,
            )
            .await?;

        String::from_utf8(output.stdout).map_err(|source| Error::Decode {
            step: "list-keys",
            source,
        })
    }

    /// Exports the minimal binary key for `uid`, without attribute packets.
    ///
    /// Only stdout is returned; gpg diagnostics on stderr never end up in the
    /// key material.
    pub async fn export(&self, uid: &Address) -> Result<Vec<u8>> {
        let output = self
            .run_gpg(
                "export",
                &[
                    "--export",
                    "--export-options",
                    "export-minimal,no-export-attributes",
                    uid.as_str(),
                ],
                None,
            )
            .await?;

        if output.stdout.is_empty() {
            return Err(Error::EmptyExport(uid.to_string()));
        }

        Ok(output.stdout)
    }
}

fn check_gpg_error(step: &'static str, output: &ProcessOutput) -> Error {
    Error::Tool {
        step,
        status: output.status,
        output: output.combined_lossy().trim_end().to_string(),
    }
}
