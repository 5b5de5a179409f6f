use std::path::PathBuf;

use tempfile::TempDir;
use tracing::{error, info};

use crate::config::Config;
use crate::error::{Error, Result};
use crate::keystore::Keystore;
use crate::parse::parse_key_listing;
use crate::record::{format_record, owner_name};
use crate::types::Key;
use crate::validation::{Address, validate_uid};

/// The result of a successful run.
#[derive(Debug)]
pub struct Generated {
    /// The parsed primary key, carrying the exported key material.
    pub key: Key,
    pub owner: String,
    /// The record in presentation format, without a trailing newline.
    pub record: String,
    /// Set when the record was produced but the keystore directory could not
    /// be removed afterwards. Callers should still treat the run as failed.
    pub cleanup_error: Option<Error>,
}

/// Turns a key file and a uid into an OPENPGPKEY record.
///
/// Each call imports the key into its own fresh keystore directory under
/// [`Config::keystore_base`], lists and parses it, checks that the uid is
/// bound to the key, exports the minimal key for that uid and formats it.
/// The directory is removed whether or not the run succeeds.
///
/// # Example
///
/// ```no_run
/// # async fn example() -> openpgpkey::Result<()> {
/// use openpgpkey::{Config, Generator};
///
/// let generator = Generator::new(Config::default());
/// let keydata = std::fs::read("jane.asc")?;
/// let generated = generator.generate("jane@example.com", &keydata).await?;
/// println!("{}", generated.record);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone, Default)]
pub struct Generator {
    config: Config,
}

impl Generator {
    #[must_use]
    pub fn new(config: Config) -> Self {
        Self { config }
    }

    pub async fn generate(&self, uid: &str, keydata: &[u8]) -> Result<Generated> {
        let address = validate_uid(uid)?;
        let dir = self.create_keystore_dir().await?;
        let path = dir.path().to_path_buf();

        let keystore = Keystore::new(&self.config.gpg_program, &path, self.config.timeout);
        let result = self.run(&keystore, &address, keydata).await;

        let cleanup = dir.close().map_err(|source| Error::Cleanup {
            path: path.clone(),
            source,
        });

        match (result, cleanup) {
            (Ok(generated), Ok(())) => Ok(generated),
            (Ok(mut generated), Err(err)) => {
                generated.cleanup_error = Some(err);
                Ok(generated)
            }
            (Err(err), Ok(())) => Err(err),
            (Err(err), Err(cleanup_err)) => {
                error!(%cleanup_err, "keystore cleanup failed after an earlier error");
                Err(err)
            }
        }
    }

    async fn create_keystore_dir(&self) -> Result<TempDir> {
        let base = &self.config.keystore_base;
        let keystore_err = |source| Error::Keystore {
            path: PathBuf::from(base),
            source,
        };

        tokio::fs::create_dir_all(base).await.map_err(keystore_err)?;
        tempfile::Builder::new()
            .prefix("x")
            .tempdir_in(base)
            .map_err(keystore_err)
    }

    async fn run(
        &self,
        keystore: &Keystore,
        address: &Address,
        keydata: &[u8],
    ) -> Result<Generated> {
        keystore.import(keydata).await?;

        let listing = keystore.list_keys().await?;
        let mut key = parse_key_listing(&listing, keydata)?;
        info!(
            keyid = %key.keyid,
            fingerprint = key.fingerprint().unwrap_or_default(),
            subkeys = key.subkeys().len(),
            "parsed key"
        );

        if !key.has_uid(address.as_str()) {
            return Err(Error::UidNotFound(address.to_string()));
        }

        let exported = keystore.export(address).await?;
        let owner = owner_name(address);
        let record = format_record(&owner, &exported, self.config.format);
        key.set_keydata(exported);

        Ok(Generated {
            key,
            owner,
            record,
            cleanup_error: None,
        })
    }
}

#[cfg(all(test, unix))]
mod tests {
    use std::time::Duration;

    use super::*;

    fn config_in(base: &std::path::Path, gpg: &str) -> Config {
        Config {
            gpg_program: PathBuf::from(gpg),
            timeout: Duration::from_secs(5),
            keystore_base: base.to_path_buf(),
            ..Config::default()
        }
    }

    fn entries(dir: &std::path::Path) -> usize {
        std::fs::read_dir(dir).unwrap().count()
    }

    #[tokio::test]
    async fn test_invalid_uid_creates_nothing() {
        let base = tempfile::tempdir().unwrap();
        let generator = Generator::new(config_in(base.path(), "true"));

        let err = generator.generate("not-an-address", b"key").await.unwrap_err();
        assert!(matches!(err, Error::InvalidUid { .. }));
        assert_eq!(entries(base.path()), 0);
    }

    #[tokio::test]
    async fn test_failed_import_removes_keystore() {
        let base = tempfile::tempdir().unwrap();
        let generator = Generator::new(config_in(base.path(), "false"));

        let err = generator.generate("jane@example.com", b"key").await.unwrap_err();
        assert!(matches!(err, Error::Tool { step: "import", .. }));
        assert_eq!(entries(base.path()), 0);
    }

    #[tokio::test]
    async fn test_unparseable_listing_is_parse_error() {
        // `true` succeeds with empty output, so the listing has no primary key
        let base = tempfile::tempdir().unwrap();
        let generator = Generator::new(config_in(base.path(), "true"));

        let err = generator.generate("jane@example.com", b"key").await.unwrap_err();
        assert!(matches!(err, Error::Parse(crate::ParseError::NoPrimaryKey)));
        assert_eq!(entries(base.path()), 0);
    }

    #[tokio::test]
    async fn test_missing_base_dir_is_created() {
        let base = tempfile::tempdir().unwrap();
        let nested = base.path().join("a/b");
        let generator = Generator::new(config_in(&nested, "false"));

        let _ = generator.generate("jane@example.com", b"key").await;
        assert!(nested.is_dir());
        assert_eq!(entries(&nested), 0);
    }
}
