use std::io;
use std::path::PathBuf;

use crate::runner::ExitState;

#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    #[error("invalid uid '{uid}': {reason}")]
    InvalidUid { uid: String, reason: String },

    #[error("command execution failed: {0}")]
    Command(#[from] io::Error),

    #[error("gpg {step} failed ({status}): {output}")]
    Tool {
        step: &'static str,
        status: ExitState,
        output: String,
    },

    #[error("gpg {step} output is not valid UTF-8: {source}")]
    Decode {
        step: &'static str,
        source: std::string::FromUtf8Error,
    },

    #[error("gpg exported no key material for {0}")]
    EmptyExport(String),

    #[error("couldn't parse openpgp key: {0}")]
    Parse(#[from] ParseError),

    #[error("couldn't find uid {0} in given key")]
    UidNotFound(String),

    #[error("failed to create keystore directory under {path}: {source}")]
    Keystore { path: PathBuf, source: io::Error },

    #[error("failed to remove keystore directory {path}: {source}")]
    Cleanup { path: PathBuf, source: io::Error },

    #[error("failed to read key file {path}: {source}")]
    ReadKeyFile { path: PathBuf, source: io::Error },

    #[error("failed to capture {0} from subprocess")]
    PipeCaptureFailed(&'static str),
}

/// Violations of the record sequencing rules in a key listing.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[non_exhaustive]
pub enum ParseError {
    #[error("more than one public key given")]
    MultiplePrimaryKeys,

    #[error("{record} found without preceding pubkey (line {line})")]
    MissingPrimaryKey { record: &'static str, line: usize },

    #[error("no public key found in listing")]
    NoPrimaryKey,

    #[error("malformed {record} record on line {line}: {reason}")]
    MalformedRecord {
        record: &'static str,
        line: usize,
        reason: String,
    },
}

pub type Result<T> = std::result::Result<T, Error>;
