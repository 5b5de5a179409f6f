//! OPENPGPKEY resource records (RFC 7929) in DNS presentation format.

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use sha2::{Digest, Sha256};

use crate::validation::Address;

/// Hex characters of the local-part digest kept in the owner name
/// (28 octets of SHA2-256, fixed by RFC 7929).
const OWNER_HASH_HEX_LEN: usize = 56;

/// Characters of encoded RDATA per output line.
const LINE_WIDTH: usize = 60;

const INDENT: &str = "                  ";

/// OPENPGPKEY resource record type code, used in generic RDATA output.
const TYPE_OPENPGPKEY: u16 = 61;

/// How the RDATA is written.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RecordFormat {
    /// `IN OPENPGPKEY` with base64 RDATA.
    #[default]
    Typed,
    /// RFC 3597 `IN TYPE61 \# <len>` with hex RDATA.
    Generic,
}

/// Returns `<sha256(local)[..56 hex]>._openpgpkey.<domain>.`.
///
/// The local part is hashed byte for byte as given, without case folding.
pub fn owner_name(address: &Address) -> String {
    let digest = hex::encode(Sha256::digest(address.local_part().as_bytes()));
    let mut owner = format!(
        "{}._openpgpkey.{}",
        &digest[..OWNER_HASH_HEX_LEN],
        address.domain()
    );
    if !owner.ends_with('.') {
        owner.push('.');
    }
    owner
}

/// Renders an OPENPGPKEY record for `owner` carrying `keydata`.
pub fn format_record(owner: &str, keydata: &[u8], format: RecordFormat) -> String {
    let (mut out, encoded) = match format {
        RecordFormat::Typed => (
            format!("{owner} IN OPENPGPKEY (\n"),
            STANDARD.encode(keydata),
        ),
        RecordFormat::Generic => (
            format!(
                "{owner} IN TYPE{TYPE_OPENPGPKEY} \\# {} (\n",
                keydata.len()
            ),
            hex::encode(keydata),
        ),
    };

    for line in chunks(&encoded, LINE_WIDTH) {
        out.push_str(INDENT);
        out.push_str(line);
        out.push('\n');
    }
    out.push(')');
    out
}

/// Splits `s` every `width` characters; the last piece may be shorter.
fn chunks(s: &str, width: usize) -> impl Iterator<Item = &str> {
    let mut rest = s;
    std::iter::from_fn(move || {
        if rest.is_empty() {
            return None;
        }
        let split = rest
            .char_indices()
            .nth(width)
            .map_or(rest.len(), |(index, _)| index);
        let (head, tail) = rest.split_at(split);
        rest = tail;
        Some(head)
    })
}
