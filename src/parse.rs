use tracing::debug;

use crate::error::ParseError;
use crate::types::{Key, PublicKeyAlgorithm};

/// Parses the output of `gpg --with-colons --fixed-list-mode --list-keys
/// --with-fingerprint` into the single primary key it describes.
///
/// `keydata` is attached to the primary key. See gpg's `doc/DETAILS` for the
/// record layout.
pub fn parse_key_listing(output: &str, keydata: &[u8]) -> Result<Key, ParseError> {
    let mut parser = ListingParser::default();
    for (index, line) in output.lines().enumerate() {
        parser.feed(index + 1, line)?;
    }
    let mut primary = parser.finish()?;
    primary.set_keydata(keydata.to_vec());
    Ok(primary)
}

/// Which key a `fpr` record belongs to.
#[derive(Debug, Clone, Copy)]
enum Current {
    Primary,
    Subkey(usize),
}

#[derive(Debug, Default)]
enum ListingParser {
    #[default]
    AwaitingPrimary,
    PrimaryOpen { primary: Key, current: Current },
}

impl ListingParser {
    fn feed(&mut self, line_no: usize, line: &str) -> Result<(), ParseError> {
        let fields: Vec<&str> = line.split(':').collect();

        match fields[0] {
            "tru" => {}
            "pub" => {
                if matches!(self, Self::PrimaryOpen { .. }) {
                    return Err(ParseError::MultiplePrimaryKeys);
                }
                *self = Self::PrimaryOpen {
                    primary: key_from_fields("pub", line_no, &fields)?,
                    current: Current::Primary,
                };
            }
            "uid" => {
                let primary = self.primary_mut("uid", line_no)?;
                let uid = field(&fields, 9, "uid", line_no)?;
                primary.add_uid(&unescape(uid));
            }
            "sub" => {
                let Self::PrimaryOpen { primary, current } = self else {
                    return Err(ParseError::MissingPrimaryKey {
                        record: "sub",
                        line: line_no,
                    });
                };
                let subkey = key_from_fields("sub", line_no, &fields)?;
                *current = Current::Subkey(primary.add_subkey(subkey));
            }
            "fpr" => {
                let Self::PrimaryOpen { primary, current } = self else {
                    return Err(ParseError::MissingPrimaryKey {
                        record: "fpr",
                        line: line_no,
                    });
                };
                let fingerprint = field(&fields, 9, "fpr", line_no)?;
                let key = match *current {
                    Current::Primary => Some(primary),
                    Current::Subkey(index) => primary.subkey_mut(index),
                };
                if let Some(key) = key
                    && !key.set_fingerprint(fingerprint)
                {
                    debug!(keyid = %key.keyid, "ignoring repeated fingerprint record");
                }
            }
            "" => {}
            other => {
                debug!(record_type = other, "skipping unhandled GPG record type");
            }
        }

        Ok(())
    }

    fn primary_mut(&mut self, record: &'static str, line: usize) -> Result<&mut Key, ParseError> {
        match self {
            Self::PrimaryOpen { primary, .. } => Ok(primary),
            Self::AwaitingPrimary => Err(ParseError::MissingPrimaryKey { record, line }),
        }
    }

    fn finish(self) -> Result<Key, ParseError> {
        match self {
            Self::PrimaryOpen { primary, .. } => Ok(primary),
            Self::AwaitingPrimary => Err(ParseError::NoPrimaryKey),
        }
    }
}

fn field<'a>(
    fields: &[&'a str],
    index: usize,
    record: &'static str,
    line: usize,
) -> Result<&'a str, ParseError> {
    fields
        .get(index)
        .copied()
        .ok_or_else(|| ParseError::MalformedRecord {
            record,
            line,
            reason: format!("expected at least {} fields, got {}", index + 1, fields.len()),
        })
}

fn key_from_fields(record: &'static str, line: usize, fields: &[&str]) -> Result<Key, ParseError> {
    // keyid, length, algorithm, creation date and capabilities all sit
    // within the first twelve fields
    field(fields, 11, record, line)?;

    let malformed = |what: &str, value: &str| ParseError::MalformedRecord {
        record,
        line,
        reason: format!("invalid {what} '{value}'"),
    };

    let bits: u32 = fields[2]
        .parse()
        .map_err(|_| malformed("key length", fields[2]))?;
    let algorithm: u8 = fields[3]
        .parse()
        .map_err(|_| malformed("algorithm", fields[3]))?;
    let created: i64 = fields[5]
        .parse()
        .map_err(|_| malformed("creation date", fields[5]))?;

    Ok(Key::new(
        fields[4],
        PublicKeyAlgorithm::from_code(algorithm),
        bits,
        fields[11],
        created,
    ))
}

/// Decodes the `\xHH` escapes gpg uses for colons and other special bytes
/// inside user ID fields.
fn unescape(field: &str) -> String {
    if !field.contains('\\') {
        return field.to_string();
    }

    let bytes = field.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'\\'
            && bytes.get(i + 1) == Some(&b'x')
            && let Some(hex) = bytes.get(i + 2..i + 4)
            && let Ok(hex) = std::str::from_utf8(hex)
            && let Ok(byte) = u8::from_str_radix(hex, 16)
        {
            out.push(byte);
            i += 4;
        } else {
            out.push(bytes[i]);
            i += 1;
        }
    }
    String::from_utf8_lossy(&out).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE_LISTING: &str = r#"tru::1:1600000000:0:3:1:5
pub:-:2048:1:ABCDEF1234567890:1600000000:::-:::scESC::::::23::0:
fpr:::::::::AAAABBBBCCCCDDDDEEEEFFFF0000111122223333:
uid:-::::1600000000::HASH::Jane Doe <jane@example.com>::::::::::0:
uid:-::::1600000000::HASH::Jane Doe <jane@work.example.org>::::::::::0:
sub:-:2048:1:1111222233334444:1600000000::::::e::::::23:
fpr:::::::::99998888777766665555444433332222111122223333:
"#;

    #[test]
    fn test_parse_listing() {
        let key = parse_key_listing(SAMPLE_LISTING, b"raw").unwrap();

        assert_eq!(key.keyid, "ABCDEF1234567890");
        assert_eq!(key.bits, 2048);
        assert_eq!(key.algorithm, PublicKeyAlgorithm::Rsa);
        assert_eq!(key.capabilities, "scESC");
        assert_eq!(key.created, 1600000000);
        assert_eq!(
            key.fingerprint(),
            Some("AAAABBBBCCCCDDDDEEEEFFFF0000111122223333")
        );
        assert_eq!(key.keydata(), Some(&b"raw"[..]));

        assert_eq!(key.uids().len(), 2);
        assert_eq!(key.uids()[0].name, "Jane Doe");
        assert_eq!(key.uids()[1].address.as_deref(), Some("jane@work.example.org"));

        assert_eq!(key.subkeys().len(), 1);
        let sub = &key.subkeys()[0];
        assert_eq!(sub.keyid, "1111222233334444");
        assert_eq!(sub.capabilities, "e");
        assert_eq!(
            sub.fingerprint(),
            Some("99998888777766665555444433332222111122223333")
        );
        assert!(sub.uids().is_empty());
        assert!(sub.keydata().is_none());
    }

    #[test]
    fn test_spec_shaped_listing() {
        let listing = "pub:u:2048:1:ABCDEF1234567890:1600000000::::::scESC:\n\
                       uid:u::::::::Jane Doe <jane@example.com>:\n\
                       fpr:::::::::AAAABBBBCCCCDDDDEEEEFFFF0000111122223333:\n";
        let key = parse_key_listing(listing, b"").unwrap();
        assert_eq!(key.capabilities, "scESC");
        assert!(key.has_uid("jane@example.com"));
        assert_eq!(
            key.fingerprint(),
            Some("AAAABBBBCCCCDDDDEEEEFFFF0000111122223333")
        );
    }

    #[test]
    fn test_uid_after_subkey_binds_to_primary() {
        let listing = r#"pub:-:2048:1:ABCDEF1234567890:1600000000:::-:::scESC::::::23::0:
sub:-:2048:1:1111222233334444:1600000000::::::e::::::23:
sub:-:256:22:5555666677778888:1600000000::::::s::::::23:
uid:-::::1600000000::HASH::Late Uid <late@example.com>::::::::::0:"#;
        let key = parse_key_listing(listing, b"").unwrap();
        assert_eq!(key.subkeys().len(), 2);
        assert!(key.has_uid("late@example.com"));
        assert!(key.subkeys().iter().all(|s| s.uids().is_empty()));
    }

    #[test]
    fn test_fingerprint_follows_latest_header() {
        let listing = r#"pub:-:2048:1:ABCDEF1234567890:1600000000:::-:::scESC::::::23::0:
sub:-:2048:1:1111222233334444:1600000000::::::e::::::23:
fpr:::::::::SUBFPR:
"#;
        let key = parse_key_listing(listing, b"").unwrap();
        assert_eq!(key.fingerprint(), None);
        assert_eq!(key.subkeys()[0].fingerprint(), Some("SUBFPR"));
    }

    #[test]
    fn test_repeated_fingerprint_keeps_first() {
        let listing = r#"pub:-:2048:1:ABCDEF1234567890:1600000000:::-:::scESC::::::23::0:
fpr:::::::::FIRST:
fpr:::::::::SECOND:
"#;
        let key = parse_key_listing(listing, b"").unwrap();
        assert_eq!(key.fingerprint(), Some("FIRST"));
    }

    #[test]
    fn test_two_primary_keys_fail() {
        let listing = r#"pub:-:2048:1:ABCDEF1234567890:1600000000:::-:::scESC::::::23::0:
pub:-:2048:1:0987654321FEDCBA:1600000000:::-:::scESC::::::23::0:"#;
        assert_eq!(
            parse_key_listing(listing, b"").unwrap_err(),
            ParseError::MultiplePrimaryKeys
        );
    }

    #[test]
    fn test_records_before_primary_fail() {
        let err = parse_key_listing("uid:-::::1600000000::HASH::Jane <jane@example.com>:", b"")
            .unwrap_err();
        assert_eq!(err, ParseError::MissingPrimaryKey { record: "uid", line: 1 });

        let err = parse_key_listing(
            "tru::1:1600000000:0:3:1:5\nsub:-:2048:1:1111222233334444:1600000000::::::e:",
            b"",
        )
        .unwrap_err();
        assert_eq!(err, ParseError::MissingPrimaryKey { record: "sub", line: 2 });

        let err = parse_key_listing("fpr:::::::::AAAA:", b"").unwrap_err();
        assert_eq!(err, ParseError::MissingPrimaryKey { record: "fpr", line: 1 });
    }

    #[test]
    fn test_empty_listing_has_no_primary() {
        assert_eq!(parse_key_listing("", b"").unwrap_err(), ParseError::NoPrimaryKey);
        assert_eq!(
            parse_key_listing("tru::1:1600000000:0:3:1:5\n", b"").unwrap_err(),
            ParseError::NoPrimaryKey
        );
    }

    #[test]
    fn test_malformed_pub_line() {
        let err = parse_key_listing("pub:f:4096", b"").unwrap_err();
        assert!(matches!(err, ParseError::MalformedRecord { record: "pub", line: 1, .. }));

        let err = parse_key_listing("pub:-:big:1:ABCDEF1234567890:1600000000::::::scESC:", b"")
            .unwrap_err();
        assert!(matches!(err, ParseError::MalformedRecord { record: "pub", .. }));
    }

    #[test]
    fn test_unknown_records_are_skipped() {
        let listing = r#"pub:-:2048:1:ABCDEF1234567890:1600000000:::-:::scESC::::::23::0:
rvk:::1::::::AAAA:80:
grp:::::::::0123456789ABCDEF:
uid:-::::1600000000::HASH::Jane <jane@example.com>::::::::::0:"#;
        let key = parse_key_listing(listing, b"").unwrap();
        assert!(key.has_uid("jane@example.com"));
    }

    #[test]
    fn test_uid_escapes_are_decoded() {
        let listing = r#"pub:-:2048:1:ABCDEF1234567890:1600000000:::-:::scESC::::::23::0:
uid:-::::1600000000::HASH::Jane\x3a Ops <jane@example.com>::::::::::0:"#;
        let key = parse_key_listing(listing, b"").unwrap();
        assert_eq!(key.uids()[0].name, "Jane: Ops");
    }

    #[test]
    fn test_unescape_leaves_plain_backslashes() {
        assert_eq!(unescape(r"a\x3ab"), "a:b");
        assert_eq!(unescape(r"a\zb"), r"a\zb");
        assert_eq!(unescape(r"trailing\x3"), r"trailing\x3");
    }
}
