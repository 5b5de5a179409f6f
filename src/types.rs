use std::fmt;

use chrono::{DateTime, NaiveDate};

/// Public-key algorithm identifiers as gpg reports them in key listings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum PublicKeyAlgorithm {
    Rsa,
    /// Deprecated.
    RsaEncryptOnly,
    /// Deprecated.
    RsaSignOnly,
    /// Deprecated.
    ElgamalEncryptOnly,
    Dsa,
    /// Generic ECC.
    Ecdh,
    Ecdsa,
    Elgamal,
    DiffieHellman,
    /// Not an officially assigned code.
    Ed25519,
    Other(u8),
}

/// Code and display name of every algorithm gpg's `openpgpdefs.h` names.
static ALGORITHMS: [(u8, PublicKeyAlgorithm, &str); 10] = [
    (1, PublicKeyAlgorithm::Rsa, "RSA"),
    (2, PublicKeyAlgorithm::RsaEncryptOnly, "RSA Encrypt-Only"),
    (3, PublicKeyAlgorithm::RsaSignOnly, "RSA Sign-Only"),
    (16, PublicKeyAlgorithm::ElgamalEncryptOnly, "Elgamal Encrypt-Only"),
    (17, PublicKeyAlgorithm::Dsa, "DSA"),
    (18, PublicKeyAlgorithm::Ecdh, "ECDH"),
    (19, PublicKeyAlgorithm::Ecdsa, "ECDSA"),
    (20, PublicKeyAlgorithm::Elgamal, "Elgamal"),
    (21, PublicKeyAlgorithm::DiffieHellman, "Diffie-Hellman"),
    (22, PublicKeyAlgorithm::Ed25519, "Ed25519"),
];

impl PublicKeyAlgorithm {
    pub fn from_code(code: u8) -> Self {
        ALGORITHMS
            .iter()
            .find(|(known, _, _)| *known == code)
            .map_or(Self::Other(code), |&(_, algorithm, _)| algorithm)
    }

    fn entry(&self) -> Option<&'static (u8, Self, &'static str)> {
        ALGORITHMS.iter().find(|(_, algorithm, _)| algorithm == self)
    }

    pub fn code(&self) -> u8 {
        match self {
            Self::Other(code) => *code,
            known => known.entry().map_or(0, |&(code, _, _)| code),
        }
    }

    pub fn name(&self) -> Option<&'static str> {
        self.entry().map(|&(_, _, name)| name)
    }
}

impl fmt::Display for PublicKeyAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.name() {
            Some(name) => write!(f, "{} ({})", self.code(), name),
            None => write!(f, "{} (unknown)", self.code()),
        }
    }
}

/// A (display name, address) pair taken from a user ID string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdentityBinding {
    pub name: String,
    /// `None` when the user ID holds nothing with an `@` in it.
    pub address: Option<String>,
}

impl IdentityBinding {
    /// Splits a user ID such as `Jane Doe <jane@example.com>`.
    ///
    /// The address is the text between `<` and `>` when brackets are present,
    /// otherwise the first whitespace-separated token containing `@`.
    pub fn parse(uid: &str) -> Self {
        let uid = uid.trim();

        if let Some(open) = uid.find('<')
            && let Some(len) = uid[open + 1..].find('>')
        {
            let address = uid[open + 1..open + 1 + len].trim();
            return Self {
                name: unquote(uid[..open].trim()).to_string(),
                address: address.contains('@').then(|| address.to_string()),
            };
        }

        let address = uid
            .split_whitespace()
            .find(|token| token.contains('@') && !token.contains(['<', '>']));
        let name = match address {
            Some(addr) => uid.replacen(addr, "", 1).trim().to_string(),
            None => uid.to_string(),
        };

        Self {
            name: unquote(&name).to_string(),
            address: address.map(str::to_string),
        }
    }
}

impl fmt::Display for IdentityBinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.address, self.name.is_empty()) {
            (Some(addr), true) => write!(f, "{addr}"),
            (Some(addr), false) => write!(f, "{} <{addr}>", self.name),
            (None, _) => write!(f, "{}", self.name),
        }
    }
}

fn unquote(s: &str) -> &str {
    s.strip_prefix('"')
        .and_then(|s| s.strip_suffix('"'))
        .unwrap_or(s)
}

/// A primary key or a subkey from a key listing.
///
/// Only the primary key carries identities, subkeys and exported key
/// material. The fingerprint is written at most once.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Key {
    pub keyid: String,
    fingerprint: Option<String>,
    pub algorithm: PublicKeyAlgorithm,
    pub bits: u32,
    pub capabilities: String,
    /// Creation time in seconds since the Unix epoch.
    pub created: i64,
    keydata: Option<Vec<u8>>,
    uids: Vec<IdentityBinding>,
    subkeys: Vec<Key>,
}

impl Key {
    pub fn new(
        keyid: impl Into<String>,
        algorithm: PublicKeyAlgorithm,
        bits: u32,
        capabilities: impl Into<String>,
        created: i64,
    ) -> Self {
        Self {
            keyid: keyid.into(),
            fingerprint: None,
            algorithm,
            bits,
            capabilities: capabilities.into(),
            created,
            keydata: None,
            uids: Vec::new(),
            subkeys: Vec::new(),
        }
    }

    pub fn fingerprint(&self) -> Option<&str> {
        self.fingerprint.as_deref()
    }

    /// Sets the fingerprint. Returns `false` and leaves the key unchanged
    /// when a fingerprint is already present.
    pub fn set_fingerprint(&mut self, fingerprint: impl Into<String>) -> bool {
        if self.fingerprint.is_some() {
            return false;
        }
        self.fingerprint = Some(fingerprint.into());
        true
    }

    pub fn keydata(&self) -> Option<&[u8]> {
        self.keydata.as_deref()
    }

    pub(crate) fn set_keydata(&mut self, keydata: Vec<u8>) {
        self.keydata = Some(keydata);
    }

    pub fn uids(&self) -> &[IdentityBinding] {
        &self.uids
    }

    pub(crate) fn add_uid(&mut self, uid: &str) {
        self.uids.push(IdentityBinding::parse(uid));
    }

    pub fn subkeys(&self) -> &[Key] {
        &self.subkeys
    }

    pub(crate) fn add_subkey(&mut self, subkey: Key) -> usize {
        self.subkeys.push(subkey);
        self.subkeys.len() - 1
    }

    pub(crate) fn subkey_mut(&mut self, index: usize) -> Option<&mut Key> {
        self.subkeys.get_mut(index)
    }

    /// Whether any identity on this key has the same address as `uid`.
    pub fn has_uid(&self, uid: &str) -> bool {
        let Some(wanted) = IdentityBinding::parse(uid).address else {
            return false;
        };
        self.uids
            .iter()
            .any(|binding| binding.address.as_deref() == Some(wanted.as_str()))
    }

    pub fn created_date(&self) -> Option<NaiveDate> {
        DateTime::from_timestamp(self.created, 0).map(|dt| dt.date_naive())
    }

    fn write_summary(&self, f: &mut fmt::Formatter<'_>, heading: &str) -> fmt::Result {
        writeln!(f, "{heading}:")?;
        writeln!(
            f,
            "  keyid={} fpr={}",
            self.keyid,
            self.fingerprint.as_deref().unwrap_or("None")
        )?;
        writeln!(
            f,
            "  algorithm={} keylen={} flags=[{}]",
            self.algorithm, self.bits, self.capabilities
        )?;
        match self.created_date() {
            Some(date) => writeln!(f, "  CreateDate: {date}")?,
            None => writeln!(f, "  CreateDate: {}", self.created)?,
        }
        for uid in &self.uids {
            writeln!(f, "    uid: {uid}")?;
        }
        for subkey in &self.subkeys {
            subkey.write_summary(f, "SubKey")?;
        }
        Ok(())
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.write_summary(f, "OpenPGPKey")
    }
}
