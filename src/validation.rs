use std::fmt;

use crate::error::{Error, Result};
use crate::types::IdentityBinding;

/// An email-style address with exactly one `@` and non-empty parts on both
/// sides.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Address {
    address: String,
    at: usize,
}

impl Address {
    pub fn as_str(&self) -> &str {
        &self.address
    }

    pub fn local_part(&self) -> &str {
        &self.address[..self.at]
    }

    pub fn domain(&self) -> &str {
        &self.address[self.at + 1..]
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.address)
    }
}

/// Validates a user-supplied uid before it is hashed or passed to gpg.
///
/// Accepted formats:
/// - A bare address: `jane@example.com`
/// - A name with an address: `Jane Doe <jane@example.com>`
///
/// The extracted address must contain exactly one `@`, must not start with
/// `-` (gpg would read it as an option) and must not contain whitespace or
/// control characters.
pub fn validate_uid(uid: &str) -> Result<Address> {
    let invalid = |reason: &str| Error::InvalidUid {
        uid: uid.to_string(),
        reason: reason.to_string(),
    };

    let address = IdentityBinding::parse(uid)
        .address
        .ok_or_else(|| invalid("no email address found"))?;

    if address.starts_with('-') {
        return Err(invalid("address must not start with '-'"));
    }

    if address
        .chars()
        .any(|c| c.is_whitespace() || c.is_control())
    {
        return Err(invalid(
            "address must not contain whitespace or control characters",
        ));
    }

    let Some(at) = address.find('@') else {
        return Err(invalid("address must contain '@'"));
    };
    if address[at + 1..].contains('@') {
        return Err(invalid("address must contain exactly one '@'"));
    }
    if at == 0 {
        return Err(invalid("address has an empty local part"));
    }
    if at + 1 == address.len() {
        return Err(invalid("address has an empty domain"));
    }

    Ok(Address { address, at })
}
