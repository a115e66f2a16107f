//! Translation between permission codes and container ACL headers.
//!
//! Permissions are expressed with six short codes. The public ones (`pr`,
//! `pw`, `prw`) grant anonymous access, the account ones (`r`, `w`, `rw`)
//! grant access to a list of users. They are rendered into the
//! `X-Container-Read` and `X-Container-Write` headers.
//!
//! Encoding always emits both headers, with an empty string for an absent
//! list. Decoding keeps an absent header absent. The two directions are not
//! symmetric for absent input and must stay that way for wire compatibility.

use std::fmt;
use std::str::FromStr;

use reqwest::header::{HeaderMap, HeaderName, HeaderValue};

use crate::StorageError;

/// Header carrying the read ACL of a container.
pub const READ_ACL_HEADER: &str = "X-Container-Read";

/// Header carrying the write ACL of a container.
pub const WRITE_ACL_HEADER: &str = "X-Container-Write";

/// Tenant placeholder used when granting access to account users.
///
/// Every user entry is rendered as `{TENANT_WILDCARD}:{user}`.
pub const TENANT_WILDCARD: &str = "*";

/// Read ACL granting anonymous reads and listings.
pub const PUBLIC_READ_ACL: [&str; 2] = [".r:*", ".rlistings"];

/// Write ACL granting anonymous writes.
pub const PUBLIC_WRITE_ACL: [&str; 1] = ["*"];

/// One of the six permission codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Permission {
    /// `pr`
    PublicRead,
    /// `pw`
    PublicWrite,
    /// `prw`
    PublicReadWrite,
    /// `r`
    Read,
    /// `w`
    Write,
    /// `rw`
    ReadWrite,
}

impl Permission {
    /// All codes, public ones first.
    pub const ALL: [Permission; 6] = [
        Self::PublicRead,
        Self::PublicWrite,
        Self::PublicReadWrite,
        Self::Read,
        Self::Write,
        Self::ReadWrite,
    ];

    /// The wire code of this permission.
    pub fn code(&self) -> &'static str {
        match self {
            Self::PublicRead => "pr",
            Self::PublicWrite => "pw",
            Self::PublicReadWrite => "prw",
            Self::Read => "r",
            Self::Write => "w",
            Self::ReadWrite => "rw",
        }
    }

    /// Whether this permission grants anonymous access.
    pub fn is_public(&self) -> bool {
        matches!(
            self,
            Self::PublicRead | Self::PublicWrite | Self::PublicReadWrite
        )
    }

    /// Whether this permission grants read access.
    pub fn reads(&self) -> bool {
        self.code().contains('r')
    }

    /// Whether this permission grants write access.
    pub fn writes(&self) -> bool {
        self.code().contains('w')
    }

    /// Render this permission as `(read_acl, write_acl)`.
    ///
    /// Public permissions ignore `users`. Account permissions with no users
    /// produce two empty lists.
    pub fn to_acl<U: AsRef<str>>(&self, users: &[U]) -> (Vec<String>, Vec<String>) {
        if self.is_public() {
            let read = if self.reads() {
                owned(&PUBLIC_READ_ACL)
            } else {
                Vec::new()
            };
            let write = if self.writes() {
                owned(&PUBLIC_WRITE_ACL)
            } else {
                Vec::new()
            };
            return (read, write);
        }

        let entries: Vec<String> = users
            .iter()
            .map(|user| format!("{}:{}", TENANT_WILDCARD, user.as_ref()))
            .collect();

        let read = if self.reads() {
            entries.clone()
        } else {
            Vec::new()
        };
        let write = if self.writes() { entries } else { Vec::new() };

        (read, write)
    }
}

impl fmt::Display for Permission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for Permission {
    type Err = StorageError;

    fn from_str(code: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|permission| permission.code() == code)
            .ok_or_else(|| {
                let codes: Vec<&str> = Self::ALL.iter().map(|p| p.code()).collect();
                StorageError::InvalidArgument(format!(
                    "permission must be one of [{}]",
                    codes.join(", ")
                ))
            })
    }
}

/// Read and write ACL lists as decoded from headers.
///
/// `None` means the header was not present at all.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AclPair {
    /// Entries of `X-Container-Read`
    pub read: Option<Vec<String>>,
    /// Entries of `X-Container-Write`
    pub write: Option<Vec<String>>,
}

/// Encoded values of the two ACL headers.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AclHeaders {
    /// Value for `X-Container-Read`
    pub read: String,
    /// Value for `X-Container-Write`
    pub write: String,
}

impl AclHeaders {
    /// Header name/value pairs, read first.
    pub fn iter(&self) -> impl Iterator<Item = (&'static str, &str)> {
        [
            (READ_ACL_HEADER, self.read.as_str()),
            (WRITE_ACL_HEADER, self.write.as_str()),
        ]
        .into_iter()
    }

    /// Convert into a header map suitable for a request.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::InvalidArgument`] if an entry contains bytes
    /// that are not allowed in a header value.
    pub fn to_header_map(&self) -> Result<HeaderMap, StorageError> {
        let mut headers = HeaderMap::with_capacity(2);
        for (name, value) in self.iter() {
            let value = HeaderValue::from_str(value).map_err(|error| {
                StorageError::InvalidArgument(format!("invalid {name} value: {error}"))
            })?;
            let name = HeaderName::from_bytes(name.as_bytes()).map_err(|error| {
                StorageError::InvalidArgument(format!("invalid header name {name}: {error}"))
            })?;
            headers.insert(name, value);
        }
        Ok(headers)
    }
}

/// Translate a permission code and user list into `(read_acl, write_acl)`.
///
/// # Errors
///
/// Returns [`StorageError::InvalidArgument`] when `perm` is not one of
/// `pr`, `pw`, `prw`, `r`, `w`, `rw`.
pub fn perm_to_acl<U: AsRef<str>>(
    perm: &str,
    users: &[U],
) -> Result<(Vec<String>, Vec<String>), StorageError> {
    let permission: Permission = perm.parse()?;
    Ok(permission.to_acl(users))
}

/// Render ACL lists as header values.
///
/// Both headers are always present. An absent or empty list becomes an
/// empty string, anything else is joined with commas.
pub fn perm_acl_to_header(read: Option<&[String]>, write: Option<&[String]>) -> AclHeaders {
    AclHeaders {
        read: join(read),
        write: join(write),
    }
}

/// Split ACL header values back into lists.
///
/// An absent header stays absent. Trailing empty fields are dropped, so an
/// empty header decodes to an empty list.
pub fn header_to_perm_acl(read: Option<&str>, write: Option<&str>) -> AclPair {
    AclPair {
        read: read.map(split),
        write: write.map(split),
    }
}

fn owned(entries: &[&str]) -> Vec<String> {
    entries.iter().map(|entry| entry.to_string()).collect()
}

fn join(entries: Option<&[String]>) -> String {
    entries.map(|entries| entries.join(",")).unwrap_or_default()
}

fn split(header: &str) -> Vec<String> {
    let mut entries: Vec<String> = header.split(',').map(str::to_string).collect();
    while entries.last().is_some_and(|entry| entry.is_empty()) {
        entries.pop();
    }
    entries
}
