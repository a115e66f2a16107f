//! Behaviour shared by the real client and the mock.

use crate::StorageError;
use crate::acl::{self, AclHeaders, AclPair};
use crate::temp_url::{TempUrlRequest, TempUrlSigner, escape};

/// URL building, ACL translation and temp URL signing for one account.
///
/// Implemented by [`Storage`](crate::Storage) and
/// [`MockStorage`](crate::mock::MockStorage) so both behave identically.
pub trait StorageService {
    /// The signer bound to this account's endpoint and secret.
    fn signer(&self) -> &TempUrlSigner;

    /// `{scheme}://{host}:{port}{path}` of the storage endpoint.
    fn url(&self) -> String {
        self.signer().endpoint().url()
    }

    /// Public URL of a container, or of an object when `object` is given.
    ///
    /// Returns `None` without a container.
    fn public_url(&self, container: Option<&str>, object: Option<&str>) -> Option<String> {
        let container = format!("{}/{}", self.url(), escape(container?));
        Some(match object {
            Some(object) => format!("{container}/{}", escape(object)),
            None => container,
        })
    }

    /// See [`acl::perm_to_acl`].
    fn perm_to_acl<U: AsRef<str>>(
        &self,
        perm: &str,
        users: &[U],
    ) -> Result<(Vec<String>, Vec<String>), StorageError> {
        acl::perm_to_acl(perm, users)
    }

    /// See [`acl::perm_acl_to_header`].
    fn perm_acl_to_header(&self, read: Option<&[String]>, write: Option<&[String]>) -> AclHeaders {
        acl::perm_acl_to_header(read, write)
    }

    /// See [`acl::header_to_perm_acl`].
    fn header_to_perm_acl(&self, read: Option<&str>, write: Option<&str>) -> AclPair {
        acl::header_to_perm_acl(read, write)
    }

    /// Sign a temporary URL with the current time.
    ///
    /// Returns `Ok(None)` when any input is missing.
    fn generate_object_temp_url(
        &self,
        container: Option<&str>,
        object: Option<&str>,
        expires_secs: Option<u64>,
        method: Option<&str>,
    ) -> Result<Option<String>, StorageError> {
        self.signer().sign(&TempUrlRequest {
            container,
            object,
            expires_secs,
            method,
            time: None,
        })
    }
}
