//! In-memory stand-in for the storage client.
//!
//! [`MockStorage`] shares ACL translation and temp URL signing with the real
//! client through [`StorageService`], and keeps per-account state in a
//! [`MockStore`]. The store is an explicit handle: tests create one, hand it
//! to every mock client that should see the same state, and reset it when
//! they are done.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::debug;

use crate::StorageError;
use crate::acl::{self, AclHeaders, AclPair};
use crate::options::StorageOptions;
use crate::service::StorageService;
use crate::session::Endpoint;
use crate::temp_url::TempUrlSigner;

/// Host of the endpoint mock clients generate URLs for.
pub const MOCK_STORAGE_HOST: &str = "objects.mock.hpcloud.local";

/// ACLs recorded for an account.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Acls {
    /// Container ACLs by container name
    pub container: BTreeMap<String, AclPair>,
    /// Object ACLs by `{container}/{object}`
    pub object: BTreeMap<String, AclPair>,
}

/// A container known to the mock.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MockContainer {
    /// Raw ACL header values the container was created with
    pub headers: Option<AclHeaders>,
}

/// Everything the mock remembers about one account.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AccountData {
    /// Recorded ACLs
    pub acls: Acls,
    /// Containers by name
    pub containers: BTreeMap<String, MockContainer>,
}

/// Shared state of all mock clients, keyed by account id.
///
/// Cloning yields another handle to the same state.
#[derive(Debug, Clone, Default)]
pub struct MockStore {
    accounts: Arc<Mutex<HashMap<String, AccountData>>>,
}

impl MockStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Forget every account.
    pub fn reset(&self) {
        self.accounts.lock().clear();
    }

    /// Snapshot of an account, empty if it was never touched.
    pub fn account(&self, account_id: &str) -> AccountData {
        self.accounts
            .lock()
            .get(account_id)
            .cloned()
            .unwrap_or_default()
    }

    /// Whether any state is recorded for `account_id`.
    pub fn contains(&self, account_id: &str) -> bool {
        self.accounts.lock().contains_key(account_id)
    }

    fn with_account<R>(&self, account_id: &str, f: impl FnOnce(&mut AccountData) -> R) -> R {
        let mut accounts = self.accounts.lock();
        f(accounts.entry(account_id.to_string()).or_default())
    }

    fn remove(&self, account_id: &str) -> Option<AccountData> {
        self.accounts.lock().remove(account_id)
    }
}

/// Mock storage client for one account.
#[derive(Debug, Clone)]
pub struct MockStorage {
    account_id: String,
    signer: TempUrlSigner,
    store: MockStore,
}

impl MockStorage {
    /// Create a mock client backed by `store`.
    ///
    /// URLs are generated for `https://objects.mock.hpcloud.local/v1/{tenant_id}`.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Configuration`] when required options are
    /// missing, like the real client.
    pub fn new(options: &StorageOptions, store: MockStore) -> Result<Self, StorageError> {
        let required = options.validate()?;
        let endpoint = Endpoint::parse(&format!(
            "https://{MOCK_STORAGE_HOST}/v1/{}",
            required.tenant_id
        ))?;

        Ok(Self {
            account_id: required.account_id.to_string(),
            signer: TempUrlSigner::new(
                endpoint,
                required.secret_key,
                required.tenant_id,
                required.account_id,
            ),
            store,
        })
    }

    /// Generate URLs for `endpoint_url` instead of the mock host.
    pub fn with_endpoint(mut self, endpoint_url: &str) -> Result<Self, StorageError> {
        self.signer = self.signer.with_endpoint(Endpoint::parse(endpoint_url)?);
        Ok(self)
    }

    /// The account this client acts for.
    pub fn account_id(&self) -> &str {
        &self.account_id
    }

    /// The store backing this client.
    pub fn store(&self) -> &MockStore {
        &self.store
    }

    /// Snapshot of this account's data.
    pub fn data(&self) -> AccountData {
        self.store.account(&self.account_id)
    }

    /// Run `f` with mutable access to this account's data.
    pub fn with_data<R>(&self, f: impl FnOnce(&mut AccountData) -> R) -> R {
        self.store.with_account(&self.account_id, f)
    }

    /// Forget everything recorded for this account.
    pub fn reset_data(&self) {
        if self.store.remove(&self.account_id).is_some() {
            debug!(account_id = %self.account_id, "Reset mock account data");
        }
    }

    /// Create or replace a container, recording its ACL headers.
    ///
    /// The headers are decoded the same way they would be read back from the
    /// service.
    pub fn put_container(&self, name: &str, headers: Option<&AclHeaders>) {
        self.with_data(|data| {
            match headers {
                Some(headers) => {
                    let acl = acl::header_to_perm_acl(
                        Some(headers.read.as_str()),
                        Some(headers.write.as_str()),
                    );
                    data.acls.container.insert(name.to_string(), acl);
                }
                None => {
                    data.acls.container.remove(name);
                }
            }
            data.containers.insert(
                name.to_string(),
                MockContainer {
                    headers: headers.cloned(),
                },
            );
        });
    }

    /// The decoded ACL of a container.
    ///
    /// Returns `None` for an unknown container, and an empty pair for a
    /// container created without ACL headers.
    pub fn container_acl(&self, name: &str) -> Option<AclPair> {
        let data = self.data();
        if !data.containers.contains_key(name) {
            return None;
        }
        Some(data.acls.container.get(name).cloned().unwrap_or_default())
    }

    /// Delete a container and its ACLs. Returns whether it existed.
    pub fn delete_container(&self, name: &str) -> bool {
        self.with_data(|data| {
            data.acls.container.remove(name);
            let prefix = format!("{name}/");
            data.acls.object.retain(|key, _| !key.starts_with(&prefix));
            data.containers.remove(name).is_some()
        })
    }
}

impl StorageService for MockStorage {
    fn signer(&self) -> &TempUrlSigner {
        &self.signer
    }
}
