//! Client core for HP Cloud Object Storage.
//!
//! This crate turns a set of account credentials into an authenticated
//! storage client. It covers the parts of the client with real behaviour:
//!
//! - [`credentials`] resolves options into an endpoint and token, through
//!   the v1 or v2 identity flow of an [`IdentityService`](credentials::IdentityService).
//! - [`acl`] translates permission codes into container ACL headers and back.
//! - [`temp_url`] signs time-limited object URLs with HMAC-SHA1.
//! - [`Storage`] dispatches authenticated requests, normalizes 404s into
//!   [`StorageError::NotFound`] and decodes JSON bodies.
//! - [`mock`] offers an in-memory client that shares the ACL and signing
//!   behaviour of the real one.
//!
//! The identity service wire protocol, the CDN service and the list of
//! container and object operations are left to collaborators.
//!
//! # Example
//!
//! ```no_run
//! use hpcloud_storage::{StorageOptions, StorageService};
//! use hpcloud_storage::mock::{MockStorage, MockStore};
//!
//! # fn example() -> Result<(), hpcloud_storage::StorageError> {
//! let store = MockStore::new();
//! let storage = MockStorage::new(
//!     &StorageOptions::new("secret", "account", "12345", "region-a.geo-1"),
//!     store.clone(),
//! )?;
//!
//! // Share a container with two users
//! let (read, write) = storage.perm_to_acl("rw", &["alice", "bob"])?;
//! let headers = storage.perm_acl_to_header(Some(read.as_slice()), Some(write.as_slice()));
//! assert_eq!(headers.read, "*:alice,*:bob");
//!
//! storage.put_container("shared", Some(&headers));
//! store.reset();
//! # Ok(())
//! # }
//! ```

pub mod acl;
pub mod cdn;
pub mod credentials;
pub mod error;
pub mod mock;
pub mod options;
pub mod service;
pub mod session;
pub mod temp_url;
pub mod transport;

mod storage;

pub use error::StorageError;
pub use options::{AuthVersion, ConnectionOptions, StorageOptions};
pub use service::StorageService;
pub use storage::{AUTH_TOKEN_HEADER, Storage};
