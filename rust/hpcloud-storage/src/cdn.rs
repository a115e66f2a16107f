//! Optional CDN collaborator.
//!
//! The CDN protocol is not implemented here. A client only hands a
//! [`CdnConnector`] the settings it needs and exposes the resulting handle
//! while it reports itself enabled.

use std::sync::Arc;

use crate::StorageError;
use crate::options::ConnectionOptions;

/// Settings passed to a [`CdnConnector`].
#[derive(Clone)]
pub struct CdnOptions {
    /// Account id
    pub account_id: String,
    /// Secret key
    pub secret_key: String,
    /// Identity service URI
    pub auth_uri: Option<String>,
    /// Resolved CDN endpoint
    pub cdn_uri: String,
    /// Tenant id
    pub tenant_id: String,
    /// Availability zone
    pub availability_zone: String,
    /// Connection settings
    pub connection_options: ConnectionOptions,
}

impl std::fmt::Debug for CdnOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CdnOptions")
            .field("account_id", &self.account_id)
            .field("auth_uri", &self.auth_uri)
            .field("cdn_uri", &self.cdn_uri)
            .field("tenant_id", &self.tenant_id)
            .field("availability_zone", &self.availability_zone)
            .finish_non_exhaustive()
    }
}

/// A connected CDN service.
pub trait Cdn: Send + Sync + std::fmt::Debug {
    /// Whether CDN is enabled for the account.
    fn enabled(&self) -> bool;
}

/// Builds [`Cdn`] handles.
pub trait CdnConnector: Send + Sync {
    /// Connect to the CDN described by `options`.
    fn connect(&self, options: CdnOptions) -> Result<Arc<dyn Cdn>, StorageError>;
}
