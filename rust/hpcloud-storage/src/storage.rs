//! The authenticated storage client.

use std::sync::{Arc, OnceLock};

use tracing::{debug, info, warn};

use crate::StorageError;
use crate::cdn::{Cdn, CdnConnector, CdnOptions};
use crate::credentials::{CredentialResolver, Credentials, IdentityService};
use crate::options::StorageOptions;
use crate::service::StorageService;
use crate::session::Session;
use crate::temp_url::TempUrlSigner;
use crate::transport::{
    CONTENT_TYPE, HeaderMap, HeaderName, HeaderValue, HttpTransport, JSON_CONTENT_TYPE, Request,
    Response, StatusCode, Transport, TransportError,
};

/// Request header carrying the bearer token, `X-Auth-Token`.
pub const AUTH_TOKEN_HEADER: &str = "x-auth-token";

/// Client for one object storage account.
///
/// Credentials are resolved once by [`Storage::connect`] and never refreshed;
/// re-authenticating means building a new client. The client adds no locking
/// of its own, so sharing it between concurrent callers relies on the
/// transport being safe for that.
///
/// # Examples
///
/// ```no_run
/// use hpcloud_storage::{Storage, StorageOptions, StorageService};
/// use hpcloud_storage::credentials::IdentityService;
/// use hpcloud_storage::transport::{Method, Request};
///
/// # async fn example(identity: impl IdentityService) -> Result<(), Box<dyn std::error::Error>> {
/// let options = StorageOptions::new("secret", "account", "tenant", "region-a.geo-1")
///     .with_auth_uri("https://identity.example.com/v2.0/");
///
/// let storage = Storage::connect(options, identity).await?;
///
/// // List a container, decoding the JSON listing
/// let listing = storage
///     .request(Request::new(Method::GET, "photos").with_query("format", "json"), true)
///     .await?;
/// println!("{:?}", listing.body.as_json());
///
/// // Hand out a download link valid for an hour
/// let url = storage.generate_object_temp_url(
///     Some("photos"),
///     Some("cat.jpg"),
///     Some(3600),
///     Some("GET"),
/// )?;
/// println!("{url:?}");
/// # Ok(())
/// # }
/// ```
pub struct Storage<T = HttpTransport> {
    account_id: String,
    secret_key: String,
    tenant_id: String,
    availability_zone: String,
    auth_uri: Option<String>,
    cdn_ssl: bool,
    credentials: Credentials,
    session: Session,
    signer: TempUrlSigner,
    default_headers: HeaderMap,
    transport: T,
    cdn_connector: Option<Arc<dyn CdnConnector>>,
    cdn: OnceLock<Arc<dyn Cdn>>,
}

impl Storage<HttpTransport> {
    /// Authenticate through `identity` and connect to the resolved endpoint.
    ///
    /// # Errors
    ///
    /// Fails with [`StorageError::Configuration`] or
    /// [`StorageError::Authentication`] when no usable credentials can be
    /// resolved; no client is produced in that case.
    pub async fn connect<I: IdentityService>(
        options: StorageOptions,
        identity: I,
    ) -> Result<Self, StorageError> {
        let credentials = CredentialResolver::new(identity).resolve(&options).await?;
        let session = Session::new(
            credentials.endpoint_url(),
            options.persistent,
            options.connection_options.clone(),
        )?;
        let transport = HttpTransport::new(
            &session.endpoint().origin(),
            session.persistent(),
            session.connection_options().clone(),
            options.user_agent.clone(),
        )?;

        Self::from_parts(&options, credentials, session, transport)
    }
}

impl<T: Transport> Storage<T> {
    /// Build a client from already resolved credentials and a transport.
    ///
    /// The transport must send requests to the origin of the credentials'
    /// storage endpoint.
    pub fn with_transport(
        options: &StorageOptions,
        credentials: Credentials,
        transport: T,
    ) -> Result<Self, StorageError> {
        let session = Session::new(
            credentials.endpoint_url(),
            options.persistent,
            options.connection_options.clone(),
        )?;
        Self::from_parts(options, credentials, session, transport)
    }

    fn from_parts(
        options: &StorageOptions,
        credentials: Credentials,
        session: Session,
        transport: T,
    ) -> Result<Self, StorageError> {
        let required = options.validate()?;
        let signer = TempUrlSigner::new(
            session.endpoint().clone(),
            required.secret_key,
            required.tenant_id,
            required.account_id,
        );
        let default_headers = default_headers(credentials.auth_token())?;

        Ok(Self {
            account_id: required.account_id.to_string(),
            secret_key: required.secret_key.to_string(),
            tenant_id: required.tenant_id.to_string(),
            availability_zone: required.availability_zone.to_string(),
            auth_uri: options.auth_uri.clone(),
            cdn_ssl: options.cdn_ssl,
            credentials,
            session,
            signer,
            default_headers,
            transport,
            cdn_connector: None,
            cdn: OnceLock::new(),
        })
    }

    /// Use `connector` to build the CDN handle on demand.
    pub fn with_cdn_connector(mut self, connector: Arc<dyn CdnConnector>) -> Self {
        self.cdn_connector = Some(connector);
        self.cdn = OnceLock::new();
        self
    }

    /// Send an authenticated request.
    ///
    /// `request.path` is relative to the storage endpoint path. The
    /// `Content-Type: application/json` and `X-Auth-Token` headers are set
    /// first and the request's own headers override them. When `parse_json`
    /// is set and the response is a non-empty JSON body, the body is decoded.
    ///
    /// # Errors
    ///
    /// - [`StorageError::NotFound`] for a 404, carrying the response.
    /// - [`StorageError::Transport`] for any other transport failure,
    ///   unmodified.
    /// - [`StorageError::Decode`] when a JSON body does not parse.
    pub async fn request(
        &self,
        request: Request,
        parse_json: bool,
    ) -> Result<Response, StorageError> {
        let path = self.session.path_for(&request.path);
        let mut headers = self.default_headers.clone();
        headers.extend(request.headers);

        let request = Request {
            path: path.clone(),
            headers,
            ..request
        };

        debug!(method = %request.method, path = %path, "Dispatching storage request");

        let mut response = match self.transport.send(request).await {
            Ok(response) => response,
            Err(TransportError::Status { response })
                if response.status == StatusCode::NOT_FOUND =>
            {
                warn!(path = %path, "Storage resource not found");
                return Err(StorageError::NotFound { response });
            }
            Err(error) => return Err(error.into()),
        };

        debug!(path = %path, status = %response.status, "Storage request completed");

        if parse_json && !response.body.is_empty() && response.is_json() {
            response.body = std::mem::take(&mut response.body).into_json()?;
        }

        Ok(response)
    }

    /// Drop and recreate the underlying connection.
    ///
    /// Only ever called explicitly, to recover a stalled persistent
    /// connection.
    pub fn reload(&mut self) -> Result<(), StorageError> {
        info!(origin = %self.session.endpoint().origin(), "Reloading storage connection");
        self.transport.reset()?;
        Ok(())
    }

    /// The CDN handle, when a CDN endpoint was resolved, a connector is set
    /// and the CDN reports itself enabled.
    ///
    /// The handle is built once and reused.
    pub fn cdn(&self) -> Result<Option<Arc<dyn Cdn>>, StorageError> {
        let (Some(connector), Some(cdn_uri)) =
            (&self.cdn_connector, self.credentials.cdn_endpoint_url())
        else {
            return Ok(None);
        };

        let cdn = match self.cdn.get() {
            Some(cdn) => cdn.clone(),
            None => {
                let cdn = connector.connect(CdnOptions {
                    account_id: self.account_id.clone(),
                    secret_key: self.secret_key.clone(),
                    auth_uri: self.auth_uri.clone(),
                    cdn_uri: cdn_uri.to_string(),
                    tenant_id: self.tenant_id.clone(),
                    availability_zone: self.availability_zone.clone(),
                    connection_options: self.session.connection_options().clone(),
                })?;
                self.cdn.get_or_init(|| cdn).clone()
            }
        };

        Ok(cdn.enabled().then_some(cdn))
    }

    /// Whether SSL CDN URLs are preferred.
    pub fn cdn_ssl(&self) -> bool {
        self.cdn_ssl
    }

    /// The resolved credentials.
    pub fn credentials(&self) -> &Credentials {
        &self.credentials
    }

    /// The connection target.
    pub fn session(&self) -> &Session {
        &self.session
    }

    /// The underlying transport.
    pub fn transport(&self) -> &T {
        &self.transport
    }
}

impl<T> StorageService for Storage<T> {
    fn signer(&self) -> &TempUrlSigner {
        &self.signer
    }
}

impl<T> std::fmt::Debug for Storage<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Storage")
            .field("account_id", &self.account_id)
            .field("tenant_id", &self.tenant_id)
            .field("availability_zone", &self.availability_zone)
            .field("session", &self.session)
            .field("credentials", &self.credentials)
            .finish_non_exhaustive()
    }
}

fn default_headers(auth_token: &str) -> Result<HeaderMap, StorageError> {
    let mut token = HeaderValue::from_str(auth_token)
        .map_err(|_| StorageError::authentication("auth token is not a valid header value"))?;
    token.set_sensitive(true);

    let mut headers = HeaderMap::with_capacity(2);
    headers.insert(CONTENT_TYPE, HeaderValue::from_static(JSON_CONTENT_TYPE));
    headers.insert(HeaderName::from_static(AUTH_TOKEN_HEADER), token);
    Ok(headers)
}
