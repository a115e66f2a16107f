//! Expiring, HMAC-signed object URLs.
//!
//! A temporary URL grants access to a single object for a single method
//! without the bearer token. The signature covers
//! `"{method}\n{expires}\n{path}/{container}/{object}"` where container and
//! object are the raw names; only the returned href is percent-encoded.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use sha1::Sha1;

use crate::StorageError;
use crate::session::Endpoint;

/// Query parameter carrying the signature.
pub const SIGNATURE_QUERY_PARAM: &str = "temp_url_sig";

/// Query parameter carrying the expiry timestamp.
pub const EXPIRES_QUERY_PARAM: &str = "temp_url_expires";

/// Methods a temporary URL may be signed for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TempUrlMethod {
    /// Download the object
    Get,
    /// Upload the object
    Put,
    /// Read object metadata
    Head,
}

impl TempUrlMethod {
    /// All allowed methods.
    pub const ALL: [TempUrlMethod; 3] = [Self::Get, Self::Put, Self::Head];

    /// The HTTP method name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Put => "PUT",
            Self::Head => "HEAD",
        }
    }
}

impl fmt::Display for TempUrlMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TempUrlMethod {
    type Err = StorageError;

    fn from_str(method: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|allowed| allowed.as_str() == method)
            .ok_or_else(|| {
                let allowed: Vec<&str> = Self::ALL.iter().map(|m| m.as_str()).collect();
                StorageError::InvalidArgument(format!(
                    "Invalid method '{method}' specified. Valid methods are: {}",
                    allowed.join(", ")
                ))
            })
    }
}

/// Inputs of a temporary URL.
///
/// Every field is optional. When any of container, object, expiry or method
/// is missing no URL is produced, which is not an error.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TempUrlRequest<'a> {
    /// Container name, unescaped
    pub container: Option<&'a str>,
    /// Object name, unescaped
    pub object: Option<&'a str>,
    /// Lifetime of the URL in seconds
    pub expires_secs: Option<u64>,
    /// HTTP method name
    pub method: Option<&'a str>,
    /// Signing time, defaults to now
    pub time: Option<DateTime<Utc>>,
}

impl<'a> TempUrlRequest<'a> {
    /// A request with every input present.
    pub fn new(container: &'a str, object: &'a str, expires_secs: u64, method: &'a str) -> Self {
        Self {
            container: Some(container),
            object: Some(object),
            expires_secs: Some(expires_secs),
            method: Some(method),
            time: None,
        }
    }

    /// Sign as if the current time were `time`.
    pub fn with_time(mut self, time: DateTime<Utc>) -> Self {
        self.time = Some(time);
        self
    }
}

/// Produces temporary URLs for one storage endpoint and secret.
#[derive(Clone)]
pub struct TempUrlSigner {
    endpoint: Endpoint,
    secret_key: String,
    tenant_id: String,
    account_id: String,
}

impl TempUrlSigner {
    /// Create a signer for the given endpoint and account.
    pub fn new(
        endpoint: Endpoint,
        secret_key: impl Into<String>,
        tenant_id: impl Into<String>,
        account_id: impl Into<String>,
    ) -> Self {
        Self {
            endpoint,
            secret_key: secret_key.into(),
            tenant_id: tenant_id.into(),
            account_id: account_id.into(),
        }
    }

    /// The endpoint URLs are generated for.
    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    /// Generate URLs for `endpoint` instead, keeping the same secret.
    pub fn with_endpoint(mut self, endpoint: Endpoint) -> Self {
        self.endpoint = endpoint;
        self
    }

    /// Generate a temporary URL.
    ///
    /// Returns `Ok(None)` when any required input is missing.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::InvalidArgument`] when the method is not one of
    /// `GET`, `PUT` or `HEAD`.
    pub fn sign(&self, request: &TempUrlRequest<'_>) -> Result<Option<String>, StorageError> {
        let (Some(container), Some(object), Some(expires_secs), Some(method)) = (
            request.container,
            request.object,
            request.expires_secs,
            request.method,
        ) else {
            return Ok(None);
        };

        let method: TempUrlMethod = method.parse()?;
        let now = request.time.unwrap_or_else(current_time);
        let expires = now.timestamp().saturating_add_unsigned(expires_secs);

        let path = self.endpoint.path();
        let string_to_sign = format!("{method}\n{expires}\n{path}/{container}/{object}");
        let signature = format!(
            "{}:{}:{}",
            self.tenant_id,
            self.account_id,
            hmac_sha1_hex(self.secret_key.as_bytes(), string_to_sign.as_bytes())
        );

        let encoded_path = format!("{path}/{}/{}", escape(container), escape(object));

        Ok(Some(format!(
            "{}{encoded_path}?{SIGNATURE_QUERY_PARAM}={}&{EXPIRES_QUERY_PARAM}={expires}",
            self.endpoint.origin(),
            escape(&signature)
        )))
    }
}

impl fmt::Debug for TempUrlSigner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TempUrlSigner")
            .field("endpoint", &self.endpoint)
            .field("tenant_id", &self.tenant_id)
            .field("account_id", &self.account_id)
            .finish_non_exhaustive()
    }
}

/// Percent-encode a path component.
///
/// Bytes in `A-Z`, `a-z`, `0-9`, `_`, `.` and `-` are kept, everything
/// else becomes `%XX` with uppercase hex.
pub fn escape(value: &str) -> String {
    let mut result = String::with_capacity(value.len() * 3);
    for byte in value.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'_' | b'.' | b'-' => {
                result.push(byte as char);
            }
            _ => result.push_str(&format!("%{:02X}", byte)),
        }
    }
    result
}

/// Lowercase hex HMAC-SHA1 of `data` under `key`.
fn hmac_sha1_hex(key: &[u8], data: &[u8]) -> String {
    let mut mac = Hmac::<Sha1>::new_from_slice(key).expect("HMAC-SHA1 accepts keys of any size");
    mac.update(data);
    hex::encode(mac.finalize().into_bytes())
}

/// Get the current time as a UTC datetime.
pub fn current_time() -> DateTime<Utc> {
    Utc::now()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use pretty_assertions::assert_eq;

    const SECRET: &str = "top secret";

    fn test_signer() -> TempUrlSigner {
        let endpoint = Endpoint::parse("https://objects.example.com/v1/12345").unwrap();
        TempUrlSigner::new(endpoint, SECRET, "tenant", "account")
    }

    fn test_time() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 5, 7, 5, 48, 59).unwrap()
    }

    fn query_param<'a>(url: &'a str, name: &str) -> &'a str {
        url.split(&format!("{name}="))
            .nth(1)
            .and_then(|rest| rest.split('&').next())
            .unwrap_or("")
    }

    #[test]
    fn it_computes_hmac_sha1() {
        assert_eq!(
            hmac_sha1_hex(b"key", b"The quick brown fox jumps over the lazy dog"),
            "de7c9b85b8b78aa6bc8a7a36f70a90701c9db4d9"
        );
    }

    #[test]
    fn it_escapes_path_components() {
        assert_eq!(escape("abc-123_x.y"), "abc-123_x.y");
        assert_eq!(escape("my file.txt"), "my%20file.txt");
        assert_eq!(escape("a/b"), "a%2Fb");
        assert_eq!(escape("t:a:s"), "t%3Aa%3As");
        assert_eq!(escape("~"), "%7E");
        assert_eq!(escape("é"), "%C3%A9");
    }

    #[test]
    fn it_builds_the_url_shape() {
        let url = test_signer()
            .sign(
                &TempUrlRequest::new("photos", "cat.jpg", 3600, "GET").with_time(test_time()),
            )
            .unwrap()
            .unwrap();

        let expires = test_time().timestamp() + 3600;
        let (href, query) = url.split_once('?').unwrap();
        assert_eq!(href, "https://objects.example.com:443/v1/12345/photos/cat.jpg");
        assert!(query.starts_with("temp_url_sig=tenant%3Aaccount%3A"));
        assert!(url.ends_with(&format!("&temp_url_expires={expires}")));
        assert_eq!(query_param(&url, EXPIRES_QUERY_PARAM), expires.to_string());
    }

    #[test]
    fn it_signs_the_unescaped_path() {
        let url = test_signer()
            .sign(&TempUrlRequest::new("my photos", "a b.jpg", 60, "PUT").with_time(test_time()))
            .unwrap()
            .unwrap();

        let expires = test_time().timestamp() + 60;
        let expected = hmac_sha1_hex(
            SECRET.as_bytes(),
            format!("PUT\n{expires}\n/v1/12345/my photos/a b.jpg").as_bytes(),
        );

        assert!(url.contains("/v1/12345/my%20photos/a%20b.jpg?"));
        assert_eq!(
            query_param(&url, SIGNATURE_QUERY_PARAM),
            format!("tenant%3Aaccount%3A{expected}")
        );
    }

    #[test]
    fn it_is_deterministic_for_fixed_inputs() {
        let signer = test_signer();
        let request = TempUrlRequest::new("photos", "cat.jpg", 3600, "GET").with_time(test_time());
        assert_eq!(signer.sign(&request).unwrap(), signer.sign(&request).unwrap());
    }

    #[test]
    fn it_changes_signature_with_each_input() {
        fn signature(signer: &TempUrlSigner, request: TempUrlRequest<'_>) -> String {
            let url = signer.sign(&request.with_time(test_time())).unwrap().unwrap();
            query_param(&url, SIGNATURE_QUERY_PARAM).to_string()
        }

        let signer = test_signer();

        let base = signature(&signer, TempUrlRequest::new("photos", "cat.jpg", 60, "GET"));

        let other_container =
            signature(&signer, TempUrlRequest::new("videos", "cat.jpg", 60, "GET"));
        let other_object = signature(&signer, TempUrlRequest::new("photos", "dog.jpg", 60, "GET"));
        let other_method = signature(&signer, TempUrlRequest::new("photos", "cat.jpg", 60, "HEAD"));
        let other_secret = signature(
            &TempUrlSigner::new(signer.endpoint().clone(), "another secret", "tenant", "account"),
            TempUrlRequest::new("photos", "cat.jpg", 60, "GET"),
        );

        for other in [other_container, other_object, other_method, other_secret] {
            assert_ne!(base, other);
        }
    }

    #[test]
    fn it_rejects_methods_outside_get_put_head() {
        let signer = test_signer();
        for method in ["DELETE", "POST", "get", ""] {
            let result = signer.sign(&TempUrlRequest::new("photos", "cat.jpg", 60, method));
            assert!(
                matches!(result, Err(StorageError::InvalidArgument(_))),
                "method {method:?}"
            );
        }
    }

    #[test]
    fn it_returns_nothing_when_inputs_are_missing() {
        let signer = test_signer();
        let complete = TempUrlRequest::new("photos", "cat.jpg", 60, "GET");

        let without_object = TempUrlRequest {
            object: None,
            ..complete.clone()
        };
        let without_container = TempUrlRequest {
            container: None,
            ..complete.clone()
        };
        let without_expiry = TempUrlRequest {
            expires_secs: None,
            ..complete.clone()
        };
        let without_method = TempUrlRequest {
            method: None,
            ..complete
        };

        for request in [without_object, without_container, without_expiry, without_method] {
            assert_eq!(signer.sign(&request).unwrap(), None);
        }
    }

    #[test]
    fn it_skips_method_validation_when_inputs_are_missing() {
        let request = TempUrlRequest {
            object: None,
            ..TempUrlRequest::new("photos", "cat.jpg", 60, "DELETE")
        };
        assert_eq!(test_signer().sign(&request).unwrap(), None);
    }

    #[test]
    fn it_defaults_to_the_current_time() {
        let before = current_time().timestamp();
        let url = test_signer()
            .sign(&TempUrlRequest::new("photos", "cat.jpg", 100, "GET"))
            .unwrap()
            .unwrap();
        let after = current_time().timestamp();

        let expires: i64 = query_param(&url, EXPIRES_QUERY_PARAM).parse().unwrap();
        assert!(expires >= before + 100 && expires <= after + 100);
    }
}
