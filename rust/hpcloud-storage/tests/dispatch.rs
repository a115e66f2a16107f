//! Requests dispatched through the real HTTP transport against a local server.

use async_trait::async_trait;
use axum::Router;
use axum::http::{HeaderMap, Method as HttpMethod, StatusCode as HttpStatus, Uri, header};
use axum::response::{IntoResponse, Response as HttpResponse};
use hpcloud_storage::credentials::{AuthRequest, Identity, IdentityService};
use hpcloud_storage::error::BoxError;
use hpcloud_storage::transport::{
    CONTENT_TYPE, HeaderName, HeaderValue, Method, Request, StatusCode, TransportError,
};
use hpcloud_storage::{AuthVersion, Storage, StorageError, StorageOptions, StorageService};
use pretty_assertions::assert_eq;
use serde_json::json;
use testresult::TestResult;
use tokio::net::TcpListener;

const TOKEN: &str = "token-abc";

/// Serves a fixed set of paths under `/v1/12345`.
async fn handle(method: HttpMethod, uri: Uri, headers: HeaderMap) -> HttpResponse {
    let Some(path) = uri.path().strip_prefix("/v1/12345/") else {
        return HttpStatus::NOT_FOUND.into_response();
    };

    if headers.get("x-auth-token").and_then(|v| v.to_str().ok()) != Some(TOKEN) {
        return HttpStatus::UNAUTHORIZED.into_response();
    }

    match path {
        "photos" => (
            [(header::CONTENT_TYPE, "application/json; charset=utf-8")],
            r#"[{"name":"cat.jpg","bytes":12},{"name":"dog.jpg","bytes":34}]"#,
        )
            .into_response(),
        "photos/notes.txt" => (
            [(header::CONTENT_TYPE, "text/plain")],
            r#"{"not":"decoded"}"#,
        )
            .into_response(),
        "echo" => {
            let header = |name: &str| {
                headers
                    .get(name)
                    .and_then(|value| value.to_str().ok())
                    .map(str::to_string)
            };
            axum::Json(json!({
                "method": method.as_str(),
                "query": uri.query(),
                "content_type": header("content-type"),
                "meta": header("x-object-meta-owner"),
            }))
            .into_response()
        }
        "broken" => (HttpStatus::INTERNAL_SERVER_ERROR, "boom").into_response(),
        _ => (
            HttpStatus::NOT_FOUND,
            [(header::CONTENT_TYPE, "text/html")],
            "<h1>Not Found</h1>",
        )
            .into_response(),
    }
}

async fn start_server() -> String {
    let app = Router::new().fallback(handle);

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    format!("http://{addr}")
}

/// Identity service pointing every client at the local server.
struct LocalIdentity {
    base_url: String,
}

#[async_trait]
impl IdentityService for LocalIdentity {
    async fn authenticate_v1(&self, _request: &AuthRequest<'_>) -> Result<Identity, BoxError> {
        Ok(Identity {
            auth_token: Some(TOKEN.into()),
            ..Default::default()
        })
    }

    async fn authenticate_v2(&self, request: &AuthRequest<'_>) -> Result<Identity, BoxError> {
        Ok(Identity {
            endpoint_url: Some(format!("{}/v1/{}", self.base_url, request.required.tenant_id)),
            cdn_endpoint_url: None,
            auth_token: Some(TOKEN.into()),
        })
    }
}

fn options() -> StorageOptions {
    StorageOptions::new("secret", "account", "12345", "az-1")
}

async fn connect() -> Result<Storage, StorageError> {
    let base_url = start_server().await;
    Storage::connect(options(), LocalIdentity { base_url }).await
}

#[test_log::test(tokio::test)]
async fn it_decodes_json_listings() -> TestResult {
    let storage = connect().await?;

    let response = storage
        .request(Request::new(Method::GET, "photos"), true)
        .await?;

    assert_eq!(response.status, StatusCode::OK);
    let listing = response.body.as_json().expect("decoded listing");
    assert_eq!(listing[1]["name"], "dog.jpg");
    assert_eq!(listing[1]["bytes"], 34);
    Ok(())
}

#[test_log::test(tokio::test)]
async fn it_returns_other_bodies_unchanged() -> TestResult {
    let storage = connect().await?;

    let response = storage
        .request(Request::new(Method::GET, "photos/notes.txt"), true)
        .await?;

    assert_eq!(
        response.body.as_bytes().map(|bytes| &bytes[..]),
        Some(&br#"{"not":"decoded"}"#[..])
    );
    Ok(())
}

#[test_log::test(tokio::test)]
async fn it_maps_missing_resources_to_not_found() -> TestResult {
    let storage = connect().await?;

    let error = storage
        .request(Request::new(Method::GET, "photos/missing.jpg"), true)
        .await
        .unwrap_err();

    assert!(error.is_not_found());
    let StorageError::NotFound { response } = error else {
        unreachable!()
    };
    assert_eq!(response.status, StatusCode::NOT_FOUND);
    assert_eq!(response.header("content-type"), Some("text/html"));
    assert_eq!(
        response.body.as_bytes().map(|bytes| &bytes[..]),
        Some(&b"<h1>Not Found</h1>"[..])
    );
    Ok(())
}

#[test_log::test(tokio::test)]
async fn it_passes_server_errors_through() -> TestResult {
    let storage = connect().await?;

    let error = storage
        .request(Request::new(Method::GET, "broken"), true)
        .await
        .unwrap_err();

    match error {
        StorageError::Transport(error) => {
            assert_eq!(error.status(), Some(StatusCode::INTERNAL_SERVER_ERROR));
        }
        other => panic!("expected a transport error, got {other:?}"),
    }
    Ok(())
}

#[test_log::test(tokio::test)]
async fn it_layers_caller_headers_over_defaults() -> TestResult {
    let storage = connect().await?;

    let response = storage
        .request(Request::new(Method::POST, "echo").with_query("format", "json"), true)
        .await?;
    let echo = response.body.as_json().expect("decoded echo");
    assert_eq!(echo["method"], "POST");
    assert_eq!(echo["query"], "format=json");
    assert_eq!(echo["content_type"], "application/json");
    assert_eq!(echo["meta"], serde_json::Value::Null);

    let request = Request::new(Method::PUT, "echo")
        .with_header(CONTENT_TYPE, HeaderValue::from_static("image/jpeg"))
        .with_header(
            HeaderName::from_static("x-object-meta-owner"),
            HeaderValue::from_static("alice"),
        );
    let response = storage.request(request, true).await?;
    let echo = response.body.as_json().expect("decoded echo");
    assert_eq!(echo["content_type"], "image/jpeg");
    assert_eq!(echo["meta"], "alice");
    Ok(())
}

#[test_log::test(tokio::test)]
async fn it_keeps_working_after_reload() -> TestResult {
    let mut storage = connect().await?;
    storage
        .request(Request::new(Method::HEAD, "photos"), false)
        .await?;

    storage.reload()?;

    let response = storage
        .request(Request::new(Method::GET, "photos"), true)
        .await?;
    assert!(response.body.as_json().is_some());
    Ok(())
}

#[test_log::test(tokio::test)]
async fn it_connects_with_legacy_authentication() -> TestResult {
    let base_url = start_server().await;
    let options = options()
        .with_auth_version(AuthVersion::V1)
        .with_auth_uri(format!("{base_url}/v1/12345"))
        .with_persistent(true);

    let storage = Storage::connect(
        options,
        LocalIdentity {
            base_url: "http://unused.invalid".into(),
        },
    )
    .await?;

    assert_eq!(
        storage.credentials().endpoint_url(),
        format!("{base_url}/v1/12345")
    );
    assert!(storage.cdn()?.is_none());
    storage
        .request(Request::new(Method::GET, "photos"), true)
        .await?;
    Ok(())
}

#[test_log::test(tokio::test)]
async fn it_signs_urls_for_the_resolved_endpoint() -> TestResult {
    let base_url = start_server().await;
    let storage = Storage::connect(
        options(),
        LocalIdentity {
            base_url: base_url.clone(),
        },
    )
    .await?;

    let url = storage
        .generate_object_temp_url(Some("photos"), Some("cat.jpg"), Some(300), Some("GET"))?
        .expect("all inputs present");

    let prefix = format!("{base_url}/v1/12345/photos/cat.jpg?temp_url_sig=12345%3Aaccount%3A");
    assert!(url.starts_with(&prefix));
    assert!(url.contains("&temp_url_expires="));
    Ok(())
}

#[test_log::test(tokio::test)]
async fn it_refuses_paths_that_would_be_rewritten() -> TestResult {
    let storage = connect().await?;

    let error = storage
        .request(Request::new(Method::GET, "photos/../broken"), true)
        .await
        .unwrap_err();

    assert!(
        matches!(
            error,
            StorageError::Transport(TransportError::InvalidPath(ref path))
                if path.starts_with("/v1/12345/photos/../broken")
        ),
        "got {error:?}"
    );
    Ok(())
}

#[test_log::test(tokio::test)]
async fn it_passes_connection_failures_through() -> TestResult {
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let base_url = format!("http://{}", listener.local_addr()?);
    drop(listener);

    let storage = Storage::connect(options(), LocalIdentity { base_url }).await?;

    let error = storage
        .request(Request::new(Method::GET, "photos"), true)
        .await
        .unwrap_err();

    match error {
        StorageError::Transport(TransportError::Http(error)) => assert!(error.is_connect()),
        other => panic!("expected a connection failure, got {other:?}"),
    }
    Ok(())
}
