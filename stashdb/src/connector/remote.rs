use super::Connector;
use crate::address::{self, split_query};
use crate::config::{RemoteConfig, StashConfig};
use crate::error::{ErrorCode, Result, StashDbError};
use crate::query::{self, ListParams};
use crate::response::Response;
use crate::seed::SeedDescriptor;
use async_trait::async_trait;
use reqwest::{Method, StatusCode};
use serde_json::Value;
use std::time::Duration;
use url::Url;

/// Forwards connector calls to an HTTP backend, one round trip per call.
///
/// Answers use the same envelope as [`LocalConnector`](super::LocalConnector).
/// When the seed enables `useOnNoContent`, an empty read is answered from
/// the seed instead.
pub struct RemoteConnector {
    client: reqwest::Client,
    base_url: Url,
    seed: Option<SeedDescriptor>,
}

/// What a single HTTP exchange produced.
#[derive(Debug, PartialEq)]
pub(crate) enum Reply {
    /// 204, an empty body, `null`, or an empty list.
    NoContent,
    Envelope(Response<Value>),
}

impl RemoteConnector {
    pub fn new(config: &RemoteConfig) -> Result<Self> {
        let mut base_url = Url::parse(&config.base_url).map_err(|e| {
            StashDbError::Config(format!("Invalid base_url '{}': {e}", config.base_url))
        })?;
        // Url::join drops the last segment of a base without a trailing slash
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }

        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()?;

        Ok(RemoteConnector {
            client,
            base_url,
            seed: None,
        })
    }

    /// Connector for the `remote` section of a config, carrying its seed.
    pub fn from_config(config: &StashConfig) -> Result<Self> {
        let remote = config
            .remote
            .as_ref()
            .ok_or_else(|| StashDbError::Config("No 'remote' section in config".into()))?;
        let connector = Self::new(remote)?;
        Ok(match &config.seed {
            Some(seed) => connector.with_seed(seed.clone()),
            None => connector,
        })
    }

    pub fn with_seed(mut self, seed: SeedDescriptor) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Absolute URL for an endpoint path. A query already on the path is
    /// kept, list params are appended after it.
    fn endpoint(&self, path: &str, params: Option<&ListParams>) -> Result<Url> {
        let (path, inline_query) = split_query(path);
        let mut url = self
            .base_url
            .join(path.trim_start_matches('/'))
            .map_err(|e| StashDbError::InvalidRequest(format!("Bad endpoint '{path}': {e}")))?;

        let mut pairs: Vec<(String, String)> = inline_query
            .map(|q| {
                url::form_urlencoded::parse(q.as_bytes())
                    .into_owned()
                    .collect()
            })
            .unwrap_or_default();
        if let Some(params) = params {
            pairs.extend(params.to_query_pairs());
        }
        if !pairs.is_empty() {
            url.query_pairs_mut().extend_pairs(pairs);
        }
        Ok(url)
    }

    async fn send(
        &self,
        method: Method,
        path: &str,
        params: Option<&ListParams>,
        body: Option<Value>,
    ) -> Result<Reply> {
        let url = self.endpoint(path, params)?;
        log::debug!("{method} {url}");

        let mut request = self.client.request(method, url);
        if let Some(body) = body {
            request = request.json(&body);
        }
        let response = request.send().await?;
        let status = response.status();
        let text = response.text().await?;
        Ok(interpret(status, &text))
    }

    async fn write(&self, method: Method, path: &str, body: Option<Value>) -> Response<Value> {
        match self.send(method.clone(), path, None, body).await {
            Ok(Reply::Envelope(resp)) => resp,
            Ok(Reply::NoContent) => Response::ok(Value::Null),
            Err(e) => {
                log::warn!("{method} {path} failed: {e}");
                e.into()
            }
        }
    }
}

#[async_trait]
impl Connector for RemoteConnector {
    async fn get(&self, path: &str, params: &ListParams) -> Response<Value> {
        let reply = match self.send(Method::GET, path, Some(params), None).await {
            Ok(reply) => reply,
            Err(e) => {
                log::warn!("GET {path} failed: {e}");
                return e.into();
            }
        };
        match reply {
            Reply::Envelope(resp) => resp,
            Reply::NoContent => {
                let address = address::resolve(path);
                if let Some(fallback) = self
                    .seed
                    .as_ref()
                    .and_then(|seed| seed.fallback(&address, params))
                {
                    log::info!("No content for {path}, serving seed data");
                    return fallback;
                }
                match &address.id {
                    Some(id) => StashDbError::NotFound {
                        collection: address.collection.clone(),
                        id: id.clone(),
                    }
                    .into(),
                    None => {
                        let (_, meta) = query::paginate(Vec::new(), params);
                        Response::page(Value::Array(Vec::new()), meta)
                    }
                }
            }
        }
    }

    async fn create(&self, path: &str, payload: Value) -> Response<Value> {
        self.write(Method::POST, path, Some(payload)).await
    }

    async fn update(&self, path: &str, payload: Value) -> Response<Value> {
        self.write(Method::PUT, path, Some(payload)).await
    }

    async fn patch(&self, path: &str, payload: Value) -> Response<Value> {
        self.write(Method::PATCH, path, Some(payload)).await
    }

    async fn delete(&self, path: &str) -> Response<Value> {
        self.write(Method::DELETE, path, None).await
    }
}

/// Classify an HTTP reply. Bodies with a `success` field are taken as
/// envelopes, any other JSON is wrapped as `data`.
pub(crate) fn interpret(status: StatusCode, body: &str) -> Reply {
    let ok = status.is_success();
    if status == StatusCode::NO_CONTENT || body.trim().is_empty() {
        return if ok {
            Reply::NoContent
        } else {
            Reply::Envelope(http_failure(status, None))
        };
    }

    let value: Value = match serde_json::from_str(body) {
        Ok(value) => value,
        Err(_) if ok => {
            return Reply::Envelope(Response::fail(
                ErrorCode::NetworkError,
                format!("Server answered {status} with a non-JSON body"),
            ))
        }
        Err(_) => return Reply::Envelope(http_failure(status, None)),
    };

    let is_envelope = value.as_object().is_some_and(|o| o.contains_key("success"));
    if is_envelope {
        let message = message_of(&value);
        return match serde_json::from_value::<Response<Value>>(value) {
            Ok(resp) if resp.data().is_some_and(is_empty_data) => Reply::NoContent,
            Ok(resp) => Reply::Envelope(resp),
            Err(_) if ok => Reply::Envelope(Response::fail(
                ErrorCode::NetworkError,
                "Malformed response envelope",
            )),
            Err(_) => Reply::Envelope(http_failure(status, message)),
        };
    }

    if !ok {
        return Reply::Envelope(http_failure(status, message_of(&value)));
    }
    if is_empty_data(&value) {
        Reply::NoContent
    } else {
        Reply::Envelope(Response::ok(value))
    }
}

fn is_empty_data(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Array(items) => items.is_empty(),
        _ => false,
    }
}

fn message_of(value: &Value) -> Option<String> {
    value
        .get("message")
        .and_then(Value::as_str)
        .map(str::to_string)
}

fn http_failure(status: StatusCode, message: Option<String>) -> Response<Value> {
    let code = match status.as_u16() {
        404 => ErrorCode::NotFound,
        400 | 422 => ErrorCode::InvalidRequest,
        408 | 504 => ErrorCode::Timeout,
        _ => ErrorCode::NetworkError,
    };
    Response::fail(code, message.unwrap_or_else(|| format!("Server answered {status}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DEFAULT_TIMEOUT_MS;
    use crate::seed::SeedBehavior;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    fn remote(base_url: &str, timeout_ms: u64) -> RemoteConnector {
        RemoteConnector::new(&RemoteConfig {
            base_url: base_url.to_string(),
            timeout_ms,
        })
        .unwrap()
    }

    fn fallback_seed() -> SeedDescriptor {
        SeedDescriptor::new(SeedBehavior {
            use_on_no_content: true,
            ..Default::default()
        })
        .with_collection(
            "todos",
            vec![
                json!({ "id": "1", "text": "a" }),
                json!({ "id": "2", "text": "b" }),
                json!({ "id": "3", "text": "c" }),
            ],
        )
    }

    /// Accept one connection, answer it with `raw`, and hand back the request text.
    async fn serve_once(raw: &'static str) -> (String, tokio::task::JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let handle = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buf = vec![0u8; 16 * 1024];
            let n = socket.read(&mut buf).await.unwrap();
            socket.write_all(raw.as_bytes()).await.unwrap();
            socket.shutdown().await.ok();
            String::from_utf8_lossy(&buf[..n]).into_owned()
        });
        (format!("http://{addr}/api"), handle)
    }

    #[test]
    fn test_endpoint_building() {
        let conn = remote("http://localhost:3000/api", DEFAULT_TIMEOUT_MS);
        assert_eq!(conn.base_url().as_str(), "http://localhost:3000/api/");

        let url = conn.endpoint("/todos/1", None).unwrap();
        assert_eq!(url.as_str(), "http://localhost:3000/api/todos/1");

        let params = ListParams::new().page(2).limit(5).filter("done", true);
        let url = conn.endpoint("todos?sort=asc", Some(&params)).unwrap();
        assert_eq!(
            url.as_str(),
            "http://localhost:3000/api/todos?sort=asc&page=2&limit=5&done=true"
        );

        let url = conn.endpoint("todos", Some(&ListParams::new())).unwrap();
        assert_eq!(url.query(), None);
    }

    #[test]
    fn test_endpoint_from_inline_query_sent_once() {
        let conn = remote("http://localhost:3000/api", DEFAULT_TIMEOUT_MS);
        let (path, params) = ListParams::from_endpoint("todos?done=true");
        let url = conn.endpoint(path, Some(&params)).unwrap();
        assert_eq!(url.query(), Some("done=true"));
    }

    #[test]
    fn test_invalid_base_url() {
        let err = RemoteConnector::new(&RemoteConfig {
            base_url: "not a url".into(),
            timeout_ms: 100,
        })
        .err()
        .unwrap();
        assert!(matches!(err, StashDbError::Config(_)));
    }

    #[test]
    fn test_interpret_no_content() {
        assert_eq!(interpret(StatusCode::NO_CONTENT, ""), Reply::NoContent);
        assert_eq!(interpret(StatusCode::OK, "  "), Reply::NoContent);
        assert_eq!(interpret(StatusCode::OK, "null"), Reply::NoContent);
        assert_eq!(interpret(StatusCode::OK, "[]"), Reply::NoContent);
        assert_eq!(
            interpret(StatusCode::OK, r#"{"success": true, "data": []}"#),
            Reply::NoContent
        );
    }

    #[test]
    fn test_interpret_raw_and_envelope() {
        assert_eq!(
            interpret(StatusCode::OK, r#"{"id": "1"}"#),
            Reply::Envelope(Response::ok(json!({ "id": "1" })))
        );

        let body = r#"{"success": true, "data": [{"id": "1"}], "meta": {"total": 1, "page": 1, "limit": 10, "totalPages": 1}}"#;
        let Reply::Envelope(resp) = interpret(StatusCode::OK, body) else {
            panic!("expected envelope");
        };
        assert_eq!(resp.meta().unwrap().total, 1);

        let body = r#"{"success": false, "message": "gone", "error": {"code": "NOT_FOUND"}}"#;
        assert_eq!(
            interpret(StatusCode::OK, body),
            Reply::Envelope(Response::fail(ErrorCode::NotFound, "gone"))
        );
    }

    #[test]
    fn test_interpret_status_codes() {
        let code = |status: u16, body: &str| match interpret(StatusCode::from_u16(status).unwrap(), body) {
            Reply::Envelope(resp) => resp.code(),
            Reply::NoContent => None,
        };
        assert_eq!(code(404, ""), Some(ErrorCode::NotFound));
        assert_eq!(code(422, r#"{"message": "bad"}"#), Some(ErrorCode::InvalidRequest));
        assert_eq!(code(504, "<html>"), Some(ErrorCode::Timeout));
        assert_eq!(code(500, "oops"), Some(ErrorCode::NetworkError));
        assert_eq!(code(200, "<html>"), Some(ErrorCode::NetworkError));
    }

    #[tokio::test]
    async fn test_get_list_sends_params() {
        let (base, server) = serve_once(
            "HTTP/1.1 200 OK\r\nContent-Type: application/json\r\nContent-Length: 23\r\nConnection: close\r\n\r\n[{\"id\":\"1\",\"text\":\"a\"}]",
        )
        .await;
        let conn = remote(&base, 2_000);

        let resp = conn.get("todos", &ListParams::new().page(1).limit(1)).await;
        assert_eq!(resp.data(), Some(&json!([{ "id": "1", "text": "a" }])));

        let request = server.await.unwrap();
        assert!(request.starts_with("GET /api/todos?page=1&limit=1 HTTP/1.1"));
    }

    #[tokio::test]
    async fn test_no_content_served_from_seed() {
        let (base, _server) =
            serve_once("HTTP/1.1 204 No Content\r\nConnection: close\r\n\r\n").await;
        let conn = remote(&base, 2_000).with_seed(fallback_seed());

        let resp = conn.get("todos", &ListParams::new().limit(2)).await;
        assert_eq!(resp.message(), Some("Served from seed data"));
        assert_eq!(resp.data().unwrap().as_array().unwrap().len(), 2);
        assert_eq!(resp.meta().unwrap().total, 3);
        assert_eq!(resp.meta().unwrap().total_pages, 2);
    }

    #[tokio::test]
    async fn test_no_content_item_from_seed() {
        let (base, _server) = serve_once(
            "HTTP/1.1 200 OK\r\nContent-Type: application/json\r\nContent-Length: 4\r\nConnection: close\r\n\r\nnull",
        )
        .await;
        let conn = remote(&base, 2_000).with_seed(fallback_seed());

        let resp = conn.get("todos/2", &ListParams::new()).await;
        assert_eq!(resp.data().unwrap()["text"], "b");
    }

    #[tokio::test]
    async fn test_no_content_without_fallback() {
        let (base, _server) =
            serve_once("HTTP/1.1 204 No Content\r\nConnection: close\r\n\r\n").await;
        let conn = remote(&base, 2_000);
        let resp = conn.get("todos", &ListParams::new()).await;
        assert_eq!(resp.data(), Some(&json!([])));
        assert_eq!(resp.meta().unwrap().total, 0);

        let (base, _server) =
            serve_once("HTTP/1.1 204 No Content\r\nConnection: close\r\n\r\n").await;
        let conn = remote(&base, 2_000);
        let resp = conn.get("todos/9", &ListParams::new()).await;
        assert_eq!(resp.code(), Some(ErrorCode::NotFound));
    }

    #[tokio::test]
    async fn test_create_posts_json() {
        let (base, server) = serve_once(
            "HTTP/1.1 201 Created\r\nContent-Type: application/json\r\nContent-Length: 26\r\nConnection: close\r\n\r\n{\"id\":\"n1\",\"text\":\"hello\"}",
        )
        .await;
        let conn = remote(&base, 2_000);

        let resp = conn.create("todos", json!({ "text": "hello" })).await;
        assert_eq!(resp.data().unwrap()["id"], "n1");

        let request = server.await.unwrap();
        assert!(request.starts_with("POST /api/todos HTTP/1.1"));
        assert!(request.to_lowercase().contains("content-type: application/json"));
    }

    #[tokio::test]
    async fn test_timeout() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let _server = tokio::spawn(async move {
            let (_socket, _) = listener.accept().await.unwrap();
            tokio::time::sleep(Duration::from_secs(10)).await;
        });

        let conn = remote(&format!("http://{addr}"), 100);
        let resp = conn.get("todos", &ListParams::new()).await;
        assert_eq!(resp.code(), Some(ErrorCode::Timeout));
    }

    #[tokio::test]
    async fn test_connection_refused() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let conn = remote(&format!("http://{addr}"), 1_000);
        let resp = conn.delete("todos/1").await;
        assert_eq!(resp.code(), Some(ErrorCode::NetworkError));
    }
}
