//! Request routing dispatch module
//!
//! Entry point for HTTP request processing. Matching is deliberately plain:
//! fixed paths first, then the two path prefixes, and anything left over
//! lands on the greeter fallback. The order is part of the contract, since a
//! request that misses one rule must keep falling until something claims it.

use std::fmt;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use http_body_util::{BodyExt, Full};
use hyper::body::{Body, Bytes};
use hyper::{Method, Request, Response, Version};

use crate::config::AppState;
use crate::handler::{decode_path_segment, folders, objects, packs};
use crate::http;
use crate::logger::{self, AccessLogEntry};
use crate::store::StoreError;

/// Name of the demo object the fallback route resolves
const DEMO_OBJECT_NAME: &str = "foo";
/// Name the demo object greets
const DEMO_GREETING_NAME: &str = "world";

/// Main entry point for HTTP request handling.
///
/// Everything a handler can answer comes back as `Ok`, including client
/// errors. Store failures (other than unrepresentable keys, which are the
/// client's fault) surface as `Err` and abort the exchange.
pub async fn handle_request<B>(
    req: Request<B>,
    state: Arc<AppState>,
    remote_addr: SocketAddr,
) -> Result<Response<Full<Bytes>>, StoreError>
where
    B: Body<Data = Bytes>,
    B::Error: fmt::Display,
{
    let started = Instant::now();
    let mut entry = AccessLogEntry::new(
        remote_addr.ip().to_string(),
        req.method().to_string(),
        req.uri().path().to_string(),
    );
    entry.query = req.uri().query().map(ToString::to_string);
    entry.http_version = version_label(req.version()).to_string();
    entry.referer = header_string(&req, "referer");
    entry.user_agent = header_string(&req, "user-agent");

    let response = if let Some(early) = check_body_size(&req, state.config.http.max_body_size) {
        early
    } else {
        match route(req, &state).await {
            Ok(response) => response,
            Err(StoreError::InvalidKey(_)) => http::build_400_response("Invalid key"),
            Err(err) => {
                logger::log_error(&format!("{} {} failed: {err}", entry.method, entry.path));
                return Err(err);
            }
        }
    };

    if state.access_log_enabled() {
        entry.status = response.status().as_u16();
        entry.body_bytes = response.body().size_hint().exact().unwrap_or(0);
        entry.request_time_us = u64::try_from(started.elapsed().as_micros()).unwrap_or(u64::MAX);
        logger::log_access(&entry, &state.config.logging.access_log_format);
    }

    Ok(response)
}

/// Dispatch a request to its route handler.
async fn route<B>(
    req: Request<B>,
    state: &Arc<AppState>,
) -> Result<Response<Full<Bytes>>, StoreError>
where
    B: Body<Data = Bytes>,
    B::Error: fmt::Display,
{
    let method = req.method().clone();
    let path = req.uri().path().to_string();

    // Health check endpoint (any method, always fast)
    if path == "/health" {
        return Ok(http::build_health_response());
    }

    if path == "/init-folders" && method == Method::POST {
        return folders::init_folders(state.store.as_ref()).await;
    }

    if path == "/packs" && method == Method::POST {
        let body = match collect_body(req).await {
            Ok(body) => body,
            Err(response) => return Ok(response),
        };
        return packs::store_pack(state.store.as_ref(), &body).await;
    }

    if path == "/packs" && method == Method::GET {
        return packs::list_packs(state.store.as_ref()).await;
    }

    // A non-GET under /packs/ keeps falling through to the fallback
    if let Some(raw_id) = path.strip_prefix("/packs/") {
        if method == Method::GET {
            return packs::fetch_pack(state.store.as_ref(), raw_id).await;
        }
    }

    if let Some(raw_key) = path.strip_prefix("/r2/") {
        // Key problems answer before the method is considered
        let Some(key) = decode_path_segment(raw_key) else {
            return Ok(http::build_400_response("Invalid key"));
        };
        if key.is_empty() {
            return Ok(http::build_400_response("Missing key"));
        }
        return match method {
            Method::PUT => {
                let headers = req.headers().clone();
                let body = match collect_body(req).await {
                    Ok(body) => body,
                    Err(response) => return Ok(response),
                };
                objects::save_object(state.store.as_ref(), &key, &headers, body).await
            }
            Method::GET => objects::fetch_object(state.store.as_ref(), &key).await,
            _ => {
                logger::log_warning(&format!("Method not allowed on object route: {method}"));
                Ok(http::build_405_response())
            }
        };
    }

    // Everything else gets the demo object's greeting
    let greeting = state
        .greeters
        .get_by_name(DEMO_OBJECT_NAME)
        .say_hello(DEMO_GREETING_NAME)
        .await;
    Ok(http::build_text_response(greeting))
}

/// Validate Content-Length header and return 413 if exceeded
fn check_body_size<B>(req: &Request<B>, max_body_size: u64) -> Option<Response<Full<Bytes>>> {
    let content_length = req.headers().get("content-length")?;
    content_length.to_str().map_or_else(
        |_| {
            logger::log_warning("Content-Length header contains non-ASCII characters");
            None
        },
        |size_str| match size_str.parse::<u64>() {
            Ok(size) if size > max_body_size => {
                logger::log_error(&format!(
                    "Request body too large: {size} bytes (max: {max_body_size})"
                ));
                Some(http::build_413_response())
            }
            Err(_) => {
                logger::log_warning(&format!(
                    "Invalid Content-Length value: '{size_str}', skipping size check"
                ));
                None
            }
            _ => None,
        },
    )
}

/// Read the full request body, translating read failures into a 400
async fn collect_body<B>(req: Request<B>) -> Result<Bytes, Response<Full<Bytes>>>
where
    B: Body<Data = Bytes>,
    B::Error: fmt::Display,
{
    match req.into_body().collect().await {
        Ok(collected) => Ok(collected.to_bytes()),
        Err(err) => {
            logger::log_warning(&format!("Failed to read request body: {err}"));
            Err(http::build_400_response("Failed to read request body"))
        }
    }
}

fn header_string<B>(req: &Request<B>, name: &str) -> Option<String> {
    req.headers()
        .get(name)
        .and_then(|value| value.to_str().ok())
        .map(ToString::to_string)
}

fn version_label(version: Version) -> &'static str {
    if version == Version::HTTP_09 {
        "0.9"
    } else if version == Version::HTTP_10 {
        "1.0"
    } else if version == Version::HTTP_2 {
        "2"
    } else if version == Version::HTTP_3 {
        "3"
    } else {
        "1.1"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{
        Config, HttpConfig, LoggingConfig, PerformanceConfig, ServerConfig, StorageConfig,
        StorageKind,
    };
    use crate::greeter::GreeterNamespace;
    use crate::store::memory::MemoryStore;
    use serde_json::Value;

    fn test_config() -> Config {
        Config {
            server: ServerConfig {
                host: "127.0.0.1".to_string(),
                port: 0,
                workers: None,
            },
            storage: StorageConfig {
                backend: StorageKind::Memory,
                root: String::new(),
            },
            logging: LoggingConfig {
                access_log: false,
                access_log_format: "combined".to_string(),
                access_log_file: None,
                error_log_file: None,
            },
            performance: PerformanceConfig {
                keep_alive_timeout: 75,
                read_timeout: 30,
                write_timeout: 30,
                max_connections: None,
            },
            http: HttpConfig {
                max_body_size: 1024 * 1024,
            },
        }
    }

    fn test_state() -> Arc<AppState> {
        Arc::new(AppState::new(
            test_config(),
            Arc::new(MemoryStore::new()),
            GreeterNamespace::hello(),
        ))
    }

    fn peer() -> SocketAddr {
        SocketAddr::from(([127, 0, 0, 1], 40000))
    }

    fn request(method: Method, path: &str, body: impl Into<Bytes>) -> Request<Full<Bytes>> {
        Request::builder()
            .method(method)
            .uri(path)
            .body(Full::new(body.into()))
            .unwrap()
    }

    async fn send(state: &Arc<AppState>, req: Request<Full<Bytes>>) -> Response<Full<Bytes>> {
        handle_request(req, Arc::clone(state), peer()).await.unwrap()
    }

    async fn body_string(response: Response<Full<Bytes>>) -> String {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    async fn body_json(response: Response<Full<Bytes>>) -> Value {
        serde_json::from_str(&body_string(response).await).unwrap()
    }

    #[tokio::test]
    async fn test_health_responds_on_any_method() {
        let state = test_state();
        for method in [Method::GET, Method::POST, Method::DELETE, Method::PUT] {
            let response = send(&state, request(method.clone(), "/health", "")).await;
            assert_eq!(response.status(), 200, "method {method}");
            assert_eq!(body_string(response).await, "ok");
        }
    }

    #[tokio::test]
    async fn test_init_folders_seeds_placeholders() {
        let state = test_state();
        let response = send(&state, request(Method::POST, "/init-folders", "")).await;
        assert_eq!(response.status(), 200);
        assert_eq!(response.headers()["Content-Type"], "application/json");

        let body = body_json(response).await;
        assert_eq!(body["ok"], true);
        let created = body["created"].as_array().unwrap();
        assert_eq!(created.len(), 5);
        assert!(created.contains(&Value::from("evidence/plat_menterprise/.keep")));

        // Every reported key is readable and holds the placeholder content
        for key in created {
            let placeholder = state.store.get(key.as_str().unwrap()).await.unwrap().unwrap();
            assert_eq!(placeholder.body.as_ref(), b"keep");
        }

        // Re-running overwrites the same keys
        let again = send(&state, request(Method::POST, "/init-folders", "")).await;
        assert_eq!(again.status(), 200);
        assert_eq!(state.store.list("", 100).await.unwrap().len(), 5);
    }

    #[tokio::test]
    async fn test_store_pack_and_fetch_roundtrip() {
        let state = test_state();
        let submitted = r#"{"zeta": 1, "pack_metadata": {"pack_id": "p1"}, "alpha": [3, 2]}"#;
        let response = send(&state, request(Method::POST, "/packs", submitted)).await;
        assert_eq!(response.status(), 200);
        let body = body_json(response).await;
        assert_eq!(body["ok"], true);
        assert_eq!(body["key"], "packs/p1.json");
        assert_eq!(body["pack_id"], "p1");

        let expected =
            serde_json::to_string_pretty(&serde_json::from_str::<Value>(submitted).unwrap())
                .unwrap();

        let fetched = send(&state, request(Method::GET, "/packs/p1", "")).await;
        assert_eq!(fetched.status(), 200);
        assert_eq!(
            fetched.headers()["Content-Type"],
            "application/json; charset=utf-8"
        );
        let etag = fetched.headers()["ETag"].to_str().unwrap().to_string();
        assert!(etag.starts_with('"') && etag.ends_with('"'));
        assert_eq!(body_string(fetched).await, expected);

        // The stored suffix may be supplied explicitly
        let with_suffix = send(&state, request(Method::GET, "/packs/p1.json", "")).await;
        assert_eq!(body_string(with_suffix).await, expected);
    }

    #[tokio::test]
    async fn test_store_pack_accepts_bom_and_whitespace() {
        let state = test_state();
        let submitted = "\u{feff}  \n {\"pack_metadata\":{\"pack_id\":\"bom\"}} \n";
        let response = send(&state, request(Method::POST, "/packs", submitted)).await;
        assert_eq!(response.status(), 200);
        assert!(state.store.get("packs/bom.json").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_store_pack_rejects_invalid_json() {
        let state = test_state();
        let response = send(&state, request(Method::POST, "/packs", "{oops")).await;
        assert_eq!(response.status(), 400);
        assert!(body_string(response).await.starts_with("Invalid JSON body: "));
    }

    #[tokio::test]
    async fn test_store_pack_rejects_missing_pack_id() {
        let state = test_state();
        for submitted in [r#"{"n":1}"#, r#"{"pack_metadata":{"pack_id":""}}"#] {
            let response = send(&state, request(Method::POST, "/packs", submitted)).await;
            assert_eq!(response.status(), 400);
            assert_eq!(body_string(response).await, "Missing pack_metadata.pack_id");
        }
    }

    #[tokio::test]
    async fn test_list_packs_reports_prefix_contents() {
        let state = test_state();
        send(&state, request(Method::POST, "/init-folders", "")).await;
        send(
            &state,
            request(
                Method::POST,
                "/packs",
                r#"{"pack_metadata":{"pack_id":"p1"}}"#,
            ),
        )
        .await;

        let response = send(&state, request(Method::GET, "/packs", "")).await;
        assert_eq!(response.status(), 200);
        let listing = body_json(response).await;
        assert_eq!(listing["ok"], true);
        assert_eq!(listing["count"], 4);

        let objects = listing["objects"].as_array().unwrap();
        let keys: Vec<&str> = objects.iter().map(|o| o["key"].as_str().unwrap()).collect();
        // Key order, and only keys under the pack prefix
        assert_eq!(
            keys,
            vec![
                "packs/.keep",
                "packs/all-platforms/.keep",
                "packs/p1.json",
                "packs/plat_menterprise/.keep",
            ]
        );
        for object in objects {
            assert!(object["size"].is_u64());
            assert!(object["etag"].is_string());
            assert!(object["uploaded"].is_string());
        }
    }

    #[tokio::test]
    async fn test_fetch_pack_missing_returns_404() {
        let state = test_state();
        let response = send(&state, request(Method::GET, "/packs/absent", "")).await;
        assert_eq!(response.status(), 404);
        assert_eq!(body_string(response).await, "Not found");
    }

    #[tokio::test]
    async fn test_fetch_pack_empty_id_rejected() {
        let state = test_state();
        let response = send(&state, request(Method::GET, "/packs/", "")).await;
        assert_eq!(response.status(), 400);
        assert_eq!(body_string(response).await, "Missing pack id");
    }

    #[tokio::test]
    async fn test_fetch_pack_decodes_percent_escapes() {
        let state = test_state();
        send(
            &state,
            request(
                Method::POST,
                "/packs",
                r#"{"pack_metadata":{"pack_id":"a b"}}"#,
            ),
        )
        .await;
        let response = send(&state, request(Method::GET, "/packs/a%20b", "")).await;
        assert_eq!(response.status(), 200);
    }

    #[tokio::test]
    async fn test_fetch_pack_does_not_double_suffix() {
        let state = test_state();
        let put = request(Method::PUT, "/r2/packs/raw.json", "{\"raw\":true}");
        send(&state, put).await;

        for path in ["/packs/raw", "/packs/raw.json"] {
            let response = send(&state, request(Method::GET, path, "")).await;
            assert_eq!(response.status(), 200, "path {path}");
            assert_eq!(body_string(response).await, "{\"raw\":true}");
        }
    }

    #[tokio::test]
    async fn test_object_put_get_roundtrip_replays_metadata() {
        let state = test_state();
        let put = Request::builder()
            .method(Method::PUT)
            .uri("/r2/evidence/report.css")
            .header("content-type", "text/css")
            .header("cache-control", "max-age=60")
            .header("x-forwarded-for", "203.0.113.9")
            .body(Full::new(Bytes::from_static(b"body { color: red }")))
            .unwrap();
        let saved = send(&state, put).await;
        assert_eq!(saved.status(), 200);
        assert_eq!(body_string(saved).await, "Saved evidence/report.css");

        let fetched = send(&state, request(Method::GET, "/r2/evidence/report.css", "")).await;
        assert_eq!(fetched.status(), 200);
        assert_eq!(fetched.headers()["Content-Type"], "text/css");
        assert_eq!(fetched.headers()["Cache-Control"], "max-age=60");
        assert!(fetched.headers().get("ETag").is_some());
        // Non-metadata request headers are not replayed
        assert!(fetched.headers().get("x-forwarded-for").is_none());
        assert_eq!(body_string(fetched).await, "body { color: red }");
    }

    #[tokio::test]
    async fn test_object_put_rejects_empty_key_and_body() {
        let state = test_state();
        let missing_key = send(&state, request(Method::PUT, "/r2/", "data")).await;
        assert_eq!(missing_key.status(), 400);
        assert_eq!(body_string(missing_key).await, "Missing key");

        let missing_body = send(&state, request(Method::PUT, "/r2/some/key", "")).await;
        assert_eq!(missing_body.status(), 400);
        assert_eq!(body_string(missing_body).await, "Missing body");
    }

    #[tokio::test]
    async fn test_object_get_missing_returns_404() {
        let state = test_state();
        let response = send(&state, request(Method::GET, "/r2/absent/key", "")).await;
        assert_eq!(response.status(), 404);
        assert_eq!(body_string(response).await, "Not found");
    }

    #[tokio::test]
    async fn test_object_routes_reject_other_methods() {
        let state = test_state();
        for method in [Method::POST, Method::DELETE, Method::PATCH] {
            let response = send(&state, request(method.clone(), "/r2/some/key", "x")).await;
            assert_eq!(response.status(), 405, "method {method}");
            assert_eq!(response.headers()["Allow"], "GET, PUT");
            assert_eq!(body_string(response).await, "Method not allowed");
        }
    }

    #[tokio::test]
    async fn test_object_key_checks_precede_method_dispatch() {
        let state = test_state();
        // A bad key answers 400 even for methods the route would refuse
        let missing = send(&state, request(Method::DELETE, "/r2/", "")).await;
        assert_eq!(missing.status(), 400);
        assert_eq!(body_string(missing).await, "Missing key");

        let invalid = send(&state, request(Method::DELETE, "/r2/%ff", "")).await;
        assert_eq!(invalid.status(), 400);
        assert_eq!(body_string(invalid).await, "Invalid key");
    }

    #[tokio::test]
    async fn test_object_key_percent_decoding_is_canonical() {
        let state = test_state();
        send(&state, request(Method::PUT, "/r2/a%2Fb", "escaped")).await;

        // The decoded and literal spellings address the same object
        let literal = send(&state, request(Method::GET, "/r2/a/b", "")).await;
        assert_eq!(body_string(literal).await, "escaped");
        let escaped = send(&state, request(Method::GET, "/r2/a%2Fb", "")).await;
        assert_eq!(body_string(escaped).await, "escaped");
    }

    #[tokio::test]
    async fn test_invalid_escapes_rejected() {
        let state = test_state();
        let put = send(&state, request(Method::PUT, "/r2/%ff", "data")).await;
        assert_eq!(put.status(), 400);
        assert_eq!(body_string(put).await, "Invalid key");

        let get_pack = send(&state, request(Method::GET, "/packs/%ff", "")).await;
        assert_eq!(get_pack.status(), 400);
        assert_eq!(body_string(get_pack).await, "Invalid pack id");
    }

    #[tokio::test]
    async fn test_fallback_serves_greeting() {
        let state = test_state();
        let cases = [
            (Method::GET, "/"),
            (Method::GET, "/favicon.ico"),
            (Method::DELETE, "/anything/else"),
            // Non-GET under the pack prefix falls through too
            (Method::POST, "/packs/p1"),
        ];
        for (method, path) in cases {
            let response = send(&state, request(method.clone(), path, "")).await;
            assert_eq!(response.status(), 200, "{method} {path}");
            assert_eq!(body_string(response).await, "Hello, world!");
        }
    }

    #[tokio::test]
    async fn test_oversized_body_rejected_early() {
        let state = test_state();
        let req = Request::builder()
            .method(Method::POST)
            .uri("/packs")
            .header("content-length", "2097152")
            .body(Full::new(Bytes::from_static(b"{}")))
            .unwrap();
        let response = send(&state, req).await;
        assert_eq!(response.status(), 413);
    }

    #[tokio::test]
    async fn test_pack_and_object_routes_share_the_store() {
        let state = test_state();
        send(
            &state,
            request(
                Method::POST,
                "/packs",
                r#"{"pack_metadata":{"pack_id":"shared"}}"#,
            ),
        )
        .await;

        // The stored document is a plain object under the pack prefix
        let via_objects = send(&state, request(Method::GET, "/r2/packs/shared.json", "")).await;
        assert_eq!(via_objects.status(), 200);
        assert_eq!(
            via_objects.headers()["Content-Type"],
            "application/json; charset=utf-8"
        );
    }

    #[test]
    fn test_version_label() {
        assert_eq!(version_label(Version::HTTP_10), "1.0");
        assert_eq!(version_label(Version::HTTP_11), "1.1");
        assert_eq!(version_label(Version::HTTP_2), "2");
    }
}
