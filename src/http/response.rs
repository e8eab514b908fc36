//! HTTP response building module
//!
//! Builders for every response shape the gateway produces, decoupled from
//! route logic. Text bodies here are part of the client-facing contract, so
//! change them with care.

use http_body_util::Full;
use hyper::body::Bytes;
use hyper::{Response, StatusCode};
use serde::Serialize;

use crate::store::StoredObject;

const TEXT_CONTENT_TYPE: &str = "text/plain; charset=utf-8";

/// Build 200 plain-text response
pub fn build_text_response(body: String) -> Response<Full<Bytes>> {
    Response::builder()
        .status(200)
        .header("Content-Type", TEXT_CONTENT_TYPE)
        .body(Full::new(Bytes::from(body)))
        .unwrap_or_else(|e| {
            log_build_error("200", &e);
            Response::new(Full::new(Bytes::new()))
        })
}

/// Build health check response
pub fn build_health_response() -> Response<Full<Bytes>> {
    build_text_response("ok".to_string())
}

/// Build 400 Bad Request response with the given message as body
pub fn build_400_response(message: &str) -> Response<Full<Bytes>> {
    Response::builder()
        .status(400)
        .header("Content-Type", TEXT_CONTENT_TYPE)
        .body(Full::new(Bytes::from(message.to_string())))
        .unwrap_or_else(|e| {
            log_build_error("400", &e);
            Response::new(Full::new(Bytes::from("Bad request")))
        })
}

/// Build 404 Not Found response
pub fn build_404_response() -> Response<Full<Bytes>> {
    Response::builder()
        .status(404)
        .header("Content-Type", TEXT_CONTENT_TYPE)
        .body(Full::new(Bytes::from("Not found")))
        .unwrap_or_else(|e| {
            log_build_error("404", &e);
            Response::new(Full::new(Bytes::from("Not found")))
        })
}

/// Build 405 Method Not Allowed response for object routes
pub fn build_405_response() -> Response<Full<Bytes>> {
    Response::builder()
        .status(405)
        .header("Content-Type", TEXT_CONTENT_TYPE)
        .header("Allow", "GET, PUT")
        .body(Full::new(Bytes::from("Method not allowed")))
        .unwrap_or_else(|e| {
            log_build_error("405", &e);
            Response::new(Full::new(Bytes::from("Method not allowed")))
        })
}

/// Build 413 Payload Too Large response
pub fn build_413_response() -> Response<Full<Bytes>> {
    Response::builder()
        .status(413)
        .header("Content-Type", TEXT_CONTENT_TYPE)
        .body(Full::new(Bytes::from("413 Payload Too Large")))
        .unwrap_or_else(|e| {
            log_build_error("413", &e);
            Response::new(Full::new(Bytes::from("413 Payload Too Large")))
        })
}

/// Build JSON response from a serializable body
pub fn json_response<T: Serialize>(status: StatusCode, body: &T) -> Response<Full<Bytes>> {
    let json = match serde_json::to_string(body) {
        Ok(j) => j,
        Err(e) => {
            crate::logger::log_error(&format!("Failed to serialize response: {e}"));
            return Response::builder()
                .status(StatusCode::INTERNAL_SERVER_ERROR)
                .header("Content-Type", "application/json")
                .body(Full::new(Bytes::from(
                    r#"{"error":"Internal server error"}"#,
                )))
                .unwrap_or_else(|_| Response::new(Full::new(Bytes::from("Error"))));
        }
    };

    Response::builder()
        .status(status)
        .header("Content-Type", "application/json")
        .body(Full::new(Bytes::from(json)))
        .unwrap_or_else(|e| {
            log_build_error("JSON", &e);
            Response::new(Full::new(Bytes::from("Error")))
        })
}

/// Build 200 response replaying a stored object: payload, its recorded HTTP
/// metadata, and the server-assigned etag.
pub fn build_object_response(object: &StoredObject) -> Response<Full<Bytes>> {
    let mut builder = Response::builder()
        .status(200)
        .header("ETag", object.meta.http_etag());

    let metadata = &object.http_metadata;
    let replayed = [
        ("Content-Type", &metadata.content_type),
        ("Content-Language", &metadata.content_language),
        ("Content-Disposition", &metadata.content_disposition),
        ("Content-Encoding", &metadata.content_encoding),
        ("Cache-Control", &metadata.cache_control),
        ("Expires", &metadata.cache_expiry),
    ];
    for (name, value) in replayed {
        if let Some(value) = value {
            builder = builder.header(name, value);
        }
    }

    builder
        .body(Full::new(object.body.clone()))
        .unwrap_or_else(|e| {
            log_build_error("object", &e);
            Response::new(Full::new(object.body.clone()))
        })
}

/// Log response build error
fn log_build_error(kind: &str, error: &hyper::http::Error) {
    crate::logger::log_error(&format!("Failed to build {kind} response: {error}"));
}
