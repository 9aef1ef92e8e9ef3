use axum::http::{HeaderMap, HeaderValue};
use axum::{extract::Request, middleware::Next, response::Response};
use uuid::Uuid;

pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Keep a caller-supplied request id, or mint a fresh one.
fn request_id_from(headers: &HeaderMap) -> HeaderValue {
    if let Some(existing) = headers.get(REQUEST_ID_HEADER) {
        if !existing.is_empty() {
            return existing.clone();
        }
    }
    HeaderValue::from_str(&Uuid::new_v4().to_string())
        .unwrap_or_else(|_| HeaderValue::from_static("unknown"))
}

/// Tags every request with an id and echoes it on the response, so a
/// single request can be traced across log lines and services.
pub async fn request_id_middleware(mut req: Request, next: Next) -> Response {
    let request_id = request_id_from(req.headers());
    req.headers_mut()
        .insert(REQUEST_ID_HEADER, request_id.clone());

    let mut response = next.run(req).await;
    response.headers_mut().insert(REQUEST_ID_HEADER, request_id);
    response
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keeps_caller_supplied_id() {
        let mut headers = HeaderMap::new();
        headers.insert(REQUEST_ID_HEADER, HeaderValue::from_static("req-abc-123"));
        assert_eq!(request_id_from(&headers), "req-abc-123");
    }

    #[test]
    fn mints_id_when_missing_or_empty() {
        let generated = request_id_from(&HeaderMap::new());
        assert!(Uuid::parse_str(generated.to_str().unwrap()).is_ok());

        let mut headers = HeaderMap::new();
        headers.insert(REQUEST_ID_HEADER, HeaderValue::from_static(""));
        let replaced = request_id_from(&headers);
        assert!(Uuid::parse_str(replaced.to_str().unwrap()).is_ok());
    }
}
