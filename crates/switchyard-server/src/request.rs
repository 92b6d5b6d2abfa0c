//! Translation of axum requests into pipeline input.

use axum::body::{to_bytes, Body};
use axum::extract::{Query, Request};
use http::{header, HeaderMap, Uri};
use serde_json::{Map, Value};
use switchyard_lib::{PipelineError, RequestInput};

use crate::middleware::{extract_or_generate_request_id, RequestId};

/// Correlation id assigned by [`MetricsLayer`](crate::MetricsLayer), or one
/// read from the headers when the layer is not installed.
pub fn request_id(request: &Request) -> RequestId {
    request
        .extensions()
        .get::<RequestId>()
        .cloned()
        .unwrap_or_else(|| extract_or_generate_request_id(request.headers()))
}

/// Read method, path, query, headers, and body from `request`.
///
/// A non-empty body is parsed as JSON when the content type is absent or
/// JSON, and as a form when it is `application/x-www-form-urlencoded`. Other
/// content types are left unparsed. A body larger than `body_limit` or one
/// that fails to parse is a [`PipelineError::BodyParse`].
pub async fn read_input(
    request: Request,
    request_id: RequestId,
    body_limit: usize,
) -> Result<RequestInput, PipelineError> {
    let (parts, body) = request.into_parts();

    let query = parse_query(&parts.uri)?;
    let body = read_body(body, &parts.headers, body_limit).await?;

    Ok(RequestInput {
        request_id: request_id.into_inner(),
        method: parts.method,
        path: parts.uri.path().to_string(),
        query,
        body,
        headers: parts.headers,
    })
}

/// Decode the query string into a JSON object.
///
/// Values stay strings; a key repeated in the query becomes an array of its
/// values in order.
pub fn parse_query(uri: &Uri) -> Result<Map<String, Value>, PipelineError> {
    let Query(pairs) = Query::<Vec<(String, String)>>::try_from_uri(uri)
        .map_err(|rejection| PipelineError::QueryParse(rejection.body_text()))?;
    Ok(fold_pairs(pairs))
}

/// Collect decoded pairs into an object, turning repeated keys into arrays.
fn fold_pairs(pairs: Vec<(String, String)>) -> Map<String, Value> {
    let mut fields = Map::new();
    for (key, value) in pairs {
        match fields.get_mut(&key) {
            None => {
                fields.insert(key, Value::String(value));
            }
            Some(Value::Array(values)) => values.push(Value::String(value)),
            Some(existing) => {
                let first = existing.take();
                *existing = Value::Array(vec![first, Value::String(value)]);
            }
        }
    }
    fields
}

#[derive(Debug, PartialEq, Eq)]
enum BodyKind {
    Json,
    Form,
    Other,
}

async fn read_body(
    body: Body,
    headers: &HeaderMap,
    body_limit: usize,
) -> Result<Option<Value>, PipelineError> {
    let bytes = to_bytes(body, body_limit)
        .await
        .map_err(|e| PipelineError::BodyParse(e.to_string()))?;

    if bytes.is_empty() {
        return Ok(None);
    }

    match body_kind(headers) {
        BodyKind::Json => serde_json::from_slice(&bytes)
            .map(Some)
            .map_err(|e| PipelineError::BodyParse(e.to_string())),
        BodyKind::Form => serde_urlencoded::from_bytes::<Vec<(String, String)>>(&bytes)
            .map(|pairs| Some(Value::Object(fold_pairs(pairs))))
            .map_err(|e| PipelineError::BodyParse(e.to_string())),
        BodyKind::Other => Ok(None),
    }
}

fn body_kind(headers: &HeaderMap) -> BodyKind {
    let Some(content_type) = headers.get(header::CONTENT_TYPE) else {
        return BodyKind::Json;
    };
    let Ok(content_type) = content_type.to_str() else {
        return BodyKind::Other;
    };
    let mime = content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();

    if mime == "application/json" || mime.ends_with("+json") {
        BodyKind::Json
    } else if mime == "application/x-www-form-urlencoded" {
        BodyKind::Form
    } else {
        BodyKind::Other
    }
}
