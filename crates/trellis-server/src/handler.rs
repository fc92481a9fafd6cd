use std::collections::BTreeMap;
use std::io::Read;

use axum::body::Body;
use axum::extract::{Path, Query, State};
use axum::http::header::{ACCEPT, ACCEPT_ENCODING, CONTENT_ENCODING, CONTENT_TYPE};
use axum::http::{HeaderMap, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use bytes::Bytes;
use flate2::read::GzDecoder;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::info;
use trellis_retrieve::{frame_stream, gzip, ByteStream, Framing};
use trellis_types::{GraphId, ObjectId};

use crate::error::{ServerError, ServerResult};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct ObjectsRequest {
    pub objects: Vec<ObjectId>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct UploadResponse {
    pub received: usize,
    pub nodes_inserted: usize,
    pub closures_inserted: usize,
}

#[derive(Debug, Default, Deserialize)]
pub struct StreamParams {
    /// Only stream descendants at most this many detachments away.
    pub depth: Option<u32>,
}

pub async fn health_handler() -> Json<serde_json::Value> {
    Json(json!({
        "status": "ok",
        "name": "trellis-server",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

/// `POST /objects/:graph`: a JSON array of serialized nodes, optionally gzip
/// encoded.
pub async fn upload_handler(
    State(state): State<AppState>,
    Path(graph): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> ServerResult<(StatusCode, Json<UploadResponse>)> {
    let graph = parse_graph(&graph)?;
    let max = state.config.max_upload_size;
    let body = if header_contains(&headers, CONTENT_ENCODING.as_str(), "gzip") {
        gunzip(&body, max)?
    } else {
        body.to_vec()
    };
    if body.len() > max {
        return Err(ServerError::PayloadTooLarge {
            size: body.len(),
            max,
        });
    }

    let values: Vec<serde_json::Value> = serde_json::from_slice(&body)
        .map_err(|e| ServerError::BadRequest(format!("expected a JSON array of nodes: {e}")))?;
    let received = values.len();
    let summary = state.writer.write_values(&graph, values).await?;
    info!(
        graph = %graph,
        received,
        nodes = summary.nodes_inserted,
        closures = summary.closures_inserted,
        "upload stored"
    );
    Ok((
        StatusCode::CREATED,
        Json(UploadResponse {
            received,
            nodes_inserted: summary.nodes_inserted,
            closures_inserted: summary.closures_inserted,
        }),
    ))
}

/// `GET /objects/:graph/:id`: the root and its closure.
pub async fn stream_handler(
    State(state): State<AppState>,
    Path((graph, id)): Path<(String, String)>,
    Query(params): Query<StreamParams>,
    headers: HeaderMap,
) -> ServerResult<Response> {
    let graph = parse_graph(&graph)?;
    let id = parse_id(&id)?;
    let framing = if header_contains(&headers, ACCEPT.as_str(), "text/plain") {
        Framing::Lines
    } else {
        Framing::JsonArray
    };
    let rows = state
        .retriever
        .stream_closure(&graph, &id, params.depth)
        .await?
        .ok_or_else(|| ServerError::NotFound(format!("node {id} in {graph}")))?;
    Ok(stream_response(frame_stream(rows, framing), framing, &headers))
}

/// `GET /objects/:graph/:id/single`: the root's raw body.
pub async fn single_handler(
    State(state): State<AppState>,
    Path((graph, id)): Path<(String, String)>,
) -> ServerResult<Response> {
    let graph = parse_graph(&graph)?;
    let id = parse_id(&id)?;
    let body = state
        .retriever
        .get_single(&graph, &id)
        .await?
        .ok_or_else(|| ServerError::NotFound(format!("node {id} in {graph}")))?;
    Ok(([(CONTENT_TYPE, Framing::JsonArray.content_type())], body).into_response())
}

/// `POST /api/diff/:graph`: which of the given ids are already stored.
pub async fn diff_handler(
    State(state): State<AppState>,
    Path(graph): Path<String>,
    Json(request): Json<ObjectsRequest>,
) -> ServerResult<Json<BTreeMap<String, bool>>> {
    let graph = parse_graph(&graph)?;
    let present = state.store.has_nodes(&graph, &request.objects).await?;
    Ok(Json(
        present
            .into_iter()
            .map(|(id, has)| (id.to_hex(), has))
            .collect(),
    ))
}

/// `POST /api/getobjects/:graph`: the stored subset of the given ids, one
/// line per node.
pub async fn get_objects_handler(
    State(state): State<AppState>,
    Path(graph): Path<String>,
    headers: HeaderMap,
    Json(request): Json<ObjectsRequest>,
) -> ServerResult<Response> {
    let graph = parse_graph(&graph)?;
    let rows = state.retriever.stream_nodes(&graph, request.objects);
    Ok(stream_response(
        frame_stream(rows, Framing::Lines),
        Framing::Lines,
        &headers,
    ))
}

fn stream_response(stream: ByteStream, framing: Framing, request: &HeaderMap) -> Response {
    let mut response = if header_contains(request, ACCEPT_ENCODING.as_str(), "gzip") {
        let mut response = Body::from_stream(gzip(stream)).into_response();
        response
            .headers_mut()
            .insert(CONTENT_ENCODING, HeaderValue::from_static("gzip"));
        response
    } else {
        Body::from_stream(stream).into_response()
    };
    response.headers_mut().insert(
        CONTENT_TYPE,
        HeaderValue::from_static(framing.content_type()),
    );
    response
}

fn parse_graph(raw: &str) -> ServerResult<GraphId> {
    GraphId::new(raw).map_err(|e| ServerError::BadRequest(e.to_string()))
}

fn parse_id(raw: &str) -> ServerResult<ObjectId> {
    ObjectId::from_hex(raw).map_err(|e| ServerError::BadRequest(e.to_string()))
}

fn header_contains(headers: &HeaderMap, name: &str, needle: &str) -> bool {
    headers
        .get_all(name)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .any(|v| v.to_ascii_lowercase().contains(needle))
}

/// Decode a gzip body, refusing to inflate past `max` bytes.
fn gunzip(body: &[u8], max: usize) -> ServerResult<Vec<u8>> {
    let mut out = Vec::new();
    GzDecoder::new(body)
        .take(max as u64 + 1)
        .read_to_end(&mut out)
        .map_err(|e| ServerError::BadRequest(format!("invalid gzip body: {e}")))?;
    if out.len() > max {
        return Err(ServerError::PayloadTooLarge {
            size: out.len(),
            max,
        });
    }
    Ok(out)
}
