//! HTTP server for a Trellis store.
//!
//! Accepts decomposed node batches from producers and streams stored nodes
//! and their closures back out.
//!
//! | method | path                          | purpose                              |
//! |--------|-------------------------------|--------------------------------------|
//! | GET    | `/v1/health`                  | liveness                             |
//! | POST   | `/objects/:graph`             | upload a JSON array of nodes         |
//! | GET    | `/objects/:graph/:id`         | root plus closure (`?depth=N`)       |
//! | GET    | `/objects/:graph/:id/single`  | root body only                       |
//! | POST   | `/api/diff/:graph`            | which ids are already stored         |
//! | POST   | `/api/getobjects/:graph`      | stored subset of the given ids       |

pub mod config;
pub mod error;
pub mod handler;
pub mod router;
pub mod server;
pub mod state;

pub use config::ServerConfig;
pub use error::{ServerError, ServerResult};
pub use server::TrellisServer;
pub use state::AppState;

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Read, Write};
    use std::sync::Arc;

    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use axum::Router;
    use flate2::read::GzDecoder;
    use flate2::write::GzEncoder;
    use flate2::Compression;
    use serde_json::{json, Value as Json};
    use tower::util::ServiceExt;
    use trellis_serialize::{Decomposer, SerializerConfig};
    use trellis_store::InMemoryObjectStore;
    use trellis_transport::MemoryTransport;
    use trellis_types::{Node, ObjectId};

    fn app() -> Router {
        TrellisServer::open(ServerConfig::default()).unwrap().router()
    }

    /// Root with one detached child and a 2500-element chunked array.
    async fn decomposed() -> (ObjectId, Vec<String>) {
        let values: Vec<i64> = (0..2500).collect();
        let root = Node::base()
            .with("name", "wall")
            .with_detached("geometry", Node::new("Mesh").with("faces", 12))
            .with_chunked("vertices", Some(1000), values);
        let mut transport = MemoryTransport::new();
        let outcome = Decomposer::new(&mut transport, SerializerConfig::default())
            .write(&root)
            .await
            .unwrap();
        (outcome.root_id, transport.into_nodes())
    }

    fn upload_body(nodes: &[String]) -> String {
        format!("[{}]", nodes.join(","))
    }

    async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Vec<u8>) {
        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, body.to_vec())
    }

    fn post_json(uri: &str, body: impl Into<Body>) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .body(body.into())
            .unwrap()
    }

    fn get(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    #[tokio::test]
    async fn health_endpoint() {
        let (status, body) = send(&app(), get("/v1/health")).await;
        assert_eq!(status, StatusCode::OK);
        let body: Json = serde_json::from_slice(&body).unwrap();
        assert_eq!(body["status"], "ok");
    }

    #[tokio::test]
    async fn upload_then_stream_closure() {
        let app = app();
        let (root_id, nodes) = decomposed().await;

        let (status, body) = send(&app, post_json("/objects/g1", upload_body(&nodes))).await;
        assert_eq!(status, StatusCode::CREATED);
        let summary: Json = serde_json::from_slice(&body).unwrap();
        assert_eq!(summary["received"], 5);
        assert_eq!(summary["nodes_inserted"], 5);
        assert_eq!(summary["closures_inserted"], 4);

        let (status, body) = send(&app, get(&format!("/objects/g1/{}", root_id.to_hex()))).await;
        assert_eq!(status, StatusCode::OK);
        let rows: Json = serde_json::from_slice(&body).unwrap();
        let rows = rows.as_array().unwrap();
        assert_eq!(rows.len(), 5);
        assert_eq!(rows[0]["id"], root_id.to_hex());
        let children: Vec<&str> = rows[1..].iter().map(|r| r["id"].as_str().unwrap()).collect();
        let mut sorted = children.clone();
        sorted.sort();
        assert_eq!(children, sorted);
    }

    #[tokio::test]
    async fn repeated_upload_inserts_nothing() {
        let app = app();
        let (_, nodes) = decomposed().await;
        send(&app, post_json("/objects/g1", upload_body(&nodes))).await;
        let (status, body) = send(&app, post_json("/objects/g1", upload_body(&nodes))).await;
        assert_eq!(status, StatusCode::CREATED);
        let summary: Json = serde_json::from_slice(&body).unwrap();
        assert_eq!(summary["nodes_inserted"], 0);
        assert_eq!(summary["closures_inserted"], 0);
    }

    #[tokio::test]
    async fn gzip_upload_and_line_framing() {
        let app = app();
        let (root_id, nodes) = decomposed().await;
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(upload_body(&nodes).as_bytes()).unwrap();
        let request = Request::builder()
            .method("POST")
            .uri("/objects/g1")
            .header("content-encoding", "gzip")
            .body(Body::from(encoder.finish().unwrap()))
            .unwrap();
        assert_eq!(send(&app, request).await.0, StatusCode::CREATED);

        let request = Request::builder()
            .uri(format!("/objects/g1/{}", root_id.to_hex()))
            .header("accept", "text/plain")
            .header("accept-encoding", "gzip")
            .body(Body::empty())
            .unwrap();
        let response = app.clone().oneshot(request).await.unwrap();
        assert_eq!(response.headers()["content-encoding"], "gzip");
        assert!(response.headers()["content-type"]
            .to_str()
            .unwrap()
            .starts_with("text/plain"));
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let mut text = String::new();
        GzDecoder::new(body.as_ref()).read_to_string(&mut text).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 5);
        assert!(lines[0].starts_with(&format!("{}\t", root_id.to_hex())));
    }

    #[tokio::test]
    async fn depth_parameter_limits_closure() {
        let app = app();
        let leaf = Node::new("Leaf").with("v", 1);
        let mid = Node::new("Mid").with_detached("leaf", leaf);
        let root = Node::base().with_detached("mid", mid);
        let mut transport = MemoryTransport::new();
        let outcome = Decomposer::new(&mut transport, SerializerConfig::default())
            .write(&root)
            .await
            .unwrap();
        send(&app, post_json("/objects/g1", upload_body(transport.nodes()))).await;

        let uri = format!("/objects/g1/{}?depth=0", outcome.root_id.to_hex());
        let (_, body) = send(&app, get(&uri)).await;
        let rows: Json = serde_json::from_slice(&body).unwrap();
        assert_eq!(rows.as_array().unwrap().len(), 2);

        let uri = format!("/objects/g1/{}", outcome.root_id.to_hex());
        let (_, body) = send(&app, get(&uri)).await;
        let rows: Json = serde_json::from_slice(&body).unwrap();
        assert_eq!(rows.as_array().unwrap().len(), 3);
    }

    #[tokio::test]
    async fn single_returns_root_body() {
        let app = app();
        let (root_id, nodes) = decomposed().await;
        send(&app, post_json("/objects/g1", upload_body(&nodes))).await;

        let (status, body) =
            send(&app, get(&format!("/objects/g1/{}/single", root_id.to_hex()))).await;
        assert_eq!(status, StatusCode::OK);
        let stored: Json = serde_json::from_slice(&body).unwrap();
        let sent: Json = serde_json::from_str(nodes.last().unwrap()).unwrap();
        assert_eq!(stored, sent);
    }

    #[tokio::test]
    async fn missing_root_and_bad_ids() {
        let app = app();
        let absent = ObjectId::from_bytes(b"absent").to_hex();
        let (status, _) = send(&app, get(&format!("/objects/g1/{absent}"))).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        let (status, _) = send(&app, get(&format!("/objects/g1/{absent}/single"))).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        let (status, _) = send(&app, get("/objects/g1/not-hex")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn graphs_are_isolated() {
        let app = app();
        let (root_id, nodes) = decomposed().await;
        send(&app, post_json("/objects/g1", upload_body(&nodes))).await;
        let (status, _) = send(&app, get(&format!("/objects/g2/{}", root_id.to_hex()))).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn malformed_uploads_are_rejected() {
        let app = app();
        let (status, _) = send(&app, post_json("/objects/g1", "{not json")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        let (status, _) = send(&app, post_json("/objects/g1", "[1, 2]")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn oversized_upload_is_rejected() {
        let config = ServerConfig {
            max_upload_size: 64,
            ..ServerConfig::default()
        };
        let app = TrellisServer::with_store(Arc::new(InMemoryObjectStore::new()), config).router();
        let (_, nodes) = decomposed().await;
        let (status, _) = send(&app, post_json("/objects/g1", upload_body(&nodes))).await;
        assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
    }

    #[tokio::test]
    async fn diff_and_getobjects() {
        let app = app();
        let (root_id, nodes) = decomposed().await;
        send(&app, post_json("/objects/g1", upload_body(&nodes))).await;
        let absent = ObjectId::from_bytes(b"absent");

        let request = json!({"objects": [root_id.to_hex(), absent.to_hex()]}).to_string();
        let (status, body) = send(&app, post_json("/api/diff/g1", request.clone())).await;
        assert_eq!(status, StatusCode::OK);
        let diff: Json = serde_json::from_slice(&body).unwrap();
        assert_eq!(diff[root_id.to_hex()], true);
        assert_eq!(diff[absent.to_hex()], false);

        let (status, body) = send(&app, post_json("/api/getobjects/g1", request)).await;
        assert_eq!(status, StatusCode::OK);
        let text = String::from_utf8(body).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 1);
        assert!(lines[0].starts_with(&root_id.to_hex()));
    }
}
