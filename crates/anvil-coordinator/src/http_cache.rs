//! Optional HTTP façade over the action cache for remote-cache clients
//! that speak plain HTTP rather than the coordinator's native wire
//! protocol (§4.4's "remote cache" surface). Gated behind the
//! `remote-cache-http` feature; disabled builds carry no `axum`
//! dependency at all.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{get, put};
use axum::Router;
use std::sync::Arc;

/// Minimal byte-addressed store the HTTP façade reads from and writes to.
/// `anvil-cache`'s `ContentStore` satisfies this; it's expressed as a
/// trait here so this crate doesn't need to depend on `anvil-cache`
/// directly for what is otherwise a thin routing layer.
pub trait BlobStore: Send + Sync + 'static {
    /// Fetch a stored blob by its content hash, hex-encoded.
    fn get(&self, digest: &str) -> Option<Vec<u8>>;
    /// Store a blob under its content hash, hex-encoded.
    fn put(&self, digest: &str, bytes: Vec<u8>);
}

/// Build the router for a remote-cache HTTP server backed by `store`.
pub fn router<S: BlobStore>(store: Arc<S>) -> Router {
    Router::new()
        .route("/blobs/:digest", get(get_blob::<S>).put(put_blob::<S>))
        .with_state(store)
}

async fn get_blob<S: BlobStore>(
    State(store): State<Arc<S>>,
    Path(digest): Path<String>,
) -> Result<Vec<u8>, StatusCode> {
    store.get(&digest).ok_or(StatusCode::NOT_FOUND)
}

async fn put_blob<S: BlobStore>(
    State(store): State<Arc<S>>,
    Path(digest): Path<String>,
    body: axum::body::Bytes,
) -> StatusCode {
    store.put(&digest, body.to_vec());
    StatusCode::CREATED
}
