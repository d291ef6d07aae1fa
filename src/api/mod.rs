//! Read-only HTTP surface over the record store.

pub mod dtos;
pub mod handlers;

use axum::{Router, routing::get};
use std::future::Future;
use std::sync::Arc;
use std::time::SystemTime;
use tokio::sync::RwLock;
use tracing::{debug, error, info};

use crate::entities::ListingRecord;
use crate::store::{RecordStore, StoreError};

#[derive(Clone)]
pub struct AppState {
    pub records: Arc<RecordCache>,
}

impl AppState {
    pub fn new(store: RecordStore) -> Self {
        Self {
            records: Arc::new(RecordCache::new(store)),
        }
    }
}

/// What the store file looked like when it was last loaded. A rewrite within
/// the filesystem's mtime granularity still changes the length.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Fingerprint {
    modified: SystemTime,
    len: u64,
}

#[derive(Default)]
struct Snapshot {
    fingerprint: Option<Fingerprint>,
    records: Arc<Vec<ListingRecord>>,
}

/// Store contents held in memory, reloaded when the file's mtime or size moves.
pub struct RecordCache {
    store: RecordStore,
    snapshot: RwLock<Snapshot>,
}

impl RecordCache {
    pub fn new(store: RecordStore) -> Self {
        Self {
            store,
            snapshot: RwLock::new(Snapshot::default()),
        }
    }

    pub async fn records(&self) -> Result<Arc<Vec<ListingRecord>>, StoreError> {
        let fingerprint = match tokio::fs::metadata(self.store.path()).await {
            Ok(meta) => Some(Fingerprint {
                modified: meta.modified()?,
                len: meta.len(),
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => None,
            Err(e) => return Err(e.into()),
        };

        {
            let snapshot = self.snapshot.read().await;
            if fingerprint.is_some() && snapshot.fingerprint == fingerprint {
                return Ok(snapshot.records.clone());
            }
        }

        let mut snapshot = self.snapshot.write().await;
        if fingerprint.is_some() && snapshot.fingerprint == fingerprint {
            return Ok(snapshot.records.clone());
        }
        let records = Arc::new(self.store.load_async().await?);
        debug!(
            "Loaded {} records from {}",
            records.len(),
            self.store.path().display()
        );
        *snapshot = Snapshot {
            fingerprint,
            records: records.clone(),
        };
        Ok(records)
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/healthz", get(handlers::health_check))
        .route("/v1/search", get(handlers::search))
        .route("/v1/trend", get(handlers::trend))
        .with_state(state)
}

pub async fn serve(listener: tokio::net::TcpListener, state: AppState) -> std::io::Result<()> {
    serve_with_shutdown(listener, state, shutdown_signal()).await
}

/// Serves until `signal` resolves, then drains in-flight requests.
pub async fn serve_with_shutdown<F>(
    listener: tokio::net::TcpListener,
    state: AppState,
    signal: F,
) -> std::io::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    info!("Query API listening on {}", listener.local_addr()?);
    axum::serve(listener, router(state))
        .with_graceful_shutdown(signal)
        .await?;
    info!("Query API stopped");
    Ok(())
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("Interrupt received, shutting down"),
        Err(e) => {
            // Without a signal handler the server runs until killed.
            error!("Failed to install Ctrl-C handler: {}", e);
            std::future::pending::<()>().await;
        }
    }
}
