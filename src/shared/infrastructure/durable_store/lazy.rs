// Process-wide handle to the durable store.
//
// Purpose
// - Open the store once, on first demand, and share it between every session of the process.
//
// Responsibilities
// - Callers wait in `ready` until the store is open. Nothing runs against an unopened store.
// - A failed open is reported to the caller that triggered it; the next caller tries again.

use std::sync::Arc;

use tokio::sync::OnceCell;
use tracing::{error, info};

use crate::shared::infrastructure::durable_store::StoreError;

type Opener<S> = Arc<dyn Fn() -> Result<S, StoreError> + Send + Sync>;

pub struct LazyStore<S> {
    cell: Arc<OnceCell<Arc<S>>>,
    open: Opener<S>,
}

impl<S> Clone for LazyStore<S> {
    fn clone(&self) -> Self {
        Self {
            cell: self.cell.clone(),
            open: self.open.clone(),
        }
    }
}

impl<S: Send + Sync + 'static> LazyStore<S> {
    /// `open` runs on the blocking pool the first time a caller needs the store.
    pub fn new(open: impl Fn() -> Result<S, StoreError> + Send + Sync + 'static) -> Self {
        Self {
            cell: Arc::new(OnceCell::new()),
            open: Arc::new(open),
        }
    }

    /// Wraps a store that is already open.
    pub fn from_open(store: Arc<S>) -> Self {
        Self {
            cell: Arc::new(OnceCell::new_with(Some(store))),
            // The cell is filled, so the opener never runs.
            open: Arc::new(|| Err(StoreError::Backend("store already open".into()))),
        }
    }

    pub fn is_ready(&self) -> bool {
        self.cell.initialized()
    }

    pub async fn ready(&self) -> Result<Arc<S>, StoreError> {
        let store = self
            .cell
            .get_or_try_init(|| async {
                let open = self.open.clone();
                let store = tokio::task::spawn_blocking(move || open())
                    .await
                    .map_err(StoreError::backend)?
                    .inspect_err(|err| error!(error = %err, "Failed to open durable store"))?;
                info!("Durable store ready");
                Ok::<_, StoreError>(Arc::new(store))
            })
            .await?;
        Ok(store.clone())
    }
}
