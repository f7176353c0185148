//! Pooled post updates.
//!
//! Each submitted post runs [`AssetRepository::update_post`] on tokio's
//! blocking pool, at most `workers` at a time. Updates for the same sidecar
//! never overlap: a second submission while the first is in flight is
//! rejected with [`LibraryError::SidecarBusy`].

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use tokio::sync::Semaphore;
use tokio::task::JoinSet;

use favsync_core::{AssetId, CatalogPost};

use crate::error::LibraryError;
use crate::repository::{AssetRepository, PostOutcome};

type TaskResult = (AssetId, Result<PostOutcome, LibraryError>);

pub struct UpdatePool {
    repo: Arc<AssetRepository>,
    permits: Arc<Semaphore>,
    in_flight: Arc<Mutex<HashSet<PathBuf>>>,
    tasks: JoinSet<TaskResult>,
    closed: bool,
}

impl UpdatePool {
    pub fn new(repo: Arc<AssetRepository>, workers: usize) -> Self {
        Self {
            repo,
            permits: Arc::new(Semaphore::new(workers.max(1))),
            in_flight: Arc::new(Mutex::new(HashSet::new())),
            tasks: JoinSet::new(),
            closed: false,
        }
    }

    /// Queue `post`, waiting for a free worker first.
    pub async fn submit(&mut self, post: CatalogPost) -> Result<(), LibraryError> {
        if self.closed {
            return Err(LibraryError::PoolClosed);
        }
        let (_, sidecar) = self.repo.paths_for(&post).map_err(|e| e.for_post(post.id))?;
        {
            let mut in_flight = self.lock_in_flight()?;
            if !in_flight.insert(sidecar.clone()) {
                return Err(LibraryError::SidecarBusy { path: sidecar });
            }
        }

        let permit = match Arc::clone(&self.permits).acquire_owned().await {
            Ok(permit) => permit,
            Err(_) => {
                self.release(&sidecar);
                return Err(LibraryError::PoolClosed);
            }
        };

        let repo = Arc::clone(&self.repo);
        let in_flight = Arc::clone(&self.in_flight);
        self.tasks.spawn_blocking(move || {
            let _permit = permit;
            let result = repo.update_post(&post);
            match in_flight.lock() {
                Ok(mut set) => set.remove(&sidecar),
                Err(poisoned) => poisoned.into_inner().remove(&sidecar),
            };
            (post.id, result)
        });
        Ok(())
    }

    /// Posts submitted and not yet collected.
    pub fn pending(&self) -> usize {
        self.tasks.len()
    }

    /// Wait for the next finished update.
    pub async fn next(&mut self) -> Option<Result<(AssetId, PostOutcome), LibraryError>> {
        let joined = self.tasks.join_next().await?;
        Some(match joined {
            Ok((id, Ok(outcome))) => Ok((id, outcome)),
            Ok((_, Err(err))) => Err(err),
            Err(err) => Err(LibraryError::PoolTask(err.to_string())),
        })
    }

    /// Wait for every outstanding update.
    pub async fn drain(&mut self) -> Vec<Result<(AssetId, PostOutcome), LibraryError>> {
        let mut results = Vec::with_capacity(self.tasks.len());
        while let Some(result) = self.next().await {
            results.push(result);
        }
        results
    }

    /// Refuse further submissions and wait for outstanding work. The
    /// repository's channel is left open for its owner to close.
    pub async fn close(&mut self) -> Vec<Result<(AssetId, PostOutcome), LibraryError>> {
        self.closed = true;
        self.permits.close();
        self.drain().await
    }

    fn lock_in_flight(&self) -> Result<std::sync::MutexGuard<'_, HashSet<PathBuf>>, LibraryError> {
        self.in_flight
            .lock()
            .map_err(|_| LibraryError::PoolTask("in-flight set poisoned".to_string()))
    }

    fn release(&self, sidecar: &Path) {
        if let Ok(mut set) = self.in_flight.lock() {
            set.remove(sidecar);
        }
    }
}
