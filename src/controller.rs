//! Upload batch lifecycle
//!
//! A drop event starts a batch: the previous batch's token is cancelled, a new
//! one is minted, and loading flags and results are reset before any upload is
//! dispatched. Outcomes carry a [`FileTicket`] and are applied only while their
//! batch is still current, so late responses from a superseded batch (or from
//! any batch after teardown) never touch visible state.

use crate::models::{DroppedFile, FileTicket, UploadResult};
use crate::upload::{CancelToken, UploadService};
use crate::{UploadError, UploadErrorKind};
use serde::Serialize;
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::Semaphore;
use tokio::task::{JoinHandle, JoinSet};
use tracing::{debug, error, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DispatchMode {
    /// Await each upload before starting the next.
    #[default]
    Sequential,
    /// Run up to `limit` uploads at once; results land in completion order.
    Concurrent { limit: usize },
}

impl DispatchMode {
    pub fn from_concurrency(concurrency: Option<usize>) -> Self {
        match concurrency {
            Some(limit) if limit > 1 => DispatchMode::Concurrent { limit },
            _ => DispatchMode::Sequential,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UploadFailure {
    pub index: usize,
    pub file_name: String,
    pub kind: UploadErrorKind,
    pub message: String,
}

/// State published to the rendering layer.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ControllerSnapshot {
    pub drag_over: bool,
    pub loading: Vec<bool>,
    pub results: Vec<UploadResult>,
    pub failures: Vec<UploadFailure>,
}

impl ControllerSnapshot {
    pub fn is_uploading(&self) -> bool {
        self.loading.iter().any(|loading| *loading)
    }
}

#[derive(Debug, Default)]
struct BatchState {
    generation: u64,
    torn_down: bool,
    view: ControllerSnapshot,
}

impl BatchState {
    fn accepts(&self, ticket: FileTicket) -> bool {
        !self.torn_down && self.generation == ticket.generation
    }

    fn apply(
        &mut self,
        ticket: FileTicket,
        file_name: &str,
        outcome: std::result::Result<UploadResult, UploadError>,
    ) {
        if !self.accepts(ticket) {
            debug!(
                "Discarding outcome for {} from stale batch {}",
                file_name, ticket.generation
            );
            return;
        }

        if let Some(flag) = self.view.loading.get_mut(ticket.index) {
            *flag = false;
        }

        match outcome {
            Ok(result) => {
                info!("Uploaded {} -> {}", file_name, result.preview_url);
                self.view.results.push(result);
            }
            Err(e) if e.is_aborted() => {
                debug!("Upload of {} aborted", file_name);
            }
            Err(e) => {
                error!("Upload of {} failed: {}", file_name, e);
                self.view.failures.push(UploadFailure {
                    index: ticket.index,
                    file_name: file_name.to_string(),
                    kind: e.kind(),
                    message: e.to_string(),
                });
            }
        }
    }
}

fn lock(state: &Mutex<BatchState>) -> MutexGuard<'_, BatchState> {
    state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Completion handle for one dispatched batch.
pub struct BatchHandle {
    generation: u64,
    task: Option<JoinHandle<()>>,
}

impl BatchHandle {
    pub async fn wait(self) {
        if let Some(task) = self.task {
            if let Err(e) = task.await {
                error!("Batch {} task failed: {}", self.generation, e);
            }
        }
    }
}

/// Owns the current cancellation token and the aggregate upload state.
pub struct BatchController {
    service: Arc<dyn UploadService>,
    mode: DispatchMode,
    state: Arc<Mutex<BatchState>>,
    current: CancelToken,
}

impl BatchController {
    pub fn new(service: Arc<dyn UploadService>, mode: DispatchMode) -> Self {
        Self {
            service,
            mode,
            state: Arc::new(Mutex::new(BatchState::default())),
            current: CancelToken::new(0),
        }
    }

    pub fn current_token(&self) -> &CancelToken {
        &self.current
    }

    pub fn snapshot(&self) -> ControllerSnapshot {
        lock(&self.state).view.clone()
    }

    pub fn drag_enter(&self) {
        self.set_drag_over(true);
    }

    pub fn drag_leave(&self) {
        self.set_drag_over(false);
    }

    fn set_drag_over(&self, over: bool) {
        let mut state = lock(&self.state);
        if !state.torn_down {
            state.view.drag_over = over;
        }
    }

    /// Start a new batch, superseding whatever batch is still in flight.
    ///
    /// Must be called from within a tokio runtime.
    pub fn drop_files(&mut self, files: Vec<DroppedFile>) -> BatchHandle {
        self.current.cancel();

        let generation = {
            let mut state = lock(&self.state);
            if state.torn_down {
                warn!("Ignoring drop of {} file(s) after teardown", files.len());
                return BatchHandle {
                    generation: state.generation,
                    task: None,
                };
            }

            state.generation += 1;
            state.view = ControllerSnapshot {
                drag_over: false,
                loading: vec![true; files.len()],
                results: Vec::new(),
                failures: Vec::new(),
            };
            state.generation
        };

        self.current = CancelToken::new(generation);

        if files.is_empty() {
            debug!("Batch {} is empty", generation);
            return BatchHandle {
                generation,
                task: None,
            };
        }

        info!("Starting batch {} with {} file(s)", generation, files.len());

        let service = Arc::clone(&self.service);
        let state = Arc::clone(&self.state);
        let token = self.current.clone();
        let task = match self.mode {
            DispatchMode::Sequential => {
                tokio::spawn(run_sequential(service, state, token, files))
            }
            DispatchMode::Concurrent { limit } => {
                tokio::spawn(run_concurrent(service, state, token, files, limit))
            }
        };

        BatchHandle {
            generation,
            task: Some(task),
        }
    }

    /// Cancel the current batch and freeze state. Idempotent.
    pub fn teardown(&self) {
        self.current.cancel();
        let mut state = lock(&self.state);
        if !state.torn_down {
            info!("Controller torn down at batch {}", state.generation);
            state.torn_down = true;
        }
    }
}

impl Drop for BatchController {
    fn drop(&mut self) {
        self.teardown();
    }
}

async fn run_sequential(
    service: Arc<dyn UploadService>,
    state: Arc<Mutex<BatchState>>,
    token: CancelToken,
    files: Vec<DroppedFile>,
) {
    for (index, file) in files.iter().enumerate() {
        if token.is_cancelled() {
            debug!(
                "Batch {} cancelled before file {} of {}",
                token.generation(),
                index + 1,
                files.len()
            );
            return;
        }

        let ticket = FileTicket {
            generation: token.generation(),
            index,
        };
        let outcome = service.upload(file, ticket, &token).await;
        lock(&state).apply(ticket, &file.name, outcome);
    }

    debug!("Batch {} settled", token.generation());
}

async fn run_concurrent(
    service: Arc<dyn UploadService>,
    state: Arc<Mutex<BatchState>>,
    token: CancelToken,
    files: Vec<DroppedFile>,
    limit: usize,
) {
    let permits = Arc::new(Semaphore::new(limit.max(1)));
    let mut uploads = JoinSet::new();

    for (index, file) in files.into_iter().enumerate() {
        let service = Arc::clone(&service);
        let state = Arc::clone(&state);
        let token = token.clone();
        let permits = Arc::clone(&permits);

        uploads.spawn(async move {
            let Ok(_permit) = permits.acquire_owned().await else {
                return;
            };
            let ticket = FileTicket {
                generation: token.generation(),
                index,
            };
            let outcome = if token.is_cancelled() {
                Err(UploadError::Aborted)
            } else {
                service.upload(&file, ticket, &token).await
            };
            lock(&state).apply(ticket, &file.name, outcome);
        });
    }

    while let Some(joined) = uploads.join_next().await {
        if let Err(e) = joined {
            error!("Upload task in batch {} failed: {}", token.generation(), e);
        }
    }

    debug!("Batch {} settled", token.generation());
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::upload::{MockResponse, MockUploadClient};
    use pretty_assertions::assert_eq;
    use std::time::Duration;

    fn files(names: &[&str]) -> Vec<DroppedFile> {
        names
            .iter()
            .map(|name| DroppedFile::new(*name, vec![0xFF, 0xD8, 0xFF]))
            .collect()
    }

    fn ticket(generation: u64, index: usize) -> FileTicket {
        FileTicket { generation, index }
    }

    #[test]
    fn test_dispatch_mode_from_concurrency() {
        assert_eq!(DispatchMode::from_concurrency(None), DispatchMode::Sequential);
        assert_eq!(
            DispatchMode::from_concurrency(Some(1)),
            DispatchMode::Sequential
        );
        assert_eq!(
            DispatchMode::from_concurrency(Some(3)),
            DispatchMode::Concurrent { limit: 3 }
        );
    }

    #[test]
    fn test_state_ignores_stale_generation() {
        let mut state = BatchState {
            generation: 2,
            torn_down: false,
            view: ControllerSnapshot {
                loading: vec![true],
                ..Default::default()
            },
        };

        state.apply(
            ticket(1, 0),
            "old.jpg",
            Err(UploadError::UploadFailed("late".to_string())),
        );

        assert_eq!(state.view.loading, vec![true]);
        assert!(state.view.failures.is_empty());
    }

    #[test]
    fn test_state_aborted_clears_flag_without_failure() {
        let mut state = BatchState {
            generation: 1,
            torn_down: false,
            view: ControllerSnapshot {
                loading: vec![true, true],
                ..Default::default()
            },
        };

        state.apply(ticket(1, 1), "b.jpg", Err(UploadError::Aborted));

        assert_eq!(state.view.loading, vec![true, false]);
        assert!(state.view.failures.is_empty());
        assert!(state.view.results.is_empty());
    }

    #[test]
    fn test_state_out_of_range_index_is_harmless() {
        let mut state = BatchState {
            generation: 1,
            ..Default::default()
        };

        state.apply(ticket(1, 5), "x.jpg", Err(UploadError::Aborted));
        assert!(state.view.loading.is_empty());
    }

    #[tokio::test]
    async fn test_drag_hover_toggles_and_drop_clears_it() {
        let mut controller =
            BatchController::new(Arc::new(MockUploadClient::new()), DispatchMode::Sequential);

        controller.drag_enter();
        assert!(controller.snapshot().drag_over);
        controller.drag_leave();
        assert!(!controller.snapshot().drag_over);

        controller.drag_enter();
        controller.drop_files(files(&["a.jpg"])).wait().await;
        assert!(!controller.snapshot().drag_over);
    }

    #[tokio::test]
    async fn test_sequential_uploads_in_file_order() {
        let mock = MockUploadClient::new();
        let mut controller = BatchController::new(Arc::new(mock.clone()), DispatchMode::Sequential);

        controller
            .drop_files(files(&["1.jpg", "2.jpg", "3.jpg"]))
            .wait()
            .await;

        let snapshot = controller.snapshot();
        assert_eq!(mock.get_uploaded(), vec!["1.jpg", "2.jpg", "3.jpg"]);
        let indices: Vec<usize> = snapshot.results.iter().map(|r| r.index).collect();
        assert_eq!(indices, vec![0, 1, 2]);
        assert_eq!(snapshot.loading, vec![false, false, false]);
    }

    #[tokio::test]
    async fn test_failure_does_not_stop_batch() {
        let mock = MockUploadClient::new()
            .with_response("a.jpg", MockResponse::Failure("reset".to_string()))
            .with_response("b.jpg", MockResponse::Status(400));
        let mut controller = BatchController::new(Arc::new(mock.clone()), DispatchMode::Sequential);

        controller
            .drop_files(files(&["a.jpg", "b.jpg", "c.jpg"]))
            .wait()
            .await;

        let snapshot = controller.snapshot();
        assert_eq!(mock.get_upload_count(), 3);
        assert_eq!(snapshot.results.len(), 1);
        assert_eq!(snapshot.results[0].file_name, "c.jpg");
        let kinds: Vec<UploadErrorKind> = snapshot.failures.iter().map(|f| f.kind).collect();
        assert_eq!(
            kinds,
            vec![UploadErrorKind::UploadFailed, UploadErrorKind::UploadRejected]
        );
        assert!(!snapshot.is_uploading());
    }

    #[tokio::test]
    async fn test_concurrent_dispatch_settles_all_files() {
        let mock = MockUploadClient::new().with_gate("slow.jpg");
        let mut controller = BatchController::new(
            Arc::new(mock.clone()),
            DispatchMode::Concurrent { limit: 2 },
        );

        let handle = controller.drop_files(files(&["slow.jpg", "fast.jpg"]));

        // fast.jpg completes while slow.jpg is held open
        tokio::time::timeout(Duration::from_secs(1), async {
            while controller.snapshot().results.is_empty() {
                tokio::task::yield_now().await;
            }
        })
        .await
        .unwrap();
        assert_eq!(controller.snapshot().loading, vec![true, false]);

        mock.release("slow.jpg");
        handle.wait().await;

        let snapshot = controller.snapshot();
        let names: Vec<&str> = snapshot.results.iter().map(|r| r.file_name.as_str()).collect();
        assert_eq!(names, vec!["fast.jpg", "slow.jpg"]);
        assert_eq!(snapshot.loading, vec![false, false]);
    }

    #[tokio::test]
    async fn test_drop_after_teardown_is_ignored() {
        let mock = MockUploadClient::new();
        let mut controller = BatchController::new(Arc::new(mock.clone()), DispatchMode::Sequential);

        controller.teardown();
        controller.teardown();
        controller.drop_files(files(&["a.jpg"])).wait().await;
        controller.drag_enter();

        assert_eq!(controller.snapshot(), ControllerSnapshot::default());
        assert_eq!(mock.get_upload_count(), 0);
    }
}
