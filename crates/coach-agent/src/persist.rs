use std::sync::Arc;
use std::time::Duration;

use dt_core::project::ProjectState;
use dt_core::store::LocalStore;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

// ─── StateSink ────────────────────────────────────────────────────────────

/// Somewhere a project snapshot can be written.
pub trait StateSink: Send + Sync + 'static {
    fn persist(&self, state: &ProjectState) -> dt_core::Result<()>;
}

impl StateSink for LocalStore {
    fn persist(&self, state: &ProjectState) -> dt_core::Result<()> {
        self.save(state).map(|_| ())
    }
}

// ─── DebouncedSaver ───────────────────────────────────────────────────────

enum Command {
    Save(ProjectState),
    Flush(oneshot::Sender<()>),
}

/// Trailing-edge debounced writes of the latest state.
///
/// Each [`schedule`](DebouncedSaver::schedule) restarts the quiet period;
/// only the newest snapshot is written once it elapses. Writes run on the
/// blocking pool. Failures are logged and dropped since the in-memory state
/// stays authoritative.
pub struct DebouncedSaver {
    tx: mpsc::UnboundedSender<Command>,
    handle: JoinHandle<()>,
}

impl DebouncedSaver {
    pub fn spawn<S: StateSink>(sink: S, delay: Duration) -> Self {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let sink = Arc::new(sink);
        let handle = tokio::spawn(async move {
            let mut pending: Option<ProjectState> = None;
            loop {
                let cmd = if pending.is_some() {
                    tokio::select! {
                        cmd = rx.recv() => cmd,
                        _ = tokio::time::sleep(delay) => {
                            write(&sink, pending.take()).await;
                            continue;
                        }
                    }
                } else {
                    rx.recv().await
                };
                match cmd {
                    Some(Command::Save(state)) => pending = Some(state),
                    Some(Command::Flush(ack)) => {
                        write(&sink, pending.take()).await;
                        let _ = ack.send(());
                    }
                    None => {
                        write(&sink, pending.take()).await;
                        break;
                    }
                }
            }
        });
        Self { tx, handle }
    }

    pub fn schedule(&self, state: ProjectState) {
        if self.tx.send(Command::Save(state)).is_err() {
            tracing::warn!("saver task is gone; state not scheduled");
        }
    }

    /// Write any pending snapshot now.
    pub async fn flush(&self) {
        let (ack, done) = oneshot::channel();
        if self.tx.send(Command::Flush(ack)).is_ok() {
            let _ = done.await;
        }
    }

    /// Flush and stop the background task.
    pub async fn close(self) {
        drop(self.tx);
        if let Err(e) = self.handle.await {
            tracing::warn!(error = %e, "saver task ended abnormally");
        }
    }
}

async fn write<S: StateSink>(sink: &Arc<S>, state: Option<ProjectState>) {
    let Some(state) = state else { return };
    let id = state.id.clone();
    let sink = Arc::clone(sink);
    match tokio::task::spawn_blocking(move || sink.persist(&state)).await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => tracing::warn!(project = %id, error = %e, "failed to save project state"),
        Err(e) => tracing::warn!(project = %id, error = %e, "save task panicked"),
    }
}

// ─── Tests ────────────────────────────────────────────────────────────────
