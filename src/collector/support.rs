//! Shared `start`/`stop` bookkeeping used by every [`super::Collector`]
//! impl: the idempotency guard every original Go collector repeats by hand
//! (`if c.cancel != nil { return err }` / `Stop` calling `wg.Wait()`).

use std::sync::Mutex;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::error::CollectorError;

pub struct TaskHandle {
    name: String,
    token: Mutex<Option<CancellationToken>>,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl TaskHandle {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            token: Mutex::new(None),
            handle: Mutex::new(None),
        }
    }

    /// Registers a fresh child token derived from `parent`, rejecting the
    /// call if a previous `start` hasn't been matched by `stop` yet. The
    /// caller spawns its worker with the returned token and passes the
    /// `JoinHandle` to [`Self::set_handle`].
    pub fn start(&self, parent: CancellationToken) -> Result<CancellationToken, CollectorError> {
        let mut guard = self.token.lock().expect("task handle lock poisoned");
        if guard.is_some() {
            return Err(CollectorError::AlreadyStarted(self.name.clone()));
        }
        let token = parent.child_token();
        *guard = Some(token.clone());
        Ok(token)
    }

    pub fn set_handle(&self, handle: JoinHandle<()>) {
        *self.handle.lock().expect("task handle lock poisoned") = Some(handle);
    }

    /// Cancels the token and waits for the worker to exit. Idempotent.
    pub async fn stop(&self) {
        let token = self.token.lock().expect("task handle lock poisoned").take();
        let handle = self.handle.lock().expect("task handle lock poisoned").take();
        if let Some(token) = token {
            token.cancel();
        }
        if let Some(handle) = handle {
            let _ = handle.await;
        }
    }
}
