//! Fetch Handles
//!
//! A [`FetchHandle`] is the observable result of one request: pending until
//! the spawned task settles it as resolved or rejected. The state lives in a
//! tokio watch channel, so any number of observers can read it or wait for
//! it, and the handle clones cheaply.
//!
//! Every reload installs a fresh handle. A slow response from an older
//! request can only ever settle its own, already superseded, handle.

use std::future::Future;
use std::sync::Arc;
use tokio::sync::watch;

use super::error::{FetchError, FetchResult};

/// Lifecycle of a single request
#[derive(Debug, PartialEq)]
pub enum FetchState<T> {
    Pending,
    Resolved(Arc<T>),
    Rejected(FetchError),
}

impl<T> Clone for FetchState<T> {
    fn clone(&self) -> Self {
        match self {
            FetchState::Pending => FetchState::Pending,
            FetchState::Resolved(value) => FetchState::Resolved(Arc::clone(value)),
            FetchState::Rejected(err) => FetchState::Rejected(err.clone()),
        }
    }
}

impl<T> FetchState<T> {
    pub fn is_pending(&self) -> bool {
        matches!(self, FetchState::Pending)
    }

    pub fn is_resolved(&self) -> bool {
        matches!(self, FetchState::Resolved(_))
    }

    pub fn is_rejected(&self) -> bool {
        matches!(self, FetchState::Rejected(_))
    }

    pub fn value(&self) -> Option<&Arc<T>> {
        match self {
            FetchState::Resolved(value) => Some(value),
            _ => None,
        }
    }

    pub fn error(&self) -> Option<&FetchError> {
        match self {
            FetchState::Rejected(err) => Some(err),
            _ => None,
        }
    }

    /// Short label for logs and CLI output
    pub fn label(&self) -> &'static str {
        match self {
            FetchState::Pending => "pending",
            FetchState::Resolved(_) => "resolved",
            FetchState::Rejected(_) => "rejected",
        }
    }
}

/// Observable result of one fetch
#[derive(Debug)]
pub struct FetchHandle<T> {
    seq: u64,
    url: String,
    state: watch::Receiver<FetchState<T>>,
}

impl<T> Clone for FetchHandle<T> {
    fn clone(&self) -> Self {
        Self {
            seq: self.seq,
            url: self.url.clone(),
            state: self.state.clone(),
        }
    }
}

impl<T> FetchHandle<T>
where
    T: Send + Sync + 'static,
{
    /// Spawn `request` on the runtime and return its pending handle
    ///
    /// The caller never waits on the request; the task settles the handle
    /// when it completes. Must be called from within a tokio runtime.
    pub fn spawn<F>(seq: u64, url: impl Into<String>, request: F) -> Self
    where
        F: Future<Output = FetchResult<T>> + Send + 'static,
    {
        let url = url.into();
        let (tx, rx) = watch::channel(FetchState::Pending);

        let task_url = url.clone();
        tokio::spawn(async move {
            let state = match request.await {
                Ok(value) => {
                    tracing::debug!(seq, url = %task_url, "Fetch resolved");
                    FetchState::Resolved(Arc::new(value))
                }
                Err(err) => {
                    tracing::warn!(seq, url = %task_url, error = %err, "Fetch rejected");
                    FetchState::Rejected(err)
                }
            };
            // Nobody listening means the handle was superseded and dropped
            let _ = tx.send(state);
        });

        Self {
            seq,
            url,
            state: rx,
        }
    }
}

impl<T> FetchHandle<T> {
    /// Sequence number of the reload that issued this request
    pub fn seq(&self) -> u64 {
        self.seq
    }

    /// Full request URL, query included
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Snapshot of the current state
    pub fn state(&self) -> FetchState<T> {
        self.state.borrow().clone()
    }

    pub fn is_pending(&self) -> bool {
        self.state.borrow().is_pending()
    }

    /// Wait until the request resolves or rejects
    pub async fn settled(&self) -> FetchState<T> {
        let mut rx = self.state.clone();
        let settled = match rx.wait_for(|state| !state.is_pending()).await {
            Ok(state) => state.clone(),
            Err(_) => FetchState::Rejected(FetchError::Aborted),
        };
        settled
    }

    /// Receiver for observers that want every transition
    pub fn watch(&self) -> watch::Receiver<FetchState<T>> {
        self.state.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_resolves() {
        let handle = FetchHandle::spawn(1, "/a?from=x", async { Ok("body".to_string()) });
        assert_eq!(handle.seq(), 1);
        assert_eq!(handle.url(), "/a?from=x");

        let state = handle.settled().await;
        assert_eq!(state.value().map(|v| v.as_str()), Some("body"));
        assert!(handle.state().is_resolved());
    }

    #[tokio::test]
    async fn test_rejects() {
        let handle: FetchHandle<String> = FetchHandle::spawn(2, "/b", async {
            Err(FetchError::Status {
                status: 500,
                url: "/b".to_string(),
            })
        });

        let state = handle.settled().await;
        assert!(state.is_rejected());
        assert_eq!(state.label(), "rejected");
        assert!(matches!(state.error(), Some(FetchError::Status { status: 500, .. })));
    }

    #[tokio::test]
    async fn test_pending_until_settled() {
        let (release_tx, release_rx) = tokio::sync::oneshot::channel::<()>();
        let handle = FetchHandle::spawn(3, "/slow", async move {
            let _ = release_rx.await;
            Ok(42u32)
        });

        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(handle.is_pending());

        release_tx.send(()).unwrap();
        let state = handle.settled().await;
        assert_eq!(state.value().map(|v| **v), Some(42));
    }

    #[tokio::test]
    async fn test_clones_observe_same_request() {
        let handle = FetchHandle::spawn(4, "/c", async { Ok(vec![1, 2, 3]) });
        let observer = handle.clone();
        handle.settled().await;
        assert!(observer.state().is_resolved());
        assert!(!observer.watch().borrow().is_pending());
    }

    #[tokio::test]
    async fn test_task_panic_reports_aborted() {
        let handle: FetchHandle<String> = FetchHandle::spawn(5, "/panic", async {
            if true {
                panic!("transport bug");
            }
            Ok(String::new())
        });

        assert_eq!(
            handle.settled().await.error(),
            Some(&FetchError::Aborted)
        );
    }
}
