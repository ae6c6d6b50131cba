//! History Synchronizer
//!
//! Keeps the store's time range in step with back/forward navigation. Each
//! pop-state event reapplies the range carried by the new location as a
//! silent update, so no history entry is added while walking the history.

use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;

use super::Store;

/// Background task applying pop-state events to a store
pub struct HistorySync;

impl HistorySync {
    /// Subscribe to the store's history and apply every pop-state event
    ///
    /// The subscription is taken before this returns, so navigation right
    /// after the call is not missed. The task runs until the history stops
    /// emitting or the returned handle is aborted.
    pub fn spawn(store: Store) -> JoinHandle<()> {
        let mut pop_rx = store.history().subscribe();

        tokio::spawn(async move {
            loop {
                match pop_rx.recv().await {
                    Ok(pop) => {
                        tracing::debug!(location = %pop.location, "Applying pop state");
                        apply(&store).await;
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        // Only the latest location matters
                        tracing::warn!(skipped, "History sync lagged, replaying current location");
                        apply(&store).await;
                    }
                    Err(RecvError::Closed) => {
                        tracing::debug!("History closed, stopping sync");
                        break;
                    }
                }
            }
        })
    }
}

async fn apply(store: &Store) {
    if let Err(e) = store.on_pop_state().await {
        tracing::warn!(error = %e, "Ignoring pop state, keeping previous range");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::tests::{settle_all, setup, wait_for};
    use crate::store::StoreEvent;
    use crate::registry::{DataSourceDescriptor, SourceKind};
    use crate::time::TimeRange;
    use crate::url::History;

    #[tokio::test]
    async fn test_back_navigation_applies_silently() {
        let (store, transport, history) = setup("/server/1");
        store
            .register(DataSourceDescriptor::new("a", SourceKind::from("grid"), "/a"))
            .await
            .unwrap();
        let sync = HistorySync::spawn(store.clone());

        store.set_from_to("now-24h", "now", false).await.unwrap();
        store.set_from_to("now-6h", "now", false).await.unwrap();
        settle_all(&store).await;
        assert_eq!(history.len(), 3);
        assert_eq!(transport.requests_to("/a").len(), 2);

        let mut rx = store.subscribe();
        assert!(history.back());

        let event = wait_for(&mut rx, |e| matches!(e, StoreEvent::RangeChanged { .. })).await;
        assert_eq!(
            event,
            StoreEvent::RangeChanged {
                range: TimeRange::new("now-24h", "now"),
                silent: true
            }
        );
        wait_for(&mut rx, |e| matches!(e, StoreEvent::DataReloaded { .. })).await;
        settle_all(&store).await;

        assert_eq!(store.time_range().await, TimeRange::new("now-24h", "now"));
        assert_eq!(history.len(), 3);
        assert_eq!(history.search(), "?from=now-24h&to=now");
        assert_eq!(transport.requests_to("/a").len(), 3);

        sync.abort();
    }

    #[tokio::test]
    async fn test_invalid_location_keeps_previous_range() {
        let (store, _, history) = setup("/?from=bogus&to=now");
        let sync = HistorySync::spawn(store.clone());

        store.set_from_to("now-2h", "now", false).await.unwrap();
        let mut rx = store.subscribe();
        assert!(history.back());

        // Walk forward again to get an event we can wait on
        assert!(history.forward());
        let event = wait_for(&mut rx, |e| matches!(e, StoreEvent::RangeChanged { .. })).await;
        assert_eq!(
            event,
            StoreEvent::RangeChanged {
                range: TimeRange::new("now-2h", "now"),
                silent: true
            }
        );

        assert_eq!(store.time_range().await, TimeRange::new("now-2h", "now"));
        assert_eq!(history.len(), 2);

        sync.abort();
    }
}
