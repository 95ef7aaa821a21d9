use crate::state::AppState;
use std::sync::Arc;

/// Spawn a background task that polls the store fingerprint on the
/// configured interval and notifies connected sessions when it changes.
///
/// With `force_refresh` set, a notification goes out every interval whether
/// or not the content changed, bounding propagation latency the way the
/// unconditional sleep-and-rerun variant did.
pub fn spawn_store_watcher(state: Arc<AppState>) {
    tokio::spawn(async move {
        let mut last = state.store.fingerprint().await;

        loop {
            tokio::time::sleep(state.config.refresh_interval).await;

            let current = state.store.fingerprint().await;
            if current != last || state.config.force_refresh {
                last = current;
                // Send errors just mean nobody is connected
                let _ = state.refresh.send(());
            }
        }
    });
}
