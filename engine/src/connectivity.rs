//! Connectivity signal.
//!
//! [`Connectivity`] holds the current online flag and lets any number of
//! listeners observe transitions. Whoever knows about the network (a
//! platform hook, or the [`ConnectivityProbe`]) calls
//! [`Connectivity::set_online`].

use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;

/// Shared online/offline flag with change notification.
#[derive(Debug, Clone)]
pub struct Connectivity {
    sender: watch::Sender<bool>,
}

impl Connectivity {
    /// Create a signal with the given initial state.
    pub fn new(online: bool) -> Self {
        let (sender, _) = watch::channel(online);
        Self { sender }
    }

    /// Current state.
    pub fn is_online(&self) -> bool {
        *self.sender.borrow()
    }

    /// Publish a new state. Listeners are only woken on an actual change.
    pub fn set_online(&self, online: bool) {
        let changed = self.sender.send_if_modified(|current| {
            if *current == online {
                false
            } else {
                *current = online;
                true
            }
        });

        if changed {
            tracing::debug!(online, "Connectivity changed");
        }
    }

    /// Receiver observing future transitions.
    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.sender.subscribe()
    }
}

impl Default for Connectivity {
    fn default() -> Self {
        Self::new(true)
    }
}

/// Derives connectivity from a health endpoint.
///
/// Polls `url` every `interval`; any 2xx response means online, anything
/// else (error status, timeout, refused connection) means offline.
#[derive(Debug)]
pub struct ConnectivityProbe {
    handle: JoinHandle<()>,
}

impl ConnectivityProbe {
    /// Start probing. Must be called inside a Tokio runtime.
    pub fn spawn(connectivity: Connectivity, url: impl Into<String>, interval: Duration) -> Self {
        let url = url.into();
        let client = reqwest::Client::builder()
            .timeout(interval)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

            loop {
                ticker.tick().await;

                let online = match client.get(&url).send().await {
                    Ok(response) => response.status().is_success(),
                    Err(e) => {
                        tracing::trace!(error = %e, "Health probe failed");
                        false
                    }
                };

                connectivity.set_online(online);
            }
        });

        Self { handle }
    }

    /// Stop probing. The last published state is kept.
    pub fn stop(&self) {
        self.handle.abort();
    }
}

impl Drop for ConnectivityProbe {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn set_online_notifies_on_change_only() {
        let connectivity = Connectivity::new(false);
        let mut rx = connectivity.subscribe();

        connectivity.set_online(false);
        assert!(!rx.has_changed().unwrap());

        connectivity.set_online(true);
        assert!(rx.has_changed().unwrap());
        assert!(*rx.borrow_and_update());
        assert!(connectivity.is_online());
    }

    #[tokio::test]
    async fn clones_share_state() {
        let a = Connectivity::new(true);
        let b = a.clone();
        b.set_online(false);
        assert!(!a.is_online());
    }

    #[tokio::test]
    async fn probe_marks_unreachable_host_offline() {
        let connectivity = Connectivity::new(true);
        let mut rx = connectivity.subscribe();

        let probe = ConnectivityProbe::spawn(
            connectivity.clone(),
            "http://127.0.0.1:9/health",
            Duration::from_millis(200),
        );

        tokio::time::timeout(Duration::from_secs(5), rx.changed())
            .await
            .unwrap()
            .unwrap();
        assert!(!connectivity.is_online());
        probe.stop();
    }
}
