//! Network reachability tracking.
//!
//! The monitor keeps the current [`Connectivity`] and broadcasts an event
//! only when it changes, so a poller reporting `Online` every tick produces a
//! single transition.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

use crate::api::ReachabilityProbe;

/// Capacity of the transition channel. Slow subscribers see `Lagged`.
const EVENT_CAPACITY: usize = 32;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Connectivity {
    Online,
    Offline,
}

impl std::fmt::Display for Connectivity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Connectivity::Online => write!(f, "online"),
            Connectivity::Offline => write!(f, "offline"),
        }
    }
}

impl From<bool> for Connectivity {
    fn from(reachable: bool) -> Self {
        if reachable {
            Connectivity::Online
        } else {
            Connectivity::Offline
        }
    }
}

/// Tracks `Online`/`Offline` state and notifies subscribers of transitions.
#[derive(Debug)]
pub struct ConnectivityMonitor {
    online: AtomicBool,
    events: broadcast::Sender<Connectivity>,
}

impl ConnectivityMonitor {
    pub fn new(initial: Connectivity) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            online: AtomicBool::new(initial == Connectivity::Online),
            events,
        }
    }

    /// Creates a monitor whose initial state is read from `probe`.
    pub async fn detect(probe: &dyn ReachabilityProbe) -> Self {
        let initial = Connectivity::from(probe.check().await);
        tracing::debug!("Initial connectivity: {}", initial);
        Self::new(initial)
    }

    pub fn state(&self) -> Connectivity {
        Connectivity::from(self.online.load(Ordering::SeqCst))
    }

    pub fn is_online(&self) -> bool {
        self.state() == Connectivity::Online
    }

    /// Records an observation. Returns `true` if it was a transition.
    pub fn set(&self, state: Connectivity) -> bool {
        let online = state == Connectivity::Online;
        let previous = self.online.swap(online, Ordering::SeqCst);
        if previous == online {
            return false;
        }

        match state {
            Connectivity::Online => tracing::info!("Network: online"),
            Connectivity::Offline => tracing::warn!("Network: offline"),
        }
        // No subscribers is fine
        let _ = self.events.send(state);
        true
    }

    /// Subscribes to state transitions.
    pub fn subscribe(&self) -> broadcast::Receiver<Connectivity> {
        self.events.subscribe()
    }

    /// Calls `handler` for every transition until the monitor is dropped.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn on_change<F>(&self, handler: F) -> JoinHandle<()>
    where
        F: Fn(Connectivity) + Send + 'static,
    {
        let mut rx = self.subscribe();
        tokio::spawn(async move {
            loop {
                match rx.recv().await {
                    Ok(state) => handler(state),
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        tracing::warn!("Connectivity handler lagged, {} events skipped", skipped);
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        })
    }

    /// Polls `probe` every `interval` and records each reading.
    pub fn watch(
        self: Arc<Self>,
        probe: Arc<dyn ReachabilityProbe>,
        interval: Duration,
    ) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                let reachable = probe.check().await;
                self.set(Connectivity::from(reachable));
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::ScriptedProbe;
    use std::sync::Mutex;

    #[test]
    fn test_set_reports_only_transitions() {
        let monitor = ConnectivityMonitor::new(Connectivity::Offline);
        let mut rx = monitor.subscribe();

        assert!(!monitor.set(Connectivity::Offline));
        assert!(monitor.set(Connectivity::Online));
        assert!(!monitor.set(Connectivity::Online));
        assert!(!monitor.set(Connectivity::Online));
        assert!(monitor.set(Connectivity::Offline));

        assert_eq!(rx.try_recv().unwrap(), Connectivity::Online);
        assert_eq!(rx.try_recv().unwrap(), Connectivity::Offline);
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_state_accessors() {
        let monitor = ConnectivityMonitor::new(Connectivity::Online);
        assert!(monitor.is_online());
        assert_eq!(monitor.state(), Connectivity::Online);

        monitor.set(Connectivity::Offline);
        assert!(!monitor.is_online());
        assert_eq!(monitor.state().to_string(), "offline");
    }

    #[tokio::test]
    async fn test_detect_reads_probe() {
        let online = ConnectivityMonitor::detect(&ScriptedProbe::new([true])).await;
        assert!(online.is_online());

        let offline = ConnectivityMonitor::detect(&ScriptedProbe::new([false])).await;
        assert!(!offline.is_online());
    }

    #[tokio::test]
    async fn test_on_change_invokes_handler() {
        let monitor = ConnectivityMonitor::new(Connectivity::Offline);
        let seen = Arc::new(Mutex::new(Vec::new()));

        let handle = monitor.on_change({
            let seen = seen.clone();
            move |state| seen.lock().unwrap().push(state)
        });

        monitor.set(Connectivity::Online);
        monitor.set(Connectivity::Offline);
        drop(monitor);
        handle.await.unwrap();

        assert_eq!(
            *seen.lock().unwrap(),
            vec![Connectivity::Online, Connectivity::Offline]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_watch_emits_once_per_transition() {
        let monitor = Arc::new(ConnectivityMonitor::new(Connectivity::Offline));
        let mut rx = monitor.subscribe();
        let probe = Arc::new(ScriptedProbe::new([false, true, true, true, false]));

        let handle = monitor
            .clone()
            .watch(probe.clone(), Duration::from_secs(1));

        assert_eq!(rx.recv().await.unwrap(), Connectivity::Online);
        assert_eq!(rx.recv().await.unwrap(), Connectivity::Offline);
        handle.abort();

        assert!(probe.calls() >= 5);
    }
}
