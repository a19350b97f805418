use tokio::sync::watch;
use tracing::info;

/// Publishes the process-wide online/offline flag.
#[derive(Debug)]
pub struct ConnectivityMonitor {
    tx: watch::Sender<bool>,
}

impl ConnectivityMonitor {
    pub fn new(online: bool) -> Self {
        let (tx, _rx) = watch::channel(online);
        Self { tx }
    }

    pub fn set_online(&self, online: bool) {
        let previous = self.tx.send_replace(online);
        if previous != online {
            info!(
                "Connectivity changed: {}",
                if online { "online" } else { "offline" }
            );
        }
    }

    pub fn handle(&self) -> Connectivity {
        Connectivity {
            rx: self.tx.subscribe(),
        }
    }
}

/// Read-only view of the connectivity flag handed to the orchestrator.
#[derive(Debug, Clone)]
pub struct Connectivity {
    rx: watch::Receiver<bool>,
}

impl Connectivity {
    /// A handle whose value never changes.
    pub fn fixed(online: bool) -> Self {
        let (_tx, rx) = watch::channel(online);
        Self { rx }
    }

    pub fn is_online(&self) -> bool {
        *self.rx.borrow()
    }

    /// Waits for the next change. Returns `None` once the monitor is gone.
    pub async fn changed(&mut self) -> Option<bool> {
        self.rx.changed().await.ok()?;
        Some(*self.rx.borrow_and_update())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_monitor_updates_handles() {
        let monitor = ConnectivityMonitor::new(true);
        let mut handle = monitor.handle();
        assert!(handle.is_online());

        monitor.set_online(false);
        assert_eq!(handle.changed().await, Some(false));
        assert!(!handle.is_online());
    }

    #[tokio::test]
    async fn test_fixed_handle() {
        let mut handle = Connectivity::fixed(false);
        assert!(!handle.is_online());
        assert_eq!(handle.changed().await, None);
    }
}
