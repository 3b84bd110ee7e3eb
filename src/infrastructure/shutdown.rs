use tokio::sync::watch;

/// Process-wide stop flag. Cloning shares the same flag.
#[derive(Clone)]
pub struct Shutdown {
    sender: watch::Sender<bool>,
}

#[derive(Clone)]
pub struct ShutdownListener {
    receiver: watch::Receiver<bool>,
}

impl Shutdown {
    pub fn new() -> Self {
        let (sender, _) = watch::channel(false);
        Self { sender }
    }

    pub fn subscribe(&self) -> ShutdownListener {
        ShutdownListener {
            receiver: self.sender.subscribe(),
        }
    }

    pub fn trigger(&self, reason: &str) {
        if !self.sender.send_replace(true) {
            tracing::info!(target: "lifecycle", reason, "shutdown requested");
        }
    }

    pub fn is_triggered(&self) -> bool {
        *self.sender.borrow()
    }
}

impl Default for Shutdown {
    fn default() -> Self {
        Self::new()
    }
}

impl ShutdownListener {
    pub async fn notified(&mut self) {
        let _ = self.receiver.wait_for(|stopped| *stopped).await;
    }

    pub fn is_triggered(&self) -> bool {
        *self.receiver.borrow()
    }
}

/// Triggers `shutdown` on Ctrl-C, and on SIGTERM where available.
pub fn install_signal_handlers(shutdown: Shutdown) {
    tokio::spawn(async move {
        #[cfg(unix)]
        {
            use tokio::signal::unix::{SignalKind, signal};
            match signal(SignalKind::terminate()) {
                Ok(mut term) => tokio::select! {
                    _ = tokio::signal::ctrl_c() => shutdown.trigger("ctrl-c"),
                    _ = term.recv() => shutdown.trigger("SIGTERM"),
                },
                Err(err) => {
                    tracing::warn!(target: "lifecycle", error = %err, "SIGTERM handler unavailable");
                    if tokio::signal::ctrl_c().await.is_ok() {
                        shutdown.trigger("ctrl-c");
                    }
                }
            }
        }
        #[cfg(not(unix))]
        if tokio::signal::ctrl_c().await.is_ok() {
            shutdown.trigger("ctrl-c");
        }
    });
}
