use anyhow::Result;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{timeout, Duration};
use tracing::{debug, error, warn};

/// How long a task gets to notice shutdown before it is aborted
pub const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

/// Background tasks of a voter process plus the flag that stops them.
pub struct ServiceHandle {
    shutdown_tx: watch::Sender<bool>,
    tasks: Vec<(&'static str, JoinHandle<Result<()>>)>,
}

impl ServiceHandle {
    /// New handle and a receiver for tasks to watch.
    pub fn new() -> (Self, watch::Receiver<bool>) {
        let (tx, rx) = watch::channel(false);
        (ServiceHandle { shutdown_tx: tx, tasks: Vec::new() }, rx)
    }

    pub fn attach(&mut self, name: &'static str, h: JoinHandle<Result<()>>) {
        self.tasks.push((name, h));
    }

    pub fn shutdown_rx(&self) -> watch::Receiver<bool> {
        self.shutdown_tx.subscribe()
    }

    /// Flip the shutdown flag, then join each task, aborting stragglers.
    pub async fn shutdown(self) -> Result<()> {
        let _ = self.shutdown_tx.send(true);

        for (name, mut h) in self.tasks {
            match timeout(SHUTDOWN_GRACE, &mut h).await {
                Ok(Ok(Ok(()))) => debug!("{} stopped", name),
                Ok(Ok(Err(e))) => error!("{} returned error: {:?}", name, e),
                Ok(Err(e)) => error!("{} join error: {:?}", name, e),
                Err(_) => {
                    warn!("{} ignored shutdown; aborting", name);
                    h.abort();
                }
            }
        }
        Ok(())
    }
}
