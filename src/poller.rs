//! Head poller: notices appends made by other processes.
//!
//! Appends from other hosts are only visible through the filesystem, so a
//! background task re-reads the head every interval and publishes increases
//! on a watch channel for stream followers.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{info, warn};

use crate::store::{EventStore, Result};

pub struct HeadPoller {
    receiver: watch::Receiver<u64>,
    handle: Option<JoinHandle<()>>,
    // Held while polling is disabled so receivers wait instead of closing.
    idle: Option<watch::Sender<u64>>,
}

impl HeadPoller {
    /// Start polling `store` every `interval`; a zero interval never polls.
    pub async fn spawn(store: Arc<dyn EventStore>, interval: Duration) -> Result<Self> {
        let initial = {
            let store = Arc::clone(&store);
            tokio::task::spawn_blocking(move || store.head())
                .await
                .map_err(std::io::Error::other)??
        };
        let (sender, receiver) = watch::channel(initial);

        if interval.is_zero() {
            info!("Head polling disabled");
            return Ok(Self {
                receiver,
                handle: None,
                idle: Some(sender),
            });
        }
        info!(interval_ms = interval.as_millis() as u64, "Starting head poller");
        Ok(Self {
            receiver,
            handle: Some(tokio::spawn(poll(store, sender, interval))),
            idle: None,
        })
    }

    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.receiver.clone()
    }

    pub fn shutdown(self) {
        if let Some(handle) = self.handle {
            handle.abort();
        }
    }
}

async fn poll(store: Arc<dyn EventStore>, sender: watch::Sender<u64>, interval: Duration) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    loop {
        ticker.tick().await;
        if sender.is_closed() {
            break;
        }
        let reader = Arc::clone(&store);
        match tokio::task::spawn_blocking(move || reader.head()).await {
            Ok(Ok(head)) => {
                sender.send_if_modified(|current| {
                    if head > *current {
                        *current = head;
                        true
                    } else {
                        false
                    }
                });
            }
            Ok(Err(e)) => warn!(error = %e, "Failed to poll head"),
            Err(e) => {
                warn!(error = %e, "Head poll task failed");
                break;
            }
        }
    }
}
