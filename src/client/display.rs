use reqwest::Url;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, warn};

use super::{fetch_selected, parse_base_url, ClientError};

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(500);

/// Polls the selection for a display and publishes every change.
///
/// Displays never log in. When the server cannot be reached the display is
/// told that nothing is selected, so it blanks instead of showing stale media.
pub struct DisplayPoller {
    client: reqwest::Client,
    base_url: Url,
    interval: Duration,
}

impl DisplayPoller {
    pub fn new(base_url: &str) -> Result<Self, ClientError> {
        Self::with_interval(base_url, DEFAULT_POLL_INTERVAL)
    }

    pub fn with_interval(base_url: &str, interval: Duration) -> Result<Self, ClientError> {
        let client = reqwest::Client::builder()
            .timeout(interval.max(Duration::from_secs(2)))
            .build()?;
        Ok(Self {
            client,
            base_url: parse_base_url(base_url)?,
            interval,
        })
    }

    pub async fn poll_once(&self) -> Result<Option<String>, ClientError> {
        fetch_selected(&self.client, &self.base_url).await
    }

    /// Starts polling in the background. The task ends once every receiver
    /// has been dropped.
    pub fn spawn(self) -> (watch::Receiver<Option<String>>, JoinHandle<()>) {
        let (tx, rx) = watch::channel(None);
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(self.interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                if tx.is_closed() {
                    debug!("No display left, polling stopped");
                    break;
                }

                let selected = match self.poll_once().await {
                    Ok(selected) => selected,
                    Err(err) => {
                        warn!("Could not poll selection: {}", err);
                        None
                    }
                };
                tx.send_if_modified(|current| {
                    if *current != selected {
                        debug!("Selection changed to {:?}", selected);
                        *current = selected;
                        true
                    } else {
                        false
                    }
                });
            }
        });
        (rx, handle)
    }
}
