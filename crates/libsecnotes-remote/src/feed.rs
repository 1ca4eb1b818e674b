//! Change feed over the shared table.

use std::time::Duration;

use libsecnotes_core::SerializedThread;
use sled::{Event, Subscriber};
use tracing::warn;

use crate::error::RemoteError;

/// One row change. `new_val` is `None` when the row was removed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Change {
    pub key: String,
    pub new_val: Option<SerializedThread>,
}

/// Stream of row changes on one table, starting from the moment of
/// subscription. Rows that do not decode are logged and skipped.
pub struct ChangeFeed {
    subscriber: Subscriber,
}

impl std::fmt::Debug for ChangeFeed {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChangeFeed").finish_non_exhaustive()
    }
}

impl ChangeFeed {
    pub(crate) fn new(subscriber: Subscriber) -> Self {
        Self { subscriber }
    }

    /// Block until the next decodable change
    pub fn next_change(&mut self) -> Result<Change, RemoteError> {
        loop {
            let event = self.subscriber.next().ok_or(RemoteError::FeedClosed)?;
            if let Some(change) = decode(event) {
                return Ok(change);
            }
        }
    }

    /// Like `next_change`, but gives up after `timeout` with `Ok(None)`
    pub fn next_change_timeout(&mut self, timeout: Duration) -> Result<Option<Change>, RemoteError> {
        loop {
            match self.subscriber.next_timeout(timeout) {
                Ok(event) => {
                    if let Some(change) = decode(event) {
                        return Ok(Some(change));
                    }
                }
                Err(std::sync::mpsc::RecvTimeoutError::Timeout) => return Ok(None),
                Err(std::sync::mpsc::RecvTimeoutError::Disconnected) => {
                    return Err(RemoteError::FeedClosed)
                }
            }
        }
    }

    /// Await the next decodable change
    pub async fn recv(&mut self) -> Result<Change, RemoteError> {
        loop {
            let event = (&mut self.subscriber).await.ok_or(RemoteError::FeedClosed)?;
            if let Some(change) = decode(event) {
                return Ok(change);
            }
        }
    }
}

fn decode(event: Event) -> Option<Change> {
    match event {
        Event::Insert { key, value } => {
            let key = String::from_utf8_lossy(&key).into_owned();
            match serde_json::from_slice::<SerializedThread>(&value) {
                Ok(thread) => Some(Change {
                    key,
                    new_val: Some(thread),
                }),
                Err(e) => {
                    warn!(row = %key, error = %e, "skipping malformed change");
                    None
                }
            }
        }
        Event::Remove { key } => Some(Change {
            key: String::from_utf8_lossy(&key).into_owned(),
            new_val: None,
        }),
    }
}
