//! Helpers for optional channels.

use futures::channel::mpsc::{SendError, UnboundedSender};
use futures::sink::SinkExt;

/// Sends a value into `Option<UnboundedSender<T>>`. Nothing happens when the
/// sink is not set.
pub async fn maybe_send_unbounded<T>(
    chan: Option<UnboundedSender<T>>,
    value: T,
) -> Result<(), SendError> {
    match chan {
        Some(mut c) => c.send(value).await,
        None => Ok(()),
    }
}
