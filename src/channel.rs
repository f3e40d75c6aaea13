// This file is part of TRINCI.
//
// Copyright (C) 2021 Affidaty Spa.
//
// TRINCI is free software: you can redistribute it and/or modify it under
// the terms of the GNU Affero General Public License as published by the
// Free Software Foundation, either version 3 of the License, or (at your
// option) any later version.
//
// TRINCI is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or
// FITNESS FOR A PARTICULAR PURPOSE. See the GNU Affero General Public License
// for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with TRINCI. If not, see <https://www.gnu.org/licenses/>.

//! Stop channel used to shut down background workers.
//!
//! Built on top of async-std channel. The [StopSender] is held by the service
//! that spawned the worker, the [StopReceiver] is polled by the worker loop
//! between ticks. Dropping every sender counts as a stop request.

use async_std::{
    channel::{self as async_channel, Receiver as AsyncReceiver, Sender as AsyncSender, TryRecvError},
    task,
};
use std::fmt::Display;

/// A single pending stop request is enough.
const CHANNEL_BOUND: usize = 1;

/// Errors which can be triggered by a channel.
#[derive(Debug, PartialEq, Eq)]
pub enum ChannelError {
    /// Error during send. Broken channel.
    SendError,
}

impl std::error::Error for ChannelError {}

impl Display for ChannelError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let msg = match self {
            ChannelError::SendError => "channel send error",
        };
        write!(f, "{}", msg)
    }
}

/// Creates a stop channel.
pub fn stop_channel() -> (StopSender, StopReceiver) {
    let (sender, receiver) = async_channel::bounded::<()>(CHANNEL_BOUND);
    (StopSender(sender), StopReceiver(receiver))
}

/// Stop channel sender side.
#[derive(Clone)]
pub struct StopSender(AsyncSender<()>);

impl StopSender {
    /// Request the worker to stop.
    /// A request already queued is not an error.
    pub async fn stop(&self) -> Result<(), ChannelError> {
        match self.0.try_send(()) {
            Ok(()) | Err(async_channel::TrySendError::Full(())) => Ok(()),
            Err(async_channel::TrySendError::Closed(())) => Err(ChannelError::SendError),
        }
    }

    /// Request the worker to stop, synchronous wrapper.
    pub fn stop_sync(&self) -> Result<(), ChannelError> {
        task::block_on(self.stop())
    }
}

/// Stop channel receiver side.
#[derive(Clone)]
pub struct StopReceiver(AsyncReceiver<()>);

impl StopReceiver {
    /// Wait until a stop is requested or every sender is gone.
    pub async fn wait(&self) {
        let _ = self.0.recv().await;
    }

    /// Non blocking check.
    pub fn is_stopped(&self) -> bool {
        !matches!(self.0.try_recv(), Err(TryRecvError::Empty))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stop_request() {
        let (tx_chan, rx_chan) = stop_channel();
        assert!(!rx_chan.is_stopped());

        tx_chan.stop_sync().unwrap();

        assert!(rx_chan.is_stopped());
    }

    #[test]
    fn repeated_stop_request() {
        let (tx_chan, rx_chan) = stop_channel();

        tx_chan.stop_sync().unwrap();
        tx_chan.stop_sync().unwrap();

        task::block_on(rx_chan.wait());
    }

    #[test]
    fn dropped_sender_is_a_stop() {
        let (tx_chan, rx_chan) = stop_channel();

        drop(tx_chan);

        task::block_on(rx_chan.wait());
        assert!(rx_chan.is_stopped());
    }

    #[test]
    fn stop_closed_receiver() {
        let (tx_chan, _) = stop_channel();

        let err = tx_chan.stop_sync().unwrap_err();

        assert_eq!(err, ChannelError::SendError);
    }
}
