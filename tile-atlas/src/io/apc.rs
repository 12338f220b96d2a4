//! Message passing between atlas workers and the orchestrator.
//!
//! Handoff is asynchronous, ordered and at-most-once; a value is owned by
//! exactly one side at any time, so no shared mutable memory crosses the
//! boundary.

use std::sync::mpsc::{self, Receiver, Sender};

use crate::{error::AtlasError, io::TileAtlas};

/// Handle through which a worker sends its results towards the orchestrator.
pub trait Context: 'static {
    fn send(&self, message: TileAtlas) -> Result<(), AtlasError>;
}

#[derive(Clone)]
pub struct ChannelContext {
    sender: Sender<TileAtlas>,
}

impl Context for ChannelContext {
    fn send(&self, message: TileAtlas) -> Result<(), AtlasError> {
        self.sender.send(message)?;
        Ok(())
    }
}

/// Orchestrator-side end of the handoff.
pub struct AtlasReceiver {
    receiver: Receiver<TileAtlas>,
}

impl AtlasReceiver {
    /// Non-blocking receive. `None` when no result is pending.
    pub fn receive(&self) -> Option<TileAtlas> {
        self.receiver.try_recv().ok()
    }
}

pub fn channel() -> (ChannelContext, AtlasReceiver) {
    let (sender, receiver) = mpsc::channel();
    (ChannelContext { sender }, AtlasReceiver { receiver })
}
