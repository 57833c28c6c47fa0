//! # Network Module
//!
//! Outbound half of the bridge: the transport that publishes encoded batches
//! to the native peer, and the command queue that coalesces commands into
//! batches.

use log::{debug, info};
use nbridge_shared::Command;
use std::mem;

/// Sink for encoded outbound batches
///
/// The platform supplies one implementation (JNI call, C function pointer,
/// in-process test peer). It receives each batch exactly once.
pub trait Transport {
    fn dispatch(&self, batch: &[u8]) -> Result<(), String>;
}

impl<F> Transport for F
where
    F: Fn(&[u8]) -> Result<(), String>,
{
    fn dispatch(&self, batch: &[u8]) -> Result<(), String> {
        self(batch)
    }
}

/// Outgoing commands waiting for the next flush
///
/// `pending` counts flush checks that were requested and have not run yet.
/// A check decrements it and releases the batch only once it reaches zero,
/// so every command enqueued before the last check goes out together.
#[derive(Debug, Default)]
pub struct CommandQueue {
    commands: Vec<Command>,
    pending: usize,
}

impl CommandQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a command and count the flush check it will schedule
    pub fn push(&mut self, command: Command) {
        debug!("Queued '{}' command ({} queued)", command.kind(), self.commands.len() + 1);
        self.commands.push(command);
        self.pending += 1;
    }

    /// Count a flush check that is not tied to a new command
    pub fn request_flush(&mut self) {
        self.pending += 1;
    }

    /// Run one flush check; returns the batch to send when the queue is due.
    ///
    /// The queue is emptied before the batch is returned, so commands
    /// enqueued while it is being sent start a new batch.
    pub fn check(&mut self, now: bool) -> Option<Vec<Command>> {
        self.pending = self.pending.saturating_sub(1);
        if self.commands.is_empty() || !(self.pending == 0 || now) {
            return None;
        }
        Some(mem::take(&mut self.commands))
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    /// Flush checks still outstanding
    pub fn pending(&self) -> usize {
        self.pending
    }
}

/// Log a batch as JSON, one command per line
pub(crate) fn dump_batch(direction: &str, commands: &[Command]) {
    let lines: Vec<String> = commands.iter().map(Command::to_json).collect();
    info!("======== {} ========\n{}\n===========================", direction, lines.join("\n"));
}

#[cfg(test)]
mod tests {
    use super::*;

    fn delete(id: i64) -> Command {
        Command::Delete { target_id: id }
    }

    #[test]
    fn last_check_releases_the_batch() {
        let mut queue = CommandQueue::new();
        queue.push(delete(1));
        queue.push(delete(2));
        queue.push(delete(3));
        assert_eq!(queue.pending(), 3);

        assert!(queue.check(false).is_none());
        assert!(queue.check(false).is_none());
        let batch = queue.check(false).unwrap();
        assert_eq!(batch, vec![delete(1), delete(2), delete(3)]);
        assert!(queue.is_empty());
        assert_eq!(queue.pending(), 0);
    }

    #[test]
    fn forced_check_flushes_while_checks_outstanding() {
        let mut queue = CommandQueue::new();
        queue.push(delete(1));
        queue.push(delete(2));
        queue.request_flush();

        assert_eq!(queue.check(true).unwrap().len(), 2);
        assert_eq!(queue.pending(), 2);

        // Outstanding checks find nothing to send
        assert!(queue.check(false).is_none());
        assert!(queue.check(false).is_none());
        assert_eq!(queue.pending(), 0);
    }

    #[test]
    fn empty_queue_never_flushes() {
        let mut queue = CommandQueue::new();
        assert!(queue.check(true).is_none());
        assert!(queue.check(false).is_none());
        assert_eq!(queue.pending(), 0);
    }

    #[test]
    fn closures_are_transports() {
        let transport = |batch: &[u8]| if batch.is_empty() { Err("empty".to_string()) } else { Ok(()) };
        assert!(transport.dispatch(&[0x90]).is_ok());
        assert_eq!(Transport::dispatch(&transport, &[]), Err("empty".to_string()));
    }
}
