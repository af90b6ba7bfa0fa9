// Crate implementing the Engineering Principles of Channels

use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc, Mutex, PoisonError,
};
use std::time::{Duration, Instant};

use crossbeam::channel;
use thiserror::Error;

pub type Result<T> = anyhow::Result<T, ChannelError>;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ChannelError {
    #[error("Channel has being closed")]
    Closed,

    #[error("Channel buffer is full, no receiver made room yet")]
    Full,

    #[error("Channel has no receivers left to deliver to")]
    Disconnected,

    #[error("Channel sent nothing, possibly closed")]
    ReceivedNoData,

    #[error("Timed out waiting for channel data")]
    Timeout,
}

/// Capacity describes how many not-yet-consumed values a channel
/// holds before the producer is suspended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Capacity {
    /// Sends never block, the buffer grows as needed.
    Unbounded,

    /// Sends block once `n` values wait unconsumed.
    Bounded(usize),

    /// Every send waits for a receiver to take the value.
    Rendezvous,
}

impl Capacity {
    /// slots returns the number of buffered values allowed before
    /// a sender blocks, `None` when unbounded.
    #[must_use]
    pub fn slots(&self) -> Option<usize> {
        match self {
            Self::Unbounded => None,
            Self::Bounded(n) => Some(*n),
            Self::Rendezvous => Some(0),
        }
    }
}

impl From<usize> for Capacity {
    fn from(value: usize) -> Self {
        if value == 0 {
            Self::Rendezvous
        } else {
            Self::Bounded(value)
        }
    }
}

/// create builds a channel of the given capacity, a `Bounded(0)`
/// request is treated as [`Capacity::Rendezvous`].
pub fn create<T>(capacity: Capacity) -> (SendChannel<T>, ReceiveChannel<T>) {
    let capacity = match capacity {
        Capacity::Bounded(0) => Capacity::Rendezvous,
        other => other,
    };

    let (tx, rx) = match capacity.slots() {
        None => channel::unbounded::<T>(),
        Some(slots) => channel::bounded::<T>(slots),
    };

    let closed = Arc::new(AtomicBool::new(false));
    let sender = SendChannel::new(tx, closed.clone(), capacity);
    let receiver = ReceiveChannel::new(rx, closed);
    (sender, receiver)
}

pub fn unbounded<T>() -> (SendChannel<T>, ReceiveChannel<T>) {
    create(Capacity::Unbounded)
}

/// A `bounded(0)` call is the same as [`rendezvous`].
pub fn bounded<T>(slots: usize) -> (SendChannel<T>, ReceiveChannel<T>) {
    create(Capacity::from(slots))
}

pub fn rendezvous<T>() -> (SendChannel<T>, ReceiveChannel<T>) {
    create(Capacity::Rendezvous)
}

/// `SendChannel` is the producing half of a channel.
///
/// Clones share a single sending side: once any handle closes the
/// channel it is closed for every clone, further sends are a
/// programming error and receivers observe the end of the stream as
/// soon as the buffer is drained.
pub struct SendChannel<T> {
    closed: Arc<AtomicBool>,
    capacity: Capacity,
    src: Arc<Mutex<Option<channel::Sender<T>>>>,
}

impl<T> Clone for SendChannel<T> {
    fn clone(&self) -> Self {
        Self {
            closed: self.closed.clone(),
            capacity: self.capacity,
            src: self.src.clone(),
        }
    }
}

impl<T> SendChannel<T> {
    fn new(src: channel::Sender<T>, closed: Arc<AtomicBool>, capacity: Capacity) -> Self {
        Self {
            closed,
            capacity,
            src: Arc::new(Mutex::new(Some(src))),
        }
    }

    /// live_sender hands out a copy of the shared sender while the
    /// channel is open. The copy is released once the send it serves
    /// returns, the lock is never held across a blocking send.
    fn live_sender(&self) -> Option<channel::Sender<T>> {
        if self.is_closed() {
            return None;
        }
        self.src
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    #[must_use]
    pub fn capacity(&self) -> Capacity {
        self.capacity
    }

    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    pub fn pending_message_count(&self) -> Result<usize> {
        self.live_sender()
            .map(|src| src.len())
            .ok_or(ChannelError::Closed)
    }

    /// [`SendChannel::send`] blocks the current thread till the value is
    /// buffered, or for a rendezvous channel, till a receiver takes it.
    ///
    /// Returns [`ChannelError::Disconnected`] when every receiver is gone.
    ///
    /// # Panics
    ///
    /// Sending on a closed channel is a programming error and panics.
    pub fn send(&self, t: T) -> Result<()> {
        match self.block_send(t) {
            Err(ChannelError::Closed) => panic!("send on closed channel"),
            other => other,
        }
    }

    /// [`SendChannel::block_send`] is the non-panicking form of
    /// [`SendChannel::send`], a closed channel is reported as
    /// [`ChannelError::Closed`].
    pub fn block_send(&self, t: T) -> Result<()> {
        let src = self.live_sender().ok_or(ChannelError::Closed)?;
        src.send(t).map_err(|_| ChannelError::Disconnected)
    }

    /// [`SendChannel::try_send`] never blocks, a full buffer (or a rendezvous
    /// channel without a waiting receiver) gives [`ChannelError::Full`].
    pub fn try_send(&self, t: T) -> Result<()> {
        let src = self.live_sender().ok_or(ChannelError::Closed)?;
        match src.try_send(t) {
            Ok(()) => Ok(()),
            Err(channel::TrySendError::Full(_)) => Err(ChannelError::Full),
            Err(channel::TrySendError::Disconnected(_)) => Err(ChannelError::Disconnected),
        }
    }

    /// close marks the channel as closed for every clone and releases the
    /// shared sending side. The transition happens once and cannot be
    /// undone.
    ///
    /// # Panics
    ///
    /// Closing an already closed channel is a programming error and panics.
    pub fn close(&mut self) {
        if self.try_close().is_err() {
            panic!("close of closed channel");
        }
    }

    pub fn try_close(&mut self) -> Result<()> {
        if self.closed.swap(true, Ordering::AcqRel) {
            return Err(ChannelError::Closed);
        }

        // receivers disconnect once drained and in-flight sends returned
        drop(self.src.lock().unwrap_or_else(PoisonError::into_inner).take());
        tracing::debug!("Channel closed");
        Ok(())
    }
}

/// `ReceiveChannel` is the consuming half of a channel. Clones compete
/// for values: each value is delivered to exactly one receiver.
pub struct ReceiveChannel<T> {
    closed: Arc<AtomicBool>,
    src: channel::Receiver<T>,
}

impl<T> Clone for ReceiveChannel<T> {
    fn clone(&self) -> Self {
        Self {
            closed: self.closed.clone(),
            src: self.src.clone(),
        }
    }
}

impl<T> ReceiveChannel<T> {
    fn new(src: channel::Receiver<T>, closed: Arc<AtomicBool>) -> Self {
        Self { closed, src }
    }

    /// is_closed reports whether a sender closed the channel, there
    /// might still be buffered values left to drain.
    ///
    /// Receiving from a closed and drained channel returns
    /// [`ChannelError::Closed`] even while sender clones are alive.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.src.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.src.len()
    }

    /// [`ReceiveChannel::block_receive`] blocks the current thread till data
    /// is received, or the channel is closed and drained.
    pub fn block_receive(&self) -> Result<T> {
        self.src.recv().map_err(|_| ChannelError::Closed)
    }

    pub fn try_receive(&self) -> Result<T> {
        match self.src.try_recv() {
            Ok(item) => Ok(item),
            Err(channel::TryRecvError::Empty) => Err(ChannelError::ReceivedNoData),
            Err(channel::TryRecvError::Disconnected) => Err(ChannelError::Closed),
        }
    }

    pub fn receive_timeout(&self, timeout: Duration) -> Result<T> {
        match self.src.recv_timeout(timeout) {
            Ok(item) => Ok(item),
            Err(channel::RecvTimeoutError::Timeout) => Err(ChannelError::Timeout),
            Err(channel::RecvTimeoutError::Disconnected) => Err(ChannelError::Closed),
        }
    }

    pub fn receive_deadline(&self, deadline: Instant) -> Result<T> {
        match self.src.recv_deadline(deadline) {
            Ok(item) => Ok(item),
            Err(channel::RecvTimeoutError::Timeout) => Err(ChannelError::Timeout),
            Err(channel::RecvTimeoutError::Disconnected) => Err(ChannelError::Closed),
        }
    }

    /// iter lazily yields values till the channel is closed and drained.
    pub fn iter(&self) -> channel::Iter<'_, T> {
        self.src.iter()
    }
}

impl<T> IntoIterator for ReceiveChannel<T> {
    type Item = T;
    type IntoIter = channel::IntoIter<T>;

    fn into_iter(self) -> Self::IntoIter {
        self.src.into_iter()
    }
}

impl<'a, T> IntoIterator for &'a ReceiveChannel<T> {
    type Item = T;
    type IntoIter = channel::Iter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.src.iter()
    }
}
