//! One bus member: a frame stream, its outbound queue and its two pumps.

use std::sync::Arc;

use log::{debug, trace, warn};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::core::Frame;
use crate::error::Error;
use crate::io::FrameStream;

/// A frame read from a member, tagged with the member's id.
#[derive(Debug)]
pub(super) struct Event {
    pub source: u64,
    pub frame: Frame,
}

pub(super) struct Member {
    id: u64,
    stream: Arc<dyn FrameStream>,
    outbound: mpsc::Sender<Frame>,
    /// Child of the bus shutdown token; cancelled when either pump stops.
    token: CancellationToken,
    tasks: Vec<JoinHandle<()>>,
}

impl Member {
    /// Creates the member and starts its inbound and outbound pumps.
    pub(super) fn spawn(
        id: u64,
        stream: Arc<dyn FrameStream>,
        frames: mpsc::Sender<Event>,
        token: CancellationToken,
        capacity: usize,
    ) -> Self {
        let (outbound, queue) = mpsc::channel(capacity);
        let tasks = vec![
            tokio::spawn(inbound_pump(id, stream.clone(), frames, token.clone())),
            tokio::spawn(outbound_pump(id, stream.clone(), queue, token.clone())),
        ];
        Self {
            id,
            stream,
            outbound,
            token,
            tasks,
        }
    }

    pub(super) fn id(&self) -> u64 {
        self.id
    }

    pub(super) fn is_closed(&self) -> bool {
        self.stream.is_closed()
    }

    /// Queues a frame for this member.
    ///
    /// Waits while the queue is full. Gives up if the bus shuts down or the
    /// member's pumps stop. Returns true if the frame was queued.
    pub(super) async fn deliver(&self, frame: Frame, shutdown: &CancellationToken) -> bool {
        if self.is_closed() {
            return false;
        }
        tokio::select! {
            _ = shutdown.cancelled() => false,
            _ = self.token.cancelled() => false,
            result = self.outbound.send(frame) => result.is_ok(),
        }
    }

    /// Stops the pumps of a member whose stream already closed.
    pub(super) fn cancel(&self) {
        self.token.cancel();
    }

    /// Closes the stream and stops the pumps. Returns the pump handles so
    /// the caller can wait for them.
    pub(super) async fn close(self) -> Vec<JoinHandle<()>> {
        if let Err(e) = self.stream.close().await {
            warn!("member {} close failed: {}", self.id, e);
        }
        self.token.cancel();
        self.tasks
    }
}

/// Moves frames from the member's stream onto the bus.
async fn inbound_pump(
    id: u64,
    stream: Arc<dyn FrameStream>,
    frames: mpsc::Sender<Event>,
    token: CancellationToken,
) {
    while !stream.is_closed() {
        let result = tokio::select! {
            _ = token.cancelled() => break,
            result = stream.read() => result,
        };
        match result {
            Ok(Some(frame)) => {
                let event = Event { source: id, frame };
                tokio::select! {
                    _ = token.cancelled() => break,
                    sent = frames.send(event) => if sent.is_err() {
                        break;
                    },
                }
            }
            Ok(None) => {}
            Err(Error::Closed) => debug!("member {} stream closed", id),
            Err(e) => warn!("frame read failed member_id={}: {}", id, e),
        }
        tokio::task::yield_now().await;
    }

    if let Err(e) = stream.close().await {
        warn!("member {} close failed: {}", id, e);
    }
    token.cancel();
    debug!("member {} inbound pump stopped", id);
}

/// Writes queued frames to the member's stream.
async fn outbound_pump(
    id: u64,
    stream: Arc<dyn FrameStream>,
    mut queue: mpsc::Receiver<Frame>,
    token: CancellationToken,
) {
    loop {
        let frame = tokio::select! {
            _ = token.cancelled() => break,
            frame = queue.recv() => match frame {
                Some(frame) => frame,
                None => break,
            },
        };
        if stream.is_closed() {
            trace!("dropping frame {} for closed member {}", frame, id);
            continue;
        }
        tokio::select! {
            _ = token.cancelled() => break,
            result = stream.write(&frame) => if let Err(e) = result {
                warn!("frame write failed member_id={}: {}", id, e);
            },
        }
    }
    debug!("member {} outbound pump stopped", id);
}
