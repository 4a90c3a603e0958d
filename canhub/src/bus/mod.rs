//! The frame relay bus.
//!
//! Every frame read from one member is written to every other member. A
//! single dispatcher task owns the member table; pumps talk to it through
//! channels only.
//!
//! ```text
//!              ┌──────────── dispatcher ────────────┐
//!  member A ──▶│ inbound queue ──▶ fan-out ──▶ outbound queue B ──▶ member B
//!  member B ──▶│                           └─▶ outbound queue C ──▶ member C
//!  member C ──▶│                                                    │
//!              └────────────────────────────────────────────────────┘
//! ```
//!
//! Frames from one member reach each other member in the order they were
//! read. Frames from different members have no relative order. A member
//! whose outbound queue is full holds up fan-out until it catches up, so
//! frames are never dropped for an open member.

mod member;

use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

use log::{debug, info, trace, warn};
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::config::BusConfig;
use crate::io::FrameStream;

use member::{Event, Member};

/// Point-in-time bus counters.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct BusStats {
    /// Members currently in the table.
    pub members: usize,
    /// Streams accepted as members since the bus started.
    pub registered: u64,
    /// Members removed because their stream closed.
    pub evicted: u64,
    /// Frames read from members.
    pub frames_received: u64,
    /// Frame copies queued for delivery to other members.
    pub frames_queued: u64,
}

#[derive(Debug, Default)]
struct Counters {
    members: AtomicUsize,
    registered: AtomicU64,
    evicted: AtomicU64,
    frames_received: AtomicU64,
    frames_queued: AtomicU64,
}

impl Counters {
    fn snapshot(&self) -> BusStats {
        BusStats {
            members: self.members.load(Ordering::Relaxed),
            registered: self.registered.load(Ordering::Relaxed),
            evicted: self.evicted.load(Ordering::Relaxed),
            frames_received: self.frames_received.load(Ordering::Relaxed),
            frames_queued: self.frames_queued.load(Ordering::Relaxed),
        }
    }
}

/// Relays frames between any number of frame streams.
///
/// The bus starts running as soon as it is created. Streams join with
/// [`FrameBus::add`] and leave when they close. [`FrameBus::close`] stops
/// the bus and closes every member.
pub struct FrameBus {
    registrations: mpsc::UnboundedSender<Arc<dyn FrameStream>>,
    shutdown: CancellationToken,
    /// Cancelled once the dispatcher has closed every member.
    stopped: CancellationToken,
    dispatcher: Mutex<Option<JoinHandle<()>>>,
    counters: Arc<Counters>,
}

impl FrameBus {
    /// Creates a bus and starts its dispatcher.
    ///
    /// # Panics
    ///
    /// Panics if called outside a tokio runtime.
    pub fn new(config: BusConfig) -> Self {
        let (registrations, registrations_rx) = mpsc::unbounded_channel();
        let (frames_tx, frames_rx) = mpsc::channel(config.inbound_capacity);
        let shutdown = CancellationToken::new();
        let stopped = CancellationToken::new();
        let counters = Arc::new(Counters::default());

        let dispatcher = Dispatcher {
            members: BTreeMap::new(),
            next_id: 0,
            config,
            frames_tx,
            shutdown: shutdown.clone(),
            counters: counters.clone(),
        };
        let handle = tokio::spawn(dispatcher.run(registrations_rx, frames_rx, stopped.clone()));
        info!(
            "frame bus started outbound_capacity={} inbound_capacity={}",
            config.outbound_capacity, config.inbound_capacity
        );

        Self {
            registrations,
            shutdown,
            stopped,
            dispatcher: Mutex::new(Some(handle)),
            counters,
        }
    }

    /// Adds a stream to the bus.
    ///
    /// Returns immediately; the dispatcher activates the member shortly
    /// after. Does nothing if the bus is closed. A stream that is already
    /// closed when the dispatcher gets to it is never activated.
    pub fn add(&self, stream: Arc<dyn FrameStream>) {
        if self.is_closed() || self.shutdown.is_cancelled() {
            debug!("bus closed, ignoring new stream");
            return;
        }
        if self.registrations.send(stream).is_err() {
            debug!("bus closed, ignoring new stream");
        }
    }

    /// Stops the bus and closes every member stream.
    ///
    /// Waits until all member pumps have stopped. Concurrent and repeated
    /// calls all return once that has happened.
    pub async fn close(&self) {
        self.shutdown.cancel();
        let handle = self.dispatcher.lock().take();
        match handle {
            Some(handle) => {
                if let Err(e) = handle.await {
                    warn!("frame bus dispatcher failed: {}", e);
                }
                self.stopped.cancel();
                info!("frame bus closed");
            }
            None => self.stopped.cancelled().await,
        }
    }

    /// Returns true once the bus has stopped.
    pub fn is_closed(&self) -> bool {
        self.stopped.is_cancelled()
    }

    pub fn stats(&self) -> BusStats {
        self.counters.snapshot()
    }
}

impl Drop for FrameBus {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

/// Owns the member table. Runs as one task for the life of the bus.
struct Dispatcher {
    members: BTreeMap<u64, Member>,
    next_id: u64,
    config: BusConfig,
    frames_tx: mpsc::Sender<Event>,
    shutdown: CancellationToken,
    counters: Arc<Counters>,
}

impl Dispatcher {
    async fn run(
        mut self,
        mut registrations: mpsc::UnboundedReceiver<Arc<dyn FrameStream>>,
        mut frames: mpsc::Receiver<Event>,
        stopped: CancellationToken,
    ) {
        loop {
            tokio::select! {
                _ = self.shutdown.cancelled() => break,
                stream = registrations.recv() => match stream {
                    Some(stream) => self.register(stream),
                    None => break,
                },
                event = frames.recv() => match event {
                    Some(event) => self.fan_out(event).await,
                    None => break,
                },
            }
        }

        self.shutdown.cancel();
        registrations.close();
        while let Ok(stream) = registrations.try_recv() {
            if let Err(e) = stream.close().await {
                warn!("pending stream close failed: {}", e);
            }
        }
        self.close_members().await;
        stopped.cancel();
        debug!("frame bus dispatcher stopped");
    }

    fn register(&mut self, stream: Arc<dyn FrameStream>) {
        if stream.is_closed() {
            debug!("stream closed before it joined, ignoring");
            return;
        }
        let id = self.next_id;
        self.next_id += 1;

        let member = Member::spawn(
            id,
            stream,
            self.frames_tx.clone(),
            self.shutdown.child_token(),
            self.config.outbound_capacity,
        );
        self.members.insert(id, member);
        self.counters.registered.fetch_add(1, Ordering::Relaxed);
        self.counters
            .members
            .store(self.members.len(), Ordering::Relaxed);
        info!("member {} joined, {} members", id, self.members.len());
    }

    async fn fan_out(&mut self, event: Event) {
        trace!("frame {} from member {}", event.frame, event.source);
        self.counters.frames_received.fetch_add(1, Ordering::Relaxed);
        self.evict_closed();

        for member in self.members.values() {
            if member.id() == event.source {
                continue;
            }
            if member.deliver(event.frame.clone(), &self.shutdown).await {
                self.counters.frames_queued.fetch_add(1, Ordering::Relaxed);
            }
        }
    }

    /// Removes members whose stream has closed.
    fn evict_closed(&mut self) {
        let closed: Vec<u64> = self
            .members
            .values()
            .filter(|member| member.is_closed())
            .map(Member::id)
            .collect();

        for id in closed {
            if let Some(member) = self.members.remove(&id) {
                member.cancel();
                self.counters.evicted.fetch_add(1, Ordering::Relaxed);
                info!("member {} left, {} members", id, self.members.len());
            }
        }
        self.counters
            .members
            .store(self.members.len(), Ordering::Relaxed);
    }

    async fn close_members(&mut self) {
        let members = std::mem::take(&mut self.members);
        let mut tasks = Vec::with_capacity(members.len() * 2);
        for member in members.into_values() {
            tasks.extend(member.close().await);
        }
        for result in futures::future::join_all(tasks).await {
            if let Err(e) = result {
                warn!("member pump failed: {}", e);
            }
        }
        self.counters.members.store(0, Ordering::Relaxed);
    }
}
