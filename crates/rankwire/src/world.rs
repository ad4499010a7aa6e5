use std::sync::Arc;
use std::thread::JoinHandle;

use tracing::{debug, warn};

use rankwire_channel::{wiring, ChannelReader, ChannelWriter, JobEnv};
use rankwire_frame::{self as frame, tag, Header};

use crate::error::{CommError, InitError, Result};
use crate::inbox::Inbox;
use crate::outbox::Outbox;
use crate::receiver;

/// Behavior switches fixed for the lifetime of a world.
///
/// Must be configured identically at every rank of a job; mixed
/// configurations leave receive announcements stranded at peers that do
/// not consume them.
#[derive(Debug, Clone, Copy, Default)]
pub struct WorldOptions {
    /// Announce receives to peers and keep the send log that powers the
    /// pairwise deadlock check.
    pub deadlock_detection: bool,
}

/// The runtime handle of one rank of a job.
///
/// Owns the outbound channels, the per-peer inboxes and their receiver
/// threads, and (with detection enabled) the per-peer send logs. All
/// operations take `&mut self`: a world belongs to one thread, the
/// caller's, while the receivers run in the background.
pub struct World {
    rank: usize,
    size: usize,
    deadlock_detection: bool,
    writers: Vec<Option<ChannelWriter>>,
    inboxes: Vec<Option<Arc<Inbox>>>,
    outboxes: Vec<Outbox>,
    receivers: Vec<Option<JoinHandle<()>>>,
}

impl World {
    /// Bring up the world of a worker started by the launcher.
    ///
    /// Reads and caches the rank and world size from the environment, then
    /// adopts the channel descriptors the launcher placed at the
    /// well-known offsets.
    pub fn init(options: WorldOptions) -> std::result::Result<Self, InitError> {
        let env = JobEnv::from_env()?;

        let mut readers: Vec<Option<ChannelReader>> = Vec::with_capacity(env.size);
        let mut writers: Vec<Option<ChannelWriter>> = Vec::with_capacity(env.size);
        for peer in 0..env.size {
            if peer == env.rank {
                readers.push(None);
                writers.push(None);
                continue;
            }
            // SAFETY: the launcher contract guarantees open descriptors at
            // these offsets, owned by nothing else in this process, and a
            // world is the unique adopter.
            readers.push(Some(unsafe { wiring::inherited_reader(peer) }));
            writers.push(Some(unsafe { wiring::inherited_writer(peer) }));
        }

        Self::from_channels(env.rank, env.size, readers, writers, options)
    }

    /// Wire a world from explicit channel endpoints.
    ///
    /// `readers[p]` carries bytes from peer `p`, `writers[p]` toward peer
    /// `p`; both must be `None` exactly at `rank`. This is the
    /// constructor for tests and embedders that run several logical ranks
    /// inside one process.
    pub fn from_channels(
        rank: usize,
        size: usize,
        readers: Vec<Option<ChannelReader>>,
        writers: Vec<Option<ChannelWriter>>,
        options: WorldOptions,
    ) -> std::result::Result<Self, InitError> {
        if size == 0 || rank >= size {
            return Err(InitError::Wiring("rank outside the world"));
        }
        if readers.len() != size || writers.len() != size {
            return Err(InitError::Wiring("channel table length != world size"));
        }
        if readers[rank].is_some() || writers[rank].is_some() {
            return Err(InitError::Wiring("own rank must have no channels"));
        }
        for peer in 0..size {
            if peer != rank && (readers[peer].is_none() || writers[peer].is_none()) {
                return Err(InitError::Wiring("missing channel for a peer"));
            }
        }

        let mut inboxes = Vec::with_capacity(size);
        let mut receivers = Vec::with_capacity(size);
        for (peer, reader) in readers.into_iter().enumerate() {
            match reader {
                None => {
                    inboxes.push(None);
                    receivers.push(None);
                }
                Some(reader) => {
                    let inbox = Arc::new(Inbox::default());
                    let handle = receiver::spawn(peer, reader, Arc::clone(&inbox))?;
                    inboxes.push(Some(inbox));
                    receivers.push(Some(handle));
                }
            }
        }

        let outboxes = (0..size).map(|_| Outbox::default()).collect();

        debug!(
            rank,
            size,
            deadlock_detection = options.deadlock_detection,
            "world up"
        );

        Ok(Self {
            rank,
            size,
            deadlock_detection: options.deadlock_detection,
            writers,
            inboxes,
            outboxes,
            receivers,
        })
    }

    /// This process's rank, `0 <= rank < size`.
    pub fn rank(&self) -> usize {
        self.rank
    }

    /// Number of ranks in the job, fixed for its lifetime.
    pub fn size(&self) -> usize {
        self.size
    }

    /// Send `data` to `dest` under `tag`.
    ///
    /// `tag` must be strictly positive; zero is reserved for the receive
    /// wildcard and never travels on a message. Blocks only on transport
    /// backpressure; completion does not imply the peer received, or will
    /// ever receive, the message.
    pub fn send(&mut self, data: &[u8], dest: usize, tag: i32) -> Result<()> {
        self.check_peer(dest)?;
        if !tag::is_user(tag) {
            return Err(CommError::InvalidTag);
        }
        self.send_frame(dest, tag, data)?;
        if self.deadlock_detection {
            self.outboxes[dest].push(Header::new(data.len() as u64, tag));
        }
        Ok(())
    }

    /// Receive exactly `buf.len()` bytes from `source` into `buf`.
    ///
    /// A message is taken only if its size equals `buf.len()` and its tag
    /// agrees with `tag`: an explicit (positive) `tag` matches only
    /// itself, [`tag::ANY`] accepts any tag. Blocks until such a message
    /// arrives; with deadlock detection enabled the intent is announced
    /// to `source` first, and an unsatisfiable mutual wait surfaces as
    /// [`CommError::DeadlockDetected`].
    pub fn recv(&mut self, buf: &mut [u8], source: usize, tag: i32) -> Result<()> {
        self.check_peer(source)?;
        if tag != tag::ANY && !tag::is_user(tag) {
            return Err(CommError::InvalidTag);
        }
        if self.deadlock_detection {
            let want = Header::new(buf.len() as u64, tag);
            self.send_frame(source, tag::REQUEST, &want.to_bytes())?;
        }
        self.retrieve(source, tag, buf)
    }

    /// Tear the world down: tell every peer this rank is done, close the
    /// outbound channels, then wait for the receivers to drain the
    /// inbound ones.
    ///
    /// Returns once every peer has finalized or died; safe to call after
    /// any prior error.
    pub fn finalize(mut self) {
        debug!(rank = self.rank, "finalizing world");

        for peer in 0..self.size {
            if let Some(mut writer) = self.writers[peer].take() {
                if let Err(err) = frame::write_message(&mut writer, tag::CLOSE, &[]) {
                    debug!(peer, %err, "close frame not delivered");
                }
            }
        }

        for peer in 0..self.size {
            if let Some(handle) = self.receivers[peer].take() {
                if handle.join().is_err() {
                    warn!(peer, "receiver thread panicked");
                }
            }
        }
    }

    fn check_peer(&self, peer: usize) -> Result<()> {
        if peer == self.rank {
            return Err(CommError::SelfOp);
        }
        if peer >= self.size {
            return Err(CommError::NoSuchRank);
        }
        Ok(())
    }

    /// Frame and write one message toward `dest`. Internal traffic
    /// (collectives, announcements) goes through here without touching
    /// the send log.
    pub(crate) fn send_frame(&mut self, dest: usize, tag: i32, payload: &[u8]) -> Result<()> {
        let Some(writer) = self.writers[dest].as_mut() else {
            return Err(CommError::RemoteFinished);
        };
        frame::write_message(writer, tag, payload).map_err(|err| {
            debug!(dest, %err, "outbound write failed");
            CommError::RemoteFinished
        })
    }

    /// Blocking matched consume from `source`'s inbox, without announcing.
    pub(crate) fn retrieve(&mut self, source: usize, tag: i32, buf: &mut [u8]) -> Result<()> {
        let want = Header::new(buf.len() as u64, tag);
        let Some(inbox) = self.inboxes[source].as_ref() else {
            return Err(CommError::SelfOp);
        };
        let outbox = if self.deadlock_detection {
            Some(&mut self.outboxes[source])
        } else {
            None
        };
        inbox.retrieve(want, buf, outbox)
    }
}
