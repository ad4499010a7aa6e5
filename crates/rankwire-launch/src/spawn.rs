//! Channel plumbing and worker process management.
//!
//! The launcher creates one pipe per ordered pair of ranks, stages both
//! ends above [`STAGING_FD_BASE`] so they cannot collide with the
//! well-known reader/writer regions, and moves each worker's endpoints
//! into place between fork and exec. Staged descriptors are
//! close-on-exec, so a worker keeps exactly its own channels.

use std::io;
use std::os::fd::{AsRawFd, FromRawFd, OwnedFd, RawFd};
use std::os::unix::process::CommandExt;
use std::process::{Child, Command};

use tracing::{debug, warn};

use rankwire_channel::{reader_fd, writer_fd, JobEnv, MAX_WORLD_SIZE, STAGING_FD_BASE};

/// Errors that can occur while launching a job.
#[derive(Debug, thiserror::Error)]
pub enum LaunchError {
    /// The requested world size cannot be addressed.
    #[error("world size {0} out of range (1..={MAX_WORLD_SIZE})")]
    WorldSize(usize),

    /// Creating or staging the channel table failed.
    #[error("channel setup failed: {0}")]
    Wire(#[source] io::Error),

    /// A worker process could not be started.
    #[error("failed to spawn rank {rank}: {source}")]
    Spawn { rank: usize, source: io::Error },

    /// Waiting for a worker failed.
    #[error("failed to wait for rank {rank}: {source}")]
    Wait { rank: usize, source: io::Error },
}

/// Wire the channels, spawn one worker per rank, and wait for all of
/// them. Returns the process exit code: 0 when every worker succeeded.
pub fn run_job(ranks: usize, program: &str, args: &[String]) -> Result<i32, LaunchError> {
    if ranks == 0 || ranks > MAX_WORLD_SIZE {
        return Err(LaunchError::WorldSize(ranks));
    }

    let table = ChannelTable::new(ranks).map_err(LaunchError::Wire)?;

    let mut children: Vec<(usize, Child)> = Vec::with_capacity(ranks);
    for rank in 0..ranks {
        match spawn_worker(&table, rank, ranks, program, args) {
            Ok(child) => {
                debug!(rank, pid = child.id(), "worker started");
                children.push((rank, child));
            }
            Err(source) => {
                for (_, child) in &mut children {
                    let _ = child.kill();
                    let _ = child.wait();
                }
                return Err(LaunchError::Spawn { rank, source });
            }
        }
    }

    // The workers own their channel ends now; keeping ours open would
    // stop them from ever observing end-of-file.
    drop(table);

    let mut failures = 0usize;
    for (rank, mut child) in children {
        let status = child
            .wait()
            .map_err(|source| LaunchError::Wait { rank, source })?;
        if status.success() {
            debug!(rank, "worker finished");
        } else {
            warn!(rank, %status, "worker failed");
            failures += 1;
        }
    }

    Ok(if failures == 0 { 0 } else { 1 })
}

fn spawn_worker(
    table: &ChannelTable,
    rank: usize,
    size: usize,
    program: &str,
    args: &[String],
) -> io::Result<Child> {
    let moves = table.moves_for_rank(rank);

    let mut command = Command::new(program);
    command
        .args(args)
        .env(JobEnv::RANK_VAR, rank.to_string())
        .env(JobEnv::SIZE_VAR, size.to_string());

    // SAFETY: the closure runs between fork and exec and only calls
    // async-signal-safe functions; the move list was allocated before the
    // fork. Staged sources sit at or above STAGING_FD_BASE and targets
    // below it, so no move clobbers a source. Staged descriptors are
    // close-on-exec and vanish once the worker execs.
    unsafe {
        command.pre_exec(move || {
            for &(staged, target) in &moves {
                if libc::dup2(staged, target) < 0 {
                    return Err(io::Error::last_os_error());
                }
            }
            Ok(())
        });
    }

    command.spawn()
}

/// All channels of a job, staged in the parent.
struct ChannelTable {
    channels: Vec<Channel>,
}

struct Channel {
    source: usize,
    dest: usize,
    read: OwnedFd,
    write: OwnedFd,
}

impl ChannelTable {
    fn new(size: usize) -> io::Result<Self> {
        let mut channels = Vec::with_capacity(size * size.saturating_sub(1));
        for source in 0..size {
            for dest in 0..size {
                if source == dest {
                    continue;
                }
                let (read, write) = pipe()?;
                channels.push(Channel {
                    source,
                    dest,
                    read: stage(read)?,
                    write: stage(write)?,
                });
            }
        }
        Ok(Self { channels })
    }

    /// The descriptor moves rank `rank` needs: `(staged, target)` pairs
    /// placing its inbound ends at the reader offsets and outbound ends
    /// at the writer offsets.
    fn moves_for_rank(&self, rank: usize) -> Vec<(RawFd, RawFd)> {
        let mut moves = Vec::new();
        for channel in &self.channels {
            if channel.dest == rank {
                moves.push((channel.read.as_raw_fd(), reader_fd(channel.source)));
            }
            if channel.source == rank {
                moves.push((channel.write.as_raw_fd(), writer_fd(channel.dest)));
            }
        }
        moves
    }
}

fn pipe() -> io::Result<(OwnedFd, OwnedFd)> {
    let mut fds: [libc::c_int; 2] = [0; 2];
    // SAFETY: `fds` is a valid out-pointer for two descriptors.
    if unsafe { libc::pipe(fds.as_mut_ptr()) } < 0 {
        return Err(io::Error::last_os_error());
    }
    // SAFETY: pipe() just returned these descriptors; each is owned once.
    Ok(unsafe { (OwnedFd::from_raw_fd(fds[0]), OwnedFd::from_raw_fd(fds[1])) })
}

/// Duplicate `fd` to a close-on-exec descriptor at or above
/// [`STAGING_FD_BASE`] and close the original.
fn stage(fd: OwnedFd) -> io::Result<OwnedFd> {
    // SAFETY: `fd` is an open descriptor we own; F_DUPFD_CLOEXEC hands
    // back a fresh one.
    let staged = unsafe { libc::fcntl(fd.as_raw_fd(), libc::F_DUPFD_CLOEXEC, STAGING_FD_BASE) };
    if staged < 0 {
        return Err(io::Error::last_os_error());
    }
    // SAFETY: fcntl just returned this descriptor; ownership moves here
    // and the original closes when `fd` drops.
    Ok(unsafe { OwnedFd::from_raw_fd(staged) })
}
