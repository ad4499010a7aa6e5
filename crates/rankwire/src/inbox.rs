use std::collections::VecDeque;
use std::sync::{Condvar, Mutex, PoisonError};

use rankwire_frame::Header;

use crate::error::{CommError, Result};
use crate::outbox::Outbox;

/// One arrival from a peer, waiting to be matched.
#[derive(Debug)]
pub(crate) enum Entry {
    /// A data message with its owned payload.
    Message { tag: i32, payload: Vec<u8> },
    /// The peer announced a pending receive (deadlock detection).
    Request(Header),
    /// Reserved control entry; dropped when detection is on, skipped
    /// otherwise.
    Deadlock,
}

#[derive(Debug, Default)]
struct State {
    entries: VecDeque<Entry>,
    closed: bool,
}

/// FIFO queue of arrivals from one peer.
///
/// Strictly one producer (the peer's receiver thread) and one consumer
/// (the user thread). The consumer blocks until a matching entry arrives
/// or the queue is closed; entries it passes over stay in place, in
/// arrival order, for later retrieves with different predicates.
#[derive(Debug, Default)]
pub(crate) struct Inbox {
    state: Mutex<State>,
    arrived: Condvar,
}

enum Step {
    Skip,
    Deliver,
    Correlate(Header),
    Drop,
}

impl Inbox {
    /// Append a data message. Producer only.
    pub(crate) fn save_message(&self, tag: i32, payload: Vec<u8>) {
        self.push(Entry::Message { tag, payload });
    }

    /// Append a receive announcement. Producer only.
    pub(crate) fn save_request(&self, want: Header) {
        self.push(Entry::Request(want));
    }

    /// Append the reserved control entry. Producer only.
    #[cfg_attr(not(test), allow(dead_code))]
    pub(crate) fn save_deadlock(&self) {
        self.push(Entry::Deadlock);
    }

    /// Mark the end of the stream. The producer must not append afterwards.
    pub(crate) fn close(&self) {
        let mut state = self.lock();
        state.closed = true;
        self.arrived.notify_one();
    }

    fn push(&self, entry: Entry) {
        let mut state = self.lock();
        debug_assert!(!state.closed, "entry appended after close");
        state.entries.push_back(entry);
        self.arrived.notify_one();
    }

    /// Block until an entry matching `want` arrives, then copy its payload
    /// into `out` and remove it.
    ///
    /// `outbox` is the send log toward the same peer; passing it enables
    /// the deadlock protocol. With it, every `Request` encountered is
    /// consumed and correlated against the log: an uncorrelated request
    /// means the peer waits for a message that was never sent, and the
    /// retrieve fails with [`CommError::DeadlockDetected`]. Without it,
    /// requests are passed over in place.
    ///
    /// The walk moves strictly forward: entries passed over in this call
    /// are not revisited, which keeps per-peer delivery in arrival order
    /// across retrieves with different predicates.
    pub(crate) fn retrieve(
        &self,
        want: Header,
        out: &mut [u8],
        mut outbox: Option<&mut Outbox>,
    ) -> Result<()> {
        debug_assert_eq!(out.len() as u64, want.size);

        let mut state = self.lock();
        let mut cursor = 0;
        loop {
            while cursor < state.entries.len() {
                let step = match &state.entries[cursor] {
                    Entry::Message { tag, payload } => {
                        if Header::new(payload.len() as u64, *tag).matches(&want) {
                            Step::Deliver
                        } else {
                            Step::Skip
                        }
                    }
                    Entry::Request(request) if outbox.is_some() => Step::Correlate(*request),
                    Entry::Request(_) => Step::Skip,
                    Entry::Deadlock if outbox.is_some() => Step::Drop,
                    Entry::Deadlock => Step::Skip,
                };

                match step {
                    Step::Skip => cursor += 1,
                    Step::Deliver => match state.entries.remove(cursor) {
                        Some(Entry::Message { payload, .. }) => {
                            out.copy_from_slice(&payload);
                            return Ok(());
                        }
                        _ => unreachable!("cursor points at a matched message"),
                    },
                    Step::Correlate(request) => {
                        state.entries.remove(cursor);
                        let satisfied = outbox.as_deref_mut().is_some_and(|log| log.pop(&request));
                        if !satisfied {
                            return Err(CommError::DeadlockDetected);
                        }
                    }
                    Step::Drop => {
                        state.entries.remove(cursor);
                    }
                }
            }

            if state.closed {
                return Err(CommError::RemoteFinished);
            }
            state = self
                .arrived
                .wait(state)
                .unwrap_or_else(PoisonError::into_inner);
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::thread;
    use std::time::Duration;

    use rankwire_frame::tag;

    use super::*;

    fn recv(inbox: &Inbox, size: usize, tag: i32) -> Result<Vec<u8>> {
        let mut buf = vec![0u8; size];
        inbox
            .retrieve(Header::new(size as u64, tag), &mut buf, None)
            .map(|()| buf)
    }

    #[test]
    fn delivers_in_arrival_order() {
        let inbox = Inbox::default();
        inbox.save_message(1, b"first".to_vec());
        inbox.save_message(1, b"later".to_vec());

        assert_eq!(recv(&inbox, 5, 1).unwrap(), b"first");
        assert_eq!(recv(&inbox, 5, 1).unwrap(), b"later");
    }

    #[test]
    fn passes_over_entries_that_do_not_match() {
        let inbox = Inbox::default();
        inbox.save_message(1, b"aaaa".to_vec());
        inbox.save_message(2, b"bbbb".to_vec());
        inbox.save_message(1, b"cccc".to_vec());

        // Pulling tag 2 first must not disturb the order of tag 1.
        assert_eq!(recv(&inbox, 4, 2).unwrap(), b"bbbb");
        assert_eq!(recv(&inbox, 4, 1).unwrap(), b"aaaa");
        assert_eq!(recv(&inbox, 4, 1).unwrap(), b"cccc");
    }

    #[test]
    fn matches_on_size_as_well_as_tag() {
        let inbox = Inbox::default();
        inbox.save_message(1, b"xx".to_vec());
        inbox.save_message(1, b"yyyy".to_vec());

        assert_eq!(recv(&inbox, 4, 1).unwrap(), b"yyyy");
        assert_eq!(recv(&inbox, 2, 1).unwrap(), b"xx");
    }

    #[test]
    fn wildcard_receive_takes_any_tag() {
        let inbox = Inbox::default();
        inbox.save_message(42, b"tagged".to_vec());

        assert_eq!(recv(&inbox, 6, tag::ANY).unwrap(), b"tagged");
    }

    #[test]
    fn close_surfaces_as_remote_finished() {
        let inbox = Inbox::default();
        inbox.close();

        assert_eq!(recv(&inbox, 1, 1), Err(CommError::RemoteFinished));
        // And keeps doing so.
        assert_eq!(recv(&inbox, 1, 1), Err(CommError::RemoteFinished));
    }

    #[test]
    fn matching_message_wins_over_a_later_close() {
        let inbox = Inbox::default();
        inbox.save_message(1, b"last".to_vec());
        inbox.close();

        assert_eq!(recv(&inbox, 4, 1).unwrap(), b"last");
        assert_eq!(recv(&inbox, 4, 1), Err(CommError::RemoteFinished));
    }

    #[test]
    fn blocks_until_the_producer_appends() {
        let inbox = Arc::new(Inbox::default());

        let producer = {
            let inbox = Arc::clone(&inbox);
            thread::spawn(move || {
                thread::sleep(Duration::from_millis(20));
                inbox.save_message(3, b"woke".to_vec());
            })
        };

        assert_eq!(recv(&inbox, 4, 3).unwrap(), b"woke");
        producer.join().unwrap();
    }

    #[test]
    fn requests_are_invisible_without_detection() {
        let inbox = Inbox::default();
        inbox.save_request(Header::new(8, 1));
        inbox.save_message(1, b"data".to_vec());

        assert_eq!(recv(&inbox, 4, 1).unwrap(), b"data");
    }

    #[test]
    fn correlated_request_is_consumed_silently() {
        let inbox = Inbox::default();
        let mut outbox = Outbox::default();
        outbox.push(Header::new(8, 5));

        inbox.save_request(Header::new(8, 5));
        inbox.save_message(1, b"data".to_vec());

        let mut buf = [0u8; 4];
        inbox
            .retrieve(Header::new(4, 1), &mut buf, Some(&mut outbox))
            .unwrap();
        assert_eq!(&buf, b"data");
        // The correlated entry left the log.
        assert!(!outbox.pop(&Header::new(8, 5)));
    }

    #[test]
    fn uncorrelated_request_is_a_deadlock() {
        let inbox = Inbox::default();
        let mut outbox = Outbox::default();

        inbox.save_request(Header::new(8, 5));

        let mut buf = [0u8; 4];
        assert_eq!(
            inbox.retrieve(Header::new(4, 1), &mut buf, Some(&mut outbox)),
            Err(CommError::DeadlockDetected)
        );
    }

    #[test]
    fn request_correlation_matches_size_with_size_and_tag_with_tag() {
        let inbox = Inbox::default();
        let mut outbox = Outbox::default();
        // A logged send whose size equals the request's tag value and vice
        // versa must not correlate.
        outbox.push(Header::new(5, 8));

        inbox.save_request(Header::new(8, 5));

        let mut buf = [0u8; 4];
        assert_eq!(
            inbox.retrieve(Header::new(4, 1), &mut buf, Some(&mut outbox)),
            Err(CommError::DeadlockDetected)
        );
    }

    #[test]
    fn reserved_deadlock_entries_are_dropped_or_skipped() {
        let inbox = Inbox::default();
        inbox.save_deadlock();
        inbox.save_message(1, b"pass".to_vec());

        // Skipped without detection.
        assert_eq!(recv(&inbox, 4, 1).unwrap(), b"pass");

        // Dropped with detection.
        let mut outbox = Outbox::default();
        inbox.save_message(1, b"next".to_vec());
        let mut buf = [0u8; 4];
        inbox
            .retrieve(Header::new(4, 1), &mut buf, Some(&mut outbox))
            .unwrap();
        assert_eq!(&buf, b"next");
    }
}
