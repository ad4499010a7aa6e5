use rankwire_frame::Header;

/// Shadow log of point-to-point sends a peer has not provably consumed.
///
/// One per peer, touched only by the owning process's user thread: pushed
/// on every successful send and popped when the peer's receive
/// announcement is correlated against it. Only kept when deadlock
/// detection is enabled.
#[derive(Debug, Default)]
pub(crate) struct Outbox {
    entries: Vec<Header>,
}

impl Outbox {
    /// Log a successful send.
    pub(crate) fn push(&mut self, entry: Header) {
        self.entries.push(entry);
    }

    /// Remove the most recent entry matching `want`. Returns whether a
    /// match was found.
    pub(crate) fn pop(&mut self, want: &Header) -> bool {
        match self.entries.iter().rposition(|entry| entry.matches(want)) {
            Some(index) => {
                self.entries.remove(index);
                true
            }
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use rankwire_frame::tag;

    use super::*;

    #[test]
    fn pop_removes_a_single_match() {
        let mut outbox = Outbox::default();
        outbox.push(Header::new(4, 7));

        assert!(outbox.pop(&Header::new(4, 7)));
        assert!(!outbox.pop(&Header::new(4, 7)));
    }

    #[test]
    fn pop_requires_matching_size() {
        let mut outbox = Outbox::default();
        outbox.push(Header::new(4, 7));

        assert!(!outbox.pop(&Header::new(5, 7)));
        assert!(outbox.pop(&Header::new(4, 7)));
    }

    #[test]
    fn wildcard_request_matches_any_logged_tag() {
        let mut outbox = Outbox::default();
        outbox.push(Header::new(4, 7));

        // Size still has to agree.
        assert!(!outbox.pop(&Header::new(8, tag::ANY)));
        assert!(outbox.pop(&Header::new(4, tag::ANY)));
        assert!(!outbox.pop(&Header::new(4, tag::ANY)));
    }

    #[test]
    fn pop_prefers_the_most_recent_entry() {
        let mut outbox = Outbox::default();
        outbox.push(Header::new(4, 1));
        outbox.push(Header::new(4, 2));

        // The wildcard could match either; the newer entry goes first.
        assert!(outbox.pop(&Header::new(4, tag::ANY)));
        assert!(outbox.pop(&Header::new(4, 1)));
        assert!(!outbox.pop(&Header::new(4, 2)));
    }
}
