//! Message tags.
//!
//! Negative tags are reserved for the runtime. Tag [`ANY`] (zero) is
//! reserved for the wildcard and is only meaningful on a *posted receive*
//! (a user receive, or the receive announcement it generates): a receive
//! posted with [`ANY`] accepts any tag. Messages themselves carry strictly
//! positive user tags; a sent tag never acts as a wildcard, so a receive
//! posted with an explicit tag only ever matches that same tag.

/// Wildcard for posted receives: accepts any message tag. Not a valid
/// tag for a sent message.
pub const ANY: i32 = 0;

/// Collective-tree payloads.
pub const GROUP: i32 = -1;

/// Orderly shutdown of a channel; carries no payload.
pub const CLOSE: i32 = -2;

/// Announcement of a pending receive, for the deadlock detector. The
/// payload is one encoded [`Header`](crate::Header) describing the receive.
pub const REQUEST: i32 = -3;

/// Returns true for tags the runtime reserves for itself on the wire.
pub fn is_reserved(tag: i32) -> bool {
    tag < 0
}

/// Returns true for tags a message may legally carry: strictly positive.
pub fn is_user(tag: i32) -> bool {
    tag > ANY
}

/// The tag half of the matching rule. `want` is the tag of the posted
/// receive: [`ANY`] there accepts everything, an explicit tag accepts
/// only itself. The message's own tag never wildcards.
pub fn matches(tag: i32, want: i32) -> bool {
    want == ANY || tag == want
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reserved_tags_are_negative() {
        assert!(is_reserved(GROUP));
        assert!(is_reserved(CLOSE));
        assert!(is_reserved(REQUEST));
        assert!(!is_reserved(ANY));
        assert!(!is_reserved(1));
    }

    #[test]
    fn user_tags_are_strictly_positive() {
        assert!(is_user(1));
        assert!(is_user(i32::MAX));
        assert!(!is_user(ANY));
        assert!(!is_user(GROUP));
    }

    #[test]
    fn wildcard_receive_accepts_everything() {
        assert!(matches(7, ANY));
        assert!(matches(1, ANY));
    }

    #[test]
    fn a_sent_tag_never_wildcards() {
        assert!(!matches(ANY, 7));
    }

    #[test]
    fn explicit_tags_must_agree() {
        assert!(matches(7, 7));
        assert!(!matches(7, 8));
        assert!(!matches(GROUP, REQUEST));
    }
}
