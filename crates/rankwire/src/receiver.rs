use std::io;
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use tracing::{debug, trace, warn};

use rankwire_channel::ChannelReader;
use rankwire_frame::{self as frame, tag, Header};

use crate::inbox::Inbox;

/// Start the background reader for one peer's inbound channel.
///
/// The thread decodes messages and appends them to `inbox` until the peer
/// sends a close frame or the channel ends, then closes the channel and
/// marks the inbox closed.
pub(crate) fn spawn(
    peer: usize,
    reader: ChannelReader,
    inbox: Arc<Inbox>,
) -> io::Result<JoinHandle<()>> {
    thread::Builder::new()
        .name(format!("recv-{peer}"))
        .spawn(move || run(peer, reader, inbox))
}

fn run(peer: usize, mut reader: ChannelReader, inbox: Arc<Inbox>) {
    loop {
        let message = match frame::read_message(&mut reader) {
            Ok(message) => message,
            Err(err) => {
                debug!(peer, %err, "inbound channel ended");
                break;
            }
        };

        match message.tag {
            tag::CLOSE => {
                trace!(peer, "close frame");
                break;
            }
            tag::REQUEST => match Header::from_bytes(&message.payload) {
                Some(want) => inbox.save_request(want),
                None => warn!(
                    peer,
                    len = message.payload.len(),
                    "malformed receive announcement"
                ),
            },
            _ => {
                trace!(peer, tag = message.tag, size = message.payload.len(), "message");
                inbox.save_message(message.tag, message.payload);
            }
        }
    }

    drop(reader);
    inbox.close();
}
