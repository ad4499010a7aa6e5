use std::fs::File;
use std::io::{self, Read, Write};
use std::os::fd::{AsRawFd, FromRawFd, OwnedFd, RawFd};

/// Receiving end of a unidirectional channel from one peer.
///
/// Reads block until bytes arrive or the peer closes its writing end,
/// at which point reads return end-of-file.
pub struct ChannelReader {
    inner: File,
}

/// Sending end of a unidirectional channel to one peer.
///
/// Writes block when the transport is full. Dropping the writer closes the
/// channel, which the peer observes as end-of-file.
pub struct ChannelWriter {
    inner: File,
}

impl ChannelReader {
    /// Wrap an owned descriptor.
    pub fn from_owned(fd: OwnedFd) -> Self {
        Self {
            inner: File::from(fd),
        }
    }

    /// Adopt a raw descriptor inherited from the launcher.
    ///
    /// # Safety
    ///
    /// `fd` must be an open descriptor owned by the caller; this endpoint
    /// takes ownership and closes it on drop.
    pub unsafe fn from_raw(fd: RawFd) -> Self {
        Self {
            inner: File::from_raw_fd(fd),
        }
    }
}

impl ChannelWriter {
    /// Wrap an owned descriptor.
    pub fn from_owned(fd: OwnedFd) -> Self {
        Self {
            inner: File::from(fd),
        }
    }

    /// Adopt a raw descriptor inherited from the launcher.
    ///
    /// # Safety
    ///
    /// `fd` must be an open descriptor owned by the caller; this endpoint
    /// takes ownership and closes it on drop.
    pub unsafe fn from_raw(fd: RawFd) -> Self {
        Self {
            inner: File::from_raw_fd(fd),
        }
    }
}

impl Read for ChannelReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.inner.read(buf)
    }
}

impl Write for ChannelWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.inner.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

impl std::fmt::Debug for ChannelReader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChannelReader")
            .field("fd", &self.inner.as_raw_fd())
            .finish()
    }
}

impl std::fmt::Debug for ChannelWriter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChannelWriter")
            .field("fd", &self.inner.as_raw_fd())
            .finish()
    }
}

/// Create a connected channel inside the current process.
///
/// Useful for tests and embedders that wire worlds explicitly instead of
/// inheriting descriptors from the launcher.
pub fn pair() -> io::Result<(ChannelWriter, ChannelReader)> {
    let mut fds: [libc::c_int; 2] = [0; 2];
    // SAFETY: `fds` is a valid out-pointer for two descriptors.
    if unsafe { libc::pipe(fds.as_mut_ptr()) } < 0 {
        return Err(io::Error::last_os_error());
    }
    // SAFETY: pipe() just returned these descriptors; each is owned exactly once.
    let (read, write) = unsafe { (OwnedFd::from_raw_fd(fds[0]), OwnedFd::from_raw_fd(fds[1])) };
    Ok((
        ChannelWriter::from_owned(write),
        ChannelReader::from_owned(read),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pair_roundtrip() {
        let (mut writer, mut reader) = pair().unwrap();

        writer.write_all(b"across the pipe").unwrap();

        let mut buf = [0u8; 15];
        reader.read_exact(&mut buf).unwrap();
        assert_eq!(&buf, b"across the pipe");
    }

    #[test]
    fn reader_sees_eof_after_writer_drops() {
        let (writer, mut reader) = pair().unwrap();
        drop(writer);

        let mut buf = [0u8; 1];
        assert_eq!(reader.read(&mut buf).unwrap(), 0);
    }

    #[test]
    fn writer_fails_after_reader_drops() {
        let (mut writer, reader) = pair().unwrap();
        drop(reader);

        let payload = [0u8; 4096];
        let err = loop {
            // The first few writes may land in the pipe buffer.
            if let Err(err) = writer.write_all(&payload) {
                break err;
            }
        };
        assert_eq!(err.kind(), io::ErrorKind::BrokenPipe);
    }

    #[test]
    fn endpoints_move_across_threads() {
        let (mut writer, mut reader) = pair().unwrap();

        let producer = std::thread::spawn(move || {
            for i in 0..64u8 {
                writer.write_all(&[i]).unwrap();
            }
        });

        let mut buf = [0u8; 64];
        reader.read_exact(&mut buf).unwrap();
        for (i, byte) in buf.iter().enumerate() {
            assert_eq!(*byte, i as u8);
        }
        producer.join().unwrap();
    }

    #[test]
    fn debug_output_names_the_descriptor() {
        let (writer, reader) = pair().unwrap();
        assert!(format!("{reader:?}").starts_with("ChannelReader"));
        assert!(format!("{writer:?}").starts_with("ChannelWriter"));
    }
}
