//! Blocking byte reader over the AirPlay named pipe.
//!
//! Opening a FIFO blocks until a writer shows up and reads block until data
//! arrives, so the async wrappers at the bottom of this module push those
//! calls onto tokio's blocking pool and hand the result back to the caller.

use crate::error::BridgeError;
use std::{
    fs::File,
    io::{ErrorKind, Read},
    path::{Path, PathBuf},
};

#[derive(Debug)]
pub struct FrameSource<R = File> {
    reader: R,
}

impl FrameSource<File> {
    /// Open the pipe for reading, blocking until a writer connects.
    pub fn open(path: &Path) -> Result<Self, BridgeError> {
        match File::open(path) {
            Ok(file) => Ok(Self::new(file)),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                Err(BridgeError::PipeUnavailable(path.to_path_buf()))
            }
            Err(e) => Err(e.into()),
        }
    }
}

impl<R: Read> FrameSource<R> {
    pub fn new(reader: R) -> Self {
        Self { reader }
    }

    /// Read `n` bytes, blocking until they are available.
    ///
    /// A shorter result (possibly empty) means the writer closed the pipe.
    pub fn read_chunk(&mut self, n: usize) -> Result<Vec<u8>, BridgeError> {
        let mut chunk = vec![0u8; n];
        let mut filled = 0;

        while filled < n {
            match self.reader.read(&mut chunk[filled..]) {
                Ok(0) => break,
                Ok(read) => filled += read,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            }
        }

        chunk.truncate(filled);
        Ok(chunk)
    }
}

/// Open the pipe on the blocking pool.
pub async fn open_blocking(path: PathBuf) -> Result<FrameSource<File>, BridgeError> {
    tokio::task::spawn_blocking(move || FrameSource::open(&path)).await?
}

/// Read one chunk on the blocking pool, handing the source back afterwards.
pub async fn read_blocking<R>(
    mut source: FrameSource<R>,
    n: usize,
) -> Result<(FrameSource<R>, Vec<u8>), BridgeError>
where
    R: Read + Send + 'static,
{
    tokio::task::spawn_blocking(move || -> Result<_, BridgeError> {
        let chunk = source.read_chunk(n)?;
        Ok((source, chunk))
    })
    .await?
}
