use crate::{Error, ErrorKind, LoStream, Result};
use std::{
    fmt::{self, Debug},
    marker::PhantomData,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Direction {
    Unused,
    Reading,
    Writing,
}

/// An open large object, valid while the result it was opened from is alive.
///
/// A large object is either read or written, mixing the two on the same
/// object is refused.
pub struct LargeObject<'r> {
    stream: Option<Box<dyn LoStream>>,
    direction: Direction,
    _result: PhantomData<&'r ()>,
}

impl<'r> LargeObject<'r> {
    pub(crate) fn new(stream: Box<dyn LoStream>) -> Self {
        Self {
            stream: Some(stream),
            direction: Direction::Unused,
            _result: PhantomData,
        }
    }

    /// Largest amount of bytes moved by a single `read` or `write`.
    pub fn max_transfer(&self) -> usize {
        self.stream.as_ref().map(|s| s.max_transfer()).unwrap_or(0)
    }

    /// Read into `buffer`, returns the bytes read, 0 at the end of the object.
    pub fn read(&mut self, buffer: &mut [u8]) -> Result<usize> {
        let stream = self.stream(Direction::Reading)?;
        let len = buffer.len().min(stream.max_transfer());
        let read = stream.read(&mut buffer[..len]).map_err(Error::detach)?;
        self.direction = Direction::Reading;
        Ok(read)
    }

    /// Write from `buffer`, returns the bytes accepted by the backend.
    pub fn write(&mut self, buffer: &[u8]) -> Result<usize> {
        let stream = self.stream(Direction::Writing)?;
        let len = buffer.len().min(stream.max_transfer());
        let written = stream.write(&buffer[..len]).map_err(Error::detach)?;
        // Only a stream that accepted a write gets finalized on close
        self.direction = Direction::Writing;
        Ok(written)
    }

    /// Read until the end of the object.
    pub fn read_to_end(&mut self, output: &mut Vec<u8>) -> Result<usize> {
        let mut chunk = vec![0u8; self.max_transfer().clamp(1, 64 * 1024)];
        let mut total = 0;
        loop {
            let read = self.read(&mut chunk)?;
            if read == 0 {
                return Ok(total);
            }
            output.extend_from_slice(&chunk[..read]);
            total += read;
        }
    }

    /// Write the whole buffer, in as many transfers as needed.
    pub fn write_all(&mut self, mut buffer: &[u8]) -> Result<()> {
        while !buffer.is_empty() {
            let written = self.write(buffer)?;
            if written == 0 {
                return Err(Error::with_detail(
                    ErrorKind::Backend,
                    "The backend accepted no bytes of the large object",
                ));
            }
            buffer = &buffer[written..];
        }
        Ok(())
    }

    /// Flush pending writes and release the object.
    pub fn close(mut self) -> Result<()> {
        self.shutdown()
    }

    fn stream(&mut self, direction: Direction) -> Result<&mut Box<dyn LoStream>> {
        if self.direction != Direction::Unused && self.direction != direction {
            return Err(Error::with_detail(
                ErrorKind::InvalidParam,
                format!(
                    "The large object is open for {}",
                    if self.direction == Direction::Reading {
                        "reading"
                    } else {
                        "writing"
                    }
                ),
            ));
        }
        self.stream
            .as_mut()
            .ok_or_else(|| Error::new(ErrorKind::InvalidHandle))
    }

    fn shutdown(&mut self) -> Result<()> {
        let Some(mut stream) = self.stream.take() else {
            return Ok(());
        };
        let mut result = Ok(());
        if self.direction == Direction::Writing
            && let Err(e) = stream.finish_write()
        {
            let error = e.detach();
            log::error!("{:#}", error);
            result = Err(error);
        }
        result.and(stream.close().map_err(Error::detach))
    }
}

impl Debug for LargeObject<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LargeObject")
            .field("open", &self.stream.is_some())
            .field("direction", &self.direction)
            .finish()
    }
}

impl Drop for LargeObject<'_> {
    fn drop(&mut self) {
        if let Err(e) = self.shutdown() {
            log::error!("Error while dropping the large object: {:#}", e);
        }
    }
}
