//! Byte-counting writer

use std::io::{self, Write};

/// Writer adapter that counts every byte passed through it.
#[derive(Debug)]
pub struct ByteCounter<W> {
    inner: W,
    count: u64,
}

impl<W: Write> ByteCounter<W> {
    /// Wrap `inner` with a zero count.
    pub fn new(inner: W) -> Self {
        Self { inner, count: 0 }
    }

    /// Bytes written so far.
    pub fn count(&self) -> u64 {
        self.count
    }

    /// Unwrap the inner writer.
    pub fn into_inner(self) -> W {
        self.inner
    }
}

impl<W: Write> Write for ByteCounter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let n = self.inner.write(buf)?;
        self.count += n as u64;
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}
