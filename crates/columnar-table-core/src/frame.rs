//! Streaming compression layer for column files.
//!
//! Each column file is an LZ4 *frame* stream: a block-framed format that other
//! LZ4 implementations can read, compressed incrementally as the codec emits
//! bytes. `flush` finalizes the block in progress so buffered data reaches the
//! underlying writer without closing the stream; `finish` finalizes the whole
//! stream. Nothing but the byte stream is shared with the column codec.

use std::io::{self, Read, Write};

use lz4_flex::frame::{FrameDecoder, FrameEncoder};

/// Compressing writer producing an LZ4 frame stream.
pub struct FrameWriter<W: Write> {
    inner: FrameEncoder<W>,
}

impl<W: Write> FrameWriter<W> {
    /// Wrap `sink` in a compressing frame stream.
    pub fn new(sink: W) -> Self {
        FrameWriter {
            inner: FrameEncoder::new(sink),
        }
    }

    /// Finalize the stream, writing the end-of-frame marker, and return the
    /// underlying writer.
    pub fn finish(self) -> io::Result<W> {
        self.inner.finish().map_err(io::Error::other)
    }
}

impl<W: Write> Write for FrameWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.inner.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

/// Decompressing reader over an LZ4 frame stream.
pub struct FrameReader<R: Read> {
    inner: FrameDecoder<R>,
}

impl<R: Read> FrameReader<R> {
    /// Wrap `source` in a decompressing frame stream.
    pub fn new(source: R) -> Self {
        FrameReader {
            inner: FrameDecoder::new(source),
        }
    }
}

impl<R: Read> Read for FrameReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.inner.read(buf)
    }
}
