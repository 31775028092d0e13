//! Byte-stream adapters between generic readers/writers and the JPEG codec.
//!
//! [`StreamSource`] is the pull side: the codec asks for more input and the
//! source refills its fixed buffer from any [`Read`]. A stream that ends early
//! is patched with a synthetic end-of-image marker so a truncated file still
//! decodes as far as the data allows. A stream with no bytes at all is an error.
//!
//! [`StreamSink`] is the push side: the encoder writes into a fixed buffer and
//! the sink drains it to any [`Write`] whenever it fills, and once more when
//! encoding completes.
//!
//! Both buffers are 16 KiB, so memory use is independent of image size.

use log::{debug, warn};
use std::io::{self, BufRead, Read, Write};
use thiserror::Error;

/// Input buffer capacity.
pub const READ_BUFFER_SIZE: usize = 16 * 1024;

/// Output buffer capacity.
pub const WRITE_BUFFER_SIZE: usize = 16 * 1024;

/// End-of-image marker inserted when input runs out.
const FAKE_EOI: [u8; 2] = [0xFF, 0xD9];

#[derive(Error, Debug)]
pub enum SourceError {
    #[error("input is empty")]
    Empty,
    #[error("read failed: {0}")]
    Read(#[source] io::Error),
}

#[derive(Error, Debug)]
pub enum SinkError {
    #[error("write failed: {0}")]
    Write(#[source] io::Error),
}

impl From<SourceError> for io::Error {
    fn from(err: SourceError) -> Self {
        io::Error::other(err)
    }
}

/// Recover a [`SourceError`] that was tunnelled through an [`io::Error`].
pub fn source_error_from_io(err: io::Error) -> Result<SourceError, io::Error> {
    if !err.get_ref().is_some_and(|inner| inner.is::<SourceError>()) {
        return Err(err);
    }
    let kind = err.kind();
    match err.into_inner() {
        Some(inner) => inner
            .downcast::<SourceError>()
            .map(|source| *source)
            .map_err(|other| io::Error::new(kind, other)),
        None => Err(io::Error::from(kind)),
    }
}

/// Pull-model input buffer over any reader.
pub struct StreamSource<R> {
    reader: R,
    buffer: Box<[u8]>,
    len: usize,
    pos: usize,
    start_of_file: bool,
}

impl<R: Read> StreamSource<R> {
    pub fn new(reader: R) -> Self {
        Self::with_capacity(reader, READ_BUFFER_SIZE)
    }

    pub(crate) fn with_capacity(reader: R, capacity: usize) -> Self {
        Self {
            reader,
            buffer: vec![0; capacity.max(FAKE_EOI.len())].into_boxed_slice(),
            len: 0,
            pos: 0,
            start_of_file: true,
        }
    }

    /// Mark the start of a new decode. The next fill is treated as the first read.
    pub fn init(&mut self) {
        self.start_of_file = true;
    }

    /// Bytes buffered but not yet consumed.
    pub fn available(&self) -> usize {
        self.len - self.pos
    }

    /// Replace the buffer contents with the next chunk of input.
    ///
    /// Returns the number of bytes now available. End of input on the very
    /// first fill is [`SourceError::Empty`]; end of input later yields the two
    /// bytes `FF D9`.
    pub fn fill(&mut self) -> Result<usize, SourceError> {
        let read = loop {
            match self.reader.read(&mut self.buffer) {
                Ok(n) => break n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(SourceError::Read(e)),
            }
        };

        let filled = if read == 0 {
            if self.start_of_file {
                return Err(SourceError::Empty);
            }
            warn!("Premature end of JPEG input, inserting EOI marker");
            self.buffer[..FAKE_EOI.len()].copy_from_slice(&FAKE_EOI);
            FAKE_EOI.len()
        } else {
            read
        };

        self.len = filled;
        self.pos = 0;
        self.start_of_file = false;
        Ok(filled)
    }

    /// Discard `n` bytes, refilling as often as needed.
    pub fn skip(&mut self, mut n: usize) -> Result<(), SourceError> {
        while n > self.available() {
            n -= self.available();
            self.fill()?;
        }
        self.pos += n;
        Ok(())
    }

    pub fn read_byte(&mut self) -> Result<u8, SourceError> {
        if self.available() == 0 {
            self.fill()?;
        }
        let byte = self.buffer[self.pos];
        self.pos += 1;
        Ok(byte)
    }

    /// Append exactly `n` bytes to `out`.
    pub fn read_into(&mut self, out: &mut Vec<u8>, mut n: usize) -> Result<(), SourceError> {
        out.reserve(n);
        while n > 0 {
            if self.available() == 0 {
                self.fill()?;
            }
            let take = n.min(self.available());
            out.extend_from_slice(&self.buffer[self.pos..self.pos + take]);
            self.pos += take;
            n -= take;
        }
        Ok(())
    }

    pub fn into_inner(self) -> R {
        self.reader
    }
}

impl<R: Read> Read for StreamSource<R> {
    fn read(&mut self, out: &mut [u8]) -> io::Result<usize> {
        if out.is_empty() {
            return Ok(0);
        }
        let chunk = self.fill_buf()?;
        let n = chunk.len().min(out.len());
        out[..n].copy_from_slice(&chunk[..n]);
        self.consume(n);
        Ok(n)
    }
}

impl<R: Read> BufRead for StreamSource<R> {
    fn fill_buf(&mut self) -> io::Result<&[u8]> {
        if self.available() == 0 {
            self.fill()?;
        }
        Ok(&self.buffer[self.pos..self.len])
    }

    fn consume(&mut self, amount: usize) {
        self.pos = (self.pos + amount).min(self.len);
    }
}

/// Push-model output buffer over any writer.
///
/// The first write failure is kept so callers can report the sink's error
/// rather than whatever the encoder made of it.
pub struct StreamSink<W: Write> {
    writer: W,
    buffer: Box<[u8]>,
    used: usize,
    error: Option<SinkError>,
}

impl<W: Write> StreamSink<W> {
    pub fn new(writer: W) -> Self {
        Self::with_capacity(writer, WRITE_BUFFER_SIZE)
    }

    pub(crate) fn with_capacity(writer: W, capacity: usize) -> Self {
        Self {
            writer,
            buffer: vec![0; capacity.max(1)].into_boxed_slice(),
            used: 0,
            error: None,
        }
    }

    /// Bytes accepted but not yet handed to the writer.
    pub fn pending(&self) -> usize {
        self.used
    }

    /// Write the first `valid` buffered bytes to the writer, then empty the buffer.
    pub fn flush_buffer(&mut self, valid: usize) -> Result<(), SinkError> {
        let mut written = 0;
        while written < valid {
            match self.writer.write(&self.buffer[written..valid]) {
                Ok(0) => {
                    return Err(SinkError::Write(io::Error::new(
                        io::ErrorKind::WriteZero,
                        "writer accepted no bytes",
                    )));
                }
                Ok(n) => written += n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(SinkError::Write(e)),
            }
        }
        self.used = 0;
        Ok(())
    }

    /// Flush the whole buffer. Called when the encoder has filled it.
    pub fn empty_buffer(&mut self) -> Result<(), SinkError> {
        self.flush_buffer(self.buffer.len())
    }

    /// Flush only the used part of the buffer and the writer itself.
    pub fn finish(&mut self) -> Result<(), SinkError> {
        if let Some(err) = self.error.take() {
            return Err(err);
        }
        debug!("Flushing final {} bytes of JPEG output", self.used);
        self.flush_buffer(self.used)?;
        self.writer.flush().map_err(SinkError::Write)
    }

    /// The first error reported to the encoder, if any.
    pub fn take_error(&mut self) -> Option<SinkError> {
        self.error.take()
    }

    pub fn into_inner(self) -> W {
        self.writer
    }

    fn record(&mut self, err: SinkError) -> io::Error {
        let SinkError::Write(inner) = &err;
        let reported = io::Error::new(inner.kind(), inner.to_string());
        if self.error.is_none() {
            self.error = Some(err);
        }
        reported
    }
}

impl<W: Write> Write for StreamSink<W> {
    fn write(&mut self, data: &[u8]) -> io::Result<usize> {
        if data.is_empty() {
            return Ok(0);
        }
        if self.used == self.buffer.len() {
            if let Err(err) = self.empty_buffer() {
                return Err(self.record(err));
            }
        }
        let n = data.len().min(self.buffer.len() - self.used);
        self.buffer[self.used..self.used + n].copy_from_slice(&data[..n]);
        self.used += n;
        if self.used == self.buffer.len() {
            if let Err(err) = self.empty_buffer() {
                return Err(self.record(err));
            }
        }
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        if let Err(err) = self.flush_buffer(self.used) {
            return Err(self.record(err));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::{ChunkedReader, ChunkedWriter, FailingReader, FailingWriter};

    // =========================================================================
    // StreamSource
    // =========================================================================

    #[test]
    fn empty_input_fails_on_first_fill() {
        let mut source = StreamSource::new(io::empty());
        source.init();
        assert!(matches!(source.fill(), Err(SourceError::Empty)));
    }

    #[test]
    fn eof_after_data_synthesizes_eoi() {
        let mut source = StreamSource::new(&[0xFF, 0xD8, 0x00][..]);
        source.init();
        assert_eq!(source.fill().unwrap(), 3);
        source.skip(3).unwrap();
        assert_eq!(source.fill().unwrap(), 2);
        assert_eq!(source.read_byte().unwrap(), 0xFF);
        assert_eq!(source.read_byte().unwrap(), 0xD9);
        // Keeps producing EOI rather than failing.
        assert_eq!(source.fill().unwrap(), 2);
    }

    #[test]
    fn init_rearms_empty_detection() {
        let mut source = StreamSource::new(&[1u8][..]);
        source.init();
        source.fill().unwrap();
        source.init();
        assert!(matches!(source.fill(), Err(SourceError::Empty)));
    }

    #[test]
    fn read_errors_are_fatal() {
        let mut source = StreamSource::new(FailingReader::new(io::ErrorKind::ConnectionReset));
        assert!(matches!(source.fill(), Err(SourceError::Read(e)) if e.kind() == io::ErrorKind::ConnectionReset));
    }

    #[test]
    fn skip_spans_several_refills() {
        let data: Vec<u8> = (0..=255).collect();
        let mut source = StreamSource::with_capacity(ChunkedReader::new(data, 7), 7);
        source.init();
        source.fill().unwrap();
        source.skip(100).unwrap();
        assert_eq!(source.read_byte().unwrap(), 100);
    }

    #[test]
    fn skip_zero_leaves_position_alone() {
        let mut source = StreamSource::with_capacity(ChunkedReader::new(vec![5, 6, 7], 3), 3);
        source.init();
        source.skip(0).unwrap();
        assert_eq!(source.read_byte().unwrap(), 5);
        source.skip(0).unwrap();
        assert_eq!(source.available(), 2);
        assert_eq!(source.read_byte().unwrap(), 6);
    }

    #[test]
    fn skip_one_past_buffer_refills_once() {
        let data: Vec<u8> = (0..=255).collect();
        let mut source = StreamSource::with_capacity(ChunkedReader::new(data, 7), 7);
        source.init();
        source.fill().unwrap();
        source.skip(8).unwrap();
        assert_eq!(source.available(), 6);
        assert_eq!(source.read_byte().unwrap(), 8);
    }

    #[test]
    fn skip_of_exactly_buffered_does_not_refill() {
        let mut source = StreamSource::with_capacity(ChunkedReader::new(vec![1, 2, 3, 4], 2), 2);
        source.fill().unwrap();
        source.skip(2).unwrap();
        assert_eq!(source.available(), 0);
        assert_eq!(source.read_byte().unwrap(), 3);
    }

    #[test]
    fn read_into_collects_across_chunks() {
        let mut source = StreamSource::with_capacity(ChunkedReader::new((0..20).collect(), 3), 3);
        let mut out = Vec::new();
        source.read_into(&mut out, 10).unwrap();
        assert_eq!(out, (0..10).collect::<Vec<u8>>());
    }

    #[test]
    fn read_trait_reports_empty_as_source_error() {
        let mut source = StreamSource::new(io::empty());
        let err = source.read(&mut [0u8; 4]).unwrap_err();
        assert!(matches!(source_error_from_io(err), Ok(SourceError::Empty)));
    }

    #[test]
    fn unrelated_io_errors_pass_through() {
        let err = io::Error::new(io::ErrorKind::InvalidData, "bad");
        let back = source_error_from_io(err).unwrap_err();
        assert_eq!(back.kind(), io::ErrorKind::InvalidData);
    }

    #[test]
    fn read_past_end_yields_eoi() {
        let mut source = StreamSource::new(&[7u8, 8][..]);
        let mut out = [0u8; 4];
        source.read_exact(&mut out).unwrap();
        assert_eq!(out, [7, 8, 0xFF, 0xD9]);
    }

    // =========================================================================
    // StreamSink
    // =========================================================================

    #[test]
    fn sink_flushes_when_full_and_on_finish() {
        let mut sink = StreamSink::with_capacity(Vec::new(), 4);
        sink.write_all(&[1, 2, 3, 4, 5, 6]).unwrap();
        assert_eq!(sink.pending(), 2);
        sink.finish().unwrap();
        assert_eq!(sink.into_inner(), vec![1, 2, 3, 4, 5, 6]);
    }

    #[test]
    fn sink_loops_over_partial_writes() {
        let mut sink = StreamSink::with_capacity(ChunkedWriter::new(3), 16);
        sink.write_all(&[9; 10]).unwrap();
        sink.finish().unwrap();
        let writer = sink.into_inner();
        assert_eq!(writer.data, vec![9; 10]);
        assert_eq!(writer.calls, 4);
    }

    #[test]
    fn sink_keeps_first_write_error() {
        let mut sink = StreamSink::with_capacity(FailingWriter::new(io::ErrorKind::BrokenPipe), 2);
        assert!(sink.write_all(&[1, 2, 3]).is_err());
        let err = sink.take_error().unwrap();
        assert!(matches!(err, SinkError::Write(e) if e.kind() == io::ErrorKind::BrokenPipe));
    }

    #[test]
    fn zero_length_write_is_an_error() {
        let mut sink = StreamSink::with_capacity(ChunkedWriter::new(0), 2);
        sink.write_all(&[1]).unwrap();
        let err = sink.finish().unwrap_err();
        assert!(matches!(err, SinkError::Write(e) if e.kind() == io::ErrorKind::WriteZero));
    }

    #[test]
    fn finish_with_nothing_written_is_ok() {
        let mut sink = StreamSink::new(Vec::new());
        sink.finish().unwrap();
        assert!(sink.into_inner().is_empty());
    }
}
