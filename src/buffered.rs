//! Buffered cursors over chunked byte producers.

use std::io;

use log::{debug, trace};

use crate::cursor::StreamCursor;
use crate::error::{Error, Result};

/// Initial buffer capacity of a [`BufferedCursor`].
const INITIAL_CAPACITY: usize = 128 * 1024;

/// Trailing NUL bytes kept past the write position at all times.
const GUARD: usize = 16;

/// The outcome of one producer invocation.
pub enum Refill {
    /// The producer wrote this many bytes into the spare region.
    Filled(usize),
    /// The producer yielded an owned chunk that must be copied in. The cursor
    /// grows its buffer when the chunk exceeds the spare region.
    Chunk(Vec<u8>),
    /// The producer is exhausted.
    Eof,
}

/// A source of byte chunks feeding a [`BufferedCursor`].
///
/// Producers that can target caller memory (file descriptors, `io::Read`)
/// write into `spare` and return [`Refill::Filled`]; producers that hand out
/// owned buffers (pull-callables, iterators) return [`Refill::Chunk`].
pub trait Producer {
    /// Produces the next run of bytes.
    fn produce(&mut self, spare: &mut [u8]) -> Result<Refill>;
}

/// A cursor presenting a contiguous moving window over a [`Producer`].
///
/// The window lives in one growable byte buffer delimited by a read and a
/// write offset. Refilling compacts the unread bytes to the front, grows the
/// buffer when the spare region is gone, invokes the producer, and re-zeroes
/// the 16 guard bytes past the write offset so the over-read guarantee of
/// [`StreamCursor`] holds across every refill.
pub struct BufferedCursor<P> {
    /// Buffer contents; always `GUARD` bytes longer than the data capacity.
    buf: Vec<u8>,
    read_pos: usize,
    write_pos: usize,
    producer: P,
    eof: bool,
    poisoned: bool,
}

impl<P: Producer> BufferedCursor<P> {
    /// Creates a cursor with the default initial capacity.
    pub fn new(producer: P) -> BufferedCursor<P> {
        BufferedCursor::with_capacity(INITIAL_CAPACITY, producer)
    }

    /// Creates a cursor whose buffer starts at `capacity` data bytes.
    pub fn with_capacity(capacity: usize, producer: P) -> BufferedCursor<P> {
        let capacity = capacity.max(GUARD);
        BufferedCursor {
            buf: vec![0; capacity + GUARD],
            read_pos: 0,
            write_pos: 0,
            producer,
            eof: false,
            poisoned: false,
        }
    }

    /// Data capacity, excluding the guard tail.
    fn capacity(&self) -> usize {
        self.buf.len() - GUARD
    }

    /// Grows the buffer so at least `need` spare bytes follow `write_pos`.
    fn grow(&mut self, need: usize) {
        let grown = self.capacity() + self.capacity() / 2 + 4096;
        let target = grown.max(self.write_pos + need);
        trace!("growing buffer {} -> {target}", self.capacity());
        self.buf.resize(target + GUARD, 0);
    }
}

impl<P: Producer> StreamCursor for BufferedCursor<P> {
    fn buf(&self) -> *const u8 {
        // SAFETY: `read_pos <= write_pos < buf.len()` at all times.
        unsafe { self.buf.as_ptr().add(self.read_pos) }
    }

    fn size(&self) -> usize {
        self.write_pos - self.read_pos
    }

    fn consume(&mut self, n: usize) {
        self.read_pos += n.min(self.size());
    }

    fn fill(&mut self) -> Result<bool> {
        if self.poisoned {
            return Err(Error::Poisoned);
        }
        if self.eof {
            return Ok(false);
        }

        // Compact the unread bytes to the front of the buffer.
        if self.read_pos > 0 {
            self.buf.copy_within(self.read_pos..self.write_pos, 0);
            self.write_pos -= self.read_pos;
            self.read_pos = 0;
        }
        if self.write_pos == self.capacity() {
            self.grow(1);
        }

        let capacity = self.capacity();
        let refill = match self.producer.produce(&mut self.buf[self.write_pos..capacity]) {
            Ok(refill) => refill,
            Err(e) => {
                self.poisoned = true;
                return Err(e);
            }
        };

        match refill {
            Refill::Filled(n) => {
                debug_assert!(n <= capacity - self.write_pos);
                self.write_pos += n;
            }
            Refill::Chunk(chunk) => {
                if chunk.len() > capacity - self.write_pos {
                    self.grow(chunk.len());
                }
                self.buf[self.write_pos..self.write_pos + chunk.len()].copy_from_slice(&chunk);
                self.write_pos += chunk.len();
            }
            Refill::Eof => {
                debug!("producer exhausted with {} pending bytes", self.size());
                self.eof = true;
            }
        }

        // Restore the guard tail: compaction and chunk copies may have left
        // stale bytes past the write position.
        self.buf[self.write_pos..self.write_pos + GUARD].fill(0);

        Ok(!self.eof)
    }
}

/// A producer reading from any [`io::Read`], with `read(2)` semantics.
pub struct ReadProducer<R> {
    inner: R,
}

impl<R: io::Read> ReadProducer<R> {
    /// Wraps a reader.
    pub fn new(inner: R) -> ReadProducer<R> {
        ReadProducer { inner }
    }
}

impl<R: io::Read> Producer for ReadProducer<R> {
    fn produce(&mut self, spare: &mut [u8]) -> Result<Refill> {
        loop {
            match self.inner.read(spare) {
                Ok(0) => return Ok(Refill::Eof),
                Ok(n) => return Ok(Refill::Filled(n)),
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            }
        }
    }
}

/// A producer invoking a pull-callable for each chunk.
///
/// The callable is invoked with no arguments and returns the next chunk; an
/// empty chunk signals end-of-stream. When the callable fails, the error is
/// surfaced once and the owning cursor is poisoned: every later `fill`
/// returns [`Error::Poisoned`].
pub struct PullProducer<F> {
    pull: F,
}

impl<F: FnMut() -> io::Result<Vec<u8>>> PullProducer<F> {
    /// Wraps a pull-callable.
    pub fn new(pull: F) -> PullProducer<F> {
        PullProducer { pull }
    }
}

impl<F: FnMut() -> io::Result<Vec<u8>>> Producer for PullProducer<F> {
    fn produce(&mut self, _spare: &mut [u8]) -> Result<Refill> {
        let chunk = (self.pull)()?;
        if chunk.is_empty() {
            Ok(Refill::Eof)
        } else {
            Ok(Refill::Chunk(chunk))
        }
    }
}

/// A producer draining an iterator of byte chunks.
///
/// Iterator exhaustion and zero-length chunks both signal end-of-stream.
pub struct IterProducer<I> {
    chunks: I,
}

impl<I: Iterator<Item = Vec<u8>>> IterProducer<I> {
    /// Wraps a chunk iterator.
    pub fn new(chunks: I) -> IterProducer<I> {
        IterProducer { chunks }
    }
}

impl<I: Iterator<Item = Vec<u8>>> Producer for IterProducer<I> {
    fn produce(&mut self, _spare: &mut [u8]) -> Result<Refill> {
        match self.chunks.next() {
            Some(chunk) if !chunk.is_empty() => Ok(Refill::Chunk(chunk)),
            _ => Ok(Refill::Eof),
        }
    }
}

/// A [`BufferedCursor`] over an [`io::Read`].
pub type ReadCursor<R> = BufferedCursor<ReadProducer<R>>;

/// A [`BufferedCursor`] over a pull-callable.
pub type PullCursor<F> = BufferedCursor<PullProducer<F>>;

/// A [`BufferedCursor`] over a chunk iterator.
pub type ChunkCursor<I> = BufferedCursor<IterProducer<I>>;
