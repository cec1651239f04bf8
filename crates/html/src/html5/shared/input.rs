//! Decoded input stream for the HTML5 tokenizer.

use tools::Utf8ChunkDecoder;

/// Consumed prefix length above which `advance` drops consumed text.
const COMPACT_THRESHOLD: usize = 16 * 1024;

/// Pending characters for the tokenizer, with an insertion point for
/// `document.write`.
///
/// Ordering contract:
/// - `append_to_end` text is consumed after everything currently pending.
/// - `insert_at_current_insertion_point` text is consumed before whatever was
///   pending at the cursor when it was inserted. Consecutive insertions with no
///   consumption in between keep their call order.
/// - Consuming input (`advance`) moves the insertion point back to the cursor.
#[derive(Debug, Default)]
pub struct InputStream {
    buffer: String,
    cursor: usize,
    insertion_point: usize,
    closed: bool,
}

impl InputStream {
    pub fn new() -> Self {
        Self::default()
    }

    /// Network path: always lands after all pending content.
    pub fn append_to_end(&mut self, text: &str) {
        assert!(
            !self.closed,
            "InputStream::append_to_end called after close(); network data past end-of-stream"
        );
        self.buffer.push_str(text);
    }

    /// `document.write` path: lands at the insertion point.
    pub fn insert_at_current_insertion_point(&mut self, text: &str) {
        if text.is_empty() {
            return;
        }
        let at = self.insertion_point.max(self.cursor);
        self.buffer.insert_str(at, text);
        self.insertion_point = at + text.len();
    }

    /// Mark end-of-stream; no more network data will arrive.
    pub fn close(&mut self) {
        self.closed = true;
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Remaining, unconsumed input.
    pub fn current(&self) -> &str {
        &self.buffer[self.cursor..]
    }

    /// Number of unconsumed bytes.
    pub fn len(&self) -> usize {
        self.buffer.len() - self.cursor
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// True once closed and fully consumed.
    pub fn is_exhausted(&self) -> bool {
        self.closed && self.is_empty()
    }

    /// Consume `bytes` bytes from the front of `current()`.
    pub fn advance(&mut self, bytes: usize) {
        let next = self.cursor + bytes;
        assert!(
            next <= self.buffer.len() && self.buffer.is_char_boundary(next),
            "InputStream::advance must stay on a char boundary within the buffer (cursor={} advance={} len={})",
            self.cursor,
            bytes,
            self.buffer.len()
        );
        self.cursor = next;
        self.insertion_point = next;
        if self.cursor >= COMPACT_THRESHOLD && self.cursor * 2 >= self.buffer.len() {
            self.buffer.drain(..self.cursor);
            self.cursor = 0;
            self.insertion_point = 0;
        }
    }
}

/// Decode network bytes into text for the input stream.
///
/// This is the pre-tokenizer stage. Only UTF-8 is supported; sequences split
/// across chunks are carried to the next call.
#[derive(Debug, Default)]
pub struct ByteStreamDecoder {
    utf8: Utf8ChunkDecoder,
}

impl ByteStreamDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn decode(&mut self, bytes: &[u8]) -> String {
        self.utf8.decode(bytes)
    }

    /// Flush a dangling partial sequence at end of body.
    pub fn finish(&mut self) -> String {
        self.utf8.finish()
    }
}
