//! Rolling reassembly buffer shared by [`CommandDecoder`](crate::protocol::command::CommandDecoder)
//! and [`ResponseDecoder`](crate::protocol::response::ResponseDecoder).
//!
//! Implements the memory policy of §4.3/§5: bytes accumulate past a live
//! `offset` as whole frames are consumed from the front; the buffer grows by
//! doubling its capacity rather than reallocating on every push, and is
//! compacted toward offset 0 once more than half of it has been consumed.

/// A growable byte accumulator with a live window `[offset, data.len())`.
#[derive(Debug, Default)]
pub struct FrameBuffer {
    data: Vec<u8>,
    offset: usize,
}

impl FrameBuffer {
    /// An empty buffer.
    pub fn new() -> Self {
        Self {
            data: Vec::new(),
            offset: 0,
        }
    }

    /// Append freshly-read bytes, compacting first if the consumed prefix
    /// has grown past the midpoint of the buffer.
    pub fn ingest(&mut self, bytes: &[u8]) {
        if self.offset > 0 && self.offset > self.data.len() / 2 {
            self.data.drain(0..self.offset);
            self.offset = 0;
        }

        let needed = self.data.len() + bytes.len();
        if needed > self.data.capacity() {
            let mut new_cap = self.data.capacity().max(1);
            while new_cap < needed {
                new_cap *= 2;
            }
            self.data.reserve(new_cap - self.data.len());
        }

        self.data.extend_from_slice(bytes);
    }

    /// The bytes not yet consumed.
    pub fn live(&self) -> &[u8] {
        &self.data[self.offset..]
    }

    /// How many unconsumed bytes remain.
    pub fn remaining(&self) -> usize {
        self.data.len() - self.offset
    }

    /// Absolute position of the live window's start, for capturing raw-bytes
    /// spans that [`Self::raw`] can later slice out.
    pub fn cursor(&self) -> usize {
        self.offset
    }

    /// Mark `n` bytes of the live window as consumed. Per §3.4 "Cursor
    /// monotonicity", callers must advance by exactly the frame size they
    /// just parsed.
    pub fn advance(&mut self, n: usize) {
        assert!(
            self.offset + n <= self.data.len(),
            "advance({n}) overruns buffer"
        );
        self.offset += n;
    }

    /// Borrow an absolute byte range previously captured via [`Self::cursor`].
    /// Valid only until the next [`Self::ingest`] call, matching the raw-bytes
    /// lifetime contract of §3.4/§9.
    pub fn raw(&self, start: usize, end: usize) -> &[u8] {
        &self.data[start..end]
    }

    /// Reclaim the buffer entirely once the live window has been fully
    /// drained, per §4.3 step 4 ("if offset reached end, reset both").
    pub fn finish_pass(&mut self) {
        if self.offset == self.data.len() {
            self.data.clear();
            self.offset = 0;
        }
    }
}
