//! Bounded accumulator for heads spanning multiple reads.

use bytes::BytesMut;

use crate::parser::{MAX_FALLBACK_SIZE, MINIMUM_HTTP_POST_PADDING};

/// Holds the incomplete prefix of a head until enough bytes arrive.
///
/// Non-empty only between a read that ended mid-head and the read that
/// completes it; cleared the instant a head parses. Never grows past
/// [`MAX_FALLBACK_SIZE`].
#[derive(Debug, Default)]
pub(crate) struct Fallback {
    buf: BytesMut,
}

impl Fallback {
    #[inline]
    pub(crate) fn len(&self) -> usize {
        self.buf.len()
    }

    #[inline]
    pub(crate) fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    #[inline]
    pub(crate) fn is_full(&self) -> bool {
        self.buf.len() == MAX_FALLBACK_SIZE
    }

    /// Append as much of `data` as the bound allows, keeping fence room
    /// past the logical end. Returns the number of bytes copied.
    pub(crate) fn append(&mut self, data: &[u8]) -> usize {
        let take = data.len().min(MAX_FALLBACK_SIZE - self.buf.len());
        self.buf.reserve(take + MINIMUM_HTTP_POST_PADDING);
        self.buf.extend_from_slice(&data[..take]);
        take
    }

    /// Materialize the `\r` fence past the logical end and expose the
    /// buffer for tokenizing. Pair with [`Fallback::unfence`] while the
    /// head is still incomplete.
    pub(crate) fn fence(&mut self) -> (&mut [u8], usize) {
        let len = self.buf.len();
        self.buf.extend_from_slice(b"\r");
        (&mut self.buf[..], len)
    }

    pub(crate) fn unfence(&mut self) {
        self.buf.truncate(self.buf.len() - 1);
    }
}
