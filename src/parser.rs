//! Streaming driver.
//!
//! [`HttpParser`] owns the per-connection parse state and sequences head
//! parsing, body delivery, pipelining and error surfacing over a stream
//! of post-padded reads. It runs to completion on every call; whatever
//! does not parse yet is carried in [`Streaming`] state or the fallback
//! accumulator until the next read.

use crate::body::{self, ChunkIterator, ChunkState, Streaming};
use crate::error::{ParseError, ParseErrorKind};
use crate::fallback::Fallback;
use crate::head;
use crate::log::{trace, warning};
use crate::request::HttpRequest;

/// Upper bound for a head spanning multiple reads.
pub const MAX_FALLBACK_SIZE: usize = 4096;

/// Writable bytes callers should keep past the logical end of every read
/// buffer handed to [`HttpParser::consume`].
pub const MINIMUM_HTTP_POST_PADDING: usize = 32;

/// Per-connection HTTP/1.x request parser.
///
/// Strictly single-threaded; the surrounding event loop is expected to
/// serialize reads per connection.
#[derive(Debug, Default)]
pub struct HttpParser {
    streaming: Streaming,
    fallback: Fallback,
}

/// Outcome of draining the fallback accumulator.
enum Drained<U> {
    /// A full head was parsed out of the fallback; continue in `data`.
    Parsed,
    /// Still incomplete; await more bytes.
    Starved,
    /// The bound was hit without a complete head.
    Overflow,
    /// A handler stopped the driver, or the read ended inside a body.
    Stopped(U),
}

impl HttpParser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one read's worth of bytes.
    ///
    /// `data[..len]` is the read; `data` must extend at least one byte
    /// past `len` (callers should keep [`MINIMUM_HTTP_POST_PADDING`]
    /// bytes of padding). The driver writes a `\r` fence at `data[len]`
    /// and lowercases the method and header names in place.
    ///
    /// Each handler receives `user` and returns the token to continue
    /// with; returning a different token stops the driver immediately and
    /// surfaces that token, which is how upgrades and handler-initiated
    /// closes are signalled. `Err` means a protocol violation was
    /// detected and the caller must close the connection.
    ///
    /// For every accepted request, all of its `data_handler` calls happen
    /// before the next `request_handler` call, and the final one carries
    /// `fin == true` with requests without a body reduced to a single
    /// empty fin slice.
    pub fn consume<U, R, D, E>(
        &mut self,
        data: &mut [u8],
        len: usize,
        user: U,
        mut request_handler: R,
        mut data_handler: D,
        mut error_handler: E,
    ) -> Result<U, ParseError>
    where
        U: Copy + PartialEq,
        R: FnMut(U, &mut HttpRequest<'_>) -> U,
        D: FnMut(U, &[u8], bool) -> U,
        E: FnMut(U) -> U,
    {
        assert!(data.len() > len, "read buffer must be post-padded");

        let mut offset = 0;

        if !self.streaming.is_idle() {
            // the previous call left a body mid-stream
            if let Some(token) = self.stream_body(data, len, &mut offset, user, &mut data_handler)? {
                return Ok(token);
            }
        } else if !self.fallback.is_empty() {
            match self.drain_fallback(
                data,
                len,
                &mut offset,
                user,
                &mut request_handler,
                &mut data_handler,
            )? {
                Drained::Parsed => {}
                Drained::Starved => return Ok(user),
                Drained::Overflow => return Ok(error_handler(user)),
                Drained::Stopped(token) => return Ok(token),
            }
        }

        let (consumed, token) = self.fence_and_consume(
            data,
            len,
            offset,
            false,
            user,
            &mut request_handler,
            &mut data_handler,
        )?;
        if token != user {
            return Ok(token);
        }
        offset += consumed;

        if offset < len {
            if len - offset < MAX_FALLBACK_SIZE {
                self.fallback.append(&data[offset..len]);
                trace!("buffered {} bytes of incomplete head", len - offset);
            } else {
                warning!("leftover bytes exceed the fallback bound");
                return Ok(error_handler(user));
            }
        }

        Ok(user)
    }

    /// Append into the fallback and retry the head in consume-minimally
    /// mode. Fallback storage is not the canonical buffer for body
    /// streaming, so on success only the head is taken from it; the body
    /// continues from `data` at `offset`.
    fn drain_fallback<U, R, D>(
        &mut self,
        data: &mut [u8],
        len: usize,
        offset: &mut usize,
        user: U,
        request_handler: &mut R,
        data_handler: &mut D,
    ) -> Result<Drained<U>, ParseError>
    where
        U: Copy + PartialEq,
        R: FnMut(U, &mut HttpRequest<'_>) -> U,
        D: FnMut(U, &[u8], bool) -> U,
    {
        let mut fallback = std::mem::take(&mut self.fallback);
        let had = fallback.len();
        fallback.append(&data[..len]);

        let (buf, logical) = fallback.fence();
        let (consumed, token) =
            self.fence_and_consume(buf, logical, 0, true, user, request_handler, data_handler)?;

        if token != user {
            fallback.unfence();
            self.fallback = fallback;
            return Ok(Drained::Stopped(token));
        }

        if consumed == 0 {
            fallback.unfence();
            self.fallback = fallback;
            if self.fallback.is_full() {
                warning!("fallback filled without a complete head");
                return Ok(Drained::Overflow);
            }
            return Ok(Drained::Starved);
        }

        // the appended bytes completed the head; everything before them
        // came from the fallback itself
        debug_assert!(consumed >= had);
        *offset = consumed - had;
        drop(fallback);

        if !self.streaming.is_idle() {
            if let Some(token) = self.stream_body(data, len, offset, user, data_handler)? {
                return Ok(Drained::Stopped(token));
            }
        }
        Ok(Drained::Parsed)
    }

    /// Continue a body left mid-stream by a previous call.
    ///
    /// `Ok(Some(token))` means the driver must surface `token` now;
    /// `Ok(None)` means the body is done and head parsing may continue at
    /// `offset`.
    fn stream_body<U, D>(
        &mut self,
        data: &[u8],
        len: usize,
        offset: &mut usize,
        user: U,
        data_handler: &mut D,
    ) -> Result<Option<U>, ParseError>
    where
        U: Copy + PartialEq,
        D: FnMut(U, &[u8], bool) -> U,
    {
        match self.streaming {
            Streaming::Chunked(_) => {
                let mut rest = &data[*offset..len];
                let avail = rest.len();
                for chunk in ChunkIterator::new(&mut rest, &mut self.streaming) {
                    data_handler(user, chunk, chunk.is_empty());
                }
                if self.streaming.is_invalid_chunked() {
                    return Err(ParseErrorKind::InvalidChunkedEncoding.into());
                }
                *offset += avail - rest.len();
                Ok(None)
            }
            Streaming::Length(remaining) => {
                let avail = len - *offset;
                let remaining = remaining as usize;
                if remaining >= avail {
                    // the whole read belongs to the body
                    let token = data_handler(user, &data[*offset..len], remaining == avail);
                    self.streaming = match (remaining - avail) as u32 {
                        0 => Streaming::Idle,
                        left => Streaming::Length(left),
                    };
                    *offset = len;
                    Ok(Some(token))
                } else {
                    let token = data_handler(user, &data[*offset..*offset + remaining], true);
                    self.streaming = Streaming::Idle;
                    *offset += remaining;
                    if token != user {
                        return Ok(Some(token));
                    }
                    Ok(None)
                }
            }
            Streaming::Idle => Ok(None),
        }
    }

    /// The deepest part of the parser: tokenize heads starting at `start`
    /// and hand them to the handlers, looping over pipelined requests
    /// until the bytes run out.
    ///
    /// In consume-minimally mode exactly one head is parsed and no body
    /// byte is touched; the bytes past the head may not have arrived in
    /// coherent form yet.
    #[allow(clippy::too_many_arguments)]
    fn fence_and_consume<U, R, D>(
        &mut self,
        data: &mut [u8],
        len: usize,
        start: usize,
        consume_minimally: bool,
        user: U,
        request_handler: &mut R,
        data_handler: &mut D,
    ) -> Result<(usize, U), ParseError>
    where
        U: Copy + PartialEq,
        R: FnMut(U, &mut HttpRequest<'_>) -> U,
        D: FnMut(U, &[u8], bool) -> U,
    {
        // fence one byte past the logical end; every scan stops there
        data[len] = b'\r';

        let mut spans = head::empty_spans();
        let mut pos = start;

        while pos < len {
            let (head_len, count) = head::tokenize(&mut data[pos..], len - pos, &mut spans);
            if head_len == 0 {
                break;
            }

            let head_start = pos;
            pos += head_len;

            let head = &data[head_start..head_start + head_len];
            let mut req = HttpRequest::new(head, &spans[..count]);

            // an absent host is a hard error; an empty-valued host is fine
            if req.header(b"host").is_none() {
                return Err(ParseErrorKind::MissingHost.into());
            }

            // RFC 9112 6.3: a message carrying both transfer-encoding and
            // content-length smells like request smuggling; reject rather
            // than prefer one framer
            let has_transfer_encoding = req.header(b"transfer-encoding").is_some();
            let length_value = req.header(b"content-length");
            if has_transfer_encoding && length_value.is_some() {
                return Err(ParseErrorKind::AmbiguousFraming.into());
            }

            let token = request_handler(user, &mut req);
            if token != user {
                // upgraded or closed by the handler
                return Ok((pos - start, token));
            }

            if has_transfer_encoding {
                // any transfer-encoding is treated as chunked; a proxy that
                // forwards something else is not RFC 9112 compliant, and
                // assuming chunked forecloses obfuscation tricks
                self.streaming = Streaming::Chunked(ChunkState::BEGIN);
                if !consume_minimally {
                    let mut rest = &data[pos..len];
                    let avail = rest.len();
                    for chunk in ChunkIterator::new(&mut rest, &mut self.streaming) {
                        data_handler(user, chunk, chunk.is_empty());
                    }
                    if self.streaming.is_invalid_chunked() {
                        return Err(ParseErrorKind::InvalidChunkedEncoding.into());
                    }
                    pos += avail - rest.len();
                }
            } else if let Some(value) = length_value {
                let Some(remaining) = body::content_length(value) else {
                    return Err(ParseErrorKind::InvalidContentLength.into());
                };
                if remaining == 0 {
                    // normalized to "no body" so fin is emitted exactly
                    // once even when the head arrived through the fallback
                    self.streaming = Streaming::Idle;
                    data_handler(user, b"", true);
                } else {
                    self.streaming = Streaming::Length(remaining);
                    if !consume_minimally {
                        let emit = (remaining as usize).min(len - pos);
                        let fin = emit == remaining as usize;
                        data_handler(user, &data[pos..pos + emit], fin);
                        self.streaming = match remaining - emit as u32 {
                            0 => Streaming::Idle,
                            left => Streaming::Length(left),
                        };
                        pos += emit;
                    }
                }
            } else {
                // no body; a single empty fin slice signals it
                data_handler(user, b"", true);
            }

            if consume_minimally {
                break;
            }
        }

        Ok((pos - start, user))
    }
}
