//! Read-only view over a tokenized request head.

use std::borrow::Cow;
use std::fmt;

use crate::bloom::BloomFilter;
use crate::head::FieldSpan;
use crate::query;

/// Maximum number of head slots, the request line included.
pub const MAX_HEADERS: usize = 50;

/// Borrowed view over one request head.
///
/// Slot 0 holds the request line (lowercased method, request target); the
/// remaining slots hold the header fields in arrival order. Every slice
/// points into the read buffer the head was tokenized from and is only
/// valid for the handler invocation that receives the view.
pub struct HttpRequest<'a> {
    fields: [(&'a [u8], &'a [u8]); MAX_HEADERS],
    count: usize,
    query_separator: usize,
    ancient_http: bool,
    did_yield: bool,
    bf: BloomFilter,
    parameters: &'a [&'a [u8]],
}

impl<'a> HttpRequest<'a> {
    pub(crate) fn new(head: &'a [u8], spans: &[FieldSpan]) -> Self {
        debug_assert!(!spans.is_empty() && spans.len() <= MAX_HEADERS);

        let mut fields: [(&'a [u8], &'a [u8]); MAX_HEADERS] = [(b"", b""); MAX_HEADERS];
        let mut bf = BloomFilter::new();

        for (slot, span) in fields.iter_mut().zip(spans) {
            *slot = (&head[span.name.clone()], &head[span.value.clone()]);
        }
        for (name, _) in &fields[1..spans.len()] {
            bf.add(name);
        }

        let target = fields[0].1;
        let query_separator = target
            .iter()
            .position(|&b| b == b'?')
            .unwrap_or(target.len());

        Self {
            fields,
            count: spans.len(),
            query_separator,
            ancient_http: false,
            did_yield: false,
            bf,
            parameters: &[],
        }
    }

    // ===== Request line =====

    /// Request method, lowercased.
    ///
    /// The tokenizer normalizes the method in place, so this is the byte
    /// view of slot 0's name.
    #[inline]
    pub fn method(&self) -> &'a [u8] {
        self.fields[0].0
    }

    /// Request method exactly as it sits in the buffer.
    ///
    /// Callers must not depend on the original case once the head has been
    /// tokenized.
    #[inline]
    pub fn case_sensitive_method(&self) -> &'a [u8] {
        self.fields[0].0
    }

    /// Full request target, `?query` included.
    #[inline]
    pub fn full_url(&self) -> &'a [u8] {
        self.fields[0].1
    }

    /// Request path, query string excluded.
    #[inline]
    pub fn url(&self) -> &'a [u8] {
        &self.fields[0].1[..self.query_separator]
    }

    /// Raw query string without the leading `?`, empty when absent.
    pub fn query(&self) -> &'a [u8] {
        self.fields[0].1
            .get(self.query_separator + 1..)
            .unwrap_or(b"")
    }

    /// Find `key` in the query string and percent-decode its value.
    pub fn query_value(&self, key: &[u8]) -> Option<Cow<'a, [u8]>> {
        query::decoded_value(&self.fields[0].1[self.query_separator..], key)
    }

    /// Reserved HTTP/1.0 marker; unconditionally false in this core.
    #[inline]
    pub fn is_ancient(&self) -> bool {
        self.ancient_http
    }

    // ===== Headers =====

    /// Look up a header field by its lowercase name.
    ///
    /// `None` means the field is absent; a present field with an empty
    /// value returns `Some(b"")`. The first occurrence wins, duplicates
    /// are not merged.
    pub fn header(&self, lower_name: &[u8]) -> Option<&'a [u8]> {
        if !self.bf.might_have(lower_name) {
            return None;
        }
        self.fields[1..self.count]
            .iter()
            .find(|(name, _)| *name == lower_name)
            .map(|&(_, value)| value)
    }

    /// Iterate over the header fields, request line excluded.
    pub fn headers(&self) -> impl Iterator<Item = (&'a [u8], &'a [u8])> + '_ {
        self.fields[1..self.count].iter().copied()
    }

    // ===== Router integration =====

    /// Route parameter by index; out of range yields an empty slice.
    pub fn parameter(&self, index: usize) -> &'a [u8] {
        self.parameters.get(index).copied().unwrap_or(b"")
    }

    /// Install the parameters captured by the router for this request.
    pub fn set_parameters(&mut self, parameters: &'a [&'a [u8]]) {
        self.parameters = parameters;
    }

    /// Decline this route; opaque to the parser.
    pub fn set_yield(&mut self, did_yield: bool) {
        self.did_yield = did_yield;
    }

    pub fn yielded(&self) -> bool {
        self.did_yield
    }
}

impl fmt::Debug for HttpRequest<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpRequest")
            .field("method", &String::from_utf8_lossy(self.method()))
            .field("url", &String::from_utf8_lossy(self.full_url()))
            .field("headers", &(self.count - 1))
            .finish_non_exhaustive()
    }
}
