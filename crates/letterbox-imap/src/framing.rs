//! Line framing for the IMAP wire protocol.
//!
//! IMAP is a CRLF-delimited line protocol, but TCP delivers bytes in
//! arbitrary fragments: one line may arrive across many reads and one read
//! may carry several lines. [`LineBuffer`] accumulates raw socket bytes and
//! yields complete lines in arrival order.

use bytes::{Buf, BytesMut};

use crate::{Error, Result};

/// Initial capacity of the accumulation buffer.
const INITIAL_CAPACITY: usize = 4096;

/// Maximum line length to prevent memory exhaustion.
const MAX_LINE_LENGTH: usize = 1024 * 1024; // 1 MB

/// Per-connection accumulation buffer that frames CRLF-terminated lines.
#[derive(Debug, Default)]
pub struct LineBuffer {
    buf: BytesMut,
}

impl LineBuffer {
    /// Creates an empty line buffer.
    #[must_use]
    pub fn new() -> Self {
        Self {
            buf: BytesMut::with_capacity(INITIAL_CAPACITY),
        }
    }

    /// Appends newly arrived socket bytes to the buffer.
    pub fn feed(&mut self, data: &[u8]) {
        self.buf.extend_from_slice(data);
    }

    /// Extracts the next complete line, without its CRLF terminator.
    ///
    /// Returns `Ok(None)` while no full line has arrived yet. A buffer that
    /// grows past [`MAX_LINE_LENGTH`] without a CRLF is a protocol-fatal
    /// error; the caller is expected to tear the connection down.
    pub fn next_line(&mut self) -> Result<Option<Vec<u8>>> {
        match find_crlf(&self.buf) {
            Some(pos) => {
                let line = self.buf[..pos].to_vec();
                self.buf.advance(pos + 2);
                Ok(Some(line))
            }
            None if self.buf.len() > MAX_LINE_LENGTH => {
                Err(Error::Protocol("line too long".to_string()))
            }
            None => Ok(None),
        }
    }

    /// Returns the number of buffered, not-yet-framed bytes.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.buf.len()
    }

    /// Returns true if a complete line is already buffered.
    #[must_use]
    pub fn has_line(&self) -> bool {
        find_crlf(&self.buf).is_some()
    }
}

/// Finds the position of CRLF in a buffer.
fn find_crlf(buf: &[u8]) -> Option<usize> {
    buf.windows(2).position(|w| w == b"\r\n")
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::redundant_clone,
    clippy::manual_string_new,
    clippy::needless_collect,
    clippy::unreadable_literal,
    clippy::used_underscore_items,
    clippy::similar_names
)]
mod tests {
    use super::*;

    #[test]
    fn test_find_crlf() {
        assert_eq!(find_crlf(b"hello\r\n"), Some(5));
        assert_eq!(find_crlf(b"\r\n"), Some(0));
        assert_eq!(find_crlf(b"no newline"), None);
        assert_eq!(find_crlf(b"just\n"), None);
        assert_eq!(find_crlf(b"just\r"), None);
    }

    #[test]
    fn test_single_line() {
        let mut lines = LineBuffer::new();
        lines.feed(b"A1 NOOP\r\n");

        assert_eq!(lines.next_line().unwrap(), Some(b"A1 NOOP".to_vec()));
        assert_eq!(lines.next_line().unwrap(), None);
        assert_eq!(lines.pending(), 0);
    }

    #[test]
    fn test_incomplete_line() {
        let mut lines = LineBuffer::new();
        lines.feed(b"A1 NO");

        assert_eq!(lines.next_line().unwrap(), None);
        assert!(!lines.has_line());

        lines.feed(b"OP\r\n");
        assert!(lines.has_line());
        assert_eq!(lines.next_line().unwrap(), Some(b"A1 NOOP".to_vec()));
    }

    #[test]
    fn test_multiple_lines_in_one_feed() {
        let mut lines = LineBuffer::new();
        lines.feed(b"A1 NOOP\r\nA2 CAPABILITY\r\nA3 LOG");

        assert_eq!(lines.next_line().unwrap(), Some(b"A1 NOOP".to_vec()));
        assert_eq!(lines.next_line().unwrap(), Some(b"A2 CAPABILITY".to_vec()));
        assert_eq!(lines.next_line().unwrap(), None);
        assert_eq!(lines.pending(), 6);
    }

    #[test]
    fn test_crlf_split_across_feeds() {
        let mut lines = LineBuffer::new();
        lines.feed(b"A1 NOOP\r");
        assert_eq!(lines.next_line().unwrap(), None);

        lines.feed(b"\n");
        assert_eq!(lines.next_line().unwrap(), Some(b"A1 NOOP".to_vec()));
    }

    #[test]
    fn test_empty_line() {
        let mut lines = LineBuffer::new();
        lines.feed(b"\r\n");
        assert_eq!(lines.next_line().unwrap(), Some(Vec::new()));
    }

    #[test]
    fn test_bare_lf_is_not_a_terminator() {
        let mut lines = LineBuffer::new();
        lines.feed(b"A1 NOOP\nA2");
        assert_eq!(lines.next_line().unwrap(), None);
    }

    #[test]
    fn test_line_too_long() {
        let mut lines = LineBuffer::new();
        lines.feed(&vec![b'X'; MAX_LINE_LENGTH + 1]);

        let result = lines.next_line();
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("line too long"));
    }

    mod chunking {
        use super::*;
        use proptest::prelude::*;

        fn lines_of(input: &[u8], chunks: &[usize]) -> Vec<Vec<u8>> {
            let mut buffer = LineBuffer::new();
            let mut out = Vec::new();
            let mut pos = 0;

            for &len in chunks {
                let end = (pos + len).min(input.len());
                buffer.feed(&input[pos..end]);
                pos = end;
                while let Some(line) = buffer.next_line().unwrap() {
                    out.push(line);
                }
            }
            buffer.feed(&input[pos..]);
            while let Some(line) = buffer.next_line().unwrap() {
                out.push(line);
            }
            out
        }

        proptest! {
            // Feeding the same bytes in arbitrary fragments must frame the
            // same lines in the same order as feeding them all at once.
            #[test]
            fn fragmentation_invariance(chunks in proptest::collection::vec(1usize..12, 0..24)) {
                let input = b"A1 LOGIN \"foo bar\" baz\r\nA2 SELECT (FLAGS UID)\r\nA3 NOOP\r\n";

                let whole = lines_of(input, &[input.len()]);
                let fragmented = lines_of(input, &chunks);

                prop_assert_eq!(whole, fragmented);
            }
        }
    }
}
