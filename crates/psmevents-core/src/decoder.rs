//! Peeking decoder for streams of whitespace-separated JSON values.
//!
//! The decoder owns the only byte buffer between the source and the JSON
//! parser. Each value is framed with a small byte scanner that stops exactly
//! at the value's last byte, so nothing past a value is ever pulled out of
//! the buffer. That is what makes [`PeekingDecoder::peek_byte`] safe: the
//! next byte the parser will see is always the next byte in the buffer.

use serde_json::Value;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tracing::trace;

use crate::error::Result;

/// Default capacity of the internal read buffer.
const DEFAULT_CAPACITY: usize = 8 * 1024;

/// Decodes successive JSON values from a byte source with single-byte
/// look-ahead.
#[derive(Debug)]
pub struct PeekingDecoder<R> {
    reader: BufReader<R>,
    /// Bytes of the value currently being framed.
    scratch: Vec<u8>,
}

impl<R: AsyncRead + Unpin> PeekingDecoder<R> {
    /// Wrap a byte source.
    pub fn new(inner: R) -> Self {
        Self::with_capacity(DEFAULT_CAPACITY, inner)
    }

    /// Wrap a byte source using a read buffer of `capacity` bytes.
    pub fn with_capacity(capacity: usize, inner: R) -> Self {
        Self {
            reader: BufReader::with_capacity(capacity.max(1), inner),
            scratch: Vec::new(),
        }
    }

    /// Return the next non-whitespace byte without consuming it.
    ///
    /// Whitespace in front of it is discarded. Returns `Ok(None)` once the
    /// source is exhausted. Repeated calls return the same byte until
    /// [`decode_next`](Self::decode_next) is called.
    pub async fn peek_byte(&mut self) -> Result<Option<u8>> {
        loop {
            let buf = self.reader.fill_buf().await?;
            let Some(&first) = buf.first() else {
                return Ok(None);
            };
            if !is_whitespace(first) {
                return Ok(Some(first));
            }
            let blanks = buf.iter().take_while(|b| is_whitespace(**b)).count();
            self.reader.consume(blanks);
        }
    }

    /// Decode the next JSON value.
    ///
    /// Returns `Ok(None)` when the source ends cleanly between values. A
    /// source that ends inside a value, or malformed bytes, yield
    /// [`Error::Decode`](crate::Error::Decode); the stream should not be
    /// read further after that.
    pub async fn decode_next(&mut self) -> Result<Option<Value>> {
        if self.peek_byte().await?.is_none() {
            return Ok(None);
        }

        self.scratch.clear();
        let mut scanner = Scanner::default();
        loop {
            let buf = self.reader.fill_buf().await?;
            if buf.is_empty() {
                // Bare scalars end at EOF; anything else is truncated and
                // the parser reports it below.
                break;
            }
            match scanner.scan(buf) {
                Some(end) => {
                    self.scratch.extend_from_slice(&buf[..end]);
                    self.reader.consume(end);
                    break;
                }
                None => {
                    let len = buf.len();
                    self.scratch.extend_from_slice(buf);
                    self.reader.consume(len);
                }
            }
        }

        trace!(bytes = self.scratch.len(), "Decoding framed value");
        let value = serde_json::from_slice(&self.scratch)?;
        Ok(Some(value))
    }
}

/// JSON insignificant whitespace.
const fn is_whitespace(b: u8) -> bool {
    matches!(b, b' ' | b'\t' | b'\n' | b'\r')
}

/// Bytes that terminate a bare scalar (number or literal).
const fn is_delimiter(b: u8) -> bool {
    matches!(b, b'{' | b'}' | b'[' | b']' | b',' | b':' | b'"')
}

#[derive(Debug, Clone, Copy)]
enum Frame {
    Container { depth: usize },
    Text,
    Bare,
}

/// Finds where one JSON value ends without parsing it.
#[derive(Debug, Default)]
struct Scanner {
    frame: Option<Frame>,
    in_string: bool,
    escaped: bool,
}

impl Scanner {
    /// Feed the next chunk of the value. Returns the number of bytes of
    /// `buf` that complete the value, or `None` if all of `buf` belongs to
    /// it and more input is needed.
    fn scan(&mut self, buf: &[u8]) -> Option<usize> {
        for (i, &b) in buf.iter().enumerate() {
            let Some(frame) = self.frame.as_mut() else {
                self.frame = Some(match b {
                    b'{' | b'[' => Frame::Container { depth: 1 },
                    b'"' => {
                        self.in_string = true;
                        Frame::Text
                    }
                    _ => Frame::Bare,
                });
                continue;
            };

            if self.in_string {
                if self.escaped {
                    self.escaped = false;
                } else if b == b'\\' {
                    self.escaped = true;
                } else if b == b'"' {
                    self.in_string = false;
                    if matches!(frame, Frame::Text) {
                        return Some(i + 1);
                    }
                }
                continue;
            }

            match frame {
                Frame::Container { depth } => match b {
                    b'"' => self.in_string = true,
                    b'{' | b'[' => *depth += 1,
                    b'}' | b']' => {
                        *depth -= 1;
                        if *depth == 0 {
                            return Some(i + 1);
                        }
                    }
                    _ => {}
                },
                Frame::Bare => {
                    if is_whitespace(b) || is_delimiter(b) {
                        return Some(i);
                    }
                }
                Frame::Text => {}
            }
        }
        None
    }
}
