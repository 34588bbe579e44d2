use std::io::Read;

use bytes::{BufMut, Bytes, BytesMut};

use crate::{Error, ErrorKind, Result, Token, TokenData};

pub const DEFAULT_MAX_INTEGER_LENGTH: usize = 64 * 1024;
pub const DEFAULT_MAX_STRING_LENGTH: u64 = 16 * 1024 * 1024;
pub const DEFAULT_MAX_DEPTH: usize = 256;

// a declared length only reserves this much up front, the rest grows as bytes arrive
const INITIAL_STRING_CAPACITY: u64 = 64 * 1024;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecoderOptions {
    /// Maximum number of bytes read for an integer, excluding the `i` and `e` delimiters.
    ///
    /// `i10e` needs `max_integer_length >= 2`. Does not affect byte strings.
    pub max_integer_length: usize,

    /// Maximum payload length of a byte string, excluding its length prefix.
    ///
    /// The prefix itself is limited to as many digits as this value has in decimal. With
    /// `max_string_length = 9` only one digit is read before a `:` is expected, so
    /// `12:Lorem ipsum.` is rejected on the `2`.
    pub max_string_length: u64,

    /// Maximum nesting of lists and dictionaries accepted by the decoder.
    pub max_depth: usize,
}

impl Default for DecoderOptions {
    fn default() -> Self {
        Self {
            max_integer_length: DEFAULT_MAX_INTEGER_LENGTH,
            max_string_length: DEFAULT_MAX_STRING_LENGTH,
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }
}

impl DecoderOptions {
    fn max_length_digits(&self) -> usize {
        self.max_string_length
            .checked_ilog10()
            .map_or(1, |log| log as usize + 1)
    }
}

/// Pulls tokens out of a byte source, one at a time.
///
/// The tokenizer never reads past the token it is producing, so the source can be shared with
/// other consumers between calls.
#[derive(Debug)]
pub struct Tokenizer<R> {
    reader: R,
    options: DecoderOptions,
    offset: u64,
    eof: bool,
}

impl<R: Read> Tokenizer<R> {
    pub fn new(reader: R) -> Self {
        Self::with_options(reader, DecoderOptions::default())
    }

    pub fn with_options(reader: R, options: DecoderOptions) -> Self {
        Self {
            reader,
            options,
            offset: 0,
            eof: false,
        }
    }

    /// Reads the next token.
    ///
    /// Returns `Ok(None)` once the source is exhausted between tokens, and keeps returning it
    /// on every later call without touching the source again.
    pub fn next_token(&mut self) -> Result<Option<Token>> {
        if self.eof {
            return Ok(None);
        }

        let offset = self.offset;
        let prefix = match self.consume_one()? {
            Some(c) => c,
            None => return Ok(None),
        };

        let token = match prefix {
            b'e' => Token::delimiter(offset, b"e", TokenData::End),
            b'd' => Token::delimiter(offset, b"d", TokenData::DictBegin),
            b'l' => Token::delimiter(offset, b"l", TokenData::ListBegin),
            b'i' => self.decode_integer(offset)?,
            b'0'..=b'9' => self.decode_string(offset, prefix)?,
            _ => {
                tracing::debug!(offset, byte = prefix, "invalid token prefix");
                return Err(Error::new(ErrorKind::InvalidToken { offset }));
            }
        };

        tracing::trace!(offset, kind = token.kind_name(), len = token.len(), "token");
        Ok(Some(token))
    }

    /// Total number of bytes consumed from the source so far.
    pub fn offset(&self) -> u64 {
        self.offset
    }

    pub fn is_eof(&self) -> bool {
        self.eof
    }

    pub fn options(&self) -> &DecoderOptions {
        &self.options
    }

    pub fn get_ref(&self) -> &R {
        &self.reader
    }

    pub fn into_inner(self) -> R {
        self.reader
    }

    fn decode_integer(&mut self, offset: u64) -> Result<Token> {
        let max_length = self.options.max_integer_length;
        let mut digits = Vec::new();
        loop {
            let c = self.require_one()?;
            if c == b'e' {
                break;
            }

            let valid = (digits.is_empty() && c == b'-') || c.is_ascii_digit();
            if !valid {
                tracing::debug!(offset, byte = c, "invalid byte in integer");
                return Err(Error::new(ErrorKind::InvalidToken { offset }));
            }
            if digits.len() == max_length {
                tracing::debug!(offset, max_length, "integer too long");
                return Err(Error::new(ErrorKind::UnexpectedByte {
                    offset: self.offset - 1,
                    got: c,
                    expected: b'e',
                }));
            }
            digits.push(c);
        }

        // parsing alone accepts `-0` and leading zeros, the round trip does not
        let value = match parse_canonical::<i64>(&digits) {
            Some(value) => value,
            None => {
                tracing::debug!(offset, "non canonical integer");
                return Err(Error::new(ErrorKind::InvalidToken { offset }));
            }
        };

        let mut raw = BytesMut::with_capacity(digits.len() + 2);
        raw.put_u8(b'i');
        raw.extend_from_slice(&digits);
        raw.put_u8(b'e');
        Ok(Token {
            offset,
            raw: raw.freeze(),
            data: TokenData::Integer(value),
        })
    }

    fn decode_string(&mut self, offset: u64, first: u8) -> Result<Token> {
        let max_digits = self.options.max_length_digits();
        let mut prefix = vec![first];
        loop {
            let c = self.require_one()?;
            if c == b':' {
                break;
            }

            if !c.is_ascii_digit() {
                tracing::debug!(offset, byte = c, "invalid byte in string length");
                return Err(Error::new(ErrorKind::InvalidToken { offset }));
            }
            if prefix.len() == max_digits {
                tracing::debug!(offset, max_digits, "string length prefix too long");
                return Err(Error::new(ErrorKind::UnexpectedByte {
                    offset: self.offset - 1,
                    got: c,
                    expected: b':',
                }));
            }
            prefix.push(c);
        }

        // a 20 digit prefix may not fit in u64 and still has to be reported as too long
        let length = match parse_canonical::<u128>(&prefix) {
            Some(length) => length,
            None => {
                tracing::debug!(offset, "non canonical string length");
                return Err(Error::new(ErrorKind::InvalidToken { offset }));
            }
        };
        let length = match u64::try_from(length) {
            Ok(length) if length <= self.options.max_string_length => length,
            _ => {
                tracing::debug!(offset, %length, "string too long");
                let next_token_offset = u64::try_from(length)
                    .map_or(u64::MAX, |length| self.offset.saturating_add(length));
                return Err(Error::new(ErrorKind::StringTooLong {
                    token_offset: offset,
                    next_token_offset,
                }));
            }
        };

        let header = prefix.len() + 1;
        let capacity = length.min(INITIAL_STRING_CAPACITY) as usize;
        let mut raw = Vec::with_capacity(header + capacity);
        raw.extend_from_slice(&prefix);
        raw.push(b':');
        self.consume_n(&mut raw, length)?;

        let raw = Bytes::from(raw);
        let value = raw.slice(header..);
        Ok(Token {
            offset,
            raw,
            data: TokenData::ByteString(value),
        })
    }

    fn consume_one(&mut self) -> Result<Option<u8>> {
        let mut buf = [0u8; 1];
        loop {
            match self.reader.read(&mut buf) {
                Ok(0) => {
                    self.eof = true;
                    return Ok(None);
                }
                Ok(n) => {
                    self.offset += n as u64;
                    return Ok(Some(buf[0]));
                }
                Err(err) if err.kind() == std::io::ErrorKind::Interrupted => continue,
                Err(err) => return Err(err.into()),
            }
        }
    }

    fn require_one(&mut self) -> Result<u8> {
        match self.consume_one()? {
            Some(c) => Ok(c),
            None => Err(Error::new(ErrorKind::UnexpectedEndOfStream)),
        }
    }

    fn consume_n(&mut self, buf: &mut Vec<u8>, n: u64) -> Result<()> {
        let start = buf.len();
        let result = (&mut self.reader).take(n).read_to_end(buf);
        let read = (buf.len() - start) as u64;
        self.offset += read;
        result?;

        if read < n {
            self.eof = true;
            tracing::debug!(wanted = n, read, "source exhausted inside string");
            return Err(Error::new(ErrorKind::UnexpectedEndOfStream));
        }
        Ok(())
    }
}

fn parse_canonical<T>(digits: &[u8]) -> Option<T>
where
    T: std::str::FromStr + std::fmt::Display,
{
    let value = std::str::from_utf8(digits).ok()?.parse::<T>().ok()?;
    if value.to_string().as_bytes() == digits {
        Some(value)
    } else {
        None
    }
}
