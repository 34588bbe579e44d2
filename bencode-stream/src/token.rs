use bytes::Bytes;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenData {
    DictBegin,
    ListBegin,
    /// Payload of a byte string, without its length prefix. Shares storage with [`Token::raw`].
    ByteString(Bytes),
    Integer(i64),
    End,
}

/// A single lexical unit read from the stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    /// Offset of the first byte of the token in the source.
    pub offset: u64,
    /// Every byte consumed for this token, delimiters included.
    pub raw: Bytes,
    pub data: TokenData,
}

impl Token {
    pub(crate) fn delimiter(offset: u64, raw: &'static [u8; 1], data: TokenData) -> Self {
        Self {
            offset,
            raw: Bytes::from_static(raw),
            data,
        }
    }

    /// Number of bytes the token occupies in the source.
    pub fn len(&self) -> usize {
        self.raw.len()
    }

    pub fn is_empty(&self) -> bool {
        self.raw.is_empty()
    }

    /// Offset of the byte right after this token.
    pub fn end_offset(&self) -> u64 {
        self.offset + self.raw.len() as u64
    }

    pub fn is_end(&self) -> bool {
        matches!(self.data, TokenData::End)
    }

    pub fn kind_name(&self) -> &'static str {
        match self.data {
            TokenData::DictBegin => "dictionary start",
            TokenData::ListBegin => "list start",
            TokenData::ByteString(_) => "byte string",
            TokenData::Integer(_) => "integer",
            TokenData::End => "end",
        }
    }
}
