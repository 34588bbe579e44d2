use std::io::Read;

use bytes::Bytes;

use crate::{
    error::TryDisplayUtf8, Context, DecoderOptions, Dictionary, Error, ErrorKind, Result, Token,
    TokenData, Tokenizer, Value,
};

/// Rebuilds values from the tokens of a byte source.
///
/// Dictionaries are accepted with keys in any order and with duplicates, the last value for a
/// key wins. Errors are final: the decoder does not try to resynchronize after one.
#[derive(Debug)]
pub struct Decoder<R> {
    tokenizer: Tokenizer<R>,
}

impl<R: Read> Decoder<R> {
    pub fn new(reader: R) -> Self {
        Self::with_options(reader, DecoderOptions::default())
    }

    pub fn with_options(reader: R, options: DecoderOptions) -> Self {
        Self {
            tokenizer: Tokenizer::with_options(reader, options),
        }
    }

    pub fn next_token(&mut self) -> Result<Option<Token>> {
        self.tokenizer.next_token()
    }

    /// Decodes the next top-level value, or returns `Ok(None)` if the source is exhausted.
    pub fn decode(&mut self) -> Result<Option<Value>> {
        match self.next_token().context("could not read token")? {
            Some(token) => self.decode_value(token).map(Some),
            None => Ok(None),
        }
    }

    /// Decodes the value that starts with `token`, reading the rest of it from the source.
    pub fn decode_value(&mut self, token: Token) -> Result<Value> {
        self.decode_nested(token, 0)
    }

    /// Iterates over consecutive top-level values until the source is exhausted or an error
    /// is returned.
    pub fn values(&mut self) -> Values<'_, R> {
        Values {
            decoder: self,
            done: false,
        }
    }

    pub fn offset(&self) -> u64 {
        self.tokenizer.offset()
    }

    pub fn tokenizer(&self) -> &Tokenizer<R> {
        &self.tokenizer
    }

    pub fn into_inner(self) -> R {
        self.tokenizer.into_inner()
    }

    fn decode_nested(&mut self, token: Token, depth: usize) -> Result<Value> {
        match token.data {
            TokenData::Integer(v) => Ok(Value::Integer(v)),
            TokenData::ByteString(v) => Ok(Value::Bytes(v)),
            TokenData::ListBegin => {
                self.check_depth(token.offset, depth)?;
                self.decode_list(depth + 1)
            }
            TokenData::DictBegin => {
                self.check_depth(token.offset, depth)?;
                self.decode_dict(depth + 1)
            }
            TokenData::End => {
                tracing::debug!(offset = token.offset, "unexpected end token");
                Err(Error::new(ErrorKind::UnexpectedEnd {
                    offset: token.offset,
                }))
            }
        }
    }

    fn check_depth(&self, offset: u64, depth: usize) -> Result<()> {
        if depth >= self.tokenizer.options().max_depth {
            tracing::debug!(offset, depth, "nesting too deep");
            return Err(Error::new(ErrorKind::NestingTooDeep { offset }));
        }
        Ok(())
    }

    fn decode_list(&mut self, depth: usize) -> Result<Value> {
        let mut values = Vec::new();
        loop {
            let token = match self.next_token().context("could not read token")? {
                Some(token) => token,
                None => {
                    return Err(Error::new(ErrorKind::UnexpectedEndOfStream))
                        .context("unexpected end of list")
                }
            };
            if token.is_end() {
                return Ok(Value::List(values));
            }

            let item = self
                .decode_nested(token, depth)
                .with_context(|| format!("decoding list item {}", values.len()))?;
            values.push(item);
        }
    }

    fn decode_dict(&mut self, depth: usize) -> Result<Value> {
        let dict = Dictionary::new();
        loop {
            let key_token = match self.next_token().context("could not read key token")? {
                Some(token) => token,
                None => {
                    return Err(Error::new(ErrorKind::UnexpectedEndOfStream))
                        .context("unexpected end of dictionary")
                }
            };
            let key = match key_token.data {
                TokenData::End => return Ok(Value::Dict(dict)),
                TokenData::ByteString(key) => key,
                _ => {
                    tracing::debug!(offset = key_token.offset, "non-string dictionary key");
                    return Err(Error::new(ErrorKind::NonStringKey {
                        offset: key_token.offset,
                    }));
                }
            };

            let value_token = match self.next_token().context("could not read value token")? {
                Some(token) => token,
                None => {
                    return Err(Error::new(ErrorKind::UnexpectedEndOfStream))
                        .context("unexpected end of dictionary")
                }
            };
            if value_token.is_end() {
                return Err(Error::new(ErrorKind::UnexpectedEnd {
                    offset: value_token.offset,
                }))
                .context("unexpected end of dictionary");
            }

            let value = self
                .decode_nested(value_token, depth)
                .with_context(|| format!("decoding key value: '{}'", TryDisplayUtf8(&key)))?;
            if dict.set(key, value).is_some() {
                tracing::debug!("duplicate dictionary key, keeping the last value");
            }
        }
    }
}

pub struct Values<'d, R> {
    decoder: &'d mut Decoder<R>,
    done: bool,
}

impl<'d, R: Read> Iterator for Values<'d, R> {
    type Item = Result<Value>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.decoder.decode() {
            Ok(Some(value)) => Some(Ok(value)),
            Ok(None) => {
                self.done = true;
                None
            }
            Err(err) => {
                self.done = true;
                Some(Err(err))
            }
        }
    }
}

/// Decodes a buffer holding exactly one value.
pub fn decode_value(buf: &[u8]) -> Result<Value> {
    let mut decoder = Decoder::new(buf);
    let value = match decoder.decode()? {
        Some(value) => value,
        None => return Err(Error::new(ErrorKind::UnexpectedEndOfStream)),
    };

    let offset = decoder.offset();
    if offset != buf.len() as u64 {
        return Err(Error::new(ErrorKind::TrailingData { offset }));
    }
    Ok(value)
}

pub fn decode<T: FromValue>(buf: &[u8]) -> Result<T> {
    let value = decode_value(buf)?;
    T::from_value(&value)
}

pub trait FromValue: Sized {
    fn from_value(value: &Value) -> Result<Self>;
}

macro_rules! impl_from_value_integer {
    ($t:ty) => {
        impl FromValue for $t {
            fn from_value(value: &Value) -> Result<Self> {
                Ok(value
                    .as_integer()?
                    .try_into()
                    .map_err(|_| Error::message("integer overflow"))?)
            }
        }
    };
}

impl_from_value_integer!(i8);
impl_from_value_integer!(i16);
impl_from_value_integer!(i32);
impl_from_value_integer!(i64);
impl_from_value_integer!(u8);
impl_from_value_integer!(u16);
impl_from_value_integer!(u32);
impl_from_value_integer!(u64);

impl FromValue for String {
    fn from_value(value: &Value) -> Result<Self> {
        Ok(value.as_str()?.to_owned())
    }
}

impl FromValue for Bytes {
    fn from_value(value: &Value) -> Result<Self> {
        Ok(value.as_bytes()?.clone())
    }
}

impl FromValue for Value {
    fn from_value(value: &Value) -> Result<Self> {
        Ok(value.clone())
    }
}

impl<T> FromValue for Vec<T>
where
    T: FromValue,
{
    fn from_value(value: &Value) -> Result<Self> {
        let list = value.as_list()?;
        let mut values = Vec::with_capacity(list.len());
        for (index, v) in list.iter().enumerate() {
            values.push(T::from_value(v).with_context(|| format!("decoding list item {index}"))?);
        }
        Ok(values)
    }
}
