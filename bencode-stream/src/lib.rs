//! Streaming bencode decoder and canonical encoder.
//!
//! [`Tokenizer`] reads tokens from any [`std::io::Read`] source, [`Decoder`] assembles them into
//! [`Value`] trees and [`Dictionary`] keeps keys sorted so that encoding always produces
//! canonical output.

mod error;
pub use error::{Context, Error, ErrorKind, Result};

mod token;
pub use token::{Token, TokenData};

mod tokenizer;
pub use tokenizer::{
    DecoderOptions, Tokenizer, DEFAULT_MAX_DEPTH, DEFAULT_MAX_INTEGER_LENGTH,
    DEFAULT_MAX_STRING_LENGTH,
};

mod value;
pub use value::Value;

mod dict;
pub use dict::{canonical_key, Dictionary};

mod decode;
pub use decode::{decode, decode_value, Decoder, FromValue, Values};

mod encode;
pub use encode::{encode, DictEncoder, Encode, Encoder, ListEncoder};
