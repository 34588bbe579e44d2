pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum ErrorKind {
    #[error("unexpected byte at offset {offset}")]
    InvalidToken { offset: u64 },

    #[error("unexpected byte {got:#04x} at offset {offset}, expected {expected:#04x}")]
    UnexpectedByte { offset: u64, got: u8, expected: u8 },

    #[error("string too long at offset {token_offset}; next token starts at {next_token_offset}")]
    StringTooLong {
        token_offset: u64,
        next_token_offset: u64,
    },

    #[error("unexpected end of stream")]
    UnexpectedEndOfStream,

    #[error("unexpected end token at offset {offset}")]
    UnexpectedEnd { offset: u64 },

    #[error("non-string dictionary key at offset {offset}")]
    NonStringKey { offset: u64 },

    #[error("nesting too deep at offset {offset}")]
    NestingTooDeep { offset: u64 },

    #[error("trailing data at offset {offset}")]
    TrailingData { offset: u64 },

    #[error("missing key")]
    MissingKey,

    #[error("invalid value")]
    Message,

    #[error("read error: {0}")]
    Io(#[from] std::io::Error),
}

struct ErrorContext {
    lines: Vec<String>,
}

pub struct Error {
    kind: ErrorKind,
    context: Option<Box<ErrorContext>>,
}

impl std::fmt::Debug for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut s = f.debug_struct("Error");
        s.field("kind", &self.kind);
        if let Some(ctx) = &self.context {
            s.field("context", &ctx.lines);
        }
        s.finish()
    }
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.kind)?;
        if let Some(ctx) = &self.context {
            for line in ctx.lines.iter().rev() {
                write!(f, "\n\t{}", line)?;
            }
        }
        Ok(())
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match &self.kind {
            ErrorKind::Io(err) => Some(err),
            _ => None,
        }
    }
}

impl From<ErrorKind> for Error {
    fn from(kind: ErrorKind) -> Self {
        Self::new(kind)
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Self::new(ErrorKind::Io(err))
    }
}

impl Error {
    pub(crate) fn new(kind: ErrorKind) -> Self {
        Self {
            kind,
            context: None,
        }
    }

    pub(crate) fn missing_key(key: &[u8]) -> Self {
        let mut err = Self::new(ErrorKind::MissingKey);
        err.add_context(format!("missing key: '{}'", TryDisplayUtf8(key)));
        err
    }

    pub fn message(msg: impl Into<String>) -> Self {
        let mut err = Self::new(ErrorKind::Message);
        err.add_context(msg.into());
        err
    }

    pub fn kind(&self) -> &ErrorKind {
        &self.kind
    }

    pub fn into_kind(self) -> ErrorKind {
        self.kind
    }

    /// Context lines, innermost first.
    pub fn context_lines(&self) -> &[String] {
        match &self.context {
            Some(ctx) => &ctx.lines,
            None => &[],
        }
    }

    /// Byte offset the error points at, when the error kind carries one.
    pub fn offset(&self) -> Option<u64> {
        match self.kind {
            ErrorKind::InvalidToken { offset }
            | ErrorKind::UnexpectedByte { offset, .. }
            | ErrorKind::UnexpectedEnd { offset }
            | ErrorKind::NonStringKey { offset }
            | ErrorKind::NestingTooDeep { offset }
            | ErrorKind::TrailingData { offset } => Some(offset),
            ErrorKind::StringTooLong { token_offset, .. } => Some(token_offset),
            _ => None,
        }
    }

    fn add_context(&mut self, msg: String) {
        match &mut self.context {
            Some(ctx) => ctx.lines.push(msg),
            None => self.context = Some(Box::new(ErrorContext { lines: vec![msg] })),
        }
    }
}

pub trait Context<T> {
    fn context(self, context: &str) -> Result<T>;
    fn with_context<F: FnOnce() -> String>(self, f: F) -> Result<T>;
}

impl<T> Context<T> for Result<T> {
    fn context(mut self, context: &str) -> Result<T> {
        if let Err(ref mut error) = self {
            error.add_context(context.to_string());
        }
        self
    }

    fn with_context<F: FnOnce() -> String>(mut self, f: F) -> Result<T> {
        if let Err(ref mut error) = self {
            error.add_context(f());
        }
        self
    }
}

pub(crate) struct TryDisplayUtf8<'a>(pub(crate) &'a [u8]);

impl<'a> std::fmt::Display for TryDisplayUtf8<'a> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match std::str::from_utf8(self.0) {
            Ok(str) => f.write_str(str),
            _ => write!(f, "{:?}", self.0),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn context_is_displayed_outermost_first() {
        let result: Result<()> = Err(Error::new(ErrorKind::UnexpectedEndOfStream));
        let err = result
            .context("unexpected end of list")
            .with_context(|| "decoding key value: 'n'".to_string())
            .unwrap_err();

        assert_eq!(
            err.context_lines(),
            &["unexpected end of list", "decoding key value: 'n'"]
        );
        assert_eq!(
            err.to_string(),
            "unexpected end of stream\n\tdecoding key value: 'n'\n\tunexpected end of list"
        );
    }

    #[test]
    fn kind_display() {
        let kind = ErrorKind::UnexpectedByte {
            offset: 1,
            got: b'2',
            expected: b':',
        };
        insta::assert_snapshot!(kind.to_string(), @"unexpected byte 0x32 at offset 1, expected 0x3a");

        let kind = ErrorKind::StringTooLong {
            token_offset: 0,
            next_token_offset: 15,
        };
        insta::assert_snapshot!(kind.to_string(), @"string too long at offset 0; next token starts at 15");
    }

    #[test]
    fn offsets() {
        assert_eq!(
            Error::new(ErrorKind::InvalidToken { offset: 7 }).offset(),
            Some(7)
        );
        assert_eq!(
            Error::new(ErrorKind::StringTooLong {
                token_offset: 3,
                next_token_offset: 40
            })
            .offset(),
            Some(3)
        );
        assert_eq!(Error::new(ErrorKind::UnexpectedEndOfStream).offset(), None);
    }

    #[test]
    fn missing_key_mentions_key() {
        let err = Error::missing_key(b"announce");
        assert!(matches!(err.kind(), ErrorKind::MissingKey));
        assert_eq!(err.context_lines(), &["missing key: 'announce'"]);
    }
}
