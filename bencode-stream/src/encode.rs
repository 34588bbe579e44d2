use bytes::Bytes;

use crate::Value;

#[derive(Debug)]
pub struct Encoder<'a> {
    buf: &'a mut Vec<u8>,
}

pub struct ListEncoder<'e, 'a> {
    encoder: &'e mut Encoder<'a>,
}

impl<'e, 'a> Drop for ListEncoder<'e, 'a> {
    fn drop(&mut self) {
        self.encoder.buf.push(b'e');
    }
}

impl<'e, 'a> ListEncoder<'e, 'a> {
    pub fn push<T: Encode>(&mut self, value: T) {
        value.encode(self.encoder);
    }

    pub fn push_with_encoder(&mut self, f: impl FnOnce(&mut Encoder)) {
        f(self.encoder);
    }
}

pub struct DictEncoder<'e, 'a> {
    encoder: &'e mut Encoder<'a>,
    // None when the caller pushes keys already in ascending order
    pairs: Option<Vec<(Vec<u8>, Vec<u8>)>>,
}

impl<'e, 'a> Drop for DictEncoder<'e, 'a> {
    fn drop(&mut self) {
        if let Some(pairs) = &mut self.pairs {
            pairs.sort_by(|a, b| a.0.cmp(&b.0));
            for pair in pairs.iter() {
                self.encoder.string(&pair.0);
                self.encoder.buf.extend_from_slice(&pair.1);
            }
        }
        self.encoder.buf.push(b'e');
    }
}

impl<'e, 'a> DictEncoder<'e, 'a> {
    pub fn push<T: Encode>(&mut self, key: impl AsRef<[u8]>, value: T) {
        match &mut self.pairs {
            Some(pairs) => pairs.push((key.as_ref().to_vec(), encode(value))),
            None => {
                self.encoder.string(key.as_ref());
                value.encode(self.encoder);
            }
        }
    }

    pub fn push_with_encoder(&mut self, key: impl AsRef<[u8]>, f: impl FnOnce(&mut Encoder)) {
        match &mut self.pairs {
            Some(pairs) => {
                let mut buf = Vec::new();
                f(&mut Encoder::new(&mut buf));
                pairs.push((key.as_ref().to_vec(), buf));
            }
            None => {
                self.encoder.string(key.as_ref());
                f(self.encoder);
            }
        }
    }
}

impl<'a> Encoder<'a> {
    pub fn new(buf: &'a mut Vec<u8>) -> Self {
        Self { buf }
    }

    pub fn integer(&mut self, value: i64) {
        self.buf.push(b'i');
        self.buf.extend_from_slice(value.to_string().as_bytes());
        self.buf.push(b'e');
    }

    pub fn string(&mut self, value: &[u8]) {
        self.buf
            .extend_from_slice(value.len().to_string().as_bytes());
        self.buf.push(b':');
        self.buf.extend_from_slice(value);
    }

    pub fn list<'e>(&'e mut self) -> ListEncoder<'e, 'a> {
        self.buf.push(b'l');
        ListEncoder { encoder: self }
    }

    /// Starts a dictionary whose pairs are buffered and written sorted by key once the returned
    /// encoder is dropped.
    pub fn dict<'e>(&'e mut self) -> DictEncoder<'e, 'a> {
        self.buf.push(b'd');
        DictEncoder {
            encoder: self,
            pairs: Some(Vec::new()),
        }
    }

    /// Starts a dictionary whose pairs are written as they are pushed.
    ///
    /// Keys must be pushed in ascending byte order, without duplicates, for the output to be
    /// canonical.
    pub fn ordered_dict<'e>(&'e mut self) -> DictEncoder<'e, 'a> {
        self.buf.push(b'd');
        DictEncoder {
            encoder: self,
            pairs: None,
        }
    }
}

pub trait Encode {
    fn encode(&self, encoder: &mut Encoder);
}

pub fn encode<T: Encode>(value: T) -> Vec<u8> {
    let mut buf = Vec::new();
    value.encode(&mut Encoder::new(&mut buf));
    buf
}

macro_rules! impl_encode_for_integer {
    ($t:ty) => {
        impl Encode for $t {
            fn encode(&self, encoder: &mut Encoder) {
                encoder.integer(*self as i64);
            }
        }
    };
}
impl_encode_for_integer!(i8);
impl_encode_for_integer!(i16);
impl_encode_for_integer!(i32);
impl_encode_for_integer!(i64);
impl_encode_for_integer!(u8);
impl_encode_for_integer!(u16);
impl_encode_for_integer!(u32);

impl Encode for &str {
    fn encode(&self, encoder: &mut Encoder) {
        encoder.string(self.as_bytes());
    }
}

impl Encode for String {
    fn encode(&self, encoder: &mut Encoder) {
        encoder.string(self.as_bytes());
    }
}

impl Encode for Bytes {
    fn encode(&self, encoder: &mut Encoder) {
        encoder.string(self);
    }
}

impl<T: Encode> Encode for &T {
    fn encode(&self, encoder: &mut Encoder) {
        (*self).encode(encoder);
    }
}

impl<T: Encode> Encode for &[T] {
    fn encode(&self, encoder: &mut Encoder) {
        let mut list = encoder.list();
        for value in *self {
            list.push(value);
        }
    }
}

impl<T: Encode> Encode for Vec<T> {
    fn encode(&self, encoder: &mut Encoder) {
        let mut list = encoder.list();
        for value in self {
            list.push(value);
        }
    }
}

impl<K: AsRef<[u8]>, V: Encode> Encode for std::collections::BTreeMap<K, V> {
    fn encode(&self, encoder: &mut Encoder) {
        let mut dict = encoder.dict();
        for (key, value) in self {
            dict.push(key, value);
        }
    }
}

impl<K: AsRef<[u8]>, V: Encode> Encode for std::collections::HashMap<K, V> {
    fn encode(&self, encoder: &mut Encoder) {
        let mut dict = encoder.dict();
        for (key, value) in self {
            dict.push(key, value);
        }
    }
}

impl Encode for Value {
    fn encode(&self, encoder: &mut Encoder) {
        match self {
            Value::Integer(v) => encoder.integer(*v),
            Value::Bytes(v) => encoder.string(v),
            Value::List(v) => v.encode(encoder),
            Value::Dict(v) => v.encode(encoder),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Dictionary;

    fn make_bytes(len: usize) -> Vec<u8> {
        (0..len).map(|i| (i % 256) as u8).collect()
    }

    #[test]
    fn test_integers() {
        assert_eq!(encode(0i64), b"i0e");
        assert_eq!(encode(42i64), b"i42e");
        assert_eq!(encode(-42i64), b"i-42e");
        assert_eq!(encode(i64::MAX), b"i9223372036854775807e");
        assert_eq!(encode(i64::MIN), b"i-9223372036854775808e");
        assert_eq!(encode(Value::Integer(-1)), b"i-1e");
    }

    #[test]
    fn test_strings() {
        let mut buf = Vec::new();
        Encoder::new(&mut buf).string(b"");
        assert_eq!(buf, b"0:");

        assert_eq!(encode("spam"), b"4:spam");
        assert_eq!(encode("hello:world"), b"11:hello:world");
        assert_eq!(encode(Value::string("Hello, world!")), b"13:Hello, world!");

        let long_bytes = make_bytes(1000);
        let mut expected = b"1000:".to_vec();
        expected.extend_from_slice(&long_bytes);
        assert_eq!(encode(Bytes::from(long_bytes)), expected);
    }

    #[test]
    fn test_lists() {
        assert_eq!(encode(Vec::<i64>::new()), b"le");
        assert_eq!(encode(vec!["spam", "eggs"]), b"l4:spam4:eggse");
        assert_eq!(
            encode(Value::List(vec![Value::string("spam"), Value::Integer(42)])),
            b"l4:spami42ee"
        );

        let mut buf = Vec::new();
        {
            let mut encoder = Encoder::new(&mut buf);
            let mut list = encoder.list();
            list.push(42i64);
            list.push_with_encoder(|e| {
                e.string(b"spam");
            });
            list.push_with_encoder(|e| {
                let mut l = e.list();
                l.push(1i64);
                l.push(2i64);
            });
        }
        assert_eq!(buf, b"li42e4:spamli1ei2eee");
    }

    #[test]
    fn test_dict_encoder_sorts() {
        let mut buf = Vec::new();
        {
            let mut encoder = Encoder::new(&mut buf);
            let mut dict = encoder.dict();
            dict.push(b"z", 1i64);
            dict.push(b"a", 2i64);
            dict.push_with_encoder(b"m", |e| {
                let mut d = e.dict();
                d.push(b"y", "b");
                d.push(b"x", "a");
            });
        }
        assert_eq!(buf, b"d1:ai2e1:md1:x1:a1:y1:be1:zi1ee");
    }

    #[test]
    fn test_ordered_dict_writes_through() {
        let mut buf = Vec::new();
        {
            let mut encoder = Encoder::new(&mut buf);
            let mut dict = encoder.ordered_dict();
            dict.push(b"cow", "moo");
            dict.push_with_encoder(b"spam", |e| e.string(b"eggs"));
        }
        assert_eq!(buf, b"d3:cow3:moo4:spam4:eggse");
    }

    #[test]
    fn test_maps() {
        let mut map = std::collections::HashMap::new();
        map.insert("spam", 1i64);
        map.insert("cow", 2i64);
        map.insert("", 3i64);
        assert_eq!(encode(&map), b"d0:i3e3:cowi2e4:spami1ee");

        let mut map = std::collections::BTreeMap::new();
        map.insert(Bytes::from_static(b"b"), vec![1i64]);
        map.insert(Bytes::from_static(b"a"), vec![]);
        assert_eq!(encode(map), b"d1:ale1:bli1eee");
    }

    #[test]
    fn test_nested_values() {
        let inner = Dictionary::new();
        inner.set("inner", Value::string("value2"));
        let outer = Dictionary::new();
        outer.set(
            "list",
            Value::List(vec![
                Value::Integer(1),
                Value::List(vec![Value::Integer(2), Value::Integer(3)]),
                Value::Integer(4),
            ]),
        );
        outer.set("dict", Value::Dict(inner));
        outer.set("", Value::string("empty key"));

        assert_eq!(
            Value::Dict(outer).bencode(),
            b"d0:9:empty key4:dictd5:inner6:value2e4:listli1eli2ei3eei4eee"
        );
    }
}
