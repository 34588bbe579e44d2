use std::collections::HashMap;

use bytes::Bytes;
use parking_lot::RwLock;
use slotmap::SlotMap;

use crate::{
    error::TryDisplayUtf8, Context, Encode, Encoder, Error, FromValue, Result, Value,
};

slotmap::new_key_type! {
    struct NodeKey;
}

/// Returns the string a byte string key is indexed and ordered by.
///
/// Every byte maps to exactly two lowercase hex digits, so comparing canonical keys is the same
/// as comparing the raw bytes lexicographically. The empty key maps to the empty string and
/// sorts first.
pub fn canonical_key(key: &[u8]) -> String {
    hex::encode(key)
}

struct Node<V> {
    key: Bytes,
    canonical: String,
    value: V,
    prev: Option<NodeKey>,
    next: Option<NodeKey>,
}

struct Inner<V> {
    nodes: SlotMap<NodeKey, Node<V>>,
    index: HashMap<String, NodeKey>,
    head: Option<NodeKey>,
    tail: Option<NodeKey>,
}

impl<V> Default for Inner<V> {
    fn default() -> Self {
        Self {
            nodes: SlotMap::with_key(),
            index: HashMap::new(),
            head: None,
            tail: None,
        }
    }
}

struct Iter<'a, V> {
    nodes: &'a SlotMap<NodeKey, Node<V>>,
    cursor: Option<NodeKey>,
}

impl<'a, V> Iterator for Iter<'a, V> {
    type Item = &'a Node<V>;

    fn next(&mut self) -> Option<Self::Item> {
        let node = self.nodes.get(self.cursor?)?;
        self.cursor = node.next;
        Some(node)
    }
}

impl<V> Inner<V> {
    fn iter(&self) -> Iter<'_, V> {
        Iter {
            nodes: &self.nodes,
            cursor: self.head,
        }
    }

    fn find(&self, key: &[u8]) -> Option<&Node<V>> {
        let node_key = self.index.get(&canonical_key(key))?;
        self.nodes.get(*node_key)
    }

    fn insert(&mut self, key: Bytes, value: V) -> Option<V> {
        let canonical = canonical_key(&key);
        if let Some(&node_key) = self.index.get(&canonical) {
            let node = &mut self.nodes[node_key];
            return Some(std::mem::replace(&mut node.value, value));
        }

        let next = self.successor(&canonical);
        let prev = match next {
            Some(next) => self.nodes[next].prev,
            None => self.tail,
        };
        tracing::trace!(key = %TryDisplayUtf8(&key), append = next.is_none(), "dictionary insert");

        let node_key = self.nodes.insert(Node {
            key,
            canonical: canonical.clone(),
            value,
            prev,
            next,
        });
        match prev {
            Some(prev) => self.nodes[prev].next = Some(node_key),
            None => self.head = Some(node_key),
        }
        match next {
            Some(next) => self.nodes[next].prev = Some(node_key),
            None => self.tail = Some(node_key),
        }
        self.index.insert(canonical, node_key);
        None
    }

    /// First node whose canonical key sorts after `canonical`, or `None` if the new key belongs
    /// at the back.
    fn successor(&self, canonical: &str) -> Option<NodeKey> {
        // keys arriving in order, as they do from canonical input, are appended without a scan
        let tail = self.tail?;
        if self.nodes[tail].canonical.as_str() <= canonical {
            return None;
        }

        let mut cursor = self.head;
        while let Some(node_key) = cursor {
            let node = &self.nodes[node_key];
            if node.canonical.as_str() > canonical {
                return Some(node_key);
            }
            cursor = node.next;
        }
        None
    }

    fn remove(&mut self, key: &[u8]) -> Option<V> {
        let node_key = self.index.remove(&canonical_key(key))?;
        let node = self.nodes.remove(node_key)?;
        match node.prev {
            Some(prev) => self.nodes[prev].next = node.next,
            None => self.head = node.next,
        }
        match node.next {
            Some(next) => self.nodes[next].prev = node.prev,
            None => self.tail = node.prev,
        }
        Some(node.value)
    }
}

/// A dictionary that keeps its entries sorted by key.
///
/// Lookups, updates and removals go through a hash index; insertion walks the ordered sequence
/// to find the new entry's position, except for keys that sort last, which are appended
/// directly. Iteration and encoding always yield keys in ascending byte order, which is the
/// order canonical bencode requires.
///
/// All operations take `&self`: a single reader/writer lock lets any number of readers proceed
/// together while `set` and `remove` are exclusive. Each call is atomic on its own, a `get`
/// followed by a `set` is not.
pub struct Dictionary<V = Value> {
    inner: RwLock<Inner<V>>,
}

impl<V> Default for Dictionary<V> {
    fn default() -> Self {
        Self {
            inner: RwLock::new(Inner::default()),
        }
    }
}

impl<V> Dictionary<V> {
    pub fn new() -> Self {
        Default::default()
    }

    pub fn get(&self, key: impl AsRef<[u8]>) -> Option<V>
    where
        V: Clone,
    {
        self.with_value(key, V::clone)
    }

    /// Runs `f` on the value stored under `key` while holding the read lock.
    pub fn with_value<T>(&self, key: impl AsRef<[u8]>, f: impl FnOnce(&V) -> T) -> Option<T> {
        let inner = self.inner.read();
        inner.find(key.as_ref()).map(|node| f(&node.value))
    }

    pub fn contains_key(&self, key: impl AsRef<[u8]>) -> bool {
        self.inner.read().find(key.as_ref()).is_some()
    }

    /// Stores `value` under `key`, returning the previous value if there was one.
    ///
    /// An existing entry keeps its position.
    pub fn set(&self, key: impl Into<Bytes>, value: V) -> Option<V> {
        self.inner.write().insert(key.into(), value)
    }

    pub fn remove(&self, key: impl AsRef<[u8]>) -> Option<V> {
        self.inner.write().remove(key.as_ref())
    }

    pub fn len(&self) -> usize {
        self.inner.read().nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.read().nodes.is_empty()
    }

    pub fn keys(&self) -> Vec<Bytes> {
        self.inner.read().iter().map(|node| node.key.clone()).collect()
    }

    /// Snapshot of every entry, in key order.
    pub fn entries(&self) -> Vec<(Bytes, V)>
    where
        V: Clone,
    {
        self.inner
            .read()
            .iter()
            .map(|node| (node.key.clone(), node.value.clone()))
            .collect()
    }

    /// Visits every entry in key order while holding the read lock.
    pub fn for_each(&self, mut f: impl FnMut(&Bytes, &V)) {
        for node in self.inner.read().iter() {
            f(&node.key, &node.value);
        }
    }

    pub fn bencode(&self) -> Vec<u8>
    where
        V: Encode,
    {
        crate::encode(self)
    }
}

impl Dictionary<Value> {
    pub fn find<T: FromValue>(&self, key: &[u8]) -> Result<Option<T>> {
        self.with_value(key, |value| {
            T::from_value(value)
                .with_context(|| format!("decoding key value: '{}'", TryDisplayUtf8(key)))
        })
        .transpose()
    }

    pub fn require<T: FromValue>(&self, key: &[u8]) -> Result<T> {
        self.find(key)?
            .ok_or_else(|| Error::missing_key(key))
            .with_context(|| format!("fetching key: '{}'", TryDisplayUtf8(key)))
    }
}

impl<V: Encode> Encode for Dictionary<V> {
    fn encode(&self, encoder: &mut Encoder) {
        let inner = self.inner.read();
        let mut dict = encoder.ordered_dict();
        for node in inner.iter() {
            dict.push(&node.key, &node.value);
        }
    }
}

impl<V: Clone> Clone for Dictionary<V> {
    fn clone(&self) -> Self {
        let source = self.inner.read();
        let mut inner = Inner::default();
        for node in source.iter() {
            inner.insert(node.key.clone(), node.value.clone());
        }
        Self {
            inner: RwLock::new(inner),
        }
    }
}

impl<V: PartialEq> PartialEq for Dictionary<V> {
    fn eq(&self, other: &Self) -> bool {
        if std::ptr::eq(self, other) {
            return true;
        }

        // both locks are always taken in address order, so `a == b` and `b == a` running
        // together cannot wait on each other behind queued writers
        let (first, second) = if (self as *const Self) < (other as *const Self) {
            (self, other)
        } else {
            (other, self)
        };
        let lhs = first.inner.read();
        let rhs = second.inner.read();
        lhs.nodes.len() == rhs.nodes.len()
            && lhs
                .iter()
                .zip(rhs.iter())
                .all(|(l, r)| l.key == r.key && l.value == r.value)
    }
}

impl<V: Eq> Eq for Dictionary<V> {}

impl<V: std::fmt::Debug> std::fmt::Debug for Dictionary<V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.inner.read();
        let mut m = f.debug_map();
        for node in inner.iter() {
            if let Ok(str) = std::str::from_utf8(&node.key) {
                m.key(&str);
            } else {
                m.key(&node.key);
            }
            m.value(&node.value);
        }
        m.finish()
    }
}

impl<K: Into<Bytes>, V> FromIterator<(K, V)> for Dictionary<V> {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut inner = Inner::default();
        for (key, value) in iter {
            inner.insert(key.into(), value);
        }
        Self {
            inner: RwLock::new(inner),
        }
    }
}

impl<V: serde::Serialize> serde::Serialize for Dictionary<V> {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        use serde::ser::SerializeMap;

        let inner = self.inner.read();
        let mut map = serializer.serialize_map(Some(inner.nodes.len()))?;
        for node in inner.iter() {
            match std::str::from_utf8(&node.key) {
                Ok(key) => map.serialize_entry(key, &node.value)?,
                Err(_) => map.serialize_entry(&node.key[..], &node.value)?,
            }
        }
        map.end()
    }
}
