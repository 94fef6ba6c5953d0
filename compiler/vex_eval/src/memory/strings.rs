use rustc_hash::FxHashMap;

/// Storage behind `Str` values.
///
/// A `Str` in the arena is an 8-byte index into this pool. Strings are
/// immutable and deduplicated; concatenation interns a new string.
#[derive(Debug)]
pub struct StringPool {
    strings: Vec<Box<str>>,
    index: FxHashMap<Box<str>, u64>,
}

impl StringPool {
    /// Index 0 is the empty string, so zero-filled `Str` storage reads as "".
    pub fn new() -> Self {
        let mut pool = StringPool {
            strings: Vec::new(),
            index: FxHashMap::default(),
        };
        pool.intern("");
        pool
    }

    pub fn intern(&mut self, s: &str) -> u64 {
        if let Some(&id) = self.index.get(s) {
            return id;
        }
        let id = self.strings.len() as u64;
        self.strings.push(s.into());
        self.index.insert(s.into(), id);
        id
    }

    pub fn get(&self, id: u64) -> Option<&str> {
        let index = usize::try_from(id).ok()?;
        self.strings.get(index).map(|s| &**s)
    }

    #[cfg_attr(not(test), allow(dead_code))]
    pub fn len(&self) -> usize {
        self.strings.len()
    }

    #[allow(dead_code)]
    pub fn is_empty(&self) -> bool {
        self.strings.is_empty()
    }
}

impl Default for StringPool {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn zero_is_empty_string() {
        let pool = StringPool::new();
        assert_eq!(pool.get(0), Some(""));
    }

    #[test]
    fn interning_deduplicates() {
        let mut pool = StringPool::new();
        let a = pool.intern("hi");
        let b = pool.intern("hi");
        assert_eq!(a, b);
        assert_eq!(pool.get(a), Some("hi"));
        assert_eq!(pool.len(), 2);
        assert_eq!(pool.get(99), None);
    }
}
