use crate::common::Value;
use im::OrdMap;
use itertools::Itertools;
use std::fmt::{Debug, Display, Formatter};

/// Separator for nested field paths such as `team.name`.
pub const FIELD_SEPARATOR: char = '.';

/// An ordered map of field names to [Value]s.
///
/// Records are what the store holds and what entities map to and from.
/// Cloning is O(1): the underlying `im::OrdMap` shares structure, so the
/// identity map, store snapshots and query results can all hold copies.
///
/// # Examples
///
/// ```rust,ignore
/// use quarry::record;
///
/// let member = record! { "username": "member1", "age": 10 };
/// assert_eq!(member.get("age"), 10.into());
/// ```
#[derive(Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Record {
    data: OrdMap<String, Value>,
}

impl Record {
    pub fn new() -> Self {
        Record {
            data: OrdMap::new(),
        }
    }

    /// Sets a top-level field, replacing any previous value.
    pub fn put(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.data.insert(key.into(), value.into());
    }

    /// Builder-style variant of [Record::put].
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.put(key, value);
        self
    }

    /// Returns the value at `path`, or `Value::Null` if absent.
    ///
    /// A dotted path walks into embedded records, so `team.name` reads the
    /// `name` field of the record stored under `team`.
    pub fn get(&self, path: &str) -> Value {
        self.get_ref(path).cloned().unwrap_or_default()
    }

    pub fn get_ref(&self, path: &str) -> Option<&Value> {
        if let Some(value) = self.data.get(path) {
            return Some(value);
        }

        let (head, rest) = path.split_once(FIELD_SEPARATOR)?;
        match self.data.get(head)? {
            Value::Record(inner) => inner.get_ref(rest),
            _ => None,
        }
    }

    pub fn contains_key(&self, path: &str) -> bool {
        self.get_ref(path).is_some()
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.data.remove(key)
    }

    pub fn fields(&self) -> Vec<String> {
        self.data.keys().cloned().collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.data.iter()
    }

    pub fn size(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Narrows the record to the given paths, keyed by the path text.
    pub fn select(&self, paths: &[String]) -> Record {
        let mut selected = Record::new();
        for path in paths {
            selected.put(path.as_str(), self.get(path));
        }
        selected
    }
}

impl Display for Record {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{{{}}}",
            self.data
                .iter()
                .map(|(key, value)| format!("{}: {}", key, value))
                .join(", ")
        )
    }
}

impl Debug for Record {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self)
    }
}

impl FromIterator<(String, Value)> for Record {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        Record {
            data: iter.into_iter().collect(),
        }
    }
}

/// Creates a [Record] from `"field": value` pairs.
#[macro_export]
macro_rules! record {
    () => {
        $crate::common::Record::new()
    };
    ($($key:literal : $value:expr),+ $(,)?) => {{
        let mut record = $crate::common::Record::new();
        $( record.put($key, $value); )+
        record
    }};
}
