use crate::{AsValue, Error, Result, Value};
use indexmap::{IndexMap, map};
use std::fmt::{self, Debug, Formatter};

/// Insertion ordered mapping from property name to value.
///
/// Used for the values of insert/update statements and for result rows. A
/// property that is not present is "absent", which is distinct from a
/// property present with a null value.
#[derive(Default, Clone, PartialEq)]
pub struct Record {
    values: IndexMap<String, Value>,
}

impl Record {
    pub fn new() -> Self {
        Self::default()
    }
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            values: IndexMap::with_capacity(capacity),
        }
    }
    /// Inserts or replaces a property, a replaced property keeps its position.
    pub fn insert(&mut self, property: impl Into<String>, value: impl Into<Value>) -> &mut Self {
        self.values.insert(property.into(), value.into());
        self
    }
    /// Removes a property preserving the order of the remaining ones.
    pub fn remove(&mut self, property: &str) -> Option<Value> {
        self.values.shift_remove(property)
    }
    pub fn get(&self, property: &str) -> Option<&Value> {
        self.values.get(property)
    }
    pub fn contains(&self, property: &str) -> bool {
        self.values.contains_key(property)
    }
    /// Converts a property, an absent property is converted as a null.
    pub fn get_as<T: AsValue>(&self, property: &str) -> Result<T> {
        T::try_from_value(self.values.get(property).cloned().unwrap_or_default()).map_err(|e| {
            e.context(format!("While reading the property `{property}`"))
        })
    }
    /// Like [`Record::get_as`] but an absent or null property is an error.
    pub fn require<T: AsValue>(&self, property: &str) -> Result<T> {
        match self.values.get(property) {
            Some(v) if !v.is_null() => T::try_from_value(v.clone()),
            _ => Err(Error::msg(format!("The property `{property}` has no value"))),
        }
    }
    pub fn len(&self) -> usize {
        self.values.len()
    }
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }
    pub fn iter(&self) -> map::Iter<'_, String, Value> {
        self.values.iter()
    }
}

impl Debug for Record {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.values.iter()).finish()
    }
}

impl IntoIterator for Record {
    type Item = (String, Value);
    type IntoIter = map::IntoIter<String, Value>;
    fn into_iter(self) -> Self::IntoIter {
        self.values.into_iter()
    }
}

impl<'a> IntoIterator for &'a Record {
    type Item = (&'a String, &'a Value);
    type IntoIter = map::Iter<'a, String, Value>;
    fn into_iter(self) -> Self::IntoIter {
        self.values.iter()
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for Record {
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        Self {
            values: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

/// Builds a [`Record`] preserving the order of the properties.
///
/// ```
/// use sluice_core::record;
/// let company = record! { "name" => "ACME", "parentId" => 1 };
/// assert_eq!(company.keys().collect::<Vec<_>>(), ["name", "parentId"]);
/// ```
#[macro_export]
macro_rules! record {
    () => { $crate::Record::new() };
    ($($key:expr => $value:expr),+ $(,)?) => {{
        let mut record = $crate::Record::new();
        $(record.insert($key, $value);)+
        record
    }};
}
