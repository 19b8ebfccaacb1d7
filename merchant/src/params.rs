use serde::ser::{Serialize, SerializeMap, Serializer};
use serde_json::Value;
use std::fmt;

/// Namespace prefix carried by every gateway parameter.
pub const PARAM_PREFIX: &str = "sp_";

/// A single value inside a [`ParamSet`]: a scalar leaf or a nested set.
#[derive(Debug, Clone, PartialEq)]
pub enum ParamValue {
    Int(i64),
    Float(f64),
    Str(String),
    Set(ParamSet),
}

impl ParamValue {
    pub fn as_set(&self) -> Option<&ParamSet> {
        match self {
            ParamValue::Set(set) => Some(set),
            _ => None,
        }
    }

    /// Numeric view of the value. Strings such as `"1"` or `"1.0"` are
    /// accepted, since the gateway sends everything as text outside JSON.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            ParamValue::Int(n) => Some(*n),
            ParamValue::Float(f) if f.fract() == 0.0 => Some(*f as i64),
            ParamValue::Str(s) => {
                let s = s.trim();
                s.parse::<i64>().ok().or_else(|| {
                    s.parse::<f64>()
                        .ok()
                        .filter(|f| f.is_finite() && f.fract() == 0.0)
                        .map(|f| f as i64)
                })
            }
            _ => None,
        }
    }

    /// Zero, `""`, `"0"` and empty sets count as empty; optional request
    /// fields holding such values are left out of the request.
    pub fn is_empty(&self) -> bool {
        match self {
            ParamValue::Int(n) => *n == 0,
            ParamValue::Float(f) => *f == 0.0,
            ParamValue::Str(s) => s.is_empty() || s == "0",
            ParamValue::Set(set) => set.is_empty(),
        }
    }

    fn canonicalize(&mut self) {
        if let ParamValue::Set(set) = self {
            set.canonicalize();
        }
    }

    fn flatten_into(&self, out: &mut Vec<String>) {
        match self {
            ParamValue::Set(set) => {
                for (_, value) in &set.entries {
                    value.flatten_into(out);
                }
            }
            scalar => out.push(scalar.to_string()),
        }
    }

    fn from_json(value: Value) -> Self {
        match value {
            Value::Null => ParamValue::Str(String::new()),
            Value::Bool(true) => ParamValue::Str("1".to_string()),
            Value::Bool(false) => ParamValue::Str(String::new()),
            Value::Number(n) => match n.as_i64() {
                Some(i) => ParamValue::Int(i),
                None => match n.as_f64() {
                    Some(f) => ParamValue::Float(f),
                    None => ParamValue::Str(n.to_string()),
                },
            },
            Value::String(s) => ParamValue::Str(s),
            container => ParamValue::Set(ParamSet::from_json(container).unwrap_or_default()),
        }
    }
}

impl fmt::Display for ParamValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamValue::Int(n) => write!(f, "{n}"),
            ParamValue::Float(v) => write!(f, "{v}"),
            ParamValue::Str(s) => f.write_str(s),
            ParamValue::Set(set) => f.write_str(&set.flatten_values().join(";")),
        }
    }
}

impl From<i64> for ParamValue {
    fn from(value: i64) -> Self {
        ParamValue::Int(value)
    }
}

impl From<i32> for ParamValue {
    fn from(value: i32) -> Self {
        ParamValue::Int(value.into())
    }
}

impl From<u32> for ParamValue {
    fn from(value: u32) -> Self {
        ParamValue::Int(value.into())
    }
}

impl From<u64> for ParamValue {
    fn from(value: u64) -> Self {
        match i64::try_from(value) {
            Ok(n) => ParamValue::Int(n),
            Err(_) => ParamValue::Str(value.to_string()),
        }
    }
}

impl From<f64> for ParamValue {
    fn from(value: f64) -> Self {
        ParamValue::Float(value)
    }
}

impl From<&str> for ParamValue {
    fn from(value: &str) -> Self {
        ParamValue::Str(value.to_string())
    }
}

impl From<String> for ParamValue {
    fn from(value: String) -> Self {
        ParamValue::Str(value)
    }
}

impl From<&String> for ParamValue {
    fn from(value: &String) -> Self {
        ParamValue::Str(value.clone())
    }
}

impl From<ParamSet> for ParamValue {
    fn from(value: ParamSet) -> Self {
        ParamValue::Set(value)
    }
}

impl Serialize for ParamValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            ParamValue::Int(n) => serializer.serialize_i64(*n),
            ParamValue::Float(f) => serializer.serialize_f64(*f),
            ParamValue::Str(s) => serializer.serialize_str(s),
            ParamValue::Set(set) => set.serialize(serializer),
        }
    }
}

/// Keyed parameters exchanged with the gateway.
///
/// Entries keep their insertion order so that documents built from a set
/// (acknowledgements, query strings) come out in the order they were
/// assembled. Signing never depends on that order: see
/// [`ParamSet::canonicalize`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParamSet {
    entries: Vec<(String, ParamValue)>,
}

impl ParamSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts `value` under `key`, replacing (in place) and returning any
    /// previous value.
    pub fn insert(
        &mut self,
        key: impl Into<String>,
        value: impl Into<ParamValue>,
    ) -> Option<ParamValue> {
        let key = key.into();
        let value = value.into();
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some((_, slot)) => Some(std::mem::replace(slot, value)),
            None => {
                self.entries.push((key, value));
                None
            }
        }
    }

    /// Inserts the value only when it is present and not empty.
    pub fn insert_non_empty<V: Into<ParamValue>>(
        &mut self,
        key: impl Into<String>,
        value: Option<V>,
    ) {
        if let Some(value) = value.map(Into::into).filter(|v| !v.is_empty()) {
            self.insert(key, value);
        }
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<ParamValue>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn get(&self, key: &str) -> Option<&ParamValue> {
        self.entries.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    /// String form of a value, if the key is present.
    pub fn get_string(&self, key: &str) -> Option<String> {
        self.get(key).map(ToString::to_string)
    }

    pub fn remove(&mut self, key: &str) -> Option<ParamValue> {
        let index = self.entries.iter().position(|(k, _)| k == key)?;
        Some(self.entries.remove(index).1)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ParamValue)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(k, _)| k.as_str())
    }

    /// Sorts keys by byte order at every nesting level.
    pub fn canonicalize(&mut self) {
        self.entries
            .sort_by(|(a, _), (b, _)| a.as_bytes().cmp(b.as_bytes()));
        for (_, value) in &mut self.entries {
            value.canonicalize();
        }
    }

    /// Scalar values in current order, depth first. Nested sets contribute
    /// their values, never their keys.
    pub fn flatten_values(&self) -> Vec<String> {
        let mut out = Vec::with_capacity(self.entries.len());
        for (_, value) in &self.entries {
            value.flatten_into(&mut out);
        }
        out
    }

    /// Drops every top-level key that does not start with `prefix`.
    pub fn retain_prefixed(&mut self, prefix: &str) {
        self.entries.retain(|(k, _)| k.starts_with(prefix));
    }

    /// Form/query pairs; nested sets use the `key[sub]` convention.
    pub fn to_query_pairs(&self) -> Vec<(String, String)> {
        let mut pairs = Vec::new();
        for (key, value) in &self.entries {
            push_query_pairs(key.clone(), value, &mut pairs);
        }
        pairs
    }

    /// Builds a flat set of string values, e.g. from decoded form fields.
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let mut set = ParamSet::new();
        for (key, value) in pairs {
            set.insert(key.into(), ParamValue::Str(value.into()));
        }
        set
    }

    /// Converts a JSON object (or array, keyed by index) into a set.
    /// Returns `None` for scalar JSON values.
    pub fn from_json(value: Value) -> Option<Self> {
        match value {
            Value::Object(map) => Some(
                map.into_iter()
                    .map(|(k, v)| (k, ParamValue::from_json(v)))
                    .collect(),
            ),
            Value::Array(items) => Some(
                items
                    .into_iter()
                    .enumerate()
                    .map(|(i, v)| (i.to_string(), ParamValue::from_json(v)))
                    .collect(),
            ),
            _ => None,
        }
    }
}

fn push_query_pairs(key: String, value: &ParamValue, pairs: &mut Vec<(String, String)>) {
    match value {
        ParamValue::Set(set) => {
            for (sub, nested) in &set.entries {
                push_query_pairs(format!("{key}[{sub}]"), nested, pairs);
            }
        }
        scalar => pairs.push((key, scalar.to_string())),
    }
}

impl FromIterator<(String, ParamValue)> for ParamSet {
    fn from_iter<T: IntoIterator<Item = (String, ParamValue)>>(iter: T) -> Self {
        let mut set = ParamSet::new();
        for (key, value) in iter {
            set.insert(key, value);
        }
        set
    }
}

impl Serialize for ParamSet {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (key, value) in &self.entries {
            map.serialize_entry(key, value)?;
        }
        map.end()
    }
}
