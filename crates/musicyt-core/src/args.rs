//! Command-line argument encoding for the extractor.
//!
//! Options are kept as an ordered mapping from camelCase keys to values and
//! flattened into flags: `mergeOutputFormat` becomes `--merge-output-format`,
//! `true` emits the bare flag, `false`/omitted/empty values are dropped and
//! anything else emits the flag followed by its value. Flag order follows
//! insertion order.

use std::path::Path;

/// A single option value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArgValue {
    /// Boolean switch; `true` emits the bare flag, `false` nothing.
    Switch(bool),
    /// Flag followed by a value; an empty value is omitted.
    Value(String),
    /// Explicitly absent.
    Omitted,
}

impl From<bool> for ArgValue {
    fn from(value: bool) -> Self {
        Self::Switch(value)
    }
}

impl From<&str> for ArgValue {
    fn from(value: &str) -> Self {
        Self::Value(value.to_string())
    }
}

impl From<String> for ArgValue {
    fn from(value: String) -> Self {
        Self::Value(value)
    }
}

impl From<&Path> for ArgValue {
    fn from(value: &Path) -> Self {
        Self::Value(value.to_string_lossy().into_owned())
    }
}

impl<T: Into<Self>> From<Option<T>> for ArgValue {
    fn from(value: Option<T>) -> Self {
        value.map_or(Self::Omitted, Into::into)
    }
}

/// Ordered option mapping.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ArgOptions {
    entries: Vec<(String, ArgValue)>,
}

impl ArgOptions {
    /// Create an empty option set.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// Set an option, keeping the original position if the key already exists.
    #[must_use]
    pub fn set(mut self, key: &str, value: impl Into<ArgValue>) -> Self {
        let value = value.into();
        if let Some(entry) = self.entries.iter_mut().find(|(k, _)| k == key) {
            entry.1 = value;
        } else {
            self.entries.push((key.to_string(), value));
        }
        self
    }

    /// Number of keys in the mapping, omitted ones included.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the mapping has no keys.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Flatten into a command-line argument list.
    #[must_use]
    pub fn to_args(&self) -> Vec<String> {
        let mut args = Vec::with_capacity(self.entries.len() * 2);
        for (key, value) in &self.entries {
            match value {
                ArgValue::Switch(true) => args.push(flag_name(key)),
                ArgValue::Value(v) if !v.is_empty() => {
                    args.push(flag_name(key));
                    args.push(v.clone());
                }
                _ => {}
            }
        }
        args
    }
}

/// Translate a camelCase key into a `--kebab-case` flag.
#[must_use]
pub fn flag_name(key: &str) -> String {
    let mut flag = String::with_capacity(key.len() + 4);
    flag.push_str("--");
    for c in key.chars() {
        if c.is_ascii_uppercase() {
            flag.push('-');
            flag.push(c.to_ascii_lowercase());
        } else {
            flag.push(c);
        }
    }
    flag
}
