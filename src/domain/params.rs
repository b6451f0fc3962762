//! Parameter sets and their run identifiers.
//!
//! A parameter set is an ordered list of `key=value` pairs. Its identifier is
//! the pairs joined with `-`, e.g. `day_net_change=0.3-rvol=5-pullback=0.5`.
//! Key order is part of the identity.

use crate::domain::error::MomotraderError;
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, PartialEq, Default)]
pub struct ParameterSet {
    entries: Vec<(String, f64)>,
}

impl ParameterSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from ordered pairs. Keys must be identifiers and unique,
    /// values finite.
    pub fn from_pairs<K: Into<String>>(
        pairs: impl IntoIterator<Item = (K, f64)>,
    ) -> Result<Self, MomotraderError> {
        let mut set = Self::new();
        for (k, v) in pairs {
            set.insert(k, v)?;
        }
        Ok(set)
    }

    /// Append a pair, or replace the value of an existing key in place.
    pub fn insert(&mut self, key: impl Into<String>, value: f64) -> Result<(), MomotraderError> {
        let key = key.into();
        validate_key(&key)?;
        if !value.is_finite() {
            return Err(MomotraderError::InvalidParameterSet {
                input: format!("{key}={value}"),
                reason: "value must be finite".into(),
            });
        }
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((key, value)),
        }
        Ok(())
    }

    pub fn get(&self, key: &str) -> Option<f64> {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| *v)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(k, _)| k.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), *v))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Pairs of `self` followed by pairs of `other` whose keys are not
    /// already present.
    pub fn merged(&self, other: &ParameterSet) -> ParameterSet {
        let mut out = self.clone();
        for (k, v) in other.iter() {
            if !out.contains(k) {
                out.entries.push((k.to_string(), v));
            }
        }
        out
    }

    /// File stem used for ledgers, e.g. `trades-rvol=3-pullback=0.5`.
    pub fn file_stem(&self, prefix: &str) -> String {
        if self.is_empty() {
            prefix.to_string()
        } else {
            format!("{prefix}-{self}")
        }
    }

    /// Inverse of [`ParameterSet::file_stem`].
    pub fn from_file_stem(stem: &str, prefix: &str) -> Result<Self, MomotraderError> {
        if stem == prefix {
            return Ok(Self::new());
        }
        let rest = stem
            .strip_prefix(prefix)
            .and_then(|s| s.strip_prefix('-'))
            .ok_or_else(|| MomotraderError::InvalidParameterSet {
                input: stem.to_string(),
                reason: format!("expected prefix {prefix:?}"),
            })?;
        rest.parse()
    }
}

fn validate_key(key: &str) -> Result<(), MomotraderError> {
    let mut chars = key.chars();
    let valid = match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {
            chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        }
        _ => false,
    };
    if valid {
        Ok(())
    } else {
        Err(MomotraderError::InvalidParameterSet {
            input: key.to_string(),
            reason: "keys must start with a letter or '_' and contain only [A-Za-z0-9_]".into(),
        })
    }
}

impl fmt::Display for ParameterSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, (k, v)) in self.entries.iter().enumerate() {
            if i > 0 {
                write!(f, "-")?;
            }
            // f64 Display is the shortest representation that parses back
            // to the same value.
            write!(f, "{k}={v}")?;
        }
        Ok(())
    }
}

impl FromStr for ParameterSet {
    type Err = MomotraderError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut set = ParameterSet::new();
        if s.is_empty() {
            return Ok(set);
        }

        // A '-' separates pairs only when the next character can start a key;
        // otherwise it is a sign or exponent inside a value.
        let bytes = s.as_bytes();
        let mut start = 0;
        let mut tokens = Vec::new();
        for i in 0..bytes.len() {
            if bytes[i] == b'-'
                && i + 1 < bytes.len()
                && (bytes[i + 1].is_ascii_alphabetic() || bytes[i + 1] == b'_')
                && s[start..i].contains('=')
            {
                tokens.push(&s[start..i]);
                start = i + 1;
            }
        }
        tokens.push(&s[start..]);

        for token in tokens {
            let (k, v) = token
                .split_once('=')
                .ok_or_else(|| MomotraderError::InvalidParameterSet {
                    input: s.to_string(),
                    reason: format!("pair {token:?} has no '='"),
                })?;
            let value: f64 = v.parse().map_err(|_| MomotraderError::InvalidParameterSet {
                input: s.to_string(),
                reason: format!("value {v:?} for {k} is not a number"),
            })?;
            if set.contains(k) {
                return Err(MomotraderError::InvalidParameterSet {
                    input: s.to_string(),
                    reason: format!("duplicate key {k}"),
                });
            }
            set.insert(k, value)?;
        }
        Ok(set)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> ParameterSet {
        ParameterSet::from_pairs([
            ("day_net_change", 0.3),
            ("rvol", 5.0),
            ("pullback", 0.5),
        ])
        .unwrap()
    }

    #[test]
    fn identifier_keeps_key_order() {
        assert_eq!(sample().to_string(), "day_net_change=0.3-rvol=5-pullback=0.5");
    }

    #[test]
    fn parse_identifier() {
        let parsed: ParameterSet = "day_net_change=0.3-rvol=5-pullback=0.5".parse().unwrap();
        assert_eq!(parsed, sample());
    }

    #[test]
    fn negative_and_exponent_values_round_trip() {
        let set = ParameterSet::from_pairs([("a", -0.25), ("b", 1e-7), ("c", -3e20)]).unwrap();
        let text = set.to_string();
        let parsed: ParameterSet = text.parse().unwrap();
        assert_eq!(parsed, set);
    }

    #[test]
    fn file_stem_round_trip() {
        let stem = sample().file_stem("trades");
        assert_eq!(stem, "trades-day_net_change=0.3-rvol=5-pullback=0.5");
        let parsed = ParameterSet::from_file_stem(&stem, "trades").unwrap();
        assert_eq!(parsed, sample());
    }

    #[test]
    fn empty_file_stem() {
        let empty = ParameterSet::new();
        assert_eq!(empty.file_stem("trades"), "trades");
        assert!(ParameterSet::from_file_stem("trades", "trades").unwrap().is_empty());
    }

    #[test]
    fn rejects_missing_equals() {
        assert!("rvol=3-pullback".parse::<ParameterSet>().is_err());
    }

    #[test]
    fn rejects_non_numeric_value() {
        assert!("rvol=abc".parse::<ParameterSet>().is_err());
    }

    #[test]
    fn rejects_duplicate_key() {
        assert!("rvol=3-rvol=4".parse::<ParameterSet>().is_err());
    }

    #[test]
    fn rejects_bad_key() {
        let mut set = ParameterSet::new();
        assert!(set.insert("9lives", 1.0).is_err());
        assert!(set.insert("a-b", 1.0).is_err());
        assert!(set.insert("", 1.0).is_err());
    }

    #[test]
    fn rejects_non_finite_value() {
        let mut set = ParameterSet::new();
        assert!(set.insert("rvol", f64::NAN).is_err());
        assert!(set.insert("rvol", f64::INFINITY).is_err());
    }

    #[test]
    fn insert_replaces_in_place() {
        let mut set = sample();
        set.insert("rvol", 7.0).unwrap();
        assert_eq!(set.to_string(), "day_net_change=0.3-rvol=7-pullback=0.5");
    }

    #[test]
    fn merged_keeps_left_values() {
        let left = ParameterSet::from_pairs([("rvol", 3.0)]).unwrap();
        let right = ParameterSet::from_pairs([("rvol", 9.0), ("sl_prc", 0.3)]).unwrap();
        let merged = left.merged(&right);
        assert_eq!(merged.to_string(), "rvol=3-sl_prc=0.3");
    }
}
