//! # Selector Codec
//!
//! Selectors are attribute predicates written as `type:value`, for example
//! `unix:uid:1000` or `k8s:ns:payments`. The type is everything before the
//! first `:`; the value is everything after it and may itself contain `:` or
//! be empty.
//!
//! [`Selector`] parses through [`FromStr`] and formats through [`Display`],
//! and the two are inverse: for every valid text `s`,
//! `s.parse::<Selector>()?.to_string() == s`.
//!
//! [`SelectorSet`] is the selector collection a single watch is made of. It
//! keeps insertion order and ignores duplicates.
//!
//! [`Display`]: core::fmt::Display

use crate::{Error, Result, proto};
use core::{fmt, str::FromStr};

const DELIMITER: char = ':';

/// A single `type:value` attribute selector.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Selector {
    kind: String,
    value: String,
}

impl Selector {
    /// Builds a selector from its parts.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MalformedSelector`] when `kind` is empty or contains
    /// the `:` delimiter, since such a selector could not be parsed back from
    /// its textual form.
    pub fn new(kind: impl Into<String>, value: impl Into<String>) -> Result<Self> {
        let kind = kind.into();
        let value = value.into();
        if kind.is_empty() || kind.contains(DELIMITER) {
            return Err(Error::MalformedSelector {
                input: format!("{kind}{DELIMITER}{value}"),
            });
        }
        Ok(Self { kind, value })
    }

    /// The selector type, e.g. `unix`.
    pub fn kind(&self) -> &str {
        &self.kind
    }

    /// The selector value, e.g. `uid:1000`. May be empty.
    pub fn value(&self) -> &str {
        &self.value
    }
}

impl FromStr for Selector {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.split_once(DELIMITER) {
            Some((kind, value)) if !kind.is_empty() => Ok(Self {
                kind: kind.to_string(),
                value: value.to_string(),
            }),
            _ => Err(Error::MalformedSelector {
                input: s.to_string(),
            }),
        }
    }
}

impl fmt::Display for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{DELIMITER}{}", self.kind, self.value)
    }
}

impl From<Selector> for proto::Selector {
    fn from(selector: Selector) -> Self {
        Self {
            r#type: selector.kind,
            value: selector.value,
        }
    }
}

impl TryFrom<proto::Selector> for Selector {
    type Error = Error;

    fn try_from(selector: proto::Selector) -> Result<Self> {
        Self::new(selector.r#type, selector.value)
    }
}

/// The ordered, duplicate-free set of selectors a watch is made of.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct SelectorSet(Vec<Selector>);

impl SelectorSet {
    pub const fn new() -> Self {
        Self(Vec::new())
    }

    /// Adds `selector`, returning `false` if it was already present.
    pub fn insert(&mut self, selector: Selector) -> bool {
        if self.0.contains(&selector) {
            return false;
        }
        self.0.push(selector);
        true
    }

    pub fn contains(&self, selector: &Selector) -> bool {
        self.0.contains(selector)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> core::slice::Iter<'_, Selector> {
        self.0.iter()
    }
}

impl From<Selector> for SelectorSet {
    fn from(selector: Selector) -> Self {
        Self(vec![selector])
    }
}

impl FromIterator<Selector> for SelectorSet {
    fn from_iter<I: IntoIterator<Item = Selector>>(iter: I) -> Self {
        let mut set = Self::new();
        for selector in iter {
            set.insert(selector);
        }
        set
    }
}

impl IntoIterator for SelectorSet {
    type Item = Selector;
    type IntoIter = std::vec::IntoIter<Selector>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl<'a> IntoIterator for &'a SelectorSet {
    type Item = &'a Selector;
    type IntoIter = core::slice::Iter<'a, Selector>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

impl fmt::Display for SelectorSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, selector) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{selector}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_at_first_delimiter() {
        let selector: Selector = "unix:uid:1000".parse().unwrap();
        assert_eq!(selector.kind(), "unix");
        assert_eq!(selector.value(), "uid:1000");
    }

    #[test]
    fn round_trips_valid_text() {
        for text in [
            "unix:uid:1000",
            "k8s:ns:payments",
            "docker:label:com.example:role=web",
            "unix:",
            "a:b",
            "spiffe_id:spiffe://example.org/workload",
            "type::",
        ] {
            let selector: Selector = text.parse().unwrap();
            assert_eq!(selector.to_string(), text);
            assert_eq!(selector.to_string().parse::<Selector>().unwrap(), selector);
        }
    }

    #[test]
    fn round_trips_generated_text() {
        const KINDS: &[&str] = &["unix", "k8s", "a", "spiffe_id", "docker-label", "0"];
        const PARTS: &[&str] = &["", "uid", "1000", "example.org", "//x/y", " ", "="];

        // Values built from up to three parts, so they cover empty values,
        // leading and trailing delimiters and runs of `::`.
        let mut values = vec![String::new()];
        for a in PARTS {
            values.push((*a).to_string());
            for b in PARTS {
                values.push(format!("{a}:{b}"));
                for c in PARTS {
                    values.push(format!("{a}:{b}:{c}"));
                }
            }
        }

        let mut checked = 0;
        for kind in KINDS {
            for value in &values {
                let text = format!("{kind}:{value}");
                let selector: Selector = text.parse().unwrap();
                assert_eq!(selector.kind(), *kind);
                assert_eq!(selector.value(), value);
                assert_eq!(selector.to_string(), text);
                assert_eq!(selector.to_string().parse::<Selector>().unwrap(), selector);
                assert_eq!(Selector::new(*kind, value.clone()).unwrap(), selector);
                checked += 1;
            }
        }
        assert!(checked > 2_000);
    }

    #[test]
    fn rejects_generated_text_without_delimiter() {
        for a in ["", "unix", "uid=1000", "spiffe//example.org", " "] {
            for b in ["", "1000", "/x", "-"] {
                let text = format!("{a}{b}");
                assert!(matches!(
                    text.parse::<Selector>(),
                    Err(Error::MalformedSelector { .. })
                ));
            }
        }
    }

    #[test]
    fn empty_value_is_allowed() {
        let selector: Selector = "unix:".parse().unwrap();
        assert_eq!(selector.kind(), "unix");
        assert_eq!(selector.value(), "");
    }

    #[test]
    fn rejects_text_without_delimiter() {
        for text in ["", "unix", "uid=1000", "spiffe//example.org"] {
            let err = text.parse::<Selector>().unwrap_err();
            assert_eq!(
                err,
                Error::MalformedSelector {
                    input: text.to_string()
                }
            );
        }
    }

    #[test]
    fn rejects_empty_type() {
        assert!(matches!(
            ":uid:1000".parse::<Selector>(),
            Err(Error::MalformedSelector { .. })
        ));
    }

    #[test]
    fn new_rejects_types_that_cannot_round_trip() {
        assert!(Selector::new("", "x").is_err());
        assert!(Selector::new("un:ix", "x").is_err());
        let selector = Selector::new("unix", "gid:0").unwrap();
        assert_eq!(selector.to_string(), "unix:gid:0");
    }

    #[test]
    fn proto_conversion_preserves_parts() {
        let selector: Selector = "unix:uid:1000".parse().unwrap();
        let wire = proto::Selector::from(selector.clone());
        assert_eq!(wire.r#type, "unix");
        assert_eq!(wire.value, "uid:1000");
        assert_eq!(Selector::try_from(wire).unwrap(), selector);
    }

    #[test]
    fn set_keeps_order_and_drops_duplicates() {
        let a: Selector = "unix:uid:1000".parse().unwrap();
        let b: Selector = "unix:gid:1000".parse().unwrap();
        let set: SelectorSet = [a.clone(), b.clone(), a.clone()].into_iter().collect();
        assert_eq!(set.len(), 2);
        assert!(set.contains(&b));
        assert_eq!(set.to_string(), "unix:uid:1000, unix:gid:1000");
    }
}
