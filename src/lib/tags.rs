use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::iter::FromIterator;

pub const HIGHWAY: &str = "highway";
pub const CYCLEWAY: &str = "cycleway";

/// Key/value tags of an OSM element.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(transparent)]
pub struct Tags(BTreeMap<String, String>);

impl Tags {
    pub fn new() -> Self {
        Tags(BTreeMap::new())
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.0.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn is(&self, key: &str, value: &str) -> bool {
        self.get(key) == Some(value)
    }

    pub fn is_any(&self, key: &str, values: &[&str]) -> bool {
        match self.get(key) {
            Some(v) => values.contains(&v),
            None => false,
        }
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Tags {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Tags(
            iter.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}

impl From<&osmpbfreader::objects::Tags> for Tags {
    fn from(tags: &osmpbfreader::objects::Tags) -> Self {
        tags.iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }
}

/// `no`, `0` and `false` in any casing.
pub fn is_no(value: &str) -> bool {
    let value = value.to_lowercase();
    value == "no" || value == "0" || value == "false"
}

/// Parses `yes`/`no` style values, `None` for anything else.
pub fn parse_bool(value: &str) -> Option<bool> {
    match value.to_lowercase().as_str() {
        "yes" | "true" | "1" => Some(true),
        "no" | "false" | "0" => Some(false),
        _ => None,
    }
}

/// Parses the leading decimal number of a width value (`"1.5"`, `"1,5"`,
/// `"2 m"`). Non-positive or unparseable values are `None`.
pub fn parse_width(value: &str) -> Option<f64> {
    let normalized = value.trim().replace(',', ".");
    let end = normalized
        .char_indices()
        .find(|&(idx, c)| !(c.is_ascii_digit() || c == '.' || (idx == 0 && c == '-')))
        .map(|(idx, _)| idx)
        .unwrap_or_else(|| normalized.len());
    let prefix = &normalized[..end];
    // "1.5.2" keeps the longest parseable prefix, like a lenient float parser
    let width = (1..=prefix.len())
        .rev()
        .find_map(|len| prefix[..len].parse::<f64>().ok())?;
    if width.is_finite() && width > 0. {
        Some(width)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tag_lookup() {
        let tags: Tags = vec![("highway", "cycleway"), ("foot", "no")]
            .into_iter()
            .collect();
        assert!(tags.is(HIGHWAY, "cycleway"));
        assert!(tags.is_any("foot", &["no", "discouraged"]));
        assert!(!tags.is_any("bicycle", &["yes"]));
        assert_eq!(tags.len(), 2);
    }

    #[test]
    fn no_values() {
        assert!(is_no("no"));
        assert!(is_no("False"));
        assert!(is_no("0"));
        assert!(!is_no("yes"));
        assert!(!is_no("-1"));
    }

    #[test]
    fn bool_values() {
        assert_eq!(parse_bool("yes"), Some(true));
        assert_eq!(parse_bool("NO"), Some(false));
        assert_eq!(parse_bool("partial"), None);
    }

    #[test]
    fn widths() {
        assert_eq!(parse_width("1.5"), Some(1.5));
        assert_eq!(parse_width("1,25"), Some(1.25));
        assert_eq!(parse_width("2 m"), Some(2.));
        assert_eq!(parse_width(" 0.8"), Some(0.8));
        assert_eq!(parse_width("1.5.2"), Some(1.5));
        assert_eq!(parse_width("narrow"), None);
        assert_eq!(parse_width("0"), None);
        assert_eq!(parse_width("-1"), None);
        assert_eq!(parse_width(""), None);
    }
}
