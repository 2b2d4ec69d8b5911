use super::tags::Tags;

pub struct Rule<T> {
    pub key: String,
    extract: fn(&str) -> Option<T>,
}

impl<T> Rule<T> {
    pub fn new(key: impl Into<String>, extract: fn(&str) -> Option<T>) -> Self {
        Rule {
            key: key.into(),
            extract,
        }
    }

    pub fn apply(&self, tags: &Tags) -> Option<T> {
        let value = tags.get(&self.key)?;
        (self.extract)(value)
    }
}

/// Candidate keys in priority order. The first present key whose value
/// the extractor accepts wins, rejected values fall through.
pub struct Chain<T> {
    rules: Vec<Rule<T>>,
}

impl<T> Chain<T> {
    pub fn new(rules: Vec<Rule<T>>) -> Self {
        Chain { rules }
    }

    /// Builds a chain applying the same extractor to every key.
    pub fn of_keys<K: AsRef<str>>(keys: &[K], extract: fn(&str) -> Option<T>) -> Self {
        let rules = keys
            .iter()
            .map(|key| Rule::new(key.as_ref(), extract))
            .collect();
        Chain { rules }
    }

    pub fn resolve(&self, tags: &Tags) -> Option<T> {
        self.rules.iter().find_map(|rule| rule.apply(tags))
    }
}
