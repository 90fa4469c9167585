use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};

/// Composite identifier scoping a slice's current inputs.
///
/// Only equality is meaningful; the string form exists for cache keys and
/// debug output. Composition is deterministic: the same parts always
/// produce the same key. Unresolved identity parts (no session, no market
/// yet) contribute an empty segment so a key can be formed before any
/// network call is possible; callers that need a fully-resolved key guard
/// on identity presence separately.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ActiveKey(String);

impl ActiveKey {
    pub fn from_parts<I, S>(parts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut joined = String::new();
        for (idx, part) in parts.into_iter().enumerate() {
            if idx > 0 {
                joined.push('-');
            }
            joined.push_str(part.as_ref());
        }
        ActiveKey(joined)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl Display for ActiveKey {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ActiveKey {
    fn from(s: &str) -> Self {
        ActiveKey(s.to_owned())
    }
}

impl From<String> for ActiveKey {
    fn from(s: String) -> Self {
        ActiveKey(s)
    }
}

/// Render an optional identity part, empty while unresolved.
pub fn part_or_empty<T: Display>(part: Option<&T>) -> String {
    part.map(|p| p.to_string()).unwrap_or_default()
}
