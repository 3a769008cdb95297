use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeSet;

/// Binary and canonical name of one member type in a nesting chain.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct InnerClassRecord {
    pub binary_name: String,
    pub canonical_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct NamePair {
    outer: Option<String>,
    inner: Option<String>,
}

impl Ord for NamePair {
    fn cmp(&self, other: &Self) -> Ordering {
        missing_last(&self.outer, &other.outer).then_with(|| missing_last(&self.inner, &other.inner))
    }
}

impl PartialOrd for NamePair {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

fn missing_last(a: &Option<String>, b: &Option<String>) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => a.cmp(b),
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Greater,
        (Some(_), None) => Ordering::Less,
    }
}

/// Reconstructs binary and canonical names of a nested class from the
/// (outer internal name, inner simple name) pairs of its `InnerClasses` rows.
///
/// An outer name sorts before every name it prefixes, so the outermost
/// pair comes first and the chain can be walked in order.
#[derive(Debug, Clone, Default)]
pub struct InnerClassHierarchy {
    pairs: BTreeSet<NamePair>,
}

impl InnerClassHierarchy {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_name(&mut self, outer: Option<&str>, inner: Option<&str>) {
        self.pairs.insert(NamePair {
            outer: outer.map(str::to_string),
            inner: inner.map(str::to_string),
        });
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    /// Whether some pair misses a name, as anonymous and local classes do.
    pub fn is_anonymous(&self) -> bool {
        self.pairs
            .iter()
            .any(|pair| pair.outer.is_none() || pair.inner.is_none())
    }

    /// Binary name of the top-level class the chain starts from.
    pub fn root_owner(&self) -> Option<String> {
        if self.is_anonymous() {
            return None;
        }
        self.pairs
            .iter()
            .next()
            .and_then(|pair| pair.outer.as_deref())
            .map(|outer| outer.replace('/', "."))
    }

    /// Outermost member first, ending with the class itself. The top-level
    /// root is not part of the result. Empty when any name is missing.
    pub fn resolve(&self) -> Vec<InnerClassRecord> {
        let Some(root) = self.root_owner() else {
            return Vec::new();
        };

        let mut binary_name = root.clone();
        let mut canonical_name = root;
        let mut chain = Vec::with_capacity(self.pairs.len());
        for pair in &self.pairs {
            let Some(inner) = pair.inner.as_deref() else {
                return Vec::new();
            };
            binary_name.push('$');
            binary_name.push_str(inner);
            canonical_name.push('.');
            canonical_name.push_str(inner);
            chain.push(InnerClassRecord {
                binary_name: binary_name.clone(),
                canonical_name: canonical_name.clone(),
            });
        }
        chain
    }
}
