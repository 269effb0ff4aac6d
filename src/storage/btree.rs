// Secondary index on a single column
// Built on BTreeMap, which keeps keys sorted and gives O(log n) lookups

use super::Value;
use std::cmp::Ordering;
use std::collections::BTreeMap;

/// Maps column values to the ids of the rows holding them
#[derive(Debug, Clone)]
pub struct BTreeIndex {
    tree: BTreeMap<IndexKey, Vec<usize>>,
    column_name: String,
}

/// Value wrapper with a total order, as BTreeMap requires
///
/// Integers and floats share one numeric key space so that `1` and `1.0`
/// land on the same entry; other types are ordered by a fixed type rank.
#[derive(Debug, Clone)]
pub struct IndexKey(pub Value);

impl IndexKey {
    fn rank(&self) -> u8 {
        match self.0 {
            Value::Null => 0,
            Value::Boolean(_) => 1,
            Value::Integer(_) | Value::Float(_) => 2,
            Value::Text(_) => 3,
        }
    }
}

impl Ord for IndexKey {
    fn cmp(&self, other: &Self) -> Ordering {
        match (&self.0, &other.0) {
            (Value::Integer(a), Value::Integer(b)) => a.cmp(b),
            (Value::Float(a), Value::Float(b)) => zero_signless(*a).total_cmp(&zero_signless(*b)),
            (Value::Integer(a), Value::Float(b)) => (*a as f64).total_cmp(&zero_signless(*b)),
            (Value::Float(a), Value::Integer(b)) => zero_signless(*a).total_cmp(&(*b as f64)),
            (Value::Text(a), Value::Text(b)) => a.cmp(b),
            (Value::Boolean(a), Value::Boolean(b)) => a.cmp(b),
            _ => self.rank().cmp(&other.rank()),
        }
    }
}

// -0.0 == 0.0 in comparisons, so they must share a key
fn zero_signless(f: f64) -> f64 {
    if f == 0.0 {
        0.0
    } else {
        f
    }
}

impl PartialOrd for IndexKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for IndexKey {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for IndexKey {}

impl BTreeIndex {
    pub fn new(column_name: String) -> Self {
        Self {
            tree: BTreeMap::new(),
            column_name,
        }
    }

    pub fn insert(&mut self, value: Value, row_id: usize) {
        self.tree
            .entry(IndexKey(value))
            .or_default()
            .push(row_id);
    }

    /// Row ids holding `value`, in insertion order
    /// NULL is never equal to anything, so it never matches
    pub fn lookup(&self, value: &Value) -> Option<&Vec<usize>> {
        if value.is_null() {
            return None;
        }
        self.tree.get(&IndexKey(value.clone()))
    }

    pub fn remove(&mut self, value: &Value, row_id: usize) {
        let key = IndexKey(value.clone());

        if let Some(row_ids) = self.tree.get_mut(&key) {
            row_ids.retain(|&id| id != row_id);

            if row_ids.is_empty() {
                self.tree.remove(&key);
            }
        }
    }

    pub fn column_name(&self) -> &str {
        &self.column_name
    }

    /// Number of distinct keys
    pub fn len(&self) -> usize {
        self.tree.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tree.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_btree_insert_and_lookup() {
        let mut index = BTreeIndex::new("label".to_string());

        index.insert(Value::Integer(1), 0);
        index.insert(Value::Integer(2), 1);
        index.insert(Value::Integer(1), 2);

        assert_eq!(index.lookup(&Value::Integer(1)), Some(&vec![0, 2]));
        assert_eq!(index.len(), 2);
    }

    #[test]
    fn test_numeric_keys_share_space() {
        let mut index = BTreeIndex::new("features".to_string());
        index.insert(Value::Float(1.0), 7);

        assert_eq!(index.lookup(&Value::Integer(1)), Some(&vec![7]));
    }

    #[test]
    fn test_signed_zeros_share_a_key() {
        let mut index = BTreeIndex::new("x".to_string());
        index.insert(Value::Float(-0.0), 0);
        index.insert(Value::Float(0.0), 1);

        assert_eq!(index.len(), 1);
        assert_eq!(index.lookup(&Value::Integer(0)), Some(&vec![0, 1]));
        assert_eq!(index.lookup(&Value::Float(-0.0)), Some(&vec![0, 1]));
    }

    #[test]
    fn test_null_never_matches() {
        let mut index = BTreeIndex::new("features".to_string());
        index.insert(Value::Null, 0);

        assert_eq!(index.lookup(&Value::Null), None);
    }

    #[test]
    fn test_remove_drops_empty_keys() {
        let mut index = BTreeIndex::new("label".to_string());
        index.insert(Value::Integer(1), 0);
        index.remove(&Value::Integer(1), 0);

        assert!(index.is_empty());
    }
}
