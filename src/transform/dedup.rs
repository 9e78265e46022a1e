//! In-memory equivalent of `ROW_NUMBER() OVER (PARTITION BY key ORDER BY ...) = 1`.

use indexmap::IndexMap;
use std::cmp::Ordering;
use std::hash::Hash;

/// Group `rows` by `key`, order each group with `order`, keep the first row of each.
///
/// Groups come out in first-seen order. Rows that compare equal keep their input
/// order, so the result is deterministic for a given input.
pub fn first_per_key<T, K, F, C>(rows: impl IntoIterator<Item = T>, key: F, order: C) -> Vec<T>
where
    K: Hash + Eq,
    F: Fn(&T) -> K,
    C: Fn(&T, &T) -> Ordering,
{
    let mut groups: IndexMap<K, Vec<T>> = IndexMap::new();
    for row in rows {
        groups.entry(key(&row)).or_default().push(row);
    }
    groups
        .into_values()
        .filter_map(|group| group.into_iter().min_by(|a, b| order(a, b)))
        .collect()
}

/// `ORDER BY x DESC` with SQL null semantics (NULL sorts first).
pub fn desc_nulls_first<T: Ord>(a: &Option<T>, b: &Option<T>) -> Ordering {
    match (a, b) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Less,
        (Some(_), None) => Ordering::Greater,
        (Some(x), Some(y)) => y.cmp(x),
    }
}

/// `ORDER BY x ASC` with SQL null semantics (NULL sorts last).
pub fn asc_nulls_last<T: Ord>(a: &Option<T>, b: &Option<T>) -> Ordering {
    match (a, b) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Greater,
        (Some(_), None) => Ordering::Less,
        (Some(x), Some(y)) => x.cmp(y),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keeps_newest_per_key() {
        let rows = vec![("a", 1), ("b", 5), ("a", 3), ("b", 2), ("c", 9)];
        let kept = first_per_key(rows, |r| r.0, |x, y| y.1.cmp(&x.1));
        assert_eq!(kept, vec![("a", 3), ("b", 5), ("c", 9)]);
    }

    #[test]
    fn ties_keep_first_seen() {
        let rows = vec![("k", "first"), ("k", "second")];
        let kept = first_per_key(rows, |r| r.0, |_, _| Ordering::Equal);
        assert_eq!(kept, vec![("k", "first")]);
    }

    #[test]
    fn null_ordering_matches_sql() {
        let mut v = vec![Some(2), None, Some(7)];
        v.sort_by(desc_nulls_first);
        assert_eq!(v, vec![None, Some(7), Some(2)]);
        v.sort_by(asc_nulls_last);
        assert_eq!(v, vec![Some(2), Some(7), None]);
    }
}
