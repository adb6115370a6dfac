//! Catalog diffing.

use crate::source::Catalog;

/// Tables whose content changed between two catalogs, in `new`'s order.
///
/// A table is changed when it exists in `new` and is either absent from `old`
/// or listed there with a different hash. Tables only present in `old` are
/// not reported.
pub fn diff(old: &Catalog, new: &Catalog) -> Vec<String> {
    new.iter()
        .filter(|entry| old.hash(&entry.table_name) != Some(entry.content_hash.as_str()))
        .map(|entry| entry.table_name.clone())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::CatalogEntry;

    fn catalog(entries: &[(&str, &str)]) -> Catalog {
        Catalog::from_entries(
            entries
                .iter()
                .map(|(name, hash)| CatalogEntry { table_name: name.to_string(), content_hash: hash.to_string() }),
        )
    }

    #[test]
    fn test_changed_and_added_tables() {
        let old = catalog(&[("A", "1"), ("B", "1"), ("C", "1")]);
        let new = catalog(&[("A", "1"), ("B", "2"), ("D", "1")]);
        assert_eq!(diff(&old, &new), vec!["B", "D"]);
    }

    #[test]
    fn test_removed_tables_not_reported() {
        let old = catalog(&[("A", "1"), ("Gone", "1")]);
        let new = catalog(&[("A", "1")]);
        assert!(diff(&old, &new).is_empty());
    }

    #[test]
    fn test_empty_old_reports_everything() {
        let new = catalog(&[("B", "1"), ("A", "1")]);
        assert_eq!(diff(&Catalog::default(), &new), vec!["A", "B"]);
    }

    #[test]
    fn test_identical_catalogs() {
        let c = catalog(&[("A", "1"), ("B", "2")]);
        assert!(diff(&c, &c).is_empty());
    }
}
