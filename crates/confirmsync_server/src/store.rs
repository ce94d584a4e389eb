//! Server-side annotation storage.

use confirmsync_protocol::FieldAnnotation;
use parking_lot::RwLock;
use std::collections::{BTreeMap, HashMap};

/// Authoritative annotations of every site.
///
/// The store keeps one record per (site, field) and:
/// - Normalizes every record it stores
/// - Keeps `is_pre_filled` set once it was stored as set, unless told otherwise
pub struct AnnotationStore {
    /// site_id -> field_name -> annotation.
    sites: RwLock<HashMap<String, BTreeMap<String, FieldAnnotation>>>,
}

impl AnnotationStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self {
            sites: RwLock::new(HashMap::new()),
        }
    }

    /// Returns every annotation of a site, in field name order.
    pub fn fetch(&self, site_id: &str) -> Vec<FieldAnnotation> {
        self.sites
            .read()
            .get(site_id)
            .map(|fields| fields.values().cloned().collect())
            .unwrap_or_default()
    }

    /// Returns one stored annotation.
    pub fn get(&self, site_id: &str, field_name: &str) -> Option<FieldAnnotation> {
        self.sites
            .read()
            .get(site_id)
            .and_then(|fields| fields.get(field_name))
            .cloned()
    }

    /// Writes a batch and returns the stored state of each annotation.
    pub fn upsert(
        &self,
        site_id: &str,
        annotations: Vec<FieldAnnotation>,
        allow_pre_filled_reset: bool,
    ) -> Vec<FieldAnnotation> {
        let mut sites = self.sites.write();
        let fields = sites.entry(site_id.to_string()).or_default();

        annotations
            .into_iter()
            .map(|incoming| {
                let existing = fields.get(&incoming.field_name);
                let stored = merge_write(existing, incoming, allow_pre_filled_reset);
                fields.insert(stored.field_name.clone(), stored.clone());
                stored
            })
            .collect()
    }

    /// Returns the number of annotations stored for a site.
    pub fn annotation_count(&self, site_id: &str) -> usize {
        self.sites.read().get(site_id).map_or(0, BTreeMap::len)
    }

    /// Returns the number of sites with at least one annotation.
    pub fn site_count(&self) -> usize {
        self.sites.read().len()
    }
}

impl Default for AnnotationStore {
    fn default() -> Self {
        Self::new()
    }
}

fn merge_write(
    existing: Option<&FieldAnnotation>,
    incoming: FieldAnnotation,
    allow_pre_filled_reset: bool,
) -> FieldAnnotation {
    let mut stored = incoming.normalized();
    let was_pre_filled = existing.is_some_and(|a| a.is_pre_filled);

    if was_pre_filled && !stored.is_pre_filled && !allow_pre_filled_reset {
        stored.is_pre_filled = true;
        stored.last_selected = stored.resolve_last_selected();
    }
    stored
}

#[cfg(test)]
mod tests {
    use super::*;
    use confirmsync_protocol::{FlagName, LastSelected};
    use confirmsync_testkit::{annotation_strategy, assert_consistent};
    use proptest::prelude::*;
    use std::collections::HashSet;

    #[test]
    fn upsert_and_fetch() {
        let store = AnnotationStore::new();
        let stored = store.upsert(
            "site-1",
            vec![
                FieldAnnotation::pre_filled("website"),
                FieldAnnotation::pre_filled("company_name"),
            ],
            false,
        );

        assert_eq!(stored.len(), 2);
        assert_eq!(store.annotation_count("site-1"), 2);
        assert_eq!(store.annotation_count("site-2"), 0);
        assert_eq!(store.site_count(), 1);

        let fetched = store.fetch("site-1");
        assert_eq!(fetched[0].field_name, "company_name");
        assert_eq!(fetched[1].field_name, "website");
    }

    #[test]
    fn writes_are_normalized() {
        let store = AnnotationStore::new();
        let mut both = FieldAnnotation::new("phone");
        both.is_confirmed = true;
        both.is_new_data = true;
        both.last_selected = LastSelected::NewData;

        let stored = store.upsert("site-1", vec![both], false);
        assert!(stored[0].is_new_data);
        assert!(!stored[0].is_confirmed);
        assert!(stored[0].is_consistent());
    }

    #[test]
    fn pre_filled_survives_writes() {
        let store = AnnotationStore::new();
        store.upsert("site-1", vec![FieldAnnotation::pre_filled("website")], false);

        let mut cleared = FieldAnnotation::new("website")
            .toggle(FlagName::Confirmed)
            .into_annotation();
        cleared.is_pre_filled = false;

        let stored = store.upsert("site-1", vec![cleared.clone()], false);
        assert!(stored[0].is_pre_filled);
        assert!(stored[0].is_confirmed);
        assert_eq!(stored[0].last_selected, LastSelected::Confirmed);

        let stored = store.upsert("site-1", vec![FieldAnnotation::new("website")], false);
        assert!(stored[0].is_pre_filled);
        assert_eq!(stored[0].last_selected, LastSelected::PreFilled);

        let stored = store.upsert("site-1", vec![FieldAnnotation::new("website")], true);
        assert!(stored[0].is_unset());
        assert_eq!(
            store.get("site-1", "website"),
            Some(FieldAnnotation::new("website"))
        );
    }

    proptest! {
        #[test]
        fn stored_pre_filled_is_never_cleared(
            writes in prop::collection::vec(annotation_strategy(), 1..32)
        ) {
            let store = AnnotationStore::new();
            let mut pre_filled = HashSet::new();

            for write in writes {
                let name = write.field_name.clone();
                let stored = store.upsert("site-1", vec![write], false);
                assert_consistent(&stored[0]);
                if stored[0].is_pre_filled {
                    pre_filled.insert(name);
                } else {
                    prop_assert!(!pre_filled.contains(&name));
                }
            }
        }
    }
}
