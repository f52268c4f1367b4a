use crate::asset::{
    AssetId,
    AssetRef,
};
use std::collections::BTreeSet;

/// Ids picked for a batch operation on one asset class.
///
/// Pure set algebra. Iteration is ordered so a batch built from the same
/// selection always lists its targets the same way.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct SelectionSet {
    ids: BTreeSet<AssetId>,
}

impl SelectionSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Flip membership of `id`, returning whether it is now selected.
    pub fn toggle(&mut self, id: AssetId) -> bool {
        if self.ids.remove(&id) {
            false
        } else {
            self.ids.insert(id);
            true
        }
    }

    /// Add every id in `ids` to the selection.
    pub fn select_all(&mut self, ids: impl IntoIterator<Item = AssetId>) {
        self.ids.extend(ids);
    }

    /// Replace the selection with exactly the ids of one page.
    pub fn select_page(&mut self, ids: impl IntoIterator<Item = AssetId>) {
        self.ids = ids.into_iter().collect();
    }

    pub fn clear(&mut self) {
        self.ids.clear();
    }

    pub fn has(&self, id: &AssetId) -> bool {
        self.ids.contains(id)
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &AssetId> {
        self.ids.iter()
    }

    /// Intersect with the currently valid ids, returning how many were dropped.
    pub fn retain(&mut self, valid: &BTreeSet<AssetId>) -> usize {
        let before = self.ids.len();
        self.ids.retain(|id| valid.contains(id));
        before - self.ids.len()
    }
}

/// Ids of the items on `page` (zero-based) with `per_page` items per page.
pub fn page_ids(items: &[AssetRef], page: usize, per_page: usize) -> Vec<AssetId> {
    if per_page == 0 {
        return Vec::new();
    }
    items
        .iter()
        .skip(page.saturating_mul(per_page))
        .take(per_page)
        .map(|item| item.id)
        .collect()
}
