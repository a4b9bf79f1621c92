use std::collections::BTreeSet;
use std::sync::Arc;

use crate::diff::{DiffItem, DiffResult};

/// Checkbox state of a table group.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GroupState {
    Unchecked,
    Indeterminate,
    Checked,
}

impl GroupState {
    pub fn all_selected(&self) -> bool {
        matches!(self, GroupState::Checked)
    }

    pub fn some_selected(&self) -> bool {
        matches!(self, GroupState::Indeterminate)
    }
}

/// Set of selected diff item ids.
///
/// Updates never mutate a shared value: every operation returns a new
/// `Selection`, and the backing set is only copied when it is shared.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Selection {
    ids: Arc<BTreeSet<String>>,
}

impl Selection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.ids.contains(id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.ids.iter().map(String::as_str)
    }

    /// Flip membership of `id`. Ids absent from `result` are ignored.
    pub fn toggle_item(&self, result: &DiffResult, id: &str) -> Selection {
        if !result.contains(id) {
            return self.clone();
        }
        self.update(|ids| {
            if !ids.remove(id) {
                ids.insert(id.to_string());
            }
        })
    }

    /// Deselect the whole table when fully selected, otherwise select all of it.
    pub fn toggle_group(&self, result: &DiffResult, table_name: &str) -> Selection {
        let group_ids: Vec<&str> = result
            .table_items(table_name)
            .map(|item| item.id.as_str())
            .collect();
        if group_ids.is_empty() {
            return self.clone();
        }

        let all_selected = group_ids.iter().all(|id| self.contains(id));
        self.update(|ids| {
            for id in group_ids {
                if all_selected {
                    ids.remove(id);
                } else {
                    ids.insert(id.to_string());
                }
            }
        })
    }

    pub fn select_all(result: &DiffResult) -> Selection {
        Selection {
            ids: Arc::new(result.items.iter().map(|item| item.id.clone()).collect()),
        }
    }

    pub fn deselect_all() -> Selection {
        Selection::default()
    }

    pub fn group_state(&self, result: &DiffResult, table_name: &str) -> GroupState {
        let mut total = 0usize;
        let mut selected = 0usize;
        for item in result.table_items(table_name) {
            total += 1;
            if self.contains(&item.id) {
                selected += 1;
            }
        }

        if total > 0 && selected == total {
            GroupState::Checked
        } else if selected > 0 {
            GroupState::Indeterminate
        } else {
            GroupState::Unchecked
        }
    }

    /// Selected items in result order, independent of click order.
    pub fn selected_items<'a>(&self, result: &'a DiffResult) -> Vec<&'a DiffItem> {
        result
            .items
            .iter()
            .filter(|item| self.contains(&item.id))
            .collect()
    }

    fn update(&self, apply: impl FnOnce(&mut BTreeSet<String>)) -> Selection {
        let mut ids = Arc::clone(&self.ids);
        apply(Arc::make_mut(&mut ids));
        Selection { ids }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diff::DiffKind;

    fn item(id: &str, table: &str) -> DiffItem {
        DiffItem {
            id: id.to_string(),
            kind: DiffKind::IndexAdded,
            table_name: table.to_string(),
            object_name: Some(format!("idx_{id}")),
            source_def: None,
            target_def: None,
            sql: format!("CREATE INDEX idx_{id} ON {table} (id);"),
            selected: true,
        }
    }

    fn result() -> DiffResult {
        DiffResult {
            items: vec![
                item("1", "users"),
                item("2", "users"),
                item("3", "users"),
                item("4", "posts"),
            ],
            source_tables: 2,
            target_tables: 2,
        }
    }

    #[test]
    fn toggle_item_flips_membership() {
        let result = result();
        let selected = Selection::new().toggle_item(&result, "2");
        assert!(selected.contains("2"));
        let cleared = selected.toggle_item(&result, "2");
        assert!(cleared.is_empty());
    }

    #[test]
    fn toggle_item_ignores_unknown_ids() {
        let selected = Selection::new().toggle_item(&result(), "99");
        assert!(selected.is_empty());
    }

    #[test]
    fn updates_leave_previous_value_untouched() {
        let result = result();
        let before = Selection::select_all(&result);
        let after = before.toggle_item(&result, "1");
        assert_eq!(before.len(), 4);
        assert_eq!(after.len(), 3);
    }

    #[test]
    fn toggle_group_selects_partial_group() {
        let result = result();
        let partial = Selection::new().toggle_item(&result, "1");
        assert_eq!(partial.group_state(&result, "users"), GroupState::Indeterminate);

        let full = partial.toggle_group(&result, "users");
        assert_eq!(full.group_state(&result, "users"), GroupState::Checked);
        assert_eq!(full.len(), 3);
        assert!(!full.contains("4"));
    }

    #[test]
    fn toggle_group_clears_fully_selected_group() {
        let result = result();
        let all = Selection::select_all(&result);
        let toggled = all.toggle_group(&result, "users");
        assert_eq!(toggled.len(), 1);
        assert!(toggled.contains("4"));
        assert_eq!(toggled.group_state(&result, "users"), GroupState::Unchecked);
    }

    #[test]
    fn group_state_flags() {
        assert!(GroupState::Checked.all_selected());
        assert!(!GroupState::Checked.some_selected());
        assert!(GroupState::Indeterminate.some_selected());
        assert!(!GroupState::Unchecked.some_selected());
    }

    #[test]
    fn selected_items_follow_result_order() {
        let result = result();
        let selection = Selection::new()
            .toggle_item(&result, "4")
            .toggle_item(&result, "1");
        let ids: Vec<&str> = selection
            .selected_items(&result)
            .iter()
            .map(|item| item.id.as_str())
            .collect();
        assert_eq!(ids, vec!["1", "4"]);
    }

    #[test]
    fn select_and_deselect_all() {
        let result = result();
        assert_eq!(Selection::select_all(&result).len(), result.items.len());
        assert_eq!(Selection::deselect_all().len(), 0);
    }
}
