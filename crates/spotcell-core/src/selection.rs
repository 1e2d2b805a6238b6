use serde::{Deserialize, Serialize};

/// Channel multi-select with a synthetic "all" entry at position 0.
///
/// Entries `1..=len()` map to channels in registry order. Entry 0 is true
/// exactly when every other entry is true; selecting "all" sets every entry,
/// deselecting it leaves the others untouched.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "StoredEntries")]
pub struct SelectionSet {
    entries: Vec<bool>,
}

/// On-disk form, checked before it becomes a [`SelectionSet`].
#[derive(Deserialize)]
struct StoredEntries {
    entries: Vec<bool>,
}

impl TryFrom<StoredEntries> for SelectionSet {
    type Error = String;

    /// Requires the "all" entry and recomputes it from the others.
    fn try_from(stored: StoredEntries) -> Result<Self, Self::Error> {
        let mut entries = stored.entries;
        let all = match entries.get(1..) {
            Some(rest) => rest.iter().all(|&e| e),
            None => return Err("selection is missing its \"all\" entry".to_string()),
        };
        entries[0] = all;
        Ok(Self { entries })
    }
}

impl SelectionSet {
    /// A set of `n` entries, all selected.
    pub fn all(n: usize) -> Self {
        Self {
            entries: vec![true; n + 1],
        }
    }

    /// A set of `n` entries, none selected.
    pub fn none(n: usize) -> Self {
        let mut entries = vec![false; n + 1];
        // An empty set is vacuously "all".
        entries[0] = n == 0;
        Self { entries }
    }

    /// Number of real entries (the "all" entry excluded).
    pub fn len(&self) -> usize {
        self.entries.len() - 1
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_selected(&self, i: usize) -> bool {
        self.entries.get(i).copied().unwrap_or(false)
    }

    /// Whether the channel at 0-based registry position `position` is selected.
    pub fn selects_position(&self, position: usize) -> bool {
        self.is_selected(position + 1)
    }

    /// Flip entry `i`. Out-of-range indices are ignored.
    pub fn toggle(&mut self, i: usize) {
        if i >= self.entries.len() {
            return;
        }
        self.entries[i] = !self.entries[i];
        if i == 0 {
            if self.entries[0] {
                self.entries.iter_mut().for_each(|e| *e = true);
            }
        } else {
            self.entries[0] = self.entries[1..].iter().all(|&e| e);
        }
    }

    /// Set entry `i` to `value`, toggling only when it differs.
    pub fn set(&mut self, i: usize, value: bool) {
        if self.is_selected(i) != value {
            self.toggle(i);
        }
    }

    /// 0-based positions of the selected entries.
    pub fn selected_positions(&self) -> impl Iterator<Item = usize> + '_ {
        self.entries[1..]
            .iter()
            .enumerate()
            .filter(|&(_, &e)| e)
            .map(|(i, _)| i)
    }

    /// Grow or shrink to `n` entries. New entries follow the "all" entry.
    pub fn resize(&mut self, n: usize) {
        let fill = self.entries[0];
        self.entries.resize(n + 1, fill);
        self.entries[0] = self.entries[1..].iter().all(|&e| e);
    }
}

impl Default for SelectionSet {
    fn default() -> Self {
        Self::all(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resize_new_entries_follow_all() {
        let mut set = SelectionSet::all(2);
        set.resize(4);
        assert!(set.is_selected(0));
        assert!(set.is_selected(4));

        set.toggle(1);
        set.resize(5);
        assert!(!set.is_selected(5));
        assert!(!set.is_selected(0));
    }

    #[test]
    fn test_resize_shrink_recomputes_all() {
        let mut set = SelectionSet::all(3);
        set.toggle(3);
        assert!(!set.is_selected(0));
        set.resize(2);
        assert!(set.is_selected(0));
    }

    #[test]
    fn test_stored_entries_are_checked() {
        assert!(toml::from_str::<SelectionSet>("entries = []").is_err());

        let mut set: SelectionSet = toml::from_str("entries = [true, false, true]").unwrap();
        assert_eq!(set.len(), 2);
        assert!(!set.is_selected(0));
        set.resize(3);
        assert!(!set.is_selected(3));

        let set: SelectionSet = toml::from_str("entries = [false, true, true]").unwrap();
        assert!(set.is_selected(0));
        let empty: SelectionSet = toml::from_str("entries = [false]").unwrap();
        assert_eq!(empty, SelectionSet::default());
    }

    #[test]
    fn test_out_of_range_toggle_ignored() {
        let mut set = SelectionSet::all(2);
        set.toggle(7);
        assert_eq!(set, SelectionSet::all(2));
    }
}
