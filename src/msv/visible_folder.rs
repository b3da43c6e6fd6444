//-
// Copyright (c) 2024, Jason Lingle
//
// This file is part of Msvindex.
//
// Msvindex is free software: you can redistribute it and/or modify it under
// the terms of the GNU General Public License as published by the Free
// Software Foundation, either version 3 of the License, or (at your option)
// any later version.
//
// Msvindex is distributed in the hope that it will be useful, but WITHOUT ANY
// WARRANTY; without  even the implied  warranty of MERCHANTABILITY  or FITNESS
// FOR  A PARTICULAR  PURPOSE.  See the  GNU General  Public  License for  more
// details.
//
// You should have received a copy of the GNU General Public License along with
// Msvindex. If not, see <http://www.gnu.org/licenses/>.

use std::collections::BTreeMap;

use super::model::*;

/// Why a visible folder could not answer a children query from cache alone.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ChildrenQueryError {
    /// Nothing under this folder's anchor has been bulk-loaded yet.
    Incomplete,
    /// The folder has been loaded, but the particular parent's children were
    /// never enumerated.
    ParentUnresolved,
}

/// A cache partition holding every entry which shares one visible anchor.
///
/// Entries are keyed by id, so adding to a folder never disturbs the other
/// entries within it.
#[derive(Debug)]
pub struct VisibleFolder {
    id: EntryId,
    entries: BTreeMap<EntryId, Entry>,
    /// Whether all direct children of `id` have been loaded.
    bulk_loaded: bool,
}

impl VisibleFolder {
    pub fn new(id: EntryId) -> Self {
        Self {
            id,
            entries: BTreeMap::new(),
            bulk_loaded: false,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Inserts `entry`, replacing any entry with the same id.
    ///
    /// A replaced entry's child bookkeeping survives unless the new value
    /// carries a complete child list of its own.
    pub fn add(&mut self, mut entry: Entry) -> &mut Entry {
        let id = entry.id;
        if let Some(old) = self.entries.remove(&id) {
            if !entry.children_looked_up {
                entry.children_ids = old.children_ids;
                entry.children_looked_up = old.children_looked_up;
            }
        }

        self.entries.entry(id).or_insert(entry)
    }

    pub fn add_entry_list(
        &mut self,
        entries: impl IntoIterator<Item = Entry>,
        mark_as_bulk_loaded: bool,
    ) {
        for entry in entries {
            self.add(entry);
        }

        if mark_as_bulk_loaded {
            self.bulk_loaded = true;
        }
    }

    pub fn get_entry(&self, id: EntryId) -> Option<&Entry> {
        self.entries.get(&id)
    }

    pub fn get_entry_mut(&mut self, id: EntryId) -> Option<&mut Entry> {
        self.entries.get_mut(&id)
    }

    /// Returns the cached children of `parent_id`, or the reason the cache
    /// cannot be trusted for them.
    pub fn get_children_by_parent(
        &self,
        parent_id: EntryId,
    ) -> Result<Vec<&Entry>, ChildrenQueryError> {
        if let Some(parent) = self
            .entries
            .get(&parent_id)
            .filter(|parent| parent.children_looked_up)
        {
            return Ok(parent
                .children_ids
                .iter()
                .filter_map(|id| self.entries.get(id))
                .collect());
        }

        if !self.bulk_loaded {
            return Err(ChildrenQueryError::Incomplete);
        }

        if parent_id != self.id {
            return Err(ChildrenQueryError::ParentUnresolved);
        }

        Ok(self
            .entries
            .values()
            .filter(|entry| entry.parent_id == parent_id)
            .collect())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn entry(id: u32, parent_id: u32, visible_id: u32) -> Entry {
        Entry {
            id: EntryId(id),
            parent_id: EntryId(parent_id),
            visible_id: EntryId(visible_id),
            type_uid: Uid::MESSAGE_ENTRY,
            ..Entry::default()
        }
    }

    fn ids(entries: Vec<&Entry>) -> Vec<u32> {
        entries.into_iter().map(|e| e.id.0).collect()
    }

    #[test]
    fn add_and_get() {
        let mut folder = VisibleFolder::new(EntryId(0x1002));
        folder.add(entry(0x10_0001, 0x1002, 0x1002)).description =
            "hello".to_owned();

        assert_eq!(
            "hello",
            folder.get_entry(EntryId(0x10_0001)).unwrap().description
        );
        assert!(folder.get_entry(EntryId(0x10_0002)).is_none());
        assert_eq!(1, folder.len());
    }

    #[test]
    fn completeness_states() {
        let mut folder = VisibleFolder::new(EntryId(0x1002));
        folder.add(entry(0x10_0001, 0x1002, 0x1002));

        assert_eq!(
            Err(ChildrenQueryError::Incomplete),
            folder.get_children_by_parent(EntryId(0x1002)),
        );

        folder.add_entry_list(vec![entry(0x10_0002, 0x1002, 0x1002)], true);
        assert_eq!(
            vec![0x10_0001, 0x10_0002],
            ids(folder.get_children_by_parent(EntryId(0x1002)).unwrap()),
        );

        assert_eq!(
            Err(ChildrenQueryError::ParentUnresolved),
            folder.get_children_by_parent(EntryId(0x10_0001)),
        );

        let parent = folder.get_entry_mut(EntryId(0x10_0001)).unwrap();
        parent.children_ids.push(EntryId(0x10_0003));
        parent.children_looked_up = true;
        folder.add_entry_list(vec![entry(0x10_0003, 0x10_0001, 0x1002)], false);

        assert_eq!(
            vec![0x10_0003],
            ids(folder.get_children_by_parent(EntryId(0x10_0001)).unwrap()),
        );
        // Only direct children of the anchor are reported for it
        assert_eq!(
            vec![0x10_0001, 0x10_0002],
            ids(folder.get_children_by_parent(EntryId(0x1002)).unwrap()),
        );
    }

    #[test]
    fn looked_up_parent_is_complete_before_bulk_load() {
        let mut folder = VisibleFolder::new(EntryId(0x1002));
        let mut parent = entry(0x10_0001, 0x1002, 0x1002);
        parent.children_looked_up = true;
        folder.add(parent);

        assert_eq!(
            Ok(vec![]),
            folder.get_children_by_parent(EntryId(0x10_0001)),
        );
    }

    #[test]
    fn overwrite_keeps_child_bookkeeping() {
        let mut folder = VisibleFolder::new(EntryId(0x1002));
        let mut parent = entry(0x10_0001, 0x1002, 0x1002);
        parent.children_ids.push(EntryId(0x10_0005));
        parent.children_looked_up = true;
        folder.add(parent);

        let mut refreshed = entry(0x10_0001, 0x1002, 0x1002);
        refreshed.description = "refreshed".to_owned();
        folder.add(refreshed);

        let stored = folder.get_entry(EntryId(0x10_0001)).unwrap();
        assert_eq!("refreshed", stored.description);
        assert!(stored.children_looked_up);
        assert_eq!(vec![EntryId(0x10_0005)], stored.children_ids);
    }
}
