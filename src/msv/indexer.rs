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
use std::io::{self, Read};
use std::sync::Arc;

use log::{debug, error, info};

use super::clock::Clock;
use super::model::*;
use super::resource::{
    nearest_lang_file, Language, StandardEntryReader, STANDARD_ENTRIES_FILE,
};
use super::vfs::{add_path, Drive, DriveMedia, Vfs};
use super::visible_folder::VisibleFolder;
use crate::support::error::Error;

/// The message directory used when none is configured.
pub const DEFAULT_MESSAGE_DIR: &str = "C:\\private\\1000484b\\Mail2\\";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum FolderKind {
    Normal,
    Path,
    Service,
}

fn folder_name(id: EntryId, kind: FolderKind) -> String {
    if 0 == id.0 && FolderKind::Service == kind {
        return String::new();
    }

    let mut name = format!("{:08X}", id.0);
    match kind {
        FolderKind::Normal => (),
        FolderKind::Path => name.push_str("_F"),
        FolderKind::Service => name.push_str("_S"),
    }
    name
}

/// The in-memory index of message store entries.
///
/// Entries are partitioned into visible folders by their `visible_id`. This
/// type knows nothing about persistence; a miss here just means the entry is
/// not resident.
///
/// References handed out remain valid as long as the borrow of the indexer
/// does. Folders are only ever dropped with the indexer.
pub struct EntryIndexer {
    vfs: Arc<dyn Vfs>,
    clock: Arc<dyn Clock>,
    message_dir: String,
    preferred_language: Language,
    rom_drive: Drive,
    root_entry: Entry,
    folders: BTreeMap<EntryId, VisibleFolder>,
}

impl EntryIndexer {
    pub fn new(
        vfs: Arc<dyn Vfs>,
        clock: Arc<dyn Clock>,
        message_dir: String,
        preferred_language: Language,
    ) -> Self {
        let rom_drive = Drive::all_descending()
            .find(|&drive| Some(DriveMedia::Rom) == vfs.drive_media(drive))
            .unwrap_or(Drive::Z);

        let root_entry = Entry {
            id: EntryId::ROOT,
            parent_id: EntryId::NONE,
            visible_id: EntryId::ROOT,
            type_uid: Uid::ROOT,
            mtm_uid: Uid::ROOT,
            time: clock.now_micros(),
            ..Entry::default()
        };

        Self {
            vfs,
            clock,
            message_dir,
            preferred_language,
            rom_drive,
            root_entry,
            folders: BTreeMap::new(),
        }
    }

    pub fn vfs(&self) -> &dyn Vfs {
        &*self.vfs
    }

    pub fn now_micros(&self) -> u64 {
        self.clock.now_micros()
    }

    pub fn message_dir(&self) -> &str {
        &self.message_dir
    }

    pub fn rom_drive(&self) -> Drive {
        self.rom_drive
    }

    /// Inserts `entry` into the visible folder named by its `visible_id`,
    /// creating that folder if needed.
    ///
    /// If the entry's parent is cached with a complete child list, the new
    /// id is appended to it.
    pub fn add_entry(&mut self, entry: Entry) -> &Entry {
        if let Some(parent) = self.get_entry_mut(entry.parent_id) {
            if parent.children_looked_up
                && !parent.children_ids.contains(&entry.id)
            {
                parent.children_ids.push(entry.id);
            }
        }

        self.folder_mut(entry.visible_id).add(entry)
    }

    /// Looks up a resident entry.
    pub fn get_entry(&self, id: EntryId) -> Option<&Entry> {
        if EntryId::ROOT == id {
            return Some(&self.root_entry);
        }

        self.folders
            .values()
            .find_map(|folder| folder.get_entry(id))
    }

    pub fn get_entry_mut(&mut self, id: EntryId) -> Option<&mut Entry> {
        if EntryId::ROOT == id {
            return Some(&mut self.root_entry);
        }

        self.folders
            .values_mut()
            .find_map(|folder| folder.get_entry_mut(id))
    }

    pub fn contains(&self, id: EntryId) -> bool {
        self.get_entry(id).is_some()
    }

    pub fn folder(&self, visible_id: EntryId) -> Option<&VisibleFolder> {
        self.folders.get(&visible_id)
    }

    /// Returns the folder for `visible_id`, creating it if it does not exist
    /// yet.
    pub fn folder_mut(&mut self, visible_id: EntryId) -> &mut VisibleFolder {
        self.folders.entry(visible_id).or_insert_with(|| {
            debug!("Creating visible folder {}", visible_id);
            VisibleFolder::new(visible_id)
        })
    }

    pub fn folder_count(&self) -> usize {
        self.folders.len()
    }

    /// Resolves the visible anchor for children of `parent_id` using only
    /// the cache.
    ///
    /// A visible parent anchors its own children; an invisible one defers to
    /// its own anchor. Returns `None` if the parent is not resident.
    pub fn cached_visible_parent_id(
        &self,
        parent_id: EntryId,
    ) -> Option<EntryId> {
        self.get_entry(parent_id).map(|parent| {
            if parent.is_visible() {
                parent_id
            } else {
                parent.visible_id
            }
        })
    }

    /// Opens the default entries resource best matching the preferred
    /// language.
    pub fn open_standard_entries(
        &self,
    ) -> Result<StandardEntryReader<Box<dyn Read>>, Error> {
        let path = nearest_lang_file(
            &*self.vfs,
            STANDARD_ENTRIES_FILE,
            self.preferred_language,
            self.rom_drive,
        );

        let file = match self.vfs.open_file(&path) {
            Ok(file) => file,
            Err(e) if io::ErrorKind::NotFound == e.kind() => {
                error!(
                    "Unable to create standard entries ({} not found)",
                    path,
                );
                return Err(Error::MissingResource);
            }
            Err(e) => {
                error!("Unable to open {}: {}", path, e);
                return Err(e.into());
            }
        };

        info!("Loading standard entries from {}", path);
        StandardEntryReader::new(file).map_err(|e| {
            error!("Default entries file {} is corrupt: {}", path, e);
            e
        })
    }

    /// Tags a freshly decoded default entry with its origin and stamps it.
    pub fn stamp_standard_entry(&self, entry: &mut Entry, origin_tag: u8) {
        entry.id = entry.id.with_origin_tag(origin_tag);
        entry.time = self.clock.now_micros();
    }

    /// Loads the default entries into the cache.
    ///
    /// Each entry's id gets `origin_tag` in its top nibble. Visible
    /// placement is resolved from the cache alone.
    ///
    /// Entries added before a failure stay resident.
    pub fn create_standard_entries(
        &mut self,
        origin_tag: u8,
    ) -> Result<(), Error> {
        for entry in self.open_standard_entries()? {
            let mut entry = entry.map_err(|e| {
                error!("Default entries are corrupt: {}", e);
                e
            })?;

            self.stamp_standard_entry(&mut entry, origin_tag);
            entry.visible_id = self
                .cached_visible_parent_id(entry.parent_id)
                .unwrap_or(entry.parent_id);
            entry.update_visible_folder();
            self.add_entry(entry);
        }

        Ok(())
    }

    /// Returns the virtual path of the file holding `entry`'s payload.
    ///
    /// The layout is
    /// `<message dir>\<service>_S\<low nibble of id>\<id>`, with ids in
    /// 8-digit upper case hex. Service 0 has no folder of its own.
    pub fn get_entry_data_file(&self, entry: &Entry) -> String {
        add_path(
            &self.service_dir(entry),
            &add_path(
                &format!("\\{:X}\\", entry.id.0 & 0xF),
                &folder_name(entry.id, FolderKind::Normal),
            ),
        )
    }

    /// Returns the virtual path of the directory holding `entry`'s
    /// attachment files.
    pub fn get_entry_file_dir(&self, entry: &Entry) -> String {
        add_path(
            &self.service_dir(entry),
            &add_path(
                &format!("\\{:X}\\", entry.id.0 & 0xF),
                &folder_name(entry.id, FolderKind::Path),
            ),
        )
    }

    /// Like `get_entry_data_file`, but ensures the service directory exists
    /// first.
    pub fn prepare_entry_data_file(
        &self,
        entry: &Entry,
    ) -> Result<String, Error> {
        let service_dir = self.service_dir(entry);
        if !self.vfs.exists(&service_dir) {
            self.vfs.create_directories(&service_dir).map_err(|e| {
                error!("Unable to create {}: {}", service_dir, e);
                e
            })?;
        }

        Ok(self.get_entry_data_file(entry))
    }

    fn service_dir(&self, entry: &Entry) -> String {
        add_path(
            &self.message_dir,
            &folder_name(entry.service_id, FolderKind::Service),
        )
    }
}

#[cfg(test)]
mod test {
    use super::super::resource::encode_standard_entries;
    use super::super::test_support::TestEnv;
    use super::*;

    fn folder_entry(id: u32, parent_id: EntryId) -> Entry {
        Entry {
            id: EntryId(id),
            parent_id,
            visible_id: parent_id,
            service_id: EntryId(0x1001),
            type_uid: Uid::FOLDER_ENTRY,
            mtm_uid: Uid::DEFAULT_SPECIFIC_MTM,
            ..Entry::default()
        }
    }

    #[test]
    fn root_always_resolves() {
        let env = TestEnv::new();
        let indexer = env.base_indexer();

        let root = indexer.get_entry(EntryId::ROOT).unwrap();
        assert_eq!(EntryId::NONE, root.parent_id);
        assert_eq!(Uid::ROOT, root.type_uid);
        assert_eq!(TestEnv::NOW, root.time);
        assert_eq!(0, indexer.folder_count());
    }

    #[test]
    fn get_returns_entries_from_any_folder() {
        let env = TestEnv::new();
        let mut indexer = env.base_indexer();

        let inbox = folder_entry(0x1002, EntryId::ROOT);
        let mut message = folder_entry(0x10_0001, EntryId(0x1002));
        message.type_uid = Uid::MESSAGE_ENTRY;
        message.description = "Hello".to_owned();
        message.mtm_data = [1, -2, 3];

        assert_eq!(&inbox, indexer.add_entry(inbox.clone()));
        assert_eq!(&message, indexer.add_entry(message.clone()));
        assert_eq!(2, indexer.folder_count());

        assert_eq!(Some(&inbox), indexer.get_entry(EntryId(0x1002)));
        assert_eq!(Some(&message), indexer.get_entry(EntryId(0x10_0001)));
        assert_eq!(None, indexer.get_entry(EntryId(0x10_0002)));
    }

    #[test]
    fn add_extends_complete_child_lists() {
        let env = TestEnv::new();
        let mut indexer = env.base_indexer();

        indexer.add_entry(folder_entry(0x1002, EntryId::ROOT));
        indexer.add_entry(folder_entry(0x1003, EntryId::ROOT));
        indexer
            .get_entry_mut(EntryId(0x1002))
            .unwrap()
            .children_looked_up = true;

        indexer.add_entry(folder_entry(0x10_0001, EntryId(0x1002)));
        indexer.add_entry(folder_entry(0x10_0002, EntryId(0x1003)));

        assert_eq!(
            vec![EntryId(0x10_0001)],
            indexer.get_entry(EntryId(0x1002)).unwrap().children_ids,
        );
        assert!(indexer
            .get_entry(EntryId(0x1003))
            .unwrap()
            .children_ids
            .is_empty());
    }

    #[test]
    fn cached_visible_parent() {
        let env = TestEnv::new();
        let mut indexer = env.base_indexer();

        let mut hidden = folder_entry(0x1002, EntryId::ROOT);
        hidden.set_visible(false);
        indexer.add_entry(hidden);
        indexer.add_entry(folder_entry(0x1003, EntryId::ROOT));

        assert_eq!(
            Some(EntryId::ROOT),
            indexer.cached_visible_parent_id(EntryId::ROOT),
        );
        assert_eq!(
            Some(EntryId::ROOT),
            indexer.cached_visible_parent_id(EntryId(0x1002)),
        );
        assert_eq!(
            Some(EntryId(0x1003)),
            indexer.cached_visible_parent_id(EntryId(0x1003)),
        );
        assert_eq!(None, indexer.cached_visible_parent_id(EntryId(0x1004)));
    }

    #[test]
    fn data_file_paths() {
        let env = TestEnv::new();
        let indexer = env.base_indexer();

        let entry = Entry {
            id: EntryId(0x12_3456),
            service_id: EntryId(0x1_0001),
            ..Entry::default()
        };
        assert_eq!(
            "C:\\private\\1000484b\\Mail2\\00010001_S\\6\\00123456",
            indexer.get_entry_data_file(&entry),
        );
        assert_eq!(
            "C:\\private\\1000484b\\Mail2\\00010001_S\\6\\00123456_F",
            indexer.get_entry_file_dir(&entry),
        );

        let local = Entry {
            id: EntryId(0x10_002F),
            service_id: EntryId(0),
            ..Entry::default()
        };
        assert_eq!(
            "C:\\private\\1000484b\\Mail2\\F\\0010002F",
            indexer.get_entry_data_file(&local),
        );
    }

    #[test]
    fn prepare_data_file_creates_service_dir() {
        let env = TestEnv::new();
        let indexer = env.base_indexer();

        let entry = Entry {
            id: EntryId(0x12_3456),
            service_id: EntryId(0x1_0001),
            ..Entry::default()
        };
        let path = indexer.prepare_entry_data_file(&entry).unwrap();
        assert_eq!(indexer.get_entry_data_file(&entry), path);
        assert!(env
            .vfs
            .exists("C:\\private\\1000484b\\Mail2\\00010001_S"));
    }

    #[test]
    fn standard_entries_bootstrap() {
        crate::init_test_log();

        let env = TestEnv::new();
        let mut hidden = folder_entry(0x2, EntryId::ROOT);
        hidden.set_visible(false);
        env.write_standard_entries(
            "msgs.rsc",
            &encode_standard_entries(
                2,
                &[folder_entry(0x1, EntryId::ROOT), hidden],
            ),
        );

        let mut indexer = env.base_indexer();
        indexer.create_standard_entries(0xC).unwrap();

        let first = indexer.get_entry(EntryId(0xC000_0001)).unwrap();
        assert_eq!(EntryId::ROOT, first.visible_id);
        assert!(first.is_visible_folder());
        assert_eq!(TestEnv::NOW, first.time);

        let second = indexer.get_entry(EntryId(0xC000_0002)).unwrap();
        assert_eq!(EntryId::ROOT, second.visible_id);
        assert!(!second.is_visible_folder());

        assert!(indexer.get_entry(EntryId(0x1)).is_none());
        assert_eq!(1, indexer.folder_count());
    }

    #[test]
    fn standard_entries_prefer_language_variant() {
        let env = TestEnv::new();
        env.write_standard_entries(
            "msgs.rsc",
            &encode_standard_entries(1, &[folder_entry(0x1, EntryId::ROOT)]),
        );
        env.write_standard_entries(
            "msgs.r01",
            &encode_standard_entries(1, &[folder_entry(0x7, EntryId::ROOT)]),
        );

        let mut indexer = env.base_indexer();
        indexer.create_standard_entries(0x2).unwrap();

        assert!(indexer.contains(EntryId(0x2000_0007)));
        assert!(!indexer.contains(EntryId(0x2000_0001)));
    }

    #[test]
    fn corrupt_standard_entries_keep_earlier_records() {
        crate::init_test_log();

        let env = TestEnv::new();
        env.write_standard_entries(
            "msgs.rsc",
            &encode_standard_entries(
                3,
                &[
                    folder_entry(0x1, EntryId::ROOT),
                    folder_entry(0x2, EntryId::ROOT),
                ],
            ),
        );

        let mut indexer = env.base_indexer();
        assert_matches!(
            Err(Error::Corrupt(_)),
            indexer.create_standard_entries(0xC),
        );
        assert!(indexer.contains(EntryId(0xC000_0001)));
        assert!(indexer.contains(EntryId(0xC000_0002)));
    }

    #[test]
    fn missing_standard_entries() {
        crate::init_test_log();

        let env = TestEnv::new();
        let mut indexer = env.base_indexer();
        assert_matches!(
            Err(Error::MissingResource),
            indexer.create_standard_entries(0xC),
        );
    }

    #[test]
    fn rom_drive_discovery() {
        let env = TestEnv::new();
        assert_eq!(Drive::Z, env.base_indexer().rom_drive());
    }
}
