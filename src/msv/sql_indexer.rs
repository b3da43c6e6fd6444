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

//! The message store index backed by an SQLite database.
//!
//! The in-memory `EntryIndexer` acts as a cache in front of the `IndexEntry`
//! table. Entries are hydrated lazily: looking up an entry or the children
//! of a parent only touches the database when the cache cannot answer
//! authoritatively.

use std::time::Duration;

use log::{debug, error, info, warn};
use rusqlite::OptionalExtension as _;

use super::indexer::EntryIndexer;
use super::model::*;
use super::vfs::Drive;
use super::visible_folder::ChildrenQueryError;
use crate::support::error::Error;

/// The schema version recorded in `VersionTable`.
pub const DATABASE_VERSION: u32 = 2;

static SCHEMA: &str = include_str!("index.sql");

pub struct SqlEntryIndexer {
    cache: EntryIndexer,
    /// `None` if the database could not be opened. Every store operation
    /// fails in that case, but cached entries stay usable.
    cxn: Option<rusqlite::Connection>,
    /// The greatest id allocated so far.
    id_counter: u32,
    store_queries: u64,
}

fn logged<E: Into<Error>>(what: &'static str) -> impl FnOnce(E) -> Error {
    move |e| {
        let e = e.into();
        error!("{}: {}", what, e);
        e
    }
}

impl SqlEntryIndexer {
    /// Opens (or creates) the database for the message directory of
    /// `cache`.
    ///
    /// If the database cannot be opened, the failure is logged and the
    /// indexer is returned anyway. If `bootstrap` is set and the database
    /// holds no entries, it is seeded with the default entries.
    pub fn new(cache: EntryIndexer, bootstrap: bool) -> Self {
        let mut this = Self {
            cache,
            cxn: None,
            id_counter: EntryId::FIRST_FREE.0,
            store_queries: 0,
        };

        let drive =
            Drive::of_path(this.cache.message_dir()).unwrap_or(Drive::C);
        match this.open_database(drive) {
            Ok(true) if bootstrap => {
                info!("New message store; creating standard entries");
                if let Err(e) =
                    this.create_standard_entries(drive.number() & 0xF)
                {
                    warn!("Message store left without standard entries: {}", e);
                }
            }
            Ok(_) => (),
            Err(e) => error!("Fail to establish messaging database: {}", e),
        }

        this
    }

    /// Returns whether the database held no entries.
    fn open_database(&mut self, drive: Drive) -> Result<bool, Error> {
        let dir = format!("{}\\", drive);
        let path = format!("{}messaging.db", dir);
        let raw_path = self.cache.vfs().raw_path(&path).ok_or_else(|| {
            error!("Can't retrieve messaging database path for {}", path);
            Error::StoreUnavailable
        })?;

        if !self.cache.vfs().exists(&dir) {
            self.cache.vfs().create_directories(&dir).map_err(|e| {
                error!("Unable to create {}: {}", dir, e);
                e
            })?;
        }

        let cxn = rusqlite::Connection::open(&raw_path)?;
        cxn.busy_timeout(Duration::from_secs(10))?;
        cxn.execute_batch(SCHEMA)?;

        match cxn
            .query_row("SELECT `version` FROM `VersionTable` LIMIT 1", (), |row| {
                row.get::<_, u32>(0)
            })
            .optional()?
        {
            None => {
                cxn.execute(
                    "INSERT INTO `VersionTable` (`version`) VALUES (?)",
                    (DATABASE_VERSION,),
                )?;
            }
            Some(DATABASE_VERSION) => (),
            Some(version) => warn!(
                "Messaging database has version {}, expected {}",
                version, DATABASE_VERSION,
            ),
        }

        match cxn.query_row(
            "SELECT MAX(`id`) FROM `IndexEntry` WHERE `id` BETWEEN ? AND ?",
            (EntryId::FIRST_FREE, EntryId::MAX_ALLOCATABLE),
            |row| row.get::<_, Option<u32>>(0),
        ) {
            Ok(max) => {
                self.id_counter =
                    max.map_or(EntryId::FIRST_FREE.0, |max| {
                        max.max(EntryId::FIRST_FREE.0)
                    });
            }
            Err(e) => warn!("Can't get max ID for ID counter: {}", e),
        }

        let entry_count = cxn.query_row(
            "SELECT COUNT(*) FROM `IndexEntry`",
            (),
            |row| row.get::<_, i64>(0),
        )?;

        info!(
            "Opened messaging database {} ({} entries, last id {:#X})",
            raw_path.display(),
            entry_count,
            self.id_counter,
        );
        self.cxn = Some(cxn);
        Ok(0 == entry_count)
    }

    /// The in-memory side of the index.
    pub fn cache(&self) -> &EntryIndexer {
        &self.cache
    }

    pub fn is_available(&self) -> bool {
        self.cxn.is_some()
    }

    /// The number of queries issued against the database so far.
    pub fn store_query_count(&self) -> u64 {
        self.store_queries
    }

    /// The greatest id allocated so far.
    pub fn last_allocated_id(&self) -> EntryId {
        EntryId(self.id_counter)
    }

    fn store(&mut self) -> Result<&rusqlite::Connection, Error> {
        match self.cxn {
            Some(ref cxn) => {
                self.store_queries += 1;
                Ok(cxn)
            }
            None => {
                error!("Messaging database is unavailable");
                Err(Error::StoreUnavailable)
            }
        }
    }

    /// Determines which visible folder children of `parent_id` belong to.
    ///
    /// A visible parent anchors its own children. An invisible parent defers
    /// to its own visible anchor. A parent not in the database is assumed to
    /// be visible.
    pub fn get_suitable_visible_parent_id(
        &mut self,
        parent_id: EntryId,
    ) -> Result<EntryId, Error> {
        if let Some(visible_id) = self.cache.cached_visible_parent_id(parent_id)
        {
            return Ok(visible_id);
        }

        let row = self
            .store()?
            .prepare_cached(
                "SELECT `data`, `visibleParent` FROM `IndexEntry` \
                 WHERE `id` = ?",
            )
            .and_then(|mut stmt| {
                stmt.query_row((parent_id,), |row| {
                    Ok((row.get::<_, u32>(0)?, row.get::<_, EntryId>(1)?))
                })
                .optional()
            })
            .map_err(logged("Unable to look up visible folder"))?;

        let invisible = EntryFlags::INVISIBLE.bits();
        Ok(match row {
            Some((data, visible_id)) if data & invisible != 0 => visible_id,
            _ => parent_id,
        })
    }

    fn resolve_visible_parent(
        &mut self,
        parent_id: EntryId,
    ) -> Result<EntryId, Error> {
        match self.get_suitable_visible_parent_id(parent_id)? {
            EntryId(0) => {
                error!("Entry {} has no usable visible folder", parent_id);
                Err(Error::NoVisibleParent)
            }
            visible_id => Ok(visible_id),
        }
    }

    /// Writes a full row for `entry`. Returns whether a row was inserted.
    fn insert_row(
        &mut self,
        entry: &Entry,
        ignore_existing: bool,
    ) -> Result<bool, Error> {
        let sql = format!(
            "INSERT {} INTO `IndexEntry` ({}) VALUES \
             (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
            if ignore_existing { "OR IGNORE" } else { "" },
            ENTRY_COLUMNS,
        );

        let inserted = self
            .store()?
            .prepare_cached(&sql)
            .and_then(|mut stmt| {
                stmt.execute(rusqlite::params![
                    entry.id,
                    entry.parent_id,
                    entry.service_id,
                    entry.mtm_uid,
                    entry.type_uid,
                    entry.time as i64,
                    entry.data,
                    entry.size,
                    entry.error,
                    entry.mtm_data[0],
                    entry.mtm_data[1],
                    entry.mtm_data[2],
                    entry.related_id,
                    entry.bio_type,
                    entry.pc_sync_count,
                    entry.reserved,
                    entry.visible_id,
                    entry.description,
                    entry.details,
                ])
            })
            .map_err(logged("Failed to add entry to database"))?;

        Ok(inserted > 0)
    }

    /// Creates a new entry under `entry.parent_id`.
    ///
    /// The id, visible folder, and visible folder flag of `entry` are
    /// assigned here; whatever the caller put there is ignored. Nothing is
    /// allocated if the entry cannot be written.
    pub fn add_entry(&mut self, mut entry: Entry) -> Result<&Entry, Error> {
        let visible_id = self.resolve_visible_parent(entry.parent_id)?;

        let id = self
            .id_counter
            .checked_add(1)
            .filter(|&id| id <= EntryId::MAX_ALLOCATABLE.0)
            .ok_or(Error::IdsExhausted)?;

        entry.id = EntryId(id);
        entry.visible_id = visible_id;
        entry.update_visible_folder();

        self.insert_row(&entry, false)?;
        self.id_counter = id;

        debug!(
            "Created entry {} under {} (visible folder {})",
            entry.id, entry.parent_id, visible_id,
        );
        Ok(self.cache.add_entry(entry))
    }

    /// Looks an entry up, loading it from the database if it is not cached.
    ///
    /// `Ok(None)` means the entry does not exist.
    pub fn get_entry(&mut self, id: EntryId) -> Result<Option<&Entry>, Error> {
        if self.cache.contains(id) {
            return Ok(self.cache.get_entry(id));
        }

        let sql =
            format!("SELECT {} FROM `IndexEntry` WHERE `id` = ?", ENTRY_COLUMNS);
        let found = self
            .store()?
            .prepare_cached(&sql)
            .and_then(|mut stmt| {
                stmt.query_row((id,), Entry::from_row).optional()
            })
            .map_err(logged("Unable to find entry in database"))?;

        match found {
            Some(entry) => Ok(Some(self.cache.add_entry(entry))),
            None => Ok(None),
        }
    }

    /// Reads every entry whose parent is `parent_id` from the database.
    pub fn collect_children_entries(
        &mut self,
        parent_id: EntryId,
    ) -> Result<Vec<Entry>, Error> {
        // Whole rows, so a drifted table layout fails the column check
        let mut stmt = self
            .store()?
            .prepare_cached("SELECT * FROM `IndexEntry` WHERE `parentId` = ?")
            .map_err(logged("Can't prepare collect children statement"))?;

        if ENTRY_COLUMN_COUNT != stmt.column_count() {
            error!("Query children entries statement is corrupted!");
            return Err(Error::Corrupt("unexpected IndexEntry column count"));
        }

        let entries = stmt
            .query_map((parent_id,), Entry::from_row)
            .and_then(|rows| rows.collect::<Result<Vec<_>, _>>())
            .map_err(logged("Unable to query children entries"))?;
        Ok(entries)
    }

    /// Returns the children of `parent_id`.
    ///
    /// The cache is consulted first. If the owning visible folder has never
    /// been loaded, all direct children of its anchor are loaded at once; if
    /// the parent is not itself the anchor, its own children are then loaded
    /// separately. Failures are logged and produce an empty list.
    pub fn get_entries_by_parent(&mut self, parent_id: EntryId) -> Vec<&Entry> {
        let visible_id = match self.reconcile_children(parent_id) {
            Ok(visible_id) => visible_id,
            Err(e) => {
                error!("Unable to load children of {}: {}", parent_id, e);
                return Vec::new();
            }
        };

        match self
            .cache
            .folder(visible_id)
            .map(|folder| folder.get_children_by_parent(parent_id))
        {
            Some(Ok(children)) => children,
            _ => {
                error!(
                    "An error occurred that made it unable to retrieve \
                     children of {}",
                    parent_id,
                );
                Vec::new()
            }
        }
    }

    /// Brings the cached children of `parent_id` up to date, returning the
    /// visible folder that holds them.
    fn reconcile_children(
        &mut self,
        parent_id: EntryId,
    ) -> Result<EntryId, Error> {
        // With the parent cached, later calls resolve the folder without
        // touching the database.
        if !self.cache.contains(parent_id) {
            self.get_entry(parent_id)?;
        }

        let visible_id = self.resolve_visible_parent(parent_id)?;
        let mut state = self.children_state(visible_id, parent_id);

        if Some(ChildrenQueryError::Incomplete) == state {
            let entries = self.collect_children_entries(visible_id)?;
            debug!(
                "Loaded {} entries into visible folder {}",
                entries.len(),
                visible_id,
            );
            self.cache
                .folder_mut(visible_id)
                .add_entry_list(entries, true);
            state = self.children_state(visible_id, parent_id);
        }

        if state.is_some() {
            let entries = self.collect_children_entries(parent_id)?;
            let folder = self.cache.folder_mut(visible_id);
            match folder.get_entry_mut(parent_id) {
                Some(parent) => {
                    for entry in &entries {
                        if !parent.children_ids.contains(&entry.id) {
                            parent.children_ids.push(entry.id);
                        }
                    }
                    parent.children_looked_up = true;
                }
                None => {
                    error!("Parent entry {} still doesn't exist!", parent_id);
                    return Ok(visible_id);
                }
            }

            folder.add_entry_list(entries, false);
        }

        Ok(visible_id)
    }

    fn children_state(
        &mut self,
        visible_id: EntryId,
        parent_id: EntryId,
    ) -> Option<ChildrenQueryError> {
        self.cache
            .folder_mut(visible_id)
            .get_children_by_parent(parent_id)
            .err()
    }

    /// Loads the default entries into both the database and the cache.
    ///
    /// Default entries keep their fixed ids (tagged with `origin_tag`) and
    /// never advance the id counter. Entries already in the database are
    /// left alone. As with the in-memory variant, entries added before a
    /// failure are kept.
    pub fn create_standard_entries(
        &mut self,
        origin_tag: u8,
    ) -> Result<(), Error> {
        for entry in self.cache.open_standard_entries()? {
            let mut entry =
                entry.map_err(logged("Default entries are corrupt"))?;

            self.cache.stamp_standard_entry(&mut entry, origin_tag);
            entry.visible_id = self.resolve_visible_parent(entry.parent_id)?;
            entry.update_visible_folder();

            if self.insert_row(&entry, true)? {
                self.cache.add_entry(entry);
            } else {
                debug!("Standard entry {} already exists", entry.id);
            }
        }

        Ok(())
    }
}
