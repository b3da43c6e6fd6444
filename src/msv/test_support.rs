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

//! Fixtures shared by the indexer tests.

use std::fs;
use std::sync::Arc;

use tempfile::TempDir;

use super::clock::FixedClock;
use super::indexer::{EntryIndexer, DEFAULT_MESSAGE_DIR};
use super::resource::Language;
use super::sql_indexer::SqlEntryIndexer;
use super::vfs::{Drive, DriveMedia, HostVfs};

/// A scratch environment with a writable `C:` and a ROM `Z:`, each backed
/// by a temporary directory.
pub struct TestEnv {
    pub root: TempDir,
    pub vfs: Arc<HostVfs>,
}

impl TestEnv {
    pub const NOW: u64 = 1_600_000_000_123_456;

    pub fn new() -> Self {
        Self::with_drives(&[
            (Drive::C, DriveMedia::Physical),
            (Drive::Z, DriveMedia::Rom),
        ])
    }

    pub fn with_drives(drives: &[(Drive, DriveMedia)]) -> Self {
        let root = TempDir::new().unwrap();
        let mut vfs = HostVfs::new();
        for &(drive, media) in drives {
            let path = root.path().join(drive.letter().to_string());
            fs::create_dir_all(&path).unwrap();
            vfs.mount(drive, path, media);
        }

        Self {
            root,
            vfs: Arc::new(vfs),
        }
    }

    /// Writes a default entries resource onto the ROM drive.
    pub fn write_standard_entries(&self, name: &str, data: &[u8]) {
        let dir = self.root.path().join("Z").join("resource").join("messaging");
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join(name), data).unwrap();
    }

    pub fn base_indexer(&self) -> EntryIndexer {
        EntryIndexer::new(
            self.vfs.clone(),
            Arc::new(FixedClock(Self::NOW)),
            DEFAULT_MESSAGE_DIR.to_owned(),
            Language::ENGLISH,
        )
    }

    pub fn sql_indexer(&self, bootstrap: bool) -> SqlEntryIndexer {
        SqlEntryIndexer::new(self.base_indexer(), bootstrap)
    }
}
