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
use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use super::error::Error;
use crate::msv::indexer::DEFAULT_MESSAGE_DIR;
use crate::msv::resource::Language;
use crate::msv::vfs::{Drive, DriveMedia, HostVfs};

/// The configuration for a message store.
///
/// This is stored in a file named `msvindex.toml` under the configuration
/// root.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct IndexerConfig {
    /// The virtual directory holding the message store, e.g.
    /// `C:\private\1000484b\Mail2\`.
    ///
    /// The database lives in the root of the same drive.
    pub message_dir: String,

    /// The language code used to pick the localised default entries.
    pub language: Language,

    /// If true, a newly created store is populated with the default
    /// entries.
    pub bootstrap: bool,

    /// The drives making up the virtual file system, keyed by drive letter.
    ///
    /// Defaults to a writable `C:` and a ROM `Z:` in the `C` and `Z`
    /// subdirectories of the configuration root.
    pub drives: BTreeMap<String, DriveConfig>,
}

impl Default for IndexerConfig {
    fn default() -> Self {
        Self {
            message_dir: DEFAULT_MESSAGE_DIR.to_owned(),
            language: Language::default(),
            bootstrap: true,
            drives: default_drives(),
        }
    }
}

fn default_drives() -> BTreeMap<String, DriveConfig> {
    let mut drives = BTreeMap::new();
    drives.insert(
        "C".to_owned(),
        DriveConfig {
            path: PathBuf::from("C"),
            rom: false,
        },
    );
    drives.insert(
        "Z".to_owned(),
        DriveConfig {
            path: PathBuf::from("Z"),
            rom: true,
        },
    );
    drives
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct DriveConfig {
    /// The host directory backing the drive. Relative paths are relative to
    /// the configuration root.
    pub path: PathBuf,

    /// Whether the drive is read-only firmware. The default entries are
    /// looked for on the last such drive.
    #[serde(default)]
    pub rom: bool,
}

impl IndexerConfig {
    pub fn load(path: &Path) -> Result<Self, Error> {
        let data = fs::read(path)?;
        Ok(toml::from_slice(&data)?)
    }

    /// Builds the virtual file system described by `drives`.
    pub fn build_vfs(&self, root: &Path) -> Result<HostVfs, Error> {
        let mut vfs = HostVfs::new();
        for (letter, drive_config) in &self.drives {
            let mut chars = letter.chars();
            let drive =
                match (chars.next().and_then(Drive::from_letter), chars.next()) {
                    (Some(drive), None) => drive,
                    _ => {
                        return Err(Error::BadConfig(format!(
                            "'{}' is not a drive letter",
                            letter,
                        )))
                    }
                };

            vfs.mount(
                drive,
                root.join(&drive_config.path),
                if drive_config.rom {
                    DriveMedia::Rom
                } else {
                    DriveMedia::Physical
                },
            );
        }

        Ok(vfs)
    }
}
