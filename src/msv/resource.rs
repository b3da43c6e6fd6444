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

//! Reading the default entries resource.
//!
//! The payload is a little-endian `u16` count followed by that many fixed
//! layout records: six `u32`s (id, parent, service, type UID, MTM UID, data
//! flags) and then two strings. Each string is a `u8` length in UTF-16 code
//! units followed by the units themselves.

use std::io::{self, Read};

use byteorder::{LittleEndian, ReadBytesExt};
use serde::Deserialize;

use super::model::*;
use super::vfs::{Drive, Vfs};
use crate::support::error::Error;

/// Template for the default entries resource. The drive is substituted at
/// runtime.
pub const STANDARD_ENTRIES_FILE: &str = "Z:\\resource\\messaging\\msgs.rsc";

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Deserialize)]
#[serde(transparent)]
pub struct Language(pub u16);

impl Language {
    pub const ENGLISH: Self = Self(1);
}

impl Default for Language {
    fn default() -> Self {
        Self::ENGLISH
    }
}

/// Returns `path` moved onto `drive`.
fn on_drive(path: &str, drive: Drive) -> String {
    match Drive::of_path(path) {
        Some(_) => format!("{}{}", drive, &path[2..]),
        None => format!("{}{}", drive, path),
    }
}

fn localised_variant(path: &str, language: Language) -> Option<String> {
    let dot = path.rfind('.')?;
    if !path[dot + 1..].eq_ignore_ascii_case("rsc") {
        return None;
    }

    Some(format!("{}.r{:02}", &path[..dot], language.0))
}

/// Finds the file that best matches `language` for the resource at `path`
/// on `drive`.
///
/// Candidates are tried in order: the variant for `language`, the English
/// variant, and the unlocalised file. If none exist, the unlocalised path is
/// returned so the caller can report it.
pub fn nearest_lang_file(
    vfs: &dyn Vfs,
    path: &str,
    language: Language,
    drive: Drive,
) -> String {
    let base = on_drive(path, drive);

    let mut languages = vec![language];
    if language != Language::ENGLISH {
        languages.push(Language::ENGLISH);
    }

    let found = languages
        .into_iter()
        .filter_map(|lang| localised_variant(&base, lang))
        .find(|candidate| vfs.exists(candidate));
    found.unwrap_or(base)
}

/// Streams the records of the default entries resource.
///
/// Records are decoded one at a time so that a truncated resource still
/// yields every record before the damage.
#[derive(Debug)]
pub struct StandardEntryReader<R> {
    reader: R,
    remaining: u16,
}

impl<R: Read> StandardEntryReader<R> {
    pub fn new(mut reader: R) -> Result<Self, Error> {
        let remaining = reader
            .read_u16::<LittleEndian>()
            .map_err(truncation("default entries resource too short"))?;
        Ok(Self { reader, remaining })
    }

    /// The number of records not yet read.
    pub fn remaining(&self) -> u16 {
        self.remaining
    }

    fn read_entry(&mut self) -> io::Result<Entry> {
        let r = &mut self.reader;
        let mut entry = Entry {
            id: EntryId(r.read_u32::<LittleEndian>()?),
            parent_id: EntryId(r.read_u32::<LittleEndian>()?),
            service_id: EntryId(r.read_u32::<LittleEndian>()?),
            type_uid: Uid(r.read_u32::<LittleEndian>()?),
            mtm_uid: Uid(r.read_u32::<LittleEndian>()?),
            ..Entry::default()
        };
        entry.data = r.read_u32::<LittleEndian>()?;
        entry.description = read_string(r)?;
        entry.details = read_string(r)?;
        Ok(entry)
    }
}

impl<R: Read> Iterator for StandardEntryReader<R> {
    type Item = Result<Entry, Error>;

    fn next(&mut self) -> Option<Self::Item> {
        if 0 == self.remaining {
            return None;
        }

        match self.read_entry() {
            Ok(entry) => {
                self.remaining -= 1;
                Some(Ok(entry))
            }
            Err(e) => {
                // Nothing after a bad record can be trusted
                self.remaining = 0;
                Some(Err(truncation("default entry record truncated")(e)))
            }
        }
    }
}

fn read_string(r: &mut impl Read) -> io::Result<String> {
    let len = r.read_u8()?;
    let mut units = Vec::with_capacity(usize::from(len));
    for _ in 0..len {
        units.push(r.read_u16::<LittleEndian>()?);
    }

    String::from_utf16(&units)
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
}

fn truncation(what: &'static str) -> impl Fn(io::Error) -> Error {
    move |e| match e.kind() {
        io::ErrorKind::UnexpectedEof | io::ErrorKind::InvalidData => {
            Error::Corrupt(what)
        }
        _ => Error::Io(e),
    }
}

/// Encodes entries in the default entries resource format.
#[cfg(test)]
pub fn encode_standard_entries(
    declared_count: u16,
    entries: &[Entry],
) -> Vec<u8> {
    use byteorder::WriteBytesExt;

    fn write_string(out: &mut Vec<u8>, s: &str) {
        let units = s.encode_utf16().collect::<Vec<_>>();
        out.write_u8(units.len() as u8).unwrap();
        for unit in units {
            out.write_u16::<LittleEndian>(unit).unwrap();
        }
    }

    let mut out = Vec::new();
    out.write_u16::<LittleEndian>(declared_count).unwrap();
    for entry in entries {
        for v in [
            entry.id.0,
            entry.parent_id.0,
            entry.service_id.0,
            entry.type_uid.0,
            entry.mtm_uid.0,
            entry.data,
        ] {
            out.write_u32::<LittleEndian>(v).unwrap();
        }
        write_string(&mut out, &entry.description);
        write_string(&mut out, &entry.details);
    }
    out
}

#[cfg(test)]
mod test {
    use std::fs;
    use std::io::Cursor;

    use tempfile::TempDir;

    use super::super::vfs::{DriveMedia, HostVfs};
    use super::*;

    fn sample(id: u32, description: &str) -> Entry {
        Entry {
            id: EntryId(id),
            parent_id: EntryId::ROOT,
            service_id: EntryId(0x1001),
            type_uid: Uid::FOLDER_ENTRY,
            mtm_uid: Uid::DEFAULT_SPECIFIC_MTM,
            description: description.to_owned(),
            details: "Détails".to_owned(),
            ..Entry::default()
        }
    }

    #[test]
    fn reads_records() {
        let mut unread = sample(0x1002, "Inbox");
        unread.set_unread(true);
        let data = encode_standard_entries(
            2,
            &[unread.clone(), sample(0x1003, "Outbox")],
        );

        let reader = StandardEntryReader::new(Cursor::new(data)).unwrap();
        assert_eq!(2, reader.remaining());

        let entries = reader.collect::<Result<Vec<_>, _>>().unwrap();
        assert_eq!(vec![unread, sample(0x1003, "Outbox")], entries);
    }

    #[test]
    fn count_beyond_data_is_corrupt() {
        let data = encode_standard_entries(3, &[sample(0x1002, "Inbox")]);
        let mut reader = StandardEntryReader::new(Cursor::new(data)).unwrap();

        assert_eq!(sample(0x1002, "Inbox"), reader.next().unwrap().unwrap());
        assert_matches!(Some(Err(Error::Corrupt(_))), reader.next());
        assert!(reader.next().is_none());
    }

    #[test]
    fn short_resource_is_corrupt() {
        assert_matches!(
            Err(Error::Corrupt(_)),
            StandardEntryReader::new(Cursor::new(vec![1u8]))
        );
    }

    #[test]
    fn nearest_language_selection() {
        let root = TempDir::new().unwrap();
        let mut vfs = HostVfs::new();
        vfs.mount(Drive::Z, root.path().to_owned(), DriveMedia::Rom);

        let dir = root.path().join("resource").join("messaging");
        fs::create_dir_all(&dir).unwrap();

        let nearest = || {
            nearest_lang_file(&vfs, STANDARD_ENTRIES_FILE, Language(3), Drive::Z)
        };

        assert_eq!(
            "Z:\\resource\\messaging\\msgs.rsc",
            nearest(),
        );

        fs::write(dir.join("msgs.r01"), b"").unwrap();
        assert_eq!(
            "Z:\\resource\\messaging\\msgs.r01",
            nearest(),
        );

        fs::write(dir.join("msgs.r03"), b"").unwrap();
        assert_eq!(
            "Z:\\resource\\messaging\\msgs.r03",
            nearest(),
        );
    }
}
