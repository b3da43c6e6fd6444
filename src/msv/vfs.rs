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

//! The virtual file system the message store lives in.
//!
//! Paths handed to and produced by the indexer are Symbian-style virtual
//! paths (`C:\private\1000484b\Mail2\`). The `Vfs` trait maps them onto
//! something real; `HostVfs` backs each drive with a host directory.

use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::io::{self, Read};
use std::path::PathBuf;

pub const SEPARATOR: char = '\\';

/// A drive letter, stored as its number (A = 0 through Z = 25).
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Drive(u8);

impl Drive {
    pub const A: Self = Self(0);
    pub const C: Self = Self(2);
    pub const Z: Self = Self(25);

    pub fn from_letter(letter: char) -> Option<Self> {
        let upper = letter.to_ascii_uppercase();
        if upper.is_ascii_uppercase() {
            Some(Self(upper as u8 - b'A'))
        } else {
            None
        }
    }

    /// Extracts the drive of a path like `C:\foo`.
    pub fn of_path(path: &str) -> Option<Self> {
        let mut chars = path.chars();
        match (chars.next(), chars.next()) {
            (Some(letter), Some(':')) => Self::from_letter(letter),
            _ => None,
        }
    }

    pub fn number(self) -> u8 {
        self.0
    }

    pub fn letter(self) -> char {
        char::from(b'A' + self.0)
    }

    /// All drives, from Z down to A.
    pub fn all_descending() -> impl Iterator<Item = Self> {
        (Self::A.0..=Self::Z.0).rev().map(Self)
    }
}

impl fmt::Display for Drive {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}:", self.letter())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DriveMedia {
    /// Read-only firmware image.
    Rom,
    /// Ordinary writable storage.
    Physical,
}

pub trait Vfs {
    fn exists(&self, path: &str) -> bool;
    fn create_directories(&self, path: &str) -> io::Result<()>;
    /// Maps a virtual path to the host path backing it, if any.
    fn raw_path(&self, path: &str) -> Option<PathBuf>;
    fn open_file(&self, path: &str) -> io::Result<Box<dyn Read>>;
    fn drive_media(&self, drive: Drive) -> Option<DriveMedia>;
}

/// Joins two virtual path fragments with exactly one separator between
/// them.
pub fn add_path(base: &str, rest: &str) -> String {
    if base.is_empty() {
        return rest.to_owned();
    }
    if rest.is_empty() {
        return base.to_owned();
    }

    let mut out = base.trim_end_matches(SEPARATOR).to_owned();
    out.push(SEPARATOR);
    out.push_str(rest.trim_start_matches(SEPARATOR));
    out
}

/// A `Vfs` where every mounted drive is a directory on the host.
#[derive(Clone, Debug, Default)]
pub struct HostVfs {
    drives: BTreeMap<Drive, (PathBuf, DriveMedia)>,
}

impl HostVfs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mount(&mut self, drive: Drive, root: PathBuf, media: DriveMedia) {
        self.drives.insert(drive, (root, media));
    }
}

impl Vfs for HostVfs {
    fn exists(&self, path: &str) -> bool {
        self.raw_path(path).map_or(false, |p| p.exists())
    }

    fn create_directories(&self, path: &str) -> io::Result<()> {
        let raw = self.raw_path(path).ok_or_else(|| {
            io::Error::new(io::ErrorKind::NotFound, "drive not mounted")
        })?;
        fs::create_dir_all(raw)
    }

    fn raw_path(&self, path: &str) -> Option<PathBuf> {
        let drive = Drive::of_path(path)?;
        let (root, _) = self.drives.get(&drive)?;

        let mut raw = root.clone();
        for component in path[2..].split(SEPARATOR) {
            match component {
                "" | "." => (),
                // Refuse to escape the drive root
                ".." => return None,
                c => raw.push(c),
            }
        }

        Some(raw)
    }

    fn open_file(&self, path: &str) -> io::Result<Box<dyn Read>> {
        let raw = self.raw_path(path).ok_or_else(|| {
            io::Error::new(io::ErrorKind::NotFound, "drive not mounted")
        })?;
        Ok(Box::new(fs::File::open(raw)?))
    }

    fn drive_media(&self, drive: Drive) -> Option<DriveMedia> {
        self.drives.get(&drive).map(|&(_, media)| media)
    }
}
