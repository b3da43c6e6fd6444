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

//! Model types for the message store index, plus their bindings to
//! `rusqlite`.

use std::fmt;

use bitflags::bitflags;
use rusqlite::types::{FromSql, FromSqlResult, ToSql, ToSqlOutput, ValueRef};

/// Identifies one entry in the message store.
///
/// The top nibble of entries loaded from the default entries resource
/// carries the drive they originated from. Identifiers handed out by the
/// persistent indexer never have this nibble set.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct EntryId(pub u32);

impl EntryId {
    /// The synthetic root of the whole tree.
    pub const ROOT: Self = Self(0x1000);
    /// The parent link of the root entry.
    pub const NONE: Self = Self(u32::MAX);
    /// The first identifier the persistent indexer may allocate. Everything
    /// below is reserved for default entries.
    pub const FIRST_FREE: Self = Self(0x0010_0000);
    /// The greatest identifier that can be allocated without colliding with
    /// the origin tag.
    pub const MAX_ALLOCATABLE: Self = Self(Self::ID_MASK);

    const ID_MASK: u32 = 0x0FFF_FFFF;
    const TAG_SHIFT: u32 = 28;

    /// Replaces the origin tag of this id with the low 4 bits of `tag`.
    pub fn with_origin_tag(self, tag: u8) -> Self {
        Self(
            (self.0 & Self::ID_MASK)
                | (u32::from(tag & 0xF) << Self::TAG_SHIFT),
        )
    }

    pub fn origin_tag(self) -> u8 {
        (self.0 >> Self::TAG_SHIFT) as u8
    }

    /// Returns the id with the origin tag stripped.
    pub fn masked(self) -> u32 {
        self.0 & Self::ID_MASK
    }
}

impl fmt::Display for EntryId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{:#X}", self.0)
    }
}

/// A Symbian-style UID, used to discriminate entry types and message type
/// modules.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Uid(pub u32);

impl Uid {
    /// Type and MTM of the root entry.
    pub const ROOT: Self = Self(0x1000_0F67);
    pub const SERVICE_ENTRY: Self = Self(0x1000_0F68);
    pub const FOLDER_ENTRY: Self = Self(0x1000_0F69);
    pub const MESSAGE_ENTRY: Self = Self(0x1000_0F6A);
    pub const ATTACHMENT_ENTRY: Self = Self(0x1000_0F6B);
    /// MTM used for entries not owned by any specific MTM.
    pub const DEFAULT_SPECIFIC_MTM: Self = Self(0x1020_2D51);
}

impl fmt::Display for Uid {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{:#010X}", self.0)
    }
}

macro_rules! transparent_to_sql {
    ($t:ident) => {
        impl ToSql for $t {
            fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
                self.0.to_sql()
            }
        }
    };
}

macro_rules! transparent_from_sql {
    ($t:ident) => {
        impl FromSql for $t {
            fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
                FromSql::column_result(value).map(Self)
            }
        }
    };
}

transparent_to_sql!(EntryId);
transparent_from_sql!(EntryId);
transparent_to_sql!(Uid);
transparent_from_sql!(Uid);

bitflags! {
    /// The bits of `Entry::data` that the indexer and its callers care
    /// about.
    ///
    /// Other bits are MTM-specific and are carried through untouched.
    pub struct EntryFlags: u32 {
        const INCOMPLETE = 0x8;
        const NEW = 0x10;
        const UNREAD = 0x20;
        const INVISIBLE = 0x200;
        const MULTIPLE_RECIPIENTS = 0x400;
        const SCHEDULED = 0x800;
        const READ_ONLY = 0x1000;
        const DELETED = 0x2000;
        const ATTACHMENT = 0x8000;
        const VISIBLE_FOLDER = 0x0400_0000;
    }
}

macro_rules! flag_accessors {
    ($($get:ident, $set:ident => $flag:ident;)*) => {
        $(
            pub fn $get(&self) -> bool {
                self.has_flag(EntryFlags::$flag)
            }

            pub fn $set(&mut self, value: bool) {
                self.set_flag(EntryFlags::$flag, value);
            }
        )*
    };
}

/// One node of the message store tree: a service, folder, message, or
/// attachment.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Entry {
    pub id: EntryId,
    /// The logical parent in the full tree.
    pub parent_id: EntryId,
    pub service_id: EntryId,
    pub related_id: EntryId,
    /// The nearest ancestor which serves as a visible anchor. Determines
    /// which visible folder caches this entry.
    pub visible_id: EntryId,
    pub type_uid: Uid,
    pub mtm_uid: Uid,
    /// Flag bits; see `EntryFlags`.
    pub data: u32,
    pub description: String,
    pub details: String,
    /// Microseconds since the UNIX epoch.
    pub time: u64,
    pub size: i32,
    pub error: i32,
    pub pc_sync_count: i32,
    pub bio_type: i32,
    pub mtm_data: [i32; 3],
    pub reserved: i32,

    /// Children known to the cache.
    ///
    /// Only authoritative when `children_looked_up` is set.
    pub children_ids: Vec<EntryId>,
    pub children_looked_up: bool,
}

impl Entry {
    pub fn has_flag(&self, flag: EntryFlags) -> bool {
        self.data & flag.bits() != 0
    }

    pub fn set_flag(&mut self, flag: EntryFlags, value: bool) {
        if value {
            self.data |= flag.bits();
        } else {
            self.data &= !flag.bits();
        }
    }

    /// Whether the entry is shown to users. Stored inverted.
    pub fn is_visible(&self) -> bool {
        !self.has_flag(EntryFlags::INVISIBLE)
    }

    pub fn set_visible(&mut self, visible: bool) {
        self.set_flag(EntryFlags::INVISIBLE, !visible);
    }

    flag_accessors! {
        is_visible_folder, set_visible_folder => VISIBLE_FOLDER;
        is_unread, set_unread => UNREAD;
        is_new, set_new => NEW;
        is_incomplete, set_incomplete => INCOMPLETE;
        is_deleted, set_deleted => DELETED;
        has_attachment, set_attachment => ATTACHMENT;
        has_multiple_recipients, set_multiple_recipients
            => MULTIPLE_RECIPIENTS;
        is_scheduled, set_scheduled => SCHEDULED;
        is_read_only, set_read_only => READ_ONLY;
    }

    /// Whether entries of this type may anchor a visible folder.
    pub fn is_folder_like(&self) -> bool {
        self.type_uid == Uid::SERVICE_ENTRY || self.type_uid == Uid::FOLDER_ENTRY
    }

    /// Recomputes the visible folder flag from the entry's current
    /// placement.
    ///
    /// An entry is a visible folder iff it sits directly under its visible
    /// anchor, is itself visible, and is a service or folder.
    pub fn update_visible_folder(&mut self) {
        let value = self.parent_id == self.visible_id
            && self.is_visible()
            && self.is_folder_like();
        self.set_visible_folder(value);
    }

    /// Builds an entry from a row produced by a `SELECT` of
    /// `ENTRY_COLUMNS`.
    pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            parent_id: row.get(1)?,
            service_id: row.get(2)?,
            mtm_uid: row.get(3)?,
            type_uid: row.get(4)?,
            time: row.get::<_, i64>(5)? as u64,
            data: row.get(6)?,
            size: row.get(7)?,
            error: row.get(8)?,
            mtm_data: [row.get(9)?, row.get(10)?, row.get(11)?],
            related_id: row.get(12)?,
            bio_type: row.get(13)?,
            pc_sync_count: row.get(14)?,
            reserved: row.get(15)?,
            visible_id: row.get(16)?,
            description: row.get::<_, Option<String>>(17)?.unwrap_or_default(),
            details: row.get::<_, Option<String>>(18)?.unwrap_or_default(),
            children_ids: Vec::new(),
            children_looked_up: false,
        })
    }
}

/// The columns of `IndexEntry`, in table order.
pub const ENTRY_COLUMNS: &str = "`id`, `parentId`, `serviceId`, `mtmId`, \
     `type`, `date`, `data`, `size`, `error`, `mtmData1`, `mtmData2`, \
     `mtmData3`, `relatedId`, `bioType`, `pcSyncCount`, `reserved`, \
     `visibleParent`, `description`, `details`";

pub const ENTRY_COLUMN_COUNT: usize = 19;
