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

use crate::msv::model::{Entry, EntryId, Uid};
use crate::msv::sql_indexer::SqlEntryIndexer;

use super::main::{AddSubcommand, EntryKind};

pub(super) fn get(indexer: &mut SqlEntryIndexer, id: EntryId) {
    match indexer.get_entry(id) {
        Ok(Some(entry)) => print_entry(entry),
        Ok(None) => die!(EX_NOINPUT, "No such entry: {}", id),
        Err(e) => die!(EX_IOERR, "Failed to look up {}: {}", id, e),
    }
}

pub(super) fn children(indexer: &mut SqlEntryIndexer, id: EntryId) {
    match indexer.get_entry(id) {
        Ok(Some(_)) => (),
        Ok(None) => die!(EX_NOINPUT, "No such entry: {}", id),
        Err(e) => die!(EX_IOERR, "Failed to look up {}: {}", id, e),
    }

    for child in indexer.get_entries_by_parent(id) {
        println!(
            "{:#010X}  {:<10}  {}",
            child.id.0,
            kind_name(child.type_uid),
            child.description
        );
    }
}

pub(super) fn path(indexer: &mut SqlEntryIndexer, id: EntryId) {
    let entry = match indexer.get_entry(id) {
        Ok(Some(entry)) => entry.clone(),
        Ok(None) => die!(EX_NOINPUT, "No such entry: {}", id),
        Err(e) => die!(EX_IOERR, "Failed to look up {}: {}", id, e),
    };

    println!("{}", indexer.cache().get_entry_data_file(&entry));
}

pub(super) fn add(indexer: &mut SqlEntryIndexer, cmd: AddSubcommand) {
    let parent_id = EntryId(cmd.parent);
    let parent = match indexer.get_entry(parent_id) {
        Ok(Some(parent)) => parent.clone(),
        Ok(None) => die!(EX_NOINPUT, "No such parent entry: {}", parent_id),
        Err(e) => die!(EX_IOERR, "Failed to look up {}: {}", parent_id, e),
    };

    let mut entry = Entry {
        parent_id,
        service_id: cmd
            .service
            .map(EntryId)
            .unwrap_or_else(|| default_service(&parent)),
        related_id: EntryId(0),
        type_uid: cmd.kind.uid(),
        mtm_uid: cmd.mtm.map(Uid).unwrap_or(Uid::DEFAULT_SPECIFIC_MTM),
        description: cmd.description,
        details: cmd.details,
        time: indexer.cache().now_micros(),
        ..Entry::default()
    };
    entry.set_visible(!cmd.invisible);
    if EntryKind::Message == cmd.kind {
        entry.set_new(true);
        entry.set_unread(true);
    }

    match indexer.add_entry(entry) {
        Ok(entry) => println!("{:#010X}", entry.id.0),
        Err(e) => die!(EX_DATAERR, "Failed to add entry: {}", e),
    }
}

/// A service owns itself; anything else inherits its parent's service.
fn default_service(parent: &Entry) -> EntryId {
    if Uid::SERVICE_ENTRY == parent.type_uid {
        parent.id
    } else {
        parent.service_id
    }
}

fn kind_name(uid: Uid) -> &'static str {
    match uid {
        Uid::ROOT => "root",
        Uid::SERVICE_ENTRY => "service",
        Uid::FOLDER_ENTRY => "folder",
        Uid::MESSAGE_ENTRY => "message",
        Uid::ATTACHMENT_ENTRY => "attachment",
        _ => "other",
    }
}

fn print_entry(entry: &Entry) {
    println!("id:          {:#010X}", entry.id.0);
    println!("parent:      {:#010X}", entry.parent_id.0);
    println!("service:     {:#010X}", entry.service_id.0);
    println!("visible:     {:#010X}", entry.visible_id.0);
    println!("type:        {} ({})", kind_name(entry.type_uid), entry.type_uid);
    println!("mtm:         {}", entry.mtm_uid);
    println!("flags:       {:#010X}", entry.data);
    println!("description: {}", entry.description);
    println!("details:     {}", entry.details);
    println!("time:        {}", format_time(entry.time));
    println!("size:        {}", entry.size);
}

fn format_time(micros: u64) -> String {
    use chrono::TimeZone;

    match chrono::Utc.timestamp_opt(
        (micros / 1_000_000) as i64,
        (micros % 1_000_000) as u32 * 1000,
    ) {
        chrono::LocalResult::Single(t) => t.to_rfc3339(),
        _ => micros.to_string(),
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn service_inheritance() {
        let mut service = Entry {
            id: EntryId(0x1001),
            service_id: EntryId(0x1001),
            type_uid: Uid::SERVICE_ENTRY,
            ..Entry::default()
        };
        assert_eq!(EntryId(0x1001), default_service(&service));

        service.type_uid = Uid::FOLDER_ENTRY;
        service.service_id = EntryId(0x1002);
        assert_eq!(EntryId(0x1002), default_service(&service));
    }

    #[test]
    fn time_formatting() {
        assert_eq!("1970-01-01T00:00:01.000002+00:00", format_time(1_000_002));
    }
}
