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

//! The message store entry index.
//!
//! The store is a tree of entries (services, folders, messages) rooted at
//! `EntryId::ROOT`. In memory, entries are partitioned into visible folders
//! by their nearest visible ancestor; the persistent indexer fills those
//! partitions lazily from an SQLite database.

pub mod clock;
pub mod indexer;
pub mod model;
pub mod resource;
pub mod sql_indexer;
pub mod vfs;
pub mod visible_folder;

#[cfg(test)]
mod test_support;
