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

use std::num::ParseIntError;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;

use structopt::StructOpt;

use crate::msv::clock::SystemClock;
use crate::msv::indexer::EntryIndexer;
use crate::msv::model::{EntryId, Uid};
use crate::msv::sql_indexer::SqlEntryIndexer;
use crate::support::config::IndexerConfig;

#[derive(StructOpt)]
#[structopt(max_term_width = 80)]
struct Options {
    /// The directory containing `msvindex.toml` and, optionally,
    /// `logging.toml` [default: current directory]
    #[structopt(long, parse(from_os_str))]
    root: Option<PathBuf>,

    #[structopt(subcommand)]
    command: Command,
}

#[derive(StructOpt)]
enum Command {
    /// Show a single entry.
    Get(EntryArg),
    /// List the children of an entry.
    Children(EntryArg),
    /// Print the path of the file holding an entry's payload.
    Path(EntryArg),
    Add(AddSubcommand),
}

#[derive(StructOpt)]
pub(super) struct EntryArg {
    /// The entry id, in decimal or 0x-prefixed hex.
    #[structopt(parse(try_from_str = parse_id))]
    pub(super) id: u32,
}

/// Create a new entry.
///
/// The entry receives a freshly allocated id, which is printed on success.
#[derive(StructOpt)]
pub(super) struct AddSubcommand {
    /// The parent of the new entry.
    #[structopt(long, parse(try_from_str = parse_id))]
    pub(super) parent: u32,

    /// The kind of entry: service, folder, message, or attachment.
    #[structopt(long = "type", default_value = "message")]
    pub(super) kind: EntryKind,

    /// The UID of the owning message type module.
    #[structopt(long, parse(try_from_str = parse_id))]
    pub(super) mtm: Option<u32>,

    /// The service owning the entry [default: the parent's service]
    #[structopt(long, parse(try_from_str = parse_id))]
    pub(super) service: Option<u32>,

    /// Hide the entry from users.
    #[structopt(long)]
    pub(super) invisible: bool,

    /// Secondary text, such as the sender of a message.
    #[structopt(long, default_value = "")]
    pub(super) details: String,

    pub(super) description: String,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(super) enum EntryKind {
    Service,
    Folder,
    Message,
    Attachment,
}

impl EntryKind {
    pub(super) fn uid(self) -> Uid {
        match self {
            EntryKind::Service => Uid::SERVICE_ENTRY,
            EntryKind::Folder => Uid::FOLDER_ENTRY,
            EntryKind::Message => Uid::MESSAGE_ENTRY,
            EntryKind::Attachment => Uid::ATTACHMENT_ENTRY,
        }
    }
}

impl FromStr for EntryKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, String> {
        match s.to_ascii_lowercase().as_str() {
            "service" => Ok(EntryKind::Service),
            "folder" => Ok(EntryKind::Folder),
            "message" => Ok(EntryKind::Message),
            "attachment" => Ok(EntryKind::Attachment),
            _ => Err(format!("Unknown entry type: {}", s)),
        }
    }
}

fn parse_id(s: &str) -> Result<u32, ParseIntError> {
    match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        Some(hex) => u32::from_str_radix(hex, 16),
        None => s.parse(),
    }
}

fn log_deserializers() -> log4rs::file::Deserializers {
    log4rs::file::Deserializers::default()
}

pub fn main() {
    // Clap exits with status 1 instead of EX_USAGE if we use the more concise
    // API
    let options =
        Options::from_clap(&match Options::clap().get_matches_safe() {
            Ok(matches) => matches,
            Err(
                e @ clap::Error {
                    kind: clap::ErrorKind::HelpDisplayed,
                    ..
                },
            )
            | Err(
                e @ clap::Error {
                    kind: clap::ErrorKind::VersionDisplayed,
                    ..
                },
            ) => {
                println!("{}", e.message);
                return;
            }
            Err(e) => die!(EX_USAGE, "{}", e.message),
        });

    let root = options.root.unwrap_or_else(|| PathBuf::from("."));

    let log_config_file = root.join("logging.toml");
    if log_config_file.is_file() {
        if let Err(e) =
            log4rs::init_file(&log_config_file, log_deserializers())
        {
            die!(
                EX_CONFIG,
                "Error in logging config at '{}': {}",
                log_config_file.display(),
                e
            );
        }
    } else if let Err(e) = crate::init_simple_log() {
        die!(EX_CONFIG, "Failed to initialise logging: {}", e);
    }

    let config_path = root.join("msvindex.toml");
    let config = if config_path.is_file() {
        match IndexerConfig::load(&config_path) {
            Ok(config) => config,
            Err(e) => die!(
                EX_CONFIG,
                "Error in config file at '{}': {}",
                config_path.display(),
                e
            ),
        }
    } else {
        IndexerConfig::default()
    };

    let vfs = match config.build_vfs(&root) {
        Ok(vfs) => vfs,
        Err(e) => die!(EX_CONFIG, "{}", e),
    };

    let mut indexer = SqlEntryIndexer::new(
        EntryIndexer::new(
            Arc::new(vfs),
            Arc::new(SystemClock),
            config.message_dir.clone(),
            config.language,
        ),
        config.bootstrap,
    );
    if !indexer.is_available() {
        die!(
            EX_UNAVAILABLE,
            "The message store database for '{}' could not be opened",
            config.message_dir
        );
    }

    match options.command {
        Command::Get(arg) => super::inspect::get(&mut indexer, EntryId(arg.id)),
        Command::Children(arg) => {
            super::inspect::children(&mut indexer, EntryId(arg.id))
        }
        Command::Path(arg) => {
            super::inspect::path(&mut indexer, EntryId(arg.id))
        }
        Command::Add(cmd) => super::inspect::add(&mut indexer, cmd),
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn id_parsing() {
        assert_eq!(Ok(4096), parse_id("4096"));
        assert_eq!(Ok(0x10_0001), parse_id("0x100001"));
        assert_eq!(Ok(0xC000_0001), parse_id("0XC0000001"));
        assert!(parse_id("0x").is_err());
        assert!(parse_id("-1").is_err());
    }

    #[test]
    fn entry_kind_parsing() {
        assert_eq!(Ok(EntryKind::Folder), "Folder".parse());
        assert_eq!(Uid::SERVICE_ENTRY, EntryKind::Service.uid());
        assert!("mailbox".parse::<EntryKind>().is_err());
    }

    #[test]
    fn logging_config_loads() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("logging.toml");
        std::fs::write(
            &path,
            r#"
[appenders.console]
kind = "console"

[root]
level = "debug"
appenders = ["console"]
"#,
        )
        .unwrap();

        assert!(log4rs::load_config_file(&path, log_deserializers()).is_ok());
    }

    #[test]
    fn add_command_line() {
        let options = Options::from_iter_safe(&[
            "msvindex",
            "add",
            "--parent",
            "0x1000",
            "--type",
            "folder",
            "--invisible",
            "Archive",
        ])
        .unwrap();

        match options.command {
            Command::Add(cmd) => {
                assert_eq!(0x1000, cmd.parent);
                assert_eq!(EntryKind::Folder, cmd.kind);
                assert!(cmd.invisible);
                assert_eq!(None, cmd.mtm);
                assert_eq!("Archive", cmd.description);
            }
            _ => panic!("Parsed as wrong command"),
        }
    }
}
