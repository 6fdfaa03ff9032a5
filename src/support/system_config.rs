//-
// Copyright (c) 2026, Jason Lingle
//
// This file is part of Folderstore.
//
// Folderstore is free software: you can redistribute it and/or modify it
// under the terms of the GNU General Public License as published by the Free
// Software Foundation, either version 3 of the License, or (at your option)
// any later version.
//
// Folderstore is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or
// FITNESS FOR A PARTICULAR PURPOSE. See the GNU General Public License for
// more details.
//
// You should have received a copy of the GNU General Public License along
// with Folderstore. If not, see <http://www.gnu.org/licenses/>.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use super::error::Error;

/// The system-wide configuration for Folderstore.
///
/// This is stored in a file named `folderstore.toml` under the system root.
/// Every section is optional; a missing file is equivalent to an empty one.
#[derive(Clone, Debug, Deserialize, Serialize, Default)]
pub struct SystemConfig {
    /// Layout of newly provisioned mailboxes and the public folder trees.
    #[serde(default)]
    pub store: StoreConfig,

    /// Choices for behaviours where real-world servers disagree.
    #[serde(default)]
    pub policy: PolicyConfig,
}

impl SystemConfig {
    pub const FILE_NAME: &'static str = "folderstore.toml";

    /// Load the configuration from `root`, falling back to the defaults if
    /// the file does not exist.
    pub fn load(root: &Path) -> Result<Self, Error> {
        let path = root.join(Self::FILE_NAME);
        if !path.is_file() {
            return Ok(SystemConfig::default());
        }

        let text = fs::read_to_string(&path)?;
        Ok(toml::from_str(&text)?)
    }
}

#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(default)]
pub struct StoreConfig {
    /// The name this server reports as holding the active replica of public
    /// folders it creates.
    pub server_name: String,

    /// Folders created directly beneath the root of every new private
    /// mailbox.
    pub private_default_folders: Vec<String>,

    /// The independent root trees of the public store. The first one is
    /// the default tree handed out by a public logon.
    ///
    /// If empty, a single `IPM_SUBTREE` root is used.
    pub public_roots: Vec<String>,

    /// The `PidTagMemberRights` bits every member holds on a public folder
    /// whose permissions table has no entry for them and no `default`
    /// entry. Defaults to the rights of a folder owner.
    pub public_default_rights: u32,
}

impl Default for StoreConfig {
    fn default() -> Self {
        StoreConfig {
            server_name: "localhost".to_owned(),
            private_default_folders: vec![
                "Inbox".to_owned(),
                "Outbox".to_owned(),
                "Sent Items".to_owned(),
                "Deleted Items".to_owned(),
            ],
            public_roots: vec![
                "IPM_SUBTREE".to_owned(),
                "NON_IPM_SUBTREE".to_owned(),
            ],
            public_default_rights: 0x7FB,
        }
    }
}

#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(default)]
pub struct PolicyConfig {
    /// How to refuse creating a search folder in the public store.
    pub public_search_folder_creation: PublicSearchFolderPolicy,

    /// Whether emptying a store's root folder is permitted.
    pub empty_root_folder: RootFolderPolicy,

    /// What to do with undefined bits in `DeleteFolderFlags`.
    ///
    /// Newer servers ignore them; older ones fail with `ecInvalidParam`.
    pub invalid_delete_folder_flags: InvalidFlagsPolicy,

    /// What to do with undefined bits in search criteria flags.
    pub invalid_search_flags: InvalidFlagsPolicy,
}

impl Default for PolicyConfig {
    fn default() -> Self {
        PolicyConfig {
            public_search_folder_creation:
                PublicSearchFolderPolicy::RejectNotSupported,
            empty_root_folder: RootFolderPolicy::Reject,
            invalid_delete_folder_flags: InvalidFlagsPolicy::Ignore,
            invalid_search_flags: InvalidFlagsPolicy::Reject,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum PublicSearchFolderPolicy {
    /// Fail with `ecNotSupported`.
    RejectNotSupported,
    /// Fail with the generic `ecError`.
    RejectGeneric,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum RootFolderPolicy {
    /// Fail with `ecNotSupported`.
    Reject,
    Allow,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum InvalidFlagsPolicy {
    Ignore,
    /// Fail with `ecInvalidParam`.
    Reject,
}

#[cfg(test)]
mod test {
    use std::io::Write;

    use super::*;

    #[test]
    fn missing_file_gives_defaults() {
        let root = tempfile::TempDir::new().unwrap();
        let config = SystemConfig::load(root.path()).unwrap();

        assert_eq!("localhost", config.store.server_name);
        assert_eq!(4, config.store.private_default_folders.len());
        assert_eq!(
            PublicSearchFolderPolicy::RejectNotSupported,
            config.policy.public_search_folder_creation
        );
        assert_eq!(RootFolderPolicy::Reject, config.policy.empty_root_folder);
        assert_eq!(
            InvalidFlagsPolicy::Ignore,
            config.policy.invalid_delete_folder_flags
        );
        assert_eq!(
            InvalidFlagsPolicy::Reject,
            config.policy.invalid_search_flags
        );
    }

    #[test]
    fn partial_file_keeps_other_defaults() {
        let root = tempfile::TempDir::new().unwrap();
        let mut file =
            fs::File::create(root.path().join(SystemConfig::FILE_NAME))
                .unwrap();
        writeln!(
            file,
            "[store]\n\
             server_name = \"pf01\"\n\
             \n\
             [policy]\n\
             public_search_folder_creation = \"reject-generic\"\n\
             empty_root_folder = \"allow\"\n"
        )
        .unwrap();
        drop(file);

        let config = SystemConfig::load(root.path()).unwrap();
        assert_eq!("pf01", config.store.server_name);
        assert_eq!(
            vec!["IPM_SUBTREE".to_owned(), "NON_IPM_SUBTREE".to_owned()],
            config.store.public_roots
        );
        assert_eq!(
            PublicSearchFolderPolicy::RejectGeneric,
            config.policy.public_search_folder_creation
        );
        assert_eq!(RootFolderPolicy::Allow, config.policy.empty_root_folder);
        assert_eq!(
            InvalidFlagsPolicy::Reject,
            config.policy.invalid_search_flags
        );
    }

    #[test]
    fn malformed_file_is_an_error() {
        let root = tempfile::TempDir::new().unwrap();
        fs::write(
            root.path().join(SystemConfig::FILE_NAME),
            "[policy]\nempty_root_folder = \"sometimes\"\n",
        )
        .unwrap();

        assert_matches!(
            Err(Error::Toml(..)),
            SystemConfig::load(root.path())
        );
    }
}
