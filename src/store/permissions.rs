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

//! Per-folder member rights.
//!
//! Every folder carries a table mapping member names to the rights they
//! hold on it. The owner of a private mailbox always holds every right on
//! every folder of it. Anyone else gets their own entry, or failing that
//! the `default` entry; a folder with neither grants nothing in a private
//! mailbox and the configured default rights in the public store.
//!
//! Members who create a folder in a store they do not own are made owners
//! of that folder.

use bitflags::bitflags;
use log::{info, warn};

use super::handles::*;
use super::model::*;
use super::object_store::{Message, ObjectStore};
use super::session::Session;
use crate::support::{error::Error, safe_name::is_safe_name};

/// The member name whose entry applies to everyone without their own.
pub const DEFAULT_MEMBER: &str = "default";

bitflags! {
    /// `PidTagMemberRights`.
    #[derive(Default)]
    pub struct MemberRights: u32 {
        const READ_ANY = 0x0000_0001;
        const CREATE = 0x0000_0002;
        const EDIT_OWNED = 0x0000_0008;
        const DELETE_OWNED = 0x0000_0010;
        const EDIT_ANY = 0x0000_0020;
        const DELETE_ANY = 0x0000_0040;
        const CREATE_SUBFOLDER = 0x0000_0080;
        const FOLDER_OWNER = 0x0000_0100;
        const FOLDER_CONTACT = 0x0000_0200;
        const FOLDER_VISIBLE = 0x0000_0400;
        const FREE_BUSY_SIMPLE = 0x0000_0800;
        const FREE_BUSY_DETAILED = 0x0000_1000;

        /// The rights of a folder owner.
        const OWNER = Self::READ_ANY.bits
            | Self::CREATE.bits
            | Self::EDIT_OWNED.bits
            | Self::DELETE_OWNED.bits
            | Self::EDIT_ANY.bits
            | Self::DELETE_ANY.bits
            | Self::CREATE_SUBFOLDER.bits
            | Self::FOLDER_OWNER.bits
            | Self::FOLDER_CONTACT.bits
            | Self::FOLDER_VISIBLE.bits;
    }
}

impl MemberRights {
    pub fn from_wire(raw: u32) -> Result<Self, Error> {
        Self::from_bits(raw).ok_or(Error::InvalidParameter)
    }
}

/// One row of a folder's permissions table.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PermissionEntry {
    pub member: String,
    pub rights: MemberRights,
}

impl ObjectStore {
    /// The rights `user` holds on folder `id`.
    ///
    /// `None` is an anonymous user, who only ever gets the default entry.
    pub(super) fn rights(
        &self,
        user: Option<&str>,
        id: FolderId,
    ) -> MemberRights {
        let folder = match self.folder(id) {
            Ok(folder) => folder,
            Err(_) => return MemberRights::empty(),
        };
        let store = match self.store_of(id) {
            Ok(store) => store,
            Err(_) => return MemberRights::empty(),
        };

        if let (&StoreKind::Private { ref owner }, Some(user)) = (&store, user)
        {
            if owner == user {
                return MemberRights::all();
            }
        }

        user.and_then(|u| folder.permissions.get(u))
            .or_else(|| folder.permissions.get(DEFAULT_MEMBER))
            .copied()
            .unwrap_or_else(|| {
                if store.is_public() {
                    self.public_default_rights
                } else {
                    MemberRights::empty()
                }
            })
    }

    pub(super) fn require_rights(
        &self,
        user: Option<&str>,
        id: FolderId,
        needed: MemberRights,
    ) -> Result<(), Error> {
        if self.rights(user, id).contains(needed) {
            Ok(())
        } else {
            Err(Error::AccessDenied)
        }
    }

    pub(super) fn can_read_message(
        &self,
        user: Option<&str>,
        message: &Message,
    ) -> bool {
        self.rights(user, message.folder)
            .contains(MemberRights::READ_ANY)
            || is_creator(user, message)
    }

    pub(super) fn can_edit_message(
        &self,
        user: Option<&str>,
        message: &Message,
    ) -> bool {
        let rights = self.rights(user, message.folder);
        rights.contains(MemberRights::EDIT_ANY)
            || (rights.contains(MemberRights::EDIT_OWNED)
                && is_creator(user, message))
    }

    pub(super) fn can_delete_message(
        &self,
        user: Option<&str>,
        message: &Message,
    ) -> bool {
        let rights = self.rights(user, message.folder);
        rights.contains(MemberRights::DELETE_ANY)
            || (rights.contains(MemberRights::DELETE_OWNED)
                && is_creator(user, message))
    }

    /// Whether `user` may remove folder `id` with everything Active in it.
    ///
    /// This needs `FOLDER_OWNER` on the folder and on every Active
    /// subfolder, and the right to delete every Active message.
    pub(super) fn subtree_removable(
        &self,
        user: Option<&str>,
        id: FolderId,
    ) -> bool {
        if !self.rights(user, id).contains(MemberRights::FOLDER_OWNER) {
            return false;
        }

        self.owned_messages(id)
            .filter(|m| DeletionState::Active == m.state)
            .all(|m| self.can_delete_message(user, m))
            && self
                .active_children(id)
                .all(|c| self.subtree_removable(user, c.id))
    }

    /// Record `user` as the owner of the folder they just created, unless
    /// they already own the whole mailbox.
    pub(super) fn grant_creator(&mut self, user: Option<&str>, id: FolderId) {
        let user = match user {
            Some(user) => user,
            None => return,
        };
        if self.rights(Some(user), id) == MemberRights::all() {
            return;
        }

        if let Ok(folder) = self.folder_mut(id) {
            folder
                .permissions
                .insert(user.to_owned(), MemberRights::OWNER);
        }
    }
}

fn is_creator(user: Option<&str>, message: &Message) -> bool {
    user.is_some() && message.creator.as_deref() == user
}

impl Session {
    /// Read the permissions table of the folder behind `folder`.
    ///
    /// The `default` entry, if any, comes first.
    pub fn get_permissions(
        &self,
        folder: Handle,
    ) -> Result<Vec<PermissionEntry>, Error> {
        let folder = self.folder_handle(folder)?;
        let objects = self.store.lock();
        objects.require_rights(
            self.user(),
            folder,
            MemberRights::FOLDER_VISIBLE,
        )?;

        let permissions = &objects.folder(folder)?.permissions;
        let default = permissions.get_key_value(DEFAULT_MEMBER);
        Ok(default
            .into_iter()
            .chain(permissions.iter().filter(|&(k, _)| k != DEFAULT_MEMBER))
            .map(|(member, &rights)| PermissionEntry {
                member: member.clone(),
                rights,
            })
            .collect())
    }

    /// `RopModifyPermissions`: set the rights of `member` on the folder
    /// behind `folder`, or remove their entry if `rights` is `None`.
    ///
    /// Only a folder owner may do this.
    pub fn modify_permissions(
        &mut self,
        folder: Handle,
        member: &str,
        rights: Option<MemberRights>,
    ) -> Result<(), Error> {
        let folder = self.folder_handle(folder)?;
        if !is_safe_name(member) {
            return Err(Error::InvalidParameter);
        }

        let mut objects = self.store.lock();
        objects.active_folder(folder)?;
        if let Err(e) = objects.require_rights(
            self.user(),
            folder,
            MemberRights::FOLDER_OWNER,
        ) {
            warn!(
                "{} Refusing to change permissions on {:?}",
                self.log_prefix, folder
            );
            return Err(e);
        }

        let permissions = &mut objects.folder_mut(folder)?.permissions;
        match rights {
            Some(rights) => {
                permissions.insert(member.to_owned(), rights);
            },
            None => {
                permissions.remove(member);
            },
        }

        info!(
            "{} Set rights of {:?} on {:?} to {:?}",
            self.log_prefix, member, folder, rights
        );
        Ok(())
    }
}
