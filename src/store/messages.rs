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

//! The message lifecycle engine.

use chrono::prelude::*;
use log::{debug, info};

use super::handles::*;
use super::model::*;
use super::object_store::ObjectStore;
use super::permissions::MemberRights;
use super::session::Session;
use crate::support::error::Error;

impl Session {
    /// `RopCreateMessage`: start a new message in the folder behind
    /// `folder`.
    ///
    /// The message does not exist in the store until `save_message` is
    /// called on the returned handle.
    pub fn create_message(
        &mut self,
        folder: Handle,
        associated: bool,
    ) -> Result<Handle, Error> {
        let folder = self.folder_handle(folder)?;
        {
            let objects = self.store.lock();
            if FolderKind::Search == objects.active_folder(folder)?.kind {
                return Err(Error::ObjectTypeMismatch);
            }
            objects.require_rights(
                self.user(),
                folder,
                MemberRights::CREATE,
            )?;
        }

        Ok(self.handles.open(ServerObject::Message(MessageObject {
            folder,
            id: None,
            associated,
            pending: Properties::new(),
        })))
    }

    /// `RopSaveChangesMessage`: commit the message behind `handle`.
    ///
    /// The first save of a new message creates it as an Active message of
    /// its folder, created by the session's member. Later saves commit
    /// properties staged on the handle, which needs edit rights.
    pub fn save_message(&mut self, handle: Handle) -> Result<MessageId, Error> {
        let message = match *self.handles.get_mut(handle)? {
            ServerObject::Message(ref mut message) => message,
            _ => return Err(Error::ObjectTypeMismatch),
        };
        let user = self.user.as_deref();

        let mut objects = self.store.lock();
        let id = match message.id {
            Some(id) => {
                if !objects.can_edit_message(user, objects.message(id)?) {
                    return Err(Error::AccessDenied);
                }

                let pending = std::mem::take(&mut message.pending);
                let saved = objects.message_mut(id)?;
                saved.properties.extend(pending);
                saved.last_modified = Utc::now();
                id
            },
            None => {
                objects.active_folder(message.folder)?;
                let pending = std::mem::take(&mut message.pending);
                let id = objects.insert_message(
                    message.folder,
                    message.associated,
                    pending,
                    user.map(str::to_owned),
                )?;
                message.id = Some(id);
                info!(
                    "{} Saved new {}message {:?} in {:?}",
                    self.log_prefix,
                    if message.associated { "associated " } else { "" },
                    id,
                    message.folder
                );
                id
            },
        };

        Ok(id)
    }

    /// `RopOpenMessage`.
    ///
    /// Without `OPEN_SOFT_DELETED`, soft- and hard-deleted messages are
    /// equally gone.
    pub fn open_message(
        &mut self,
        input: Handle,
        folder_id: FolderId,
        message_id: MessageId,
        flags: OpenMessageFlags,
    ) -> Result<Handle, Error> {
        let objects = self.store.lock();
        let store = self.open_input(&objects, input)?;

        let message = objects.message(message_id)?;
        if message.folder != folder_id {
            return Err(Error::ObjectGone);
        }

        if DeletionState::SoftDeleted == message.state
            && !flags.contains(OpenMessageFlags::OPEN_SOFT_DELETED)
        {
            return Err(Error::ObjectGone);
        }

        if objects.store_of(folder_id)? != store {
            return Err(Error::ObjectGone);
        }

        if !objects.can_read_message(self.user(), message) {
            return Err(Error::AccessDenied);
        }

        let object = MessageObject {
            folder: folder_id,
            id: Some(message_id),
            associated: message.associated,
            pending: Properties::new(),
        };
        drop(objects);

        Ok(self.handles.open(ServerObject::Message(object)))
    }

    /// `RopMoveCopyMessages`.
    ///
    /// `source` may be a search folder, in which case each message is taken
    /// from the folder that really owns it. `dest` may not be a search
    /// folder, and needs `CREATE` there. Messages which cannot be found
    /// through `source`, or which the session may not read (for a copy) or
    /// delete (for a move), count as partial failures.
    pub fn move_copy_messages(
        &mut self,
        source: Handle,
        dest: Handle,
        request: MoveCopyMessagesRequest,
    ) -> Result<PartialCompletion, Error> {
        let source = self.folder_handle(source)?;
        let dest = self.folder_handle(dest)?;

        let mut objects = self.store.lock();
        objects.folder(source)?;
        if FolderKind::Search == objects.active_folder(dest)?.kind {
            return Err(Error::DestinationIsSearchFolder);
        }
        objects.require_rights(self.user(), dest, MemberRights::CREATE)?;

        if request.want_asynchronous {
            debug!(
                "{} Running asynchronous message transfer synchronously",
                self.log_prefix
            );
        }

        let mut completion = PartialCompletion::default();
        for &id in &request.message_ids {
            let owner = match resolve_message(&objects, source, id) {
                Some(owner) => owner,
                None => {
                    completion.fail();
                    continue;
                },
            };

            let permitted = objects.message(id).map_or(false, |m| {
                if request.copy {
                    objects.can_read_message(self.user(), m)
                } else {
                    objects.can_delete_message(self.user(), m)
                }
            });
            if !permitted {
                completion.fail();
                continue;
            }

            let result = if request.copy {
                objects
                    .duplicate_message(id, dest, self.user())
                    .map(|_| ())
            } else if owner == dest {
                Ok(())
            } else {
                objects.transfer_message(id, dest)
            };

            if result.is_err() {
                completion.fail();
            }
        }

        info!(
            "{} {} {} messages from {:?} to {:?} ({} failed)",
            self.log_prefix,
            if request.copy { "Copied" } else { "Moved" },
            request.message_ids.len() as u32 - completion.failed,
            source,
            dest,
            completion.failed
        );
        Ok(completion)
    }

    /// `RopDeleteMessages`: soft-delete the given messages.
    pub fn delete_messages(
        &mut self,
        folder: Handle,
        message_ids: &[MessageId],
    ) -> Result<PartialCompletion, Error> {
        self.remove_messages(folder, message_ids, false)
    }

    /// `RopHardDeleteMessages`: permanently remove the given messages,
    /// including ones that are already soft-deleted.
    pub fn hard_delete_messages(
        &mut self,
        folder: Handle,
        message_ids: &[MessageId],
    ) -> Result<PartialCompletion, Error> {
        self.remove_messages(folder, message_ids, true)
    }

    fn remove_messages(
        &mut self,
        folder: Handle,
        message_ids: &[MessageId],
        hard: bool,
    ) -> Result<PartialCompletion, Error> {
        let folder = self.folder_handle(folder)?;
        let mut objects = self.store.lock();
        let is_search = FolderKind::Search == objects.folder(folder)?.kind;

        let mut completion = PartialCompletion::default();
        for &id in message_ids {
            let found = if is_search {
                resolve_message(&objects, folder, id).is_some()
            } else {
                objects.message(id).map_or(false, |m| m.folder == folder)
            };
            let permitted = found
                && objects.message(id).map_or(false, |m| {
                    objects.can_delete_message(self.user(), m)
                });

            let result = match (permitted, hard) {
                (false, _) => Err(Error::ObjectGone),
                (true, false) => objects.soft_delete_message(id),
                (true, true) => objects.purge_message(id),
            };
            if result.is_err() {
                completion.fail();
            }
        }

        info!(
            "{} {} {} messages in {:?} ({} failed)",
            self.log_prefix,
            if hard { "Hard-deleted" } else { "Deleted" },
            message_ids.len() as u32 - completion.failed,
            folder,
            completion.failed
        );
        Ok(completion)
    }
}

/// Find the folder that actually owns message `id` as seen through folder
/// `through`.
///
/// For a generic folder, the message must be an Active message of that
/// folder. For a search folder, it must be a current member of the search
/// results, and the result is its real owner.
fn resolve_message(
    objects: &ObjectStore,
    through: FolderId,
    id: MessageId,
) -> Option<FolderId> {
    let folder = objects.folder(through).ok()?;
    let message = objects.message(id).ok()?;
    if DeletionState::Active != message.state {
        return None;
    }

    if FolderKind::Search == folder.kind {
        if objects.search_members(through).contains(&id) {
            Some(message.folder)
        } else {
            None
        }
    } else if message.folder == through {
        Some(through)
    } else {
        None
    }
}
