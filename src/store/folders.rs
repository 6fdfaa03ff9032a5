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

//! The folder lifecycle engine.

use log::{debug, info, warn};

use super::handles::*;
use super::model::*;
use super::object_store::ObjectStore;
use super::permissions::MemberRights;
use super::session::Session;
use crate::support::{
    error::Error,
    safe_name::is_valid_folder_name,
    system_config::{PublicSearchFolderPolicy, RootFolderPolicy},
};

impl Session {
    /// `RopCreateFolder`: create a child of the folder behind `parent`.
    pub fn create_folder(
        &mut self,
        parent: Handle,
        request: CreateFolderRequest,
    ) -> Result<CreateFolderResponse, Error> {
        let parent = self.folder_handle(parent)?;
        let mut objects = self.store.lock();

        let parent_folder = objects.active_folder(parent)?;
        if FolderKind::Search == parent_folder.kind {
            return Err(Error::ObjectTypeMismatch);
        }

        if let Err(e) = objects.require_rights(
            self.user(),
            parent,
            MemberRights::CREATE_SUBFOLDER,
        ) {
            warn!(
                "{} Refusing to create {:?} under {:?} without rights",
                self.log_prefix, request.name, parent
            );
            return Err(e);
        }

        if !is_valid_folder_name(&request.name) {
            return Err(Error::InvalidParameter);
        }

        if let Some(existing) = objects.find_child(parent, &request.name) {
            if !request.open_existing {
                return Err(Error::DuplicateName);
            }

            let ghost = objects.ghost_info(existing);
            drop(objects);
            let handle = self.handles.open(ServerObject::Folder(existing));
            return Ok(CreateFolderResponse {
                handle,
                folder_id: existing,
                is_existing: true,
                ghost,
            });
        }

        if FolderKind::Search == request.kind
            && objects.store_of(parent)?.is_public()
        {
            warn!(
                "{} Refusing to create search folder {:?} in public store",
                self.log_prefix, request.name
            );
            return Err(
                match self.store.config().policy.public_search_folder_creation
                {
                    PublicSearchFolderPolicy::RejectNotSupported => {
                        Error::ObjectTypeMismatch
                    },
                    PublicSearchFolderPolicy::RejectGeneric => {
                        Error::RefusedByPolicy
                    },
                },
            );
        }

        let id = objects.insert_folder(
            Some(parent),
            request.name.clone(),
            request.kind,
            None,
        );
        if let Some(comment) = request.comment {
            objects
                .folder_mut(id)?
                .properties
                .insert(PROP_COMMENT.to_owned(), PropertyValue::Text(comment));
        }
        objects.grant_creator(self.user(), id);
        drop(objects);

        info!(
            "{} Created {:?} folder {:?} as {:?} under {:?}",
            self.log_prefix, request.kind, request.name, id, parent
        );

        let handle = self.handles.open(ServerObject::Folder(id));
        Ok(CreateFolderResponse {
            handle,
            folder_id: id,
            is_existing: false,
            ghost: None,
        })
    }

    /// `RopOpenFolder`.
    ///
    /// `input` may be a logon or folder handle; the folder must belong to the
    /// same store.
    pub fn open_folder(
        &mut self,
        input: Handle,
        folder_id: FolderId,
        flags: OpenFolderFlags,
    ) -> Result<OpenFolderResponse, Error> {
        let objects = self.store.lock();
        let store = self.open_input(&objects, input)?;

        let folder = objects.folder(folder_id)?;
        if DeletionState::SoftDeleted == folder.state
            && !flags.contains(OpenFolderFlags::OPEN_SOFT_DELETED)
        {
            return Err(Error::ObjectGone);
        }

        if objects.store_of(folder_id)? != store {
            return Err(Error::ObjectGone);
        }

        objects.require_rights(
            self.user(),
            folder_id,
            MemberRights::FOLDER_VISIBLE,
        )?;

        let ghost = objects.ghost_info(folder_id);
        drop(objects);

        let handle = self.handles.open(ServerObject::Folder(folder_id));
        Ok(OpenFolderResponse { handle, ghost })
    }

    /// `RopDeleteFolder`: delete `folder_id`, a direct child of the folder
    /// behind `parent`.
    ///
    /// Deleting a folder needs `FOLDER_OWNER` on it. A folder that still
    /// has content not covered by `flags`, or content the session may not
    /// delete, is left alone and reported as a partial failure.
    pub fn delete_folder(
        &mut self,
        parent: Handle,
        folder_id: FolderId,
        flags: DeleteFolderFlags,
    ) -> Result<PartialCompletion, Error> {
        let parent = self.folder_handle(parent)?;
        let mut objects = self.store.lock();
        objects.folder(parent)?;

        if objects.is_root(folder_id) {
            return Err(Error::ObjectTypeMismatch);
        }

        let target = objects.folder(folder_id)?;
        if target.parent != Some(parent) {
            return Err(Error::ObjectGone);
        }

        let hard = flags.contains(DeleteFolderFlags::HARD_DELETE);
        if !hard && DeletionState::Active != target.state {
            return Err(Error::ObjectGone);
        }

        if let Err(e) = objects.require_rights(
            self.user(),
            folder_id,
            MemberRights::FOLDER_OWNER,
        ) {
            warn!(
                "{} Refusing to delete {:?} without rights",
                self.log_prefix, folder_id
            );
            return Err(e);
        }

        let mut completion = PartialCompletion::default();
        let has_messages = objects
            .owned_messages(folder_id)
            .any(|m| DeletionState::Active == m.state);
        let has_folders = objects.active_children(folder_id).next().is_some();
        if (has_messages && !flags.contains(DeleteFolderFlags::DEL_MESSAGES))
            || (has_folders && !flags.contains(DeleteFolderFlags::DEL_FOLDERS))
        {
            completion.fail();
            info!(
                "{} Not deleting non-empty folder {:?} (flags {:?})",
                self.log_prefix, folder_id, flags
            );
            return Ok(completion);
        }

        if !objects.subtree_removable(self.user(), folder_id) {
            completion.fail();
            info!(
                "{} Not deleting {:?}: some content may not be deleted",
                self.log_prefix, folder_id
            );
            return Ok(completion);
        }

        if hard {
            objects.purge_subtree(folder_id);
        } else {
            objects.soft_delete_subtree(folder_id);
        }

        info!(
            "{} {} folder {:?}",
            self.log_prefix,
            if hard { "Hard-deleted" } else { "Soft-deleted" },
            folder_id
        );
        Ok(completion)
    }

    /// `RopMoveFolder`: move `request.folder_id`, a direct child of the
    /// folder behind `source`, into the folder behind `dest`.
    pub fn move_folder(
        &mut self,
        source: Handle,
        dest: Handle,
        request: MoveFolderRequest,
    ) -> Result<FolderTransferResponse, Error> {
        let source = self.folder_handle(source)?;
        let dest = self.folder_handle(dest)?;
        if request.want_asynchronous {
            debug!("{} Running asynchronous move synchronously", self.log_prefix);
        }

        let mut objects = self.store.lock();
        self.check_transfer(
            &objects,
            source,
            dest,
            request.folder_id,
            &request.new_name,
        )?;

        let mut completion = PartialCompletion::default();
        if !objects.subtree_removable(self.user(), request.folder_id) {
            // The folder stays where it is.
            completion.fail();
            info!(
                "{} Not moving {:?}: some content may not be removed",
                self.log_prefix, request.folder_id
            );
            return Ok(FolderTransferResponse {
                folder_id: request.folder_id,
                completion,
            });
        }

        objects.reparent(request.folder_id, dest, request.new_name.clone())?;
        info!(
            "{} Moved folder {:?} to {:?} as {:?}",
            self.log_prefix, request.folder_id, dest, request.new_name
        );

        Ok(FolderTransferResponse {
            folder_id: request.folder_id,
            completion,
        })
    }

    /// `RopCopyFolder`: copy `request.folder_id`, a direct child of the
    /// folder behind `source`, into the folder behind `dest`.
    pub fn copy_folder(
        &mut self,
        source: Handle,
        dest: Handle,
        request: CopyFolderRequest,
    ) -> Result<FolderTransferResponse, Error> {
        let source = self.folder_handle(source)?;
        let dest = self.folder_handle(dest)?;
        if request.want_asynchronous {
            debug!("{} Running asynchronous copy synchronously", self.log_prefix);
        }

        let mut objects = self.store.lock();
        self.check_transfer(
            &objects,
            source,
            dest,
            request.folder_id,
            &request.new_name,
        )?;

        objects.require_rights(
            self.user(),
            request.folder_id,
            MemberRights::FOLDER_VISIBLE,
        )?;

        let (copy, completion) = objects.duplicate_folder(
            request.folder_id,
            dest,
            request.new_name.clone(),
            request.recursive,
            self.user(),
        )?;
        info!(
            "{} Copied folder {:?} to {:?} as {:?} ({:?}, recursive={}, \
             {} skipped)",
            self.log_prefix,
            request.folder_id,
            dest,
            request.new_name,
            copy,
            request.recursive,
            completion.failed
        );

        Ok(FolderTransferResponse {
            folder_id: copy,
            completion,
        })
    }

    /// Validation shared by `move_folder` and `copy_folder`.
    fn check_transfer(
        &self,
        objects: &ObjectStore,
        source: FolderId,
        dest: FolderId,
        folder_id: FolderId,
        new_name: &str,
    ) -> Result<(), Error> {
        if objects.is_root(folder_id) {
            return Err(Error::ObjectTypeMismatch);
        }

        objects.active_folder(source)?;
        if objects.active_folder(folder_id)?.parent != Some(source) {
            return Err(Error::ObjectGone);
        }

        if FolderKind::Search == objects.active_folder(dest)?.kind {
            return Err(Error::ObjectTypeMismatch);
        }

        if objects.is_within(folder_id, dest) {
            warn!(
                "{} Refusing to place {:?} inside its own subtree at {:?}",
                self.log_prefix, folder_id, dest
            );
            return Err(Error::DestinationInsideSource);
        }

        if !is_valid_folder_name(new_name) {
            return Err(Error::InvalidParameter);
        }

        objects.require_rights(
            self.user(),
            dest,
            MemberRights::CREATE_SUBFOLDER,
        )?;

        if objects
            .find_child(dest, new_name)
            .map_or(false, |existing| existing != folder_id)
        {
            return Err(Error::DuplicateName);
        }

        Ok(())
    }

    /// `RopEmptyFolder`: soft-delete the messages of the folder behind
    /// `handle` (associated ones only if `include_associated`) and all of its
    /// subfolders.
    pub fn empty_folder(
        &mut self,
        handle: Handle,
        include_associated: bool,
    ) -> Result<PartialCompletion, Error> {
        self.clear_folder(handle, include_associated, false)
    }

    /// `RopHardDeleteMessagesAndSubfolders`: like `empty_folder`, but the
    /// removals are permanent.
    pub fn hard_delete_messages_and_subfolders(
        &mut self,
        handle: Handle,
        include_associated: bool,
    ) -> Result<PartialCompletion, Error> {
        self.clear_folder(handle, include_associated, true)
    }

    fn clear_folder(
        &mut self,
        handle: Handle,
        include_associated: bool,
        hard: bool,
    ) -> Result<PartialCompletion, Error> {
        let folder_id = self.folder_handle(handle)?;
        let mut objects = self.store.lock();

        let folder = objects.active_folder(folder_id)?;
        if FolderKind::Search == folder.kind {
            return Err(Error::ObjectTypeMismatch);
        }

        if folder.parent.is_none()
            && RootFolderPolicy::Reject
                == self.store.config().policy.empty_root_folder
        {
            warn!("{} Refusing to empty root folder", self.log_prefix);
            return Err(Error::ObjectTypeMismatch);
        }

        let user = self.user();
        let mut completion = PartialCompletion::default();
        let mut messages = Vec::new();
        for message in objects
            .owned_messages(folder_id)
            .filter(|m| include_associated || !m.associated)
            .filter(|m| hard || DeletionState::Active == m.state)
        {
            if objects.can_delete_message(user, message) {
                messages.push(message.id);
            } else {
                completion.fail();
            }
        }
        let mut subfolders = Vec::new();
        for &subfolder in &folder.children {
            let state = objects.folder_state(subfolder);
            if !hard && Some(DeletionState::Active) != state {
                continue;
            }

            if objects.subtree_removable(user, subfolder) {
                subfolders.push(subfolder);
            } else {
                completion.fail();
            }
        }

        for &message in &messages {
            let result = if hard {
                objects.purge_message(message)
            } else {
                objects.soft_delete_message(message)
            };
            if result.is_err() {
                completion.fail();
            }
        }

        for subfolder in subfolders {
            if hard {
                objects.purge_subtree(subfolder);
            } else {
                objects.soft_delete_subtree(subfolder);
            }
        }

        info!(
            "{} {} folder {:?}: {} messages (associated={}, {} failed)",
            self.log_prefix,
            if hard { "Hard-emptied" } else { "Emptied" },
            folder_id,
            messages.len(),
            include_associated,
            completion.failed
        );
        Ok(completion)
    }
}

#[cfg(test)]
mod test {
    use proptest::prelude::*;

    use super::super::session::TestFixture;
    use super::*;
    use crate::support::system_config::SystemConfig;

    #[test]
    fn create_open_existing_is_idempotent() {
        let mut fixture = TestFixture::new();
        let root = fixture.root_handle();
        let before = fixture.hierarchy(root);

        let request = CreateFolderRequest {
            open_existing: true,
            ..CreateFolderRequest::generic("X")
        };
        let first = fixture
            .session
            .create_folder(root, request.clone())
            .unwrap();
        assert!(!first.is_existing);
        let after_first = fixture.hierarchy(root);
        assert_eq!(before + 1, after_first);

        let second = fixture.session.create_folder(root, request).unwrap();
        assert!(second.is_existing);
        assert_eq!(first.folder_id, second.folder_id);
        // Private folders carry no replica information.
        assert_eq!(None, second.ghost);
        assert_eq!(after_first, fixture.hierarchy(root));

        assert_matches!(
            Err(Error::DuplicateName),
            fixture
                .session
                .create_folder(root, CreateFolderRequest::generic("x"))
        );
    }

    #[test]
    fn create_validates_parent_and_name() {
        let mut fixture = TestFixture::new();
        let root = fixture.root_handle();
        let logon = fixture.logon;

        assert_matches!(
            Err(Error::ObjectTypeMismatch),
            fixture
                .session
                .create_folder(logon, CreateFolderRequest::generic("A"))
        );
        assert_matches!(
            Err(Error::InvalidParameter),
            fixture
                .session
                .create_folder(root, CreateFolderRequest::generic(" "))
        );

        let search = fixture.create_search(root, "S");
        assert_matches!(
            Err(Error::ObjectTypeMismatch),
            fixture
                .session
                .create_folder(search, CreateFolderRequest::generic("A"))
        );

        let a = fixture.create(root, "A");
        let a_id = fixture.id_of(a);
        fixture
            .session
            .delete_folder(root, a_id, DeleteFolderFlags::empty())
            .unwrap();
        assert_matches!(
            Err(Error::ObjectGone),
            fixture
                .session
                .create_folder(a, CreateFolderRequest::generic("B"))
        );
    }

    #[test]
    fn public_folders_report_ghost_info() {
        let fixture = TestFixture::new();
        let mut session = fixture.other_session();
        let logon = session.logon_public().unwrap();
        let root = session
            .open_folder(logon.handle, logon.root, OpenFolderFlags::empty())
            .unwrap();
        assert_eq!(
            Some(GhostInfo {
                is_ghosted: false,
                servers: vec!["localhost".to_owned()],
            }),
            root.ghost
        );

        let request = CreateFolderRequest {
            open_existing: true,
            ..CreateFolderRequest::generic("News")
        };
        let created =
            session.create_folder(root.handle, request.clone()).unwrap();
        assert_eq!(None, created.ghost);

        session
            .store()
            .set_replica_state(
                created.folder_id,
                ReplicaState::Ghosted {
                    servers: vec!["pf02".to_owned(), "pf03".to_owned()],
                },
            )
            .unwrap();

        let existing = session.create_folder(root.handle, request).unwrap();
        assert!(existing.is_existing);
        let ghost = existing.ghost.unwrap();
        assert!(ghost.is_ghosted);
        assert_eq!(2, ghost.replica_count());
        assert_eq!("pf02", ghost.servers[0]);

        assert_matches!(
            Err(Error::InvalidParameter),
            session
                .store()
                .set_replica_state(fixture.root, ReplicaState::Active)
        );
    }

    #[test]
    fn public_search_folder_policy() {
        let fixture = TestFixture::new();
        let mut session = fixture.other_session();
        let logon = session.logon_public().unwrap();
        let root = session
            .open_folder(logon.handle, logon.root, OpenFolderFlags::empty())
            .unwrap()
            .handle;
        let request = CreateFolderRequest {
            kind: FolderKind::Search,
            ..CreateFolderRequest::generic("S")
        };
        assert_matches!(
            Err(Error::ObjectTypeMismatch),
            session.create_folder(root, request.clone())
        );

        let mut config = SystemConfig::default();
        config.policy.public_search_folder_creation =
            PublicSearchFolderPolicy::RejectGeneric;
        let fixture = TestFixture::with_config(config);
        let mut session = fixture.other_session();
        let logon = session.logon_public().unwrap();
        let root = session
            .open_folder(logon.handle, logon.root, OpenFolderFlags::empty())
            .unwrap()
            .handle;
        assert_matches!(
            Err(Error::RefusedByPolicy),
            session.create_folder(root, request)
        );
    }

    #[test]
    fn open_folder_hides_deleted() {
        let mut fixture = TestFixture::new();
        let root = fixture.root_handle();
        let a = fixture.create(root, "A");
        let a_id = fixture.id_of(a);
        let b = fixture.create(root, "B");
        let b_id = fixture.id_of(b);
        let logon = fixture.logon;

        fixture
            .session
            .delete_folder(root, a_id, DeleteFolderFlags::empty())
            .unwrap();
        assert_eq!(DeletionState::SoftDeleted, fixture.folder_state(a_id));
        assert_matches!(
            Err(Error::ObjectGone),
            fixture
                .session
                .open_folder(logon, a_id, OpenFolderFlags::empty())
        );
        fixture
            .session
            .open_folder(logon, a_id, OpenFolderFlags::OPEN_SOFT_DELETED)
            .unwrap();

        fixture
            .session
            .delete_folder(root, b_id, DeleteFolderFlags::HARD_DELETE)
            .unwrap();
        assert_eq!(DeletionState::HardDeleted, fixture.folder_state(b_id));
        assert_matches!(
            Err(Error::ObjectGone),
            fixture
                .session
                .open_folder(logon, b_id, OpenFolderFlags::OPEN_SOFT_DELETED)
        );

        let table = fixture
            .session
            .hierarchy_table(root, HierarchyTableFlags::empty())
            .unwrap();
        assert_matches!(
            Err(Error::ObjectTypeMismatch),
            fixture.session.open_folder(
                table.handle,
                fixture.root,
                OpenFolderFlags::empty()
            )
        );

        // Another user's folders are not visible through this logon.
        let mut other = fixture.other_session();
        let bob = other.logon_private("bob").unwrap();
        assert_matches!(
            Err(Error::ObjectGone),
            fixture
                .session
                .open_folder(logon, bob.root, OpenFolderFlags::empty())
        );
    }

    #[test]
    fn delete_folder_respects_content_flags() {
        let mut fixture = TestFixture::new();
        let root = fixture.root_handle();
        let a = fixture.create(root, "A");
        let a_id = fixture.id_of(a);
        let sub = fixture.create(a, "sub");
        let sub_id = fixture.id_of(sub);
        let m = fixture.message(a, false, "m");

        let completion = fixture
            .session
            .delete_folder(root, a_id, DeleteFolderFlags::DEL_MESSAGES)
            .unwrap();
        assert!(completion.is_partial());
        assert_eq!(DeletionState::Active, fixture.folder_state(a_id));

        let completion = fixture
            .session
            .delete_folder(
                root,
                a_id,
                DeleteFolderFlags::DEL_MESSAGES | DeleteFolderFlags::DEL_FOLDERS,
            )
            .unwrap();
        assert!(!completion.is_partial());
        assert_eq!(DeletionState::SoftDeleted, fixture.folder_state(a_id));
        assert_eq!(DeletionState::SoftDeleted, fixture.folder_state(sub_id));
        assert_eq!(DeletionState::SoftDeleted, fixture.message_state(m));

        assert_matches!(
            Err(Error::ObjectGone),
            fixture.session.delete_folder(
                root,
                a_id,
                DeleteFolderFlags::DEL_MESSAGES
            )
        );

        // Hard deletion also purges an already soft-deleted folder.
        fixture
            .session
            .delete_folder(
                root,
                a_id,
                DeleteFolderFlags::HARD_DELETE
                    | DeleteFolderFlags::DEL_MESSAGES
                    | DeleteFolderFlags::DEL_FOLDERS,
            )
            .unwrap();
        assert_eq!(DeletionState::HardDeleted, fixture.folder_state(a_id));
        assert_eq!(DeletionState::HardDeleted, fixture.folder_state(sub_id));
        assert_eq!(DeletionState::HardDeleted, fixture.message_state(m));
    }

    #[test]
    fn delete_folder_checks_parent_and_root() {
        let mut fixture = TestFixture::new();
        let root = fixture.root_handle();
        let a = fixture.create(root, "A");
        let b = fixture.create(a, "B");
        let b_id = fixture.id_of(b);
        let root_id = fixture.root;

        assert_matches!(
            Err(Error::ObjectGone),
            fixture
                .session
                .delete_folder(root, b_id, DeleteFolderFlags::empty())
        );
        assert_matches!(
            Err(Error::ObjectTypeMismatch),
            fixture
                .session
                .delete_folder(root, root_id, DeleteFolderFlags::empty())
        );
        let logon = fixture.logon;
        assert_matches!(
            Err(Error::ObjectTypeMismatch),
            fixture
                .session
                .delete_folder(logon, b_id, DeleteFolderFlags::empty())
        );
    }

    #[test]
    fn move_and_copy_folders() {
        let mut fixture = TestFixture::new();
        let root = fixture.root_handle();
        let a = fixture.create(root, "A");
        let a_id = fixture.id_of(a);
        let b = fixture.create(root, "B");
        let child = fixture.create(a, "child");
        fixture.message(a, false, "one");
        fixture.message(a, true, "fai");
        fixture.message(child, false, "nested");

        let copy = fixture
            .session
            .copy_folder(
                root,
                b,
                CopyFolderRequest {
                    folder_id: a_id,
                    new_name: "A copy".to_owned(),
                    recursive: true,
                    want_asynchronous: true,
                },
            )
            .unwrap();
        assert_ne!(a_id, copy.folder_id);
        let copy_handle = fixture.open(copy.folder_id);
        let copy_info = fixture.session.folder_info(copy_handle).unwrap();
        assert_eq!(1, copy_info.content_count);
        assert_eq!(1, copy_info.associated_content_count);
        assert_eq!(1, copy_info.child_count);
        // The source is untouched.
        assert_eq!(1, fixture.contents(a));

        let moved = fixture
            .session
            .move_folder(
                root,
                b,
                MoveFolderRequest {
                    folder_id: a_id,
                    new_name: "A moved".to_owned(),
                    want_asynchronous: false,
                },
            )
            .unwrap();
        assert_eq!(a_id, moved.folder_id);
        assert_eq!(2, fixture.hierarchy(b));
        let info = fixture.session.folder_info(a).unwrap();
        assert_eq!("A moved", info.name);
        assert_eq!(Some(fixture.id_of(b)), info.parent_id);

        // Name clashes at the destination.
        let c = fixture.create(root, "C");
        let c_id = fixture.id_of(c);
        assert_matches!(
            Err(Error::DuplicateName),
            fixture.session.move_folder(
                root,
                b,
                MoveFolderRequest {
                    folder_id: c_id,
                    new_name: "a MOVED".to_owned(),
                    want_asynchronous: false,
                },
            )
        );
    }

    #[test]
    fn copy_without_subfolders() {
        let mut fixture = TestFixture::new();
        let root = fixture.root_handle();
        let a = fixture.create(root, "A");
        let a_id = fixture.id_of(a);
        let b = fixture.create(root, "B");
        let child = fixture.create(a, "child");
        fixture.message(a, false, "one");
        fixture.message(a, false, "two");
        fixture.message(a, true, "fai");
        fixture.message(child, false, "nested");

        let copy = fixture
            .session
            .copy_folder(
                root,
                b,
                CopyFolderRequest {
                    folder_id: a_id,
                    new_name: "flat".to_owned(),
                    recursive: false,
                    want_asynchronous: false,
                },
            )
            .unwrap();
        assert!(!copy.completion.is_partial());

        let copy_handle = fixture.open(copy.folder_id);
        let copy_info = fixture.session.folder_info(copy_handle).unwrap();
        assert_eq!(2, copy_info.content_count);
        assert_eq!(1, copy_info.associated_content_count);
        assert_eq!(0, copy_info.child_count);
        assert_eq!(0, fixture.hierarchy(copy_handle));
        assert_eq!(1, fixture.hierarchy(a));
    }

    #[test]
    fn member_folder_rights() {
        let mut fixture = TestFixture::new();
        let root = fixture.root_handle();
        let root_id = fixture.root;
        fixture.grant(root, "bob", MemberRights::FOLDER_VISIBLE);
        let shared = fixture.create(root, "shared");
        let shared_id = fixture.id_of(shared);
        fixture.grant(
            shared,
            "bob",
            MemberRights::FOLDER_VISIBLE
                | MemberRights::CREATE_SUBFOLDER
                | MemberRights::READ_ANY
                | MemberRights::CREATE
                | MemberRights::DELETE_OWNED,
        );
        let theirs = fixture.create(shared, "theirs");
        let theirs_id = fixture.id_of(theirs);
        fixture.grant(theirs, "bob", MemberRights::FOLDER_VISIBLE);
        fixture.message(theirs, false, "unreadable");
        let alices = fixture.message(shared, false, "alice's");

        let mut bob = fixture.delegate("bob");
        let bob_root = bob.open(root_id);
        let bob_shared = bob.open(shared_id);
        bob.message(bob_shared, "bob's");

        let denied = bob
            .session
            .create_folder(bob_root, CreateFolderRequest::generic("nope"));
        assert_matches!(Err(Error::AccessDenied), denied);
        assert_eq!(0x8007_0005, Error::AccessDenied.wire_code());

        let mine = bob
            .session
            .create_folder(bob_shared, CreateFolderRequest::generic("mine"))
            .unwrap();
        let dest = bob
            .session
            .create_folder(bob_shared, CreateFolderRequest::generic("dest"))
            .unwrap();
        bob.message(mine.handle, "inside");

        assert_matches!(
            Err(Error::AccessDenied),
            bob.session.delete_folder(
                bob_shared,
                theirs_id,
                DeleteFolderFlags::DEL_MESSAGES
            )
        );
        let completion = bob
            .session
            .delete_folder(
                bob_shared,
                mine.folder_id,
                DeleteFolderFlags::DEL_MESSAGES,
            )
            .unwrap();
        assert!(!completion.is_partial());
        assert_eq!(
            DeletionState::SoftDeleted,
            fixture.folder_state(mine.folder_id)
        );

        // Moving out a folder bob does not own leaves it in place.
        let moved = bob
            .session
            .move_folder(
                bob_shared,
                dest.handle,
                MoveFolderRequest {
                    folder_id: theirs_id,
                    new_name: "theirs".to_owned(),
                    want_asynchronous: false,
                },
            )
            .unwrap();
        assert_eq!(1, moved.completion.failed);
        assert_eq!(
            Some(shared_id),
            fixture.session.folder_info(theirs).unwrap().parent_id
        );

        // Copying skips the message bob cannot read.
        let copy = bob
            .session
            .copy_folder(
                bob_shared,
                dest.handle,
                CopyFolderRequest {
                    folder_id: theirs_id,
                    new_name: "copy".to_owned(),
                    recursive: true,
                    want_asynchronous: false,
                },
            )
            .unwrap();
        assert_eq!(1, copy.completion.failed);
        let copy_handle = fixture.open(copy.folder_id);
        let copy_info = fixture.session.folder_info(copy_handle).unwrap();
        assert_eq!(0, copy_info.content_count);
        assert_eq!(
            MemberRights::OWNER,
            fixture
                .session
                .store
                .lock()
                .rights(Some("bob"), copy.folder_id)
        );

        // alice's message and folder survive emptying; bob's go.
        let completion = bob.session.empty_folder(bob_shared, false).unwrap();
        assert_eq!(2, completion.failed);
        assert_eq!(DeletionState::Active, fixture.message_state(alices));
        assert_eq!(DeletionState::Active, fixture.folder_state(theirs_id));
        assert_eq!(
            DeletionState::SoftDeleted,
            fixture.folder_state(dest.folder_id)
        );
        assert_eq!(1, fixture.contents(shared));

        let completion = bob
            .session
            .hard_delete_messages_and_subfolders(bob_shared, false)
            .unwrap();
        assert_eq!(2, completion.failed);
        assert_eq!(DeletionState::Active, fixture.message_state(alices));
        assert_eq!(DeletionState::Active, fixture.folder_state(theirs_id));
        assert_eq!(
            DeletionState::HardDeleted,
            fixture.folder_state(mine.folder_id)
        );
    }

    #[test]
    fn folder_transfer_rejects_cycles() {
        let mut fixture = TestFixture::new();
        let root = fixture.root_handle();
        let a = fixture.create(root, "A");
        let a_id = fixture.id_of(a);
        let child = fixture.create(a, "child");
        let grandchild = fixture.create(child, "grandchild");

        for &dest in &[a, child, grandchild] {
            assert_matches!(
                Err(Error::DestinationInsideSource),
                fixture.session.move_folder(
                    root,
                    dest,
                    MoveFolderRequest {
                        folder_id: a_id,
                        new_name: "A".to_owned(),
                        want_asynchronous: false,
                    },
                )
            );
            assert_matches!(
                Err(Error::DestinationInsideSource),
                fixture.session.copy_folder(
                    root,
                    dest,
                    CopyFolderRequest {
                        folder_id: a_id,
                        new_name: "A".to_owned(),
                        recursive: true,
                        want_asynchronous: false,
                    },
                )
            );
        }

        let search = fixture.create_search(root, "S");
        assert_matches!(
            Err(Error::ObjectTypeMismatch),
            fixture.session.move_folder(
                root,
                search,
                MoveFolderRequest {
                    folder_id: a_id,
                    new_name: "A".to_owned(),
                    want_asynchronous: false,
                },
            )
        );
    }

    #[test]
    fn move_between_private_and_public_relabels() {
        let mut fixture = TestFixture::new();
        let root = fixture.root_handle();
        let a = fixture.create(root, "A");
        let a_id = fixture.id_of(a);

        let public = fixture.session.logon_public().unwrap();
        let public_root = fixture
            .session
            .open_folder(public.handle, public.root, OpenFolderFlags::empty())
            .unwrap()
            .handle;
        fixture
            .session
            .move_folder(
                root,
                public_root,
                MoveFolderRequest {
                    folder_id: a_id,
                    new_name: "A".to_owned(),
                    want_asynchronous: false,
                },
            )
            .unwrap();

        assert!(fixture.session.folder_info(a).unwrap().ghost.is_some());
    }

    #[test]
    fn empty_folder_policy_and_search_target() {
        let mut fixture = TestFixture::new();
        let root = fixture.root_handle();
        assert_matches!(
            Err(Error::ObjectTypeMismatch),
            fixture.session.empty_folder(root, false)
        );
        assert_matches!(
            Err(Error::ObjectTypeMismatch),
            fixture.session.hard_delete_messages_and_subfolders(root, true)
        );

        let search = fixture.create_search(root, "S");
        assert_matches!(
            Err(Error::ObjectTypeMismatch),
            fixture.session.empty_folder(search, true)
        );
        assert_matches!(
            Err(Error::ObjectTypeMismatch),
            fixture.session.hard_delete_messages_and_subfolders(search, false)
        );
        let logon = fixture.logon;
        assert_matches!(
            Err(Error::ObjectTypeMismatch),
            fixture.session.empty_folder(logon, false)
        );

        let mut config = SystemConfig::default();
        config.policy.empty_root_folder = RootFolderPolicy::Allow;
        let mut fixture = TestFixture::with_config(config);
        let root = fixture.root_handle();
        fixture.message(root, false, "m");
        fixture.session.empty_folder(root, false).unwrap();
        assert_eq!(0, fixture.contents(root));
        assert_eq!(0, fixture.hierarchy(root));
    }

    fn empty_scenario(
        normal: usize,
        associated: usize,
        subfolders: usize,
        include_associated: bool,
        hard: bool,
    ) {
        let mut fixture = TestFixture::new();
        let root = fixture.root_handle();
        let f = fixture.create(root, "F");

        let normal_ids = (0..normal)
            .map(|n| fixture.message(f, false, &format!("n{n}")))
            .collect::<Vec<_>>();
        let fai_ids = (0..associated)
            .map(|n| fixture.message(f, true, &format!("a{n}")))
            .collect::<Vec<_>>();
        let sub_ids = (0..subfolders)
            .map(|n| {
                let sub = fixture.create(f, &format!("sub{n}"));
                fixture.message(sub, false, "nested");
                fixture.id_of(sub)
            })
            .collect::<Vec<_>>();

        let result = if hard {
            fixture
                .session
                .hard_delete_messages_and_subfolders(f, include_associated)
        } else {
            fixture.session.empty_folder(f, include_associated)
        };
        let completion = result.unwrap();
        assert!(!completion.is_partial());

        let removed = if hard {
            DeletionState::HardDeleted
        } else {
            DeletionState::SoftDeleted
        };
        for &id in &normal_ids {
            assert_eq!(removed, fixture.message_state(id));
        }
        for &id in &fai_ids {
            assert_eq!(
                if include_associated {
                    removed
                } else {
                    DeletionState::Active
                },
                fixture.message_state(id)
            );
        }
        for &id in &sub_ids {
            assert_eq!(removed, fixture.folder_state(id));
        }

        assert_eq!(0, fixture.contents(f));
        assert_eq!(0, fixture.hierarchy(f));
        assert_eq!(
            if hard { 0 } else { normal as u32 },
            fixture.contents_with(f, ContentsTableFlags::SOFT_DELETES)
        );
        // The folder itself survives.
        assert_eq!(DeletionState::Active, fixture.folder_state(fixture.id_of(f)));
    }

    proptest! {
        #![proptest_config(ProptestConfig {
            cases: 32,
            ..ProptestConfig::default()
        })]

        #[test]
        fn empty_folder_scope(
            normal in 0usize..5,
            associated in 0usize..4,
            subfolders in 0usize..4,
            include_associated in any::<bool>(),
            hard in any::<bool>()
        ) {
            empty_scenario(
                normal,
                associated,
                subfolders,
                include_associated,
                hard,
            );
        }
    }
}
