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

//! The shared folder tree and message ownership.
//!
//! `ObjectStore` is the ground truth for existence and deletion state. It
//! knows nothing about handles or sessions; the engines in the sibling
//! modules take the store lock once per operation and then use the
//! primitives here, so every operation is observed by other sessions either
//! fully or not at all.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::prelude::*;

use super::model::*;
use super::permissions::MemberRights;
use super::search::SearchState;
use crate::support::{error::Error, system_config::SystemConfig};

/// A handle on the object store shared by every session.
///
/// Clones share the same underlying store.
#[derive(Clone)]
pub struct Store {
    inner: Arc<Mutex<ObjectStore>>,
    config: Arc<SystemConfig>,
}

impl Store {
    /// Create a new, empty store.
    ///
    /// The public root trees named by the configuration are created
    /// immediately; private mailboxes are created on first logon.
    pub fn new(config: SystemConfig) -> Self {
        let mut objects = ObjectStore::new(
            config.store.server_name.clone(),
            MemberRights::from_bits_truncate(
                config.store.public_default_rights,
            ),
        );
        let mut public_roots = config.store.public_roots.clone();
        if public_roots.is_empty() {
            public_roots.push("IPM_SUBTREE".to_owned());
        }

        for name in public_roots {
            let id = objects.insert_folder(
                None,
                name.clone(),
                FolderKind::Generic,
                Some(StoreKind::Public),
            );
            objects.public_roots.push((name, id));
        }

        Store {
            inner: Arc::new(Mutex::new(objects)),
            config: Arc::new(config),
        }
    }

    pub fn config(&self) -> &SystemConfig {
        &self.config
    }

    /// Record the replication state of a public folder.
    ///
    /// This is the hook through which a replication collaborator reports
    /// ghosting; the store itself never changes it.
    pub fn set_replica_state(
        &self,
        folder_id: FolderId,
        state: ReplicaState,
    ) -> Result<(), Error> {
        let mut objects = self.lock();
        if !objects.store_of(folder_id)?.is_public() {
            return Err(Error::InvalidParameter);
        }

        objects.folder_mut(folder_id)?.replica = state;
        Ok(())
    }

    pub(super) fn lock(&self) -> MutexGuard<'_, ObjectStore> {
        // Every mutation runs to completion under the lock without calling
        // anything that can panic midway, so a poisoned store is still
        // consistent.
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[derive(Clone, Debug)]
pub(super) struct Folder {
    pub(super) id: FolderId,
    /// `None` only for root folders.
    pub(super) parent: Option<FolderId>,
    pub(super) name: String,
    pub(super) kind: FolderKind,
    pub(super) state: DeletionState,
    pub(super) replica: ReplicaState,
    /// For root folders, which store the tree belongs to.
    pub(super) root_of: Option<StoreKind>,
    /// Child folders in creation order, including soft-deleted ones.
    pub(super) children: Vec<FolderId>,
    /// Messages owned by this folder, including soft-deleted ones.
    pub(super) messages: BTreeSet<MessageId>,
    pub(super) properties: Properties,
    /// Rights granted to members other than the mailbox owner.
    pub(super) permissions: BTreeMap<String, MemberRights>,
    /// Present exactly for search folders.
    pub(super) search: Option<SearchState>,
    /// Number of messages ever deleted from this folder.
    pub(super) deleted_count_total: u32,
    pub(super) created: DateTime<Utc>,
    /// When the folder became SoftDeleted.
    pub(super) deleted_on: Option<DateTime<Utc>>,
}

#[derive(Clone, Debug)]
pub(super) struct Message {
    pub(super) id: MessageId,
    pub(super) folder: FolderId,
    pub(super) associated: bool,
    pub(super) state: DeletionState,
    pub(super) properties: Properties,
    pub(super) last_modified: DateTime<Utc>,
    /// The member who created the message, for the `*_OWNED` rights.
    pub(super) creator: Option<String>,
}

/// A private mailbox: its root and the well-known folders created with it.
#[derive(Clone, Debug)]
pub(super) struct PrivateMailbox {
    pub(super) root: FolderId,
    pub(super) special: Vec<(String, FolderId)>,
}

pub(super) struct ObjectStore {
    folders: HashMap<FolderId, Folder>,
    messages: HashMap<MessageId, Message>,
    next_folder_id: u64,
    next_message_id: u64,
    private_mailboxes: HashMap<String, PrivateMailbox>,
    pub(super) public_roots: Vec<(String, FolderId)>,
    pub(super) server_name: String,
    /// Rights on public folders for members with no applicable entry.
    pub(super) public_default_rights: MemberRights,
}

impl ObjectStore {
    fn new(server_name: String, public_default_rights: MemberRights) -> Self {
        ObjectStore {
            folders: HashMap::new(),
            messages: HashMap::new(),
            next_folder_id: 1,
            next_message_id: 1,
            private_mailboxes: HashMap::new(),
            public_roots: Vec::new(),
            server_name,
            public_default_rights,
        }
    }

    pub(super) fn existing_private_mailbox(
        &self,
        owner: &str,
    ) -> Option<PrivateMailbox> {
        self.private_mailboxes.get(owner).cloned()
    }

    /// Look up the private mailbox of `owner`, creating it with the given
    /// default folders if it does not exist yet.
    pub(super) fn private_mailbox(
        &mut self,
        owner: &str,
        default_folders: &[String],
    ) -> PrivateMailbox {
        if let Some(mailbox) = self.private_mailboxes.get(owner) {
            return mailbox.clone();
        }

        let root = self.insert_folder(
            None,
            "Top of Information Store".to_owned(),
            FolderKind::Generic,
            Some(StoreKind::Private {
                owner: owner.to_owned(),
            }),
        );
        let special = default_folders
            .iter()
            .map(|name| {
                let id = self.insert_folder(
                    Some(root),
                    name.clone(),
                    FolderKind::Generic,
                    None,
                );
                (name.clone(), id)
            })
            .collect();

        let mailbox = PrivateMailbox { root, special };
        self.private_mailboxes
            .insert(owner.to_owned(), mailbox.clone());
        mailbox
    }

    /// Whether `id` was ever allocated as a folder ID.
    fn folder_id_issued(&self, id: FolderId) -> bool {
        id.0 > 0 && id.0 < self.next_folder_id
    }

    pub(super) fn folder(&self, id: FolderId) -> Result<&Folder, Error> {
        self.folders.get(&id).ok_or(Error::ObjectGone)
    }

    pub(super) fn folder_mut(
        &mut self,
        id: FolderId,
    ) -> Result<&mut Folder, Error> {
        self.folders.get_mut(&id).ok_or(Error::ObjectGone)
    }

    /// Like `folder()`, but also fails with `ObjectGone` if the folder is
    /// soft-deleted.
    pub(super) fn active_folder(&self, id: FolderId) -> Result<&Folder, Error> {
        match self.folder(id)? {
            f if DeletionState::Active == f.state => Ok(f),
            _ => Err(Error::ObjectGone),
        }
    }

    pub(super) fn message(&self, id: MessageId) -> Result<&Message, Error> {
        self.messages.get(&id).ok_or(Error::ObjectGone)
    }

    pub(super) fn message_mut(
        &mut self,
        id: MessageId,
    ) -> Result<&mut Message, Error> {
        self.messages.get_mut(&id).ok_or(Error::ObjectGone)
    }

    /// The deletion state of a folder ID which may have been purged.
    pub(super) fn folder_state(&self, id: FolderId) -> Option<DeletionState> {
        match self.folders.get(&id) {
            Some(f) => Some(f.state),
            None if self.folder_id_issued(id) => {
                Some(DeletionState::HardDeleted)
            },
            None => None,
        }
    }

    /// The deletion state of a message ID which may have been purged.
    pub(super) fn message_state(&self, id: MessageId) -> Option<DeletionState> {
        match self.messages.get(&id) {
            Some(m) => Some(m.state),
            None if id.0 > 0 && id.0 < self.next_message_id => {
                Some(DeletionState::HardDeleted)
            },
            None => None,
        }
    }

    /// Find the Active child of `parent` named `name`, ignoring case.
    pub(super) fn find_child(
        &self,
        parent: FolderId,
        name: &str,
    ) -> Option<FolderId> {
        let parent = self.folders.get(&parent)?;
        let folded = name.to_lowercase();
        parent.children.iter().copied().find(|&child| {
            self.folders.get(&child).map_or(false, |c| {
                DeletionState::Active == c.state
                    && c.name.to_lowercase() == folded
            })
        })
    }

    /// Determine which store the tree containing `id` belongs to.
    pub(super) fn store_of(&self, mut id: FolderId) -> Result<StoreKind, Error> {
        loop {
            let folder = self.folder(id)?;
            match (folder.parent, &folder.root_of) {
                (Some(parent), _) => id = parent,
                (None, Some(kind)) => return Ok(kind.clone()),
                (None, None) => return Err(Error::ObjectGone),
            }
        }
    }

    pub(super) fn is_root(&self, id: FolderId) -> bool {
        self.folders.get(&id).map_or(false, |f| f.parent.is_none())
    }

    /// Whether `candidate` is `ancestor` or lies anywhere beneath it.
    pub(super) fn is_within(
        &self,
        ancestor: FolderId,
        mut candidate: FolderId,
    ) -> bool {
        loop {
            if ancestor == candidate {
                return true;
            }

            match self.folders.get(&candidate).and_then(|f| f.parent) {
                Some(parent) => candidate = parent,
                None => return false,
            }
        }
    }

    /// All folders strictly beneath `id`, in pre-order.
    pub(super) fn descendants(&self, id: FolderId) -> Vec<FolderId> {
        let mut out = Vec::new();
        let mut stack = vec![id];
        while let Some(next) = stack.pop() {
            if next != id {
                out.push(next);
            }
            if let Some(folder) = self.folders.get(&next) {
                stack.extend(folder.children.iter().rev().copied());
            }
        }
        out
    }

    /// Replica information for `id`, or `None` if it is not a public folder.
    pub(super) fn ghost_info(&self, id: FolderId) -> Option<GhostInfo> {
        if !self.store_of(id).ok()?.is_public() {
            return None;
        }

        Some(match self.folders.get(&id)?.replica {
            ReplicaState::Active => GhostInfo {
                is_ghosted: false,
                servers: vec![self.server_name.clone()],
            },
            ReplicaState::Ghosted { ref servers } => GhostInfo {
                is_ghosted: true,
                servers: servers.clone(),
            },
        })
    }

    pub(super) fn insert_folder(
        &mut self,
        parent: Option<FolderId>,
        name: String,
        kind: FolderKind,
        root_of: Option<StoreKind>,
    ) -> FolderId {
        let id = FolderId(self.next_folder_id);
        self.next_folder_id += 1;

        if let Some(parent) = parent.and_then(|p| self.folders.get_mut(&p)) {
            parent.children.push(id);
        }

        self.folders.insert(
            id,
            Folder {
                id,
                parent,
                name,
                kind,
                state: DeletionState::Active,
                replica: ReplicaState::Active,
                root_of,
                children: Vec::new(),
                messages: BTreeSet::new(),
                properties: Properties::new(),
                permissions: BTreeMap::new(),
                search: if FolderKind::Search == kind {
                    Some(SearchState::default())
                } else {
                    None
                },
                deleted_count_total: 0,
                created: Utc::now(),
                deleted_on: None,
            },
        );
        id
    }

    pub(super) fn insert_message(
        &mut self,
        folder: FolderId,
        associated: bool,
        properties: Properties,
        creator: Option<String>,
    ) -> Result<MessageId, Error> {
        let id = MessageId(self.next_message_id);
        self.folder_mut(folder)?.messages.insert(id);
        self.next_message_id += 1;

        self.messages.insert(
            id,
            Message {
                id,
                folder,
                associated,
                state: DeletionState::Active,
                properties,
                last_modified: Utc::now(),
                creator,
            },
        );
        Ok(id)
    }

    /// Transition an Active message to SoftDeleted.
    pub(super) fn soft_delete_message(
        &mut self,
        id: MessageId,
    ) -> Result<(), Error> {
        let message = self.message_mut(id)?;
        if DeletionState::Active != message.state {
            return Err(Error::ObjectGone);
        }

        message.state = DeletionState::SoftDeleted;
        message.last_modified = Utc::now();
        let folder = message.folder;
        self.folder_mut(folder)?.deleted_count_total += 1;
        Ok(())
    }

    /// Permanently remove a message, whether Active or SoftDeleted.
    pub(super) fn purge_message(&mut self, id: MessageId) -> Result<(), Error> {
        let message = self.messages.remove(&id).ok_or(Error::ObjectGone)?;
        if let Some(folder) = self.folders.get_mut(&message.folder) {
            folder.messages.remove(&id);
            if DeletionState::Active == message.state {
                folder.deleted_count_total += 1;
            }
        }
        Ok(())
    }

    /// Reassign ownership of a message to `dest`.
    ///
    /// Both folder sets are updated under the same lock, so no reader ever
    /// sees the message with zero or two owners.
    pub(super) fn transfer_message(
        &mut self,
        id: MessageId,
        dest: FolderId,
    ) -> Result<(), Error> {
        self.folder(dest)?;
        let message = self.message_mut(id)?;
        let source = message.folder;
        message.folder = dest;
        message.last_modified = Utc::now();

        if let Some(source) = self.folders.get_mut(&source) {
            source.messages.remove(&id);
        }
        self.folder_mut(dest)?.messages.insert(id);
        Ok(())
    }

    /// Create a copy of message `id` in `dest` with a fresh ID, created by
    /// `creator`.
    pub(super) fn duplicate_message(
        &mut self,
        id: MessageId,
        dest: FolderId,
        creator: Option<&str>,
    ) -> Result<MessageId, Error> {
        let message = self.message(id)?;
        let associated = message.associated;
        let properties = message.properties.clone();
        self.insert_message(
            dest,
            associated,
            properties,
            creator.map(str::to_owned),
        )
    }

    /// Mark `id` and every Active folder and message beneath it
    /// SoftDeleted.
    pub(super) fn soft_delete_subtree(&mut self, id: FolderId) {
        let mut folders = self.descendants(id);
        folders.push(id);
        let now = Utc::now();

        for folder_id in folders {
            let messages = match self.folders.get(&folder_id) {
                Some(f) => f.messages.iter().copied().collect::<Vec<_>>(),
                None => continue,
            };
            for message in messages {
                // Messages which are already soft-deleted stay that way.
                let _ = self.soft_delete_message(message);
            }

            if let Some(folder) = self.folders.get_mut(&folder_id) {
                if DeletionState::Active == folder.state {
                    folder.state = DeletionState::SoftDeleted;
                    folder.deleted_on = Some(now);
                }
            }
        }
    }

    /// Permanently remove `id` and everything beneath it.
    pub(super) fn purge_subtree(&mut self, id: FolderId) {
        let mut folders = self.descendants(id);
        folders.push(id);

        if let Some(parent) = self.folders.get(&id).and_then(|f| f.parent) {
            if let Some(parent) = self.folders.get_mut(&parent) {
                parent.children.retain(|&c| c != id);
            }
        }

        for folder_id in folders {
            if let Some(folder) = self.folders.remove(&folder_id) {
                for message in folder.messages {
                    self.messages.remove(&message);
                }
            }
        }
    }

    /// Move `id` to be a child of `new_parent` named `new_name`.
    ///
    /// The caller is responsible for rejecting cycles.
    pub(super) fn reparent(
        &mut self,
        id: FolderId,
        new_parent: FolderId,
        new_name: String,
    ) -> Result<(), Error> {
        self.folder(new_parent)?;
        let folder = self.folder_mut(id)?;
        let old_parent = folder.parent;
        folder.parent = Some(new_parent);
        folder.name = new_name;

        if let Some(old_parent) = old_parent.and_then(|p| self.folders.get_mut(&p))
        {
            old_parent.children.retain(|&c| c != id);
        }
        self.folder_mut(new_parent)?.children.push(id);
        Ok(())
    }

    /// Copy folder `id` into `dest` as `new_name`, on behalf of `user`.
    ///
    /// Active messages (normal and associated) which `user` can read are
    /// duplicated; if `recursive`, Active subfolders which `user` can see are
    /// copied too. Search folders keep their criteria. Every message or
    /// subfolder skipped for lack of rights counts as a failure in the
    /// returned completion.
    pub(super) fn duplicate_folder(
        &mut self,
        id: FolderId,
        dest: FolderId,
        new_name: String,
        recursive: bool,
        user: Option<&str>,
    ) -> Result<(FolderId, PartialCompletion), Error> {
        let mut completion = PartialCompletion::default();
        let source = self.folder(id)?;
        let kind = source.kind;
        let properties = source.properties.clone();
        let search = source.search.clone();
        let mut messages = Vec::new();
        for message in source
            .messages
            .iter()
            .filter_map(|m| self.messages.get(m))
            .filter(|m| DeletionState::Active == m.state)
        {
            if self.can_read_message(user, message) {
                messages.push(message.id);
            } else {
                completion.fail();
            }
        }
        let mut children = Vec::new();
        if recursive {
            for child in self.active_children(id) {
                if self
                    .rights(user, child.id)
                    .contains(MemberRights::FOLDER_VISIBLE)
                {
                    children.push((child.id, child.name.clone()));
                } else {
                    completion.fail();
                }
            }
        }

        self.folder(dest)?;
        let copy = self.insert_folder(Some(dest), new_name, kind, None);
        {
            let copy = self.folder_mut(copy)?;
            copy.properties = properties;
            copy.search = search;
        }
        self.grant_creator(user, copy);

        for message in messages {
            self.duplicate_message(message, copy, user)?;
        }

        for (child, name) in children {
            let (_, child_completion) =
                self.duplicate_folder(child, copy, name, true, user)?;
            completion.absorb(child_completion);
        }

        Ok((copy, completion))
    }

    /// Compute the read-only summary properties of a folder.
    pub(super) fn folder_info(&self, id: FolderId) -> Result<FolderInfo, Error> {
        let folder = self.folder(id)?;
        let mut content_count = 0u32;
        let mut associated_content_count = 0u32;
        let mut soft_deleted_count = 0u32;

        if FolderKind::Search == folder.kind {
            content_count = self.search_members(id).len() as u32;
        } else {
            for message in folder.messages.iter().filter_map(|m| self.messages.get(m)) {
                match (message.state, message.associated) {
                    (DeletionState::Active, false) => content_count += 1,
                    (DeletionState::Active, true) => {
                        associated_content_count += 1
                    },
                    (DeletionState::SoftDeleted, _) => soft_deleted_count += 1,
                    (DeletionState::HardDeleted, _) => (),
                }
            }
        }

        let child_count = self.active_children(id).count() as u32;

        Ok(FolderInfo {
            folder_id: id,
            parent_id: folder.parent,
            name: folder.name.clone(),
            kind: folder.kind,
            state: folder.state,
            content_count,
            associated_content_count,
            soft_deleted_count,
            deleted_count_total: folder.deleted_count_total,
            child_count,
            ghost: self.ghost_info(id),
            created: folder.created,
            deleted_on: folder.deleted_on,
        })
    }

    /// The direct children of `id` which are Active.
    pub(super) fn active_children(
        &self,
        id: FolderId,
    ) -> impl Iterator<Item = &Folder> + '_ {
        self.folders
            .get(&id)
            .into_iter()
            .flat_map(|f| f.children.iter())
            .filter_map(move |c| self.folders.get(c))
            .filter(|c| DeletionState::Active == c.state)
    }

    /// The messages owned by `id`, in ID order.
    pub(super) fn owned_messages(
        &self,
        id: FolderId,
    ) -> impl Iterator<Item = &Message> + '_ {
        self.folders
            .get(&id)
            .into_iter()
            .flat_map(|f| f.messages.iter())
            .filter_map(move |m| self.messages.get(m))
    }
}
