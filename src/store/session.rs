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

//! Sessions, logons and the entry points shared by the engines.
//!
//! `Session` is the type through which every store operation is performed.
//! Its implementation is split across this module and its siblings
//! (`folders`, `messages`, `tables`, `search`); the split is purely for
//! manageability.

use log::info;

use super::handles::*;
use super::model::*;
use super::object_store::{ObjectStore, PrivateMailbox, Store};
use super::permissions::MemberRights;
use crate::support::{error::Error, log_prefix::LogPrefix, safe_name::*};

/// One client session against the shared store.
///
/// Each session has its own handle registry; all sessions of a `Store` see
/// the same folders and messages.
pub struct Session {
    pub(super) store: Store,
    pub(super) handles: HandleRegistry,
    pub(super) log_prefix: LogPrefix,
    /// The member the session acts as, set by private logons.
    pub(super) user: Option<String>,
}

impl Session {
    pub fn new(store: Store, name: String) -> Self {
        Session {
            store,
            handles: HandleRegistry::default(),
            log_prefix: LogPrefix::new(name),
            user: None,
        }
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    /// Log on to the private mailbox of `owner`, creating it if this is the
    /// first logon.
    pub fn logon_private(
        &mut self,
        owner: &str,
    ) -> Result<LogonResponse, Error> {
        if !is_safe_name(owner) {
            return Err(Error::InvalidParameter);
        }

        let mailbox = self.store.lock().private_mailbox(
            owner,
            &self.store.config().store.private_default_folders,
        );
        self.log_prefix.set_mailbox(owner.to_owned());
        info!("{} Logged on to private mailbox", self.log_prefix);
        Ok(self.finish_private_logon(owner, owner, mailbox))
    }

    /// Log on as `user` to the existing private mailbox of `owner`.
    ///
    /// What `user` can do there is governed by the rights `owner` has
    /// granted on each folder.
    pub fn logon_delegate(
        &mut self,
        user: &str,
        owner: &str,
    ) -> Result<LogonResponse, Error> {
        if !is_safe_name(user) || !is_safe_name(owner) {
            return Err(Error::InvalidParameter);
        }

        let mailbox = self
            .store
            .lock()
            .existing_private_mailbox(owner)
            .ok_or(Error::ObjectGone)?;
        self.log_prefix.set_mailbox(format!("{}@{}", user, owner));
        info!("{} Logged on as delegate", self.log_prefix);
        Ok(self.finish_private_logon(user, owner, mailbox))
    }

    fn finish_private_logon(
        &mut self,
        user: &str,
        owner: &str,
        mailbox: PrivateMailbox,
    ) -> LogonResponse {
        let special = {
            let objects = self.store.lock();
            mailbox
                .special
                .iter()
                .filter(|&&(_, id)| objects.active_folder(id).is_ok())
                .cloned()
                .collect::<Vec<_>>()
        };

        self.user = Some(user.to_owned());
        let handle = self.handles.open(ServerObject::Logon(LogonObject {
            store: StoreKind::Private {
                owner: owner.to_owned(),
            },
            root: mailbox.root,
        }));
        LogonResponse {
            handle,
            root: mailbox.root,
            special_folders: special,
        }
    }

    /// Log on to the public store.
    ///
    /// Every public root tree is returned; the first is the default root.
    pub fn logon_public(&mut self) -> Result<LogonResponse, Error> {
        let roots = self.store.lock().public_roots.clone();
        let root = roots.first().map(|&(_, id)| id).ok_or(Error::ObjectGone)?;

        self.log_prefix.set_mailbox("public".to_owned());
        info!("{} Logged on to public store", self.log_prefix);

        let handle = self.handles.open(ServerObject::Logon(LogonObject {
            store: StoreKind::Public,
            root,
        }));
        Ok(LogonResponse {
            handle,
            root,
            special_folders: roots,
        })
    }

    /// Release a handle of any kind.
    ///
    /// Releasing a message handle discards any unsaved properties.
    pub fn release(&mut self, handle: Handle) -> Result<(), Error> {
        self.handles.release(handle).map(|_| ())
    }

    /// Return the kind of object `handle` refers to.
    pub fn handle_kind(&self, handle: Handle) -> Result<ObjectKind, Error> {
        self.handles.get(handle).map(ServerObject::kind)
    }

    /// Compute the summary properties of the folder behind `handle`.
    pub fn folder_info(&self, handle: Handle) -> Result<FolderInfo, Error> {
        let folder = self.folder_handle(handle)?;
        self.store.lock().folder_info(folder)
    }

    /// Read the property bag of a folder or message.
    ///
    /// For messages, properties set through the handle but not yet saved
    /// are included.
    pub fn get_properties(&self, handle: Handle) -> Result<Properties, Error> {
        let objects = self.store.lock();
        match *self.handles.get(handle)? {
            ServerObject::Folder(id) => {
                let folder = objects.folder(id)?;
                let mut properties = folder.properties.clone();
                properties.insert(
                    PROP_DISPLAY_NAME.to_owned(),
                    PropertyValue::Text(folder.name.clone()),
                );
                Ok(properties)
            },
            ServerObject::Message(ref message) => {
                let mut properties = match message.id {
                    Some(id) => objects.message(id)?.properties.clone(),
                    None => Properties::new(),
                };
                properties.extend(
                    message
                        .pending
                        .iter()
                        .map(|(k, v)| (k.clone(), v.clone())),
                );
                Ok(properties)
            },
            _ => Err(Error::ObjectTypeMismatch),
        }
    }

    /// Update the property bag of a folder or message.
    ///
    /// Folder properties take effect immediately; setting the display name
    /// renames the folder. Changing a folder needs `FOLDER_OWNER`. Message
    /// properties are staged on the handle until `save_message`.
    pub fn set_properties(
        &mut self,
        handle: Handle,
        properties: Properties,
    ) -> Result<(), Error> {
        match *self.handles.get_mut(handle)? {
            ServerObject::Folder(id) => {
                let mut objects = self.store.lock();
                objects.require_rights(
                    self.user.as_deref(),
                    id,
                    MemberRights::FOLDER_OWNER,
                )?;
                set_folder_properties(&mut objects, id, properties)
            },
            ServerObject::Message(ref mut message) => {
                message.pending.extend(properties);
                Ok(())
            },
            _ => Err(Error::ObjectTypeMismatch),
        }
    }

    /// The member this session acts as, if it has logged on privately.
    pub(super) fn user(&self) -> Option<&str> {
        self.user.as_deref()
    }

    /// Resolve `handle` as a folder handle whose folder still exists.
    pub(super) fn folder_handle(
        &self,
        handle: Handle,
    ) -> Result<FolderId, Error> {
        match *self.handles.resolve(handle, ObjectKind::Folder)? {
            ServerObject::Folder(id) => Ok(id),
            _ => Err(Error::ObjectTypeMismatch),
        }
    }

    /// Resolve the input handle of an open operation, which may be either a
    /// logon or a folder. Returns the kind of store the handle is bound to.
    pub(super) fn open_input(
        &self,
        objects: &ObjectStore,
        handle: Handle,
    ) -> Result<StoreKind, Error> {
        match *self.handles.get(handle)? {
            ServerObject::Logon(ref logon) => Ok(logon.store.clone()),
            ServerObject::Folder(id) => objects.store_of(id),
            _ => Err(Error::ObjectTypeMismatch),
        }
    }
}

fn set_folder_properties(
    objects: &mut ObjectStore,
    id: FolderId,
    mut properties: Properties,
) -> Result<(), Error> {
    if let Some(name) = properties.remove(PROP_DISPLAY_NAME) {
        let name = name.as_text().ok_or(Error::InvalidParameter)?;
        if !is_valid_folder_name(name) {
            return Err(Error::InvalidParameter);
        }

        let folder = objects.folder(id)?;
        let parent = folder.parent.ok_or(Error::ObjectTypeMismatch)?;
        if objects
            .find_child(parent, name)
            .map_or(false, |existing| existing != id)
        {
            return Err(Error::DuplicateName);
        }

        objects.folder_mut(id)?.name = name.to_owned();
    }

    objects.folder_mut(id)?.properties.extend(properties);
    Ok(())
}

#[cfg(test)]
pub(super) struct TestFixture {
    pub(super) session: Session,
    pub(super) root: FolderId,
    pub(super) logon: Handle,
}

#[cfg(test)]
impl TestFixture {
    pub(super) fn new() -> Self {
        Self::with_config(crate::support::system_config::SystemConfig::default())
    }

    pub(super) fn with_config(
        config: crate::support::system_config::SystemConfig,
    ) -> Self {
        crate::init_test_log();

        let store = Store::new(config);
        let mut session = Session::new(store, "test".to_owned());
        let logon = session.logon_private("alice").unwrap();
        Self {
            session,
            root: logon.root,
            logon: logon.handle,
        }
    }

    /// Open a second session against the same store.
    pub(super) fn other_session(&self) -> Session {
        Session::new(self.session.store.clone(), "other".to_owned())
    }

    pub(super) fn open(&mut self, folder: FolderId) -> Handle {
        self.session
            .open_folder(self.logon, folder, OpenFolderFlags::empty())
            .unwrap()
            .handle
    }

    pub(super) fn root_handle(&mut self) -> Handle {
        let root = self.root;
        self.open(root)
    }

    pub(super) fn create(&mut self, parent: Handle, name: &str) -> Handle {
        self.session
            .create_folder(parent, CreateFolderRequest::generic(name))
            .unwrap()
            .handle
    }

    pub(super) fn create_search(
        &mut self,
        parent: Handle,
        name: &str,
    ) -> Handle {
        self.session
            .create_folder(
                parent,
                CreateFolderRequest {
                    kind: FolderKind::Search,
                    ..CreateFolderRequest::generic(name)
                },
            )
            .unwrap()
            .handle
    }

    pub(super) fn id_of(&self, folder: Handle) -> FolderId {
        self.session.folder_handle(folder).unwrap()
    }

    /// Create and save a message with the given subject.
    pub(super) fn message(
        &mut self,
        folder: Handle,
        associated: bool,
        subject: &str,
    ) -> MessageId {
        let draft = self.session.create_message(folder, associated).unwrap();
        let mut properties = Properties::new();
        properties.insert(PROP_SUBJECT.to_owned(), subject.into());
        self.session.set_properties(draft, properties).unwrap();
        let id = self.session.save_message(draft).unwrap();
        self.session.release(draft).unwrap();
        id
    }

    /// Count the rows of the default contents table of `folder`.
    pub(super) fn contents(&mut self, folder: Handle) -> u32 {
        self.contents_with(folder, ContentsTableFlags::empty())
    }

    pub(super) fn contents_with(
        &mut self,
        folder: Handle,
        flags: ContentsTableFlags,
    ) -> u32 {
        let table = self.session.contents_table(folder, flags).unwrap();
        self.session.release(table.handle).unwrap();
        table.row_count
    }

    pub(super) fn hierarchy(&mut self, folder: Handle) -> u32 {
        let table = self
            .session
            .hierarchy_table(folder, HierarchyTableFlags::empty())
            .unwrap();
        self.session.release(table.handle).unwrap();
        table.row_count
    }

    pub(super) fn message_state(&self, id: MessageId) -> DeletionState {
        self.session.store.lock().message_state(id).unwrap()
    }

    pub(super) fn folder_state(&self, id: FolderId) -> DeletionState {
        self.session.store.lock().folder_state(id).unwrap()
    }

    pub(super) fn grant(
        &mut self,
        folder: Handle,
        member: &str,
        rights: MemberRights,
    ) {
        self.session
            .modify_permissions(folder, member, Some(rights))
            .unwrap();
    }

    /// Open a session logged on as `user` to alice's mailbox.
    pub(super) fn delegate(&self, user: &str) -> Delegate {
        let mut session =
            Session::new(self.session.store.clone(), user.to_owned());
        let logon = session.logon_delegate(user, "alice").unwrap().handle;
        Delegate { session, logon }
    }
}

#[cfg(test)]
pub(super) struct Delegate {
    pub(super) session: Session,
    pub(super) logon: Handle,
}

#[cfg(test)]
impl Delegate {
    pub(super) fn open(&mut self, folder: FolderId) -> Handle {
        self.session
            .open_folder(self.logon, folder, OpenFolderFlags::empty())
            .unwrap()
            .handle
    }

    /// Create and save a message with the given subject.
    pub(super) fn message(
        &mut self,
        folder: Handle,
        subject: &str,
    ) -> MessageId {
        let draft = self.session.create_message(folder, false).unwrap();
        let mut properties = Properties::new();
        properties.insert(PROP_SUBJECT.to_owned(), subject.into());
        self.session.set_properties(draft, properties).unwrap();
        let id = self.session.save_message(draft).unwrap();
        self.session.release(draft).unwrap();
        id
    }
}

#[cfg(test)]
mod test {
    use rayon::prelude::*;

    use super::*;
    use crate::support::system_config::SystemConfig;

    #[test]
    fn private_logon_provisions_once() {
        let mut fixture = TestFixture::new();
        let first = fixture.session.logon_private("alice").unwrap();
        assert_eq!(fixture.root, first.root);
        assert_eq!(
            vec!["Inbox", "Outbox", "Sent Items", "Deleted Items"],
            first
                .special_folders
                .iter()
                .map(|(name, _)| name.as_str())
                .collect::<Vec<_>>()
        );

        let mut other = fixture.other_session();
        let second = other.logon_private("alice").unwrap();
        assert_eq!(first.root, second.root);
        assert_eq!(first.special_folders, second.special_folders);

        let bob = other.logon_private("bob").unwrap();
        assert_ne!(first.root, bob.root);

        assert_matches!(
            Err(Error::InvalidParameter),
            other.logon_private("../etc")
        );
    }

    #[test]
    fn public_logon_returns_every_root() {
        let fixture = TestFixture::new();
        let mut session = fixture.other_session();
        let logon = session.logon_public().unwrap();
        assert_eq!(2, logon.special_folders.len());
        assert_eq!("IPM_SUBTREE", logon.special_folders[0].0);
        assert_eq!(logon.root, logon.special_folders[0].1);
        assert_ne!(logon.special_folders[0].1, logon.special_folders[1].1);
    }

    #[test]
    fn released_handle_is_stale() {
        let mut fixture = TestFixture::new();
        let root = fixture.root_handle();
        fixture.session.release(root).unwrap();

        assert_matches!(
            Err(Error::StaleHandle),
            fixture.session.folder_info(root)
        );
        assert_eq!(
            0x000004B9,
            crate::support::error::result_code(
                &fixture.session.folder_info(root)
            )
        );
    }

    #[test]
    fn properties_on_folders_and_messages() {
        let mut fixture = TestFixture::new();
        let root = fixture.root_handle();
        let a = fixture.create(root, "A");
        fixture.create(root, "B");

        let mut properties = Properties::new();
        properties.insert(PROP_COMMENT.to_owned(), "notes".into());
        properties.insert(PROP_DISPLAY_NAME.to_owned(), "A2".into());
        fixture.session.set_properties(a, properties).unwrap();

        let read = fixture.session.get_properties(a).unwrap();
        assert_eq!(Some(&"notes".into()), read.get(PROP_COMMENT));
        assert_eq!(Some(&"A2".into()), read.get(PROP_DISPLAY_NAME));

        let mut rename = Properties::new();
        rename.insert(PROP_DISPLAY_NAME.to_owned(), "b".into());
        assert_matches!(
            Err(Error::DuplicateName),
            fixture.session.set_properties(a, rename)
        );

        let draft = fixture.session.create_message(a, false).unwrap();
        let mut subject = Properties::new();
        subject.insert(PROP_SUBJECT.to_owned(), "hello".into());
        fixture.session.set_properties(draft, subject).unwrap();
        assert_eq!(
            Some(&"hello".into()),
            fixture
                .session
                .get_properties(draft)
                .unwrap()
                .get(PROP_SUBJECT)
        );
        // Unsaved drafts do not exist yet.
        assert_eq!(0, fixture.contents(a));

        let logon = fixture.logon;
        assert_matches!(
            Err(Error::ObjectTypeMismatch),
            fixture.session.get_properties(logon)
        );
    }

    #[test]
    fn folder_info_counts() {
        let mut fixture = TestFixture::new();
        let root = fixture.root_handle();
        let a = fixture.create(root, "A");
        fixture.create(a, "child");
        let m1 = fixture.message(a, false, "one");
        fixture.message(a, false, "two");
        fixture.message(a, true, "fai");
        fixture.session.delete_messages(a, &[m1]).unwrap();

        let info = fixture.session.folder_info(a).unwrap();
        assert_eq!("A", info.name);
        assert_eq!(Some(fixture.root), info.parent_id);
        assert_eq!(FolderKind::Generic, info.kind);
        assert_eq!(1, info.content_count);
        assert_eq!(1, info.associated_content_count);
        assert_eq!(1, info.soft_deleted_count);
        assert_eq!(1, info.deleted_count_total);
        assert_eq!(1, info.child_count);
        assert_eq!(None, info.ghost);

        let logon = fixture.logon;
        assert_matches!(
            Err(Error::ObjectTypeMismatch),
            fixture.session.folder_info(logon)
        );
    }

    #[test]
    fn concurrent_sessions_share_one_store() {
        let fixture = TestFixture::new();
        let store = fixture.session.store.clone();

        (0..8).into_par_iter().for_each(|n| {
            let mut session =
                Session::new(store.clone(), format!("worker{n}"));
            let logon = session.logon_private("alice").unwrap();
            let inbox = logon.special_folders[0].1;
            let inbox = session
                .open_folder(logon.handle, inbox, OpenFolderFlags::empty())
                .unwrap()
                .handle;

            for _ in 0..10 {
                let draft = session.create_message(inbox, false).unwrap();
                session.save_message(draft).unwrap();
                session.release(draft).unwrap();
            }
        });

        let mut session = Session::new(store, "check".to_owned());
        let logon = session.logon_private("alice").unwrap();
        let inbox = session
            .open_folder(
                logon.handle,
                logon.special_folders[0].1,
                OpenFolderFlags::empty(),
            )
            .unwrap()
            .handle;
        assert_eq!(80, session.folder_info(inbox).unwrap().content_count);
    }

    #[test]
    fn empty_public_root_config_still_has_a_root() {
        let mut config = SystemConfig::default();
        config.store.public_roots.clear();
        let fixture = TestFixture::with_config(config);
        let mut session = fixture.other_session();
        let logon = session.logon_public().unwrap();
        assert_eq!(1, logon.special_folders.len());
    }

    #[test]
    fn delegate_logon_needs_existing_mailbox() {
        let mut fixture = TestFixture::new();
        let mut session = fixture.other_session();
        assert_matches!(
            Err(Error::ObjectGone),
            session.logon_delegate("bob", "carol")
        );
        assert_matches!(
            Err(Error::InvalidParameter),
            session.logon_delegate("../bob", "alice")
        );

        let logon = session.logon_delegate("bob", "alice").unwrap();
        assert_eq!(fixture.root, logon.root);
        assert_eq!(Some("bob"), session.user());

        // Without any rights, bob cannot even see alice's folders.
        assert_matches!(
            Err(Error::AccessDenied),
            session.open_folder(
                logon.handle,
                fixture.root,
                OpenFolderFlags::empty()
            )
        );

        let root = fixture.root_handle();
        fixture.grant(root, "bob", MemberRights::FOLDER_VISIBLE);
        let bob_root = session
            .open_folder(logon.handle, fixture.root, OpenFolderFlags::empty())
            .unwrap()
            .handle;

        let mut properties = Properties::new();
        properties.insert(PROP_COMMENT.to_owned(), "bob was here".into());
        assert_matches!(
            Err(Error::AccessDenied),
            session.set_properties(bob_root, properties)
        );
    }
}
