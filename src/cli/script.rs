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

//! Scripted sessions for the `run` subcommand.

use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::path::Path;

use serde::Deserialize;

use crate::store::model::*;
use crate::store::permissions::MemberRights;
use crate::store::search::Restriction;
use crate::store::{Handle, Session, Store};
use crate::support::error::{result_code, Error};
use crate::support::sysexits::*;
use crate::support::system_config::SystemConfig;

#[derive(Deserialize, Debug)]
struct Script {
    #[serde(default, rename = "step")]
    steps: Vec<Step>,
}

/// One operation of a script.
///
/// Fields naming handles, folders or messages refer to names bound by
/// earlier steps with `as`. A logon also binds each of its well-known
/// folders as `<name>.<folder>`, e.g. `alice.Inbox`.
#[derive(Deserialize, Debug)]
#[serde(tag = "op", rename_all = "kebab-case")]
enum Step {
    LogonPrivate {
        owner: String,
        #[serde(rename = "as")]
        bind: String,
    },
    LogonPublic {
        #[serde(rename = "as")]
        bind: String,
    },
    LogonDelegate {
        user: String,
        owner: String,
        #[serde(rename = "as")]
        bind: String,
    },
    OpenFolder {
        input: String,
        folder: String,
        #[serde(default)]
        soft_deleted: bool,
        #[serde(rename = "as")]
        bind: Option<String>,
    },
    CreateFolder {
        parent: String,
        name: String,
        #[serde(default = "generic_kind")]
        kind: u8,
        comment: Option<String>,
        #[serde(default)]
        open_existing: bool,
        #[serde(rename = "as")]
        bind: Option<String>,
    },
    DeleteFolder {
        parent: String,
        folder: String,
        #[serde(default)]
        flags: u8,
    },
    MoveFolder {
        source: String,
        dest: String,
        folder: String,
        new_name: String,
    },
    CopyFolder {
        source: String,
        dest: String,
        folder: String,
        new_name: String,
        #[serde(default)]
        recursive: bool,
        #[serde(rename = "as")]
        bind: Option<String>,
    },
    EmptyFolder {
        folder: String,
        #[serde(default)]
        associated: bool,
        #[serde(default)]
        hard: bool,
    },
    CreateMessage {
        folder: String,
        #[serde(default)]
        associated: bool,
        subject: Option<String>,
        #[serde(rename = "as")]
        bind: Option<String>,
    },
    MoveMessages {
        source: String,
        dest: String,
        messages: Vec<String>,
        #[serde(default)]
        copy: bool,
    },
    DeleteMessages {
        folder: String,
        messages: Vec<String>,
        #[serde(default)]
        hard: bool,
    },
    OpenMessage {
        input: String,
        folder: String,
        message: String,
        #[serde(default)]
        flags: u8,
    },
    HierarchyTable {
        folder: String,
        #[serde(default)]
        flags: u8,
    },
    ContentsTable {
        folder: String,
        #[serde(default)]
        flags: u8,
    },
    SetSearchCriteria {
        folder: String,
        restriction: Option<Restriction>,
        #[serde(default)]
        sources: Vec<String>,
        #[serde(default)]
        flags: u32,
    },
    GetSearchCriteria {
        folder: String,
    },
    FolderInfo {
        folder: String,
    },
    /// Omitting `rights` removes the member's entry.
    SetPermissions {
        folder: String,
        member: String,
        rights: Option<u32>,
    },
    GetPermissions {
        folder: String,
    },
    Release {
        handle: String,
    },
}

fn generic_kind() -> u8 {
    FolderKind::Generic as u8
}

impl Step {
    fn op(&self) -> &'static str {
        match *self {
            Step::LogonPrivate { .. } => "logon-private",
            Step::LogonPublic { .. } => "logon-public",
            Step::LogonDelegate { .. } => "logon-delegate",
            Step::OpenFolder { .. } => "open-folder",
            Step::CreateFolder { .. } => "create-folder",
            Step::DeleteFolder { .. } => "delete-folder",
            Step::MoveFolder { .. } => "move-folder",
            Step::CopyFolder { .. } => "copy-folder",
            Step::EmptyFolder { .. } => "empty-folder",
            Step::CreateMessage { .. } => "create-message",
            Step::MoveMessages { .. } => "move-messages",
            Step::DeleteMessages { .. } => "delete-messages",
            Step::OpenMessage { .. } => "open-message",
            Step::HierarchyTable { .. } => "hierarchy-table",
            Step::ContentsTable { .. } => "contents-table",
            Step::SetSearchCriteria { .. } => "set-search-criteria",
            Step::GetSearchCriteria { .. } => "get-search-criteria",
            Step::FolderInfo { .. } => "folder-info",
            Step::SetPermissions { .. } => "set-permissions",
            Step::GetPermissions { .. } => "get-permissions",
            Step::Release { .. } => "release",
        }
    }
}

/// A step referred to a name no earlier step bound.
#[derive(Debug, PartialEq, Eq)]
struct UnknownName(String);

/// The outcome of one step: its wire result code and a short description of
/// what it returned.
#[derive(Debug)]
struct Outcome {
    op: &'static str,
    code: u32,
    detail: String,
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{:<20} => 0x{:08x}", self.op, self.code)?;
        if !self.detail.is_empty() {
            write!(f, " {}", self.detail)?;
        }
        Ok(())
    }
}

pub(super) fn run(config: SystemConfig, path: &Path) {
    let text = match fs::read_to_string(path) {
        Ok(text) => text,
        Err(e) => {
            eprintln!("Error reading '{}': {}", path.display(), e);
            EX_NOINPUT.exit()
        },
    };

    let script: Script = match toml::from_str(&text) {
        Ok(script) => script,
        Err(e) => {
            eprintln!("Error in script '{}': {}", path.display(), e);
            EX_DATAERR.exit()
        },
    };

    let mut interpreter = Interpreter::new(Store::new(config));
    for (ix, step) in script.steps.into_iter().enumerate() {
        match interpreter.step(step) {
            Ok(outcome) => println!("{:3} {}", ix + 1, outcome),
            Err(UnknownName(name)) => {
                eprintln!("Step {}: nothing is bound to '{}'", ix + 1, name);
                EX_DATAERR.exit()
            },
        }
    }
}

struct Interpreter {
    session: Session,
    handles: HashMap<String, Handle>,
    folders: HashMap<String, FolderId>,
    messages: HashMap<String, MessageId>,
}

impl Interpreter {
    fn new(store: Store) -> Self {
        Interpreter {
            session: Session::new(store, "script".to_owned()),
            handles: HashMap::new(),
            folders: HashMap::new(),
            messages: HashMap::new(),
        }
    }

    fn handle(&self, name: &str) -> Result<Handle, UnknownName> {
        self.handles
            .get(name)
            .copied()
            .ok_or_else(|| UnknownName(name.to_owned()))
    }

    fn folder(&self, name: &str) -> Result<FolderId, UnknownName> {
        self.folders
            .get(name)
            .copied()
            .ok_or_else(|| UnknownName(name.to_owned()))
    }

    fn message(&self, name: &str) -> Result<MessageId, UnknownName> {
        self.messages
            .get(name)
            .copied()
            .ok_or_else(|| UnknownName(name.to_owned()))
    }

    fn message_list(
        &self,
        names: &[String],
    ) -> Result<Vec<MessageId>, UnknownName> {
        names.iter().map(|n| self.message(n)).collect()
    }

    fn bind_folder(&mut self, name: Option<String>, handle: Handle, id: FolderId) {
        if let Some(name) = name {
            self.handles.insert(name.clone(), handle);
            self.folders.insert(name, id);
        }
    }

    fn step(&mut self, step: Step) -> Result<Outcome, UnknownName> {
        let op = step.op();
        let result = self.execute(step)?;
        Ok(Outcome {
            op,
            code: result_code(&result),
            detail: result.unwrap_or_default(),
        })
    }

    /// Resolve the names in `step` and run it. The inner result is the
    /// result of the store operation.
    fn execute(
        &mut self,
        step: Step,
    ) -> Result<Result<String, Error>, UnknownName> {
        Ok(match step {
            Step::LogonPrivate { owner, bind } => {
                let result = self.session.logon_private(&owner);
                self.bind_logon(bind, result)
            },

            Step::LogonPublic { bind } => {
                let result = self.session.logon_public();
                self.bind_logon(bind, result)
            },

            Step::LogonDelegate { user, owner, bind } => {
                let result = self.session.logon_delegate(&user, &owner);
                self.bind_logon(bind, result)
            },

            Step::OpenFolder {
                input,
                folder,
                soft_deleted,
                bind,
            } => {
                let input = self.handle(&input)?;
                let folder_id = self.folder(&folder)?;
                let flags = if soft_deleted {
                    OpenFolderFlags::OPEN_SOFT_DELETED
                } else {
                    OpenFolderFlags::empty()
                };
                self.session
                    .open_folder(input, folder_id, flags)
                    .map(|r| {
                        self.bind_folder(bind, r.handle, folder_id);
                        ghost_detail(&r.ghost)
                    })
            },

            Step::CreateFolder {
                parent,
                name,
                kind,
                comment,
                open_existing,
                bind,
            } => {
                let parent = self.handle(&parent)?;
                FolderKind::from_wire(kind).and_then(|kind| {
                    let r = self.session.create_folder(
                        parent,
                        CreateFolderRequest {
                            kind,
                            name,
                            comment,
                            open_existing,
                        },
                    )?;
                    self.bind_folder(bind, r.handle, r.folder_id);
                    Ok(format!(
                        "folder={:?} existing={}{}",
                        r.folder_id,
                        r.is_existing,
                        ghost_detail(&r.ghost)
                    ))
                })
            },

            Step::DeleteFolder {
                parent,
                folder,
                flags,
            } => {
                let parent = self.handle(&parent)?;
                let folder = self.folder(&folder)?;
                let policy = self
                    .session
                    .store()
                    .config()
                    .policy
                    .invalid_delete_folder_flags;
                DeleteFolderFlags::from_wire(flags, policy)
                    .and_then(|flags| {
                        self.session.delete_folder(parent, folder, flags)
                    })
                    .map(completion_detail)
            },

            Step::MoveFolder {
                source,
                dest,
                folder,
                new_name,
            } => {
                let source = self.handle(&source)?;
                let dest = self.handle(&dest)?;
                let folder_id = self.folder(&folder)?;
                self.session
                    .move_folder(
                        source,
                        dest,
                        MoveFolderRequest {
                            folder_id,
                            new_name,
                            want_asynchronous: false,
                        },
                    )
                    .map(|r| completion_detail(r.completion))
            },

            Step::CopyFolder {
                source,
                dest,
                folder,
                new_name,
                recursive,
                bind,
            } => {
                let source = self.handle(&source)?;
                let dest = self.handle(&dest)?;
                let folder_id = self.folder(&folder)?;
                self.session
                    .copy_folder(
                        source,
                        dest,
                        CopyFolderRequest {
                            folder_id,
                            new_name,
                            recursive,
                            want_asynchronous: false,
                        },
                    )
                    .map(|r| {
                        if let Some(bind) = bind {
                            self.folders.insert(bind, r.folder_id);
                        }
                        format!("folder={:?}", r.folder_id)
                    })
            },

            Step::EmptyFolder {
                folder,
                associated,
                hard,
            } => {
                let folder = self.handle(&folder)?;
                let result = if hard {
                    self.session
                        .hard_delete_messages_and_subfolders(folder, associated)
                } else {
                    self.session.empty_folder(folder, associated)
                };
                result.map(completion_detail)
            },

            Step::CreateMessage {
                folder,
                associated,
                subject,
                bind,
            } => {
                let folder = self.handle(&folder)?;
                self.create_message(folder, associated, subject).map(|id| {
                    if let Some(bind) = bind {
                        self.messages.insert(bind, id);
                    }
                    format!("message={:?}", id)
                })
            },

            Step::MoveMessages {
                source,
                dest,
                messages,
                copy,
            } => {
                let source = self.handle(&source)?;
                let dest = self.handle(&dest)?;
                let message_ids = self.message_list(&messages)?;
                self.session
                    .move_copy_messages(
                        source,
                        dest,
                        MoveCopyMessagesRequest {
                            message_ids,
                            copy,
                            want_asynchronous: false,
                        },
                    )
                    .map(completion_detail)
            },

            Step::DeleteMessages {
                folder,
                messages,
                hard,
            } => {
                let folder = self.handle(&folder)?;
                let ids = self.message_list(&messages)?;
                let result = if hard {
                    self.session.hard_delete_messages(folder, &ids)
                } else {
                    self.session.delete_messages(folder, &ids)
                };
                result.map(completion_detail)
            },

            Step::OpenMessage {
                input,
                folder,
                message,
                flags,
            } => {
                let input = self.handle(&input)?;
                let folder = self.folder(&folder)?;
                let message = self.message(&message)?;
                let flags = OpenMessageFlags::from_bits_truncate(flags);
                self.session
                    .open_message(input, folder, message, flags)
                    .and_then(|h| self.session.release(h))
                    .map(|()| String::new())
            },

            Step::HierarchyTable { folder, flags } => {
                let folder = self.handle(&folder)?;
                HierarchyTableFlags::from_wire(flags)
                    .and_then(|flags| {
                        self.session.hierarchy_table(folder, flags)
                    })
                    .and_then(|t| self.release_table(t))
            },

            Step::ContentsTable { folder, flags } => {
                let folder = self.handle(&folder)?;
                ContentsTableFlags::from_wire(flags)
                    .and_then(|flags| self.session.contents_table(folder, flags))
                    .and_then(|t| self.release_table(t))
            },

            Step::SetSearchCriteria {
                folder,
                restriction,
                sources,
                flags,
            } => {
                let folder = self.handle(&folder)?;
                let folder_ids = sources
                    .iter()
                    .map(|s| self.folder(s))
                    .collect::<Result<Vec<_>, _>>()?;
                let policy =
                    self.session.store().config().policy.invalid_search_flags;
                SetSearchFlags::from_wire(flags, policy)
                    .and_then(|flags| {
                        self.session.set_search_criteria(
                            folder,
                            SetSearchCriteriaRequest {
                                restriction,
                                folder_ids,
                                flags,
                            },
                        )
                    })
                    .map(|()| String::new())
            },

            Step::GetSearchCriteria { folder } => {
                let folder = self.handle(&folder)?;
                self.session.get_search_criteria(folder).map(|r| {
                    format!(
                        "status=0x{:08x} sources={}",
                        r.status.bits(),
                        r.folder_ids.len()
                    )
                })
            },

            Step::FolderInfo { folder } => {
                let folder = self.handle(&folder)?;
                self.session.folder_info(folder).map(|i| {
                    format!(
                        "content={} associated={} soft-deleted={} \
                         deleted-total={} children={}",
                        i.content_count,
                        i.associated_content_count,
                        i.soft_deleted_count,
                        i.deleted_count_total,
                        i.child_count
                    )
                })
            },

            Step::SetPermissions {
                folder,
                member,
                rights,
            } => {
                let folder = self.handle(&folder)?;
                rights
                    .map(MemberRights::from_wire)
                    .transpose()
                    .and_then(|rights| {
                        self.session.modify_permissions(folder, &member, rights)
                    })
                    .map(|()| String::new())
            },

            Step::GetPermissions { folder } => {
                let folder = self.handle(&folder)?;
                self.session.get_permissions(folder).map(|entries| {
                    entries
                        .iter()
                        .map(|e| {
                            format!("{}=0x{:x}", e.member, e.rights.bits())
                        })
                        .collect::<Vec<_>>()
                        .join(" ")
                })
            },

            Step::Release { handle } => {
                let h = self.handle(&handle)?;
                self.session.release(h).map(|()| String::new())
            },
        })
    }

    fn bind_logon(
        &mut self,
        bind: String,
        result: Result<LogonResponse, Error>,
    ) -> Result<String, Error> {
        let logon = result?;
        self.handles.insert(bind.clone(), logon.handle);
        self.folders.insert(bind.clone(), logon.root);
        for (name, id) in &logon.special_folders {
            self.folders.insert(format!("{}.{}", bind, name), *id);
        }
        Ok(format!("root={:?}", logon.root))
    }

    fn create_message(
        &mut self,
        folder: Handle,
        associated: bool,
        subject: Option<String>,
    ) -> Result<MessageId, Error> {
        let draft = self.session.create_message(folder, associated)?;
        if let Some(subject) = subject {
            let mut properties = Properties::new();
            properties.insert(
                PROP_SUBJECT.to_owned(),
                PropertyValue::Text(subject),
            );
            self.session.set_properties(draft, properties)?;
        }
        let id = self.session.save_message(draft)?;
        self.session.release(draft)?;
        Ok(id)
    }

    fn release_table(&mut self, table: TableResponse) -> Result<String, Error> {
        self.session.release(table.handle)?;
        Ok(format!("rows={}", table.row_count))
    }
}

fn completion_detail(completion: PartialCompletion) -> String {
    if completion.is_partial() {
        format!("failed={}", completion.failed)
    } else {
        String::new()
    }
}

fn ghost_detail(ghost: &Option<GhostInfo>) -> String {
    match *ghost {
        None => String::new(),
        Some(ref ghost) => format!(
            " ghosted={} replicas={}",
            ghost.is_ghosted,
            ghost.servers.join(",")
        ),
    }
}
