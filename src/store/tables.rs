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

//! Hierarchy and contents tables.
//!
//! A table handle only remembers which folder and view it was created for.
//! Rows are recomputed from the store on every query, so a query issued
//! after a mutation always reflects it.

use log::debug;

use super::handles::*;
use super::model::*;
use super::object_store::{Message, ObjectStore};
use super::permissions::MemberRights;
use super::session::Session;
use crate::support::error::Error;

impl Session {
    /// `RopGetHierarchyTable` on the folder behind `folder`.
    ///
    /// Needs `FOLDER_VISIBLE` on the folder.
    pub fn hierarchy_table(
        &mut self,
        folder: Handle,
        flags: HierarchyTableFlags,
    ) -> Result<TableResponse, Error> {
        self.open_table(folder, TableView::Hierarchy(flags))
    }

    /// `RopGetContentsTable` on the folder behind `folder`.
    ///
    /// Needs `READ_ANY` on the folder.
    pub fn contents_table(
        &mut self,
        folder: Handle,
        flags: ContentsTableFlags,
    ) -> Result<TableResponse, Error> {
        self.open_table(folder, TableView::Contents(flags))
    }

    fn open_table(
        &mut self,
        folder: Handle,
        view: TableView,
    ) -> Result<TableResponse, Error> {
        let folder = self.folder_handle(folder)?;
        let row_count = {
            let objects = self.store.lock();
            objects.folder(folder)?;
            let needed = match view {
                TableView::Hierarchy(_) => MemberRights::FOLDER_VISIBLE,
                TableView::Contents(_) => MemberRights::READ_ANY,
            };
            objects.require_rights(self.user(), folder, needed)?;
            match view {
                TableView::Hierarchy(flags) => {
                    hierarchy_rows(&objects, folder, flags).len()
                },
                TableView::Contents(flags) => {
                    contents_rows(&objects, folder, flags).len()
                },
            }
        } as u32;

        debug!(
            "{} Opened {:?} table on {:?} with {} rows",
            self.log_prefix, view, folder, row_count
        );
        let handle =
            self.handles.open(ServerObject::Table(TableObject { folder, view }));
        Ok(TableResponse { handle, row_count })
    }

    /// Read the current rows of a hierarchy table.
    pub fn query_hierarchy_rows(
        &self,
        table: Handle,
    ) -> Result<Vec<HierarchyRow>, Error> {
        match self.table(table)? {
            TableObject {
                folder,
                view: TableView::Hierarchy(flags),
            } => {
                let objects = self.store.lock();
                objects.folder(folder)?;
                Ok(hierarchy_rows(&objects, folder, flags))
            },
            _ => Err(Error::ObjectTypeMismatch),
        }
    }

    /// Read the current rows of a contents table.
    pub fn query_contents_rows(
        &self,
        table: Handle,
    ) -> Result<Vec<ContentsRow>, Error> {
        match self.table(table)? {
            TableObject {
                folder,
                view: TableView::Contents(flags),
            } => {
                let objects = self.store.lock();
                objects.folder(folder)?;
                Ok(contents_rows(&objects, folder, flags))
            },
            _ => Err(Error::ObjectTypeMismatch),
        }
    }

    fn table(&self, handle: Handle) -> Result<TableObject, Error> {
        match *self.handles.resolve(handle, ObjectKind::Table)? {
            ServerObject::Table(table) => Ok(table),
            _ => Err(Error::ObjectTypeMismatch),
        }
    }
}

/// Enumerate the subfolders of `root`.
///
/// The default view is the Active direct children. `DEPTH` descends
/// through Active folders. `SOFT_DELETES` returns exactly the SoftDeleted
/// folders instead; with `DEPTH` it descends through every folder to find
/// them.
fn hierarchy_rows(
    objects: &ObjectStore,
    root: FolderId,
    flags: HierarchyTableFlags,
) -> Vec<HierarchyRow> {
    let soft_deletes = flags.contains(HierarchyTableFlags::SOFT_DELETES);
    let wanted = if soft_deletes {
        DeletionState::SoftDeleted
    } else {
        DeletionState::Active
    };

    let mut rows = Vec::new();
    let mut stack = vec![(root, 0u32)];
    while let Some((id, depth)) = stack.pop() {
        let folder = match objects.folder(id) {
            Ok(f) => f,
            Err(_) => continue,
        };

        if id != root && folder.state == wanted {
            let info = objects.folder_info(id);
            rows.push(HierarchyRow {
                folder_id: id,
                parent_id: folder.parent.unwrap_or(root),
                name: folder.name.clone(),
                kind: folder.kind,
                state: folder.state,
                depth,
                content_count: info.as_ref().map_or(0, |i| i.content_count),
                child_count: info.as_ref().map_or(0, |i| i.child_count),
                deleted_on: folder.deleted_on,
            });
        }

        let descend = id == root
            || (flags.contains(HierarchyTableFlags::DEPTH)
                && (soft_deletes || DeletionState::Active == folder.state));
        if descend {
            for &child in folder.children.iter().rev() {
                stack.push((child, depth + 1));
            }
        }
    }

    rows
}

/// Enumerate the messages visible through `folder`.
///
/// The default view is Active, non-associated messages. `SOFT_DELETES`
/// switches to the SoftDeleted messages; `ASSOCIATED` adds associated
/// messages to either view. Rows of search folders come from their source
/// folders.
fn contents_rows(
    objects: &ObjectStore,
    folder: FolderId,
    flags: ContentsTableFlags,
) -> Vec<ContentsRow> {
    let is_search = objects
        .folder(folder)
        .map_or(false, |f| FolderKind::Search == f.kind);
    let wanted = if flags.contains(ContentsTableFlags::SOFT_DELETES) {
        DeletionState::SoftDeleted
    } else {
        DeletionState::Active
    };
    let include_associated = flags.contains(ContentsTableFlags::ASSOCIATED);

    let messages: Box<dyn Iterator<Item = &Message> + '_> = if is_search {
        Box::new(
            objects
                .search_members(folder)
                .into_iter()
                .filter_map(move |id| objects.message(id).ok()),
        )
    } else {
        Box::new(objects.owned_messages(folder))
    };

    messages
        .filter(|m| m.state == wanted)
        .filter(|m| include_associated || !m.associated)
        .map(|m| ContentsRow {
            folder_id: m.folder,
            message_id: m.id,
            associated: m.associated,
            state: m.state,
            properties: m.properties.clone(),
            last_modified: m.last_modified,
        })
        .collect()
}
