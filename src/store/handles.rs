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

//! The per-session handle registry.
//!
//! Handles are indices into an arena of server objects. Each slot carries a
//! generation counter which is bumped whenever the slot is released, so a
//! handle kept past its release can never silently resolve to whatever
//! object later reuses the slot.

use std::fmt;

use super::model::*;
use crate::support::error::Error;

/// An opaque, session-scoped reference to a server object.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Handle {
    index: u32,
    generation: u32,
}

impl fmt::Display for Handle {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}.{}", self.index, self.generation)
    }
}

/// The kinds of object a handle can refer to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ObjectKind {
    Logon,
    Folder,
    Message,
    Table,
}

#[derive(Clone, Debug)]
pub(super) enum ServerObject {
    Logon(LogonObject),
    Folder(FolderId),
    Message(MessageObject),
    Table(TableObject),
}

impl ServerObject {
    pub(super) fn kind(&self) -> ObjectKind {
        match *self {
            ServerObject::Logon(..) => ObjectKind::Logon,
            ServerObject::Folder(..) => ObjectKind::Folder,
            ServerObject::Message(..) => ObjectKind::Message,
            ServerObject::Table(..) => ObjectKind::Table,
        }
    }
}

#[derive(Clone, Debug)]
pub(super) struct LogonObject {
    pub(super) store: StoreKind,
    pub(super) root: FolderId,
}

#[derive(Clone, Debug)]
pub(super) struct MessageObject {
    /// The folder the message was created in or opened from.
    pub(super) folder: FolderId,
    /// `None` until a new message is first saved.
    pub(super) id: Option<MessageId>,
    pub(super) associated: bool,
    /// Properties set through the handle but not yet saved.
    pub(super) pending: Properties,
}

#[derive(Clone, Copy, Debug)]
pub(super) struct TableObject {
    pub(super) folder: FolderId,
    pub(super) view: TableView,
}

#[derive(Clone, Copy, Debug)]
pub(super) enum TableView {
    Hierarchy(HierarchyTableFlags),
    Contents(ContentsTableFlags),
}

#[derive(Debug)]
struct Slot {
    generation: u32,
    object: Option<ServerObject>,
}

#[derive(Debug, Default)]
pub(super) struct HandleRegistry {
    slots: Vec<Slot>,
    free: Vec<u32>,
}

impl HandleRegistry {
    pub(super) fn open(&mut self, object: ServerObject) -> Handle {
        if let Some(index) = self.free.pop() {
            let slot = &mut self.slots[index as usize];
            slot.object = Some(object);
            Handle {
                index,
                generation: slot.generation,
            }
        } else {
            let index = self.slots.len() as u32;
            self.slots.push(Slot {
                generation: 0,
                object: Some(object),
            });
            Handle {
                index,
                generation: 0,
            }
        }
    }

    pub(super) fn release(
        &mut self,
        handle: Handle,
    ) -> Result<ServerObject, Error> {
        let slot = self.slot_mut(handle)?;
        let object = slot.object.take().ok_or(Error::StaleHandle)?;
        slot.generation = slot.generation.wrapping_add(1);
        self.free.push(handle.index);
        Ok(object)
    }

    pub(super) fn get(&self, handle: Handle) -> Result<&ServerObject, Error> {
        self.slots
            .get(handle.index as usize)
            .filter(|s| s.generation == handle.generation)
            .and_then(|s| s.object.as_ref())
            .ok_or(Error::StaleHandle)
    }

    pub(super) fn get_mut(
        &mut self,
        handle: Handle,
    ) -> Result<&mut ServerObject, Error> {
        self.slot_mut(handle)?
            .object
            .as_mut()
            .ok_or(Error::StaleHandle)
    }

    /// Resolve `handle`, requiring it to refer to an object of kind
    /// `expected`.
    pub(super) fn resolve(
        &self,
        handle: Handle,
        expected: ObjectKind,
    ) -> Result<&ServerObject, Error> {
        let object = self.get(handle)?;
        if object.kind() != expected {
            return Err(Error::ObjectTypeMismatch);
        }

        Ok(object)
    }

    /// The number of live handles.
    pub(super) fn len(&self) -> usize {
        self.slots.len() - self.free.len()
    }

    fn slot_mut(&mut self, handle: Handle) -> Result<&mut Slot, Error> {
        self.slots
            .get_mut(handle.index as usize)
            .filter(|s| s.generation == handle.generation)
            .ok_or(Error::StaleHandle)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn released_handles_go_stale() {
        let mut registry = HandleRegistry::default();
        let a = registry.open(ServerObject::Folder(FolderId(1)));
        let b = registry.open(ServerObject::Folder(FolderId(2)));
        assert_eq!(2, registry.len());

        assert_matches!(
            ServerObject::Folder(FolderId(1)),
            registry.release(a).unwrap()
        );
        assert_matches!(Err(Error::StaleHandle), registry.get(a));
        assert_matches!(Err(Error::StaleHandle), registry.release(a));

        // The slot is reused, but the old handle still does not resolve.
        let c = registry.open(ServerObject::Folder(FolderId(3)));
        assert_ne!(a, c);
        assert_matches!(Err(Error::StaleHandle), registry.get(a));
        assert_matches!(
            Ok(&ServerObject::Folder(FolderId(3))),
            registry.get(c)
        );
        assert_matches!(
            Ok(&ServerObject::Folder(FolderId(2))),
            registry.get(b)
        );
        assert_eq!(2, registry.len());
    }

    #[test]
    fn resolve_checks_kind() {
        let mut registry = HandleRegistry::default();
        let logon = registry.open(ServerObject::Logon(LogonObject {
            store: StoreKind::Public,
            root: FolderId(1),
        }));

        assert_matches!(
            Err(Error::ObjectTypeMismatch),
            registry.resolve(logon, ObjectKind::Folder)
        );
        assert_matches!(
            Ok(&ServerObject::Logon(..)),
            registry.resolve(logon, ObjectKind::Logon)
        );
    }
}
