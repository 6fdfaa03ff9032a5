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

//! The folder/message lifecycle engine of the mail object store.
//!
//! `Store` is the object tree shared by every session; `Session` is the
//! per-client entry point which owns a handle registry and performs the
//! folder, message, table and search operations.

mod folders;
mod handles;
mod messages;
pub mod model;
mod object_store;
pub mod permissions;
pub mod search;
mod session;
mod tables;

pub use handles::{Handle, ObjectKind};
pub use object_store::Store;
pub use session::Session;
