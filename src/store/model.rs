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

//! Identifiers, flag sets, and the request/response types of the store
//! engines.

use std::collections::BTreeMap;
use std::fmt;

use bitflags::bitflags;
use chrono::prelude::*;
use serde::{Deserialize, Serialize};
use serde_repr::{Deserialize_repr, Serialize_repr};

use super::handles::Handle;
use super::search::Restriction;
use crate::support::{error::Error, system_config::InvalidFlagsPolicy};

/// Identifies a folder within a store.
///
/// Folder IDs are allocated sequentially from 1 and never reused, even
/// after the folder they named has been hard-deleted.
#[derive(
    Deserialize, Serialize, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash,
)]
#[serde(transparent)]
pub struct FolderId(pub u64);

impl fmt::Debug for FolderId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "FolderId({})", self.0)
    }
}

/// Identifies a message within a store.
///
/// Like `FolderId`, never reused. A message keeps its ID when it is moved
/// to another folder; a copy gets a fresh one.
#[derive(
    Deserialize, Serialize, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash,
)]
#[serde(transparent)]
pub struct MessageId(pub u64);

impl fmt::Debug for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "MessageId({})", self.0)
    }
}

/// The `FolderType` of a folder, with its wire values.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize_repr, Deserialize_repr,
)]
#[repr(u8)]
pub enum FolderKind {
    Generic = 1,
    Search = 2,
}

impl FolderKind {
    pub fn from_wire(raw: u8) -> Result<Self, Error> {
        match raw {
            1 => Ok(FolderKind::Generic),
            2 => Ok(FolderKind::Search),
            _ => Err(Error::InvalidParameter),
        }
    }
}

/// Deletion state shared by folders and messages.
///
/// The only transitions are `Active -> SoftDeleted -> HardDeleted` and
/// `Active -> HardDeleted`. Hard-deleted objects are purged from the store;
/// the state is only ever reported for IDs which were once allocated.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DeletionState {
    Active,
    SoftDeleted,
    HardDeleted,
}

/// Which kind of mailbox a logon or folder belongs to.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum StoreKind {
    Private { owner: String },
    Public,
}

impl StoreKind {
    pub fn is_public(&self) -> bool {
        StoreKind::Public == *self
    }
}

impl fmt::Display for StoreKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            StoreKind::Private { ref owner } => write!(f, "private:{owner}"),
            StoreKind::Public => write!(f, "public"),
        }
    }
}

/// Replication state of a public folder.
///
/// Replication itself happens elsewhere; the store only records what a
/// replication collaborator tells it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ReplicaState {
    /// This server holds an active replica.
    Active,
    /// Only the listed servers hold replicas of the content.
    Ghosted { servers: Vec<String> },
}

/// Replica information returned for public folders.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GhostInfo {
    pub is_ghosted: bool,
    /// Servers holding a replica, cheapest first.
    pub servers: Vec<String>,
}

impl GhostInfo {
    pub fn replica_count(&self) -> usize {
        self.servers.len()
    }
}

/// A single value in an object's property bag.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PropertyValue {
    Bool(bool),
    Integer(i64),
    Text(String),
}

impl PropertyValue {
    pub fn as_text(&self) -> Option<&str> {
        match *self {
            PropertyValue::Text(ref s) => Some(s),
            _ => None,
        }
    }
}

impl From<&str> for PropertyValue {
    fn from(s: &str) -> Self {
        PropertyValue::Text(s.to_owned())
    }
}

impl From<i64> for PropertyValue {
    fn from(i: i64) -> Self {
        PropertyValue::Integer(i)
    }
}

impl From<bool> for PropertyValue {
    fn from(b: bool) -> Self {
        PropertyValue::Bool(b)
    }
}

/// The opaque per-object property bag, keyed by property name.
pub type Properties = BTreeMap<String, PropertyValue>;

pub const PROP_DISPLAY_NAME: &str = "DisplayName";
pub const PROP_COMMENT: &str = "Comment";
pub const PROP_SUBJECT: &str = "Subject";

/// Decode raw wire flags, applying `policy` to undefined bits.
macro_rules! decode_with_policy {
    ($t:ident, $raw:expr, $policy:expr) => {
        match $policy {
            InvalidFlagsPolicy::Ignore => Ok($t::from_bits_truncate($raw)),
            InvalidFlagsPolicy::Reject => {
                $t::from_bits($raw).ok_or(Error::InvalidParameter)
            }
        }
    };
}

bitflags! {
    /// `DeleteFolderFlags` from `RopDeleteFolder`.
    #[derive(Default)]
    pub struct DeleteFolderFlags: u8 {
        const DEL_MESSAGES = 0x01;
        const DEL_FOLDERS = 0x04;
        const HARD_DELETE = 0x10;
    }
}

impl DeleteFolderFlags {
    pub fn from_wire(
        raw: u8,
        policy: InvalidFlagsPolicy,
    ) -> Result<Self, Error> {
        decode_with_policy!(DeleteFolderFlags, raw, policy)
    }
}

bitflags! {
    /// `OpenModeFlags` from `RopOpenFolder`.
    #[derive(Default)]
    pub struct OpenFolderFlags: u8 {
        const OPEN_SOFT_DELETED = 0x04;
    }
}

bitflags! {
    /// `OpenModeFlags` from `RopOpenMessage`.
    ///
    /// Read-only access is the absence of any bit.
    #[derive(Default)]
    pub struct OpenMessageFlags: u8 {
        const READ_WRITE = 0x01;
        const BEST_ACCESS = 0x03;
        const OPEN_SOFT_DELETED = 0x04;
    }
}

bitflags! {
    /// `TableFlags` from `RopGetHierarchyTable`.
    #[derive(Default)]
    pub struct HierarchyTableFlags: u8 {
        const DEPTH = 0x04;
        const DEFERRED_ERRORS = 0x08;
        const NO_NOTIFICATIONS = 0x10;
        const SOFT_DELETES = 0x20;
        const USE_UNICODE = 0x40;
        const SUPPRESS_NOTIFICATIONS = 0x80;
    }
}

impl HierarchyTableFlags {
    /// Servers fail undefined hierarchy table bits with `ecNotSupported`
    /// rather than `ecInvalidParam`.
    pub fn from_wire(raw: u8) -> Result<Self, Error> {
        Self::from_bits(raw).ok_or(Error::ObjectTypeMismatch)
    }
}

bitflags! {
    /// `TableFlags` from `RopGetContentsTable`.
    #[derive(Default)]
    pub struct ContentsTableFlags: u8 {
        const ASSOCIATED = 0x02;
        const DEFERRED_ERRORS = 0x08;
        const NO_NOTIFICATIONS = 0x10;
        const SOFT_DELETES = 0x20;
        const USE_UNICODE = 0x40;
        const CONVERSATION_MEMBERS = 0x80;
    }
}

impl ContentsTableFlags {
    pub fn from_wire(raw: u8) -> Result<Self, Error> {
        Self::from_bits(raw).ok_or(Error::InvalidParameter)
    }
}

bitflags! {
    /// `SearchFlags` from `RopSetSearchCriteria`.
    #[derive(Default)]
    pub struct SetSearchFlags: u32 {
        const STOP = 0x0000_0001;
        const RESTART = 0x0000_0002;
        const RECURSIVE = 0x0000_0004;
        const SHALLOW = 0x0000_0008;
        const FOREGROUND = 0x0000_0010;
        const BACKGROUND = 0x0000_0020;
        const CONTENT_INDEXED = 0x0001_0000;
        const NON_CONTENT_INDEXED = 0x0002_0000;
        const STATIC = 0x0004_0000;
    }
}

impl SetSearchFlags {
    pub fn from_wire(
        raw: u32,
        policy: InvalidFlagsPolicy,
    ) -> Result<Self, Error> {
        decode_with_policy!(SetSearchFlags, raw, policy)
    }
}

bitflags! {
    /// `SearchFlags` returned by `RopGetSearchCriteria`.
    #[derive(Default)]
    pub struct SearchStatus: u32 {
        const RUNNING = 0x0000_0001;
        const REBUILD = 0x0000_0002;
        const RECURSIVE = 0x0000_0004;
        const FOREGROUND = 0x0000_0008;
        const COMPLETE = 0x0000_1000;
        const PARTIAL = 0x0000_2000;
        const STATIC = 0x0001_0000;
        const MAYBE_STATIC = 0x0002_0000;
        const CI_TOTALLY = 0x0100_0000;
        const CI_WITH_TWIR_RESIDUAL = 0x0200_0000;
        const TWIR_MOSTLY = 0x0400_0000;
        const TWIR_TOTALLY = 0x0800_0000;
    }
}

/// Per-target outcome of a multi-target operation.
///
/// The operation as a whole succeeded; `failed` counts the targets which
/// could not be processed. This is the `PartialCompletion` field of the
/// corresponding responses.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PartialCompletion {
    pub failed: u32,
}

impl PartialCompletion {
    pub fn is_partial(&self) -> bool {
        0 != self.failed
    }

    pub(super) fn fail(&mut self) {
        self.failed += 1;
    }

    pub(super) fn absorb(&mut self, other: PartialCompletion) {
        self.failed += other.failed;
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LogonResponse {
    pub handle: Handle,
    /// The default root folder of the logon.
    pub root: FolderId,
    /// Well-known folders: the default folders of a private mailbox, or all
    /// root trees of the public store.
    pub special_folders: Vec<(String, FolderId)>,
}

#[derive(Clone, Debug)]
pub struct CreateFolderRequest {
    pub kind: FolderKind,
    pub name: String,
    pub comment: Option<String>,
    /// If a folder with this name already exists, open it instead of failing.
    pub open_existing: bool,
}

impl CreateFolderRequest {
    pub fn generic(name: &str) -> Self {
        CreateFolderRequest {
            kind: FolderKind::Generic,
            name: name.to_owned(),
            comment: None,
            open_existing: false,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CreateFolderResponse {
    pub handle: Handle,
    pub folder_id: FolderId,
    pub is_existing: bool,
    /// Only present when an existing public folder was opened.
    pub ghost: Option<GhostInfo>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OpenFolderResponse {
    pub handle: Handle,
    /// Only present for public folders.
    pub ghost: Option<GhostInfo>,
}

#[derive(Clone, Debug)]
pub struct MoveFolderRequest {
    pub folder_id: FolderId,
    pub new_name: String,
    pub want_asynchronous: bool,
}

#[derive(Clone, Debug)]
pub struct CopyFolderRequest {
    pub folder_id: FolderId,
    pub new_name: String,
    /// Also copy the subfolders of the folder.
    pub recursive: bool,
    pub want_asynchronous: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FolderTransferResponse {
    /// The folder at the destination. For a move, this is the ID of the
    /// folder that was moved.
    pub folder_id: FolderId,
    pub completion: PartialCompletion,
}

#[derive(Clone, Debug)]
pub struct MoveCopyMessagesRequest {
    pub message_ids: Vec<MessageId>,
    pub copy: bool,
    pub want_asynchronous: bool,
}

#[derive(Clone, Debug)]
pub struct SetSearchCriteriaRequest {
    /// `None` keeps the restriction from the previous call.
    pub restriction: Option<Restriction>,
    /// Empty keeps the source folders from the previous call.
    pub folder_ids: Vec<FolderId>,
    pub flags: SetSearchFlags,
}

#[derive(Clone, Debug, PartialEq)]
pub struct SearchCriteriaResponse {
    pub restriction: Option<Restriction>,
    pub folder_ids: Vec<FolderId>,
    pub status: SearchStatus,
}

/// Read-only computed properties of a folder.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FolderInfo {
    pub folder_id: FolderId,
    pub parent_id: Option<FolderId>,
    pub name: String,
    pub kind: FolderKind,
    pub state: DeletionState,
    /// Active, non-associated messages.
    pub content_count: u32,
    /// Active associated messages.
    pub associated_content_count: u32,
    /// Messages currently soft-deleted in the folder.
    pub soft_deleted_count: u32,
    /// Messages ever deleted from the folder, soft or hard.
    pub deleted_count_total: u32,
    /// Active direct subfolders.
    pub child_count: u32,
    pub ghost: Option<GhostInfo>,
    pub created: DateTime<Utc>,
    /// When the folder was soft-deleted, if it has been.
    pub deleted_on: Option<DateTime<Utc>>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TableResponse {
    pub handle: Handle,
    pub row_count: u32,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HierarchyRow {
    pub folder_id: FolderId,
    pub parent_id: FolderId,
    pub name: String,
    pub kind: FolderKind,
    pub state: DeletionState,
    /// 1 for direct children of the table's folder.
    pub depth: u32,
    pub content_count: u32,
    pub child_count: u32,
    pub deleted_on: Option<DateTime<Utc>>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ContentsRow {
    /// The folder that actually owns the message. For search folders this
    /// differs from the folder the table was opened on.
    pub folder_id: FolderId,
    pub message_id: MessageId,
    pub associated: bool,
    pub state: DeletionState,
    pub properties: Properties,
    pub last_modified: DateTime<Utc>,
}
