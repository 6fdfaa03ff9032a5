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

use std::io;

use thiserror::Error;

/// Wire-level result codes.
///
/// These are the 32-bit values a dispatch layer puts in the `ReturnValue`
/// field of a response. Success is always 0; a partially completed
/// multi-target operation still reports success.
pub mod codes {
    pub const SUCCESS: u32 = 0x0000_0000;
    pub const EC_ERROR: u32 = 0x8000_4005;
    pub const EC_NOT_SUPPORTED: u32 = 0x8004_0102;
    pub const EC_NOT_FOUND: u32 = 0x8004_010F;
    pub const EC_DUPLICATE_NAME: u32 = 0x8004_0604;
    pub const EC_NOT_INITIALIZED: u32 = 0x8004_0605;
    pub const EC_INVALID_PARAM: u32 = 0x8007_0057;
    pub const EC_ACCESS_DENIED: u32 = 0x8007_0005;
    pub const EC_SEARCH_FOLDER: u32 = 0x0000_0460;
    pub const EC_NULL_OBJECT: u32 = 0x0000_04B9;
}

#[derive(Error, Debug)]
pub enum Error {
    #[error("Object is not of the kind this operation requires")]
    ObjectTypeMismatch,
    #[error("Search folders cannot receive moved or copied messages")]
    DestinationIsSearchFolder,
    #[error("Object not found or no longer visible")]
    ObjectGone,
    #[error("A folder with that name already exists")]
    DuplicateName,
    #[error("Invalid parameter")]
    InvalidParameter,
    #[error("Search criteria have never been initialised")]
    SearchNotInitialised,
    #[error("Destination lies inside the folder being moved or copied")]
    DestinationInsideSource,
    #[error("Insufficient rights on the folder")]
    AccessDenied,
    #[error("Operation refused by server policy")]
    RefusedByPolicy,
    #[error("Handle was released or never issued")]
    StaleHandle,
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error(transparent)]
    Toml(#[from] toml::de::Error),
}

impl Error {
    /// The result code a dispatch layer reports for this error.
    pub fn wire_code(&self) -> u32 {
        match *self {
            Error::ObjectTypeMismatch => codes::EC_NOT_SUPPORTED,
            Error::DestinationIsSearchFolder => codes::EC_SEARCH_FOLDER,
            Error::ObjectGone => codes::EC_NOT_FOUND,
            Error::DuplicateName => codes::EC_DUPLICATE_NAME,
            Error::InvalidParameter | Error::DestinationInsideSource => {
                codes::EC_INVALID_PARAM
            }
            Error::SearchNotInitialised => codes::EC_NOT_INITIALIZED,
            Error::AccessDenied => codes::EC_ACCESS_DENIED,
            Error::StaleHandle => codes::EC_NULL_OBJECT,
            Error::RefusedByPolicy | Error::Io(..) | Error::Toml(..) => {
                codes::EC_ERROR
            }
        }
    }
}

/// Collapse an operation result into its wire result code.
pub fn result_code<T>(result: &Result<T, Error>) -> u32 {
    match *result {
        Ok(_) => codes::SUCCESS,
        Err(ref e) => e.wire_code(),
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn wire_codes_match_protocol_values() {
        assert_eq!(0x80040102, Error::ObjectTypeMismatch.wire_code());
        assert_eq!(0x00000460, Error::DestinationIsSearchFolder.wire_code());
        assert_eq!(0x8004010F, Error::ObjectGone.wire_code());
        assert_eq!(0x80040604, Error::DuplicateName.wire_code());
        assert_eq!(0x80040605, Error::SearchNotInitialised.wire_code());
        assert_eq!(0x80070057, Error::DestinationInsideSource.wire_code());
        assert_eq!(0x80004005, Error::RefusedByPolicy.wire_code());
        assert_eq!(0x80070005, Error::AccessDenied.wire_code());
        assert_eq!(0x000004B9, Error::StaleHandle.wire_code());

        assert_eq!(0, result_code(&Ok::<(), Error>(())));
        assert_eq!(
            0x80070057,
            result_code(&Err::<(), _>(Error::InvalidParameter))
        );
    }
}
