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

/// The longest folder display name accepted, in characters.
pub const MAX_FOLDER_NAME_CHARS: usize = 256;

/// Determine whether the given name is "safe" for use as a mailbox owner.
///
/// Owner names end up in log lines and in the keys of the private mailbox
/// index, so this excludes empty names, names starting with `.` or `#`, path
/// separators, wildcards, and ASCII control characters.
pub fn is_safe_name(name: &str) -> bool {
    !name.is_empty()
        && name.chars().next() != Some('.')
        && name.chars().next() != Some('#')
        && name.find(|c| c == '/' || c == '\\').is_none()
        && name.find(|c| c < ' ' || c == '\x7F').is_none()
        && name.find(|c| c == '*' || c == '%').is_none()
}

/// Determine whether the given string is acceptable as a folder display name.
///
/// Folder names are far less restricted than owner names since they never
/// touch the file system: anything non-blank, free of control characters and
/// at most `MAX_FOLDER_NAME_CHARS` long is fine.
pub fn is_valid_folder_name(name: &str) -> bool {
    !name.trim().is_empty()
        && name.chars().count() <= MAX_FOLDER_NAME_CHARS
        && name.find(|c: char| c.is_control()).is_none()
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_is_safe_name() {
        assert!(is_safe_name("alice"));
        assert!(is_safe_name("Entwürfe"));
        assert!(is_safe_name("郵便"));
        assert!(is_safe_name("first.last"));
        assert!(!is_safe_name(""));
        assert!(!is_safe_name(".hidden"));
        assert!(!is_safe_name("#public"));
        assert!(!is_safe_name("a/b"));
        assert!(!is_safe_name("a\\b"));
        assert!(!is_safe_name("a\0"));
        assert!(!is_safe_name("fo\x7Fo"));
        assert!(!is_safe_name("foo*"));
        assert!(!is_safe_name("foo%bar"));
    }

    #[test]
    fn test_is_valid_folder_name() {
        assert!(is_valid_folder_name("Inbox"));
        assert!(is_valid_folder_name("Sent Items"));
        assert!(is_valid_folder_name("a/b"));
        assert!(is_valid_folder_name("#news"));
        assert!(!is_valid_folder_name(""));
        assert!(!is_valid_folder_name("   "));
        assert!(!is_valid_folder_name("tab\there"));
        assert!(is_valid_folder_name(&"x".repeat(MAX_FOLDER_NAME_CHARS)));
        assert!(!is_valid_folder_name(
            &"x".repeat(MAX_FOLDER_NAME_CHARS + 1)
        ));
    }
}
