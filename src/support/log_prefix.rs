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

use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};

/// Tracks text that should be included in at the start of every log statement
/// made on behalf of a session.
///
/// Clones of a `LogPrefix` share the same underlying data.
#[derive(Clone)]
pub struct LogPrefix {
    inner: Arc<Mutex<Inner>>,
}

#[derive(Clone)]
struct Inner {
    session: String,
    mailbox: Option<String>,
}

impl LogPrefix {
    pub fn new(session: String) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner {
                session: sanitise(session),
                mailbox: None,
            })),
        }
    }

    /// Record which mailbox the session has logged on to.
    pub fn set_mailbox(&self, mailbox: String) {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .mailbox = Some(sanitise(mailbox));
    }
}

impl fmt::Display for LogPrefix {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        write!(f, "{}", inner.session)?;
        if let Some(ref mailbox) = inner.mailbox {
            write!(f, "[{mailbox}]")?;
        }

        Ok(())
    }
}

fn sanitise(mut s: String) -> String {
    s.retain(|c| !c.is_control());
    if let Some((truncate_len, _)) = s.char_indices().nth(64) {
        s.truncate(truncate_len);
    }

    s
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn display_with_and_without_mailbox() {
        let prefix = LogPrefix::new("session-1".to_owned());
        assert_eq!("session-1", prefix.to_string());

        let shared = prefix.clone();
        shared.set_mailbox("alice\r\n".to_owned());
        assert_eq!("session-1[alice]", prefix.to_string());
    }
}
