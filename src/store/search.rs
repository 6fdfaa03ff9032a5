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

//! Search folders.
//!
//! A search folder owns no messages. Its members are the Active,
//! non-associated messages of its source folders which match its
//! restriction, evaluated when read. A static search (or a stopped one)
//! instead keeps the membership computed when it was last populated, less
//! any member which has since been deleted or has left the source folders.

use std::collections::BTreeSet;

use log::info;
use serde::{Deserialize, Serialize};

use super::handles::*;
use super::model::*;
use super::object_store::ObjectStore;
use super::session::Session;
use crate::support::error::Error;

/// A predicate over the properties of a message.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum Restriction {
    /// Matches every message.
    All,
    Exists {
        property: String,
    },
    Equals {
        property: String,
        value: PropertyValue,
    },
    /// Case-insensitive substring match on a text property.
    Contains {
        property: String,
        text: String,
    },
    And {
        terms: Vec<Restriction>,
    },
    Or {
        terms: Vec<Restriction>,
    },
    Not {
        term: Box<Restriction>,
    },
}

impl Restriction {
    pub fn matches(&self, properties: &Properties) -> bool {
        match *self {
            Restriction::All => true,
            Restriction::Exists { ref property } => {
                properties.contains_key(property)
            },
            Restriction::Equals {
                ref property,
                ref value,
            } => properties.get(property) == Some(value),
            Restriction::Contains {
                ref property,
                ref text,
            } => properties
                .get(property)
                .and_then(PropertyValue::as_text)
                .map_or(false, |v| {
                    v.to_lowercase().contains(&text.to_lowercase())
                }),
            Restriction::And { ref terms } => {
                terms.iter().all(|t| t.matches(properties))
            },
            Restriction::Or { ref terms } => {
                terms.iter().any(|t| t.matches(properties))
            },
            Restriction::Not { ref term } => !term.matches(properties),
        }
    }
}

/// The criteria and population state of one search folder.
#[derive(Clone, Debug, Default)]
pub(super) struct SearchState {
    restriction: Option<Restriction>,
    sources: Vec<FolderId>,
    recursive: bool,
    is_static: bool,
    content_indexed: bool,
    running: bool,
    /// Membership fixed at the last population of a static or stopped
    /// search.
    frozen: Option<Vec<MessageId>>,
}

impl SearchState {
    fn is_initialised(&self) -> bool {
        self.restriction.is_some() && !self.sources.is_empty()
    }

    fn status(&self) -> SearchStatus {
        let mut status = SearchStatus::empty();
        if !self.is_initialised() {
            return status;
        }

        status |= SearchStatus::COMPLETE;
        if self.running {
            status |= SearchStatus::RUNNING;
        }
        if self.recursive {
            status |= SearchStatus::RECURSIVE;
        }
        if self.is_static {
            status |= SearchStatus::STATIC;
        }
        if self.content_indexed {
            status |= SearchStatus::CI_TOTALLY;
        } else {
            status |= SearchStatus::TWIR_TOTALLY;
        }
        status
    }
}

const CONFLICTING_FLAGS: &[(SetSearchFlags, SetSearchFlags)] = &[
    (SetSearchFlags::STOP, SetSearchFlags::RESTART),
    (SetSearchFlags::RECURSIVE, SetSearchFlags::SHALLOW),
    (SetSearchFlags::FOREGROUND, SetSearchFlags::BACKGROUND),
    (
        SetSearchFlags::CONTENT_INDEXED,
        SetSearchFlags::NON_CONTENT_INDEXED,
    ),
];

impl Session {
    /// `RopSetSearchCriteria` on the search folder behind `folder`.
    pub fn set_search_criteria(
        &mut self,
        folder: Handle,
        request: SetSearchCriteriaRequest,
    ) -> Result<(), Error> {
        let folder = self.folder_handle(folder)?;
        let flags = request.flags;
        if CONFLICTING_FLAGS
            .iter()
            .any(|&(a, b)| flags.contains(a) && flags.contains(b))
        {
            return Err(Error::InvalidParameter);
        }

        let mut objects = self.store.lock();
        let mut state = objects
            .active_folder(folder)?
            .search
            .clone()
            .ok_or(Error::ObjectTypeMismatch)?;

        if let Some(restriction) = request.restriction {
            state.restriction = Some(restriction);
        }
        if !request.folder_ids.is_empty() {
            for &source in &request.folder_ids {
                if FolderKind::Search == objects.active_folder(source)?.kind {
                    return Err(Error::InvalidParameter);
                }
            }
            state.sources = request.folder_ids;
        }
        if !state.is_initialised() {
            return Err(Error::SearchNotInitialised);
        }

        if flags.contains(SetSearchFlags::RECURSIVE) {
            state.recursive = true;
        } else if flags.contains(SetSearchFlags::SHALLOW) {
            state.recursive = false;
        }
        if flags.contains(SetSearchFlags::CONTENT_INDEXED) {
            state.content_indexed = true;
        } else if flags.contains(SetSearchFlags::NON_CONTENT_INDEXED) {
            state.content_indexed = false;
        }
        state.is_static = flags.contains(SetSearchFlags::STATIC);

        // Every call other than STOP (re)populates the search.
        let stop = flags.contains(SetSearchFlags::STOP);
        state.frozen = None;
        if stop || state.is_static {
            state.frozen = Some(objects.evaluate_search(&state));
        }
        state.running = !stop && !state.is_static;

        info!(
            "{} Set search criteria on {:?}: {} sources, flags {:?}",
            self.log_prefix,
            folder,
            state.sources.len(),
            flags
        );
        objects.folder_mut(folder)?.search = Some(state);
        Ok(())
    }

    /// `RopGetSearchCriteria` on the search folder behind `folder`.
    ///
    /// A search folder whose criteria were never set reports no restriction,
    /// no source folders and an empty status.
    pub fn get_search_criteria(
        &self,
        folder: Handle,
    ) -> Result<SearchCriteriaResponse, Error> {
        let folder = self.folder_handle(folder)?;
        let objects = self.store.lock();
        let state = objects
            .folder(folder)?
            .search
            .as_ref()
            .ok_or(Error::ObjectTypeMismatch)?;

        Ok(SearchCriteriaResponse {
            restriction: state.restriction.clone(),
            folder_ids: state.sources.clone(),
            status: state.status(),
        })
    }
}

impl ObjectStore {
    /// The current members of search folder `id`, in ID order.
    ///
    /// Returns nothing for folders which are not search folders or whose
    /// criteria were never set.
    pub(super) fn search_members(&self, id: FolderId) -> Vec<MessageId> {
        let state = match self.folder(id).ok().and_then(|f| f.search.as_ref())
        {
            Some(state) => state,
            None => return Vec::new(),
        };

        match state.frozen {
            Some(ref frozen) => {
                let scope = self.search_scope(state);
                frozen
                    .iter()
                    .copied()
                    .filter(|&m| {
                        self.message(m).map_or(false, |m| {
                            DeletionState::Active == m.state
                                && !m.associated
                                && scope.contains(&m.folder)
                        })
                    })
                    .collect()
            },
            None => self.evaluate_search(state),
        }
    }

    /// Evaluate the criteria in `state` against the current store.
    fn evaluate_search(&self, state: &SearchState) -> Vec<MessageId> {
        let restriction = match state.restriction {
            Some(ref r) => r,
            None => return Vec::new(),
        };

        let mut members = self
            .search_scope(state)
            .into_iter()
            .flat_map(|f| self.owned_messages(f))
            .filter(|m| DeletionState::Active == m.state && !m.associated)
            .filter(|m| restriction.matches(&m.properties))
            .map(|m| m.id)
            .collect::<Vec<_>>();
        members.sort();
        members
    }

    /// The Active folders whose messages a search looks at.
    fn search_scope(&self, state: &SearchState) -> BTreeSet<FolderId> {
        let mut folders = BTreeSet::new();
        for &source in &state.sources {
            if self.active_folder(source).is_err() {
                continue;
            }

            folders.insert(source);
            if state.recursive {
                folders.extend(self.descendants(source).into_iter().filter(
                    |&d| Some(DeletionState::Active) == self.folder_state(d),
                ));
            }
        }
        folders
    }
}

#[cfg(test)]
mod test {
    use super::super::session::TestFixture;
    use super::*;

    fn subject(text: &str) -> Restriction {
        Restriction::Contains {
            property: PROP_SUBJECT.to_owned(),
            text: text.to_owned(),
        }
    }

    fn set(
        fixture: &mut TestFixture,
        search: Handle,
        restriction: Option<Restriction>,
        folder_ids: Vec<FolderId>,
        flags: SetSearchFlags,
    ) -> Result<(), Error> {
        fixture.session.set_search_criteria(
            search,
            SetSearchCriteriaRequest {
                restriction,
                folder_ids,
                flags,
            },
        )
    }

    #[test]
    fn restriction_matching() {
        let mut properties = Properties::new();
        properties.insert(PROP_SUBJECT.to_owned(), "Quarterly Report".into());
        properties.insert("Size".to_owned(), 42i64.into());

        assert!(Restriction::All.matches(&properties));
        assert!(subject("report").matches(&properties));
        assert!(!subject("memo").matches(&properties));
        assert!(Restriction::Exists {
            property: "Size".to_owned()
        }
        .matches(&properties));
        assert!(Restriction::Equals {
            property: "Size".to_owned(),
            value: 42i64.into(),
        }
        .matches(&properties));
        assert!(!Restriction::Equals {
            property: "Size".to_owned(),
            value: "42".into(),
        }
        .matches(&properties));
        assert!(Restriction::And {
            terms: vec![subject("quarter"), subject("report")],
        }
        .matches(&properties));
        assert!(Restriction::Or {
            terms: vec![subject("memo"), subject("report")],
        }
        .matches(&properties));
        assert!(!Restriction::Not {
            term: Box::new(Restriction::All),
        }
        .matches(&properties));
    }

    #[test]
    fn restriction_from_toml() {
        let restriction: Restriction = toml::from_str(
            "type = \"and\"\n\
             [[terms]]\n\
             type = \"contains\"\n\
             property = \"Subject\"\n\
             text = \"report\"\n\
             [[terms]]\n\
             type = \"exists\"\n\
             property = \"Size\"\n",
        )
        .unwrap();
        assert_eq!(
            Restriction::And {
                terms: vec![
                    subject("report"),
                    Restriction::Exists {
                        property: "Size".to_owned()
                    },
                ],
            },
            restriction
        );
    }

    #[test]
    fn first_call_must_initialise() {
        let mut fixture = TestFixture::new();
        let r = fixture.root_handle();
        let a = fixture.create(r, "A");
        let a_id = fixture.id_of(a);
        let s = fixture.create_search(r, "S");

        let criteria = fixture.session.get_search_criteria(s).unwrap();
        assert_eq!(None, criteria.restriction);
        assert!(criteria.folder_ids.is_empty());
        assert_eq!(SearchStatus::empty(), criteria.status);

        assert_matches!(
            Err(Error::SearchNotInitialised),
            set(&mut fixture, s, Some(Restriction::All), vec![], SetSearchFlags::empty())
        );
        assert_matches!(
            Err(Error::SearchNotInitialised),
            set(&mut fixture, s, None, vec![a_id], SetSearchFlags::empty())
        );
        assert_eq!(
            0x80040605,
            crate::support::error::result_code(&set(
                &mut fixture,
                s,
                None,
                vec![],
                SetSearchFlags::empty()
            ))
        );

        set(
            &mut fixture,
            s,
            Some(Restriction::All),
            vec![a_id],
            SetSearchFlags::empty(),
        )
        .unwrap();
        // Later calls may omit either part.
        set(&mut fixture, s, None, vec![], SetSearchFlags::RESTART).unwrap();
        let criteria = fixture.session.get_search_criteria(s).unwrap();
        assert_eq!(Some(Restriction::All), criteria.restriction);
        assert_eq!(vec![a_id], criteria.folder_ids);
        assert!(criteria.status.contains(SearchStatus::RUNNING));
        assert!(criteria.status.contains(SearchStatus::COMPLETE));
        assert!(!criteria.status.contains(SearchStatus::RECURSIVE));
    }

    #[test]
    fn flag_validation() {
        let mut fixture = TestFixture::new();
        let r = fixture.root_handle();
        let a = fixture.create(r, "A");
        let a_id = fixture.id_of(a);
        let s = fixture.create_search(r, "S");

        for &flags in &[
            SetSearchFlags::STOP | SetSearchFlags::RESTART,
            SetSearchFlags::RECURSIVE | SetSearchFlags::SHALLOW,
            SetSearchFlags::FOREGROUND | SetSearchFlags::BACKGROUND,
            SetSearchFlags::CONTENT_INDEXED
                | SetSearchFlags::NON_CONTENT_INDEXED,
        ] {
            assert_matches!(
                Err(Error::InvalidParameter),
                set(&mut fixture, s, Some(Restriction::All), vec![a_id], flags)
            );
        }

        // Only search folders have criteria.
        assert_matches!(
            Err(Error::ObjectTypeMismatch),
            set(
                &mut fixture,
                a,
                Some(Restriction::All),
                vec![a_id],
                SetSearchFlags::empty()
            )
        );
        assert_matches!(
            Err(Error::ObjectTypeMismatch),
            fixture.session.get_search_criteria(a)
        );

        // Sources must exist and may not be search folders.
        let s_id = fixture.id_of(s);
        assert_matches!(
            Err(Error::ObjectGone),
            set(
                &mut fixture,
                s,
                Some(Restriction::All),
                vec![FolderId(9999)],
                SetSearchFlags::empty()
            )
        );
        assert_matches!(
            Err(Error::InvalidParameter),
            set(
                &mut fixture,
                s,
                Some(Restriction::All),
                vec![s_id],
                SetSearchFlags::empty()
            )
        );
    }

    #[test]
    fn dynamic_recursive_search() {
        let mut fixture = TestFixture::new();
        let r = fixture.root_handle();
        let a = fixture.create(r, "A");
        let a_id = fixture.id_of(a);
        let child = fixture.create(a, "child");
        let s = fixture.create_search(r, "S");

        fixture.message(a, false, "report one");
        fixture.message(a, false, "memo");
        fixture.message(a, true, "report settings");
        fixture.message(child, false, "nested report");

        set(
            &mut fixture,
            s,
            Some(subject("report")),
            vec![a_id],
            SetSearchFlags::SHALLOW | SetSearchFlags::CONTENT_INDEXED,
        )
        .unwrap();
        assert_eq!(1, fixture.contents(s));
        let status = fixture.session.get_search_criteria(s).unwrap().status;
        assert!(status.contains(SearchStatus::CI_TOTALLY));

        set(&mut fixture, s, None, vec![], SetSearchFlags::RECURSIVE).unwrap();
        assert_eq!(2, fixture.contents(s));
        let status = fixture.session.get_search_criteria(s).unwrap().status;
        assert!(status.contains(SearchStatus::RECURSIVE));
        // Indexing mode is kept from the previous call.
        assert!(status.contains(SearchStatus::CI_TOTALLY));

        // New messages show up without repopulating.
        fixture.message(child, false, "another report");
        assert_eq!(3, fixture.contents(s));

        let table = fixture
            .session
            .contents_table(s, ContentsTableFlags::empty())
            .unwrap();
        let rows = fixture.session.query_contents_rows(table.handle).unwrap();
        let child_id = fixture.id_of(child);
        assert_eq!(
            vec![a_id, child_id, child_id],
            rows.iter().map(|r| r.folder_id).collect::<Vec<_>>()
        );
        assert_eq!(3, fixture.session.folder_info(s).unwrap().content_count);
    }

    #[test]
    fn static_and_stopped_searches_are_frozen() {
        let mut fixture = TestFixture::new();
        let r = fixture.root_handle();
        let a = fixture.create(r, "A");
        let a_id = fixture.id_of(a);
        let s = fixture.create_search(r, "S");
        let first = fixture.message(a, false, "one");

        set(
            &mut fixture,
            s,
            Some(Restriction::All),
            vec![a_id],
            SetSearchFlags::STATIC,
        )
        .unwrap();
        fixture.message(a, false, "two");
        assert_eq!(1, fixture.contents(s));
        let status = fixture.session.get_search_criteria(s).unwrap().status;
        assert!(status.contains(SearchStatus::STATIC));
        assert!(!status.contains(SearchStatus::RUNNING));
        assert!(status.contains(SearchStatus::TWIR_TOTALLY));

        // Deleted members drop out of the frozen set.
        fixture.session.delete_messages(a, &[first]).unwrap();
        assert_eq!(0, fixture.contents(s));

        set(&mut fixture, s, None, vec![], SetSearchFlags::RESTART).unwrap();
        assert_eq!(1, fixture.contents(s));
        fixture.message(a, false, "three");
        assert_eq!(2, fixture.contents(s));

        set(&mut fixture, s, None, vec![], SetSearchFlags::STOP).unwrap();
        fixture.message(a, false, "four");
        assert_eq!(2, fixture.contents(s));
        let status = fixture.session.get_search_criteria(s).unwrap().status;
        assert!(!status.contains(SearchStatus::RUNNING));
        assert!(status.contains(SearchStatus::COMPLETE));
    }
}
