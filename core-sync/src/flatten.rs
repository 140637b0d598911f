//! Single-pass flattening of a list collection
//!
//! [`ListEntries`] owns the fetched collection and hands out its entries one
//! at a time, list by list. It cannot be restarted: it is bound to the one
//! response it was built from. A null list, a list without entries or a null
//! entry makes the response unusable and is yielded as an error.

use crate::{Result, SyncError};
use provider_anilist::types::{MediaListCollection, MediaListEntry, MediaListGroup};
use std::vec;

#[derive(Debug)]
pub struct ListEntries {
    lists: vec::IntoIter<Option<MediaListGroup>>,
    current: Option<vec::IntoIter<Option<MediaListEntry>>>,
    failed: bool,
}

impl ListEntries {
    /// # Errors
    ///
    /// `SyncError::MalformedList` if the collection has no `lists`.
    pub fn new(collection: MediaListCollection) -> Result<Self> {
        let lists = collection
            .lists
            .ok_or_else(|| SyncError::MalformedList("Expected a lists response".to_string()))?;

        Ok(Self {
            lists: lists.into_iter(),
            current: None,
            failed: false,
        })
    }

    fn fail(&mut self, message: &str) -> Option<Result<MediaListEntry>> {
        self.failed = true;
        Some(Err(SyncError::MalformedList(message.to_string())))
    }
}

impl Iterator for ListEntries {
    type Item = Result<MediaListEntry>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }

        loop {
            if let Some(entries) = self.current.as_mut() {
                match entries.next() {
                    Some(Some(entry)) => return Some(Ok(entry)),
                    Some(None) => return self.fail("Expected entry to not be null"),
                    None => self.current = None,
                }
            }

            match self.lists.next()? {
                None => return self.fail("Expected list to not be null"),
                Some(list) => match list.entries {
                    None => return self.fail("Expected list to have entries"),
                    Some(entries) => self.current = Some(entries.into_iter()),
                },
            }
        }
    }
}
