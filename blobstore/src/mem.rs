// Copyright (c) 2004-present, Facebook, Inc.
// All Rights Reserved.
//
// This software may be used and distributed according to the terms of the
// GNU General Public License version 2 or any later version.

//! An in-memory `ObjectStore`, equivalent to the teacher's own
//! `EagerMemblob`/`LazyMemblob`. Used only by this workspace's test suites;
//! never wired into a real command-line entry point.

use std::cell::RefCell;
use std::collections::HashMap;

use mercurial_types::GitObjectId;

use crate::errors::{ErrorKind, Result};
use crate::store::{encode_commit, hash_object, parse_commit, ObjectKind, ObjectStore, TreeEntry};
use crate::tree_codec::{encode_tree, parse_tree};

#[derive(Default)]
pub struct MemStore {
    objects: RefCell<HashMap<GitObjectId, (ObjectKind, Vec<u8>)>>,
    refs: RefCell<HashMap<String, GitObjectId>>,
}

impl MemStore {
    pub fn new() -> Self {
        MemStore::default()
    }

    fn insert(&self, kind: ObjectKind, data: Vec<u8>) -> GitObjectId {
        let id = hash_object(kind, &data);
        self.objects.borrow_mut().entry(id).or_insert((kind, data));
        id
    }
}

impl ObjectStore for MemStore {
    fn read_object(&self, id: &GitObjectId) -> Result<(ObjectKind, Vec<u8>)> {
        self.objects
            .borrow()
            .get(id)
            .cloned()
            .ok_or_else(|| ErrorKind::MissingObject(*id).into())
    }

    fn write_blob(&self, data: &[u8]) -> Result<GitObjectId> {
        Ok(self.insert(ObjectKind::Blob, data.to_vec()))
    }

    fn write_tree(&self, entries: &[TreeEntry], _reference_hint: Option<&GitObjectId>) -> Result<GitObjectId> {
        // The in-memory store has no benefit from a reference tree: it never
        // shares storage across objects, so the hint is accepted and ignored
        // (invariant 5, §8, requires the hint never change the produced id).
        Ok(self.insert(ObjectKind::Tree, encode_tree(entries)))
    }

    fn write_commit(&self, tree: &GitObjectId, parents: &[GitObjectId], message: &str) -> Result<GitObjectId> {
        Ok(self.insert(ObjectKind::Commit, encode_commit(tree, parents, message)))
    }

    fn read_ref(&self, name: &str) -> Result<Option<GitObjectId>> {
        Ok(self.refs.borrow().get(name).copied())
    }

    fn update_ref(&self, name: &str, old: Option<GitObjectId>, new: GitObjectId) -> Result<()> {
        let mut refs = self.refs.borrow_mut();
        if refs.get(name).copied() != old {
            return Err(ErrorKind::RefUpdateConflict(name.to_string()).into());
        }
        refs.insert(name.to_string(), new);
        Ok(())
    }

    fn for_each_ref_in(
        &self,
        prefix: &str,
        cb: &mut dyn FnMut(&str, &GitObjectId) -> Result<()>,
    ) -> Result<()> {
        for (name, id) in self.refs.borrow().iter() {
            if name.starts_with(prefix) {
                cb(name, id)?;
            }
        }
        Ok(())
    }
}

// Re-parse a commit/tree written through this store; convenience used by
// tests that want to inspect what a higher layer wrote.
#[cfg(test)]
impl MemStore {
    pub(crate) fn debug_parse_commit(&self, id: &GitObjectId) -> Result<crate::store::ParsedCommit> {
        let (_, data) = self.read_object(id)?;
        parse_commit(id, &data)
    }

    pub(crate) fn debug_parse_tree(&self, id: &GitObjectId) -> Result<Vec<TreeEntry>> {
        let (_, data) = self.read_object(id)?;
        parse_tree(id, &data)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn put_get_blob() {
        let store = MemStore::new();
        let id = store.write_blob(b"hello").unwrap();
        assert_eq!(store.read_blob(&id).unwrap(), b"hello");
    }

    #[test]
    fn write_tree_ignores_reference_hint() {
        let store = MemStore::new();
        let entries = vec![TreeEntry {
            name: b"_a".to_vec(),
            mode: 0o160644,
            id: GitObjectId([9; 20]),
        }];
        let a = store.write_tree(&entries, None).unwrap();
        let b = store.write_tree(&entries, Some(&GitObjectId([1; 20]))).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn missing_object_errors() {
        let store = MemStore::new();
        assert!(store.read_object(&GitObjectId([7; 20])).is_err());
    }

    #[test]
    fn ref_update_requires_matching_old_value() {
        let store = MemStore::new();
        let id = GitObjectId([1; 20]);
        store.update_ref("refs/heads/foo", None, id).unwrap();
        assert!(store.update_ref("refs/heads/foo", None, id).is_err());
        store
            .update_ref("refs/heads/foo", Some(id), GitObjectId([2; 20]))
            .unwrap();
    }

    #[test]
    fn for_each_ref_in_filters_by_prefix() {
        let store = MemStore::new();
        store
            .update_ref("refs/cinnabar/metadata", None, GitObjectId([1; 20]))
            .unwrap();
        store
            .update_ref("refs/heads/master", None, GitObjectId([2; 20]))
            .unwrap();

        let mut seen = Vec::new();
        store
            .for_each_ref_in("refs/cinnabar/", &mut |name, id| {
                seen.push((name.to_string(), *id));
                Ok(())
            })
            .unwrap();
        assert_eq!(seen, vec![("refs/cinnabar/metadata".to_string(), GitObjectId([1; 20]))]);
    }
}
