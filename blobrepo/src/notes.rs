// Copyright (c) 2004-present, Facebook, Inc.
// All Rights Reserved.
//
// This software may be used and distributed according to the terms of the
// GNU General Public License version 2 or any later version.

//! The three identity-map notes trees (§4.2): `hg2git`, `git2hg`,
//! `files_meta`. Each is a persistent key→Git-id mapping, lazily loaded
//! from a root tree id and written back out as a new tree on flush.

use std::collections::BTreeMap;

use blobstore::{ObjectStore, TreeEntry};
use mercurial_types::GitObjectId;

use crate::errors::Result;

const NULL_ID: GitObjectId = GitObjectId([0; 20]);

/// A lazily-initialized key/value notes tree, keyed by a raw 20-byte id
/// (either an `HgNodeHash` or a `GitObjectId`, depending on which map this
/// is). Conflicting inserts keep the existing value (§4.2, "ignore").
pub struct NotesTree {
    root: GitObjectId,
    entries: BTreeMap<[u8; 20], GitObjectId>,
    dirty: bool,
}

impl NotesTree {
    /// Initializes from `root`. A zero root, or `empty == true`, starts
    /// with no entries without touching the store (§4.2: "If a root id is
    /// zero or the files-meta feature flag is absent, the tree is
    /// initialized empty").
    pub fn load(store: &dyn ObjectStore, root: GitObjectId, empty: bool) -> Result<Self> {
        if empty || root == NULL_ID {
            return Ok(NotesTree {
                root: NULL_ID,
                entries: BTreeMap::new(),
                dirty: false,
            });
        }

        let mut entries = BTreeMap::new();
        load_fanout(store, &root, &mut entries)?;
        Ok(NotesTree {
            root,
            entries,
            dirty: false,
        })
    }

    pub fn get(&self, key: &[u8; 20]) -> Option<GitObjectId> {
        self.entries.get(key).copied()
    }

    /// Looks up by a hex prefix shorter than the full 40 characters.
    /// Resolves only if exactly one stored key shares the prefix;
    /// otherwise a miss (ambiguous and not-found collapse the same way,
    /// per §7 "Resolution miss").
    pub fn get_abbrev(&self, prefix: &str) -> Option<GitObjectId> {
        let mut matches = self
            .entries
            .iter()
            .filter(|(key, _)| hex(*key).starts_with(prefix));
        let (_, value) = matches.next()?;
        if matches.next().is_some() {
            return None;
        }
        Some(*value)
    }

    /// Inserts `key => value`. A pre-existing entry for `key` is kept
    /// (§4.2, "On conflict during insert the policy is 'ignore'").
    pub fn put(&mut self, key: [u8; 20], value: GitObjectId) {
        if self.entries.contains_key(&key) {
            return;
        }
        self.entries.insert(key, value);
        self.dirty = true;
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Writes the current entries back out as a tree and returns its id.
    /// A two-level fan-out keeps any single directory small: the first
    /// byte of the key (2 hex chars) selects a subtree, the remaining 38
    /// hex chars name the leaf entry.
    pub fn flush(&mut self, store: &dyn ObjectStore) -> Result<GitObjectId> {
        if !self.dirty {
            return Ok(self.root);
        }

        let mut by_fanout: BTreeMap<u8, Vec<TreeEntry>> = BTreeMap::new();
        for (key, value) in &self.entries {
            let leaf_name = hex(key)[2..].as_bytes().to_vec();
            by_fanout.entry(key[0]).or_default().push(TreeEntry {
                name: leaf_name,
                mode: 0o100644,
                id: *value,
            });
        }

        let mut top = Vec::new();
        for (byte, leaves) in by_fanout {
            let sub_id = store.write_tree(&leaves, None)?;
            top.push(TreeEntry {
                name: format!("{:02x}", byte).into_bytes(),
                mode: 0o40000,
                id: sub_id,
            });
        }

        let new_root = store.write_tree(&top, Some(&self.root))?;
        self.root = new_root;
        self.dirty = false;
        Ok(new_root)
    }
}

fn load_fanout(store: &dyn ObjectStore, root: &GitObjectId, out: &mut BTreeMap<[u8; 20], GitObjectId>) -> Result<()> {
    for top_entry in store.read_tree(root)? {
        let prefix = std::str::from_utf8(&top_entry.name).unwrap_or_default();
        for leaf in store.read_tree(&top_entry.id)? {
            let suffix = std::str::from_utf8(&leaf.name).unwrap_or_default();
            let hex_key = format!("{}{}", prefix, suffix);
            if hex_key.len() != 40 {
                continue;
            }
            if let Ok(key) = parse_hex20(&hex_key) {
                out.insert(key, leaf.id);
            }
        }
    }
    Ok(())
}

fn hex(key: &[u8; 20]) -> String {
    let mut s = String::with_capacity(40);
    for b in key {
        s.push_str(&format!("{:02x}", b));
    }
    s
}

fn parse_hex20(s: &str) -> std::result::Result<[u8; 20], ()> {
    if s.len() != 40 {
        return Err(());
    }
    let mut out = [0u8; 20];
    for (i, chunk) in s.as_bytes().chunks(2).enumerate() {
        let byte_str = std::str::from_utf8(chunk).map_err(|_| ())?;
        out[i] = u8::from_str_radix(byte_str, 16).map_err(|_| ())?;
    }
    Ok(out)
}
