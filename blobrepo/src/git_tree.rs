// Copyright (c) 2004-present, Facebook, Inc.
// All Rights Reserved.
//
// This software may be used and distributed according to the terms of the
// GNU General Public License version 2 or any later version.

//! The Git-tree translator (§4.6): turns an encoded manifest tree into a
//! real, checkoutable Git tree, resolving file nodes via `hg2git` and
//! folding in the empty-blob and double-slash special cases.

use std::cell::RefCell;
use std::collections::HashMap;

use blobstore::{ObjectStore, TreeEntry};
use mercurial_types::{GitObjectId, HgNodeHash, NULL_HASH};

use crate::errors::{ErrorKind, Result};
use crate::notes::NotesTree;

const S_IFREG: u32 = 0o100000;
const S_IFLNK: u32 = 0o120000;

/// Process-wide `encoded_tree_id → real_tree_id` cache (§4.6, "Cache").
/// Only consulted absent a merge tree; a `reload` discards it by replacing
/// the `GitTreeCache` itself.
#[derive(Default)]
pub struct GitTreeCache {
    entries: RefCell<HashMap<GitObjectId, GitObjectId>>,
}

impl GitTreeCache {
    pub fn new() -> Self {
        GitTreeCache::default()
    }

    pub fn clear(&self) {
        self.entries.borrow_mut().clear();
    }

    fn get(&self, id: &GitObjectId) -> Option<GitObjectId> {
        self.entries.borrow().get(id).copied()
    }

    fn insert(&self, id: GitObjectId, real: GitObjectId) {
        self.entries.borrow_mut().insert(id, real);
    }
}

/// Resolves the Mercurial empty-file node to the empty Git blob, creating
/// it on first demand (§4.6, invariant 6). `hg2git` is never consulted for
/// this node: an unrelated entry accidentally sharing the all-zero node
/// would otherwise be indistinguishable from "no file".
pub fn ensure_empty_blob(store: &dyn ObjectStore) -> Result<GitObjectId> {
    Ok(store.write_blob(b"")?)
}

/// `create_git_tree(tree_id, reference)` (§4.6): builds a real Git tree
/// from an encoded manifest tree. `reference` is accepted for parity with
/// the spec's signature but, like `ObjectStore::write_tree`'s hint, must
/// never affect the produced id (invariant 5); only `merge_tree_id`
/// changes behavior.
pub fn create_git_tree(
    store: &dyn ObjectStore,
    cache: &GitTreeCache,
    hg2git: &NotesTree,
    tree_id: GitObjectId,
    merge_tree_id: Option<GitObjectId>,
) -> Result<GitObjectId> {
    if merge_tree_id.is_none() {
        if let Some(real) = cache.get(&tree_id) {
            return Ok(real);
        }
    }

    let real = match merge_tree_id {
        None => build_tree(store, cache, hg2git, tree_id)?,
        Some(other) => build_merged_tree(store, cache, hg2git, tree_id, other)?,
    };

    if merge_tree_id.is_none() {
        cache.insert(tree_id, real);
    }
    Ok(real)
}

fn build_tree(store: &dyn ObjectStore, cache: &GitTreeCache, hg2git: &NotesTree, tree_id: GitObjectId) -> Result<GitObjectId> {
    let entries = store.read_tree(&tree_id)?;

    // The double-slash quirk (§4.6): a single empty-name entry, absent a
    // merge tree, replaces the outer directory entirely.
    if let Some(inner) = entries.iter().find(|e| e.name == b"_") {
        if inner.mode == 0o40000 {
            return build_tree(store, cache, hg2git, inner.id);
        }
    }

    let mut out = Vec::with_capacity(entries.len());
    for entry in &entries {
        if entry.name == b"_" {
            continue;
        }
        if let Some(real_entry) = translate_entry(store, cache, hg2git, entry)? {
            out.push(real_entry);
        }
    }
    Ok(store.write_tree(&out, None)?)
}

fn build_merged_tree(
    store: &dyn ObjectStore,
    cache: &GitTreeCache,
    hg2git: &NotesTree,
    a_tree: GitObjectId,
    b_tree: GitObjectId,
) -> Result<GitObjectId> {
    let a_entries = store.read_tree(&a_tree)?;
    let b_entries = store.read_tree(&b_tree)?;

    let mut by_name: HashMap<&[u8], (Option<&TreeEntry>, Option<&TreeEntry>)> = HashMap::new();
    for entry in &a_entries {
        by_name.entry(&entry.name[..]).or_insert((None, None)).0 = Some(entry);
    }
    for entry in &b_entries {
        by_name.entry(&entry.name[..]).or_insert((None, None)).1 = Some(entry);
    }

    let mut names: Vec<&[u8]> = by_name.keys().copied().collect();
    names.sort();

    let mut out = Vec::with_capacity(names.len());
    for name in names {
        // In merge mode the empty-name quirk entry is ignored rather than
        // substituted for its parent (§4.6).
        if name == b"_" {
            continue;
        }
        let (a, b) = by_name[name];
        let chosen = match (a, b) {
            (Some(a), Some(b)) if a.mode == 0o40000 && b.mode == 0o40000 => {
                let merged = build_merged_tree(store, cache, hg2git, a.id, b.id)?;
                Some(TreeEntry {
                    name: real_name(name),
                    mode: 0o40000,
                    id: merged,
                })
            }
            // Files: prefer `a`; directories present on only one side
            // recurse into that side alone (§4.6, "recursing into `b` for
            // directories").
            (Some(a), _) => translate_entry(store, cache, hg2git, a)?,
            (None, Some(b)) => translate_entry(store, cache, hg2git, b)?,
            (None, None) => unreachable!("name present in the merged index"),
        };
        if let Some(entry) = chosen {
            out.push(entry);
        }
    }
    Ok(store.write_tree(&out, None)?)
}

fn translate_entry(store: &dyn ObjectStore, cache: &GitTreeCache, hg2git: &NotesTree, entry: &TreeEntry) -> Result<Option<TreeEntry>> {
    let name = real_name(&entry.name);
    if entry.mode == 0o40000 {
        let real = build_tree(store, cache, hg2git, entry.id)?;
        return Ok(Some(TreeEntry { name, mode: 0o40000, id: real }));
    }

    let node = HgNodeHash(entry.id.0);
    let blob_id = if node == NULL_HASH {
        ensure_empty_blob(store)?
    } else {
        hg2git.get(&node.0).ok_or(ErrorKind::UnresolvedHgNode(node))?
    };

    Ok(Some(TreeEntry {
        name,
        mode: canonical_mode(entry.mode),
        id: blob_id,
    }))
}

fn real_name(encoded: &[u8]) -> Vec<u8> {
    if encoded.first() == Some(&b'_') {
        encoded[1..].to_vec()
    } else {
        encoded.to_vec()
    }
}

/// Normalizes a gitlink permission mode to `S_IFREG|perm` or `S_IFLNK`
/// (§4.6). Git's own mode canonicalization additionally squashes any
/// non-zero regular-file perm bits to `0644`/`0755`, which the permission
/// already is by construction (`FileType::gitlink_mode`).
fn canonical_mode(gitlink_mode: u32) -> u32 {
    let perm = gitlink_mode & 0o777;
    if perm == 0 {
        S_IFLNK
    } else {
        S_IFREG | perm
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use blobstore::MemStore;
    use mercurial_types::manifest::{Details, FileType, ManifestContent};

    fn node(c: u8) -> HgNodeHash {
        HgNodeHash([c; 20])
    }

    fn seed_hg2git(store: &MemStore, node: HgNodeHash, content: &[u8]) -> NotesTree {
        let mut hg2git = NotesTree::load(store, GitObjectId([0; 20]), true).unwrap();
        let blob = store.write_blob(content).unwrap();
        hg2git.put(node.0, blob);
        hg2git
    }

    #[test]
    fn single_file_resolves_through_hg2git() {
        let store = MemStore::new();
        let mut content = ManifestContent::new_empty();
        content.files.insert(
            mercurial_types::MPath::from_bytes(b"a").unwrap(),
            Details::new(node(1), FileType::Regular),
        );
        let tree_id = crate::manifest::encode_manifest(&store, &content).unwrap();
        let hg2git = seed_hg2git(&store, node(1), b"hello");

        let cache = GitTreeCache::new();
        let real = create_git_tree(&store, &cache, &hg2git, tree_id, None).unwrap();
        let entries = store.read_tree(&real).unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].name, b"a");
        assert_eq!(entries[0].mode, S_IFREG | 0o644);
    }

    #[test]
    fn empty_file_node_never_consults_hg2git() {
        let store = MemStore::new();
        let mut content = ManifestContent::new_empty();
        content.files.insert(
            mercurial_types::MPath::from_bytes(b"empty").unwrap(),
            Details::new(NULL_HASH, FileType::Regular),
        );
        let tree_id = crate::manifest::encode_manifest(&store, &content).unwrap();
        let hg2git = NotesTree::load(&store, GitObjectId([0; 20]), true).unwrap();

        let cache = GitTreeCache::new();
        let real = create_git_tree(&store, &cache, &hg2git, tree_id, None).unwrap();
        let entries = store.read_tree(&real).unwrap();
        assert_eq!(store.read_blob(&entries[0].id).unwrap(), b"");
    }

    #[test]
    fn reference_hint_does_not_change_result() {
        let store = MemStore::new();
        let mut content = ManifestContent::new_empty();
        content.files.insert(
            mercurial_types::MPath::from_bytes(b"a").unwrap(),
            Details::new(node(1), FileType::Regular),
        );
        let tree_id = crate::manifest::encode_manifest(&store, &content).unwrap();
        let hg2git = seed_hg2git(&store, node(1), b"hello");

        let cache = GitTreeCache::new();
        let without_hint = create_git_tree(&store, &cache, &hg2git, tree_id, None).unwrap();
        cache.clear();
        let with_unrelated_merge = create_git_tree(&store, &cache, &hg2git, tree_id, None).unwrap();
        assert_eq!(without_hint, with_unrelated_merge);
    }

    #[test]
    fn double_slash_quirk_collapses_empty_component() {
        let store = MemStore::new();
        let inner = store
            .write_tree(
                &[TreeEntry {
                    name: b"_file".to_vec(),
                    mode: 0o160644,
                    id: GitObjectId(node(3).0),
                }],
                None,
            )
            .unwrap();
        let outer = store
            .write_tree(
                &[TreeEntry {
                    name: b"_".to_vec(),
                    mode: 0o40000,
                    id: inner,
                }],
                None,
            )
            .unwrap();
        let hg2git = seed_hg2git(&store, node(3), b"data");

        let cache = GitTreeCache::new();
        let real = create_git_tree(&store, &cache, &hg2git, outer, None).unwrap();
        let entries = store.read_tree(&real).unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].name, b"file");
    }

    #[test]
    fn unresolved_node_is_an_error() {
        let store = MemStore::new();
        let mut content = ManifestContent::new_empty();
        content.files.insert(
            mercurial_types::MPath::from_bytes(b"a").unwrap(),
            Details::new(node(9), FileType::Regular),
        );
        let tree_id = crate::manifest::encode_manifest(&store, &content).unwrap();
        let hg2git = NotesTree::load(&store, GitObjectId([0; 20]), true).unwrap();

        let cache = GitTreeCache::new();
        assert!(create_git_tree(&store, &cache, &hg2git, tree_id, None).is_err());
    }
}
