// Copyright (c) 2004-present, Facebook, Inc.
// All Rights Reserved.
//
// This software may be used and distributed according to the terms of the
// GNU General Public License version 2 or any later version.

//! The object-store facade (§4.1, §6): a narrow trait the translation core
//! uses to read and write Git objects and refs, without caring how they are
//! actually persisted.

use crypto::digest::Digest;
use crypto::sha1::Sha1;

use mercurial_types::GitObjectId;

use crate::errors::{ErrorKind, Result};
use crate::tree_codec::{encode_tree, parse_tree};

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum ObjectKind {
    Blob,
    Tree,
    Commit,
}

impl ObjectKind {
    fn as_str(&self) -> &'static str {
        match self {
            ObjectKind::Blob => "blob",
            ObjectKind::Tree => "tree",
            ObjectKind::Commit => "commit",
        }
    }
}

/// One entry of a Git tree: an encoded-manifest `_`-prefixed name and a
/// gitlink mode, or a real tree/blob name and a regular Git mode,
/// depending on which side of the translator produced it.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct TreeEntry {
    pub name: Vec<u8>,
    pub mode: u32,
    pub id: GitObjectId,
}

/// A parsed commit: tree, ordered parents, and the free-form message body
/// (where the metadata root's feature flags and manifest trailers live).
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct ParsedCommit {
    pub tree: GitObjectId,
    pub parents: Vec<GitObjectId>,
    pub message: String,
}

/// Content-addresses `data` the way Git hashes a loose object: `sha1("<kind>
/// <len>\0" ++ data)`. Distinct from `hg_sha1` (§4.5), which hashes
/// Mercurial revlog payloads against a pair of parent node ids instead.
pub fn hash_object(kind: ObjectKind, data: &[u8]) -> GitObjectId {
    let header = format!("{} {}\0", kind.as_str(), data.len());

    let mut hasher = Sha1::new();
    hasher.input(header.as_bytes());
    hasher.input(data);

    let mut out = [0u8; 20];
    hasher.result(&mut out);
    GitObjectId::from(out)
}

pub(crate) fn encode_commit(tree: &GitObjectId, parents: &[GitObjectId], message: &str) -> Vec<u8> {
    let mut out = Vec::new();
    out.extend_from_slice(format!("tree {}\n", tree.to_hex()).as_bytes());
    for parent in parents {
        out.extend_from_slice(format!("parent {}\n", parent.to_hex()).as_bytes());
    }
    out.push(b'\n');
    out.extend_from_slice(message.as_bytes());
    out
}

pub(crate) fn parse_commit(id: &GitObjectId, data: &[u8]) -> Result<ParsedCommit> {
    let text = std::str::from_utf8(data)
        .map_err(|_| ErrorKind::MalformedTree(*id, "commit body is not utf-8".to_string()))?;
    let (header, message) = text
        .split_once("\n\n")
        .ok_or_else(|| ErrorKind::MalformedTree(*id, "commit missing header/body separator".to_string()))?;

    let mut tree = None;
    let mut parents = Vec::new();
    for line in header.lines() {
        if let Some(hex) = line.strip_prefix("tree ") {
            tree = Some(
                hex.parse::<GitObjectId>()
                    .map_err(|_| ErrorKind::MalformedTree(*id, "bad tree id".to_string()))?,
            );
        } else if let Some(hex) = line.strip_prefix("parent ") {
            parents.push(
                hex.parse::<GitObjectId>()
                    .map_err(|_| ErrorKind::MalformedTree(*id, "bad parent id".to_string()))?,
            );
        }
    }

    let tree = tree.ok_or_else(|| ErrorKind::MalformedTree(*id, "commit missing tree line".to_string()))?;

    Ok(ParsedCommit {
        tree,
        parents,
        message: message.to_string(),
    })
}

/// Narrow interface onto the Git object database and refs store (§6). All
/// methods are synchronous: this core has no suspension points of its own
/// (§5) and blocking, if any, is confined to the store implementation.
pub trait ObjectStore {
    fn read_object(&self, id: &GitObjectId) -> Result<(ObjectKind, Vec<u8>)>;

    fn write_blob(&self, data: &[u8]) -> Result<GitObjectId>;

    /// `reference_hint` names a tree id the implementation may use to share
    /// structural prefixes with; it must never affect the produced id
    /// (invariant 5, §8).
    fn write_tree(&self, entries: &[TreeEntry], reference_hint: Option<&GitObjectId>) -> Result<GitObjectId>;

    fn write_commit(&self, tree: &GitObjectId, parents: &[GitObjectId], message: &str) -> Result<GitObjectId>;

    fn read_ref(&self, name: &str) -> Result<Option<GitObjectId>>;

    fn update_ref(&self, name: &str, old: Option<GitObjectId>, new: GitObjectId) -> Result<()>;

    fn for_each_ref_in(
        &self,
        prefix: &str,
        cb: &mut dyn FnMut(&str, &GitObjectId) -> Result<()>,
    ) -> Result<()>;

    fn read_blob(&self, id: &GitObjectId) -> Result<Vec<u8>> {
        match self.read_object(id)? {
            (ObjectKind::Blob, data) => Ok(data),
            (other, _) => Err(ErrorKind::WrongKind(*id, other.as_str(), "blob").into()),
        }
    }

    fn read_tree(&self, id: &GitObjectId) -> Result<Vec<TreeEntry>> {
        match self.read_object(id)? {
            (ObjectKind::Tree, data) => parse_tree(id, &data),
            (other, _) => Err(ErrorKind::WrongKind(*id, other.as_str(), "tree").into()),
        }
    }

    fn read_commit(&self, id: &GitObjectId) -> Result<ParsedCommit> {
        match self.read_object(id)? {
            (ObjectKind::Commit, data) => parse_commit(id, &data),
            (other, _) => Err(ErrorKind::WrongKind(*id, other.as_str(), "commit").into()),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn hash_object_is_stable() {
        let a = hash_object(ObjectKind::Blob, b"hello");
        let b = hash_object(ObjectKind::Blob, b"hello");
        assert_eq!(a, b);
        assert_ne!(a, hash_object(ObjectKind::Tree, b"hello"));
    }

    #[test]
    fn empty_blob_matches_known_git_id() {
        // The well known empty-blob object id used by every Git repository.
        let id = hash_object(ObjectKind::Blob, b"");
        assert_eq!(id.to_hex(), "e69de29bb2d1d6434b8b29ae775ad8c2e48c5391");
    }

    #[test]
    fn commit_roundtrip() {
        let tree = GitObjectId([1; 20]);
        let parent = GitObjectId([2; 20]);
        let bytes = encode_commit(&tree, &[parent], "cinnabar\n\nshort description\n");
        let id = GitObjectId([0; 20]);
        let parsed = parse_commit(&id, &bytes).unwrap();
        assert_eq!(parsed.tree, tree);
        assert_eq!(parsed.parents, vec![parent]);
        assert_eq!(parsed.message, "cinnabar\n\nshort description\n");
    }
}
