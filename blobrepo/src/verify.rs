// Copyright (c) 2004-present, Facebook, Inc.
// All Rights Reserved.
//
// This software may be used and distributed according to the terms of the
// GNU General Public License version 2 or any later version.

//! Manifest/file hash verifier (§4.5): recomputes the Mercurial node hash
//! of a reconstructed manifest or file and compares it against the stored
//! node. Never fatal (§7): callers decide what a mismatch means.

use blobstore::ObjectStore;
use mercurial_types::{hg_sha1, GitObjectId, HgNodeHash, NULL_HASH};

use crate::errors::{ErrorKind, Result};
use crate::generate::ManifestGenerator;
use crate::notes::NotesTree;

/// Reads the 40-hex Mercurial node id trailing a manifest commit's message
/// body (§3: "a Git commit whose message body ends with a 40-hex string").
pub fn trailer_node(message: &str) -> Result<HgNodeHash> {
    let trimmed = message.trim_end();
    if trimmed.len() < 40 {
        return Err(ErrorKind::CorruptManifestTree(
            GitObjectId([0; 20]),
            "commit message shorter than a trailer node".to_string(),
        )
        .into());
    }
    let hex = &trimmed[trimmed.len() - 40..];
    hex.parse::<HgNodeHash>()
        .map_err(|_| ErrorKind::CorruptManifestTree(GitObjectId([0; 20]), format!("bad trailer {:?}", hex)).into())
}

/// `check_manifest(commit_id)` (§4.5, §6): regenerates the flat manifest
/// for `commit_id`'s tree, extracts p1/p2 from the parent manifest
/// commits' trailers, and compares `hg_sha1` of the regenerated bytes
/// against `commit_id`'s own trailer.
pub fn check_manifest(store: &dyn ObjectStore, generator: &mut ManifestGenerator, commit_id: GitObjectId) -> Result<bool> {
    let commit = store.read_commit(&commit_id)?;
    let node = trailer_node(&commit.message)?;

    let mut parent_nodes = Vec::with_capacity(2);
    for parent in commit.parents.iter().take(2) {
        let parent_commit = store.read_commit(parent)?;
        parent_nodes.push(trailer_node(&parent_commit.message)?);
    }
    let p1 = parent_nodes.get(0).copied().unwrap_or(NULL_HASH);
    let p2 = parent_nodes.get(1).copied().unwrap_or(NULL_HASH);

    let flat = generator.generate(store, commit.tree)?;
    Ok(hg_sha1(flat, &p1, &p2) == node)
}

/// `check_file(node, p1, p2)` (§4.5): a file node's content, resolved
/// through `hg2git`, is hashed against a ranked sequence of candidate
/// parent pairs to absorb known Mercurial quirks. Any match is valid.
pub fn check_file(store: &dyn ObjectStore, hg2git: &NotesTree, node: HgNodeHash, p1: HgNodeHash, p2: HgNodeHash) -> Result<bool> {
    let git_id = match hg2git.get(&node.0) {
        Some(id) => id,
        None => return Ok(false),
    };
    let data = store.read_blob(&git_id)?;

    let candidates = [
        (p1, p2),
        (p1, NULL_HASH),
        (p2, NULL_HASH),
        (p1, p1),
        (NULL_HASH, NULL_HASH),
    ];

    Ok(candidates
        .iter()
        .any(|(a, b)| hg_sha1(&data, a, b) == node))
}

#[cfg(test)]
mod test {
    use super::*;
    use blobstore::MemStore;

    #[test]
    fn trailer_node_parses_hex_tail() {
        let hex = "da39a3ee5e6b4b0d3255bfef95601890afd80709";
        let msg = format!("cinnabar\n\n{}\n", hex);
        let node = trailer_node(&msg).unwrap();
        assert_eq!(node.to_hex(), hex);
    }

    #[test]
    fn trailer_node_rejects_short_message() {
        assert!(trailer_node("too short").is_err());
    }

    #[test]
    fn check_file_matches_first_candidate() {
        let store = MemStore::new();
        let p1 = HgNodeHash([1; 20]);
        let p2 = HgNodeHash([2; 20]);
        let data = b"file contents";
        let node = hg_sha1(data, &p1, &p2);

        let blob_id = store.write_blob(data).unwrap();
        let mut hg2git = NotesTree::load(&store, GitObjectId([0; 20]), true).unwrap();
        hg2git.put(node.0, blob_id);

        assert!(check_file(&store, &hg2git, node, p1, p2).unwrap());
        assert!(!check_file(&store, &hg2git, node, HgNodeHash([9; 20]), HgNodeHash([8; 20])).unwrap());
    }

    #[test]
    fn check_file_unresolved_node_is_a_miss() {
        let store = MemStore::new();
        let hg2git = NotesTree::load(&store, GitObjectId([0; 20]), true).unwrap();
        assert!(!check_file(&store, &hg2git, HgNodeHash([5; 20]), NULL_HASH, NULL_HASH).unwrap());
    }
}
