// Copyright (c) 2004-present, Facebook, Inc.
// All Rights Reserved.
//
// This software may be used and distributed according to the terms of the
// GNU General Public License version 2 or any later version.

//! Manifest encoding/decoding (§4.3): translating a flat Mercurial manifest
//! into an encoded Git tree hierarchy and back. This module owns the
//! from-scratch (non-incremental) codec; the incremental reconstruction
//! engine that reuses previously generated bytes lives in `generate.rs`
//! (§4.4) and is what production callers use.

use std::collections::BTreeMap;

use blobstore::{ObjectStore, TreeEntry};
use mercurial_types::manifest::{Details, FileType, ManifestContent};
use mercurial_types::path::MPathElement;
use mercurial_types::GitObjectId;

use crate::errors::{Error, ErrorKind, Result};

enum Node {
    File(Details),
    Dir(BTreeMap<MPathElement, Node>),
}

/// Encodes a flat manifest into an encoded manifest tree (§3, §4.3) and
/// returns its id. Every path component is prefixed with `_`; file entries
/// get the gitlink mode derived from their flag.
pub fn encode_manifest(store: &dyn ObjectStore, content: &ManifestContent) -> Result<GitObjectId> {
    let mut root: BTreeMap<MPathElement, Node> = BTreeMap::new();

    for (path, details) in &content.files {
        let components = path.components();
        insert(&mut root, components, *details);
    }

    encode_dir(store, &root)
}

fn insert(dir: &mut BTreeMap<MPathElement, Node>, components: &[MPathElement], details: Details) {
    match components {
        [] => unreachable!("MPath is always non-empty"),
        [last] => {
            dir.insert(last.clone(), Node::File(details));
        }
        [head, rest @ ..] => {
            let entry = dir
                .entry(head.clone())
                .or_insert_with(|| Node::Dir(BTreeMap::new()));
            match entry {
                Node::Dir(sub) => insert(sub, rest, details),
                Node::File(_) => {
                    // A path component collides with an existing file entry;
                    // this can only happen for a malformed input manifest
                    // (two entries where one is a prefix of the other).
                    *entry = Node::Dir(BTreeMap::new());
                    if let Node::Dir(sub) = entry {
                        insert(sub, rest, details);
                    }
                }
            }
        }
    }
}

fn encode_dir(store: &dyn ObjectStore, dir: &BTreeMap<MPathElement, Node>) -> Result<GitObjectId> {
    let mut entries = Vec::with_capacity(dir.len());
    for (name, node) in dir {
        let entry = match node {
            Node::File(details) => TreeEntry {
                name: name.encoded_name(),
                mode: details.file_type.gitlink_mode(),
                id: GitObjectId::from(details.node.0),
            },
            Node::Dir(sub) => TreeEntry {
                name: name.encoded_name(),
                mode: 0o40000,
                id: encode_dir(store, sub)?,
            },
        };
        entries.push(entry);
    }
    Ok(store.write_tree(&entries, None)?)
}

/// Decodes an encoded manifest tree back into a flat `ManifestContent`,
/// from scratch (no incremental reuse). Used as the non-incremental
/// baseline and by tests; `generate.rs` is the production path.
pub fn decode_manifest_tree(store: &dyn ObjectStore, tree_id: GitObjectId) -> Result<ManifestContent> {
    let mut files = BTreeMap::new();
    decode_dir(store, tree_id, &mut Vec::new(), &mut files)?;
    Ok(ManifestContent { files })
}

fn decode_dir(
    store: &dyn ObjectStore,
    tree_id: GitObjectId,
    prefix: &mut Vec<MPathElement>,
    out: &mut BTreeMap<mercurial_types::MPath, Details>,
) -> Result<()> {
    for entry in store.read_tree(&tree_id)? {
        if entry.name.first() != Some(&b'_') {
            return Err(Error::from(ErrorKind::MissingUnderscorePrefix(entry.name.clone())));
        }
        let name = MPathElement::new(entry.name[1..].to_vec())
            .map_err(|_| ErrorKind::CorruptManifestTree(tree_id, "bad path component".to_string()))?;

        prefix.push(name);
        if entry.mode == 0o40000 {
            decode_dir(store, entry.id, prefix, out)?;
        } else {
            let file_type = FileType::from_gitlink_mode(entry.mode)
                .map_err(|_| ErrorKind::InvalidGitlinkMode(entry.mode, tree_id))?;
            // The gitlink target's 20 raw bytes are an Mercurial file node,
            // not a Git object id, despite sharing the `GitObjectId` wire
            // type (§3); this is the one place that crossover is named
            // explicitly.
            let node = mercurial_types::HgNodeHash(entry.id.0);
            let path = mercurial_types::MPath::from_components(prefix.clone());
            out.insert(path, Details::new(node, file_type));
        }
        prefix.pop();
    }
    Ok(())
}
