// Copyright (c) 2004-present, Facebook, Inc.
// All Rights Reserved.
//
// This software may be used and distributed according to the terms of the
// GNU General Public License version 2 or any later version.

//! Metadata root bookkeeping (§4.7): the top-level commit enumerating the
//! six sub-roots and the feature flags it advertises, plus the replace map
//! rebuilt from its tree on every (re)load.

use std::collections::HashMap;

use blobstore::ObjectStore;
use mercurial_types::{GitObjectId, NULL_GIT_OID};

use crate::errors::{ErrorKind, Result};

pub const METADATA_REF: &str = "refs/cinnabar/metadata";

const FLAG_FILES_META: &str = "files-meta";
const FLAG_UNIFIED_MANIFESTS_V2: &str = "unified-manifests-v2";
const FLAG_UNIFIED_MANIFESTS_LEGACY: &str = "unified-manifests";

pub const FILES_META: u32 = 1 << 0;
pub const UNIFIED_MANIFESTS_V2: u32 = 1 << 1;

/// The six positional roots named by the metadata commit's parents, in
/// fixed order (§3, "Metadata root commit"). The sixth, `metadata`, is not
/// a sub-store at all: it is the previous metadata commit, chaining each
/// metadata root to its predecessor so the history of roots is walkable
/// the same way any other commit history is (`walk::rev_list`). It is
/// null on the very first metadata commit a repository ever writes.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Default)]
pub struct MetadataRoots {
    pub changesets: GitObjectId,
    pub manifests: GitObjectId,
    pub hg2git: GitObjectId,
    pub git2hg: GitObjectId,
    pub files_meta: GitObjectId,
    pub metadata: GitObjectId,
}

/// Parsed state of `refs/cinnabar/metadata`: the commit's own id, the six
/// positional roots, the recognized-feature-flag bitset, and the replace
/// map. A null `commit` means the ref was absent — an empty repository
/// (§8, scenario 1).
#[derive(Debug, Default)]
pub struct Metadata {
    pub commit: GitObjectId,
    pub roots: MetadataRoots,
    pub flags: u32,
    pub replace_map: HashMap<GitObjectId, GitObjectId>,
}

impl Metadata {
    pub fn is_empty(&self) -> bool {
        self.commit == NULL_GIT_OID
    }
}

/// `init_metadata` (§4.7): reads `refs/cinnabar/metadata`; a missing ref
/// yields an all-null, flagless, empty `Metadata` (scenario 1). Otherwise
/// parses the six positional parents and the flag list, then rebuilds the
/// replace map from the metadata commit's own tree.
pub fn init_metadata(store: &dyn ObjectStore) -> Result<Metadata> {
    let metadata_id = match store.read_ref(METADATA_REF)? {
        Some(id) => id,
        None => return Ok(Metadata::default()),
    };

    let commit = store.read_commit(&metadata_id)?;
    if commit.parents.len() != 6 {
        return Err(ErrorKind::WrongMetadataParentCount(metadata_id, commit.parents.len()).into());
    }

    let roots = MetadataRoots {
        changesets: commit.parents[0],
        manifests: commit.parents[1],
        hg2git: commit.parents[2],
        git2hg: commit.parents[3],
        files_meta: commit.parents[4],
        metadata: commit.parents[5],
    };

    let flags = parse_flags(&commit.message)?;
    let replace_map = load_replace_map(store, commit.tree)?;

    Ok(Metadata {
        commit: metadata_id,
        roots,
        flags,
        replace_map,
    })
}

fn parse_flags(message: &str) -> Result<u32> {
    let mut flags = 0;
    for word in message.split_whitespace() {
        match word {
            FLAG_FILES_META => flags |= FILES_META,
            FLAG_UNIFIED_MANIFESTS_V2 => flags |= UNIFIED_MANIFESTS_V2,
            FLAG_UNIFIED_MANIFESTS_LEGACY => return Err(ErrorKind::LegacyUnifiedManifests.into()),
            other if looks_like_a_feature_flag(other) => {
                return Err(ErrorKind::UnrecognizedFeatureFlag(other.to_string()).into())
            }
            _ => {}
        }
    }
    Ok(flags)
}

/// The metadata commit's body is free-form prose followed by the flag
/// list; only tokens that look like this repository's flag tokens
/// (lowercase, hyphenated, no spaces — already guaranteed by
/// `split_whitespace`) are treated as flags at all, so ordinary prose
/// words never misfire as "unrecognized feature flag".
fn looks_like_a_feature_flag(word: &str) -> bool {
    word.starts_with("unified-manifests") || word.ends_with("-meta") || word.starts_with("files-")
}

fn load_replace_map(store: &dyn ObjectStore, tree_id: GitObjectId) -> Result<HashMap<GitObjectId, GitObjectId>> {
    let mut map = HashMap::new();
    for entry in store.read_tree(&tree_id)? {
        let name = match std::str::from_utf8(&entry.name) {
            Ok(name) => name,
            Err(_) => continue,
        };
        if name.len() != 40 || !name.bytes().all(|b| b.is_ascii_hexdigit() && !b.is_ascii_uppercase()) {
            continue;
        }
        let old: GitObjectId = match name.parse() {
            Ok(id) => id,
            Err(_) => continue,
        };
        if old == entry.id {
            // Drop-and-continue per §4.7: a self-referential entry is not
            // fatal, just a no-op replacement, so it is silently skipped
            // rather than raised as an error.
            continue;
        }
        if map.insert(old, entry.id).is_some() {
            return Err(ErrorKind::DuplicateReplaceEntry(old).into());
        }
    }
    Ok(map)
}
