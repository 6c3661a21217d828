// Copyright (c) 2004-present, Facebook, Inc.
// All Rights Reserved.
//
// This software may be used and distributed according to the terms of the
// GNU General Public License version 2 or any later version.

pub use failure::{Error, Result};
use failure::Fail;

use mercurial_types::{GitObjectId, HgNodeHash};

/// Structural-violation conditions are fatal (§7): callers propagate them
/// with `?` and, ultimately, a top-level caller (out of scope here) aborts
/// the process. Recoverable conditions (lookup miss, verifier mismatch)
/// are plain return values, not errors.
#[derive(Debug, Fail)]
pub enum ErrorKind {
    #[fail(display = "encoded manifest entry {:?} is missing the '_' prefix", _0)]
    MissingUnderscorePrefix(Vec<u8>),

    #[fail(display = "invalid gitlink mode {:o} in encoded manifest tree {}", _0, _1)]
    InvalidGitlinkMode(u32, GitObjectId),

    #[fail(display = "metadata root commit {} has {} parents, expected 6", _0, _1)]
    WrongMetadataParentCount(GitObjectId, usize),

    #[fail(display = "unrecognized metadata feature flag {:?}: repository requires a newer version", _0)]
    UnrecognizedFeatureFlag(String),

    #[fail(display = "legacy unified-manifests (v1) repository: requires external upgrade")]
    LegacyUnifiedManifests,

    #[fail(display = "duplicate replace map entry for {}", _0)]
    DuplicateReplaceEntry(GitObjectId),

    #[fail(display = "hg2git lookup for {} did not resolve to a git object", _0)]
    UnresolvedHgNode(HgNodeHash),

    #[fail(display = "corrupt manifest tree {}: {}", _0, _1)]
    CorruptManifestTree(GitObjectId, String),

    #[fail(display = "store is not initialized (init_metadata was never called or found no metadata root)")]
    NotInitialized,
}

// `blobstore::Error` and `mercurial_types::Error` are both the same
// `failure::Error` alias this crate uses, so lower-layer errors propagate
// with a bare `?` and never need an explicit wrapping variant here.
