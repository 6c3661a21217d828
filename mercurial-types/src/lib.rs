// Copyright (c) 2004-present, Facebook, Inc.
// All Rights Reserved.
//
// This software may be used and distributed according to the terms of the
// GNU General Public License version 2 or any later version.

//! Core Mercurial data types shared between the object-store facade and the
//! metadata translation core: the two disjoint 20-byte hash namespaces, the
//! Mercurial manifest line format, and the `hg_sha1` node-hash function.

pub mod errors;
pub mod manifest;
pub mod nodehash;
pub mod path;

pub use crate::errors::{Error, ErrorKind, Result};
pub use crate::manifest::{Details, FileType, ManifestContent};
pub use crate::nodehash::{hg_sha1, GitObjectId, HgNodeHash, NULL_GIT_OID, NULL_HASH};
pub use crate::path::{MPath, MPathElement};
