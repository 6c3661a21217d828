// Copyright (c) 2004-present, Facebook, Inc.
// All Rights Reserved.
//
// This software may be used and distributed according to the terms of the
// GNU General Public License version 2 or any later version.

pub use failure::{Error, Result};
use failure::Fail;

use mercurial_types::GitObjectId;

#[derive(Debug, Fail)]
pub enum ErrorKind {
    #[fail(display = "no object with id {}", _0)]
    MissingObject(GitObjectId),

    #[fail(display = "object {} is a {}, not a {}", _0, _1, _2)]
    WrongKind(GitObjectId, &'static str, &'static str),

    #[fail(display = "malformed tree object {}: {}", _0, _1)]
    MalformedTree(GitObjectId, String),

    #[fail(display = "ref update for {} failed: old value did not match", _0)]
    RefUpdateConflict(String),
}
