// Copyright (c) 2004-present, Facebook, Inc.
// All Rights Reserved.
//
// This software may be used and distributed according to the terms of the
// GNU General Public License version 2 or any later version.

pub use failure::{Error, Result};
use failure::Fail;

#[derive(Debug, Fail)]
pub enum ErrorKind {
    #[fail(display = "malformed manifest entry: {}", _0)]
    MalformedManifestEntry(String),

    #[fail(display = "invalid path element: {:?}", _0)]
    InvalidPathElement(Vec<u8>),

    #[fail(display = "unknown manifest flag: {}", _0)]
    UnknownFlag(u8),

    #[fail(display = "hash is not 40 hex characters: {:?}", _0)]
    BadNodeHash(Vec<u8>),
}
