// Copyright (c) 2004-present, Facebook, Inc.
// All Rights Reserved.
//
// This software may be used and distributed according to the terms of the
// GNU General Public License version 2 or any later version.

//! The flat Mercurial manifest line format and the gitlink mode encoding
//! used to store it inside a Git tree (§3, §4.3).
//!
//! Each manifest revision contains a list of the file revisions in each
//! changeset, in the form:
//!
//! <path>\0<hex file node>[<flag>]\n
//!
//! NB: paths are sequences of non-`\0` bytes, not necessarily UTF-8.

use std::collections::BTreeMap;
use std::str::FromStr;

use crate::errors::{Error, ErrorKind, Result};
use crate::nodehash::HgNodeHash;
use crate::path::MPath;

/// Type of a manifest entry. `Tree` entries point at nested manifests;
/// `File` entries point at file revisions and carry the Mercurial
/// executable/symlink flag.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash)]
pub enum FileType {
    Regular,
    Executable,
    Symlink,
}

impl FileType {
    /// The single-character flag Mercurial writes after the hex node in a
    /// manifest line, or `None` for a regular file (no flag is written).
    pub fn flag_char(&self) -> Option<u8> {
        match self {
            FileType::Regular => None,
            FileType::Executable => Some(b'x'),
            FileType::Symlink => Some(b'l'),
        }
    }

    pub fn from_flag_char(flag: Option<u8>) -> Result<Self> {
        match flag {
            None => Ok(FileType::Regular),
            Some(b'x') => Ok(FileType::Executable),
            Some(b'l') => Ok(FileType::Symlink),
            Some(other) => Err(Error::from(ErrorKind::UnknownFlag(other))),
        }
    }

    /// The pseudo-gitlink mode (§3) a file entry of this type is stored
    /// with inside an encoded manifest tree.
    pub fn gitlink_mode(&self) -> u32 {
        match self {
            FileType::Regular => 0o160644,
            FileType::Executable => 0o160755,
            FileType::Symlink => 0o160000,
        }
    }

    pub fn from_gitlink_mode(mode: u32) -> Result<Self> {
        match mode {
            0o160644 => Ok(FileType::Regular),
            0o160755 => Ok(FileType::Executable),
            0o160000 => Ok(FileType::Symlink),
            other => Err(Error::from(ErrorKind::MalformedManifestEntry(format!(
                "invalid gitlink mode {:o}",
                other
            )))),
        }
    }
}

/// The file node and flag for one manifest entry.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct Details {
    pub node: HgNodeHash,
    pub file_type: FileType,
}

impl Details {
    pub fn new(node: HgNodeHash, file_type: FileType) -> Self {
        Details { node, file_type }
    }

    fn parse(data: &[u8]) -> Result<Self> {
        if data.len() < 40 {
            return Err(Error::from(ErrorKind::MalformedManifestEntry(format!(
                "hash too short: {:?}",
                data
            ))));
        }
        let (hash, flags) = data.split_at(40);
        let hash = std::str::from_utf8(hash)
            .map_err(|_| ErrorKind::BadNodeHash(hash.to_vec()))
            .and_then(|hex| HgNodeHash::from_str(hex).map_err(|_| ErrorKind::BadNodeHash(hash.to_vec())))?;

        if flags.len() > 1 {
            return Err(Error::from(ErrorKind::MalformedManifestEntry(format!(
                "more than one flag: {:?}",
                flags
            ))));
        }
        let flag = flags.first().copied();
        let file_type = FileType::from_flag_char(flag)?;

        Ok(Details {
            node: hash,
            file_type,
        })
    }

    /// Serialize as `<hex node><flag?>`, the suffix of a manifest line
    /// following the `\0`.
    pub fn write_suffix(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(self.node.to_hex().as_bytes());
        if let Some(flag) = self.file_type.flag_char() {
            out.push(flag);
        }
    }
}

/// A parsed flat Mercurial manifest: path → (node, flag), sorted by path.
#[derive(Debug, Eq, PartialEq, Default)]
pub struct ManifestContent {
    pub files: BTreeMap<MPath, Details>,
}

impl ManifestContent {
    pub fn new_empty() -> Self {
        ManifestContent {
            files: BTreeMap::new(),
        }
    }

    pub fn parse(data: &[u8]) -> Result<Self> {
        let mut files = BTreeMap::new();

        for line in data.split(|b| *b == b'\n') {
            if line.is_empty() {
                continue;
            }

            let nul = line
                .iter()
                .position(|b| *b == 0)
                .ok_or_else(|| ErrorKind::MalformedManifestEntry("no \\0 in entry".to_string()))?;
            let (name, rest) = line.split_at(nul);
            let rest = &rest[1..];

            let path = MPath::from_bytes(name).map_err(|_| ErrorKind::InvalidPathElement(name.to_vec()))?;
            let details = Details::parse(rest)?;

            files.insert(path, details);
        }

        Ok(ManifestContent { files })
    }

    /// Serialize back to the flat `path\0node[flag]\n` byte format. This is
    /// the inverse of `parse`: for manifests produced by this codec,
    /// `parse(serialize(m)) == m` and `serialize(parse(bytes)) == bytes`
    /// (invariant 1, §8).
    pub fn serialize(&self) -> Vec<u8> {
        let mut out = Vec::new();
        for (path, details) in &self.files {
            out.extend_from_slice(&path.to_bytes());
            out.push(0);
            details.write_suffix(&mut out);
            out.push(b'\n');
        }
        out
    }
}

#[cfg(test)]
impl quickcheck::Arbitrary for FileType {
    fn arbitrary(g: &mut quickcheck::Gen) -> Self {
        g.choose(&[FileType::Regular, FileType::Executable, FileType::Symlink])
            .copied()
            .unwrap()
    }
}

#[cfg(test)]
impl quickcheck::Arbitrary for Details {
    fn arbitrary(g: &mut quickcheck::Gen) -> Self {
        Details::new(HgNodeHash::arbitrary(g), FileType::arbitrary(g))
    }
}

#[cfg(test)]
impl quickcheck::Arbitrary for ManifestContent {
    fn arbitrary(g: &mut quickcheck::Gen) -> Self {
        let len = usize::arbitrary(g) % 8;
        let mut files = BTreeMap::new();
        for _ in 0..len {
            files.insert(MPath::arbitrary(g), Details::arbitrary(g));
        }
        ManifestContent { files }
    }
}
