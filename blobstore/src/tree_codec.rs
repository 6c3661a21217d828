// Copyright (c) 2004-present, Facebook, Inc.
// All Rights Reserved.
//
// This software may be used and distributed according to the terms of the
// GNU General Public License version 2 or any later version.

//! The raw Git tree object byte format: a concatenation of
//! `<mode-octal> SP <name> NUL <20-byte id>` records, sorted the way Git
//! sorts tree entries (`base_name_compare`, §3).

use mercurial_types::GitObjectId;
use mercurial_types::path::base_name_compare;

use crate::errors::{Error, ErrorKind};
use crate::store::TreeEntry;

const OID_LEN: usize = 20;

pub fn encode_tree(entries: &[TreeEntry]) -> Vec<u8> {
    let mut sorted: Vec<&TreeEntry> = entries.iter().collect();
    sorted.sort_by(|a, b| {
        base_name_compare(&a.name, is_tree_mode(a.mode), &b.name, is_tree_mode(b.mode))
    });

    let mut out = Vec::new();
    for entry in sorted {
        out.extend_from_slice(format!("{:o}", entry.mode).as_bytes());
        out.push(b' ');
        out.extend_from_slice(&entry.name);
        out.push(0);
        out.extend_from_slice(entry.id.as_bytes());
    }
    out
}

pub fn parse_tree(id: &GitObjectId, data: &[u8]) -> Result<Vec<TreeEntry>, Error> {
    let mut entries = Vec::new();
    let mut rest = data;

    while !rest.is_empty() {
        let sp = rest
            .iter()
            .position(|b| *b == b' ')
            .ok_or_else(|| ErrorKind::MalformedTree(*id, "missing SP after mode".to_string()))?;
        let mode_str = std::str::from_utf8(&rest[..sp])
            .map_err(|_| ErrorKind::MalformedTree(*id, "non-utf8 mode".to_string()))?;
        let mode = u32::from_str_radix(mode_str, 8)
            .map_err(|_| ErrorKind::MalformedTree(*id, format!("bad octal mode {:?}", mode_str)))?;

        let after_mode = &rest[sp + 1..];
        let nul = after_mode
            .iter()
            .position(|b| *b == 0)
            .ok_or_else(|| ErrorKind::MalformedTree(*id, "missing NUL after name".to_string()))?;
        let name = after_mode[..nul].to_vec();

        let after_name = &after_mode[nul + 1..];
        if after_name.len() < OID_LEN {
            return Err(ErrorKind::MalformedTree(*id, "truncated object id".to_string()).into());
        }
        let (raw_id, remainder) = after_name.split_at(OID_LEN);
        let mut buf = [0u8; OID_LEN];
        buf.copy_from_slice(raw_id);

        entries.push(TreeEntry {
            name,
            mode,
            id: GitObjectId::from(buf),
        });
        rest = remainder;
    }

    Ok(entries)
}

fn is_tree_mode(mode: u32) -> bool {
    mode == 0o40000
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn roundtrip_empty() {
        assert!(encode_tree(&[]).is_empty());
    }

    #[test]
    fn roundtrip_entries() {
        let entries = vec![
            TreeEntry {
                name: b"_a".to_vec(),
                mode: 0o160644,
                id: GitObjectId([1; 20]),
            },
            TreeEntry {
                name: b"_b".to_vec(),
                mode: 0o40000,
                id: GitObjectId([2; 20]),
            },
        ];
        let bytes = encode_tree(&entries);
        let id = GitObjectId([0; 20]);
        let mut parsed = parse_tree(&id, &bytes).unwrap();
        parsed.sort_by(|a, b| a.name.cmp(&b.name));
        let mut expected = entries;
        expected.sort_by(|a, b| a.name.cmp(&b.name));
        assert_eq!(parsed, expected);
    }
}
