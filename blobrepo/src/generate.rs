// Copyright (c) 2004-present, Facebook, Inc.
// All Rights Reserved.
//
// This software may be used and distributed according to the terms of the
// GNU General Public License version 2 or any later version.

//! The incremental manifest generator (§4.4): reconstructs the flat
//! Mercurial manifest for an encoded manifest tree, reusing the bytes of
//! the previous generation wherever an entry's id, mode and path all match.
//!
//! A `ManifestGenerator` remembers exactly one previous generation: its
//! source tree id, the flat bytes it produced, and an index from
//! `(entry id)` to where that entry's contribution landed in those bytes.
//! Each call to `generate` replaces this state outright, so memory is
//! bounded by the size of the single most recently generated manifest; the
//! index from the call before that is simply dropped, which resolves the
//! "tree buffer lifetime" question the same way a generation counter would
//! without a second bookkeeping structure.

use std::collections::HashMap;

use blobstore::ObjectStore;
use mercurial_types::manifest::{Details, FileType};
use mercurial_types::path::base_name_compare;
use mercurial_types::{GitObjectId, HgNodeHash};

use crate::errors::{Error, ErrorKind, Result};

#[derive(Clone)]
struct Span {
    base: Vec<u8>,
    mode: u32,
    start: usize,
    len: usize,
}

struct Generation {
    tree_id: GitObjectId,
    flat: Vec<u8>,
    spans: HashMap<GitObjectId, Span>,
}

/// Caches one generation of flat-manifest reconstruction (§4.4).
#[derive(Default)]
pub struct ManifestGenerator {
    cache: Option<Generation>,
}

impl ManifestGenerator {
    pub fn new() -> Self {
        ManifestGenerator { cache: None }
    }

    /// Returns the flat manifest bytes for `tree_id`, reusing unchanged
    /// runs from whatever tree this generator last produced bytes for.
    /// The borrow is of the generator's own cache (§9): callers that need
    /// to hold onto the bytes across a subsequent `generate` call must
    /// copy them out first.
    pub fn generate(&mut self, store: &dyn ObjectStore, tree_id: GitObjectId) -> Result<&[u8]> {
        if matches!(&self.cache, Some(gen) if gen.tree_id == tree_id) {
            return Ok(&self.cache.as_ref().unwrap().flat);
        }

        let old = self.cache.take();
        let mut out = Vec::new();
        let mut spans = HashMap::new();
        generate_dir(store, tree_id, &[], old.as_ref(), &mut out, &mut spans)?;

        self.cache = Some(Generation {
            tree_id,
            flat: out,
            spans,
        });
        Ok(&self.cache.as_ref().unwrap().flat)
    }
}

fn generate_dir(
    store: &dyn ObjectStore,
    tree_id: GitObjectId,
    base: &[u8],
    old: Option<&Generation>,
    out: &mut Vec<u8>,
    spans: &mut HashMap<GitObjectId, Span>,
) -> Result<()> {
    let mut entries = store.read_tree(&tree_id)?;
    for entry in &entries {
        if entry.name.first() != Some(&b'_') {
            return Err(Error::from(ErrorKind::MissingUnderscorePrefix(entry.name.clone())));
        }
    }
    entries.sort_by(|a, b| base_name_compare(&a.name, a.mode == 0o40000, &b.name, b.mode == 0o40000));

    for entry in entries {
        let is_dir = entry.mode == 0o40000;

        if let Some(old_gen) = old {
            if let Some(span) = old_gen.spans.get(&entry.id) {
                if span.mode == entry.mode && span.base == base {
                    let start = out.len();
                    out.extend_from_slice(&old_gen.flat[span.start..span.start + span.len]);
                    spans.insert(
                        entry.id,
                        Span {
                            base: base.to_vec(),
                            mode: entry.mode,
                            start,
                            len: span.len,
                        },
                    );
                    continue;
                }
            }
        }

        let name = &entry.name[1..];
        let start = out.len();
        if is_dir {
            let child_base = join(base, name);
            generate_dir(store, entry.id, &child_base, old, out, spans)?;
        } else {
            write_file_line(out, base, name, entry.mode, entry.id)?;
        }
        let len = out.len() - start;
        spans.insert(
            entry.id,
            Span {
                base: base.to_vec(),
                mode: entry.mode,
                start,
                len,
            },
        );
    }
    Ok(())
}

fn join(base: &[u8], name: &[u8]) -> Vec<u8> {
    if base.is_empty() {
        name.to_vec()
    } else {
        let mut out = Vec::with_capacity(base.len() + 1 + name.len());
        out.extend_from_slice(base);
        out.push(b'/');
        out.extend_from_slice(name);
        out
    }
}

fn write_file_line(out: &mut Vec<u8>, base: &[u8], name: &[u8], mode: u32, id: GitObjectId) -> Result<()> {
    if !base.is_empty() {
        out.extend_from_slice(base);
        out.push(b'/');
    }
    out.extend_from_slice(name);
    out.push(0);

    let file_type = FileType::from_gitlink_mode(mode).map_err(|_| ErrorKind::InvalidGitlinkMode(mode, id))?;
    // Same explicit gitlink crossover as `manifest::decode_dir`: the
    // entry's id is a Mercurial file node wearing a `GitObjectId` wrapper.
    let details = Details::new(HgNodeHash(id.0), file_type);
    details.write_suffix(out);
    out.push(b'\n');
    Ok(())
}

#[cfg(test)]
mod test {
    use super::*;
    use blobstore::MemStore;
    use mercurial_types::manifest::ManifestContent;

    fn node(c: u8) -> HgNodeHash {
        HgNodeHash([c; 20])
    }

    fn manifest_with(entries: &[(&str, u8, FileType)]) -> ManifestContent {
        let mut content = ManifestContent::new_empty();
        for (path, byte, file_type) in entries {
            content.files.insert(
                mercurial_types::MPath::from_bytes(path.as_bytes()).unwrap(),
                Details::new(node(*byte), *file_type),
            );
        }
        content
    }

    #[test]
    fn matches_from_scratch_decode() {
        let store = MemStore::new();
        let content = manifest_with(&[("a", 1, FileType::Regular), ("dir/b", 2, FileType::Executable)]);
        let tree_id = crate::manifest::encode_manifest(&store, &content).unwrap();

        let mut gen = ManifestGenerator::new();
        let flat = gen.generate(&store, tree_id).unwrap().to_vec();

        let decoded = ManifestContent::parse(&flat).unwrap();
        assert_eq!(decoded, content);
    }

    #[test]
    fn repeat_call_on_same_tree_is_a_cache_hit() {
        let store = MemStore::new();
        let content = manifest_with(&[("a", 1, FileType::Regular)]);
        let tree_id = crate::manifest::encode_manifest(&store, &content).unwrap();

        let mut gen = ManifestGenerator::new();
        let first = gen.generate(&store, tree_id).unwrap().to_vec();
        let second = gen.generate(&store, tree_id).unwrap().to_vec();
        assert_eq!(first, second);
    }

    #[test]
    fn unrelated_change_reuses_other_entries_verbatim() {
        let store = MemStore::new();
        let before = manifest_with(&[("a", 1, FileType::Regular), ("b", 2, FileType::Regular)]);
        let before_tree = crate::manifest::encode_manifest(&store, &before).unwrap();

        let mut gen = ManifestGenerator::new();
        gen.generate(&store, before_tree).unwrap();

        let after = manifest_with(&[("a", 1, FileType::Regular), ("b", 9, FileType::Regular)]);
        let after_tree = crate::manifest::encode_manifest(&store, &after).unwrap();
        let flat = gen.generate(&store, after_tree).unwrap().to_vec();

        let decoded = ManifestContent::parse(&flat).unwrap();
        assert_eq!(decoded, after);
    }

    #[test]
    fn rename_to_new_path_is_not_spliced_from_old_location() {
        let store = MemStore::new();
        let before = manifest_with(&[("a", 1, FileType::Regular)]);
        let before_tree = crate::manifest::encode_manifest(&store, &before).unwrap();

        let mut gen = ManifestGenerator::new();
        gen.generate(&store, before_tree).unwrap();

        let after = manifest_with(&[("b/a", 1, FileType::Regular)]);
        let after_tree = crate::manifest::encode_manifest(&store, &after).unwrap();
        let flat = gen.generate(&store, after_tree).unwrap().to_vec();

        assert!(flat.starts_with(b"b/a\0"));
        let decoded = ManifestContent::parse(&flat).unwrap();
        assert_eq!(decoded, after);
    }

    #[test]
    fn rejects_missing_underscore_prefix() {
        let store = MemStore::new();
        let entries = vec![blobstore::TreeEntry {
            name: b"a".to_vec(),
            mode: 0o160644,
            id: GitObjectId([1; 20]),
        }];
        let tree_id = store.write_tree(&entries, None).unwrap();

        let mut gen = ManifestGenerator::new();
        assert!(gen.generate(&store, tree_id).is_err());
    }
}
