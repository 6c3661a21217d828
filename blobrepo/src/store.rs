// Copyright (c) 2004-present, Facebook, Inc.
// All Rights Reserved.
//
// This software may be used and distributed according to the terms of the
// GNU General Public License version 2 or any later version.

//! `Store` (§5, §9): bundles every piece of process-wide state the core
//! needs — the three notes trees, the generated-manifest cache, the
//! Git-tree cache, the metadata root and replace map, manifest heads — into
//! a single owning struct, rather than the teacher's module-level
//! singletons. Lifecycle methods mirror `init`/`init_phase2`/`reload`/`done`
//! (§6).

use std::collections::HashSet;

use blobstore::ObjectStore;
use mercurial_types::{GitObjectId, NULL_GIT_OID};
use slog::{debug, o, Discard, Drain, Logger};

use crate::errors::{ErrorKind, Result};
use crate::generate::ManifestGenerator;
use crate::git_tree::GitTreeCache;
use crate::metadata::{init_metadata, Metadata};
use crate::notes::NotesTree;

/// Constructor-time options (§9, "Configuration"): which feature flags this
/// store requires, and whether to pre-seed the empty blob eagerly.
#[derive(Debug, Clone, Copy, Default)]
pub struct StoreOptions {
    pub require_files_meta: bool,
    pub preseed_empty_blob: bool,
}

/// The process-wide state a translation session needs (§5). Not `Sync`;
/// the core's single-threaded discipline means callers never need to share
/// one `Store` across threads.
pub struct Store {
    logger: Logger,
    options: StoreOptions,
    metadata: Metadata,
    pub hg2git: NotesTree,
    pub git2hg: NotesTree,
    pub files_meta: NotesTree,
    pub manifest_generator: ManifestGenerator,
    pub git_tree_cache: GitTreeCache,
    hg2git_seen: HashSet<[u8; 20]>,
    manifest_heads: HashSet<GitObjectId>,
}

impl Store {
    /// `init` (§6): loads the metadata root and the three notes trees. A
    /// missing `refs/cinnabar/metadata` is not an error (§8, scenario 1);
    /// every sub-root is simply null and every notes tree starts empty.
    pub fn init(store: &dyn ObjectStore, options: StoreOptions, logger: Option<Logger>) -> Result<Self> {
        let logger = logger.unwrap_or_else(|| Logger::root(Discard {}.ignore_res(), o!()));
        let metadata = init_metadata(store)?;

        if options.require_files_meta && metadata.flags & crate::metadata::FILES_META == 0 && !metadata.is_empty() {
            return Err(ErrorKind::UnrecognizedFeatureFlag("files-meta (required but absent)".to_string()).into());
        }

        let files_meta_empty = metadata.flags & crate::metadata::FILES_META == 0;
        let hg2git = NotesTree::load(store, metadata.roots.hg2git, false)?;
        let git2hg = NotesTree::load(store, metadata.roots.git2hg, false)?;
        let files_meta = NotesTree::load(store, metadata.roots.files_meta, files_meta_empty)?;

        if options.preseed_empty_blob {
            crate::git_tree::ensure_empty_blob(store)?;
        }

        debug!(logger, "store initialized"; "empty" => metadata.is_empty());

        Ok(Store {
            logger,
            options,
            metadata,
            hg2git,
            git2hg,
            files_meta,
            manifest_generator: ManifestGenerator::new(),
            git_tree_cache: GitTreeCache::new(),
            hg2git_seen: HashSet::new(),
            manifest_heads: HashSet::new(),
        })
    }

    /// `init_phase2` (§6): a cheap re-check of whether this is actually a
    /// cinnabar-tracked repository; returns `false` rather than erroring
    /// when there is simply nothing here yet.
    pub fn init_phase2(&self) -> bool {
        !self.metadata.is_empty()
    }

    pub fn logger(&self) -> &Logger {
        &self.logger
    }

    pub fn metadata(&self) -> &Metadata {
        &self.metadata
    }

    pub fn manifest_heads(&self) -> &HashSet<GitObjectId> {
        &self.manifest_heads
    }

    pub fn reset_manifest_heads(&mut self) {
        self.manifest_heads.clear();
    }

    pub fn add_head(&mut self, id: GitObjectId) {
        self.manifest_heads.insert(id);
    }

    /// `resolve_hg` (§6): looks up a Mercurial node through `hg2git`,
    /// marking it seen so a subsequent `reload` knows it was consulted this
    /// generation.
    pub fn resolve_hg(&mut self, node: &[u8; 20]) -> Option<GitObjectId> {
        self.hg2git_seen.insert(*node);
        self.hg2git.get(node)
    }

    /// `reload` (§4.7, §5): frees notes/caches and reparses the metadata
    /// root. Idempotent (§8, invariant 9): calling it twice in a row with
    /// no intervening writes leaves the same in-memory state.
    pub fn reload(&mut self, store: &dyn ObjectStore) -> Result<()> {
        debug!(self.logger, "reloading store");

        self.hg2git_seen.clear();
        self.git_tree_cache.clear();
        self.manifest_heads.clear();
        self.manifest_generator = ManifestGenerator::new();

        self.metadata = init_metadata(store)?;
        let files_meta_empty = self.metadata.flags & crate::metadata::FILES_META == 0;
        self.hg2git = NotesTree::load(store, self.metadata.roots.hg2git, false)?;
        self.git2hg = NotesTree::load(store, self.metadata.roots.git2hg, false)?;
        self.files_meta = NotesTree::load(store, self.metadata.roots.files_meta, files_meta_empty)?;
        Ok(())
    }

    /// Flushes dirty notes trees and writes a new `refs/cinnabar/metadata`
    /// commit naming them, then returns that root id. Its sixth parent
    /// chains to the metadata commit it replaces (§3, "Metadata root
    /// commit"), so `init_metadata` always finds exactly six parents on
    /// anything this method has ever written. `done` (§6) beyond this point
    /// is just dropping the `Store`; there is no separate teardown step
    /// once the ref is updated.
    pub fn done(&mut self, store: &dyn ObjectStore, message: &str) -> Result<GitObjectId> {
        let hg2git_root = self.hg2git.flush(store)?;
        let git2hg_root = self.git2hg.flush(store)?;
        let files_meta_root = self.files_meta.flush(store)?;

        let parents = [
            self.metadata.roots.changesets,
            self.metadata.roots.manifests,
            hg2git_root,
            git2hg_root,
            files_meta_root,
            self.metadata.commit,
        ];
        if parents.iter().all(|id| *id == NULL_GIT_OID) {
            return Ok(NULL_GIT_OID);
        }

        let empty_tree = store.write_tree(&[], None)?;
        let new_root = store.write_commit(&empty_tree, &parents, message)?;
        store.update_ref(crate::metadata::METADATA_REF, store.read_ref(crate::metadata::METADATA_REF)?, new_root)?;
        Ok(new_root)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use blobstore::MemStore;

    #[test]
    fn init_on_empty_store_has_no_heads() {
        let store = MemStore::new();
        let s = Store::init(&store, StoreOptions::default(), None).unwrap();
        assert!(!s.init_phase2());
        assert!(s.manifest_heads().is_empty());
    }

    #[test]
    fn reload_is_idempotent() {
        let store = MemStore::new();
        let mut s = Store::init(&store, StoreOptions::default(), None).unwrap();
        s.reload(&store).unwrap();
        let after_one = s.manifest_heads().len();
        s.reload(&store).unwrap();
        assert_eq!(after_one, s.manifest_heads().len());
    }

    #[test]
    fn done_on_untouched_empty_store_is_a_no_op() {
        let store = MemStore::new();
        let mut s = Store::init(&store, StoreOptions::default(), None).unwrap();
        let root = s.done(&store, "cinnabar").unwrap();
        assert_eq!(root, NULL_GIT_OID);
    }

    #[test]
    fn done_then_reload_round_trips_through_six_parents() {
        let store = MemStore::new();
        let mut s = Store::init(&store, StoreOptions::default(), None).unwrap();
        s.hg2git.put([7; 20], GitObjectId([8; 20]));

        let first_root = s.done(&store, "cinnabar\n\nfiles-meta\n").unwrap();
        assert_ne!(first_root, NULL_GIT_OID);

        s.reload(&store).unwrap();
        assert_eq!(s.hg2git.get(&[7; 20]), Some(GitObjectId([8; 20])));
        assert_eq!(s.metadata().commit, first_root);
        assert_eq!(s.metadata().roots.metadata, NULL_GIT_OID);

        s.hg2git.put([9; 20], GitObjectId([10; 20]));
        let second_root = s.done(&store, "cinnabar\n\nfiles-meta\n").unwrap();
        assert_ne!(second_root, first_root);

        s.reload(&store).unwrap();
        assert_eq!(s.hg2git.get(&[7; 20]), Some(GitObjectId([8; 20])));
        assert_eq!(s.hg2git.get(&[9; 20]), Some(GitObjectId([10; 20])));
        assert_eq!(s.metadata().roots.metadata, first_root);
    }
}
