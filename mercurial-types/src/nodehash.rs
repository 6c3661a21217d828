// Copyright (c) 2004-present, Facebook, Inc.
// All Rights Reserved.
//
// This software may be used and distributed according to the terms of the
// GNU General Public License version 2 or any later version.

//! The two disjoint 20-byte hash namespaces (Mercurial node ids, Git object
//! ids) and the Mercurial node-hash function, `hg_sha1`.

use std::fmt::{self, Display};
use std::str::FromStr;

use crypto::digest::Digest;
use crypto::sha1::Sha1;

use crate::errors::ErrorKind;

const HASH_LEN: usize = 20;

macro_rules! hash_type {
    ($name:ident, $doc:expr) => {
        #[doc = $doc]
        #[derive(Clone, Copy, Eq, PartialEq, Ord, PartialOrd, Hash, Default)]
        pub struct $name(pub [u8; HASH_LEN]);

        impl $name {
            pub fn as_bytes(&self) -> &[u8] {
                &self.0
            }

            pub fn is_null(&self) -> bool {
                self.0 == [0; HASH_LEN]
            }

            pub fn to_hex(&self) -> String {
                let mut s = String::with_capacity(HASH_LEN * 2);
                for b in &self.0 {
                    s.push_str(&format!("{:02x}", b));
                }
                s
            }
        }

        impl FromStr for $name {
            type Err = ErrorKind;

            fn from_str(s: &str) -> Result<Self, ErrorKind> {
                if s.len() != HASH_LEN * 2 {
                    return Err(ErrorKind::BadNodeHash(s.as_bytes().to_vec()));
                }
                let mut out = [0u8; HASH_LEN];
                for (i, chunk) in s.as_bytes().chunks(2).enumerate() {
                    let byte_str = std::str::from_utf8(chunk)
                        .map_err(|_| ErrorKind::BadNodeHash(s.as_bytes().to_vec()))?;
                    out[i] = u8::from_str_radix(byte_str, 16)
                        .map_err(|_| ErrorKind::BadNodeHash(s.as_bytes().to_vec()))?;
                }
                Ok($name(out))
            }
        }

        impl Display for $name {
            fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
                write!(fmt, "{}", self.to_hex())
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
                write!(fmt, "{}({})", stringify!($name), self.to_hex())
            }
        }

        impl From<[u8; HASH_LEN]> for $name {
            fn from(bytes: [u8; HASH_LEN]) -> Self {
                $name(bytes)
            }
        }
    };
}

// Two distinct namespaces: a Mercurial node id must never be compared
// against, or substituted for, a Git object id without an explicit, named
// conversion (there is none here on purpose).
hash_type!(HgNodeHash, "A 20-byte Mercurial revlog node id.");
hash_type!(GitObjectId, "A 20-byte Git object id (blob/tree/commit).");

pub const NULL_HASH: HgNodeHash = HgNodeHash([0; HASH_LEN]);
pub const NULL_GIT_OID: GitObjectId = GitObjectId([0; HASH_LEN]);

/// `hg_sha1(data, p1, p2) = SHA1(min(p1,p2) ++ max(p1,p2) ++ data)`, with
/// missing parents substituted by the all-zero node id. This is the
/// Mercurial revlog node-hash function used to verify both reconstructed
/// manifests (§4.5) and file revisions.
pub fn hg_sha1(data: &[u8], p1: &HgNodeHash, p2: &HgNodeHash) -> HgNodeHash {
    let (lo, hi) = if p1 <= p2 { (p1, p2) } else { (p2, p1) };

    let mut hasher = Sha1::new();
    hasher.input(lo.as_bytes());
    hasher.input(hi.as_bytes());
    hasher.input(data);

    let mut out = [0u8; HASH_LEN];
    hasher.result(&mut out);
    HgNodeHash(out)
}

#[cfg(test)]
impl quickcheck::Arbitrary for HgNodeHash {
    fn arbitrary(g: &mut quickcheck::Gen) -> Self {
        let mut out = [0u8; HASH_LEN];
        for b in out.iter_mut() {
            *b = u8::arbitrary(g);
        }
        HgNodeHash(out)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn null_hash_is_null() {
        assert!(NULL_HASH.is_null());
        assert!(!GitObjectId([1; HASH_LEN]).is_null());
    }

    #[test]
    fn hex_roundtrip() {
        let hex = "da39a3ee5e6b4b0d3255bfef95601890afd80709";
        let h = HgNodeHash::from_str(hex).unwrap();
        assert_eq!(h.to_hex(), hex);
    }

    #[test]
    fn hg_sha1_orders_parents() {
        let data = b"hello";
        let a = HgNodeHash([1; HASH_LEN]);
        let b = HgNodeHash([2; HASH_LEN]);
        assert_eq!(hg_sha1(data, &a, &b), hg_sha1(data, &b, &a));
    }

    #[test]
    fn hg_sha1_matches_known_vector() {
        // sha1("") == the well known empty-string SHA1.
        let h = hg_sha1(b"", &NULL_HASH, &NULL_HASH);
        assert_eq!(h.to_hex(), "da39a3ee5e6b4b0d3255bfef95601890afd80709");
    }
}
