//! Property-based tests for core domain types and the branch catalog.
//!
//! These tests use proptest to verify invariants hold across
//! randomly generated inputs.

use std::collections::HashSet;
use std::path::Path;

use proptest::prelude::*;

use worktrack::core::types::{BranchName, Fingerprint, Oid, RefName};
use worktrack::git::{LocalRef, RefListing, RemoteInfo, RemoteRef};
use worktrack::repo::{catalog_from_listing, CatalogOptions};

/// Strategy for generating valid branch name characters.
fn branch_name_char() -> impl Strategy<Value = char> {
    prop_oneof![
        prop::char::range('a', 'z'),
        prop::char::range('A', 'Z'),
        prop::char::range('0', '9'),
        Just('-'),
        Just('_'),
        Just('.'),
        Just('/'),
    ]
}

/// Strategy for generating valid branch names.
fn valid_branch_name() -> impl Strategy<Value = String> {
    prop::collection::vec(branch_name_char(), 1..30).prop_filter_map(
        "must be valid branch name",
        |chars| {
            let name: String = chars.into_iter().collect();
            let bad = name.is_empty()
                || name.starts_with('.')
                || name.starts_with('-')
                || name.ends_with('/')
                || name.ends_with('.')
                || name.contains("..")
                || name.contains("//")
                || name == "@"
                || name
                    .split('/')
                    .any(|c| c.is_empty() || c.starts_with('.') || c.ends_with(".lock"));
            if bad {
                None
            } else {
                BranchName::new(&name).ok().map(|_| name)
            }
        },
    )
}

/// Strategy for generating valid hex OIDs.
fn valid_oid_string() -> impl Strategy<Value = String> {
    prop::collection::vec(
        prop::sample::select(vec![
            '0', '1', '2', '3', '4', '5', '6', '7', '8', '9', 'a', 'b', 'c', 'd', 'e', 'f',
        ]),
        40,
    )
    .prop_map(|chars| chars.into_iter().collect())
}

/// A listing with up to `n` local branches, each possibly listed twice.
fn listing_with_duplicates() -> impl Strategy<Value = (RefListing, usize)> {
    prop::collection::btree_map(valid_branch_name(), valid_oid_string(), 0..12).prop_flat_map(
        |branches| {
            let count = branches.len();
            let entries: Vec<(String, String)> = branches.into_iter().collect();
            prop::collection::vec(any::<bool>(), count).prop_map(move |dup| {
                let mut local = Vec::new();
                for ((name, oid), twice) in entries.iter().zip(dup) {
                    let entry = LocalRef {
                        name: BranchName::new(name).unwrap(),
                        oid: Oid::new(oid).unwrap(),
                        upstream: None,
                    };
                    if twice {
                        local.push(entry.clone());
                    }
                    local.push(entry);
                }
                (
                    RefListing {
                        local,
                        ..RefListing::default()
                    },
                    count,
                )
            })
        },
    )
}

proptest! {
    /// Any valid branch name round-trips through serde.
    #[test]
    fn branch_name_serde_roundtrip(name in valid_branch_name()) {
        let branch = BranchName::new(&name).unwrap();
        let json = serde_json::to_string(&branch).unwrap();
        let parsed: BranchName = serde_json::from_str(&json).unwrap();
        prop_assert_eq!(branch, parsed);
    }

    /// Branch refs strip back to the branch name.
    #[test]
    fn branch_ref_strips_to_name(name in valid_branch_name()) {
        let branch = BranchName::new(&name).unwrap();
        let refname = RefName::for_branch(&branch);
        prop_assert!(refname.is_branch_ref());
        prop_assert_eq!(refname.strip_prefix(RefName::HEADS), Some(name.as_str()));
    }

    /// Remote-tracking refs carry the remote before the branch.
    #[test]
    fn remote_ref_layout(name in valid_branch_name()) {
        let branch = BranchName::new(&name).unwrap();
        let refname = RefName::for_remote_branch("origin", &branch);
        prop_assert!(refname.is_remote_ref());
        let expected = format!("origin/{}", name);
        prop_assert_eq!(refname.strip_prefix(RefName::REMOTES), Some(expected.as_str()));
    }

    /// OIDs normalize to lowercase and short forms are prefixes.
    #[test]
    fn oid_short_is_prefix(hex in valid_oid_string(), len in 0usize..50) {
        let oid = Oid::new(hex.to_uppercase()).unwrap();
        prop_assert_eq!(oid.as_str(), hex.as_str());
        prop_assert!(oid.as_str().starts_with(oid.short(len)));
    }

    /// Fingerprints ignore entry order.
    #[test]
    fn fingerprint_order_independent(
        entries in prop::collection::btree_map("[a-z/]{1,12}", "[0-9a-f]{1,8}", 0..10)
    ) {
        let forward: Vec<_> = entries.iter().collect();
        let mut reversed = forward.clone();
        reversed.reverse();
        prop_assert_eq!(
            Fingerprint::compute(forward.iter().map(|(k, v)| (k.as_str(), v.as_str()))),
            Fingerprint::compute(reversed.iter().map(|(k, v)| (k.as_str(), v.as_str())))
        );
    }

    /// Duplicate listings collapse and every listed branch is findable.
    #[test]
    fn catalog_collapses_duplicates((listing, unique) in listing_with_duplicates()) {
        let names: HashSet<String> = listing.local.iter().map(|r| r.name.to_string()).collect();
        let collection =
            catalog_from_listing(listing, &CatalogOptions::default(), Path::new("/repo")).unwrap();

        prop_assert_eq!(collection.len(), unique);
        for name in &names {
            prop_assert!(collection.find_local_branch(name).is_some());
            prop_assert!(collection.local_hash(name).is_some());
        }
    }

    /// Remote-tracking branches of unconfigured remotes never appear.
    #[test]
    fn catalog_drops_unconfigured_remotes(
        names in prop::collection::btree_set(valid_branch_name(), 1..8),
        oid in valid_oid_string(),
    ) {
        let oid = Oid::new(oid).unwrap();
        let mut remote = Vec::new();
        for name in &names {
            for remote_name in ["origin", "stale"] {
                remote.push(RemoteRef {
                    remote: remote_name.to_string(),
                    name: BranchName::new(name).unwrap(),
                    oid: oid.clone(),
                });
            }
        }
        let listing = RefListing {
            local: Vec::new(),
            remote,
            remotes: vec![RemoteInfo {
                name: "origin".to_string(),
                urls: Vec::new(),
            }],
        };

        let collection =
            catalog_from_listing(listing, &CatalogOptions::default(), Path::new("/repo")).unwrap();

        prop_assert_eq!(collection.len(), names.len());
        prop_assert!(collection.remote_branches().all(|b| b.remote() == "origin"));
    }
}
