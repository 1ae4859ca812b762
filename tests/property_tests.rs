//! Property-based tests for domain types and the commit protocol.
//!
//! These tests use proptest to verify invariants hold across
//! randomly generated inputs.

use std::collections::BTreeMap;
use std::sync::Arc;

use base64::prelude::{Engine as _, BASE64_STANDARD};
use proptest::prelude::*;

use ghcommit::core::types::{
    validate_repo_path, Blob, BlobEncoding, BranchName, CommitRequest, FileChange, Oid,
};
use ghcommit::engine::{decode_blob, CommitEngine};
use ghcommit::store::mock::MockStore;

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
    prop::collection::vec(branch_name_char(), 1..50).prop_filter_map(
        "must be valid branch name",
        |chars| {
            let name: String = chars.into_iter().collect();
            let bad = name.starts_with('-')
                || name.ends_with('/')
                || name.contains("..")
                || name.contains("//")
                || name
                    .split('/')
                    .any(|c| c.starts_with('.') || c.ends_with(".lock"));
            if bad {
                None
            } else {
                Some(name)
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

/// Strategy for generating repository paths of one to three segments.
fn repo_path() -> impl Strategy<Value = String> {
    prop::collection::vec("[a-z0-9_-]{1,8}(\\.[a-z]{1,3})?", 1..4).prop_map(|s| s.join("/"))
}

/// Change sets with unique paths, none of which is a directory of another.
fn change_set() -> impl Strategy<Value = BTreeMap<String, String>> {
    prop::collection::btree_map(repo_path(), "\\PC{0,64}", 1..8).prop_filter(
        "no path may be a directory of another",
        |files| {
            files.keys().all(|a| {
                files
                    .keys()
                    .all(|b| !b.starts_with(&format!("{}/", a)))
            })
        },
    )
}

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread()
        .build()
        .unwrap()
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

    /// Branch refs live under `heads/`.
    #[test]
    fn branch_ref_path(name in valid_branch_name()) {
        let branch = BranchName::new(&name).unwrap();
        prop_assert_eq!(branch.ref_path(), format!("heads/{}", name));
    }

    /// OIDs are normalized to lowercase.
    #[test]
    fn oid_normalized_to_lowercase(oid_str in valid_oid_string()) {
        let oid = Oid::new(oid_str.to_uppercase()).unwrap();
        prop_assert_eq!(oid.as_str(), oid_str.as_str());
    }

    /// Oid::short returns correct prefix.
    #[test]
    fn oid_short_is_prefix(oid_str in valid_oid_string(), len in 1usize..40) {
        let oid = Oid::new(&oid_str).unwrap();
        prop_assert!(oid_str.starts_with(oid.short(len)));
    }

    /// Generated repository paths validate; any `..` segment never does.
    #[test]
    fn repo_paths_validate(path in repo_path(), prefix in repo_path()) {
        prop_assert!(validate_repo_path(&path).is_ok());
        let joined = format!("{}/../{}", prefix, path);
        prop_assert!(validate_repo_path(&joined).is_err());
        let absolute = format!("/{}", path);
        prop_assert!(validate_repo_path(&absolute).is_err());
    }

    /// Base64 blobs decode to their bytes regardless of line wrapping.
    #[test]
    fn base64_blobs_decode(bytes in prop::collection::vec(any::<u8>(), 0..512), width in 4usize..80) {
        let encoded = BASE64_STANDARD.encode(&bytes);
        let wrapped: Vec<String> = encoded
            .as_bytes()
            .chunks(width)
            .map(|c| String::from_utf8(c.to_vec()).unwrap())
            .collect();
        let blob = Blob {
            sha: Oid::from([0u8; 20]),
            encoding: BlobEncoding::Base64,
            content: wrapped.join("\n"),
        };
        prop_assert_eq!(decode_blob(&blob).unwrap().into_bytes(), bytes);
    }

    /// UTF-8 blobs are never base64-decoded.
    #[test]
    fn utf8_blobs_are_verbatim(text in "\\PC{0,128}") {
        let blob = Blob {
            sha: Oid::from([0u8; 20]),
            encoding: BlobEncoding::Utf8,
            content: text.clone(),
        };
        let decoded = decode_blob(&blob).unwrap();
        prop_assert_eq!(decoded.as_text(), Some(text.as_str()));
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(48))]

    /// A commit holds every changed path with its new content, leaves other
    /// paths alone, and every change reads back exactly.
    #[test]
    fn commit_is_atomic_and_round_trips(files in change_set()) {
        let rt = runtime();
        let store = MockStore::new();
        let main = BranchName::new("main").unwrap();
        let c0 = store.seed_branch(&main, &[("zz-untouched/KEEP", "keep")]);
        let engine = CommitEngine::new(Arc::new(store.clone()));

        let request = CommitRequest::new(main.clone(), "bulk").changes(
            files.iter().map(|(p, c)| FileChange::new(p.clone(), c.clone())),
        );
        let c1 = rt.block_on(engine.commit(&request)).unwrap();

        let commit = store.commit_sync(&c1).unwrap();
        prop_assert_eq!(commit.parents, vec![c0]);

        let stored = store.files_at(&c1);
        for (path, content) in &files {
            prop_assert_eq!(stored.get(path).map(Vec::as_slice), Some(content.as_bytes()));
            let read = rt.block_on(engine.get_file(&main, path)).unwrap();
            prop_assert_eq!(read.as_text(), Some(content.as_str()));
        }
        if !files.contains_key("zz-untouched/KEEP") {
            prop_assert_eq!(stored.get("zz-untouched/KEEP").map(Vec::as_slice), Some(&b"keep"[..]));
        }
    }

    /// Any change set repeating a path is rejected before a store call.
    #[test]
    fn duplicate_paths_rejected_offline(files in change_set(), pick in any::<prop::sample::Index>()) {
        let rt = runtime();
        let store = MockStore::new();
        let main = BranchName::new("main").unwrap();
        store.seed_branch(&main, &[("README", "a")]);
        store.clear_operations();
        let engine = CommitEngine::new(Arc::new(store.clone()));

        let paths: Vec<&String> = files.keys().collect();
        let dup = paths[pick.index(paths.len())].clone();
        let request = CommitRequest::new(main, "dup")
            .changes(files.iter().map(|(p, c)| FileChange::new(p.clone(), c.clone())))
            .change(FileChange::new(dup, "again"));

        let err = rt.block_on(engine.commit(&request)).unwrap_err();
        prop_assert!(err.is_validation());
        prop_assert!(store.operations().is_empty());
    }
}
