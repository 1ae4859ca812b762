//! Integration tests for the commit engine.
//!
//! These run the full commit protocol against `MockStore`. A yielding
//! wrapper forces a suspension before every store call so that concurrent
//! commits really interleave their round trips.

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;

use ghcommit::core::types::{
    Blob, BranchName, Commit, CommitRequest, FileChange, FileMode, NewTreeEntry, Oid,
    RecursiveTree, Ref, Tree,
};
use ghcommit::engine::{CommitEngine, CommitWriter, FileReader, RefGate, TreeBuilder};
use ghcommit::store::mock::{FailOn, MockOperation, MockStore};
use ghcommit::store::{StoreError, VersionStore};

fn main_branch() -> BranchName {
    BranchName::new("main").unwrap()
}

/// `main` at C0 with tree `{README: "a"}`.
fn seeded() -> (MockStore, Oid) {
    let store = MockStore::new();
    let c0 = store.seed_branch(&main_branch(), &[("README", "a")]);
    store.clear_operations();
    (store, c0)
}

fn engine(store: &MockStore) -> CommitEngine {
    CommitEngine::new(Arc::new(store.clone()))
}

/// Delegates to a `MockStore`, yielding to the scheduler before each call.
struct YieldingStore(MockStore);

#[async_trait]
impl VersionStore for YieldingStore {
    fn name(&self) -> &'static str {
        "yielding-mock"
    }

    async fn get_ref(&self, branch: &BranchName) -> Result<Ref, StoreError> {
        tokio::task::yield_now().await;
        self.0.get_ref(branch).await
    }

    async fn get_commit(&self, sha: &Oid) -> Result<Commit, StoreError> {
        tokio::task::yield_now().await;
        self.0.get_commit(sha).await
    }

    async fn create_tree(
        &self,
        base_tree: &Oid,
        entries: &[NewTreeEntry],
    ) -> Result<Tree, StoreError> {
        tokio::task::yield_now().await;
        self.0.create_tree(base_tree, entries).await
    }

    async fn create_commit(
        &self,
        tree: &Oid,
        parents: &[Oid],
        message: &str,
    ) -> Result<Commit, StoreError> {
        tokio::task::yield_now().await;
        self.0.create_commit(tree, parents, message).await
    }

    async fn update_ref(
        &self,
        branch: &BranchName,
        sha: &Oid,
        force: bool,
    ) -> Result<Ref, StoreError> {
        tokio::task::yield_now().await;
        self.0.update_ref(branch, sha, force).await
    }

    async fn get_tree_recursive(&self, sha: &Oid) -> Result<RecursiveTree, StoreError> {
        tokio::task::yield_now().await;
        self.0.get_tree_recursive(sha).await
    }

    async fn get_blob(&self, sha: &Oid) -> Result<Blob, StoreError> {
        tokio::task::yield_now().await;
        self.0.get_blob(sha).await
    }
}

mod scenarios {
    use super::*;

    #[tokio::test]
    async fn update_readme() {
        let (store, c0) = seeded();
        let engine = engine(&store);

        let request =
            CommitRequest::new(main_branch(), "update").change(FileChange::new("README", "b"));
        let c1 = engine.commit(&request).await.unwrap();

        let commit = store.commit_sync(&c1).unwrap();
        assert_eq!(commit.parents, vec![c0]);
        assert_eq!(commit.message, "update");
        assert_eq!(store.ref_commit(&main_branch()), Some(c1.clone()));

        let files = store.files_at(&c1);
        assert_eq!(files.len(), 1);
        assert_eq!(files["README"], b"b".to_vec());

        let readme = engine.get_file(&main_branch(), "README").await.unwrap();
        assert_eq!(readme.as_text(), Some("b"));
    }

    #[tokio::test]
    async fn many_files_in_one_commit() {
        let (store, c0) = seeded();
        let engine = engine(&store);
        let commits_before = store.commit_count();

        let request = CommitRequest::new(main_branch(), "publish").changes([
            FileChange::new("posts/2014/01/one.md", "first"),
            FileChange::new("posts/2014/02/two.md", "second"),
            FileChange::new("index.html", "<ul><li>one</li><li>two</li></ul>"),
            FileChange::executable("bin/rebuild", "#!/bin/sh\nexit 0\n"),
        ]);
        let c1 = engine.commit(&request).await.unwrap();

        assert_eq!(store.commit_count(), commits_before + 1);
        assert_eq!(store.commit_sync(&c1).unwrap().parents, vec![c0]);

        let files = store.files_at(&c1);
        assert_eq!(files.len(), 5);
        assert_eq!(files["README"], b"a".to_vec());
        assert_eq!(files["posts/2014/02/two.md"], b"second".to_vec());
        assert_eq!(store.mode_at(&c1, "bin/rebuild"), Some(FileMode::Executable));
        assert_eq!(store.mode_at(&c1, "index.html"), Some(FileMode::Normal));

        let creates = store
            .operations()
            .into_iter()
            .filter(|op| matches!(op, MockOperation::CreateTree { .. }))
            .count();
        assert_eq!(creates, 1);
    }

    #[tokio::test]
    async fn successive_commits_form_a_line() {
        let (store, c0) = seeded();
        let engine = engine(&store);

        let mut parent = c0;
        for i in 0..4 {
            let request = CommitRequest::new(main_branch(), format!("rev {}", i))
                .change(FileChange::new("README", format!("rev {}", i)));
            let sha = engine.commit(&request).await.unwrap();
            assert_eq!(store.commit_sync(&sha).unwrap().parents, vec![parent]);
            parent = sha;
        }

        let readme = engine.get_file(&main_branch(), "README").await.unwrap();
        assert_eq!(readme.as_text(), Some("rev 3"));
    }

    #[tokio::test]
    async fn executable_flag_can_be_dropped() {
        let (store, _) = seeded();
        let engine = engine(&store);

        let c1 = engine
            .commit(&CommitRequest::new(main_branch(), "add").change(FileChange::executable("run", "x")))
            .await
            .unwrap();
        assert_eq!(store.mode_at(&c1, "run"), Some(FileMode::Executable));

        let c2 = engine
            .commit(&CommitRequest::new(main_branch(), "chmod").change(FileChange::new("run", "x")))
            .await
            .unwrap();
        assert_eq!(store.mode_at(&c2, "run"), Some(FileMode::Normal));
    }

    #[tokio::test]
    async fn missing_branch_is_not_found() {
        let (store, _) = seeded();
        let request = CommitRequest::new(BranchName::new("gh-pages").unwrap(), "m")
            .change(FileChange::new("a", "b"));

        let err = engine(&store).commit(&request).await.unwrap_err();
        assert!(matches!(err, StoreError::NotFound(_)));
        assert!(store.operations().iter().all(|op| !op.is_mutation()));
    }
}

mod rejection {
    use super::*;

    #[tokio::test]
    async fn empty_change_set_makes_no_calls() {
        let (store, c0) = seeded();
        let err = engine(&store)
            .commit(&CommitRequest::new(main_branch(), "empty"))
            .await
            .unwrap_err();

        assert!(err.is_no_op());
        assert!(err.is_validation());
        assert!(store.operations().is_empty());
        assert_eq!(store.ref_commit(&main_branch()), Some(c0));
    }

    #[tokio::test]
    async fn duplicate_paths_make_no_calls() {
        let (store, _) = seeded();
        let request = CommitRequest::new(main_branch(), "dup")
            .change(FileChange::new("README", "b"))
            .change(FileChange::executable("README", "c"));

        let err = engine(&store).commit(&request).await.unwrap_err();
        assert!(matches!(err, StoreError::Validation(_)));
        assert!(store.operations().is_empty());
    }

    #[tokio::test]
    async fn malformed_path_makes_no_calls() {
        let (store, _) = seeded();
        let request =
            CommitRequest::new(main_branch(), "bad").change(FileChange::new("../escape", "x"));

        let err = engine(&store).commit(&request).await.unwrap_err();
        assert!(err.is_validation());
        assert!(store.operations().is_empty());
    }
}

mod failures {
    use super::*;

    async fn fails_without_moving(fail_on: FailOn) -> StoreError {
        let (store, c0) = seeded();
        let store = store.fail_on(fail_on);
        let request =
            CommitRequest::new(main_branch(), "update").change(FileChange::new("README", "b"));

        let err = engine(&store).commit(&request).await.unwrap_err();
        assert_eq!(store.ref_commit(&main_branch()), Some(c0));
        err
    }

    #[tokio::test]
    async fn each_step_failure_leaves_branch() {
        let transport = || StoreError::Transport("connection reset".into());

        for fail_on in [
            FailOn::GetRef(transport()),
            FailOn::GetCommit(transport()),
            FailOn::CreateTree(transport()),
            FailOn::CreateCommit(transport()),
            FailOn::UpdateRef(transport()),
        ] {
            let err = fails_without_moving(fail_on).await;
            assert!(err.is_transient());
        }
    }

    #[tokio::test]
    async fn errors_propagate_unchanged() {
        let err = fails_without_moving(FailOn::CreateTree(StoreError::AuthFailed(
            "permission denied".into(),
        )))
        .await;
        assert!(matches!(err, StoreError::AuthFailed(msg) if msg == "permission denied"));
    }

    #[tokio::test]
    async fn failed_update_leaves_orphans_only() {
        let (store, c0) = seeded();
        let store = store.fail_on(FailOn::UpdateRef(StoreError::RateLimited));
        let before = store.commit_count();

        let request =
            CommitRequest::new(main_branch(), "update").change(FileChange::new("README", "b"));
        assert!(engine(&store).commit(&request).await.is_err());

        // The commit object exists but nothing references it.
        assert_eq!(store.commit_count(), before + 1);
        assert_eq!(store.ref_commit(&main_branch()), Some(c0));
    }

    #[tokio::test]
    async fn past_deadline_cancels() {
        let (store, _) = seeded();
        let request = CommitRequest::new(main_branch(), "late")
            .change(FileChange::new("README", "b"))
            .deadline(Instant::now());

        let err = engine(&store).commit(&request).await.unwrap_err();
        assert!(matches!(err, StoreError::Cancelled(_)));
        assert!(store.operations().is_empty());
    }

    /// Delegates to a `MockStore`, but `create_commit` returns only once
    /// `until` has passed.
    struct SlowCommitStore {
        inner: MockStore,
        until: Instant,
    }

    #[async_trait]
    impl VersionStore for SlowCommitStore {
        fn name(&self) -> &'static str {
            "slow-commit-mock"
        }

        async fn get_ref(&self, branch: &BranchName) -> Result<Ref, StoreError> {
            self.inner.get_ref(branch).await
        }

        async fn get_commit(&self, sha: &Oid) -> Result<Commit, StoreError> {
            self.inner.get_commit(sha).await
        }

        async fn create_tree(
            &self,
            base_tree: &Oid,
            entries: &[NewTreeEntry],
        ) -> Result<Tree, StoreError> {
            self.inner.create_tree(base_tree, entries).await
        }

        async fn create_commit(
            &self,
            tree: &Oid,
            parents: &[Oid],
            message: &str,
        ) -> Result<Commit, StoreError> {
            let commit = self.inner.create_commit(tree, parents, message).await;
            let wait = self.until.saturating_duration_since(Instant::now());
            std::thread::sleep(wait + Duration::from_millis(5));
            commit
        }

        async fn update_ref(
            &self,
            branch: &BranchName,
            sha: &Oid,
            force: bool,
        ) -> Result<Ref, StoreError> {
            self.inner.update_ref(branch, sha, force).await
        }

        async fn get_tree_recursive(&self, sha: &Oid) -> Result<RecursiveTree, StoreError> {
            self.inner.get_tree_recursive(sha).await
        }

        async fn get_blob(&self, sha: &Oid) -> Result<Blob, StoreError> {
            self.inner.get_blob(sha).await
        }
    }

    #[tokio::test]
    async fn deadline_passing_mid_commit_leaves_orphans() {
        let (store, c0) = seeded();
        let before = store.commit_count();
        let deadline = Instant::now() + Duration::from_millis(250);
        let engine = CommitEngine::new(Arc::new(SlowCommitStore {
            inner: store.clone(),
            until: deadline,
        }));

        let request = CommitRequest::new(main_branch(), "slow")
            .change(FileChange::new("README", "b"))
            .deadline(deadline);
        let err = engine.commit(&request).await.unwrap_err();

        assert!(matches!(&err, StoreError::Cancelled(msg) if msg.contains("update_ref")));
        assert_eq!(store.commit_count(), before + 1);
        let ops = store.operations();
        assert!(ops.iter().any(|op| matches!(op, MockOperation::CreateTree { .. })));
        assert!(!ops.iter().any(|op| matches!(op, MockOperation::UpdateRef { .. })));
        assert_eq!(store.ref_commit(&main_branch()), Some(c0));
    }

    #[tokio::test]
    async fn distant_deadline_does_not_interfere() {
        let (store, _) = seeded();
        let request = CommitRequest::new(main_branch(), "ok")
            .change(FileChange::new("README", "b"))
            .deadline(Instant::now() + Duration::from_secs(300));

        assert!(engine(&store).commit(&request).await.is_ok());
    }
}

mod conflicts {
    use super::*;

    #[tokio::test]
    async fn external_advance_is_conflict() {
        let (store, _) = seeded();
        store.advance_before_next_update(&main_branch(), &[("README", "theirs")]);

        let request =
            CommitRequest::new(main_branch(), "mine").change(FileChange::new("README", "mine"));
        let err = engine(&store).commit(&request).await.unwrap_err();
        assert!(err.is_conflict());

        // The other actor's commit stays.
        let head = store.ref_commit(&main_branch()).unwrap();
        assert_eq!(store.files_at(&head)["README"], b"theirs".to_vec());
        assert_eq!(store.commit_sync(&head).unwrap().message, "concurrent update");
    }

    #[tokio::test]
    async fn force_overwrites_external_advance() {
        let (store, c0) = seeded();
        store.advance_before_next_update(&main_branch(), &[("README", "theirs")]);

        let request = CommitRequest::new(main_branch(), "recover")
            .change(FileChange::new("README", "mine"))
            .force(true);
        let sha = engine(&store).commit(&request).await.unwrap();

        assert_eq!(store.ref_commit(&main_branch()), Some(sha.clone()));
        assert_eq!(store.commit_sync(&sha).unwrap().parents, vec![c0]);
        assert_eq!(store.files_at(&sha)["README"], b"mine".to_vec());
    }

    #[tokio::test]
    async fn caller_retry_after_conflict_succeeds() {
        let (store, _) = seeded();
        let engine = engine(&store);
        store.advance_before_next_update(&main_branch(), &[("OTHER", "x")]);

        let request =
            CommitRequest::new(main_branch(), "mine").change(FileChange::new("README", "mine"));
        assert!(engine.commit(&request).await.unwrap_err().is_conflict());

        let theirs = store.ref_commit(&main_branch()).unwrap();
        let sha = engine.commit(&request).await.unwrap();
        assert_eq!(store.commit_sync(&sha).unwrap().parents, vec![theirs]);

        let files = store.files_at(&sha);
        assert_eq!(files["OTHER"], b"x".to_vec());
        assert_eq!(files["README"], b"mine".to_vec());
    }

    #[tokio::test]
    async fn interleaved_protocol_steps() {
        let (store, c0) = seeded();
        let main = main_branch();

        // Two writers read the same head...
        let gate = RefGate::new(&store);
        let a = gate.read(&main).await.unwrap();
        let b = gate.read(&main).await.unwrap();
        assert_eq!(a, b);

        // ...build on it...
        let builder = TreeBuilder::new(&store);
        let writer = CommitWriter::new(&store);
        let tree_a = builder.build(&a.tree, &[FileChange::new("README", "A")]).await.unwrap();
        let tree_b = builder.build(&b.tree, &[FileChange::new("README", "B")]).await.unwrap();
        let commit_a = writer.write(&tree_a, &a.commit, "A").await.unwrap();
        let commit_b = writer.write(&tree_b, &b.commit, "B").await.unwrap();

        // ...and only the first to advance wins.
        gate.advance(&main, &c0, &commit_a, false).await.unwrap();
        let err = gate.advance(&main, &c0, &commit_b, false).await.unwrap_err();
        assert!(err.is_conflict());
        assert_eq!(store.ref_commit(&main), Some(commit_a));
    }

    #[tokio::test]
    async fn independent_engines_race() {
        let (mock, c0) = seeded();
        let store: Arc<dyn VersionStore> = Arc::new(YieldingStore(mock.clone()));
        let first = CommitEngine::new(store.clone());
        let second = CommitEngine::new(store);

        let a = CommitRequest::new(main_branch(), "A").change(FileChange::new("README", "A"));
        let b = CommitRequest::new(main_branch(), "B").change(FileChange::new("README", "B"));
        let (ra, rb) = tokio::join!(first.commit(&a), second.commit(&b));

        let (winner, loser) = match (ra, rb) {
            (Ok(sha), Err(err)) | (Err(err), Ok(sha)) => (sha, err),
            other => panic!("expected exactly one success, got {:?}", other),
        };
        assert!(loser.is_conflict());
        assert_eq!(mock.commit_sync(&winner).unwrap().parents, vec![c0]);
        assert_eq!(mock.ref_commit(&main_branch()), Some(winner));
    }

    #[tokio::test]
    async fn one_engine_serializes_its_callers() {
        let (mock, c0) = seeded();
        let engine = CommitEngine::new(Arc::new(YieldingStore(mock.clone())));

        let a = CommitRequest::new(main_branch(), "A").change(FileChange::new("a.txt", "A"));
        let b = CommitRequest::new(main_branch(), "B").change(FileChange::new("b.txt", "B"));
        let (ra, rb) = tokio::join!(engine.commit(&a), engine.commit(&b));
        let (sha_a, sha_b) = (ra.unwrap(), rb.unwrap());

        // One built on top of the other; neither change was lost.
        let parent_a = mock.commit_sync(&sha_a).unwrap().parents;
        let parent_b = mock.commit_sync(&sha_b).unwrap().parents;
        let head = mock.ref_commit(&main_branch()).unwrap();
        assert!(
            (parent_a == vec![c0.clone()] && parent_b == vec![sha_a.clone()] && head == sha_b)
                || (parent_b == vec![c0] && parent_a == vec![sha_b] && head == sha_a)
        );

        let files = mock.files_at(&head);
        assert_eq!(files["a.txt"], b"A".to_vec());
        assert_eq!(files["b.txt"], b"B".to_vec());
    }

    #[tokio::test]
    async fn reads_run_alongside_commit() {
        let (mock, _) = seeded();
        let engine = CommitEngine::new(Arc::new(YieldingStore(mock.clone())));

        let request =
            CommitRequest::new(main_branch(), "update").change(FileChange::new("README", "b"));
        let branch = main_branch();
        let (committed, read) = tokio::join!(
            engine.commit(&request),
            engine.get_file(&branch, "README")
        );

        assert!(committed.is_ok());
        let text = read.unwrap();
        assert!(matches!(text.as_text(), Some("a") | Some("b")));
    }
}

mod reads {
    use super::*;

    #[tokio::test]
    async fn reader_sees_latest_head() {
        let (store, _) = seeded();
        let reader = FileReader::new(&store);
        assert_eq!(
            reader.get(&main_branch(), "README").await.unwrap().as_text(),
            Some("a")
        );

        store.seed_branch(&main_branch(), &[("README", "fresh")]);
        assert_eq!(
            reader.get(&main_branch(), "README").await.unwrap().as_text(),
            Some("fresh")
        );
    }

    #[tokio::test]
    async fn blob_failure_propagates() {
        let (store, _) = seeded();
        let store = store.fail_on(FailOn::GetBlob(StoreError::Transport("timeout".into())));

        let err = FileReader::new(&store)
            .get(&main_branch(), "README")
            .await
            .unwrap_err();
        assert!(err.is_transient());
    }

    #[tokio::test]
    async fn malformed_path_is_validation() {
        let (store, _) = seeded();
        let err = FileReader::new(&store)
            .get(&main_branch(), "/README")
            .await
            .unwrap_err();
        assert!(err.is_validation());
        assert!(store.operations().is_empty());
    }
}
