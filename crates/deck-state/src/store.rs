//! Crash-safe document store.
//!
//! One JSON document per repository under `.deck/`, guarded by a sibling
//! advisory lock file. Reads take a shared lock, writes an exclusive lock;
//! the lock is a `File` and releases on every exit path when it drops.
//! Writes land in a sibling `.tmp` file and are renamed over the target in
//! one operation, so a failed process never leaves a half-written document.

use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};

use fs2::FileExt;
use rand::rngs::OsRng;
use rand::RngCore;
use tracing::debug;

use crate::types::{Instance, StoreRoot};
use crate::{StateError, StateResult};

/// Directory under the repository root holding all Deck metadata.
pub const DECK_DIR: &str = ".deck";

const STATE_FILE: &str = "state.json";

/// Handle on one repository's state document.
#[derive(Debug, Clone)]
pub struct Store {
    repo_root: PathBuf,
}

impl Store {
    pub fn new<P: AsRef<Path>>(repo_root: P) -> Self {
        Self {
            repo_root: repo_root.as_ref().to_path_buf(),
        }
    }

    pub fn deck_dir(&self) -> PathBuf {
        self.repo_root.join(DECK_DIR)
    }

    pub fn state_path(&self) -> PathBuf {
        self.deck_dir().join(STATE_FILE)
    }

    fn lock_path(&self) -> PathBuf {
        self.deck_dir().join(format!("{STATE_FILE}.lock"))
    }

    fn tmp_path(&self) -> PathBuf {
        self.deck_dir().join(format!("{STATE_FILE}.tmp"))
    }

    fn lock_file(&self) -> StateResult<File> {
        fs::create_dir_all(self.deck_dir())?;
        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .read(true)
            .write(true)
            .open(self.lock_path())?;
        Ok(file)
    }

    /// Read the document under a shared lock. A missing file decodes as an
    /// empty root.
    pub fn load(&self) -> StateResult<StoreRoot> {
        let lock = self.lock_file()?;
        lock.lock_shared()?;
        self.read_document()
    }

    /// Replace the document under an exclusive lock.
    pub fn save(&self, root: &StoreRoot) -> StateResult<()> {
        let lock = self.lock_file()?;
        lock.lock_exclusive()?;
        self.write_document(root)
    }

    /// Append an instance. An empty `id` is replaced with a freshly minted
    /// one; the persisted record is returned. Uniqueness of caller-supplied
    /// ids is the caller's responsibility.
    pub fn add_instance(&self, mut instance: Instance) -> StateResult<Instance> {
        if instance.id.is_empty() {
            instance.id = generate_id();
        }

        let lock = self.lock_file()?;
        lock.lock_exclusive()?;

        let mut root = self.read_document()?;
        root.instances.push(instance.clone());
        self.write_document(&root)?;
        Ok(instance)
    }

    /// Record the repository path and session name on the root document.
    /// Writes only when the stored values differ.
    pub fn set_root_meta(&self, repo: &str, session: &str) -> StateResult<()> {
        let lock = self.lock_file()?;
        lock.lock_exclusive()?;

        let mut root = self.read_document()?;
        if root.repo != repo || root.session != session {
            root.repo = repo.to_string();
            root.session = session.to_string();
            self.write_document(&root)?;
        }
        Ok(())
    }

    /// Remove an instance by id. Removing an absent id is not an error.
    pub fn remove_instance(&self, id: &str) -> StateResult<()> {
        let lock = self.lock_file()?;
        lock.lock_exclusive()?;

        let mut root = self.read_document()?;
        root.instances.retain(|inst| inst.id != id);
        self.write_document(&root)
    }

    /// Apply `mutate` to the instance with `id` and persist the result.
    pub fn update_instance<F>(&self, id: &str, mutate: F) -> StateResult<()>
    where
        F: FnOnce(&mut Instance),
    {
        let lock = self.lock_file()?;
        lock.lock_exclusive()?;

        let mut root = self.read_document()?;
        let instance = root
            .instance_mut(id)
            .ok_or_else(|| StateError::NotFound(id.to_string()))?;
        mutate(instance);
        self.write_document(&root)
    }

    fn read_document(&self) -> StateResult<StoreRoot> {
        let path = self.state_path();
        let data = match fs::read(&path) {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Ok(StoreRoot::default());
            }
            Err(e) => return Err(e.into()),
        };
        Ok(serde_json::from_slice(&data)?)
    }

    fn write_document(&self, root: &StoreRoot) -> StateResult<()> {
        let data = serde_json::to_vec_pretty(root)?;
        let tmp = self.tmp_path();

        fs::write(&tmp, data)?;
        if let Err(e) = fs::rename(&tmp, self.state_path()) {
            let _ = fs::remove_file(&tmp);
            return Err(e.into());
        }
        debug!(target: "deck::state", path = %self.state_path().display(), "state written");
        Ok(())
    }
}

/// Mint a six-character lowercase hex id from a 24-bit cryptographic
/// random source.
pub fn generate_id() -> String {
    let mut bytes = [0u8; 3];
    OsRng.fill_bytes(&mut bytes);
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Status, SubPane};
    use chrono::Utc;
    use tempfile::TempDir;

    fn instance(id: &str, branch: &str) -> Instance {
        Instance {
            id: id.into(),
            name: branch.into(),
            branch: branch.into(),
            base_branch: "main".into(),
            worktree_path: format!("/repo/.worktrees/{branch}").into(),
            window_id: format!("@{branch}"),
            primary_pane_id: "%0".into(),
            sub_panes: vec![],
            agent_pid: 0,
            status: Status::Running,
            created_at: Utc::now(),
            last_activity: Utc::now(),
            pr_url: None,
            conflicts_with: vec![],
            depends_on: vec![],
        }
    }

    #[test]
    fn load_missing_file_yields_empty_root() {
        let dir = TempDir::new().unwrap();
        let store = Store::new(dir.path());
        let root = store.load().unwrap();
        assert!(root.instances.is_empty());
    }

    #[test]
    fn save_then_load_roundtrips() {
        let dir = TempDir::new().unwrap();
        let store = Store::new(dir.path());

        let root = StoreRoot {
            repo: dir.path().display().to_string(),
            session: "deck-x".into(),
            instances: vec![instance("aaaaaa", "feat-a")],
        };
        store.save(&root).unwrap();

        let back = store.load().unwrap();
        assert_eq!(root, back);
        // The temp file must not linger after a successful rename.
        assert!(!store.tmp_path().exists());
    }

    #[test]
    fn add_mints_id_when_empty() {
        let dir = TempDir::new().unwrap();
        let store = Store::new(dir.path());

        let added = store.add_instance(instance("", "feat-a")).unwrap();
        assert_eq!(added.id.len(), 6);
        assert!(added.id.chars().all(|c| c.is_ascii_hexdigit()));

        let root = store.load().unwrap();
        assert_eq!(root.instances.len(), 1);
        assert_eq!(root.instances[0].id, added.id);
    }

    #[test]
    fn add_keeps_caller_supplied_id() {
        let dir = TempDir::new().unwrap();
        let store = Store::new(dir.path());
        let added = store.add_instance(instance("cafe01", "feat-a")).unwrap();
        assert_eq!(added.id, "cafe01");
    }

    #[test]
    fn remove_and_update() {
        let dir = TempDir::new().unwrap();
        let store = Store::new(dir.path());

        store.add_instance(instance("aaaaaa", "feat-a")).unwrap();
        store.add_instance(instance("bbbbbb", "feat-b")).unwrap();

        store
            .update_instance("aaaaaa", |inst| {
                inst.status = Status::Paused;
                inst.sub_panes.push(SubPane {
                    pane_id: "%9".into(),
                    label: "shell".into(),
                    created_at: Utc::now(),
                });
            })
            .unwrap();

        let root = store.load().unwrap();
        assert_eq!(root.instance("aaaaaa").unwrap().status, Status::Paused);
        assert_eq!(root.instance("aaaaaa").unwrap().sub_panes.len(), 1);

        store.remove_instance("aaaaaa").unwrap();
        let root = store.load().unwrap();
        assert!(root.instance("aaaaaa").is_none());
        assert!(root.instance("bbbbbb").is_some());

        // Removing again is a no-op, not an error.
        store.remove_instance("aaaaaa").unwrap();
    }

    #[test]
    fn root_meta_is_recorded_once() {
        let dir = TempDir::new().unwrap();
        let store = Store::new(dir.path());

        store.set_root_meta("/repo", "deck-repo").unwrap();
        let root = store.load().unwrap();
        assert_eq!(root.repo, "/repo");
        assert_eq!(root.session, "deck-repo");

        // Instances survive a meta rewrite.
        store.add_instance(instance("aaaaaa", "feat-a")).unwrap();
        store.set_root_meta("/repo", "deck-repo-2").unwrap();
        let root = store.load().unwrap();
        assert_eq!(root.session, "deck-repo-2");
        assert_eq!(root.instances.len(), 1);
    }

    #[test]
    fn update_missing_instance_fails() {
        let dir = TempDir::new().unwrap();
        let store = Store::new(dir.path());
        let err = store.update_instance("zzzzzz", |_| {}).unwrap_err();
        assert!(matches!(err, StateError::NotFound(_)));
    }

    #[test]
    fn corrupt_document_is_distinguishable() {
        let dir = TempDir::new().unwrap();
        let store = Store::new(dir.path());
        fs::create_dir_all(store.deck_dir()).unwrap();
        fs::write(store.state_path(), b"{not json").unwrap();

        let err = store.load().unwrap_err();
        assert!(matches!(err, StateError::Corrupt(_)));
    }

    #[test]
    fn generated_ids_are_six_hex_chars() {
        for _ in 0..64 {
            let id = generate_id();
            assert_eq!(id.len(), 6);
            assert!(id.chars().all(|c| c.is_ascii_hexdigit() && !c.is_uppercase()));
        }
    }
}
