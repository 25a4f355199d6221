//! Simple file-backed [`VaultStore`] for single-process deployments.
//!
//! Envelopes are persisted to a JSON snapshot rewritten atomically (tmp +
//! rename) after each mutation; audit lines live in a sibling `.log` file that
//! is only ever appended to, except for retention trimming.

// std
use std::{
	fs::{self, File, OpenOptions},
	io::Write,
	path::{Path, PathBuf},
};
// self
use crate::{
	_prelude::*,
	auth::{ProviderId, UserId},
	store::{RecordKey, StoreError, StoreFuture, StoredCredential, VaultStore},
};

/// Persists sealed credential envelopes and audit lines to disk.
#[derive(Debug)]
pub struct FileStore {
	snapshot_path: PathBuf,
	log_path: PathBuf,
	records: RwLock<HashMap<RecordKey, StoredCredential>>,
	log_lock: Mutex<()>,
}
impl FileStore {
	/// Opens (or creates) a store at the provided path, eagerly loading existing data.
	///
	/// The audit log lives next to the snapshot with a `.log` extension.
	pub fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
		let snapshot_path = path.into();
		let log_path = snapshot_path.with_extension("log");

		Self::ensure_parent_exists(&snapshot_path)?;

		let snapshot =
			if snapshot_path.exists() { Self::load_snapshot(&snapshot_path)? } else { Vec::new() };
		let records = snapshot.into_iter().map(|record| (record.key(), record)).collect();

		Ok(Self {
			snapshot_path,
			log_path,
			records: RwLock::new(records),
			log_lock: Mutex::new(()),
		})
	}

	fn load_snapshot(path: &Path) -> Result<Vec<StoredCredential>, StoreError> {
		let bytes = fs::read(path).map_err(|e| StoreError::Backend {
			message: format!("Failed to read {}: {e}", path.display()),
		})?;

		if bytes.is_empty() {
			return Ok(Vec::new());
		}

		serde_json::from_slice(&bytes).map_err(|e| StoreError::Serialization {
			message: format!("Failed to parse {}: {e}", path.display()),
		})
	}

	fn ensure_parent_exists(path: &Path) -> Result<(), StoreError> {
		if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
			fs::create_dir_all(parent).map_err(|e| StoreError::Backend {
				message: format!("Failed to create store directory {}: {e}", parent.display()),
			})?;
		}

		Ok(())
	}

	fn persist_locked(
		&self,
		contents: &HashMap<RecordKey, StoredCredential>,
	) -> Result<(), StoreError> {
		let snapshot: Vec<_> = contents.values().collect();
		let serialized =
			serde_json::to_vec_pretty(&snapshot).map_err(|e| StoreError::Serialization {
				message: format!("Failed to serialize store snapshot: {e}"),
			})?;

		Self::replace_file(&self.snapshot_path, &serialized)
	}

	fn replace_file(path: &Path, contents: &[u8]) -> Result<(), StoreError> {
		Self::ensure_parent_exists(path)?;

		let mut tmp_path = path.to_path_buf();

		tmp_path.set_extension("tmp");

		{
			let mut file = File::create(&tmp_path).map_err(|e| StoreError::Backend {
				message: format!("Failed to create {}: {e}", tmp_path.display()),
			})?;

			file.write_all(contents).map_err(|e| StoreError::Backend {
				message: format!("Failed to write {}: {e}", tmp_path.display()),
			})?;
			file.sync_all().map_err(|e| StoreError::Backend {
				message: format!("Failed to sync {}: {e}", tmp_path.display()),
			})?;
		}

		fs::rename(&tmp_path, path).map_err(|e| StoreError::Backend {
			message: format!("Failed to replace {}: {e}", path.display()),
		})
	}

	fn read_log_lines(&self) -> Result<Vec<String>, StoreError> {
		if !self.log_path.exists() {
			return Ok(Vec::new());
		}

		let raw = fs::read_to_string(&self.log_path).map_err(|e| StoreError::Backend {
			message: format!("Failed to read {}: {e}", self.log_path.display()),
		})?;

		Ok(raw.lines().map(str::to_owned).collect())
	}
}
impl VaultStore for FileStore {
	fn put(&self, record: StoredCredential) -> StoreFuture<'_, ()> {
		Box::pin(async move {
			let mut guard = self.records.write();

			guard.insert(record.key(), record);
			self.persist_locked(&guard)
		})
	}

	fn get<'a>(&'a self, key: &'a RecordKey) -> StoreFuture<'a, Option<StoredCredential>> {
		Box::pin(async move { Ok(self.records.read().get(key).cloned()) })
	}

	fn delete<'a>(&'a self, key: &'a RecordKey) -> StoreFuture<'a, bool> {
		Box::pin(async move {
			let mut guard = self.records.write();
			let removed = guard.remove(key).is_some();

			if removed {
				self.persist_locked(&guard)?;
			}

			Ok(removed)
		})
	}

	fn delete_all<'a>(
		&'a self,
		user: &'a UserId,
		provider: &'a ProviderId,
	) -> StoreFuture<'a, u64> {
		Box::pin(async move {
			let mut guard = self.records.write();
			let before = guard.len();

			guard.retain(|key, _| !(key.user == *user && key.provider == *provider));

			let removed = (before - guard.len()) as u64;

			if removed > 0 {
				self.persist_locked(&guard)?;
			}

			Ok(removed)
		})
	}

	fn list(&self) -> StoreFuture<'_, Vec<RecordKey>> {
		Box::pin(async move { Ok(self.records.read().keys().cloned().collect()) })
	}

	fn append_log(&self, line: String) -> StoreFuture<'_, ()> {
		Box::pin(async move {
			let _guard = self.log_lock.lock();

			Self::ensure_parent_exists(&self.log_path)?;

			let mut file = OpenOptions::new()
				.create(true)
				.append(true)
				.open(&self.log_path)
				.map_err(|e| StoreError::Backend {
					message: format!("Failed to open {}: {e}", self.log_path.display()),
				})?;

			writeln!(file, "{line}").map_err(|e| StoreError::Backend {
				message: format!("Failed to append to {}: {e}", self.log_path.display()),
			})
		})
	}

	fn trim_log(&self, max_entries: usize) -> StoreFuture<'_, ()> {
		Box::pin(async move {
			let _guard = self.log_lock.lock();
			let lines = self.read_log_lines()?;

			if lines.len() <= max_entries {
				return Ok(());
			}

			let kept = &lines[lines.len() - max_entries..];
			let mut contents = kept.join("\n");

			if !contents.is_empty() {
				contents.push('\n');
			}

			Self::replace_file(&self.log_path, contents.as_bytes())
		})
	}

	fn read_log(&self) -> StoreFuture<'_, Vec<String>> {
		Box::pin(async move {
			let _guard = self.log_lock.lock();

			self.read_log_lines()
		})
	}
}
