//! The registered-voter set: the sole authorization unit of the protocol.
//!
//! The voting core only depends on the `VoterRegistry` trait. `FsRegistry`
//! keeps one `<id>.pem` file per voter in a shared directory; `MemRegistry`
//! is an in-memory stand-in for tests and embedding.

use crate::crypto::PublicKey;
use crate::utils::{BallotError, Result};
use parking_lot::RwLock;
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Path, PathBuf};

pub type VoterId = u32;

pub trait VoterRegistry: Send + Sync + 'static {
    /// Every currently registered voter id
    fn registered_ids(&self) -> Result<BTreeSet<VoterId>>;

    /// Public key registered for `id`, if any
    fn public_key(&self, id: VoterId) -> Result<Option<PublicKey>>;

    fn register(&self, id: VoterId, key: &PublicKey) -> Result<()>;

    fn deregister(&self, id: VoterId) -> Result<()>;

    fn is_registered(&self, id: VoterId) -> bool {
        matches!(self.public_key(id), Ok(Some(_)))
    }
}

/// Directory-backed registry; presence of `<dir>/<id>.pem` is registration.
#[derive(Debug, Clone)]
pub struct FsRegistry {
    dir: PathBuf,
}

impl FsRegistry {
    pub fn open(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn key_path(&self, id: VoterId) -> PathBuf {
        self.dir.join(format!("{}.pem", id))
    }
}

impl VoterRegistry for FsRegistry {
    fn registered_ids(&self) -> Result<BTreeSet<VoterId>> {
        let mut ids = BTreeSet::new();
        for entry in fs::read_dir(&self.dir)? {
            let entry = entry?;
            let name = entry.file_name();
            let name = name.to_string_lossy();
            // anything that is not `<u32>.pem` is not a registration
            if let Some(stem) = name.strip_suffix(".pem") {
                if let Ok(id) = stem.parse::<VoterId>() {
                    ids.insert(id);
                }
            }
        }
        Ok(ids)
    }

    fn public_key(&self, id: VoterId) -> Result<Option<PublicKey>> {
        let path = self.key_path(id);
        match fs::read(&path) {
            Ok(bytes) => Ok(Some(PublicKey::from_pem(bytes))),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(BallotError::RegistryError(format!("{}: {}", path.display(), e))),
        }
    }

    fn register(&self, id: VoterId, key: &PublicKey) -> Result<()> {
        fs::write(self.key_path(id), key.as_pem())?;
        Ok(())
    }

    fn deregister(&self, id: VoterId) -> Result<()> {
        match fs::remove_file(self.key_path(id)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

/// In-memory registry
#[derive(Debug, Default)]
pub struct MemRegistry {
    keys: RwLock<BTreeMap<VoterId, PublicKey>>,
}

impl MemRegistry {
    pub fn new() -> Self {
        Self::default()
    }
}

impl VoterRegistry for MemRegistry {
    fn registered_ids(&self) -> Result<BTreeSet<VoterId>> {
        Ok(self.keys.read().keys().copied().collect())
    }

    fn public_key(&self, id: VoterId) -> Result<Option<PublicKey>> {
        Ok(self.keys.read().get(&id).cloned())
    }

    fn register(&self, id: VoterId, key: &PublicKey) -> Result<()> {
        self.keys.write().insert(id, key.clone());
        Ok(())
    }

    fn deregister(&self, id: VoterId) -> Result<()> {
        self.keys.write().remove(&id);
        Ok(())
    }
}
