//! On-disk model directory layout and checkpoint fingerprinting.
//!
//! A model directory looks like
//!
//! ```text
//! <model dir>/
//!   finetune_speaker.json
//!   OUTPUT_MODEL/G_latest.pth
//! ```
//!
//! The checkpoint is opaque here: it is only read and hashed.

use std::{
    fmt, fs, io,
    path::{Path, PathBuf},
};

use sha2::{Digest, Sha256};

pub const CHECKPOINT_DIR: &str = "OUTPUT_MODEL";
pub const CHECKPOINT_FILE: &str = "G_latest.pth";
pub const CONFIG_FILE: &str = "finetune_speaker.json";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelLayout {
    root: PathBuf,
}

impl ModelLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn checkpoint_path(&self) -> PathBuf {
        self.root.join(CHECKPOINT_DIR).join(CHECKPOINT_FILE)
    }

    pub fn config_path(&self) -> PathBuf {
        self.root.join(CONFIG_FILE)
    }
}

/// Hex encoded SHA-256 of a checkpoint's bytes.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Fingerprint(String);

impl Fingerprint {
    pub fn of(bytes: &[u8]) -> Self {
        Fingerprint(hex::encode(Sha256::digest(bytes)))
    }

    /// Hash a file without holding all of it in memory.
    pub fn of_file(path: impl AsRef<Path>) -> io::Result<Self> {
        let mut file = fs::File::open(path.as_ref())?;
        let mut hasher = Sha256::new();
        io::copy(&mut file, &mut hasher)?;
        Ok(Fingerprint(hex::encode(hasher.finalize())))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Checkpoint bytes together with their fingerprint.
///
/// The loader deserializes exactly these bytes, so the fingerprint stored in
/// the cache always describes the weights that are actually in memory.
#[derive(Clone)]
pub struct Checkpoint {
    pub bytes: Vec<u8>,
    pub fingerprint: Fingerprint,
}

impl Checkpoint {
    pub fn read(path: impl AsRef<Path>) -> io::Result<Self> {
        let bytes = fs::read(path.as_ref())?;
        let fingerprint = Fingerprint::of(&bytes);
        Ok(Self { bytes, fingerprint })
    }

    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        let fingerprint = Fingerprint::of(&bytes);
        Self { bytes, fingerprint }
    }
}

impl fmt::Debug for Checkpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Checkpoint")
            .field("len", &self.bytes.len())
            .field("fingerprint", &self.fingerprint)
            .finish()
    }
}
