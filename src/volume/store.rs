//! Keyed persistence for baked volume datasets

use std::io;
use std::path::{Path, PathBuf};

use rkyv::util::AlignedVec;

use crate::core::{Error, Result};

use super::dataset::{ArchivedVolumeDataset, VolumeDataset};

/// Where baked datasets live between runs
pub trait DatasetStore {
    fn save(&self, key: &str, dataset: &VolumeDataset) -> Result<()>;

    /// `Ok(None)` when nothing was stored under `key`
    fn load(&self, key: &str) -> Result<Option<VolumeDataset>>;
}

/// Serialize a dataset to bytes (uncompressed)
pub fn serialize_dataset(dataset: &VolumeDataset) -> Result<Vec<u8>> {
    let bytes = rkyv::to_bytes::<rkyv::rancor::Error>(dataset)
        .map_err(|e| Error::Serialization(e.to_string()))?;
    Ok(bytes.to_vec())
}

/// Deserialize a dataset from bytes (uncompressed)
pub fn deserialize_dataset(data: &[u8]) -> Result<VolumeDataset> {
    // Archives need aligned storage; decompressed buffers are not
    let mut aligned = AlignedVec::<16>::with_capacity(data.len());
    aligned.extend_from_slice(data);

    let archived = rkyv::access::<ArchivedVolumeDataset, rkyv::rancor::Error>(&aligned)
        .map_err(|e| Error::Serialization(e.to_string()))?;
    rkyv::deserialize::<VolumeDataset, rkyv::rancor::Error>(archived)
        .map_err(|e| Error::Serialization(e.to_string()))
}

/// Serialize and compress with LZ4
pub fn compress_dataset(dataset: &VolumeDataset) -> Result<Vec<u8>> {
    let serialized = serialize_dataset(dataset)?;
    Ok(lz4_flex::compress_prepend_size(&serialized))
}

/// Decompress and deserialize
pub fn decompress_dataset(data: &[u8]) -> Result<VolumeDataset> {
    let decompressed = lz4_flex::decompress_size_prepended(data)
        .map_err(|e| Error::Serialization(format!("LZ4 decompression failed: {}", e)))?;
    deserialize_dataset(&decompressed)
}

/// Datasets stored as `<dir>/<key>.rkp`
#[derive(Clone, Debug)]
pub struct FileDatasetStore {
    base_dir: PathBuf,
}

impl FileDatasetStore {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self { base_dir: base_dir.into() }
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    pub fn path(&self, key: &str) -> PathBuf {
        self.base_dir.join(format!("{}.rkp", key))
    }

    pub fn exists(&self, key: &str) -> bool {
        self.path(key).exists()
    }

    pub fn delete(&self, key: &str) -> Result<()> {
        match std::fs::remove_file(self.path(key)) {
            Err(e) if e.kind() != io::ErrorKind::NotFound => Err(e.into()),
            _ => Ok(()),
        }
    }
}

impl DatasetStore for FileDatasetStore {
    fn save(&self, key: &str, dataset: &VolumeDataset) -> Result<()> {
        std::fs::create_dir_all(&self.base_dir)?;
        let path = self.path(key);
        let compressed = compress_dataset(dataset)?;
        std::fs::write(&path, &compressed)?;
        log::info!("Saved probe dataset {} ({} bytes)", path.display(), compressed.len());
        Ok(())
    }

    fn load(&self, key: &str) -> Result<Option<VolumeDataset>> {
        let path = self.path(key);
        let compressed = match std::fs::read(&path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let dataset = decompress_dataset(&compressed)?;
        log::info!("Loaded probe dataset {}", path.display());
        Ok(Some(dataset))
    }
}
