//! File-backed stores: one file per store name.
//!
//! File layout:
//! `magic(4) | version(1) | encoding(1) | payload_len(8, LE) | payload | crc32(4, LE)`
//!
//! The payload is the encoded value map. Writes go to a temporary sibling
//! file that is renamed over the target, under an exclusive lock on a
//! `.lock` sidecar.

use super::base::{PersistentStore, Store, StoreBackend, StoreFactory, StoreValues};
use crate::error::{Result, TrackingError};
use fs2::FileExt;
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::{ErrorKind, Read, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Magic bytes for store files.
const STORE_FILE_MAGIC: &[u8; 4] = b"STK\0";

/// Current store file format version.
const STORE_FILE_VERSION: u8 = 1;

/// Header (magic, version, encoding, length) plus trailing checksum.
const STORE_FILE_OVERHEAD: u64 = 4 + 1 + 1 + 8 + 4;

/// Payload encoding for store files.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum StoreEncoding {
    #[default]
    Json,
    MessagePack,
}

impl StoreEncoding {
    fn tag(self) -> u8 {
        match self {
            StoreEncoding::Json => 0,
            StoreEncoding::MessagePack => 1,
        }
    }

    fn from_tag(tag: u8) -> Result<Self> {
        match tag {
            0 => Ok(StoreEncoding::Json),
            1 => Ok(StoreEncoding::MessagePack),
            other => Err(TrackingError::Corruption(format!(
                "Unknown store encoding tag: {}",
                other
            ))),
        }
    }

    fn encode(self, values: &StoreValues) -> Result<Vec<u8>> {
        match self {
            StoreEncoding::Json => Ok(serde_json::to_vec(values)?),
            StoreEncoding::MessagePack => Ok(rmp_serde::to_vec(values)?),
        }
    }

    fn decode(self, payload: &[u8]) -> Result<StoreValues> {
        match self {
            StoreEncoding::Json => serde_json::from_slice(payload)
                .map_err(|e| TrackingError::Deserialization(e.to_string())),
            StoreEncoding::MessagePack => Ok(rmp_serde::from_slice(payload)?),
        }
    }

    /// File extension used for new store files.
    pub fn extension(self) -> &'static str {
        match self {
            StoreEncoding::Json => "json.stk",
            StoreEncoding::MessagePack => "msgpack.stk",
        }
    }
}

/// File store configuration.
#[derive(Clone, Debug)]
pub struct FileStoreConfig {
    /// Directory holding one file per store.
    pub directory: PathBuf,

    /// Encoding for written files. Reads honor the encoding recorded in the file.
    pub encoding: StoreEncoding,

    /// Whether commit creates a missing directory.
    pub create_if_missing: bool,
}

impl Default for FileStoreConfig {
    fn default() -> Self {
        Self {
            directory: PathBuf::from("./settings"),
            encoding: StoreEncoding::Json,
            create_if_missing: true,
        }
    }
}

/// Store handle produced by [`FileStoreFactory`].
pub type FileStore = PersistentStore<FileBackend>;

/// Backend for a single store file.
pub struct FileBackend {
    path: PathBuf,
    encoding: StoreEncoding,
    create_if_missing: bool,
}

impl FileBackend {
    pub fn new(path: impl AsRef<Path>, encoding: StoreEncoding) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            encoding,
            create_if_missing: true,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read and verify the file. `Ok(None)` when it does not exist.
    pub fn read_file(&self) -> Result<Option<StoreValues>> {
        let mut file = match File::open(&self.path) {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        let mut magic = [0u8; 4];
        file.read_exact(&mut magic)?;
        if &magic != STORE_FILE_MAGIC {
            return Err(TrackingError::Corruption("Invalid store file magic".into()));
        }

        let mut header = [0u8; 2];
        file.read_exact(&mut header)?;
        if header[0] != STORE_FILE_VERSION {
            return Err(TrackingError::Corruption(format!(
                "Unsupported store file version: {}",
                header[0]
            )));
        }
        let encoding = StoreEncoding::from_tag(header[1])?;

        let mut len_bytes = [0u8; 8];
        file.read_exact(&mut len_bytes)?;
        let payload_len = u64::from_le_bytes(len_bytes);
        let available = file.metadata()?.len().saturating_sub(STORE_FILE_OVERHEAD);
        if payload_len != available {
            return Err(TrackingError::Corruption(format!(
                "Payload length {} does not match file size ({} bytes available)",
                payload_len, available
            )));
        }

        let mut payload = vec![0u8; payload_len as usize];
        file.read_exact(&mut payload)?;

        let mut checksum_bytes = [0u8; 4];
        file.read_exact(&mut checksum_bytes)?;
        let stored_checksum = u32::from_le_bytes(checksum_bytes);
        let computed_checksum = crc32fast::hash(&payload);
        if stored_checksum != computed_checksum {
            return Err(TrackingError::ChecksumMismatch {
                expected: stored_checksum,
                got: computed_checksum,
            });
        }

        encoding.decode(&payload).map(Some)
    }

    fn write_file(&self, values: &StoreValues) -> Result<()> {
        if let Some(dir) = self.path.parent() {
            if !dir.as_os_str().is_empty() && !dir.exists() {
                if !self.create_if_missing {
                    return Err(TrackingError::Io(std::io::Error::new(
                        ErrorKind::NotFound,
                        format!("Store directory does not exist: {}", dir.display()),
                    )));
                }
                fs::create_dir_all(dir)?;
            }
        }

        // Stores may be shared by several configurations; wait for the writer ahead.
        let lock_file = File::create(self.sidecar("lock"))?;
        lock_file.lock_exclusive()?;

        let payload = self.encoding.encode(values)?;
        let tmp_path = self.sidecar("tmp");
        {
            let mut file = File::create(&tmp_path)?;
            file.write_all(STORE_FILE_MAGIC)?;
            file.write_all(&[STORE_FILE_VERSION, self.encoding.tag()])?;
            file.write_all(&(payload.len() as u64).to_le_bytes())?;
            file.write_all(&payload)?;
            file.write_all(&crc32fast::hash(&payload).to_le_bytes())?;
            file.sync_all()?;
        }
        fs::rename(&tmp_path, &self.path)?;

        lock_file.unlock()?;
        debug!(path = %self.path.display(), entries = values.len(), "Store file written");
        Ok(())
    }

    fn sidecar(&self, suffix: &str) -> PathBuf {
        let mut name = self.path.file_name().unwrap_or_default().to_os_string();
        name.push(".");
        name.push(suffix);
        self.path.with_file_name(name)
    }
}

impl StoreBackend for FileBackend {
    fn load_values(&self) -> Result<StoreValues> {
        match self.read_file() {
            Ok(values) => Ok(values.unwrap_or_default()),
            Err(e) => {
                // An unreadable file means "nothing to apply"; the next commit rewrites it.
                warn!(path = %self.path.display(), error = %e, "Ignoring unreadable store file");
                Ok(StoreValues::new())
            }
        }
    }

    fn save_values(&self, values: &StoreValues) -> Result<()> {
        self.write_file(values)
    }
}

/// Factory mapping a store name to `<directory>/<name>.<ext>`.
#[derive(Clone, Debug)]
pub struct FileStoreFactory {
    config: FileStoreConfig,
}

impl FileStoreFactory {
    pub fn new(config: FileStoreConfig) -> Self {
        Self { config }
    }

    /// Factory writing JSON files under `directory`.
    pub fn in_directory(directory: impl Into<PathBuf>) -> Self {
        Self::new(FileStoreConfig {
            directory: directory.into(),
            ..Default::default()
        })
    }

    pub fn config(&self) -> &FileStoreConfig {
        &self.config
    }

    /// Path of the file backing `object_id`.
    pub fn path_for(&self, object_id: &str) -> Result<PathBuf> {
        validate_object_id(object_id)?;
        Ok(self.config.directory.join(format!(
            "{}.{}",
            object_id,
            self.config.encoding.extension()
        )))
    }

    pub fn open(&self, object_id: &str) -> Result<FileStore> {
        Ok(PersistentStore::new(FileBackend {
            path: self.path_for(object_id)?,
            encoding: self.config.encoding,
            create_if_missing: self.config.create_if_missing,
        }))
    }
}

impl StoreFactory for FileStoreFactory {
    fn create_store_for_object(&self, object_id: &str) -> Result<Box<dyn Store>> {
        Ok(Box::new(self.open(object_id)?))
    }
}

fn validate_object_id(object_id: &str) -> Result<()> {
    if object_id.is_empty() {
        return Err(TrackingError::InvalidArgument("Empty store name".into()));
    }
    if object_id.contains(['/', '\\', '\0']) || object_id.contains("..") {
        return Err(TrackingError::InvalidArgument(format!(
            "Store name is not a valid file name: {:?}",
            object_id
        )));
    }
    Ok(())
}
