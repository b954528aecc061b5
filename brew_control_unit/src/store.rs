//! Durable settings store.
//!
//! The store is a flat byte image (EEPROM-sized). The control core treats
//! it as synchronous and infallible: backends log their own I/O problems,
//! and undecodable records fall back to defaults at boot.

use std::path::{Path, PathBuf};

use brew_common::config::ConfigError;
use brew_common::consts::{STORE_FORMAT_VERSION, STORE_SIZE};
use brew_common::control::error::RecordError;
use brew_common::control::record::{FORMAT_MARKER_OFFSET, MAX_RECORD_SIZE, Record};
use brew_common::control::settings::{ControlConstants, ControlSettings};
use tracing::{debug, info, warn};

/// Byte-addressed persistent medium.
pub trait SettingsStore {
    /// Fill `buf` from `offset`. Bytes beyond the medium read as erased (0xFF).
    fn load(&self, offset: u16, buf: &mut [u8]);

    /// Write `bytes` at `offset`.
    fn store(&mut self, offset: u16, bytes: &[u8]);
}

const ERASED: u8 = 0xFF;

/// Read and decode one record from its fixed offset.
pub fn load_record<R: Record, S: SettingsStore + ?Sized>(store: &S) -> Result<R, RecordError> {
    let mut buf = [ERASED; MAX_RECORD_SIZE];
    let bytes = &mut buf[..R::SIZE];
    store.load(R::OFFSET, bytes);
    R::decode(bytes)
}

/// Encode and write one record at its fixed offset.
pub fn store_record<R: Record, S: SettingsStore + ?Sized>(store: &mut S, record: &R) {
    store.store(R::OFFSET, &record.encode());
    debug!(record = R::NAME, offset = R::OFFSET, size = R::SIZE, "record stored");
}

/// Where the boot records came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BootSource {
    /// Both records decoded from the store.
    Stored,
    /// Store was blank, foreign or corrupt; defaults were written.
    Defaults,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BootRecords {
    pub settings: ControlSettings,
    pub constants: ControlConstants,
    pub source: BootSource,
}

/// Load settings and constants, or initialise the store with the given
/// defaults when it does not hold a valid image.
pub fn load_or_init<S: SettingsStore + ?Sized>(
    store: &mut S,
    default_settings: ControlSettings,
    default_constants: ControlConstants,
) -> BootRecords {
    match load_image(store) {
        Ok((settings, constants)) => {
            info!(mode = %settings.mode, "settings loaded from store");
            return BootRecords {
                settings,
                constants,
                source: BootSource::Stored,
            };
        }
        Err(ImageFault::Record(RecordError::FormatMismatch { found: ERASED, .. })) => {
            info!("blank store, writing defaults");
        }
        Err(ImageFault::Record(e)) => {
            warn!(error = %e, "stored records unusable, writing defaults");
        }
        Err(ImageFault::Constants(e)) => {
            warn!(error = %e, "stored constants invalid, writing defaults");
        }
    }

    store_record(store, &default_constants);
    store_record(store, &default_settings);
    // Marker last: a torn initialisation reads as blank next boot.
    store.store(FORMAT_MARKER_OFFSET, &[STORE_FORMAT_VERSION]);
    BootRecords {
        settings: default_settings,
        constants: default_constants,
        source: BootSource::Defaults,
    }
}

enum ImageFault {
    Record(RecordError),
    Constants(ConfigError),
}

impl From<RecordError> for ImageFault {
    fn from(e: RecordError) -> Self {
        Self::Record(e)
    }
}

fn load_image<S: SettingsStore + ?Sized>(
    store: &S,
) -> Result<(ControlSettings, ControlConstants), ImageFault> {
    let mut marker = [ERASED];
    store.load(FORMAT_MARKER_OFFSET, &mut marker);
    if marker[0] != STORE_FORMAT_VERSION {
        return Err(RecordError::FormatMismatch {
            found: marker[0],
            expected: STORE_FORMAT_VERSION,
        }
        .into());
    }
    let settings = load_record::<ControlSettings, _>(store)?;
    let constants = load_record::<ControlConstants, _>(store)?;
    constants.validate().map_err(ImageFault::Constants)?;
    Ok((settings, constants))
}

// ─── In-memory image ────────────────────────────────────────────────

/// EEPROM-like byte array. Starts erased.
#[derive(Clone)]
pub struct MemoryStore {
    bytes: [u8; STORE_SIZE],
}

impl MemoryStore {
    pub const fn new() -> Self {
        Self {
            bytes: [ERASED; STORE_SIZE],
        }
    }

    /// Raw image, e.g. for writing to disk.
    #[inline]
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Replace the image prefix with `image`. Excess bytes are ignored.
    pub fn copy_from(&mut self, image: &[u8]) {
        let n = image.len().min(STORE_SIZE);
        self.bytes[..n].copy_from_slice(&image[..n]);
    }

    /// Erase the whole image.
    pub fn erase(&mut self) {
        self.bytes = [ERASED; STORE_SIZE];
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl core::fmt::Debug for MemoryStore {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("MemoryStore")
            .field("size", &STORE_SIZE)
            .field("marker", &self.bytes[FORMAT_MARKER_OFFSET as usize])
            .finish()
    }
}

impl SettingsStore for MemoryStore {
    fn load(&self, offset: u16, buf: &mut [u8]) {
        let start = (offset as usize).min(STORE_SIZE);
        let end = (start + buf.len()).min(STORE_SIZE);
        let n = end - start;
        buf[..n].copy_from_slice(&self.bytes[start..end]);
        buf[n..].fill(ERASED);
    }

    fn store(&mut self, offset: u16, bytes: &[u8]) {
        let start = offset as usize;
        let end = start + bytes.len();
        if end > STORE_SIZE {
            warn!(offset, len = bytes.len(), "write beyond store end truncated");
        }
        let start = start.min(STORE_SIZE);
        let end = end.min(STORE_SIZE);
        self.bytes[start..end].copy_from_slice(&bytes[..end - start]);
    }
}

// ─── File-backed image ──────────────────────────────────────────────

/// Store image persisted to a file. Every write rewrites the file; I/O
/// failures are logged and the in-memory image stays authoritative.
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    image: MemoryStore,
}

impl FileStore {
    /// Open `path`, starting from an erased image if it cannot be read.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let mut image = MemoryStore::new();
        match std::fs::read(&path) {
            Ok(bytes) => {
                if bytes.len() != STORE_SIZE {
                    warn!(
                        path = %path.display(),
                        len = bytes.len(),
                        expected = STORE_SIZE,
                        "store file size mismatch"
                    );
                }
                image.copy_from(&bytes);
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                info!(path = %path.display(), "no store file, starting blank");
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "store file unreadable, starting blank");
            }
        }
        Self { path, image }
    }

    #[inline]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn flush(&self) {
        if let Err(e) = std::fs::write(&self.path, self.image.as_bytes()) {
            warn!(path = %self.path.display(), error = %e, "store write failed");
        }
    }
}

impl SettingsStore for FileStore {
    fn load(&self, offset: u16, buf: &mut [u8]) {
        self.image.load(offset, buf);
    }

    fn store(&mut self, offset: u16, bytes: &[u8]) {
        self.image.store(offset, bytes);
        self.flush();
    }
}

// Lets callers keep ownership while a controller borrows the store.
impl<S: SettingsStore + ?Sized> SettingsStore for &mut S {
    fn load(&self, offset: u16, buf: &mut [u8]) {
        (**self).load(offset, buf);
    }

    fn store(&mut self, offset: u16, bytes: &[u8]) {
        (**self).store(offset, bytes);
    }
}

// ─── Tests ──────────────────────────────────────────────────────────
