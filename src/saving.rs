use flate2::Compression;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::collections::HashMap;
use std::fs::{self, File, create_dir_all};
use std::io::{BufReader, BufWriter, Cursor, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

use crate::content::Bit;
use crate::error::AppError;
use crate::login::User;
use crate::progress::Progress;

const USERS_FILE: &str = "users.json";
const BITS_FILE: &str = "bits.json";
const PROGRESS_FILE: &str = "progress.json";

/// Reads a JSON document, or the type's default when the file is missing.
pub fn read_json<T: DeserializeOwned + Default>(path: &Path) -> Result<T, AppError> {
    if !path.exists() {
        return Ok(T::default());
    }

    let reader = BufReader::new(File::open(path)?);
    Ok(serde_json::from_reader(reader)?)
}

/// Writes a JSON document by renaming a finished temp file over the old one,
/// so readers never see a half-written file.
pub fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<(), AppError> {
    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    create_dir_all(dir)?;

    let mut file = NamedTempFile::new_in(dir)?;
    {
        let mut writer = BufWriter::new(file.as_file_mut());
        serde_json::to_writer_pretty(&mut writer, value)?;
        writer.flush()?;
    }
    file.persist(path).map_err(|e| AppError::Io(e.error))?;

    Ok(())
}

/// The on-disk database: one directory holding the user table, persisted
/// bits, and a sub-directory of documents per user.
#[derive(Debug, Clone)]
pub struct Store {
    root: PathBuf,
}

impl Store {
    pub fn open(root: impl Into<PathBuf>) -> Result<Self, AppError> {
        let root = root.into();
        create_dir_all(&root)?;

        let users = root.join(USERS_FILE);
        if !users.exists() {
            fs::write(&users, b"{}")?;
        }

        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn user_dir(&self, username: &str) -> PathBuf {
        self.root.join(username)
    }

    pub fn load_users(&self) -> Result<HashMap<String, User>, AppError> {
        read_json(&self.root.join(USERS_FILE))
    }

    pub fn save_users(&self, users: &HashMap<String, User>) -> Result<(), AppError> {
        write_json(&self.root.join(USERS_FILE), users)
    }

    pub fn load_bits(&self) -> Result<Vec<Bit>, AppError> {
        read_json(&self.root.join(BITS_FILE))
    }

    pub fn save_bits(&self, bits: &[Bit]) -> Result<(), AppError> {
        write_json(&self.root.join(BITS_FILE), bits)
    }

    pub fn create_user_dir(&self, username: &str) -> Result<(), AppError> {
        create_dir_all(self.user_dir(username))?;
        Ok(())
    }

    /// The user's progress document; a fresh one dated `now` if none exists.
    pub fn load_progress(&self, username: &str, now: i64) -> Result<Progress, AppError> {
        let path = self.user_dir(username).join(PROGRESS_FILE);
        if !path.exists() {
            return Ok(Progress::new(now));
        }
        read_json(&path)
    }

    pub fn save_progress(&self, username: &str, progress: &Progress) -> Result<(), AppError> {
        write_json(&self.user_dir(username).join(PROGRESS_FILE), progress)
    }
}

/// Gzip-compressed JSON backup of a progress document.
pub fn export_progress(progress: &Progress) -> std::io::Result<Vec<u8>> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    serde_json::to_writer(&mut encoder, progress)
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e))?;

    encoder.finish()
}

pub fn import_progress(buffer: &[u8]) -> std::io::Result<Progress> {
    let decoder = GzDecoder::new(Cursor::new(buffer));
    let reader = BufReader::new(decoder);

    serde_json::from_reader(reader)
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))
}
