//! File Store
//!
//! Blob storage for the files an agent works on. Two areas exist:
//! `upload` (files the user sent) and `output` (files the agent produced).
//! Files are keyed by bare file name; all I/O goes through `tokio::fs`.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tokio::io::AsyncWriteExt;

use crate::security::{InputValidator, RelayLimits, ValidationResult};

/// Extensions accepted for uploads by default
pub const DEFAULT_ALLOWED_EXTENSIONS: &[&str] =
    &[".mp4", ".avi", ".mov", ".mkv", ".wmv", ".flv", ".webm"];

/// Storage errors
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// The name is not a plain file name
    #[error("{0}")]
    InvalidName(String),

    /// Upload extension not on the allowlist
    #[error("不支持的文件格式。支持的格式: {allowed}")]
    UnsupportedExtension {
        /// Rejected extension (with dot, lowercased)
        extension: String,
        /// Comma-separated allowlist
        allowed: String,
    },

    /// Upload larger than the configured limit
    #[error("file too large: {size} bytes (max: {max})")]
    TooLarge {
        /// Actual size
        size: u64,
        /// Configured maximum
        max: u64,
    },

    /// No such file in the area
    #[error("文件不存在: {0}")]
    NotFound(String),

    /// Unknown area name
    #[error("无效的文件类型: {0}")]
    UnknownArea(String),

    /// Underlying I/O failure
    #[error("I/O error on {path}: {source}")]
    Io {
        /// Path involved
        path: PathBuf,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },
}

impl StorageError {
    fn io(path: &Path, source: std::io::Error) -> Self {
        if source.kind() == std::io::ErrorKind::NotFound {
            let name = path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            return Self::NotFound(name);
        }
        Self::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// Storage area
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FileArea {
    /// Files sent by the user
    Upload,
    /// Files produced by the agent
    Output,
}

impl FromStr for FileArea {
    type Err = StorageError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "upload" => Ok(Self::Upload),
            "output" => Ok(Self::Output),
            other => Err(StorageError::UnknownArea(other.to_string())),
        }
    }
}

impl fmt::Display for FileArea {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Upload => f.write_str("upload"),
            Self::Output => f.write_str("output"),
        }
    }
}

/// A stored file as reported to clients
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredFile {
    /// File name
    pub name: String,
    /// Absolute path on the server
    pub path: String,
    /// Size in bytes
    pub size: u64,
}

/// Store configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageConfig {
    /// Directory for uploads
    pub uploads_dir: PathBuf,
    /// Directory for outputs
    pub outputs_dir: PathBuf,
    /// Lowercased extensions (with dot) accepted for uploads
    pub allowed_extensions: Vec<String>,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            uploads_dir: PathBuf::from("uploads"),
            outputs_dir: PathBuf::from("outputs"),
            allowed_extensions: DEFAULT_ALLOWED_EXTENSIONS
                .iter()
                .map(ToString::to_string)
                .collect(),
        }
    }
}

/// Upload/output file store
#[derive(Debug)]
pub struct FileStore {
    uploads_dir: PathBuf,
    outputs_dir: PathBuf,
    allowed_extensions: Vec<String>,
    validator: InputValidator,
}

impl FileStore {
    /// Open the store, creating both directories.
    ///
    /// Directories are made absolute so reported paths can be handed to the
    /// agent as-is.
    ///
    /// # Errors
    ///
    /// Fails if a directory cannot be created or resolved.
    pub async fn open(config: &StorageConfig, limits: RelayLimits) -> Result<Self, StorageError> {
        let uploads_dir = prepare_dir(&config.uploads_dir).await?;
        let outputs_dir = prepare_dir(&config.outputs_dir).await?;
        tracing::info!(
            uploads = %uploads_dir.display(),
            outputs = %outputs_dir.display(),
            "File store ready"
        );

        Ok(Self {
            uploads_dir,
            outputs_dir,
            allowed_extensions: config
                .allowed_extensions
                .iter()
                .map(|e| normalize_extension(e))
                .collect(),
            validator: InputValidator::new(limits),
        })
    }

    /// Directory backing `area`
    #[must_use]
    pub fn dir(&self, area: FileArea) -> &Path {
        match area {
            FileArea::Upload => &self.uploads_dir,
            FileArea::Output => &self.outputs_dir,
        }
    }

    /// Maximum accepted upload size
    #[must_use]
    pub fn max_upload_bytes(&self) -> u64 {
        self.validator.limits().max_upload_bytes
    }

    /// Path for `name` in `area`, after validating the name
    ///
    /// # Errors
    ///
    /// Returns `StorageError::InvalidName` for anything but a plain file name.
    pub fn resolve(&self, area: FileArea, name: &str) -> Result<PathBuf, StorageError> {
        match self.validator.validate_filename(name) {
            ValidationResult::Valid => Ok(self.dir(area).join(name)),
            other => Err(StorageError::InvalidName(
                other.error_message().unwrap_or("invalid file name").to_string(),
            )),
        }
    }

    /// Check that `name` may be uploaded
    ///
    /// # Errors
    ///
    /// Invalid name or extension not on the allowlist.
    pub fn check_upload(&self, name: &str) -> Result<(), StorageError> {
        self.resolve(FileArea::Upload, name)?;
        let extension = Path::new(name)
            .extension()
            .map(|e| format!(".{}", e.to_string_lossy().to_lowercase()))
            .unwrap_or_default();
        if self.allowed_extensions.iter().any(|a| *a == extension) {
            Ok(())
        } else {
            Err(StorageError::UnsupportedExtension {
                extension,
                allowed: self.allowed_extensions.join(", "),
            })
        }
    }

    /// List the regular files in `area`, sorted by name
    ///
    /// # Errors
    ///
    /// Fails if the directory cannot be read.
    pub async fn list(&self, area: FileArea) -> Result<Vec<StoredFile>, StorageError> {
        let dir = self.dir(area);
        let mut entries = tokio::fs::read_dir(dir)
            .await
            .map_err(|e| StorageError::io(dir, e))?;

        let mut files = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| StorageError::io(dir, e))?
        {
            let metadata = match entry.metadata().await {
                Ok(m) if m.is_file() => m,
                Ok(_) => continue,
                Err(e) => {
                    tracing::warn!(path = ?entry.path(), error = %e, "Skipping unreadable entry");
                    continue;
                }
            };
            files.push(StoredFile {
                name: entry.file_name().to_string_lossy().into_owned(),
                path: entry.path().to_string_lossy().into_owned(),
                size: metadata.len(),
            });
        }

        files.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(files)
    }

    /// Read a whole file
    ///
    /// # Errors
    ///
    /// Invalid name, missing file or I/O failure.
    pub async fn read(&self, area: FileArea, name: &str) -> Result<Vec<u8>, StorageError> {
        let path = self.resolve(area, name)?;
        tokio::fs::read(&path)
            .await
            .map_err(|e| StorageError::io(&path, e))
    }

    /// Start writing an upload chunk by chunk.
    ///
    /// The file is created (or truncated) immediately. Feed it with
    /// [`UploadWriter::write_chunk`] and complete it with
    /// [`UploadWriter::finish`]; on any error call [`UploadWriter::discard`]
    /// so no partial upload is left behind.
    ///
    /// # Errors
    ///
    /// Invalid name, extension not on the allowlist or I/O failure.
    pub async fn begin_upload(&self, name: &str) -> Result<UploadWriter, StorageError> {
        self.check_upload(name)?;
        let path = self.resolve(FileArea::Upload, name)?;
        let file = tokio::fs::File::create(&path)
            .await
            .map_err(|e| StorageError::io(&path, e))?;
        Ok(UploadWriter {
            file,
            path,
            name: name.to_string(),
            written: 0,
            max: self.max_upload_bytes(),
        })
    }

    /// Write a file, replacing any existing one.
    ///
    /// Uploads are checked against the extension allowlist and size limit.
    ///
    /// # Errors
    ///
    /// Invalid name, rejected upload or I/O failure.
    pub async fn write(
        &self,
        area: FileArea,
        name: &str,
        contents: &[u8],
    ) -> Result<StoredFile, StorageError> {
        if area == FileArea::Upload {
            let size = contents.len() as u64;
            if size > self.max_upload_bytes() {
                return Err(StorageError::TooLarge {
                    size,
                    max: self.max_upload_bytes(),
                });
            }
            let mut upload = self.begin_upload(name).await?;
            if let Err(e) = upload.write_chunk(contents).await {
                upload.discard().await;
                return Err(e);
            }
            return upload.finish().await;
        }

        let path = self.resolve(area, name)?;
        tokio::fs::write(&path, contents)
            .await
            .map_err(|e| StorageError::io(&path, e))?;
        tracing::info!(area = %area, name = %name, bytes = contents.len(), "Stored file");

        Ok(StoredFile {
            name: name.to_string(),
            path: path.to_string_lossy().into_owned(),
            size: contents.len() as u64,
        })
    }

    /// Delete a file
    ///
    /// # Errors
    ///
    /// Invalid name, missing file or I/O failure.
    pub async fn delete(&self, area: FileArea, name: &str) -> Result<(), StorageError> {
        let path = self.resolve(area, name)?;
        tokio::fs::remove_file(&path)
            .await
            .map_err(|e| StorageError::io(&path, e))?;
        tracing::info!(area = %area, name = %name, "Deleted file");
        Ok(())
    }
}

/// An upload in progress, written straight to its final path
#[derive(Debug)]
pub struct UploadWriter {
    file: tokio::fs::File,
    path: PathBuf,
    name: String,
    written: u64,
    max: u64,
}

impl UploadWriter {
    /// Append `chunk`, refusing to grow past the upload limit
    ///
    /// # Errors
    ///
    /// `StorageError::TooLarge` once the limit would be exceeded, or an I/O
    /// failure. Nothing from the rejected chunk is written.
    pub async fn write_chunk(&mut self, chunk: &[u8]) -> Result<(), StorageError> {
        let size = self.written + chunk.len() as u64;
        if size > self.max {
            return Err(StorageError::TooLarge {
                size,
                max: self.max,
            });
        }
        self.file
            .write_all(chunk)
            .await
            .map_err(|e| StorageError::io(&self.path, e))?;
        self.written = size;
        Ok(())
    }

    /// Flush the file and describe it
    ///
    /// # Errors
    ///
    /// I/O failure while flushing; the partial file is removed.
    pub async fn finish(mut self) -> Result<StoredFile, StorageError> {
        if let Err(e) = self.file.flush().await {
            let err = StorageError::io(&self.path, e);
            self.discard().await;
            return Err(err);
        }
        tracing::info!(
            area = %FileArea::Upload,
            name = %self.name,
            bytes = self.written,
            "Stored file"
        );
        Ok(StoredFile {
            name: self.name,
            path: self.path.to_string_lossy().into_owned(),
            size: self.written,
        })
    }

    /// Drop the partial upload
    pub async fn discard(self) {
        let Self { file, path, .. } = self;
        drop(file);
        if let Err(e) = tokio::fs::remove_file(&path).await {
            tracing::warn!(path = %path.display(), error = %e, "Could not remove partial upload");
        }
    }
}

fn normalize_extension(extension: &str) -> String {
    let lowered = extension.trim().to_lowercase();
    if lowered.starts_with('.') {
        lowered
    } else {
        format!(".{lowered}")
    }
}

async fn prepare_dir(dir: &Path) -> Result<PathBuf, StorageError> {
    tokio::fs::create_dir_all(dir)
        .await
        .map_err(|e| StorageError::io(dir, e))?;
    tokio::fs::canonicalize(dir)
        .await
        .map_err(|e| StorageError::io(dir, e))
}
