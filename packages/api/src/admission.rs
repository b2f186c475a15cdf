//! Upload validation, done synchronously before anything is stored or queued.

use bytes::Bytes;

/// 20 MiB.
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 20 * 1024 * 1024;

/// Incoming audio.
#[derive(Debug, Clone)]
pub struct Upload {
    /// Client-side file name. `None` for a raw body upload.
    pub filename: Option<String>,
    pub bytes: Bytes,
}

impl Upload {
    /// A file picked in a form, with its client-side name.
    pub fn file(filename: impl Into<String>, bytes: impl Into<Bytes>) -> Self {
        Self {
            filename: Some(filename.into()),
            bytes: bytes.into(),
        }
    }

    /// A raw request body. Stored with the policy's default extension.
    pub fn raw(bytes: impl Into<Bytes>) -> Self {
        Self {
            filename: None,
            bytes: bytes.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AdmissionError {
    #[error("no file was uploaded")]
    EmptyPayload,

    #[error("no file selected for upload")]
    NoFileSelected,

    #[error("file must have one of the extensions: {allowed}")]
    DisallowedExtension { allowed: String },

    #[error("upload is {size} bytes, the limit is {max}")]
    TooLarge { size: usize, max: usize },
}

/// What an upload must satisfy to be accepted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdmissionPolicy {
    pub max_bytes: usize,
    /// Lowercase extensions without the dot. The first one is used for raw uploads.
    pub allowed_extensions: Vec<String>,
}

impl Default for AdmissionPolicy {
    fn default() -> Self {
        Self {
            max_bytes: DEFAULT_MAX_UPLOAD_BYTES,
            allowed_extensions: vec!["ogg".to_string()],
        }
    }
}

impl AdmissionPolicy {
    pub fn with_max_bytes(mut self, max_bytes: usize) -> Self {
        self.max_bytes = max_bytes;
        self
    }

    pub fn with_extensions<I, S>(mut self, extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.allowed_extensions = extensions
            .into_iter()
            .map(|ext| ext.as_ref().trim().trim_start_matches('.').to_ascii_lowercase())
            .filter(|ext| !ext.is_empty())
            .collect();
        self
    }

    fn default_extension(&self) -> &str {
        self.allowed_extensions
            .first()
            .map(String::as_str)
            .unwrap_or("ogg")
    }

    /// Validate an upload and return the extension it is stored under.
    pub fn admit(&self, upload: &Upload) -> Result<String, AdmissionError> {
        let extension = match upload.filename.as_deref() {
            None => self.default_extension().to_string(),
            Some(name) if name.trim().is_empty() => return Err(AdmissionError::NoFileSelected),
            Some(name) => {
                let extension = name
                    .rsplit_once('.')
                    .map(|(_, ext)| ext.to_ascii_lowercase())
                    .filter(|ext| self.allowed_extensions.contains(ext));
                extension.ok_or_else(|| AdmissionError::DisallowedExtension {
                    allowed: self.allowed_extensions.join(", "),
                })?
            }
        };

        if upload.bytes.is_empty() {
            return Err(AdmissionError::EmptyPayload);
        }
        if upload.bytes.len() > self.max_bytes {
            return Err(AdmissionError::TooLarge {
                size: upload.bytes.len(),
                max: self.max_bytes,
            });
        }

        Ok(extension)
    }
}
