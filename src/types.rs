//! Type definitions shared by the store, the transport and the console.
//!
//! ## Main Categories
//!
//! - **Names**: validated bucket and file identifiers
//! - **Wire Types**: request/response bodies of the storage and processing API
//! - **Blobs**: file contents moving through upload and download

use std::borrow::Borrow;
use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{AppError, AppResult};

macro_rules! name_type {
    ($(#[$meta:meta])* $name:ident, $kind:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(try_from = "String", into = "String")]
        pub struct $name(String);

        impl $name {
            /// Validates and wraps a raw name.
            pub fn parse(raw: impl Into<String>) -> AppResult<Self> {
                let raw = raw.into();
                if raw.is_empty() {
                    return Err(AppError::InvalidName {
                        kind: $kind,
                        reason: "name cannot be empty".to_string(),
                    });
                }
                if raw.contains('\0') {
                    return Err(AppError::InvalidName {
                        kind: $kind,
                        reason: "name contains null characters".to_string(),
                    });
                }
                Ok(Self(raw))
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl TryFrom<String> for $name {
            type Error = AppError;

            fn try_from(raw: String) -> AppResult<Self> {
                Self::parse(raw)
            }
        }

        impl From<$name> for String {
            fn from(name: $name) -> String {
                name.0
            }
        }

        impl Borrow<str> for $name {
            fn borrow(&self) -> &str {
                &self.0
            }
        }
    };
}

name_type!(
    /// Identifier of a bucket, unique within the known bucket set.
    BucketName,
    "bucket"
);

name_type!(
    /// Identifier of a file, unique within the file set of one bucket.
    FileName,
    "file"
);

/// Body of `GET /get_buckets`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BucketListResponse {
    pub buckets: Vec<BucketName>,
}

/// Body of `POST /get_files`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FileListResponse {
    pub files: Vec<FileName>,
}

/// Request body naming a single bucket (list files, create, delete).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BucketRequest {
    pub bucket: BucketName,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DeleteFilesRequest {
    pub bucket: BucketName,
    pub files: Vec<FileName>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DownloadFileRequest {
    pub bucket: BucketName,
    pub file: FileName,
}

/// Body of `POST /process_data`: the files to run, grouped by bucket, and the
/// algorithms to run on each of them.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProcessRequest {
    pub files: BTreeMap<BucketName, Vec<FileName>>,
    pub algorithms: Vec<String>,
}

/// A file's name together with its full contents.
#[derive(Clone, PartialEq, Eq)]
pub struct FileBlob {
    pub name: FileName,
    pub data: Vec<u8>,
}

impl FileBlob {
    pub fn new(name: FileName, data: Vec<u8>) -> Self {
        Self { name, data }
    }
}

// Contents are elided so logs never dump file bodies.
impl fmt::Debug for FileBlob {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FileBlob")
            .field("name", &self.name)
            .field("len", &self.data.len())
            .finish()
    }
}
