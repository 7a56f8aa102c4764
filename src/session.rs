//! A page session: one store, one transport.
//!
//! Every user action runs as "backend call, then store mutation". Failed calls
//! leave the store at its last-known-good state. File-list responses carry the
//! [`RequestTag`] of the selection they were requested for and are dropped if
//! that selection is gone by the time they arrive.

use std::collections::{BTreeMap, BTreeSet};
use std::future::Future;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use futures::future::join_all;
use tracing::{debug, info, warn};

use crate::error::{AppError, AppResult, OptionExt, TransportError};
use crate::store::{RequestTag, SelectionStore};
use crate::transport::Transport;
use crate::types::{BucketName, FileBlob, FileName};

/// A completed file-list request, not yet applied to the store.
#[derive(Debug)]
pub struct FileListReply {
    pub tag: RequestTag,
    pub result: Result<BTreeSet<FileName>, TransportError>,
}

/// What happened to a file-list reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilesOutcome {
    Applied,
    /// The selection changed while the request was in flight.
    Stale,
}

pub struct BucketSession<T> {
    store: SelectionStore,
    transport: Arc<T>,
}

fn transport_failure(op: &'static str) -> impl FnOnce(TransportError) -> AppError {
    move |e| {
        warn!(op, error = %e, "backend call failed, keeping last-known-good state");
        AppError::Transport(e)
    }
}

impl<T: Transport + 'static> BucketSession<T> {
    pub fn new(transport: T) -> Self {
        Self::with_store(Arc::new(transport), SelectionStore::new())
    }

    pub fn with_store(transport: Arc<T>, store: SelectionStore) -> Self {
        Self { store, transport }
    }

    pub fn store(&self) -> &SelectionStore {
        &self.store
    }

    /// Direct access for forwarding user selection events.
    pub fn store_mut(&mut self) -> &mut SelectionStore {
        &mut self.store
    }

    pub async fn refresh_buckets(&mut self) -> AppResult<()> {
        let buckets = self
            .transport
            .list_buckets()
            .await
            .map_err(transport_failure("list_buckets"))?;
        info!(count = buckets.len(), "bucket list refreshed");
        self.store.set_buckets(buckets);
        Ok(())
    }

    /// Selects `name` and loads its files.
    pub async fn select_bucket(&mut self, name: &str) -> AppResult<FilesOutcome> {
        let tag = self.store.select_bucket(name)?;
        let reply = self.fetch_files(tag).await;
        self.apply_files(reply)
    }

    /// Reloads the files of the selected bucket.
    pub async fn refresh_files(&mut self) -> AppResult<FilesOutcome> {
        let tag = self.store.current_tag().ok_or_no_bucket()?;
        let reply = self.fetch_files(tag).await;
        self.apply_files(reply)
    }

    /// Starts a file-list request that does not borrow the session, so the
    /// caller can keep mutating the store while it is in flight.
    pub fn fetch_files(&self, tag: RequestTag) -> impl Future<Output = FileListReply> + Send + 'static {
        let transport = Arc::clone(&self.transport);
        async move {
            let result = transport.list_files(&tag.bucket).await;
            FileListReply { tag, result }
        }
    }

    /// Applies a file-list reply if its tag still matches the selection.
    pub fn apply_files(&mut self, reply: FileListReply) -> AppResult<FilesOutcome> {
        if !self.store.is_current(&reply.tag) {
            debug!(bucket = %reply.tag.bucket, epoch = reply.tag.epoch, "discarding stale file list");
            return Ok(FilesOutcome::Stale);
        }
        let files = reply.result.map_err(transport_failure("list_files"))?;
        info!(bucket = %reply.tag.bucket, count = files.len(), "file list refreshed");
        self.store.set_files(files)?;
        Ok(FilesOutcome::Applied)
    }

    /// Creates a bucket and reloads the bucket list.
    pub async fn create_bucket(&mut self, name: &str) -> AppResult<BucketName> {
        let bucket = BucketName::parse(name)?;
        self.transport
            .create_bucket(&bucket)
            .await
            .map_err(transport_failure("create_bucket"))?;
        info!(%bucket, "bucket created");
        self.refresh_buckets().await?;
        Ok(bucket)
    }

    pub async fn delete_bucket(&mut self, bucket: &BucketName) -> AppResult<()> {
        self.transport
            .delete_bucket(bucket)
            .await
            .map_err(transport_failure("delete_bucket"))?;
        info!(%bucket, "bucket deleted");
        self.store.remove_bucket(bucket);
        Ok(())
    }

    pub async fn delete_selected_bucket(&mut self) -> AppResult<BucketName> {
        let bucket = self.store.selected_bucket().cloned().ok_or_no_bucket()?;
        self.delete_bucket(&bucket).await?;
        Ok(bucket)
    }

    /// Deletes the selected files of the selected bucket.
    pub async fn delete_selected_files(&mut self) -> AppResult<usize> {
        let bucket = self.store.selected_bucket().cloned().ok_or_no_bucket()?;
        let files = self.store.selected_files().clone();
        if files.is_empty() {
            return Err(AppError::NothingSelected);
        }
        self.transport
            .delete_files(&bucket, &files)
            .await
            .map_err(transport_failure("delete_files"))?;
        info!(%bucket, count = files.len(), "files deleted");
        self.store.remove_files(&files);
        Ok(files.len())
    }

    /// Uploads blobs into the selected bucket and reloads its files.
    pub async fn upload_blobs(&mut self, blobs: Vec<FileBlob>) -> AppResult<FilesOutcome> {
        let bucket = self.store.selected_bucket().cloned().ok_or_no_bucket()?;
        let count = blobs.len();
        self.transport
            .upload_files(&bucket, blobs)
            .await
            .map_err(transport_failure("upload_files"))?;
        info!(%bucket, count, "files uploaded");
        self.refresh_files().await
    }

    /// Reads local files and uploads them under their file names.
    pub async fn upload_paths(&mut self, paths: &[PathBuf]) -> AppResult<FilesOutcome> {
        self.store.selected_bucket().ok_or_no_bucket()?;
        let mut blobs = Vec::with_capacity(paths.len());
        for path in paths {
            let name = path
                .file_name()
                .and_then(|n| n.to_str())
                .ok_or_else(|| AppError::InvalidName {
                    kind: "file",
                    reason: format!("{} has no usable file name", path.display()),
                })?;
            let name = FileName::parse(name)?;
            let data = tokio::fs::read(path).await?;
            blobs.push(FileBlob::new(name, data));
        }
        self.upload_blobs(blobs).await
    }

    /// Downloads all selected files concurrently into `dir`.
    ///
    /// Every download runs to completion. If any of them fails the error
    /// reports how many files were saved and which ones failed.
    pub async fn download_selected(&self, dir: &Path) -> AppResult<Vec<PathBuf>> {
        let bucket = self.store.selected_bucket().cloned().ok_or_no_bucket()?;
        let files = self.store.selected_files().clone();
        if files.is_empty() {
            return Err(AppError::NothingSelected);
        }

        let downloads = files.iter().map(|file| {
            let transport = Arc::clone(&self.transport);
            let bucket = bucket.clone();
            async move {
                let result = async {
                    let target = local_path_for(dir, file)?;
                    let data = transport
                        .download_file(&bucket, file)
                        .await
                        .map_err(transport_failure("download_file"))?;
                    if let Some(parent) = target.parent() {
                        tokio::fs::create_dir_all(parent).await?;
                    }
                    tokio::fs::write(&target, &data).await?;
                    debug!(%bucket, %file, bytes = data.len(), "file downloaded");
                    Ok::<_, AppError>(target)
                }
                .await;
                (file, result)
            }
        });

        let mut written = Vec::with_capacity(files.len());
        let mut failures = Vec::new();
        for (file, result) in join_all(downloads).await {
            match result {
                Ok(target) => written.push(target),
                Err(e) => failures.push(format!("{} ({})", file, e)),
            }
        }
        info!(%bucket, count = written.len(), failed = failures.len(), dir = %dir.display(), "files downloaded");
        if !failures.is_empty() {
            return Err(AppError::DownloadIncomplete {
                saved: written.len(),
                total: files.len(),
                failures: failures.join(", "),
            });
        }
        Ok(written)
    }

    /// Submits the selected files of the selected bucket for processing.
    /// Returns the number of files submitted.
    pub async fn process_selected(&self, algorithms: &[String]) -> AppResult<usize> {
        let bucket = self.store.selected_bucket().cloned().ok_or_no_bucket()?;
        let files = self.store.selected_files().clone();
        if files.is_empty() {
            return Err(AppError::NothingSelected);
        }
        if algorithms.is_empty() {
            return Err(AppError::NoAlgorithms);
        }
        let count = files.len();
        let batch = BTreeMap::from([(bucket.clone(), files)]);
        self.transport
            .process_files(&batch, algorithms)
            .await
            .map_err(transport_failure("process_files"))?;
        info!(%bucket, count, ?algorithms, "files submitted for processing");
        Ok(count)
    }
}

/// Maps an object key onto a path under `dir`. Keys may contain '/' but must
/// stay inside `dir`.
fn local_path_for(dir: &Path, file: &FileName) -> AppResult<PathBuf> {
    let relative = Path::new(file.as_str());
    let escapes = relative
        .components()
        .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir));
    if escapes {
        return Err(AppError::InvalidName {
            kind: "file",
            reason: format!("'{}' would be written outside the download directory", file),
        });
    }
    Ok(dir.join(relative))
}
