//! Client-side selection state.
//!
//! [`SelectionStore`] is the single source of truth for which bucket and which
//! files are currently selected. Renderers subscribe to it and redraw from its
//! data; they never hold selection state of their own.

use std::collections::BTreeSet;
use std::fmt;

use tracing::debug;

use crate::error::{AppError, AppResult, OptionExt};
use crate::types::{BucketName, FileName};

/// Identifies the selection a file-list request was issued for.
///
/// `epoch` is bumped every time the selected bucket changes, so a response
/// tagged with an older epoch is stale even if the bucket name matches again.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestTag {
    pub bucket: BucketName,
    pub epoch: u64,
}

/// The logical action behind a change notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreChange {
    BucketsReplaced,
    /// A bucket was chosen; its file list is empty until the caller loads it
    /// for `tag`.
    BucketSelected { bucket: BucketName, tag: RequestTag },
    /// The selected bucket was cleared without being removed.
    SelectionCleared,
    FilesReplaced,
    FileSelectionChanged,
    BucketRemoved { bucket: BucketName },
    FilesRemoved { count: usize },
}

/// Subscriber redrawing lists from the store.
pub trait ListRenderer {
    fn render(&mut self, change: &StoreChange, store: &SelectionStore);
}

/// Owned copy of the store's data, used for comparisons and hand-off.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StoreSnapshot {
    pub buckets: BTreeSet<BucketName>,
    pub selected_bucket: Option<BucketName>,
    pub files: BTreeSet<FileName>,
    pub selected_files: BTreeSet<FileName>,
}

#[derive(Default)]
pub struct SelectionStore {
    buckets: BTreeSet<BucketName>,
    selected_bucket: Option<BucketName>,
    files: BTreeSet<FileName>,
    selected_files: BTreeSet<FileName>,
    epoch: u64,
    renderers: Vec<Box<dyn ListRenderer>>,
}

impl SelectionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&mut self, renderer: Box<dyn ListRenderer>) {
        self.renderers.push(renderer);
    }

    /// Replaces the bucket set. A selected bucket missing from `names` is
    /// cleared together with its files.
    pub fn set_buckets(&mut self, names: impl IntoIterator<Item = BucketName>) {
        self.buckets = names.into_iter().collect();
        let still_known = self
            .selected_bucket
            .as_ref()
            .map_or(true, |b| self.buckets.contains(b));
        if !still_known {
            self.clear_bucket_scope();
        }
        self.notify(StoreChange::BucketsReplaced);
    }

    /// Selects `name` and clears the file scope. The returned tag must
    /// accompany the file-list request for the new bucket.
    pub fn select_bucket(&mut self, name: &str) -> AppResult<RequestTag> {
        let bucket = self
            .buckets
            .get(name)
            .cloned()
            .ok_or_else(|| AppError::InvalidSelection(name.to_string()))?;
        self.clear_bucket_scope();
        self.selected_bucket = Some(bucket.clone());
        let tag = RequestTag { bucket: bucket.clone(), epoch: self.epoch };
        self.notify(StoreChange::BucketSelected { bucket, tag: tag.clone() });
        Ok(tag)
    }

    pub fn deselect_bucket(&mut self) {
        self.clear_bucket_scope();
        self.notify(StoreChange::SelectionCleared);
    }

    /// Replaces the file set of the selected bucket and drops selected
    /// entries that disappeared.
    pub fn set_files(&mut self, names: impl IntoIterator<Item = FileName>) -> AppResult<()> {
        self.selected_bucket.as_ref().ok_or_no_bucket()?;
        self.files = names.into_iter().collect();
        let files = &self.files;
        self.selected_files.retain(|f| files.contains(f));
        self.notify(StoreChange::FilesReplaced);
        Ok(())
    }

    pub fn toggle_file_selection(&mut self, name: &str, selected: bool) -> AppResult<()> {
        let file = self
            .files
            .get(name)
            .cloned()
            .ok_or_else(|| AppError::UnknownFile(name.to_string()))?;
        if selected {
            self.selected_files.insert(file);
        } else {
            self.selected_files.remove(&file);
        }
        self.notify(StoreChange::FileSelectionChanged);
        Ok(())
    }

    /// Selects or deselects several files as one action. Every name is
    /// checked before the selection changes.
    pub fn set_files_selected<'a>(
        &mut self,
        names: impl IntoIterator<Item = &'a str>,
        selected: bool,
    ) -> AppResult<()> {
        self.selected_bucket.as_ref().ok_or_no_bucket()?;
        let targets = names
            .into_iter()
            .map(|name| {
                self.files
                    .get(name)
                    .cloned()
                    .ok_or_else(|| AppError::UnknownFile(name.to_string()))
            })
            .collect::<AppResult<Vec<_>>>()?;
        for file in targets {
            if selected {
                self.selected_files.insert(file);
            } else {
                self.selected_files.remove(&file);
            }
        }
        self.notify(StoreChange::FileSelectionChanged);
        Ok(())
    }

    pub fn select_all_files(&mut self) {
        self.selected_files = self.files.clone();
        self.notify(StoreChange::FileSelectionChanged);
    }

    pub fn clear_selected_files(&mut self) {
        self.selected_files.clear();
        self.notify(StoreChange::FileSelectionChanged);
    }

    pub fn remove_bucket(&mut self, name: &BucketName) {
        if !self.buckets.remove(name) {
            debug!(bucket = %name, "removed bucket was not in the known set");
        }
        if self.selected_bucket.as_ref() == Some(name) {
            self.clear_bucket_scope();
        }
        self.notify(StoreChange::BucketRemoved { bucket: name.clone() });
    }

    pub fn remove_files<'a>(&mut self, names: impl IntoIterator<Item = &'a FileName>) {
        let mut count = 0;
        for name in names {
            if self.files.remove(name) {
                count += 1;
            }
            self.selected_files.remove(name);
        }
        self.notify(StoreChange::FilesRemoved { count });
    }

    /// Whether a response tagged with `tag` may still be applied.
    pub fn is_current(&self, tag: &RequestTag) -> bool {
        tag.epoch == self.epoch && self.selected_bucket.as_ref() == Some(&tag.bucket)
    }

    /// Tag for a refresh of the currently selected bucket's files.
    pub fn current_tag(&self) -> Option<RequestTag> {
        self.selected_bucket
            .as_ref()
            .map(|bucket| RequestTag { bucket: bucket.clone(), epoch: self.epoch })
    }

    pub fn buckets(&self) -> &BTreeSet<BucketName> {
        &self.buckets
    }

    pub fn selected_bucket(&self) -> Option<&BucketName> {
        self.selected_bucket.as_ref()
    }

    pub fn files(&self) -> &BTreeSet<FileName> {
        &self.files
    }

    pub fn selected_files(&self) -> &BTreeSet<FileName> {
        &self.selected_files
    }

    pub fn snapshot(&self) -> StoreSnapshot {
        StoreSnapshot {
            buckets: self.buckets.clone(),
            selected_bucket: self.selected_bucket.clone(),
            files: self.files.clone(),
            selected_files: self.selected_files.clone(),
        }
    }

    fn clear_bucket_scope(&mut self) {
        if self.selected_bucket.take().is_some() {
            self.epoch += 1;
        }
        self.files.clear();
        self.selected_files.clear();
    }

    fn notify(&mut self, change: StoreChange) {
        debug!(?change, "selection store changed");
        let mut renderers = std::mem::take(&mut self.renderers);
        for renderer in renderers.iter_mut() {
            renderer.render(&change, self);
        }
        self.renderers = renderers;
    }
}

impl fmt::Debug for SelectionStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SelectionStore")
            .field("buckets", &self.buckets)
            .field("selected_bucket", &self.selected_bucket)
            .field("files", &self.files)
            .field("selected_files", &self.selected_files)
            .field("epoch", &self.epoch)
            .field("renderers", &self.renderers.len())
            .finish()
    }
}
