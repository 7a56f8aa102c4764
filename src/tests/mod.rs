//! Unit and integration tests for bucketdeck.
//!
//! ## Test Modules
//!
//! - **store_tests**: selection invariants and notifications
//! - **session_tests**: backend round trips and stale responses
//! - **transport_tests**: HTTP transport against an in-process axum backend
//! - **console_tests**: command parsing, rendering and the command loop
//! - **config_tests**: configuration loading and validation
//! - **error_tests**: error messages and conversions
//! - **types_tests**: name validation and wire types


use std::cell::RefCell;
use std::collections::{BTreeMap, BTreeSet};
use std::io::{self, Write};
use std::rc::Rc;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::error::TransportError;
use crate::store::{ListRenderer, SelectionStore, StoreChange};
use crate::transport::Transport;
use crate::types::{BucketName, FileBlob, FileName};

pub fn bucket(name: &str) -> BucketName {
    BucketName::parse(name).unwrap()
}

pub fn file(name: &str) -> FileName {
    FileName::parse(name).unwrap()
}

pub fn buckets(names: &[&str]) -> BTreeSet<BucketName> {
    names.iter().map(|n| bucket(n)).collect()
}

pub fn files(names: &[&str]) -> BTreeSet<FileName> {
    names.iter().map(|n| file(n)).collect()
}

/// Records every change it is notified about.
#[derive(Clone, Default)]
pub struct RecordingRenderer {
    pub changes: Rc<RefCell<Vec<StoreChange>>>,
}

impl ListRenderer for RecordingRenderer {
    fn render(&mut self, change: &StoreChange, _store: &SelectionStore) {
        self.changes.borrow_mut().push(change.clone());
    }
}

/// A `Write` sink that can be read back after being boxed into the store.
#[derive(Clone, Default)]
pub struct SharedBuffer(pub Rc<RefCell<Vec<u8>>>);

impl SharedBuffer {
    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.borrow()).into_owned()
    }
}

impl Write for SharedBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.borrow_mut().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// In-memory backend with switchable failure.
#[derive(Default)]
pub struct ScriptedTransport {
    pub objects: Mutex<BTreeMap<BucketName, BTreeMap<FileName, Vec<u8>>>>,
    pub failing: Mutex<Option<String>>,
    pub calls: Mutex<Vec<&'static str>>,
    pub broken_files: Mutex<BTreeSet<FileName>>,
    pub processed: Mutex<Vec<(BTreeMap<BucketName, BTreeSet<FileName>>, Vec<String>)>>,
}

impl ScriptedTransport {
    pub fn with_objects(content: &[(&str, Vec<&str>)]) -> Self {
        let transport = Self::default();
        {
            let mut objects = transport.objects.lock().unwrap();
            for (b, fs) in content {
                let entry = objects.entry(bucket(b)).or_default();
                for f in fs.iter() {
                    entry.insert(file(f), format!("contents of {}", f).into_bytes());
                }
            }
        }
        transport
    }

    pub fn fail_with(&self, reason: &str) {
        *self.failing.lock().unwrap() = Some(reason.to_string());
    }

    /// Makes downloads of `name` fail while everything else keeps working.
    pub fn break_download_of(&self, name: &str) {
        self.broken_files.lock().unwrap().insert(file(name));
    }

    pub fn recover(&self) {
        *self.failing.lock().unwrap() = None;
    }

    pub fn call_count(&self, op: &str) -> usize {
        self.calls.lock().unwrap().iter().filter(|c| **c == op).count()
    }

    fn enter(&self, op: &'static str) -> Result<(), TransportError> {
        self.calls.lock().unwrap().push(op);
        match self.failing.lock().unwrap().as_ref() {
            Some(reason) => Err(TransportError::Other(reason.clone())),
            None => Ok(()),
        }
    }

    fn missing(bucket: &BucketName) -> TransportError {
        TransportError::Other(format!("no such bucket: {}", bucket))
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn list_buckets(&self) -> Result<BTreeSet<BucketName>, TransportError> {
        self.enter("list_buckets")?;
        Ok(self.objects.lock().unwrap().keys().cloned().collect())
    }

    async fn list_files(&self, bucket: &BucketName) -> Result<BTreeSet<FileName>, TransportError> {
        self.enter("list_files")?;
        let objects = self.objects.lock().unwrap();
        let content = objects.get(bucket).ok_or_else(|| Self::missing(bucket))?;
        Ok(content.keys().cloned().collect())
    }

    async fn create_bucket(&self, bucket: &BucketName) -> Result<(), TransportError> {
        self.enter("create_bucket")?;
        self.objects.lock().unwrap().entry(bucket.clone()).or_default();
        Ok(())
    }

    async fn delete_bucket(&self, bucket: &BucketName) -> Result<(), TransportError> {
        self.enter("delete_bucket")?;
        self.objects
            .lock()
            .unwrap()
            .remove(bucket)
            .map(|_| ())
            .ok_or_else(|| Self::missing(bucket))
    }

    async fn delete_files(
        &self,
        bucket: &BucketName,
        files: &BTreeSet<FileName>,
    ) -> Result<(), TransportError> {
        self.enter("delete_files")?;
        let mut objects = self.objects.lock().unwrap();
        let content = objects.get_mut(bucket).ok_or_else(|| Self::missing(bucket))?;
        for f in files {
            content.remove(f);
        }
        Ok(())
    }

    async fn upload_files(
        &self,
        bucket: &BucketName,
        blobs: Vec<FileBlob>,
    ) -> Result<(), TransportError> {
        self.enter("upload_files")?;
        let mut objects = self.objects.lock().unwrap();
        let content = objects.get_mut(bucket).ok_or_else(|| Self::missing(bucket))?;
        for blob in blobs {
            content.insert(blob.name, blob.data);
        }
        Ok(())
    }

    async fn download_file(
        &self,
        bucket: &BucketName,
        file: &FileName,
    ) -> Result<Vec<u8>, TransportError> {
        self.enter("download_file")?;
        if self.broken_files.lock().unwrap().contains(file) {
            return Err(TransportError::Other(format!("read timeout on {}", file)));
        }
        let objects = self.objects.lock().unwrap();
        let content = objects.get(bucket).ok_or_else(|| Self::missing(bucket))?;
        content
            .get(file)
            .cloned()
            .ok_or_else(|| TransportError::Other(format!("no such file: {}", file)))
    }

    async fn process_files(
        &self,
        files: &BTreeMap<BucketName, BTreeSet<FileName>>,
        algorithms: &[String],
    ) -> Result<(), TransportError> {
        self.enter("process_files")?;
        self.processed.lock().unwrap().push((files.clone(), algorithms.to_vec()));
        Ok(())
    }
}
