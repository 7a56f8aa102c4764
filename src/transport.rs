//! Backend access.
//!
//! [`Transport`] is the seam between the session and the storage API. The
//! shipped implementation, [`HttpTransport`], speaks JSON over HTTP:
//!
//! | operation     | request                                  | response            |
//! |---------------|------------------------------------------|---------------------|
//! | list buckets  | `GET get_buckets`                        | `{"buckets": [..]}` |
//! | list files    | `POST get_files {bucket}`                | `{"files": [..]}`   |
//! | create bucket | `POST create_bucket {bucket}`            | any 2xx             |
//! | delete bucket | `POST delete_bucket {bucket}`            | any 2xx             |
//! | delete files  | `POST delete_files {bucket, files}`      | any 2xx             |
//! | upload files  | `POST upload_files` multipart            | any 2xx             |
//! | download file | `POST download_file {bucket, file}`      | raw bytes           |
//! | process files | `POST process_data {files, algorithms}`  | any 2xx             |
//!
//! Paths are resolved relative to the configured base URL.

use std::collections::{BTreeMap, BTreeSet};
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{multipart, Client, RequestBuilder, Response};
use tracing::{debug, warn};
use url::Url;
use uuid::Uuid;

use crate::config::BackendConfig;
use crate::error::TransportError;
use crate::types::{
    BucketListResponse, BucketName, BucketRequest, DeleteFilesRequest, DownloadFileRequest,
    FileBlob, FileListResponse, FileName, ProcessRequest,
};

#[async_trait]
pub trait Transport: Send + Sync {
    async fn list_buckets(&self) -> Result<BTreeSet<BucketName>, TransportError>;

    async fn list_files(&self, bucket: &BucketName) -> Result<BTreeSet<FileName>, TransportError>;

    async fn create_bucket(&self, bucket: &BucketName) -> Result<(), TransportError>;

    async fn delete_bucket(&self, bucket: &BucketName) -> Result<(), TransportError>;

    async fn delete_files(
        &self,
        bucket: &BucketName,
        files: &BTreeSet<FileName>,
    ) -> Result<(), TransportError>;

    async fn upload_files(&self, bucket: &BucketName, blobs: Vec<FileBlob>)
        -> Result<(), TransportError>;

    async fn download_file(
        &self,
        bucket: &BucketName,
        file: &FileName,
    ) -> Result<Vec<u8>, TransportError>;

    /// Submits files for server-side processing with the named algorithms.
    async fn process_files(
        &self,
        files: &BTreeMap<BucketName, BTreeSet<FileName>>,
        algorithms: &[String],
    ) -> Result<(), TransportError>;
}

#[derive(Debug, Clone)]
pub struct HttpTransport {
    base: Url,
    client: Client,
}

impl HttpTransport {
    pub fn new(base: &Url, timeout: Duration) -> Result<Self, TransportError> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("bucketdeck/", env!("CARGO_PKG_VERSION")))
            .build()?;

        // Url::join replaces the last segment unless the path ends in '/'.
        let mut base = base.clone();
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }

        Ok(Self { base, client })
    }

    pub fn from_config(cfg: &BackendConfig) -> Result<Self, TransportError> {
        let base = Url::parse(&cfg.base_url)?;
        Self::new(&base, Duration::from_secs(cfg.timeout_secs))
    }

    pub fn base_url(&self) -> &Url {
        &self.base
    }

    fn endpoint(&self, path: &str) -> Result<Url, TransportError> {
        Ok(self.base.join(path)?)
    }

    async fn send(&self, op: &'static str, request: RequestBuilder) -> Result<Response, TransportError> {
        let request_id = Uuid::new_v4();
        debug!(%request_id, op, "sending request");
        let response = request
            .header("x-request-id", request_id.to_string())
            .send()
            .await
            .map_err(|e| {
                warn!(%request_id, op, error = %e, "request failed");
                e
            })?;

        let status = response.status();
        if status.is_success() {
            debug!(%request_id, op, %status, "request completed");
            Ok(response)
        } else {
            let body = response.text().await.unwrap_or_default();
            warn!(%request_id, op, %status, "backend rejected request");
            Err(TransportError::HttpStatus(status, body))
        }
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn list_buckets(&self) -> Result<BTreeSet<BucketName>, TransportError> {
        let url = self.endpoint("get_buckets")?;
        let response = self.send("list_buckets", self.client.get(url)).await?;
        let body: BucketListResponse = response.json().await?;
        Ok(body.buckets.into_iter().collect())
    }

    async fn list_files(&self, bucket: &BucketName) -> Result<BTreeSet<FileName>, TransportError> {
        let url = self.endpoint("get_files")?;
        let body = BucketRequest { bucket: bucket.clone() };
        let response = self.send("list_files", self.client.post(url).json(&body)).await?;
        let body: FileListResponse = response.json().await?;
        Ok(body.files.into_iter().collect())
    }

    async fn create_bucket(&self, bucket: &BucketName) -> Result<(), TransportError> {
        let url = self.endpoint("create_bucket")?;
        let body = BucketRequest { bucket: bucket.clone() };
        self.send("create_bucket", self.client.post(url).json(&body)).await?;
        Ok(())
    }

    async fn delete_bucket(&self, bucket: &BucketName) -> Result<(), TransportError> {
        let url = self.endpoint("delete_bucket")?;
        let body = BucketRequest { bucket: bucket.clone() };
        self.send("delete_bucket", self.client.post(url).json(&body)).await?;
        Ok(())
    }

    async fn delete_files(
        &self,
        bucket: &BucketName,
        files: &BTreeSet<FileName>,
    ) -> Result<(), TransportError> {
        let url = self.endpoint("delete_files")?;
        let body = DeleteFilesRequest {
            bucket: bucket.clone(),
            files: files.iter().cloned().collect(),
        };
        self.send("delete_files", self.client.post(url).json(&body)).await?;
        Ok(())
    }

    async fn upload_files(
        &self,
        bucket: &BucketName,
        blobs: Vec<FileBlob>,
    ) -> Result<(), TransportError> {
        let url = self.endpoint("upload_files")?;
        let mut form = multipart::Form::new().text("bucket", bucket.to_string());
        for blob in blobs {
            let part = multipart::Part::bytes(blob.data).file_name(blob.name.to_string());
            form = form.part("files", part);
        }
        self.send("upload_files", self.client.post(url).multipart(form)).await?;
        Ok(())
    }

    async fn download_file(
        &self,
        bucket: &BucketName,
        file: &FileName,
    ) -> Result<Vec<u8>, TransportError> {
        let url = self.endpoint("download_file")?;
        let body = DownloadFileRequest { bucket: bucket.clone(), file: file.clone() };
        let response = self.send("download_file", self.client.post(url).json(&body)).await?;
        Ok(response.bytes().await?.to_vec())
    }

    async fn process_files(
        &self,
        files: &BTreeMap<BucketName, BTreeSet<FileName>>,
        algorithms: &[String],
    ) -> Result<(), TransportError> {
        let url = self.endpoint("process_data")?;
        let body = ProcessRequest {
            files: files
                .iter()
                .map(|(bucket, names)| (bucket.clone(), names.iter().cloned().collect()))
                .collect(),
            algorithms: algorithms.to_vec(),
        };
        self.send("process_files", self.client.post(url).json(&body)).await?;
        Ok(())
    }
}
