//! In-memory storage adapter with injectable failures.

use async_trait::async_trait;
use bytes::Bytes;
use chrono::Utc;
use std::collections::{BTreeMap, HashMap};
use std::ops::Bound;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use stratus_core::models::StorageAccount;
use stratus_core::StorageProvider;
use stratus_storage::{
    bytes_stream, collect_stream, AdapterBuilder, ByteStream, ListPage, ObjectMetadata,
    RemoteObject, SignedUpload, StorageAdapter, StorageError, StorageResult, UploadedObject,
};
use uuid::Uuid;

#[derive(Clone)]
struct StoredObject {
    data: Bytes,
    content_type: Option<String>,
}

pub struct MockStorage {
    provider: StorageProvider,
    objects: Mutex<BTreeMap<String, StoredObject>>,
    fail_delete: AtomicBool,
    fail_list: AtomicBool,
    fail_signed_upload: AtomicBool,
    fail_metadata: AtomicBool,
    list_delay: Mutex<Option<Duration>>,
    closed: AtomicBool,
    list_calls: AtomicUsize,
}

impl MockStorage {
    pub fn new(provider: StorageProvider) -> Self {
        Self {
            provider,
            objects: Mutex::new(BTreeMap::new()),
            fail_delete: AtomicBool::new(false),
            fail_list: AtomicBool::new(false),
            fail_signed_upload: AtomicBool::new(false),
            fail_metadata: AtomicBool::new(false),
            list_delay: Mutex::new(None),
            closed: AtomicBool::new(false),
            list_calls: AtomicUsize::new(0),
        }
    }

    pub fn put(&self, key: &str, data: impl Into<Bytes>, content_type: Option<&str>) {
        self.objects.lock().unwrap().insert(
            key.to_string(),
            StoredObject {
                data: data.into(),
                content_type: content_type.map(str::to_string),
            },
        );
    }

    pub fn contains(&self, key: &str) -> bool {
        self.objects.lock().unwrap().contains_key(key)
    }

    pub fn object_count(&self) -> usize {
        self.objects.lock().unwrap().len()
    }

    pub fn set_fail_delete(&self, fail: bool) {
        self.fail_delete.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_list(&self, fail: bool) {
        self.fail_list.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_signed_upload(&self, fail: bool) {
        self.fail_signed_upload.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_metadata(&self, fail: bool) {
        self.fail_metadata.store(fail, Ordering::SeqCst);
    }

    /// Every list call sleeps this long before answering.
    pub fn set_list_delay(&self, delay: Duration) {
        *self.list_delay.lock().unwrap() = Some(delay);
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    pub fn list_calls(&self) -> usize {
        self.list_calls.load(Ordering::SeqCst)
    }

    fn object(&self, key: &str) -> StorageResult<StoredObject> {
        self.objects
            .lock()
            .unwrap()
            .get(key)
            .cloned()
            .ok_or_else(|| StorageError::NotFound(key.to_string()))
    }
}

#[async_trait]
impl StorageAdapter for MockStorage {
    fn provider(&self) -> StorageProvider {
        self.provider
    }

    async fn upload(
        &self,
        body: ByteStream,
        key: &str,
        content_type: &str,
        _size: Option<u64>,
        _metadata: HashMap<String, String>,
    ) -> StorageResult<UploadedObject> {
        let data = collect_stream(body).await?;
        let size = data.len() as u64;
        self.put(key, data, Some(content_type));
        Ok(UploadedObject {
            key: key.to_string(),
            public_url: self.public_url(key),
            thumbnail_url: None,
            provider_id: None,
            etag: None,
            size: Some(size),
        })
    }

    async fn generate_signed_upload_url(
        &self,
        key: &str,
        content_type: &str,
        expires_in: Duration,
        _max_size: Option<u64>,
    ) -> StorageResult<SignedUpload> {
        if self.fail_signed_upload.load(Ordering::SeqCst) {
            return Err(StorageError::SignedUrlFailed("simulated failure".to_string()));
        }
        let expires = chrono::Duration::from_std(expires_in)
            .map_err(|e| StorageError::SignedUrlFailed(e.to_string()))?;
        Ok(SignedUpload {
            url: format!("https://memory.test/upload/{}", key),
            method: "PUT".to_string(),
            headers: HashMap::from([("Content-Type".to_string(), content_type.to_string())]),
            form_fields: HashMap::new(),
            expires_at: Utc::now() + expires,
        })
    }

    async fn download(&self, key: &str) -> StorageResult<ByteStream> {
        Ok(bytes_stream(self.object(key)?.data))
    }

    async fn delete(&self, key: &str) -> StorageResult<()> {
        if self.fail_delete.load(Ordering::SeqCst) {
            return Err(StorageError::DeleteFailed("simulated failure".to_string()));
        }
        self.objects
            .lock()
            .unwrap()
            .remove(key)
            .map(|_| ())
            .ok_or_else(|| StorageError::NotFound(key.to_string()))
    }

    async fn move_object(&self, source_key: &str, dest_key: &str) -> StorageResult<()> {
        let mut objects = self.objects.lock().unwrap();
        let object = objects
            .remove(source_key)
            .ok_or_else(|| StorageError::NotFound(source_key.to_string()))?;
        objects.insert(dest_key.to_string(), object);
        Ok(())
    }

    fn public_url(&self, key: &str) -> String {
        format!("https://memory.test/{}", key)
    }

    async fn generate_signed_download_url(
        &self,
        key: &str,
        expires_in: Duration,
    ) -> StorageResult<String> {
        Ok(format!(
            "https://memory.test/{}?expires={}",
            key,
            expires_in.as_secs()
        ))
    }

    async fn list(
        &self,
        prefix: Option<&str>,
        limit: usize,
        cursor: Option<&str>,
    ) -> StorageResult<ListPage> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        let delay = *self.list_delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail_list.load(Ordering::SeqCst) {
            return Err(StorageError::ListFailed("simulated failure".to_string()));
        }

        let objects = self.objects.lock().unwrap();
        let lower = match cursor {
            Some(cursor) => Bound::Excluded(cursor.to_string()),
            None => Bound::Unbounded,
        };
        let mut matching = objects
            .range((lower, Bound::Unbounded))
            .filter(|(key, _)| prefix.map_or(true, |p| key.starts_with(p)));

        let files: Vec<RemoteObject> = matching
            .by_ref()
            .take(limit)
            .map(|(key, object)| RemoteObject {
                key: key.clone(),
                size: object.data.len() as u64,
                content_type: object.content_type.clone(),
                last_modified: None,
                etag: None,
            })
            .collect();
        let has_more = matching.next().is_some();
        let next_cursor = if has_more {
            files.last().map(|f| f.key.clone())
        } else {
            None
        };

        Ok(ListPage {
            files,
            next_cursor,
            has_more,
        })
    }

    async fn exists(&self, key: &str) -> StorageResult<bool> {
        Ok(self.contains(key))
    }

    async fn metadata(&self, key: &str) -> StorageResult<ObjectMetadata> {
        if self.fail_metadata.load(Ordering::SeqCst) {
            return Err(StorageError::BackendError("simulated failure".to_string()));
        }
        let object = self.object(key)?;
        Ok(ObjectMetadata {
            size: object.data.len() as u64,
            content_type: object.content_type,
            ..Default::default()
        })
    }

    async fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }
}

/// Hands out one [`MockStorage`] per account id; the same bucket survives pool rebuilds.
#[derive(Default)]
pub struct MockAdapterBuilder {
    adapters: Mutex<HashMap<Uuid, Arc<MockStorage>>>,
    builds: AtomicUsize,
}

impl MockAdapterBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn storage(&self, account: &StorageAccount) -> Arc<MockStorage> {
        self.adapters
            .lock()
            .unwrap()
            .entry(account.id)
            .or_insert_with(|| Arc::new(MockStorage::new(account.provider)))
            .clone()
    }

    pub fn builds(&self) -> usize {
        self.builds.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AdapterBuilder for MockAdapterBuilder {
    async fn build(&self, account: &StorageAccount) -> StorageResult<Arc<dyn StorageAdapter>> {
        self.builds.fetch_add(1, Ordering::SeqCst);
        Ok(self.storage(account))
    }
}
