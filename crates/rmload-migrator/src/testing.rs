//! In-memory store and sink with fault injection, for pipeline tests.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use rmload_shared::{DocumentSink, Envelope, IngestError, ObjectStore};
use serde_json::{json, Value};

// ---------------------------------------------------------------------------
// Object store
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct MemoryObjectStore {
    objects: Mutex<HashMap<String, Bytes>>,
    read_failures: Mutex<HashMap<String, u32>>,
    list_failures: Mutex<HashSet<String>>,
    fail_copy: AtomicBool,
    relocations: AtomicU32,
}

impl MemoryObjectStore {
    pub fn put(&self, key: &str, data: impl Into<Bytes>) {
        self.objects.lock().unwrap().insert(key.to_string(), data.into());
    }

    pub fn contains(&self, key: &str) -> bool {
        self.objects.lock().unwrap().contains_key(key)
    }

    /// Fail the next `times` reads of `key`.
    pub fn fail_reads(&self, key: &str, times: u32) {
        self.read_failures.lock().unwrap().insert(key.to_string(), times);
    }

    pub fn fail_list(&self, prefix: &str) {
        self.list_failures.lock().unwrap().insert(prefix.to_string());
    }

    pub fn fail_copies(&self) {
        self.fail_copy.store(true, Ordering::SeqCst);
    }

    pub fn relocations(&self) -> u32 {
        self.relocations.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ObjectStore for MemoryObjectStore {
    async fn list(&self, prefix: &str) -> Result<Vec<String>, IngestError> {
        if self.list_failures.lock().unwrap().contains(prefix) {
            return Err(IngestError::TransientIo(format!("list {}: injected", prefix)));
        }
        Ok(self
            .objects
            .lock()
            .unwrap()
            .keys()
            .filter(|k| k.starts_with(prefix))
            .cloned()
            .collect())
    }

    async fn read(&self, key: &str) -> Result<Bytes, IngestError> {
        {
            let mut failures = self.read_failures.lock().unwrap();
            if let Some(left) = failures.get_mut(key) {
                if *left > 0 {
                    *left -= 1;
                    return Err(IngestError::TransientIo(format!("read {}: injected", key)));
                }
            }
        }
        self.objects
            .lock()
            .unwrap()
            .get(key)
            .cloned()
            .ok_or_else(|| IngestError::NotFound(key.to_string()))
    }

    async fn relocate(&self, src: &str, dst: &str) -> Result<(), IngestError> {
        self.relocations.fetch_add(1, Ordering::SeqCst);
        if self.fail_copy.load(Ordering::SeqCst) {
            return Err(IngestError::TransientIo(format!("copy {} -> {}: injected", src, dst)));
        }
        let mut objects = self.objects.lock().unwrap();
        let data = objects
            .remove(src)
            .ok_or_else(|| IngestError::NotFound(src.to_string()))?;
        objects.insert(dst.to_string(), data);
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Document sink
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct MemoryDocumentSink {
    documents: Mutex<HashMap<String, Value>>,
    write_failures: AtomicU32,
    write_delay: Duration,
    writes: AtomicU32,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl MemoryDocumentSink {
    pub fn with_delay(write_delay: Duration) -> Self {
        Self {
            write_delay,
            ..Self::default()
        }
    }

    /// Fail the next `times` writes, whatever the record.
    pub fn fail_writes(&self, times: u32) {
        self.write_failures.store(times, Ordering::SeqCst);
    }

    pub fn document(&self, path: &str) -> Option<Value> {
        self.documents.lock().unwrap().get(path).cloned()
    }

    pub fn len(&self) -> usize {
        self.documents.lock().unwrap().len()
    }

    pub fn writes(&self) -> u32 {
        self.writes.load(Ordering::SeqCst)
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DocumentSink for MemoryDocumentSink {
    async fn write(&self, envelope: &Envelope) -> Result<(), IngestError> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);

        if !self.write_delay.is_zero() {
            tokio::time::sleep(self.write_delay).await;
        }

        let failed = self
            .write_failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();

        let result = if failed {
            Err(IngestError::TransientIo("write: injected".into()))
        } else {
            let body = envelope.to_document()?;
            self.documents
                .lock()
                .unwrap()
                .insert(envelope.document_path().to_string(), body);
            Ok(())
        };

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        result
    }
}

// ---------------------------------------------------------------------------
// Records
// ---------------------------------------------------------------------------

pub fn message_record(id: &str, board_id: i64) -> String {
    json!({
        "specversion": "1.0",
        "id": id,
        "source": "/redmine/boards",
        "type": "com.rmine.message.created",
        "time": "2024-05-02T09:30:00Z",
        "data": {
            "id": 1001,
            "parent_id": {"Int64": 0, "Valid": false},
            "board_id": board_id,
            "subject": "Deploy window",
            "content": "Moving the deploy to Friday.",
            "created_on": "2024-05-02T09:29:58Z",
            "updated_on": null
        }
    })
    .to_string()
}

pub fn user_record(id: &str, login: &str) -> String {
    json!({
        "specversion": "1.0",
        "id": id,
        "source": "/redmine/users",
        "type": "com.rmine.user.updated",
        "time": "2024-05-02T00:00:00Z",
        "data": {
            "id": 7,
            "login": login,
            "firstname": "Jo",
            "lastname": "Doe",
            "hashed_password": "4f1c",
            "salt": "9a7e",
            "auth_source_id": {"Int64": 3, "Valid": true},
            "status": 1,
            "language": "ko",
            "created_on": "2023-01-01T00:00:00Z"
        }
    })
    .to_string()
}
