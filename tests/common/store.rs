//! Content stores for router tests.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use content_relay::content_store::{ContentStore, ContentStoreError, DeleteContent, PutContent};
use tokio::sync::Notify;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Revision {
        path: String,
        token: String,
    },
    Put {
        path: String,
        token: String,
        sha: Option<String>,
    },
    Delete {
        path: String,
        token: String,
        sha: String,
    },
}

#[derive(Debug, Clone)]
pub struct StoredFile {
    pub content: String,
    pub message: String,
    pub sha: String,
}

/// Repository stand-in that enforces revision checks the way the contents API does.
#[derive(Default)]
pub struct MemoryStore {
    calls: Mutex<Vec<Call>>,
    collide_next_lookup: Mutex<bool>,
    files: Mutex<HashMap<String, StoredFile>>,
    put_failures: Mutex<usize>,
    revision_failures: Mutex<usize>,
    revisions: Mutex<u64>,
}

#[allow(dead_code)]
impl MemoryStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Make the next `n` writes fail with a 502.
    pub fn fail_next_puts(&self, n: usize) {
        *self.put_failures.lock().unwrap() = n;
    }

    /// Make the next `n` revision lookups fail with a 500.
    pub fn fail_next_revisions(&self, n: usize) {
        *self.revision_failures.lock().unwrap() = n;
    }

    /// Have the next revision lookup find a file already sitting at whatever
    /// path it asks for, as when two uploads draw the same random id.
    pub fn collide_next_lookup(&self) {
        *self.collide_next_lookup.lock().unwrap() = true;
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn files(&self) -> HashMap<String, StoredFile> {
        self.files.lock().unwrap().clone()
    }

    pub fn file(&self, path: &str) -> Option<StoredFile> {
        self.files.lock().unwrap().get(path).cloned()
    }

    /// Seed a file without recording a call. Returns its revision.
    pub fn insert(&self, path: &str, content: &str) -> String {
        let sha = self.next_sha();
        self.files.lock().unwrap().insert(
            path.to_string(),
            StoredFile {
                content: content.to_string(),
                message: "seed".to_string(),
                sha: sha.clone(),
            },
        );
        sha
    }

    fn next_sha(&self) -> String {
        let mut rev = self.revisions.lock().unwrap();
        *rev += 1;
        format!("sha-{rev}")
    }

    fn record(&self, call: Call) {
        self.calls.lock().unwrap().push(call);
    }

    fn take_failure(counter: &Mutex<usize>) -> bool {
        let mut failures = counter.lock().unwrap();
        if *failures > 0 {
            *failures -= 1;
            true
        } else {
            false
        }
    }
}

#[async_trait]
impl ContentStore for MemoryStore {
    async fn revision(&self, path: &str, token: &str) -> Result<String, ContentStoreError> {
        self.record(Call::Revision {
            path: path.to_string(),
            token: token.to_string(),
        });

        if Self::take_failure(&self.revision_failures) {
            return Err(ContentStoreError::Status {
                status: 500,
                body: "server error".to_string(),
            });
        }

        if std::mem::take(&mut *self.collide_next_lookup.lock().unwrap()) {
            self.insert(path, "b2xkZXI=");
        }

        self.files
            .lock()
            .unwrap()
            .get(path)
            .map(|f| f.sha.clone())
            .ok_or_else(|| ContentStoreError::NotFound(path.to_string()))
    }

    async fn put(
        &self,
        path: &str,
        token: &str,
        content: PutContent,
    ) -> Result<(), ContentStoreError> {
        self.record(Call::Put {
            path: path.to_string(),
            token: token.to_string(),
            sha: content.sha.clone(),
        });

        if Self::take_failure(&self.put_failures) {
            return Err(ContentStoreError::Status {
                status: 502,
                body: "bad gateway".to_string(),
            });
        }

        let current = self.files.lock().unwrap().get(path).map(|f| f.sha.clone());
        if current != content.sha {
            return Err(ContentStoreError::Status {
                status: 409,
                body: format!("{path} does not match {:?}", content.sha),
            });
        }

        let sha = self.next_sha();
        self.files.lock().unwrap().insert(
            path.to_string(),
            StoredFile {
                content: content.content,
                message: content.message,
                sha,
            },
        );
        Ok(())
    }

    async fn delete(
        &self,
        path: &str,
        token: &str,
        content: DeleteContent,
    ) -> Result<(), ContentStoreError> {
        self.record(Call::Delete {
            path: path.to_string(),
            token: token.to_string(),
            sha: content.sha.clone(),
        });

        let mut files = self.files.lock().unwrap();
        match files.get(path) {
            None => Err(ContentStoreError::NotFound(path.to_string())),
            Some(f) if f.sha != content.sha => Err(ContentStoreError::Status {
                status: 409,
                body: format!("{path} does not match {}", content.sha),
            }),
            Some(_) => {
                files.remove(path);
                Ok(())
            }
        }
    }
}

/// A `MemoryStore` whose writes wait until [`GatedStore::open`] is called.
pub struct GatedStore {
    pub inner: Arc<MemoryStore>,
    gate: Notify,
}

#[allow(dead_code)]
impl GatedStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            inner: MemoryStore::new(),
            gate: Notify::new(),
        })
    }

    pub fn open(&self) {
        self.gate.notify_one();
    }
}

#[async_trait]
impl ContentStore for GatedStore {
    async fn revision(&self, path: &str, token: &str) -> Result<String, ContentStoreError> {
        self.inner.revision(path, token).await
    }

    async fn put(
        &self,
        path: &str,
        token: &str,
        content: PutContent,
    ) -> Result<(), ContentStoreError> {
        self.gate.notified().await;
        self.inner.put(path, token, content).await
    }

    async fn delete(
        &self,
        path: &str,
        token: &str,
        content: DeleteContent,
    ) -> Result<(), ContentStoreError> {
        self.inner.delete(path, token, content).await
    }
}
