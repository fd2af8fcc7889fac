#![forbid(unsafe_code)]

//! Key-value store and dataset clients. Each comes in two backends: the
//! platform REST API (token-authenticated, via reqwest) and a local
//! filesystem emulation for development runs. Storage failures are platform
//! failures and propagate; they are not converted into dataset records.

use anyhow::{Context, Result};
use reqwest::{Client, StatusCode};
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};

const LOCAL_KEY_VALUE_SUBDIR: &str = "key_value_stores/default";
const LOCAL_DATASET_SUBDIR: &str = "datasets/default";

/// Content-addressable storage for downloaded media and the job input.
pub struct KeyValueStore {
    backend: StoreBackend,
}

enum StoreBackend {
    Platform {
        client: Client,
        api_base: String,
        token: String,
        store_id: String,
    },
    Local {
        dir: PathBuf,
    },
}

impl KeyValueStore {
    pub fn platform(client: Client, api_base: &str, token: &str, store_id: &str) -> Self {
        Self {
            backend: StoreBackend::Platform {
                client,
                api_base: api_base.trim_end_matches('/').to_string(),
                token: token.to_string(),
                store_id: store_id.to_string(),
            },
        }
    }

    pub fn local(storage_dir: &Path) -> Result<Self> {
        let dir = storage_dir.join(LOCAL_KEY_VALUE_SUBDIR);
        fs::create_dir_all(&dir).with_context(|| format!("creating {}", dir.display()))?;
        Ok(Self {
            backend: StoreBackend::Local { dir },
        })
    }

    /// The platform store id, used to synthesize retrieval URLs. Local stores
    /// have no id.
    pub fn id(&self) -> Option<&str> {
        match &self.backend {
            StoreBackend::Platform { store_id, .. } => Some(store_id),
            StoreBackend::Local { .. } => None,
        }
    }

    pub async fn set_value(&self, key: &str, bytes: Vec<u8>, content_type: &str) -> Result<()> {
        match &self.backend {
            StoreBackend::Platform {
                client,
                api_base,
                token,
                store_id,
            } => {
                let url = format!("{api_base}/v2/key-value-stores/{store_id}/records/{key}");
                client
                    .put(&url)
                    .bearer_auth(token)
                    .header("Content-Type", content_type)
                    .body(bytes)
                    .send()
                    .await
                    .with_context(|| format!("storing record {key}"))?
                    .error_for_status()
                    .with_context(|| format!("storing record {key}"))?;
                Ok(())
            }
            StoreBackend::Local { dir } => {
                let path = dir.join(key);
                fs::write(&path, bytes).with_context(|| format!("writing {}", path.display()))?;
                Ok(())
            }
        }
    }

    pub async fn get_value(&self, key: &str) -> Result<Option<Vec<u8>>> {
        match &self.backend {
            StoreBackend::Platform {
                client,
                api_base,
                token,
                store_id,
            } => {
                let url = format!("{api_base}/v2/key-value-stores/{store_id}/records/{key}");
                let response = client
                    .get(&url)
                    .bearer_auth(token)
                    .send()
                    .await
                    .with_context(|| format!("fetching record {key}"))?;
                if response.status() == StatusCode::NOT_FOUND {
                    return Ok(None);
                }
                let response = response
                    .error_for_status()
                    .with_context(|| format!("fetching record {key}"))?;
                let bytes = response
                    .bytes()
                    .await
                    .with_context(|| format!("reading record {key}"))?;
                Ok(Some(bytes.to_vec()))
            }
            StoreBackend::Local { dir } => {
                let path = dir.join(key);
                if !path.exists() {
                    return Ok(None);
                }
                let bytes =
                    fs::read(&path).with_context(|| format!("reading {}", path.display()))?;
                Ok(Some(bytes))
            }
        }
    }
}

/// Order-preserving, append-only output collection.
pub struct Dataset {
    backend: DatasetBackend,
}

enum DatasetBackend {
    Platform {
        client: Client,
        api_base: String,
        token: String,
        dataset_id: String,
    },
    Local {
        dir: PathBuf,
        next_index: AtomicUsize,
    },
}

impl Dataset {
    pub fn platform(client: Client, api_base: &str, token: &str, dataset_id: &str) -> Self {
        Self {
            backend: DatasetBackend::Platform {
                client,
                api_base: api_base.trim_end_matches('/').to_string(),
                token: token.to_string(),
                dataset_id: dataset_id.to_string(),
            },
        }
    }

    /// Opens the local dataset directory, resuming numbering after any items
    /// a previous interrupted run already pushed.
    pub fn local(storage_dir: &Path) -> Result<Self> {
        let dir = storage_dir.join(LOCAL_DATASET_SUBDIR);
        fs::create_dir_all(&dir).with_context(|| format!("creating {}", dir.display()))?;
        let existing = fs::read_dir(&dir)
            .with_context(|| format!("reading {}", dir.display()))?
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.path().extension().is_some_and(|ext| ext == "json"))
            .count();
        Ok(Self {
            backend: DatasetBackend::Local {
                dir,
                next_index: AtomicUsize::new(existing + 1),
            },
        })
    }

    pub async fn append<T: Serialize>(&self, record: &T) -> Result<()> {
        match &self.backend {
            DatasetBackend::Platform {
                client,
                api_base,
                token,
                dataset_id,
            } => {
                let url = format!("{api_base}/v2/datasets/{dataset_id}/items");
                client
                    .post(&url)
                    .bearer_auth(token)
                    .json(record)
                    .send()
                    .await
                    .context("pushing dataset item")?
                    .error_for_status()
                    .context("pushing dataset item")?;
                Ok(())
            }
            DatasetBackend::Local { dir, next_index } => {
                let index = next_index.fetch_add(1, Ordering::SeqCst);
                let path = dir.join(format!("{index:09}.json"));
                let payload = serde_json::to_vec_pretty(record)?;
                fs::write(&path, payload)
                    .with_context(|| format!("writing {}", path.display()))?;
                Ok(())
            }
        }
    }
}
