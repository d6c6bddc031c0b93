//! Best-effort local cache of remote rendering assets.
//!
//! Provisioning is fetch-once, trust-thereafter: presence of a file at its
//! declared path is sufficient, no freshness or checksum verification is
//! performed, and a failed fetch is terminal for the pass. Failures are
//! isolated per descriptor; the pass always returns a full report.

use std::{
    io::{self, Write},
    path::{Path, PathBuf},
    sync::Arc,
};

use bytes::Bytes;
use dashmap::DashMap;
use futures::future;
use metrics::counter;
use sha2::{Digest, Sha256};
use tempfile::NamedTempFile;
use thiserror::Error;
use tokio::{fs, sync::Mutex};
use tracing::{debug, info, warn};

use crate::domain::assets::{
    AssetDescriptor, AssetManifest, ProvisionResult, ProvisionStatus, ProvisioningReport,
};
use crate::infra::fetch::{AssetFetcher, FetchError, HttpFetcher};

#[derive(Debug, Error)]
enum ProvisionError {
    #[error(transparent)]
    Fetch(#[from] FetchError),
    #[error("failed to prepare directory `{}`: {source}", path.display())]
    Prepare { path: PathBuf, source: io::Error },
    #[error("failed to write `{}`: {source}", path.display())]
    Write { path: PathBuf, source: io::Error },
}

/// Makes a declared manifest of remote assets available under a local root.
pub struct AssetProvisioner {
    fetcher: Arc<dyn AssetFetcher>,
    target_locks: DashMap<PathBuf, Arc<Mutex<()>>>,
}

impl AssetProvisioner {
    pub fn new(fetcher: Arc<dyn AssetFetcher>) -> Self {
        Self {
            fetcher,
            target_locks: DashMap::new(),
        }
    }

    /// Provisioner backed by a plain reqwest client.
    pub fn with_http_client() -> Self {
        Self::new(Arc::new(HttpFetcher::default()))
    }

    /// Run one provisioning pass. Descriptors are handled concurrently and
    /// independently; the report lists one result per descriptor in manifest
    /// order and the call itself never fails.
    pub async fn provision(
        &self,
        manifest: &AssetManifest,
        local_root: &Path,
    ) -> ProvisioningReport {
        let results = future::join_all(
            manifest
                .descriptors()
                .iter()
                .map(|descriptor| self.provision_descriptor(descriptor, local_root)),
        )
        .await;

        let failed = results
            .iter()
            .filter(|result| !result.status.is_available())
            .count();
        info!(
            target = "infra::provisioner",
            total = results.len(),
            failed,
            root = %local_root.display(),
            "Provisioning pass finished"
        );

        ProvisioningReport::new(results)
    }

    /// Presence-only pass: report what is already on disk without touching
    /// the network. Used when the caller opts out of fetching.
    pub async fn inspect(&self, manifest: &AssetManifest, local_root: &Path) -> ProvisioningReport {
        let mut results = Vec::with_capacity(manifest.len());
        for descriptor in manifest.descriptors() {
            let target = local_root.join(descriptor.local_path());
            let status = if fs::try_exists(&target).await.unwrap_or(false) {
                ProvisionStatus::AlreadyPresent
            } else {
                ProvisionStatus::FetchFailed {
                    reason: "provisioning skipped and no local copy exists".to_string(),
                }
            };
            results.push(ProvisionResult {
                descriptor: descriptor.clone(),
                status,
            });
        }
        ProvisioningReport::new(results)
    }

    async fn provision_descriptor(
        &self,
        descriptor: &AssetDescriptor,
        local_root: &Path,
    ) -> ProvisionResult {
        let target = local_root.join(descriptor.local_path());

        // Concurrent passes racing on the same destination serialise here;
        // the atomic rename below keeps readers safe either way.
        let lock = self.lock_for(&target);
        let _guard = lock.lock().await;

        if fs::try_exists(&target).await.unwrap_or(false) {
            debug!(
                target = "infra::provisioner",
                asset = descriptor.name(),
                path = %target.display(),
                "Asset already present"
            );
            return ProvisionResult {
                descriptor: descriptor.clone(),
                status: ProvisionStatus::AlreadyPresent,
            };
        }

        match self.fetch_and_store(descriptor, &target).await {
            Ok((size_bytes, checksum)) => {
                info!(
                    target = "infra::provisioner",
                    asset = descriptor.name(),
                    path = %target.display(),
                    size_bytes,
                    "Fetched asset"
                );
                counter!("anteprima_assets_fetched_total").increment(1);
                ProvisionResult {
                    descriptor: descriptor.clone(),
                    status: ProvisionStatus::Fetched {
                        size_bytes,
                        checksum,
                    },
                }
            }
            Err(err) => {
                warn!(
                    target = "infra::provisioner",
                    asset = descriptor.name(),
                    source = %descriptor.remote_source(),
                    error = %err,
                    "Asset fetch failed"
                );
                counter!("anteprima_assets_fetch_failed_total").increment(1);
                ProvisionResult {
                    descriptor: descriptor.clone(),
                    status: ProvisionStatus::FetchFailed {
                        reason: err.to_string(),
                    },
                }
            }
        }
    }

    async fn fetch_and_store(
        &self,
        descriptor: &AssetDescriptor,
        target: &Path,
    ) -> Result<(u64, String), ProvisionError> {
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(|source| ProvisionError::Prepare {
                    path: parent.to_path_buf(),
                    source,
                })?;
        }

        let bytes = self.fetcher.fetch(descriptor.remote_source()).await?;
        let size_bytes = bytes.len() as u64;
        let checksum = hex::encode(Sha256::digest(&bytes));

        write_atomic(target.to_path_buf(), bytes)
            .await
            .map_err(|source| ProvisionError::Write {
                path: target.to_path_buf(),
                source,
            })?;

        Ok((size_bytes, checksum))
    }

    fn lock_for(&self, target: &Path) -> Arc<Mutex<()>> {
        self.target_locks
            .entry(target.to_path_buf())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }
}

/// Write the payload to a temporary file in the destination directory and
/// move it into place only on full success, so a concurrent reader never
/// observes a partially-written asset.
async fn write_atomic(target: PathBuf, bytes: Bytes) -> io::Result<()> {
    tokio::task::spawn_blocking(move || {
        let parent = target.parent().unwrap_or_else(|| Path::new("."));
        let mut staged = NamedTempFile::new_in(parent)?;
        staged.write_all(&bytes)?;
        staged.as_file().sync_all()?;
        staged.persist(&target).map_err(|err| err.error)?;
        Ok(())
    })
    .await
    .map_err(io::Error::other)?
}
