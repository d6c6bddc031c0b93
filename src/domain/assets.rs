//! Asset manifest types shared by the provisioner and the render pipeline.

use std::path::{Component, Path, PathBuf};

use serde::{Deserialize, Serialize};
use url::Url;

use crate::domain::error::DomainError;

/// Render sub-stage a provisioned asset backs. Structural transformation has
/// no asset dependency and therefore no variant here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RenderStage {
    Highlighting,
    Math,
}

/// A named reference to one remote asset and its local destination.
///
/// Descriptors are defined at configuration time and never mutated; the
/// provisioner consults them on every pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetDescriptor {
    name: String,
    local_path: PathBuf,
    remote_source: Url,
    stage: Option<RenderStage>,
}

impl AssetDescriptor {
    pub fn new(
        name: impl Into<String>,
        local_path: impl Into<PathBuf>,
        remote_source: Url,
        stage: Option<RenderStage>,
    ) -> Result<Self, DomainError> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(DomainError::validation("asset name must not be empty"));
        }

        let local_path = local_path.into();
        validate_relative_path(&local_path)?;

        Ok(Self {
            name,
            local_path,
            remote_source,
            stage,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Destination path relative to the asset root.
    pub fn local_path(&self) -> &Path {
        &self.local_path
    }

    pub fn remote_source(&self) -> &Url {
        &self.remote_source
    }

    pub fn stage(&self) -> Option<RenderStage> {
        self.stage
    }
}

fn validate_relative_path(path: &Path) -> Result<(), DomainError> {
    if path.as_os_str().is_empty() {
        return Err(DomainError::validation("asset path must not be empty"));
    }

    if path.is_absolute()
        || path
            .components()
            .any(|component| matches!(component, Component::ParentDir | Component::Prefix(_)))
    {
        return Err(DomainError::validation(format!(
            "asset path `{}` must stay below the asset root",
            path.display()
        )));
    }

    Ok(())
}

/// Ordered collection of descriptors with unique names.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetManifest {
    descriptors: Vec<AssetDescriptor>,
}

impl AssetManifest {
    pub fn new(descriptors: Vec<AssetDescriptor>) -> Result<Self, DomainError> {
        for (index, descriptor) in descriptors.iter().enumerate() {
            if descriptors[..index]
                .iter()
                .any(|other| other.name == descriptor.name)
            {
                return Err(DomainError::invariant(format!(
                    "asset name `{}` appears more than once in the manifest",
                    descriptor.name
                )));
            }
        }

        Ok(Self { descriptors })
    }

    pub fn descriptors(&self) -> &[AssetDescriptor] {
        &self.descriptors
    }

    pub fn is_empty(&self) -> bool {
        self.descriptors.is_empty()
    }

    pub fn len(&self) -> usize {
        self.descriptors.len()
    }
}

/// Manifest covering the stylesheet and font assets the default pipeline
/// expects: a highlight theme plus the KaTeX distribution files.
pub fn default_manifest() -> AssetManifest {
    let descriptors = vec![
        descriptor(
            "highlight-theme",
            "css/highlight.default.min.css",
            "https://cdnjs.cloudflare.com/ajax/libs/highlight.js/11.5.0/styles/default.min.css",
            Some(RenderStage::Highlighting),
        ),
        descriptor(
            "katex-stylesheet",
            "katex/katex.min.css",
            "https://cdn.jsdelivr.net/npm/katex@0.16.11/dist/katex.min.css",
            Some(RenderStage::Math),
        ),
        descriptor(
            "katex-main-font",
            "katex/fonts/KaTeX_Main-Regular.woff2",
            "https://cdn.jsdelivr.net/npm/katex@0.16.11/dist/fonts/KaTeX_Main-Regular.woff2",
            Some(RenderStage::Math),
        ),
    ];

    AssetManifest::new(descriptors).expect("default manifest must be valid")
}

fn descriptor(
    name: &str,
    local_path: &str,
    remote_source: &str,
    stage: Option<RenderStage>,
) -> AssetDescriptor {
    let url = Url::parse(remote_source).expect("default manifest URLs must parse");
    AssetDescriptor::new(name, local_path, url, stage).expect("default descriptor must be valid")
}

/// Outcome of provisioning one descriptor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ProvisionStatus {
    /// The file already existed locally; no freshness check is performed.
    AlreadyPresent,
    /// The asset was downloaded and persisted atomically.
    Fetched { size_bytes: u64, checksum: String },
    /// The asset could not be made available in this pass.
    FetchFailed { reason: String },
}

impl ProvisionStatus {
    /// Whether the asset is usable after this pass.
    pub fn is_available(&self) -> bool {
        !matches!(self, ProvisionStatus::FetchFailed { .. })
    }
}

/// One descriptor's result within a provisioning pass. Immutable once
/// created; failures carry their detail in [`ProvisionStatus::FetchFailed`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProvisionResult {
    pub descriptor: AssetDescriptor,
    pub status: ProvisionStatus,
}

/// Aggregated outcome of one provisioning pass, in manifest order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProvisioningReport {
    results: Vec<ProvisionResult>,
}

impl ProvisioningReport {
    pub fn new(results: Vec<ProvisionResult>) -> Self {
        Self { results }
    }

    pub fn results(&self) -> &[ProvisionResult] {
        &self.results
    }

    pub fn is_available(&self, name: &str) -> bool {
        self.results
            .iter()
            .any(|result| result.descriptor.name() == name && result.status.is_available())
    }

    pub fn failures(&self) -> impl Iterator<Item = &ProvisionResult> {
        self.results
            .iter()
            .filter(|result| !result.status.is_available())
    }

    /// Project the report onto the render stages it backs. A stage is
    /// available when every descriptor tagged for it is usable; a stage with
    /// no tagged descriptors has nothing to miss.
    pub fn stage_availability(&self) -> StageAvailability {
        StageAvailability {
            highlighting: self.stage_is_available(RenderStage::Highlighting),
            math: self.stage_is_available(RenderStage::Math),
        }
    }

    fn stage_is_available(&self, stage: RenderStage) -> bool {
        self.results
            .iter()
            .filter(|result| result.descriptor.stage() == Some(stage))
            .all(|result| result.status.is_available())
    }
}

/// Which render sub-stages have their backing assets in place.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageAvailability {
    pub highlighting: bool,
    pub math: bool,
}

impl StageAvailability {
    pub const fn full() -> Self {
        Self {
            highlighting: true,
            math: true,
        }
    }

    pub const fn none() -> Self {
        Self {
            highlighting: false,
            math: false,
        }
    }
}

impl Default for StageAvailability {
    fn default() -> Self {
        Self::full()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn url(raw: &str) -> Url {
        Url::parse(raw).expect("test url")
    }

    #[test]
    fn manifest_rejects_duplicate_names() {
        let first = AssetDescriptor::new("a", "css/a.css", url("https://x/a.css"), None)
            .expect("descriptor");
        let second = AssetDescriptor::new("a", "css/b.css", url("https://x/b.css"), None)
            .expect("descriptor");

        let error = AssetManifest::new(vec![first, second]).expect_err("duplicate names");
        assert!(error.to_string().contains("more than once"));
    }

    #[test]
    fn descriptor_rejects_escaping_paths() {
        assert!(AssetDescriptor::new("a", "../a.css", url("https://x/a.css"), None).is_err());
        assert!(AssetDescriptor::new("a", "/etc/a.css", url("https://x/a.css"), None).is_err());
        assert!(AssetDescriptor::new("a", "", url("https://x/a.css"), None).is_err());
    }

    #[test]
    fn default_manifest_groups_paths_by_category() {
        let manifest = default_manifest();
        assert_eq!(manifest.len(), 3);
        for descriptor in manifest.descriptors() {
            let first = descriptor
                .local_path()
                .components()
                .next()
                .expect("category component");
            assert!(matches!(first, Component::Normal(_)));
        }
    }

    #[test]
    fn stage_availability_tracks_tagged_failures() {
        let manifest = default_manifest();
        let results = manifest
            .descriptors()
            .iter()
            .map(|descriptor| ProvisionResult {
                descriptor: descriptor.clone(),
                status: if descriptor.name() == "katex-stylesheet" {
                    ProvisionStatus::FetchFailed {
                        reason: "connection refused".into(),
                    }
                } else {
                    ProvisionStatus::AlreadyPresent
                },
            })
            .collect();

        let report = ProvisioningReport::new(results);
        let availability = report.stage_availability();
        assert!(availability.highlighting);
        assert!(!availability.math);
        assert_eq!(report.failures().count(), 1);
    }

    #[test]
    fn empty_report_leaves_all_stages_available() {
        let report = ProvisioningReport::new(Vec::new());
        assert_eq!(report.stage_availability(), StageAvailability::full());
    }
}
