//! Batch import of externally supplied entries
//!
//! Records are created in order through the normal create path, one atomic
//! unit per record, so a bad record never takes the rest of the batch down.
//! Parents are named by batch-local keys and must appear before their children.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::core::engine::{Engine, NewEntry};
use crate::core::error::{EngineError, EngineResult};
use crate::core::identity::{ContainerId, EntryId, ResourceRef};
use crate::core::store::Entry;

/// One entry to import
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportRecord {
    /// Batch-local key other records use to name this one as parent
    pub key: String,
    #[serde(default)]
    pub parent_key: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    pub kind: String,
    #[serde(default)]
    pub index: Option<i64>,
    #[serde(default)]
    pub external_ref: Option<ResourceRef>,
}

/// Non-fatal problem with an imported record
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImportWarning {
    /// The entry was created but its resource does not exist (yet)
    UnresolvedReference { key: String, resource: ResourceRef },
}

/// A record that was not imported
#[derive(Debug)]
pub enum ImportFailure {
    DuplicateKey { key: String },
    /// The parent key is not an earlier, successfully imported record
    UnknownParent { key: String, parent_key: String },
    Rejected { key: String, error: EngineError },
}

impl ImportFailure {
    pub fn key(&self) -> &str {
        match self {
            ImportFailure::DuplicateKey { key }
            | ImportFailure::UnknownParent { key, .. }
            | ImportFailure::Rejected { key, .. } => key,
        }
    }
}

/// Outcome of a batch import
#[derive(Debug, Default)]
pub struct ImportReport {
    /// Created entries in import order, with their record keys
    pub created: Vec<(String, Entry)>,
    pub warnings: Vec<ImportWarning>,
    pub failures: Vec<ImportFailure>,
}

impl ImportReport {
    /// Everything imported without warnings
    pub fn is_clean(&self) -> bool {
        self.warnings.is_empty() && self.failures.is_empty()
    }

    pub fn id_of(&self, key: &str) -> Option<EntryId> {
        self.created
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, entry)| entry.id)
    }
}

impl Engine {
    /// Import a batch of records into one container
    ///
    /// Fails as a whole only when the container does not exist; every other
    /// problem is reported per record.
    pub fn import_batch(
        &self,
        container: &ContainerId,
        records: impl IntoIterator<Item = ImportRecord>,
    ) -> EngineResult<ImportReport> {
        if !self.has_container(container) {
            return Err(EngineError::ContainerNotFound(container.clone()));
        }

        let mut report = ImportReport::default();
        let mut ids: HashMap<String, EntryId> = HashMap::new();

        for record in records {
            if ids.contains_key(&record.key) {
                report
                    .failures
                    .push(ImportFailure::DuplicateKey { key: record.key });
                continue;
            }

            let parent_id = match record.parent_key {
                Some(ref parent_key) => match ids.get(parent_key) {
                    Some(id) => Some(*id),
                    None => {
                        report.failures.push(ImportFailure::UnknownParent {
                            key: record.key,
                            parent_key: parent_key.clone(),
                        });
                        continue;
                    }
                },
                None => None,
            };

            if let Some(ref resource) = record.external_ref {
                if !self.resolves(resource) {
                    report.warnings.push(ImportWarning::UnresolvedReference {
                        key: record.key.clone(),
                        resource: resource.clone(),
                    });
                }
            }

            let new = NewEntry {
                container_id: container.clone(),
                parent_id,
                index: record.index,
                name: record.name,
                kind: record.kind,
                external_ref: record.external_ref,
            };
            match self.create(new) {
                Ok(entry) => {
                    ids.insert(record.key.clone(), entry.id);
                    report.created.push((record.key, entry));
                }
                Err(error) => {
                    tracing::warn!(key = %record.key, error = %error, "import record rejected");
                    // no entry exists, so its reference warning is moot
                    report.warnings.retain(|w| match w {
                        ImportWarning::UnresolvedReference { key, .. } => key != &record.key,
                    });
                    report
                        .failures
                        .push(ImportFailure::Rejected { key: record.key, error });
                }
            }
        }

        tracing::info!(
            family = self.family().name(),
            container = %container,
            created = report.created.len(),
            warnings = report.warnings.len(),
            failures = report.failures.len(),
            "imported entry batch"
        );
        Ok(report)
    }
}
