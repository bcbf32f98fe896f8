use super::store::ProcessManagerStore;
use crate::error::Result;
use crate::models::{OrchestrationDescription, OrchestrationInstance, RowVersion};
use std::sync::Arc;
use tracing::debug;

/// A single staged write.
#[derive(Debug, Clone, PartialEq)]
pub enum StagedChange {
    InsertDescription(OrchestrationDescription),
    UpdateDescription {
        description: OrchestrationDescription,
        expected_version: RowVersion,
    },
    InsertInstance(OrchestrationInstance),
    UpdateInstance {
        instance: OrchestrationInstance,
        expected_version: RowVersion,
    },
}

/// Ordered set of staged writes handed to a store in one commit.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChangeSet {
    changes: Vec<StagedChange>,
}

impl ChangeSet {
    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    pub fn len(&self) -> usize {
        self.changes.len()
    }

    pub fn changes(&self) -> &[StagedChange] {
        &self.changes
    }

    pub fn into_changes(self) -> Vec<StagedChange> {
        self.changes
    }

    fn stage_description(&mut self, description: &OrchestrationDescription) -> bool {
        for change in &mut self.changes {
            match change {
                StagedChange::InsertDescription(staged)
                | StagedChange::UpdateDescription {
                    description: staged,
                    ..
                } if staged.id() == description.id() => {
                    *staged = description.clone();
                    return true;
                }
                _ => {}
            }
        }
        false
    }

    fn stage_instance(&mut self, instance: &OrchestrationInstance) -> bool {
        for change in &mut self.changes {
            match change {
                StagedChange::InsertInstance(staged)
                | StagedChange::UpdateInstance {
                    instance: staged, ..
                } if staged.id() == instance.id() => {
                    *staged = instance.clone();
                    return true;
                }
                _ => {}
            }
        }
        false
    }
}

/// Explicit transaction boundary around staged writes.
///
/// Nothing reaches the store until [`commit`](Self::commit). Staging the same
/// aggregate twice replaces the earlier snapshot, so one commit writes each
/// row at most once.
///
/// Staging an update advances the aggregate's row version to the version the
/// store will hold after the commit. If the commit fails the staged changes
/// are discarded and the caller's copy must be re-read before retrying.
#[derive(Debug)]
pub struct UnitOfWork {
    store: Arc<dyn ProcessManagerStore>,
    changes: ChangeSet,
}

impl UnitOfWork {
    pub fn new(store: Arc<dyn ProcessManagerStore>) -> Self {
        Self {
            store,
            changes: ChangeSet::default(),
        }
    }

    pub fn add_description(&mut self, description: &OrchestrationDescription) {
        if !self.changes.stage_description(description) {
            self.changes
                .changes
                .push(StagedChange::InsertDescription(description.clone()));
        }
    }

    pub fn update_description(&mut self, description: &mut OrchestrationDescription) {
        if self.changes.stage_description(description) {
            return;
        }
        let expected_version = description.row_version();
        description.set_row_version(expected_version.next());
        self.changes.changes.push(StagedChange::UpdateDescription {
            description: description.clone(),
            expected_version,
        });
    }

    pub fn add_instance(&mut self, instance: &OrchestrationInstance) {
        if !self.changes.stage_instance(instance) {
            self.changes
                .changes
                .push(StagedChange::InsertInstance(instance.clone()));
        }
    }

    pub fn update_instance(&mut self, instance: &mut OrchestrationInstance) {
        if self.changes.stage_instance(instance) {
            return;
        }
        let expected_version = instance.row_version();
        instance.set_row_version(expected_version.next());
        self.changes.changes.push(StagedChange::UpdateInstance {
            instance: instance.clone(),
            expected_version,
        });
    }

    pub fn has_changes(&self) -> bool {
        !self.changes.is_empty()
    }

    /// Apply all staged changes atomically. An empty unit of work is a no-op.
    pub async fn commit(&mut self) -> Result<()> {
        if self.changes.is_empty() {
            return Ok(());
        }

        let changes = std::mem::take(&mut self.changes);
        debug!(change_count = changes.len(), "Committing unit of work");
        self.store.commit(changes).await
    }
}
