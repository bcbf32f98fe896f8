//! # Orchestration Register
//!
//! Keeps the persisted orchestration descriptions in sync with what a deployed
//! host declares at startup.
//!
//! ## Registration rules
//!
//! - A new unique name is inserted, owned by the registering host and enabled.
//! - A known unique name is re-enabled and moved to the registering host. Its
//!   cron expression and under-development flag are always refreshed.
//! - Breaking changes to a known unique name are rejected, unless the register
//!   is configured to allow them; then they are applied and logged as a warning.
//! - Deregistration disables a description; rows are never deleted.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use process_manager::config::RegisterConfig;
//! use process_manager::database::InMemoryStore;
//! use process_manager::models::{OrchestrationDescription, OrchestrationDescriptionUniqueName};
//! use process_manager::registry::OrchestrationRegister;
//! use std::sync::Arc;
//!
//! # async fn example() -> process_manager::error::Result<()> {
//! let register = OrchestrationRegister::new(Arc::new(InMemoryStore::new()), RegisterConfig::default());
//!
//! let mut description = OrchestrationDescription::new(
//!     OrchestrationDescriptionUniqueName::new("BRS_021_ForwardMeteredData", 1)?,
//!     false,
//!     "Orchestration_Brs_021_ForwardMeteredData_V1",
//! );
//! description.append_step_description("Validate metered data", false, "")?;
//!
//! register.register_or_update(&description, "host-a").await?;
//! # Ok(())
//! # }
//! ```

use super::breaking_changes::{
    any_refreshable_property_has_changed, get_properties_with_breaking_changes,
};
use crate::config::RegisterConfig;
use crate::database::{ProcessManagerStore, UnitOfWork};
use crate::error::{ProcessManagerError, Result};
use crate::logging::log_register_operation;
use crate::models::{
    OrchestrationDescription, OrchestrationDescriptionId, OrchestrationDescriptionUniqueName,
};
use crate::validation::require_non_empty;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, instrument, warn};

/// Outcome of [`OrchestrationRegister::synchronize`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SynchronizationSummary {
    pub registered_or_updated: Vec<OrchestrationDescriptionUniqueName>,
    pub deregistered: Vec<OrchestrationDescriptionUniqueName>,
    pub unchanged: usize,
}

#[derive(Debug, Clone)]
pub struct OrchestrationRegister {
    store: Arc<dyn ProcessManagerStore>,
    config: RegisterConfig,
}

impl OrchestrationRegister {
    pub fn new(store: Arc<dyn ProcessManagerStore>, config: RegisterConfig) -> Self {
        Self { store, config }
    }

    /// `is_enabled = None` returns the description whether or not it is enabled.
    pub async fn get_or_default(
        &self,
        unique_name: &OrchestrationDescriptionUniqueName,
        is_enabled: Option<bool>,
    ) -> Result<Option<OrchestrationDescription>> {
        self.store
            .get_description_by_unique_name(unique_name, is_enabled)
            .await
    }

    pub async fn get_all_by_host_name(
        &self,
        host_name: &str,
    ) -> Result<Vec<OrchestrationDescription>> {
        self.store.get_descriptions_by_host_name(host_name).await
    }

    /// Whether [`register_or_update`](Self::register_or_update) would write anything.
    pub fn should_register_or_update(
        existing: Option<&OrchestrationDescription>,
        new: &OrchestrationDescription,
    ) -> bool {
        match existing {
            None => true,
            Some(existing) if !existing.is_enabled() => true,
            Some(existing) => any_refreshable_property_has_changed(existing, new),
        }
    }

    #[instrument(skip(self, new_description), fields(unique_name = %new_description.unique_name()))]
    pub async fn register_or_update(
        &self,
        new_description: &OrchestrationDescription,
        host_name: &str,
    ) -> Result<OrchestrationDescriptionId> {
        require_non_empty("HostName", host_name)?;

        let existing = self
            .store
            .get_description_by_unique_name(new_description.unique_name(), None)
            .await?;

        let mut unit_of_work = UnitOfWork::new(self.store.clone());
        let id = match existing {
            None => {
                let mut description = new_description.clone();
                description.set_host_name(host_name)?;
                description.set_is_enabled(true);
                unit_of_work.add_description(&description);
                description.id()
            }
            Some(mut existing) => {
                existing.set_is_enabled(true);
                existing.set_host_name(host_name)?;
                self.update_refreshable_properties(&mut existing, new_description)?;
                unit_of_work.update_description(&mut existing);
                existing.id()
            }
        };
        unit_of_work.commit().await?;

        log_register_operation(
            "register_or_update",
            &new_description.unique_name().to_string(),
            Some(host_name),
            "registered",
            None,
        );
        Ok(id)
    }

    /// Apply `new` onto `existing`. Breaking changes are applied only when the
    /// policy allows them. The cron expression and the `is_under_development`
    /// flag are always refreshed; the flag marks work in progress and is not
    /// part of how recorded history is read.
    fn update_refreshable_properties(
        &self,
        existing: &mut OrchestrationDescription,
        new: &OrchestrationDescription,
    ) -> Result<()> {
        let changed = get_properties_with_breaking_changes(existing, new);
        if !changed.is_empty() {
            let properties: Vec<String> = changed.iter().map(ToString::to_string).collect();
            if !self.config.allow_orchestration_description_breaking_changes {
                return Err(ProcessManagerError::BreakingChanges {
                    unique_name: existing.unique_name().to_string(),
                    properties,
                });
            }

            warn!(
                unique_name = %existing.unique_name(),
                properties = %properties.join(", "),
                "Applying breaking changes to orchestration description"
            );
            existing.set_can_be_scheduled(new.can_be_scheduled());
            existing.set_function_name(new.function_name());
            existing.set_parameter_definition(new.parameter_definition().clone());
            existing.overwrite_steps(new.steps().to_vec())?;
        }

        existing.set_recurring_cron_expression(new.recurring_cron_expression())?;
        existing.set_is_under_development(new.is_under_development());
        Ok(())
    }

    /// Disable a registered description. Fails if no enabled description exists.
    #[instrument(skip(self, description), fields(unique_name = %description.unique_name()))]
    pub async fn deregister(&self, description: &OrchestrationDescription) -> Result<()> {
        let mut existing = self
            .store
            .get_description_by_unique_name(description.unique_name(), Some(true))
            .await?
            .ok_or_else(|| {
                ProcessManagerError::InvalidOperation(format!(
                    "Orchestration description {} is not registered or is already disabled",
                    description.unique_name()
                ))
            })?;

        existing.set_is_enabled(false);
        let mut unit_of_work = UnitOfWork::new(self.store.clone());
        unit_of_work.update_description(&mut existing);
        unit_of_work.commit().await?;

        log_register_operation(
            "deregister",
            &description.unique_name().to_string(),
            Some(existing.host_name()),
            "disabled",
            None,
        );
        Ok(())
    }

    /// Align the register with everything `host_name` declares.
    ///
    /// Enabled descriptions owned by the host but no longer declared are
    /// deregistered; declared descriptions are registered or updated when
    /// [`should_register_or_update`](Self::should_register_or_update) says so.
    #[instrument(skip(self, declared), fields(declared = declared.len()))]
    pub async fn synchronize(
        &self,
        host_name: &str,
        declared: &[OrchestrationDescription],
    ) -> Result<SynchronizationSummary> {
        require_non_empty("HostName", host_name)?;
        let mut summary = SynchronizationSummary::default();

        let declared_names: HashSet<&OrchestrationDescriptionUniqueName> =
            declared.iter().map(OrchestrationDescription::unique_name).collect();

        for registered in self.get_all_by_host_name(host_name).await? {
            if registered.is_enabled() && !declared_names.contains(registered.unique_name()) {
                self.deregister(&registered).await?;
                summary.deregistered.push(registered.unique_name().clone());
            }
        }

        for description in declared {
            let existing = self.get_or_default(description.unique_name(), None).await?;
            if Self::should_register_or_update(existing.as_ref(), description) {
                self.register_or_update(description, host_name).await?;
                summary
                    .registered_or_updated
                    .push(description.unique_name().clone());
            } else {
                debug!(unique_name = %description.unique_name(), "Orchestration description unchanged");
                summary.unchanged += 1;
            }
        }

        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::InMemoryStore;

    fn description(function_name: &str) -> OrchestrationDescription {
        let mut description = OrchestrationDescription::new(
            OrchestrationDescriptionUniqueName::new("BRS_026", 1).unwrap(),
            false,
            function_name,
        );
        description.append_step_description("Validate", false, "").unwrap();
        description
    }

    fn register(allow_breaking_changes: bool) -> OrchestrationRegister {
        OrchestrationRegister::new(
            Arc::new(InMemoryStore::new()),
            RegisterConfig {
                allow_orchestration_description_breaking_changes: allow_breaking_changes,
            },
        )
    }

    #[test]
    fn test_should_register_or_update() {
        let new = description("V1");
        assert!(OrchestrationRegister::should_register_or_update(None, &new));

        let mut disabled = description("V1");
        disabled.set_is_enabled(false);
        assert!(OrchestrationRegister::should_register_or_update(Some(&disabled), &new));

        assert!(!OrchestrationRegister::should_register_or_update(Some(&description("V1")), &new));
        assert!(OrchestrationRegister::should_register_or_update(Some(&description("V0")), &new));
    }

    #[tokio::test]
    async fn test_insert_forces_host_and_enabled() {
        let register = register(false);
        let mut new = description("V1");
        new.set_is_enabled(false);

        register.register_or_update(&new, "host-a").await.unwrap();

        let stored = register
            .get_or_default(new.unique_name(), Some(true))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.host_name(), "host-a");
        assert!(stored.is_enabled());
    }

    #[tokio::test]
    async fn test_empty_host_name_is_rejected() {
        let register = register(false);
        let err = register
            .register_or_update(&description("V1"), "")
            .await
            .unwrap_err();
        assert!(matches!(err, ProcessManagerError::ValidationError(_)));
    }

    #[tokio::test]
    async fn test_deregister_twice_fails() {
        let register = register(false);
        let description = description("V1");
        register.register_or_update(&description, "host-a").await.unwrap();

        register.deregister(&description).await.unwrap();
        let err = register.deregister(&description).await.unwrap_err();

        assert!(err.is_invalid_operation());
    }
}
