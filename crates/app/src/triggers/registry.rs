//! Trigger registry: the catalog of trigger kinds.
//!
//! Each kind is registered explicitly with a [`TriggerSchema`] (what
//! authoring tools show) and a factory (how a stored definition becomes an
//! executable [`Trigger`]). Querying schemas never builds or runs a trigger.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use cadence_domain::automation::{TriggerCondition, TriggerDefinition};
use cadence_domain::error::{CadenceError, ValidationError};
use cadence_domain::expression::Expression;

use super::schema::TriggerSchema;
use super::{JobCompletedTrigger, ScheduledTrigger, SqlTrigger, Trigger};
use crate::ports::{JobRepositoryProviders, SqlConnector};

/// Builds an executable trigger from its stored definition.
pub type TriggerFactory =
    Arc<dyn Fn(&TriggerDefinition) -> Result<Box<dyn Trigger>, CadenceError> + Send + Sync>;

type BuildResult = Result<Box<dyn Trigger>, CadenceError>;

/// Collaborators the built-in trigger kinds need.
#[derive(Clone, Default)]
pub struct TriggerServices {
    pub job_repositories: JobRepositoryProviders,
    /// The `sql` kind is only registered when a connector is available.
    pub sql_connector: Option<Arc<dyn SqlConnector>>,
}

struct Registration {
    schema: TriggerSchema,
    factory: TriggerFactory,
}

/// Table of trigger kinds: kind id → schema + factory.
#[derive(Default)]
pub struct TriggerRegistry {
    kinds: BTreeMap<String, Registration>,
}

impl TriggerRegistry {
    /// An empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry holding the built-in kinds: `scheduled`, `job_completed`
    /// and, when `services` carries a SQL connector, `sql`.
    #[must_use]
    pub fn builtin(services: TriggerServices) -> Self {
        let mut kinds = BTreeMap::new();
        let mut add = |schema: TriggerSchema, factory: TriggerFactory| {
            kinds.insert(schema.id.clone(), Registration { schema, factory });
        };

        add(
            ScheduledTrigger::schema(),
            Arc::new(|definition: &TriggerDefinition| -> BuildResult {
                Ok(Box::new(ScheduledTrigger::from_definition(definition)?) as Box<dyn Trigger>)
            }),
        );

        let providers = services.job_repositories;
        add(
            JobCompletedTrigger::schema(),
            Arc::new(move |definition: &TriggerDefinition| -> BuildResult {
                Ok(
                    Box::new(JobCompletedTrigger::from_definition(definition, &providers)?)
                        as Box<dyn Trigger>,
                )
            }),
        );

        if let Some(connector) = services.sql_connector {
            add(
                SqlTrigger::schema(),
                Arc::new(move |definition: &TriggerDefinition| -> BuildResult {
                    Ok(
                        Box::new(SqlTrigger::from_definition(definition, connector.as_ref())?)
                            as Box<dyn Trigger>,
                    )
                }),
            );
        }

        Self { kinds }
    }

    /// Register a plugin kind. The kind id is taken from `schema.id`.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::DuplicateTriggerKind`] when the kind is
    /// already registered.
    pub fn register<F>(&mut self, schema: TriggerSchema, factory: F) -> Result<(), ValidationError>
    where
        F: Fn(&TriggerDefinition) -> Result<Box<dyn Trigger>, CadenceError>
            + Send
            + Sync
            + 'static,
    {
        if self.kinds.contains_key(&schema.id) {
            return Err(ValidationError::DuplicateTriggerKind(schema.id));
        }
        tracing::debug!(kind = %schema.id, "registered trigger kind");
        self.kinds.insert(
            schema.id.clone(),
            Registration {
                schema,
                factory: Arc::new(factory),
            },
        );
        Ok(())
    }

    /// Schema of `kind`, `None` when unknown.
    #[must_use]
    pub fn get(&self, kind: &str) -> Option<&TriggerSchema> {
        self.kinds.get(kind).map(|r| &r.schema)
    }

    #[must_use]
    pub fn contains(&self, kind: &str) -> bool {
        self.kinds.contains_key(kind)
    }

    #[must_use]
    pub fn count(&self) -> usize {
        self.kinds.len()
    }

    /// Every schema, ordered by kind.
    #[must_use]
    pub fn get_all(&self) -> Vec<&TriggerSchema> {
        self.kinds.values().map(|r| &r.schema).collect()
    }

    /// Every kind id, ordered.
    #[must_use]
    pub fn get_ids(&self) -> Vec<&str> {
        self.kinds.keys().map(String::as_str).collect()
    }

    /// Build an executable trigger, honouring the definition's enabled flag.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::UnknownTriggerKind`] for unregistered kinds,
    /// or whatever the kind's factory rejects.
    pub fn build(&self, definition: &TriggerDefinition) -> Result<Box<dyn Trigger>, CadenceError> {
        let registration = self
            .kinds
            .get(&definition.kind)
            .ok_or_else(|| ValidationError::UnknownTriggerKind(definition.kind.clone()))?;
        let mut trigger = (registration.factory)(definition)?;
        if !definition.is_enabled() {
            trigger.disable();
        }
        Ok(trigger)
    }

    /// Build every trigger of `condition` and parse its conditional.
    ///
    /// Used when definitions are stored, so configuration errors surface
    /// before any evaluation.
    ///
    /// # Errors
    ///
    /// Returns the first build or syntax error.
    pub fn validate(&self, condition: &TriggerCondition) -> Result<(), CadenceError> {
        for definition in &condition.triggers {
            self.build(definition)?;
        }
        if let Some(conditional) = condition.conditional() {
            Expression::parse(conditional)?;
        }
        Ok(())
    }
}

impl fmt::Debug for TriggerRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.kinds.keys()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::SqlConnection;
    use crate::triggers::schema::{PropertySchema, PropertyType};
    use async_trait::async_trait;
    use cadence_domain::automation::{AutomationResult, Parameters};

    #[derive(Debug)]
    struct AlwaysTrigger {
        id: String,
        enabled: bool,
    }

    #[async_trait]
    impl Trigger for AlwaysTrigger {
        fn id(&self) -> &str {
            &self.id
        }
        fn description(&self) -> &str {
            "always"
        }
        fn is_enabled(&self) -> bool {
            self.enabled
        }
        fn enable(&mut self) {
            self.enabled = true;
        }
        fn disable(&mut self) {
            self.enabled = false;
        }
        async fn execute(&self, _: &Parameters) -> Result<AutomationResult, CadenceError> {
            Ok(AutomationResult::met(Parameters::new()))
        }
    }

    fn always_schema() -> TriggerSchema {
        TriggerSchema::new("always").property(
            "note",
            PropertySchema::new(PropertyType::String, "Note"),
        )
    }

    fn always_factory(def: &TriggerDefinition) -> Result<Box<dyn Trigger>, CadenceError> {
        Ok(Box::new(AlwaysTrigger {
            id: def.id.clone(),
            enabled: true,
        }))
    }

    struct NoopConnector;

    struct NoopConnection;

    #[async_trait]
    impl SqlConnection for NoopConnection {
        async fn query(
            &self,
            _: &str,
            _: &Parameters,
        ) -> Result<Vec<crate::ports::SqlRow>, CadenceError> {
            Ok(Vec::new())
        }
    }

    impl SqlConnector for NoopConnector {
        fn connect(&self, _: &str) -> Result<Arc<dyn SqlConnection>, CadenceError> {
            Ok(Arc::new(NoopConnection))
        }
    }

    #[test]
    fn should_expose_builtin_kinds() {
        let registry = TriggerRegistry::builtin(TriggerServices::default());
        assert_eq!(registry.get_ids(), vec!["job_completed", "scheduled"]);
        assert_eq!(registry.count(), 2);

        let registry = TriggerRegistry::builtin(TriggerServices {
            sql_connector: Some(Arc::new(NoopConnector)),
            ..TriggerServices::default()
        });
        assert_eq!(registry.get_ids(), vec!["job_completed", "scheduled", "sql"]);
        assert_eq!(registry.get_all().len(), 3);
    }

    #[test]
    fn should_return_schema_by_kind() {
        let registry = TriggerRegistry::builtin(TriggerServices::default());
        let schema = registry.get("scheduled").unwrap();
        assert!(schema.is_required("interval_secs"));
        assert!(schema.is_required("start_time_utc"));
        assert!(registry.contains("scheduled"));
    }

    #[test]
    fn should_return_none_for_unknown_kind() {
        let registry = TriggerRegistry::builtin(TriggerServices::default());
        assert!(registry.get("teleport").is_none());
        assert!(!registry.contains("teleport"));
    }

    #[test]
    fn should_register_plugin_kind() {
        let mut registry = TriggerRegistry::new();
        registry.register(always_schema(), always_factory).unwrap();
        assert!(registry.contains("always"));
        assert_eq!(registry.get("always").unwrap().properties["note"].title, "Note");

        let result = registry.register(always_schema(), always_factory);
        assert!(matches!(
            result,
            Err(ValidationError::DuplicateTriggerKind(kind)) if kind == "always"
        ));
    }

    #[test]
    fn should_build_disabled_trigger_from_disabled_definition() {
        let mut registry = TriggerRegistry::new();
        registry.register(always_schema(), always_factory).unwrap();
        let mut def = TriggerDefinition::new("always", "a");
        def.disable();
        let trigger = registry.build(&def).unwrap();
        assert_eq!(trigger.id(), "a");
        assert!(!trigger.is_enabled());
    }

    #[test]
    fn should_fail_to_build_unknown_kind() {
        let registry = TriggerRegistry::new();
        let result = registry.build(&TriggerDefinition::new("ghost", "g"));
        assert!(matches!(
            result,
            Err(CadenceError::Validation(ValidationError::UnknownTriggerKind(kind))) if kind == "ghost"
        ));
    }

    #[test]
    fn should_validate_condition_up_front() {
        let registry = TriggerRegistry::builtin(TriggerServices::default());
        let good = TriggerDefinition::new("scheduled", "s")
            .with_setting("start_time_utc", "2024-01-01T00:00:00Z")
            .with_setting("interval_secs", 60);
        let bad = TriggerDefinition::new("scheduled", "fast")
            .with_setting("start_time_utc", "2024-01-01T00:00:00Z")
            .with_setting("interval_secs", 5);

        let ok = TriggerCondition {
            triggers: vec![good.clone()],
            conditional: Some("s".to_string()),
        };
        assert!(registry.validate(&ok).is_ok());

        let short = TriggerCondition {
            triggers: vec![good.clone(), bad],
            conditional: None,
        };
        assert!(matches!(
            registry.validate(&short),
            Err(CadenceError::Validation(ValidationError::IntervalTooShort { .. }))
        ));

        let broken = TriggerCondition {
            triggers: vec![good],
            conditional: Some("s AND (".to_string()),
        };
        assert!(matches!(
            registry.validate(&broken),
            Err(CadenceError::Expression(_))
        ));
    }
}
