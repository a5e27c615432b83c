//! Automation executor: evaluates one automation's trigger condition.
//!
//! Two evaluation modes, chosen by the condition's conditional text:
//!
//! - **implicit AND** (no conditional): enabled triggers run in declaration
//!   order, each seeing the outputs of the ones before it, and the first
//!   trigger that is not met stops the evaluation;
//! - **expression** (conditional present): every enabled trigger runs once,
//!   only met triggers contribute outputs, and the boolean expression over
//!   trigger ids decides the verdict.
//!
//! Disabled triggers are skipped in both modes. Every trigger evaluation and
//! the automation verdict are recorded in the [`ScalarStore`]. A met result
//! only ever carries the keys declared in the automation's task parameters.

use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::Instrument;

use cadence_domain::automation::{Automation, AutomationResult, Parameters, TriggerDefinition};
use cadence_domain::error::{CadenceError, NotFoundError};
use cadence_domain::expression::Expression;
use cadence_domain::id::FullName;
use cadence_domain::time::{self, Clock, SystemClock};

use crate::ports::ScalarStore;
use crate::triggers::TriggerRegistry;
use crate::triggers::scheduled::UTC_NOW;

/// Root of the audit paths when none is configured.
pub const DEFAULT_ROOT_GROUP: &str = "Automations";

/// Audit path of an automation verdict, or of one of its triggers.
///
/// `{root}/{automation}` or `{root}/{automation}/{trigger}`.
#[must_use]
pub fn audit_path(root: &str, automation: &FullName, trigger: Option<&str>) -> String {
    match trigger {
        Some(trigger) => format!("{root}/{automation}/{trigger}"),
        None => format!("{root}/{automation}"),
    }
}

/// Evaluates automations against the current time and their parameters.
///
/// Holds no state between calls; one executor can evaluate many
/// automations concurrently.
pub struct AutomationExecutor<S, C = SystemClock> {
    registry: Arc<TriggerRegistry>,
    scalars: S,
    clock: C,
    root_group: String,
}

impl<S: ScalarStore> AutomationExecutor<S> {
    /// Create an executor on the system clock, auditing under [`DEFAULT_ROOT_GROUP`].
    pub fn new(registry: Arc<TriggerRegistry>, scalars: S) -> Self {
        Self {
            registry,
            scalars,
            clock: SystemClock,
            root_group: DEFAULT_ROOT_GROUP.to_string(),
        }
    }
}

impl<S, C> AutomationExecutor<S, C>
where
    S: ScalarStore,
    C: Clock,
{
    /// Replace the clock that seeds `utcNow` and timestamps audit values.
    pub fn with_clock<C2: Clock>(self, clock: C2) -> AutomationExecutor<S, C2> {
        AutomationExecutor {
            registry: self.registry,
            scalars: self.scalars,
            clock,
            root_group: self.root_group,
        }
    }

    #[must_use]
    pub fn with_root_group(mut self, root_group: impl Into<String>) -> Self {
        self.root_group = root_group.into();
        self
    }

    pub fn root_group(&self) -> &str {
        &self.root_group
    }

    pub fn registry(&self) -> &TriggerRegistry {
        &self.registry
    }

    pub fn scalars(&self) -> &S {
        &self.scalars
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    /// Evaluate `automation`.
    ///
    /// # Errors
    ///
    /// - [`CadenceError::Validation`] when a trigger cannot be built from its definition.
    /// - [`CadenceError::Expression`] when the conditional is malformed or
    ///   names a trigger that was not evaluated.
    /// - [`CadenceError::Evaluation`] when a trigger fails while executing.
    /// - [`CadenceError::NotFound`] when a declared task parameter is missing
    ///   from the accumulated parameters.
    #[tracing::instrument(skip_all, fields(automation = %automation.id()))]
    pub async fn execute(&self, automation: &Automation) -> Result<AutomationResult, CadenceError> {
        if !automation.is_enabled() {
            tracing::debug!("automation disabled, skipping");
            return Ok(AutomationResult::not_met());
        }

        let mut working = self.seed(automation);
        let met = match automation.trigger_condition.conditional() {
            None => self.evaluate_in_order(automation, &mut working).await?,
            Some(conditional) => {
                self.evaluate_expression(automation, conditional, &mut working)
                    .await?
            }
        };
        self.audit(automation.id(), None, met).await;

        if !met {
            tracing::debug!("automation not met");
            return Ok(AutomationResult::not_met());
        }
        let released = trim(&automation.task_parameters, working)?;
        tracing::debug!(parameters = released.len(), "automation met");
        Ok(AutomationResult::met(released))
    }

    /// `{utcNow}` overlaid by the runtime parameters, then by the task parameters.
    fn seed(&self, automation: &Automation) -> Parameters {
        let mut working = Parameters::from([(UTC_NOW.to_string(), time::format(self.clock.now()))]);
        working.extend(automation.parameters.clone());
        working.extend(automation.task_parameters.clone());
        working
    }

    async fn evaluate_in_order(
        &self,
        automation: &Automation,
        working: &mut Parameters,
    ) -> Result<bool, CadenceError> {
        let definitions = &automation.trigger_condition.triggers;
        if definitions.is_empty() {
            return Ok(false);
        }
        for definition in definitions.iter().filter(|d| d.is_enabled()) {
            let Some(result) = self.run_trigger(automation, definition, working).await? else {
                continue;
            };
            if !result.is_met() {
                return Ok(false);
            }
            working.extend(result.into_task_parameters());
        }
        Ok(true)
    }

    async fn evaluate_expression(
        &self,
        automation: &Automation,
        conditional: &str,
        working: &mut Parameters,
    ) -> Result<bool, CadenceError> {
        let expression = Expression::parse(conditional)?;
        let mut evaluated = BTreeMap::new();
        for definition in automation
            .trigger_condition
            .triggers
            .iter()
            .filter(|d| d.is_enabled())
        {
            let Some(result) = self.run_trigger(automation, definition, working).await? else {
                continue;
            };
            let met = result.is_met();
            evaluated.insert(definition.id.clone(), met);
            if met {
                working.extend(result.into_task_parameters());
            }
        }
        Ok(expression.evaluate(&evaluated)?)
    }

    /// Build and execute one trigger, then audit its verdict.
    ///
    /// `None` when the built trigger reports itself disabled.
    async fn run_trigger(
        &self,
        automation: &Automation,
        definition: &TriggerDefinition,
        parameters: &Parameters,
    ) -> Result<Option<AutomationResult>, CadenceError> {
        let trigger = self.registry.build(definition)?;
        if !trigger.is_enabled() {
            return Ok(None);
        }

        let span = tracing::debug_span!(
            "evaluate_trigger",
            automation = %automation.id(),
            trigger = %trigger.id(),
        );
        let result = trigger
            .execute(parameters)
            .instrument(span)
            .await
            .map_err(|source| CadenceError::Evaluation {
                automation: automation.id().to_string(),
                trigger: definition.id.clone(),
                source: Box::new(source),
            })?;
        tracing::debug!(trigger = %definition.id, met = result.is_met(), "trigger evaluated");

        self.audit(automation.id(), Some(&definition.id), result.is_met())
            .await;
        Ok(Some(result))
    }

    async fn audit(&self, automation: &FullName, trigger: Option<&str>, met: bool) {
        let path = audit_path(&self.root_group, automation, trigger);
        if let Err(err) = self.scalars.set(&path, met, self.clock.now()).await {
            tracing::warn!(%path, error = %err, "failed to record audit value");
        }
    }
}

/// Project `working` onto the declared task parameter keys.
fn trim(declared: &Parameters, mut working: Parameters) -> Result<Parameters, NotFoundError> {
    declared
        .keys()
        .map(|key| {
            working
                .remove_entry(key)
                .ok_or_else(|| NotFoundError {
                    entity: "task parameter",
                    id: key.clone(),
                })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::Scalar;
    use crate::scalar_store::InMemoryScalarStore;
    use crate::testing::FixedClock;
    use crate::triggers::schema::TriggerSchema;
    use crate::triggers::{Trigger, TriggerHeader, delegate_header};
    use async_trait::async_trait;
    use cadence_domain::error::{ArgumentError, ExpressionError};
    use cadence_domain::time::Timestamp;
    use chrono::{TimeZone, Utc};
    use serde::Deserialize;
    use std::sync::Mutex;

    type Log = Arc<Mutex<Vec<String>>>;

    #[derive(Debug, Default, Deserialize)]
    #[serde(default)]
    struct StubSettings {
        met: bool,
        output: Parameters,
        copy_from: Option<String>,
        copy_to: Option<String>,
    }

    /// Test trigger: records each execution, answers `met`, emits `output`
    /// and optionally copies one incoming parameter to its output.
    #[derive(Debug)]
    struct Stub {
        header: TriggerHeader,
        settings: StubSettings,
        log: Log,
    }

    #[async_trait]
    impl Trigger for Stub {
        delegate_header!();

        async fn execute(&self, parameters: &Parameters) -> Result<AutomationResult, CadenceError> {
            self.log.lock().unwrap().push(self.header.id.clone());
            let mut output = self.settings.output.clone();
            if let (Some(from), Some(to)) = (&self.settings.copy_from, &self.settings.copy_to) {
                let value = parameters
                    .get(from)
                    .ok_or_else(|| ArgumentError::Missing { name: from.clone() })?;
                output.insert(to.clone(), value.clone());
            }
            Ok(if self.settings.met {
                AutomationResult::met(output)
            } else {
                AutomationResult::not_met()
            })
        }
    }

    fn instant() -> Timestamp {
        Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap()
    }

    fn registry(log: &Log) -> Arc<TriggerRegistry> {
        let mut registry = TriggerRegistry::new();
        let log = Arc::clone(log);
        registry
            .register(
                TriggerSchema::new("stub"),
                move |def: &TriggerDefinition| -> Result<Box<dyn Trigger>, CadenceError> {
                    Ok(Box::new(Stub {
                        header: TriggerHeader::new(def.id.clone(), def.label()),
                        settings: def.decode_settings()?,
                        log: Arc::clone(&log),
                    }))
                },
            )
            .unwrap();
        Arc::new(registry)
    }

    fn executor(
        log: &Log,
    ) -> (
        AutomationExecutor<Arc<InMemoryScalarStore>, FixedClock>,
        Arc<InMemoryScalarStore>,
    ) {
        let scalars = Arc::new(InMemoryScalarStore::new());
        let executor = AutomationExecutor::new(registry(log), Arc::clone(&scalars))
            .with_clock(FixedClock(instant()));
        (executor, scalars)
    }

    fn stub(id: &str, met: bool) -> TriggerDefinition {
        TriggerDefinition::new("stub", id).with_setting("met", met)
    }

    fn disabled(mut definition: TriggerDefinition) -> TriggerDefinition {
        definition.disable();
        definition
    }

    fn automation(triggers: Vec<TriggerDefinition>, conditional: Option<&str>) -> Automation {
        let mut builder = Automation::builder().name("nightly").task_id("import");
        for trigger in triggers {
            builder = builder.trigger(trigger);
        }
        if let Some(conditional) = conditional {
            builder = builder.conditional(conditional);
        }
        builder.build().unwrap()
    }

    fn executed(log: &Log) -> Vec<String> {
        log.lock().unwrap().clone()
    }

    async fn audited(scalars: &InMemoryScalarStore, path: &str) -> Option<bool> {
        scalars
            .get(path)
            .await
            .unwrap()
            .map(|Scalar { value, .. }| value)
    }

    #[tokio::test]
    async fn should_not_evaluate_triggers_of_disabled_automation() {
        let log = Log::default();
        let (executor, scalars) = executor(&log);
        let mut automation = automation(vec![stub("a", true)], None);
        automation.disable();

        let result = executor.execute(&automation).await.unwrap();
        assert!(!result.is_met());
        assert!(executed(&log).is_empty());
        assert!(scalars.snapshot().await.is_empty());
    }

    #[tokio::test]
    async fn should_not_be_met_without_triggers() {
        let log = Log::default();
        let (executor, _) = executor(&log);
        let result = executor.execute(&automation(vec![], None)).await.unwrap();
        assert!(!result.is_met());
    }

    #[tokio::test]
    async fn should_short_circuit_at_first_unmet_trigger() {
        let log = Log::default();
        let (executor, scalars) = executor(&log);
        let automation = automation(
            vec![stub("a", true), stub("b", false), stub("c", true)],
            None,
        );

        let result = executor.execute(&automation).await.unwrap();
        assert!(!result.is_met());
        assert_eq!(executed(&log), vec!["a", "b"]);
        assert_eq!(audited(&scalars, "Automations/nightly/a").await, Some(true));
        assert_eq!(audited(&scalars, "Automations/nightly/b").await, Some(false));
        assert_eq!(audited(&scalars, "Automations/nightly/c").await, None);
        assert_eq!(audited(&scalars, "Automations/nightly").await, Some(false));
    }

    #[tokio::test]
    async fn should_skip_disabled_triggers() {
        let log = Log::default();
        let (executor, scalars) = executor(&log);
        let automation = automation(vec![stub("on", true), disabled(stub("off", false))], None);

        let result = executor.execute(&automation).await.unwrap();
        assert!(result.is_met());
        assert_eq!(executed(&log), vec!["on"]);
        assert_eq!(audited(&scalars, "Automations/nightly/off").await, None);
        assert_eq!(audited(&scalars, "Automations/nightly").await, Some(true));
    }

    #[tokio::test]
    async fn should_be_met_when_every_trigger_is_disabled() {
        let log = Log::default();
        let (executor, _) = executor(&log);
        let automation = automation(vec![disabled(stub("off", false))], None);
        assert!(executor.execute(&automation).await.unwrap().is_met());
        assert!(executed(&log).is_empty());
    }

    #[tokio::test]
    async fn should_evaluate_expression_over_every_trigger() {
        for (t3, expected) in [(false, false), (true, true)] {
            let log = Log::default();
            let (executor, _) = executor(&log);
            let automation = automation(
                vec![stub("t1", true), stub("t2", false), stub("t3", t3)],
                Some("(t1 AND t2) OR t3"),
            );

            let result = executor.execute(&automation).await.unwrap();
            assert_eq!(result.is_met(), expected, "t3 = {t3}");
            assert_eq!(executed(&log), vec!["t1", "t2", "t3"]);
        }
    }

    #[tokio::test]
    async fn should_be_met_by_expression_regardless_of_other_triggers() {
        let log = Log::default();
        let (executor, _) = executor(&log);
        let automation = automation(
            vec![stub("t1", false), stub("t2", false), stub("t3", true)],
            Some("(t1 AND t2) OR t3"),
        );
        assert!(executor.execute(&automation).await.unwrap().is_met());
    }

    #[tokio::test]
    async fn should_fail_on_unknown_identifier_in_expression() {
        let log = Log::default();
        let (executor, _) = executor(&log);
        let automation = automation(vec![stub("t1", true)], Some("t1 AND t2"));

        let err = executor.execute(&automation).await.unwrap_err();
        assert!(matches!(
            err,
            CadenceError::Expression(ExpressionError::UnknownIdentifier(id)) if id == "t2"
        ));
    }

    #[tokio::test]
    async fn should_treat_disabled_trigger_as_unknown_in_expression() {
        let log = Log::default();
        let (executor, _) = executor(&log);
        let automation = automation(
            vec![stub("t1", true), disabled(stub("t2", true))],
            Some("t1 OR t2"),
        );
        let err = executor.execute(&automation).await.unwrap_err();
        assert!(matches!(err, CadenceError::Expression(_)));
    }

    #[tokio::test]
    async fn should_release_only_declared_task_parameters() {
        let log = Log::default();
        let (executor, _) = executor(&log);
        let automation = Automation::builder()
            .name("nightly")
            .task_id("import")
            .task_parameter("region", "eu")
            .task_parameter("batch", "0")
            .parameter("secret", "hidden")
            .trigger(
                stub("a", true)
                    .with_setting("output", serde_json::json!({"batch": "42", "extra": "x"})),
            )
            .build()
            .unwrap();

        let result = executor.execute(&automation).await.unwrap();
        assert!(result.is_met());
        let released = result.task_parameters();
        assert_eq!(
            released.keys().collect::<Vec<_>>(),
            automation.task_parameters.keys().collect::<Vec<_>>()
        );
        assert_eq!(released["batch"], "42");
        assert_eq!(released["region"], "eu");
    }

    #[tokio::test]
    async fn should_chain_outputs_into_later_triggers() {
        let log = Log::default();
        let (executor, _) = executor(&log);
        let automation = Automation::builder()
            .name("chain")
            .task_id("import")
            .task_parameter("copied", "")
            .trigger(stub("first", true).with_setting("output", serde_json::json!({"x": "1"})))
            .trigger(
                stub("second", true)
                    .with_setting("copy_from", "x")
                    .with_setting("copy_to", "copied"),
            )
            .build()
            .unwrap();

        let result = executor.execute(&automation).await.unwrap();
        assert_eq!(result.task_parameters()["copied"], "1");
    }

    #[tokio::test]
    async fn should_not_merge_outputs_of_unmet_triggers_in_expression_mode() {
        let log = Log::default();
        let (executor, _) = executor(&log);
        let automation = Automation::builder()
            .name("expr")
            .task_id("import")
            .task_parameter("value", "default")
            .trigger(stub("yes", true).with_setting("output", serde_json::json!({"value": "met"})))
            .trigger(stub("no", false).with_setting("output", serde_json::json!({"value": "unmet"})))
            .conditional("yes OR no")
            .build()
            .unwrap();

        let result = executor.execute(&automation).await.unwrap();
        assert_eq!(result.task_parameters()["value"], "met");
    }

    #[tokio::test]
    async fn should_seed_utc_now_and_let_task_parameters_win() {
        let log = Log::default();
        let (executor, _) = executor(&log);
        let automation = Automation::builder()
            .name("seeded")
            .task_id("import")
            .parameter("mode", "runtime")
            .task_parameter("mode", "declared")
            .task_parameter("stamp", "")
            .trigger(
                stub("now", true)
                    .with_setting("copy_from", UTC_NOW)
                    .with_setting("copy_to", "stamp"),
            )
            .build()
            .unwrap();

        let result = executor.execute(&automation).await.unwrap();
        assert_eq!(result.task_parameters()["mode"], "declared");
        assert_eq!(result.task_parameters()["stamp"], time::format(instant()));
    }

    #[tokio::test]
    async fn should_wrap_trigger_failure_with_automation_and_trigger() {
        let log = Log::default();
        let (executor, _) = executor(&log);
        let automation = automation(
            vec![
                stub("broken", true)
                    .with_setting("copy_from", "absent")
                    .with_setting("copy_to", "x"),
            ],
            None,
        );

        let err = executor.execute(&automation).await.unwrap_err();
        let CadenceError::Evaluation {
            automation,
            trigger,
            ..
        } = &err
        else {
            panic!("expected evaluation error, got {err:?}");
        };
        assert_eq!(automation, "nightly");
        assert_eq!(trigger, "broken");
        assert!(matches!(
            err.root(),
            CadenceError::Argument(ArgumentError::Missing { name }) if name == "absent"
        ));
    }

    #[tokio::test]
    async fn should_propagate_unknown_trigger_kind() {
        let log = Log::default();
        let (executor, _) = executor(&log);
        let automation = automation(vec![TriggerDefinition::new("ghost", "g")], None);
        let err = executor.execute(&automation).await.unwrap_err();
        assert!(matches!(err, CadenceError::Validation(_)));
    }

    #[tokio::test]
    async fn should_audit_under_configured_root_and_group() {
        let log = Log::default();
        let (executor, scalars) = executor(&log);
        let executor = executor.with_root_group("Monitoring");
        let automation = Automation::builder()
            .name("hourly")
            .group("ops/etl")
            .task_id("import")
            .trigger(stub("tick", true))
            .build()
            .unwrap();

        executor.execute(&automation).await.unwrap();
        let snapshot = scalars.snapshot().await;
        let paths: Vec<&str> = snapshot.keys().map(String::as_str).collect();
        assert_eq!(
            paths,
            vec!["Monitoring/ops/etl/hourly", "Monitoring/ops/etl/hourly/tick"]
        );
        assert!(snapshot.values().all(|s| s.timestamp == instant()));
    }

    #[test]
    fn should_build_audit_paths() {
        let id = FullName::parse("g/a").unwrap();
        assert_eq!(audit_path("Automations", &id, None), "Automations/g/a");
        assert_eq!(audit_path("Automations", &id, Some("t")), "Automations/g/a/t");
    }
}
