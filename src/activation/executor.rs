use std::collections::{HashMap, HashSet, VecDeque};
use std::time::Instant;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::activation::graph::{topological_order, GraphError};
use crate::activation::outputs::OutputRegistry;
use crate::activation::report::{ActivationReport, UnitReport, UnitState};
use crate::binder::{bind, BoundConfig};
use crate::errors::{ActivationFailure, EngineError};
use crate::properties::PropertySourceStack;
use crate::units::{ConfigRequest, ConfigurationUnit, FactoryContext, OutputKey};

/// Result of a successful activation run: the frozen output registry and the
/// per-unit report, handed together to the application assembler.
#[derive(Debug)]
pub struct Activation {
    pub outputs: OutputRegistry,
    pub report: ActivationReport,
}

/// Orders configuration units by their import edges and executes their
/// factories exactly once, registering produced outputs.
///
/// Import edges are hard ordering constraints; conditions inspecting
/// registry state form soft edges resolved by bounded deferral: a unit whose
/// verdict or inputs could still change while a producer is pending moves to
/// the back of the queue, at most unit-count times.
#[derive(Debug)]
pub struct Activator {
    units: Vec<ConfigurationUnit>,
}

impl Activator {
    pub fn new(units: Vec<ConfigurationUnit>) -> Self {
        Self { units }
    }

    pub fn unit_count(&self) -> usize {
        self.units.len()
    }

    /// Run activation to completion. Any error is fatal to the whole run and
    /// carries the report of every unit's state at the point of failure.
    pub fn activate(self, properties: &PropertySourceStack) -> Result<Activation, ActivationFailure> {
        let run_id = Uuid::new_v4();
        let started_at = Utc::now();
        let start = Instant::now();
        let units = self.units;
        let count = units.len();

        tracing::info!(run_id = %run_id, units = count, "Starting activation run");

        let mut states = vec![UnitState::Discovered; count];
        let mut reasons: Vec<Option<String>> = vec![None; count];
        let mut finalized: Vec<usize> = Vec::with_capacity(count);

        let name_to_index: HashMap<String, usize> = units
            .iter()
            .enumerate()
            .map(|(i, u)| (u.name().to_string(), i))
            .collect();

        let order = match topological_order(&units) {
            Ok(order) => order,
            Err(e) => {
                return Err(failure(
                    EngineError::Graph(e),
                    &units,
                    run_id,
                    started_at,
                    start,
                    &states,
                    &reasons,
                    &finalized,
                ))
            }
        };

        let mut queue: VecDeque<usize> = order.into_iter().collect();
        let mut deferrals = vec![0usize; count];
        let mut waiting: Vec<Option<String>> = vec![None; count];
        let retry_bound = count;

        let mut outputs = OutputRegistry::new();
        let mut activated_names: HashSet<String> = HashSet::new();

        while let Some(index) = queue.pop_front() {
            let unit = &units[index];

            let mut defer =
                ordering_defer_reason(index, unit, &units, &name_to_index, &states, &outputs);

            if defer.is_none() {
                // Conditions: a false verdict is a skip, never an error.
                if let Some(condition) = unit
                    .conditions()
                    .iter()
                    .find(|c| !c.evaluate(properties, &outputs, &activated_names))
                {
                    let reason = format!("condition not met: {}", condition);
                    tracing::info!(unit = unit.name(), %reason, "Skipped unit");
                    states[index] = UnitState::Skipped;
                    reasons[index] = Some(reason);
                    finalized.push(index);
                    continue;
                }

                states[index] = UnitState::Eligible;
                defer = missing_input_reason(unit, &outputs);
            }

            if let Some(reason) = defer {
                states[index] = UnitState::Discovered;
                deferrals[index] += 1;
                if deferrals[index] > retry_bound {
                    let chain = unresolved_chain(index, &reason, &queue, &units, &waiting);
                    return Err(failure(
                        EngineError::Graph(GraphError::UnresolvedChain {
                            retries: retry_bound,
                            waiting: chain,
                        }),
                        &units,
                        run_id,
                        started_at,
                        start,
                        &states,
                        &reasons,
                        &finalized,
                    ));
                }
                tracing::debug!(unit = unit.name(), waiting_for = %reason, "Deferred unit");
                waiting[index] = Some(reason);
                queue.push_back(index);
                continue;
            }

            let unit_config = match bind_request(unit.properties(), properties) {
                Ok(config) => config,
                Err(e) => {
                    states[index] = UnitState::Failed;
                    reasons[index] = Some(e.to_string());
                    finalized.push(index);
                    return Err(failure(
                        e,
                        &units,
                        run_id,
                        started_at,
                        start,
                        &states,
                        &reasons,
                        &finalized,
                    ));
                }
            };

            states[index] = UnitState::Activating;
            tracing::debug!(unit = unit.name(), factories = unit.factories().len(), "Activating unit");

            let mut unit_error: Option<EngineError> = None;
            for factory in unit.factories() {
                let factory_config = match bind_request(factory.config_request(), properties) {
                    Ok(config) => config,
                    Err(e) => {
                        unit_error = Some(e);
                        break;
                    }
                };

                let produced = {
                    let ctx = FactoryContext::new(
                        factory.name(),
                        &outputs,
                        unit_config.as_ref(),
                        factory_config.as_ref(),
                    );
                    factory.produce(&ctx)
                };

                match produced {
                    Ok(value) => {
                        if let Err(e) =
                            outputs.register(factory.output().clone(), value, factory.name())
                        {
                            unit_error = Some(EngineError::DuplicateOutput(e));
                            break;
                        }
                        tracing::debug!(
                            unit = unit.name(),
                            factory = factory.name(),
                            output = %factory.output().describe(),
                            "Registered output"
                        );
                    }
                    Err(e) => {
                        unit_error = Some(EngineError::Factory(e));
                        break;
                    }
                }
            }

            if let Some(e) = unit_error {
                tracing::error!(unit = unit.name(), error = %e, "Unit failed");
                states[index] = UnitState::Failed;
                reasons[index] = Some(e.to_string());
                finalized.push(index);
                return Err(failure(
                    e,
                    &units,
                    run_id,
                    started_at,
                    start,
                    &states,
                    &reasons,
                    &finalized,
                ));
            }

            states[index] = UnitState::Activated;
            activated_names.insert(unit.name().to_string());
            finalized.push(index);
            tracing::info!(unit = unit.name(), "Activated unit");
        }

        let report = build_report(&units, run_id, started_at, start.elapsed(), &states, &reasons, &finalized);
        tracing::info!(
            run_id = %run_id,
            activated = report.activated().len(),
            skipped = report.skipped().len(),
            duration = ?report.duration,
            "Activation run complete"
        );

        Ok(Activation { outputs, report })
    }
}

/// Why a unit cannot be ordered yet: an import not yet final, a pending
/// producer of an output one of its conditions inspects, or a pending unit
/// one of its conditions names. Checked before condition evaluation so a
/// verdict is never finalized while a pending producer could still flip it.
fn ordering_defer_reason(
    index: usize,
    unit: &ConfigurationUnit,
    units: &[ConfigurationUnit],
    name_to_index: &HashMap<String, usize>,
    states: &[UnitState],
    outputs: &OutputRegistry,
) -> Option<String> {
    for import in unit.imports() {
        if let Some(&import_index) = name_to_index.get(import.as_str()) {
            if !states[import_index].is_final() {
                return Some(format!("import '{}'", import));
            }
        }
    }

    for condition in unit.conditions() {
        for selector in condition.inspected_outputs() {
            if !outputs.contains(selector) {
                if let Some(producer) = pending_producer(selector, index, units, states) {
                    return Some(format!(
                        "unit '{}' (pending producer of inspected output {})",
                        producer,
                        selector.describe()
                    ));
                }
            }
        }
        for inspected in condition.inspected_units() {
            if let Some(&other) = name_to_index.get(inspected) {
                if other != index && !states[other].is_final() {
                    return Some(format!("inspected unit '{}'", inspected));
                }
            }
        }
    }

    None
}

/// A declared factory input not yet in the registry, counting outputs that
/// earlier factories of the same unit will have produced.
fn missing_input_reason(unit: &ConfigurationUnit, outputs: &OutputRegistry) -> Option<String> {
    let mut produced_here: HashSet<&OutputKey> = HashSet::new();
    for factory in unit.factories() {
        for input in factory.inputs() {
            if !outputs.contains(input) && !produced_here.contains(input) {
                return Some(format!("input {}", input.describe()));
            }
        }
        produced_here.insert(factory.output());
    }
    None
}

fn pending_producer<'a>(
    selector: &OutputKey,
    index: usize,
    units: &'a [ConfigurationUnit],
    states: &[UnitState],
) -> Option<&'a str> {
    units.iter().enumerate().find_map(|(i, unit)| {
        if i == index || states[i].is_final() {
            return None;
        }
        unit.factories()
            .iter()
            .any(|f| f.output() == selector)
            .then(|| unit.name())
    })
}

fn bind_request(
    request: Option<&ConfigRequest>,
    properties: &PropertySourceStack,
) -> Result<Option<BoundConfig>, EngineError> {
    match request {
        Some(request) => bind(&request.prefix, properties, &request.schema)
            .map(Some)
            .map_err(EngineError::Binding),
        None => Ok(None),
    }
}

fn unresolved_chain(
    index: usize,
    reason: &str,
    queue: &VecDeque<usize>,
    units: &[ConfigurationUnit],
    waiting: &[Option<String>],
) -> Vec<String> {
    let mut chain = vec![format!("{} (waiting for {})", units[index].name(), reason)];
    for &queued in queue {
        match &waiting[queued] {
            Some(w) => chain.push(format!("{} (waiting for {})", units[queued].name(), w)),
            None => chain.push(units[queued].name().to_string()),
        }
    }
    chain
}

#[allow(clippy::too_many_arguments)]
fn failure(
    error: EngineError,
    units: &[ConfigurationUnit],
    run_id: Uuid,
    started_at: DateTime<Utc>,
    start: Instant,
    states: &[UnitState],
    reasons: &[Option<String>],
    finalized: &[usize],
) -> ActivationFailure {
    ActivationFailure {
        error,
        report: build_report(units, run_id, started_at, start.elapsed(), states, reasons, finalized),
    }
}

/// Assemble the report in processing order: finalized units first, then any
/// unit never reached, in declaration order.
fn build_report(
    units: &[ConfigurationUnit],
    run_id: Uuid,
    started_at: DateTime<Utc>,
    duration: std::time::Duration,
    states: &[UnitState],
    reasons: &[Option<String>],
    finalized: &[usize],
) -> ActivationReport {
    let mut entries = Vec::with_capacity(units.len());
    let mut seen: HashSet<usize> = HashSet::new();

    for &index in finalized {
        seen.insert(index);
        entries.push(UnitReport {
            unit: units[index].name().to_string(),
            state: states[index],
            reason: reasons[index].clone(),
        });
    }
    for (index, unit) in units.iter().enumerate() {
        if !seen.contains(&index) {
            entries.push(UnitReport {
                unit: unit.name().to_string(),
                state: states[index],
                reason: reasons[index].clone(),
            });
        }
    }

    ActivationReport::new(run_id, started_at, duration, entries)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::binder::{ConfigField, ConfigSchema, FieldKind};
    use crate::conditions::Condition;
    use crate::properties::{PropertyLayer, PropertySourceStack};
    use crate::units::{Factory, FactoryError};

    #[derive(Debug)]
    struct Core;

    #[derive(Debug)]
    struct Delivery {
        carrier: String,
    }

    #[derive(Debug)]
    struct Metrics;

    fn props(pairs: Vec<(&str, &str)>) -> PropertySourceStack {
        let mut stack = PropertySourceStack::new();
        stack.add_layer(PropertyLayer::new("test", 10, pairs)).unwrap();
        stack.freeze();
        stack
    }

    fn core_unit() -> ConfigurationUnit {
        ConfigurationUnit::new("core")
            .with_factory(Factory::new::<Core, _>("core_marker", |_| Ok(Core)))
    }

    fn delivery_unit() -> ConfigurationUnit {
        let schema =
            ConfigSchema::new().field(ConfigField::new("cargo-name", FieldKind::String).required());
        ConfigurationUnit::new("delivery")
            .with_import("core")
            .with_properties("myshop.delivery", schema)
            .with_factory(
                Factory::new::<Delivery, _>("delivery_service", |ctx| {
                    let _core = ctx.get::<Core>()?;
                    let config = ctx.config()?;
                    Ok(Delivery {
                        carrier: config.get_str("cargo-name").unwrap_or_default().to_string(),
                    })
                })
                .requires::<Core>(),
            )
    }

    #[test]
    fn imports_are_finalized_before_importers() {
        let activation = Activator::new(vec![delivery_unit(), core_unit()])
            .activate(&props(vec![("myshop.delivery.cargo-name", "DHL")]))
            .unwrap();

        assert_eq!(activation.report.activated(), ["core", "delivery"]);
        let delivery = activation.outputs.get::<Delivery>().unwrap();
        assert_eq!(delivery.carrier, "DHL");
    }

    #[test]
    fn false_condition_skips_without_error() {
        let metrics = ConfigurationUnit::new("metrics")
            .when(Condition::property_equals("myshop.metrics.enabled", "true"))
            .with_factory(Factory::new::<Metrics, _>("metrics_marker", |_| Ok(Metrics)));

        let activation = Activator::new(vec![metrics]).activate(&props(vec![])).unwrap();

        assert_eq!(activation.report.state_of("metrics"), Some(UnitState::Skipped));
        assert!(activation.outputs.is_empty());
        assert!(activation.report.reason_of("metrics").unwrap().contains("condition"));
    }

    #[test]
    fn missing_required_property_fails_the_run() {
        let failure = Activator::new(vec![core_unit(), delivery_unit()])
            .activate(&props(vec![]))
            .unwrap_err();

        assert!(failure.to_string().contains("myshop.delivery.cargo-name"));
        assert_eq!(failure.report.state_of("delivery"), Some(UnitState::Failed));
        assert_eq!(failure.report.state_of("core"), Some(UnitState::Activated));
    }

    #[test]
    fn duplicate_output_identity_fails_the_run() {
        let first = ConfigurationUnit::new("first")
            .with_factory(Factory::new::<Core, _>("core_a", |_| Ok(Core)));
        let second = ConfigurationUnit::new("second")
            .with_factory(Factory::new::<Core, _>("core_b", |_| Ok(Core)));

        let failure = Activator::new(vec![first, second])
            .activate(&props(vec![]))
            .unwrap_err();

        assert!(matches!(failure.error, EngineError::DuplicateOutput(_)));
        assert_eq!(failure.report.state_of("second"), Some(UnitState::Failed));
    }

    #[test]
    fn factory_error_fails_the_run_with_reason() {
        let broken = ConfigurationUnit::new("broken").with_factory(
            Factory::new::<Core, _>("explodes", |_| {
                Err::<Core, _>(FactoryError::failed("explodes", "boom"))
            }),
        );

        let failure = Activator::new(vec![broken]).activate(&props(vec![])).unwrap_err();

        assert!(matches!(failure.error, EngineError::Factory(_)));
        assert_eq!(failure.report.state_of("broken"), Some(UnitState::Failed));
        assert!(failure.report.reason_of("broken").unwrap().contains("boom"));
    }

    #[test]
    fn import_cycle_is_fatal() {
        let x = ConfigurationUnit::new("x").with_import("y");
        let y = ConfigurationUnit::new("y").with_import("x");

        let failure = Activator::new(vec![x, y]).activate(&props(vec![])).unwrap_err();

        assert!(matches!(failure.error, EngineError::Graph(GraphError::ImportCycle { .. })));
    }

    #[test]
    fn condition_on_later_producer_defers_instead_of_skipping() {
        // "watcher" is discovered first but conditions on core's output;
        // without an import edge the soft deferral must order it after core.
        let watcher = ConfigurationUnit::new("watcher")
            .when(Condition::output_present::<Core>())
            .with_factory(Factory::new::<Metrics, _>("watcher_marker", |_| Ok(Metrics)));

        let activation = Activator::new(vec![watcher, core_unit()])
            .activate(&props(vec![]))
            .unwrap();

        assert_eq!(activation.report.activated(), ["core", "watcher"]);
    }

    #[test]
    fn output_absent_verdict_waits_for_pending_producer() {
        // "fallback" must not activate off core's absence while core is
        // still pending.
        let fallback = ConfigurationUnit::new("fallback")
            .when(Condition::output_absent::<Core>())
            .with_factory(Factory::new::<Metrics, _>("fallback_marker", |_| Ok(Metrics)));

        let activation = Activator::new(vec![fallback, core_unit()])
            .activate(&props(vec![]))
            .unwrap();

        assert_eq!(activation.report.state_of("fallback"), Some(UnitState::Skipped));
        assert_eq!(activation.report.state_of("core"), Some(UnitState::Activated));
    }

    #[test]
    fn input_from_skipped_producer_exhausts_retries_into_graph_error() {
        let producer = ConfigurationUnit::new("producer")
            .when(Condition::property_present("never.set"))
            .with_factory(Factory::new::<Core, _>("core_marker", |_| Ok(Core)));
        let consumer = ConfigurationUnit::new("consumer").with_factory(
            Factory::new::<Delivery, _>("needs_core", |ctx| {
                let _core = ctx.get::<Core>()?;
                Ok(Delivery { carrier: String::new() })
            })
            .requires::<Core>(),
        );

        let failure = Activator::new(vec![producer, consumer])
            .activate(&props(vec![]))
            .unwrap_err();

        match failure.error {
            EngineError::Graph(GraphError::UnresolvedChain { waiting, .. }) => {
                assert!(waiting.iter().any(|w| w.contains("consumer")));
            }
            other => panic!("expected UnresolvedChain, got {:?}", other),
        }
    }

    #[test]
    fn factories_execute_once_in_declared_order() {
        use std::sync::atomic::{AtomicUsize, Ordering};
        use std::sync::Arc as StdArc;

        let calls = StdArc::new(AtomicUsize::new(0));
        let calls_in_factory = StdArc::clone(&calls);

        let unit = ConfigurationUnit::new("counted")
            .with_factory(Factory::new::<Core, _>("count_core", move |_| {
                calls_in_factory.fetch_add(1, Ordering::SeqCst);
                Ok(Core)
            }))
            .with_factory(
                Factory::new::<Delivery, _>("after_core", |ctx| {
                    // Same-unit input produced by the preceding factory.
                    let _core = ctx.get::<Core>()?;
                    Ok(Delivery { carrier: "ok".into() })
                })
                .requires::<Core>(),
            );

        let activation = Activator::new(vec![unit]).activate(&props(vec![])).unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(activation.outputs.contains_type::<Core>());
        assert!(activation.outputs.contains_type::<Delivery>());
    }
}
