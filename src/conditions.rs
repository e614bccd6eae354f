use std::collections::HashSet;

use crate::activation::OutputRegistry;
use crate::properties::PropertySourceStack;
use crate::units::OutputSelector;

/// Activation predicate for a configuration unit.
///
/// Conditions are plain data interpreted by [`Condition::evaluate`]:
/// deterministic, side-effect free, and safe to re-evaluate during
/// re-ordering attempts. Conditions inspecting registry state create soft
/// ordering edges; the executor defers a unit while a pending producer could
/// still flip the verdict.
#[derive(Debug, Clone)]
pub enum Condition {
    /// Property resolves to exactly the expected raw value.
    PropertyEquals { key: String, expected: String },
    /// Property resolves to any value.
    PropertyPresent { key: String },
    /// An output matching the selector is registered.
    OutputPresent(OutputSelector),
    /// No output matching the selector is registered.
    OutputAbsent(OutputSelector),
    /// Another unit reached the `Activated` state.
    UnitActivated { unit: String },
    AllOf(Vec<Condition>),
    AnyOf(Vec<Condition>),
    NoneOf(Vec<Condition>),
}

impl Condition {
    pub fn property_equals(key: impl Into<String>, expected: impl Into<String>) -> Self {
        Self::PropertyEquals {
            key: key.into(),
            expected: expected.into(),
        }
    }

    pub fn property_present(key: impl Into<String>) -> Self {
        Self::PropertyPresent { key: key.into() }
    }

    pub fn output_present<T: 'static + ?Sized>() -> Self {
        Self::OutputPresent(OutputSelector::of::<T>())
    }

    pub fn output_present_named<T: 'static + ?Sized>(qualifier: impl Into<String>) -> Self {
        Self::OutputPresent(OutputSelector::named::<T>(qualifier))
    }

    pub fn output_absent<T: 'static + ?Sized>() -> Self {
        Self::OutputAbsent(OutputSelector::of::<T>())
    }

    pub fn output_absent_named<T: 'static + ?Sized>(qualifier: impl Into<String>) -> Self {
        Self::OutputAbsent(OutputSelector::named::<T>(qualifier))
    }

    pub fn unit_activated(unit: impl Into<String>) -> Self {
        Self::UnitActivated { unit: unit.into() }
    }

    pub fn all_of(conditions: Vec<Condition>) -> Self {
        Self::AllOf(conditions)
    }

    pub fn any_of(conditions: Vec<Condition>) -> Self {
        Self::AnyOf(conditions)
    }

    pub fn none_of(conditions: Vec<Condition>) -> Self {
        Self::NoneOf(conditions)
    }

    /// Evaluate against the current property values, registry state, and the
    /// set of activated unit names.
    pub fn evaluate(
        &self,
        properties: &PropertySourceStack,
        outputs: &OutputRegistry,
        activated: &HashSet<String>,
    ) -> bool {
        match self {
            Condition::PropertyEquals { key, expected } => {
                properties.resolve(key) == Some(expected.as_str())
            }
            Condition::PropertyPresent { key } => properties.contains(key),
            Condition::OutputPresent(selector) => outputs.contains(selector),
            Condition::OutputAbsent(selector) => !outputs.contains(selector),
            Condition::UnitActivated { unit } => activated.contains(unit),
            Condition::AllOf(conditions) => conditions
                .iter()
                .all(|c| c.evaluate(properties, outputs, activated)),
            Condition::AnyOf(conditions) => conditions
                .iter()
                .any(|c| c.evaluate(properties, outputs, activated)),
            Condition::NoneOf(conditions) => !conditions
                .iter()
                .any(|c| c.evaluate(properties, outputs, activated)),
        }
    }

    /// Output selectors this condition inspects, recursively. The executor
    /// uses these to recognize soft ordering edges.
    pub fn inspected_outputs(&self) -> Vec<&OutputSelector> {
        let mut out = Vec::new();
        self.collect_outputs(&mut out);
        out
    }

    fn collect_outputs<'a>(&'a self, out: &mut Vec<&'a OutputSelector>) {
        match self {
            Condition::OutputPresent(selector) | Condition::OutputAbsent(selector) => {
                out.push(selector)
            }
            Condition::AllOf(cs) | Condition::AnyOf(cs) | Condition::NoneOf(cs) => {
                for c in cs {
                    c.collect_outputs(out);
                }
            }
            _ => {}
        }
    }

    /// Unit names this condition inspects, recursively.
    pub fn inspected_units(&self) -> Vec<&str> {
        let mut out = Vec::new();
        self.collect_units(&mut out);
        out
    }

    fn collect_units<'a>(&'a self, out: &mut Vec<&'a str>) {
        match self {
            Condition::UnitActivated { unit } => out.push(unit),
            Condition::AllOf(cs) | Condition::AnyOf(cs) | Condition::NoneOf(cs) => {
                for c in cs {
                    c.collect_units(out);
                }
            }
            _ => {}
        }
    }
}

impl std::fmt::Display for Condition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Condition::PropertyEquals { key, expected } => {
                write!(f, "property '{}' equals '{}'", key, expected)
            }
            Condition::PropertyPresent { key } => write!(f, "property '{}' present", key),
            Condition::OutputPresent(selector) => {
                write!(f, "output {} present", selector.describe())
            }
            Condition::OutputAbsent(selector) => write!(f, "output {} absent", selector.describe()),
            Condition::UnitActivated { unit } => write!(f, "unit '{}' activated", unit),
            Condition::AllOf(cs) => write!(f, "all of {} conditions", cs.len()),
            Condition::AnyOf(cs) => write!(f, "any of {} conditions", cs.len()),
            Condition::NoneOf(cs) => write!(f, "none of {} conditions", cs.len()),
        }
    }
}
