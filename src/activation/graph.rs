use std::collections::HashMap;

use thiserror::Error;

use crate::units::ConfigurationUnit;

/// Activation ordering error type
#[derive(Debug, Error)]
pub enum GraphError {
    #[error("Cyclic import chain: {}", .path.join(" -> "))]
    ImportCycle { path: Vec<String> },

    #[error("Unit '{unit}' imports unknown unit '{import}'")]
    UnknownImport { unit: String, import: String },

    #[error("Activation ordering unresolved after {} deferral rounds: {}", .retries, .waiting.join("; "))]
    UnresolvedChain { retries: usize, waiting: Vec<String> },
}

/// Order units so every import precedes its importer, preserving discovery
/// order among unrelated units. Import edges are hard: a cycle is fatal.
pub fn topological_order(units: &[ConfigurationUnit]) -> Result<Vec<usize>, GraphError> {
    let name_to_index: HashMap<&str, usize> = units
        .iter()
        .enumerate()
        .map(|(i, u)| (u.name(), i))
        .collect();

    let mut visited = vec![false; units.len()];
    let mut on_stack = vec![false; units.len()];
    let mut path: Vec<String> = Vec::new();
    let mut order = Vec::with_capacity(units.len());

    for index in 0..units.len() {
        if !visited[index] {
            visit(
                index,
                units,
                &name_to_index,
                &mut visited,
                &mut on_stack,
                &mut path,
                &mut order,
            )?;
        }
    }

    Ok(order)
}

fn visit(
    index: usize,
    units: &[ConfigurationUnit],
    name_to_index: &HashMap<&str, usize>,
    visited: &mut [bool],
    on_stack: &mut [bool],
    path: &mut Vec<String>,
    order: &mut Vec<usize>,
) -> Result<(), GraphError> {
    let name = units[index].name();

    if on_stack[index] {
        let start = path.iter().position(|n| n == name).unwrap_or(0);
        let mut cycle: Vec<String> = path[start..].to_vec();
        cycle.push(name.to_string());
        return Err(GraphError::ImportCycle { path: cycle });
    }

    if visited[index] {
        return Ok(());
    }

    on_stack[index] = true;
    path.push(name.to_string());

    for import in units[index].imports() {
        let &import_index =
            name_to_index
                .get(import.as_str())
                .ok_or_else(|| GraphError::UnknownImport {
                    unit: name.to_string(),
                    import: import.clone(),
                })?;
        visit(
            import_index,
            units,
            name_to_index,
            visited,
            on_stack,
            path,
            order,
        )?;
    }

    path.pop();
    on_stack[index] = false;
    visited[index] = true;
    order.push(index);

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unit(name: &str, imports: &[&str]) -> ConfigurationUnit {
        let mut unit = ConfigurationUnit::new(name);
        for import in imports {
            unit = unit.with_import(*import);
        }
        unit
    }

    #[test]
    fn imports_precede_importers() {
        let units = vec![
            unit("delivery", &["core"]),
            unit("core", &[]),
            unit("billing", &["delivery", "core"]),
        ];
        let order = topological_order(&units).unwrap();
        let names: Vec<&str> = order.iter().map(|&i| units[i].name()).collect();

        let pos = |n: &str| names.iter().position(|x| *x == n).unwrap();
        assert!(pos("core") < pos("delivery"));
        assert!(pos("delivery") < pos("billing"));
    }

    #[test]
    fn discovery_order_is_preserved_among_unrelated_units() {
        let units = vec![unit("a", &[]), unit("b", &[]), unit("c", &[])];
        let order = topological_order(&units).unwrap();
        assert_eq!(order, vec![0, 1, 2]);
    }

    #[test]
    fn two_unit_cycle_is_fatal_with_path() {
        let units = vec![unit("x", &["y"]), unit("y", &["x"])];
        let err = topological_order(&units).unwrap_err();

        match err {
            GraphError::ImportCycle { path } => {
                assert_eq!(path.first(), path.last());
                assert!(path.len() >= 3);
            }
            other => panic!("expected ImportCycle, got {:?}", other),
        }
    }

    #[test]
    fn self_import_is_a_cycle() {
        let units = vec![unit("selfish", &["selfish"])];
        assert!(matches!(
            topological_order(&units),
            Err(GraphError::ImportCycle { .. })
        ));
    }

    #[test]
    fn unknown_import_is_reported() {
        let units = vec![unit("a", &["ghost"])];
        match topological_order(&units).unwrap_err() {
            GraphError::UnknownImport { unit, import } => {
                assert_eq!(unit, "a");
                assert_eq!(import, "ghost");
            }
            other => panic!("expected UnknownImport, got {:?}", other),
        }
    }
}
