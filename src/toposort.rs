//! Cycle-tolerant topological sort over a canonical-URL dependency map.
//! Cycles are reported, not fatal: back edges are recorded and traversal
//! continues past them.

use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};

pub struct TopoResult {
    /// Leaves-first compile order.
    pub sorted: Vec<String>,
    /// Each entry is one detected cycle (the DFS path from the re-entered
    /// node back to itself).
    pub cycles: Vec<Vec<String>>,
}

enum Mark {
    Visiting,
    Done,
}

/// Depth-first post-order traversal with a visiting-set back-edge check.
pub fn topo_sort(deps: &HashMap<String, Vec<String>>) -> TopoResult {
    let mut state: HashMap<&str, Mark> = HashMap::new();
    let mut order = Vec::with_capacity(deps.len());
    let mut cycles = Vec::new();
    let mut path = Vec::new();

    let mut keys: Vec<&String> = deps.keys().collect();
    keys.sort();

    for start in keys {
        if !state.contains_key(start.as_str()) {
            visit(start, deps, &mut state, &mut order, &mut path, &mut cycles);
        }
    }

    order.reverse();
    TopoResult { sorted: order, cycles }
}

fn visit<'a>(
    node: &'a str,
    deps: &'a HashMap<String, Vec<String>>,
    state: &mut HashMap<&'a str, Mark>,
    order: &mut Vec<String>,
    path: &mut Vec<&'a str>,
    cycles: &mut Vec<Vec<String>>,
) {
    state.insert(node, Mark::Visiting);
    path.push(node);

    if let Some(edges) = deps.get(node) {
        for dep in edges {
            match state.get(dep.as_str()) {
                None => visit(dep, deps, state, order, path, cycles),
                Some(Mark::Visiting) => {
                    // Back edge: record the cycle path from `dep` to `node`.
                    if let Some(pos) = path.iter().position(|n| *n == dep.as_str()) {
                        let mut cycle: Vec<String> =
                            path[pos..].iter().map(|s| s.to_string()).collect();
                        cycle.push(dep.clone());
                        cycles.push(cycle);
                    }
                }
                Some(Mark::Done) => {}
            }
        }
    }

    path.pop();
    state.insert(node, Mark::Done);
    order.push(node.to_string());
}

/// Dependency-index comparator: items earlier in `sorted` are dependencies of
/// items later in `sorted`; unsorted items (cyclic or unseen) fall after all
/// sorted items, tie-broken lexicographically.
pub fn dependency_comparator<'a>(sorted: &'a [String]) -> impl Fn(&str, &str) -> Ordering + 'a {
    let index: HashMap<&str, usize> = sorted.iter().enumerate().map(|(i, s)| (s.as_str(), i)).collect();
    move |a: &str, b: &str| match (index.get(a), index.get(b)) {
        (Some(ia), Some(ib)) => ia.cmp(ib),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => a.cmp(b),
    }
}

/// Stabilizer comparator applied before dependency sort: orders by resource
/// kind, then StructureDefinition kind, then name, then URL.
pub fn by_kind_comparator(
    a_url: &str,
    a_rank: u8,
    a_struct_rank: Option<u8>,
    a_name: Option<&str>,
    b_url: &str,
    b_rank: u8,
    b_struct_rank: Option<u8>,
    b_name: Option<&str>,
) -> Ordering {
    a_rank
        .cmp(&b_rank)
        .then_with(|| a_struct_rank.unwrap_or(255).cmp(&b_struct_rank.unwrap_or(255)))
        .then_with(|| a_name.unwrap_or("").cmp(b_name.unwrap_or("")))
        .then_with(|| a_url.cmp(b_url))
}

/// Convenience: collect the set of URLs participating in any reported cycle.
pub fn cyclic_urls(cycles: &[Vec<String>]) -> HashSet<String> {
    cycles.iter().flatten().cloned().collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn map(pairs: &[(&str, &[&str])]) -> HashMap<String, Vec<String>> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.iter().map(|s| s.to_string()).collect()))
            .collect()
    }

    #[test]
    fn simple_chain_is_leaves_first() {
        let deps = map(&[("A", &["B"]), ("B", &["C"]), ("C", &[])]);
        let result = topo_sort(&deps);
        let pos = |n: &str| result.sorted.iter().position(|x| x == n).unwrap();
        assert!(pos("C") < pos("B"));
        assert!(pos("B") < pos("A"));
        assert!(result.cycles.is_empty());
    }

    #[test]
    fn diamond_dependency_respects_order() {
        let deps = map(&[("A", &["B", "D"]), ("B", &["C"]), ("D", &[]), ("C", &[])]);
        let result = topo_sort(&deps);
        let pos = |n: &str| result.sorted.iter().position(|x| x == n).unwrap();
        assert!(pos("C") < pos("B"));
        assert!(pos("D") < pos("A"));
        assert!(pos("B") < pos("A"));
    }

    #[test]
    fn cycle_is_reported_but_does_not_abort() {
        let deps = map(&[("A", &["B"]), ("B", &["A"])]);
        let result = topo_sort(&deps);
        assert_eq!(result.sorted.len(), 2);
        assert!(!result.cycles.is_empty());
    }
}
