use std::collections::BTreeMap;

/// Immutable DAG derived from a saga's `requires` relations.
///
/// Built once per registered saga and shared read-only by every run of it.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct DependencyGraph {
    /// For each step, which steps it requires.
    pub depends_on: BTreeMap<String, Vec<String>>,
    /// For each step, which steps require it.
    pub dependents: BTreeMap<String, Vec<String>>,
    /// Steps grouped by parallelizable “levels”.
    pub levels: Vec<Vec<String>>,
    /// A deterministic topological order.
    pub topo_order: Vec<String>,
}

impl DependencyGraph {
    pub fn len(&self) -> usize {
        self.topo_order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.topo_order.is_empty()
    }

    pub fn contains(&self, step: &str) -> bool {
        self.depends_on.contains_key(step)
    }

    pub fn dependencies(&self, step: &str) -> &[String] {
        self.depends_on.get(step).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn dependents_of(&self, step: &str) -> &[String] {
        self.dependents.get(step).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Steps with no requirements, in name order.
    pub fn roots(&self) -> Vec<&str> {
        self.depends_on
            .iter()
            .filter(|(_, deps)| deps.is_empty())
            .map(|(s, _)| s.as_str())
            .collect()
    }

    /// Size of the widest level: the most steps that can ever run at once.
    pub fn width(&self) -> usize {
        self.levels.iter().map(Vec::len).max().unwrap_or(0)
    }

    pub fn to_dot(&self, saga_name: &str) -> String {
        let mut out = String::new();
        out.push_str("digraph saga {\n");
        out.push_str(&format!("  label=\"saga: {}\";\n", escape_dot(saga_name)));
        out.push_str("  labelloc=t;\n");
        out.push_str("  rankdir=LR;\n");

        for (step, deps) in &self.depends_on {
            if deps.is_empty() {
                out.push_str(&format!("  \"{}\";\n", escape_dot(step)));
            } else {
                for dep in deps {
                    out.push_str(&format!("  \"{}\" -> \"{}\";\n", escape_dot(dep), escape_dot(step)));
                }
            }
        }

        for level in &self.levels {
            if level.len() > 1 {
                out.push_str("  { rank=same; ");
                for s in level {
                    out.push_str(&format!("\"{}\"; ", escape_dot(s)));
                }
                out.push_str("}\n");
            }
        }

        out.push_str("}\n");
        out
    }
}

fn escape_dot(s: &str) -> String {
    s.replace('\\', "\\\\").replace('"', "\\\"")
}
