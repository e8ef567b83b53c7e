//! Class inheritance extraction for interactive lessons.
//!
//! A lexical pass over the learner's source: every `class Name(Base, ...):`
//! line becomes a node, and each listed base becomes an edge. Classes that
//! are only referenced as bases still get a node so the diagram is closed.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

/// Matches `class Name:` / `class Name(Bases):` at any indentation.
static CLASS_DECLARATION: Lazy<Option<Regex>> = Lazy::new(|| {
    Regex::new(r"^\s*class\s+([A-Za-z_][A-Za-z0-9_]*)\s*(?:\(([^)]*)\))?\s*:").ok()
});

/// An inheritance edge: `child` derives from `parent`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassEdge {
    /// The derived class.
    pub child: String,
    /// The base class.
    pub parent: String,
}

/// Classes and inheritance edges found in a program.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassGraph {
    /// Class names in order of first appearance.
    pub nodes: Vec<String>,
    /// Inheritance edges in declaration order.
    pub edges: Vec<ClassEdge>,
}

impl ClassGraph {
    /// Parses class declarations out of `source`.
    #[must_use]
    pub fn parse(source: &str) -> Self {
        let mut graph = Self::default();
        let Some(re) = CLASS_DECLARATION.as_ref() else {
            return graph;
        };

        for line in source.lines() {
            if line.trim_start().starts_with('#') {
                continue;
            }
            let Some(caps) = re.captures(line) else {
                continue;
            };
            let Some(name) = caps.get(1).map(|m| m.as_str().to_string()) else {
                continue;
            };
            graph.add_node(&name);

            let bases = caps.get(2).map_or("", |m| m.as_str());
            for base in bases.split(',').map(str::trim) {
                // Keyword arguments such as `metaclass=ABCMeta` are not bases.
                if base.is_empty() || base.contains('=') || base == "object" {
                    continue;
                }
                graph.add_node(base);
                graph.edges.push(ClassEdge {
                    child: name.clone(),
                    parent: base.to_string(),
                });
            }
        }

        graph
    }

    /// Returns `true` if no classes were found.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    fn add_node(&mut self, name: &str) {
        if !self.nodes.iter().any(|n| n == name) {
            self.nodes.push(name.to_string());
        }
    }
}
