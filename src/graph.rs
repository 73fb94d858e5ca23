//! In-memory filter graph.
//!
//! Builders append typed nodes (`inputs -> filter -> outputs`) instead of
//! concatenating strings, so the "every label produced exactly once and
//! consumed at most once" invariant is checked mechanically before the
//! graph is serialized into `filter_complex` text.

use std::collections::HashMap;

use crate::error::{CinegraphError, CinegraphResult};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum StreamKind {
    Video,
    Audio,
}

impl StreamKind {
    fn selector(self) -> char {
        match self {
            Self::Video => 'v',
            Self::Audio => 'a',
        }
    }
}

/// One edge name in the graph: either a demuxer stream of the Nth `-i`
/// input, or an internal label owned by this export's namespace.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Label {
    Source { input: usize, kind: StreamKind },
    Internal(String),
}

impl Label {
    pub fn render(&self) -> String {
        match self {
            Self::Source { input, kind } => format!("[{}:{}]", input, kind.selector()),
            Self::Internal(name) => format!("[{name}]"),
        }
    }
}

#[derive(Clone, Debug)]
pub struct FilterNode {
    pub inputs: Vec<Label>,
    /// Full filter text, `name=args` or a bare source filter.
    pub filter: String,
    pub outputs: Vec<Label>,
}

#[derive(Clone, Debug, Default)]
pub struct FilterGraph {
    nodes: Vec<FilterNode>,
    counter: u64,
}

impl FilterGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate a fresh internal label. The counter is scoped to this
    /// graph, so identical inputs always allocate identical names.
    pub fn alloc(&mut self, prefix: &str) -> Label {
        let label = Label::Internal(format!("{prefix}{}", self.counter));
        self.counter += 1;
        label
    }

    pub fn add(&mut self, inputs: Vec<Label>, filter: impl Into<String>, outputs: Vec<Label>) {
        self.nodes.push(FilterNode {
            inputs,
            filter: filter.into(),
            outputs,
        });
    }

    /// Append a single-input single-output stage and return its output.
    pub fn chain(&mut self, input: Label, filter: impl Into<String>, prefix: &str) -> Label {
        let out = self.alloc(prefix);
        self.add(vec![input], filter, vec![out.clone()]);
        out
    }

    /// Append a source filter (no inputs) and return its output.
    pub fn source(&mut self, filter: impl Into<String>, prefix: &str) -> Label {
        let out = self.alloc(prefix);
        self.add(Vec::new(), filter, vec![out.clone()]);
        out
    }

    pub fn nodes(&self) -> &[FilterNode] {
        &self.nodes
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Check label discipline: every internal label produced exactly once,
    /// consumed exactly once, except `finals` which must stay unconsumed.
    pub fn validate(&self, finals: &[&Label]) -> CinegraphResult<()> {
        let mut produced: HashMap<&str, usize> = HashMap::new();
        let mut consumed: HashMap<&str, usize> = HashMap::new();

        for node in &self.nodes {
            for label in &node.outputs {
                match label {
                    Label::Internal(name) => *produced.entry(name.as_str()).or_default() += 1,
                    Label::Source { .. } => {
                        return Err(CinegraphError::graph(
                            "a filter node cannot produce a demuxer source label",
                        ));
                    }
                }
            }
            for label in &node.inputs {
                if let Label::Internal(name) = label {
                    *consumed.entry(name.as_str()).or_default() += 1;
                }
            }
        }

        for (name, count) in &produced {
            if *count > 1 {
                return Err(CinegraphError::graph(format!(
                    "label '{name}' produced {count} times"
                )));
            }
        }
        for (name, count) in &consumed {
            if *count > 1 {
                return Err(CinegraphError::graph(format!(
                    "label '{name}' consumed {count} times"
                )));
            }
            if !produced.contains_key(*name) {
                return Err(CinegraphError::graph(format!(
                    "label '{name}' consumed but never produced"
                )));
            }
        }

        let final_names: Vec<&str> = finals
            .iter()
            .filter_map(|l| match l {
                Label::Internal(name) => Some(name.as_str()),
                Label::Source { .. } => None,
            })
            .collect();

        for (name, _) in &produced {
            let is_final = final_names.contains(name);
            let is_consumed = consumed.contains_key(*name);
            if is_final && is_consumed {
                return Err(CinegraphError::graph(format!(
                    "final label '{name}' must not be consumed inside the graph"
                )));
            }
            if !is_final && !is_consumed {
                return Err(CinegraphError::graph(format!(
                    "label '{name}' is dangling (produced but never consumed)"
                )));
            }
        }
        for name in &final_names {
            if !produced.contains_key(name) {
                return Err(CinegraphError::graph(format!(
                    "final label '{name}' is never produced"
                )));
            }
        }

        Ok(())
    }

    /// Serialize to `filter_complex` text, nodes in insertion order.
    pub fn render(&self) -> String {
        let mut out = String::new();
        for (idx, node) in self.nodes.iter().enumerate() {
            if idx > 0 {
                out.push(';');
            }
            for label in &node.inputs {
                out.push_str(&label.render());
            }
            out.push_str(&node.filter);
            for label in &node.outputs {
                out.push_str(&label.render());
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn src(input: usize) -> Label {
        Label::Source {
            input,
            kind: StreamKind::Video,
        }
    }

    #[test]
    fn renders_flat_statements_in_order() {
        let mut g = FilterGraph::new();
        let a = g.chain(src(0), "scale=1280:720", "v");
        let b = g.chain(src(1), "scale=1280:720", "v");
        let out = g.alloc("v");
        g.add(vec![a, b], "concat=n=2:v=1:a=0", vec![out.clone()]);

        assert_eq!(
            g.render(),
            "[0:v]scale=1280:720[v0];[1:v]scale=1280:720[v1];[v0][v1]concat=n=2:v=1:a=0[v2]"
        );
        g.validate(&[&out]).unwrap();
    }

    #[test]
    fn label_allocation_is_deterministic() {
        let build = || {
            let mut g = FilterGraph::new();
            let a = g.chain(src(0), "null", "v");
            let _ = g.chain(a, "null", "v");
            g.render()
        };
        assert_eq!(build(), build());
    }

    #[test]
    fn double_consume_is_rejected() {
        let mut g = FilterGraph::new();
        let a = g.chain(src(0), "null", "v");
        let b = g.chain(a.clone(), "null", "v");
        let c = g.chain(a, "null", "v");
        assert!(g.validate(&[&b, &c]).is_err());
    }

    #[test]
    fn double_produce_is_rejected() {
        let mut g = FilterGraph::new();
        let out = g.alloc("v");
        g.add(vec![src(0)], "null", vec![out.clone()]);
        g.add(vec![src(1)], "null", vec![out.clone()]);
        assert!(g.validate(&[&out]).is_err());
    }

    #[test]
    fn dangling_label_is_rejected() {
        let mut g = FilterGraph::new();
        let a = g.chain(src(0), "null", "v");
        let b = g.chain(src(1), "null", "v");
        // `a` is neither final nor consumed.
        let _ = a;
        assert!(g.validate(&[&b]).is_err());
    }

    #[test]
    fn consumed_but_never_produced_is_rejected() {
        let mut g = FilterGraph::new();
        let ghost = Label::Internal("ghost".to_string());
        let out = g.alloc("v");
        g.add(vec![ghost], "null", vec![out.clone()]);
        assert!(g.validate(&[&out]).is_err());
    }

    #[test]
    fn final_label_must_stay_unconsumed() {
        let mut g = FilterGraph::new();
        let a = g.chain(src(0), "null", "v");
        let b = g.chain(a.clone(), "null", "v");
        assert!(g.validate(&[&a]).is_err());
        g.validate(&[&b]).unwrap();
    }
}
