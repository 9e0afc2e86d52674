//! Output formatters: a neighborhood as a comma-separated name line, a network as Graphviz DOT.
//! Thin serializers over [`crate::network::BayesianNetwork`] and a name list.

use std::fmt::Write as _;

use crate::network::BayesianNetwork;

/// `a, b, c` — the `--target` neighborhood output, vertex order matching whatever order the
/// caller passed in (normally ascending by variable index).
pub fn format_neighborhood(names: &[String]) -> String {
    names.join(", ")
}

/// Graphviz DOT for a whole network. Always emits a single `digraph`: an undirected edge is
/// rendered as two antiparallel arcs rather than mixing `--` and `->` operators in one graph,
/// which most Graphviz tools reject outright. Vertex order matches the input's name order, each
/// declared once so isolated vertices still appear.
pub fn format_dot(net: &BayesianNetwork) -> String {
    let mut out = String::new();
    writeln!(out, "digraph G {{").unwrap();
    for v in 0..net.n() {
        writeln!(out, "    \"{}\";", net.name(v)).unwrap();
    }
    for u in 0..net.n() {
        for v in 0..net.n() {
            if net.has_arc(u, v) {
                writeln!(out, "    \"{}\" -> \"{}\";", net.name(u), net.name(v)).unwrap();
            }
        }
    }
    writeln!(out, "}}").unwrap();
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn neighborhood_is_comma_separated() {
        let names = vec!["a".to_string(), "b".to_string(), "c".to_string()];
        assert_eq!(format_neighborhood(&names), "a, b, c");
    }

    #[test]
    fn empty_neighborhood_is_an_empty_line() {
        assert_eq!(format_neighborhood(&[]), "");
    }

    #[test]
    fn dot_emits_a_directed_arc_once() {
        let mut net = BayesianNetwork::new(vec!["a".into(), "b".into()]);
        net.add_arc(0, 1).unwrap();
        let dot = format_dot(&net);
        assert!(dot.contains("\"a\" -> \"b\";"));
        assert!(!dot.contains("\"b\" -> \"a\";"));
    }

    #[test]
    fn dot_emits_an_undirected_edge_as_both_arcs() {
        let mut net = BayesianNetwork::new(vec!["a".into(), "b".into()]);
        net.add_undirected_edge(0, 1).unwrap();
        let dot = format_dot(&net);
        assert!(dot.contains("\"a\" -> \"b\";"));
        assert!(dot.contains("\"b\" -> \"a\";"));
    }

    #[test]
    fn dot_declares_isolated_vertices() {
        let net = BayesianNetwork::new(vec!["a".into(), "b".into(), "c".into()]);
        let dot = format_dot(&net);
        assert!(dot.contains("\"c\";"));
    }
}
