//! The Bayesian network graph: a labeled vertex set plus an arc set, with the directed/
//! undirected distinction the orienter works against (an undirected edge is two antiparallel
//! arcs; a directed edge is a single arc).

use std::collections::HashMap;

use ndarray::Array2;

use crate::error::OrientError;

/// A labeled graph over `n` vertices, storing arcs as a dense adjacency matrix.
pub struct BayesianNetwork {
    names: Vec<String>,
    arcs: Array2<bool>,
}

impl BayesianNetwork {
    pub fn new(names: Vec<String>) -> BayesianNetwork {
        let n = names.len();
        BayesianNetwork {
            names,
            arcs: Array2::from_elem((n, n), false),
        }
    }

    pub fn n(&self) -> usize {
        self.names.len()
    }

    pub fn name(&self, v: usize) -> &str {
        &self.names[v]
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    fn check_vertex(&self, v: usize) -> Result<(), OrientError> {
        if v >= self.n() {
            Err(OrientError::VertexOutOfRange { index: v, n: self.n() })
        } else {
            Ok(())
        }
    }

    pub fn has_arc(&self, u: usize, v: usize) -> bool {
        self.arcs[[u, v]]
    }

    /// Adds a single arc `u -> v`. Adding both `(u, v)` and `(v, u)` represents an undirected
    /// edge.
    pub fn add_arc(&mut self, u: usize, v: usize) -> Result<(), OrientError> {
        self.check_vertex(u)?;
        self.check_vertex(v)?;
        if u == v {
            return Err(OrientError::SelfLoop(u));
        }
        if self.arcs[[u, v]] {
            return Err(OrientError::ArcAlreadyExists(u, v));
        }
        self.arcs[[u, v]] = true;
        Ok(())
    }

    pub fn remove_arc(&mut self, u: usize, v: usize) -> bool {
        let was_present = self.arcs[[u, v]];
        self.arcs[[u, v]] = false;
        was_present
    }

    pub fn add_undirected_edge(&mut self, u: usize, v: usize) -> Result<(), OrientError> {
        self.add_arc(u, v)?;
        self.add_arc(v, u)
    }

    pub fn is_adjacent(&self, u: usize, v: usize) -> bool {
        self.has_arc(u, v) || self.has_arc(v, u)
    }

    pub fn is_undirected_edge(&self, u: usize, v: usize) -> bool {
        self.has_arc(u, v) && self.has_arc(v, u)
    }

    /// True iff there is a strictly directed arc `u -> v` (no antiparallel partner).
    pub fn is_directed_edge(&self, u: usize, v: usize) -> bool {
        self.has_arc(u, v) && !self.has_arc(v, u)
    }

    pub fn undirected_neighbors(&self, v: usize) -> Vec<usize> {
        (0..self.n()).filter(|&w| self.is_undirected_edge(v, w)).collect()
    }

    pub fn directed_out_neighbors(&self, v: usize) -> Vec<usize> {
        (0..self.n()).filter(|&w| self.is_directed_edge(v, w)).collect()
    }

    pub fn directed_in_neighbors(&self, v: usize) -> Vec<usize> {
        (0..self.n()).filter(|&w| self.is_directed_edge(w, v)).collect()
    }

    pub fn all_neighbors(&self, v: usize) -> Vec<usize> {
        (0..self.n()).filter(|&w| self.is_adjacent(v, w)).collect()
    }

    /// Commits `keep_u -> keep_v` as the sole direction of an edge between the two, removing
    /// the `keep_v -> keep_u` arc if present. Errors if no arc `keep_u -> keep_v` exists at all.
    pub fn orient_edge(&mut self, keep_u: usize, keep_v: usize) -> Result<(), OrientError> {
        self.check_vertex(keep_u)?;
        self.check_vertex(keep_v)?;
        if !self.arcs[[keep_u, keep_v]] {
            return Err(OrientError::ArcNotPresent(keep_u, keep_v));
        }
        self.arcs[[keep_v, keep_u]] = false;
        Ok(())
    }

    /// A view restricted to strictly directed arcs (the [`Self::is_directed_edge`] subgraph):
    /// an undirected edge cannot participate in a directed cycle, so cycle detection and
    /// cycle-breaking ignore it.
    pub fn directed_view(&self) -> DirectedView<'_> {
        DirectedView { net: self }
    }
}

/// A filtered view over [`BayesianNetwork`] exposing only strictly directed arcs.
pub struct DirectedView<'a> {
    net: &'a BayesianNetwork,
}

impl<'a> DirectedView<'a> {
    pub fn out_neighbors(&self, v: usize) -> Vec<usize> {
        self.net.directed_out_neighbors(v)
    }

    /// True iff the directed subgraph contains a cycle reachable from any vertex.
    pub fn has_cycle(&self) -> bool {
        #[derive(Clone, Copy, PartialEq)]
        enum Color {
            White,
            Gray,
            Black,
        }
        let n = self.net.n();
        let mut color = vec![Color::White; n];

        // Iterative DFS with an explicit stack to avoid recursion depth concerns on larger
        // networks.
        for start in 0..n {
            if color[start] != Color::White {
                continue;
            }
            let mut stack: Vec<(usize, usize)> = vec![(start, 0)];
            color[start] = Color::Gray;
            while let Some(&mut (v, ref mut next)) = stack.last_mut() {
                let neighbors = self.out_neighbors(v);
                if *next < neighbors.len() {
                    let w = neighbors[*next];
                    *next += 1;
                    match color[w] {
                        Color::White => {
                            color[w] = Color::Gray;
                            stack.push((w, 0));
                        }
                        Color::Gray => return true,
                        Color::Black => {}
                    }
                } else {
                    color[v] = Color::Black;
                    stack.pop();
                }
            }
        }
        false
    }

    /// Enumerates all simple directed cycles, returning for each directed arc the number of
    /// cycles it participates in. Used by the orienter to pick the highest-count arc to
    /// reverse when breaking cycles.
    pub fn edge_cycle_counts(&self) -> HashMap<(usize, usize), usize> {
        let n = self.net.n();
        let mut counts: HashMap<(usize, usize), usize> = HashMap::new();
        // Enumerate simple cycles starting at each vertex `s`, only allowing intermediate
        // vertices >= s, so each cycle is counted from its minimum vertex exactly once.
        for s in 0..n {
            let mut path = vec![s];
            let mut on_path = vec![false; n];
            on_path[s] = true;
            self.extend_cycle(s, s, &mut path, &mut on_path, &mut counts);
        }
        counts
    }

    fn extend_cycle(
        &self,
        start: usize,
        current: usize,
        path: &mut Vec<usize>,
        on_path: &mut [bool],
        counts: &mut HashMap<(usize, usize), usize>,
    ) {
        for w in self.out_neighbors(current) {
            if w < start {
                continue;
            }
            if w == start && path.len() >= 2 {
                for i in 0..path.len() {
                    let a = path[i];
                    let b = path[(i + 1) % path.len()];
                    *counts.entry((a, b)).or_insert(0) += 1;
                }
                continue;
            }
            if on_path[w] {
                continue;
            }
            on_path[w] = true;
            path.push(w);
            self.extend_cycle(start, w, path, on_path, counts);
            path.pop();
            on_path[w] = false;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn net3() -> BayesianNetwork {
        BayesianNetwork::new(vec!["a".into(), "b".into(), "c".into()])
    }

    #[test]
    fn undirected_edge_has_both_arcs() {
        let mut net = net3();
        net.add_undirected_edge(0, 1).unwrap();
        assert!(net.is_undirected_edge(0, 1));
        assert!(net.is_adjacent(1, 0));
    }

    #[test]
    fn orient_edge_removes_reverse_arc() {
        let mut net = net3();
        net.add_undirected_edge(0, 1).unwrap();
        net.orient_edge(0, 1).unwrap();
        assert!(net.is_directed_edge(0, 1));
        assert!(!net.has_arc(1, 0));
    }

    #[test]
    fn detects_directed_cycle() {
        let mut net = net3();
        net.add_arc(0, 1).unwrap();
        net.add_arc(1, 2).unwrap();
        net.add_arc(2, 0).unwrap();
        assert!(net.directed_view().has_cycle());
    }

    #[test]
    fn undirected_edges_do_not_count_as_cycles() {
        let mut net = net3();
        net.add_undirected_edge(0, 1).unwrap();
        net.add_undirected_edge(1, 2).unwrap();
        net.add_undirected_edge(2, 0).unwrap();
        assert!(!net.directed_view().has_cycle());
    }

    #[test]
    fn edge_cycle_counts_for_a_triangle() {
        let mut net = net3();
        net.add_arc(0, 1).unwrap();
        net.add_arc(1, 2).unwrap();
        net.add_arc(2, 0).unwrap();
        let counts = net.directed_view().edge_cycle_counts();
        assert_eq!(counts.len(), 3);
        assert!(counts.values().all(|&c| c == 1));
    }
}
