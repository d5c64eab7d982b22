//! Dependency analysis and stratification

use std::collections::HashMap;

/// Relation dependency graph: an edge `head -> body` for every body atom
#[derive(Debug, Default)]
pub struct DependencyGraph {
    nodes: Vec<String>,
    index: HashMap<String, usize>,
    edges: Vec<Vec<Dependency>>,
}

#[derive(Debug, Clone, Copy)]
pub struct Dependency {
    pub target: usize,
    pub negative: bool,
    /// Index of the rule that introduced the edge
    pub rule: usize,
}

impl DependencyGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn node(&mut self, name: &str) -> usize {
        if let Some(&idx) = self.index.get(name) {
            return idx;
        }
        let idx = self.nodes.len();
        self.nodes.push(name.to_string());
        self.index.insert(name.to_string(), idx);
        self.edges.push(Vec::new());
        idx
    }

    pub fn add_dependency(&mut self, head: &str, body: &str, negative: bool, rule: usize) {
        let from = self.node(head);
        let target = self.node(body);
        self.edges[from].push(Dependency {
            target,
            negative,
            rule,
        });
    }

    pub fn name(&self, node: usize) -> &str {
        &self.nodes[node]
    }

    pub fn dependencies(&self, node: usize) -> &[Dependency] {
        &self.edges[node]
    }

    /// Strongly connected components, dependencies before dependents
    ///
    /// Tarjan's algorithm emits a component only after every component it
    /// depends on, which is exactly evaluation order for `head -> body` edges.
    pub fn strongly_connected_components(&self) -> Vec<Vec<usize>> {
        struct State {
            counter: usize,
            index: Vec<Option<usize>>,
            lowlink: Vec<usize>,
            on_stack: Vec<bool>,
            stack: Vec<usize>,
            components: Vec<Vec<usize>>,
        }

        fn visit(graph: &DependencyGraph, v: usize, state: &mut State) {
            state.index[v] = Some(state.counter);
            state.lowlink[v] = state.counter;
            state.counter += 1;
            state.stack.push(v);
            state.on_stack[v] = true;

            for dep in &graph.edges[v] {
                let w = dep.target;
                match state.index[w] {
                    None => {
                        visit(graph, w, state);
                        state.lowlink[v] = state.lowlink[v].min(state.lowlink[w]);
                    }
                    Some(w_index) if state.on_stack[w] => {
                        state.lowlink[v] = state.lowlink[v].min(w_index);
                    }
                    Some(_) => {}
                }
            }

            if Some(state.lowlink[v]) == state.index[v] {
                let mut component = Vec::new();
                while let Some(w) = state.stack.pop() {
                    state.on_stack[w] = false;
                    component.push(w);
                    if w == v {
                        break;
                    }
                }
                component.sort_unstable();
                state.components.push(component);
            }
        }

        let n = self.nodes.len();
        let mut state = State {
            counter: 0,
            index: vec![None; n],
            lowlink: vec![0; n],
            on_stack: vec![false; n],
            stack: Vec::new(),
            components: Vec::new(),
        };
        for v in 0..n {
            if state.index[v].is_none() {
                visit(self, v, &mut state);
            }
        }
        state.components
    }

    /// Whether a component depends on itself
    pub fn is_recursive(&self, component: &[usize]) -> bool {
        component.len() > 1
            || component
                .first()
                .map(|&v| self.edges[v].iter().any(|d| d.target == v))
                .unwrap_or(false)
    }

    /// First negative edge that stays inside the component, if any
    pub fn negative_cycle_edge(&self, component: &[usize]) -> Option<(usize, Dependency)> {
        component.iter().find_map(|&v| {
            self.edges[v]
                .iter()
                .find(|d| d.negative && component.contains(&d.target))
                .map(|d| (v, *d))
        })
    }
}
