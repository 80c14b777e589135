//! Graph-description export for learned automata: a DOT string naming
//! states, marking the initial state distinctly, and labelling each
//! transition `input / output`. Purely for inspection — nothing in the
//! learning core ever parses this output back.

use std::fmt::Write as _;

use lstar_automaton::MealyMachine;
use lstar_core::Symbol;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum RenderError {
    #[error("cannot render a machine with no states")]
    EmptyMachine,
}

/// A rendered DOT graph description. Wraps the string so callers can't
/// confuse it with an arbitrary `String` at a function boundary.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GraphvizSource(String);

impl GraphvizSource {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl std::fmt::Display for GraphvizSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Renders `machine` as a DOT `digraph`. States are named `Q<index>`; the
/// initial state is drawn as a `doubleoctagon`, every other state as an
/// `ellipse`; each transition is labelled `input / output`.
pub fn render<S: Symbol + std::fmt::Display>(
    machine: &MealyMachine<S>,
) -> Result<GraphvizSource, RenderError> {
    if machine.state_count() == 0 {
        return Err(RenderError::EmptyMachine);
    }

    let mut dot = String::new();
    writeln!(dot, "digraph \"{}\" {{", machine.name()).expect("writing to a String never fails");

    for state in machine.states() {
        let shape = if state == machine.initial_state() {
            "doubleoctagon"
        } else {
            "ellipse"
        };
        writeln!(
            dot,
            "  \"Q{state}\" [shape={shape}, style=filled, fillcolor=white];"
        )
        .expect("writing to a String never fails");
    }

    for state in machine.states() {
        for transition in machine.transitions(state) {
            writeln!(
                dot,
                "  \"Q{state}\" -> \"Q{}\" [fontsize=10, label=\"{} / {}\"];",
                transition.successor, transition.input, transition.output
            )
            .expect("writing to a String never fails");
        }
    }

    dot.push('}');
    Ok(GraphvizSource(dot))
}

#[cfg(test)]
mod tests {
    use super::*;
    use lstar_automaton::MealyBuilder;
    use lstar_core::Letter;

    fn toggle() -> MealyMachine<char> {
        MealyBuilder::new(vec![Letter::new('a')])
            .with_transitions([(0usize, 'a', '0', 1usize), (1, 'a', '1', 0)])
            .into_mealy(0)
    }

    #[test]
    fn render_marks_the_initial_state_distinctly() {
        let dot = render(&toggle()).unwrap();
        assert!(dot.as_str().contains("\"Q0\" [shape=doubleoctagon"));
        assert!(dot.as_str().contains("\"Q1\" [shape=ellipse"));
    }

    #[test]
    fn render_labels_every_transition_with_input_and_output() {
        let dot = render(&toggle()).unwrap();
        assert!(dot.as_str().contains("label=\"a / 0\""));
        assert!(dot.as_str().contains("label=\"a / 1\""));
    }

    #[test]
    fn render_wraps_the_graph_name_in_a_digraph_header() {
        let dot = render(&toggle()).unwrap();
        assert!(dot.as_str().starts_with("digraph \"fixture\" {"));
        assert!(dot.as_str().trim_end().ends_with('}'));
    }

    #[test]
    fn render_rejects_a_machine_with_no_states() {
        let empty = MealyMachine::<char>::new("empty", vec![Letter::new('a')]);
        assert!(matches!(render(&empty), Err(RenderError::EmptyMachine)));
    }
}
