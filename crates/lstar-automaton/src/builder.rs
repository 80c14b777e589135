use std::collections::HashMap;

use lstar_core::{Letter, Symbol};

use crate::{MealyMachine, StateIndex};

/// A small fluent builder for constructing [`MealyMachine`] test fixtures,
/// in the spirit of a transition-system builder: states are named with an
/// arbitrary `N` (usually `usize` or `&str`) and transitions are added as
/// `(from, input, output, to)` tuples; `into_mealy` resolves names to
/// `StateIndex`es and fixes the initial state.
pub struct MealyBuilder<N, S: Symbol> {
    alphabet: Vec<Letter<S>>,
    state_names: Vec<N>,
    transitions: Vec<(N, Letter<S>, Letter<S>, N)>,
}

impl<N, S> MealyBuilder<N, S>
where
    N: Clone + Eq + std::hash::Hash,
    S: Symbol,
{
    pub fn new(alphabet: Vec<Letter<S>>) -> Self {
        Self {
            alphabet,
            state_names: Vec::new(),
            transitions: Vec::new(),
        }
    }

    /// Declares a state. Calling this for a name that already exists is a
    /// no-op; states referenced only by `with_transitions` are declared
    /// implicitly.
    pub fn with_state(mut self, name: N) -> Self {
        if !self.state_names.contains(&name) {
            self.state_names.push(name);
        }
        self
    }

    pub fn with_transition(mut self, from: N, input: S, output: S, to: N) -> Self {
        self.transitions
            .push((from, Letter::new(input), Letter::new(output), to));
        self
    }

    pub fn with_transitions(
        mut self,
        transitions: impl IntoIterator<Item = (N, S, S, N)>,
    ) -> Self {
        for (from, input, output, to) in transitions {
            self.transitions
                .push((from, Letter::new(input), Letter::new(output), to));
        }
        self
    }

    /// Resolves names into a concrete [`MealyMachine`] with `initial` as
    /// its initial state. Panics if `initial`, or any state referenced by a
    /// transition, was never declared — this is a test-fixture helper, not
    /// a public construction API, so a panic on misuse is acceptable.
    pub fn into_mealy(self, initial: N) -> MealyMachine<S> {
        let mut names = self.state_names;
        for (from, _, _, to) in &self.transitions {
            if !names.contains(from) {
                names.push(from.clone());
            }
            if !names.contains(to) {
                names.push(to.clone());
            }
        }
        if !names.contains(&initial) {
            names.push(initial.clone());
        }

        let mut machine = MealyMachine::new("fixture", self.alphabet);
        let mut index_of: HashMap<N, StateIndex> = HashMap::new();
        for name in &names {
            index_of.insert(name.clone(), machine.add_state());
        }

        for (from, input, output, to) in self.transitions {
            let from_idx = *index_of
                .get(&from)
                .expect("transition source state must be declared");
            let to_idx = *index_of
                .get(&to)
                .expect("transition target state must be declared");
            machine.add_transition(from_idx, input, output, to_idx);
        }

        let initial_idx = *index_of
            .get(&initial)
            .expect("initial state must be declared");
        machine.set_initial_state(initial_idx);
        machine
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_resolves_names_to_indices() {
        let machine: MealyMachine<char> = MealyBuilder::new(vec![Letter::new('a'), Letter::new('b')])
            .with_transitions([
                (0usize, 'a', 'x', 1usize),
                (0, 'b', 'y', 0),
                (1, 'a', 'x', 1),
                (1, 'b', 'y', 0),
            ])
            .into_mealy(0);

        assert_eq!(machine.state_count(), 2);
        assert!(machine.is_complete());
        let (output, _) = machine
            .replay(&lstar_core::Word::new(vec![Letter::new('a'), Letter::new('b')]))
            .unwrap();
        assert_eq!(
            output,
            lstar_core::Word::new(vec![Letter::new('x'), Letter::new('y')])
        );
    }
}
