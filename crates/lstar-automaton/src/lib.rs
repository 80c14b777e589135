//! Deterministic Mealy machines.
//!
//! States live in an arena (`Vec<StateData>`) owned by the [`MealyMachine`]
//! and are addressed by [`StateIndex`], rather than through shared
//! ownership — the graph is intrinsically cyclic, and an index-based arena
//! keeps construction, replay and traversal allocation-free once the arena
//! is filled.

mod builder;

pub use builder::MealyBuilder;

use itertools::Itertools;
use lstar_core::{Letter, Symbol, Word};
use std::collections::VecDeque;
use std::fmt;

/// Index of a state within a [`MealyMachine`]'s arena.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub struct StateIndex(pub usize);

impl fmt::Display for StateIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A single labelled transition: `input / output -> successor`.
#[derive(Clone, Debug)]
pub struct Transition<S: Symbol> {
    pub input: Letter<S>,
    pub output: Letter<S>,
    pub successor: StateIndex,
}

#[derive(Clone, Debug, Default)]
struct StateData<S: Symbol> {
    transitions: Vec<Transition<S>>,
}

/// A deterministic Mealy machine: states, labelled transitions, a
/// designated initial state. A *complete* machine (the only kind the
/// observation table ever extracts) has exactly one transition per input
/// letter of the alphabet, from every state.
#[derive(Clone, Debug)]
pub struct MealyMachine<S: Symbol> {
    name: String,
    alphabet: Vec<Letter<S>>,
    states: Vec<StateData<S>>,
    initial: StateIndex,
}

impl<S: Symbol> MealyMachine<S> {
    /// Creates an empty machine over the given alphabet. States and
    /// transitions are added with [`MealyMachine::add_state`] and
    /// [`MealyMachine::add_transition`]; `initial` is set once the state
    /// exists.
    pub fn new(name: impl Into<String>, alphabet: Vec<Letter<S>>) -> Self {
        Self {
            name: name.into(),
            alphabet,
            states: Vec::new(),
            initial: StateIndex(0),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn alphabet(&self) -> &[Letter<S>] {
        &self.alphabet
    }

    pub fn initial_state(&self) -> StateIndex {
        self.initial
    }

    pub fn set_initial_state(&mut self, state: StateIndex) {
        self.initial = state;
    }

    pub fn state_count(&self) -> usize {
        self.states.len()
    }

    pub fn states(&self) -> impl Iterator<Item = StateIndex> {
        (0..self.states.len()).map(StateIndex)
    }

    /// Allocates a fresh state with no outgoing transitions and returns its
    /// index.
    pub fn add_state(&mut self) -> StateIndex {
        self.states.push(StateData::default());
        StateIndex(self.states.len() - 1)
    }

    /// Adds a transition `state --input/output--> successor`. Does not
    /// check for determinism conflicts; callers that build machines by hand
    /// (tests, the hypothesis extractor) are expected to add at most one
    /// transition per input letter per state.
    pub fn add_transition(
        &mut self,
        state: StateIndex,
        input: Letter<S>,
        output: Letter<S>,
        successor: StateIndex,
    ) {
        self.states[state.0].transitions.push(Transition {
            input,
            output,
            successor,
        });
    }

    /// The transition out of `state` on `input`, if any.
    pub fn transition(&self, state: StateIndex, input: &Letter<S>) -> Option<&Transition<S>> {
        self.states[state.0]
            .transitions
            .iter()
            .find(|t| &t.input == input)
    }

    pub fn transitions(&self, state: StateIndex) -> impl Iterator<Item = &Transition<S>> {
        self.states[state.0].transitions.iter()
    }

    /// Whether every state has exactly one outgoing transition per letter
    /// of the alphabet.
    pub fn is_complete(&self) -> bool {
        self.states.iter().all(|s| {
            s.transitions.len() == self.alphabet.len()
                && self
                    .alphabet
                    .iter()
                    .all(|a| s.transitions.iter().filter(|t| &t.input == a).count() == 1)
        })
    }

    /// Replays `word` starting from `state`, returning the produced output
    /// word and the sequence of states visited (one per input letter,
    /// i.e. `trajectory[i]` is the state reached *after* consuming
    /// `word.letters()[i]`). Returns `None` if `word` is empty or if some
    /// letter along the way has no matching transition (an incomplete
    /// machine).
    pub fn replay_from(
        &self,
        word: &Word<S>,
        state: StateIndex,
    ) -> Option<(Word<S>, Vec<StateIndex>)> {
        if word.is_empty() {
            return None;
        }
        let mut current = state;
        let mut outputs = Vec::with_capacity(word.len());
        let mut trajectory = Vec::with_capacity(word.len());
        for letter in word.letters() {
            let transition = self.transition(current, letter)?;
            outputs.push(transition.output.clone());
            current = transition.successor;
            trajectory.push(current);
        }
        Some((Word::new(outputs), trajectory))
    }

    /// Replays `word` from the initial state.
    pub fn replay(&self, word: &Word<S>) -> Option<(Word<S>, Vec<StateIndex>)> {
        self.replay_from(word, self.initial)
    }

    /// Every state reachable from the initial state, in breadth-first
    /// order (the initial state is always first).
    pub fn reachable_states(&self) -> Vec<StateIndex> {
        let mut seen = vec![false; self.states.len()];
        let mut order = Vec::new();
        let mut queue = VecDeque::from([self.initial]);
        seen[self.initial.0] = true;
        while let Some(state) = queue.pop_front() {
            order.push(state);
            for transition in self.transitions(state) {
                let successor = transition.successor;
                if !seen[successor.0] {
                    seen[successor.0] = true;
                    queue.push_back(successor);
                }
            }
        }
        order
    }

    /// A shortest-path access word for every reachable state, keyed by
    /// `StateIndex`. Used by the bounded-distinguisher oracle to compute
    /// state representatives.
    pub fn access_words(&self) -> Vec<(StateIndex, Word<S>)> {
        let mut seen = vec![false; self.states.len()];
        let mut result = Vec::new();
        let mut queue = VecDeque::from([(self.initial, Word::epsilon())]);
        seen[self.initial.0] = true;
        while let Some((state, access)) = queue.pop_front() {
            result.push((state, access.clone()));
            for letter in &self.alphabet {
                if let Some(transition) = self.transition(state, letter) {
                    let successor = transition.successor;
                    if !seen[successor.0] {
                        seen[successor.0] = true;
                        let extended = if access == Word::epsilon() {
                            Word::single(letter.clone())
                        } else {
                            access.push(letter.clone())
                        };
                        queue.push_back((successor, extended));
                    }
                }
            }
        }
        result
    }
}

impl<S: Symbol + fmt::Display> MealyMachine<S> {
    /// A compact multi-line description, primarily for debugging: one line
    /// per transition, `state --input/output--> successor`.
    pub fn describe(&self) -> String {
        self.states()
            .flat_map(|s| self.transitions(s).map(move |t| (s, t)))
            .map(|(s, t)| format!("{s} --{}/{}-> {}", t.input, t.output, t.successor))
            .join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lstar_core::Letter;

    fn two_state_toggle() -> MealyMachine<char> {
        let alphabet = vec![Letter::new('a')];
        let mut m = MealyMachine::new("toggle", alphabet);
        let s0 = m.add_state();
        let s1 = m.add_state();
        m.add_transition(s0, Letter::new('a'), Letter::new('0'), s1);
        m.add_transition(s1, Letter::new('a'), Letter::new('1'), s0);
        m.set_initial_state(s0);
        m
    }

    #[test]
    fn replay_produces_expected_outputs() {
        let m = two_state_toggle();
        let word = Word::new(vec![Letter::new('a'), Letter::new('a'), Letter::new('a')]);
        let (output, trajectory) = m.replay(&word).unwrap();
        assert_eq!(output, Word::new(vec![Letter::new('0'), Letter::new('1'), Letter::new('0')]));
        assert_eq!(trajectory, vec![StateIndex(1), StateIndex(0), StateIndex(1)]);
    }

    #[test]
    fn replay_of_empty_word_is_none() {
        let m = two_state_toggle();
        assert!(m.replay(&Word::empty()).is_none());
    }

    #[test]
    fn reachable_states_covers_whole_machine() {
        let m = two_state_toggle();
        assert_eq!(m.reachable_states(), vec![StateIndex(0), StateIndex(1)]);
    }

    #[test]
    fn complete_machine_is_recognised() {
        let m = two_state_toggle();
        assert!(m.is_complete());
    }

    #[test]
    fn access_words_are_shortest() {
        let m = two_state_toggle();
        let access: std::collections::HashMap<_, _> = m.access_words().into_iter().collect();
        assert_eq!(access[&StateIndex(0)], Word::epsilon());
        assert_eq!(access[&StateIndex(1)], Word::single(Letter::new('a')));
    }
}
