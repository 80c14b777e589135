//! Equivalence oracles: the Wp-method, the bounded-distinguisher method,
//! the random-walk method, and a composite that tries them in sequence
//! (spec.md §4.4). Each returns either `None` (the hypothesis looks
//! equivalent) or a counter-example query disagreeing with the target.

use std::collections::{HashSet, VecDeque};

use lstar_automaton::{MealyMachine, StateIndex};
use lstar_core::{Letter, Query, Symbol, Word};
use rand::seq::SliceRandom;
use rand::Rng;
use tracing::{debug, info, warn};

use crate::base::KnowledgeBase;
use crate::error::Result;
use crate::teacher::Teacher;

/// Common contract for every equivalence-testing strategy (spec.md §4.4).
pub trait EquivalenceOracle<S: Symbol, T: Teacher<S>> {
    fn find_counter_example(
        &mut self,
        hypothesis: &MealyMachine<S>,
        kb: &mut KnowledgeBase<S, T>,
    ) -> Result<Option<Query<S>>>;
}

fn resolve_word<S: Symbol, T: Teacher<S>>(
    kb: &mut KnowledgeBase<S, T>,
    word: Word<S>,
) -> Result<Query<S>> {
    let mut query = Query::new(word);
    kb.resolve(&mut query)?;
    Ok(query)
}

/// Breadth-first search for a word distinguishing hypothesis states `q1`
/// and `q2`, aborting after `bound` dequeues and falling back to `⟨ε⟩`
/// (spec.md §4.4.1, §9 — the fallback is a deliberate, documented
/// imprecision carried over from the source).
fn distinguishing_word<S: Symbol>(
    hypothesis: &MealyMachine<S>,
    q1: StateIndex,
    q2: StateIndex,
    bound: usize,
) -> Word<S> {
    let mut queue: VecDeque<Word<S>> = hypothesis
        .alphabet()
        .iter()
        .map(|a| Word::single(a.clone()))
        .collect();
    let mut dequeues = 0usize;
    while let Some(word) = queue.pop_front() {
        if dequeues >= bound {
            break;
        }
        dequeues += 1;

        let out1 = hypothesis.replay_from(&word, q1).map(|(o, _)| o);
        let out2 = hypothesis.replay_from(&word, q2).map(|(o, _)| o);
        if out1 != out2 {
            return word;
        }
        for a in hypothesis.alphabet() {
            queue.push_back(word.push(a.clone()));
        }
    }
    Word::epsilon()
}

/// Wp-method equivalence oracle, parameterised by an upper bound on the
/// target's state count (spec.md §4.4.1).
pub struct WpMethod {
    max_states: usize,
}

impl WpMethod {
    pub fn new(max_states: usize) -> Self {
        Self { max_states }
    }

    fn characterisation_set<S: Symbol>(&self, hypothesis: &MealyMachine<S>) -> Vec<Word<S>> {
        let states: Vec<StateIndex> = hypothesis.states().collect();
        let n = states.len();
        let bound = n * n;
        let mut w = Vec::new();
        for i in 0..states.len() {
            for j in (i + 1)..states.len() {
                w.push(distinguishing_word(hypothesis, states[i], states[j], bound));
            }
        }
        w
    }

    /// Transition cover `P`: one entry for `⟨ε⟩` (skipped when executing),
    /// then a BFS enumeration of one-letter extensions from every newly
    /// reached state.
    fn transition_cover<S: Symbol>(&self, hypothesis: &MealyMachine<S>) -> Vec<Word<S>> {
        let mut p = vec![Word::epsilon()];
        let mut seen: HashSet<StateIndex> = HashSet::from([hypothesis.initial_state()]);
        let mut open = VecDeque::from([Word::epsilon()]);

        while let Some(prefix) = open.pop_front() {
            let mut newly_seen = Vec::new();
            for letter in hypothesis.alphabet() {
                let extended = prefix.push(letter.clone());
                let (_, trajectory) = hypothesis
                    .replay(&extended)
                    .expect("hypothesis is complete, replay cannot fail");
                p.push(extended.clone());
                let reached = *trajectory.last().expect("non-empty word has a trajectory");
                if seen.insert(reached) {
                    newly_seen.push(extended);
                }
            }
            open.extend(newly_seen);
        }
        p
    }

    /// `Z = W ∪ X^1 ∪ … ∪ X^v`, `v = max(0, m − n)`, `X^{i+1} = { x·a·w : x
    /// ∈ X^i, a ∈ Σ, w ∈ W }` (spec.md §4.4.1). Each step is built with two
    /// rounds of [`Query::multiply`]: extending every word of `X^i` by a
    /// letter, then extending each of those by a `W`-suffix.
    fn z_set<S: Symbol>(&self, hypothesis: &MealyMachine<S>, w: &[Word<S>]) -> Vec<Word<S>> {
        let n = hypothesis.state_count();
        let v = self.max_states.saturating_sub(n);

        let letter_queries: Vec<Query<S>> = hypothesis
            .alphabet()
            .iter()
            .map(|a| Query::new(Word::single(a.clone())))
            .collect();
        let suffix_queries: Vec<Query<S>> = w.iter().cloned().map(Query::new).collect();

        let mut seen: HashSet<Word<S>> = w.iter().cloned().collect();
        let mut z: Vec<Word<S>> = w.to_vec();
        let mut previous: Vec<Query<S>> = suffix_queries.clone();

        for _ in 0..v {
            let mut current = Vec::new();
            for x in &previous {
                for xa in x.multiply(&letter_queries) {
                    current.extend(xa.multiply(&suffix_queries));
                }
            }
            for candidate in &current {
                let word = candidate.input_word().clone();
                if seen.insert(word.clone()) {
                    z.push(word);
                }
            }
            previous = current;
        }
        z
    }
}

impl<S: Symbol, T: Teacher<S>> EquivalenceOracle<S, T> for WpMethod {
    fn find_counter_example(
        &mut self,
        hypothesis: &MealyMachine<S>,
        kb: &mut KnowledgeBase<S, T>,
    ) -> Result<Option<Query<S>>> {
        let w = self.characterisation_set(hypothesis);
        let p = self.transition_cover(hypothesis);
        let z = self.z_set(hypothesis, &w);
        debug!(p_size = p.len(), z_size = z.len(), "Wp-method test suite computed");

        let test_cases = p.into_iter().chain(z).skip(1);
        for input_word in test_cases {
            let predicted = hypothesis
                .replay(&input_word)
                .expect("hypothesis is complete, replay cannot fail")
                .0;
            let observed = resolve_word(kb, input_word)?;
            if observed.output_word() != Some(&predicted) {
                info!(input = ?observed.input_word(), "Wp-method found a counter-example");
                return Ok(Some(observed));
            }
        }
        Ok(None)
    }
}

/// Bounded-distinguisher equivalence oracle, parameterised by a suffix
/// depth `k ≥ 1` (spec.md §4.4.2).
pub struct BoundedDistinguisher<S: Symbol> {
    depth: usize,
    suffixes: Vec<Word<S>>,
}

impl<S: Symbol> BoundedDistinguisher<S> {
    pub fn new(alphabet: &[Letter<S>], depth: usize) -> Self {
        assert!(depth >= 1, "bounded-distinguisher depth must be at least 1");
        let mut suffixes = Vec::new();
        let mut frontier: Vec<Word<S>> = alphabet.iter().map(|a| Word::single(a.clone())).collect();
        suffixes.extend(frontier.iter().cloned());
        for _ in 1..depth {
            let mut next = Vec::new();
            for word in &frontier {
                for a in alphabet {
                    next.push(word.push(a.clone()));
                }
            }
            suffixes.extend(next.iter().cloned());
            frontier = next;
        }
        Self { depth, suffixes }
    }

    pub fn depth(&self) -> usize {
        self.depth
    }
}

impl<S: Symbol, T: Teacher<S>> EquivalenceOracle<S, T> for BoundedDistinguisher<S> {
    fn find_counter_example(
        &mut self,
        hypothesis: &MealyMachine<S>,
        kb: &mut KnowledgeBase<S, T>,
    ) -> Result<Option<Query<S>>> {
        let representatives: Vec<(StateIndex, Word<S>)> = hypothesis.access_words();
        let rep_of = |state: StateIndex| -> Word<S> {
            representatives
                .iter()
                .find(|(s, _)| *s == state)
                .map(|(_, w)| w.clone())
                .expect("every state has a shortest-path representative")
        };

        for (state, _) in &representatives {
            let state = *state;
            for letter in hypothesis.alphabet() {
                let w_i = rep_of(state).push(letter.clone());
                let predicted = hypothesis
                    .replay_from(&Word::single(letter.clone()), state)
                    .expect("hypothesis is complete")
                    .0;
                let observed = resolve_word(kb, w_i.clone())?;
                if observed.output_word().and_then(Word::last_letter)
                    != predicted.last_letter()
                {
                    info!(input = ?w_i, "bounded-distinguisher found a counter-example");
                    return Ok(Some(observed));
                }

                let transition = hypothesis
                    .transition(state, letter)
                    .expect("hypothesis is complete");
                let successor = transition.successor;
                let w_i_prime = rep_of(successor);
                if w_i == w_i_prime {
                    continue;
                }

                for suffix in &self.suffixes {
                    let query_i = resolve_word(kb, w_i.clone() + suffix.clone())?;
                    let query_i_prime = resolve_word(kb, w_i_prime.clone() + suffix.clone())?;
                    if query_i.output_word().and_then(Word::last_letter)
                        != query_i_prime.output_word().and_then(Word::last_letter)
                    {
                        let expected_i = hypothesis
                            .replay(&(w_i.clone() + suffix.clone()))
                            .expect("hypothesis is complete")
                            .0;
                        let counter_example = if query_i.output_word() != Some(&expected_i) {
                            query_i
                        } else {
                            query_i_prime
                        };
                        info!(input = ?counter_example.input_word(), "bounded-distinguisher found a counter-example");
                        return Ok(Some(counter_example));
                    }
                }
            }
        }
        Ok(None)
    }
}

/// Random-walk equivalence oracle, parameterised by a step budget and a
/// per-step restart probability (spec.md §4.4.3).
pub struct RandomWalk<R: Rng> {
    max_steps: usize,
    restart_probability: f64,
    rng: R,
}

impl RandomWalk<rand::rngs::ThreadRng> {
    pub fn new(max_steps: usize, restart_probability: f64) -> Self {
        Self::with_rng(max_steps, restart_probability, rand::thread_rng())
    }
}

impl<R: Rng> RandomWalk<R> {
    pub fn with_rng(max_steps: usize, restart_probability: f64, rng: R) -> Self {
        Self {
            max_steps,
            restart_probability,
            rng,
        }
    }
}

impl<S: Symbol, T: Teacher<S>, R: Rng> EquivalenceOracle<S, T> for RandomWalk<R> {
    fn find_counter_example(
        &mut self,
        hypothesis: &MealyMachine<S>,
        kb: &mut KnowledgeBase<S, T>,
    ) -> Result<Option<Query<S>>> {
        let mut current = hypothesis.initial_state();
        let mut acc_in = Word::empty();
        let mut acc_out = Word::empty();
        let mut just_restarted = true;

        for _ in 0..self.max_steps {
            if !just_restarted && self.rng.gen_bool(self.restart_probability) {
                if !acc_in.is_empty() {
                    match resolve_word(kb, acc_in.clone()) {
                        Ok(observed) => {
                            if observed.output_word() != Some(&acc_out) {
                                info!(input = ?observed.input_word(), "random walk found a counter-example");
                                return Ok(Some(observed));
                            }
                        }
                        Err(error) => {
                            warn!(%error, "random walk treating teacher failure as a forced restart");
                        }
                    }
                }
                current = hypothesis.initial_state();
                acc_in = Word::empty();
                acc_out = Word::empty();
            }
            just_restarted = false;

            let transitions: Vec<_> = hypothesis.transitions(current).collect();
            let chosen = transitions
                .choose(&mut self.rng)
                .expect("complete hypothesis has at least one transition per state");
            acc_in = acc_in.push(chosen.input.clone());
            acc_out = acc_out.push(chosen.output.clone());
            current = chosen.successor;
        }
        Ok(None)
    }
}

/// Tries an ordered list of oracles in sequence, returning the first
/// non-null counter-example (spec.md §4.4.4).
pub struct Composite<S: Symbol, T: Teacher<S>> {
    oracles: Vec<Box<dyn EquivalenceOracle<S, T>>>,
}

impl<S: Symbol, T: Teacher<S>> Composite<S, T> {
    pub fn new(oracles: Vec<Box<dyn EquivalenceOracle<S, T>>>) -> Self {
        Self { oracles }
    }
}

impl<S: Symbol, T: Teacher<S>> EquivalenceOracle<S, T> for Composite<S, T> {
    fn find_counter_example(
        &mut self,
        hypothesis: &MealyMachine<S>,
        kb: &mut KnowledgeBase<S, T>,
    ) -> Result<Option<Query<S>>> {
        for (i, oracle) in self.oracles.iter_mut().enumerate() {
            debug!(oracle_index = i, "composite oracle trying next strategy");
            if let Some(counter_example) = oracle.find_counter_example(hypothesis, kb)? {
                return Ok(Some(counter_example));
            }
        }
        Ok(None)
    }
}
