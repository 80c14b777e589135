//! The learner driver: the loop tying the observation table, the
//! knowledge base, and an equivalence oracle together (spec.md §4.5).

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use lstar_automaton::MealyMachine;
use lstar_core::{Letter, Symbol};
use tracing::{debug, info};

use crate::base::KnowledgeBase;
use crate::error::Result;
use crate::oracle::EquivalenceOracle;
use crate::table::ObservationTable;
use crate::teacher::Teacher;

/// A cooperative cancellation flag, cloneable so callers can hold one end
/// and request a stop from another thread or signal handler while the
/// learner runs synchronously on its own. Consulted only at the top of
/// the loop in [`Learner::run`] (spec.md §5).
#[derive(Clone, Default)]
pub struct StopFlag(Arc<AtomicBool>);

impl StopFlag {
    pub fn new() -> Self {
        Self(Arc::new(AtomicBool::new(false)))
    }

    pub fn stop(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_stopped(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Drives one run of L* to a fixpoint: initialises the table once, then
/// alternates stabilisation, hypothesis extraction, and equivalence
/// testing until the oracle finds nothing left to disprove or a stop is
/// requested.
pub struct Learner<S: Symbol, T: Teacher<S>, O: EquivalenceOracle<S, T>> {
    table: ObservationTable<S>,
    kb: KnowledgeBase<S, T>,
    oracle: O,
    stop_flag: StopFlag,
}

impl<S: Symbol, T: Teacher<S>, O: EquivalenceOracle<S, T>> Learner<S, T, O> {
    pub fn new(alphabet: Vec<Letter<S>>, kb: KnowledgeBase<S, T>, oracle: O) -> Self {
        Self {
            table: ObservationTable::new(alphabet),
            kb,
            oracle,
            stop_flag: StopFlag::new(),
        }
    }

    /// A clone of this learner's stop flag; calling [`StopFlag::stop`] on
    /// it requests that [`Learner::run`] return after its current loop
    /// iteration.
    pub fn stop_flag(&self) -> StopFlag {
        self.stop_flag.clone()
    }

    pub fn table(&self) -> &ObservationTable<S> {
        &self.table
    }

    pub fn knowledge_base(&self) -> &KnowledgeBase<S, T> {
        &self.kb
    }

    /// Repeatedly closes and fixes consistency until the table is both
    /// closed and consistent (spec.md §4.5 step 2a). Terminates because
    /// every step strictly grows the number of distinct rows in `S`,
    /// bounded by the target's Nerode equivalence.
    fn stabilise(&mut self) -> Result<()> {
        loop {
            self.table.close(&mut self.kb)?;
            match self.table.find_inconsistency() {
                Some(witness) => {
                    debug!("resolving inconsistency before re-closing");
                    self.table.make_consistent(&mut self.kb, witness)?;
                }
                None => return Ok(()),
            }
        }
    }

    /// Runs the full loop and returns the final hypothesis: the one the
    /// equivalence oracle accepted, or the most recent one if a stop was
    /// requested first.
    ///
    /// The table must be both closed and consistent before a hypothesis
    /// can be extracted at all, so the first stabilise/extract pass always
    /// runs once before the stop flag is consulted; from then on the flag
    /// is checked at the top of every further iteration, per spec.
    pub fn run(&mut self) -> Result<MealyMachine<S>> {
        self.table.initialise(&mut self.kb)?;
        self.stabilise()?;
        let mut hypothesis = self.table.extract_hypothesis(&mut self.kb)?;
        info!(states = hypothesis.state_count(), "extracted hypothesis");

        loop {
            if self.stop_flag.is_stopped() {
                info!("stop requested, returning current hypothesis");
                return Ok(hypothesis);
            }

            match self.oracle.find_counter_example(&hypothesis, &mut self.kb)? {
                None => return Ok(hypothesis),
                Some(counter_example) => {
                    let input_word = counter_example.input_word().clone();
                    let output_word = counter_example
                        .output_word()
                        .cloned()
                        .expect("counter-example returned by an oracle is always resolved");
                    info!(input = ?input_word, "integrating counter-example, resuming learning");
                    self.table
                        .integrate_counter_example(&mut self.kb, &input_word, &output_word)?;

                    self.stabilise()?;
                    hypothesis = self.table.extract_hypothesis(&mut self.kb)?;
                    info!(states = hypothesis.state_count(), "extracted hypothesis");
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::base::fixtures::FakeTeacher;
    use crate::oracle::WpMethod;
    use lstar_automaton::MealyBuilder;
    use lstar_core::Letter;

    fn cyclic_target() -> MealyMachine<char> {
        MealyBuilder::new(vec![Letter::new('a'), Letter::new('b'), Letter::new('c')])
            .with_transitions([
                (0usize, 'a', '1', 0usize),
                (0, 'b', '2', 1),
                (0, 'c', '3', 2),
                (1, 'a', '2', 1),
                (1, 'b', '3', 1),
                (1, 'c', '1', 0),
                (2, 'a', '2', 2),
                (2, 'b', '3', 2),
                (2, 'c', '1', 1),
            ])
            .into_mealy(0)
    }

    fn login_target() -> MealyMachine<&'static str> {
        MealyBuilder::new(vec![
            Letter::new("hello"),
            Letter::new("bye"),
            Letter::new("pass_valid"),
            Letter::new("pass_invalid"),
            Letter::new("cmd1"),
            Letter::new("cmd2"),
        ])
        .with_transitions([
            ("unauth", "hello", "pass?", "await_pw"),
            ("unauth", "bye", "ack", "unauth"),
            ("unauth", "pass_valid", "error", "unauth"),
            ("unauth", "pass_invalid", "error", "unauth"),
            ("unauth", "cmd1", "error", "unauth"),
            ("unauth", "cmd2", "error", "unauth"),
            ("await_pw", "hello", "error", "await_pw"),
            ("await_pw", "bye", "ack", "unauth"),
            ("await_pw", "pass_valid", "welcome", "auth"),
            ("await_pw", "pass_invalid", "error", "await_pw"),
            ("await_pw", "cmd1", "error", "await_pw"),
            ("await_pw", "cmd2", "error", "await_pw"),
            ("auth", "hello", "error", "auth"),
            ("auth", "bye", "ack", "unauth"),
            ("auth", "pass_valid", "error", "auth"),
            ("auth", "pass_invalid", "error", "auth"),
            ("auth", "cmd1", "ack", "auth"),
            ("auth", "cmd2", "ack", "auth"),
        ])
        .into_mealy("unauth")
    }

    #[test]
    fn learns_the_cyclic_target_to_completion() {
        let alphabet = cyclic_target().alphabet().to_vec();
        let kb = KnowledgeBase::new(FakeTeacher::new(cyclic_target()));
        let mut learner = Learner::new(alphabet, kb, WpMethod::new(5));

        let hypothesis = learner.run().unwrap();
        assert!(hypothesis.is_complete());
        assert_eq!(hypothesis.state_count(), 3);
    }

    #[test]
    fn learns_the_login_protocol_to_completion() {
        let alphabet = login_target().alphabet().to_vec();
        let kb = KnowledgeBase::new(FakeTeacher::new(login_target()));
        let mut learner = Learner::new(alphabet, kb, WpMethod::new(5));

        let hypothesis = learner.run().unwrap();
        assert!(hypothesis.is_complete());
        assert_eq!(hypothesis.state_count(), 3);
    }

    #[test]
    fn stopping_before_run_returns_a_table_shaped_hypothesis_immediately() {
        let alphabet = cyclic_target().alphabet().to_vec();
        let kb = KnowledgeBase::new(FakeTeacher::new(cyclic_target()));
        let mut learner = Learner::new(alphabet, kb, WpMethod::new(5));
        learner.stop_flag().stop();

        let hypothesis = learner.run().unwrap();
        assert!(hypothesis.state_count() >= 1);
    }
}
