//! The observation table: the learner's central workspace (spec.md §4.3).
//! Rows are indexed by `S ∪ SA` (short prefixes and their one-letter
//! extensions), columns by `D` (distinguishing suffixes); cell `(d, r)`
//! holds the last output letter of `r·d`.

use std::collections::HashMap;

use indexmap::{IndexMap, IndexSet};
use itertools::Itertools;
use lstar_automaton::{MealyMachine, StateIndex};
use lstar_core::{Letter, Query, Symbol, Word};
use tabled::builder::Builder as TableBuilder;
use tracing::{debug, info};

use crate::base::KnowledgeBase;
use crate::error::{LearningError, Result};
use crate::teacher::Teacher;

/// A row's content: one output letter per entry of `D`, in `D`'s order.
pub type Row<S> = Vec<Letter<S>>;

/// Witness of an inconsistency: two row-equal short prefixes `s1`/`s2`, the
/// input letter `a` whose one-letter extensions disagree, and the column
/// `d` where they disagree (spec.md §4.3.7).
#[derive(Clone, Debug)]
pub struct Inconsistency<S: Symbol> {
    pub s1: Word<S>,
    pub s2: Word<S>,
    pub letter: Letter<S>,
    pub column: Word<S>,
}

/// `D × (S ∪ SA) → output letter`.
#[derive(Clone, Debug, Default)]
struct Cells<S: Symbol> {
    values: HashMap<(Word<S>, Word<S>), Letter<S>>,
}

impl<S: Symbol> Cells<S> {
    fn get(&self, d: &Word<S>, r: &Word<S>) -> Option<&Letter<S>> {
        self.values.get(&(d.clone(), r.clone()))
    }

    fn set(&mut self, d: Word<S>, r: Word<S>, value: Letter<S>) {
        self.values.insert((d, r), value);
    }

    fn remove_row(&mut self, r: &Word<S>, columns: &[Word<S>]) {
        for d in columns {
            self.values.remove(&(d.clone(), r.clone()));
        }
    }
}

pub struct ObservationTable<S: Symbol> {
    alphabet: Vec<Letter<S>>,
    d: Vec<Word<S>>,
    s: IndexSet<Word<S>>,
    sa: IndexSet<Word<S>>,
    cells: Cells<S>,
    initialised: bool,
}

impl<S: Symbol> ObservationTable<S> {
    /// Creates an uninitialised table over `alphabet`. Call
    /// [`ObservationTable::initialise`] exactly once before use.
    pub fn new(alphabet: Vec<Letter<S>>) -> Self {
        Self {
            alphabet,
            d: Vec::new(),
            s: IndexSet::new(),
            sa: IndexSet::new(),
            cells: Cells::default(),
            initialised: false,
        }
    }

    pub fn alphabet(&self) -> &[Letter<S>] {
        &self.alphabet
    }

    pub fn short_prefixes(&self) -> impl Iterator<Item = &Word<S>> {
        self.s.iter()
    }

    pub fn extensions(&self) -> impl Iterator<Item = &Word<S>> {
        self.sa.iter()
    }

    pub fn distinguishing_suffixes(&self) -> &[Word<S>] {
        &self.d
    }

    /// One-shot initialisation: `D ← [⟨a⟩ for a in Σ]`, then S-insert `⟨ε⟩`
    /// (spec.md §4.3.1). Calling this a second time is a fault.
    pub fn initialise<T: Teacher<S>>(&mut self, kb: &mut KnowledgeBase<S, T>) -> Result<()> {
        if self.initialised {
            return Err(LearningError::InvalidArgument(
                "observation table is already initialised".into(),
            ));
        }
        self.initialised = true;
        info!(alphabet_size = self.alphabet.len(), "initialising observation table");

        for letter in self.alphabet.clone() {
            self.d_insert(Word::single(letter), kb)?;
        }
        self.s_insert(Word::epsilon(), kb)
    }

    /// `row(r) = (cells[d, r] for d in D)`.
    pub fn row(&self, r: &Word<S>) -> Row<S> {
        self.d
            .iter()
            .map(|d| {
                self.cells
                    .get(d, r)
                    .cloned()
                    .unwrap_or_else(|| panic!("cell ({d:?}, {r:?}) was never filled"))
            })
            .collect()
    }

    /// Whether every row in `SA` is matched by some row in `S`.
    pub fn is_closed(&self) -> bool {
        self.sa.iter().all(|r| {
            let row_r = self.row(r);
            self.s.iter().any(|s| self.row(s) == row_r)
        })
    }

    /// Closes the table: moves every row from `SA` to `S` that has no
    /// equivalent row already in `S`, repeating until a fixpoint (S-insertion
    /// re-expands the moved row's one-letter successors back into `SA`, so a
    /// single pass is not always enough).
    pub fn close<T: Teacher<S>>(&mut self, kb: &mut KnowledgeBase<S, T>) -> Result<()> {
        loop {
            let offender = self.sa.iter().find(|r| {
                let row_r = self.row(r);
                !self.s.iter().any(|s| self.row(s) == row_r)
            });
            let Some(offender) = offender.cloned() else {
                return Ok(());
            };
            debug!(row = ?offender, "closing: promoting row from SA to S");
            self.sa.shift_remove(&offender);
            self.s_insert(offender, kb)?;
        }
    }

    /// Returns the first inconsistency found, or `None` if the table is
    /// consistent (spec.md §4.3.7): a pair of row-equal short prefixes whose
    /// one-letter extensions disagree somewhere in `D`.
    pub fn find_inconsistency(&self) -> Option<Inconsistency<S>> {
        // An `IndexMap`, not a `HashMap`: its iteration order is insertion
        // order (which here follows `self.s`'s deterministic order), so the
        // inconsistency found first is the same across repeated runs
        // against the same teacher and table state (spec.md §5).
        let mut by_row: IndexMap<Row<S>, Vec<Word<S>>> = IndexMap::new();
        for s in &self.s {
            by_row.entry(self.row(s)).or_default().push(s.clone());
        }

        for equivalent in by_row.values().filter(|group| group.len() > 1) {
            for (s1, s2) in equivalent.iter().tuple_combinations() {
                for letter in &self.alphabet {
                    let r1 = s1.push(letter.clone());
                    let r2 = s2.push(letter.clone());
                    for d in &self.d {
                        let v1 = self.cells.get(d, &r1);
                        let v2 = self.cells.get(d, &r2);
                        if v1 != v2 {
                            return Some(Inconsistency {
                                s1: s1.clone(),
                                s2: s2.clone(),
                                letter: letter.clone(),
                                column: d.clone(),
                            });
                        }
                    }
                }
            }
        }
        None
    }

    /// Resolves `find_inconsistency`'s witness by D-inserting `⟨a⟩·d`,
    /// which strictly increases the number of distinct rows in `S`
    /// (spec.md §4.3.7, C2).
    pub fn make_consistent<T: Teacher<S>>(
        &mut self,
        kb: &mut KnowledgeBase<S, T>,
        inconsistency: Inconsistency<S>,
    ) -> Result<()> {
        let new_column = Word::single(inconsistency.letter) + inconsistency.column;
        debug!(column = ?new_column, "making table consistent");
        self.d_insert(new_column, kb)
    }

    /// Integrates a counter-example `(u_in, u_out)` of equal, non-zero
    /// length: every non-empty prefix of `u_in` not already in `S` is
    /// promoted into `S` (spec.md §4.3.8).
    pub fn integrate_counter_example<T: Teacher<S>>(
        &mut self,
        kb: &mut KnowledgeBase<S, T>,
        input_word: &Word<S>,
        output_word: &Word<S>,
    ) -> Result<()> {
        if input_word.is_empty() || output_word.is_empty() {
            return Err(LearningError::InvalidArgument(
                "counter-example words must be non-empty".into(),
            ));
        }
        if input_word.len() != output_word.len() {
            return Err(LearningError::InvalidArgument(
                "counter-example input/output words must have equal length".into(),
            ));
        }

        info!(input = ?input_word, "integrating counter-example");
        for prefix in input_word.prefixes() {
            if self.s.contains(&prefix) {
                continue;
            }
            if self.sa.shift_remove(&prefix) {
                self.cells.remove_row(&prefix, &self.d.clone());
            }
            self.s_insert(prefix, kb)?;
        }
        Ok(())
    }

    /// Extracts a hypothesis automaton from a closed, consistent table
    /// (spec.md §4.3.9). State names are stable arena indices
    /// ([`StateIndex`]), not row-content strings (spec.md §9, resolved open
    /// question).
    pub fn extract_hypothesis<T: Teacher<S>>(
        &self,
        kb: &mut KnowledgeBase<S, T>,
    ) -> Result<MealyMachine<S>> {
        let _ = kb; // extraction only reads already-filled cells
        let mut classes: Vec<(Row<S>, Vec<Word<S>>)> = Vec::new();
        for s in &self.s {
            let row_s = self.row(s);
            match classes.iter_mut().find(|(r, _)| r == &row_s) {
                Some((_, members)) => members.push(s.clone()),
                None => classes.push((row_s, vec![s.clone()])),
            }
        }

        let mut machine = MealyMachine::new("hypothesis", self.alphabet.clone());
        let mut state_of: HashMap<Row<S>, StateIndex> = HashMap::new();
        for (row, _) in &classes {
            state_of.insert(row.clone(), machine.add_state());
        }

        let mut initial = None;
        for (row, members) in &classes {
            if members.contains(&Word::epsilon()) {
                if initial.is_some() {
                    return Err(LearningError::HypothesisExtractionFault(
                        "multiple classes contain the epsilon prefix".into(),
                    ));
                }
                initial = Some(state_of[row]);
            }
        }
        let initial = initial.ok_or_else(|| {
            LearningError::HypothesisExtractionFault("no class contains the epsilon prefix".into())
        })?;
        machine.set_initial_state(initial);

        for (row, members) in &classes {
            let representative = &members[0];
            let from = state_of[row];
            for letter in &self.alphabet {
                let extended = representative.push(letter.clone());
                let successor_row = self.row(&extended);
                let to = *state_of.get(&successor_row).ok_or_else(|| {
                    LearningError::HypothesisExtractionFault(format!(
                        "no class found for successor row of {extended:?}"
                    ))
                })?;
                let output = self
                    .cells
                    .get(&Word::single(letter.clone()), representative)
                    .cloned()
                    .unwrap_or_else(|| panic!("cell for letter {letter:?} on {representative:?} was never filled"));
                machine.add_transition(from, letter.clone(), output, to);
            }
        }

        Ok(machine)
    }

    fn s_insert<T: Teacher<S>>(&mut self, w: Word<S>, kb: &mut KnowledgeBase<S, T>) -> Result<()> {
        if self.s.contains(&w) || self.sa.contains(&w) {
            return Err(LearningError::InvalidArgument(format!(
                "{w:?} is already registered in S or SA"
            )));
        }
        self.s.insert(w.clone());
        self.fill_row(&w, kb)?;

        for letter in self.alphabet.clone() {
            // `Word`'s concatenation absorbs a leading empty letter, so
            // `w.push(a)` already yields `⟨a⟩` when `w == ⟨ε⟩` (spec.md
            // §4.3.3's `w = ε ⇒ w' = ⟨a⟩` case falls out for free).
            let extended = w.push(letter);
            if !self.s.contains(&extended) {
                self.sa_insert(extended, kb)?;
            }
        }
        Ok(())
    }

    fn sa_insert<T: Teacher<S>>(&mut self, w: Word<S>, kb: &mut KnowledgeBase<S, T>) -> Result<()> {
        if self.s.contains(&w) || self.sa.contains(&w) {
            return Err(LearningError::InvalidArgument(format!(
                "{w:?} is already registered in S or SA"
            )));
        }
        self.sa.insert(w.clone());
        self.fill_row(&w, kb)
    }

    fn d_insert<T: Teacher<S>>(&mut self, v: Word<S>, kb: &mut KnowledgeBase<S, T>) -> Result<()> {
        if self.d.contains(&v) {
            return Err(LearningError::InvalidArgument(format!(
                "{v:?} is already registered in D"
            )));
        }
        self.d.push(v.clone());
        for r in self.s.iter().chain(self.sa.iter()).cloned().collect::<Vec<_>>() {
            self.fill_cell(&v, &r, kb)?;
        }
        Ok(())
    }

    fn fill_row<T: Teacher<S>>(&mut self, r: &Word<S>, kb: &mut KnowledgeBase<S, T>) -> Result<()> {
        for d in self.d.clone() {
            self.fill_cell(&d, r, kb)?;
        }
        Ok(())
    }

    fn fill_cell<T: Teacher<S>>(
        &mut self,
        d: &Word<S>,
        r: &Word<S>,
        kb: &mut KnowledgeBase<S, T>,
    ) -> Result<()> {
        let mut query = Query::new(r.clone() + d.clone());
        kb.resolve(&mut query)?;
        let output = query
            .output_word()
            .and_then(Word::last_letter)
            .cloned()
            .ok_or_else(|| LearningError::TeacherFailure("resolved query has no output".into()))?;
        self.cells.set(d.clone(), r.clone(), output);
        Ok(())
    }
}

impl<S: Symbol + std::fmt::Display> ObservationTable<S> {
    /// A human-readable dump of the table's full contents (spec.md
    /// §4.3.10); format is not normative, this one groups `S` above a
    /// `~~~` separator from `SA`, matching `pylstar.ObservationTable`'s own
    /// debug rendering.
    pub fn dump(&self) -> String {
        let mut builder = TableBuilder::default();
        let mut header = vec![String::new()];
        header.extend(self.d.iter().map(|d| d.to_string()));
        builder.push_record(header);

        for s in &self.s {
            let mut row = vec![s.to_string()];
            row.extend(self.row(s).iter().map(|l| l.to_string()));
            builder.push_record(row);
        }
        let mut separator = vec!["~~~".to_string()];
        separator.extend(self.d.iter().map(|_| "~~~".to_string()));
        builder.push_record(separator);
        for r in &self.sa {
            let mut row = vec![r.to_string()];
            row.extend(self.row(r).iter().map(|l| l.to_string()));
            builder.push_record(row);
        }

        builder.build().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::base::fixtures::FakeTeacher;
    use lstar_automaton::MealyBuilder;
    use lstar_core::Letter;

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

    fn new_table_kb(
        target: MealyMachine<&'static str>,
    ) -> (ObservationTable<&'static str>, KnowledgeBase<&'static str, FakeTeacher<&'static str>>) {
        let alphabet = target.alphabet().to_vec();
        let kb = KnowledgeBase::new(FakeTeacher::new(target));
        (ObservationTable::new(alphabet), kb)
    }

    #[test]
    fn initialise_seeds_epsilon_into_s() {
        let (mut table, mut kb) = new_table_kb(login_target());
        table.initialise(&mut kb).unwrap();
        assert!(table.short_prefixes().any(|s| *s == Word::epsilon()));
        assert_eq!(table.distinguishing_suffixes().len(), table.alphabet().len());
    }

    #[test]
    fn double_initialise_is_rejected() {
        let (mut table, mut kb) = new_table_kb(login_target());
        table.initialise(&mut kb).unwrap();
        assert!(table.initialise(&mut kb).is_err());
    }

    #[test]
    fn close_until_fixpoint_leaves_table_closed() {
        let (mut table, mut kb) = new_table_kb(login_target());
        table.initialise(&mut kb).unwrap();
        table.close(&mut kb).unwrap();
        assert!(table.is_closed());
    }

    #[test]
    fn stabilised_table_extracts_a_hypothesis() {
        let (mut table, mut kb) = new_table_kb(login_target());
        table.initialise(&mut kb).unwrap();
        loop {
            table.close(&mut kb).unwrap();
            match table.find_inconsistency() {
                Some(witness) => table.make_consistent(&mut kb, witness).unwrap(),
                None => break,
            }
        }
        let hypothesis = table.extract_hypothesis(&mut kb).unwrap();
        assert!(hypothesis.is_complete());
    }
}
