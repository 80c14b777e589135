use std::fmt;

use crate::{Symbol, Word};

/// A membership/equivalence query: an input word paired with the output
/// word the teacher produced for it, if any. A query is "resolved" once its
/// output word is set; the output must then have the same length as the
/// input (padding with empty letters is the teacher's responsibility, see
/// the `Teacher` contract in `lstar-learning`).
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Query<S: Symbol> {
    input_word: Word<S>,
    output_word: Option<Word<S>>,
}

impl<S: Symbol> Query<S> {
    /// Creates a fresh, unresolved query over the given input word.
    pub fn new(input_word: Word<S>) -> Self {
        Self {
            input_word,
            output_word: None,
        }
    }

    /// Creates an already-resolved query.
    pub fn resolved(input_word: Word<S>, output_word: Word<S>) -> Self {
        Self {
            input_word,
            output_word: Some(output_word),
        }
    }

    pub fn input_word(&self) -> &Word<S> {
        &self.input_word
    }

    pub fn output_word(&self) -> Option<&Word<S>> {
        self.output_word.as_ref()
    }

    pub fn is_queried(&self) -> bool {
        self.output_word.is_some()
    }

    /// Sets the output word for this query. The caller is responsible for
    /// ensuring `output.len() == self.input_word.len()`.
    pub fn set_output(&mut self, output: Word<S>) {
        self.output_word = Some(output);
    }

    /// Produces the cross-concatenation of this query's input word with the
    /// input word of every query in `others`, in order. Used to enumerate
    /// test suites (e.g. the Wp-method's `X^{i+1}` construction).
    pub fn multiply(&self, others: &[Query<S>]) -> Vec<Query<S>> {
        others
            .iter()
            .map(|other| Query::new(self.input_word.clone() + other.input_word.clone()))
            .collect()
    }
}

impl<S: Symbol> fmt::Debug for Query<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Query(I = {:?}, O = {:?})", self.input_word, self.output_word)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Letter;

    fn word(symbols: &[char]) -> Word<char> {
        Word::new(symbols.iter().map(|&c| Letter::new(c)))
    }

    #[test]
    fn fresh_query_is_unresolved() {
        let q = Query::new(word(&['a']));
        assert!(!q.is_queried());
    }

    #[test]
    fn resolving_sets_output() {
        let mut q = Query::new(word(&['a']));
        q.set_output(word(&['1']));
        assert!(q.is_queried());
        assert_eq!(q.output_word(), Some(&word(&['1'])));
    }

    #[test]
    fn multiply_concatenates_input_words() {
        let base = Query::new(word(&['a']));
        let others = vec![Query::new(word(&['b'])), Query::new(word(&['c']))];
        let products = base.multiply(&others);
        assert_eq!(
            products.into_iter().map(|q| q.input_word().clone()).collect::<Vec<_>>(),
            vec![word(&['a', 'b']), word(&['a', 'c'])]
        );
    }
}
