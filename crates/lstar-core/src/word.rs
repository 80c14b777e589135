use std::fmt;
use std::ops::Add;

use crate::{Letter, Symbol};

/// An ordered sequence of letters. Equality is sequence equality.
///
/// The empty letter plays double duty: `Word::epsilon()` is the one-letter
/// word `⟨ε⟩` used to seed `S` (see the observation table's invariant I4),
/// while `Word::empty()` is the genuine zero-length sequence used as a
/// neutral accumulator (e.g. by the random-walk oracle). Concatenating
/// anything onto `Word::epsilon()` drops the leading empty letter, so
/// `Word::epsilon() + w == w`.
#[derive(Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Word<S: Symbol> {
    letters: Vec<Letter<S>>,
}

impl<S: Symbol> Word<S> {
    /// Builds a word from a sequence of letters, normalising a leading
    /// empty letter away whenever more letters follow it.
    pub fn new(letters: impl IntoIterator<Item = Letter<S>>) -> Self {
        let mut letters: Vec<_> = letters.into_iter().collect();
        if letters.len() > 1 && letters[0].is_epsilon() {
            letters.remove(0);
        }
        Self { letters }
    }

    /// The genuine zero-length word, used as a neutral accumulator.
    pub fn empty() -> Self {
        Self { letters: Vec::new() }
    }

    /// The one-letter word `⟨ε⟩`, used to seed `S` in the observation table.
    pub fn epsilon() -> Self {
        Self {
            letters: vec![Letter::epsilon()],
        }
    }

    /// A word made of a single non-empty letter.
    pub fn single(letter: Letter<S>) -> Self {
        Self::new([letter])
    }

    pub fn letters(&self) -> &[Letter<S>] {
        &self.letters
    }

    pub fn len(&self) -> usize {
        self.letters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.letters.is_empty()
    }

    /// The last letter, if any.
    pub fn last_letter(&self) -> Option<&Letter<S>> {
        self.letters.last()
    }

    /// Every non-empty prefix of this word, shortest first.
    pub fn prefixes(&self) -> impl Iterator<Item = Word<S>> + '_ {
        (1..=self.letters.len()).map(move |n| Word::new(self.letters[..n].to_vec()))
    }

    /// Appends a single letter, returning a new word.
    pub fn push(&self, letter: Letter<S>) -> Self {
        self.clone() + Word::single(letter)
    }
}

impl<S: Symbol> Add for Word<S> {
    type Output = Word<S>;

    /// Concatenates two words. A leading empty letter in `self` is dropped,
    /// so the empty letter behaves as the identity `ε`.
    fn add(self, other: Word<S>) -> Word<S> {
        let mut letters = self.letters;
        if letters.first().is_some_and(Letter::is_epsilon) {
            letters.remove(0);
        }
        letters.extend(other.letters);
        Self { letters }
    }
}

impl<S: Symbol> Add for &Word<S> {
    type Output = Word<S>;

    fn add(self, other: &Word<S>) -> Word<S> {
        self.clone() + other.clone()
    }
}

impl<S: Symbol> fmt::Debug for Word<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[")?;
        for (i, letter) in self.letters.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{letter:?}")?;
        }
        write!(f, "]")
    }
}

impl<S: Symbol + fmt::Display> fmt::Display for Word<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.letters.is_empty() {
            return write!(f, "ε");
        }
        let rendered = self
            .letters
            .iter()
            .map(|l| l.to_string())
            .collect::<Vec<_>>()
            .join(".");
        write!(f, "{rendered}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn w(symbols: &[char]) -> Word<char> {
        Word::new(symbols.iter().map(|&c| Letter::new(c)))
    }

    #[test]
    fn concatenation_drops_leading_epsilon() {
        let eps = Word::<char>::epsilon();
        let ab = w(&['a', 'b']);
        assert_eq!(eps + ab.clone(), ab);
    }

    #[test]
    fn concatenation_is_append_otherwise() {
        let ab = w(&['a', 'b']);
        let cd = w(&['c', 'd']);
        assert_eq!(ab + cd, w(&['a', 'b', 'c', 'd']));
    }

    #[test]
    fn prefixes_are_nonempty_and_ordered() {
        let abc = w(&['a', 'b', 'c']);
        let prefixes: Vec<_> = abc.prefixes().collect();
        assert_eq!(prefixes, vec![w(&['a']), w(&['a', 'b']), w(&['a', 'b', 'c'])]);
    }

    #[test]
    fn length_counts_letters() {
        assert_eq!(Word::<char>::epsilon().len(), 1);
        assert_eq!(Word::<char>::empty().len(), 0);
        assert_eq!(w(&['a', 'b']).len(), 2);
    }
}
