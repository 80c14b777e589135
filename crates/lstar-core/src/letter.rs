use std::collections::BTreeSet;
use std::fmt;

use crate::Symbol;

/// A letter wraps a set of symbols. Two letters are equal iff their symbol
/// sets are equal. The **empty letter** (`Letter::epsilon()`) is the letter
/// with an empty symbol set; it acts as the identity for word concatenation
/// and stands for the empty word when it prefixes one.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Letter<S: Symbol> {
    symbols: BTreeSet<S>,
}

impl<S: Symbol> Letter<S> {
    /// Creates a letter carrying a single symbol.
    pub fn new(symbol: S) -> Self {
        Self {
            symbols: BTreeSet::from([symbol]),
        }
    }

    /// Creates a letter carrying the given set of symbols.
    pub fn from_symbols(symbols: impl IntoIterator<Item = S>) -> Self {
        Self {
            symbols: symbols.into_iter().collect(),
        }
    }

    /// The distinguished empty letter: an empty symbol set, the identity for
    /// concatenation and the one-letter representation of the empty word.
    pub fn epsilon() -> Self {
        Self {
            symbols: BTreeSet::new(),
        }
    }

    /// Whether this is the empty letter.
    pub fn is_epsilon(&self) -> bool {
        self.symbols.is_empty()
    }

    /// The symbols carried by this letter, in canonical (sorted) order.
    pub fn symbols(&self) -> impl Iterator<Item = &S> {
        self.symbols.iter()
    }
}

impl<S: Symbol> fmt::Debug for Letter<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_epsilon() {
            return write!(f, "EmptyLetter");
        }
        write!(f, "Letter(")?;
        let mut first = true;
        for symbol in &self.symbols {
            if !first {
                write!(f, ",")?;
            }
            write!(f, "{symbol:?}")?;
            first = false;
        }
        write!(f, ")")
    }
}

impl<S: Symbol + fmt::Display> fmt::Display for Letter<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_epsilon() {
            return write!(f, "ε");
        }
        let rendered = self
            .symbols
            .iter()
            .map(|s| s.to_string())
            .collect::<Vec<_>>()
            .join(",");
        write!(f, "{rendered}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn equality_is_symbol_set_equality() {
        assert_eq!(Letter::new('a'), Letter::new('a'));
        assert_ne!(Letter::new('a'), Letter::new('b'));
        assert_ne!(Letter::new('a'), Letter::<char>::epsilon());
    }

    #[test]
    fn epsilon_has_no_symbols() {
        let eps = Letter::<&str>::epsilon();
        assert!(eps.is_epsilon());
        assert_eq!(eps.symbols().count(), 0);
    }

    #[test]
    fn debug_distinguishes_empty_letter() {
        assert_eq!(format!("{:?}", Letter::<i32>::epsilon()), "EmptyLetter");
        assert_eq!(format!("{:?}", Letter::new(1)), "Letter(1)");
    }
}
