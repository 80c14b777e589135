//! The knowledge tree: a prefix tree of observed `(input_word, output_word)`
//! pairs, keyed by input letters, with the output letter observed at each
//! prefix stored on the node. This is the membership cache behind the
//! knowledge base (spec.md §4.1).

#[cfg(feature = "persistence")]
use std::path::PathBuf;

use lstar_core::{Letter, Symbol, Word};
use tracing::{debug, trace};

use crate::error::{LearningError, Result};

/// One node of the tree: the input/output letter pair observed at this
/// position, plus children keyed by their input letter. Invariant: among a
/// node's children there is at most one child per distinct input letter.
#[derive(Clone, Debug)]
#[cfg_attr(feature = "persistence", derive(serde::Serialize, serde::Deserialize))]
struct KnowledgeNode<S: Symbol> {
    input_letter: Letter<S>,
    output_letter: Letter<S>,
    children: Vec<KnowledgeNode<S>>,
}

impl<S: Symbol> KnowledgeNode<S> {
    fn new(input_letter: Letter<S>, output_letter: Letter<S>) -> Self {
        Self {
            input_letter,
            output_letter,
            children: Vec::new(),
        }
    }

    fn child_mut(&mut self, input_letter: &Letter<S>) -> Option<&mut KnowledgeNode<S>> {
        self.children.iter_mut().find(|c| &c.input_letter == input_letter)
    }

    fn child(&self, input_letter: &Letter<S>) -> Option<&KnowledgeNode<S>> {
        self.children.iter().find(|c| &c.input_letter == input_letter)
    }

    /// Inserts the remaining suffix of `(input, output)` letters starting
    /// at this node's child level. Returns an error if a matching child
    /// already exists with a different output letter.
    fn insert(&mut self, input: &[Letter<S>], output: &[Letter<S>]) -> Result<()> {
        let (next_in, next_out) = (&input[0], &output[0]);
        match self.child_mut(next_in) {
            Some(existing) if &existing.output_letter != next_out => {
                return Err(LearningError::CacheConflict {
                    input: format!("{next_in:?}"),
                    previous: format!("{:?}", existing.output_letter),
                    attempted: format!("{next_out:?}"),
                });
            }
            Some(existing) => {
                if input.len() > 1 {
                    existing.insert(&input[1..], &output[1..])?;
                }
            }
            None => {
                let mut node = KnowledgeNode::new(next_in.clone(), next_out.clone());
                if input.len() > 1 {
                    node.insert(&input[1..], &output[1..])?;
                }
                trace!(input = ?next_in, output = ?next_out, "creating knowledge node");
                self.children.push(node);
            }
        }
        Ok(())
    }

    /// Follows the remaining suffix of `input` starting at this node's
    /// child level, collecting the output letter at each step.
    fn lookup(&self, input: &[Letter<S>], out: &mut Vec<Letter<S>>) -> bool {
        let Some(child) = self.child(&input[0]) else {
            return false;
        };
        out.push(child.output_letter.clone());
        if input.len() == 1 {
            return true;
        }
        child.lookup(&input[1..], out)
    }
}

/// A flush routine bound to a specific `S`, captured once (at the point a
/// cache file is configured, where `S: Serialize` is known to hold) so that
/// [`KnowledgeTree::insert`] can trigger it without itself requiring `S` to
/// be serialisable. An ordinary function pointer, not a closure: it never
/// needs to capture anything beyond the path and the tree's own roots.
#[cfg(feature = "persistence")]
type FlushFn<S> = fn(&std::path::Path, &[KnowledgeNode<S>]) -> Result<()>;

/// The membership cache: a set of prefix trees, one root per distinct
/// first input letter seen. Guarantees at most one teacher invocation per
/// distinct input word over its lifetime, once routed through
/// [`crate::base::KnowledgeBase`].
#[derive(Clone, Debug, Default)]
#[cfg_attr(feature = "persistence", derive(serde::Serialize, serde::Deserialize))]
pub struct KnowledgeTree<S: Symbol> {
    roots: Vec<KnowledgeNode<S>>,
    #[cfg_attr(feature = "persistence", serde(skip))]
    inserts_since_flush: usize,
    #[cfg(feature = "persistence")]
    #[serde(skip)]
    cache_file: Option<PathBuf>,
    #[cfg(feature = "persistence")]
    #[serde(skip)]
    flush_fn: Option<FlushFn<S>>,
}

impl<S: Symbol> KnowledgeTree<S> {
    #[cfg(not(feature = "persistence"))]
    pub fn new() -> Self {
        Self {
            roots: Vec::new(),
            inserts_since_flush: 0,
        }
    }

    #[cfg(feature = "persistence")]
    pub fn new() -> Self {
        Self {
            roots: Vec::new(),
            inserts_since_flush: 0,
            cache_file: None,
            flush_fn: None,
        }
    }

    /// Looks up `input_word`, returning the output word observed for it, or
    /// `None` on a cache miss (spec.md's internal `PathNotFound`, which
    /// never surfaces past this point — see `error::LearningError`'s doc
    /// comment).
    pub fn lookup(&self, input_word: &Word<S>) -> Option<Word<S>> {
        let letters = input_word.letters();
        if letters.is_empty() {
            return None;
        }
        let root = self.roots.iter().find(|r| &r.input_letter == &letters[0])?;
        let mut out = vec![root.output_letter.clone()];
        if letters.len() > 1 && !root.lookup(&letters[1..], &mut out) {
            return None;
        }
        Some(Word::new(out))
    }

    /// Inserts `(input_word, output_word)`. Both words must be non-empty
    /// and of equal length. A path that already exists is left untouched
    /// if its outputs match; a mismatch anywhere along the shared prefix
    /// is a [`LearningError::CacheConflict`] and leaves the tree unchanged
    /// past the matching prefix (the first conflicting node is never
    /// created). Once a cache file has been configured via
    /// [`KnowledgeTree::set_cache_file`], every [`FLUSH_INTERVAL`]th
    /// insertion auto-flushes the tree's full contents to it (spec.md
    /// §4.1/§5).
    pub fn insert(&mut self, input_word: &Word<S>, output_word: &Word<S>) -> Result<()> {
        let input = input_word.letters();
        let output = output_word.letters();
        if input.is_empty() || output.is_empty() {
            return Err(LearningError::InvalidArgument(
                "input and output words must be non-empty".into(),
            ));
        }
        if input.len() != output.len() {
            return Err(LearningError::InvalidArgument(format!(
                "input word has length {} but output word has length {}",
                input.len(),
                output.len()
            )));
        }

        match self.roots.iter_mut().find(|r| r.input_letter == input[0]) {
            Some(root) if root.output_letter != output[0] => {
                return Err(LearningError::CacheConflict {
                    input: format!("{:?}", input[0]),
                    previous: format!("{:?}", root.output_letter),
                    attempted: format!("{:?}", output[0]),
                });
            }
            Some(root) => {
                if input.len() > 1 {
                    root.insert(&input[1..], &output[1..])?;
                }
            }
            None => {
                let mut root = KnowledgeNode::new(input[0].clone(), output[0].clone());
                if input.len() > 1 {
                    root.insert(&input[1..], &output[1..])?;
                }
                debug!(input = ?input[0], "creating new knowledge tree root");
                self.roots.push(root);
            }
        }

        self.inserts_since_flush += 1;

        #[cfg(feature = "persistence")]
        {
            if self.inserts_since_flush >= persistence::FLUSH_INTERVAL {
                if let (Some(path), Some(flush)) = (self.cache_file.clone(), self.flush_fn) {
                    flush(&path, &self.roots)?;
                    self.inserts_since_flush = 0;
                }
            }
        }

        Ok(())
    }

    /// Number of successful insertions since the tree was created (or since
    /// the last call to [`KnowledgeTree::reset_flush_counter`]). Used by the
    /// cache file writer to decide when to flush (every 100 insertions, see
    /// spec.md §5).
    pub fn inserts_since_flush(&self) -> usize {
        self.inserts_since_flush
    }

    pub fn reset_flush_counter(&mut self) {
        self.inserts_since_flush = 0;
    }
}

#[cfg(feature = "persistence")]
mod persistence {
    use std::fs;
    use std::path::{Path, PathBuf};

    use super::{FlushFn, KnowledgeNode, KnowledgeTree};
    use crate::error::{LearningError, Result};
    use lstar_core::Symbol;

    /// How many insertions accumulate before [`KnowledgeTree::insert`]
    /// triggers an automatic flush through a configured cache file (see
    /// [`KnowledgeTree::set_cache_file`] and
    /// `crate::base::KnowledgeBase::with_cache_file`). Matches
    /// `pylstar.KnowledgeTree`'s modulus.
    pub const FLUSH_INTERVAL: usize = 100;

    fn write_roots_json<S: Symbol + serde::Serialize>(
        path: &Path,
        roots: &[KnowledgeNode<S>],
    ) -> Result<()> {
        if path.exists() {
            fs::remove_file(path).map_err(|e| {
                LearningError::InvalidArgument(format!("could not remove stale cache file: {e}"))
            })?;
        }
        let json = serde_json::to_string_pretty(roots).map_err(|e| {
            LearningError::InvalidArgument(format!("could not serialise knowledge tree: {e}"))
        })?;
        fs::write(path, json)
            .map_err(|e| LearningError::InvalidArgument(format!("could not write cache file: {e}")))
    }

    impl<S: Symbol> KnowledgeTree<S> {
        pub fn cache_file(&self) -> Option<&Path> {
            self.cache_file.as_deref()
        }
    }

    impl<S: Symbol + serde::Serialize> KnowledgeTree<S> {
        /// Configures the file this tree auto-flushes its full contents to
        /// every [`FLUSH_INTERVAL`] insertions via [`KnowledgeTree::insert`].
        /// Without a configured file, `insert` never writes to disk on its
        /// own; callers can always call [`KnowledgeTree::write_cache`]
        /// directly instead.
        pub fn set_cache_file(&mut self, path: impl Into<PathBuf>) {
            self.cache_file = Some(path.into());
            self.flush_fn = Some(write_roots_json::<S> as FlushFn<S>);
        }

        /// Serialises the tree's full contents to `path` directly, removing
        /// any previous file first (remove-then-write, per spec.md §5).
        pub fn write_cache(&self, path: &Path) -> Result<()> {
            write_roots_json(path, &self.roots)
        }
    }

    impl<S: Symbol + serde::Serialize + serde::de::DeserializeOwned> KnowledgeTree<S> {
        /// Loads a tree previously written by [`KnowledgeTree::write_cache`],
        /// remembering `path` as its cache file so future insertions keep
        /// flushing back to the same place.
        /// The `possible_letters` argument exists in `pylstar`'s API to
        /// canonicalise deserialised letter references against a known
        /// alphabet; since letters here carry their own symbol sets and
        /// compare structurally, no canonicalisation pass is needed — the
        /// parameter is accepted for interface parity and ignored.
        pub fn load_cache(path: &Path, _possible_letters: &[lstar_core::Letter<S>]) -> Result<Self> {
            let content = fs::read_to_string(path).map_err(|e| {
                LearningError::InvalidArgument(format!("could not read cache file: {e}"))
            })?;
            let roots = serde_json::from_str(&content).map_err(|e| {
                LearningError::InvalidArgument(format!("could not parse cache file: {e}"))
            })?;
            Ok(Self {
                roots,
                inserts_since_flush: 0,
                cache_file: Some(path.to_path_buf()),
                flush_fn: Some(write_roots_json::<S> as FlushFn<S>),
            })
        }
    }
}

#[cfg(feature = "persistence")]
pub use persistence::FLUSH_INTERVAL;

#[cfg(test)]
mod tests {
    use super::*;
    use lstar_core::Letter;

    fn word(symbols: &[char]) -> Word<char> {
        Word::new(symbols.iter().map(|&c| Letter::new(c)))
    }

    #[test]
    fn insert_then_lookup_roundtrips() {
        let mut tree = KnowledgeTree::new();
        tree.insert(&word(&['a', 'b']), &word(&['1', '2'])).unwrap();
        assert_eq!(tree.lookup(&word(&['a', 'b'])), Some(word(&['1', '2'])));
    }

    #[test]
    fn lookup_miss_is_none() {
        let tree: KnowledgeTree<char> = KnowledgeTree::new();
        assert_eq!(tree.lookup(&word(&['a'])), None);
    }

    #[test]
    fn repeated_insert_of_same_pair_is_a_noop() {
        let mut tree = KnowledgeTree::new();
        tree.insert(&word(&['a', 'b']), &word(&['1', '2'])).unwrap();
        tree.insert(&word(&['a', 'b']), &word(&['1', '2'])).unwrap();
        assert_eq!(tree.lookup(&word(&['a', 'b'])), Some(word(&['1', '2'])));
    }

    #[test]
    fn conflicting_insert_is_rejected_and_tree_is_unchanged() {
        let mut tree = KnowledgeTree::new();
        tree.insert(&word(&['a', 'b']), &word(&['1', '2'])).unwrap();
        let err = tree.insert(&word(&['a', 'b']), &word(&['1', '1']));
        assert!(matches!(err, Err(LearningError::CacheConflict { .. })));
        assert_eq!(tree.lookup(&word(&['a', 'b'])), Some(word(&['1', '2'])));
    }

    #[test]
    fn length_mismatch_is_invalid_argument() {
        let mut tree = KnowledgeTree::new();
        let err = tree.insert(&word(&['a', 'b']), &word(&['1']));
        assert!(matches!(err, Err(LearningError::InvalidArgument(_))));
    }

    #[test]
    fn shared_prefix_of_longer_path_is_legal() {
        let mut tree = KnowledgeTree::new();
        tree.insert(&word(&['a', 'b', 'c']), &word(&['1', '2', '3'])).unwrap();
        tree.insert(&word(&['a', 'b']), &word(&['1', '2'])).unwrap();
        assert_eq!(tree.lookup(&word(&['a', 'b'])), Some(word(&['1', '2'])));
        assert_eq!(tree.lookup(&word(&['a', 'b', 'c'])), Some(word(&['1', '2', '3'])));
    }

    #[test]
    fn single_letter_insert_creates_or_matches_a_root() {
        let mut tree = KnowledgeTree::new();
        tree.insert(&word(&['a']), &word(&['1'])).unwrap();
        assert_eq!(tree.lookup(&word(&['a'])), Some(word(&['1'])));
    }
}

#[cfg(all(test, feature = "persistence"))]
mod persistence_tests {
    use super::*;
    use lstar_core::Letter;
    use std::fs;

    fn word(symbols: &[char]) -> Word<char> {
        Word::new(symbols.iter().map(|&c| Letter::new(c)))
    }

    fn scratch_path(name: &str) -> std::path::PathBuf {
        std::env::temp_dir().join(format!("lstar-tree-{name}-{}.json", std::process::id()))
    }

    #[test]
    fn insert_auto_flushes_once_flush_interval_is_reached() {
        let path = scratch_path("autoflush");
        let _ = fs::remove_file(&path);

        let mut tree = KnowledgeTree::new();
        tree.set_cache_file(&path);
        for i in 0..FLUSH_INTERVAL {
            let second = char::from_u32(0x100 + i as u32).unwrap();
            tree.insert(&word(&['a', second]), &word(&['1', '2'])).unwrap();
        }

        assert_eq!(tree.inserts_since_flush(), 0);
        assert!(path.exists());

        let _ = fs::remove_file(&path);
    }

    #[test]
    fn without_a_configured_cache_file_insert_never_writes_to_disk() {
        let mut tree: KnowledgeTree<char> = KnowledgeTree::new();
        for i in 0..FLUSH_INTERVAL {
            let second = char::from_u32(0x100 + i as u32).unwrap();
            tree.insert(&word(&['a', second]), &word(&['1', '2'])).unwrap();
        }
        assert_eq!(tree.inserts_since_flush(), FLUSH_INTERVAL);
        assert_eq!(tree.cache_file(), None);
    }

    #[test]
    fn load_cache_remembers_its_path_for_future_flushes() {
        let path = scratch_path("roundtrip");
        let _ = fs::remove_file(&path);

        let mut tree = KnowledgeTree::new();
        tree.insert(&word(&['a', 'b']), &word(&['1', '2'])).unwrap();
        tree.write_cache(&path).unwrap();

        let loaded: KnowledgeTree<char> = KnowledgeTree::load_cache(&path, &[]).unwrap();
        assert_eq!(loaded.cache_file(), Some(path.as_path()));
        assert_eq!(loaded.lookup(&word(&['a', 'b'])), Some(word(&['1', '2'])));

        let _ = fs::remove_file(&path);
    }
}
