//! The knowledge base: the query resolver layered over the knowledge tree
//! and the teacher (spec.md §4.2). Every membership query the learner
//! issues is routed through here; direct teacher calls are forbidden.

use lstar_core::{Query, Symbol, Word};
use tracing::{info, trace};

use crate::error::{LearningError, Result};
use crate::teacher::{bracketed, Teacher};
use crate::tree::KnowledgeTree;

/// Counters mirroring `pylstar.KnowledgeBaseStats`: how many resolutions
/// were served from the cache versus how many reached the teacher. Useful
/// for asserting the "at most one teacher invocation per distinct input
/// word" property (spec.md T5) without instrumenting the teacher itself.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct KnowledgeBaseStats {
    pub cache_hits: usize,
    pub teacher_invocations: usize,
}

/// Resolves [`Query`]s by consulting a [`KnowledgeTree`] cache and falling
/// back to a [`Teacher`] on a miss. Deterministic: the same input word
/// always yields the same output word for the lifetime of the base.
pub struct KnowledgeBase<S: Symbol, T: Teacher<S>> {
    tree: KnowledgeTree<S>,
    teacher: T,
    stats: KnowledgeBaseStats,
}

impl<S: Symbol, T: Teacher<S>> KnowledgeBase<S, T> {
    pub fn new(teacher: T) -> Self {
        Self {
            tree: KnowledgeTree::new(),
            teacher,
            stats: KnowledgeBaseStats::default(),
        }
    }

    /// Builds a knowledge base seeded with an already-populated tree, e.g.
    /// one restored from a cache file.
    pub fn with_tree(teacher: T, tree: KnowledgeTree<S>) -> Self {
        Self {
            tree,
            teacher,
            stats: KnowledgeBaseStats::default(),
        }
    }

    pub fn stats(&self) -> KnowledgeBaseStats {
        self.stats
    }

    pub fn tree(&self) -> &KnowledgeTree<S> {
        &self.tree
    }

    /// Serves `query` from the tree on a hit, or invokes the teacher inside
    /// a `start_target` / `stop_target` bracket on a miss. Leaves the tree
    /// untouched; callers finish the job by inserting the returned pair so
    /// the `persistence`-feature build can route it through
    /// [`KnowledgeTree`]'s auto-flushing `insert`.
    fn resolve_without_caching(&mut self, query: &mut Query<S>) -> Result<Option<(Word<S>, Word<S>)>> {
        if let Some(cached) = self.tree.lookup(query.input_word()) {
            trace!(input = ?query.input_word(), "knowledge base cache hit");
            self.stats.cache_hits += 1;
            query.set_output(cached);
            return Ok(None);
        }

        let input_word = query.input_word().clone();
        info!(input = ?input_word, "knowledge base cache miss, invoking teacher");
        let output_word = bracketed(&mut self.teacher, |t| t.submit_word(&input_word))?;

        if output_word.len() != input_word.len() {
            return Err(LearningError::TeacherFailure(format!(
                "teacher returned a word of length {} for an input of length {}",
                output_word.len(),
                input_word.len()
            )));
        }

        query.set_output(output_word.clone());
        Ok(Some((input_word, output_word)))
    }

    /// Resolves `query`, setting its output word (spec.md §4.2). Serves from
    /// the tree on a hit; on a miss, invokes the teacher and populates the
    /// tree with the result before returning it. If this base's tree has a
    /// cache file configured (see [`KnowledgeBase::with_cache_file`]), a
    /// teacher-populated insertion may trigger an auto-flush to it.
    pub fn resolve(&mut self, query: &mut Query<S>) -> Result<()> {
        if let Some((input_word, output_word)) = self.resolve_without_caching(query)? {
            self.tree.insert(&input_word, &output_word)?;
            self.stats.teacher_invocations += 1;
        }
        Ok(())
    }
}

#[cfg(feature = "persistence")]
impl<S: Symbol + serde::Serialize + serde::de::DeserializeOwned, T: Teacher<S>> KnowledgeBase<S, T> {
    /// Builds a knowledge base whose tree auto-flushes to `cache_file`
    /// every [`crate::tree::FLUSH_INTERVAL`] insertions, loading any
    /// existing cache at that path first (spec.md §4.1/§5).
    pub fn with_cache_file(teacher: T, cache_file: impl Into<std::path::PathBuf>) -> Result<Self> {
        let cache_file = cache_file.into();
        let mut tree = if cache_file.exists() {
            KnowledgeTree::load_cache(&cache_file, &[])?
        } else {
            KnowledgeTree::new()
        };
        tree.set_cache_file(cache_file);
        Ok(Self::with_tree(teacher, tree))
    }
}


#[cfg(test)]
mod tests {
    use super::fixtures::FakeTeacher;
    use super::*;
    use lstar_automaton::{MealyBuilder, MealyMachine};
    use lstar_core::{Letter, Word};

    fn toggle_target() -> MealyMachine<char> {
        MealyBuilder::new(vec![Letter::new('a')])
            .with_transitions([(0usize, 'a', '0', 1usize), (1, 'a', '1', 0)])
            .into_mealy(0)
    }

    #[test]
    fn cache_hit_invokes_teacher_at_most_once() {
        let mut base = KnowledgeBase::new(FakeTeacher::new(toggle_target()));
        let mut q1 = Query::new(Word::single(Letter::new('a')));
        base.resolve(&mut q1).unwrap();
        let mut q2 = Query::new(Word::single(Letter::new('a')));
        base.resolve(&mut q2).unwrap();

        assert_eq!(q1.output_word(), q2.output_word());
        assert_eq!(base.stats().teacher_invocations, 1);
        assert_eq!(base.stats().cache_hits, 1);
    }

    #[cfg(feature = "persistence")]
    #[test]
    fn with_cache_file_reloads_resolutions_across_bases() {
        let path = std::env::temp_dir().join(format!(
            "lstar-base-cachefile-{}.json",
            std::process::id()
        ));
        let _ = std::fs::remove_file(&path);

        {
            let mut base = KnowledgeBase::with_cache_file(toggle_target(), &path).unwrap();
            let mut q = Query::new(Word::single(Letter::new('a')));
            base.resolve(&mut q).unwrap();
            assert_eq!(base.stats().teacher_invocations, 1);
            base.tree().write_cache(&path).unwrap();
        }

        let mut reloaded = KnowledgeBase::with_cache_file(toggle_target(), &path).unwrap();
        let mut q = Query::new(Word::single(Letter::new('a')));
        reloaded.resolve(&mut q).unwrap();
        assert_eq!(reloaded.stats().teacher_invocations, 0);
        assert_eq!(reloaded.stats().cache_hits, 1);

        let _ = std::fs::remove_file(&path);
    }
}
