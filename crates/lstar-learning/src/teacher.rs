use lstar_core::{Symbol, Word};

use crate::error::Result;

/// The abstract minimally-adequate teacher: the process or peer that
/// answers membership queries for the target system. Implementations wrap
/// whatever channel reaches the real target (a subprocess, a TCP socket, an
/// in-memory automaton for tests); the learning core never talks to the
/// target except through this trait, and always through a
/// [`crate::base::KnowledgeBase`].
pub trait Teacher<S: Symbol> {
    /// Called once before a burst of `submit_word` calls, e.g. to reset the
    /// target to its initial state. Implementations that are always ready
    /// (pure functions, in-memory fixtures) may no-op.
    fn start_target(&mut self) -> Result<()> {
        Ok(())
    }

    /// Called after a burst of `submit_word` calls, whether or not they
    /// succeeded. Callers MUST invoke this even when `submit_word` returns
    /// an error, to release whatever resource `start_target` acquired.
    fn stop_target(&mut self) -> Result<()> {
        Ok(())
    }

    /// Submits `word` to the target and returns its output word. The
    /// output must have the same length as the input; implementations that
    /// talk to a flaky channel should pad with empty letters rather than
    /// return a short word. Errors propagate as [`crate::error::LearningError::TeacherFailure`].
    fn submit_word(&mut self, word: &Word<S>) -> Result<Word<S>>;
}

/// Runs `f` bracketed by `start_target`/`stop_target`, guaranteeing
/// `stop_target` runs even if `start_target` succeeded but `f` failed.
/// If `start_target` itself fails, `stop_target` is not invoked.
pub fn bracketed<S, T, R>(teacher: &mut T, f: impl FnOnce(&mut T) -> Result<R>) -> Result<R>
where
    S: Symbol,
    T: Teacher<S> + ?Sized,
{
    teacher.start_target()?;
    let result = f(teacher);
    let stop_result = teacher.stop_target();
    let result = result?;
    stop_result?;
    Ok(result)
}
