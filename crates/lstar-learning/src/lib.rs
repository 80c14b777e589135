//! Active automaton learning: the observation table, the knowledge
//! tree/base that cache and serve membership queries, the equivalence
//! oracles that hunt for counter-examples, and the driver loop tying
//! them together into one run of L* for Mealy machines.

mod base;
mod error;
mod learner;
mod oracle;
mod table;
mod teacher;
mod tree;

pub use base::{KnowledgeBase, KnowledgeBaseStats};
pub use error::{LearningError, Result};
pub use learner::{Learner, StopFlag};
pub use oracle::{BoundedDistinguisher, Composite, EquivalenceOracle, RandomWalk, WpMethod};
pub use table::{Inconsistency, ObservationTable, Row};
pub use teacher::{bracketed, Teacher};
pub use tree::KnowledgeTree;

#[cfg(feature = "persistence")]
pub use tree::FLUSH_INTERVAL;
