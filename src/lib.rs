//! Permap provide a family of persistent ordered collections for
//! key,value data, along with one mutable companion.
//!
//! * [Rbt], an immutable red-black tree. Every write returns a new
//!   tree sharing all untouched subtrees with its input, older
//!   versions stay valid and can be read from any number of threads.
//! * [Map], a persistent ordered map over [Rbt] with set-theoretic
//!   operations, effectful traversal and unfolding.
//! * [DelayMap], the lazy-value variant of [Map]. Values are
//!   memoizing suspensions, see [Thunk], forced at most once and only
//!   when a read needs them.
//! * [Deque], a double-ended queue over a power-of-two ring buffer
//!   with amortized O(1) pushes and pops on both ends.
//!
//! Bulk walks over large trees, mapping, counting, minimum/maximum
//! selection and forcing a whole [DelayMap], run as pure fork/join on
//! a process-wide worker pool. Parallel results are identical to their
//! sequential counterparts, see the `parallel` module constants for
//! the dispatch thresholds.

pub mod delay_map;
mod depth;
pub mod deque;
mod error;
pub mod map;
mod parallel;
pub mod rbt;
mod thunk;
mod types;

pub use crate::delay_map::DelayMap;
pub use crate::depth::Depth;
pub use crate::deque::Deque;
pub use crate::error::{Error, Result};
pub use crate::map::Map;
pub use crate::parallel::{PAR_MULT, PAR_THRESHOLD};
pub use crate::rbt::{Rbt, Stats};
pub use crate::thunk::Thunk;
pub use crate::types::Empty;
