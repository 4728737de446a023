//! Lexically constrained beam search.
//!
//! Tracks, per beam hypothesis, which token phrases must appear (Include)
//! or must never appear (Avoid) in the generated output, and reselects the
//! beam each decoding step so it balances raw model score against
//! constraint progress:
//! - **Tries** index the constraint phrases; Avoid tries are immutable and
//!   shared, Include tries are persistent (copy-on-write pruning).
//! - **Automata** (`AvoidState`, `IncludeState`) walk a trie per
//!   hypothesis with pure transitions.
//! - **Batch trackers** (`AvoidBatch`, `IncludeBatch`) hold one automaton
//!   per flattened (batch item, beam slot) and support beam reordering.
//! - **Selection** (`topk`) merges scorer output with constraint-derived
//!   candidates and partitions the beam into banks by unmet-constraint
//!   count.

pub mod avoid;
pub mod bank;
pub mod include;
pub mod select;
pub mod trie;

pub use avoid::{AvoidBatch, AvoidState};
pub use bank::get_bank_sizes;
pub use include::{IncludeBatch, IncludeState};
pub use select::{mask_avoided, topk, topk_single, Candidate, Selection};
pub use trie::{AvoidTrie, IncludeTrie};
