//! Avoid-side constraint tracking: a per-hypothesis automaton over an
//! [`AvoidTrie`] and the batched tracker holding one automaton per
//! flattened (batch item, beam slot).

use std::collections::BTreeSet;
use std::sync::Arc;

use lexbeam_core::{validate_phrases, LexbeamError, RawPhraseList, Result, PAD_ID};
use tracing::debug;

use crate::trie::AvoidTrie;

/// State of one hypothesis in an avoid trie: the shared root plus the node
/// reached by the longest phrase prefix matching the hypothesis suffix.
#[derive(Debug, Clone)]
pub struct AvoidState {
    root: Arc<AvoidTrie>,
    node: Arc<AvoidTrie>,
}

impl AvoidState {
    pub fn new(root: Arc<AvoidTrie>) -> Self {
        Self {
            node: Arc::clone(&root),
            root,
        }
    }

    /// Pure transition for one generated token.
    ///
    /// Advance along a child edge of the current node if one exists;
    /// otherwise restart from a root child if the token begins a phrase;
    /// otherwise fall back to the root. Already at the root with no match,
    /// the state is returned unchanged.
    pub fn consume(&self, token: u32) -> AvoidState {
        if let Some(child) = self.node.step(token) {
            AvoidState {
                root: Arc::clone(&self.root),
                node: Arc::clone(child),
            }
        } else if let Some(child) = self.root.step(token) {
            AvoidState {
                root: Arc::clone(&self.root),
                node: Arc::clone(child),
            }
        } else if !Arc::ptr_eq(&self.node, &self.root) {
            AvoidState::new(Arc::clone(&self.root))
        } else {
            self.clone()
        }
    }

    /// Tokens that must not be generated next. Root terminals are standing
    /// single-token bans; current terminals would complete an in-progress
    /// phrase. May yield duplicates when the state sits at the root.
    pub fn avoid(&self) -> impl Iterator<Item = u32> + '_ {
        self.root
            .final_ids()
            .iter()
            .chain(self.node.final_ids().iter())
            .copied()
    }
}

/// Avoid automata for a whole batch.
///
/// Two coexisting layers: an optional global trie replicated across every
/// slot, and per-sentence tries replicated across that sentence's beam.
pub struct AvoidBatch {
    global_states: Vec<AvoidState>,
    local_states: Vec<AvoidState>,
}

impl AvoidBatch {
    pub fn new(
        batch_size: usize,
        beam_size: usize,
        vocab_size: usize,
        avoid_list: Option<&[RawPhraseList]>,
        global_trie: Option<Arc<AvoidTrie>>,
    ) -> Result<Self> {
        let mut global_states = Vec::new();
        if let Some(trie) = global_trie {
            global_states = vec![AvoidState::new(trie); batch_size * beam_size];
        }

        let mut local_states = Vec::new();
        if let Some(avoid_list) = avoid_list {
            if avoid_list.len() != batch_size {
                return Err(LexbeamError::ShapeMismatch {
                    expected: batch_size,
                    got: avoid_list.len(),
                });
            }
            for phrases in avoid_list {
                validate_phrases(phrases, Some(vocab_size))?;
                let trie = Arc::new(AvoidTrie::from_phrases(phrases)?);
                local_states
                    .extend(std::iter::repeat_with(|| AvoidState::new(Arc::clone(&trie))).take(beam_size));
            }
        }

        debug!(batch_size, beam_size, "avoid tracker initialized");
        Ok(Self {
            global_states,
            local_states,
        })
    }

    /// Gather states by new beam positions. Duplicate indices are expected
    /// and harmless since transitions are pure. An out-of-bounds index is
    /// an internal invariant violation and panics.
    pub fn reorder(&mut self, indices: &[usize]) {
        for states in [&mut self.global_states, &mut self.local_states] {
            if states.is_empty() {
                continue;
            }
            assert_eq!(indices.len(), states.len(), "reorder index count mismatch");
            let gathered: Vec<AvoidState> = indices.iter().map(|&i| states[i].clone()).collect();
            *states = gathered;
        }
    }

    /// Advance each slot's automata with that slot's chosen token.
    pub fn consume(&mut self, tokens: &[u32]) {
        for states in [&mut self.global_states, &mut self.local_states] {
            if states.is_empty() {
                continue;
            }
            assert_eq!(tokens.len(), states.len(), "token count mismatch");
            for (state, &token) in states.iter_mut().zip(tokens) {
                *state = state.consume(token);
            }
        }
    }

    /// Sorted, deduplicated `(slot, token)` pairs to suppress this step,
    /// merged across both layers. The padding sentinel never appears.
    pub fn avoid(&self) -> Vec<(usize, u32)> {
        let mut pairs = BTreeSet::new();
        for states in [&self.global_states, &self.local_states] {
            for (slot, state) in states.iter().enumerate() {
                for token in state.avoid() {
                    if token != PAD_ID {
                        pairs.insert((slot, token));
                    }
                }
            }
        }
        pairs.into_iter().collect()
    }
}
