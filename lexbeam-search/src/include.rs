//! Include-side constraint tracking: a per-hypothesis automaton over an
//! [`IncludeTrie`] and the batched tracker. Completing a phrase prunes it
//! from a private copy of the hypothesis' trie; a hypothesis whose trie
//! empties out transitions to a satisfied sentinel and never reverts.

use std::collections::BTreeSet;
use std::sync::Arc;

use lexbeam_core::{validate_phrases, LexbeamError, RawPhraseList, Result};
use tracing::debug;

use crate::trie::IncludeTrie;

/// State of one hypothesis in an include trie.
///
/// `root` is the (possibly already pruned) trie of phrases still owed by
/// this hypothesis, `node` the position reached by the current partial
/// match, and `progress` the token path from the root to `node`. A
/// satisfied hypothesis carries no trie at all.
#[derive(Debug, Clone)]
pub struct IncludeState {
    root: Option<Arc<IncludeTrie>>,
    node: Option<Arc<IncludeTrie>>,
    progress: Vec<u32>,
    eos_id: u32,
}

impl IncludeState {
    pub fn new(root: Arc<IncludeTrie>, eos_id: u32) -> Self {
        Self {
            node: Some(Arc::clone(&root)),
            root: Some(root),
            progress: Vec::new(),
            eos_id,
        }
    }

    /// The sentinel state of a hypothesis with every constraint met.
    pub fn satisfied(eos_id: u32) -> Self {
        Self {
            root: None,
            node: None,
            progress: Vec::new(),
            eos_id,
        }
    }

    pub fn is_satisfied(&self) -> bool {
        self.root.is_none()
    }

    /// Pure transition for one generated token.
    ///
    /// Completing a phrase prunes exactly that phrase from a private copy
    /// of the root; if pruning empties the trie the satisfied sentinel is
    /// returned. A token that breaks a partial match is retried once from
    /// the root, so it may simultaneously start a fresh match.
    pub fn consume(&self, token: u32) -> IncludeState {
        let (root, node) = match (&self.root, &self.node) {
            (Some(root), Some(node)) => (root, node),
            _ => return self.clone(),
        };
        if node.final_ids().contains(&token) {
            // completes a phrase
            let mut finished = self.progress.clone();
            finished.push(token);
            let Some(new_root) = root.prune(&finished) else {
                return IncludeState::satisfied(self.eos_id);
            };
            if let Some(child) = node.step(token) {
                // a longer phrase continues through this token
                IncludeState {
                    root: Some(new_root),
                    node: Some(Arc::clone(child)),
                    progress: finished,
                    eos_id: self.eos_id,
                }
            } else {
                IncludeState {
                    node: Some(Arc::clone(&new_root)),
                    root: Some(new_root),
                    progress: Vec::new(),
                    eos_id: self.eos_id,
                }
            }
        } else if let Some(child) = node.step(token) {
            let mut progress = self.progress.clone();
            progress.push(token);
            IncludeState {
                root: Some(Arc::clone(root)),
                node: Some(Arc::clone(child)),
                progress,
                eos_id: self.eos_id,
            }
        } else if !Arc::ptr_eq(node, root) {
            // break the partial match, then retry the token from the root
            IncludeState::new(Arc::clone(root), self.eos_id).consume(token)
        } else {
            self.clone()
        }
    }

    /// Gate end-of-sequence emission: any non-EOS token is valid; EOS is
    /// valid once satisfied, or when exactly one single-token phrase
    /// remains and it is the EOS id completing at the current node.
    pub fn is_valid(&self, token: u32) -> bool {
        let (Some(root), Some(node)) = (&self.root, &self.node) else {
            return true;
        };
        token != self.eos_id
            || (root.phrase_count() == 1 && node.final_ids().contains(&self.eos_id))
    }

    /// Tokens that advance toward fulfilling constraints: terminals at the
    /// current node plus its outgoing child edges.
    pub fn wanted(&self) -> BTreeSet<u32> {
        match &self.node {
            Some(node) => node
                .final_ids()
                .iter()
                .copied()
                .chain(node.child_tokens())
                .collect(),
            None => BTreeSet::new(),
        }
    }

    /// Number of phrases this hypothesis has not yet generated.
    pub fn unmet(&self) -> usize {
        self.root.as_ref().map_or(0, |root| root.phrase_count())
    }
}

/// Include automata for a whole batch, one state per flattened
/// (batch item, beam slot).
pub struct IncludeBatch {
    states: Vec<IncludeState>,
    eos_id: u32,
}

impl IncludeBatch {
    /// Build one automaton per slot. Global and per-sentence phrases are
    /// merged into a single trie per sentence before any state references
    /// it, so later copy-on-write pruning stays per-hypothesis.
    pub fn new(
        batch_size: usize,
        beam_size: usize,
        vocab_size: usize,
        eos_id: u32,
        include_list: Option<&[RawPhraseList]>,
        global_trie: Option<Arc<IncludeTrie>>,
    ) -> Result<Self> {
        if let Some(include_list) = include_list {
            if include_list.len() != batch_size {
                return Err(LexbeamError::ShapeMismatch {
                    expected: batch_size,
                    got: include_list.len(),
                });
            }
        }

        let mut states = Vec::with_capacity(batch_size * beam_size);
        for sent in 0..batch_size {
            let mut trie = global_trie.as_deref().cloned().unwrap_or_default();
            if let Some(include_list) = include_list {
                let phrases = &include_list[sent];
                validate_phrases(phrases, Some(vocab_size))?;
                for phrase in phrases {
                    trie.add_phrase(phrase);
                }
            }
            let state = if trie.is_empty() {
                IncludeState::satisfied(eos_id)
            } else {
                IncludeState::new(Arc::new(trie), eos_id)
            };
            states.extend(std::iter::repeat_with(|| state.clone()).take(beam_size));
        }

        debug!(batch_size, beam_size, eos_id, "include tracker initialized");
        Ok(Self { states, eos_id })
    }

    pub fn eos_id(&self) -> u32 {
        self.eos_id
    }

    pub fn num_slots(&self) -> usize {
        self.states.len()
    }

    /// The automaton tracking `slot`. Out-of-bounds panics.
    pub fn state(&self, slot: usize) -> &IncludeState {
        &self.states[slot]
    }

    /// Gather states by new beam positions. Duplicate indices are expected
    /// and harmless; an out-of-bounds index panics.
    pub fn reorder(&mut self, indices: &[usize]) {
        assert_eq!(
            indices.len(),
            self.states.len(),
            "reorder index count mismatch"
        );
        let gathered: Vec<IncludeState> =
            indices.iter().map(|&i| self.states[i].clone()).collect();
        self.states = gathered;
    }

    /// Advance each slot's automaton with that slot's chosen token.
    pub fn consume(&mut self, tokens: &[u32]) {
        assert_eq!(tokens.len(), self.states.len(), "token count mismatch");
        for (state, &token) in self.states.iter_mut().zip(tokens) {
            *state = state.consume(token);
        }
    }

    /// Sparse `(slot, token)` pairs that advance some constraint.
    pub fn wanted(&self) -> Vec<(usize, u32)> {
        let mut pairs = Vec::new();
        for (slot, state) in self.states.iter().enumerate() {
            for token in state.wanted() {
                pairs.push((slot, token));
            }
        }
        pairs
    }

    /// Per-slot flag: every constraint met.
    pub fn finished(&self) -> Vec<bool> {
        self.states.iter().map(IncludeState::is_satisfied).collect()
    }

    /// Per-slot count of constraints not yet generated.
    pub fn unmet(&self) -> Vec<usize> {
        self.states.iter().map(IncludeState::unmet).collect()
    }
}
