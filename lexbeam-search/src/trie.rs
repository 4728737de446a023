//! Prefix-tree indexes over token-id phrases.
//!
//! `AvoidTrie` is immutable once built and shared by reference across every
//! hypothesis in a batch. `IncludeTrie` is persistent: children live behind
//! `Arc`, and `prune` copies only the path it touches, so one hypothesis
//! completing a phrase never disturbs the view held by any other.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use lexbeam_core::{validate_phrases, RawPhrase, Result};

/// Trie over phrases that must never appear in the output.
///
/// A phrase's last token is stored in the terminal set of the node reached
/// by its prefix; a one-token phrase lives in the root's terminal set and
/// creates no child edge.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AvoidTrie {
    final_ids: HashSet<u32>,
    children: HashMap<u32, Arc<AvoidTrie>>,
}

impl AvoidTrie {
    pub fn from_phrases(phrases: &[RawPhrase]) -> Result<Self> {
        validate_phrases(phrases, None)?;
        let mut trie = AvoidTrie::default();
        for phrase in phrases {
            trie.add_phrase(phrase);
        }
        Ok(trie)
    }

    pub fn add_phrase(&mut self, phrase: &[u32]) {
        match phrase {
            [] => {}
            [last] => {
                self.final_ids.insert(*last);
            }
            [head, rest @ ..] => {
                let child = self.children.entry(*head).or_default();
                Arc::make_mut(child).add_phrase(rest);
            }
        }
    }

    /// Child node along the `token` edge, if any.
    pub fn step(&self, token: u32) -> Option<&Arc<AvoidTrie>> {
        self.children.get(&token)
    }

    /// Token ids that end a phrase at this node.
    pub fn final_ids(&self) -> &HashSet<u32> {
        &self.final_ids
    }

    /// Number of distinct phrases in this subtree.
    pub fn phrase_count(&self) -> usize {
        self.final_ids.len()
            + self
                .children
                .values()
                .map(|child| child.phrase_count())
                .sum::<usize>()
    }

    pub fn is_empty(&self) -> bool {
        self.final_ids.is_empty() && self.children.is_empty()
    }
}

/// Trie over phrases that must appear in the output.
///
/// Structurally identical to [`AvoidTrie`], with copy-on-write pruning:
/// completing a phrase removes exactly its path from a private copy while
/// every untouched subtree stays shared.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IncludeTrie {
    final_ids: HashSet<u32>,
    children: HashMap<u32, Arc<IncludeTrie>>,
}

impl IncludeTrie {
    pub fn from_phrases(phrases: &[RawPhrase]) -> Result<Self> {
        validate_phrases(phrases, None)?;
        let mut trie = IncludeTrie::default();
        for phrase in phrases {
            trie.add_phrase(phrase);
        }
        Ok(trie)
    }

    pub fn add_phrase(&mut self, phrase: &[u32]) {
        match phrase {
            [] => {}
            [last] => {
                self.final_ids.insert(*last);
            }
            [head, rest @ ..] => {
                let child = self.children.entry(*head).or_default();
                Arc::make_mut(child).add_phrase(rest);
            }
        }
    }

    /// Child node along the `token` edge, if any.
    pub fn step(&self, token: u32) -> Option<&Arc<IncludeTrie>> {
        self.children.get(&token)
    }

    /// Token ids that end a phrase at this node.
    pub fn final_ids(&self) -> &HashSet<u32> {
        &self.final_ids
    }

    /// Token ids with outgoing child edges at this node.
    pub fn child_tokens(&self) -> impl Iterator<Item = u32> + '_ {
        self.children.keys().copied()
    }

    /// Number of distinct phrases remaining in this subtree.
    pub fn phrase_count(&self) -> usize {
        self.final_ids.len()
            + self
                .children
                .values()
                .map(|child| child.phrase_count())
                .sum::<usize>()
    }

    pub fn is_empty(&self) -> bool {
        self.final_ids.is_empty() && self.children.is_empty()
    }

    /// Remove one phrase from a private copy of this trie.
    ///
    /// Only the nodes along `phrase` are copied; all other subtrees are
    /// shared with the original. A child that ends up with no terminals and
    /// no children loses its edge. Returns `None` when the whole trie
    /// becomes empty (every constraint satisfied). Pruning a phrase that is
    /// not present leaves the affected branch unchanged.
    pub fn prune(&self, phrase: &[u32]) -> Option<Arc<IncludeTrie>> {
        let pruned = self.prune_path(phrase);
        if pruned.is_empty() {
            None
        } else {
            Some(Arc::new(pruned))
        }
    }

    fn prune_path(&self, phrase: &[u32]) -> IncludeTrie {
        let mut copy = self.clone();
        match phrase {
            [] => {}
            [last] => {
                copy.final_ids.remove(last);
            }
            [head, rest @ ..] => {
                if let Some(child) = self.children.get(head) {
                    let pruned = child.prune_path(rest);
                    if pruned.is_empty() {
                        copy.children.remove(head);
                    } else {
                        copy.children.insert(*head, Arc::new(pruned));
                    }
                }
            }
        }
        copy
    }
}
