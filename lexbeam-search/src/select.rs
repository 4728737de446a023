//! Constraint-aware beam reselection.
//!
//! Each decoding step merges three candidate sources per sentence: the
//! scorer's provisional top-k, every token that advances an unmet
//! constraint, and each row's single best token. Candidates are bucketed
//! by resulting unmet-constraint count and admitted in score order up to
//! each bank's allotment, so the next beam carries hypotheses at every
//! level of constraint progress.
//!
//! [`topk_single`] is the per-sentence reference rule; [`topk`] applies
//! the identical rule across the whole batch with one flat two-key sort
//! and a single admission sweep, and is verified equivalent by test.

use std::collections::HashSet;

use lexbeam_core::{LexbeamError, Result, ScoreMatrix};
use tracing::debug;

use crate::bank::get_bank_sizes;
use crate::include::{IncludeBatch, IncludeState};

/// One admissible `(row, token)` extension under consideration for the
/// next beam, with the constraint state it would lead to. Lives for one
/// selection step only.
#[derive(Debug, Clone)]
pub struct Candidate {
    /// Row in the flattened (batch x beam) scores matrix.
    pub row: usize,
    /// Token (column) id.
    pub col: u32,
    /// Accumulated score; lower is better.
    pub score: f32,
    /// Automaton state after consuming `col`.
    pub state: IncludeState,
}

/// The reselected beam for one decoding step, in new-beam order.
#[derive(Debug, Clone)]
pub struct Selection {
    /// Source row for each new beam slot.
    pub rows: Vec<usize>,
    /// Token chosen for each new beam slot.
    pub tokens: Vec<u32>,
    /// Accumulated score of each new beam slot.
    pub scores: Vec<f32>,
    /// Slots holding padding (a sentence had fewer survivors than slots);
    /// the caller must not extend these.
    pub inactive: Vec<bool>,
}

/// Suppress avoided `(slot, token)` pairs by setting their scores to
/// `+inf` (lower is better) before top-k extraction, so neither the scorer
/// proposals nor the per-row best can pick them.
pub fn mask_avoided(scores: &mut [f32], vocab_size: usize, pairs: &[(usize, u32)]) {
    for &(slot, token) in pairs {
        if let Some(cell) = scores.get_mut(slot * vocab_size + token as usize) {
            *cell = f32::INFINITY;
        }
    }
}

/// Reference selection rule for one sentence's slice of the beam.
///
/// `rows` are absolute indices into `scores`; this sentence occupies
/// `row_offset .. row_offset + beam_size`. `proposed` carries the scorer's
/// provisional top-k `(row, token, accumulated score)` entries for this
/// sentence, `states` the incoming automata and `inactive` the incoming
/// row mask, both indexed by slot.
///
/// Returns exactly `beam_size` candidates (padded by repeating the last
/// survivor) and the refreshed inactive flags for those slots.
pub fn topk_single(
    beam_size: usize,
    row_offset: usize,
    inactive: &[bool],
    scores: &ScoreMatrix<'_>,
    states: &[IncludeState],
    proposed: &[(usize, u32, f32)],
) -> (Vec<Candidate>, Vec<bool>) {
    debug_assert_eq!(states.len(), beam_size);
    debug_assert_eq!(inactive.len(), beam_size);

    let num_constraints = states.iter().map(IncludeState::unmet).max().unwrap_or(0);

    let mut seen: HashSet<(usize, u32)> = HashSet::new();
    let mut candidates: Vec<Candidate> = Vec::new();

    // (1) scorer-proposed entries that pass the EOS gate
    for &(row, col, score) in proposed {
        debug_assert!((row_offset..row_offset + beam_size).contains(&row));
        let state = &states[row - row_offset];
        if state.is_valid(col) && seen.insert((row, col)) {
            candidates.push(Candidate {
                row,
                col,
                score,
                state: state.consume(col),
            });
        }
    }

    // (2) constraint continuations and (3) the per-row best token, which
    // guarantees at least one candidate per active row
    for slot in 0..beam_size {
        if inactive[slot] {
            continue;
        }
        let row = row_offset + slot;
        let state = &states[slot];
        let mut next_tokens = state.wanted();
        let best = scores.argmin_row(row);
        if state.is_valid(best) {
            next_tokens.insert(best);
        }
        for col in next_tokens {
            if seen.insert((row, col)) {
                candidates.push(Candidate {
                    row,
                    col,
                    score: scores.get(row, col),
                    state: state.consume(col),
                });
            }
        }
    }

    // stable: equal scores keep first-encountered order
    candidates.sort_by(|a, b| a.score.total_cmp(&b.score));

    let mut counts = vec![0usize; num_constraints + 1];
    for cand in &candidates {
        counts[cand.state.unmet()] += 1;
    }
    let mut remaining = get_bank_sizes(num_constraints, beam_size, &counts);

    let mut pruned: Vec<Candidate> = Vec::with_capacity(beam_size);
    for cand in candidates {
        let bank = cand.state.unmet();
        if remaining[bank] > 0 {
            remaining[bank] -= 1;
            pruned.push(cand);
        }
    }
    assert!(
        !pruned.is_empty(),
        "no beam candidates: every row of the sentence was inactive"
    );

    let survivors = pruned.len();
    if let Some(last) = pruned.last().cloned() {
        while pruned.len() < beam_size {
            pruned.push(last.clone());
        }
    }

    let new_inactive = (0..beam_size).map(|slot| slot >= survivors).collect();
    (pruned, new_inactive)
}

/// Batched selection: the rule of [`topk_single`] applied across all
/// batch items at once.
///
/// Candidates for every sentence are generated into one flat array,
/// ordered by a two-key stable sort (sentence, then score), and admitted
/// in a single sweep against per-sentence bank allotments. The tracker is
/// then reordered and advanced with the final `(row, token)` sequence so
/// its internal state matches the new beam layout, and the refreshed
/// inactive mask is returned in the [`Selection`].
pub fn topk(
    batch_size: usize,
    beam_size: usize,
    inactive: &[bool],
    scores: &ScoreMatrix<'_>,
    include: &mut IncludeBatch,
    proposed: &[(usize, u32, f32)],
) -> Result<Selection> {
    let slots = batch_size * beam_size;
    if scores.rows() != slots {
        return Err(LexbeamError::ShapeMismatch {
            expected: slots,
            got: scores.rows(),
        });
    }
    if inactive.len() != slots {
        return Err(LexbeamError::ShapeMismatch {
            expected: slots,
            got: inactive.len(),
        });
    }
    if include.num_slots() != slots {
        return Err(LexbeamError::ShapeMismatch {
            expected: slots,
            got: include.num_slots(),
        });
    }

    // candidate generation, identical rule to topk_single
    let mut seen: HashSet<(usize, u32)> = HashSet::new();
    let mut candidates: Vec<Candidate> = Vec::new();
    for &(row, col, score) in proposed {
        if row >= slots {
            return Err(LexbeamError::InvalidArgument(format!(
                "proposed row {row} out of range ({slots} slots)"
            )));
        }
        let state = include.state(row);
        if state.is_valid(col) && seen.insert((row, col)) {
            candidates.push(Candidate {
                row,
                col,
                score,
                state: state.consume(col),
            });
        }
    }
    for row in 0..slots {
        if inactive[row] {
            continue;
        }
        let state = include.state(row);
        let mut next_tokens = state.wanted();
        let best = scores.argmin_row(row);
        if state.is_valid(best) {
            next_tokens.insert(best);
        }
        for col in next_tokens {
            if seen.insert((row, col)) {
                candidates.push(Candidate {
                    row,
                    col,
                    score: scores.get(row, col),
                    state: state.consume(col),
                });
            }
        }
    }

    // two-key stable sort: sentence first, then score
    candidates.sort_by(|a, b| {
        (a.row / beam_size)
            .cmp(&(b.row / beam_size))
            .then(a.score.total_cmp(&b.score))
    });

    // per-sentence bank occupancy, then allotments
    let unmet = include.unmet();
    let mut counts: Vec<Vec<usize>> = Vec::with_capacity(batch_size);
    for sent in 0..batch_size {
        let rows = sent * beam_size..(sent + 1) * beam_size;
        let num_constraints = unmet[rows].iter().copied().max().unwrap_or(0);
        counts.push(vec![0usize; num_constraints + 1]);
    }
    for cand in &candidates {
        counts[cand.row / beam_size][cand.state.unmet()] += 1;
    }
    let mut remaining: Vec<Vec<usize>> = counts
        .iter()
        .map(|counts| get_bank_sizes(counts.len() - 1, beam_size, counts))
        .collect();

    // single admission sweep over the sorted flat array
    let mut per_sent: Vec<Vec<Candidate>> = vec![Vec::with_capacity(beam_size); batch_size];
    for cand in candidates {
        let sent = cand.row / beam_size;
        let bank = cand.state.unmet();
        if remaining[sent][bank] > 0 {
            remaining[sent][bank] -= 1;
            per_sent[sent].push(cand);
        }
    }

    let mut rows = Vec::with_capacity(slots);
    let mut tokens = Vec::with_capacity(slots);
    let mut out_scores = Vec::with_capacity(slots);
    let mut new_inactive = Vec::with_capacity(slots);
    for (sent, mut survivors) in per_sent.into_iter().enumerate() {
        assert!(
            !survivors.is_empty(),
            "no beam candidates: every row of sentence {sent} was inactive"
        );
        let survivor_count = survivors.len();
        if let Some(last) = survivors.last().cloned() {
            while survivors.len() < beam_size {
                survivors.push(last.clone());
            }
        }
        for (slot, cand) in survivors.iter().enumerate() {
            rows.push(cand.row);
            tokens.push(cand.col);
            out_scores.push(cand.score);
            new_inactive.push(slot >= survivor_count);
        }
    }

    // resynchronize the tracker with the new beam layout
    include.reorder(&rows);
    include.consume(&tokens);

    debug!(
        slots,
        padded = new_inactive.iter().filter(|&&x| x).count(),
        "beam reselected"
    );
    Ok(Selection {
        rows,
        tokens,
        scores: out_scores,
        inactive: new_inactive,
    })
}
