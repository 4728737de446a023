//! Tests for bank-allocated candidate selection: end-to-end scenarios and
//! the batched-vs-reference equivalence property.

use lexbeam_core::ScoreMatrix;
use lexbeam_search::{
    mask_avoided, topk, topk_single, AvoidBatch, IncludeBatch, IncludeState,
};
use rand::prelude::*;
use rand::rngs::StdRng;

/// Dense score block, base score everywhere except the given overrides.
fn scores_with(rows: usize, vocab: usize, base: f32, overrides: &[(usize, u32, f32)]) -> Vec<f32> {
    let mut data = vec![base; rows * vocab];
    for &(row, col, score) in overrides {
        data[row * vocab + col as usize] = score;
    }
    data
}

// ===== Avoid scenario =====

#[test]
fn test_avoid_phrase_blocks_completion_token() {
    // batch=1, beam=4, vocab=10, avoid phrase [3, 4].
    let avoid_list = vec![vec![vec![3u32, 4]]];
    let mut avoid = AvoidBatch::new(1, 4, 10, Some(&avoid_list), None).unwrap();
    let mut include = IncludeBatch::new(1, 4, 10, 9, None, None).unwrap();
    let inactive = vec![false; 4];

    // Step 1: token 3 wins every row; nothing is banned yet.
    let mut data = scores_with(4, 10, 5.0, &[(0, 3, 1.0), (1, 3, 1.1), (2, 3, 1.2), (3, 3, 1.3)]);
    mask_avoided(&mut data, 10, &avoid.avoid());
    let scores = ScoreMatrix::new(&data, 10).unwrap();
    let proposed: Vec<(usize, u32, f32)> =
        (0..4).map(|row| (row, 3, scores.get(row, 3))).collect();
    let selection = topk(1, 4, &inactive, &scores, &mut include, &proposed).unwrap();
    assert_eq!(selection.tokens, vec![3, 3, 3, 3]);

    avoid.reorder(&selection.rows);
    avoid.consume(&selection.tokens);
    assert_eq!(
        avoid.avoid(),
        vec![(0, 4), (1, 4), (2, 4), (3, 4)],
        "every slot mid-phrase must ban the completing token"
    );

    // Step 2: token 4 would win on raw score, but it is masked out.
    let mut data = scores_with(
        4,
        10,
        5.0,
        &[(0, 4, 0.5), (1, 4, 0.5), (2, 4, 0.5), (3, 4, 0.5), (0, 2, 2.0), (1, 2, 2.0), (2, 2, 2.0), (3, 2, 2.0)],
    );
    mask_avoided(&mut data, 10, &avoid.avoid());
    let scores = ScoreMatrix::new(&data, 10).unwrap();
    let proposed: Vec<(usize, u32, f32)> = (0..4)
        .map(|row| {
            let col = scores.argmin_row(row);
            (row, col, scores.get(row, col))
        })
        .collect();
    let selection = topk(1, 4, &selection.inactive, &scores, &mut include, &proposed).unwrap();
    assert!(
        selection.tokens.iter().all(|&token| token != 4),
        "selector must never choose an avoided token"
    );
    assert_eq!(selection.tokens, vec![2, 2, 2, 2]);
}

// ===== Include scenario =====

#[test]
fn test_include_phrase_gates_eos() {
    // Include phrase [2, 6], eos_id=9, beam=1: EOS must wait for the phrase.
    let include_list = vec![vec![vec![2u32, 6]]];
    let mut include = IncludeBatch::new(1, 1, 10, 9, Some(&include_list), None).unwrap();
    let inactive = vec![false];

    let data = scores_with(1, 10, 5.0, &[(0, 9, 0.1), (0, 6, 1.0), (0, 2, 2.0)]);
    let scores = ScoreMatrix::new(&data, 10).unwrap();
    let proposed = vec![(0usize, 9u32, 0.1f32)];

    // Step 1: EOS is proposed but invalid; the wanted token 2 is selected.
    let selection = topk(1, 1, &inactive, &scores, &mut include, &proposed).unwrap();
    assert_eq!(selection.tokens, vec![2]);
    assert_eq!(include.unmet(), vec![1]);

    // Step 2: still gated; the continuation 6 is selected.
    let selection = topk(1, 1, &selection.inactive, &scores, &mut include, &proposed).unwrap();
    assert_eq!(selection.tokens, vec![6]);
    assert_eq!(include.unmet(), vec![0]);
    assert_eq!(include.finished(), vec![true]);

    // Step 3: constraints met, EOS becomes selectable.
    let selection = topk(1, 1, &selection.inactive, &scores, &mut include, &proposed).unwrap();
    assert_eq!(selection.tokens, vec![9]);
}

// ===== Bank allocation in selection =====

#[test]
fn test_selection_reserves_bank_for_constraint_progress() {
    // beam=2, one unmet phrase [5]: the cheap unconstrained token fills
    // bank 1, and the expensive constraint token still wins a slot in
    // bank 0 despite its worse score.
    let include_list = vec![vec![vec![5u32]]];
    let mut include = IncludeBatch::new(1, 2, 8, 7, Some(&include_list), None).unwrap();
    let inactive = vec![false, false];

    let data = scores_with(2, 8, 5.0, &[(0, 1, 0.1), (1, 1, 0.2), (0, 5, 3.0), (1, 5, 3.5)]);
    let scores = ScoreMatrix::new(&data, 8).unwrap();
    let proposed = vec![(0usize, 1u32, 0.1f32), (1usize, 1u32, 0.2f32)];

    let selection = topk(1, 2, &inactive, &scores, &mut include, &proposed).unwrap();
    assert_eq!(selection.rows, vec![0, 0]);
    assert_eq!(selection.tokens, vec![1, 5]);
    assert_eq!(include.finished(), vec![false, true]);
}

#[test]
fn test_selection_pads_short_beam() {
    // Only one active row produces candidates; the beam is padded by
    // repeating the last survivor and the padded slots marked inactive.
    let mut include = IncludeBatch::new(1, 4, 6, 5, None, None).unwrap();
    let inactive = vec![false, true, true, true];

    let data = scores_with(4, 6, 5.0, &[(0, 1, 0.5)]);
    let scores = ScoreMatrix::new(&data, 6).unwrap();

    let selection = topk(1, 4, &inactive, &scores, &mut include, &[]).unwrap();
    assert_eq!(selection.rows, vec![0, 0, 0, 0]);
    assert_eq!(selection.tokens, vec![1, 1, 1, 1]);
    assert_eq!(selection.inactive, vec![false, true, true, true]);
}

#[test]
fn test_selection_rejects_shape_mismatch() {
    let mut include = IncludeBatch::new(1, 2, 6, 5, None, None).unwrap();
    let data = vec![0.0f32; 6]; // one row, but two slots expected
    let scores = ScoreMatrix::new(&data, 6).unwrap();
    assert!(topk(1, 2, &[false, false], &scores, &mut include, &[]).is_err());
}

// ===== Batched vs reference equivalence =====

fn random_phrases(rng: &mut StdRng) -> Vec<Vec<u32>> {
    let count = rng.gen_range(0..=2);
    (0..count)
        .map(|_| {
            let len = rng.gen_range(1..=3);
            (0..len).map(|_| rng.gen_range(1..10)).collect()
        })
        .collect()
}

#[test]
fn test_batched_selection_matches_reference() {
    const BATCH: usize = 3;
    const BEAM: usize = 4;
    const VOCAB: usize = 12;
    const EOS: u32 = 11;

    for seed in 0..25u64 {
        let mut rng = StdRng::seed_from_u64(seed);

        let include_list: Vec<Vec<Vec<u32>>> =
            (0..BATCH).map(|_| random_phrases(&mut rng)).collect();
        let mut include =
            IncludeBatch::new(BATCH, BEAM, VOCAB, EOS, Some(&include_list), None).unwrap();

        let data: Vec<f32> = (0..BATCH * BEAM * VOCAB)
            .map(|_| rng.gen_range(0.0..10.0))
            .collect();
        let scores = ScoreMatrix::new(&data, VOCAB).unwrap();

        // slot 0 of each sentence stays active; others drop out at random
        let inactive: Vec<bool> = (0..BATCH * BEAM)
            .map(|row| row % BEAM != 0 && rng.gen_bool(0.3))
            .collect();

        // provisional top-k: the beam-size best (row, token) pairs per sentence
        let mut proposed: Vec<(usize, u32, f32)> = Vec::new();
        for sent in 0..BATCH {
            let mut entries: Vec<(usize, u32, f32)> = (sent * BEAM..(sent + 1) * BEAM)
                .flat_map(|row| (0..VOCAB as u32).map(move |col| (row, col)))
                .map(|(row, col)| (row, col, scores.get(row, col)))
                .collect();
            entries.sort_by(|a, b| a.2.total_cmp(&b.2));
            proposed.extend(entries.into_iter().take(BEAM));
        }

        // reference: the per-sentence rule on clones of the incoming states
        let mut ref_rows = Vec::new();
        let mut ref_tokens = Vec::new();
        let mut ref_scores = Vec::new();
        let mut ref_inactive = Vec::new();
        let mut ref_unmet = Vec::new();
        for sent in 0..BATCH {
            let offset = sent * BEAM;
            let states: Vec<IncludeState> =
                (offset..offset + BEAM).map(|s| include.state(s).clone()).collect();
            let sent_proposed: Vec<(usize, u32, f32)> = proposed
                .iter()
                .copied()
                .filter(|&(row, _, _)| row / BEAM == sent)
                .collect();
            let (candidates, flags) = topk_single(
                BEAM,
                offset,
                &inactive[offset..offset + BEAM],
                &scores,
                &states,
                &sent_proposed,
            );
            for cand in &candidates {
                ref_rows.push(cand.row);
                ref_tokens.push(cand.col);
                ref_scores.push(cand.score);
                ref_unmet.push(cand.state.unmet());
            }
            ref_inactive.extend(flags);
        }

        let selection = topk(BATCH, BEAM, &inactive, &scores, &mut include, &proposed).unwrap();

        assert_eq!(selection.rows, ref_rows, "seed {seed}");
        assert_eq!(selection.tokens, ref_tokens, "seed {seed}");
        assert_eq!(selection.scores, ref_scores, "seed {seed}");
        assert_eq!(selection.inactive, ref_inactive, "seed {seed}");
        // tracker advanced to exactly the states the candidates computed
        assert_eq!(include.unmet(), ref_unmet, "seed {seed}");
    }
}
