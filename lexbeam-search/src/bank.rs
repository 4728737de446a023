//! Beam-capacity allocation across unmet-constraint banks.

/// Distribute `beam_size` slots across `num_constraints + 1` banks, where
/// bank `i` is reserved for hypotheses with `i` unmet constraints.
///
/// Base allocation is an even integer split with the remainder added to
/// the last bank. A single right-to-left pass then moves each bank's
/// surplus over its observed candidate count to the next lower-indexed
/// bank, index 0 wrapping to the last bank. Spare capacity thus drifts
/// toward hypotheses closer to satisfying all constraints, and the pass
/// must start at the bank holding the remainder so that
/// `num_constraints >= beam_size` still yields a usable allocation.
///
/// The returned sizes always sum to `beam_size`.
pub fn get_bank_sizes(
    num_constraints: usize,
    beam_size: usize,
    candidate_counts: &[usize],
) -> Vec<usize> {
    let num_banks = num_constraints + 1;
    debug_assert_eq!(candidate_counts.len(), num_banks, "bank count mismatch");

    let bank_size = beam_size / num_banks;
    let mut assigned = vec![bank_size; num_banks];
    assigned[num_banks - 1] += beam_size - bank_size * num_banks;

    for i in (0..num_banks).rev() {
        if assigned[i] > candidate_counts[i] {
            let surplus = assigned[i] - candidate_counts[i];
            assigned[i] -= surplus;
            let lower = if i == 0 { num_banks - 1 } else { i - 1 };
            assigned[lower] += surplus;
        }
    }

    assigned
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sums_to_beam_size() {
        for (nc, beam, counts) in [
            (0, 4, vec![10]),
            (2, 4, vec![0, 0, 10]),
            (3, 5, vec![1, 0, 2, 9]),
            (7, 4, vec![1, 1, 1, 1, 1, 1, 1, 1]),
        ] {
            let sizes = get_bank_sizes(nc, beam, &counts);
            assert_eq!(sizes.iter().sum::<usize>(), beam, "nc={nc} beam={beam}");
        }
    }

    #[test]
    fn test_base_allocation_when_all_banks_full() {
        // Every bank has at least its base allocation of candidates:
        // output is the even split with the remainder in the last bank.
        let sizes = get_bank_sizes(2, 8, &[10, 10, 10]);
        assert_eq!(sizes, vec![2, 2, 4]);
    }

    #[test]
    fn test_zero_candidate_bank_is_drained() {
        // The empty middle bank gives its slots away.
        let sizes = get_bank_sizes(2, 6, &[10, 0, 10]);
        assert_eq!(sizes[1], 0);
        assert_eq!(sizes.iter().sum::<usize>(), 6);
    }

    #[test]
    fn test_surplus_moves_toward_lower_banks() {
        // Bank 2 has a single candidate; its surplus lands below.
        let sizes = get_bank_sizes(2, 9, &[10, 10, 1]);
        assert_eq!(sizes, vec![3, 5, 1]);
    }

    #[test]
    fn test_more_constraints_than_beam() {
        // num_constraints >= beam_size: not an error, some banks get zero.
        let sizes = get_bank_sizes(5, 3, &[0, 0, 1, 1, 1, 0]);
        assert_eq!(sizes.iter().sum::<usize>(), 3);
        assert!(sizes[5] <= 1);
    }

    #[test]
    fn test_single_bank() {
        assert_eq!(get_bank_sizes(0, 5, &[2]), vec![5]);
    }
}
