/// Resolves unknown (`None`) entries from their nearest known neighbours.
///
/// Leading unknowns take the first known value and trailing unknowns the last.
/// Inside a gap each position takes the closer neighbour; the middle position
/// of an odd-length gap is equidistant and goes to the left neighbour.
///
/// Returns `None` when no value is known at all.
pub fn fill_nearest<T: Copy>(values: &[Option<T>]) -> Option<Vec<T>> {
    let first_known = values.iter().position(Option::is_some)?;
    let mut out = Vec::with_capacity(values.len());

    let mut left = values[first_known]?;
    out.resize(first_known, left);

    let mut i = first_known;
    while i < values.len() {
        if let Some(v) = values[i] {
            left = v;
            out.push(v);
            i += 1;
            continue;
        }

        let gap_start = i;
        let gap_end = values[gap_start..]
            .iter()
            .position(Option::is_some)
            .map_or(values.len(), |offset| gap_start + offset);
        let gap = gap_end - gap_start;

        match values.get(gap_end).copied().flatten() {
            Some(right) => {
                let left_fills = gap.div_ceil(2);
                out.extend(std::iter::repeat(left).take(left_fills));
                out.extend(std::iter::repeat(right).take(gap - left_fills));
            }
            None => out.extend(std::iter::repeat(left).take(gap)),
        }
        i = gap_end;
    }

    Some(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fills_leading_internal_and_trailing_runs() {
        let input = [None, None, Some(5), None, None, None, Some(8), None];
        assert_eq!(fill_nearest(&input), Some(vec![5, 5, 5, 5, 5, 8, 8, 8]));
    }

    #[test]
    fn even_gap_splits_evenly() {
        let input = [Some(1), None, None, None, None, Some(9)];
        assert_eq!(fill_nearest(&input), Some(vec![1, 1, 1, 9, 9, 9]));
    }

    #[test]
    fn single_gap_goes_left() {
        let input = [Some(60.0), None, Some(62.0)];
        assert_eq!(fill_nearest(&input), Some(vec![60.0, 60.0, 62.0]));
    }

    #[test]
    fn odd_gap_tie_goes_left() {
        let input = [Some(1), None, None, None, None, None, Some(2)];
        assert_eq!(fill_nearest(&input), Some(vec![1, 1, 1, 1, 2, 2, 2]));
    }

    #[test]
    fn known_values_are_untouched() {
        let input = [Some(3), Some(4), None, Some(6)];
        assert_eq!(fill_nearest(&input), Some(vec![3, 4, 4, 6]));
    }

    #[test]
    fn all_unknown_yields_none() {
        let input: [Option<i64>; 3] = [None, None, None];
        assert_eq!(fill_nearest(&input), None);
        assert_eq!(fill_nearest::<i64>(&[]), None);
    }

    #[test]
    fn no_unknowns_is_identity() {
        let input = [Some(1), Some(2), Some(3)];
        assert_eq!(fill_nearest(&input), Some(vec![1, 2, 3]));
    }
}
