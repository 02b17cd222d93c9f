//! Delimited identifier-list parsing.
//!
//! Catalogue mapping columns store cross-references as a single text cell
//! containing identifiers separated by `;`, `,` or newlines, in any mixture
//! (e.g. `"FM-001; FM-002,FM-003"`). This module normalises such a cell into
//! clean tokens; deduplication is the caller's job where it matters.

/// Parse a raw delimited cell into trimmed, non-empty tokens.
///
/// Splits on `;`, `,` and `\n` (any mixture), trims each token, drops
/// empties, and preserves first-occurrence input order. Blank input yields
/// an empty vec. Pure: linear in the input, no allocation beyond the output.
pub fn parse_id_list(value: &str) -> Vec<String> {
    value
        .split(|c| c == ';' || c == ',' || c == '\n')
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn splits_on_semicolons() {
        assert_eq!(parse_id_list("FM-001; FM-002"), vec!["FM-001", "FM-002"]);
    }

    #[test]
    fn splits_on_mixed_separators() {
        assert_eq!(
            parse_id_list("A-1,B-2;C-3\nD-4"),
            vec!["A-1", "B-2", "C-3", "D-4"]
        );
    }

    #[test]
    fn blank_input_is_empty() {
        assert!(parse_id_list("").is_empty());
        assert!(parse_id_list("   ").is_empty());
        assert!(parse_id_list(" ; , \n ").is_empty());
    }

    #[test]
    fn does_not_merge_across_separators() {
        // Adjacent separators must not glue neighbouring tokens together.
        assert_eq!(parse_id_list("A;,B"), vec!["A", "B"]);
    }

    #[test]
    fn preserves_input_order_without_dedup() {
        assert_eq!(parse_id_list("X;Y;X"), vec!["X", "Y", "X"]);
    }

    proptest! {
        #[test]
        fn tokens_are_never_empty_or_padded(s in "[A-Z0-9 \t;,\n-]{0,64}") {
            for tok in parse_id_list(&s) {
                prop_assert!(!tok.is_empty());
                prop_assert_eq!(tok.trim(), tok.as_str());
            }
        }

        #[test]
        fn order_of_first_occurrence_is_preserved(
            ids in proptest::collection::vec("[A-Z]{1,3}-[0-9]{1,3}", 0..8),
            sep in proptest::sample::select(vec!["; ", ",", "\n"]),
        ) {
            let joined = ids.join(sep);
            prop_assert_eq!(parse_id_list(&joined), ids);
        }
    }
}
