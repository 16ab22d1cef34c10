//! C5: ContextMerger — round-robin interleaves ranked source lists under
//! a shared token budget (§4.5).
//!
//! Grounded on the teacher's `ContextAssembler::assemble`
//! (`caliber-context::lib`), which sorts a flat list of sections by
//! priority and greedily includes/truncates by budget; this
//! generalizes that greedy-by-priority pass into round-robin fairness
//! across an arbitrary number of ranked source lists, per §4.5's "why
//! round-robin" rationale (diversity across source types).

use crate::tokens::estimate;
use ragweave_core::ContextItem;

/// Result of a merge: the assembled text plus bookkeeping to explain
/// what was dropped.
#[derive(Debug, Clone, PartialEq)]
pub struct MergeResult {
    pub merged_context: String,
    pub included_items: Vec<ContextItem>,
    pub total_tokens: i32,
    pub items_included: i32,
    pub items_truncated: i32,
}

impl MergeResult {
    pub fn empty() -> Self {
        Self {
            merged_context: String::new(),
            included_items: Vec::new(),
            total_tokens: 0,
            items_included: 0,
            items_truncated: 0,
        }
    }
}

const SEPARATOR: &str = "\n\n";

/// Round-robin merges `sources` (ordered lists of ranked
/// [`ContextItem`]s, in the caller's chosen source order) into one
/// result bounded by `max_tokens`.
///
/// Maintains a cursor per source. Each round visits every source once
/// in order: if the item at its cursor fits in the remaining budget it
/// is appended, otherwise it's skipped so a smaller later item can
/// still fit — but the cursor advances either way. Stops once no
/// cursor has room left, or the budget is exhausted.
pub fn merge(sources: &[Vec<ContextItem>], max_tokens: i32) -> MergeResult {
    let total_input: usize = sources.iter().map(|s| s.len()).sum();
    if sources.is_empty() || max_tokens <= 0 || total_input == 0 {
        return MergeResult::empty();
    }

    let separator_tokens = estimate(SEPARATOR);
    let mut cursors = vec![0usize; sources.len()];
    let mut merged = String::new();
    let mut included: Vec<ContextItem> = Vec::new();
    let mut total_tokens = 0i32;

    loop {
        let any_remaining = cursors.iter().enumerate().any(|(i, &c)| c < sources[i].len());
        if !any_remaining || total_tokens >= max_tokens {
            break;
        }

        for (i, source) in sources.iter().enumerate() {
            if cursors[i] >= source.len() {
                continue;
            }
            let item = &source[cursors[i]];
            let separator = if included.is_empty() { 0 } else { separator_tokens };
            let needed = item.tokens + separator;

            if total_tokens + needed <= max_tokens {
                if !included.is_empty() {
                    merged.push_str(SEPARATOR);
                }
                merged.push_str(&item.content);
                total_tokens += needed;
                included.push(item.clone());
            }
            cursors[i] += 1;
        }
    }

    let items_included = included.len() as i32;
    MergeResult {
        merged_context: merged,
        included_items: included,
        total_tokens,
        items_included,
        items_truncated: total_input as i32 - items_included,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ragweave_core::ContextItemType;

    fn item(content: &str, tokens: i32, item_type: ContextItemType) -> ContextItem {
        ContextItem {
            content: content.to_string(),
            item_type,
            source_id: "s1".to_string(),
            file_path: None,
            tokens,
        }
    }

    #[test]
    fn empty_sources_yield_empty_result() {
        assert_eq!(merge(&[], 100), MergeResult::empty());
    }

    #[test]
    fn zero_budget_yields_empty_result() {
        let sources = vec![vec![item("a", 10, ContextItemType::Chunk)]];
        assert_eq!(merge(&sources, 0), MergeResult::empty());
    }

    #[test]
    fn single_source_includes_in_order_until_budget_exhausted() {
        let sources = vec![vec![
            item("a", 50, ContextItemType::Chunk),
            item("b", 50, ContextItemType::Chunk),
            item("c", 50, ContextItemType::Chunk),
        ]];
        let result = merge(&sources, 105);
        assert_eq!(result.included_items.len(), 1);
        assert_eq!(result.included_items[0].content, "a");
        assert_eq!(result.items_truncated, 2);
    }

    #[test]
    fn round_robin_interleaves_across_sources() {
        let entities = vec![
            item("E1", 10, ContextItemType::Entity),
            item("E2", 10, ContextItemType::Entity),
        ];
        let relations = vec![item("R1", 10, ContextItemType::Relation)];
        let chunks = vec![
            item("C1", 10, ContextItemType::Chunk),
            item("C2", 10, ContextItemType::Chunk),
        ];
        let sources = vec![entities, relations, chunks];

        let result = merge(&sources, 10_000);
        let order: Vec<&str> = result.included_items.iter().map(|i| i.content.as_str()).collect();
        assert_eq!(order, vec!["E1", "R1", "C1", "E2", "C2"]);
        assert_eq!(result.items_included, 5);
        assert_eq!(result.items_truncated, 0);
    }

    #[test]
    fn respects_budget_including_separators() {
        let sources = vec![vec![
            item("a", 40, ContextItemType::Chunk),
            item("b", 40, ContextItemType::Chunk),
            item("c", 40, ContextItemType::Chunk),
        ]];
        let sep = estimate("\n\n");
        // Exactly enough for two items plus one separator, not a third.
        let result = merge(&sources, 80 + sep);
        assert!(result.total_tokens <= 80 + sep);
        assert_eq!(result.items_included, 2);
    }

    #[test]
    fn all_included_items_plus_separators_stay_within_budget() {
        let sources = vec![
            vec![
                item("E1", 100, ContextItemType::Entity),
                item("E2", 100, ContextItemType::Entity),
                item("E3", 100, ContextItemType::Entity),
            ],
            vec![
                item("R1", 100, ContextItemType::Relation),
                item("R2", 100, ContextItemType::Relation),
            ],
            vec![
                item("C1", 100, ContextItemType::Chunk),
                item("C2", 100, ContextItemType::Chunk),
                item("C3", 100, ContextItemType::Chunk),
                item("C4", 100, ContextItemType::Chunk),
            ],
        ];
        let total_input: i32 = sources.iter().map(|s| s.len() as i32).sum();

        let result = merge(&sources, 800);
        assert!(result.total_tokens <= 800);
        assert_eq!(result.items_included + result.items_truncated, total_input);
    }
}
