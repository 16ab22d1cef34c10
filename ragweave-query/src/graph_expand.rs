//! C11: GraphExpander — BFS traversal from seed entities, embedded in
//! the MIX executor.

use futures::future::join_all;
use ragweave_core::{ProjectId, RagResult, Relation};
use ragweave_storage::GraphStorage;
use std::collections::HashSet;
use std::sync::Arc;

/// Result of a BFS expansion: the reachable id set and the
/// normalized-pair-key-deduplicated relations that connect them.
#[derive(Debug, Clone, Default)]
pub struct ExpansionResult {
    pub visited: HashSet<String>,
    pub relations: Vec<Relation>,
}

/// Expands `seeds` up to `hops` hops via `graph.get_relations_for_entity`,
/// fetching each hop's frontier in parallel. Duplicate relations
/// (including direction flips) are eliminated by normalized pair key.
/// Terminates early once a frontier contributes no new ids.
pub async fn expand(
    graph: &Arc<dyn GraphStorage>,
    project_id: &ProjectId,
    seeds: &[String],
    hops: u32,
) -> RagResult<ExpansionResult> {
    let mut visited: HashSet<String> = seeds.iter().cloned().collect();
    let mut relations_by_pair: std::collections::HashMap<String, Relation> = std::collections::HashMap::new();
    let mut frontier: Vec<String> = seeds.to_vec();

    for _ in 0..hops {
        if frontier.is_empty() {
            break;
        }

        let fetches = frontier.iter().map(|id| {
            let graph = graph.clone();
            let project_id = project_id.clone();
            let id = id.clone();
            async move { graph.get_relations_for_entity(&project_id, &id).await }
        });
        let fetched: Vec<RagResult<Vec<Relation>>> = join_all(fetches).await;

        let mut next_frontier = Vec::new();
        for relations in fetched {
            for relation in relations? {
                relations_by_pair.entry(relation.pair_key()).or_insert_with(|| relation.clone());

                for endpoint in [&relation.src_id, &relation.tgt_id] {
                    if visited.insert(endpoint.clone()) {
                        next_frontier.push(endpoint.clone());
                    }
                }
            }
        }
        frontier = next_frontier;
    }

    Ok(ExpansionResult {
        visited,
        relations: relations_by_pair.into_values().collect(),
    })
}
