//! Frequency-ranked concept map over the adapted text.
//!
//! The map is a star: the most frequent concept is the root and every
//! other kept concept hangs off it. Importance falls with rank.

use std::time::Instant;

use learnkit_capability::CapabilityKind;
use learnkit_shared::UserPreferences;

use crate::error::GenerationError;
use crate::materials::{
    AdaptedContent, ConceptCategory, ConceptEdge, ConceptMap, ConceptNode, GenerationMetadata,
};
use crate::prompt;
use crate::stages::{CapabilityScope, metadata};
use crate::text;

/// Concepts kept, root included.
pub(crate) const MAX_CONCEPTS: usize = 8;

const ROOT_IMPORTANCE: u8 = 10;
const FALLBACK_ROOT_LABEL: &str = "Main Topic";
const OVERVIEW_PREFIX: &str = "main topic:";

pub(crate) async fn run(
    scope: &mut CapabilityScope<'_>,
    preferences: &UserPreferences,
    adapted: &AdaptedContent,
) -> Result<ConceptMap, GenerationError> {
    let started = Instant::now();
    let overview = scope
        .invoke(
            CapabilityKind::ExtractStructure,
            &adapted.text,
            &prompt::extract_structure(preferences),
        )
        .await?;
    Ok(build(&adapted.text, &overview, metadata(preferences, started)))
}

pub(crate) fn build(text: &str, overview: &str, metadata: GenerationMetadata) -> ConceptMap {
    let overview = overview.trim().to_string();
    let ranked = text::rank_by_frequency(&text::content_tokens(text), MAX_CONCEPTS);

    let Some(((root_token, root_count), rest)) = ranked.split_first() else {
        let root = ConceptNode {
            id: node_id(0),
            label: label_from_overview(&overview),
            level: 0,
            category: ConceptCategory::MainTopic,
            importance: ROOT_IMPORTANCE,
            frequency: 0,
        };
        return ConceptMap {
            root_id: root.id.clone(),
            nodes: vec![root],
            edges: Vec::new(),
            overview,
            metadata,
        };
    };

    let root = ConceptNode {
        id: node_id(0),
        label: text::capitalize(root_token),
        level: 0,
        category: ConceptCategory::MainTopic,
        importance: ROOT_IMPORTANCE,
        frequency: *root_count,
    };

    let mut nodes = vec![root];
    let mut edges = Vec::with_capacity(rest.len());
    for (offset, (token, count)) in rest.iter().enumerate() {
        let rank = offset + 1;
        let category = categorize(token, rank);
        let node = ConceptNode {
            id: node_id(rank),
            label: text::capitalize(token),
            level: 1,
            category,
            importance: importance(rank),
            frequency: *count,
        };
        edges.push(ConceptEdge {
            source: nodes[0].id.clone(),
            target: node.id.clone(),
            relationship: relationship(category).to_string(),
            weight: *count as f64 / *root_count as f64,
        });
        nodes.push(node);
    }

    ConceptMap {
        root_id: nodes[0].id.clone(),
        nodes,
        edges,
        overview,
        metadata,
    }
}

fn node_id(rank: usize) -> String {
    format!("concept-{rank}")
}

/// 10 for the root, then one less per rank, never below 1.
fn importance(rank: usize) -> u8 {
    let drop = u8::try_from(rank).unwrap_or(u8::MAX);
    ROOT_IMPORTANCE.saturating_sub(drop).max(1)
}

fn categorize(token: &str, rank: usize) -> ConceptCategory {
    const PROCESS: [&str; 5] = ["tion", "sion", "ing", "ize", "ise"];
    const DEFINITION: [&str; 4] = ["ism", "ity", "ness", "ology"];

    if PROCESS.iter().any(|s| token.ends_with(s)) {
        ConceptCategory::Process
    } else if DEFINITION.iter().any(|s| token.ends_with(s)) {
        ConceptCategory::Definition
    } else if rank <= 3 {
        ConceptCategory::Subtopic
    } else {
        ConceptCategory::Example
    }
}

fn relationship(category: ConceptCategory) -> &'static str {
    match category {
        ConceptCategory::MainTopic | ConceptCategory::Subtopic => "includes",
        ConceptCategory::Example => "example_of",
        ConceptCategory::Definition => "defines",
        ConceptCategory::Process => "involves",
    }
}

fn label_from_overview(overview: &str) -> String {
    let first_line = overview.lines().next().unwrap_or_default().trim();
    let label = first_line
        .get(..OVERVIEW_PREFIX.len())
        .filter(|head| head.eq_ignore_ascii_case(OVERVIEW_PREFIX))
        .map_or(first_line, |_| first_line[OVERVIEW_PREFIX.len()..].trim());
    let label = label.trim_end_matches(['.', '!', '?']);
    if label.is_empty() {
        FALLBACK_ROOT_LABEL.to_string()
    } else {
        label.to_string()
    }
}
