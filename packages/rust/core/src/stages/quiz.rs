//! Multiple-choice quiz authored by the capability, topped up locally.
//!
//! The capability is asked for `Q:` / `A)`..`D)` / `Answer:` blocks. Blocks
//! that do not parse into 3-4 distinct options with a valid answer are
//! dropped, and the quiz is filled to [`QUESTION_COUNT`] from the summary's
//! key points and the concept map.

use std::sync::LazyLock;
use std::time::Instant;

use regex::Regex;
use tracing::debug;

use learnkit_capability::CapabilityKind;
use learnkit_shared::{ComplexityBucket, UserPreferences};

use crate::error::GenerationError;
use crate::materials::{
    AdaptedContent, ConceptMap, Difficulty, GenerationMetadata, Quiz, QuizOption, QuizQuestion,
    Summary,
};
use crate::prompt;
use crate::stages::{CapabilityScope, metadata};

/// Questions per quiz.
pub(crate) const QUESTION_COUNT: usize = 3;

const OPTION_LETTERS: [char; 4] = ['a', 'b', 'c', 'd'];

static QUESTION_LINE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^(?:\d+[.)]\s*)?Q\s*[:.]\s*(.+)$").expect("valid regex"));
static OPTION_LINE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^\(?([a-d])[).:]\s+(.+)$").expect("valid regex"));
static ANSWER_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^(?:correct\s+)?answer\s*:\s*\(?([a-d])\b").expect("valid regex")
});

/// Answer for the last-resort question when nothing else is known.
const FALLBACK_TOPIC: &str = "Main Topic";

/// Wrong answers used when a question is built locally.
const DISTRACTORS: [&str; 5] = [
    "Something the text never mentions",
    "The opposite of what the text explains",
    "An unrelated fact from another subject",
    "A detail the text says is false",
    "None of the ideas described in the text",
];

/// Difficulty and per-question points for an audience.
pub(crate) fn scoring(bucket: ComplexityBucket) -> (Difficulty, u32) {
    match bucket {
        ComplexityBucket::Elementary => (Difficulty::Easy, 2),
        ComplexityBucket::Middle => (Difficulty::Medium, 3),
        ComplexityBucket::High | ComplexityBucket::College => (Difficulty::Hard, 4),
    }
}

pub(crate) async fn run(
    scope: &mut CapabilityScope<'_>,
    preferences: &UserPreferences,
    adapted: &AdaptedContent,
    summary: &Summary,
    concepts: &ConceptMap,
) -> Result<Quiz, GenerationError> {
    let started = Instant::now();
    let output = scope
        .invoke(
            CapabilityKind::AuthorQuestions,
            &adapted.text,
            &prompt::author_questions(preferences, QUESTION_COUNT),
        )
        .await?;
    Ok(build(
        &output,
        preferences.bucket(),
        summary,
        concepts,
        metadata(preferences, started),
    ))
}

/// A question before ids and scoring are attached.
#[derive(Debug, Clone, PartialEq)]
struct Draft {
    prompt: String,
    options: Vec<String>,
    correct: usize,
    explanation: Option<String>,
}

pub(crate) fn build(
    output: &str,
    bucket: ComplexityBucket,
    summary: &Summary,
    concepts: &ConceptMap,
    metadata: GenerationMetadata,
) -> Quiz {
    let (difficulty, points) = scoring(bucket);

    let mut drafts: Vec<Draft> = parse(output)
        .into_iter()
        .take(QUESTION_COUNT)
        .collect();
    let authored = drafts.len();
    if drafts.len() < QUESTION_COUNT {
        fill(&mut drafts, summary, concepts);
    }
    debug!(authored, filled = drafts.len() - authored, "quiz drafted");

    let questions: Vec<QuizQuestion> = drafts
        .into_iter()
        .enumerate()
        .map(|(i, draft)| QuizQuestion {
            id: format!("q{}", i + 1),
            prompt: draft.prompt,
            options: draft
                .options
                .into_iter()
                .enumerate()
                .map(|(j, text)| QuizOption {
                    id: OPTION_LETTERS[j].to_string(),
                    text,
                    is_correct: j == draft.correct,
                })
                .collect(),
            points,
            difficulty,
            explanation: draft.explanation,
        })
        .collect();

    let total_points = points * questions.len() as u32;
    Quiz {
        questions,
        total_points,
        difficulty,
        metadata,
    }
}

/// Parse well-formed question blocks out of capability output.
fn parse(output: &str) -> Vec<Draft> {
    #[derive(Default)]
    struct Block {
        prompt: String,
        options: Vec<(usize, String)>,
        answer: Option<usize>,
    }

    let mut blocks: Vec<Block> = Vec::new();
    for line in output.lines().map(str::trim).filter(|l| !l.is_empty()) {
        if let Some(caps) = QUESTION_LINE.captures(line) {
            blocks.push(Block {
                prompt: caps[1].trim().to_string(),
                ..Block::default()
            });
        } else if let Some(block) = blocks.last_mut() {
            if let Some(caps) = ANSWER_LINE.captures(line) {
                block.answer = letter_index(&caps[1]);
            } else if let Some(caps) = OPTION_LINE.captures(line) {
                if let Some(index) = letter_index(&caps[1]) {
                    block.options.push((index, caps[2].trim().to_string()));
                }
            }
        }
    }

    blocks
        .into_iter()
        .filter_map(|block| {
            let letters: Vec<usize> = block.options.iter().map(|(i, _)| *i).collect();
            let in_order = letters.iter().enumerate().all(|(pos, i)| pos == *i);
            let options: Vec<String> = block.options.into_iter().map(|(_, t)| t).collect();
            let correct = block.answer?;
            let well_formed = !block.prompt.is_empty()
                && in_order
                && (3..=4).contains(&options.len())
                && correct < options.len()
                && all_distinct(&options);
            well_formed.then(|| Draft {
                prompt: block.prompt,
                options,
                correct,
                explanation: None,
            })
        })
        .collect()
}

fn letter_index(letter: &str) -> Option<usize> {
    let c = letter.chars().next()?.to_ascii_lowercase();
    OPTION_LETTERS.iter().position(|l| *l == c)
}

fn all_distinct(options: &[String]) -> bool {
    let mut seen: Vec<String> = Vec::with_capacity(options.len());
    for option in options {
        let key = option.to_lowercase();
        if seen.contains(&key) {
            return false;
        }
        seen.push(key);
    }
    true
}

/// Top `drafts` up to [`QUESTION_COUNT`] with locally built questions.
fn fill(drafts: &mut Vec<Draft>, summary: &Summary, concepts: &ConceptMap) {
    let root_label = concepts
        .root()
        .map(|n| n.label.clone())
        .unwrap_or_default();

    let mut candidates: Vec<(String, String, &'static str)> = Vec::new();
    for point in &summary.key_points {
        candidates.push((
            "Which statement is supported by the text?".to_string(),
            point.clone(),
            "This point appears in the summary of the text.",
        ));
    }
    for node in concepts.nodes.iter().filter(|n| n.id != concepts.root_id) {
        candidates.push((
            format!("Which idea is connected to \"{root_label}\" in the text?"),
            node.label.clone(),
            "This concept appears alongside the main topic.",
        ));
    }
    if !root_label.is_empty() {
        candidates.push((
            "What is the main topic of the text?".to_string(),
            root_label,
            "This is the concept the text mentions most.",
        ));
    }

    if candidates.is_empty() {
        candidates.push((
            "What is the main topic of the text?".to_string(),
            FALLBACK_TOPIC.to_string(),
            "The text is about its main topic.",
        ));
    }

    // Prefer answers not already used; reuse them when nothing else is left.
    let fresh: Vec<_> = candidates
        .iter()
        .filter(|(_, answer, _)| {
            !drafts
                .iter()
                .any(|d| d.options[d.correct].eq_ignore_ascii_case(answer))
        })
        .cloned()
        .collect();
    if !fresh.is_empty() {
        candidates = fresh;
    }

    let mut pool = candidates.iter().cycle();
    while drafts.len() < QUESTION_COUNT {
        let Some((prompt, answer, explanation)) = pool.next() else {
            break;
        };
        let index = drafts.len();
        drafts.push(local_question(index, prompt, answer, explanation));
    }
}

fn local_question(index: usize, prompt: &str, answer: &str, explanation: &str) -> Draft {
    let mut options: Vec<String> = DISTRACTORS
        .iter()
        .cycle()
        .skip(index)
        .filter(|d| !d.eq_ignore_ascii_case(answer))
        .take(OPTION_LETTERS.len() - 1)
        .map(|d| (*d).to_string())
        .collect();
    let correct = index % OPTION_LETTERS.len();
    options.insert(correct, answer.to_string());

    Draft {
        prompt: prompt.to_string(),
        options,
        correct,
        explanation: Some(explanation.to_string()),
    }
}
