//! Transcript statistics
//!
//! Word counts, per-speaker engagement, response metrics and question
//! classification, all computed from the raw turn text.

use std::collections::{BTreeMap, HashSet};

use panelsim_core::InteractionRecord;

use crate::models::{QuestionType, QuestionTypeCounts, ResponseMetrics, SpeakerEngagement};

/// Words per interaction-score point
const WORDS_PER_SCORE_POINT: usize = 100;
const MAX_INTERACTION_SCORE: usize = 10;

const HESITATION_WORDS: &[&str] = &["um", "uh", "hmm", "er", "erm"];
const ELLIPSES: &[&str] = &["...", "\u{2026}"];

const PROBING_PHRASES: &[&str] = &[
    "tell me more",
    "how did that",
    "why do you",
    "could you explain",
    "can you elaborate",
    "what makes you say",
];
const OPEN_WORDS: &[&str] = &["what", "how", "why", "describe", "explain", "share"];

/// Whitespace-separated word count
pub fn word_count(text: &str) -> usize {
    text.split_whitespace().count()
}

fn bare_word(token: &str) -> String {
    token
        .trim_matches(|c: char| !c.is_alphanumeric() && c != '\'')
        .to_lowercase()
}

/// Hesitation markers: filler words plus ellipses
pub fn hesitation_count(text: &str) -> usize {
    let fillers = text
        .split_whitespace()
        .filter(|token| HESITATION_WORDS.contains(&bare_word(token).as_str()))
        .count();
    let ellipses: usize = ELLIPSES.iter().map(|e| text.matches(e).count()).sum();
    fillers + ellipses
}

/// Distinct case-insensitive words across all texts
pub fn unique_words<'a>(texts: impl IntoIterator<Item = &'a str>) -> usize {
    texts
        .into_iter()
        .flat_map(str::split_whitespace)
        .map(bare_word)
        .filter(|w| !w.is_empty())
        .collect::<HashSet<_>>()
        .len()
}

/// Per-speaker word and turn counts. Degraded turns carry placeholder text,
/// so their speaker gets an entry but nothing is counted for them.
pub fn engagement_by_speaker(record: &InteractionRecord) -> BTreeMap<String, SpeakerEngagement> {
    let mut engagement: BTreeMap<String, SpeakerEngagement> = BTreeMap::new();
    for turn in record.turns() {
        let entry = engagement.entry(turn.speaker.clone()).or_default();
        if turn.degraded {
            continue;
        }
        entry.word_count += word_count(&turn.content);
        entry.response_count += 1;
    }
    for entry in engagement.values_mut() {
        entry.interaction_score = (entry.word_count / WORDS_PER_SCORE_POINT).min(MAX_INTERACTION_SCORE);
    }
    engagement
}

/// Aggregate response metrics over every speaker except `host`, skipping
/// degraded turns.
///
/// Returns `None` when no real non-host turn exists.
pub fn response_metrics(record: &InteractionRecord, host: Option<&str>) -> Option<ResponseMetrics> {
    let responses: Vec<&str> = record
        .turns()
        .iter()
        .filter(|turn| !turn.degraded && Some(turn.speaker.as_str()) != host)
        .map(|turn| turn.content.as_str())
        .collect();
    if responses.is_empty() {
        return None;
    }

    let total_word_count: usize = responses.iter().map(|r| word_count(r)).sum();
    Some(ResponseMetrics {
        total_word_count,
        response_count: responses.len(),
        avg_response_length: total_word_count as f64 / responses.len() as f64,
        unique_words: unique_words(responses.iter().copied()),
        hesitation_count: responses.iter().map(|r| hesitation_count(r)).sum(),
    })
}

/// Classify a host utterance. Utterances without a question mark are not
/// questions and yield `None`.
pub fn classify_question(text: &str) -> Option<QuestionType> {
    if !text.contains('?') {
        return None;
    }
    let lowered = text.to_lowercase();
    if PROBING_PHRASES.iter().any(|p| lowered.contains(p)) {
        return Some(QuestionType::Probing);
    }
    let opens = lowered
        .split_whitespace()
        .map(bare_word)
        .any(|w| OPEN_WORDS.contains(&w.as_str()));
    Some(if opens {
        QuestionType::OpenEnded
    } else {
        QuestionType::Closed
    })
}

/// Question type counts over the host's turns
pub fn question_type_counts(record: &InteractionRecord, host: &str) -> QuestionTypeCounts {
    let mut counts = QuestionTypeCounts::default();
    record
        .turns()
        .iter()
        .filter(|turn| turn.speaker == host)
        .filter_map(|turn| classify_question(&turn.content))
        .for_each(|question_type| counts.record(question_type));
    counts
}

#[cfg(test)]
mod tests {
    use super::*;

    fn words(n: usize) -> String {
        vec!["word"; n].join(" ")
    }

    #[test]
    fn test_word_counts_sum_across_turns() {
        let mut record = InteractionRecord::new();
        record.append("Interviewer", "Hello there?", false);
        record.append("R001", &words(10), false);
        record.append("R001", &words(15), false);

        let engagement = engagement_by_speaker(&record);
        assert_eq!(engagement["R001"].word_count, 25);
        assert_eq!(engagement["R001"].response_count, 2);
        assert_eq!(engagement["Interviewer"].word_count, 2);

        let metrics = response_metrics(&record, Some("Interviewer")).unwrap();
        assert_eq!(metrics.total_word_count, 25);
        assert_eq!(metrics.response_count, 2);
        assert!((metrics.avg_response_length - 12.5).abs() < 1e-9);
        assert_eq!(metrics.unique_words, 1);
    }

    #[test]
    fn test_degraded_turns_are_not_counted() {
        let mut record = InteractionRecord::new();
        record.append("Moderator", "What do you think?", false);
        record.append("P001", "[no response]", true);
        record.append("P001", "[no response]", true);
        record.append("P002", &words(6), false);

        let engagement = engagement_by_speaker(&record);
        assert_eq!(engagement["P001"].word_count, 0);
        assert_eq!(engagement["P001"].response_count, 0);
        assert_eq!(engagement["P002"].word_count, 6);

        let metrics = response_metrics(&record, Some("Moderator")).unwrap();
        assert_eq!(metrics.total_word_count, 6);
        assert_eq!(metrics.response_count, 1);
        assert!((metrics.avg_response_length - 6.0).abs() < 1e-9);
        assert_eq!(metrics.unique_words, 1);
    }

    #[test]
    fn test_only_degraded_responses_yield_no_metrics() {
        let mut record = InteractionRecord::new();
        record.append("Moderator", "What do you think?", false);
        record.append("P001", "[no response]", true);

        assert!(response_metrics(&record, Some("Moderator")).is_none());
        assert_eq!(engagement_by_speaker(&record)["P001"].word_count, 0);
    }

    #[test]
    fn test_interaction_score_is_capped() {
        let mut record = InteractionRecord::new();
        record.append("R001", &words(250), false);
        record.append("R002", &words(1500), false);
        record.append("R003", &words(99), false);

        let engagement = engagement_by_speaker(&record);
        assert_eq!(engagement["R001"].interaction_score, 2);
        assert_eq!(engagement["R002"].interaction_score, 10);
        assert_eq!(engagement["R003"].interaction_score, 0);
    }

    #[test]
    fn test_response_metrics_without_responses() {
        let mut record = InteractionRecord::new();
        record.append("Moderator", "Welcome?", false);
        assert!(response_metrics(&record, Some("Moderator")).is_none());
    }

    #[test]
    fn test_hesitation_count() {
        assert_eq!(hesitation_count("Um, I think... well, uh, maybe"), 3);
        assert_eq!(hesitation_count("Summer is under way"), 0);
        assert_eq!(hesitation_count("Hmm\u{2026}"), 2);
    }

    #[test]
    fn test_unique_words_ignores_case_and_punctuation() {
        assert_eq!(unique_words(["The price, the PRICE!", "price?"]), 2);
    }

    #[test]
    fn test_classify_question() {
        assert_eq!(classify_question("Thanks for joining."), None);
        assert_eq!(
            classify_question("Could you explain that a bit further?"),
            Some(QuestionType::Probing)
        );
        assert_eq!(
            classify_question("What do you value most?"),
            Some(QuestionType::OpenEnded)
        );
        assert_eq!(
            classify_question("Do you shop online?"),
            Some(QuestionType::Closed)
        );
    }

    #[test]
    fn test_question_type_counts_only_host_turns() {
        let mut record = InteractionRecord::new();
        record.append("Moderator", "How do you feel about it?", false);
        record.append("R001", "Why do you ask?", false);
        record.append("Moderator", "Tell me more about that?", false);
        record.append("Moderator", "Is it expensive?", false);

        let counts = question_type_counts(&record, "Moderator");
        assert_eq!(counts.open_ended, 1);
        assert_eq!(counts.probing, 1);
        assert_eq!(counts.closed, 1);
    }
}
