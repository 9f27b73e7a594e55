//! Markdown Report
//!
//! Renders the final human-facing report from the analyzed artifact. All
//! figures come from the reconciled metrics, never from the analyst's own
//! numbers.

use std::collections::BTreeMap;

use panelsim_core::RunParameters;
use panelsim_metrics::{FinalMetrics, SentimentTriple};
use serde_json::Value;

use super::artifacts::{AggregatedQuestion, AnalyzedArtifact, Collected, ProcessedData};

fn percent(value: f64) -> String {
    format!("{:.1}%", value * 100.0)
}

fn sentiment_row(label: &str, triple: &SentimentTriple) -> String {
    format!(
        "| {} | {} | {} | {} |\n",
        label,
        percent(triple.positive),
        percent(triple.neutral),
        percent(triple.negative)
    )
}

fn value_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

pub fn render_report(
    run_id: &str,
    parameters: &RunParameters,
    analyzed: &AnalyzedArtifact,
    degraded_by_stage: &BTreeMap<String, usize>,
) -> String {
    let mut out = String::new();
    let metrics = &analyzed.metrics;

    out.push_str(&format!("# {}\n\n", analyzed.design.title()));
    out.push_str(&format!("- **Run:** `{}`\n", run_id));
    out.push_str(&format!("- **Kind:** {}\n", parameters.kind));
    out.push_str(&format!("- **Topic:** {}\n", parameters.topic));
    out.push_str(&format!("- **Target audience:** {}\n", parameters.target_audience));
    if !parameters.objectives.trim().is_empty() {
        out.push_str(&format!("- **Objectives:** {}\n", parameters.objectives));
    }
    out.push_str(&format!("- **Entities:** {}\n", analyzed.entities.len()));
    out.push('\n');

    let total_degraded: usize = degraded_by_stage.values().sum();
    if total_degraded > 0 {
        out.push_str("> Some items were synthesized after generation failed:\n");
        for (stage, count) in degraded_by_stage.iter().filter(|(_, c)| **c > 0) {
            out.push_str(&format!("> - {}: {}\n", stage, count));
        }
        out.push('\n');
    }

    out.push_str("## Analysis\n\n");
    out.push_str(analyzed.analysis.narrative.trim());
    out.push_str("\n\n");

    if !metrics.themes.is_empty() {
        out.push_str("### Themes\n\n");
        for theme in &metrics.themes {
            out.push_str(&format!("- {}\n", value_text(theme)));
        }
        out.push('\n');
    }

    render_metrics(&mut out, metrics);

    match &analyzed.processed {
        ProcessedData::Survey(summary) => {
            out.push_str("## Questions\n\n");
            for id in &summary.question_order {
                if let Some(question) = summary.questions_aggregated.get(id) {
                    render_question(&mut out, id, question);
                }
            }
            if !summary.survey_metadata.respondent_error_counts.is_empty() {
                out.push_str("### Respondent errors\n\n");
                for (respondent, count) in &summary.survey_metadata.respondent_error_counts {
                    out.push_str(&format!("- {}: {}\n", respondent, count));
                }
                out.push('\n');
            }
        }
        ProcessedData::Conversation(summary) => {
            let counts = &summary.question_types;
            out.push_str(&format!(
                "## Questioning\n\n{} turns. {} asked {} questions: {} open-ended, {} closed, {} probing.\n\n",
                summary.turn_count,
                summary.host,
                counts.total(),
                counts.open_ended,
                counts.closed,
                counts.probing,
            ));
        }
    }

    if let Collected::Conversation { transcript, .. } = &analyzed.collected {
        out.push_str("## Transcript\n\n");
        for turn in transcript.turns() {
            let marker = if turn.degraded { " _(synthesized)_" } else { "" };
            out.push_str(&format!("**{}:** {}{}\n\n", turn.speaker, turn.content, marker));
        }
    }

    out
}

fn render_metrics(out: &mut String, metrics: &FinalMetrics) {
    out.push_str("## Metrics\n\n");

    if metrics.sentiment.is_some() || !metrics.entity_sentiment.is_empty() {
        out.push_str("| Sentiment | Positive | Neutral | Negative |\n|---|---|---|---|\n");
        if let Some(overall) = &metrics.sentiment {
            out.push_str(&sentiment_row("Overall", overall));
        }
        for (entity, triple) in &metrics.entity_sentiment {
            out.push_str(&sentiment_row(entity, triple));
        }
        out.push('\n');
    }

    if !metrics.engagement.is_empty() {
        out.push_str("| Speaker | Words | Responses | Score |\n|---|---|---|---|\n");
        for (speaker, engagement) in &metrics.engagement {
            out.push_str(&format!(
                "| {} | {} | {} | {} |\n",
                speaker,
                engagement.word_count,
                engagement.response_count,
                engagement.interaction_score,
            ));
        }
        out.push('\n');
    }

    if let Some(responses) = &metrics.response_metrics {
        out.push_str(&format!(
            "Responses: {} ({} words, {:.1} avg, {} unique, {} hesitations)\n\n",
            responses.response_count,
            responses.total_word_count,
            responses.avg_response_length,
            responses.unique_words,
            responses.hesitation_count,
        ));
    }

    if let Some(demographics) = &metrics.demographics {
        out.push_str("### Demographics\n\n");
        out.push_str(&format!(
            "- Entities: {} ({} synthesized)\n",
            demographics.entity_count,
            demographics.degraded_profiles,
        ));
        if let Some(age) = &demographics.age {
            out.push_str(&format!(
                "- Age: avg {:.1}, median {:.1}, range {}-{}\n",
                age.average,
                age.median,
                age.min,
                age.max,
            ));
        }
        if let Some(income) = &demographics.income {
            out.push_str(&format!(
                "- Income: avg {:.0}, median {:.0}\n",
                income.average,
                income.median,
            ));
        }
        for (gender, count) in &demographics.gender_distribution {
            out.push_str(&format!("- {}: {}\n", gender, count));
        }
        out.push('\n');
    }

    if !metrics.discrepancies.is_empty() {
        out.push_str("### Corrected figures\n\n| Field | Reported | Computed |\n|---|---|---|\n");
        for discrepancy in &metrics.discrepancies {
            out.push_str(&format!(
                "| `{}` | {} | {} |\n",
                discrepancy.field,
                discrepancy.reported,
                discrepancy.computed,
            ));
        }
        out.push('\n');
    }

    if !metrics.substituted.is_empty() {
        out.push_str(&format!(
            "Defaults substituted for: {}\n\n",
            metrics
                .substituted
                .iter()
                .map(|f| format!("`{}`", f))
                .collect::<Vec<_>>()
                .join(", "),
        ));
    }
}

/// Count choices for closed questions; list open-ended answers.
fn render_question(out: &mut String, id: &str, question: &AggregatedQuestion) {
    out.push_str(&format!("### {}: {}\n\n", id, question.text));
    out.push_str(&format!(
        "_{}, {} responses_\n\n",
        question.question_type,
        question.responses.len(),
    ));

    if question.question_type == "open_ended" {
        for response in &question.responses {
            if let Some(text) = response.response.as_str().filter(|t| !t.trim().is_empty()) {
                out.push_str(&format!("- **{}:** {}\n", response.respondent_id, text));
            }
        }
        out.push('\n');
        return;
    }

    let mut tally: BTreeMap<String, usize> = BTreeMap::new();
    for response in &question.responses {
        match &response.response {
            Value::Array(items) => {
                for item in items {
                    *tally.entry(value_text(item)).or_default() += 1;
                }
            }
            Value::Null => {}
            Value::String(s) if s.is_empty() => {}
            other => *tally.entry(value_text(other)).or_default() += 1,
        }
    }

    // Listed options first, in questionnaire order, then anything else given
    let listed: Vec<&String> = if question.options.is_empty() {
        question.scale_labels.iter().collect()
    } else {
        question.options.iter().collect()
    };
    for option in &listed {
        let count = tally.remove(option.as_str()).unwrap_or(0);
        out.push_str(&format!("- {}: {}\n", option, count));
    }
    for (other, count) in tally {
        out.push_str(&format!("- {} _(unlisted)_: {}\n", other, count));
    }
    out.push('\n');
}
