//! Stage Artifacts
//!
//! Each stage consumes the previous stage's artifact by value and produces
//! its own. Artifacts carry forward whatever later stages need, so no stage
//! reads anything besides its input and the run parameters.

use std::collections::BTreeMap;

use panelsim_core::{AnalysisArtifact, EntityProfile, InteractionRecord};
use panelsim_metrics::{FinalMetrics, QuestionTypeCounts, ResponseMetrics, SpeakerEngagement};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Implemented by every stage artifact so the controller can persist it and
/// record how many of its items were synthesized.
pub trait StageArtifact: Serialize {
    fn degraded_items(&self) -> usize;
}

// ============================================================================
// Design
// ============================================================================

/// Questionnaire (survey) or discussion guide (focus group / interview)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DesignArtifact {
    pub document: Value,
    #[serde(default)]
    pub degraded: bool,
}

impl DesignArtifact {
    pub fn title(&self) -> &str {
        ["survey_title", "title"]
            .iter()
            .find_map(|key| self.document.get(*key).and_then(Value::as_str))
            .unwrap_or("Untitled study")
    }
}

impl StageArtifact for DesignArtifact {
    fn degraded_items(&self) -> usize {
        usize::from(self.degraded)
    }
}

// ============================================================================
// Generate-Entities
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PopulationArtifact {
    pub design: DesignArtifact,
    pub entities: Vec<EntityProfile>,
}

impl PopulationArtifact {
    pub fn entity_ids(&self) -> Vec<String> {
        self.entities.iter().map(|e| e.entity_id.clone()).collect()
    }
}

impl StageArtifact for PopulationArtifact {
    fn degraded_items(&self) -> usize {
        self.entities.iter().filter(|e| e.degraded).count()
    }
}

// ============================================================================
// Collect-Interactions
// ============================================================================

/// One respondent's answer set
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SurveyResponse {
    pub respondent_id: String,
    pub index: usize,
    /// `[{question_id, response}, ...]`
    pub answers: Vec<Value>,
    /// Required questions the respondent did not answer
    #[serde(default)]
    pub missing_required: Vec<String>,
    #[serde(default)]
    pub degraded: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Raw material gathered in the collection stage
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum Collected {
    /// Independent answer sets, one per respondent, in entity order
    Survey { responses: Vec<SurveyResponse> },
    /// A single shared conversation led by `host`
    Conversation {
        host: String,
        transcript: InteractionRecord,
    },
}

impl Collected {
    pub fn degraded_items(&self) -> usize {
        match self {
            Collected::Survey { responses } => responses.iter().filter(|r| r.degraded).count(),
            Collected::Conversation { transcript, .. } => transcript.degraded_turns(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollectionArtifact {
    pub design: DesignArtifact,
    pub entities: Vec<EntityProfile>,
    pub collected: Collected,
}

impl StageArtifact for CollectionArtifact {
    fn degraded_items(&self) -> usize {
        self.collected.degraded_items()
    }
}

// ============================================================================
// Process
// ============================================================================

/// Per-question aggregation of survey answers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregatedQuestion {
    pub text: String,
    #[serde(rename = "type")]
    pub question_type: String,
    pub required: bool,
    #[serde(default)]
    pub options: Vec<String>,
    #[serde(default)]
    pub scale_labels: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scale_points: Option<u64>,
    pub responses: Vec<QuestionResponse>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuestionResponse {
    pub respondent_id: String,
    pub response: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SurveyMetadata {
    pub survey_title: String,
    pub simulation_id: String,
    pub num_respondents_processed: usize,
    /// Invalid, unknown or missing answers per respondent
    pub respondent_error_counts: BTreeMap<String, usize>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SurveySummary {
    pub survey_metadata: SurveyMetadata,
    /// Keyed by question id
    pub questions_aggregated: BTreeMap<String, AggregatedQuestion>,
    /// Question ids in questionnaire order
    pub question_order: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranscriptSummary {
    pub host: String,
    pub turn_count: usize,
    pub engagement: BTreeMap<String, SpeakerEngagement>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response_metrics: Option<ResponseMetrics>,
    pub question_types: QuestionTypeCounts,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum ProcessedData {
    Survey(SurveySummary),
    Conversation(TranscriptSummary),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessedArtifact {
    pub design: DesignArtifact,
    pub entities: Vec<EntityProfile>,
    pub collected: Collected,
    pub processed: ProcessedData,
}

impl StageArtifact for ProcessedArtifact {
    // Processing is deterministic; nothing in it is synthesized
    fn degraded_items(&self) -> usize {
        0
    }
}

// ============================================================================
// Analyze
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalyzedArtifact {
    pub design: DesignArtifact,
    pub entities: Vec<EntityProfile>,
    pub collected: Collected,
    pub processed: ProcessedData,
    pub analysis: AnalysisArtifact,
    pub metrics: FinalMetrics,
}

impl StageArtifact for AnalyzedArtifact {
    fn degraded_items(&self) -> usize {
        usize::from(self.analysis.degraded)
    }
}

// ============================================================================
// Report
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportArtifact {
    pub markdown: String,
    /// Degraded items across the whole run, by stage name
    pub degraded_by_stage: BTreeMap<String, usize>,
    pub metrics: FinalMetrics,
}

impl StageArtifact for ReportArtifact {
    fn degraded_items(&self) -> usize {
        0
    }
}
