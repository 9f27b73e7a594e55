//! Data Model
//!
//! Run bookkeeping and the artifacts that flow between pipeline stages:
//! entity profiles, interaction records (transcripts) and structured
//! analysis artifacts. Every artifact that can be produced by the fallback
//! path carries an explicit `degraded` flag that survives serialization.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{CoreError, CoreResult};

/// Upper bound on entities per run. Larger populations are a configuration error.
pub const MAX_ENTITIES: usize = 500;

// ============================================================================
// Simulation kind / stages
// ============================================================================

/// Which simulation variant a run executes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SimulationKind {
    /// Many independent respondents answer a fixed questionnaire (fan-out).
    Survey,
    /// One moderator and several participants in a shared discussion (sequential).
    FocusGroup,
    /// One interviewer and a single respondent (sequential).
    Interview,
}

impl fmt::Display for SimulationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SimulationKind::Survey => write!(f, "survey"),
            SimulationKind::FocusGroup => write!(f, "focus_group"),
            SimulationKind::Interview => write!(f, "interview"),
        }
    }
}

impl FromStr for SimulationKind {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().replace('-', "_").as_str() {
            "survey" => Ok(SimulationKind::Survey),
            "focus_group" | "focusgroup" => Ok(SimulationKind::FocusGroup),
            "interview" | "idi" => Ok(SimulationKind::Interview),
            other => Err(CoreError::config(format!("Unknown simulation kind: {}", other))),
        }
    }
}

/// The six ordered pipeline stages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageName {
    Design,
    GenerateEntities,
    CollectInteractions,
    Process,
    Analyze,
    Report,
}

impl StageName {
    /// All stages in execution order.
    pub const ALL: [StageName; 6] = [
        StageName::Design,
        StageName::GenerateEntities,
        StageName::CollectInteractions,
        StageName::Process,
        StageName::Analyze,
        StageName::Report,
    ];

    /// Stable key used for persisted artifacts.
    pub fn as_str(&self) -> &'static str {
        match self {
            StageName::Design => "design",
            StageName::GenerateEntities => "generate_entities",
            StageName::CollectInteractions => "collect_interactions",
            StageName::Process => "process",
            StageName::Analyze => "analyze",
            StageName::Report => "report",
        }
    }

    /// Zero-based position in the pipeline.
    pub fn index(&self) -> usize {
        Self::ALL.iter().position(|s| s == self).unwrap_or(0)
    }

    /// The stage that runs immediately before this one, if any.
    pub fn previous(&self) -> Option<StageName> {
        self.index().checked_sub(1).map(|i| Self::ALL[i])
    }
}

impl fmt::Display for StageName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StageName {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        StageName::ALL
            .iter()
            .copied()
            .find(|stage| stage.as_str() == s)
            .ok_or_else(|| CoreError::parse(format!("Unknown stage: {}", s)))
    }
}

/// Status of a single stage within a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageStatus {
    Pending,
    Running,
    Succeeded,
    Failed,
}

/// Overall status of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Pending,
    Running,
    Succeeded,
    Failed,
    Cancelled,
}

impl RunStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            RunStatus::Succeeded | RunStatus::Failed | RunStatus::Cancelled
        )
    }
}

// ============================================================================
// Run
// ============================================================================

/// Immutable input parameters of a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunParameters {
    pub kind: SimulationKind,
    pub topic: String,
    #[serde(default)]
    pub objectives: String,
    pub target_audience: String,
    /// Respondents / participants to generate. Interviews use exactly one.
    pub entity_count: usize,
    /// Discussion rounds (focus group) or questions (interview). Ignored by surveys.
    pub round_count: usize,
}

impl RunParameters {
    /// Reject parameters that make the run impossible. These are fatal
    /// configuration errors and are never retried.
    pub fn validate(&self) -> CoreResult<()> {
        if self.topic.trim().is_empty() {
            return Err(CoreError::config("topic is required"));
        }
        if self.target_audience.trim().is_empty() {
            return Err(CoreError::config("target_audience is required"));
        }
        if self.entity_count == 0 {
            return Err(CoreError::config("entity_count must be at least 1"));
        }
        if self.entity_count > MAX_ENTITIES {
            return Err(CoreError::config(format!(
                "entity_count {} exceeds the maximum of {}",
                self.entity_count, MAX_ENTITIES
            )));
        }
        if self.kind == SimulationKind::Interview && self.entity_count != 1 {
            return Err(CoreError::config(
                "interview runs require exactly one respondent",
            ));
        }
        if self.kind != SimulationKind::Survey && self.round_count == 0 {
            return Err(CoreError::config("round_count must be at least 1"));
        }
        Ok(())
    }
}

/// Bookkeeping for one stage of a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageRecord {
    pub stage: StageName,
    pub status: StageStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,
    /// Number of items in this stage's artifact produced by the fallback path.
    #[serde(default)]
    pub degraded_items: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl StageRecord {
    fn pending(stage: StageName) -> Self {
        Self {
            stage,
            status: StageStatus::Pending,
            started_at: None,
            finished_at: None,
            degraded_items: 0,
            error: None,
        }
    }
}

/// One end-to-end execution of the staged pipeline.
///
/// Created at pipeline start and mutated only by the stage controller.
/// Runs are persisted as manifests and never deleted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Run {
    pub id: String,
    pub parameters: RunParameters,
    pub status: RunStatus,
    pub stages: Vec<StageRecord>,
    pub started_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl Run {
    pub fn new(id: impl Into<String>, parameters: RunParameters) -> Self {
        Self {
            id: id.into(),
            parameters,
            status: RunStatus::Pending,
            stages: StageName::ALL.iter().map(|s| StageRecord::pending(*s)).collect(),
            started_at: Utc::now(),
            finished_at: None,
            error: None,
        }
    }

    pub fn stage(&self, stage: StageName) -> &StageRecord {
        &self.stages[stage.index()]
    }

    fn stage_mut(&mut self, stage: StageName) -> &mut StageRecord {
        &mut self.stages[stage.index()]
    }

    pub fn mark_running(&mut self) {
        self.status = RunStatus::Running;
    }

    pub fn mark_stage_running(&mut self, stage: StageName) {
        let record = self.stage_mut(stage);
        record.status = StageStatus::Running;
        record.started_at = Some(Utc::now());
    }

    pub fn mark_stage_succeeded(&mut self, stage: StageName, degraded_items: usize) {
        let record = self.stage_mut(stage);
        record.status = StageStatus::Succeeded;
        record.finished_at = Some(Utc::now());
        record.degraded_items = degraded_items;
    }

    pub fn mark_stage_failed(&mut self, stage: StageName, error: impl Into<String>) {
        let record = self.stage_mut(stage);
        record.status = StageStatus::Failed;
        record.finished_at = Some(Utc::now());
        record.error = Some(error.into());
    }

    /// Close the run with a terminal status.
    pub fn finish(&mut self, status: RunStatus, error: Option<String>) {
        self.status = status;
        self.error = error;
        self.finished_at = Some(Utc::now());
    }

    /// Stages that completed and therefore have a persisted artifact.
    pub fn succeeded_stages(&self) -> Vec<StageName> {
        self.stages
            .iter()
            .filter(|r| r.status == StageStatus::Succeeded)
            .map(|r| r.stage)
            .collect()
    }
}

// ============================================================================
// Artifacts
// ============================================================================

/// One simulated participant/respondent.
///
/// `profile` holds the nested structured record exactly as extracted (or
/// synthesized). The record is read-only after the populate stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityProfile {
    /// Position in the population; fan-out results are keyed by it.
    pub index: usize,
    pub entity_id: String,
    pub profile: Value,
    #[serde(default)]
    pub degraded: bool,
}

impl EntityProfile {
    pub fn new(index: usize, profile: Value, degraded: bool) -> Self {
        let entity_id = profile
            .get("entity_id")
            .and_then(Value::as_str)
            .filter(|id| !id.trim().is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| format!("E{:03}", index + 1));
        Self {
            index,
            entity_id,
            profile,
            degraded,
        }
    }

    /// Display name from the profile, falling back to the entity id.
    pub fn name(&self) -> &str {
        self.profile
            .get("name")
            .and_then(Value::as_str)
            .unwrap_or(&self.entity_id)
    }

    /// Read a string field by dotted path, e.g. `demographics.occupation`.
    pub fn field_str(&self, path: &str) -> Option<&str> {
        path.split('.')
            .try_fold(&self.profile, |value, key| value.get(key))
            .and_then(Value::as_str)
    }
}

/// A single utterance in a transcript.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Turn {
    pub sequence: usize,
    pub speaker: String,
    pub content: String,
    #[serde(default)]
    pub degraded: bool,
}

/// Ordered, append-only transcript.
///
/// Later turns are generated from the literal text of earlier ones, so the
/// sequence index is assigned on append and turns can never be reordered or
/// edited in place.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InteractionRecord {
    turns: Vec<Turn>,
}

impl InteractionRecord {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a turn and return its sequence index.
    pub fn append(
        &mut self,
        speaker: impl Into<String>,
        content: impl Into<String>,
        degraded: bool,
    ) -> usize {
        let sequence = self.turns.len();
        self.turns.push(Turn {
            sequence,
            speaker: speaker.into(),
            content: content.into(),
            degraded,
        });
        sequence
    }

    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    pub fn degraded_turns(&self) -> usize {
        self.turns.iter().filter(|t| t.degraded).count()
    }

    /// Distinct speakers in order of first appearance.
    pub fn speakers(&self) -> Vec<&str> {
        let mut seen: Vec<&str> = Vec::new();
        for turn in &self.turns {
            if !seen.contains(&turn.speaker.as_str()) {
                seen.push(turn.speaker.as_str());
            }
        }
        seen
    }

    /// `Speaker: content` lines, the form embedded into follow-up prompts.
    pub fn render(&self) -> String {
        self.turns
            .iter()
            .map(|t| format!("{}: {}", t.speaker, t.content))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Output of a stage that asked the backend to narrate and emit a structured block.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisArtifact {
    pub narrative: String,
    pub structured: Value,
    #[serde(default)]
    pub degraded: bool,
}
