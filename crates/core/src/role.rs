//! Role specifications
//!
//! A role is an immutable instruction template plus a kind tag. The
//! generation capability is provided by pairing a `RoleSpec` with a
//! generation client; roles themselves hold no client state.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Conversational position of an interaction agent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InteractorRole {
    Moderator,
    Interviewer,
    Respondent,
    Participant,
}

impl InteractorRole {
    /// Whether this role asks the questions in a turn-taking interaction.
    pub fn is_host(&self) -> bool {
        matches!(self, InteractorRole::Moderator | InteractorRole::Interviewer)
    }
}

/// Tagged role variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", content = "as", rename_all = "snake_case")]
pub enum RoleKind {
    Designer,
    EntityGenerator,
    Interactor(InteractorRole),
    Analyst,
}

impl fmt::Display for RoleKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RoleKind::Designer => write!(f, "designer"),
            RoleKind::EntityGenerator => write!(f, "entity_generator"),
            RoleKind::Interactor(InteractorRole::Moderator) => write!(f, "moderator"),
            RoleKind::Interactor(InteractorRole::Interviewer) => write!(f, "interviewer"),
            RoleKind::Interactor(InteractorRole::Respondent) => write!(f, "respondent"),
            RoleKind::Interactor(InteractorRole::Participant) => write!(f, "participant"),
            RoleKind::Analyst => write!(f, "analyst"),
        }
    }
}

/// Immutable role definition used for every call made on behalf of a role.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleSpec {
    kind: RoleKind,
    name: String,
    instructions: String,
}

impl RoleSpec {
    pub fn new(kind: RoleKind, name: impl Into<String>, instructions: impl Into<String>) -> Self {
        Self {
            kind,
            name: name.into(),
            instructions: instructions.into(),
        }
    }

    pub fn designer(instructions: impl Into<String>) -> Self {
        Self::new(RoleKind::Designer, "Designer", instructions)
    }

    pub fn entity_generator(instructions: impl Into<String>) -> Self {
        Self::new(RoleKind::EntityGenerator, "EntityGenerator", instructions)
    }

    pub fn interactor(
        role: InteractorRole,
        name: impl Into<String>,
        instructions: impl Into<String>,
    ) -> Self {
        Self::new(RoleKind::Interactor(role), name, instructions)
    }

    pub fn analyst(instructions: impl Into<String>) -> Self {
        Self::new(RoleKind::Analyst, "Analyst", instructions)
    }

    pub fn kind(&self) -> RoleKind {
        self.kind
    }

    /// Speaker label used in transcripts.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// System-level instructions sent with every prompt for this role.
    pub fn instructions(&self) -> &str {
        &self.instructions
    }
}
