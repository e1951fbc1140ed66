use serde::{Deserialize, Serialize};
use std::fmt;

// ---------------------------------------------------------------------------
// ArtifactKind
// ---------------------------------------------------------------------------

/// One generated artifact, and the step that produces it.
///
/// Declaration order is pipeline order: every kind's prerequisites come
/// before it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactKind {
    Plan,
    DataObjects,
    ActorObjects,
    ExternalSystems,
    Workflow,
    StateTransitions,
    UseCaseTable,
    UseCaseSpecs,
    PermissionMatrix,
}

/// Something a step needs before it may run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Requirement {
    Transcript,
    Artifact(ArtifactKind),
    /// At least one use case parsed out of the use case table.
    UseCases,
}

impl Requirement {
    pub fn label(self) -> &'static str {
        match self {
            Requirement::Transcript => "transcript",
            Requirement::Artifact(k) => k.as_str(),
            Requirement::UseCases => "use_cases",
        }
    }
}

impl ArtifactKind {
    pub fn all() -> &'static [ArtifactKind] {
        &[
            ArtifactKind::Plan,
            ArtifactKind::DataObjects,
            ArtifactKind::ActorObjects,
            ArtifactKind::ExternalSystems,
            ArtifactKind::Workflow,
            ArtifactKind::StateTransitions,
            ArtifactKind::UseCaseTable,
            ArtifactKind::UseCaseSpecs,
            ArtifactKind::PermissionMatrix,
        ]
    }

    /// Order in which results are shown on the page and in exports.
    pub fn display_order() -> &'static [ArtifactKind] {
        Self::all()
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ArtifactKind::Plan => "plan",
            ArtifactKind::DataObjects => "data_objects",
            ArtifactKind::ActorObjects => "actor_objects",
            ArtifactKind::ExternalSystems => "external_systems",
            ArtifactKind::Workflow => "workflow",
            ArtifactKind::StateTransitions => "state_transitions",
            ArtifactKind::UseCaseTable => "use_case_table",
            ArtifactKind::UseCaseSpecs => "use_case_specs",
            ArtifactKind::PermissionMatrix => "permission_matrix",
        }
    }

    pub fn heading(self) -> &'static str {
        match self {
            ArtifactKind::Plan => "Generated Requirement Plan",
            ArtifactKind::DataObjects => "Data Objects Table",
            ArtifactKind::ActorObjects => "Actor Objects Table",
            ArtifactKind::ExternalSystems => "External Systems Table",
            ArtifactKind::Workflow => "Generated User Workflow",
            ArtifactKind::StateTransitions => "Generated State Transitions",
            ArtifactKind::UseCaseTable => "Generated Use Case Table",
            ArtifactKind::UseCaseSpecs => "Generated Use Case Specifications",
            ArtifactKind::PermissionMatrix => "Generated Permission Matrix",
        }
    }

    pub fn button_label(self) -> &'static str {
        match self {
            ArtifactKind::Plan => "Generate Requirement Plan",
            ArtifactKind::DataObjects => "Generate Data Objects Table",
            ArtifactKind::ActorObjects => "Generate Actor Objects Table",
            ArtifactKind::ExternalSystems => "Generate External System Objects Table",
            ArtifactKind::Workflow => "Generate Workflow",
            ArtifactKind::StateTransitions => "Generate State Transition",
            ArtifactKind::UseCaseTable => "Generate Use Case Table",
            ArtifactKind::UseCaseSpecs => "Generate Use Case Specs",
            ArtifactKind::PermissionMatrix => "Generate Permission Matrix",
        }
    }

    /// What must be present before the step's button is offered.
    pub fn gate(self) -> &'static [Requirement] {
        use ArtifactKind::*;
        use Requirement::{Artifact, Transcript, UseCases};
        match self {
            Plan => &[Transcript],
            DataObjects | ActorObjects | ExternalSystems => &[Artifact(Plan)],
            Workflow => &[Artifact(Plan), Artifact(ActorObjects)],
            StateTransitions => &[Artifact(Workflow), Artifact(DataObjects)],
            UseCaseTable => &[Artifact(StateTransitions), Artifact(ActorObjects)],
            UseCaseSpecs => &[Artifact(UseCaseTable), UseCases],
            PermissionMatrix => &[Artifact(UseCaseTable), Artifact(ActorObjects)],
        }
    }

    /// Earlier artifacts whose text is interpolated into this step's prompt.
    pub fn inputs(self) -> &'static [ArtifactKind] {
        use ArtifactKind::*;
        match self {
            Plan | UseCaseSpecs => &[],
            DataObjects | ActorObjects | ExternalSystems => &[Plan],
            Workflow | UseCaseTable => &[Plan, ActorObjects],
            StateTransitions => &[Plan, DataObjects],
            PermissionMatrix => &[ActorObjects, UseCaseTable],
        }
    }
}

impl fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ArtifactKind {
    type Err = crate::error::SimonError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase().replace('-', "_");
        ArtifactKind::all()
            .iter()
            .copied()
            .find(|k| k.as_str() == normalized)
            .ok_or_else(|| crate::error::SimonError::UnknownArtifact(s.to_string()))
    }
}

// ---------------------------------------------------------------------------
// UseCase
// ---------------------------------------------------------------------------

/// One row of the use case table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UseCase {
    #[serde(rename = "UC_ID", alias = "uc_id", default)]
    pub id: String,
    #[serde(rename = "UC_Name", alias = "uc_name")]
    pub name: String,
    #[serde(rename = "Description", alias = "description", default)]
    pub description: String,
}

/// The generated specification for one use case. `error` is set instead of
/// `content` when the model call for that use case failed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UseCaseSpec {
    pub use_case: UseCase,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl UseCaseSpec {
    pub fn is_ok(&self) -> bool {
        self.content.is_some()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
