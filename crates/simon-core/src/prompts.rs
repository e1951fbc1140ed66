//! Fixed instruction templates for every step of the chain.
//!
//! Each step sends exactly two messages: a system instruction describing the
//! artifact to produce and a user message carrying the earlier outputs it
//! builds on.

use crate::error::{Result, SimonError};
use crate::types::{ArtifactKind, UseCase};
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Prompt {
    pub system: String,
    pub user: String,
}

/// The text a prompt may draw on.
#[derive(Debug, Default, Clone)]
pub struct PromptInputs<'a> {
    pub transcript: Option<&'a str>,
    pub artifacts: BTreeMap<ArtifactKind, &'a str>,
}

impl<'a> PromptInputs<'a> {
    fn artifact(&self, kind: ArtifactKind) -> Result<&'a str> {
        self.artifacts
            .get(&kind)
            .copied()
            .ok_or_else(|| SimonError::ArtifactNotFound(kind.as_str().to_string()))
    }

    fn transcript(&self) -> Result<&'a str> {
        self.transcript.ok_or(SimonError::TranscriptMissing)
    }
}

const PLAN_INSTRUCTION: &str = "Generate a high-level software requirements document based on \
the transcript text. The plan describes the overview of the system functions or business \
processes. Be sure to include Objective and Requirements for each component. Keep the plan \
concise and relevant to software functions.";

const TABLE_INSTRUCTION: &str = "Generate a table with three columns: item #, object, \
description, based on the requirement plan.";

const DATA_OBJECTS_HINT: &str = "List all data objects within the software system. For example, \
the data object can be Devices, Customer Profile, Product, Account, Case, Step-ABC.";

const ACTOR_OBJECTS_HINT: &str = "List all actors that directly interact with the software. For \
example actors can be Sensor, Worker, Customer, QC Specialist, Supervisor, etc.";

const EXTERNAL_SYSTEMS_HINT: &str = "List all external systems or services that the software \
will interact with. For example external system can be CRM, Active Directory, Sales Management \
System etc.";

const WORKFLOW_INSTRUCTION: &str = "Generate a detailed user workflow combining the requirements \
and actor interactions.
This section shows the flow of tasks or steps taken by the main actor(s) - the user of the \
software system, to complete a business process.
The actor's actions are shown in each business process stage of the system along with the \
conditions (if/else) under which it can move to the next stage or revert to the previous.";

const STATE_TRANSITIONS_INSTRUCTION: &str = "Generate state transition steps for the software \
based on the requirements plan and data objects.";

const USE_CASE_TABLE_INSTRUCTION: &str = "Generate a detailed use case table including columns: \
UC_ID, UC_Name (e.g User Login, View Error details), and Description to describe each actor's \
interactions with the system based on the requirements plan. Return the table in markdown.";

const PERMISSION_MATRIX_INSTRUCTION: &str = "Generate a permission matrix showing which actors \
have access to which use cases.
Columns are Actor and rows are UC name.
Cell values:
\"O\" means that user has permission on corresponding function. For more information about what \
the actor can do on that function, please refer to corresponding use case.
\"O*\" means that user has permission on corresponding function on the item they created. For \
more information about what the actor can do on that function, please refer to corresponding use \
case.
\"X\" means that user does not have permission on corresponding function.";

const USE_CASE_SPEC_INSTRUCTION: &str = "Generate a concise specifications table including the \
following rows:
Objective, Actor, Trigger, Pre-condition, Post-condition, Acceptance Criteria for the following \
use case.";

const USE_CASE_JSON_INSTRUCTION: &str = "Parse the markdown table into JSON. Respond with an \
object of the form {\"use_cases\": [{\"UC_ID\": \"...\", \"UC_Name\": \"...\", \"Description\": \
\"...\"}]} containing one entry per table row.";

/// Build the prompt for a single-call step. [`ArtifactKind::UseCaseSpecs`]
/// is per use case; see [`use_case_spec`].
pub fn build(kind: ArtifactKind, inputs: &PromptInputs<'_>) -> Result<Prompt> {
    let table = |hint: &str| -> Result<Prompt> {
        Ok(Prompt {
            system: format!("{TABLE_INSTRUCTION} {hint}"),
            user: inputs.artifact(ArtifactKind::Plan)?.to_string(),
        })
    };

    match kind {
        ArtifactKind::Plan => Ok(Prompt {
            system: PLAN_INSTRUCTION.to_string(),
            user: format!(
                "Below is the transcript from the meeting:\n {}",
                inputs.transcript()?
            ),
        }),
        ArtifactKind::DataObjects => table(DATA_OBJECTS_HINT),
        ArtifactKind::ActorObjects => table(ACTOR_OBJECTS_HINT),
        ArtifactKind::ExternalSystems => table(EXTERNAL_SYSTEMS_HINT),
        ArtifactKind::Workflow => Ok(Prompt {
            system: WORKFLOW_INSTRUCTION.to_string(),
            user: labelled(inputs, &[
                ("Requirements Plan", ArtifactKind::Plan),
                ("Actor Objects", ArtifactKind::ActorObjects),
            ])?,
        }),
        ArtifactKind::StateTransitions => Ok(Prompt {
            system: STATE_TRANSITIONS_INSTRUCTION.to_string(),
            user: labelled(inputs, &[
                ("Requirements Plan", ArtifactKind::Plan),
                ("Data Objects", ArtifactKind::DataObjects),
            ])?,
        }),
        ArtifactKind::UseCaseTable => Ok(Prompt {
            system: USE_CASE_TABLE_INSTRUCTION.to_string(),
            user: labelled(inputs, &[
                ("Requirements Plan", ArtifactKind::Plan),
                ("Actor Objects", ArtifactKind::ActorObjects),
            ])?,
        }),
        ArtifactKind::PermissionMatrix => Ok(Prompt {
            system: PERMISSION_MATRIX_INSTRUCTION.to_string(),
            user: labelled(inputs, &[
                ("Actor Objects", ArtifactKind::ActorObjects),
                ("Use Case Table", ArtifactKind::UseCaseTable),
            ])?,
        }),
        ArtifactKind::UseCaseSpecs => Err(SimonError::UnknownArtifact(
            "use_case_specs is built per use case".to_string(),
        )),
    }
}

/// `Label:\n{text}` sections joined by newlines.
fn labelled(inputs: &PromptInputs<'_>, sections: &[(&str, ArtifactKind)]) -> Result<String> {
    let parts = sections
        .iter()
        .map(|(label, kind)| Ok(format!("{label}:\n{}", inputs.artifact(*kind)?)))
        .collect::<Result<Vec<_>>>()?;
    Ok(parts.join("\n"))
}

/// Specification prompt for one use case.
pub fn use_case_spec(use_case: &UseCase) -> Prompt {
    Prompt {
        system: USE_CASE_SPEC_INSTRUCTION.to_string(),
        user: format!(
            "Use Case Name: {}\nDescription: {}",
            use_case.name, use_case.description
        ),
    }
}

/// Ask the model to turn a markdown use case table into JSON.
pub fn use_case_json(table_markdown: &str) -> Prompt {
    Prompt {
        system: USE_CASE_JSON_INSTRUCTION.to_string(),
        user: table_markdown.to_string(),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
