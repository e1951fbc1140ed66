use crate::output::{print_fields, print_json, print_table};
use clap::Subcommand;
use simon_core::session::Session;
use std::path::{Path, PathBuf};

#[derive(Subcommand)]
pub enum SessionSubcommand {
    /// Create a session, optionally loading a transcript into it
    New {
        /// .docx or plain text file
        file: Option<PathBuf>,
    },
    /// List sessions, newest first
    List,
    /// Show a session's transcript and step status
    Show { id: String },
    /// Delete a session
    Delete { id: String },
}

pub fn run(root: &Path, subcmd: SessionSubcommand, json: bool) -> anyhow::Result<()> {
    match subcmd {
        SessionSubcommand::New { file } => new(root, file.as_deref(), json),
        SessionSubcommand::List => list(root, json),
        SessionSubcommand::Show { id } => show(root, &id, json),
        SessionSubcommand::Delete { id } => delete(root, &id, json),
    }
}

fn new(root: &Path, file: Option<&Path>, json: bool) -> anyhow::Result<()> {
    let mut session = Session::new();
    if let Some(file) = file {
        session.set_transcript(super::read_transcript(file)?);
    }
    session.save(root)?;

    if json {
        print_json(&session.summary())
    } else {
        println!("{}", session.id);
        Ok(())
    }
}

fn list(root: &Path, json: bool) -> anyhow::Result<()> {
    let sessions = Session::list(root)?;
    if json {
        let summaries: Vec<_> = sessions.iter().map(Session::summary).collect();
        return print_json(&summaries);
    }
    if sessions.is_empty() {
        println!("No sessions.");
        return Ok(());
    }

    let rows = sessions
        .iter()
        .map(|s| {
            vec![
                s.id.clone(),
                s.transcript
                    .as_ref()
                    .map(|t| t.source_name.clone())
                    .unwrap_or_else(|| "-".to_string()),
                format!("{}/{}", s.artifacts.len(), simon_core::types::ArtifactKind::all().len()),
                s.updated_at.format("%Y-%m-%d %H:%M").to_string(),
            ]
        })
        .collect();
    print_table(&["ID", "TRANSCRIPT", "ARTIFACTS", "UPDATED"], rows);
    Ok(())
}

fn show(root: &Path, id: &str, json: bool) -> anyhow::Result<()> {
    let summary = Session::load(root, id)?.summary();
    if json {
        return print_json(&summary);
    }

    let transcript = summary
        .transcript
        .as_ref()
        .map(|t| format!("{} ({} lines)", t.source_name, t.lines))
        .unwrap_or_else(|| "none".to_string());
    print_fields(&[
        ("id", summary.id.clone()),
        ("created", summary.created_at.to_rfc3339()),
        ("transcript", transcript),
        ("use cases", summary.use_case_count.to_string()),
    ]);
    println!();

    let rows = summary
        .steps
        .iter()
        .map(|st| {
            let status = if st.generated() {
                if st.stale { "stale" } else { "done" }
            } else if st.available {
                "ready"
            } else {
                "blocked"
            };
            vec![
                st.kind.to_string(),
                status.to_string(),
                if st.missing.is_empty() {
                    String::new()
                } else {
                    format!("needs {}", st.missing.join(", "))
                },
            ]
        })
        .collect();
    print_table(&["STEP", "STATUS", ""], rows);
    Ok(())
}

fn delete(root: &Path, id: &str, json: bool) -> anyhow::Result<()> {
    Session::delete(root, id)?;
    if json {
        print_json(&serde_json::json!({ "id": id, "deleted": true }))
    } else {
        println!("Deleted session {id}");
        Ok(())
    }
}
