use crate::error::Result;
use crate::io::{atomic_write, ensure_dir};
use crate::pipeline::SPEC_ERROR_TEXT;
use crate::session::Session;
use crate::types::ArtifactKind;
use std::fmt::Write as _;
use std::path::{Path, PathBuf};

/// One markdown document holding every generated artifact in display order.
pub fn render_markdown(session: &Session, title: &str) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "# {title}\n");
    match &session.transcript {
        Some(t) => {
            let _ = writeln!(out, "_Transcript: {}_\n", t.source_name);
        }
        None => out.push_str("_No transcript loaded._\n\n"),
    }

    for &kind in ArtifactKind::display_order() {
        let Some(record) = session.artifact(kind) else {
            continue;
        };
        let _ = writeln!(out, "### {}\n", kind.heading());
        if kind == ArtifactKind::UseCaseSpecs && !session.use_case_specs.is_empty() {
            for spec in &session.use_case_specs {
                let _ = writeln!(
                    out,
                    "#### {} {}\n\n{}\n",
                    spec.use_case.id,
                    spec.use_case.name,
                    spec.content.as_deref().unwrap_or(SPEC_ERROR_TEXT).trim_end()
                );
            }
        } else {
            let _ = writeln!(out, "{}\n", record.content.trim_end());
        }
    }

    out.truncate(out.trim_end().len());
    out.push('\n');
    out
}

/// Write `<key>.md` per artifact plus `transcript.txt` into `dir`.
/// Returns the written paths.
pub fn write_dir(session: &Session, dir: &Path) -> Result<Vec<PathBuf>> {
    ensure_dir(dir)?;
    let mut written = Vec::new();

    if let Some(t) = &session.transcript {
        let path = dir.join("transcript.txt");
        atomic_write(&path, t.text.as_bytes())?;
        written.push(path);
    }

    for (kind, record) in &session.artifacts {
        let path = dir.join(format!("{}.md", kind.as_str()));
        let body = format!("# {}\n\n{}\n", kind.heading(), record.content.trim_end());
        atomic_write(&path, body.as_bytes())?;
        written.push(path);
    }

    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::ArtifactRecord;
    use crate::types::{UseCase, UseCaseSpec};
    use tempfile::TempDir;

    fn sample() -> Session {
        let mut s = Session::new();
        s.set_transcript(crate::transcript::load("standup.docx.txt", b"hello").unwrap());
        s.store(ArtifactKind::Workflow, ArtifactRecord::new("flow\n\n", "m"));
        s.store(ArtifactKind::Plan, ArtifactRecord::new("plan", "m"));
        s
    }

    #[test]
    fn markdown_follows_display_order() {
        let md = render_markdown(&sample(), "Portal");
        assert!(md.starts_with("# Portal\n\n_Transcript: standup.docx.txt_"));
        let plan = md.find("### Generated Requirement Plan").unwrap();
        let flow = md.find("### Generated User Workflow").unwrap();
        assert!(plan < flow);
        assert!(!md.contains("Data Objects Table"));
        assert!(md.ends_with("flow\n"));
    }

    #[test]
    fn specs_are_listed_per_use_case() {
        let mut s = sample();
        s.store(ArtifactKind::UseCaseSpecs, ArtifactRecord::new("combined", "m"));
        s.set_use_case_specs(vec![
            UseCaseSpec {
                use_case: UseCase {
                    id: "UC-1".into(),
                    name: "Login".into(),
                    description: String::new(),
                },
                content: Some("| Objective | x |".into()),
                error: None,
            },
            UseCaseSpec {
                use_case: UseCase {
                    id: "UC-2".into(),
                    name: "Logout".into(),
                    description: String::new(),
                },
                content: None,
                error: Some("timeout".into()),
            },
        ]);
        let md = render_markdown(&s, "P");
        assert!(md.contains("#### UC-1 Login\n\n| Objective | x |"));
        assert!(md.contains("#### UC-2 Logout\n\nError generating specifications."));
        assert!(!md.contains("combined"));
    }

    #[test]
    fn write_dir_creates_one_file_per_artifact() {
        let dir = TempDir::new().unwrap();
        let out = dir.path().join("out");
        let written = write_dir(&sample(), &out).unwrap();
        assert_eq!(written.len(), 3);
        assert_eq!(
            std::fs::read_to_string(out.join("transcript.txt")).unwrap(),
            "hello"
        );
        assert_eq!(
            std::fs::read_to_string(out.join("plan.md")).unwrap(),
            "# Generated Requirement Plan\n\nplan\n"
        );
        assert!(out.join("workflow.md").exists());
    }

    #[test]
    fn write_dir_names_files_by_step_key() {
        let dir = TempDir::new().unwrap();
        let mut s = Session::new();
        s.store(ArtifactKind::DataObjects, ArtifactRecord::new("| 1 | User | d |", "m"));
        s.store(ArtifactKind::UseCaseSpecs, ArtifactRecord::new("specs", "m"));

        let written = write_dir(&s, dir.path()).unwrap();
        let names: Vec<_> = written
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["data_objects.md", "use_case_specs.md"]);
        assert!(!dir.path().join("transcript.txt").exists());
    }
}
