use crate::output::print_json;
use simon_core::config::Config;
use simon_core::pipeline;
use simon_core::session::Session;
use simon_core::types::ArtifactKind;
use std::path::Path;

pub fn run(root: &Path, id: &str, kind: &str, json: bool) -> anyhow::Result<()> {
    let kind: ArtifactKind = kind.parse()?;
    let config = Config::load_or_default(root)?;
    let mut session = Session::load(root, id)?;

    let missing = session.missing_prerequisites(kind);
    if !missing.is_empty() {
        let labels: Vec<_> = missing.iter().map(|r| r.label()).collect();
        anyhow::bail!(
            "cannot generate {kind}: missing {} (see `simon session show {id}`)",
            labels.join(", ")
        );
    }

    let client = super::client(&config)?;
    let progress = super::StderrProgress { quiet: json };
    let rt = tokio::runtime::Runtime::new()?;
    let outcome = rt.block_on(pipeline::run_step(
        &client,
        &config,
        &mut session,
        kind,
        &progress,
    ))?;
    session.save(root)?;

    if json {
        return print_json(&serde_json::json!({
            "outcome": outcome,
            "artifact": session.artifact(kind),
        }));
    }

    if let Some(record) = session.artifact(kind) {
        println!("## {}\n\n{}", kind.heading(), record.content.trim_end());
    }
    if outcome.failures > 0 {
        eprintln!(
            "warning: {} of {} calls failed",
            outcome.failures, outcome.calls
        );
    }
    Ok(())
}
