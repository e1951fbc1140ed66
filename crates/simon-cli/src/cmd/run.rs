use crate::output::print_json;
use simon_core::config::Config;
use simon_core::session::Session;
use simon_core::{export, pipeline};
use std::path::Path;

/// New session from `file`, every step in order, artifacts optionally
/// written to `out`. The session is saved even when a step fails so the
/// finished steps are kept.
pub fn run(root: &Path, file: &Path, out: Option<&Path>, json: bool) -> anyhow::Result<()> {
    let config = Config::load_or_default(root)?;
    let client = super::client(&config)?;

    let mut session = Session::new();
    session.set_transcript(super::read_transcript(file)?);
    session.save(root)?;
    tracing::info!(session = %session.id, "session created");

    let progress = super::StderrProgress { quiet: json };
    let rt = tokio::runtime::Runtime::new()?;
    let result = rt.block_on(pipeline::run_chain(&client, &config, &mut session, &progress));
    session.save(root)?;
    let outcomes = result?;

    let written = match out {
        Some(dir) => export::write_dir(&session, dir)?,
        None => Vec::new(),
    };

    if json {
        return print_json(&serde_json::json!({
            "session": session.summary(),
            "outcomes": outcomes,
            "written": written,
        }));
    }

    println!("session {}", session.id);
    for o in &outcomes {
        let failed = if o.failures > 0 {
            format!(" ({} failed)", o.failures)
        } else {
            String::new()
        };
        println!("  {:<18} {} call(s){failed}", o.kind.as_str(), o.calls);
    }
    for path in &written {
        println!("  wrote {}", path.display());
    }
    Ok(())
}
