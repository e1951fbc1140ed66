use crate::output::{print_fields, print_json};
use anyhow::Context;
use clap::Subcommand;
use simon_core::config::{Config, StepSettings, WarnLevel};
use simon_core::types::ArtifactKind;
use std::collections::BTreeMap;
use std::path::Path;

#[derive(Subcommand)]
pub enum ConfigSubcommand {
    /// Show the effective configuration and per-step model settings
    Show,
    /// Validate the config for common mistakes
    Validate,
}

pub fn run(root: &Path, subcmd: ConfigSubcommand, json: bool) -> anyhow::Result<()> {
    match subcmd {
        ConfigSubcommand::Show => show(root, json),
        ConfigSubcommand::Validate => validate(root, json),
    }
}

fn show(root: &Path, json: bool) -> anyhow::Result<()> {
    let config = Config::load_or_default(root).context("failed to load config")?;
    let steps: Vec<_> = ArtifactKind::all()
        .iter()
        .map(|&k| (k, config.step_settings(k)))
        .collect();

    if json {
        let steps: BTreeMap<String, &StepSettings> =
            steps.iter().map(|(k, s)| (k.to_string(), s)).collect();
        return print_json(&serde_json::json!({ "config": config, "steps": steps }));
    }

    let key_state = if std::env::var(&config.llm.api_key_env).is_ok_and(|v| !v.trim().is_empty()) {
        "set"
    } else {
        "not set"
    };
    print_fields(&[
        ("project", config.project.name.clone()),
        ("base_url", config.llm.base_url.clone()),
        ("api key", format!("${} ({key_state})", config.llm.api_key_env)),
        ("timeout", format!("{}s", config.llm.timeout_secs)),
        ("port", config.server.port.to_string()),
        ("upload limit", format!("{} MB", config.server.max_upload_mb)),
        ("json fallback", config.use_cases.model_fallback.to_string()),
    ]);
    println!();
    let rows = steps
        .into_iter()
        .map(|(k, s)| {
            vec![
                k.to_string(),
                s.model,
                s.temperature.to_string(),
                s.max_tokens.to_string(),
            ]
        })
        .collect();
    crate::output::print_table(&["STEP", "MODEL", "TEMP", "MAX TOKENS"], rows);
    Ok(())
}

fn validate(root: &Path, json: bool) -> anyhow::Result<()> {
    let config = Config::load(root).context("failed to load config")?;
    let warnings = config.validate();

    if json {
        print_json(&serde_json::json!({ "warnings": warnings }))?;
    } else if warnings.is_empty() {
        println!("Config is valid. No warnings.");
    } else {
        for w in &warnings {
            let prefix = match w.level {
                WarnLevel::Warning => "warning",
                WarnLevel::Error => "error",
            };
            println!("[{prefix}] {}", w.message);
        }
    }

    if warnings.iter().any(|w| w.level == WarnLevel::Error) {
        anyhow::bail!("config validation found errors");
    }
    Ok(())
}
