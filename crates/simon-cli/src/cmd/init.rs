use anyhow::Context;
use simon_core::{config::Config, io, paths};
use std::path::Path;

pub fn run(root: &Path, name: Option<&str>) -> anyhow::Result<()> {
    let project_name = name
        .map(str::to_string)
        .or_else(|| root.file_name().map(|n| n.to_string_lossy().into_owned()))
        .unwrap_or_else(|| "project".to_string());

    println!("Initializing simon in: {}", root.display());

    for dir in [paths::SIMON_DIR, paths::SESSIONS_DIR] {
        let p = root.join(dir);
        io::ensure_dir(&p).with_context(|| format!("failed to create {}", p.display()))?;
    }

    let config_path = paths::config_path(root);
    if config_path.exists() {
        println!("  exists:  .simon/config.yaml");
    } else {
        Config::new(&project_name)
            .save(root)
            .context("failed to write config.yaml")?;
        println!("  created: .simon/config.yaml");
    }

    let warnings = Config::load(root)?.validate();
    for w in &warnings {
        println!("  note:    {}", w.message);
    }

    println!("\nNext: simon ui   (or: simon run <minutes.docx>)");
    Ok(())
}
