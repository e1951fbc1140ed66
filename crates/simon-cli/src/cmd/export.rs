use anyhow::Context;
use simon_core::config::Config;
use simon_core::session::Session;
use std::path::Path;

pub fn run(root: &Path, id: &str, out: Option<&Path>) -> anyhow::Result<()> {
    let config = Config::load_or_default(root)?;
    let session = Session::load(root, id)?;
    let markdown = simon_core::export::render_markdown(&session, &config.project.name);

    match out {
        Some(path) => {
            simon_core::io::atomic_write(path, markdown.as_bytes())
                .with_context(|| format!("cannot write {}", path.display()))?;
            eprintln!("wrote {}", path.display());
        }
        None => print!("{markdown}"),
    }
    Ok(())
}
