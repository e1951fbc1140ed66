use crate::output::print_json;
use std::path::Path;

pub fn run(file: &Path, json: bool) -> anyhow::Result<()> {
    let transcript = super::read_transcript(file)?;
    if json {
        print_json(&transcript)
    } else {
        println!("{}", transcript.text);
        Ok(())
    }
}
