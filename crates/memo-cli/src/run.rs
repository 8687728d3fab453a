use std::path::PathBuf;

use anyhow::Result;

use crate::setup;

/// Run a single turn and print its final answer.
pub async fn run_once(
    home: PathBuf,
    working_dir: Option<PathBuf>,
    prompt: String,
    once: bool,
) -> Result<()> {
    let mut prepared = setup::build_session(&home, working_dir, once, setup::console_hooks())?;
    let result = prepared.session.run_turn(&prompt).await;
    let closed = prepared.session.close().await;

    let text = result?.into_result()?;
    closed?;
    println!("{text}");
    Ok(())
}
