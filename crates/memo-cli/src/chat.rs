use std::io::{self, BufRead, Write};
use std::path::PathBuf;

use anyhow::Result;

use crate::setup::{self, Prepared};

/// Run the interactive chat REPL.
pub async fn run_chat(home: PathBuf, working_dir: Option<PathBuf>, once: bool) -> Result<()> {
    let Prepared {
        mut session,
        model,
        history_path,
    } = setup::build_session(&home, working_dir, once, setup::console_hooks())?;

    println!("memo chat (model: {model})");
    println!("Type your message and press Enter. Type 'exit' or Ctrl+D to quit.\n");

    let stdin = io::stdin();
    loop {
        print!("> ");
        io::stdout().flush()?;

        let mut line = String::new();
        let bytes = stdin.lock().read_line(&mut line)?;
        if bytes == 0 {
            // EOF (Ctrl+D)
            println!();
            break;
        }

        let input = line.trim();
        if input.is_empty() {
            continue;
        }
        if input == "exit" || input == "quit" {
            break;
        }

        match session.run_turn(input).await {
            Ok(outcome) => match outcome.into_result() {
                Ok(text) => println!("{text}\n"),
                Err(e) => eprintln!("[turn failed: {e}]\n"),
            },
            Err(e) => eprintln!("[error: {e:#}]\n"),
        }
    }

    session.close().await?;
    if let Some(path) = history_path {
        println!("History saved to {}", path.display());
    }
    println!("Goodbye!");
    Ok(())
}
