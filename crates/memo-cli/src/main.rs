mod chat;
mod run;
mod setup;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "memo", about = "Tool-using coding agent")]
struct Cli {
    /// Directory holding config, prompt template and history
    #[arg(long, env = "MEMO_HOME", global = true)]
    home: Option<PathBuf>,

    /// Working directory for tools (defaults to the current directory)
    #[arg(short, long, global = true)]
    working_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start an interactive chat session
    Chat {
        /// Allow at most one tool action per turn
        #[arg(long)]
        once: bool,
    },
    /// Run a single turn and print the final answer
    Run {
        /// Prompt for the agent
        prompt: String,

        /// Allow at most one tool action per turn
        #[arg(long)]
        once: bool,
    },
    /// List the available tools
    Tools,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let home = memo_config::resolve_home(cli.home)?;

    match cli.command {
        Commands::Chat { once } => {
            let rt = tokio::runtime::Runtime::new()?;
            rt.block_on(chat::run_chat(home, cli.working_dir, once))?;
        }
        Commands::Run { prompt, once } => {
            let rt = tokio::runtime::Runtime::new()?;
            rt.block_on(run::run_once(home, cli.working_dir, prompt, once))?;
        }
        Commands::Tools => {
            let working_dir = setup::working_dir(cli.working_dir)?;
            let tools = setup::toolkit(&working_dir);
            for tool in tools.descriptors() {
                println!("{:<8} {}", tool.name, tool.description);
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_run_with_flags() {
        let cli = Cli::try_parse_from(["memo", "--home", "/tmp/m", "run", "fix it", "--once"])
            .unwrap();
        assert_eq!(cli.home, Some(PathBuf::from("/tmp/m")));
        match cli.command {
            Commands::Run { prompt, once } => {
                assert_eq!(prompt, "fix it");
                assert!(once);
            }
            _ => panic!("expected run"),
        }
    }

    #[test]
    fn test_run_requires_prompt() {
        assert!(Cli::try_parse_from(["memo", "run"]).is_err());
    }
}
