use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(name = "breakdown", version, about = "Break a video down into chapters, highlights and notes")]
pub struct Cli {
    /// Config file (defaults to ./breakdown.json)
    #[arg(long, global = true, env = "BREAKDOWN_CONFIG")]
    pub config: Option<PathBuf>,

    /// Backend base URL, overriding the config file
    #[arg(long, global = true, env = "BREAKDOWN_API_BASE")]
    pub api_base: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Load a video and stream its breakdown
    Load {
        url: String,

        /// Persona for the analysis stream (falls back to the configured one)
        #[arg(long)]
        persona: Option<String>,

        /// Skip the persona analysis
        #[arg(long)]
        no_analysis: bool,

        /// Save every highlight of this CEFR level to the deck once done
        #[arg(long, value_name = "LEVEL")]
        save_level: Option<String>,
    },
    /// List the available analysis personas
    Personas,
    /// Manage the expression deck
    Deck {
        #[command(subcommand)]
        action: DeckAction,
    },
    /// Show recently loaded videos
    History {
        /// Forget all entries
        #[arg(long)]
        clear: bool,
    },
}

#[derive(Debug, Subcommand)]
pub enum DeckAction {
    List,
    Save {
        phrase: String,
        #[arg(long)]
        translation: Option<String>,
        #[arg(long)]
        level: Option<String>,
        #[arg(long)]
        context: Option<String>,
    },
    Remove {
        id: i64,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_load_with_options() {
        let cli = Cli::try_parse_from([
            "breakdown",
            "load",
            "https://youtu.be/abc",
            "--persona",
            "Linguist",
            "--save-level",
            "C1",
        ])
        .unwrap();

        match cli.command {
            Command::Load {
                url,
                persona,
                no_analysis,
                save_level,
            } => {
                assert_eq!(url, "https://youtu.be/abc");
                assert_eq!(persona.as_deref(), Some("Linguist"));
                assert!(!no_analysis);
                assert_eq!(save_level.as_deref(), Some("C1"));
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn parses_deck_remove() {
        let cli = Cli::try_parse_from(["breakdown", "deck", "remove", "7"]).unwrap();
        assert!(matches!(
            cli.command,
            Command::Deck {
                action: DeckAction::Remove { id: 7 }
            }
        ));
    }
}
