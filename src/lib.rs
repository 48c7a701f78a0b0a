pub mod api;
pub mod cli;
pub mod config;
pub mod deck;
pub mod highlight;
pub mod orchestrator;
pub mod render;
pub mod session;
pub mod sse;
pub mod transcript;
pub mod view;

#[cfg(test)]
mod testing;

use api::{ApiError, Backend, HttpBackend};
use cli::{Cli, Command, DeckAction};
use config::{AppConfig, ConfigError};
use deck::ExpressionRecord;
use orchestrator::{LoadError, Orchestrator};
use std::path::Path;
use std::sync::Arc;
use view::{PipelineEvent, VideoSession};

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Api(#[from] ApiError),

    #[error(transparent)]
    Load(#[from] LoadError),
}

pub async fn run(cli: Cli) -> Result<(), AppError> {
    let config_path = cli.config.clone().unwrap_or_else(config::config_path);
    let mut config = config::load_effective(&config_path)?;
    if let Some(api_base) = cli.api_base.as_deref() {
        config.api_base = config::normalize_api_base(api_base);
    }
    tracing::debug!("Using backend {} (config {})", config.api_base, config_path.display());

    let backend: Arc<dyn Backend> =
        Arc::new(HttpBackend::new(&config.api_base, config.request_timeout_secs)?);

    match cli.command {
        Command::Load {
            url,
            persona,
            no_analysis,
            save_level,
        } => {
            let persona = if no_analysis {
                None
            } else {
                persona.or_else(|| config.persona.clone())
            };
            load(backend, &config_path, &url, persona, save_level).await
        }
        Command::Personas => {
            for persona in backend.personas().await? {
                let marker = if config.persona.as_deref() == Some(persona.name.as_str()) {
                    "*"
                } else {
                    " "
                };
                println!("{} {} ({})", marker, persona.name, persona.filename);
            }
            Ok(())
        }
        Command::Deck { action } => deck(backend.as_ref(), action).await,
        Command::History { clear } => {
            if clear {
                config::clear_history(&config_path)?;
                println!("History cleared");
            } else {
                print_history(&config);
            }
            Ok(())
        }
    }
}

async fn load(
    backend: Arc<dyn Backend>,
    config_path: &Path,
    url: &str,
    persona: Option<String>,
    save_level: Option<String>,
) -> Result<(), AppError> {
    let (mut orchestrator, mut rx) = Orchestrator::new(backend.clone());

    let renderer = tokio::spawn(async move {
        let mut view = VideoSession::new();
        while let Some(tagged) = rx.recv().await {
            let is_tick = matches!(tagged.event, PipelineEvent::Tick);
            if view.apply(tagged) && !is_tick {
                for line in render::status_lines(&view) {
                    println!("... {}", line);
                }
            }
        }
        view
    });

    let loaded = orchestrator.load(url, persona.as_deref()).await;
    if loaded.is_ok() {
        let interrupted = tokio::select! {
            _ = orchestrator.wait() => false,
            _ = tokio::signal::ctrl_c() => true,
        };
        if interrupted {
            tracing::info!("Interrupted, cancelling pipelines");
            orchestrator.shutdown().await;
        }
    }
    drop(orchestrator);

    let view = match renderer.await {
        Ok(view) => view,
        Err(e) => {
            tracing::error!("Renderer task failed: {}", e);
            VideoSession::new()
        }
    };
    let segment_count = loaded?;

    if let Err(e) = config::record_history(config_path, url, &view.video_id, segment_count) {
        tracing::warn!("Failed to record history: {}", e);
    }

    print!("{}", render::transcript(&view));
    if let Some(analysis) = render::analysis(&view) {
        println!("\n# Analysis\n\n{}", analysis);
    }
    for line in render::status_lines(&view) {
        println!("{}", line);
    }

    if let Some(level) = save_level {
        save_level_to_deck(backend.as_ref(), &view, &level).await;
    }
    Ok(())
}

async fn save_level_to_deck(backend: &dyn Backend, view: &VideoSession, level: &str) {
    let video_id = Some(view.video_id.as_str()).filter(|id| !id.is_empty());
    let mut saved = 0usize;

    for segment in &view.segments {
        for highlight in segment
            .highlights
            .iter()
            .filter(|h| h.level.eq_ignore_ascii_case(level))
        {
            let record = ExpressionRecord::from_highlight(segment, highlight, video_id);
            match backend.save_expression(&record).await {
                Ok(_) => saved += 1,
                Err(e) => tracing::warn!("Failed to save '{}': {}", record.phrase, e),
            }
        }
    }
    println!("Saved {} {} expression(s) to the deck", saved, level);
}

async fn deck(backend: &dyn Backend, action: DeckAction) -> Result<(), AppError> {
    match action {
        DeckAction::List => {
            let expressions = backend.deck().await?;
            if expressions.is_empty() {
                println!("Deck is empty");
            }
            for expression in expressions {
                let mut line = format!("#{} {}", expression.id, expression.phrase);
                if let Some(translation) = &expression.translation {
                    line.push_str(&format!(": {}", translation));
                }
                if let Some(level) = &expression.level {
                    line.push_str(&format!(" [{}]", level));
                }
                println!("{}", line);
            }
        }
        DeckAction::Save {
            phrase,
            translation,
            level,
            context,
        } => {
            let record = ExpressionRecord {
                phrase,
                translation,
                level,
                context_sentence: context,
                ..ExpressionRecord::default()
            };
            let saved = backend.save_expression(&record).await?;
            println!("Saved #{}", saved.id);
        }
        DeckAction::Remove { id } => {
            backend.delete_expression(id).await?;
            println!("Removed #{}", id);
        }
    }
    Ok(())
}

fn print_history(config: &AppConfig) {
    if config.history.is_empty() {
        println!("No videos loaded yet");
    }
    for item in &config.history {
        println!(
            "{}  {}  {} ({} segments)",
            item.timestamp, item.video_id, item.url, item.segment_count
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeBackend;
    use crate::transcript::segment::span;
    use crate::transcript::Segment;

    #[tokio::test]
    async fn saves_only_highlights_of_the_requested_level() {
        let backend = FakeBackend::default();
        let mut view = VideoSession::new();
        view.video_id = "abc".to_string();

        let mut segment = Segment::new("break the ice at parties", 12.0, 3.0);
        let mut ice = span(0, 13);
        ice.level = "B2".to_string();
        let mut parties = span(17, 24);
        parties.level = "A1".to_string();
        segment.highlights = vec![ice, parties];
        view.segments = vec![Arc::new(segment)];

        save_level_to_deck(&backend, &view, "b2").await;

        let deck = backend.deck().await.unwrap();
        assert_eq!(deck.len(), 1);
        assert_eq!(deck[0].phrase, "break the ice");
        assert_eq!(deck[0].video_id.as_deref(), Some("abc"));
        assert_eq!(deck[0].segment_start, Some(12.0));
    }
}
