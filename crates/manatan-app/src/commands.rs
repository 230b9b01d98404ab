//! One-shot CLI commands against the companion server and AnkiConnect.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, bail};
use clap::Subcommand;
use manatan_anki::AnkiService;
use manatan_config::Settings;
use manatan_config::storage::{KeyValueStore, SettingsStore};
use manatan_core::store::StoreHandle;
use manatan_dictionary::{Dictionary, YomitanClient};
use manatan_ocr::{HttpOcrBackend, OcrFetcher};

#[derive(Subcommand)]
pub enum YomitanAction {
    /// Install dictionaries for a language (defaults to the configured one)
    InstallLanguage { language: Option<String> },
    /// Remove every installed dictionary
    Reset,
    /// Install the default dictionary set and mark setup complete
    InstallDefaults,
    /// Import a dictionary archive
    Import { path: PathBuf },
    /// Print the pronunciation URL for a term
    Audio {
        term: String,
        #[arg(long, default_value = "")]
        reading: String,
        #[arg(long, default_value = "jpod101")]
        source: String,
    },
}

#[derive(Subcommand)]
pub enum AnkiAction {
    /// Check the connection, deck, model and field mapping
    Check,
}

#[derive(Subcommand)]
pub enum SettingsAction {
    /// Print effective settings as JSON
    Show,
    /// Forget stored settings
    Reset,
}

pub async fn purge_cache(settings: &Settings) -> anyhow::Result<()> {
    let backend = HttpOcrBackend::new(&settings.server)?;
    let fetcher = OcrFetcher::new(StoreHandle::default(), Arc::new(backend));

    fetcher.purge().await.context("failed to purge OCR cache")?;
    println!("OCR cache purged");
    Ok(())
}

fn print_reply(reply: Option<String>, fallback: &str) {
    println!("{}", reply.unwrap_or_else(|| fallback.to_string()));
}

pub async fn yomitan<S: KeyValueStore>(
    settings: &Settings,
    store: &mut SettingsStore<S>,
    action: YomitanAction,
) -> anyhow::Result<()> {
    let client = YomitanClient::new(&settings.server)?;

    match action {
        YomitanAction::InstallLanguage { language } => {
            let language = language.unwrap_or_else(|| settings.server.language.clone());
            let reply = client.install_language(&language).await?;
            print_reply(reply, &format!("Installed dictionaries for {language}"));
        }
        YomitanAction::Reset => {
            print_reply(client.reset().await?, "Dictionaries reset");
        }
        YomitanAction::InstallDefaults => {
            let reply = client.install_defaults().await?;
            store.mark_setup_complete()?;
            print_reply(reply, "Default dictionaries installed");
        }
        YomitanAction::Import { path } => {
            let bytes = tokio::fs::read(&path)
                .await
                .with_context(|| format!("failed to read {}", path.display()))?;
            let file_name = path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| "dictionary.zip".to_string());

            let reply = client.import(&file_name, bytes).await?;
            print_reply(reply, &format!("Imported {file_name}"));
        }
        YomitanAction::Audio {
            term,
            reading,
            source,
        } => match client
            .audio_url(&source, &term, &reading, &settings.server.language)
            .await?
        {
            Some(url) => println!("{url}"),
            None => println!("No audio for {term}"),
        },
    }

    Ok(())
}

pub async fn anki(settings: &Settings, action: AnkiAction) -> anyhow::Result<()> {
    match action {
        AnkiAction::Check => check_anki(settings).await,
    }
}

async fn check_anki(settings: &Settings) -> anyhow::Result<()> {
    let service = AnkiService::new(settings.anki.clone())?;
    let client = service.client();

    let version = client
        .check_connection()
        .await
        .with_context(|| format!("AnkiConnect not reachable at {}", settings.anki.url))?;
    println!("AnkiConnect version {version}");

    let decks = client.deck_names().await?;
    let models = client.model_names().await?;
    let anki = &settings.anki;

    if !decks.contains(&anki.deck) {
        bail!("Deck '{}' not found, available: {}", anki.deck, decks.join(", "));
    }
    if !models.contains(&anki.model) {
        bail!("Note type '{}' not found, available: {}", anki.model, models.join(", "));
    }

    let fields = client.model_field_names(&anki.model).await?;
    let unknown: Vec<&String> = anki
        .fields
        .keys()
        .chain(anki.image_field.as_ref())
        .filter(|field| !fields.contains(field))
        .collect();

    if !unknown.is_empty() {
        let names: Vec<&str> = unknown.iter().map(|f| f.as_str()).collect();
        bail!("Fields not in '{}': {}", anki.model, names.join(", "));
    }

    println!("Deck '{}' and note type '{}' look good", anki.deck, anki.model);
    Ok(())
}

pub fn settings<S: KeyValueStore>(
    settings: &Settings,
    store: &mut SettingsStore<S>,
    action: SettingsAction,
) -> anyhow::Result<()> {
    match action {
        SettingsAction::Show => println!("{}", serde_json::to_string_pretty(settings)?),
        SettingsAction::Reset => {
            store.reset()?;
            println!("Stored settings removed");
        }
    }
    Ok(())
}
