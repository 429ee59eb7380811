use crate::config::{Config, CONFIG_ENV};
use crate::core::quality::presets;
use crate::core::SourceKind;
use crate::provider::{Event, WallpaperProvider, WallpaperProviderService};
use crate::session::{RefreshOutcome, Session, DIRECT_URL_WARNING};
use anyhow::Result;
use chrono::Utc;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "streamwall")]
#[command(about = "Resolve video pages into live wallpaper streams")]
#[command(version)]
pub struct Cli {
    /// Config file (TOML)
    #[arg(short, long, global = true, env = CONFIG_ENV)]
    pub config: Option<PathBuf>,

    /// Preferences file, overrides the config
    #[arg(short, long, global = true)]
    pub store: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Resolve a URL and try to play it
    Test {
        #[arg(value_name = "URL")]
        url: String,
    },
    /// Resolve a URL and make it the wallpaper
    Save {
        #[arg(value_name = "URL")]
        url: String,
    },
    /// Show the saved stream and warn if it looks expired
    Status,
    /// Extract the saved page URL again
    Refresh {
        /// Refresh even if the saved URL is not expired yet
        #[arg(short, long)]
        force: bool,
    },
    /// Forget the saved stream
    Clear,
    /// Pick a quality preset (no index lists the presets)
    Quality {
        #[arg(value_name = "TYPE")]
        kind: SourceKind,
        index: Option<usize>,
    },
    /// Print what the launcher would receive
    Wallpapers,
    /// Print the preferences blob
    Export,
    /// Replace preferences with a blob from `export`
    Import {
        #[arg(value_name = "BLOB")]
        blob: String,
    },
}

impl Cli {
    pub fn load_config(&self) -> Result<Config> {
        let mut config = Config::load(self.config.as_deref())?;
        if let Some(store) = &self.store {
            config.store_path = store.clone();
        }
        Ok(config)
    }

    pub async fn run(&self) -> Result<()> {
        let config = self.load_config()?;

        match &self.command {
            Command::Wallpapers => {
                let provider = WallpaperProvider::new(config);
                let wallpapers = provider.get_wallpapers(Some(&Event::TimeElapsed));
                println!("{}", serde_json::to_string_pretty(&wallpapers)?);
                return Ok(());
            }
            Command::Export => {
                println!("{}", WallpaperProvider::new(config).get_preferences());
                return Ok(());
            }
            _ => {}
        }

        let mut session = Session::new(config)?;
        if let Some(notice) = session.expiry_notice(Utc::now()) {
            println!("Warning: {}", notice);
        }

        match &self.command {
            Command::Test { url } => {
                println!("Testing: {}", url);
                let report = session.test(url).await?;
                println!("Type: {}", report.resolution.kind);
                println!("Stream: {}", report.resolution.stream_url);
                println!(
                    "Testing stream... (up to {}s)",
                    session.config().probe_timeout().as_secs()
                );
                println!("{}", report.outcome);
                if !report.outcome.is_playable() {
                    anyhow::bail!("Stream test failed");
                }
            }
            Command::Save { url } => {
                let report = session.save(url).await?;
                println!("Type: {}", report.resolution.kind);
                println!("Stream: {}", report.resolution.stream_url);
                println!("Wallpaper source saved");
                if report.direct_warning {
                    println!();
                    println!("{}", DIRECT_URL_WARNING);
                }
            }
            Command::Status => {
                let store = session.store();
                println!("Preferences: {}", store.path().display());
                println!(
                    "Wallpaper source: {}",
                    store.wallpaper_source().unwrap_or("(default)")
                );
                match store.record() {
                    Some(record) => {
                        println!("Original: {}", record.original_url);
                        println!("Stream: {}", record.stream_url);
                        println!("Type: {}", record.url_type);
                        if let Some(at) = store.extracted_at() {
                            println!(
                                "Extracted: {} ({}h ago)",
                                at.to_rfc3339(),
                                store.hours_since_extraction(Utc::now())
                            );
                        }
                    }
                    None => println!("No stream saved"),
                }
            }
            Command::Refresh { force } => {
                println!("Refreshing saved URL...");
                let outcome = session.refresh(*force).await?;
                println!("{}", outcome);
                if let RefreshOutcome::Refreshed(resolution) = &outcome {
                    println!("Stream: {}", resolution.stream_url);
                }
            }
            Command::Clear => {
                session.clear()?;
                println!("Saved stream cleared");
            }
            Command::Quality { kind, index } => {
                let options = presets(*kind);
                if options.is_empty() {
                    anyhow::bail!("{} URLs have no quality presets", kind);
                }
                let selected = match index {
                    Some(i) => session.set_quality(*kind, *i)?,
                    None => session.store().quality(*kind),
                };
                for (i, preset) in options.iter().enumerate() {
                    let marker = if i == selected { '*' } else { ' ' };
                    println!("{} {}: {}", marker, i, preset.label);
                }
            }
            Command::Import { blob } => {
                let provider = WallpaperProvider::new(session.config().clone());
                drop(session);
                provider.set_preferences(blob);
                println!("Wallpaper source: {}", provider.source_url());
            }
            Command::Wallpapers | Command::Export => unreachable!("handled above"),
        }

        Ok(())
    }
}
