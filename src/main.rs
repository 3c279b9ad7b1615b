//! adcast command line: schedule ad batches and resolve video thumbnails.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use tracing::info;

use adcast::api::{BackendClient, ProgramId};
use adcast::config::{BackendConfig, ExtractorConfig, SchedulerConfig};
use adcast::core::time::{self, Timestamp};
use adcast::core::{Ad, ExistingPlacement, ProgramWindow};
use adcast::media::{is_media_url, FfmpegBackend};
use adcast::schedule::Scheduler;
use adcast::thumbnail::{ThumbnailCache, ThumbnailExtractor, ThumbnailService};

#[derive(Parser, Debug)]
#[command(name = "adcast")]
#[command(about = "Ad-slot scheduling and video thumbnails for broadcast programs")]
struct Args {
    /// Scheduling backend base URL (overrides ADCAST_BACKEND_URL)
    #[arg(long, global = true)]
    backend_url: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Suggest where the next ad batch should start
    Suggest {
        /// Program start (RFC 3339)
        #[arg(long)]
        program_start: Timestamp,
        /// Program end (RFC 3339)
        #[arg(long)]
        program_end: Timestamp,
        /// JSON file with existing placements (`[{startTime, endTime}]`)
        #[arg(long, conflicts_with = "program_id")]
        existing: Option<PathBuf>,
        /// Fetch existing placements for this program from the backend
        #[arg(long)]
        program_id: Option<ProgramId>,
    },

    /// Lay out a batch of ads back to back
    Place {
        /// JSON file with the ordered ad selection
        #[arg(long)]
        ads: PathBuf,
        /// Start of the first ad (RFC 3339); defaults to the suggested slot
        #[arg(long)]
        start: Option<Timestamp>,
        #[arg(long)]
        program_start: Timestamp,
        #[arg(long)]
        program_end: Timestamp,
        /// Save the batch to this program on the backend
        #[arg(long)]
        persist: Option<ProgramId>,
    },

    /// Resolve a thumbnail for a video
    Thumbnail {
        /// Video URL
        video_url: String,
        /// Preferred thumbnail image URL
        #[arg(long)]
        thumbnail_url: Option<String>,
        /// Offset into the video in seconds
        #[arg(short, long, default_value = "0")]
        offset: f64,
        /// Media proxy base (overrides ADCAST_PROXY_BASE)
        #[arg(long)]
        proxy_base: Option<String>,
    },

    /// Report whether URLs look like video resources
    Classify {
        #[arg(required = true)]
        urls: Vec<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive("adcast=info".parse()?),
        )
        .init();

    let args = Args::parse();

    let mut backend_config = BackendConfig::from_env();
    if let Some(url) = args.backend_url {
        backend_config.base_url = url;
    }

    match args.command {
        Command::Suggest {
            program_start,
            program_end,
            existing,
            program_id,
        } => {
            let window = ProgramWindow::new(program_start, program_end)?;
            let existing = match (existing, program_id) {
                (Some(path), _) => read_json::<Vec<ExistingPlacement>>(&path)?,
                (None, Some(id)) => BackendClient::new(backend_config)
                    .list_program_ads(id)
                    .await
                    .with_context(|| format!("Failed to load ads for program {}", id))?,
                (None, None) => Vec::new(),
            };

            let scheduler = Scheduler::new(SchedulerConfig::from_env());
            match scheduler.suggest_next_start_time(&window, &existing) {
                Some(start) => println!("{}", start.to_rfc3339()),
                None => bail!("No slot available in this program"),
            }
        }

        Command::Place {
            ads,
            start,
            program_start,
            program_end,
            persist,
        } => {
            let window = ProgramWindow::new(program_start, program_end)?;
            let ads: Vec<Ad> = read_json(&ads)?;
            let client = BackendClient::new(backend_config);
            let scheduler = Scheduler::new(SchedulerConfig::from_env());

            let existing = match persist {
                Some(id) => client
                    .list_program_ads(id)
                    .await
                    .with_context(|| format!("Failed to load ads for program {}", id))?,
                None => Vec::new(),
            };

            let start = match start {
                Some(start) => start,
                None => scheduler
                    .suggest_next_start_time(&window, &existing)
                    .context("No slot available in this program")?,
            };

            let batch = scheduler.place_batch(&ads, start, &window)?;
            if let Some(clash) = batch
                .placements
                .iter()
                .find(|p| existing.iter().any(|e| p.overlaps_with(e)))
            {
                bail!(
                    "Ad {} at {} overlaps an ad already placed in this program",
                    clash.ad.id,
                    time::format_clock(clash.start_time)
                );
            }
            for placement in &batch.placements {
                info!(
                    ad = placement.ad.id,
                    start = %time::format_clock(placement.start_time),
                    end = %time::format_clock(placement.end_time),
                    "{}",
                    placement.ad.title
                );
            }

            if let Some(end) = batch.end_time() {
                info!(
                    remaining = %time::format_span(window.remaining_after(end)),
                    "Room left in program"
                );
            }

            if let Some(id) = persist {
                client
                    .save_placements(id, &batch)
                    .await
                    .with_context(|| format!("Failed to save placements for program {}", id))?;
            }

            println!("{}", serde_json::to_string_pretty(&batch)?);
        }

        Command::Thumbnail {
            video_url,
            thumbnail_url,
            offset,
            proxy_base,
        } => {
            let mut config = ExtractorConfig::from_env();
            if let Some(base) = proxy_base {
                config.proxy_base = base;
            }

            let extractor = ThumbnailExtractor::new(Arc::new(FfmpegBackend), config);
            let service = ThumbnailService::new(extractor, Arc::new(ThumbnailCache::new()));
            let offset = time::from_media_seconds(offset);

            let thumbnail = service
                .get_thumbnail(&video_url, thumbnail_url.as_deref(), offset)
                .await;
            if thumbnail.is_placeholder() {
                info!(video_url = %video_url, "No thumbnail available, using placeholder");
            }
            println!("{}", thumbnail.src());
        }

        Command::Classify { urls } => {
            for url in urls {
                let kind = if is_media_url(&url) { "video" } else { "other" };
                println!("{}\t{}", kind, url);
            }
        }
    }

    Ok(())
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("Failed to parse {}", path.display()))
}
