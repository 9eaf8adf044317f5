//! Render an ordered frame set into a video.

use std::path::PathBuf;

use lapse_common::cancel::CancellationToken;
use lapse_common::config::AppConfig;
use lapse_common::error::LapseError;
use lapse_platform_native::native_platform;
use lapse_synth_engine::{Dispatcher, GenerationOptions, GenerationProgress, ProgressCallback};

fn read_list(path: &PathBuf) -> anyhow::Result<Vec<String>> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| anyhow::anyhow!("Failed to read frame list {}: {e}", path.display()))?;
    Ok(content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(str::to_string)
        .collect())
}

pub async fn run(
    config: &AppConfig,
    mut frames: Vec<String>,
    list: Option<PathBuf>,
    duration: f64,
    music: Option<String>,
    volume: Option<f32>,
    output: Option<PathBuf>,
) -> anyhow::Result<()> {
    if let Some(list) = &list {
        frames.extend(read_list(list)?);
    }

    println!("Generating timelapse from {} frames over {duration}s", frames.len());
    if let Some(music) = &music {
        println!("  Music: {music}");
    }

    let dispatcher = Dispatcher::new(native_platform(config));
    let options = GenerationOptions {
        music_url: music,
        music_volume: volume,
    };

    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!("\nInterrupted, cancelling...");
            on_interrupt.cancel();
        }
    });

    let progress_cb: ProgressCallback = Box::new(|p: GenerationProgress| {
        print!(
            "\r  {:?}: {:.1}% ({}/{} frames)  ",
            p.stage,
            p.progress * 100.0,
            p.frames_drawn,
            p.total_frames,
        );
    });

    match dispatcher
        .generate_with(&frames, duration, options, cancel, Some(progress_cb))
        .await
    {
        Ok(artifact) => {
            let path = output
                .unwrap_or_else(|| PathBuf::from("timelapse"))
                .with_extension(artifact.file_extension());
            artifact.save(&path).await?;
            println!();
            println!("Video written: {}", path.display());
            println!("  Format: {}", artifact.mime_type);
            println!("  Size: {} bytes", artifact.approximate_size_bytes);
            Ok(())
        }
        Err(e @ LapseError::UnsupportedPlatform { .. }) => {
            println!();
            println!("Local generation unavailable: {e}");
            let request = dispatcher.fallback_request(&frames, duration);
            match &config.fallback.endpoint {
                Some(endpoint) => println!("Submit this request to {endpoint}:"),
                None => println!("Submit this request to a server-side transcoder:"),
            }
            println!("{}", request.to_json()?);
            Err(e.into())
        }
        Err(e) => {
            println!();
            if let Some(index) = e.frame_index() {
                tracing::error!(index, "Frame failed to load");
            }
            Err(anyhow::anyhow!("Generation failed: {e}"))
        }
    }
}
