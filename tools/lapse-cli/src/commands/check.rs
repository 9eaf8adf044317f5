//! Check platform capabilities.

use lapse_common::config::AppConfig;
use lapse_platform_native::native_platform;
use lapse_synth_engine::negotiate_codec;

fn status(ok: bool) -> &'static str {
    if ok {
        "[OK]  "
    } else {
        "[MISS]"
    }
}

pub fn run(config: &AppConfig) -> anyhow::Result<()> {
    println!("Lapse System Check");
    println!("{}", "=".repeat(50));

    let platform = native_platform(config);
    let report = platform.probe();

    println!("{} Drawing surface", status(report.drawing_surface));
    println!("{} Stream capture", status(report.stream_capture));
    println!("{} Streaming recorder", status(report.recorder));
    println!(
        "{} Audio decoding (optional)",
        if report.audio_decode { "[OK]  " } else { "[WARN]" }
    );

    if let Some(factory) = &platform.recorder {
        match negotiate_codec(factory.as_ref()) {
            Ok(mime) => println!("       Codec: {mime}"),
            Err(e) => println!("[WARN] {e}"),
        }
    }

    println!();
    if report.is_supported() {
        println!("Local generation is available.");
    } else {
        println!("Missing: {}", report.missing().join(", "));
        match &config.fallback.endpoint {
            Some(endpoint) => println!("Requests will need the server-side fallback at {endpoint}."),
            None => println!("Requests will need a server-side fallback (set fallback.endpoint in config)."),
        }
    }

    Ok(())
}
