//! Check transcoder and font assets.

use gifnew_common::config::{config_file_path, AppConfig};
use gifnew_render_engine::ffmpeg::command_exists;
use gifnew_render_engine::fonts::{DirectoryFontSource, FONT_FAMILIES};

pub fn run() -> anyhow::Result<()> {
    println!("gifnew System Check");
    println!("{}", "=".repeat(50));

    let config = AppConfig::load();
    let config_path = config_file_path();
    if config_path.exists() {
        println!("[OK] Config: {}", config_path.display());
    } else {
        println!("[OK] Config: defaults ({} not found)", config_path.display());
    }

    let ffmpeg = command_exists("ffmpeg");
    if ffmpeg {
        println!("[OK] ffmpeg found");
    } else {
        println!("[FAIL] ffmpeg not found on PATH");
    }
    if command_exists("ffprobe") {
        println!("[OK] ffprobe found");
    } else {
        println!("[WARN] ffprobe not found: clip durations are unknown, trimming is disabled");
    }

    let fonts = DirectoryFontSource::new(&config.fonts.asset_dir);
    let missing = fonts.missing_assets();
    if missing.is_empty() {
        println!(
            "[OK] Fonts: all {} assets in {}",
            FONT_FAMILIES.len(),
            fonts.dir().display()
        );
    } else {
        println!(
            "[WARN] Fonts: {} of {} assets missing in {}",
            missing.len(),
            FONT_FAMILIES.len(),
            fonts.dir().display()
        );
        for file in &missing {
            println!("     {file} (captions using it are skipped)");
        }
    }

    println!();
    if ffmpeg {
        println!("gifnew is ready.");
    } else {
        println!("Install ffmpeg to convert clips.");
    }

    Ok(())
}
