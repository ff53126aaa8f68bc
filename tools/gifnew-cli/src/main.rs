//! gifnew CLI: turn stored clips into captioned GIFs.
//!
//! Usage:
//!   gifnew convert <INPUT> [OPTIONS]   Trim, caption and convert a clip
//!   gifnew check                       Check transcoder and font assets
//!   gifnew config [--init]             Show or write the configuration

use std::path::PathBuf;

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(
    name = "gifnew",
    about = "Short captioned GIFs from webcam clips",
    version,
    author
)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Convert a recorded clip to a GIF
    Convert {
        /// Clip to convert (webm or mp4)
        input: PathBuf,

        /// Output file path (defaults to a generated name)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Trim start (seconds)
        #[arg(long)]
        start: Option<f64>,

        /// Trim end (seconds)
        #[arg(long)]
        end: Option<f64>,

        /// Caption as TEXT or TEXT@X,Y with X/Y the center in percent (repeatable)
        #[arg(short, long = "text")]
        texts: Vec<String>,

        /// Caption font family
        #[arg(long, default_value = "Impact")]
        font: String,

        /// Caption font size
        #[arg(long)]
        font_size: Option<u32>,

        /// Caption color
        #[arg(long, default_value = "#ffffff")]
        color: String,

        /// Draw a translucent box behind captions
        #[arg(long)]
        background: bool,

        /// Directory holding the font assets
        #[arg(long)]
        fonts: Option<PathBuf>,

        /// Output frame rate
        #[arg(long)]
        fps: Option<u32>,

        /// Output width
        #[arg(long)]
        width: Option<u32>,
    },

    /// Check transcoder and font assets
    Check,

    /// Show the configuration
    Config {
        /// Write the default configuration file
        #[arg(long)]
        init: bool,
    },
}

/// `--verbose` raises the configured level to debug.
fn apply_verbosity(logging: &mut gifnew_common::config::LoggingConfig, verbose: bool) {
    if verbose {
        logging.level = "debug".to_string();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut logging = gifnew_common::config::AppConfig::load().logging;
    apply_verbosity(&mut logging, cli.verbose);
    gifnew_common::logging::init_logging(&logging);

    match cli.command {
        Commands::Convert {
            input,
            output,
            start,
            end,
            texts,
            font,
            font_size,
            color,
            background,
            fonts,
            fps,
            width,
        } => {
            commands::convert::run(commands::convert::ConvertOptions {
                input,
                output,
                start,
                end,
                texts,
                font,
                font_size,
                color,
                background,
                fonts,
                fps,
                width,
            })
            .await
        }
        Commands::Check => commands::check::run(),
        Commands::Config { init } => commands::config::run(init),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gifnew_common::config::LoggingConfig;

    #[test]
    fn test_configured_logging_is_kept_unless_verbose() {
        let mut logging = LoggingConfig {
            level: "warn".to_string(),
            json: true,
            file: None,
        };
        apply_verbosity(&mut logging, false);
        assert_eq!(logging.level, "warn");
        assert!(logging.json);

        apply_verbosity(&mut logging, true);
        assert_eq!(logging.level, "debug");
        assert!(logging.json);
    }
}
