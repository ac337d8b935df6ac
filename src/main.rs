//! Style Alchemist CLI - Neural style transfer on local images

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::PathBuf;
use std::time::Instant;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use style_alchemist::{AppConfig, StyleAlchemist, VERSION};

/// Style Alchemist - Transform photos with pretrained style models
#[derive(Parser, Debug)]
#[command(name = "style-alchemist")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Use CPU even if a GPU is available
    #[arg(long, global = true)]
    cpu: bool,

    /// Path to a YAML config file
    #[arg(long, global = true, default_value = "alchemist.yaml")]
    config: PathBuf,

    /// Directory holding style checkpoints (overrides config)
    #[arg(short, long, global = true)]
    models_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Stylize an image with a pretrained style
    Stylize {
        /// Input image (JPG/PNG)
        #[arg(short, long)]
        input: PathBuf,

        /// Style name (a checkpoint in the models directory)
        #[arg(short, long)]
        style: String,

        /// Output image path
        #[arg(short, long, default_value = "stylized.png")]
        output: PathBuf,

        /// Style intensity (0.0 preserves the photo, 1.0 is fully stylized)
        #[arg(long)]
        intensity: Option<f32>,

        /// Longest-side bound applied before inference
        #[arg(long)]
        max_size: Option<u32>,
    },

    /// List styles available in the models directory
    Styles,

    /// Load a style's checkpoint and report how it reconciles
    Inspect {
        /// Style name to inspect
        #[arg(short, long)]
        style: String,
    },
}

fn setup_logging(verbose: bool) {
    let level = if verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .with_thread_ids(false)
        .compact()
        .finish();
    tracing::subscriber::set_global_default(subscriber).expect("Failed to set tracing subscriber");
}

fn create_progress_bar(msg: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} {msg}")
            .unwrap(),
    );
    pb.set_message(msg.to_string());
    pb
}

fn load_config(cli: &Cli) -> Result<AppConfig> {
    let mut config = if cli.config.exists() {
        AppConfig::load(&cli.config).context("Failed to load config")?
    } else {
        AppConfig::default()
    };
    if let Some(dir) = &cli.models_dir {
        config.models_dir = dir.clone();
    }
    if cli.cpu {
        config.use_gpu = false;
    }
    Ok(config)
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    setup_logging(cli.verbose);

    info!("Style Alchemist v{}", VERSION);

    let config = load_config(&cli)?;

    match cli.command {
        Commands::Stylize {
            input,
            style,
            output,
            intensity,
            max_size,
        } => {
            let intensity = intensity.unwrap_or(config.default_intensity);
            let max_size = max_size.unwrap_or(config.max_image_size);
            let alchemist = StyleAlchemist::new(config)?;

            let pb = create_progress_bar(&format!("Brewing {} potion...", style));
            let start = Instant::now();
            let result = alchemist.stylize(&input, &style, intensity, Some(max_size))?;
            pb.finish_with_message(format!("Finished in {:.2}s", start.elapsed().as_secs_f32()));

            result.save(&output)?;
            let (width, height) = result.dimensions();
            info!("Saved {}x{} image to {:?}", width, height, output);
            Ok(())
        }

        Commands::Styles => {
            let alchemist = StyleAlchemist::new(config)?;
            let styles = alchemist.available_styles()?;
            if styles.is_empty() {
                eprintln!(
                    "No models found in {:?}. Place <style>.safetensors or <style>.pth files there.",
                    alchemist.config().models_dir
                );
            } else {
                for style in styles {
                    println!("{}", style);
                }
            }
            Ok(())
        }

        Commands::Inspect { style } => {
            let alchemist = StyleAlchemist::new(config)?;
            let report = alchemist.inspect(&style)?;
            report.print_summary();
            if report.is_degenerate() {
                eprintln!(
                    "WARNING: zero parameters matched; \"{}\" would run on random initialization",
                    style
                );
            }
            Ok(())
        }
    }
}
