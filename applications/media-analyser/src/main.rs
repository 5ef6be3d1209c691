/// Media Analyser - loudness measurement and correction of audio streams
use clap::Parser;
use media_analyser::{load_stream_list, run, AnalyserSettings, AnalysisOptions};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "media-analyser")]
#[command(about = "Measure (and correct) the loudness of audio streams against EBU R128", long_about = None)]
struct Cli {
    /// Stream list: one `FILE=STREAM[.CHANNEL]` entry per line
    stream_list: PathBuf,

    /// JSON report file
    #[arg(short, long, default_value = "PLoud.json")]
    output: PathBuf,

    /// Analyse only the first SECONDS of the program
    #[arg(long, value_name = "SECONDS")]
    force_duration: Option<f64>,

    /// Write the gain-corrected program to this WAV file
    #[arg(long, value_name = "FILE")]
    correction: Option<PathBuf>,

    /// Keep the current progress percentage in this file
    #[arg(long, value_name = "FILE")]
    progress_file: Option<PathBuf>,

    /// Settings file (defaults to media-analyser.toml when present)
    #[arg(short, long, value_name = "FILE")]
    settings: Option<PathBuf>,

    /// Loudness levels preset, overriding the settings
    #[arg(short, long)]
    levels: Option<String>,
}

fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "media_analyser=info,ploud_loudness=info,ploud_media=info".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();

    let mut settings = AnalyserSettings::load(cli.settings.as_deref())?;
    if let Some(levels) = cli.levels {
        settings.levels = levels;
        settings.validate()?;
    }

    let streams = load_stream_list(&cli.stream_list)?;
    tracing::info!("Analysing {} stream(s) against {}", streams.len(), settings.levels);

    let options = AnalysisOptions {
        force_duration: cli.force_duration,
        correction_output: cli.correction,
        progress_file: cli.progress_file,
    };
    let report = run(&streams, &settings, &options)?;

    println!("{}", report.measurement);
    if let Some(correction) = &report.correction {
        println!(
            "Corrected with gain {:.3} ({:+.2} dB) into {}",
            correction.outcome.gain,
            20.0 * correction.outcome.gain.log10(),
            correction.output.display()
        );
        println!("{}", correction.outcome.result);
    }

    report.write(&cli.output)?;
    tracing::info!("Report written to {}", cli.output.display());

    Ok(())
}
