use std::{
    io::{BufRead, BufReader},
    path::{Path, PathBuf},
    sync::Arc,
};

use clap::{Parser, Subcommand};
use rehab_motion_core::{
    decode_client_message, encode_server_message, AppConfig, ClientMessage, ExerciseInfo,
    ExerciseType, FrameGate, InMemoryStore, SessionManager, SystemClock,
};
use tracing_subscriber::EnvFilter;

fn main() -> rehab_motion_core::Result<()> {
    init_tracing();

    let cli = Cli::parse();
    let config = match cli.config.as_deref() {
        Some(path) => AppConfig::load(path)?,
        None => AppConfig::default(),
    };

    match cli.command {
        Commands::Replay {
            exercise,
            patient,
            input,
            summary,
        } => run_replay(config, &exercise, patient, &input, summary.as_deref()),
        Commands::Exercises => run_exercises(),
        Commands::Profile => run_profile(&config),
    }
}

fn run_replay(
    config: AppConfig,
    exercise: &str,
    patient: u64,
    input: &Path,
    summary_path: Option<&Path>,
) -> rehab_motion_core::Result<()> {
    tracing::info!(exercise, ?input, "replaying recorded session");

    let mut gate = FrameGate::from_config(&config);
    let manager = SessionManager::with_config(
        Arc::new(InMemoryStore::new()),
        Arc::new(SystemClock::new()),
        config,
    );
    let session = manager.begin(patient, exercise)?;

    let reader = BufReader::new(std::fs::File::open(input)?);
    let mut skipped = 0usize;
    for (line_no, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }

        let message = match decode_client_message(&line) {
            Ok(message) => message,
            Err(err) => {
                tracing::debug!(line = line_no + 1, error = %err, "undecodable message");
                skipped += 1;
                continue;
            }
        };

        if let ClientMessage::Frame {
            timestamp: Some(timestamp),
            ..
        } = &message
        {
            if !gate.admit(*timestamp) {
                skipped += 1;
                continue;
            }
        }
        if matches!(message, ClientMessage::Reset) {
            gate.reset();
        }

        match manager.handle_message(session, message)? {
            Some(reply) => println!("{}", encode_server_message(&reply)?),
            None => skipped += 1,
        }
    }

    let Some(summary) = manager.finalize(session)? else {
        return Ok(());
    };
    tracing::info!(skipped, total_reps = summary.total_reps, "replay finished");

    let rendered = serde_json::to_string_pretty(&summary)?;
    match summary_path {
        Some(path) => std::fs::write(path, rendered)?,
        None => println!("{rendered}"),
    }
    Ok(())
}

fn run_exercises() -> rehab_motion_core::Result<()> {
    let catalog: Vec<ExerciseInfo> = ExerciseType::ALL.into_iter().map(ExerciseInfo::from).collect();
    println!("{}", serde_json::to_string_pretty(&catalog)?);
    Ok(())
}

fn run_profile(config: &AppConfig) -> rehab_motion_core::Result<()> {
    println!("{}", serde_json::to_string_pretty(config)?);
    Ok(())
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .try_init();
}

#[derive(Parser, Debug)]
#[command(author, version, about = "Exercise repetition counting and posture feedback", long_about = None)]
struct Cli {
    /// Optional JSON configuration file overriding the built-in profiles.
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Feed a recorded stream of client messages (one JSON object per line)
    /// through a session and print every reply.
    Replay {
        /// Exercise to analyse, e.g. `squat`, `arm_raise`, `single_leg_stand`.
        #[arg(short, long)]
        exercise: String,
        /// Patient the session is recorded for.
        #[arg(short, long, default_value_t = 1)]
        patient: u64,
        /// Path to the recorded JSON-lines stream.
        input: PathBuf,
        /// Write the session summary here instead of stdout.
        #[arg(short, long)]
        summary: Option<PathBuf>,
    },
    /// List the supported exercises.
    Exercises,
    /// Print the effective configuration.
    Profile,
}
