// Copyright (C) 2026 Michael Wilson <mike@mdwn.dev>
//
// This program is free software: you can redistribute it and/or modify it under
// the terms of the GNU General Public License as published by the Free Software
// Foundation, version 3.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE. See the GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along with
// this program. If not, see <https://www.gnu.org/licenses/>.
//
use std::error::Error;
use std::path::PathBuf;
use std::time::Duration;

use clap::{crate_version, Parser, Subcommand};
use duration_string::DurationString;
use tracing_subscriber::EnvFilter;

use mpiano::audio::log::TracingBackend;
use mpiano::audio::mock::{BackendCall, RecordingBackend};
use mpiano::config::PianoConfig;
use mpiano::piano::{note_name, parse_note_name, Piano};
use mpiano::player::{Player, PREVIEW_VELOCITY};
use mpiano::score::Score;
use mpiano::util::{duration_minutes_seconds, seconds};

#[derive(Parser)]
#[clap(
    author = "Michael Wilson",
    version = crate_version!(),
    about = "A multi-sampled acoustic piano."
)]
struct Cli {
    #[clap(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Lists every sample file the piano configuration needs.
    Samples {
        /// The path to the piano config.
        config_path: String,
    },
    /// Renders a MIDI file offline and prints the resulting trigger schedule.
    Render {
        /// The path to the piano config.
        config_path: String,
        /// The MIDI file to render.
        midi_file: String,
    },
    /// Plays a MIDI file in real time.
    Play {
        /// The path to the piano config.
        config_path: String,
        /// The MIDI file to play.
        midi_file: String,
    },
    /// Plays a single note.
    Preview {
        /// The path to the piano config.
        config_path: String,
        /// The note to play, either a MIDI note number or a name like C#4.
        note: String,
        /// The velocity of the note (0.0-1.0).
        #[arg(short, long, default_value_t = PREVIEW_VELOCITY)]
        velocity: f32,
        /// How long to hold the key, e.g. 600ms.
        #[arg(long, default_value = "600ms")]
        hold: String,
    },
}

fn parse_note(note: &str) -> Result<u8, Box<dyn Error>> {
    note.parse::<u8>()
        .ok()
        .filter(|note| *note <= 127)
        .or_else(|| parse_note_name(note))
        .ok_or_else(|| format!("unknown note '{}'", note).into())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Samples { config_path } => {
            let config = PianoConfig::deserialize(&PathBuf::from(&config_path))?;
            let piano = Piano::from_config(&config, Box::new(TracingBackend))?;
            let ids = piano.sample_ids();

            println!(
                "Samples in {} (count: {}):",
                config.samples().display(),
                ids.len()
            );
            for id in ids {
                println!("- {}", id.file_name());
            }
        }
        Commands::Render {
            config_path,
            midi_file,
        } => {
            let config = PianoConfig::deserialize(&PathBuf::from(&config_path))?;
            let backend = RecordingBackend::new();
            let piano = Piano::from_config(&config, Box::new(backend.clone()))?;
            let player = Player::new(piano, config.lookahead()?);

            player.load_samples().await?;
            let score = Score::from_midi_file(&PathBuf::from(&midi_file))?;
            player.load_score(&score).await?;
            player.render().await?;

            for call in backend.calls() {
                match call {
                    BackendCall::Start { source, trigger } => println!(
                        "{:>10.3}s start   #{} {} {} gain={:.3} rate={:.4}",
                        trigger.time.as_secs_f64(),
                        source,
                        trigger.component,
                        trigger.sample,
                        trigger.gain,
                        trigger.rate
                    ),
                    BackendCall::Release { source, time } => {
                        println!("{:>10.3}s release #{}", time.as_secs_f64(), source)
                    }
                    BackendCall::StopAll { time } => {
                        println!("{:>10.3}s stop", time.as_secs_f64())
                    }
                }
            }
        }
        Commands::Play {
            config_path,
            midi_file,
        } => {
            let config = PianoConfig::deserialize(&PathBuf::from(&config_path))?;
            let piano = Piano::from_config(&config, Box::new(TracingBackend))?;
            let player = Player::new(piano, config.lookahead()?);

            player.load_samples().await?;
            let score = Score::from_midi_file(&PathBuf::from(&midi_file))?;
            player.load_score(&score).await?;

            println!(
                "Playing {} ({})",
                midi_file,
                duration_minutes_seconds(seconds(score.duration).unwrap_or_default())
            );
            player.play().await?;
            tokio::select! {
                result = tokio::signal::ctrl_c() => {
                    result?;
                    player.stop().await?;
                    player.wait().await?;
                }
                result = player.wait() => {
                    result?;
                }
            }
        }
        Commands::Preview {
            config_path,
            note,
            velocity,
            hold,
        } => {
            let config = PianoConfig::deserialize(&PathBuf::from(&config_path))?;
            let note = parse_note(&note)?;
            let hold: Duration = DurationString::from_string(hold)?.into();
            let piano = Piano::from_config(&config, Box::new(TracingBackend))?;
            let player = Player::new(piano, config.lookahead()?);

            player.load_samples().await?;
            println!("Previewing {}", note_name(note));
            player.preview(note, velocity, hold).await;
        }
    }

    Ok(())
}
