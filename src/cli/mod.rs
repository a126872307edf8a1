use crate::assignment::{parse_assignment_pair, Assignment, NodeAssignments, NodeId};
use crate::bus::{BusError, PortInfo};
use crate::config::{Settings, SettingsError};
use crate::frame::Frame;
use crate::midi::LoadedFile;
use crate::orchestrator::{TransmissionReport, TransmitError};
use crate::protocol::Preset;
use crate::session::SessionError;
use crate::transport::SendError;
use crate::worker::WorkerError;
use clap::{Parser, Subcommand};
use std::fmt::Write;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Serial port the node bus is attached to
    #[arg(long, global = true)]
    pub port: Option<String>,

    /// Baud rate, overrides the configuration
    #[arg(long, global = true)]
    pub baud: Option<u32>,

    /// Configuration file (default: ./nodesyncrs.toml if present)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Do not merge synchronization markers into the tracks
    #[arg(long, global = true)]
    pub no_sync: bool,

    /// Extra attempts for a track the node rejected
    #[arg(long, global = true)]
    pub retries: Option<u32>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// List available serial ports
    Ports,
    /// Show the tracks and frames extracted from a MIDI file
    Inspect {
        file: PathBuf,
        /// Print every frame as hex
        #[arg(long)]
        hex: bool,
    },
    /// Send every track of a MIDI file to its node
    Transmit {
        file: PathBuf,
        /// Track to node assignment, e.g. `0=3` or `4=none`
        #[arg(
            short,
            long = "assign",
            value_name = "TRACK=NODE",
            value_parser = parse_assignment_pair
        )]
        assign: Vec<(usize, Assignment)>,
    },
    /// Start playback on all nodes and answer sync requests until it ends
    Play {
        /// Stop all nodes after this many seconds
        #[arg(long, value_name = "SECS")]
        limit: Option<u64>,
    },
    /// Stop playback on all nodes
    Stop,
    /// Load one track into one node and play it alone
    Preview {
        file: PathBuf,
        #[arg(long)]
        track: usize,
        /// Node to use instead of the track's default
        #[arg(long)]
        node: Option<NodeId>,
    },
    /// Stop playback on one node
    StopNode { node: NodeId },
    /// Play one of the presets built into the nodes
    Preset {
        #[arg(value_parser = parse_preset)]
        preset: Preset,
    },
}

#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Settings(#[from] SettingsError),
    #[error(transparent)]
    Session(#[from] SessionError),
    #[error(transparent)]
    Bus(#[from] BusError),
    #[error(transparent)]
    Send(#[from] SendError),
    #[error(transparent)]
    Transmit(#[from] TransmitError),
    #[error(transparent)]
    Worker(#[from] WorkerError),
    #[error("port selection failed: {0}")]
    Prompt(#[from] dialoguer::Error),
    #[error("no serial ports found")]
    NoPorts,
    #[error("{0}")]
    PortNotFound(String),
    #[error("transmission incomplete: {0}")]
    Incomplete(TransmissionReport),
    #[error("track {track} is not assigned to a node; pass --node")]
    NoNodeForTrack { track: usize },
}

fn parse_preset(s: &str) -> Result<Preset, String> {
    let index: u8 = s
        .parse()
        .map_err(|_| format!("'{}' is not a preset number", s))?;
    Preset::new(index).map_err(|e| e.to_string())
}

/// Applies command line overrides on top of the loaded settings.
pub fn apply_overrides(args: &Args, settings: &mut Settings) -> Result<(), SettingsError> {
    if let Some(baud) = args.baud {
        settings.serial.baud_rate = baud;
    }
    if args.no_sync {
        settings.midi.enable_sync = false;
    }
    if let Some(retries) = args.retries {
        settings.transmit.retries = retries;
    }
    settings.validate()
}

pub fn validate_port(port_name: &str, ports: &[PortInfo]) -> Result<(), String> {
    if !ports.iter().any(|p| p.name == port_name) {
        let mut error_msg = format!(
            "Error: Port '{}' not found in available ports:\n",
            port_name
        );
        for port in ports {
            error_msg.push_str(&format!("  - {}\n", port));
        }
        return Err(error_msg);
    }
    Ok(())
}

/// Picks the port given on the command line, or asks the user to choose one.
pub fn resolve_port(requested: Option<&str>, ports: &[PortInfo]) -> Result<String, CliError> {
    if let Some(name) = requested {
        validate_port(name, ports).map_err(CliError::PortNotFound)?;
        return Ok(name.to_string());
    }
    match ports {
        [] => Err(CliError::NoPorts),
        [only] => Ok(only.name.clone()),
        _ => choose_port(ports),
    }
}

fn choose_port(ports: &[PortInfo]) -> Result<String, CliError> {
    use dialoguer::{theme::ColorfulTheme, Select};

    let labels: Vec<String> = ports.iter().map(ToString::to_string).collect();
    let selection = Select::with_theme(&ColorfulTheme::default())
        .with_prompt("Serial port")
        .items(&labels)
        .default(0)
        .interact()?;
    Ok(ports[selection].name.clone())
}

pub fn format_ports(ports: &[PortInfo]) -> String {
    if ports.is_empty() {
        return "No serial ports found\n".to_string();
    }
    let mut out = String::from("Available serial ports:\n");
    for port in ports {
        let _ = writeln!(out, "  - {}", port);
    }
    out
}

/// Per-track summary of a loaded file as printed by `inspect`.
pub fn inspect_report(
    file: &LoadedFile,
    sync: bool,
    frames: &[Frame],
    assignments: &NodeAssignments,
    hex: bool,
) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "{} ticks per beat, {} of {} tracks kept, {} sync markers{}",
        file.ticks_per_beat,
        file.track_count(),
        file.source_tracks,
        file.barrier_count,
        if sync { "" } else { " (sync off)" }
    );
    for warning in &file.warnings {
        let _ = writeln!(out, "warning: {}", warning);
    }

    for (index, track) in file.tracks(sync).iter().enumerate() {
        let node = assignments
            .get(index)
            .map_or_else(|| "-".to_string(), |a| a.to_string());
        let bytes = frames.get(index).map_or(0, Frame::len);
        let _ = writeln!(
            out,
            "track {:>2} (source {:>2}) node {:<4} {:>4} notes {:>4} rests {:>3} markers {:>8} ms {:>6} bytes",
            index,
            track.source_index,
            node,
            track.note_count(),
            track.events.iter().filter(|e| e.is_rest()).count(),
            track.marker_count(),
            track.duration_ms(),
            bytes
        );
        if hex {
            if let Some(frame) = frames.get(index) {
                let _ = writeln!(out, "    {}", frame.to_hex());
            }
        }
    }
    out
}
