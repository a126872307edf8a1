use clap::Parser;
use nodesyncrs::{
    assignment::NodeId,
    bus::{list_ports, SerialBus},
    cli::{apply_overrides, format_ports, inspect_report, resolve_port, Args, CliError, Commands},
    config::Settings,
    logging,
    playback::send_command,
    protocol::Command,
    session::Session,
    transport::preview_track,
    ui::{create_playback_spinner, TransmitProgress},
    worker::{spawn_playback, spawn_transmission, PlaybackEvent},
};
use std::time::{Duration, Instant};

fn main() {
    let args = Args::parse();

    let settings = match load_settings(&args) {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(2);
        }
    };

    initialize_logging(&settings);

    if let Err(e) = run(&args, &settings) {
        log::error!("{}", e);
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn load_settings(args: &Args) -> Result<Settings, CliError> {
    let mut settings = Settings::load(args.config.as_deref())?;
    apply_overrides(args, &mut settings)?;
    Ok(settings)
}

fn initialize_logging(settings: &Settings) {
    // Settings were validated, so the level parses
    let level = settings.log_level().unwrap_or(log::LevelFilter::Info);
    if let Err(e) = logging::init_logger(level) {
        eprintln!("Warning: file logging disabled: {}", e);
    }
    log::info!("Application starting");
}

fn run(args: &Args, settings: &Settings) -> Result<(), CliError> {
    let sync = settings.midi.enable_sync;
    match &args.command {
        Commands::Ports => {
            print!("{}", format_ports(&list_ports()));
            Ok(())
        }
        Commands::Inspect { file, hex } => {
            let session = load_session(file, settings)?;
            if let Some(loaded) = session.file() {
                print!(
                    "{}",
                    inspect_report(
                        loaded,
                        sync,
                        session.frames(sync),
                        session.assignments(),
                        *hex
                    )
                );
            }
            Ok(())
        }
        Commands::Transmit { file, assign } => {
            let mut session = load_session(file, settings)?;
            for (track, assignment) in assign {
                session.assign(*track, *assignment)?;
            }
            let bus = open_bus(args, settings)?;
            let mut progress = TransmitProgress::new(session.assignments().expected_count());
            let handle = spawn_transmission(
                bus,
                session.frames(sync).to_vec(),
                session.assignments().clone(),
                settings.transmit_options(),
            )?;
            // Ends when the worker drops its sender
            for event in handle.events().iter() {
                progress.handle(&event);
            }
            let (_bus, result) = handle.join()?;
            let report = result?;
            progress.finish(&report.to_string());
            println!("Transmission: {}", report);
            if report.is_complete() {
                Ok(())
            } else {
                Err(CliError::Incomplete(report))
            }
        }
        Commands::Play { limit } => {
            let bus = open_bus(args, settings)?;
            run_playback(bus, settings, limit.map(Duration::from_secs))
        }
        Commands::Stop => {
            let mut bus = open_bus(args, settings)?;
            send_command(&mut bus, Command::StopAll)?;
            Ok(())
        }
        Commands::Preview { file, track, node } => {
            let session = load_session(file, settings)?;
            let frame = session.frame(*track, sync)?;
            let node = preview_node(&session, *track, *node)?;
            let mut bus = open_bus(args, settings)?;
            preview_track(&mut bus, node, frame, settings.ack_timeout())?;
            println!("Previewing track {} on node {}", track, node);
            Ok(())
        }
        Commands::StopNode { node } => {
            let mut bus = open_bus(args, settings)?;
            send_command(&mut bus, Command::StopNode(*node))?;
            Ok(())
        }
        Commands::Preset { preset } => {
            let mut bus = open_bus(args, settings)?;
            send_command(&mut bus, Command::Preset(*preset))?;
            Ok(())
        }
    }
}

fn load_session(file: &std::path::Path, settings: &Settings) -> Result<Session, CliError> {
    let mut session = Session::new();
    session.load(file, &settings.midi_settings())?;
    if let Some(loaded) = session.file() {
        for warning in &loaded.warnings {
            eprintln!("Warning: {}", warning);
        }
    }
    Ok(session)
}

fn preview_node(
    session: &Session,
    track: usize,
    node: Option<NodeId>,
) -> Result<NodeId, CliError> {
    node.or_else(|| session.assignments().get(track).and_then(|a| a.node()))
        .ok_or(CliError::NoNodeForTrack { track })
}

fn open_bus(args: &Args, settings: &Settings) -> Result<SerialBus, CliError> {
    let port = resolve_port(args.port.as_deref(), &list_ports())?;
    Ok(SerialBus::open(
        &port,
        settings.serial.baud_rate,
        settings.ack_timeout(),
    )?)
}

fn run_playback(
    bus: SerialBus,
    settings: &Settings,
    limit: Option<Duration>,
) -> Result<(), CliError> {
    let started = Instant::now();
    let handle = spawn_playback(bus, settings.monitor_options())?;
    let spinner = create_playback_spinner();
    spinner.set_message("playing");

    let mut releases = 0u32;
    let mut limit_hit = false;
    while !handle.is_finished() {
        match handle.events().recv_timeout(Duration::from_millis(100)) {
            Ok(PlaybackEvent::SyncReleased) => {
                releases += 1;
                spinner.set_message(format!("playing, {} sync releases", releases));
            }
            Ok(PlaybackEvent::Ended) => spinner.set_message("nodes finished"),
            Err(_) => {}
        }
        if !limit_hit && limit.is_some_and(|limit| started.elapsed() >= limit) {
            log::info!("Playback limit reached, stopping");
            limit_hit = true;
            handle.cancel();
        }
    }

    let (mut bus, result) = handle.join()?;
    let end = result?;
    if limit_hit {
        send_command(&mut bus, Command::StopAll)?;
    }
    spinner.finish_with_message(format!("{:?} after {:.1?}", end, started.elapsed()));
    Ok(())
}
