//! Standalone player: compile a .csd and perform it on an output device
//!
//! Usage: csd-play <file.csd> [output device name]

use csound_host::{AudioConfig, AudioEngine, CsdDocument, CsoundEnvironment};
use std::path::Path;
use std::time::Duration;

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let mut args = std::env::args().skip(1);
    let Some(csd_path) = args.next() else {
        eprintln!("usage: csd-play <file.csd> [output device name]");
        std::process::exit(2);
    };
    let device_name = args.next();

    let document = match CsdDocument::load(&csd_path) {
        Ok(document) => document,
        Err(e) => {
            log::error!("{}", e);
            std::process::exit(1);
        }
    };

    for control in document.controls() {
        log::info!(
            "Control {} channel='{}' range=({}, {}) value={}",
            control.kind,
            control.channel,
            control.min,
            control.max,
            control.value
        );
    }
    for name in document.audio_channel_names() {
        log::info!("Audio channel '{}'", name);
    }

    let base_dir = Path::new(&csd_path)
        .parent()
        .unwrap_or_else(|| Path::new("."));
    let env = CsoundEnvironment::resolve(base_dir);

    let engine = match AudioEngine::new(
        device_name.as_deref(),
        AudioConfig::default(),
        &env,
        &document,
    ) {
        Ok(engine) => engine,
        Err(e) => {
            log::error!("Failed to start audio engine: {}", e);
            std::process::exit(1);
        }
    };

    let handle = engine.handle();
    if !handle.is_initialized() {
        handle.drain_messages();
        log::error!("Orchestra failed to compile, exiting");
        std::process::exit(1);
    }

    log::info!("Performing. Press Enter to stop.");

    // Wait for Enter on a side thread so engine messages keep flowing here
    let (tx, rx) = std::sync::mpsc::channel::<()>();
    std::thread::spawn(move || {
        let mut line = String::new();
        let _ = std::io::stdin().read_line(&mut line);
        let _ = tx.send(());
    });

    loop {
        handle.drain_messages();
        if rx.recv_timeout(Duration::from_millis(500)).is_ok() {
            break;
        }
    }

    engine.stop();
    handle.drain_messages();
    log::info!("Stopped");
}
