//! Goblin CLI - run the loot farmer against an attached device

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Parser, ValueEnum};
use env_logger::Env;
use log::{info, warn};

use clash_goblin::config::Settings;
use clash_goblin::device::{AdbDevice, AdbScreen};
use clash_goblin::notify::LogNotifier;
use clash_goblin::session::SessionLog;
use clash_goblin::vision::resources::REFERENCE_RESOLUTION;
use clash_goblin::vision::{DigitReader, ResourceExtractor, TemplateLibrary};
use clash_goblin::{Goblin, StopFlag};

/// Clash of Clans loot farmer driving a device over ADB
#[derive(Parser, Debug)]
#[command(name = "goblin", version, about)]
struct Cli {
    /// Path to a JSON settings file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Device serial, defaults to the first attached device
    #[arg(short, long)]
    device: Option<String>,

    /// Template library directory
    #[arg(short, long)]
    templates: Option<String>,

    /// Stop after this many cycles, 0 runs until interrupted
    #[arg(long)]
    max_cycles: Option<u32>,

    /// Threshold preset to start from
    #[arg(long, value_enum)]
    preset: Option<Preset>,

    /// List attached devices and exit
    #[arg(long)]
    list_devices: bool,

    /// Write the default settings to a file and exit
    #[arg(long, value_name = "PATH")]
    write_config: Option<PathBuf>,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum Preset {
    /// Gold and elixir farming
    Loot,
    /// Dark elixir hunting
    Dark,
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    if let Err(err) = run(cli) {
        log::error!("{err}");
        return ExitCode::FAILURE;
    }
    ExitCode::SUCCESS
}

fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    if cli.list_devices {
        for serial in AdbDevice::devices()? {
            println!("{serial}");
        }
        return Ok(());
    }
    if let Some(path) = cli.write_config {
        Settings::default().save(&path)?;
        println!("wrote default settings to {}", path.display());
        return Ok(());
    }

    let mut settings = match &cli.config {
        Some(path) => Settings::load(path)?,
        None => Settings::default(),
    };
    if let Some(device) = cli.device {
        settings.device = Some(device);
    }
    if let Some(templates) = cli.templates {
        settings.template_dir = templates;
    }
    if let Some(max_cycles) = cli.max_cycles {
        settings.automation.max_cycles = max_cycles;
    }
    if let Some(preset) = cli.preset {
        let base = match preset {
            Preset::Loot => Settings::loot_preset(),
            Preset::Dark => Settings::dark_elixir_preset(),
        };
        settings.thresholds = base.thresholds;
        settings.attack_rule = base.attack_rule;
    }

    let device = match &settings.device {
        Some(serial) => AdbDevice::new(serial.clone()),
        None => AdbDevice::first()?,
    };

    match device.screen_size() {
        Ok(size) if size != REFERENCE_RESOLUTION => warn!(
            "device is {}x{}, templates assume {}x{}; matching may suffer",
            size.0, size.1, REFERENCE_RESOLUTION.0, REFERENCE_RESOLUTION.1
        ),
        Ok(_) => {}
        Err(err) => warn!("could not read screen size: {err}"),
    }

    let templates = TemplateLibrary::load(Path::new(&settings.template_dir))?;
    let mut screen = AdbScreen::new(device, templates);
    info!("driving device {}", screen.device().serial());
    if !screen.zoom_out() {
        warn!("zoom-out gesture failed, the view may be misaligned");
    }

    let extractor = ResourceExtractor::new(
        DigitReader::new(),
        settings.ocr.ceiling_rule,
        settings.ocr.read_trophies,
    );
    let log = SessionLog::open(Path::new(&settings.session_log))?;

    let mut bot = Goblin::new(screen, extractor, log, Box::new(LogNotifier), settings);
    bot.run(&StopFlag::new())?;
    Ok(())
}
