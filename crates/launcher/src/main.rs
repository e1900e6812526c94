use std::path::PathBuf;

use bevy::log::Level;
use clap::{Parser, ValueEnum};
use launcher::{LaunchOptions, create_app};

#[derive(Parser)]
#[command(name = "traversal-demo")]
#[command(version = "0.1")]
#[command(about = "Third-person traversal sandbox: walk, run, roll, climb ladders, mantle ledges")]
#[command(long_about = "
Third-person traversal sandbox: walk, run, roll, climb ladders, mantle ledges

CONTROLS:
    WASD / arrows  move        Shift  run       Space  jump
    Ctrl           roll        E      interact  Q      ladder dash
    F              equip       Z / C  orbit camera

EXAMPLES:
    cargo run --bin launcher                                      # Windowed demo
    cargo run --bin launcher -- --config assets/traversal.ron     # Custom tunables
    cargo run --bin launcher -- --headless --frames 600           # Ten seconds without a window
    cargo run --bin launcher -- --log-level debug                 # Log every hand-off
")]
struct Cli {
    #[arg(long, default_value_t = false)]
    headless: bool,

    #[arg(long)]
    #[arg(help = "Exit after this many frames")]
    frames: Option<u32>,

    #[arg(short, long, default_value = "assets/traversal.ron")]
    #[arg(help = "RON file with traversal tunables; defaults are used if it cannot be read")]
    config: PathBuf,

    #[arg(long, value_enum, default_value_t = LogLevel::Info)]
    log_level: LogLevel,
}

#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, ValueEnum)]
enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl From<LogLevel> for Level {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Error => Level::ERROR,
            LogLevel::Warn => Level::WARN,
            LogLevel::Info => Level::INFO,
            LogLevel::Debug => Level::DEBUG,
            LogLevel::Trace => Level::TRACE,
        }
    }
}

fn main() {
    let cli = Cli::parse();

    let options = LaunchOptions {
        headless: cli.headless,
        log_level: Some(cli.log_level.into()),
        config_path: Some(cli.config),
        frames: cli.frames,
    };
    create_app(&options).run();
}
