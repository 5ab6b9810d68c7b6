//! Logging setup. Grounded on the teacher's `main.rs::init_logger`
//! (`simplelog::CombinedLogger` with a terminal sink and a file sink),
//! extended to actually rotate the file sink with `file-rotate` (a
//! teacher dependency its committed `init_logger` never wires up).
//!
//! `hackLog` (§4.7/§7) and `unloggedGames` (§4.6/§7) are not separate
//! frameworks, just dedicated `log` targets so operators can grep them
//! out of the ordinary operational stream.

use file_rotate::{compression::Compression, suffix::AppendCount, ContentLimit, FileRotate};
use log::LevelFilter;
use simplelog::{ColorChoice, CombinedLogger, Config, TermLogger, TerminalMode, WriteLogger};
use std::path::Path;

pub const HACK_TARGET: &str = "hack";
pub const UNLOGGED_GAMES_TARGET: &str = "unlogged_games";

pub fn init_logger(log_file: &Path) {
    let rotating_file = FileRotate::new(
        log_file,
        AppendCount::new(5),
        ContentLimit::Bytes(10 * 1024 * 1024),
        Compression::None,
        #[cfg(unix)]
        None,
    );

    let result = CombinedLogger::init(vec![
        TermLogger::new(
            LevelFilter::Info,
            Config::default(),
            TerminalMode::Mixed,
            ColorChoice::Auto,
        ),
        WriteLogger::new(LevelFilter::Debug, Config::default(), rotating_file),
    ]);

    if let Err(err) = result {
        // Logging isn't up yet, so this is one of the few places we're
        // allowed to print directly.
        println!("Could not initialize logger: {err}");
    }
}

/// Records a tamper/format violation the spec requires be logged
/// separately from ordinary operational noise (§4.7 steps 6-8, §7.3).
#[macro_export]
macro_rules! hack_log {
    ($($arg:tt)*) => {
        log::warn!(target: $crate::logging::HACK_TARGET, $($arg)*)
    };
}

/// Records a game whose persistence transaction rolled back (§4.6 step 2,
/// §7.6), so operators can recover its text from log aggregation.
#[macro_export]
macro_rules! unlogged_game {
    ($($arg:tt)*) => {
        log::error!(target: $crate::logging::UNLOGGED_GAMES_TARGET, $($arg)*)
    };
}
