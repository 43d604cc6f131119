//! Logger setup

/// Map a `-v` style counter to a level filter. `quiet` wins over verbosity.
pub fn level_for(verbosity: u8, quiet: bool) -> log::LevelFilter {
    if quiet {
        return log::LevelFilter::Error;
    }
    match verbosity {
        0 => log::LevelFilter::Warn,
        1 => log::LevelFilter::Info,
        2 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    }
}

/// Install `env_logger` as the global logger.
///
/// Safe to call more than once; later calls leave the first logger in place.
pub fn init_logging(verbosity: u8, quiet: bool) {
    let result = env_logger::Builder::new()
        .filter_level(level_for(verbosity, quiet))
        .format_timestamp(None)
        .try_init();
    if result.is_err() {
        log::debug!("logger already initialized");
    }
}
