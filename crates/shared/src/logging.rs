use log::LevelFilter;

// Logging bootstrap shared across crates

/// Maps a `LOG_LEVEL` style string onto a filter; unknown values mean INFO.
pub fn parse_level_filter(level: &str) -> LevelFilter {
    match level.trim().to_uppercase().as_str() {
        "OFF" => LevelFilter::Off,
        "ERROR" => LevelFilter::Error,
        "WARN" | "WARNING" => LevelFilter::Warn,
        "INFO" => LevelFilter::Info,
        "DEBUG" => LevelFilter::Debug,
        "TRACE" => LevelFilter::Trace,
        _ => LevelFilter::Info,
    }
}

pub fn init_logging(level: &str) {
    let mut builder = env_logger::Builder::from_default_env();
    builder.filter_level(parse_level_filter(level));

    // HTTP plumbing is chatty at INFO and below
    builder.filter_module("actix_server", LevelFilter::Warn);
    builder.filter_module("reqwest", LevelFilter::Warn);
    builder.filter_module("hyper", LevelFilter::Warn);

    // A second init (tests, embedded use) keeps the first logger
    if let Err(e) = builder.try_init() {
        eprintln!("Logger already initialized: {}", e);
        return;
    }

    log::info!("Logging initialized with level: {}", level);
}
