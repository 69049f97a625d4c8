use log::LevelFilter;

#[cfg(target_os = "android")]
pub fn init() {
    use android_logger::Config;

    let level = if cfg!(debug_assertions) {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };
    android_logger::init_once(Config::default().with_tag("cputemp").with_max_level(level));
}

#[cfg(not(target_os = "android"))]
pub fn init() {
    use tracing_subscriber::EnvFilter;

    let default = if cfg!(debug_assertions) {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!(
            "cputemp_throttle={default},throttle_control={default}"
        ))
    });

    // Status lines own stdout, diagnostics go to stderr
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}
