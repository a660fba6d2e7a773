/// Platform-native logging initialization.
///
/// - iOS: tracing-oslog → Apple unified logging (os_log) + `<data_dir>/umee.log`
/// - Android: paranoid-android → logcat
/// - Tests / desktop: tracing-subscriber::fmt → stderr, `RUST_LOG` wins if set
///
/// `log_filter` comes from `umee_config.json`; `None` means the default directives.
/// Called once at the start of `FfiApp::new()`. Later calls are no-ops (`try_init`).
pub fn init_logging(#[allow(unused)] data_dir: &str, log_filter: Option<&str>) {
    let directives = filter_directives(log_filter);

    #[cfg(target_os = "ios")]
    {
        use tracing_subscriber::prelude::*;

        let os_log = tracing_oslog::OsLogger::new("com.umee.chat", "default");

        let log_path = std::path::Path::new(data_dir).join("umee.log");
        let _ = std::fs::create_dir_all(data_dir);
        let file_layer = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&log_path)
            .ok()
            .map(|file| {
                tracing_subscriber::fmt::layer()
                    .with_writer(std::sync::Mutex::new(file))
                    .with_ansi(false)
                    .with_target(true)
            });

        let _ = tracing_subscriber::registry()
            .with(tracing_subscriber::EnvFilter::new(&directives))
            .with(os_log)
            .with(file_layer)
            .try_init();
    }

    #[cfg(target_os = "android")]
    {
        use tracing_subscriber::prelude::*;

        let android_layer = paranoid_android::layer("umee")
            .with_filter(tracing_subscriber::EnvFilter::new(&directives));

        let _ = tracing_subscriber::registry()
            .with(android_layer)
            .try_init();
    }

    #[cfg(not(any(target_os = "ios", target_os = "android")))]
    {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| directives.as_str().into()),
            )
            .try_init();
    }
}

// Polling logs every fetch at debug; the HTTP stack stays quiet unless asked for.
const DEFAULT_DIRECTIVES: &str = "umee_core=debug,umee_test_utils=info,reqwest=info,hyper_util=warn,info";

fn filter_directives(log_filter: Option<&str>) -> String {
    match log_filter.map(str::trim) {
        Some(f) if !f.is_empty() => f.to_string(),
        _ => DEFAULT_DIRECTIVES.to_string(),
    }
}
