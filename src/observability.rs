//! This module provides observability and diagnostics for the ingestion path.
//!
//! Which write strategy a column took (zero-copy, flatten, sparse, interning) is
//! the main thing worth seeing when an ingestion is slower than expected. The
//! `log_metric!` macro emits those decisions as structured key/value lines
//! through the `log` facade. Calls are compiled out of release builds.

/// Logs a structured key-value metric line at debug level, only in debug builds.
///
/// # Example
/// ```
/// use tickstore::log_metric;
/// let rows = 4;
/// log_metric!("event"="column_write", "strategy"="zero_copy", "rows"=&rows);
/// ```
#[macro_export]
macro_rules! log_metric {
    ($($key:literal = $value:expr),+ $(,)?) => {
        #[cfg(debug_assertions)]
        {
            let mut parts = Vec::new();
            $(
                parts.push(format!("\"{}\": \"{}\"", $key, $value));
            )+
            log::debug!("TICKSTORE_METRIC: {{ {} }}", parts.join(", "));
        }
    };
}

/// Installs a process-wide `env_logger` at `level`. Later calls are no-ops.
///
/// With `log_file` set, output is appended to that file instead of stderr.
pub fn init_logging(level: log::LevelFilter, log_file: Option<&str>) -> Result<(), crate::error::IngestError> {
    use std::io::Write;
    use std::sync::Once;

    static INIT_LOGGER: Once = Once::new();

    let target = match log_file {
        Some(path) => Some(
            std::fs::OpenOptions::new()
                .append(true)
                .create(true)
                .open(path)?,
        ),
        None => None,
    };

    INIT_LOGGER.call_once(|| {
        let mut builder = env_logger::Builder::new();
        builder.is_test(false);
        builder.filter_level(level);

        // Custom formatter: just print the level and message
        builder.format(|buf, record| {
            writeln!(buf, "[{}] {}", record.level(), record.args())?;
            buf.flush()?;
            Ok(())
        });

        if let Some(file) = target {
            builder.target(env_logger::Target::Pipe(Box::new(file)));
        }

        let _ = builder.try_init();
    });
    Ok(())
}
