use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::{LogFormat, Settings};

/// Default filter when `RUST_LOG` is unset.
pub fn default_directives(settings: &Settings) -> String {
    let level = if settings.debug {
        "debug"
    } else {
        settings.log_level.as_str()
    };
    let sqlx = if settings.db_echo { "debug" } else { "warn" };
    format!(
        "{}={level},tower_http={level},sqlx={sqlx},{level}",
        env!("CARGO_CRATE_NAME")
    )
}

pub fn init(settings: &Settings) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directives(settings)));

    let registry = tracing_subscriber::registry().with(filter);
    match settings.log_format {
        LogFormat::Json => registry
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_current_span(true)
                    .with_span_list(false),
            )
            .init(),
        LogFormat::Text => registry
            .with(tracing_subscriber::fmt::layer().compact())
            .init(),
    }
}
