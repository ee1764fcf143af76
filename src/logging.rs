use crate::config::Environment;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Per-environment default when RUST_LOG is not set.
fn default_filter(env: &Environment) -> &'static str {
    match env {
        Environment::Dev => "sitecontrol_backend=debug,tower_http=debug,info",
        Environment::Staging => "sitecontrol_backend=debug,tower_http=info,info",
        Environment::Prod => "sitecontrol_backend=info,tower_http=info,warn",
    }
}

pub fn init_logging(env: &Environment) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_filter(env)));

    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_target(true)
        .with_file(env.is_dev())
        .with_line_number(env.is_dev());

    // JSON lines in production so the collector can parse them; pretty
    // output everywhere else.
    if env.is_prod() {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt_layer.json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt_layer.pretty())
            .init();
    }

    tracing::info!(environment = ?env, "Logging initialized");
}
