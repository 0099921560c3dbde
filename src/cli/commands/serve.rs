//! Web server command.

use console::style;

use crate::config::Settings;

/// Start the web server.
pub async fn cmd_serve(settings: &Settings) -> anyhow::Result<()> {
    settings.ensure_directories()?;

    println!(
        "{} Starting receipt extractor at http://{}",
        style("→").cyan(),
        settings.bind
    );
    println!(
        "  Storing receipts in {}",
        style(settings.storage_dir.display()).dim()
    );
    println!("  Press Ctrl+C to stop");

    crate::server::serve(settings).await
}

/// Resolve a `--bind` value against the configured address.
///
/// - Just a port: "8080" keeps the configured host
/// - Just a host: "0.0.0.0" keeps the configured port
/// - Host and port: "0.0.0.0:8080" is used as-is
pub fn parse_bind_address(bind: &str, current: &str) -> String {
    let (current_host, current_port) = current.rsplit_once(':').unwrap_or((current, "3000"));

    if bind.parse::<u16>().is_ok() {
        return format!("{}:{}", current_host, bind);
    }

    if let Some((_, port)) = bind.rsplit_once(':') {
        if port.parse::<u16>().is_ok() {
            return bind.to_string();
        }
    }

    format!("{}:{}", bind, current_port)
}
