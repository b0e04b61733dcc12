//! Poll a running engine once per second and print the snapshot.
//!
//! Usage: `cargo run --example poll_current -- [host] [port]`
//! Set `RUST_LOG=liqtelnet=debug` to watch the wire traffic.

use std::time::Duration;

use liqtelnet::{Connector, ConnectorConfig, ConnectorMethod};

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let mut args = std::env::args().skip(1);
    let host = args.next().unwrap_or_else(|| "127.0.0.1".to_string());
    let port: u16 = match args.next() {
        Some(raw) => raw.parse()?,
        None => 1234,
    };

    let config = ConnectorConfig {
        method: ConnectorMethod::Live,
        host,
        port,
        ..ConnectorConfig::default()
    };
    let connector = Connector::from_config(&config);

    loop {
        let snapshot = connector.current();
        println!("{}", serde_json::to_string_pretty(&snapshot)?);
        std::thread::sleep(Duration::from_secs(1));
    }
}
