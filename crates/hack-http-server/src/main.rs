//! hack-http-server - programmable HTTP test double

use anyhow::{Context, Result};
use clap::Parser;
use hack_http_server::config::parse_flag;
use hack_http_server::{Server, ServerConfig};
use std::net::IpAddr;
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(name = "hack-http-server", version, about)]
struct Args {
    /// Port to listen on
    #[arg(env = "HACK_HTTP_SERVER_PORT")]
    port: Option<u16>,

    /// Enable logging (1/true/yes/on)
    #[arg(env = "HACK_HTTP_SERVER_LOG", value_parser = parse_flag)]
    log: Option<bool>,

    /// Address to bind
    #[arg(long, env = "HACK_HTTP_SERVER_HOST")]
    host: Option<IpAddr>,

    /// YAML configuration file
    #[arg(short, long, env = "HACK_HTTP_SERVER_CONFIG")]
    config: Option<PathBuf>,

    /// Delay before the read-timeout response completes
    #[arg(long, env = "HACK_HTTP_SERVER_READ_TIMEOUT_SECS")]
    read_timeout_secs: Option<u64>,
}

impl Args {
    /// File settings (or defaults) with command line values on top
    fn into_config(self) -> Result<ServerConfig> {
        let mut config = match self.config {
            Some(ref path) => ServerConfig::from_file(path)
                .with_context(|| format!("loading {}", path.display()))?,
            None => ServerConfig::default(),
        };

        if let Some(port) = self.port {
            config.port = port;
        }
        if let Some(log) = self.log {
            config.log = log;
        }
        if let Some(host) = self.host {
            config.host = host;
        }
        if let Some(secs) = self.read_timeout_secs {
            config.read_timeout_delay_secs = secs;
        }
        Ok(config)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let config = Args::parse().into_config()?;

    let default_filter = if config.log { "hack_http_server=info" } else { "off" };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let server = Server::bind(config).await?;
    let shutdown = server.shutdown_token();

    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Received Ctrl-C, shutting down...");
            shutdown.cancel();
        }
    });

    server.run().await;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_positional_port_and_log() {
        let args = Args::try_parse_from(["hack-http-server", "9000", "1"]).unwrap();
        let config = args.into_config().unwrap();
        assert_eq!(config.port, 9000);
        assert!(config.log);
    }

    #[test]
    fn test_log_flag_rejects_garbage() {
        assert!(Args::try_parse_from(["hack-http-server", "9000", "maybe"]).is_err());
    }

    #[test]
    fn test_cli_overrides_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        std::io::Write::write_all(&mut file, b"port: 7000\nreadTimeoutDelaySecs: 3\n").unwrap();
        let path = file.path().to_str().unwrap().to_string();

        let args = Args::try_parse_from([
            "hack-http-server",
            "7100",
            "--config",
            path.as_str(),
        ])
        .unwrap();
        let config = args.into_config().unwrap();
        assert_eq!(config.port, 7100);
        assert_eq!(config.read_timeout_delay_secs, 3);
    }
}
