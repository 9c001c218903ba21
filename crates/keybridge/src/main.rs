//! `keybridge` binary: argument parsing, wiring, and process lifecycle.
//!
//! Everything interesting lives in the library; this file only turns CLI
//! arguments into a [`BridgeConfig`] and an [`EntityMap`], installs the
//! Ctrl-C handler, and maps the supervisor's exit onto a process status.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context};
use clap::Parser;
use keybridge_core::{EntityId, EntityMap};
use tracing::info;
use tracing_subscriber::EnvFilter;

use keybridge::application::remote::RemoteStateClient;
use keybridge::application::transport::DeviceConnector;
use keybridge::application::{BridgeSessionDriver, BridgeSupervisor, SupervisorExit};
use keybridge::domain::BridgeConfig;
use keybridge::infrastructure::ha_client::HaClient;
use keybridge::infrastructure::serial::SerialConnector;

/// Bridges a serial keypad to Home Assistant: key presses toggle entities,
/// entity states light key LEDs.
#[derive(Debug, Parser)]
#[command(name = "keybridge", version, about)]
struct Cli {
    /// Base URL of the Home Assistant instance.
    #[arg(long, env = "KEYBRIDGE_HA_URL", default_value = "http://homeassistant.local:8123")]
    ha_url: String,

    /// Long-lived access token for the Home Assistant REST API.
    #[arg(long, env = "KEYBRIDGE_HA_TOKEN", hide_env_values = true)]
    ha_token: String,

    /// Serial device path of the keypad.
    #[arg(long, env = "KEYBRIDGE_SERIAL_PORT", default_value = "/dev/ttyACM0")]
    serial_port: String,

    /// Serial line speed.
    #[arg(long, default_value_t = 115_200)]
    baud_rate: u32,

    /// Key-to-entity mapping; repeatable.
    /// Example: --map 3=switch.living_room_lights --map 7=scene.movie_night
    #[arg(long = "map", value_name = "KEY=ENTITY_ID", required = true)]
    map: Vec<String>,

    /// Seconds to wait between restart attempts after a failure.
    #[arg(long, default_value_t = 5)]
    retry_delay: u64,

    /// Give up after this many consecutive failed attempts (default: retry
    /// forever).
    #[arg(long)]
    max_retries: Option<u32>,
}

/// Parses one `KEY=ENTITY_ID` mapping argument.
fn parse_map_entry(entry: &str) -> anyhow::Result<(u8, EntityId)> {
    let (key, entity) = entry
        .split_once('=')
        .with_context(|| format!("mapping {entry:?} is not of the form KEY=ENTITY_ID"))?;

    let key: u8 = key
        .trim()
        .parse()
        .with_context(|| format!("mapping {entry:?} has a non-numeric key"))?;

    let entity = entity.trim();
    if entity.is_empty() {
        bail!("mapping {entry:?} has an empty entity id");
    }

    Ok((key, EntityId::from(entity)))
}

impl Cli {
    /// Validates the arguments into runtime settings.
    fn into_settings(self) -> anyhow::Result<(BridgeConfig, EntityMap)> {
        if self.ha_token.trim().is_empty() {
            bail!(
                "--ha-token must not be blank; create one under your Home Assistant \
                 profile's long-lived access tokens"
            );
        }

        let pairs = self
            .map
            .iter()
            .map(|entry| parse_map_entry(entry))
            .collect::<anyhow::Result<Vec<_>>>()?;
        let entities = EntityMap::from_pairs(pairs).context("invalid --map arguments")?;

        let config = BridgeConfig {
            ha_url: self.ha_url,
            ha_token: self.ha_token,
            serial_port: self.serial_port,
            baud_rate: self.baud_rate,
            retry_delay: Duration::from_secs(self.retry_delay),
            max_retries: self.max_retries,
            ..Default::default()
        }
        .normalized();

        Ok((config, entities))
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let (config, entities) = Cli::parse().into_settings()?;

    info!("Home Assistant: {}", config.ha_url);
    info!("serial port:    {} at {} baud", config.serial_port, config.baud_rate);
    info!("mapped keys:    {}", entities.len());
    match config.max_retries {
        Some(max) => info!("retry policy:   up to {max} consecutive failures"),
        None => info!("retry policy:   restart forever"),
    }

    // Ctrl-C raises the shutdown flag; the session and supervisor observe
    // it at their loop boundaries and unwind cleanly.
    let shutdown = Arc::new(AtomicBool::new(false));
    let signal_flag = Arc::clone(&shutdown);
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("received Ctrl-C, shutting down");
                signal_flag.store(true, Ordering::Relaxed);
            }
            Err(e) => tracing::error!("failed to listen for Ctrl-C: {e}"),
        }
    });

    let config = Arc::new(config);
    let remote: Arc<dyn RemoteStateClient> = Arc::new(HaClient::new(&config)?);
    let connector: Arc<dyn DeviceConnector> = Arc::new(SerialConnector::new(&config));
    let driver = BridgeSessionDriver::new(
        connector,
        remote,
        Arc::new(entities),
        Arc::clone(&config),
        Arc::clone(&shutdown),
    );

    let mut supervisor = BridgeSupervisor::new(driver, &config, shutdown);
    match supervisor.run().await {
        SupervisorExit::Interrupted => {
            info!("bridge stopped");
            Ok(())
        }
        SupervisorExit::RetriesExhausted { attempts } => {
            bail!("giving up after {attempts} consecutive failed attempts")
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Cli {
        Cli::parse_from(args)
    }

    #[test]
    fn test_minimal_invocation_gets_the_defaults() {
        let cli = parse(&[
            "keybridge",
            "--ha-token",
            "tok",
            "--map",
            "0=switch.desk_lamp",
        ]);

        assert_eq!(cli.ha_url, "http://homeassistant.local:8123");
        assert_eq!(cli.serial_port, "/dev/ttyACM0");
        assert_eq!(cli.baud_rate, 115_200);
        assert_eq!(cli.retry_delay, 5);
        assert_eq!(cli.max_retries, None);
    }

    #[test]
    fn test_map_argument_is_required() {
        let result = Cli::try_parse_from(["keybridge", "--ha-token", "tok"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_repeated_map_arguments_accumulate() {
        let cli = parse(&[
            "keybridge",
            "--ha-token",
            "tok",
            "--map",
            "0=switch.desk_lamp",
            "--map",
            "7=scene.movie_night",
        ]);

        let (_, entities) = cli.into_settings().unwrap();
        assert_eq!(entities.len(), 2);
        assert_eq!(entities.get(7).unwrap().as_str(), "scene.movie_night");
    }

    #[test]
    fn test_settings_normalize_the_ha_url() {
        let cli = parse(&[
            "keybridge",
            "--ha-token",
            "tok",
            "--ha-url",
            "http://10.0.0.58:8123/",
            "--map",
            "0=switch.desk_lamp",
        ]);

        let (config, _) = cli.into_settings().unwrap();
        assert_eq!(config.ha_url, "http://10.0.0.58:8123");
    }

    #[test]
    fn test_blank_token_is_rejected() {
        let cli = parse(&[
            "keybridge",
            "--ha-token",
            "   ",
            "--map",
            "0=switch.desk_lamp",
        ]);

        assert!(cli.into_settings().is_err());
    }

    #[test]
    fn test_duplicate_keys_are_rejected() {
        let cli = parse(&[
            "keybridge",
            "--ha-token",
            "tok",
            "--map",
            "3=switch.a",
            "--map",
            "3=switch.b",
        ]);

        assert!(cli.into_settings().is_err());
    }

    #[test]
    fn test_map_entry_parses_and_trims() {
        let (key, entity) = parse_map_entry(" 12 = switch.desk_lamp ").unwrap();
        assert_eq!(key, 12);
        assert_eq!(entity.as_str(), "switch.desk_lamp");
    }

    #[test]
    fn test_map_entry_rejects_bad_shapes() {
        assert!(parse_map_entry("no-equals-sign").is_err());
        assert!(parse_map_entry("x=switch.desk_lamp").is_err());
        assert!(parse_map_entry("300=switch.desk_lamp").is_err());
        assert!(parse_map_entry("3=").is_err());
    }
}
