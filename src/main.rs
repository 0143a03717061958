// MIT License - Copyright (c) 2026 Peter Wright
// Bosch Mode 2 client

use anyhow::{bail, Context, Result};
use clap::Parser;
use serde::Deserialize;
use tokio::signal::unix::{signal, SignalKind};
use tokio::sync::broadcast::error::RecvError;
use tokio::time::Duration;
use tracing::{error, info, warn};

use bosch_mode2::{AlarmCategory, ArmingType, Controller, PanelConfig, PanelEvent, UserType};

// ---------------------------------------------------------------------------
// CLI
// ---------------------------------------------------------------------------

#[derive(Parser)]
#[command(name = "mode2-monitor")]
#[command(about = "Monitor and control a Bosch panel over the Mode 2 protocol")]
struct Cli {
    /// Path to the TOML configuration file
    #[arg(long, default_value = "mode2.toml")]
    config: String,

    /// Arm or disarm areas and exit (disarm, away, stay, force_away, ...)
    #[arg(long, requires = "area")]
    arm: Option<String>,

    /// Area number for --arm (repeatable)
    #[arg(long)]
    area: Vec<u16>,

    /// Output number to switch; combine with --on or --off
    #[arg(long)]
    output: Option<u16>,

    #[arg(long, requires = "output", conflicts_with = "off")]
    on: bool,

    #[arg(long, requires = "output")]
    off: bool,
}

// ---------------------------------------------------------------------------
// Config
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct Config {
    panel: PanelToml,
}

#[derive(Debug, Deserialize)]
struct PanelToml {
    host: String,
    #[serde(default = "default_port")]
    port: u16,
    passcode: String,
    #[serde(default = "default_user_type")]
    user_type: String,
    #[serde(default)]
    force_legacy_mode: bool,
    #[serde(default = "default_idle_timeout")]
    idle_timeout_ms: u64,
    #[serde(default = "default_poll_interval")]
    poll_interval_ms: u64,
    #[serde(default = "default_connect_timeout")]
    connect_timeout_ms: u64,
    #[serde(default = "default_reconnect_delay")]
    reconnect_delay_ms: u64,
}

fn default_port() -> u16 {
    7700
}
fn default_user_type() -> String {
    "automation".to_string()
}
fn default_idle_timeout() -> u64 {
    180_000
}
fn default_poll_interval() -> u64 {
    500
}
fn default_connect_timeout() -> u64 {
    10_000
}
fn default_reconnect_delay() -> u64 {
    5_000
}

fn build_panel_config(toml: &PanelToml) -> Result<PanelConfig> {
    let Some(user_type) = UserType::from_name(&toml.user_type) else {
        bail!("Unknown user_type '{}' (expected automation or installer)", toml.user_type);
    };
    let config = PanelConfig::builder()
        .host(&toml.host)
        .port(toml.port)
        .passcode(&toml.passcode)
        .user_type(user_type)
        .force_legacy_mode(toml.force_legacy_mode)
        .idle_timeout_ms(toml.idle_timeout_ms)
        .poll_interval_ms(toml.poll_interval_ms)
        .connect_timeout_ms(toml.connect_timeout_ms)
        .build();
    config.validate().context("Invalid panel configuration")?;
    Ok(config)
}

// ---------------------------------------------------------------------------
// Event logging
// ---------------------------------------------------------------------------

fn log_event(event: &PanelEvent) {
    match event {
        PanelEvent::PanelReady { ready } => info!("Panel ready: {ready}"),
        PanelEvent::ReceivingNotificationsChanged { receiving } => {
            info!("Receiving notifications: {receiving}")
        }
        PanelEvent::ControllerError { kind, message } => warn!("{kind:?}: {message}"),
        PanelEvent::PointStatusChanged { point } => info!(
            "Point {} '{}' (area {}): {}",
            point.number,
            point.text,
            point.area,
            point.status.description()
        ),
        PanelEvent::AreaReadyChanged { area } => info!(
            "Area {} '{}': ready all-on={} part-on={}, {} faults",
            area.number, area.text, area.ready_all_on, area.ready_part_on, area.fault_count
        ),
        PanelEvent::AreaOnOffChanged { area } => {
            info!("Area {} '{}': {:?}", area.number, area.text, area.status)
        }
        PanelEvent::AreaAlarmChanged { area } => info!(
            "Area {} '{}': in alarm={} burglary={:?} fire={:?}",
            area.number,
            area.text,
            area.in_alarm(),
            area.alarm_level(AlarmCategory::Burglary),
            area.alarm_level(AlarmCategory::Fire)
        ),
        PanelEvent::OutputStateChanged { output } => info!(
            "Output {} '{}': {}",
            output.number,
            output.text,
            if output.on { "on" } else { "off" }
        ),
        PanelEvent::ConfidenceHeartbeat { at } => info!("Heartbeat at {at}"),
    }
}

async fn run_command(controller: &Controller, cli: &Cli) -> Result<()> {
    if let Some(name) = &cli.arm {
        let Some(arming) = ArmingType::from_name(name) else {
            bail!("Unknown arming type '{name}'");
        };
        controller
            .arm_areas(&cli.area, arming)
            .await
            .with_context(|| format!("Failed to {name} areas {:?}", cli.area))?;
        info!("Areas {:?}: {name} accepted", cli.area);
    }
    if let Some(output) = cli.output {
        if cli.on == cli.off {
            bail!("--output needs exactly one of --on or --off");
        }
        controller
            .set_output_state(output, cli.on)
            .await
            .with_context(|| format!("Failed to switch output {output}"))?;
        info!("Output {output} switched {}", if cli.on { "on" } else { "off" });
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

#[tokio::main]
async fn main() -> Result<()> {
    // RUST_LOG controls verbosity (e.g. RUST_LOG=bosch_mode2=debug). Default: info.
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    // systemd journal already adds timestamps
    if std::env::var_os("JOURNAL_STREAM").is_some() {
        tracing_subscriber::fmt().without_time().with_env_filter(env_filter).init();
    } else {
        tracing_subscriber::fmt().with_env_filter(env_filter).init();
    }

    let cli = Cli::parse();

    let config_text =
        std::fs::read_to_string(&cli.config).context("Failed to read config file")?;
    let config: Config = toml::from_str(&config_text).context("Failed to parse config file")?;
    let panel_config = build_panel_config(&config.panel)?;
    let reconnect_delay_ms = config.panel.reconnect_delay_ms;

    // One-shot control commands don't need the monitoring loop.
    if cli.arm.is_some() || cli.output.is_some() {
        let controller = Controller::new(panel_config);
        controller.connect().await.context("Failed to connect to panel")?;
        let result = run_command(&controller, &cli).await;
        controller.disconnect().await;
        return result;
    }

    let mut sigterm = signal(SignalKind::terminate())?;
    let mut attempt: u32 = 0;

    loop {
        if attempt > 0 {
            let delay_ms = reconnect_delay_ms * (1u64 << (attempt - 1).min(4));
            error!(
                "Connection attempt {attempt} failed. Retrying in {:.1}s...",
                delay_ms as f64 / 1000.0
            );
            tokio::time::sleep(Duration::from_millis(delay_ms)).await;
        }
        attempt += 1;

        let controller = Controller::new(panel_config.clone());
        let mut rx = controller.subscribe();

        if let Err(e) = controller.connect().await {
            warn!("Connect failed: {e}");
            continue;
        }
        if let Err(e) = controller.begin_operation().await {
            warn!("Start of operation failed: {e}");
            controller.disconnect().await;
            continue;
        }
        attempt = 0;
        info!(
            "Monitoring {} areas, {} points, {} outputs",
            controller.areas().await.len(),
            controller.points().await.len(),
            controller.outputs().await.len()
        );

        let lost = loop {
            tokio::select! {
                event = rx.recv() => match event {
                    Ok(PanelEvent::PanelReady { ready: false }) => {
                        log_event(&PanelEvent::PanelReady { ready: false });
                        break true;
                    }
                    Ok(event) => log_event(&event),
                    Err(RecvError::Lagged(n)) => warn!("Event receiver lagged, missed {n} events"),
                    Err(RecvError::Closed) => break true,
                },
                _ = tokio::signal::ctrl_c() => {
                    info!("Received Ctrl-C, shutting down");
                    break false;
                }
                _ = sigterm.recv() => {
                    info!("Received SIGTERM, shutting down");
                    break false;
                }
            }
        };

        controller.disconnect().await;
        if !lost {
            return Ok(());
        }
        warn!("Panel connection lost, reconnecting");
        attempt = 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(text: &str) -> Config {
        toml::from_str(text).unwrap()
    }

    #[test]
    fn test_config_defaults_applied() {
        let config = parse(
            r#"
            [panel]
            host = "10.0.0.9"
            passcode = "0123456789"
            "#,
        );
        assert_eq!(config.panel.port, 7700);
        assert_eq!(config.panel.user_type, "automation");
        assert_eq!(config.panel.reconnect_delay_ms, 5_000);

        let panel = build_panel_config(&config.panel).unwrap();
        assert_eq!(panel.host, "10.0.0.9");
        assert_eq!(panel.user_type, UserType::AutomationUser);
        assert_eq!(panel.poll_interval_ms, 500);
    }

    #[test]
    fn test_config_installer_user() {
        let config = parse(
            r#"
            [panel]
            host = "panel.local"
            passcode = "1234"
            user_type = "installer"
            force_legacy_mode = true
            "#,
        );
        let panel = build_panel_config(&config.panel).unwrap();
        assert_eq!(panel.user_type, UserType::InstallerApp);
        assert!(panel.force_legacy_mode);
    }

    #[test]
    fn test_config_rejects_unknown_user_type() {
        let config = parse(
            r#"
            [panel]
            host = "panel.local"
            passcode = "123456"
            user_type = "guest"
            "#,
        );
        assert!(build_panel_config(&config.panel).is_err());
    }

    #[test]
    fn test_config_rejects_short_passcode() {
        let config = parse(
            r#"
            [panel]
            host = "panel.local"
            passcode = "12"
            "#,
        );
        assert!(build_panel_config(&config.panel).is_err());
    }

    #[test]
    fn test_cli_arm_requires_area() {
        assert!(Cli::try_parse_from(["mode2-monitor", "--arm", "away"]).is_err());
        let cli =
            Cli::try_parse_from(["mode2-monitor", "--arm", "away", "--area", "1", "--area", "2"])
                .unwrap();
        assert_eq!(cli.area, vec![1, 2]);
    }

    #[test]
    fn test_cli_output_switch() {
        let cli = Cli::try_parse_from(["mode2-monitor", "--output", "3", "--on"]).unwrap();
        assert_eq!(cli.output, Some(3));
        assert!(cli.on && !cli.off);
        assert!(Cli::try_parse_from(["mode2-monitor", "--output", "3", "--on", "--off"]).is_err());
        assert!(Cli::try_parse_from(["mode2-monitor", "--on"]).is_err());
    }
}
