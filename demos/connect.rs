//! Example: Connect to a Bosch panel and print what it reports.

use bosch_mode2::{Controller, PanelConfig};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    let config = PanelConfig::builder()
        .host("192.168.1.20")
        .port(7700)
        .passcode("0123456789")
        .build();

    println!("Connecting to panel...");
    let controller = Controller::new(config);
    controller.connect().await?;
    controller.begin_operation().await?;

    if let Some(caps) = controller.capabilities().await {
        println!(
            "Panel: {} protocol {} firmware {}",
            caps.panel_type.name(),
            caps.protocol_version,
            caps.firmware_version
        );
    }
    println!(
        "Notifications: {}",
        if controller.is_receiving_notifications().await { "push" } else { "polling" }
    );

    let areas = controller.areas().await;
    println!("\n--- Areas ({}) ---", areas.len());
    for area in &areas {
        println!(
            "  Area {:2}: {:20} status={:?} ready(all/part)={}/{} faults={} alarm={}",
            area.number,
            area.text,
            area.status,
            area.ready_all_on,
            area.ready_part_on,
            area.fault_count,
            area.in_alarm(),
        );
    }

    let points = controller.points().await;
    println!("\n--- Points ({}) ---", points.len());
    for point in &points {
        println!(
            "  Point {:3}: {:20} area={} {}",
            point.number,
            point.text,
            point.area,
            point.status.description(),
        );
    }

    let outputs = controller.outputs().await;
    println!("\n--- Outputs ({}) ---", outputs.len());
    for output in &outputs {
        println!("  Output {:3}: {:20} on={}", output.number, output.text, output.on);
    }

    println!("\nPress Ctrl+C to disconnect...");
    tokio::signal::ctrl_c().await?;
    controller.disconnect().await;
    println!("Disconnected.");

    Ok(())
}
