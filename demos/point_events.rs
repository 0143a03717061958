//! Example: Subscribe to point and area events and print changes.

use bosch_mode2::{Controller, PanelConfig, PanelEvent};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    let config = PanelConfig::builder()
        .host("192.168.1.20")
        .passcode("0123456789")
        .build();

    let controller = Controller::new(config);
    let mut events = controller.subscribe();
    controller.connect().await?;
    controller.begin_operation().await?;

    println!("Listening for point events (Ctrl+C to stop)...\n");

    loop {
        tokio::select! {
            event = events.recv() => {
                match event {
                    Ok(PanelEvent::PointStatusChanged { point }) => {
                        println!(
                            "Point {} '{}' (area {}): {}",
                            point.number, point.text, point.area, point.status.description()
                        );
                    }
                    Ok(PanelEvent::AreaReadyChanged { area }) => {
                        println!("Area {} ready={} faults={}", area.number, area.ready_all_on, area.fault_count);
                    }
                    Ok(PanelEvent::PanelReady { ready: false }) => {
                        println!("Panel connection lost!");
                        break;
                    }
                    Ok(event) => {
                        println!("Event: {:?}", event);
                    }
                    Err(e) => {
                        println!("Event channel error: {}", e);
                        break;
                    }
                }
            }
            _ = tokio::signal::ctrl_c() => {
                println!("\nDisconnecting...");
                break;
            }
        }
    }

    controller.disconnect().await;
    Ok(())
}
