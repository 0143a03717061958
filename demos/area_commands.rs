//! Example: Arm and disarm an area, then pulse an output.

use bosch_mode2::{ArmingType, Controller, PanelConfig};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    let config = PanelConfig::builder()
        .host("192.168.1.20")
        .passcode("0123456789")
        .build();

    let controller = Controller::new(config);
    controller.connect().await?;
    controller.begin_operation().await?;

    for area in controller.areas().await {
        println!(
            "Area {}: {} (armed={}, part-on={})",
            area.number,
            area.text,
            area.status.is_armed(),
            area.status.is_part_on()
        );
    }

    println!("\nArming area 1 (perimeter delay)...");
    match controller.arm_areas(&[1], ArmingType::PerimeterDelayArm).await {
        Ok(()) => println!("Area 1 arm accepted"),
        Err(e) => println!("Error arming area 1: {}", e),
    }

    tokio::time::sleep(tokio::time::Duration::from_secs(5)).await;

    println!("\nDisarming area 1...");
    match controller.arm_areas(&[1], ArmingType::Disarm).await {
        Ok(()) => println!("Area 1 disarm accepted"),
        Err(e) => println!("Error disarming area 1: {}", e),
    }

    if let Some(output) = controller.outputs().await.first() {
        println!("\nPulsing output {}...", output.number);
        controller.set_output_state(output.number, true).await?;
        tokio::time::sleep(tokio::time::Duration::from_secs(2)).await;
        controller.set_output_state(output.number, false).await?;
    }

    controller.disconnect().await;
    Ok(())
}
