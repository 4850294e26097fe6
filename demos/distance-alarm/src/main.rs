//! # Distance Alarm Demo
//!
//! A robot drives forward until its front sensor reports an obstacle, then
//! stops, sounds a horn and reverses for a moment before driving on again.
//! The sensor is simulated; everything else is the real engine.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use cascade_core::{Action, EventGraphBuilder, EventRecord, FireArgs, TokioScheduler};
use cascade_testing::FakeSensor;

// ============================================================================
// Actions
// ============================================================================

/// Prints what a motor would do.
struct Motor {
    label: &'static str,
}

impl Action for Motor {
    fn name(&self) -> &str {
        self.label
    }

    fn fire(&self, args: &FireArgs) -> Result<()> {
        let speed = args.named.get("speed").and_then(|v| v.as_f64()).unwrap_or(1.0);
        println!("  [{}] running at {:.0}%", self.label, speed * 100.0);
        Ok(())
    }

    fn stop(&self, _args: &FireArgs) -> Result<()> {
        println!("  [{}] stopped", self.label);
        Ok(())
    }
}

struct Horn;

impl Action for Horn {
    fn name(&self) -> &str {
        "horn"
    }

    fn fire(&self, _args: &FireArgs) -> Result<()> {
        println!("  [horn] beep beep");
        Ok(())
    }

    fn stop(&self, _args: &FireArgs) -> Result<()> {
        Ok(())
    }
}

// ============================================================================
// Main
// ============================================================================

#[tokio::main]
async fn main() -> Result<()> {
    cascade_core::logging::init();

    let front = FakeSensor::distance("front", 120.0);
    let drive = Arc::new(Motor { label: "drive" });
    let reverse = Arc::new(Motor { label: "reverse" });

    let mut builder = EventGraphBuilder::new(Arc::new(TokioScheduler::current()?));

    // drive forward and start watching the front sensor
    let forward = builder.add_event(EventRecord::new("forward", "Drive forward", 0.0))?;
    // fired by the sensor once an obstacle is close
    let obstacle = builder.add_sensor_event_with_condition(
        EventRecord::new("obstacle", "Obstacle ahead", 0.0),
        front.clone(),
        "distance < 15",
    )?;
    let honk = builder.add_event(EventRecord::new("honk", "Honk", 0.0))?;
    // back off, then drive forward again after 1.5s
    let back_off = builder.add_event(EventRecord::new("back_off", "Back off", 1.5))?;

    builder.add_action(forward, drive.clone())?;
    builder.add_start_listening(forward, obstacle)?;

    builder.add_stop_action(obstacle, drive.clone())?;
    builder.add_sub_event(obstacle, honk)?;
    builder.add_action(honk, Arc::new(Horn))?;
    builder.set_next(obstacle, back_off)?;

    builder.add_action(back_off, reverse.clone())?;
    builder.add_stop_action(back_off, reverse)?;
    builder.set_next(back_off, forward)?;

    let graph = builder.build();

    println!("Starting");
    graph.fire_verbose(forward, &FireArgs::none().named("speed", 0.6))?;

    // ========================================================================
    // Simulated approach
    // ========================================================================

    for distance in [90.0, 60.0, 30.0, 12.0, 8.0] {
        tokio::time::sleep(Duration::from_millis(200)).await;
        println!("front sensor: {distance}cm");
        for failure in front.set_distance(distance) {
            tracing::error!(error = %failure, "sensor notification failed");
        }
    }

    // successor chain: back_off after obstacle, forward after back_off
    tokio::time::sleep(Duration::from_secs(2)).await;
    println!("listening again: {}", graph.is_listening(obstacle)?);

    graph.shutdown();
    println!("Done");
    Ok(())
}
