//! Device listing example.
//!
//! Prints every input, output and inactive device grouped by direction, and
//! the system default output.
//!
//! Run with: cargo run --example list_devices --features cpal-backend

use stream_playback::{default_output_device, devices, DeviceDescriptor};

fn print_group(title: &str, group: &[DeviceDescriptor]) {
    println!("{title}:");
    if group.is_empty() {
        println!("  (none)");
    }
    for device in group {
        println!(
            "  {device}  in={} out={}",
            device.max_input_channels(),
            device.max_output_channels()
        );
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    let list = devices()?;
    print_group("Output devices", &list.output);
    print_group("Input devices", &list.input);
    print_group("Inactive devices", &list.inactive);

    match default_output_device() {
        Ok(device) => println!("Default output: {device}"),
        Err(err) if err.is_device_not_found() => println!("No default output device"),
        Err(err) => return Err(err.into()),
    }

    Ok(())
}
