//! Tone playback example.
//!
//! Plays a two-second 440 Hz tone on the default output device (or the
//! device named on the command line), reporting underruns as they happen.
//!
//! Run with: cargo run --example play_tone --features cpal-backend -- [device name]

use std::f64::consts::TAU;

use stream_playback::{
    devices, DeviceDescriptor, DeviceSink, LatencyPreference, SignalBuffer, SignalProperties,
    Sink, SinkAllocator, SinkOptions,
};

const SAMPLE_RATE: u32 = 48000;
const CHANNELS: u16 = 2;
const FRAMES_PER_BUFFER: usize = 512;
const FREQUENCY: f64 = 440.0;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("stream_playback=debug".parse()?),
        )
        .init();

    let device = match std::env::args().nth(1) {
        Some(name) => devices()?
            .output
            .into_iter()
            .find(|d| d.name() == name)
            .ok_or_else(|| format!("no output device named {name:?}"))?,
        None => DeviceDescriptor::default_output(),
    };
    println!("Playing on {device}");

    let mut sink = DeviceSink::cpal(device)
        .options(SinkOptions {
            latency: LatencyPreference::High,
            ..Default::default()
        })
        .on_event(|event| tracing::warn!(?event, "playback event"))
        .allocate(FRAMES_PER_BUFFER, SignalProperties::new(CHANNELS, SAMPLE_RATE))?;

    let step = TAU * FREQUENCY / f64::from(SAMPLE_RATE);
    let buffers = 2 * SAMPLE_RATE as usize / FRAMES_PER_BUFFER;
    let mut phase = 0.0f64;

    for _ in 0..buffers {
        let mut samples = Vec::with_capacity(FRAMES_PER_BUFFER * CHANNELS as usize);
        for _ in 0..FRAMES_PER_BUFFER {
            let value = phase.sin() * 0.2;
            samples.extend(std::iter::repeat(value).take(CHANNELS as usize));
            phase = (phase + step) % TAU;
        }
        sink.write(&SignalBuffer::from_interleaved(CHANNELS, samples))?;
    }

    let stats = sink.stats();
    sink.flush()?;
    println!("Stats: {stats:?}");
    Ok(())
}
