//! cpal implementation of [`AudioBackend`].

use std::sync::{Arc, OnceLock};
use std::time::Duration;

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{
    BufferSize, Device, SampleFormat, SampleRate, Stream, StreamConfig as CpalStreamConfig,
    SupportedBufferSize,
};

use super::{
    AudioBackend, CallbackInfo, DeviceInfo, ErrorCallback, HostApiInfo, HostDevice,
    OutputCallback, OutputStreamParams,
};
use crate::format::f32_to_i16;
use crate::lifecycle::Subsystem;
use crate::BackendError;

const BACKEND_NAME: &str = "cpal";

/// Cap on the "high" latency derived from a device's largest buffer.
const MAX_HIGH_LATENCY: Duration = Duration::from_millis(100);

/// Hardware playback through cpal.
///
/// cpal has no global initialize/terminate; `initialize` only checks that a
/// host is available. Device handles are `cpal::Device` values.
#[derive(Debug, Clone, Copy, Default)]
pub struct CpalBackend;

impl CpalBackend {
    /// The process-wide subsystem owner for cpal.
    ///
    /// Every sink and device listing in the process should go through this
    /// so the reference count covers all of them.
    pub fn shared() -> Arc<Subsystem<CpalBackend>> {
        static SHARED: OnceLock<Arc<Subsystem<CpalBackend>>> = OnceLock::new();
        Arc::clone(SHARED.get_or_init(|| Subsystem::new(CpalBackend)))
    }
}

fn max_channels<I>(configs: Result<I, cpal::SupportedStreamConfigsError>) -> u16
where
    I: Iterator<Item = cpal::SupportedStreamConfigRange>,
{
    configs
        .ok()
        .and_then(|ranges| ranges.map(|r| r.channels()).max())
        .unwrap_or(0)
}

/// Suggested low/high latencies from the default output buffer size range.
///
/// Zero when the device does not report a range.
fn output_latencies(device: &Device) -> (Duration, Duration) {
    let Ok(config) = device.default_output_config() else {
        return (Duration::ZERO, Duration::ZERO);
    };
    let rate = f64::from(config.sample_rate().0);
    match config.buffer_size() {
        SupportedBufferSize::Range { min, max } if rate > 0.0 => {
            let low = Duration::from_secs_f64(f64::from(*min) / rate);
            let high = Duration::from_secs_f64(f64::from(*max) / rate).min(MAX_HIGH_LATENCY);
            (low, high.max(low))
        }
        _ => (Duration::ZERO, Duration::ZERO),
    }
}

fn device_info(device: Device) -> Result<DeviceInfo<Device>, BackendError> {
    let name = device.name()?;
    let max_input_channels = max_channels(device.supported_input_configs());
    let max_output_channels = max_channels(device.supported_output_configs());
    let (default_low_output_latency, default_high_output_latency) = if max_output_channels > 0 {
        output_latencies(&device)
    } else {
        (Duration::ZERO, Duration::ZERO)
    };
    Ok(DeviceInfo {
        handle: device,
        name,
        max_input_channels,
        max_output_channels,
        default_low_output_latency,
        default_high_output_latency,
    })
}

fn callback_info(info: &cpal::OutputCallbackInfo) -> CallbackInfo {
    let timestamp = info.timestamp();
    CallbackInfo {
        playback_delay: timestamp.playback.duration_since(&timestamp.callback),
        output_underflow: false,
    }
}

/// Fixed buffer size if the device supports it, otherwise the host default.
fn buffer_size(supported: &SupportedBufferSize, frames: usize) -> BufferSize {
    let Ok(frames) = u32::try_from(frames) else {
        return BufferSize::Default;
    };
    match supported {
        SupportedBufferSize::Range { min, max } if !(*min..=*max).contains(&frames) => {
            tracing::debug!(frames, min, max, "buffer size unsupported, using host default");
            BufferSize::Default
        }
        _ => BufferSize::Fixed(frames),
    }
}

impl AudioBackend for CpalBackend {
    type Device = Device;
    type Stream = Stream;

    fn name(&self) -> &'static str {
        BACKEND_NAME
    }

    fn initialize(&self) -> Result<(), BackendError> {
        if cpal::available_hosts().is_empty() {
            return Err(BackendError::new(BACKEND_NAME, "no audio host available"));
        }
        Ok(())
    }

    fn terminate(&self) -> Result<(), BackendError> {
        Ok(())
    }

    fn host_apis(&self) -> Result<Vec<HostApiInfo<Device>>, BackendError> {
        let mut apis = Vec::new();
        for id in cpal::available_hosts() {
            let host = cpal::host_from_id(id)?;
            let mut devices = Vec::new();
            for device in host.devices()? {
                match device_info(device) {
                    Ok(info) => devices.push(info),
                    Err(err) => tracing::debug!(host = id.name(), error = %err, "skipping device"),
                }
            }
            apis.push(HostApiInfo {
                name: id.name().to_string(),
                devices,
            });
        }
        Ok(apis)
    }

    fn default_output_device(&self) -> Result<Option<HostDevice<Device>>, BackendError> {
        let host = cpal::default_host();
        host.default_output_device()
            .map(|device| -> Result<HostDevice<Device>, BackendError> {
                Ok(HostDevice {
                    host_api: host.id().name().to_string(),
                    info: device_info(device)?,
                })
            })
            .transpose()
    }

    fn open_stream(
        &self,
        device: &Device,
        params: &OutputStreamParams,
        mut callback: OutputCallback,
        mut error_callback: ErrorCallback,
    ) -> Result<Stream, BackendError> {
        let supported = device.default_output_config()?;
        let config = CpalStreamConfig {
            channels: params.channels,
            sample_rate: SampleRate(params.sample_rate),
            buffer_size: buffer_size(supported.buffer_size(), params.frames_per_buffer),
        };
        tracing::debug!(
            format = ?supported.sample_format(),
            latency_ms = params.latency.as_millis() as u64,
            "building cpal output stream"
        );

        let on_error = move |err: cpal::StreamError| error_callback(BackendError::from(err));

        let stream = match supported.sample_format() {
            SampleFormat::F32 => device.build_output_stream(
                &config,
                move |out: &mut [f32], info: &cpal::OutputCallbackInfo| {
                    callback(out, &callback_info(info));
                },
                on_error,
                None,
            )?,
            SampleFormat::I16 => {
                // Allocated once here; the callback renders through it in
                // frame-aligned chunks.
                let mut scratch =
                    vec![0.0f32; params.frames_per_buffer * usize::from(params.channels)];
                device.build_output_stream(
                    &config,
                    move |out: &mut [i16], info: &cpal::OutputCallbackInfo| {
                        let info = callback_info(info);
                        for chunk in out.chunks_mut(scratch.len()) {
                            let rendered = &mut scratch[..chunk.len()];
                            callback(rendered, &info);
                            for (dst, &src) in chunk.iter_mut().zip(rendered.iter()) {
                                *dst = f32_to_i16(src);
                            }
                        }
                    },
                    on_error,
                    None,
                )?
            }
            format => {
                return Err(BackendError::new(
                    BACKEND_NAME,
                    format!("unsupported device sample format {format:?}"),
                ));
            }
        };
        Ok(stream)
    }

    fn start(&self, stream: &Stream) -> Result<(), BackendError> {
        stream.play()?;
        Ok(())
    }

    fn stop(&self, stream: &Stream) -> Result<(), BackendError> {
        stream.pause()?;
        Ok(())
    }

    fn close(&self, stream: Stream) -> Result<(), BackendError> {
        drop(stream);
        Ok(())
    }
}
