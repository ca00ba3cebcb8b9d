//! Output backends: where a context's samples go.
//!
//! Opening happens in two steps because the context has to be built at the
//! device's sample rate before the stream that renders it can exist:
//! [`AudioBackend::sample_rate`] probes the output, then
//! [`AudioBackend::connect`] wires a context to it. The returned handle keeps
//! the output alive for as long as the engine holds it.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use crate::context::AudioContext;
use crate::error::{AudioError, AudioResult};

pub trait AudioBackend {
    /// Keeps the output alive (a device stream, or nothing).
    type Output;

    /// Sample rate the context must run at.
    fn sample_rate(&mut self) -> AudioResult<f32>;

    /// Start pulling frames from `ctx`.
    fn connect(&mut self, ctx: &AudioContext) -> AudioResult<Self::Output>;
}

/// No device at all: the host (or a test) renders the context by hand.
#[derive(Clone, Debug)]
pub struct OfflineBackend {
    sample_rate: f32,
    available: bool,
    connections: Arc<AtomicUsize>,
}

impl OfflineBackend {
    pub fn new(sample_rate: f32) -> Self {
        Self { sample_rate, available: true, connections: Arc::new(AtomicUsize::new(0)) }
    }

    /// A backend that always fails to open, as on a machine without audio.
    pub fn unsupported() -> Self {
        Self { available: false, ..Self::new(0.0) }
    }

    /// How many contexts were connected so far. Clones share the count.
    pub fn connections(&self) -> usize {
        self.connections.load(Ordering::Acquire)
    }
}

impl AudioBackend for OfflineBackend {
    type Output = ();

    fn sample_rate(&mut self) -> AudioResult<f32> {
        if !self.available {
            return Err(AudioError::Unsupported("no audio output available".into()));
        }
        Ok(self.sample_rate)
    }

    fn connect(&mut self, _ctx: &AudioContext) -> AudioResult<()> {
        if !self.available {
            return Err(AudioError::Unsupported("no audio output available".into()));
        }
        self.connections.fetch_add(1, Ordering::AcqRel);
        Ok(())
    }
}

#[cfg(feature = "realtime")]
pub use realtime::{list_output_devices, CpalBackend};

#[cfg(feature = "realtime")]
mod realtime {
    use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};

    use super::AudioBackend;
    use crate::context::AudioContext;
    use crate::error::{AudioError, AudioResult};

    /// Names of every output device on the default host.
    pub fn list_output_devices() -> AudioResult<Vec<String>> {
        let host = cpal::default_host();
        let devices = host.output_devices().map_err(|e| AudioError::Device(e.to_string()))?;
        Ok(devices.filter_map(|d| d.name().ok()).collect())
    }

    fn pick_device(name: Option<&str>) -> AudioResult<cpal::Device> {
        let host = cpal::default_host();
        log::info!("cpal host: {}", host.id().name());
        if let Some(name) = name {
            let devices = host.output_devices().map_err(|e| AudioError::Device(e.to_string()))?;
            for d in devices {
                if d.name().map(|n| n == name).unwrap_or(false) {
                    return Ok(d);
                }
            }
            return Err(AudioError::Device(format!("requested device not found: {name}")));
        }
        host.default_output_device()
            .ok_or_else(|| AudioError::Unsupported("no default output device".into()))
    }

    /// Plays a context on a cpal output device.
    #[derive(Default)]
    pub struct CpalBackend {
        device_name: Option<String>,
        opened: Option<(cpal::Device, cpal::SupportedStreamConfig)>,
    }

    impl CpalBackend {
        /// Default output device.
        pub fn new() -> Self {
            Self::default()
        }

        pub fn with_device(name: impl Into<String>) -> Self {
            Self { device_name: Some(name.into()), opened: None }
        }

        fn open(&mut self) -> AudioResult<&(cpal::Device, cpal::SupportedStreamConfig)> {
            if self.opened.is_none() {
                let device = pick_device(self.device_name.as_deref())?;
                let config = device
                    .default_output_config()
                    .map_err(|e| AudioError::Device(e.to_string()))?;
                match device.name() {
                    Ok(name) => log::info!("cpal device: {name}"),
                    Err(_) => log::info!("cpal device: (no name)"),
                }
                log::info!(
                    "stream config: {} Hz, {} channel(s), {:?}",
                    config.sample_rate().0,
                    config.channels(),
                    config.sample_format()
                );
                self.opened = Some((device, config));
            }
            self.opened
                .as_ref()
                .ok_or_else(|| AudioError::Device("output device not opened".into()))
        }
    }

    fn build_stream<T>(
        device: &cpal::Device,
        cfg: &cpal::StreamConfig,
        ctx: AudioContext,
    ) -> AudioResult<cpal::Stream>
    where
        T: cpal::Sample + cpal::FromSample<f32> + cpal::SizedSample + Send + 'static,
    {
        let channels = cfg.channels as usize;
        let mut scratch: Vec<f32> = Vec::new();
        let stream = device
            .build_output_stream(
                cfg,
                move |output: &mut [T], _| {
                    scratch.resize(output.len(), 0.0);
                    ctx.render(&mut scratch, channels);
                    for (o, &s) in output.iter_mut().zip(&scratch) {
                        *o = T::from_sample(s);
                    }
                },
                |e| log::warn!("cpal stream error: {e}"),
                None,
            )
            .map_err(|e| AudioError::Stream(e.to_string()))?;
        Ok(stream)
    }

    impl AudioBackend for CpalBackend {
        type Output = cpal::Stream;

        fn sample_rate(&mut self) -> AudioResult<f32> {
            let (_, config) = self.open()?;
            Ok(config.sample_rate().0 as f32)
        }

        fn connect(&mut self, ctx: &AudioContext) -> AudioResult<cpal::Stream> {
            let (device, supported) = self.open()?;
            let format = supported.sample_format();
            let cfg = supported.config();
            let ctx = ctx.clone();
            let stream = match format {
                cpal::SampleFormat::F32 => build_stream::<f32>(device, &cfg, ctx)?,
                cpal::SampleFormat::I16 => build_stream::<i16>(device, &cfg, ctx)?,
                cpal::SampleFormat::U16 => build_stream::<u16>(device, &cfg, ctx)?,
                other => {
                    return Err(AudioError::Unsupported(format!(
                        "unsupported device sample format: {other:?}"
                    )))
                }
            };
            stream.play().map_err(|e| AudioError::Stream(e.to_string()))?;
            Ok(stream)
        }
    }
}
