use std::time::Duration;

use crate::error::{FrameStage, TransformError};
use crate::types::{AdapterProfile, GpuPowerPreference, TransformConfig};

pub(crate) struct GpuContext {
    #[allow(dead_code)]
    instance: wgpu::Instance,
    pub device: wgpu::Device,
    pub queue: wgpu::Queue,
    pub adapter_profile: AdapterProfile,
    /// Makes the next wait at this stage fail as a timeout.
    #[cfg(test)]
    pub fail_wait_at: std::sync::Mutex<Option<FrameStage>>,
}

impl GpuContext {
    /// Acquires an adapter and a logical device. Fails once; the caller does not retry.
    pub(crate) fn new(config: &TransformConfig) -> Result<Self, TransformError> {
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            ..Default::default()
        });

        let power_preference = match config.power_preference {
            GpuPowerPreference::Low => wgpu::PowerPreference::LowPower,
            GpuPowerPreference::High => wgpu::PowerPreference::HighPerformance,
        };
        let adapter = pollster::block_on(instance.request_adapter(&wgpu::RequestAdapterOptions {
            power_preference,
            compatible_surface: None,
            force_fallback_adapter: config.force_fallback_adapter,
        }))
        .map_err(|err| TransformError::device(format!("no suitable GPU adapter: {err}")))?;

        let adapter_info = adapter.get_info();
        let limits = adapter.limits();
        let adapter_profile = AdapterProfile::from_wgpu(&adapter_info, &limits);
        tracing::debug!(
            name = %adapter_profile.name,
            backend = %adapter_profile.backend,
            device_type = %adapter_profile.device_type,
            is_software = adapter_profile.is_software(),
            max_texture_dimension = adapter_profile.max_texture_dimension,
            "selected GPU adapter"
        );

        let (device, queue) = pollster::block_on(adapter.request_device(&wgpu::DeviceDescriptor {
            label: Some("yuvshade device"),
            required_features: wgpu::Features::empty(),
            required_limits: wgpu::Limits::downlevel_defaults().using_resolution(limits),
            experimental_features: wgpu::ExperimentalFeatures::default(),
            memory_hints: wgpu::MemoryHints::Performance,
            trace: wgpu::Trace::Off,
        }))
        .map_err(|err| TransformError::device(format!("failed to create GPU device: {err}")))?;

        Ok(Self {
            instance,
            device,
            queue,
            adapter_profile,
            #[cfg(test)]
            fail_wait_at: Default::default(),
        })
    }

    /// Largest width or height a surface may take on this device.
    pub(crate) fn max_dimension(&self) -> u32 {
        self.device.limits().max_texture_dimension_2d
    }

    /// Blocks until the device has finished `submission` (or all work when `None`).
    pub(crate) fn wait(
        &self,
        submission: Option<wgpu::SubmissionIndex>,
        timeout: Option<Duration>,
        stage: FrameStage,
    ) -> Result<(), TransformError> {
        #[cfg(test)]
        if let Ok(mut fail_at) = self.fail_wait_at.lock() {
            if *fail_at == Some(stage) {
                *fail_at = None;
                return Err(TransformError::SubmissionTimeout {
                    stage,
                    timeout: timeout.unwrap_or_default(),
                });
            }
        }

        match self.device.poll(wgpu::PollType::Wait {
            submission_index: submission,
            timeout,
        }) {
            Ok(_) => Ok(()),
            Err(wgpu::PollError::Timeout) => Err(TransformError::SubmissionTimeout {
                stage,
                timeout: timeout.unwrap_or_default(),
            }),
            Err(err) => Err(TransformError::Gpu {
                stage,
                reason: err.to_string(),
            }),
        }
    }
}
