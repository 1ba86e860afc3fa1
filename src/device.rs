// device.rs — Compute device selection.
//
// Selection is a pure function of (preference, accelerator available) so it can be
// tested without hardware. Only `ComputeTarget::device` and `create_device` touch candle.

use std::fmt;
use std::str::FromStr;

use anyhow::bail;
use candle_core::Device;
use serde::{Deserialize, Serialize};

/// What the caller asked for.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DevicePreference {
    #[default]
    Auto,
    Cpu,
    Accelerator,
}

/// Where the encoder actually runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComputeTarget {
    Cpu,
    Accelerator,
}

impl FromStr for DevicePreference {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "auto" | "" => Ok(Self::Auto),
            "cpu" => Ok(Self::Cpu),
            "accelerator" | "gpu" | "cuda" | "metal" | "mps" => Ok(Self::Accelerator),
            other => Err(format!(
                "unknown device `{other}` (expected auto, cpu or accelerator)"
            )),
        }
    }
}

impl fmt::Display for DevicePreference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Auto => "auto",
            Self::Cpu => "cpu",
            Self::Accelerator => "accelerator",
        })
    }
}

/// Resolve a preference against accelerator availability.
pub fn select_target(preference: DevicePreference, accelerator_available: bool) -> ComputeTarget {
    match preference {
        DevicePreference::Auto if accelerator_available => ComputeTarget::Accelerator,
        DevicePreference::Auto | DevicePreference::Cpu => ComputeTarget::Cpu,
        DevicePreference::Accelerator => ComputeTarget::Accelerator,
    }
}

/// True when this build can reach a CUDA or Metal device.
pub fn accelerator_available() -> bool {
    candle_core::utils::cuda_is_available() || candle_core::utils::metal_is_available()
}

impl ComputeTarget {
    /// Instantiate the candle device. Accelerator tries CUDA first, then Metal.
    pub fn device(self) -> anyhow::Result<Device> {
        match self {
            Self::Cpu => Ok(Device::Cpu),
            Self::Accelerator => {
                if candle_core::utils::cuda_is_available() {
                    match Device::new_cuda(0) {
                        Ok(device) => return Ok(device),
                        Err(e) => log::debug!("CUDA not available: {e}"),
                    }
                }
                if candle_core::utils::metal_is_available() {
                    match Device::new_metal(0) {
                        Ok(device) => return Ok(device),
                        Err(e) => log::debug!("Metal not available: {e}"),
                    }
                }
                bail!("accelerator requested but none is available (build with the `cuda` or `metal` feature)")
            }
        }
    }
}

/// Instantiate the device for `target`. Only an `Auto` preference falls back to CPU
/// when the accelerator cannot be created; an explicit request fails.
pub fn create_device(preference: DevicePreference, target: ComputeTarget) -> anyhow::Result<Device> {
    match target.device() {
        Ok(device) => Ok(device),
        Err(e) if preference == DevicePreference::Auto && target == ComputeTarget::Accelerator => {
            log::warn!("Accelerator unavailable ({e:#}), falling back to CPU");
            ComputeTarget::Cpu.device()
        }
        Err(e) => Err(e),
    }
}

/// Human-readable label for a candle device, used in logs.
pub fn describe(device: &Device) -> &'static str {
    match device {
        Device::Cpu => "cpu",
        Device::Cuda(_) => "cuda:0",
        Device::Metal(_) => "metal:0",
    }
}
