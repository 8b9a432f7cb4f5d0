use burn_tch::LibTorchDevice;
use log::{info, warn};

#[derive(Debug, Clone, PartialEq)]
pub struct DeviceSelection {
	pub primary: LibTorchDevice,
	pub devices: Vec<LibTorchDevice>,
}

impl DeviceSelection {
	/// Queries libtorch for visible CUDA devices and selects from them.
	pub fn detect(gpu_ids: Option<&[usize]>) -> Self {
		let cuda_devices = if tch::utils::has_cuda() {
			tch::Cuda::device_count().max(0) as usize
		} else {
			0
		};

		let selection = select_devices(gpu_ids, cuda_devices);
		info!("Running on {:?} (primary {:?})", selection.devices, selection.primary);

		selection
	}
}

pub fn select_devices(gpu_ids: Option<&[usize]>, cuda_devices: usize) -> DeviceSelection {
	if cuda_devices == 0 {
		if gpu_ids.is_some_and(|ids| !ids.is_empty()) {
			warn!("GPU ids {:?} requested but no CUDA device is available, using CPU", gpu_ids.unwrap_or_default());
		}

		return DeviceSelection {
			primary: LibTorchDevice::Cpu,
			devices: vec![LibTorchDevice::Cpu],
		};
	}

	let devices: Vec<LibTorchDevice> = match gpu_ids {
		Some(ids) if !ids.is_empty() => ids.iter().map(|&id| LibTorchDevice::Cuda(id)).collect(),
		_ => (0..cuda_devices).map(LibTorchDevice::Cuda).collect(),
	};

	DeviceSelection {
		primary: devices[0],
		devices,
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn all_devices_when_none_given() {
		let selection = select_devices(None, 3);

		assert_eq!(selection.primary, LibTorchDevice::Cuda(0));
		assert_eq!(
			selection.devices,
			vec![LibTorchDevice::Cuda(0), LibTorchDevice::Cuda(1), LibTorchDevice::Cuda(2)]
		);
	}

	#[test]
	fn explicit_ids_restrict_replication() {
		let selection = select_devices(Some(&[2, 3]), 4);

		assert_eq!(selection.primary, LibTorchDevice::Cuda(2));
		assert_eq!(selection.devices, vec![LibTorchDevice::Cuda(2), LibTorchDevice::Cuda(3)]);
	}

	#[test]
	fn cpu_without_accelerator() {
		let expected = DeviceSelection {
			primary: LibTorchDevice::Cpu,
			devices: vec![LibTorchDevice::Cpu],
		};

		assert_eq!(select_devices(None, 0), expected);
		assert_eq!(select_devices(Some(&[1]), 0), expected);
	}
}
