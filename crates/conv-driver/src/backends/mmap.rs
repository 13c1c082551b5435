//! Memory-mapped register region
//!
//! The bare-metal driver dereferences `0x43C00000 + offset` directly. Under
//! Linux the same registers are reached by mapping the physical range once
//! through a device file and handing out a region object. All accesses go
//! through bounds-checked volatile 32-bit operations on that object.
//!
//! `/dev/mem` is opened with `O_SYNC` so the kernel maps the range uncached.

// MMIO registers are naturally aligned by the interconnect, so pointer casts are safe
#![allow(clippy::cast_ptr_alignment)]
#![allow(clippy::cast_possible_truncation)]

use crate::backend::{BackendType, RegisterBus};
use crate::config::MmioConfig;
use crate::error::{ConvError, Result};
use conv_chip::regs;
use rustix::fs::OFlags;
use rustix::mm::{mmap, munmap, MapFlags, ProtFlags};
use std::fs::{File, OpenOptions};
use std::os::unix::fs::OpenOptionsExt;
use std::os::unix::io::AsFd;
use std::path::PathBuf;
use std::ptr::NonNull;

/// Mapped accelerator register file
pub struct MmioRegion {
    /// Start of the mapping (page aligned)
    map_ptr: NonNull<u8>,
    /// Length of the mapping
    map_len: usize,
    /// Offset of the register file inside the mapping
    delta: usize,
    /// Bytes usable from the register file base
    span: usize,
    device: PathBuf,
    base_address: u64,
    _file: File,
}

impl std::fmt::Debug for MmioRegion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MmioRegion")
            .field("device", &self.device)
            .field("base_address", &format_args!("{:#x}", self.base_address))
            .field("span", &format_args!("{:#x}", self.span))
            .field("ptr", &format_args!("{:p}", self.map_ptr))
            .finish_non_exhaustive()
    }
}

// SAFETY: Send - MmioRegion owns the mapping exclusively. Moving it between threads
// doesn't invalidate the mapping (mmap'd memory is process-wide). No thread-local state.
unsafe impl Send for MmioRegion {}

// SAFETY: Sync - reads use &self and are bounds-checked volatile loads; writes require
// &mut self (exclusive access enforced by the borrow checker).
unsafe impl Sync for MmioRegion {}

impl MmioRegion {
    /// Map the register region described by `config`
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The device file does not exist (`DeviceNotFound`)
    /// - The requested span cannot hold the register file (`RegionTooSmall`)
    /// - The device file cannot be opened read/write (`Io`)
    /// - `mmap` fails (`MapFailed`)
    pub fn open(config: &MmioConfig) -> Result<Self> {
        if !config.device.exists() {
            return Err(ConvError::device_not_found(&config.device));
        }
        if config.span < regs::REGISTER_SPAN {
            return Err(ConvError::RegionTooSmall {
                size: config.span,
                required: regs::REGISTER_SPAN,
            });
        }

        // mmap offsets must be page aligned; keep the remainder as an in-map delta
        let page = rustix::param::page_size() as u64;
        let map_offset = config.base_address & !(page - 1);
        let delta = (config.base_address - map_offset) as usize;
        let map_len = delta + config.span;

        tracing::debug!(
            "Mapping {} @ {:#x} (+{:#x}), {:#x} bytes",
            config.device.display(),
            map_offset,
            delta,
            map_len
        );

        // SAFETY: OFlags::SYNC.bits() is a small positive flag value
        #[allow(clippy::cast_possible_wrap)]
        let sync_flag = OFlags::SYNC.bits() as i32;

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .custom_flags(sync_flag)
            .open(&config.device)
            .map_err(|e| {
                tracing::warn!(
                    "Cannot open {}: {e}. Is the bitstream loaded and do you have access?",
                    config.device.display()
                );
                ConvError::from(e)
            })?;

        // SAFETY: mmap necessary for MMIO - maps the AXI register window into the process.
        // Invariants: (1) fd valid, just opened read/write; (2) map_len non-zero (span
        // checked above); (3) map_offset page aligned; (4) MAP_SHARED so stores reach the
        // device; (5) file kept alive in self for the lifetime of the mapping.
        let map_ptr = unsafe {
            let addr = mmap(
                std::ptr::null_mut(),
                map_len,
                ProtFlags::READ | ProtFlags::WRITE,
                MapFlags::SHARED,
                file.as_fd(),
                map_offset,
            )
            .map_err(|e| ConvError::map_failed(format!("mmap failed: {e}")))?;

            NonNull::new(addr.cast::<u8>())
                .ok_or_else(|| ConvError::map_failed("mmap returned a null pointer"))?
        };

        tracing::info!(
            "Mapped accelerator registers {:#x}..{:#x} from {} at {map_ptr:p}",
            config.base_address,
            config.base_address + config.span as u64,
            config.device.display()
        );

        Ok(Self {
            map_ptr,
            map_len,
            delta,
            span: config.span,
            device: config.device.clone(),
            base_address: config.base_address,
            _file: file,
        })
    }

    /// Register pointer for `offset`
    ///
    /// # Panics
    ///
    /// Panics if the access would leave the mapped span or is not word aligned.
    fn reg(&self, offset: usize) -> *mut u32 {
        assert!(offset + 4 <= self.span, "Register offset {offset:#x} out of bounds");
        assert!(offset % 4 == 0, "Register offset {offset:#x} not word aligned");
        // SAFETY: delta + offset + 4 <= delta + span == map_len, checked above.
        unsafe { self.map_ptr.as_ptr().add(self.delta + offset).cast::<u32>() }
    }

    /// Physical base address of the register file
    #[must_use]
    pub const fn base_address(&self) -> u64 {
        self.base_address
    }

    /// Bytes usable from the register file base
    #[must_use]
    pub const fn span(&self) -> usize {
        self.span
    }
}

impl RegisterBus for MmioRegion {
    fn read32(&self, offset: usize) -> u32 {
        let ptr = self.reg(offset);
        // SAFETY: read_volatile necessary for MMIO - the PL can change the value at any time.
        // Invariants: (1) ptr inside the mapping (reg() bounds check); (2) u32 aligned;
        // (3) mapping alive for &self.
        let value = unsafe { ptr.read_volatile() };
        tracing::trace!("Read u32 @ {offset:#x} = {value:#x}");
        value
    }

    fn write32(&mut self, offset: usize, value: u32) {
        let ptr = self.reg(offset);
        tracing::trace!("Write u32 @ {offset:#x} = {value:#x}");
        // SAFETY: write_volatile necessary for MMIO - stores trigger hardware side effects.
        // Invariants: (1) ptr inside the mapping; (2) u32 aligned; (3) exclusive via &mut self.
        unsafe { ptr.write_volatile(value) }
    }

    fn backend_type(&self) -> BackendType {
        BackendType::Mmio
    }
}

impl Drop for MmioRegion {
    fn drop(&mut self) {
        // SAFETY: munmap of exactly the range returned by mmap in open(); Drop runs once
        // and no references into the mapping outlive self.
        unsafe {
            if let Err(e) = munmap(self.map_ptr.as_ptr().cast(), self.map_len) {
                tracing::error!("munmap failed during drop: {e}");
            }
        }
        tracing::debug!("Unmapped accelerator registers at {:#x}", self.base_address);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_device_is_reported() {
        let config = MmioConfig {
            device: PathBuf::from("/nonexistent/convacc"),
            ..MmioConfig::default()
        };
        let err = MmioRegion::open(&config).unwrap_err();
        assert!(matches!(err, ConvError::DeviceNotFound { .. }));
    }

    #[test]
    fn span_must_cover_register_file() {
        let config = MmioConfig {
            device: PathBuf::from("/"),
            span: regs::REGISTER_SPAN - 4,
            ..MmioConfig::default()
        };
        let err = MmioRegion::open(&config).unwrap_err();
        assert!(matches!(
            err,
            ConvError::RegionTooSmall { required: 0x50, .. }
        ));
    }

    #[test]
    fn unopenable_device_is_an_io_error() {
        // A directory exists but cannot be opened for writing.
        let dir = std::env::temp_dir();
        let config = MmioConfig {
            device: dir,
            ..MmioConfig::default()
        };
        let err = MmioRegion::open(&config).unwrap_err();
        assert!(matches!(err, ConvError::Io { .. }), "got {err:?}");
    }

    #[test]
    #[ignore] // Requires hardware (bitstream loaded, root)
    fn reads_control_register_on_board() {
        let region = MmioRegion::open(&MmioConfig::default()).expect("map registers");
        let ctrl = region.read32(regs::CONTROL);
        println!("CTRL = {ctrl:#010x}");
    }
}
