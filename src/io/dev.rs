use std::path::PathBuf;
use std::time::Duration;

use crate::error::DeviceError;
use crate::io::ata::SmartAttribute;

pub type DevResult<T> = Result<T, DeviceError>;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DiskClass {
    Rotational { rpm: u16 },
    SolidState,
}

/// identity and geometry, fixed once the device is opened
#[derive(Clone, Debug)]
pub struct DeviceInfo {
    pub path: PathBuf,
    pub model: String,
    pub serial: String,
    pub firmware: String,
    pub logical_sector_size: u32,
    pub physical_sector_size: u32,
    pub sectors: u64,
    pub class: DiskClass,
}

impl DeviceInfo {
    pub fn capacity_bytes(&self) -> u64 {
        self.sectors * self.logical_sector_size as u64
    }

    /// decimal gigabytes, truncated
    pub fn capacity_gb(&self) -> u64 {
        self.capacity_bytes() / 1_000_000_000
    }
}

/// Result of one verify or write command that reached the device.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct UnitOutcome {
    pub duration: Duration,
    /// the device flagged the command as failed (ATA status ERR)
    pub device_error: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SelfTestKind {
    Short,
    Extended,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SmartStatus {
    Good,
    Bad,
}

/// Self-test execution status byte as reported in the SMART data block.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SelfTestStatus(pub u8);

impl SelfTestStatus {
    pub fn in_progress(self) -> bool {
        self.0 >> 4 == 0x0F
    }

    /// remaining work in tenths, only meaningful while in progress
    pub fn remaining_tenths(self) -> u8 {
        self.0 & 0x0F
    }
}

/// Blocking operations on one physical disk.
///
/// Methods take `&self` so the SMART view can query a disk while a job
/// drives it; serialising jobs per disk is the supervisor's business.
pub trait DiskDevice: Send + Sync {
    fn info(&self) -> &DeviceInfo;

    fn verify_range(&self, count: u16, start: u64) -> DevResult<UnitOutcome>;

    /// `buf` holds at least `count` logical sectors
    fn write_range(&self, count: u16, start: u64, buf: &[u8]) -> DevResult<UnitOutcome>;

    fn run_self_test(&self, kind: SelfTestKind) -> DevResult<()>;

    fn abort_self_test(&self) -> DevResult<()>;

    fn self_test_status(&self) -> DevResult<SelfTestStatus>;

    fn read_smart(&self) -> DevResult<Vec<SmartAttribute>>;

    fn smart_status(&self) -> DevResult<SmartStatus>;
}
