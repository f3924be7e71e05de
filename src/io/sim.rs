//! In-memory stand-in for a disk, used by tests and `--simulate`.

use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread;
use std::time::Duration;

use crate::error::DeviceError;
use crate::io::ata::SmartAttribute;
use crate::io::dev::{DevResult, DeviceInfo, DiskClass, DiskDevice, SelfTestKind, SelfTestStatus, SmartStatus, UnitOutcome};

#[derive(Clone, Debug)]
pub struct SimConfig {
    pub sectors: u64,
    pub logical_sector_size: u32,
    /// duration reported for every unit
    pub unit_latency: Duration,
    /// every n-th unit (1-based) reports `slow_latency` instead
    pub slow_every: Option<u64>,
    pub slow_latency: Duration,
    /// time actually spent in each unit call
    pub real_delay: Duration,
    /// every n-th unit (1-based) sets the device error flag
    pub device_error_every: Option<u64>,
    /// every n-th unit (1-based) fails to reach the device
    pub transport_error_every: Option<u64>,
    /// status reads a self-test stays in progress
    pub self_test_polls: u8,
    pub self_test_never_completes: bool,
    /// execution status once the self-test finishes, 0 = passed
    pub self_test_result: u8,
    pub smart_bad: bool,
}

impl SimConfig {
    pub fn new(sectors: u64) -> Self {
        Self{
            sectors,
            logical_sector_size: 512,
            unit_latency: Duration::from_millis(5),
            slow_every: None,
            slow_latency: Duration::from_millis(80),
            real_delay: Duration::from_millis(0),
            device_error_every: None,
            transport_error_every: None,
            self_test_polls: 9,
            self_test_never_completes: false,
            self_test_result: 0,
            smart_bad: false,
        }
    }
}

#[derive(Clone, Copy, Debug)]
enum SelfTest {
    Done(u8),
    Running { remaining: u8 },
}

pub struct SimDisk {
    info: DeviceInfo,
    conf: SimConfig,
    units: AtomicU64,
    verifies: AtomicU64,
    writes: AtomicU64,
    aborts: AtomicU64,
    self_tests: AtomicU64,
    self_test: Mutex<SelfTest>,
}

fn every(n: u64, period: Option<u64>) -> bool {
    match period {
        Some(p) if p != 0 => n % p == 0,
        _ => false,
    }
}

impl SimDisk {
    pub fn new(serial: &str, conf: SimConfig) -> Self {
        let info = DeviceInfo{
            path: PathBuf::from(format!("/sim/{}",serial)),
            model: "SIMULATED DISK".to_string(),
            serial: serial.to_string(),
            firmware: "SIM1.0".to_string(),
            logical_sector_size: conf.logical_sector_size,
            physical_sector_size: 4096.max(conf.logical_sector_size),
            sectors: conf.sectors,
            class: DiskClass::Rotational{ rpm: 7200 },
        };
        Self{
            info,
            conf,
            units: AtomicU64::new(0),
            verifies: AtomicU64::new(0),
            writes: AtomicU64::new(0),
            aborts: AtomicU64::new(0),
            self_tests: AtomicU64::new(0),
            self_test: Mutex::new(SelfTest::Done(0)),
        }
    }

    pub fn verifies(&self) -> u64 { self.verifies.load(Ordering::Acquire) }
    pub fn writes(&self) -> u64 { self.writes.load(Ordering::Acquire) }
    pub fn aborts(&self) -> u64 { self.aborts.load(Ordering::Acquire) }
    pub fn self_tests(&self) -> u64 { self.self_tests.load(Ordering::Acquire) }

    fn state(&self) -> MutexGuard<'_, SelfTest> {
        self.self_test.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn unit(&self, op: &'static str, count: u16, start: u64) -> DevResult<UnitOutcome> {
        if start + count as u64 > self.info.sectors {
            return Err(DeviceError::sense(op, &self.info.path, format!("range {}+{} beyond end",start,count)));
        }
        if !self.conf.real_delay.is_zero() {
            thread::sleep(self.conf.real_delay);
        }
        let n = self.units.fetch_add(1, Ordering::AcqRel) + 1;
        if every(n, self.conf.transport_error_every) {
            return Err(DeviceError::sense(op, &self.info.path, "simulated transport failure"));
        }
        let duration = if every(n, self.conf.slow_every) {
            self.conf.slow_latency
        } else {
            self.conf.unit_latency
        };
        Ok(UnitOutcome{
            duration,
            device_error: every(n, self.conf.device_error_every),
        })
    }
}

/// Disks for `--simulate`: a few flavours so every column has something to show.
pub fn demo_disks(n: usize) -> Vec<Arc<dyn DiskDevice>> {
    (0..n).map(|i| {
        // 256 blocks of 256 sectors each, 32 MiB
        let mut conf = SimConfig::new(256*256 + 17);
        conf.real_delay = Duration::from_millis(2);
        match i % 4 {
            1 => conf.slow_every = Some(40),
            2 => {
                conf.device_error_every = Some(97);
                conf.self_test_result = 0x73;
            }
            3 => {
                conf.smart_bad = true;
                conf.self_test_never_completes = true;
            }
            _ => {}
        }
        Arc::new(SimDisk::new(&format!("SIM{:04}",i + 1), conf)) as Arc<dyn DiskDevice>
    }).collect()
}

impl DiskDevice for SimDisk {
    fn info(&self) -> &DeviceInfo {
        &self.info
    }

    fn verify_range(&self, count: u16, start: u64) -> DevResult<UnitOutcome> {
        self.verifies.fetch_add(1, Ordering::AcqRel);
        self.unit("verify", count, start)
    }

    fn write_range(&self, count: u16, start: u64, buf: &[u8]) -> DevResult<UnitOutcome> {
        self.writes.fetch_add(1, Ordering::AcqRel);
        if buf.len() < count as usize * self.info.logical_sector_size as usize {
            return Err(DeviceError::sense("write", &self.info.path, "short buffer"));
        }
        self.unit("write", count, start)
    }

    fn run_self_test(&self, _kind: SelfTestKind) -> DevResult<()> {
        self.self_tests.fetch_add(1, Ordering::AcqRel);
        *self.state() = SelfTest::Running{ remaining: self.conf.self_test_polls };
        Ok(())
    }

    fn abort_self_test(&self) -> DevResult<()> {
        self.aborts.fetch_add(1, Ordering::AcqRel);
        // aborted by host
        *self.state() = SelfTest::Done(0x10);
        Ok(())
    }

    fn self_test_status(&self) -> DevResult<SelfTestStatus> {
        let mut state = self.state();
        match *state {
            SelfTest::Done(code) => Ok(SelfTestStatus(code)),
            SelfTest::Running{ remaining: 0 } => {
                *state = SelfTest::Done(self.conf.self_test_result);
                Ok(SelfTestStatus(self.conf.self_test_result))
            }
            SelfTest::Running{ remaining } => {
                if !self.conf.self_test_never_completes {
                    *state = SelfTest::Running{ remaining: remaining - 1 };
                }
                Ok(SelfTestStatus(0xF0 | remaining.min(9)))
            }
        }
    }

    fn read_smart(&self) -> DevResult<Vec<SmartAttribute>> {
        let hours = (self.units.load(Ordering::Acquire) / 1000) as u16;
        let attr = |id: u8, flags: u16, value: u8, worst: u8, threshold: u8, raw: [u8; 6]| SmartAttribute{
            id, flags, value, worst, raw, threshold,
        };
        let hb = hours.to_le_bytes();
        Ok(vec![
            attr(1, 0x0B, 200, 200, 51, [0; 6]),
            attr(5, 0x33, 200, 200, 140, [0; 6]),
            attr(9, 0x32, 99, 99, 0, [hb[0], hb[1], 0, 0, 0, 0]),
            attr(194, 0x22, 113, 100, 0, [37, 0, 21, 0, 45, 0]),
            attr(197, 0x32, 200, if self.conf.smart_bad { 1 } else { 200 }, 2, [0; 6]),
        ])
    }

    fn smart_status(&self) -> DevResult<SmartStatus> {
        Ok(if self.conf.smart_bad { SmartStatus::Bad } else { SmartStatus::Good })
    }
}
