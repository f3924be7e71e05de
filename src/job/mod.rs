use std::sync::Arc;
use std::thread;

use crate::conf::AConf;
use crate::io::dev::DiskDevice;
use crate::progress::dev::{Field, Mode, Spinner, StatusRecord};

pub mod bulk;
pub mod selftest;
pub mod supervisor;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum JobKind {
    Verify,
    Erase,
    ShortSelfTest,
    LongSelfTest,
}

impl JobKind {
    pub fn mode(self) -> Mode {
        match self {
            JobKind::Verify => Mode::Read,
            JobKind::Erase => Mode::Write,
            JobKind::ShortSelfTest => Mode::Short,
            JobKind::LongSelfTest => Mode::Long,
        }
    }
}

/// Cancellation token of one job. The job is cancelled as soon as its
/// device's mode stops reading as the mode the job was started with.
pub struct JobToken {
    record: Arc<StatusRecord>,
    mode: Mode,
}

impl JobToken {
    pub fn new(record: Arc<StatusRecord>, mode: Mode) -> Self {
        Self{ record, mode }
    }

    pub fn cancelled(&self) -> bool {
        self.record.mode() != self.mode
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }
}

/// Everything a worker thread owns while it drives one device.
pub struct Job {
    pub device: Arc<dyn DiskDevice>,
    pub record: Arc<StatusRecord>,
    pub token: JobToken,
    pub conf: AConf,
}

impl Job {
    pub fn new(device: Arc<dyn DiskDevice>, record: Arc<StatusRecord>, kind: JobKind, conf: AConf) -> Self {
        let token = JobToken::new(record.clone(), kind.mode());
        Self{ device, record, token, conf }
    }

    pub fn serial(&self) -> &str {
        &self.device.info().serial
    }

    /// Zero the counters and give the operator a moment to see the job was
    /// accepted. The mode itself was set when the job was claimed.
    fn begin(&self) {
        for field in [Field::Slow(0), Field::Error(0), Field::Progress(0), Field::Loop(0), Field::Speed(0)].iter() {
            self.record.set(*field);
        }
        if !self.conf.settle_delay.is_zero() {
            thread::sleep(self.conf.settle_delay);
        }
        self.record.set(Field::Busy(Spinner::Bar));
    }

    /// Unwind after an external stop. The mode is left as the stopper set it.
    fn cancelled(&self) {
        for field in [Field::Slow(0), Field::Error(0), Field::Progress(0), Field::Busy(Spinner::Blank)].iter() {
            self.record.set(*field);
        }
    }
}
