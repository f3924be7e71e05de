//! SMART self-tests run inside the device; the worker only starts, polls
//! and, when stopped, aborts them.

use std::thread;

use log::{debug, info, warn};

use crate::io::dev::{SelfTestKind, SelfTestStatus};
use crate::progress::dev::{Field, Spinner, PROGRESS_FULL};

use super::Job;

/// assumed while the device has not answered a status read yet
const STATUS_JUST_STARTED: SelfTestStatus = SelfTestStatus(0xF9);

/// bar fill from the remaining tenths reported by the device
pub fn self_test_progress(status: SelfTestStatus) -> u8 {
    PROGRESS_FULL.saturating_sub(2 * status.remaining_tenths())
}

impl Job {
    fn poll_status(&self, last: SelfTestStatus) -> SelfTestStatus {
        match self.device.self_test_status() {
            Ok(status) => status,
            Err(e) => {
                debug!("{}: {}",self.serial(),e);
                self.record.add_error();
                last
            }
        }
    }

    pub fn run_self_test(&self, kind: SelfTestKind) {
        let mode = self.token.mode();
        info!("{}: {:?} self-test started",self.serial(),kind);
        self.begin();
        if self.token.cancelled() {
            // stopped before anything reached the device
            self.cancelled();
            return;
        }

        if let Err(e) = self.device.run_self_test(kind) {
            warn!("{}: {}",self.serial(),e);
            self.record.add_error();
        }
        let mut status = self.poll_status(STATUS_JUST_STARTED);
        while status.in_progress() {
            thread::sleep(self.conf.self_test_poll);
            status = self.poll_status(status);
            self.record.set(Field::Progress(self_test_progress(status)));
            self.record.advance_busy();
            if self.token.cancelled() {
                info!("{}: {:?} self-test stopped",self.serial(),kind);
                self.cancelled();
                if let Err(e) = self.device.abort_self_test() {
                    warn!("{}: {}",self.serial(),e);
                    self.record.set(Field::Error(1));
                }
                return;
            }
        }

        if status.0 != 0 {
            self.record.set(Field::Error(status.0 as u64));
        } else {
            self.record.set(Field::Progress(PROGRESS_FULL));
        }
        self.record.set(Field::Busy(Spinner::Blank));
        self.record.set(Field::Speed(0));
        self.record.finish(mode);
        info!("{}: {:?} self-test finished with status {:#04x}",self.serial(),kind,status.0);
    }
}
