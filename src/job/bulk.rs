//! Verify and erase: walk the whole sector range block by block.

use std::time::Duration;

use log::{debug, info, warn};

use crate::io::dev::{DevResult, UnitOutcome};
use crate::io::pass::{create_buf, pass_buf};
use crate::progress::dev::{Field, Mode, Spinner, PROGRESS_FULL};

use super::Job;

const MIB: f64 = (1024 * 1024) as f64;

enum Unit<'b> {
    Verify,
    Write(&'b [u8]),
}

#[derive(Debug, PartialEq, Eq)]
enum PassEnd {
    Completed,
    Cancelled,
}

/// bar fill after `done` of `total` sectors, floored
pub fn progress_of(done: u64, total: u64) -> u8 {
    if total == 0 {
        return PROGRESS_FULL;
    }
    let p = (PROGRESS_FULL as u128 * done as u128) / total as u128;
    p.min(PROGRESS_FULL as u128) as u8
}

/// MiB/s of one block, floored; zero when no time was measured
pub fn block_speed(block_mib: f64, duration: Duration) -> u64 {
    let secs = duration.as_secs_f64();
    if secs <= 0.0 {
        return 0;
    }
    (block_mib / secs) as u64
}

impl Job {
    fn issue(&self, unit: &Unit<'_>, count: u16, start: u64) -> DevResult<UnitOutcome> {
        match unit {
            Unit::Verify => self.device.verify_range(count, start),
            Unit::Write(buf) => self.device.write_range(count, start, buf),
        }
    }

    /// error/slow accounting of one block, returns its duration if it reached the device
    fn account(&self, result: DevResult<UnitOutcome>, start: u64, slow_threshold: Duration) -> Option<Duration> {
        match result {
            Ok(outcome) => {
                if outcome.device_error {
                    debug!("{}: device error at sector {}",self.serial(),start);
                    self.record.add_error();
                } else if outcome.duration > slow_threshold {
                    self.record.add_slow();
                }
                Some(outcome.duration)
            }
            Err(e) => {
                debug!("{}: {}",self.serial(),e);
                self.record.add_error();
                None
            }
        }
    }

    fn run_pass(&self, unit: Unit<'_>) -> PassEnd {
        let info = self.device.info();
        let per_block = self.conf.sectors_per_block;
        let interval = self.conf.sample_interval_blocks;
        let total = info.sectors;
        let full_blocks = total / per_block;
        let tail = total % per_block;
        let block_mib = (info.logical_sector_size as u64 * per_block) as f64 / MIB;

        let mut speed_sum = 0u64;
        for block in 0..full_blocks {
            if self.token.cancelled() {
                return PassEnd::Cancelled;
            }
            let start = block * per_block;
            let result = self.issue(&unit, per_block as u16, start);
            if let Some(duration) = self.account(result, start, self.conf.slow_threshold) {
                speed_sum += block_speed(block_mib, duration);
            }
            if block % interval == 0 {
                self.record.set(Field::Speed(speed_sum / interval));
                speed_sum = 0;
                self.record.set(Field::Progress(progress_of(start + per_block, total)));
                self.record.advance_busy();
            }
        }

        if tail != 0 {
            let start = full_blocks * per_block;
            let result = self.issue(&unit, tail as u16, start);
            self.account(result, start, self.conf.tail_slow_threshold);
        }
        PassEnd::Completed
    }

    pub fn run_verify(&self) {
        info!("{}: verify started",self.serial());
        self.begin();
        if self.run_pass(Unit::Verify) == PassEnd::Cancelled {
            info!("{}: verify stopped",self.serial());
            self.cancelled();
            return;
        }
        self.record.set(Field::Progress(PROGRESS_FULL));
        self.record.set(Field::Speed(0));
        self.record.set(Field::Busy(Spinner::Blank));
        self.record.finish(Mode::Read);
        let s = self.record.snapshot();
        info!("{}: verify finished, {} slow, {} errors",self.serial(),s.slow,s.error);
    }

    /// Erase until stopped, one full pass after another.
    pub fn run_erase(&self) {
        info!("{}: erase started",self.serial());
        self.begin();
        let len = self.device.info().logical_sector_size as usize * self.conf.sectors_per_block as usize;
        loop {
            for field in [Field::Speed(0), Field::Slow(0), Field::Error(0), Field::Progress(0)].iter() {
                self.record.set(*field);
            }
            let buf = pass_buf(self.conf.erase_fill, len).unwrap_or_else(|e| {
                warn!("{}: {:#}, erasing with zeros",self.serial(),e);
                create_buf(len)
            });
            if self.run_pass(Unit::Write(&buf)) == PassEnd::Cancelled {
                info!("{}: erase stopped",self.serial());
                self.record.set(Field::Loop(0));
                self.cancelled();
                return;
            }
            self.record.set(Field::Progress(PROGRESS_FULL));
            self.record.add_loop();
            let s = self.record.snapshot();
            info!("{}: erase pass {} done, {} slow, {} errors",self.serial(),s.loops,s.slow,s.error);
        }
    }
}

#[cfg(test)]
mod test {
    use std::sync::Arc;
    use std::thread;
    use std::time::{Duration, Instant};

    use crate::conf::{get_test_config, Conf};
    use crate::io::dev::DiskDevice;
    use crate::io::sim::{SimConfig, SimDisk};
    use crate::job::{Job, JobKind};
    use crate::progress::dev::{Mode, Spinner, StatusRecord};

    use super::{block_speed, progress_of, PassEnd, Unit};

    fn job_for(disk: Arc<SimDisk>, kind: JobKind, conf: Arc<Conf>) -> (Job, Arc<StatusRecord>) {
        let record = Arc::new(StatusRecord::default());
        assert!(record.claim(kind.mode()));
        let device: Arc<dyn DiskDevice> = disk;
        (Job::new(device, record.clone(), kind, conf), record)
    }

    #[test]
    fn test_progress_floor() {
        assert_eq!(progress_of(0, 1000),0);
        assert_eq!(progress_of(49, 1000),0);
        assert_eq!(progress_of(50, 1000),1);
        assert_eq!(progress_of(999, 1000),19);
        assert_eq!(progress_of(1000, 1000),20);
        assert_eq!(progress_of(5000, 1000),20);
    }

    #[test]
    fn test_block_speed_floor() {
        assert_eq!(block_speed(1.0, Duration::from_millis(250)),4);
        assert_eq!(block_speed(1.0, Duration::from_millis(300)),3);
        assert_eq!(block_speed(0.125, Duration::from_millis(0)),0);
    }

    #[test]
    fn test_verify_full_pass() {
        // 10 full blocks plus a 100 sector tail
        let disk = Arc::new(SimDisk::new("A", SimConfig::new(256*10 + 100)));
        let (job, record) = job_for(disk.clone(), JobKind::Verify, get_test_config());
        job.run_verify();
        let s = record.snapshot();
        assert_eq!(s.mode,Mode::Idle);
        assert_eq!(s.progress,20);
        assert_eq!(s.speed,0);
        assert_eq!(s.busy,Spinner::Blank);
        assert_eq!((s.slow,s.error),(0,0));
        assert_eq!(disk.verifies(),11);
    }

    #[test]
    fn test_slow_counts_full_blocks() {
        let mut conf = SimConfig::new(256*12);
        conf.unit_latency = Duration::from_millis(60);
        let disk = Arc::new(SimDisk::new("A", conf));
        let (job, record) = job_for(disk.clone(), JobKind::Verify, get_test_config());
        job.run_verify();
        assert_eq!(record.snapshot().slow,12);
        // no tail, no extra unit
        assert_eq!(disk.verifies(),12);
    }

    fn verify_with_tail(latency_ms: u64) -> (u64, u64) {
        let mut conf = SimConfig::new(256*12 + 100);
        conf.unit_latency = Duration::from_millis(latency_ms);
        let disk = Arc::new(SimDisk::new("A", conf));
        let (job, record) = job_for(disk.clone(), JobKind::Verify, get_test_config());
        job.run_verify();
        (record.snapshot().slow, disk.verifies())
    }

    #[test]
    fn test_tail_has_its_own_slow_threshold() {
        // 60ms is slow for a full block but not for the tail
        assert_eq!(verify_with_tail(60),(12,13));
        assert_eq!(verify_with_tail(120),(13,13));
    }

    #[test]
    fn test_tail_errors_are_counted() {
        // unit 5 is the tail
        let mut conf = SimConfig::new(256*4 + 10);
        conf.transport_error_every = Some(5);
        let disk = Arc::new(SimDisk::new("A", conf));
        let (job, record) = job_for(disk.clone(), JobKind::Verify, get_test_config());
        job.run_verify();
        let s = record.snapshot();
        assert_eq!((s.mode,s.progress,s.error,s.slow),(Mode::Idle,20,1,0));
        assert_eq!(disk.verifies(),5);

        let mut conf = SimConfig::new(256*4 + 10);
        conf.device_error_every = Some(5);
        conf.unit_latency = Duration::from_millis(150);
        let disk = Arc::new(SimDisk::new("A", conf));
        let (job, record) = job_for(disk, JobKind::Verify, get_test_config());
        job.run_verify();
        let s = record.snapshot();
        // the flagged tail counts as an error, not as slow
        assert_eq!((s.error,s.slow),(1,4));
    }

    #[test]
    fn test_tail_runs_past_the_stop_check() {
        // stopped before the pass: full blocks are skipped
        let disk = Arc::new(SimDisk::new("A", SimConfig::new(256*3 + 10)));
        let (job, record) = job_for(disk.clone(), JobKind::Verify, get_test_config());
        assert!(record.request_idle());
        assert_eq!(job.run_pass(Unit::Verify),PassEnd::Cancelled);
        assert_eq!(disk.verifies(),0);

        // a device smaller than one block only has the tail, which is not gated
        let disk = Arc::new(SimDisk::new("A", SimConfig::new(100)));
        let (job, record) = job_for(disk.clone(), JobKind::Verify, get_test_config());
        assert!(record.request_idle());
        assert_eq!(job.run_pass(Unit::Verify),PassEnd::Completed);
        assert_eq!(disk.verifies(),1);
    }

    #[test]
    fn test_errors_are_counted_not_fatal() {
        let mut conf = SimConfig::new(256*12);
        conf.device_error_every = Some(4);
        conf.transport_error_every = Some(6);
        conf.unit_latency = Duration::from_millis(60);
        let disk = Arc::new(SimDisk::new("A", conf));
        let (job, record) = job_for(disk.clone(), JobKind::Verify, get_test_config());
        job.run_verify();
        let s = record.snapshot();
        // units 4, 8, 12 device errors; 6, 12 transport failures (12 fails before the flag)
        assert_eq!(s.error,4);
        assert_eq!(s.slow,8);
        assert_eq!(s.progress,20);
        assert_eq!(disk.verifies(),12);
    }

    #[test]
    fn test_verify_progress_monotonic() {
        let mut conf = SimConfig::new(256*200);
        conf.real_delay = Duration::from_micros(300);
        let disk = Arc::new(SimDisk::new("A", conf));
        let (job, record) = job_for(disk, JobKind::Verify, get_test_config());
        let worker = thread::spawn(move || job.run_verify());

        let mut last = 0;
        let deadline = Instant::now() + Duration::from_secs(20);
        while record.mode() == Mode::Read && Instant::now() < deadline {
            let p = record.snapshot().progress;
            assert!(p >= last,"progress went back from {} to {}",last,p);
            last = p;
            thread::sleep(Duration::from_micros(200));
        }
        worker.join().unwrap();
        assert_eq!(record.snapshot().progress,20);
    }

    #[test]
    fn test_erase_loops_until_stopped() {
        let mut conf = SimConfig::new(256*8 + 3);
        conf.real_delay = Duration::from_micros(200);
        let disk = Arc::new(SimDisk::new("B", conf));
        let (job, record) = job_for(disk.clone(), JobKind::Erase, get_test_config());
        let worker = thread::spawn(move || job.run_erase());

        let deadline = Instant::now() + Duration::from_secs(20);
        let mut last_loop = 0;
        while record.snapshot().loops < 3 && Instant::now() < deadline {
            let l = record.snapshot().loops;
            assert!(l >= last_loop);
            last_loop = l;
            thread::sleep(Duration::from_micros(100));
        }
        assert!(record.snapshot().loops >= 3);
        assert!(record.request_idle());
        worker.join().unwrap();

        let s = record.snapshot();
        assert_eq!(s.mode,Mode::Idle);
        assert_eq!((s.progress,s.slow,s.error,s.loops),(0,0,0,0));
        assert_eq!(s.busy,Spinner::Blank);
        // 9 writes per pass, the stop lands inside some pass
        assert!(disk.writes() >= 27);
    }
}
