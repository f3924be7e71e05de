use std::collections::HashMap;
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use log::{debug, info};

use crate::conf::AConf;
use crate::error::{JobError, SetupError};
use crate::io::dev::{DiskDevice, SelfTestKind};
use crate::progress::StatusTable;
use crate::progress::dev::{Mode, StatusRecord};

use super::{Job, JobKind};

/// Running worker thread. Dropping it detaches the worker.
pub struct JobHandle {
    thread: JoinHandle<()>,
}

impl JobHandle {
    pub fn join(self) -> thread::Result<()> {
        self.thread.join()
    }

    pub fn is_finished(&self) -> bool {
        self.thread.is_finished()
    }
}

/// Unbinds the worker from its device when the thread exits, panics included.
struct WorkerGuard {
    record: Arc<StatusRecord>,
    mode: Mode,
}

impl Drop for WorkerGuard {
    fn drop(&mut self) {
        self.record.finish(self.mode);
        self.record.release();
    }
}

/// Starts and stops jobs, at most one per device.
pub struct Supervisor {
    devices: Vec<Arc<dyn DiskDevice>>,
    by_serial: HashMap<String, usize>,
    table: Arc<StatusTable>,
    conf: AConf,
}

impl Supervisor {
    pub fn new(devices: Vec<Arc<dyn DiskDevice>>, conf: AConf) -> Result<Self, SetupError> {
        if devices.is_empty() {
            return Err(SetupError::NoDevices);
        }
        let mut by_serial = HashMap::new();
        for (i, dev) in devices.iter().enumerate() {
            let serial = dev.info().serial.clone();
            if by_serial.insert(serial.clone(), i).is_some() {
                return Err(SetupError::DuplicateSerial{ serial });
            }
        }
        let table = Arc::new(StatusTable::new(devices.iter().map(|d| d.info().serial.clone())));
        Ok(Self{ devices, by_serial, table, conf })
    }

    pub fn table(&self) -> &Arc<StatusTable> {
        &self.table
    }

    /// devices in display order
    pub fn devices(&self) -> &[Arc<dyn DiskDevice>] {
        &self.devices
    }

    pub fn device(&self, serial: &str) -> Option<&Arc<dyn DiskDevice>> {
        self.by_serial.get(serial).map(|i| &self.devices[*i])
    }

    fn lookup(&self, serial: &str) -> Result<(Arc<dyn DiskDevice>, Arc<StatusRecord>), JobError> {
        let unknown = || JobError::UnknownDevice{ serial: serial.to_string() };
        let device = self.device(serial).ok_or_else(unknown)?.clone();
        let record = self.table.record(serial).ok_or_else(unknown)?;
        Ok((device, record))
    }

    /// Launch `kind` on the device and return without waiting for it.
    ///
    /// Fails with `AlreadyBusy` while the device's mode is not Idle, and also
    /// while a stopped worker is still unwinding even though the mode already
    /// reads Idle. A start issued right after a stop can therefore be refused.
    pub fn start(&self, serial: &str, kind: JobKind) -> Result<JobHandle, JobError> {
        let (device, record) = self.lookup(serial)?;
        let mode = kind.mode();
        if !record.claim(mode) {
            debug!("{}: {:?} refused, device busy",serial,kind);
            return Err(JobError::AlreadyBusy{ serial: serial.to_string() });
        }

        let job = Job::new(device, record.clone(), kind, self.conf.clone());
        let guard = WorkerGuard{ record: record.clone(), mode };
        let spawned = thread::Builder::new()
            .name(format!("job-{}",serial))
            .spawn(move || {
                let _guard = guard;
                match kind {
                    JobKind::Verify => job.run_verify(),
                    JobKind::Erase => job.run_erase(),
                    JobKind::ShortSelfTest => job.run_self_test(SelfTestKind::Short),
                    JobKind::LongSelfTest => job.run_self_test(SelfTestKind::Extended),
                }
            });
        match spawned {
            Ok(thread) => Ok(JobHandle{ thread }),
            // the closure and its guard were dropped, the claim is already undone
            Err(e) => Err(JobError::Spawn(e.to_string())),
        }
    }

    /// Ask the device's worker to stop. Returns whether anything was running.
    /// Never waits for the worker to exit.
    pub fn stop(&self, serial: &str) -> Result<bool, JobError> {
        let (_, record) = self.lookup(serial)?;
        let was_running = record.request_idle();
        if was_running {
            info!("{}: stop requested",serial);
        }
        Ok(was_running)
    }
}

#[cfg(test)]
mod test {
    use std::sync::Arc;
    use std::thread;
    use std::time::{Duration, Instant};

    use crate::conf::{get_test_config, Conf};
    use crate::error::{JobError, SetupError};
    use crate::io::dev::DiskDevice;
    use crate::io::sim::{SimConfig, SimDisk};
    use crate::job::JobKind;
    use crate::progress::dev::Mode;

    use super::Supervisor;

    fn slow_disk(serial: &str) -> Arc<SimDisk> {
        let mut conf = SimConfig::new(256*2000);
        conf.real_delay = Duration::from_millis(1);
        Arc::new(SimDisk::new(serial, conf))
    }

    fn supervisor(disks: &[Arc<SimDisk>]) -> Supervisor {
        let devices: Vec<Arc<dyn DiskDevice>> = disks.iter()
            .map(|d| d.clone() as Arc<dyn DiskDevice>)
            .collect();
        Supervisor::new(devices, get_test_config()).unwrap()
    }

    fn wait_for(what: impl Fn() -> bool) {
        let deadline = Instant::now() + Duration::from_secs(20);
        while !what() {
            assert!(Instant::now() < deadline,"timed out");
            thread::sleep(Duration::from_millis(1));
        }
    }

    #[test]
    fn test_setup_errors() {
        assert_eq!(Supervisor::new(Vec::new(), get_test_config()).err(),Some(SetupError::NoDevices));
        let devices: Vec<Arc<dyn DiskDevice>> = vec![slow_disk("A") as Arc<dyn DiskDevice>, slow_disk("A")];
        assert_eq!(
            Supervisor::new(devices, get_test_config()).err(),
            Some(SetupError::DuplicateSerial{ serial: "A".to_string() }),
        );
    }

    #[test]
    fn test_second_start_is_busy() {
        let disks = [slow_disk("A"), slow_disk("B"), slow_disk("C")];
        let sup = supervisor(&disks);
        let handle = sup.start("A", JobKind::Verify).unwrap();
        assert_eq!(
            sup.start("A", JobKind::Erase).err(),
            Some(JobError::AlreadyBusy{ serial: "A".to_string() }),
        );
        assert_eq!(sup.table().get("A").unwrap().mode,Mode::Read);
        assert_eq!(sup.table().get("B").unwrap().mode,Mode::Idle);

        assert!(sup.stop("A").unwrap());
        handle.join().unwrap();
        assert_eq!(sup.table().get("A").unwrap().mode,Mode::Idle);
        // no erase ever ran
        assert_eq!(disks[0].writes(),0);
    }

    #[test]
    fn test_start_refused_while_stopped_worker_unwinds() {
        let disks = [slow_disk("A")];
        let devices: Vec<Arc<dyn DiskDevice>> = vec![disks[0].clone() as Arc<dyn DiskDevice>];
        let mut conf = Conf::default();
        conf.settle_delay = Duration::from_millis(500);
        let sup = Supervisor::new(devices, Arc::new(conf)).unwrap();

        // the worker is still in its settle delay when the stop lands
        let handle = sup.start("A", JobKind::Verify).unwrap();
        assert!(sup.stop("A").unwrap());
        assert_eq!(sup.table().get("A").unwrap().mode,Mode::Idle);
        assert_eq!(
            sup.start("A", JobKind::Erase).err(),
            Some(JobError::AlreadyBusy{ serial: "A".to_string() }),
        );

        handle.join().unwrap();
        let handle = sup.start("A", JobKind::ShortSelfTest).unwrap();
        sup.stop("A").unwrap();
        handle.join().unwrap();
        assert_eq!(disks[0].writes(),0);
    }

    #[test]
    fn test_racing_starts_bind_one_worker() {
        let disks = [slow_disk("A")];
        let sup = Arc::new(supervisor(&disks));
        let racers: Vec<_> = (0..8).map(|i| {
            let sup = sup.clone();
            thread::spawn(move || {
                let kind = if i % 2 == 0 { JobKind::Verify } else { JobKind::Erase };
                sup.start("A", kind).ok()
            })
        }).collect();
        let handles: Vec<_> = racers.into_iter()
            .filter_map(|r| r.join().unwrap())
            .collect();
        assert_eq!(handles.len(),1);

        sup.stop("A").unwrap();
        for h in handles {
            h.join().unwrap();
        }
    }

    #[test]
    fn test_stop_erase_after_first_block() {
        let disks = [slow_disk("A"), slow_disk("B"), slow_disk("C")];
        let sup = supervisor(&disks);
        let handle = sup.start("B", JobKind::Erase).unwrap();
        wait_for(|| disks[1].writes() >= 1);
        assert!(sup.stop("B").unwrap());
        handle.join().unwrap();
        assert!(!sup.table().record("B").unwrap().worker_live());

        let s = sup.table().get("B").unwrap();
        assert_eq!(s.mode,Mode::Idle);
        assert_eq!((s.progress,s.loops,s.slow,s.error),(0,0,0,0));
        assert!(disks[1].writes() < 2000);
    }

    #[test]
    fn test_stop_idle_is_noop_and_restart_works() {
        let disks = [slow_disk("A")];
        let sup = supervisor(&disks);
        assert!(!sup.stop("A").unwrap());
        assert_eq!(sup.stop("Z").err(),Some(JobError::UnknownDevice{ serial: "Z".to_string() }));

        let handle = sup.start("A", JobKind::ShortSelfTest).unwrap();
        handle.join().unwrap();
        let s = sup.table().get("A").unwrap();
        assert_eq!((s.mode,s.progress),(Mode::Idle,20));

        let handle = sup.start("A", JobKind::LongSelfTest).unwrap();
        handle.join().unwrap();
        assert_eq!(disks[0].self_tests(),2);
    }

    #[test]
    fn test_workers_run_independently() {
        let disks = [slow_disk("A"), slow_disk("B")];
        let sup = supervisor(&disks);
        let a = sup.start("A", JobKind::Erase).unwrap();
        let b = sup.start("B", JobKind::Verify).unwrap();
        wait_for(|| disks[0].writes() >= 1 && disks[1].verifies() >= 1);
        assert_eq!(sup.table().get("A").unwrap().mode,Mode::Write);
        assert_eq!(sup.table().get("B").unwrap().mode,Mode::Read);

        sup.stop("A").unwrap();
        a.join().unwrap();
        assert_eq!(sup.table().get("B").unwrap().mode,Mode::Read);
        sup.stop("B").unwrap();
        b.join().unwrap();
    }
}
