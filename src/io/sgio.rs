//! ATA PASS-THROUGH (16) over the Linux SG_IO ioctl.

use std::fs::{File, OpenOptions};
use std::os::unix::fs::OpenOptionsExt;
use std::os::unix::io::AsRawFd;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use libc::{c_int, c_uchar, c_uint, c_ushort, c_void, O_NONBLOCK};
use log::debug;

use crate::error::DeviceError;
use crate::io::ata::{self, Identify, SmartAttribute, SECTOR};
use crate::io::dev::{DevResult, DeviceInfo, DiskDevice, SelfTestKind, SelfTestStatus, SmartStatus, UnitOutcome};
use crate::io::pass::create_buf;

const SG_IO: libc::c_ulong = 0x2285;
const SG_DXFER_NONE: c_int = -1;
const SG_DXFER_TO_DEV: c_int = -2;
const SG_DXFER_FROM_DEV: c_int = -3;

const ATA_16: u8 = 0x85;

const ATA_IDENTIFY: u8 = 0xEC;
const ATA_READ_VERIFY_EXT: u8 = 0x42;
const ATA_WRITE_DMA_EXT: u8 = 0x35;
const ATA_SMART: u8 = 0xB0;

const SMART_READ_DATA: u8 = 0xD0;
const SMART_READ_THRESHOLDS: u8 = 0xD1;
const SMART_EXECUTE_OFFLINE: u8 = 0xD4;
const SMART_RETURN_STATUS: u8 = 0xDA;

const SELF_TEST_SHORT: u8 = 0x01;
const SELF_TEST_EXTENDED: u8 = 0x02;
const SELF_TEST_ABORT: u8 = 0x7F;

const ATA_STATUS_ERR: u8 = 0x01;

const TIMEOUT_MS: c_uint = 60_000;

#[repr(C)]
struct SgIoHdr {
    interface_id: c_int,
    dxfer_direction: c_int,
    cmd_len: c_uchar,
    mx_sb_len: c_uchar,
    iovec_count: c_ushort,
    dxfer_len: c_uint,
    dxferp: *mut c_void,
    cmdp: *const c_uchar,
    sbp: *mut c_uchar,
    timeout: c_uint,
    flags: c_uint,
    pack_id: c_int,
    usr_ptr: *mut c_void,
    status: c_uchar,
    masked_status: c_uchar,
    msg_status: c_uchar,
    sb_len_wr: c_uchar,
    host_status: c_ushort,
    driver_status: c_ushort,
    resid: c_int,
    duration: c_uint,
    info: c_uint,
}

#[derive(Clone, Copy, PartialEq)]
enum Protocol {
    NonData = 3,
    PioIn = 4,
    Dma = 6,
}

enum Transfer<'a> {
    None,
    In(&'a mut [u8]),
    Out(&'a [u8]),
}

/// ATA registers of one command
#[derive(Default, Clone, Copy)]
struct Taskfile {
    features: u8,
    count: u16,
    lba: u64,
    command: u8,
}

impl Taskfile {
    fn smart(features: u8, lba_low: u8) -> Self {
        Self{
            features,
            count: if features == SMART_EXECUTE_OFFLINE || features == SMART_RETURN_STATUS { 0 } else { 1 },
            lba: 0xC2_4F00 | lba_low as u64,
            command: ATA_SMART,
        }
    }
}

/// Registers returned in the ATA status return sense descriptor.
#[derive(Default, Debug, Clone, Copy)]
struct AtaReturn {
    error: u8,
    lba_mid: u8,
    lba_high: u8,
    status: u8,
}

fn build_cdb(tf: &Taskfile, proto: Protocol, dir_in: bool, has_data: bool, check_condition: bool) -> [u8; 16] {
    let mut cdb = [0u8; 16];
    cdb[0] = ATA_16;
    cdb[1] = (proto as u8) << 1 | 0x01; // extend
    let mut flags = 0u8;
    if check_condition { flags |= 0x20; }
    if has_data {
        // byte_block, length in sector count field
        flags |= 0x04 | 0x02;
        if dir_in { flags |= 0x08; }
    }
    cdb[2] = flags;
    cdb[4] = tf.features;
    cdb[5] = (tf.count >> 8) as u8;
    cdb[6] = tf.count as u8;
    cdb[7] = (tf.lba >> 24) as u8;
    cdb[8] = tf.lba as u8;
    cdb[9] = (tf.lba >> 32) as u8;
    cdb[10] = (tf.lba >> 8) as u8;
    cdb[11] = (tf.lba >> 40) as u8;
    cdb[12] = (tf.lba >> 16) as u8;
    cdb[13] = 0x40; // LBA mode
    cdb[14] = tf.command;
    cdb
}

/// Find the ATA status return descriptor (type 0x09) in descriptor format sense data.
fn parse_sense(sense: &[u8]) -> Option<AtaReturn> {
    if sense.len() < 8 || sense[0] & 0x7F != 0x72 {
        return None;
    }
    let total = (8 + sense[7] as usize).min(sense.len());
    let mut off = 8;
    while off + 2 <= total {
        let len = sense[off+1] as usize + 2;
        if sense[off] == 0x09 && off + 14 <= total {
            let d = &sense[off..off+14];
            return Some(AtaReturn{
                error: d[3],
                lba_mid: d[9],
                lba_high: d[11],
                status: d[13],
            });
        }
        off += len;
    }
    None
}

pub struct AtaDisk {
    file: File,
    info: DeviceInfo,
}

impl AtaDisk {
    pub fn open(path: &Path) -> DevResult<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .custom_flags(O_NONBLOCK)
            .open(path)
            .map_err(|e| DeviceError::io("open", path, e))?;

        let mut disk = Self{
            file,
            info: DeviceInfo{
                path: path.to_path_buf(),
                model: String::new(),
                serial: String::new(),
                firmware: String::new(),
                logical_sector_size: SECTOR as u32,
                physical_sector_size: SECTOR as u32,
                sectors: 0,
                class: crate::io::dev::DiskClass::Rotational{ rpm: 0 },
            },
        };

        let mut buf = create_buf(SECTOR);
        let tf = Taskfile{ command: ATA_IDENTIFY, count: 1, ..Default::default() };
        disk.exec("identify", &tf, Protocol::PioIn, Transfer::In(&mut buf), false)?;
        let id = Identify::parse(&buf).ok_or_else(|| DeviceError::Identify{
            path: path.to_path_buf(),
            reason: "short IDENTIFY data".to_string(),
        })?;
        if id.serial().is_empty() || id.sectors() == 0 {
            return Err(DeviceError::Identify{
                path: path.to_path_buf(),
                reason: "IDENTIFY reports no serial or zero capacity".to_string(),
            });
        }
        disk.info = DeviceInfo{
            path: path.to_path_buf(),
            model: id.model(),
            serial: id.serial(),
            firmware: id.firmware(),
            logical_sector_size: id.logical_sector_size(),
            physical_sector_size: id.physical_sector_size(),
            sectors: id.sectors(),
            class: id.class(),
        };
        debug!("identified {} as {} {}",path.display(),disk.info.model,disk.info.serial);
        Ok(disk)
    }

    fn path(&self) -> PathBuf {
        self.info.path.clone()
    }

    /// Issue one command. `Err` only when the command did not make it to the
    /// device and back; an ATA error status is returned in `AtaReturn`.
    fn exec(&self, op: &'static str, tf: &Taskfile, proto: Protocol, data: Transfer<'_>, check_condition: bool) -> DevResult<(AtaReturn, Duration)> {
        let (direction, dxferp, dxfer_len, dir_in) = match data {
            Transfer::None => (SG_DXFER_NONE, std::ptr::null_mut(), 0, false),
            Transfer::In(buf) => (SG_DXFER_FROM_DEV, buf.as_mut_ptr() as *mut c_void, buf.len(), true),
            Transfer::Out(buf) => (SG_DXFER_TO_DEV, buf.as_ptr() as *mut c_void, buf.len(), false),
        };
        let cdb = build_cdb(tf, proto, dir_in, dxfer_len != 0, check_condition);
        let mut sense = [0u8; 32];
        let mut hdr = SgIoHdr{
            interface_id: 'S' as c_int,
            dxfer_direction: direction,
            cmd_len: cdb.len() as c_uchar,
            mx_sb_len: sense.len() as c_uchar,
            iovec_count: 0,
            dxfer_len: dxfer_len as c_uint,
            dxferp,
            cmdp: cdb.as_ptr(),
            sbp: sense.as_mut_ptr(),
            timeout: TIMEOUT_MS,
            flags: 0,
            pack_id: 0,
            usr_ptr: std::ptr::null_mut(),
            status: 0,
            masked_status: 0,
            msg_status: 0,
            sb_len_wr: 0,
            host_status: 0,
            driver_status: 0,
            resid: 0,
            duration: 0,
            info: 0,
        };

        let start = Instant::now();
        // SAFETY: hdr points at buffers that outlive the call and whose
        // lengths are given in the header.
        let rc = unsafe { libc::ioctl(self.file.as_raw_fd(), SG_IO as _, &mut hdr as *mut SgIoHdr) };
        let duration = start.elapsed();

        if rc < 0 {
            return Err(DeviceError::io(op, self.path(), std::io::Error::last_os_error()));
        }
        if hdr.host_status != 0 {
            return Err(DeviceError::sense(op, self.path(), format!("host status {:#x}",hdr.host_status)));
        }

        let sense_len = (hdr.sb_len_wr as usize).min(sense.len());
        match parse_sense(&sense[..sense_len]) {
            Some(ret) => Ok((ret, duration)),
            // no sense descriptor and a clean SCSI status: command succeeded
            None if hdr.status == 0 && hdr.driver_status & 0x0F == 0 => Ok((AtaReturn::default(), duration)),
            None => Err(DeviceError::sense(op, self.path(), format!(
                "scsi status {:#x}, driver status {:#x}", hdr.status, hdr.driver_status))),
        }
    }

    fn smart_sector(&self, op: &'static str, features: u8) -> DevResult<Vec<u8>> {
        let mut buf = create_buf(SECTOR);
        let (ret, _) = self.exec(op, &Taskfile::smart(features, 0), Protocol::PioIn, Transfer::In(&mut buf), false)?;
        if ret.status & ATA_STATUS_ERR != 0 {
            return Err(DeviceError::sense(op, self.path(), format!("ATA error {:#x}",ret.error)));
        }
        Ok(buf)
    }

    fn smart_command(&self, op: &'static str, subcommand: u8) -> DevResult<()> {
        let (ret, _) = self.exec(op, &Taskfile::smart(SMART_EXECUTE_OFFLINE, subcommand), Protocol::NonData, Transfer::None, false)?;
        if ret.status & ATA_STATUS_ERR != 0 {
            return Err(DeviceError::sense(op, self.path(), format!("ATA error {:#x}",ret.error)));
        }
        Ok(())
    }
}

impl DiskDevice for AtaDisk {
    fn info(&self) -> &DeviceInfo {
        &self.info
    }

    fn verify_range(&self, count: u16, start: u64) -> DevResult<UnitOutcome> {
        let tf = Taskfile{ command: ATA_READ_VERIFY_EXT, count, lba: start, features: 0 };
        let (ret, duration) = self.exec("verify", &tf, Protocol::NonData, Transfer::None, false)?;
        Ok(UnitOutcome{ duration, device_error: ret.status & ATA_STATUS_ERR != 0 })
    }

    fn write_range(&self, count: u16, start: u64, buf: &[u8]) -> DevResult<UnitOutcome> {
        let len = count as usize * self.info.logical_sector_size as usize;
        if buf.len() < len {
            return Err(DeviceError::sense("write", self.path(), format!("buffer of {} bytes for {} sectors",buf.len(),count)));
        }
        let tf = Taskfile{ command: ATA_WRITE_DMA_EXT, count, lba: start, features: 0 };
        let (ret, duration) = self.exec("write", &tf, Protocol::Dma, Transfer::Out(&buf[..len]), false)?;
        Ok(UnitOutcome{ duration, device_error: ret.status & ATA_STATUS_ERR != 0 })
    }

    fn run_self_test(&self, kind: SelfTestKind) -> DevResult<()> {
        let sub = match kind {
            SelfTestKind::Short => SELF_TEST_SHORT,
            SelfTestKind::Extended => SELF_TEST_EXTENDED,
        };
        self.smart_command("self-test", sub)
    }

    fn abort_self_test(&self) -> DevResult<()> {
        self.smart_command("abort self-test", SELF_TEST_ABORT)
    }

    fn self_test_status(&self) -> DevResult<SelfTestStatus> {
        let data = self.smart_sector("read smart", SMART_READ_DATA)?;
        ata::self_test_status(&data).ok_or_else(|| DeviceError::sense("read smart", self.path(), "short SMART data"))
    }

    fn read_smart(&self) -> DevResult<Vec<SmartAttribute>> {
        let data = self.smart_sector("read smart", SMART_READ_DATA)?;
        let thresholds = self.smart_sector("read thresholds", SMART_READ_THRESHOLDS)?;
        Ok(ata::parse_smart(&data, &thresholds))
    }

    fn smart_status(&self) -> DevResult<SmartStatus> {
        let (ret, _) = self.exec("smart status", &Taskfile::smart(SMART_RETURN_STATUS, 0), Protocol::NonData, Transfer::None, true)?;
        match (ret.lba_mid, ret.lba_high) {
            (0xF4, 0x2C) => Ok(SmartStatus::Bad),
            _ => Ok(SmartStatus::Good),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_cdb_verify_layout() {
        let tf = Taskfile{ command: ATA_READ_VERIFY_EXT, count: 256, lba: 0x0000_1234_5678_9ABC, features: 0 };
        let cdb = build_cdb(&tf, Protocol::NonData, false, false, false);
        assert_eq!(cdb[0],0x85);
        assert_eq!(cdb[1],(3<<1)|1);
        assert_eq!(cdb[2],0);
        assert_eq!((cdb[5],cdb[6]),(0x01,0x00));
        // low bytes of each lba register pair
        assert_eq!((cdb[8],cdb[10],cdb[12]),(0xBC,0x9A,0x78));
        // high bytes
        assert_eq!((cdb[7],cdb[9],cdb[11]),(0x56,0x34,0x12));
        assert_eq!(cdb[14],ATA_READ_VERIFY_EXT);
    }

    #[test]
    fn test_cdb_smart_read() {
        let cdb = build_cdb(&Taskfile::smart(SMART_READ_DATA, 0), Protocol::PioIn, true, true, false);
        assert_eq!(cdb[2],0x0E);
        assert_eq!(cdb[4],SMART_READ_DATA);
        assert_eq!(cdb[6],1);
        assert_eq!((cdb[10],cdb[12]),(0x4F,0xC2));
        assert_eq!(cdb[14],ATA_SMART);
    }

    #[test]
    fn test_parse_sense_descriptor() {
        let mut sense = [0u8; 22];
        sense[0] = 0x72;
        sense[7] = 14;
        sense[8] = 0x09;
        sense[9] = 0x0C;
        sense[11] = 0x04; // error: ABRT
        sense[17] = 0xF4;
        sense[19] = 0x2C;
        sense[21] = 0x51; // status: DRDY|DSC|ERR
        let ret = parse_sense(&sense).unwrap();
        assert_eq!(ret.error,0x04);
        assert_eq!((ret.lba_mid,ret.lba_high),(0xF4,0x2C));
        assert_eq!(ret.status & ATA_STATUS_ERR,1);

        assert!(parse_sense(&[0x70, 0, 0, 0, 0, 0, 0, 0]).is_none());
        assert!(parse_sense(&[]).is_none());
    }
}
