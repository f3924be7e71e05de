use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::Arc;

use anyhow::{Context, ensure};
use log::{info, warn};
use serde_derive::*;

use crate::io::dev::DiskDevice;
use crate::io::sgio::AtaDisk;

#[derive(Deserialize,Debug)]
pub struct Lsblk {
    pub blockdevices: Vec<LsblkBlockDevice>,
}

#[derive(Deserialize,Debug)]
pub struct LsblkBlockDevice {
    pub name: String,
    pub r#type: String,
    pub model: Option<String>,
    pub serial: Option<String>,
    pub tran: Option<String>,
}

impl LsblkBlockDevice {
    /// whole SCSI/SATA disks, the only ones reachable through ATA pass-through
    pub fn is_candidate(&self) -> bool {
        self.r#type == "disk"
            && self.name.len() > 2
            && self.name.starts_with("sd")
            && self.name[2..].chars().all(|c| c.is_ascii_lowercase())
    }

    pub fn dev_path(&self) -> PathBuf {
        Path::new("/dev").join(&self.name)
    }
}

impl Lsblk {
    pub fn retrieve() -> anyhow::Result<Self> {
        let result = Command::new("lsblk")
            .arg("-dJo")
            .arg("name,type,model,serial,tran")
            .output()
            .context("run lsblk")?;

        ensure!(result.status.success(),"lsblk error code {:?}",result.status.code());
        Self::parse(&result.stdout[..])
    }

    pub fn parse(json: &[u8]) -> anyhow::Result<Self> {
        let data: Lsblk = serde_json::from_slice(json).context("parse lsblk output")?;
        Ok(data)
    }

    pub fn candidates(&self) -> Vec<PathBuf> {
        self.blockdevices.iter()
            .filter(|d| d.is_candidate())
            .map(|d| d.dev_path())
            .collect()
    }
}

/// Open every path as an ATA disk, skipping the ones that do not answer IDENTIFY.
pub fn open_disks(paths: &[PathBuf]) -> Vec<Arc<dyn DiskDevice>> {
    let mut disks: Vec<Arc<dyn DiskDevice>> = Vec::new();
    for path in paths {
        match AtaDisk::open(path) {
            Ok(disk) => {
                info!("found {} {} at {}",disk.info().model,disk.info().serial,path.display());
                disks.push(Arc::new(disk));
            }
            Err(e) => warn!("skipping {}: {}",path.display(),e),
        }
    }
    disks
}

pub fn discover() -> anyhow::Result<Vec<Arc<dyn DiskDevice>>> {
    let lsblk = Lsblk::retrieve()?;
    Ok(open_disks(&lsblk.candidates()))
}
