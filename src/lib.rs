//! Interactive dashboard that verifies, erases and self-tests ATA disks,
//! one worker thread per disk.

pub mod conf;
pub mod error;
pub mod io;
pub mod job;
pub mod logging;
pub mod lsblk;
pub mod progress;
pub mod ui;
