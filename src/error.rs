use std::path::PathBuf;

use thiserror::Error;

/// Failure to get a command to the device or its answer back.
#[derive(Debug, Error)]
pub enum DeviceError {
    #[error("{op} on {path}: sense error: {detail}")]
    Sense {
        op: &'static str,
        path: PathBuf,
        detail: String,
    },

    #[error("I/O error while {op} on {path}: {source}")]
    Io {
        op: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot identify {path}: {reason}")]
    Identify { path: PathBuf, reason: String },
}

impl DeviceError {
    pub fn sense(op: &'static str, path: impl Into<PathBuf>, detail: impl Into<String>) -> Self {
        Self::Sense {
            op,
            path: path.into(),
            detail: detail.into(),
        }
    }

    pub fn io(op: &'static str, path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            op,
            path: path.into(),
            source,
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum JobError {
    #[error("device {serial} already runs a job")]
    AlreadyBusy { serial: String },

    #[error("no device with serial {serial}")]
    UnknownDevice { serial: String },

    #[error("cannot start worker thread: {0}")]
    Spawn(String),
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SetupError {
    #[error("no devices found")]
    NoDevices,

    #[error("serial {serial} reported by more than one device")]
    DuplicateSerial { serial: String },
}
