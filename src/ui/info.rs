use size_format::SizeFormatterBinary;

use crate::io::ata::SmartAttribute;
use crate::io::dev::{DevResult, DeviceInfo, DiskClass, SmartStatus};

use super::render::Line;

pub const SMART_HEADER: &str = "ID# ATTRIBUTE NAME             TYPE     UPDATED   VALUE  WORST  THRESH  RAW";

fn field(name: &str, value: impl std::fmt::Display) -> Line {
    Line::plain(format!("{:<20}{}", format!("{}:", name), value))
}

pub fn smart_row(a: &SmartAttribute) -> Line {
    let text = format!("{:>3} {:<24} {:10} {:7}  {}  {}  {}    {}",
        a.id,
        a.name(),
        if a.pre_fail() { "Pre-fail" } else { "Old_age" },
        if a.online() { "Always" } else { "Offline" },
        format!("  {:03}", a.value),
        format!("  {:03}", a.worst),
        format!("  {:03}", a.threshold),
        a.raw_string(),
    );
    if a.failing() { Line::alert(text) } else { Line::plain(text) }
}

/// Identity block followed by the SMART table of one device.
pub fn info_lines(info: &DeviceInfo, smart: &DevResult<Vec<SmartAttribute>>, status: &DevResult<SmartStatus>) -> Vec<Line> {
    let bytes = info.capacity_bytes();
    let mut lines = vec![
        Line::plain(""),
        field("Device", info.path.display()),
        field("Model", &info.model),
        field("Firmware", &info.firmware),
        field("Serial", &info.serial),
        field("Sectors", info.sectors),
        field("Size", format!("{} Gb ({}B)", info.capacity_gb(), SizeFormatterBinary::new(bytes))),
    ];
    match info.class {
        DiskClass::SolidState => lines.push(field("Type", "SSD")),
        DiskClass::Rotational{ rpm } => {
            lines.push(field("Type", "HDD"));
            if rpm > 1 {
                lines.push(field("RPM", rpm));
            }
        }
    }
    lines.push(field("log. sector size", format!("{} bytes", info.logical_sector_size)));
    lines.push(field("phys. sector size", format!("{} bytes", info.physical_sector_size)));

    lines.push(Line::plain(""));
    lines.push(Line::plain("SMART VALUES:"));
    lines.push(Line::plain(SMART_HEADER));
    match smart {
        Ok(attrs) => lines.extend(attrs.iter().map(smart_row)),
        Err(e) => lines.push(Line::alert(format!("SMART read failed: {}", e))),
    }
    match status {
        Ok(SmartStatus::Good) => {}
        Ok(SmartStatus::Bad) => lines.push(Line::alert("SMART STATUS BAD!")),
        Err(e) => lines.push(Line::alert(format!("SMART status unknown: {}", e))),
    }
    lines.push(Line::plain(""));
    lines.push(Line::plain("Press any key"));
    lines
}
