//! ATA data structures: IDENTIFY DEVICE words and the SMART data and
//! threshold sectors.

use crate::io::dev::{DiskClass, SelfTestStatus};

pub const SECTOR: usize = 512;

const SMART_ENTRIES: usize = 30;
const SMART_ENTRY_LEN: usize = 12;
const SELF_TEST_STATUS_OFFSET: usize = 363;

pub struct Identify {
    words: [u16; 256],
}

impl Identify {
    pub fn parse(buf: &[u8]) -> Option<Self> {
        if buf.len() < SECTOR {
            return None;
        }
        let mut words = [0u16; 256];
        for (w,chunk) in words.iter_mut().zip(buf.chunks_exact(2)) {
            *w = u16::from_le_bytes([chunk[0], chunk[1]]);
        }
        Some(Self{ words })
    }

    fn word(&self, i: usize) -> u16 {
        self.words[i]
    }

    /// ATA strings store the first character in the high byte of each word
    fn string(&self, first: usize, last: usize) -> String {
        self.words[first..last]
            .iter()
            .flat_map(|w| [(w >> 8) as u8, (w & 0xFF) as u8])
            .map(|b| b as char)
            .collect::<String>()
            .trim()
            .to_string()
    }

    pub fn serial(&self) -> String { self.string(10,20) }
    pub fn firmware(&self) -> String { self.string(23,27) }
    pub fn model(&self) -> String { self.string(27,47) }

    pub fn sectors(&self) -> u64 {
        let lba48 = self.word(83) & (1<<10) != 0;
        if lba48 {
            (0..4).fold(0u64, |acc,i| acc | (self.word(100+i) as u64) << (16*i))
        } else {
            self.word(60) as u64 | (self.word(61) as u64) << 16
        }
    }

    fn sector_info_valid(&self) -> bool {
        self.word(106) & 0xC000 == 0x4000
    }

    pub fn logical_sector_size(&self) -> u32 {
        let w = self.word(106);
        if self.sector_info_valid() && w & (1<<12) != 0 {
            // words 117-118 count 16 bit words per logical sector
            let words_per_sector = self.word(117) as u32 | (self.word(118) as u32) << 16;
            if words_per_sector != 0 {
                return words_per_sector * 2;
            }
        }
        SECTOR as u32
    }

    pub fn physical_sector_size(&self) -> u32 {
        let w = self.word(106);
        let logical = self.logical_sector_size();
        if self.sector_info_valid() && w & (1<<13) != 0 {
            logical << (w & 0x0F)
        } else {
            logical
        }
    }

    pub fn class(&self) -> DiskClass {
        match self.word(217) {
            1 => DiskClass::SolidState,
            rpm @ 0x0401..=0xFFFE => DiskClass::Rotational{ rpm },
            _ => DiskClass::Rotational{ rpm: 0 },
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SmartAttribute {
    pub id: u8,
    pub flags: u16,
    pub value: u8,
    pub worst: u8,
    pub raw: [u8; 6],
    pub threshold: u8,
}

impl SmartAttribute {
    pub fn pre_fail(&self) -> bool { self.flags & 0x01 != 0 }
    pub fn online(&self) -> bool { self.flags & 0x02 != 0 }

    /// worst value has dropped below the vendor threshold
    pub fn failing(&self) -> bool { self.worst < self.threshold }

    pub fn raw_value(&self) -> u64 {
        let r = self.raw;
        u64::from_le_bytes([r[0], r[1], r[2], r[3], r[4], r[5], 0, 0])
    }

    pub fn name(&self) -> &'static str {
        attribute_name(self.id)
    }

    pub fn raw_string(&self) -> String {
        match self.id {
            // temperature lives in the low byte, min/max in bytes 2 and 4
            190 | 194 => {
                let (min,max) = (self.raw[2], self.raw[4]);
                if min != 0 || max != 0 {
                    format!("{} (Min/Max {}/{})", self.raw[0], min, max)
                } else {
                    self.raw[0].to_string()
                }
            }
            9 => (self.raw_value() & 0xFFFF_FFFF).to_string(),
            _ => self.raw_value().to_string(),
        }
    }
}

/// Merge the SMART READ DATA and READ THRESHOLDS sectors.
pub fn parse_smart(data: &[u8], thresholds: &[u8]) -> Vec<SmartAttribute> {
    let mut attrs = Vec::new();
    if data.len() < SECTOR || thresholds.len() < SECTOR {
        return attrs;
    }
    for i in 0..SMART_ENTRIES {
        let off = 2 + i*SMART_ENTRY_LEN;
        let e = &data[off..off+SMART_ENTRY_LEN];
        if e[0] == 0 {
            continue;
        }
        let t = &thresholds[off..off+SMART_ENTRY_LEN];
        let threshold = if t[0] == e[0] { t[1] } else { 0 };
        let mut raw = [0u8; 6];
        raw.copy_from_slice(&e[5..11]);
        attrs.push(SmartAttribute{
            id: e[0],
            flags: u16::from_le_bytes([e[1], e[2]]),
            value: e[3],
            worst: e[4],
            raw,
            threshold,
        });
    }
    attrs.sort_by_key(|a| a.id);
    attrs
}

pub fn self_test_status(data: &[u8]) -> Option<SelfTestStatus> {
    data.get(SELF_TEST_STATUS_OFFSET).map(|b| SelfTestStatus(*b))
}

pub fn attribute_name(id: u8) -> &'static str {
    match id {
        1 => "Raw_Read_Error_Rate",
        2 => "Throughput_Performance",
        3 => "Spin_Up_Time",
        4 => "Start_Stop_Count",
        5 => "Reallocated_Sector_Ct",
        7 => "Seek_Error_Rate",
        8 => "Seek_Time_Performance",
        9 => "Power_On_Hours",
        10 => "Spin_Retry_Count",
        11 => "Calibration_Retry_Count",
        12 => "Power_Cycle_Count",
        13 => "Read_Soft_Error_Rate",
        170 => "Available_Reservd_Space",
        171 => "Program_Fail_Count",
        172 => "Erase_Fail_Count",
        173 => "Wear_Leveling_Count",
        174 => "Unexpect_Power_Loss_Ct",
        177 => "Wear_Leveling_Count",
        179 => "Used_Rsvd_Blk_Cnt_Tot",
        181 => "Program_Fail_Cnt_Total",
        182 => "Erase_Fail_Count_Total",
        183 => "Runtime_Bad_Block",
        184 => "End-to-End_Error",
        187 => "Reported_Uncorrect",
        188 => "Command_Timeout",
        189 => "High_Fly_Writes",
        190 => "Airflow_Temperature_Cel",
        191 => "G-Sense_Error_Rate",
        192 => "Power-Off_Retract_Count",
        193 => "Load_Cycle_Count",
        194 => "Temperature_Celsius",
        195 => "Hardware_ECC_Recovered",
        196 => "Reallocated_Event_Count",
        197 => "Current_Pending_Sector",
        198 => "Offline_Uncorrectable",
        199 => "UDMA_CRC_Error_Count",
        200 => "Multi_Zone_Error_Rate",
        220 => "Disk_Shift",
        222 => "Loaded_Hours",
        223 => "Load_Retry_Count",
        224 => "Load_Friction",
        226 => "Load-in_Time",
        231 => "SSD_Life_Left",
        232 => "Available_Reservd_Space",
        233 => "Media_Wearout_Indicator",
        240 => "Head_Flying_Hours",
        241 => "Total_LBAs_Written",
        242 => "Total_LBAs_Read",
        254 => "Free_Fall_Sensor",
        _ => "Unknown_Attribute",
    }
}
