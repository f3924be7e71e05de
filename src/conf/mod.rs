use std::sync::Arc;
use std::time::Duration;

use anyhow::ensure;

use crate::io::pass::EraseFill;

pub struct Conf {
    /// sectors issued per verify/write command, e.g. 256
    pub sectors_per_block: u64,
    /// a block slower than this counts as a slow sector
    pub slow_threshold: Duration,
    /// slow threshold of the undersized last block of a pass
    pub tail_slow_threshold: Duration,
    /// blocks between two speed/progress samples
    pub sample_interval_blocks: u64,
    /// pause between accepting a job and the first device command
    pub settle_delay: Duration,
    /// self-test status poll interval
    pub self_test_poll: Duration,
    /// dashboard redraw/input tick
    pub tick: Duration,
    pub erase_fill: EraseFill,
    pub quit_enabled: bool,
}

impl Conf {
    pub fn default() -> Self {
        Self {
            sectors_per_block: 256,
            slow_threshold: Duration::from_millis(50),
            tail_slow_threshold: Duration::from_millis(100),
            sample_interval_blocks: 512,
            settle_delay: Duration::from_secs(1),
            self_test_poll: Duration::from_millis(500),
            tick: Duration::from_millis(100),
            erase_fill: EraseFill::Zero,
            quit_enabled: true,
        }
    }
    pub fn validate(&self) -> anyhow::Result<()> {
        ensure!(self.sectors_per_block != 0,"sectors per block must not be zero");
        // ATA sector count field is 16 bit
        ensure!(self.sectors_per_block <= 0xFFFF,"sectors per block {} exceeds 65535",self.sectors_per_block);
        ensure!(self.sample_interval_blocks != 0,"sample interval must not be zero");
        ensure!(!self.self_test_poll.is_zero(),"self-test poll interval must not be zero");
        ensure!(!self.tick.is_zero(),"tick must not be zero");
        Ok(())
    }
}

pub type AConf = Arc<Conf>;

pub fn get_test_config() -> AConf {
    Arc::new(Conf{
        sectors_per_block: 256,
        slow_threshold: Duration::from_millis(50),
        tail_slow_threshold: Duration::from_millis(100),
        sample_interval_blocks: 4,
        settle_delay: Duration::from_millis(0),
        self_test_poll: Duration::from_millis(2),
        tick: Duration::from_millis(10),
        erase_fill: EraseFill::Zero,
        quit_enabled: true,
    })
}

#[cfg(test)]
mod test {
    use std::time::Duration;

    use super::{Conf, get_test_config};

    #[test]
    fn test_default_is_valid() {
        assert!(Conf::default().validate().is_ok());
        assert!(get_test_config().validate().is_ok());
    }

    #[test]
    fn test_rejects_zero_sizes() {
        let mut conf = Conf::default();
        conf.sectors_per_block = 0;
        assert!(conf.validate().is_err());

        let mut conf = Conf::default();
        conf.sectors_per_block = 1<<16;
        assert!(conf.validate().is_err());

        let mut conf = Conf::default();
        conf.self_test_poll = Duration::from_millis(0);
        assert!(conf.validate().is_err());

        let mut conf = Conf::default();
        conf.sample_interval_blocks = 0;
        assert!(conf.validate().is_err());
    }
}
