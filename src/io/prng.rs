use std::fs::File;
use std::io::Read;

use anyhow::Context;
use rand_hc::Hc128Rng;
use rand_core::{RngCore, SeedableRng};

type Seed = <Hc128Rng as SeedableRng>::Seed;

pub fn get_random_seed() -> anyhow::Result<Seed> {
    let mut dest = [0;32];
    let mut dev_random = File::open("/dev/urandom").context("open /dev/urandom")?;
    dev_random.read_exact(&mut dest).context("read seed")?;
    Ok(dest)
}

/// HC-128 keystream used as erase data
pub struct Keystream {
    rng: Hc128Rng,
}

impl Keystream {
    pub fn from_seed(seed: Seed) -> Self {
        Self{
            rng: Hc128Rng::from_seed(seed),
        }
    }
    pub fn from_os() -> anyhow::Result<Self> {
        Ok(Self::from_seed(get_random_seed()?))
    }
    pub fn fill(&mut self, dest: &mut [u8]) {
        self.rng.fill_bytes(dest);
    }
}

#[cfg(test)]
mod test {
    use super::{Keystream, get_random_seed};

    #[test]
    fn test_keystream_continues() {
        let mut ks = Keystream::from_seed([1;32]);
        let mut a = [0u8; 64];
        let mut b = [0u8; 64];
        ks.fill(&mut a);
        ks.fill(&mut b);
        assert_ne!(a,b);
    }

    #[test]
    fn test_os_seed() {
        assert!(get_random_seed().is_ok());
    }
}
