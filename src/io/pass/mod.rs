use maligned::{A4096, align_first};

use crate::io::prng::Keystream;

pub mod random;
pub mod pattern;

/// what an erase pass writes
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EraseFill {
    Zero,
    /// byte `i` of the block holds `i % 128`
    Pattern,
    /// HC-128 keystream, fresh seed per pass
    Random,
}

/// create page-aligned buffer
pub fn create_buf(len: usize) -> Vec<u8> {
    let mut buf = align_first::<_,A4096>(len);
    assert_eq!(buf.capacity(),len);
    buf.resize(len, 0);
    assert_eq!(buf.len(),len);
    assert_eq!(buf.capacity(),len);
    buf
}

/// Block buffer written on every block of one erase pass. The tail block
/// writes a prefix of it.
pub fn pass_buf(fill: EraseFill, len: usize) -> anyhow::Result<Vec<u8>> {
    let mut buf = create_buf(len);
    match fill {
        EraseFill::Zero => {},
        EraseFill::Pattern => pattern::fill_ramp(&mut buf),
        EraseFill::Random => random::fill_random(&mut Keystream::from_os()?, &mut buf),
    }
    Ok(buf)
}

#[cfg(test)]
mod test {
    use super::{EraseFill, pass_buf};

    #[test]
    fn test_pass_buf_fills() {
        let zero = pass_buf(EraseFill::Zero, 4096).unwrap();
        assert!(zero.iter().all(|b| *b == 0));

        let ramp = pass_buf(EraseFill::Pattern, 4096).unwrap();
        assert_eq!(ramp[0],0);
        assert_eq!(ramp[127],127);
        assert_eq!(ramp[128],0);
        assert_eq!(ramp[4095],(4095%128) as u8);
        assert_eq!(ramp.as_ptr() as usize % 4096,0);
    }
}
