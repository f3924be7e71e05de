use crate::io::prng::Keystream;

pub fn fill_random(ks: &mut Keystream, buf: &mut [u8]) {
    ks.fill(buf);
}

#[cfg(test)]
mod test {
    use crate::io::prng::Keystream;

    use super::fill_random;

    #[test]
    fn test_random_fill_deterministic_per_seed() {
        let mut a = vec![0u8; 512];
        let mut b = vec![0u8; 512];
        fill_random(&mut Keystream::from_seed([7;32]), &mut a);
        fill_random(&mut Keystream::from_seed([7;32]), &mut b);
        assert_eq!(a,b);
        assert!(a.iter().any(|x| *x != 0));

        fill_random(&mut Keystream::from_seed([8;32]), &mut b);
        assert_ne!(a,b);
    }
}
