/// ramp pattern, restarts every 128 bytes
pub fn fill_ramp(buf: &mut [u8]) {
    for (i,b) in buf.iter_mut().enumerate() {
        *b = (i % 128) as u8;
    }
}
