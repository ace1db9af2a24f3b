// get_padding_size returns the bytes needed to pad len to a 32-bit
// boundary.
pub(crate) fn get_padding_size(len: usize) -> usize {
    if len % 4 == 0 {
        0
    } else {
        4 - (len % 4)
    }
}

// put_padding appends zero padding up to a 32-bit boundary.
pub(crate) fn put_padding(buf: &mut bytes::BytesMut, len: usize) {
    use bytes::BufMut;
    for _ in 0..get_padding_size(len) {
        buf.put_u8(0);
    }
}
