// Serial number arithmetic (RFC 1982) over 32- and 16-bit sequence
// spaces, used for TSN and SSN comparisons across wraparound.

pub(crate) fn sna32lt(i1: u32, i2: u32) -> bool {
    (i1 < i2 && i2 - i1 < 1 << 31) || (i1 > i2 && i1 - i2 > 1 << 31)
}

pub(crate) fn sna32lte(i1: u32, i2: u32) -> bool {
    i1 == i2 || sna32lt(i1, i2)
}

pub(crate) fn sna32gt(i1: u32, i2: u32) -> bool {
    (i1 < i2 && i2 - i1 >= 1 << 31) || (i1 > i2 && i1 - i2 <= 1 << 31)
}

pub(crate) fn sna32gte(i1: u32, i2: u32) -> bool {
    i1 == i2 || sna32gt(i1, i2)
}

pub(crate) fn sna16lt(i1: u16, i2: u16) -> bool {
    (i1 < i2 && i2 - i1 < 1 << 15) || (i1 > i2 && i1 - i2 > 1 << 15)
}

pub(crate) fn sna16lte(i1: u16, i2: u16) -> bool {
    i1 == i2 || sna16lt(i1, i2)
}

pub(crate) fn sna16gt(i1: u16, i2: u16) -> bool {
    (i1 < i2 && i2 - i1 >= 1 << 15) || (i1 > i2 && i1 - i2 <= 1 << 15)
}

#[cfg(test)]
mod util_test {
    use super::*;

    #[test]
    fn test_serial_number_arithmetic_32() {
        assert!(sna32lt(1, 2));
        assert!(sna32lt(u32::MAX, 0), "wraps");
        assert!(!sna32lt(0, u32::MAX));
        assert!(sna32gt(0, u32::MAX));
        assert!(sna32lte(5, 5));
        assert!(sna32gte(5, 5));
    }

    #[test]
    fn test_serial_number_arithmetic_16() {
        assert!(sna16lt(1, 2));
        assert!(sna16lt(u16::MAX, 0));
        assert!(sna16gt(0, u16::MAX));
        assert!(sna16lte(7, 7));
    }
}
