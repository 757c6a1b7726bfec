//! TrueType table parsing.

pub mod cmap;
pub mod glyf;
pub mod loca;

use crate::binary::read::{ReadBinary, ReadCtxt, ReadFrom};
use crate::binary::U16Be;
use crate::error::ParseError;

/// The F2DOT14 format consists of a signed, 2’s complement integer and an unsigned fraction.
///
/// To compute the actual value, take the integer and add the fraction.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct F2Dot14(u16);

/// The size of the offsets in the `loca` table
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum IndexToLocFormat {
    /// Offsets are 16-bit. The actual local offset divided by 2 is stored.
    Short,
    /// Offsets are 32-bit. The actual local offset is stored.
    Long,
}

impl F2Dot14 {
    pub fn new(value: u16) -> Self {
        F2Dot14(value)
    }
}

impl ReadFrom for F2Dot14 {
    type ReadType = U16Be;

    fn read_from(value: u16) -> Self {
        F2Dot14(value)
    }
}

impl From<F2Dot14> for f32 {
    fn from(value: F2Dot14) -> Self {
        let int: i8 = match value.0 >> 14 {
            0b00 => 0,
            0b01 => 1,
            0b10 => -2,
            0b11 => -1,
            _ => unreachable!(),
        };
        let fraction = value.0 & 0x3FFF;
        f32::from(int) + (f32::from(fraction) / 16384.)
    }
}

impl ReadBinary for IndexToLocFormat {
    type HostType<'a> = Self;

    fn read<'a>(ctxt: &mut ReadCtxt<'a>) -> Result<Self, ParseError> {
        let index_to_loc_format = ctxt.read_i16be()?;

        match index_to_loc_format {
            0 => Ok(IndexToLocFormat::Short),
            1 => Ok(IndexToLocFormat::Long),
            _ => Err(ParseError::BadValue),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::F2Dot14;

    fn assert_close(actual: f32, expected: f32) {
        assert!(
            (actual - expected).abs() < f32::EPSILON,
            "{:?} != {:?}",
            actual,
            expected
        );
    }

    #[test]
    fn test_f2dot14_to_f32() {
        assert_close(f32::from(F2Dot14::new(0x7FFF)), 1.999939);
        assert_close(f32::from(F2Dot14::new(0x7000)), 1.75);
        assert_close(f32::from(F2Dot14::new(0x0001)), 0.000061);
        assert_close(f32::from(F2Dot14::new(0x0000)), 0.0);
        assert_close(f32::from(F2Dot14::new(0xFFFF)), -0.000061);
        assert_close(f32::from(F2Dot14::new(0x8000)), -2.0);
    }
}
