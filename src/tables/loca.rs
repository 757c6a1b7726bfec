//! Parsing of the `loca` table.
//!
//! The indexToLoc table stores the offsets to the locations of the glyphs in
//! the font, relative to the beginning of the `glyf` table.

use crate::binary::read::{ReadBinaryDep, ReadCtxt};
use crate::binary::{U16Be, U32Be};
use crate::error::ParseError;
use crate::tables::IndexToLocFormat;

/// `loca` table
///
/// Holds `num_glyphs + 1` byte offsets into the `glyf` table. The range for
/// glyph `i` is `offsets[i]..offsets[i + 1]`; an empty range means the glyph
/// has no outline.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LocaTable {
    pub offsets: Vec<u32>,
}

impl ReadBinaryDep for LocaTable {
    type Args<'a> = (u16, IndexToLocFormat);
    type HostType<'a> = LocaTable;

    /// Read a `loca` table from `ctxt`
    ///
    /// * `num_glyphs` is the number of glyphs in the font, from the `maxp` table.
    /// * `index_to_loc_format` specifies whether the stored offsets are short
    ///   or long, from the `head` table.
    fn read_dep<'a>(
        ctxt: &mut ReadCtxt<'a>,
        (num_glyphs, index_to_loc_format): (u16, IndexToLocFormat),
    ) -> Result<LocaTable, ParseError> {
        let count = usize::from(num_glyphs) + 1;
        let offsets = match index_to_loc_format {
            // The stored value is the actual offset divided by 2
            IndexToLocFormat::Short => ctxt
                .read_array::<U16Be>(count)?
                .iter()
                .map(|offset| u32::from(offset) * 2)
                .collect(),
            IndexToLocFormat::Long => ctxt.read_array::<U32Be>(count)?.to_vec(),
        };

        Ok(LocaTable { offsets })
    }
}

impl LocaTable {
    pub fn num_glyphs(&self) -> usize {
        self.offsets.len().saturating_sub(1)
    }
}
