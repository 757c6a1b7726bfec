//! Parsing of the `cmap` table.
//!
//! The `cmap` table maps character codes to glyph indices. Only Unicode
//! encodings are considered and only the format 4 (segment mapping to delta
//! values) subtable is decoded; the other recognized formats report
//! themselves as not implemented.

use log::warn;

use crate::binary::read::{ReadBinary, ReadCtxt, ReadFrom};
use crate::binary::{I16Be, U16Be, U32Be};
use crate::error::ParseError;
use crate::size;

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct PlatformId(pub u16);

impl PlatformId {
    pub const UNICODE: PlatformId = PlatformId(0);
    pub const MACINTOSH: PlatformId = PlatformId(1);
    pub const WINDOWS: PlatformId = PlatformId(3);
    pub const CUSTOM: PlatformId = PlatformId(4);
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct EncodingId(pub u16);

impl EncodingId {
    pub const UNICODE_BMP: EncodingId = EncodingId(3);
    pub const UNICODE_FULL: EncodingId = EncodingId(4);
    pub const UNICODE_VARIATION: EncodingId = EncodingId(5);
    pub const UNICODE_FULL_13: EncodingId = EncodingId(6);
}

/// One entry of the `cmap` header's encoding record array.
///
/// Records are only used to locate a subtable during the `Cmap` parse and
/// are discarded afterwards.
pub struct EncodingRecord {
    pub platform_id: u16,
    pub encoding_id: u16,
    pub offset: u32,
}

/// `cmap` table with its selected Unicode subtable decoded.
pub struct Cmap {
    version: u16,
    subtable: Option<CmapSubtable>,
}

/// A decoded `cmap` subtable, tagged by format.
///
/// Formats 6, 10, 12, 13, and 14 are recognized during subtable selection
/// but parsing them raises `ParseError::NotImplemented`.
pub enum CmapSubtable {
    Format4(Format4),
}

/// Format 4: segment mapping to delta values.
pub struct Format4 {
    pub language: u16,
    pub end_codes: Vec<u16>,
    pub start_codes: Vec<u16>,
    pub id_deltas: Vec<i16>,
    pub id_range_offsets: Vec<u16>,
    pub glyph_id_array: Vec<u16>,
}

impl ReadFrom for EncodingRecord {
    type ReadType = (U16Be, U16Be, U32Be);

    fn read_from((platform_id, encoding_id, offset): (u16, u16, u32)) -> Self {
        EncodingRecord {
            platform_id,
            encoding_id,
            offset,
        }
    }
}

impl EncodingRecord {
    /// Unicode-capable records: Unicode platform with a UCS-2/UCS-4 or
    /// variation-sequence encoding.
    fn is_unicode(&self) -> bool {
        self.platform_id == PlatformId::UNICODE.0 && (3..=6).contains(&self.encoding_id)
    }
}

impl ReadBinary for Cmap {
    type HostType<'a> = Cmap;

    fn read<'a>(ctxt: &mut ReadCtxt<'a>) -> Result<Cmap, ParseError> {
        let table = ctxt.scope();
        let version = ctxt.read_u16be()?;
        if version != 0 {
            // A table with an unknown version is carried as invalid rather
            // than rejected outright; `valid` reports false.
            warn!("unknown cmap version {}, no subtable selected", version);
            return Ok(Cmap {
                version,
                subtable: None,
            });
        }
        let num_tables = usize::from(ctxt.read_u16be()?);
        let encoding_records = ctxt.read_array::<EncodingRecord>(num_tables)?;

        let unicode_records: Vec<EncodingRecord> = encoding_records
            .iter()
            .filter(EncodingRecord::is_unicode)
            .collect();
        if unicode_records.is_empty() {
            return Err(ParseError::UnsuitableCmap);
        }

        // Select the first Unicode record whose subtable format is recognized.
        // Records pointing at unrecognized formats are skipped; if none
        // matches the table ends up without a subtable.
        let mut subtable = None;
        for record in unicode_records {
            let subtable_scope = table.offset(usize::try_from(record.offset)?);
            let format = subtable_scope.ctxt().read_u16be()?;
            match format {
                4 | 6 | 10 | 12 | 13 | 14 => {
                    subtable = Some(subtable_scope.read::<CmapSubtable>()?);
                    break;
                }
                _ => continue,
            }
        }

        Ok(Cmap { version, subtable })
    }
}

impl ReadBinary for CmapSubtable {
    type HostType<'a> = CmapSubtable;

    fn read<'a>(ctxt: &mut ReadCtxt<'a>) -> Result<CmapSubtable, ParseError> {
        let format = ctxt.read_u16be()?;
        match format {
            4 => {
                let length = usize::from(ctxt.read_u16be()?);
                let language = ctxt.read_u16be()?;
                let seg_count_x2 = usize::from(ctxt.read_u16be()?);
                ctxt.check((seg_count_x2 & 1) == 0)?;
                let seg_count = seg_count_x2 >> 1;
                let _search_range = ctxt.read_u16be()?;
                let _entry_selector = ctxt.read_u16be()?;
                let _range_shift = ctxt.read_u16be()?;
                let end_codes = ctxt.read_array::<U16Be>(seg_count)?.to_vec();
                let _reserved_pad = ctxt.read_u16be()?;
                let start_codes = ctxt.read_array::<U16Be>(seg_count)?.to_vec();
                let id_deltas = ctxt.read_array::<I16Be>(seg_count)?.to_vec();
                let id_range_offsets = ctxt.read_array::<U16Be>(seg_count)?.to_vec();
                // The rest of the subtable up to `length` is the glyph id array
                ctxt.check(length >= (8 + (4 * seg_count)) * size::U16)?;
                let remaining = length - ((8 + (4 * seg_count)) * size::U16);
                ctxt.check((remaining & 1) == 0)?;
                let num_indices = remaining >> 1;
                let glyph_id_array = ctxt.read_array::<U16Be>(num_indices)?.to_vec();
                Ok(CmapSubtable::Format4(Format4 {
                    language,
                    end_codes,
                    start_codes,
                    id_deltas,
                    id_range_offsets,
                    glyph_id_array,
                }))
            }
            6 | 10 | 12 | 13 | 14 => Err(ParseError::NotImplemented),
            _ => Err(ParseError::BadVersion),
        }
    }
}

impl Cmap {
    /// True when the table version is 0 and a subtable was selected and
    /// reports itself valid.
    pub fn valid(&self) -> bool {
        self.version == 0 && self.subtable.as_ref().map_or(false, CmapSubtable::valid)
    }

    pub fn version(&self) -> u16 {
        self.version
    }

    pub fn subtable(&self) -> Option<&CmapSubtable> {
        self.subtable.as_ref()
    }
}

impl CmapSubtable {
    pub fn valid(&self) -> bool {
        // TODO: validate the decoded segment arrays (ascending end codes,
        // terminal 0xFFFF segment, in-bounds range offsets) and report true
        // once those checks exist. Until then no subtable is considered
        // valid; callers must not gate on this.
        match self {
            CmapSubtable::Format4(_) => false,
        }
    }

    /// Look up the glyph index for the character `ch`.
    pub fn glyph_index(&self, ch: u32) -> Result<Option<u16>, ParseError> {
        match self {
            CmapSubtable::Format4(format4) => format4.glyph_index(ch),
        }
    }
}

impl Format4 {
    pub fn seg_count(&self) -> usize {
        self.start_codes.len()
    }

    /// Segment scan for the glyph index of `ch`.
    ///
    /// A zero result from the idRangeOffset indirection means "missing
    /// glyph" and is returned as such; the idDelta arithmetic is modulo
    /// 65536.
    pub fn glyph_index(&self, ch: u32) -> Result<Option<u16>, ParseError> {
        for i in 0..self.end_codes.len() {
            let end_code = u32::from(self.end_codes[i]);
            let start_code = u32::from(*self.start_codes.get(i).ok_or(ParseError::BadIndex)?);
            if start_code <= ch && ch <= end_code {
                let id_delta = i32::from(*self.id_deltas.get(i).ok_or(ParseError::BadIndex)?);
                let id_range_offset =
                    usize::from(*self.id_range_offsets.get(i).ok_or(ParseError::BadIndex)?);
                if id_range_offset == 0 {
                    let glyph_id = (((ch as i32) + id_delta) as u32) & 0xFFFF;
                    return Ok(Some(glyph_id as u16));
                } else {
                    // The offset is in bytes from the idRangeOffset entry
                    // itself into the trailing glyph id array
                    let glyph_id_offset =
                        id_range_offset + i * 2 + ((ch - start_code) as usize) * 2;
                    if glyph_id_offset >= self.id_range_offsets.len() * 2
                        && (glyph_id_offset & 1) == 0
                    {
                        let index = (glyph_id_offset >> 1) - self.id_range_offsets.len();
                        let glyph_id = *self
                            .glyph_id_array
                            .get(index)
                            .ok_or(ParseError::BadIndex)?;
                        if glyph_id == 0 {
                            return Ok(None);
                        }
                        let glyph_id = ((i32::from(glyph_id) + id_delta) as u32) & 0xFFFF;
                        return Ok(Some(glyph_id as u16));
                    } else {
                        return Err(ParseError::BadIndex);
                    }
                }
            }
        }
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::binary::read::ReadScope;

    fn push_u16(data: &mut Vec<u8>, value: u16) {
        data.extend_from_slice(&value.to_be_bytes());
    }

    fn push_i16(data: &mut Vec<u8>, value: i16) {
        data.extend_from_slice(&value.to_be_bytes());
    }

    fn push_u32(data: &mut Vec<u8>, value: u32) {
        data.extend_from_slice(&value.to_be_bytes());
    }

    // cmap with one Unicode BMP record pointing at a format 4 subtable with
    // segments { 0x41..0x5A, idDelta -64 } and the terminal 0xFFFF segment.
    fn format4_cmap() -> Vec<u8> {
        let mut data = Vec::new();
        push_u16(&mut data, 0); // version
        push_u16(&mut data, 1); // numTables
        push_u16(&mut data, PlatformId::UNICODE.0);
        push_u16(&mut data, EncodingId::UNICODE_BMP.0);
        push_u32(&mut data, 12); // offset: header + one record

        push_u16(&mut data, 4); // format
        push_u16(&mut data, 32); // length: 8 header + 1 pad + 4 * 2 segment words
        push_u16(&mut data, 0); // language
        push_u16(&mut data, 4); // segCountX2
        push_u16(&mut data, 4); // searchRange
        push_u16(&mut data, 1); // entrySelector
        push_u16(&mut data, 0); // rangeShift
        push_u16(&mut data, 0x5A); // endCode[0]
        push_u16(&mut data, 0xFFFF); // endCode[1]
        push_u16(&mut data, 0); // reservedPad
        push_u16(&mut data, 0x41); // startCode[0]
        push_u16(&mut data, 0xFFFF); // startCode[1]
        push_i16(&mut data, -64); // idDelta[0]
        push_i16(&mut data, 1); // idDelta[1]
        push_u16(&mut data, 0); // idRangeOffset[0]
        push_u16(&mut data, 0); // idRangeOffset[1]
        data
    }

    #[test]
    fn read_format4() {
        let data = format4_cmap();
        let cmap = ReadScope::new(&data).read::<Cmap>().unwrap();
        let CmapSubtable::Format4(format4) = cmap.subtable().expect("no subtable selected");
        assert_eq!(format4.seg_count(), 2);
        assert_eq!(format4.start_codes, vec![0x41, 0xFFFF]);
        assert_eq!(format4.end_codes, vec![0x5A, 0xFFFF]);
        assert_eq!(format4.id_deltas, vec![-64, 1]);
        assert!(format4.glyph_id_array.is_empty());
    }

    #[test]
    fn format4_lookup() {
        let data = format4_cmap();
        let cmap = ReadScope::new(&data).read::<Cmap>().unwrap();
        let subtable = cmap.subtable().unwrap();
        // 'A' (0x41) - 64 == glyph 1
        assert_eq!(subtable.glyph_index(u32::from('A')).unwrap(), Some(1));
        assert_eq!(subtable.glyph_index(u32::from('Z')).unwrap(), Some(26));
        assert_eq!(subtable.glyph_index(u32::from(' ')).unwrap(), None);
    }

    // No subtable currently reports itself valid
    #[test]
    fn format4_not_valid() {
        let data = format4_cmap();
        let cmap = ReadScope::new(&data).read::<Cmap>().unwrap();
        assert!(cmap.subtable().is_some());
        assert!(!cmap.valid());
    }

    #[test]
    fn no_unicode_record() {
        let mut data = Vec::new();
        push_u16(&mut data, 0); // version
        push_u16(&mut data, 1); // numTables
        push_u16(&mut data, PlatformId::MACINTOSH.0);
        push_u16(&mut data, 0);
        push_u32(&mut data, 12);
        assert_eq!(
            ReadScope::new(&data).read::<Cmap>().map(|_| ()),
            Err(ParseError::UnsuitableCmap)
        );
    }

    #[test]
    fn recognized_but_unimplemented_format() {
        let mut data = Vec::new();
        push_u16(&mut data, 0); // version
        push_u16(&mut data, 1); // numTables
        push_u16(&mut data, PlatformId::UNICODE.0);
        push_u16(&mut data, EncodingId::UNICODE_FULL.0);
        push_u32(&mut data, 12);
        push_u16(&mut data, 6); // format 6 is recognized but not implemented
        assert_eq!(
            ReadScope::new(&data).read::<Cmap>().map(|_| ()),
            Err(ParseError::NotImplemented)
        );
    }

    #[test]
    fn unrecognized_format_leaves_table_inert() {
        let mut data = Vec::new();
        push_u16(&mut data, 0); // version
        push_u16(&mut data, 1); // numTables
        push_u16(&mut data, PlatformId::UNICODE.0);
        push_u16(&mut data, EncodingId::UNICODE_BMP.0);
        push_u32(&mut data, 12);
        push_u16(&mut data, 0); // format 0 is not selected
        push_u16(&mut data, 262); // length
        push_u16(&mut data, 0); // language
        let cmap = ReadScope::new(&data).read::<Cmap>().unwrap();
        assert!(cmap.subtable().is_none());
        assert!(!cmap.valid());
    }

    #[test]
    fn nonzero_version_is_invalid_not_an_error() {
        let mut data = Vec::new();
        push_u16(&mut data, 1); // version
        push_u16(&mut data, 0); // numTables
        let cmap = ReadScope::new(&data).read::<Cmap>().unwrap();
        assert_eq!(cmap.version(), 1);
        assert!(!cmap.valid());
    }
}
