//! End-to-end decoding of a synthetic TrueType font.
//!
//! Builds `cmap`, `loca` and `glyf` tables byte by byte, then follows the
//! full pipeline: character to glyph index through the `cmap`, glyph byte
//! range through the `loca`, contours out of the `glyf`.

use tracery::binary::read::ReadScope;
use tracery::error::ParseError;
use tracery::tables::cmap::Cmap;
use tracery::tables::glyf::{CompositeGlyphFlag, Contour, GlyfTable};
use tracery::tables::loca::LocaTable;
use tracery::tables::IndexToLocFormat;

fn push_u16(data: &mut Vec<u8>, value: u16) {
    data.extend_from_slice(&value.to_be_bytes());
}

fn push_i16(data: &mut Vec<u8>, value: i16) {
    data.extend_from_slice(&value.to_be_bytes());
}

fn push_u32(data: &mut Vec<u8>, value: u32) {
    data.extend_from_slice(&value.to_be_bytes());
}

/// cmap with a single Unicode BMP record: 'A'..'Z' map to glyphs 1..26.
fn build_cmap() -> Vec<u8> {
    let mut data = Vec::new();
    push_u16(&mut data, 0); // version
    push_u16(&mut data, 1); // numTables
    push_u16(&mut data, 0); // platformId: Unicode
    push_u16(&mut data, 3); // encodingId: BMP
    push_u32(&mut data, 12); // offset: header + one record

    push_u16(&mut data, 4); // format
    push_u16(&mut data, 32); // length
    push_u16(&mut data, 0); // language
    push_u16(&mut data, 4); // segCountX2
    push_u16(&mut data, 4); // searchRange
    push_u16(&mut data, 1); // entrySelector
    push_u16(&mut data, 0); // rangeShift
    push_u16(&mut data, 0x5A); // endCode[0]: 'Z'
    push_u16(&mut data, 0xFFFF); // endCode[1]
    push_u16(&mut data, 0); // reservedPad
    push_u16(&mut data, 0x41); // startCode[0]: 'A'
    push_u16(&mut data, 0xFFFF); // startCode[1]
    push_i16(&mut data, -64); // idDelta[0]: 'A' maps to glyph 1
    push_i16(&mut data, 1); // idDelta[1]
    push_u16(&mut data, 0); // idRangeOffset[0]
    push_u16(&mut data, 0); // idRangeOffset[1]
    data
}

/// Simple glyph: a 10 unit square with corners at (0,0) and (10,10).
fn build_square_glyph() -> Vec<u8> {
    let mut data = Vec::new();
    push_i16(&mut data, 1); // numberOfContours
    push_i16(&mut data, 0); // xMin
    push_i16(&mut data, 0); // yMin
    push_i16(&mut data, 10); // xMax
    push_i16(&mut data, 10); // yMax
    push_u16(&mut data, 3); // endPtsOfContours[0]
    push_u16(&mut data, 0); // instructionLength
    data.extend_from_slice(&[
        0x37, // on curve, x short positive, y short positive
        0x37, // on curve, x short positive, y short positive
        0x35, // on curve, x unchanged, y short positive
        0x27, // on curve, x short negative, y short positive
    ]);
    data.extend_from_slice(&[0, 10, 10]); // x deltas
    data.extend_from_slice(&[0, 0, 10, 0]); // y deltas
    data
}

/// Composite glyph referencing `glyph_index` translated by `(dx, dy)`.
fn build_composite_glyph(glyph_index: u16, dx: i16, dy: i16) -> Vec<u8> {
    let mut data = Vec::new();
    push_i16(&mut data, -1); // numberOfContours
    for _ in 0..4 {
        push_i16(&mut data, 0); // bounding box
    }
    push_u16(
        &mut data,
        (CompositeGlyphFlag::ARG_1_AND_2_ARE_WORDS | CompositeGlyphFlag::ARGS_ARE_XY_VALUES)
            .bits(),
    );
    push_u16(&mut data, glyph_index);
    push_i16(&mut data, dx);
    push_i16(&mut data, dy);
    data
}

struct SyntheticFont {
    cmap: Vec<u8>,
    loca: Vec<u8>,
    glyf: Vec<u8>,
    num_glyphs: u16,
}

/// Font with glyph 0 empty (.notdef without an outline), glyphs 1..=26 for
/// 'A'..'Z' where 'A' is a square and 'B' a composite referencing it, and
/// the rest empty.
fn build_font() -> SyntheticFont {
    let square = build_square_glyph();
    let composite = build_composite_glyph(1, 10, -3);

    let mut glyf = Vec::new();
    let mut offsets = vec![0u32; 2]; // glyph 0 is empty: offsets[0] == offsets[1]
    glyf.extend_from_slice(&square);
    offsets.push(glyf.len() as u32); // glyph 1 end
    glyf.extend_from_slice(&composite);
    offsets.push(glyf.len() as u32); // glyph 2 end
    let num_glyphs = 27;
    while offsets.len() < usize::from(num_glyphs) + 1 {
        offsets.push(glyf.len() as u32); // remaining glyphs are empty
    }

    let mut loca = Vec::new();
    for offset in offsets {
        push_u32(&mut loca, offset);
    }

    SyntheticFont {
        cmap: build_cmap(),
        loca,
        glyf,
        num_glyphs,
    }
}

fn decode_glyf(font: &SyntheticFont) -> Result<GlyfTable, ParseError> {
    let loca = ReadScope::new(&font.loca)
        .read_dep::<LocaTable>((font.num_glyphs, IndexToLocFormat::Long))?;
    ReadScope::new(&font.glyf).read_dep::<GlyfTable>(&loca)
}

fn contour_positions(contour: &Contour) -> Vec<(f32, f32)> {
    contour
        .iter()
        .map(|cp| (cp.position.x(), cp.position.y()))
        .collect()
}

#[test]
fn char_to_contours() {
    let font = build_font();
    let cmap = ReadScope::new(&font.cmap).read::<Cmap>().unwrap();
    let subtable = cmap.subtable().expect("no unicode subtable");
    let glyf = decode_glyf(&font).unwrap();

    let glyph_id = subtable.glyph_index(u32::from('A')).unwrap().unwrap();
    assert_eq!(glyph_id, 1);
    assert!(glyf.contains(glyph_id));

    let contours = glyf.contours(glyph_id).unwrap();
    assert_eq!(contours.len(), 1);
    assert_eq!(
        contour_positions(&contours[0]),
        vec![(0., 0.), (10., 0.), (10., 10.), (0., 10.)]
    );
}

#[test]
fn composite_follows_component() {
    let font = build_font();
    let cmap = ReadScope::new(&font.cmap).read::<Cmap>().unwrap();
    let subtable = cmap.subtable().expect("no unicode subtable");
    let glyf = decode_glyf(&font).unwrap();

    let glyph_id = subtable.glyph_index(u32::from('B')).unwrap().unwrap();
    assert_eq!(glyph_id, 2);

    // Glyph 'B' is the square shifted by (10, -3)
    let contours = glyf.contours(glyph_id).unwrap();
    assert_eq!(contours.len(), 1);
    assert_eq!(
        contour_positions(&contours[0]),
        vec![(10., -3.), (20., -3.), (20., 7.), (10., 7.)]
    );
}

#[test]
fn unmapped_char_and_empty_glyph() {
    let font = build_font();
    let cmap = ReadScope::new(&font.cmap).read::<Cmap>().unwrap();
    let subtable = cmap.subtable().unwrap();
    let glyf = decode_glyf(&font).unwrap();

    // Characters outside the segment have no glyph
    assert_eq!(subtable.glyph_index(u32::from(' ')).unwrap(), None);

    // Glyph 0 exists but has no outline
    assert!(glyf.contains(0));
    assert!(glyf.contours(0).unwrap().is_empty());

    // 'C' maps to glyph 3, which has an empty byte range
    let glyph_id = subtable.glyph_index(u32::from('C')).unwrap().unwrap();
    assert_eq!(glyph_id, 3);
    assert!(glyf.contours(glyph_id).unwrap().is_empty());

    // Glyph ids past the end of the table are rejected
    assert_eq!(glyf.contours(font.num_glyphs), Err(ParseError::BadIndex));
}

#[test]
fn glyph_count_matches_loca() {
    let font = build_font();
    let loca = ReadScope::new(&font.loca)
        .read_dep::<LocaTable>((font.num_glyphs, IndexToLocFormat::Long))
        .unwrap();
    let glyf = ReadScope::new(&font.glyf).read_dep::<GlyfTable>(&loca).unwrap();
    assert_eq!(loca.num_glyphs(), usize::from(font.num_glyphs));
    assert_eq!(glyf.num_glyphs(), usize::from(font.num_glyphs));
}
