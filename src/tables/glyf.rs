//! Parsing of the `glyf` table.
//!
//! Glyph records are located through the `loca` offsets and decoded into
//! per-glyph contours. Simple glyphs are decoded directly from their
//! flag/coordinate streams; composite glyphs are flattened into simple ones
//! by iteratively inlining the referenced components, then both go through
//! contour synthesis which restores the on-curve midpoints that TrueType
//! omits between adjacent off-curve control points.

use std::iter;

use bitflags::bitflags;
use itertools::Itertools;
use log::warn;
use pathfinder_geometry::vector::Vector2F;
use rustc_hash::FxHashMap;

use crate::binary::read::{ReadBinary, ReadBinaryDep, ReadCtxt, ReadFrom};
use crate::binary::{U16Be, U8};
use crate::error::ParseError;
use crate::tables::loca::LocaTable;
use crate::tables::F2Dot14;

/// Maximum number of passes over the pending composite glyphs before
/// resolution is abandoned.
///
/// Each pass can only fail to make progress when a composite references a
/// glyph that is itself still pending, so a well-formed font resolves in as
/// many passes as its deepest reference chain. Reference cycles and
/// references to nonexistent glyphs never resolve and are caught by this
/// bound.
pub const COMPOSITE_RESOLUTION_LIMIT: usize = 32;

bitflags! {
    #[derive(Debug, Copy, Clone, PartialEq, Eq)]
    #[rustfmt::skip]
    pub struct SimpleGlyphFlag: u8 {
        const ON_CURVE_POINT                       = 0b00000001;
        const X_SHORT_VECTOR                       = 0b00000010;
        const Y_SHORT_VECTOR                       = 0b00000100;
        const REPEAT_FLAG                          = 0b00001000;
        const X_IS_SAME_OR_POSITIVE_X_SHORT_VECTOR = 0b00010000;
        const Y_IS_SAME_OR_POSITIVE_Y_SHORT_VECTOR = 0b00100000;
        // Bits 6 and 7 are reserved: set to 0.
    }
}

bitflags! {
    #[derive(Debug, Copy, Clone, PartialEq, Eq)]
    pub struct CompositeGlyphFlag: u16 {
        /// Bit 0: If this is set, the arguments are 16-bit (uint16 or int16);
        /// otherwise, they are bytes (uint8 or int8).
        const ARG_1_AND_2_ARE_WORDS = 0x0001;
        /// Bit 1: If this is set, the arguments are signed xy values;
        /// otherwise, they are unsigned point numbers.
        const ARGS_ARE_XY_VALUES = 0x0002;
        /// Bit 2: For the xy values if the preceding is true.
        const ROUND_XY_TO_GRID = 0x0004;
        /// Bit 3: This indicates that there is a simple scale for the
        /// component. Otherwise, scale = 1.0.
        const WE_HAVE_A_SCALE = 0x0008;
        /// Bit 5: Indicates at least one more glyph after this one.
        const MORE_COMPONENTS = 0x0020;
        /// Bit 6: The x direction will use a different scale from the y direction.
        const WE_HAVE_AN_X_AND_Y_SCALE = 0x0040;
        /// Bit 7: There is a 2 by 2 transformation that will be used to scale
        /// the component.
        const WE_HAVE_A_TWO_BY_TWO = 0x0080;
        /// Bit 8: Following the last component are instructions for the
        /// composite character.
        const WE_HAVE_INSTRUCTIONS = 0x0100;
        /// Bit 9: If set, this forces the aw and lsb (and rsb) for the
        /// composite to be equal to those from this original glyph.
        const USE_MY_METRICS = 0x0200;
        /// Bit 10: If set, the components of the compound glyph overlap.
        const OVERLAP_COMPOUND = 0x0400;
        /// Bit 11: The composite is designed to have the component offset scaled.
        const SCALED_COMPONENT_OFFSET = 0x0800;
        /// Bit 12: The composite is designed not to have the component offset scaled.
        const UNSCALED_COMPONENT_OFFSET = 0x1000;
        // Bits 4, 13, 14 and 15 are reserved: set to 0.
    }
}

/// `glyf` table decoded to per-glyph contours.
///
/// Every glyph id in `0..num_glyphs` has an entry; glyphs without an outline
/// (an empty `loca` byte range, e.g. the space glyph) have an empty contour
/// set. All composite glyphs have been flattened by the time the table is
/// handed out.
#[derive(Debug, Clone, PartialEq)]
pub struct GlyfTable {
    glyphs: Vec<Vec<Contour>>,
}

/// The points of one closed contour, in drawing order.
pub type Contour = Vec<ControlPoint>;

/// A contour point ready for quadratic Bézier tessellation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ControlPoint {
    pub position: Vector2F,
    pub on_curve: bool,
}

/// A single glyph point with absolute coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Point(pub i16, pub i16);

/// Glyph bounding box from the glyph header.
///
/// Read as part of the header but not carried into the decoded result.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub struct BoundingBox {
    pub x_min: i16,
    pub y_min: i16,
    pub x_max: i16,
    pub y_max: i16,
}

/// A simple glyph: outline defined directly by its point arrays.
///
/// Invariants established by parsing: `flags` and `coordinates` have equal
/// length, every entry of `end_pts_of_contours` is in bounds, and every
/// contour has at least 3 points.
#[derive(Debug, PartialEq, Eq, Clone)]
pub struct SimpleGlyph {
    pub end_pts_of_contours: Vec<u16>,
    pub instructions: Vec<u8>,
    pub flags: Vec<SimpleGlyphFlag>,
    pub coordinates: Vec<Point>,
}

/// A composite glyph: outline defined by referencing other glyphs.
#[derive(Debug, PartialEq, Clone)]
pub struct CompositeGlyph {
    pub components: Vec<CompositeGlyphComponent>,
    pub instructions: Vec<u8>,
}

#[derive(Debug, PartialEq, Clone)]
pub struct CompositeGlyphComponent {
    pub flags: CompositeGlyphFlag,
    pub glyph_index: u16,
    pub argument1: CompositeGlyphArgument,
    pub argument2: CompositeGlyphArgument,
    /// Parsed for format fidelity but not applied when the component is
    /// inlined; only the xy offset in `argument1`/`argument2` is.
    pub scale: Option<CompositeGlyphScale>,
}

#[derive(Debug, PartialEq, Eq, Copy, Clone)]
pub enum CompositeGlyphArgument {
    U8(u8),
    I8(i8),
    U16(u16),
    I16(i16),
}

#[derive(Debug, PartialEq, Copy, Clone)]
pub enum CompositeGlyphScale {
    Scale(F2Dot14),
    XY { x_scale: F2Dot14, y_scale: F2Dot14 },
    Matrix([[F2Dot14; 2]; 2]),
}

/// One record of the `glyf` table, before composite resolution.
#[derive(Debug, PartialEq, Clone)]
enum GlyphRecord {
    Simple(SimpleGlyph),
    Composite(CompositeGlyph),
}

impl ReadBinaryDep for GlyfTable {
    type Args<'a> = &'a LocaTable;
    type HostType<'a> = GlyfTable;

    fn read_dep<'a>(ctxt: &mut ReadCtxt<'a>, loca: &LocaTable) -> Result<GlyfTable, ParseError> {
        if loca.offsets.len() < 2 {
            return Err(ParseError::BadIndex);
        }
        let num_glyphs = loca.offsets.len() - 1;

        // Constructor-scoped maps; composites may reference glyph ids defined
        // later in the table, so all simple glyphs must be collected before
        // any composite is resolved.
        let mut simple_glyphs = FxHashMap::default();
        let mut pending_composites = FxHashMap::default();

        for (glyph_id, (start, end)) in loca.offsets.iter().copied().tuple_windows().enumerate() {
            let glyph_id = u16::try_from(glyph_id)?;
            let start = usize::try_from(start)?;
            let length = usize::try_from(end)?
                .checked_sub(start)
                .ok_or(ParseError::BadOffset)?;
            let mut glyph_ctxt = ctxt.scope().offset_length(start, length)?.ctxt();
            if !glyph_ctxt.bytes_available() {
                // No outline, e.g. the space glyph
                continue;
            }
            match glyph_ctxt.read::<GlyphRecord>()? {
                GlyphRecord::Simple(glyph) => {
                    simple_glyphs.insert(glyph_id, glyph);
                }
                GlyphRecord::Composite(composite) => {
                    pending_composites.insert(glyph_id, composite);
                }
            }
        }

        resolve_composites(&mut simple_glyphs, pending_composites)?;

        let glyphs = (0..num_glyphs)
            .map(|glyph_id| {
                // NOTE(cast): glyph ids were checked to fit u16 above
                match simple_glyphs.remove(&(glyph_id as u16)) {
                    Some(glyph) => glyph_contours(&glyph),
                    None => Vec::new(),
                }
            })
            .collect();

        Ok(GlyfTable { glyphs })
    }
}

impl GlyfTable {
    pub fn num_glyphs(&self) -> usize {
        self.glyphs.len()
    }

    /// Does the table hold an entry for `glyph_id`?
    pub fn contains(&self, glyph_id: u16) -> bool {
        usize::from(glyph_id) < self.glyphs.len()
    }

    /// The contours of `glyph_id`. Empty for glyphs without an outline.
    pub fn contours(&self, glyph_id: u16) -> Result<&[Contour], ParseError> {
        self.glyphs
            .get(usize::from(glyph_id))
            .map(Vec::as_slice)
            .ok_or(ParseError::BadIndex)
    }
}

impl ReadBinary for GlyphRecord {
    type HostType<'a> = GlyphRecord;

    fn read<'a>(ctxt: &mut ReadCtxt<'a>) -> Result<GlyphRecord, ParseError> {
        let number_of_contours = ctxt.read_i16be()?;
        // The bounding box is part of the header but not needed downstream
        let _bounding_box = ctxt.read::<BoundingBox>()?;

        if number_of_contours >= 0 {
            // NOTE(cast): safe as the value was checked to be non-negative
            let glyph = ctxt.read_dep::<SimpleGlyph>(number_of_contours as u16)?;
            Ok(GlyphRecord::Simple(glyph))
        } else {
            let composite = ctxt.read::<CompositeGlyph>()?;
            Ok(GlyphRecord::Composite(composite))
        }
    }
}

impl ReadBinary for BoundingBox {
    type HostType<'a> = Self;

    fn read<'a>(ctxt: &mut ReadCtxt<'a>) -> Result<Self, ParseError> {
        let x_min = ctxt.read_i16be()?;
        let y_min = ctxt.read_i16be()?;
        let x_max = ctxt.read_i16be()?;
        let y_max = ctxt.read_i16be()?;

        Ok(BoundingBox {
            x_min,
            y_min,
            x_max,
            y_max,
        })
    }
}

impl ReadBinaryDep for SimpleGlyph {
    type Args<'a> = u16;
    type HostType<'a> = Self;

    fn read_dep<'a>(
        ctxt: &mut ReadCtxt<'a>,
        number_of_contours: u16,
    ) -> Result<Self, ParseError> {
        let number_of_contours = usize::from(number_of_contours);
        let end_pts_of_contours = ctxt.read_array::<U16Be>(number_of_contours)?.to_vec();
        let instruction_length = ctxt.read::<U16Be>()?;
        let instructions = ctxt.read_slice(usize::from(instruction_length))?.to_vec();

        // end_pts_of_contours stores the index of the end points.
        // Therefore the number of coordinates is the last index + 1
        let number_of_coordinates = end_pts_of_contours
            .last()
            .map_or(0, |&last| usize::from(last) + 1);

        // Read the flags, expanding run-length repeats
        let mut flags = Vec::with_capacity(number_of_coordinates);
        while flags.len() < number_of_coordinates {
            let flag = SimpleGlyphFlag::from_bits(ctxt.read_u8()?).ok_or(ParseError::BadValue)?;
            if flag.is_repeated() {
                let count = usize::from(ctxt.read::<U8>()?) + 1; // + 1 to include the current entry
                flags.extend(iter::repeat(flag).take(count));
            } else {
                flags.push(flag);
            }
        }
        // A repeat run must not carry past the final point
        ctxt.check(flags.len() == number_of_coordinates)?;

        // Read the x coordinates, accumulating deltas. The first point's
        // delta is against (0, 0).
        let mut coordinates = Vec::with_capacity(number_of_coordinates);
        let mut x = 0i16;
        for flag in &flags {
            let delta = if flag.x_is_short() {
                i16::from(ctxt.read_u8()?) * flag.x_short_sign()
            } else if flag.x_is_same_or_positive() {
                0
            } else {
                ctxt.read_i16be()?
            };
            x = x.wrapping_add(delta);
            coordinates.push(Point(x, 0));
        }

        // Read the y coordinates, completing the points
        let mut y = 0i16;
        for (flag, point) in flags.iter().zip(coordinates.iter_mut()) {
            let delta = if flag.y_is_short() {
                i16::from(ctxt.read_u8()?) * flag.y_short_sign()
            } else if flag.y_is_same_or_positive() {
                0
            } else {
                ctxt.read_i16be()?
            };
            y = y.wrapping_add(delta);
            point.1 = y;
        }

        let glyph = SimpleGlyph {
            end_pts_of_contours,
            instructions,
            flags,
            coordinates,
        };
        glyph.validate(ctxt)?;
        Ok(glyph)
    }
}

impl SimpleGlyph {
    pub fn points_count(&self) -> usize {
        self.coordinates.len()
    }

    /// Structural validation after parsing or component inlining.
    fn validate(&self, ctxt: &ReadCtxt<'_>) -> Result<(), ParseError> {
        ctxt.check(self.flags.len() == self.coordinates.len())?;
        let mut prev_end = None;
        for &end in &self.end_pts_of_contours {
            let end = usize::from(end);
            ctxt.check_index(end < self.points_count())?;
            match prev_end {
                // The first contour needs more than 2 points
                None => ctxt.check(end >= 2)?,
                // Each following contour needs at least 3 points of its own
                Some(prev) => ctxt.check(end >= prev + 3)?,
            }
            prev_end = Some(end);
        }
        Ok(())
    }
}

impl ReadBinary for CompositeGlyph {
    type HostType<'a> = Self;

    fn read<'a>(ctxt: &mut ReadCtxt<'a>) -> Result<Self, ParseError> {
        let mut components = Vec::new();
        loop {
            let flags = ctxt.read::<CompositeGlyphFlag>()?;
            let component = ctxt.read_dep::<CompositeGlyphComponent>(flags)?;
            components.push(component);
            if !flags.more_components() {
                break;
            }
        }

        match components.first() {
            // Point-based anchoring of the first component is not supported
            Some(first) if !first.flags.args_are_xy_values() => {
                return Err(ParseError::NotImplemented)
            }
            Some(_) => {}
            None => return Err(ParseError::BadValue),
        }

        // NOTE(unwrap): components is non-empty, checked above
        let instructions = if components.last().unwrap().flags.we_have_instructions() {
            let instruction_length = usize::from(ctxt.read::<U16Be>()?);
            ctxt.read_slice(instruction_length)?.to_vec()
        } else {
            Vec::new()
        };

        Ok(CompositeGlyph {
            components,
            instructions,
        })
    }
}

impl ReadFrom for CompositeGlyphFlag {
    type ReadType = U16Be;

    fn read_from(flag: u16) -> Self {
        CompositeGlyphFlag::from_bits_truncate(flag)
    }
}

impl ReadBinaryDep for CompositeGlyphComponent {
    type Args<'a> = CompositeGlyphFlag;
    type HostType<'a> = Self;

    fn read_dep<'a>(
        ctxt: &mut ReadCtxt<'a>,
        flags: CompositeGlyphFlag,
    ) -> Result<Self, ParseError> {
        let glyph_index = ctxt.read_u16be()?;
        let argument1 = ctxt.read_dep::<CompositeGlyphArgument>(flags)?;
        let argument2 = ctxt.read_dep::<CompositeGlyphArgument>(flags)?;

        let scale = if flags.we_have_a_scale() {
            Some(CompositeGlyphScale::Scale(ctxt.read::<F2Dot14>()?))
        } else if flags.we_have_an_x_and_y_scale() {
            Some(CompositeGlyphScale::XY {
                x_scale: ctxt.read::<F2Dot14>()?,
                y_scale: ctxt.read::<F2Dot14>()?,
            })
        } else if flags.we_have_a_two_by_two() {
            Some(CompositeGlyphScale::Matrix([
                [ctxt.read::<F2Dot14>()?, ctxt.read::<F2Dot14>()?],
                [ctxt.read::<F2Dot14>()?, ctxt.read::<F2Dot14>()?],
            ]))
        } else {
            None
        };

        Ok(CompositeGlyphComponent {
            flags,
            glyph_index,
            argument1,
            argument2,
            scale,
        })
    }
}

impl ReadBinaryDep for CompositeGlyphArgument {
    type Args<'a> = CompositeGlyphFlag;
    type HostType<'a> = Self;

    fn read_dep<'a>(
        ctxt: &mut ReadCtxt<'a>,
        flags: CompositeGlyphFlag,
    ) -> Result<Self, ParseError> {
        let arg = match (flags.arg_1_and_2_are_words(), flags.args_are_xy_values()) {
            (true, true) => CompositeGlyphArgument::I16(ctxt.read_i16be()?),
            (true, false) => CompositeGlyphArgument::U16(ctxt.read_u16be()?),
            (false, true) => CompositeGlyphArgument::I8(ctxt.read_i8()?),
            (false, false) => CompositeGlyphArgument::U8(ctxt.read_u8()?),
        };

        Ok(arg)
    }
}

impl From<CompositeGlyphArgument> for i32 {
    fn from(arg: CompositeGlyphArgument) -> Self {
        match arg {
            CompositeGlyphArgument::U8(value) => i32::from(value),
            CompositeGlyphArgument::I8(value) => i32::from(value),
            CompositeGlyphArgument::U16(value) => i32::from(value),
            CompositeGlyphArgument::I16(value) => i32::from(value),
        }
    }
}

impl SimpleGlyphFlag {
    pub fn is_on_curve(self) -> bool {
        self.contains(Self::ON_CURVE_POINT)
    }

    pub fn x_is_short(self) -> bool {
        self.contains(Self::X_SHORT_VECTOR)
    }

    pub fn y_is_short(self) -> bool {
        self.contains(Self::Y_SHORT_VECTOR)
    }

    pub fn is_repeated(self) -> bool {
        self.contains(Self::REPEAT_FLAG)
    }

    pub fn x_is_same_or_positive(self) -> bool {
        self.contains(Self::X_IS_SAME_OR_POSITIVE_X_SHORT_VECTOR)
    }

    pub fn y_is_same_or_positive(self) -> bool {
        self.contains(Self::Y_IS_SAME_OR_POSITIVE_Y_SHORT_VECTOR)
    }

    pub fn x_short_sign(self) -> i16 {
        if self.x_is_same_or_positive() {
            1
        } else {
            -1
        }
    }

    pub fn y_short_sign(self) -> i16 {
        if self.y_is_same_or_positive() {
            1
        } else {
            -1
        }
    }
}

impl CompositeGlyphFlag {
    pub fn arg_1_and_2_are_words(self) -> bool {
        self.contains(Self::ARG_1_AND_2_ARE_WORDS)
    }

    pub fn args_are_xy_values(self) -> bool {
        self.contains(Self::ARGS_ARE_XY_VALUES)
    }

    pub fn we_have_a_scale(self) -> bool {
        self.contains(Self::WE_HAVE_A_SCALE)
    }

    pub fn we_have_an_x_and_y_scale(self) -> bool {
        self.contains(Self::WE_HAVE_AN_X_AND_Y_SCALE)
    }

    pub fn we_have_a_two_by_two(self) -> bool {
        self.contains(Self::WE_HAVE_A_TWO_BY_TWO)
    }

    pub fn more_components(self) -> bool {
        self.contains(Self::MORE_COMPONENTS)
    }

    pub fn we_have_instructions(self) -> bool {
        self.contains(Self::WE_HAVE_INSTRUCTIONS)
    }
}

/// Drain `pending` into `simple_glyphs` by inlining components, retrying
/// composites whose references are not yet resolved.
///
/// A composite can reference another composite, so resolution is iterative:
/// each pass converts every composite whose references are all available as
/// simple glyphs. If composites remain after `COMPOSITE_RESOLUTION_LIMIT`
/// passes the font contains a reference cycle or a dangling reference.
fn resolve_composites(
    simple_glyphs: &mut FxHashMap<u16, SimpleGlyph>,
    mut pending: FxHashMap<u16, CompositeGlyph>,
) -> Result<(), ParseError> {
    for _pass in 0..COMPOSITE_RESOLUTION_LIMIT {
        if pending.is_empty() {
            break;
        }
        let ready: Vec<u16> = pending
            .iter()
            .filter(|(_, composite)| {
                composite
                    .components
                    .iter()
                    .all(|component| simple_glyphs.contains_key(&component.glyph_index))
            })
            .map(|(&glyph_id, _)| glyph_id)
            .collect();
        for glyph_id in ready {
            if let Some(composite) = pending.remove(&glyph_id) {
                let glyph = inline_components(&composite, simple_glyphs)?;
                simple_glyphs.insert(glyph_id, glyph);
            }
        }
    }

    if pending.is_empty() {
        Ok(())
    } else {
        warn!(
            "{} composite glyphs unresolved after {} passes",
            pending.len(),
            COMPOSITE_RESOLUTION_LIMIT
        );
        Err(ParseError::LimitExceeded)
    }
}

/// Flatten `composite` into a simple glyph by concatenating each referenced
/// component's points with the component's xy offset applied.
///
/// Scale factors are carried on the components but not applied here; see
/// `CompositeGlyphComponent::scale`.
fn inline_components(
    composite: &CompositeGlyph,
    simple_glyphs: &FxHashMap<u16, SimpleGlyph>,
) -> Result<SimpleGlyph, ParseError> {
    let mut glyph = SimpleGlyph {
        end_pts_of_contours: Vec::new(),
        instructions: composite.instructions.clone(),
        flags: Vec::new(),
        coordinates: Vec::new(),
    };

    for component in &composite.components {
        if !component.flags.args_are_xy_values() {
            // Matching anchor points to offset the component is not supported
            return Err(ParseError::NotImplemented);
        }
        let referenced = simple_glyphs
            .get(&component.glyph_index)
            .ok_or(ParseError::BadIndex)?;
        let dx = i16::try_from(i32::from(component.argument1))?;
        let dy = i16::try_from(i32::from(component.argument2))?;

        // Inlined point numbers begin directly after the previous component's
        let base = u16::try_from(glyph.coordinates.len())?;
        for &end in &referenced.end_pts_of_contours {
            let end = base.checked_add(end).ok_or(ParseError::BadValue)?;
            glyph.end_pts_of_contours.push(end);
        }
        glyph.flags.extend_from_slice(&referenced.flags);
        glyph.coordinates.extend(
            referenced
                .coordinates
                .iter()
                .map(|point| Point(point.0.wrapping_add(dx), point.1.wrapping_add(dy))),
        );
    }

    Ok(glyph)
}

/// Convert a decoded simple glyph into drawable contours.
///
/// TrueType outlines omit the on-curve point between two adjacent off-curve
/// control points; it is implicitly at their midpoint and is synthesized
/// here, so every pair of consecutive control points in the result has at
/// most one off-curve point.
fn glyph_contours(glyph: &SimpleGlyph) -> Vec<Contour> {
    let mut contours = Vec::with_capacity(glyph.end_pts_of_contours.len());
    let mut start = 0;
    for &end in &glyph.end_pts_of_contours {
        let end = usize::from(end);
        let points = &glyph.coordinates[start..=end];
        let flags = &glyph.flags[start..=end];

        let mut contour: Contour = Vec::with_capacity(points.len());
        for (&Point(x, y), flag) in points.iter().zip(flags) {
            let current = ControlPoint {
                position: Vector2F::new(f32::from(x), f32::from(y)),
                on_curve: flag.is_on_curve(),
            };
            if let Some(&previous) = contour.last() {
                if !previous.on_curve && !current.on_curve {
                    contour.push(ControlPoint {
                        position: previous.position.lerp(current.position, 0.5),
                        on_curve: true,
                    });
                }
            }
            contour.push(current);
        }
        contours.push(contour);
        start = end + 1;
    }
    contours
}
