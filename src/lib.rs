#![warn(rust_2018_idioms)]

//! Decode TrueType `cmap` and `glyf` tables into drawable glyph contours.
//!
//! The entry points are [`tables::cmap::Cmap`] for the character to glyph
//! index mapping and [`tables::glyf::GlyfTable`] for glyph outlines. The
//! `glyf` decoder flattens composite glyphs into simple ones and converts
//! the raw point streams into per-contour control points suitable for
//! quadratic Bézier tessellation.
//!
//! The caller is expected to extract the raw `cmap`/`loca`/`glyf` byte
//! ranges from the font container; no file handling lives here.

/// Reading of binary data.
pub mod binary;
pub mod error;
pub mod size;
pub mod tables;

pub use pathfinder_geometry;
