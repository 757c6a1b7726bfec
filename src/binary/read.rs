//! Parse binary data
//!
//! All multi-byte values in TrueType tables are big-endian. This module
//! provides a bounds-checked cursor (`ReadCtxt`) over an immutable window
//! (`ReadScope`) of the source buffer, plus the traits table types use to
//! describe how they are read.

use crate::binary::{I16Be, I8, U16Be, U32Be, U8};
use crate::error::ParseError;
use crate::size;
use std::fmt;
use std::marker::PhantomData;

/// Error raised when a read would pass the end of the data.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct ReadEof {}

#[derive(Copy, Clone, Debug, PartialEq)]
pub struct ReadScope<'a> {
    base: usize,
    data: &'a [u8],
}

#[derive(Clone)]
pub struct ReadCtxt<'a> {
    scope: ReadScope<'a>,
    offset: usize,
}

pub trait ReadBinary {
    type HostType<'a>: Sized;

    fn read<'a>(ctxt: &mut ReadCtxt<'a>) -> Result<Self::HostType<'a>, ParseError>;
}

pub trait ReadBinaryDep {
    type Args<'a>: Copy;
    type HostType<'a>: Sized;

    fn read_dep<'a>(
        ctxt: &mut ReadCtxt<'a>,
        args: Self::Args<'a>,
    ) -> Result<Self::HostType<'a>, ParseError>;
}

/// Fixed-size types that always decode when `SIZE` bytes are available.
pub trait ReadFixedSize {
    type HostType: Sized;

    /// The number of bytes consumed by `read_fixed`.
    const SIZE: usize;

    /// Must consume exactly `SIZE` bytes on success.
    fn read_fixed(ctxt: &mut ReadCtxt<'_>) -> Result<Self::HostType, ReadEof>;
}

/// Record types assembled from a tuple of fixed-size fields.
pub trait ReadFrom {
    type ReadType: ReadFixedSize;
    fn read_from(value: <Self::ReadType as ReadFixedSize>::HostType) -> Self;
}

impl<T> ReadFixedSize for T
where
    T: ReadFrom,
{
    type HostType = T;

    const SIZE: usize = T::ReadType::SIZE;

    fn read_fixed(ctxt: &mut ReadCtxt<'_>) -> Result<T, ReadEof> {
        let value = T::ReadType::read_fixed(ctxt)?;
        Ok(T::read_from(value))
    }
}

impl<T> ReadBinary for T
where
    T: ReadFixedSize,
{
    type HostType<'a> = T::HostType;

    fn read<'a>(ctxt: &mut ReadCtxt<'a>) -> Result<Self::HostType<'a>, ParseError> {
        Ok(T::read_fixed(ctxt)?)
    }
}

impl<T> ReadBinaryDep for T
where
    T: ReadBinary,
{
    type Args<'a> = ();
    type HostType<'a> = T::HostType<'a>;

    fn read_dep<'a>(
        ctxt: &mut ReadCtxt<'a>,
        (): Self::Args<'_>,
    ) -> Result<Self::HostType<'a>, ParseError> {
        T::read(ctxt)
    }
}

/// A lazily decoded array of `length` fixed-size items.
#[derive(Clone)]
pub struct ReadArray<'a, T: ReadFixedSize> {
    scope: ReadScope<'a>,
    length: usize,
    phantom: PhantomData<T>,
}

pub struct ReadArrayIter<'a, T: ReadFixedSize> {
    scope: ReadScope<'a>,
    index: usize,
    length: usize,
    phantom: PhantomData<T>,
}

impl<'a> ReadScope<'a> {
    pub fn new(data: &'a [u8]) -> ReadScope<'a> {
        let base = 0;
        ReadScope { base, data }
    }

    pub fn offset(&self, offset: usize) -> ReadScope<'a> {
        let base = self.base + offset;
        let data = self.data.get(offset..).unwrap_or(&[]);
        ReadScope { base, data }
    }

    pub fn offset_length(&self, offset: usize, length: usize) -> Result<ReadScope<'a>, ParseError> {
        if offset < self.data.len() || length == 0 {
            let data = self.data.get(offset..).unwrap_or(&[]);
            if length <= data.len() {
                let base = self.base + offset;
                let data = &data[0..length];
                Ok(ReadScope { base, data })
            } else {
                Err(ParseError::BadEof)
            }
        } else {
            Err(ParseError::BadOffset)
        }
    }

    pub fn ctxt(&self) -> ReadCtxt<'a> {
        ReadCtxt::new(*self)
    }

    pub fn read<T: ReadBinaryDep<Args<'a> = ()>>(&self) -> Result<T::HostType<'a>, ParseError> {
        self.ctxt().read::<T>()
    }

    pub fn read_dep<T: ReadBinaryDep>(
        &self,
        args: T::Args<'a>,
    ) -> Result<T::HostType<'a>, ParseError> {
        self.ctxt().read_dep::<T>(args)
    }
}

impl<'a> ReadCtxt<'a> {
    /// ReadCtxt is constructed by calling `ReadScope::ctxt`.
    fn new(scope: ReadScope<'a>) -> ReadCtxt<'a> {
        ReadCtxt { scope, offset: 0 }
    }

    pub fn check(&self, cond: bool) -> Result<(), ParseError> {
        match cond {
            true => Ok(()),
            false => Err(ParseError::BadValue),
        }
    }

    /// Check a condition, returning `ParseError::BadIndex` if `false`.
    pub fn check_index(&self, cond: bool) -> Result<(), ParseError> {
        match cond {
            true => Ok(()),
            false => Err(ParseError::BadIndex),
        }
    }

    pub fn scope(&self) -> ReadScope<'a> {
        self.scope.offset(self.offset)
    }

    pub fn read<T: ReadBinaryDep<Args<'a> = ()>>(&mut self) -> Result<T::HostType<'a>, ParseError> {
        T::read_dep(self, ())
    }

    pub fn read_dep<T: ReadBinaryDep>(
        &mut self,
        args: T::Args<'a>,
    ) -> Result<T::HostType<'a>, ParseError> {
        T::read_dep(self, args)
    }

    /// Reports whether the cursor is still within the data.
    ///
    /// A glyph whose `loca` byte range is empty yields a context for which
    /// this is immediately `false`; such glyphs have no outline.
    pub fn bytes_available(&self) -> bool {
        self.offset < self.scope.data.len()
    }

    fn read_bytes<const N: usize>(&mut self) -> Result<[u8; N], ReadEof> {
        let end = self.offset.checked_add(N).ok_or(ReadEof {})?;
        let slice = self.scope.data.get(self.offset..end).ok_or(ReadEof {})?;
        self.offset = end;
        // NOTE(unwrap): slice is exactly N bytes long
        Ok(slice.try_into().unwrap())
    }

    pub fn read_u8(&mut self) -> Result<u8, ReadEof> {
        self.read_bytes::<1>().map(|[byte]| byte)
    }

    pub fn read_i8(&mut self) -> Result<i8, ReadEof> {
        self.read_bytes::<1>().map(|bytes| i8::from_be_bytes(bytes))
    }

    pub fn read_u16be(&mut self) -> Result<u16, ReadEof> {
        self.read_bytes::<2>().map(u16::from_be_bytes)
    }

    pub fn read_i16be(&mut self) -> Result<i16, ReadEof> {
        self.read_bytes::<2>().map(i16::from_be_bytes)
    }

    pub fn read_u32be(&mut self) -> Result<u32, ReadEof> {
        self.read_bytes::<4>().map(u32::from_be_bytes)
    }

    pub fn read_scope(&mut self, length: usize) -> Result<ReadScope<'a>, ReadEof> {
        if let Ok(scope) = self.scope.offset_length(self.offset, length) {
            self.offset += length;
            Ok(scope)
        } else {
            Err(ReadEof {})
        }
    }

    pub fn read_slice(&mut self, length: usize) -> Result<&'a [u8], ReadEof> {
        let scope = self.read_scope(length)?;
        Ok(scope.data)
    }

    pub fn read_array<T: ReadFixedSize>(
        &mut self,
        length: usize,
    ) -> Result<ReadArray<'a, T>, ParseError> {
        let byte_length = length.checked_mul(T::SIZE).ok_or(ParseError::BadValue)?;
        let scope = self.read_scope(byte_length)?;
        Ok(ReadArray {
            scope,
            length,
            phantom: PhantomData,
        })
    }
}

impl<'a, T: ReadFixedSize> ReadArray<'a, T> {
    pub fn len(&self) -> usize {
        self.length
    }

    pub fn is_empty(&self) -> bool {
        self.length == 0
    }

    pub fn get_item(&self, index: usize) -> Option<T::HostType> {
        if index < self.length {
            let scope = self.scope.offset_length(index * T::SIZE, T::SIZE).ok()?;
            let mut ctxt = scope.ctxt();
            T::read_fixed(&mut ctxt).ok()
        } else {
            None
        }
    }

    pub fn last(&self) -> Option<T::HostType> {
        let index = self.length.checked_sub(1)?;
        self.get_item(index)
    }

    pub fn to_vec(&self) -> Vec<T::HostType> {
        self.iter().collect()
    }

    pub fn iter(&self) -> ReadArrayIter<'a, T> {
        ReadArrayIter {
            scope: self.scope,
            index: 0,
            length: self.length,
            phantom: PhantomData,
        }
    }
}

impl<'a, 'b, T: ReadFixedSize> IntoIterator for &'b ReadArray<'a, T> {
    type Item = T::HostType;
    type IntoIter = ReadArrayIter<'a, T>;

    fn into_iter(self) -> ReadArrayIter<'a, T> {
        self.iter()
    }
}

impl<'a, T: ReadFixedSize> Iterator for ReadArrayIter<'a, T> {
    type Item = T::HostType;

    fn next(&mut self) -> Option<T::HostType> {
        if self.index >= self.length {
            return None;
        }
        let scope = self.scope.offset_length(self.index * T::SIZE, T::SIZE).ok()?;
        self.index += 1;
        T::read_fixed(&mut scope.ctxt()).ok()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.length - self.index;
        (remaining, Some(remaining))
    }
}

impl<'a, T: ReadFixedSize> ExactSizeIterator for ReadArrayIter<'a, T> {}

impl ReadFixedSize for U8 {
    type HostType = u8;

    const SIZE: usize = size::U8;

    fn read_fixed(ctxt: &mut ReadCtxt<'_>) -> Result<u8, ReadEof> {
        ctxt.read_u8()
    }
}

impl ReadFixedSize for I8 {
    type HostType = i8;

    const SIZE: usize = size::I8;

    fn read_fixed(ctxt: &mut ReadCtxt<'_>) -> Result<i8, ReadEof> {
        ctxt.read_i8()
    }
}

impl ReadFixedSize for U16Be {
    type HostType = u16;

    const SIZE: usize = size::U16;

    fn read_fixed(ctxt: &mut ReadCtxt<'_>) -> Result<u16, ReadEof> {
        ctxt.read_u16be()
    }
}

impl ReadFixedSize for I16Be {
    type HostType = i16;

    const SIZE: usize = size::I16;

    fn read_fixed(ctxt: &mut ReadCtxt<'_>) -> Result<i16, ReadEof> {
        ctxt.read_i16be()
    }
}

impl ReadFixedSize for U32Be {
    type HostType = u32;

    const SIZE: usize = size::U32;

    fn read_fixed(ctxt: &mut ReadCtxt<'_>) -> Result<u32, ReadEof> {
        ctxt.read_u32be()
    }
}

impl<T1, T2> ReadFixedSize for (T1, T2)
where
    T1: ReadFixedSize,
    T2: ReadFixedSize,
{
    type HostType = (T1::HostType, T2::HostType);

    const SIZE: usize = T1::SIZE + T2::SIZE;

    fn read_fixed(ctxt: &mut ReadCtxt<'_>) -> Result<Self::HostType, ReadEof> {
        let t1 = T1::read_fixed(ctxt)?;
        let t2 = T2::read_fixed(ctxt)?;
        Ok((t1, t2))
    }
}

impl<T1, T2, T3> ReadFixedSize for (T1, T2, T3)
where
    T1: ReadFixedSize,
    T2: ReadFixedSize,
    T3: ReadFixedSize,
{
    type HostType = (T1::HostType, T2::HostType, T3::HostType);

    const SIZE: usize = T1::SIZE + T2::SIZE + T3::SIZE;

    fn read_fixed(ctxt: &mut ReadCtxt<'_>) -> Result<Self::HostType, ReadEof> {
        let t1 = T1::read_fixed(ctxt)?;
        let t2 = T2::read_fixed(ctxt)?;
        let t3 = T3::read_fixed(ctxt)?;
        Ok((t1, t2, t3))
    }
}

impl<'a, T> fmt::Debug for ReadArray<'a, T>
where
    T: ReadFixedSize,
    T::HostType: fmt::Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> Result<(), fmt::Error> {
        f.debug_list().entries(self.iter()).finish()
    }
}
