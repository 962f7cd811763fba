//! Nom combinators for the binary class-file format.

use nom::{
    IResult, Parser,
    bytes::complete::take,
    number::complete::{be_i32, be_u8, be_u16, be_u32},
};

use crate::error::ClassFileError;

pub(crate) type Input<'a> = &'a [u8];
pub(crate) type PResult<'a, T> = IResult<Input<'a>, T>;

pub(crate) fn u1(input: Input<'_>) -> PResult<'_, u8> {
    be_u8(input)
}

pub(crate) fn u2(input: Input<'_>) -> PResult<'_, u16> {
    be_u16(input)
}

pub(crate) fn u4(input: Input<'_>) -> PResult<'_, u32> {
    be_u32(input)
}

pub(crate) fn i4(input: Input<'_>) -> PResult<'_, i32> {
    be_i32(input)
}

pub(crate) fn bytes(input: Input<'_>, len: usize) -> PResult<'_, &[u8]> {
    take(len).parse(input)
}

/// Parses `n` items with `item`.
pub(crate) fn repeat<'a, T>(
    mut input: Input<'a>,
    n: usize,
    mut item: impl FnMut(Input<'a>) -> PResult<'a, T>,
) -> PResult<'a, Vec<T>> {
    let mut out = Vec::with_capacity(n);
    for _ in 0..n {
        let (rest, value) = item(input)?;
        out.push(value);
        input = rest;
    }
    Ok((input, out))
}

/// Converts a nom failure into a class-file error positioned within `original`.
pub(crate) fn to_error(original: &[u8], err: nom::Err<nom::error::Error<Input<'_>>>) -> ClassFileError {
    match err {
        nom::Err::Incomplete(_) => ClassFileError::Truncated(original.len()),
        nom::Err::Error(e) | nom::Err::Failure(e) => {
            ClassFileError::Truncated(original.len() - e.input.len())
        }
    }
}
