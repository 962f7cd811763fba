//! `StackMapTable` frames keyed by label.

use crate::code::{Label, LabelMap, Layout};
use crate::error::{ClassFileError, Result};
use crate::reader::{self, Input, PResult, u1, u2};
use crate::writer::ByteWriter;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VerificationType {
    Top,
    Integer,
    Float,
    Double,
    Long,
    Null,
    UninitializedThis,
    /// `CONSTANT_Class` index.
    Object(u16),
    /// Value created by the `new` instruction at the label.
    Uninitialized(Label),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FrameKind {
    Same,
    SameLocals1StackItem(VerificationType),
    Chop(u8),
    Append(Vec<VerificationType>),
    Full {
        locals: Vec<VerificationType>,
        stack: Vec<VerificationType>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub label: Label,
    pub kind: FrameKind,
}

/// Verification type with a raw `new` offset, before label mapping.
enum RawType {
    Plain(VerificationType),
    Uninitialized(u16),
}

enum RawKind {
    Same,
    SameLocals1StackItem(RawType),
    Chop(u8),
    Append(Vec<RawType>),
    Full {
        locals: Vec<RawType>,
        stack: Vec<RawType>,
    },
}

fn parse_type(input: Input<'_>) -> PResult<'_, RawType> {
    let (input, tag) = u1(input)?;
    let plain = match tag {
        0 => VerificationType::Top,
        1 => VerificationType::Integer,
        2 => VerificationType::Float,
        3 => VerificationType::Double,
        4 => VerificationType::Long,
        5 => VerificationType::Null,
        6 => VerificationType::UninitializedThis,
        7 => {
            let (input, index) = u2(input)?;
            return Ok((input, RawType::Plain(VerificationType::Object(index))));
        }
        8 => {
            let (input, offset) = u2(input)?;
            return Ok((input, RawType::Uninitialized(offset)));
        }
        _ => {
            return Err(nom::Err::Failure(nom::error::Error::new(
                input,
                nom::error::ErrorKind::Tag,
            )));
        }
    };
    Ok((input, RawType::Plain(plain)))
}

fn parse_types(input: Input<'_>, n: usize) -> PResult<'_, Vec<RawType>> {
    reader::repeat(input, n, parse_type)
}

fn parse_frame(input: Input<'_>) -> PResult<'_, (u16, RawKind)> {
    let (input, frame_type) = u1(input)?;
    match frame_type {
        0..=63 => Ok((input, (frame_type as u16, RawKind::Same))),
        64..=127 => {
            let (input, item) = parse_type(input)?;
            Ok((
                input,
                (frame_type as u16 - 64, RawKind::SameLocals1StackItem(item)),
            ))
        }
        247 => {
            let (input, delta) = u2(input)?;
            let (input, item) = parse_type(input)?;
            Ok((input, (delta, RawKind::SameLocals1StackItem(item))))
        }
        248..=250 => {
            let (input, delta) = u2(input)?;
            Ok((input, (delta, RawKind::Chop(251 - frame_type))))
        }
        251 => {
            let (input, delta) = u2(input)?;
            Ok((input, (delta, RawKind::Same)))
        }
        252..=254 => {
            let (input, delta) = u2(input)?;
            let (input, locals) = parse_types(input, (frame_type - 251) as usize)?;
            Ok((input, (delta, RawKind::Append(locals))))
        }
        255 => {
            let (input, delta) = u2(input)?;
            let (input, local_count) = u2(input)?;
            let (input, locals) = parse_types(input, local_count as usize)?;
            let (input, stack_count) = u2(input)?;
            let (input, stack) = parse_types(input, stack_count as usize)?;
            Ok((input, (delta, RawKind::Full { locals, stack })))
        }
        _ => Err(nom::Err::Failure(nom::error::Error::new(
            input,
            nom::error::ErrorKind::Tag,
        ))),
    }
}

fn parse_table(input: Input<'_>) -> PResult<'_, Vec<(u16, RawKind)>> {
    let (input, count) = u2(input)?;
    reader::repeat(input, count as usize, parse_frame)
}

fn resolve(raw: RawType, labels: &mut LabelMap) -> Result<VerificationType> {
    match raw {
        RawType::Plain(plain) => Ok(plain),
        RawType::Uninitialized(offset) => {
            Ok(VerificationType::Uninitialized(labels.at(offset as i64)?))
        }
    }
}

fn resolve_all(raw: Vec<RawType>, labels: &mut LabelMap) -> Result<Vec<VerificationType>> {
    raw.into_iter().map(|t| resolve(t, labels)).collect()
}

/// Decodes a `StackMapTable` payload, mapping offsets to labels.
pub(crate) fn decode(data: &[u8], labels: &mut LabelMap) -> Result<Vec<Frame>> {
    let (_, raw) = parse_table(data).map_err(|e| reader::to_error(data, e))?;

    let mut frames = Vec::with_capacity(raw.len());
    let mut offset: i64 = -1;
    for (delta, kind) in raw {
        offset += delta as i64 + 1;
        let kind = match kind {
            RawKind::Same => FrameKind::Same,
            RawKind::SameLocals1StackItem(item) => {
                FrameKind::SameLocals1StackItem(resolve(item, labels)?)
            }
            RawKind::Chop(k) => FrameKind::Chop(k),
            RawKind::Append(locals) => FrameKind::Append(resolve_all(locals, labels)?),
            RawKind::Full { locals, stack } => FrameKind::Full {
                locals: resolve_all(locals, labels)?,
                stack: resolve_all(stack, labels)?,
            },
        };
        frames.push(Frame {
            label: labels.at(offset)?,
            kind,
        });
    }
    Ok(frames)
}

fn emit_type(ty: &VerificationType, layout: &Layout, out: &mut ByteWriter) -> Result<()> {
    match ty {
        VerificationType::Top => out.emit_u8(0),
        VerificationType::Integer => out.emit_u8(1),
        VerificationType::Float => out.emit_u8(2),
        VerificationType::Double => out.emit_u8(3),
        VerificationType::Long => out.emit_u8(4),
        VerificationType::Null => out.emit_u8(5),
        VerificationType::UninitializedThis => out.emit_u8(6),
        VerificationType::Object(index) => {
            out.emit_u8(7);
            out.emit_u16(*index);
        }
        VerificationType::Uninitialized(label) => {
            out.emit_u8(8);
            out.emit_u16(layout.offset_of(*label)? as u16);
        }
    }
    Ok(())
}

/// Encodes frames against resolved label offsets, using the short forms where they fit.
pub(crate) fn encode(frames: &[Frame], layout: &Layout) -> Result<Vec<u8>> {
    let mut positioned = frames
        .iter()
        .map(|frame| Ok((layout.offset_of(frame.label)?, frame)))
        .collect::<Result<Vec<_>>>()?;
    positioned.sort_by_key(|(offset, _)| *offset);

    let mut out = ByteWriter::new();
    out.emit_u16(positioned.len() as u16);

    let mut previous: i64 = -1;
    for (offset, frame) in positioned {
        let delta = offset as i64 - previous - 1;
        if delta < 0 {
            return Err(ClassFileError::Malformed(format!(
                "two stack map frames at offset {offset}"
            )));
        }
        let delta = delta as u16;
        previous = offset as i64;

        match &frame.kind {
            FrameKind::Same if delta <= 63 => out.emit_u8(delta as u8),
            FrameKind::Same => {
                out.emit_u8(251);
                out.emit_u16(delta);
            }
            FrameKind::SameLocals1StackItem(item) => {
                if delta <= 63 {
                    out.emit_u8(64 + delta as u8);
                } else {
                    out.emit_u8(247);
                    out.emit_u16(delta);
                }
                emit_type(item, layout, &mut out)?;
            }
            FrameKind::Chop(k) => {
                out.emit_u8(251 - k);
                out.emit_u16(delta);
            }
            FrameKind::Append(locals) => {
                out.emit_u8(251 + locals.len() as u8);
                out.emit_u16(delta);
                for local in locals {
                    emit_type(local, layout, &mut out)?;
                }
            }
            FrameKind::Full { locals, stack } => {
                out.emit_u8(255);
                out.emit_u16(delta);
                out.emit_u16(locals.len() as u16);
                for local in locals {
                    emit_type(local, layout, &mut out)?;
                }
                out.emit_u16(stack.len() as u16);
                for item in stack {
                    emit_type(item, layout, &mut out)?;
                }
            }
        }
    }
    Ok(out.into_bytes())
}

#[cfg(test)]
mod tests {
    use crate::code::{CodeBody, Insn};
    use crate::constant::ConstantPool;
    use crate::opcode::*;
    use crate::writer::ByteWriter;

    use super::*;

    fn body_with_frames(pool: &mut ConstantPool) -> Vec<u8> {
        // iload_0; ifeq L; iconst_1; ireturn; L: [same] iconst_0; ireturn
        let code = [0x1a, 0x99, 0x00, 0x05, 0x04, 0xac, 0x03, 0xac];
        let name = pool.add_utf8("StackMapTable").unwrap();

        let mut out = ByteWriter::new();
        out.emit_u16(1);
        out.emit_u16(1);
        out.emit_blob_u32(&code);
        out.emit_u16(0);
        out.emit_u16(1);
        out.emit_u16(name);
        out.emit_blob_u32(&[0x00, 0x01, 0x06]);
        out.into_bytes()
    }

    #[test]
    fn test_frame_moves_with_inserted_code() {
        let mut pool = ConstantPool::new();
        let raw = body_with_frames(&mut pool);
        let mut body = CodeBody::decode(&raw, &pool).unwrap();

        let frames = body.frames.clone().unwrap();
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].kind, FrameKind::Same);

        body.instructions.insert(0, Insn::Op(NOP));
        let encoded = body.encode(&mut pool).unwrap();
        // Frame now sits at offset 7.
        assert_eq!(&encoded[encoded.len() - 3..], &[0x00, 0x01, 0x07]);
    }

    #[test]
    fn test_unchanged_frames_round_trip() {
        let mut pool = ConstantPool::new();
        let raw = body_with_frames(&mut pool);
        let body = CodeBody::decode(&raw, &pool).unwrap();
        assert_eq!(body.encode(&mut pool).unwrap(), raw);
    }

    #[test]
    fn test_full_frame_with_uninitialized() {
        let mut body = CodeBody::new(2, 1);
        let new_site = body.new_label();
        let frame_at = body.new_label();
        body.instructions.extend([
            Insn::Label(new_site),
            Insn::Type { opcode: NEW, index: 2 },
            Insn::Label(frame_at),
            Insn::Op(POP),
            Insn::Op(RETURN),
        ]);
        body.frames = Some(vec![Frame {
            label: frame_at,
            kind: FrameKind::Full {
                locals: vec![VerificationType::Object(2)],
                stack: vec![VerificationType::Uninitialized(new_site)],
            },
        }]);

        let mut pool = ConstantPool::new();
        let encoded = body.encode(&mut pool).unwrap();
        let decoded = CodeBody::decode(&encoded, &pool).unwrap();
        let frames = decoded.frames.unwrap();
        let FrameKind::Full { locals, stack } = &frames[0].kind else {
            panic!("expected full frame");
        };
        assert_eq!(locals, &vec![VerificationType::Object(2)]);
        let VerificationType::Uninitialized(label) = stack[0] else {
            panic!("expected uninitialized entry");
        };
        assert_eq!(decoded.instructions[0], Insn::Label(label));
    }
}
