//! Method bodies as instruction lists over a label arena.
//!
//! Decoding replaces every byte offset in a `Code` attribute (branch targets,
//! switch tables, exception ranges, debug tables, stack-map frames) with a
//! [`Label`]. Instructions can then be inserted or replaced freely; encoding
//! lays the list out again and resolves labels back to offsets.

use std::collections::{BTreeMap, HashMap, HashSet};

use graft_core::{ClassDescriptor, PrimitiveType};

use crate::class::Attribute;
use crate::constant::ConstantPool;
use crate::error::{ClassFileError, Result};
use crate::frames::{self, Frame};
use crate::opcode::{self, *};
use crate::reader::{self, Input, PResult, bytes, u2, u4};
use crate::writer::ByteWriter;

/// A symbolic position in an instruction list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Label(u32);

impl Label {
    pub fn id(self) -> u32 {
        self.0
    }
}

/// One instruction, or a [`Label`] marking a position.
#[derive(Debug, Clone, PartialEq)]
pub enum Insn {
    Label(Label),
    /// Any opcode without inline operands.
    Op(u8),
    /// `bipush` or `sipush`.
    Push { opcode: u8, value: i16 },
    /// `ldc`, `ldc_w` or `ldc2_w`; the width is chosen when encoding.
    Ldc { index: u16, category2: bool },
    /// Long-form `xload`/`xstore`/`ret`; compact and `wide` forms are chosen when encoding.
    Var { opcode: u8, index: u16 },
    Iinc { index: u16, delta: i16 },
    /// 16-bit branches; `goto`/`jsr` widen automatically when out of range.
    Jump { opcode: u8, target: Label },
    TableSwitch {
        default: Label,
        low: i32,
        high: i32,
        targets: Vec<Label>,
    },
    LookupSwitch {
        default: Label,
        pairs: Vec<(i32, Label)>,
    },
    Field { opcode: u8, index: u16 },
    Method { opcode: u8, index: u16 },
    InvokeInterface { index: u16, count: u8 },
    InvokeDynamic { index: u16 },
    /// `new`, `anewarray`, `checkcast`, `instanceof`.
    Type { opcode: u8, index: u16 },
    NewArray { atype: u8 },
    MultiANewArray { index: u16, dimensions: u8 },
}

impl Insn {
    /// Typed local variable load for a value of type `ty`.
    pub fn load(ty: &ClassDescriptor, index: u16) -> Insn {
        let opcode = match ty.primitive() {
            Some(PrimitiveType::Long) => LLOAD,
            Some(PrimitiveType::Float) => FLOAD,
            Some(PrimitiveType::Double) => DLOAD,
            Some(_) => ILOAD,
            None => ALOAD,
        };
        Insn::Var { opcode, index }
    }

    /// Typed return for a method returning `ty`.
    pub fn ret(ty: &ClassDescriptor) -> Insn {
        let opcode = match ty.primitive() {
            Some(PrimitiveType::Void) => RETURN,
            Some(PrimitiveType::Long) => LRETURN,
            Some(PrimitiveType::Float) => FRETURN,
            Some(PrimitiveType::Double) => DRETURN,
            Some(_) => IRETURN,
            None => ARETURN,
        };
        Insn::Op(opcode)
    }

    /// Smallest instruction that pushes the int constant `value`, if it needs no pool entry.
    pub fn int_const(value: i32) -> Option<Insn> {
        match value {
            -1..=5 => Some(Insn::Op((ICONST_0 as i32 + value) as u8)),
            v if i8::try_from(v).is_ok() => Some(Insn::Push {
                opcode: BIPUSH,
                value: v as i16,
            }),
            v => i16::try_from(v).ok().map(|value| Insn::Push {
                opcode: SIPUSH,
                value,
            }),
        }
    }

    /// Returns the int constant pushed by this instruction, if it is an inline constant.
    pub fn as_int_const(&self) -> Option<i32> {
        match self {
            Insn::Op(op) if (ICONST_M1..=ICONST_5).contains(op) => Some(*op as i32 - ICONST_0 as i32),
            Insn::Push { value, .. } => Some(*value as i32),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TryCatchBlock {
    pub start: Label,
    pub end: Label,
    pub handler: Label,
    /// `CONSTANT_Class` index, or 0 for `finally`.
    pub catch_type: u16,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LineNumber {
    pub start: Label,
    pub line: u16,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LocalVariable {
    pub start: Label,
    pub end: Label,
    pub name_index: u16,
    /// Descriptor index, or signature index in a `LocalVariableTypeTable`.
    pub descriptor_index: u16,
    pub index: u16,
}

/// Decoded `Code` attribute.
#[derive(Debug, Clone, PartialEq)]
pub struct CodeBody {
    pub max_stack: u16,
    pub max_locals: u16,
    pub instructions: Vec<Insn>,
    pub try_catch_blocks: Vec<TryCatchBlock>,
    pub line_numbers: Vec<LineNumber>,
    pub local_variables: Vec<LocalVariable>,
    pub local_variable_types: Vec<LocalVariable>,
    /// `StackMapTable` entries; `None` when the attribute is absent.
    pub frames: Option<Vec<Frame>>,
    /// Code attributes carried through untouched.
    pub attributes: Vec<Attribute>,
    next_label: u32,
}

/// Offset-to-label table used while decoding.
#[derive(Debug, Default)]
pub(crate) struct LabelMap {
    by_offset: BTreeMap<u32, Label>,
    next: u32,
    code_length: u32,
}

impl LabelMap {
    pub(crate) fn at(&mut self, offset: i64) -> Result<Label> {
        if offset < 0 || offset > self.code_length as i64 {
            return Err(ClassFileError::Malformed(format!(
                "code offset {offset} outside method body"
            )));
        }
        let next = &mut self.next;
        Ok(*self.by_offset.entry(offset as u32).or_insert_with(|| {
            let label = Label(*next);
            *next += 1;
            label
        }))
    }
}

/// Resolved positions of a laid-out instruction list.
pub(crate) struct Layout {
    offsets: Vec<u32>,
    labels: HashMap<Label, u32>,
    wide: HashSet<usize>,
    code_length: u32,
}

impl Layout {
    pub(crate) fn offset_of(&self, label: Label) -> Result<u32> {
        self.labels
            .get(&label)
            .copied()
            .ok_or(ClassFileError::UnplacedLabel(label.0))
    }
}

impl CodeBody {
    /// Creates an empty body.
    pub fn new(max_stack: u16, max_locals: u16) -> Self {
        Self {
            max_stack,
            max_locals,
            instructions: Vec::new(),
            try_catch_blocks: Vec::new(),
            line_numbers: Vec::new(),
            local_variables: Vec::new(),
            local_variable_types: Vec::new(),
            frames: None,
            attributes: Vec::new(),
            next_label: 0,
        }
    }

    /// Allocates a fresh label; place it with [`Insn::Label`].
    pub fn new_label(&mut self) -> Label {
        let label = Label(self.next_label);
        self.next_label += 1;
        label
    }

    /// Decodes the payload of a `Code` attribute.
    pub fn decode(info: &[u8], pool: &ConstantPool) -> Result<Self> {
        let (_, raw) = parse_raw_code(info).map_err(|e| reader::to_error(info, e))?;
        let code = raw.code;

        let mut labels = LabelMap {
            code_length: code.len() as u32,
            ..LabelMap::default()
        };

        let mut decoded = Vec::new();
        let mut offset = 0usize;
        while offset < code.len() {
            let (insn, len) = decode_insn(code, offset, &mut labels)?;
            decoded.push((offset as u32, insn));
            offset += len;
        }

        let mut body = CodeBody::new(raw.max_stack, raw.max_locals);

        for (start, end, handler, catch_type) in raw.exception_table {
            body.try_catch_blocks.push(TryCatchBlock {
                start: labels.at(start as i64)?,
                end: labels.at(end as i64)?,
                handler: labels.at(handler as i64)?,
                catch_type,
            });
        }

        for (name_index, data) in raw.attributes {
            match pool.utf8(name_index)? {
                "LineNumberTable" => {
                    let (_, entries) =
                        parse_line_numbers(data).map_err(|e| reader::to_error(data, e))?;
                    for (start_pc, line) in entries {
                        body.line_numbers.push(LineNumber {
                            start: labels.at(start_pc as i64)?,
                            line,
                        });
                    }
                }
                "LocalVariableTable" | "LocalVariableTypeTable" => {
                    let (_, entries) =
                        parse_local_variables(data).map_err(|e| reader::to_error(data, e))?;
                    let mut variables = Vec::with_capacity(entries.len());
                    for [start_pc, length, name_index, descriptor_index, index] in entries {
                        variables.push(LocalVariable {
                            start: labels.at(start_pc as i64)?,
                            end: labels.at(start_pc as i64 + length as i64)?,
                            name_index,
                            descriptor_index,
                            index,
                        });
                    }
                    if pool.utf8(name_index)? == "LocalVariableTable" {
                        body.local_variables = variables;
                    } else {
                        body.local_variable_types = variables;
                    }
                }
                "StackMapTable" => {
                    body.frames = Some(frames::decode(data, &mut labels)?);
                }
                // Type annotations address bytecode offsets we do not remap.
                "RuntimeVisibleTypeAnnotations" | "RuntimeInvisibleTypeAnnotations" => {}
                _ => body.attributes.push(Attribute {
                    name_index,
                    info: data.to_vec(),
                }),
            }
        }

        let boundaries: HashSet<u32> = decoded
            .iter()
            .map(|(offset, _)| *offset)
            .chain(std::iter::once(code.len() as u32))
            .collect();
        if let Some(offset) = labels.by_offset.keys().find(|o| !boundaries.contains(o)) {
            return Err(ClassFileError::Malformed(format!(
                "code offset {offset} is not an instruction boundary"
            )));
        }

        let mut pending = labels.by_offset.iter().peekable();
        body.instructions.reserve(decoded.len() + labels.by_offset.len());
        for (offset, insn) in decoded {
            while let Some((_, label)) = pending.next_if(|(o, _)| **o == offset) {
                body.instructions.push(Insn::Label(*label));
            }
            body.instructions.push(insn);
        }
        for (_, label) in pending {
            body.instructions.push(Insn::Label(*label));
        }

        body.next_label = labels.next;
        Ok(body)
    }

    /// Lays out the instruction list and encodes it as a `Code` attribute payload.
    pub fn encode(&self, pool: &mut ConstantPool) -> Result<Vec<u8>> {
        let layout = self.layout()?;
        if layout.code_length as usize > u16::MAX as usize {
            return Err(ClassFileError::CodeTooLarge(layout.code_length as usize));
        }

        let mut code = ByteWriter::with_capacity(layout.code_length as usize);
        for (i, insn) in self.instructions.iter().enumerate() {
            self.emit(insn, i, &layout, &mut code)?;
        }
        let code = code.into_bytes();

        let mut out = ByteWriter::with_capacity(code.len() + 32);
        out.emit_u16(self.max_stack);
        out.emit_u16(self.max_locals);
        out.emit_blob_u32(&code);

        out.emit_u16(self.try_catch_blocks.len() as u16);
        for block in &self.try_catch_blocks {
            out.emit_u16(layout.offset_of(block.start)? as u16);
            out.emit_u16(layout.offset_of(block.end)? as u16);
            out.emit_u16(layout.offset_of(block.handler)? as u16);
            out.emit_u16(block.catch_type);
        }

        let mut attributes: Vec<(u16, Vec<u8>)> = Vec::new();
        if !self.line_numbers.is_empty() {
            let mut data = ByteWriter::new();
            data.emit_u16(self.line_numbers.len() as u16);
            for entry in &self.line_numbers {
                data.emit_u16(layout.offset_of(entry.start)? as u16);
                data.emit_u16(entry.line);
            }
            attributes.push((pool.add_utf8("LineNumberTable")?, data.into_bytes()));
        }
        for (name, table) in [
            ("LocalVariableTable", &self.local_variables),
            ("LocalVariableTypeTable", &self.local_variable_types),
        ] {
            if table.is_empty() {
                continue;
            }
            let mut data = ByteWriter::new();
            data.emit_u16(table.len() as u16);
            for variable in table {
                let start = layout.offset_of(variable.start)?;
                let end = layout.offset_of(variable.end)?;
                data.emit_u16(start as u16);
                data.emit_u16(end.saturating_sub(start) as u16);
                data.emit_u16(variable.name_index);
                data.emit_u16(variable.descriptor_index);
                data.emit_u16(variable.index);
            }
            attributes.push((pool.add_utf8(name)?, data.into_bytes()));
        }
        if let Some(frames) = self.frames.as_ref().filter(|f| !f.is_empty()) {
            let data = frames::encode(frames, &layout)?;
            attributes.push((pool.add_utf8("StackMapTable")?, data));
        }
        for attribute in &self.attributes {
            attributes.push((attribute.name_index, attribute.info.clone()));
        }

        out.emit_u16(attributes.len() as u16);
        for (name_index, data) in attributes {
            out.emit_u16(name_index);
            out.emit_blob_u32(&data);
        }

        Ok(out.into_bytes())
    }

    /// Assigns offsets, widening `goto`/`jsr` until every branch fits.
    pub(crate) fn layout(&self) -> Result<Layout> {
        let mut wide = HashSet::new();
        loop {
            let mut offsets = Vec::with_capacity(self.instructions.len());
            let mut labels = HashMap::new();
            let mut pc = 0u32;
            for (i, insn) in self.instructions.iter().enumerate() {
                offsets.push(pc);
                if let Insn::Label(label) = insn {
                    labels.insert(*label, pc);
                }
                pc += insn_size(insn, pc, wide.contains(&i));
            }

            let mut changed = false;
            for (i, insn) in self.instructions.iter().enumerate() {
                let Insn::Jump { opcode, target } = insn else {
                    continue;
                };
                if wide.contains(&i) {
                    continue;
                }
                let target = labels
                    .get(target)
                    .copied()
                    .ok_or(ClassFileError::UnplacedLabel(target.0))?;
                let delta = target as i64 - offsets[i] as i64;
                if i16::try_from(delta).is_err() {
                    if *opcode == GOTO || *opcode == JSR {
                        wide.insert(i);
                        changed = true;
                    } else {
                        return Err(ClassFileError::BranchOverflow(delta));
                    }
                }
            }

            if !changed {
                return Ok(Layout {
                    offsets,
                    labels,
                    wide,
                    code_length: pc,
                });
            }
        }
    }

    fn emit(&self, insn: &Insn, i: usize, layout: &Layout, out: &mut ByteWriter) -> Result<()> {
        let pc = layout.offsets[i];
        let relative = |label: Label| -> Result<i32> {
            Ok(layout.offset_of(label)? as i32 - pc as i32)
        };

        match insn {
            Insn::Label(_) => {}
            Insn::Op(op) => out.emit_u8(*op),
            Insn::Push { opcode, value } => {
                out.emit_u8(*opcode);
                if *opcode == BIPUSH {
                    out.emit_u8(*value as i8 as u8);
                } else {
                    out.emit_i16(*value);
                }
            }
            Insn::Ldc { index, category2 } => {
                if *category2 {
                    out.emit_u8(LDC2_W);
                    out.emit_u16(*index);
                } else if *index <= u8::MAX as u16 {
                    out.emit_u8(LDC);
                    out.emit_u8(*index as u8);
                } else {
                    out.emit_u8(LDC_W);
                    out.emit_u16(*index);
                }
            }
            Insn::Var { opcode, index } => {
                if let Some(compact) = opcode::compact_var(*opcode, *index) {
                    out.emit_u8(compact);
                } else if *index <= u8::MAX as u16 {
                    out.emit_u8(*opcode);
                    out.emit_u8(*index as u8);
                } else {
                    out.emit_u8(WIDE);
                    out.emit_u8(*opcode);
                    out.emit_u16(*index);
                }
            }
            Insn::Iinc { index, delta } => {
                if *index <= u8::MAX as u16 && i8::try_from(*delta).is_ok() {
                    out.emit_u8(IINC);
                    out.emit_u8(*index as u8);
                    out.emit_u8(*delta as i8 as u8);
                } else {
                    out.emit_u8(WIDE);
                    out.emit_u8(IINC);
                    out.emit_u16(*index);
                    out.emit_i16(*delta);
                }
            }
            Insn::Jump { opcode, target } => {
                let delta = relative(*target)?;
                if layout.wide.contains(&i) {
                    out.emit_u8(if *opcode == GOTO { GOTO_W } else { JSR_W });
                    out.emit_i32(delta);
                } else {
                    out.emit_u8(*opcode);
                    out.emit_i16(delta as i16);
                }
            }
            Insn::TableSwitch {
                default,
                low,
                high,
                targets,
            } => {
                out.emit_u8(TABLESWITCH);
                for _ in 0..switch_padding(pc) {
                    out.emit_u8(0);
                }
                out.emit_i32(relative(*default)?);
                out.emit_i32(*low);
                out.emit_i32(*high);
                for target in targets {
                    out.emit_i32(relative(*target)?);
                }
            }
            Insn::LookupSwitch { default, pairs } => {
                out.emit_u8(LOOKUPSWITCH);
                for _ in 0..switch_padding(pc) {
                    out.emit_u8(0);
                }
                out.emit_i32(relative(*default)?);
                out.emit_i32(pairs.len() as i32);
                for (key, target) in pairs {
                    out.emit_i32(*key);
                    out.emit_i32(relative(*target)?);
                }
            }
            Insn::Field { opcode, index }
            | Insn::Method { opcode, index }
            | Insn::Type { opcode, index } => {
                out.emit_u8(*opcode);
                out.emit_u16(*index);
            }
            Insn::InvokeInterface { index, count } => {
                out.emit_u8(INVOKEINTERFACE);
                out.emit_u16(*index);
                out.emit_u8(*count);
                out.emit_u8(0);
            }
            Insn::InvokeDynamic { index } => {
                out.emit_u8(INVOKEDYNAMIC);
                out.emit_u16(*index);
                out.emit_u16(0);
            }
            Insn::NewArray { atype } => {
                out.emit_u8(NEWARRAY);
                out.emit_u8(*atype);
            }
            Insn::MultiANewArray { index, dimensions } => {
                out.emit_u8(MULTIANEWARRAY);
                out.emit_u16(*index);
                out.emit_u8(*dimensions);
            }
        }
        Ok(())
    }
}

fn switch_padding(pc: u32) -> u32 {
    (4 - (pc + 1) % 4) % 4
}

fn insn_size(insn: &Insn, pc: u32, wide: bool) -> u32 {
    match insn {
        Insn::Label(_) => 0,
        Insn::Op(_) => 1,
        Insn::Push { opcode, .. } => {
            if *opcode == BIPUSH {
                2
            } else {
                3
            }
        }
        Insn::Ldc { index, category2 } => {
            if !*category2 && *index <= u8::MAX as u16 {
                2
            } else {
                3
            }
        }
        Insn::Var { opcode, index } => {
            if opcode::compact_var(*opcode, *index).is_some() {
                1
            } else if *index <= u8::MAX as u16 {
                2
            } else {
                4
            }
        }
        Insn::Iinc { index, delta } => {
            if *index <= u8::MAX as u16 && i8::try_from(*delta).is_ok() {
                3
            } else {
                6
            }
        }
        Insn::Jump { .. } => {
            if wide {
                5
            } else {
                3
            }
        }
        Insn::TableSwitch { targets, .. } => 1 + switch_padding(pc) + 12 + 4 * targets.len() as u32,
        Insn::LookupSwitch { pairs, .. } => 1 + switch_padding(pc) + 8 + 8 * pairs.len() as u32,
        Insn::Field { .. } | Insn::Method { .. } | Insn::Type { .. } => 3,
        Insn::InvokeInterface { .. } | Insn::InvokeDynamic { .. } => 5,
        Insn::NewArray { .. } => 2,
        Insn::MultiANewArray { .. } => 4,
    }
}

struct RawCode<'a> {
    max_stack: u16,
    max_locals: u16,
    code: &'a [u8],
    exception_table: Vec<(u16, u16, u16, u16)>,
    attributes: Vec<(u16, &'a [u8])>,
}

fn parse_raw_code(input: Input<'_>) -> PResult<'_, RawCode<'_>> {
    let (input, max_stack) = u2(input)?;
    let (input, max_locals) = u2(input)?;
    let (input, code_length) = u4(input)?;
    let (input, code) = bytes(input, code_length as usize)?;
    let (input, table_length) = u2(input)?;
    let (input, exception_table) = reader::repeat(input, table_length as usize, |i| {
        let (i, start) = u2(i)?;
        let (i, end) = u2(i)?;
        let (i, handler) = u2(i)?;
        let (i, catch_type) = u2(i)?;
        Ok((i, (start, end, handler, catch_type)))
    })?;
    let (input, attribute_count) = u2(input)?;
    let (input, attributes) = reader::repeat(input, attribute_count as usize, |i| {
        let (i, name_index) = u2(i)?;
        let (i, len) = u4(i)?;
        let (i, data) = bytes(i, len as usize)?;
        Ok((i, (name_index, data)))
    })?;

    Ok((
        input,
        RawCode {
            max_stack,
            max_locals,
            code,
            exception_table,
            attributes,
        },
    ))
}

fn parse_line_numbers(input: Input<'_>) -> PResult<'_, Vec<(u16, u16)>> {
    let (input, count) = u2(input)?;
    reader::repeat(input, count as usize, |i| {
        let (i, start_pc) = u2(i)?;
        let (i, line) = u2(i)?;
        Ok((i, (start_pc, line)))
    })
}

fn parse_local_variables(input: Input<'_>) -> PResult<'_, Vec<[u16; 5]>> {
    let (input, count) = u2(input)?;
    reader::repeat(input, count as usize, |i| {
        let (i, start_pc) = u2(i)?;
        let (i, length) = u2(i)?;
        let (i, name_index) = u2(i)?;
        let (i, descriptor_index) = u2(i)?;
        let (i, index) = u2(i)?;
        Ok((i, [start_pc, length, name_index, descriptor_index, index]))
    })
}

/// Bounds-checked big-endian reads from the raw code array.
struct CodeCursor<'a> {
    code: &'a [u8],
}

impl CodeCursor<'_> {
    fn u1(&self, at: usize) -> Result<u8> {
        self.code
            .get(at)
            .copied()
            .ok_or(ClassFileError::Truncated(at))
    }

    fn u2(&self, at: usize) -> Result<u16> {
        Ok(u16::from_be_bytes([self.u1(at)?, self.u1(at + 1)?]))
    }

    fn i2(&self, at: usize) -> Result<i16> {
        Ok(self.u2(at)? as i16)
    }

    fn i4(&self, at: usize) -> Result<i32> {
        Ok(i32::from_be_bytes([
            self.u1(at)?,
            self.u1(at + 1)?,
            self.u1(at + 2)?,
            self.u1(at + 3)?,
        ]))
    }
}

/// Decodes the instruction at `offset`, returning it and its encoded length.
fn decode_insn(code: &[u8], offset: usize, labels: &mut LabelMap) -> Result<(Insn, usize)> {
    let cursor = CodeCursor { code };
    let opcode = cursor.u1(offset)?;
    let at = offset as i64;

    if opcode::is_simple(opcode) {
        return Ok((Insn::Op(opcode), 1));
    }
    if let Some((opcode, index)) = opcode::expand_compact_var(opcode) {
        return Ok((Insn::Var { opcode, index }, 1));
    }
    if opcode::is_var(opcode) {
        let index = cursor.u1(offset + 1)? as u16;
        return Ok((Insn::Var { opcode, index }, 2));
    }
    if opcode::is_jump(opcode) {
        let target = labels.at(at + cursor.i2(offset + 1)? as i64)?;
        return Ok((Insn::Jump { opcode, target }, 3));
    }

    let decoded = match opcode {
        BIPUSH => (
            Insn::Push {
                opcode,
                value: cursor.u1(offset + 1)? as i8 as i16,
            },
            2,
        ),
        SIPUSH => (
            Insn::Push {
                opcode,
                value: cursor.i2(offset + 1)?,
            },
            3,
        ),
        LDC => (
            Insn::Ldc {
                index: cursor.u1(offset + 1)? as u16,
                category2: false,
            },
            2,
        ),
        LDC_W | LDC2_W => (
            Insn::Ldc {
                index: cursor.u2(offset + 1)?,
                category2: opcode == LDC2_W,
            },
            3,
        ),
        IINC => (
            Insn::Iinc {
                index: cursor.u1(offset + 1)? as u16,
                delta: cursor.u1(offset + 2)? as i8 as i16,
            },
            3,
        ),
        GOTO_W | JSR_W => {
            let target = labels.at(at + cursor.i4(offset + 1)? as i64)?;
            let opcode = if opcode == GOTO_W { GOTO } else { JSR };
            (Insn::Jump { opcode, target }, 5)
        }
        TABLESWITCH => {
            let base = offset + 1 + switch_padding(offset as u32) as usize;
            let default = labels.at(at + cursor.i4(base)? as i64)?;
            let low = cursor.i4(base + 4)?;
            let high = cursor.i4(base + 8)?;
            if high < low {
                return Err(ClassFileError::Malformed(format!(
                    "tableswitch at {offset} has high < low"
                )));
            }
            let count = (high as i64 - low as i64 + 1) as usize;
            let mut targets = Vec::with_capacity(count.min(code.len()));
            for n in 0..count {
                targets.push(labels.at(at + cursor.i4(base + 12 + 4 * n)? as i64)?);
            }
            let len = base + 12 + 4 * count - offset;
            (
                Insn::TableSwitch {
                    default,
                    low,
                    high,
                    targets,
                },
                len,
            )
        }
        LOOKUPSWITCH => {
            let base = offset + 1 + switch_padding(offset as u32) as usize;
            let default = labels.at(at + cursor.i4(base)? as i64)?;
            let count = cursor.i4(base + 4)?;
            if count < 0 {
                return Err(ClassFileError::Malformed(format!(
                    "lookupswitch at {offset} has negative pair count"
                )));
            }
            let count = count as usize;
            let mut pairs = Vec::with_capacity(count.min(code.len()));
            for n in 0..count {
                let key = cursor.i4(base + 8 + 8 * n)?;
                let target = labels.at(at + cursor.i4(base + 12 + 8 * n)? as i64)?;
                pairs.push((key, target));
            }
            let len = base + 8 + 8 * count - offset;
            (Insn::LookupSwitch { default, pairs }, len)
        }
        GETSTATIC | PUTSTATIC | GETFIELD | PUTFIELD => (
            Insn::Field {
                opcode,
                index: cursor.u2(offset + 1)?,
            },
            3,
        ),
        INVOKEVIRTUAL | INVOKESPECIAL | INVOKESTATIC => (
            Insn::Method {
                opcode,
                index: cursor.u2(offset + 1)?,
            },
            3,
        ),
        INVOKEINTERFACE => (
            Insn::InvokeInterface {
                index: cursor.u2(offset + 1)?,
                count: cursor.u1(offset + 3)?,
            },
            5,
        ),
        INVOKEDYNAMIC => (
            Insn::InvokeDynamic {
                index: cursor.u2(offset + 1)?,
            },
            5,
        ),
        NEW | ANEWARRAY | CHECKCAST | INSTANCEOF => (
            Insn::Type {
                opcode,
                index: cursor.u2(offset + 1)?,
            },
            3,
        ),
        NEWARRAY => (
            Insn::NewArray {
                atype: cursor.u1(offset + 1)?,
            },
            2,
        ),
        MULTIANEWARRAY => (
            Insn::MultiANewArray {
                index: cursor.u2(offset + 1)?,
                dimensions: cursor.u1(offset + 3)?,
            },
            4,
        ),
        WIDE => {
            let inner = cursor.u1(offset + 1)?;
            let index = cursor.u2(offset + 2)?;
            if inner == IINC {
                let delta = cursor.i2(offset + 4)?;
                (Insn::Iinc { index, delta }, 6)
            } else if opcode::is_var(inner) {
                (Insn::Var { opcode: inner, index }, 4)
            } else {
                return Err(ClassFileError::UnknownOpcode {
                    opcode: inner,
                    offset: offset + 1,
                });
            }
        }
        _ => return Err(ClassFileError::UnknownOpcode { opcode, offset }),
    };

    if offset + decoded.1 > code.len() {
        return Err(ClassFileError::Truncated(offset));
    }
    Ok(decoded)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encode_raw(max_stack: u16, max_locals: u16, code: &[u8]) -> Vec<u8> {
        let mut out = ByteWriter::new();
        out.emit_u16(max_stack);
        out.emit_u16(max_locals);
        out.emit_blob_u32(code);
        out.emit_u16(0);
        out.emit_u16(0);
        out.into_bytes()
    }

    #[test]
    fn test_decode_branch_creates_labels() {
        // iload_0; ifeq +5; iconst_1; ireturn; iconst_0; ireturn
        let raw = encode_raw(1, 1, &[0x1a, 0x99, 0x00, 0x05, 0x04, 0xac, 0x03, 0xac]);
        let pool = ConstantPool::new();
        let body = CodeBody::decode(&raw, &pool).unwrap();

        assert_eq!(body.instructions[0], Insn::Var { opcode: ILOAD, index: 0 });
        let Insn::Jump { opcode, target } = &body.instructions[1] else {
            panic!("expected jump, got {:?}", body.instructions[1]);
        };
        assert_eq!(*opcode, IFEQ);
        let placed = body
            .instructions
            .iter()
            .position(|i| *i == Insn::Label(*target))
            .unwrap();
        assert_eq!(body.instructions[placed + 1], Insn::Op(ICONST_0));
    }

    #[test]
    fn test_unchanged_body_reencodes_identically() {
        let code = [0x1a, 0x99, 0x00, 0x05, 0x04, 0xac, 0x03, 0xac];
        let raw = encode_raw(1, 1, &code);
        let mut pool = ConstantPool::new();
        let body = CodeBody::decode(&raw, &pool).unwrap();
        assert_eq!(body.encode(&mut pool).unwrap(), raw);
    }

    #[test]
    fn test_insertion_shifts_branch_offsets() {
        let raw = encode_raw(1, 1, &[0x1a, 0x99, 0x00, 0x05, 0x04, 0xac, 0x03, 0xac]);
        let mut pool = ConstantPool::new();
        let mut body = CodeBody::decode(&raw, &pool).unwrap();

        // Two nops between the branch and its fall-through path.
        body.instructions.insert(2, Insn::Op(NOP));
        body.instructions.insert(2, Insn::Op(NOP));

        let encoded = body.encode(&mut pool).unwrap();
        assert_eq!(
            &encoded[8..8 + 10],
            &[0x1a, 0x99, 0x00, 0x07, 0x00, 0x00, 0x04, 0xac, 0x03, 0xac]
        );
    }

    #[test]
    fn test_far_goto_widens() {
        let mut body = CodeBody::new(0, 0);
        let target = body.new_label();
        body.instructions.push(Insn::Jump { opcode: GOTO, target });
        for _ in 0..40_000 {
            body.instructions.push(Insn::Op(NOP));
        }
        body.instructions.push(Insn::Label(target));
        body.instructions.push(Insn::Op(RETURN));

        let mut pool = ConstantPool::new();
        let encoded = body.encode(&mut pool).unwrap();
        assert_eq!(encoded[8], GOTO_W);
        assert_eq!(i32::from_be_bytes([encoded[9], encoded[10], encoded[11], encoded[12]]), 40_005);
    }

    #[test]
    fn test_far_conditional_branch_fails() {
        let mut body = CodeBody::new(0, 0);
        let target = body.new_label();
        body.instructions.push(Insn::Jump { opcode: IFEQ, target });
        for _ in 0..40_000 {
            body.instructions.push(Insn::Op(NOP));
        }
        body.instructions.push(Insn::Label(target));

        let mut pool = ConstantPool::new();
        assert!(matches!(
            body.encode(&mut pool),
            Err(ClassFileError::BranchOverflow(_))
        ));
    }

    #[test]
    fn test_tableswitch_round_trip() {
        // iload_0; tableswitch (pad 2) default=+20 low=0 high=0 [+20]; return
        let mut code = vec![0x1a, TABLESWITCH, 0x00, 0x00];
        code.extend_from_slice(&19i32.to_be_bytes());
        code.extend_from_slice(&0i32.to_be_bytes());
        code.extend_from_slice(&0i32.to_be_bytes());
        code.extend_from_slice(&19i32.to_be_bytes());
        code.push(RETURN);
        let raw = encode_raw(1, 1, &code);

        let mut pool = ConstantPool::new();
        let body = CodeBody::decode(&raw, &pool).unwrap();
        assert!(matches!(body.instructions[1], Insn::TableSwitch { low: 0, high: 0, .. }));
        assert_eq!(body.encode(&mut pool).unwrap(), raw);
    }

    #[test]
    fn test_wide_forms_decode() {
        // wide iinc 300 by -1000; wide aload 300; areturn
        let raw = encode_raw(
            1,
            301,
            &[WIDE, IINC, 0x01, 0x2c, 0xfc, 0x18, WIDE, ALOAD, 0x01, 0x2c, ARETURN],
        );
        let pool = ConstantPool::new();
        let body = CodeBody::decode(&raw, &pool).unwrap();
        assert_eq!(body.instructions[0], Insn::Iinc { index: 300, delta: -1000 });
        assert_eq!(body.instructions[1], Insn::Var { opcode: ALOAD, index: 300 });
    }

    #[test]
    fn test_int_const_helpers() {
        assert_eq!(Insn::int_const(3), Some(Insn::Op(0x06)));
        assert_eq!(Insn::int_const(-1), Some(Insn::Op(ICONST_M1)));
        assert_eq!(Insn::int_const(100), Some(Insn::Push { opcode: BIPUSH, value: 100 }));
        assert_eq!(Insn::int_const(1000), Some(Insn::Push { opcode: SIPUSH, value: 1000 }));
        assert_eq!(Insn::int_const(100_000), None);
        assert_eq!(Insn::Push { opcode: SIPUSH, value: 1000 }.as_int_const(), Some(1000));
        assert_eq!(Insn::Op(ICONST_M1).as_int_const(), Some(-1));
    }
}
