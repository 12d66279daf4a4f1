//! Bit-exact ARC-4 binary encoding and decoding of compile-time values.
//!
//! Encoding rules:
//! - `bool` is a single byte, `0x80` for true, `0x00` for false; consecutive
//!   booleans inside arrays, tuples and structs are bit-packed MSB-first
//! - `uintN`/`ufixedNxM` are big-endian `n / 8` bytes
//! - static arrays concatenate their elements with no prefix
//! - dynamic arrays prepend a 2-byte big-endian element count
//! - tuples lay out a fixed-size head region, with 2-byte big-endian offsets
//!   pointing into a tail region for dynamic members

use num_bigint::BigUint;
use num_traits::Zero;

use crate::error::CodeError;
use crate::wtypes::Arc4Type;

/// Offsets into the tail region are encoded as u16
const OFFSET_SIZE: usize = 2;
/// Element counts of dynamic arrays are encoded as u16
const LENGTH_SIZE: usize = 2;

/// An untyped compile-time ARC-4 value; `encode` checks it against a type
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Arc4Value {
    Bool(bool),
    UInt(BigUint),
    /// tuple, struct, or array contents
    Sequence(Vec<Arc4Value>),
}

impl Arc4Value {
    pub fn uint(value: u64) -> Self {
        Self::UInt(BigUint::from(value))
    }
}

/// Whether values of this type have no fixed encoded size
pub fn is_dynamic(wtype: &Arc4Type) -> bool {
    static_size(wtype).is_none()
}

/// The encoded size in bytes of a static type; `None` when dynamic
pub fn static_size(wtype: &Arc4Type) -> Option<usize> {
    match wtype {
        Arc4Type::Bool => Some(1),
        Arc4Type::UIntN(u) => Some(u.n as usize / 8),
        Arc4Type::UFixedNxM(u) => Some(u.n as usize / 8),
        Arc4Type::Tuple(t) => sequence_static_size(&t.types),
        Arc4Type::Struct(s) => {
            let types: Vec<Arc4Type> = s.fields.iter().map(|(_, t)| t.clone()).collect();
            sequence_static_size(&types)
        }
        Arc4Type::DynamicArray(_) => None,
        Arc4Type::StaticArray(a) => {
            if matches!(a.element, Arc4Type::Bool) {
                Some(a.size.div_ceil(8))
            } else {
                static_size(&a.element).map(|elem| elem * a.size)
            }
        }
    }
}

// head size with bool bit-packing; None if any member is dynamic
fn sequence_static_size(types: &[Arc4Type]) -> Option<usize> {
    let mut total = 0;
    let mut idx = 0;
    while idx < types.len() {
        if matches!(types[idx], Arc4Type::Bool) {
            let run = bool_run_length(types, idx);
            total += run.div_ceil(8);
            idx += run;
        } else {
            total += static_size(&types[idx])?;
            idx += 1;
        }
    }
    Some(total)
}

fn bool_run_length(types: &[Arc4Type], start: usize) -> usize {
    types[start..]
        .iter()
        .take_while(|t| matches!(t, Arc4Type::Bool))
        .count()
}

/// Encode a value against an ARC-4 type
pub fn encode(wtype: &Arc4Type, value: &Arc4Value) -> Result<Vec<u8>, CodeError> {
    match (wtype, value) {
        (Arc4Type::Bool, Arc4Value::Bool(b)) => Ok(vec![if *b { 0x80 } else { 0x00 }]),
        (Arc4Type::UIntN(u), Arc4Value::UInt(v)) => encode_uint(u.n, v),
        (Arc4Type::UFixedNxM(u), Arc4Value::UInt(v)) => encode_uint(u.n, v),
        (Arc4Type::Tuple(t), Arc4Value::Sequence(values)) => {
            encode_sequence(&t.types, values)
        }
        (Arc4Type::Struct(s), Arc4Value::Sequence(values)) => {
            let types: Vec<Arc4Type> = s.fields.iter().map(|(_, t)| t.clone()).collect();
            encode_sequence(&types, values)
        }
        (Arc4Type::StaticArray(a), Arc4Value::Sequence(values)) => {
            if values.len() != a.size {
                return Err(CodeError::new(
                    format!(
                        "expected {} elements for {}, got {}",
                        a.size,
                        wtype.name(),
                        values.len()
                    ),
                    None,
                ));
            }
            let types = vec![a.element.clone(); values.len()];
            encode_sequence(&types, values)
        }
        (Arc4Type::DynamicArray(a), Arc4Value::Sequence(values)) => {
            if values.len() > u16::MAX as usize {
                return Err(CodeError::new("dynamic array too long to encode", None));
            }
            let mut out = (values.len() as u16).to_be_bytes().to_vec();
            let types = vec![a.element.clone(); values.len()];
            out.extend(encode_sequence(&types, values)?);
            Ok(out)
        }
        _ => Err(CodeError::new(
            format!("cannot encode value as {}", wtype.name()),
            None,
        )),
    }
}

fn encode_uint(n: u32, value: &BigUint) -> Result<Vec<u8>, CodeError> {
    let size = n as usize / 8;
    let raw = value.to_bytes_be();
    if raw.len() > size && !value.is_zero() {
        return Err(CodeError::new(
            format!("value does not fit in {n} bits"),
            None,
        ));
    }
    let mut out = vec![0u8; size];
    out[size - raw.len()..].copy_from_slice(&raw);
    Ok(out)
}

// shared head/tail layout for tuples, structs, and array bodies
fn encode_sequence(types: &[Arc4Type], values: &[Arc4Value]) -> Result<Vec<u8>, CodeError> {
    if types.len() != values.len() {
        return Err(CodeError::new(
            format!("expected {} elements, got {}", types.len(), values.len()),
            None,
        ));
    }

    // head entry: either literal bytes or a pending offset into the tail
    enum Head {
        Fixed(Vec<u8>),
        Offset(usize), // index into tails
    }

    let mut heads = Vec::new();
    let mut tails: Vec<Vec<u8>> = Vec::new();
    let mut idx = 0;
    while idx < types.len() {
        if matches!(types[idx], Arc4Type::Bool) {
            let run = bool_run_length(types, idx);
            let mut packed = vec![0u8; run.div_ceil(8)];
            for (bit, value) in values[idx..idx + run].iter().enumerate() {
                let Arc4Value::Bool(b) = value else {
                    return Err(CodeError::new("expected a bool value", None));
                };
                if *b {
                    packed[bit / 8] |= 0x80 >> (bit % 8);
                }
            }
            heads.push(Head::Fixed(packed));
            idx += run;
        } else if is_dynamic(&types[idx]) {
            heads.push(Head::Offset(tails.len()));
            tails.push(encode(&types[idx], &values[idx])?);
            idx += 1;
        } else {
            heads.push(Head::Fixed(encode(&types[idx], &values[idx])?));
            idx += 1;
        }
    }

    let head_length: usize = heads
        .iter()
        .map(|h| match h {
            Head::Fixed(bytes) => bytes.len(),
            Head::Offset(_) => OFFSET_SIZE,
        })
        .sum();

    // tail offsets are relative to the start of the whole encoding
    let mut tail_offsets = Vec::with_capacity(tails.len());
    let mut running = head_length;
    for tail in &tails {
        tail_offsets.push(running);
        running += tail.len();
    }
    if running > u16::MAX as usize {
        return Err(CodeError::new("encoded value exceeds offset range", None));
    }

    let mut out = Vec::with_capacity(running);
    for head in heads {
        match head {
            Head::Fixed(bytes) => out.extend(bytes),
            Head::Offset(tail_idx) => {
                out.extend((tail_offsets[tail_idx] as u16).to_be_bytes());
            }
        }
    }
    for tail in tails {
        out.extend(tail);
    }
    Ok(out)
}

/// Decode bytes against an ARC-4 type
pub fn decode(wtype: &Arc4Type, data: &[u8]) -> Result<Arc4Value, CodeError> {
    let (value, consumed) = decode_prefix(wtype, data)?;
    if consumed != data.len() {
        return Err(CodeError::new(
            format!("trailing bytes decoding {}", wtype.name()),
            None,
        ));
    }
    Ok(value)
}

fn decode_prefix(wtype: &Arc4Type, data: &[u8]) -> Result<(Arc4Value, usize), CodeError> {
    match wtype {
        Arc4Type::Bool => {
            let byte = *data
                .first()
                .ok_or_else(|| CodeError::new("unexpected end of data decoding bool", None))?;
            Ok((Arc4Value::Bool(byte & 0x80 != 0), 1))
        }
        Arc4Type::UIntN(u) => decode_uint(u.n, data),
        Arc4Type::UFixedNxM(u) => decode_uint(u.n, data),
        Arc4Type::Tuple(t) => decode_sequence(&t.types, data),
        Arc4Type::Struct(s) => {
            let types: Vec<Arc4Type> = s.fields.iter().map(|(_, t)| t.clone()).collect();
            decode_sequence(&types, data)
        }
        Arc4Type::StaticArray(a) => {
            let types = vec![a.element.clone(); a.size];
            decode_sequence(&types, data)
        }
        Arc4Type::DynamicArray(a) => {
            if data.len() < LENGTH_SIZE {
                return Err(CodeError::new(
                    "unexpected end of data decoding array length",
                    None,
                ));
            }
            let count = u16::from_be_bytes([data[0], data[1]]) as usize;
            let types = vec![a.element.clone(); count];
            let (value, consumed) = decode_sequence(&types, &data[LENGTH_SIZE..])?;
            Ok((value, consumed + LENGTH_SIZE))
        }
    }
}

fn decode_uint(n: u32, data: &[u8]) -> Result<(Arc4Value, usize), CodeError> {
    let size = n as usize / 8;
    if data.len() < size {
        return Err(CodeError::new(
            format!("unexpected end of data decoding uint{n}"),
            None,
        ));
    }
    Ok((Arc4Value::UInt(BigUint::from_bytes_be(&data[..size])), size))
}

fn decode_sequence(types: &[Arc4Type], data: &[u8]) -> Result<(Arc4Value, usize), CodeError> {
    let mut values: Vec<Option<Arc4Value>> = vec![None; types.len()];
    let mut dynamic: Vec<(usize, usize)> = Vec::new(); // (member index, tail offset)
    let mut pos = 0;
    let mut idx = 0;
    let eod = || CodeError::new("unexpected end of data decoding tuple", None);

    while idx < types.len() {
        if matches!(types[idx], Arc4Type::Bool) {
            let run = bool_run_length(types, idx);
            let bytes = run.div_ceil(8);
            if data.len() < pos + bytes {
                return Err(eod());
            }
            for bit in 0..run {
                let set = data[pos + bit / 8] & (0x80 >> (bit % 8)) != 0;
                values[idx + bit] = Some(Arc4Value::Bool(set));
            }
            pos += bytes;
            idx += run;
        } else if is_dynamic(&types[idx]) {
            if data.len() < pos + OFFSET_SIZE {
                return Err(eod());
            }
            let offset = u16::from_be_bytes([data[pos], data[pos + 1]]) as usize;
            dynamic.push((idx, offset));
            pos += OFFSET_SIZE;
            idx += 1;
        } else {
            let (value, consumed) = decode_prefix(&types[idx], &data[pos..])?;
            values[idx] = Some(value);
            pos += consumed;
            idx += 1;
        }
    }

    // each tail slice runs to the next member's offset, the last to the end
    let mut end = data.len();
    for &(member, offset) in dynamic.iter().rev() {
        if offset > end {
            return Err(CodeError::new("tail offsets out of order", None));
        }
        let value = decode(&types[member], &data[offset..end])?;
        values[member] = Some(value);
        end = offset;
    }
    let consumed = if dynamic.is_empty() { pos } else { data.len() };

    let values = values
        .into_iter()
        .collect::<Option<Vec<_>>>()
        .ok_or_else(|| CodeError::new("tuple member left undecoded", None))?;
    Ok((Arc4Value::Sequence(values), consumed))
}
