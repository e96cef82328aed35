//! Values observed in a memory image

use super::memory::Memory;
use super::types::{Field, ScalarKind, ScalarType, StructType, Type};
use super::EvalError;

/// Elements shown before an array rendering is cut short
const MAX_RENDERED_ELEMENTS: usize = 200;

/// Where a value's bytes live
#[derive(Debug, Clone, PartialEq)]
pub enum Location {
    Memory(u64),
    /// Not backed by memory, like the result of a literal
    Immediate(Vec<u8>),
}

/// A typed value
#[derive(Debug, Clone, PartialEq)]
pub struct Value {
    ty: Type,
    location: Location,
    /// Trailing array member of a struct, indexable past its declared bound
    unbounded: bool,
}

impl Value {
    /// Value stored in memory at `addr`
    pub fn at(ty: Type, addr: u64) -> Self {
        Self {
            ty,
            location: Location::Memory(addr),
            unbounded: false,
        }
    }

    pub fn immediate(ty: Type, bytes: Vec<u8>) -> Self {
        Self {
            ty,
            location: Location::Immediate(bytes),
            unbounded: false,
        }
    }

    /// Integer literal of the given type
    pub fn from_i64(ty: Type, value: i64) -> Self {
        let size = ty.size().min(8);
        Self::immediate(ty, value.to_le_bytes()[..size].to_vec())
    }

    /// Floating literal; four-byte types are stored as `f32`
    pub fn from_f64(ty: Type, value: f64) -> Self {
        let bytes = if ty.size() == 4 {
            (value as f32).to_le_bytes().to_vec()
        } else {
            value.to_le_bytes().to_vec()
        };
        Self::immediate(ty, bytes)
    }

    pub fn ty(&self) -> &Type {
        &self.ty
    }

    pub fn location(&self) -> &Location {
        &self.location
    }

    pub fn address(&self) -> Option<u64> {
        match self.location {
            Location::Memory(addr) => Some(addr),
            Location::Immediate(_) => None,
        }
    }

    pub(crate) fn is_unbounded(&self) -> bool {
        self.unbounded
    }

    pub(crate) fn into_unbounded(mut self) -> Self {
        self.unbounded = true;
        self
    }

    /// Raw bytes of the value
    pub fn bytes(&self, mem: &Memory) -> Result<Vec<u8>, EvalError> {
        match &self.location {
            Location::Memory(addr) => mem.read(*addr, self.ty.size()),
            Location::Immediate(bytes) => Ok(bytes.clone()),
        }
    }

    /// Sub-value of type `ty` at `offset` bytes into this one
    ///
    /// Memory-backed components must be readable.
    pub(crate) fn component(&self, ty: Type, offset: u64, mem: &Memory) -> Result<Value, EvalError> {
        match &self.location {
            Location::Memory(addr) => {
                let addr = addr.wrapping_add(offset);
                if !mem.contains(addr, ty.size()) {
                    return Err(EvalError::inaccessible(addr));
                }
                Ok(Value::at(ty, addr))
            }
            Location::Immediate(bytes) => {
                let slice = usize::try_from(offset)
                    .ok()
                    .and_then(|from| Some(from..from.checked_add(ty.size())?))
                    .and_then(|range| bytes.get(range))
                    .ok_or_else(|| EvalError::new("no such vector element"))?;
                Ok(Value::immediate(ty, slice.to_vec()))
            }
        }
    }

    /// Member `field` of this struct value
    pub(crate) fn member(&self, field: &Field, trailing: bool, mem: &Memory) -> Result<Value, EvalError> {
        let member = self.component(field.ty.clone(), field.offset as u64, mem)?;
        let is_array = matches!(field.ty.strip_typedefs(), Type::Array { .. });
        Ok(if trailing && is_array {
            member.into_unbounded()
        } else {
            member
        })
    }

    /// Numeric value; floating values are truncated toward zero
    pub fn as_i64(&self, mem: &Memory) -> Result<i64, EvalError> {
        match self.ty.strip_typedefs() {
            Type::Scalar(scalar) => {
                let bytes = self.bytes(mem)?;
                Ok(match &scalar.kind {
                    ScalarKind::Float => decode_float(&bytes).trunc() as i64,
                    ScalarKind::Int { signed } => decode_int(&bytes, *signed),
                    ScalarKind::Char => decode_int(&bytes, true),
                    ScalarKind::Bool | ScalarKind::Enum(_) => decode_int(&bytes, false),
                })
            }
            _ => Err(EvalError::not_a_number()),
        }
    }

    /// The value a pointer points to
    pub fn dereference(&self, mem: &Memory) -> Result<Value, EvalError> {
        match self.ty.strip_typedefs() {
            Type::Pointer(target) => {
                let addr = self.pointer_address(mem)?;
                let target = target.as_ref().clone();
                if !mem.contains(addr, target.size()) {
                    return Err(EvalError::inaccessible(addr));
                }
                Ok(Value::at(target, addr))
            }
            _ => Err(EvalError::new("Attempt to take contents of a non-pointer value.")),
        }
    }

    /// Address held by a pointer value
    pub(crate) fn pointer_address(&self, mem: &Memory) -> Result<u64, EvalError> {
        Ok(decode_int(&self.bytes(mem)?, false) as u64)
    }

    /// Debugger-style rendering: `20`, `49 '1'`, `{my_value = 42}`, `0x1000`
    pub fn render(&self, mem: &Memory) -> Result<String, EvalError> {
        match self.ty.strip_typedefs() {
            Type::Scalar(scalar) => self.render_scalar(scalar, mem),
            Type::Pointer(target) => {
                let addr = self.pointer_address(mem)?;
                let mut out = format!("0x{addr:x}");
                if matches!(target.strip_typedefs(), Type::Scalar(s) if s.kind == ScalarKind::Char) {
                    if let Some(s) = read_cstr(mem, addr) {
                        out.push_str(&format!(" \"{s}\""));
                    }
                }
                Ok(out)
            }
            Type::Array { element, len } => {
                let shown = (*len).min(MAX_RENDERED_ELEMENTS);
                let mut items = Vec::with_capacity(shown);
                for i in 0..shown {
                    let item = self.component(element.as_ref().clone(), (i * element.size()) as u64, mem)?;
                    items.push(item.render(mem)?);
                }
                if *len > shown {
                    items.push("...".to_string());
                }
                Ok(format!("{{{}}}", items.join(", ")))
            }
            Type::Struct(st) => self.render_struct(st, mem),
            Type::Typedef { .. } => unreachable!("typedefs are stripped"),
        }
    }

    fn render_scalar(&self, scalar: &ScalarType, mem: &Memory) -> Result<String, EvalError> {
        let bytes = self.bytes(mem)?;
        Ok(match &scalar.kind {
            ScalarKind::Bool => (decode_int(&bytes, false) != 0).to_string(),
            ScalarKind::Char => {
                let v = decode_int(&bytes, true);
                format!("{v} {}", char_literal(v as u8))
            }
            ScalarKind::Int { signed } => decode_int(&bytes, *signed).to_string(),
            ScalarKind::Float => decode_float(&bytes).to_string(),
            ScalarKind::Enum(enumerators) => {
                let v = decode_int(&bytes, false);
                enumerators
                    .iter()
                    .find(|(_, e)| *e == v)
                    .map(|(name, _)| name.clone())
                    .unwrap_or_else(|| v.to_string())
            }
        })
    }

    fn render_struct(&self, st: &StructType, mem: &Memory) -> Result<String, EvalError> {
        let mut parts = Vec::with_capacity(st.fields.len());
        for field in &st.fields {
            let rendered = self.member(field, false, mem)?.render(mem)?;
            parts.push(match &field.name {
                Some(name) => format!("{name} = {rendered}"),
                None if field.is_base_class => format!("<{}> = {rendered}", field.ty),
                None => rendered,
            });
        }
        Ok(format!("{{{}}}", parts.join(", ")))
    }
}

/// Sign- or zero-extend little-endian bytes
fn decode_int(bytes: &[u8], signed: bool) -> i64 {
    let len = bytes.len().min(8);
    let mut buf = [0u8; 8];
    buf[..len].copy_from_slice(&bytes[..len]);
    let raw = u64::from_le_bytes(buf);
    let bits = len * 8;
    if signed && bits > 0 && bits < 64 && (raw >> (bits - 1)) & 1 == 1 {
        (raw | (u64::MAX << bits)) as i64
    } else {
        raw as i64
    }
}

fn decode_float(bytes: &[u8]) -> f64 {
    match bytes.len() {
        4 => f32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]) as f64,
        8 => {
            let mut buf = [0u8; 8];
            buf.copy_from_slice(bytes);
            f64::from_le_bytes(buf)
        }
        _ => 0.0,
    }
}

/// Quoted character as a debugger prints it: `'1'`, `'\n'`, `'\000'`
fn char_literal(c: u8) -> String {
    match c {
        b'\'' => "'\\''".to_string(),
        b'\\' => "'\\\\'".to_string(),
        b'\n' => "'\\n'".to_string(),
        b'\t' => "'\\t'".to_string(),
        0x20..=0x7e => format!("'{}'", c as char),
        _ => format!("'\\{c:03o}'"),
    }
}

/// NUL-terminated string at `addr`, if readable
fn read_cstr(mem: &Memory, addr: u64) -> Option<String> {
    let mut bytes = Vec::new();
    for i in 0..MAX_RENDERED_ELEMENTS as u64 {
        match mem.read(addr.checked_add(i)?, 1).ok()?[0] {
            0 => return Some(String::from_utf8_lossy(&bytes).into_owned()),
            b => bytes.push(b),
        }
    }
    Some(format!("{}...", String::from_utf8_lossy(&bytes)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_int_sign_extension() {
        assert_eq!(decode_int(&[0xff], true), -1);
        assert_eq!(decode_int(&[0xff], false), 255);
        assert_eq!(decode_int(&[0xfe, 0xff, 0xff, 0xff], true), -2);
    }

    #[test]
    fn test_render_scalars() {
        let mem = Memory::new();
        assert_eq!(Value::from_i64(Type::int(), -7).render(&mem).unwrap(), "-7");
        assert_eq!(Value::from_i64(Type::char(), 49).render(&mem).unwrap(), "49 '1'");
        assert_eq!(Value::from_i64(Type::char(), 0).render(&mem).unwrap(), "0 '\\000'");
        assert_eq!(Value::from_i64(Type::bool(), 1).render(&mem).unwrap(), "true");
        assert_eq!(Value::from_f64(Type::float(), 2.5).render(&mem).unwrap(), "2.5");

        let color = Type::enumeration("color", &[("RED", 0), ("GREEN", 1)]);
        assert_eq!(Value::from_i64(color.clone(), 1).render(&mem).unwrap(), "GREEN");
        assert_eq!(Value::from_i64(color, 9).render(&mem).unwrap(), "9");
    }

    #[test]
    fn test_as_i64_truncates_floats() {
        let mem = Memory::new();
        assert_eq!(Value::from_f64(Type::float(), 1.9).as_i64(&mem).unwrap(), 1);
        assert_eq!(Value::from_f64(Type::double(), -1.9).as_i64(&mem).unwrap(), -1);
    }

    #[test]
    fn test_pointer_is_not_a_number() {
        let mem = Memory::new();
        let ptr = Value::from_i64(Type::pointer_to(Type::char()), 0x1000);
        assert_eq!(
            ptr.as_i64(&mem).unwrap_err().message,
            "Argument to arithmetic operation not a number or boolean."
        );
    }

    #[test]
    fn test_render_memory_values() {
        let mut mem = Memory::new();
        mem.map(0x1000, 64).unwrap();
        for (i, v) in [10, 20, 30].iter().enumerate() {
            mem.write_int(0x1000 + 4 * i as u64, *v, 4).unwrap();
        }
        mem.write_cstr(0x1020, "member").unwrap();

        let array = Value::at(Type::array(Type::int(), 3), 0x1000);
        assert_eq!(array.render(&mem).unwrap(), "{10, 20, 30}");

        let s = StructType::builder("pair")
            .field("a", Type::int())
            .field("b", Type::int())
            .build();
        assert_eq!(Value::at(s, 0x1004).render(&mem).unwrap(), "{a = 20, b = 30}");

        let str_ptr = Value::from_i64(Type::pointer_to(Type::char()), 0x1020);
        assert_eq!(str_ptr.render(&mem).unwrap(), "0x1020 \"member\"");
    }

    #[test]
    fn test_dereference_unmapped() {
        let mem = Memory::new();
        let ptr = Value::from_i64(Type::pointer_to(Type::int()), 0x40);
        assert_eq!(
            ptr.dereference(&mem).unwrap_err().message,
            "Cannot access memory at address 0x40"
        );
    }

    #[test]
    fn test_wild_pointer() {
        let mut mem = Memory::new();
        mem.map(0x1000, 8).unwrap();

        let ptr = Value::from_i64(Type::pointer_to(Type::int()), -2);
        assert_eq!(
            ptr.dereference(&mem).unwrap_err().message,
            "Cannot access memory at address 0xfffffffffffffffe"
        );

        let str_ptr = Value::from_i64(Type::pointer_to(Type::char()), -1);
        assert_eq!(str_ptr.render(&mem).unwrap(), "0xffffffffffffffff");
    }
}
