//! `value[key]`
//!
//! Dispatch is on the target's type with typedefs stripped, then on the
//! kind of key. Pointers to arrays and structs are dereferenced one level
//! first; arrays indexed by a member name decay to their first element.

use std::ptr;

use super::memory::Memory;
use super::types::{Field, StructType, Type};
use super::value::Value;
use super::EvalError;

/// Something a value can be indexed with
#[derive(Debug, Clone, PartialEq)]
pub enum IndexKey {
    /// Integer literal
    Int(i64),
    /// Member name
    Name(String),
    /// Member descriptor of a struct or union type
    Field(Field),
    /// A debugger value, used as a number
    Value(Value),
}

impl From<i64> for IndexKey {
    fn from(i: i64) -> Self {
        IndexKey::Int(i)
    }
}

impl From<&str> for IndexKey {
    fn from(name: &str) -> Self {
        IndexKey::Name(name.to_string())
    }
}

impl From<Field> for IndexKey {
    fn from(field: Field) -> Self {
        IndexKey::Field(field)
    }
}

impl From<Value> for IndexKey {
    fn from(value: Value) -> Self {
        IndexKey::Value(value)
    }
}

fn not_struct(ty: &Type) -> EvalError {
    EvalError::new(format!("Type {ty} is not a structure or union type."))
}

fn cannot_subscript() -> EvalError {
    EvalError::new("Cannot subscript requested type.")
}

/// Integer the key stands for, `None` for member keys
fn numeric_key(key: &IndexKey, mem: &Memory) -> Option<Result<i64, EvalError>> {
    match key {
        IndexKey::Int(i) => Some(Ok(*i)),
        IndexKey::Value(v) => Some(v.as_i64(mem)),
        IndexKey::Name(_) | IndexKey::Field(_) => None,
    }
}

/// Index `value` with `key`
pub fn index(value: &Value, key: &IndexKey, mem: &Memory) -> Result<Value, EvalError> {
    match value.ty().strip_typedefs() {
        Type::Scalar(_) => Err(scalar_error(value.ty(), key, mem)),
        Type::Pointer(target) => match target.strip_typedefs() {
            Type::Array { .. } | Type::Struct(_) => index(&value.dereference(mem)?, key, mem),
            _ => match numeric_key(key, mem) {
                Some(i) => pointer_element(value, target, i?, mem),
                None => index(&value.dereference(mem)?, key, mem),
            },
        },
        Type::Array { element, len } => match numeric_key(key, mem) {
            Some(i) => array_element(value, element, *len, i?, mem),
            None => match element.strip_typedefs() {
                Type::Struct(_) => index(&value.component(element.as_ref().clone(), 0, mem)?, key, mem),
                _ => Err(not_struct(element)),
            },
        },
        Type::Struct(st) => match key {
            IndexKey::Name(name) => find_member(value, st, name, mem)?
                .ok_or_else(|| EvalError::new(format!("There is no member named {name}."))),
            IndexKey::Field(field) => {
                let own = st
                    .fields
                    .iter()
                    .find(|f| *f == field)
                    .ok_or_else(|| {
                        EvalError::new(format!("Field is not a member of type {}.", value.ty()))
                    })?;
                value.member(own, is_trailing(st, own), mem)
            }
            IndexKey::Int(_) | IndexKey::Value(_) => Err(cannot_subscript()),
        },
        Type::Typedef { .. } => unreachable!("typedefs are stripped"),
    }
}

fn scalar_error(ty: &Type, key: &IndexKey, mem: &Memory) -> EvalError {
    match key {
        IndexKey::Name(_) | IndexKey::Field(_) => not_struct(ty),
        IndexKey::Int(_) => cannot_subscript(),
        IndexKey::Value(v) => match v.as_i64(mem) {
            Ok(_) => cannot_subscript(),
            Err(e) => e,
        },
    }
}

/// `*(p + i)`
fn pointer_element(pointer: &Value, target: &Type, i: i64, mem: &Memory) -> Result<Value, EvalError> {
    let base = Value::at(target.clone(), pointer.pointer_address(mem)?);
    let offset = i.wrapping_mul(target.size() as i64) as u64;
    base.component(target.clone(), offset, mem)
}

fn array_element(array: &Value, element: &Type, len: usize, i: i64, mem: &Memory) -> Result<Value, EvalError> {
    let in_bounds = i >= 0 && (i as u64) < len as u64;
    if !in_bounds && !array.is_unbounded() {
        return Err(EvalError::new("no such vector element"));
    }
    let offset = i.wrapping_mul(element.size() as i64) as u64;
    array.component(element.clone(), offset, mem)
}

fn is_trailing(st: &StructType, field: &Field) -> bool {
    st.trailing_field().is_some_and(|last| ptr::eq(last, field))
}

/// Member named `name`, searched through anonymous members and base classes
fn find_member(value: &Value, st: &StructType, name: &str, mem: &Memory) -> Result<Option<Value>, EvalError> {
    if let Some(field) = st.fields.iter().find(|f| f.name.as_deref() == Some(name)) {
        return value.member(field, is_trailing(st, field), mem).map(Some);
    }

    for field in st.fields.iter().filter(|f| f.is_anonymous() || f.is_base_class) {
        let Type::Struct(inner) = field.ty.strip_typedefs() else {
            continue;
        };
        let nested = value.member(field, false, mem)?;
        if let Some(found) = find_member(&nested, inner, name, mem)? {
            return Ok(Some(found));
        }
    }
    Ok(None)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn int_array(mem: &mut Memory, addr: u64, values: &[i64]) -> Value {
        mem.map(addr, values.len() * 4).unwrap();
        for (i, v) in values.iter().enumerate() {
            mem.write_int(addr + 4 * i as u64, *v, 4).unwrap();
        }
        Value::at(Type::array(Type::int(), values.len()), addr)
    }

    #[test]
    fn test_array_bounds_checked() {
        let mut mem = Memory::new();
        let array = int_array(&mut mem, 0x1000, &[1, 2, 3]);

        let last = index(&array, &IndexKey::Int(2), &mem).unwrap();
        assert_eq!(last.as_i64(&mem).unwrap(), 3);
        for i in [3, -1] {
            assert_eq!(
                index(&array, &IndexKey::Int(i), &mem).unwrap_err().message,
                "no such vector element"
            );
        }
    }

    #[test]
    fn test_pointer_to_scalar_arithmetic() {
        let mut mem = Memory::new();
        int_array(&mut mem, 0x1000, &[5, 6, 7]);
        let ptr = Value::from_i64(Type::pointer_to(Type::int()), 0x1004);

        assert_eq!(index(&ptr, &IndexKey::Int(1), &mem).unwrap().as_i64(&mem).unwrap(), 7);
        assert_eq!(index(&ptr, &IndexKey::Int(-1), &mem).unwrap().as_i64(&mem).unwrap(), 5);
        assert_eq!(
            index(&ptr, &IndexKey::Int(2), &mem).unwrap_err().message,
            "Cannot access memory at address 0x100c"
        );
        assert_eq!(
            index(&ptr, &"x".into(), &mem).unwrap_err().message,
            "Type int is not a structure or union type."
        );
    }

    #[test]
    fn test_array_of_scalars_by_name() {
        let mut mem = Memory::new();
        let array = int_array(&mut mem, 0x1000, &[1]);
        assert_eq!(
            index(&array, &"m".into(), &mem).unwrap_err().message,
            "Type int is not a structure or union type."
        );
    }

    #[test]
    fn test_foreign_field_descriptor() {
        let mut mem = Memory::new();
        mem.map(0x1000, 8).unwrap();
        let a = StructType::builder("a").field("x", Type::int()).build();
        let b = StructType::builder("b").field("y", Type::int()).build();
        let Type::Struct(b_struct) = &b else { unreachable!() };

        let value = Value::at(a, 0x1000);
        let err = index(&value, &IndexKey::Field(b_struct.fields[0].clone()), &mem).unwrap_err();
        assert_eq!(err.message, "Field is not a member of type a.");
    }

    #[test]
    fn test_wild_pointer_arithmetic() {
        let mut mem = Memory::new();
        int_array(&mut mem, 0x1000, &[1]);
        let ptr = Value::from_i64(Type::pointer_to(Type::int()), -8);

        assert_eq!(
            index(&ptr, &IndexKey::Int(1), &mem).unwrap_err().message,
            "Cannot access memory at address 0xfffffffffffffffc"
        );
        assert_eq!(
            index(&ptr, &IndexKey::Int(2), &mem).unwrap_err().message,
            "Cannot access memory at address 0x0"
        );
    }

    #[test]
    fn test_immediate_struct_hack_out_of_range() {
        let mem = Memory::new();
        let ty = StructType::builder("s")
            .field("count", Type::int())
            .field("elements", Type::array(Type::int(), 1))
            .build();
        let value = Value::immediate(ty, vec![0; 8]);
        let elements = index(&value, &"elements".into(), &mem).unwrap();

        assert_eq!(index(&elements, &IndexKey::Int(0), &mem).unwrap().as_i64(&mem).unwrap(), 0);
        for i in [-1, 1, -2] {
            assert_eq!(
                index(&elements, &IndexKey::Int(i), &mem).unwrap_err().message,
                "no such vector element"
            );
        }
    }
}
