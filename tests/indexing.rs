//! Indexing scenarios over a modelled program state
//!
//! The `Program` below lays out the globals of a small C++ program in
//! memory. Each test indexes one of them the way a debugger script would.

use pptest::oracle::{index, EvalError, IndexKey, Memory, StructType, Type, Value};

const ARRAY: u64 = 0x1000;
const STRING: u64 = 0x2000;
const HACK: u64 = 0x3000;
const MY_STRUCT: u64 = 0x4000;
const DERIVED: u64 = 0x5000;
const STRUCT_ARRAY: u64 = 0x6000;

/// Globals of the scenario program
struct Program {
    mem: Memory,
    my_struct_ty: Type,
}

impl Program {
    fn new() -> Self {
        let mut mem = Memory::new();

        // int array[5] = {0, 10, 20, 30, 40};
        mem.map(ARRAY, 20).unwrap();
        for i in 0..5 {
            mem.write_int(ARRAY + 4 * i, 10 * i as i64, 4).unwrap();
        }

        // const char string_index[] = "abc";
        mem.map(STRING, 4).unwrap();
        mem.write_cstr(STRING, "abc").unwrap();

        // struct { int count; int elements[1]; } allocated with room for 3
        mem.map(HACK, 16).unwrap();
        mem.write_int(HACK, 3, 4).unwrap();
        for (i, v) in [7, 8, 9].into_iter().enumerate() {
            mem.write_int(HACK + 4 + 4 * i as u64, v, 4).unwrap();
        }

        // MyStruct my_struct = {42, -1};
        mem.map(MY_STRUCT, 8).unwrap();
        mem.write_int(MY_STRUCT, 42, 4).unwrap();
        mem.write_int(MY_STRUCT + 4, -1, 4).unwrap();

        // Derived : MyStruct { union { int i; double d; }; } = {{7, 0}, .d = 2.5}
        mem.map(DERIVED, 16).unwrap();
        mem.write_int(DERIVED, 7, 4).unwrap();
        mem.write_int(DERIVED + 4, 0, 4).unwrap();
        mem.write_f64(DERIVED + 8, 2.5).unwrap();

        // MyStruct struct_array[2] = {{100, 1}, {200, 2}};
        mem.map(STRUCT_ARRAY, 16).unwrap();
        for (i, v) in [100, 1, 200, 2].into_iter().enumerate() {
            mem.write_int(STRUCT_ARRAY + 4 * i as u64, v, 4).unwrap();
        }

        let my_struct_ty = StructType::builder("MyStruct")
            .field("my_value", Type::int())
            .field("other", Type::int())
            .build();

        Self { mem, my_struct_ty }
    }

    fn array(&self) -> Value {
        Value::at(Type::array(Type::int(), 5), ARRAY)
    }

    fn my_struct(&self) -> Value {
        Value::at(self.my_struct_ty.clone(), MY_STRUCT)
    }

    fn struct_with_anonymous_union(&self) -> Value {
        let union = StructType::union_builder(None)
            .field("i", Type::int())
            .field("d", Type::double())
            .build();
        let derived = StructType::builder("Derived")
            .base(self.my_struct_ty.clone())
            .anonymous(union)
            .build();
        Value::at(derived, DERIVED)
    }

    fn ptr_to_struct_with_array(&self) -> Value {
        let ty = StructType::builder("StructWithArray")
            .field("count", Type::int())
            .field("elements", Type::array(Type::int(), 1))
            .build();
        Value::from_i64(Type::pointer_to(ty), HACK as i64)
    }

    fn color(&self) -> Type {
        Type::enumeration("Color", &[("Red", 0), ("Green", 1), ("Blue", 4)])
    }

    fn int(&self, key: impl Into<IndexKey>, value: &Value) -> i64 {
        let element = index(value, &key.into(), &self.mem).expect("index failed");
        element.as_i64(&self.mem).expect("not a number")
    }

    fn error(&self, key: impl Into<IndexKey>, value: &Value) -> String {
        let err: EvalError = index(value, &key.into(), &self.mem).unwrap_err();
        err.message
    }
}

// ============== Tests ==============

#[test]
fn test_array_with_index_kinds() {
    let p = Program::new();
    let array = p.array();

    assert_eq!(p.int(IndexKey::Int(0), &array), 0);

    let int_index = Value::from_i64(Type::int(), 1);
    let char_index = Value::from_i64(Type::char(), 2);
    let float_index = Value::from_f64(Type::float(), 3.0);
    let enum_index = Value::from_i64(p.color(), 4);

    assert_eq!(p.int(int_index, &array), 10);
    assert_eq!(p.int(char_index, &array), 20);
    assert_eq!(p.int(float_index, &array), 30);
    assert_eq!(p.int(enum_index, &array), 40);

    let string_index = Value::at(Type::array(Type::char(), 4), STRING);
    assert_eq!(
        p.error(string_index, &array),
        "Argument to arithmetic operation not a number or boolean."
    );
}

#[test]
fn test_struct_hack() {
    let p = Program::new();
    let hack = p.ptr_to_struct_with_array().dereference(&p.mem).unwrap();
    let elements = index(&hack, &"elements".into(), &p.mem).unwrap();

    assert_eq!(p.int(IndexKey::Int(0), &elements), 7);
    assert_eq!(p.int(IndexKey::Int(1), &elements), 8);
    assert_eq!(p.int(IndexKey::Int(2), &elements), 9);
    // Past the allocation the read itself fails
    assert_eq!(
        p.error(IndexKey::Int(3), &elements),
        "Cannot access memory at address 0x3010"
    );
}

#[test]
fn test_struct_members() {
    let p = Program::new();
    let my_struct = p.my_struct();

    assert_eq!(p.int("my_value", &my_struct), 42);
    assert_eq!(p.int("other", &my_struct), -1);

    let Type::Struct(st) = &p.my_struct_ty else {
        panic!("MyStruct is a struct");
    };
    assert_eq!(p.int(st.fields[0].clone(), &my_struct), 42);

    assert_eq!(
        p.error("xxxxxxx", &my_struct),
        "There is no member named xxxxxxx."
    );
    assert_eq!(
        p.error(IndexKey::Int(0), &my_struct),
        "Cannot subscript requested type."
    );
    assert_eq!(
        index(&my_struct, &"my_value".into(), &p.mem)
            .unwrap()
            .render(&p.mem)
            .unwrap(),
        "42"
    );
}

#[test]
fn test_base_class_and_anonymous_union_members() {
    let p = Program::new();
    let derived = p.struct_with_anonymous_union();

    assert_eq!(p.int("my_value", &derived), 7);
    assert_eq!(p.int("d", &derived), 2);

    let d = index(&derived, &"d".into(), &p.mem).unwrap();
    assert_eq!(d.address(), Some(DERIVED + 8));
    assert_eq!(d.render(&p.mem).unwrap(), "2.5");
}

#[test]
fn test_pointers_to_aggregates() {
    let p = Program::new();

    let ptr_to_array = Value::from_i64(
        Type::pointer_to(Type::array(Type::int(), 5)),
        ARRAY as i64,
    );
    assert_eq!(p.int(Value::from_i64(Type::int(), 1), &ptr_to_array), 10);

    let ptr_to_struct = Value::from_i64(Type::pointer_to(p.my_struct_ty.clone()), MY_STRUCT as i64);
    assert_eq!(p.int("my_value", &ptr_to_struct), 42);

    let typedefed_ptr_to_struct = Value::from_i64(
        Type::typedef("MyStructPtr", Type::pointer_to(p.my_struct_ty.clone())),
        MY_STRUCT as i64,
    );
    assert_eq!(p.int("my_value", &typedefed_ptr_to_struct), 42);
}

#[test]
fn test_struct_arrays_by_name() {
    let p = Program::new();

    let struct_array = Value::at(Type::array(p.my_struct_ty.clone(), 2), STRUCT_ARRAY);
    assert_eq!(p.int("my_value", &struct_array), 100);

    let typedefed_struct_array = Value::at(
        Type::typedef("MyStructArray", Type::array(p.my_struct_ty.clone(), 2)),
        STRUCT_ARRAY,
    );
    assert_eq!(p.int("my_value", &typedefed_struct_array), 100);

    let second = index(&typedefed_struct_array, &IndexKey::Int(1), &p.mem).unwrap();
    assert_eq!(p.int("my_value", &second), 200);
    assert_eq!(second.render(&p.mem).unwrap(), "{my_value = 200, other = 2}");
}

#[test]
fn test_scalars_are_not_indexable() {
    let p = Program::new();
    let one = Value::from_i64(Type::int(), 1);
    let member = Value::at(Type::array(Type::char(), 4), STRING);

    assert_eq!(
        p.error(IndexKey::Int(0), &one),
        "Cannot subscript requested type."
    );
    assert_eq!(
        p.error(one.clone(), &one),
        "Cannot subscript requested type."
    );
    assert_eq!(
        p.error("member", &one),
        "Type int is not a structure or union type."
    );
    assert_eq!(
        p.error(member, &one),
        "Argument to arithmetic operation not a number or boolean."
    );
}
