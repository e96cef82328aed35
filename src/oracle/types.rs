//! Type model for the indexing oracle

use std::fmt;

/// Category of a scalar type
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScalarKind {
    Bool,
    Char,
    Int { signed: bool },
    Float,
    /// Enumerators in declaration order
    Enum(Vec<(String, i64)>),
}

/// A scalar type with its size in bytes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScalarType {
    pub name: String,
    pub size: usize,
    pub kind: ScalarKind,
}

/// Struct or union
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Aggregate {
    Struct,
    Union,
}

/// A member of a struct or union
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Field {
    /// `None` for anonymous struct/union members
    pub name: Option<String>,
    pub ty: Type,
    /// Byte offset from the start of the enclosing aggregate
    pub offset: usize,
    pub is_base_class: bool,
}

impl Field {
    /// Anonymous struct/union member whose fields are reachable by name
    pub fn is_anonymous(&self) -> bool {
        self.name.is_none() && !self.is_base_class
    }
}

/// Struct or union type with laid-out fields
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StructType {
    pub name: Option<String>,
    pub aggregate: Aggregate,
    pub fields: Vec<Field>,
    pub size: usize,
    pub align: usize,
}

impl StructType {
    /// Start laying out a struct
    pub fn builder(name: &str) -> StructBuilder {
        StructBuilder::new(Some(name.to_string()), Aggregate::Struct)
    }

    /// Start laying out a union
    pub fn union_builder(name: Option<&str>) -> StructBuilder {
        StructBuilder::new(name.map(String::from), Aggregate::Union)
    }

    /// Start laying out an anonymous struct
    pub fn anonymous() -> StructBuilder {
        StructBuilder::new(None, Aggregate::Struct)
    }

    /// The last field, which may be indexed past its bound when it is an array
    pub fn trailing_field(&self) -> Option<&Field> {
        match self.aggregate {
            Aggregate::Struct => self.fields.last(),
            Aggregate::Union => None,
        }
    }
}

/// Lays out fields with natural alignment
#[derive(Debug)]
pub struct StructBuilder {
    name: Option<String>,
    aggregate: Aggregate,
    fields: Vec<Field>,
    cursor: usize,
    align: usize,
}

impl StructBuilder {
    fn new(name: Option<String>, aggregate: Aggregate) -> Self {
        Self {
            name,
            aggregate,
            fields: Vec::new(),
            cursor: 0,
            align: 1,
        }
    }

    fn push(mut self, name: Option<String>, ty: Type, is_base_class: bool) -> Self {
        let align = ty.align();
        let offset = match self.aggregate {
            Aggregate::Struct => align_up(self.cursor, align),
            Aggregate::Union => 0,
        };
        self.cursor = match self.aggregate {
            Aggregate::Struct => offset + ty.size(),
            Aggregate::Union => self.cursor.max(ty.size()),
        };
        self.align = self.align.max(align);
        self.fields.push(Field {
            name,
            ty,
            offset,
            is_base_class,
        });
        self
    }

    /// Base class subobject; bases come before members
    pub fn base(self, ty: Type) -> Self {
        self.push(None, ty, true)
    }

    pub fn field(self, name: &str, ty: Type) -> Self {
        self.push(Some(name.to_string()), ty, false)
    }

    /// Anonymous struct or union member
    pub fn anonymous(self, ty: Type) -> Self {
        self.push(None, ty, false)
    }

    pub fn build(self) -> Type {
        let size = align_up(self.cursor, self.align);
        Type::Struct(StructType {
            name: self.name,
            aggregate: self.aggregate,
            fields: self.fields,
            size,
            align: self.align,
        })
    }
}

fn align_up(offset: usize, align: usize) -> usize {
    offset.div_ceil(align) * align
}

/// A type as the debugger sees it
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Type {
    Scalar(ScalarType),
    Array { element: Box<Type>, len: usize },
    Pointer(Box<Type>),
    Struct(StructType),
    Typedef { name: String, target: Box<Type> },
}

/// Size of a pointer on the modelled target
pub const POINTER_SIZE: usize = 8;

impl Type {
    fn scalar(name: &str, size: usize, kind: ScalarKind) -> Type {
        Type::Scalar(ScalarType {
            name: name.to_string(),
            size,
            kind,
        })
    }

    pub fn bool() -> Type {
        Type::scalar("bool", 1, ScalarKind::Bool)
    }

    pub fn char() -> Type {
        Type::scalar("char", 1, ScalarKind::Char)
    }

    pub fn int() -> Type {
        Type::scalar("int", 4, ScalarKind::Int { signed: true })
    }

    pub fn unsigned() -> Type {
        Type::scalar("unsigned int", 4, ScalarKind::Int { signed: false })
    }

    pub fn long() -> Type {
        Type::scalar("long", 8, ScalarKind::Int { signed: true })
    }

    pub fn float() -> Type {
        Type::scalar("float", 4, ScalarKind::Float)
    }

    pub fn double() -> Type {
        Type::scalar("double", 8, ScalarKind::Float)
    }

    pub fn enumeration(name: &str, enumerators: &[(&str, i64)]) -> Type {
        let enumerators = enumerators
            .iter()
            .map(|(n, v)| (n.to_string(), *v))
            .collect();
        Type::scalar(name, 4, ScalarKind::Enum(enumerators))
    }

    pub fn array(element: Type, len: usize) -> Type {
        Type::Array {
            element: Box::new(element),
            len,
        }
    }

    pub fn pointer_to(target: Type) -> Type {
        Type::Pointer(Box::new(target))
    }

    pub fn typedef(name: &str, target: Type) -> Type {
        Type::Typedef {
            name: name.to_string(),
            target: Box::new(target),
        }
    }

    /// The type with all outer typedefs removed
    pub fn strip_typedefs(&self) -> &Type {
        let mut ty = self;
        while let Type::Typedef { target, .. } = ty {
            ty = target;
        }
        ty
    }

    pub fn size(&self) -> usize {
        match self {
            Type::Scalar(s) => s.size,
            Type::Array { element, len } => element.size() * len,
            Type::Pointer(_) => POINTER_SIZE,
            Type::Struct(s) => s.size,
            Type::Typedef { target, .. } => target.size(),
        }
    }

    pub fn align(&self) -> usize {
        match self {
            Type::Scalar(s) => s.size.max(1),
            Type::Array { element, .. } => element.align(),
            Type::Pointer(_) => POINTER_SIZE,
            Type::Struct(s) => s.align,
            Type::Typedef { target, .. } => target.align(),
        }
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Type::Scalar(s) => f.write_str(&s.name),
            Type::Array { element, len } => write!(f, "{element} [{len}]"),
            Type::Pointer(target) => write!(f, "{target} *"),
            Type::Struct(s) => match (&s.name, s.aggregate) {
                (Some(name), _) => f.write_str(name),
                (None, Aggregate::Struct) => f.write_str("struct {...}"),
                (None, Aggregate::Union) => f.write_str("union {...}"),
            },
            Type::Typedef { name, .. } => f.write_str(name),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_struct_layout_natural_alignment() {
        let ty = StructType::builder("S")
            .field("c", Type::char())
            .field("i", Type::int())
            .field("d", Type::double())
            .field("tail", Type::char())
            .build();
        let Type::Struct(s) = &ty else { unreachable!() };
        let offsets: Vec<usize> = s.fields.iter().map(|f| f.offset).collect();
        assert_eq!(offsets, vec![0, 4, 8, 16]);
        assert_eq!(ty.size(), 24);
        assert_eq!(ty.align(), 8);
    }

    #[test]
    fn test_union_layout() {
        let ty = StructType::union_builder(None)
            .field("a", Type::char())
            .field("d", Type::double())
            .build();
        let Type::Struct(s) = &ty else { unreachable!() };
        assert!(s.fields.iter().all(|f| f.offset == 0));
        assert_eq!(ty.size(), 8);
        assert_eq!(ty.to_string(), "union {...}");
    }

    #[test]
    fn test_strip_nested_typedefs() {
        let ty = Type::typedef("outer", Type::typedef("inner", Type::int()));
        assert_eq!(ty.strip_typedefs(), &Type::int());
        assert_eq!(ty.size(), 4);
        assert_eq!(ty.to_string(), "outer");
    }

    #[test]
    fn test_display_names() {
        assert_eq!(Type::array(Type::int(), 3).to_string(), "int [3]");
        assert_eq!(Type::pointer_to(Type::char()).to_string(), "char *");
    }
}
