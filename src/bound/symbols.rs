//! Symbols referenced by the bound tree and the repositories the lowering
//! stage queries them through. The symbol table and type repository belong to
//! the binder; [`SymbolTable`] is the in-memory form they are handed over in.

use std::rc::Rc;

use serde::{Deserialize, Serialize};

use crate::{
    error::{LoweringError, Result, ice},
    index::{IndexVec, simple_index},
    intern::InternedSymbol,
    ir,
    primitive::{FloatKind, IntKind, IntrinsicOperator, UIntKind},
};

simple_index! {
    /// Identifies a type in the type repository
    pub struct TypeId;
}

simple_index! {
    /// Identifies a callable in the function repository
    pub struct FunctionId;
}

simple_index! {
    /// Identifies a local variable or parameter symbol
    pub struct VariableId;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TypeKind {
    Void,
    Bool,
    Char,
    Integer(IntKind),
    UnsignedInteger(UIntKind),
    Float(FloatKind),
    /// T*
    Pointer(TypeId),
    /// T&
    Reference(TypeId),
    /// A raw code address, used for dispatch table entries
    FunctionPointer,
    Class(ClassType),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassType {
    pub name: InternedSymbol,
    #[serde(default)]
    pub base: Option<TypeId>,
    #[serde(default)]
    pub fields: Vec<TypeId>,
    /// Set on the class which introduces virtual functions into its
    /// hierarchy. The dispatch table pointer is stored directly after the
    /// base class subobject.
    #[serde(default)]
    pub has_dispatch_table: bool,
    /// A destructor which has to run when objects of this class go out of
    /// scope. Trivially destructible classes have none.
    #[serde(default)]
    pub destructor: Option<FunctionId>,
}

impl ClassType {
    /// Index of the dispatch table pointer within the lowered struct
    pub fn dispatch_table_slot(&self) -> u32 {
        self.base.is_some() as u32
    }

    /// Maps the index of a declared field to its index in the lowered struct
    pub fn field_slot(&self, field: u32) -> u32 {
        field + self.base.is_some() as u32 + self.has_dispatch_table as u32
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FunctionSymbol {
    pub name: InternedSymbol,
    pub return_type: TypeId,
    #[serde(default)]
    pub can_raise: bool,
    #[serde(default)]
    pub returns_by_hidden_slot: bool,
    /// Expanded inline by the operator table instead of called
    #[serde(default)]
    pub intrinsic: Option<IntrinsicOperator>,
    /// Index into the dispatch table of `owner`
    #[serde(default)]
    pub dispatch_slot: Option<u32>,
    /// The class which declares this member function
    #[serde(default)]
    pub owner: Option<TypeId>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VariableSymbol {
    pub name: InternedSymbol,
    pub ty: TypeId,
}

/// Sizes, representations and shapes of types
pub trait TypeRepository {
    fn type_kind(&self, ty: TypeId) -> Result<&TypeKind>;

    /// The referenced type of a reference, every other type unchanged
    fn plain_type(&self, ty: TypeId) -> Result<TypeId> {
        match self.type_kind(ty)? {
            TypeKind::Reference(inner) => Ok(*inner),
            _ => Ok(ty),
        }
    }

    fn class(&self, ty: TypeId) -> Result<&ClassType> {
        match self.type_kind(ty)? {
            TypeKind::Class(class) => Ok(class),
            _ => Err(ice!(LoweringError::NotAClass(ty))),
        }
    }

    fn is_class(&self, ty: TypeId) -> Result<bool> {
        Ok(matches!(self.type_kind(ty)?, TypeKind::Class(_)))
    }

    fn is_void(&self, ty: TypeId) -> Result<bool> {
        Ok(matches!(self.type_kind(ty)?, TypeKind::Void))
    }

    /// The destructor owed by a value of this type, if it is not trivially
    /// destructible
    fn destructor_of(&self, ty: TypeId) -> Result<Option<FunctionId>> {
        match self.type_kind(ty)? {
            TypeKind::Class(class) => Ok(class.destructor),
            _ => Ok(None),
        }
    }

    /// The representation of a value of this type in the IR. Pointers to
    /// classes refer to the class by name so that recursive classes lower to
    /// a finite type.
    fn ir_type(&self, ty: TypeId) -> Result<ir::Type> {
        Ok(match self.type_kind(ty)? {
            TypeKind::Void => ir::Type::Void,
            TypeKind::Bool => ir::Type::Integer(ir::IntegerWidth::I8),
            TypeKind::Char => ir::Type::Integer(ir::IntegerWidth::I32),
            TypeKind::Integer(int_kind) => ir::Type::Integer((*int_kind).into()),
            TypeKind::UnsignedInteger(uint_kind) => ir::Type::Integer((*uint_kind).into()),
            TypeKind::Float(float_kind) => ir::Type::Float((*float_kind).into()),
            TypeKind::Pointer(inner) | TypeKind::Reference(inner) => {
                ir::Type::Pointer(Rc::new(self.pointee_ir_type(*inner)?))
            }
            TypeKind::FunctionPointer => ir::Type::byte_pointer(),
            TypeKind::Class(class) => {
                let mut fields = Vec::with_capacity(class.fields.len() + 2);

                if let Some(base) = class.base {
                    fields.push(self.ir_type(base)?);
                }
                if class.has_dispatch_table {
                    fields.push(ir::Type::dispatch_table_pointer());
                }
                for field in &class.fields {
                    fields.push(self.ir_type(*field)?);
                }

                ir::Type::Struct(ir::Struct {
                    name: Some(class.name),
                    fields: fields.into(),
                })
            }
        })
    }

    /// The type used behind a pointer to `ty`. Pointers to `void` address
    /// opaque bytes.
    fn pointee_ir_type(&self, ty: TypeId) -> Result<ir::Type> {
        Ok(match self.type_kind(ty)? {
            TypeKind::Void => ir::Type::Integer(ir::IntegerWidth::I8),
            TypeKind::Class(class) => ir::Type::Named(class.name),
            _ => self.ir_type(ty)?,
        })
    }

    fn size_of(&self, ty: TypeId) -> Result<u64> {
        Ok(self.ir_type(ty)?.size())
    }
}

/// Facts about callables needed to lower calls to them
pub trait FunctionRepository {
    fn function(&self, id: FunctionId) -> Result<&FunctionSymbol>;
}

/// Everything the lowering stage looks up while walking a function
pub trait SymbolRepository: TypeRepository + FunctionRepository {
    fn variable(&self, id: VariableId) -> Result<&VariableSymbol>;
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SymbolTable {
    pub types: IndexVec<TypeId, TypeKind>,
    pub functions: IndexVec<FunctionId, FunctionSymbol>,
    pub variables: IndexVec<VariableId, VariableSymbol>,
}

impl SymbolTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_type(&mut self, kind: TypeKind) -> TypeId {
        if let Some((id, _)) = self.types.enumerate().find(|(_, k)| **k == kind) {
            return id;
        }

        self.types.push(kind)
    }

    pub fn insert_function(&mut self, symbol: FunctionSymbol) -> FunctionId {
        self.functions.push(symbol)
    }

    pub fn insert_variable(&mut self, name: &str, ty: TypeId) -> VariableId {
        self.variables.push(VariableSymbol {
            name: InternedSymbol::new(name),
            ty,
        })
    }
}

impl TypeRepository for SymbolTable {
    fn type_kind(&self, ty: TypeId) -> Result<&TypeKind> {
        self.types
            .get(ty)
            .ok_or_else(|| ice!(LoweringError::UnknownType(ty)))
    }
}

impl FunctionRepository for SymbolTable {
    fn function(&self, id: FunctionId) -> Result<&FunctionSymbol> {
        self.functions
            .get(id)
            .ok_or_else(|| ice!(LoweringError::UnknownFunction(id)))
    }
}

impl SymbolRepository for SymbolTable {
    fn variable(&self, id: VariableId) -> Result<&VariableSymbol> {
        self.variables
            .get(id)
            .ok_or_else(|| ice!(LoweringError::UnknownVariable(id)))
    }
}
