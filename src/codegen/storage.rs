use hashbrown::{HashMap, HashSet};
use tracing::trace;

use crate::{
    bound::{SymbolRepository, TypeId, TypeKind, VariableId},
    codegen::builder::FunctionBuilder,
    error::{LoweringError, Result, ice},
    intern::InternedSymbol,
    ir::{self, Operand, RegisterId},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndirectionKind {
    /// `T*`, the slot holds the pointer value itself
    Pointer,
    /// `T&`, the slot holds the address of the referent
    Reference,
    /// A class typed parameter, the caller passes the address of its object
    ByAddress,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageShape {
    Value,
    /// The slot holds a pointer one indirection level deeper than the value
    Indirect(IndirectionKind),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VariableRole {
    Parameter,
    Local,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StorageLocation {
    /// Register holding the address of the stack slot
    pub slot: RegisterId,
    /// Type of the value stored in the slot
    pub slot_type: ir::Type,
    pub shape: StorageShape,
    pub ty: TypeId,
    pub name: InternedSymbol,
}

/// Assigns every local variable and parameter of one function a stack slot
#[derive(Debug, Default)]
pub struct StorageAllocator {
    locations: HashMap<VariableId, StorageLocation>,
    /// Every slot name handed out so far
    taken: HashSet<InternedSymbol>,
    /// Last numeric suffix tried per base name
    suffixes: HashMap<InternedSymbol, usize>,
}

impl StorageAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocates the slot of `variable`. Allocating an already allocated
    /// variable returns the existing location.
    pub fn allocate(
        &mut self,
        builder: &mut FunctionBuilder,
        symbols: &dyn SymbolRepository,
        variable: VariableId,
        role: VariableRole,
    ) -> Result<&StorageLocation> {
        if !self.locations.contains_key(&variable) {
            let symbol = symbols.variable(variable)?;
            let shape = storage_shape(symbols, symbol.ty, role)?;
            let slot_type = slot_type(symbols, symbol.ty, shape)?;
            let name = self.unique_name(symbol.name);

            let slot = builder.alloc_stack(slot_type.clone(), Some(name));
            trace!(%name, ?shape, "allocated storage");

            self.locations.insert(
                variable,
                StorageLocation {
                    slot,
                    slot_type,
                    shape,
                    ty: symbol.ty,
                    name,
                },
            );
        }

        self.lookup(variable)
    }

    pub fn lookup(&self, variable: VariableId) -> Result<&StorageLocation> {
        self.locations
            .get(&variable)
            .ok_or_else(|| ice!(LoweringError::UnallocatedStorage(variable)))
    }

    /// The address of the object named by `variable`. For references and
    /// objects passed by address this loads the pointer held in the slot.
    pub fn address(&self, builder: &mut FunctionBuilder, variable: VariableId) -> Result<Operand> {
        let location = self.lookup(variable)?;

        match location.shape {
            StorageShape::Value | StorageShape::Indirect(IndirectionKind::Pointer) => {
                Ok(location.slot.into())
            }
            StorageShape::Indirect(IndirectionKind::Reference | IndirectionKind::ByAddress) => {
                let destination = builder.create_register(location.slot_type.clone());
                builder.push(ir::Instruction::LoadMem {
                    destination,
                    source: location.slot.into(),
                });
                Ok(destination.into())
            }
        }
    }

    /// `name`, or `name` followed by the first number giving a name which
    /// no other slot of the function carries
    fn unique_name(&mut self, name: InternedSymbol) -> InternedSymbol {
        let mut unique = name;

        while self.taken.contains(&unique) {
            let suffix = self.suffixes.entry(name).or_insert(0);
            *suffix += 1;
            unique = InternedSymbol::new(&format!("{name}{suffix}"));
        }

        self.taken.insert(unique);
        unique
    }
}

fn storage_shape(
    symbols: &dyn SymbolRepository,
    ty: TypeId,
    role: VariableRole,
) -> Result<StorageShape> {
    Ok(match symbols.type_kind(ty)? {
        TypeKind::Pointer(_) => StorageShape::Indirect(IndirectionKind::Pointer),
        TypeKind::Reference(_) => StorageShape::Indirect(IndirectionKind::Reference),
        TypeKind::Class(_) if role == VariableRole::Parameter => {
            StorageShape::Indirect(IndirectionKind::ByAddress)
        }
        _ => StorageShape::Value,
    })
}

fn slot_type(symbols: &dyn SymbolRepository, ty: TypeId, shape: StorageShape) -> Result<ir::Type> {
    let pointee = match (shape, symbols.type_kind(ty)?) {
        (StorageShape::Value, _) => return symbols.ir_type(ty),
        (StorageShape::Indirect(IndirectionKind::ByAddress), _) => ty,
        (StorageShape::Indirect(_), TypeKind::Pointer(inner) | TypeKind::Reference(inner)) => {
            *inner
        }
        (StorageShape::Indirect(_), _) => return symbols.ir_type(ty),
    };

    // Indirections to `void` address opaque bytes
    if symbols.is_void(pointee)? {
        return Ok(ir::Type::byte_pointer());
    }

    Ok(symbols.pointee_ir_type(pointee)?.pointer_to())
}
