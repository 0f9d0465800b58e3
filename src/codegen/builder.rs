use crate::{
    codegen::value::TargetList,
    error::{LoweringError, Result, ice},
    index::{Index, IndexVec},
    intern::InternedSymbol,
    ir::{self, Instruction, InstructionId, LabelId, Register, RegisterId},
};

/// Accumulates the instruction stream of one function. Stack allocations go
/// into a separate prologue which is placed before the body when the function
/// is finished, so slots can be requested at any point during lowering.
#[derive(Debug, Default)]
pub struct FunctionBuilder {
    registers: IndexVec<RegisterId, Register>,
    prologue: Vec<Instruction>,
    body: IndexVec<InstructionId, Instruction>,
    next_label: usize,
}

impl FunctionBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn create_register(&mut self, ty: ir::Type) -> RegisterId {
        let id = self.registers.next_index();
        self.registers.push(Register { id, ty })
    }

    pub fn register_type(&self, register: RegisterId) -> &ir::Type {
        &self.registers[register].ty
    }

    /// The IR type of an operand, if it is known without context
    pub fn operand_type(&self, operand: ir::Operand) -> Option<ir::Type> {
        match operand {
            ir::Operand::Register(register) => Some(self.register_type(register).clone()),
            ir::Operand::Immediate(ir::Immediate::Int(_, width)) => Some(ir::Type::Integer(width)),
            ir::Operand::Immediate(ir::Immediate::Float(_, width)) => Some(ir::Type::Float(width)),
            ir::Operand::Immediate(ir::Immediate::Bool(_)) => Some(ir::Type::bool()),
            ir::Operand::Immediate(ir::Immediate::FunctionLabel(_)) => {
                Some(ir::Type::byte_pointer())
            }
            ir::Operand::Immediate(ir::Immediate::Null) => None,
        }
    }

    pub fn create_label(&mut self) -> LabelId {
        let id = LabelId::new(self.next_label);
        self.next_label += 1;
        id
    }

    pub fn push(&mut self, instruction: Instruction) -> InstructionId {
        self.body.push(instruction)
    }

    pub fn place_label(&mut self, label: LabelId) {
        self.push(Instruction::Label(label));
    }

    /// Allocates a stack slot in the prologue and returns the register
    /// holding its address
    pub fn alloc_stack(&mut self, ty: ir::Type, name: Option<InternedSymbol>) -> RegisterId {
        let destination = self.create_register(ty.clone().pointer_to());
        self.prologue.push(Instruction::AllocStack {
            destination,
            ty,
            name,
        });
        destination
    }

    /// Appends an instruction to the prologue, after every slot allocated so
    /// far
    pub fn push_prologue(&mut self, instruction: Instruction) {
        self.prologue.push(instruction);
    }

    /// Whether control can not fall through past the last emitted
    /// instruction
    pub fn last_is_terminator(&self) -> bool {
        self.body
            .iter()
            .rev()
            .find(|instruction| !matches!(instruction, Instruction::Comment(_)))
            .is_some_and(Instruction::is_terminator)
    }

    /// The label of the current position, reusing one if it was just placed
    pub fn current_label(&mut self) -> LabelId {
        if let Some(Instruction::Label(label)) = self.body.last() {
            return *label;
        }

        let label = self.create_label();
        self.place_label(label);
        label
    }

    pub fn backpatch(&mut self, list: TargetList, label: LabelId) -> Result<()> {
        list.backpatch(label, &mut self.body)
    }

    /// Resolves every branch in `list` to the current position. Nothing is
    /// placed when the list holds no branches, which is normal for the lists
    /// of constant conditions and of statements that never fall through.
    /// Lists which must hold a branch go through [`Self::resolve_required_here`].
    pub fn resolve_here(&mut self, list: TargetList) -> Result<Option<LabelId>> {
        if list.is_empty() {
            return Ok(None);
        }

        let label = self.current_label();
        self.backpatch(list, label)?;
        Ok(Some(label))
    }

    /// Resolves a list which must hold at least one branch to the current
    /// position. An empty list is an internal error and places nothing.
    pub fn resolve_required_here(&mut self, list: TargetList) -> Result<LabelId> {
        if list.is_empty() {
            return Err(ice!(LoweringError::EmptyTargetList));
        }

        let label = self.current_label();
        self.backpatch(list, label)?;
        Ok(label)
    }

    /// Resolves every branch in `list` to an already placed label
    pub fn resolve_to(&mut self, list: TargetList, label: LabelId) -> Result<()> {
        if list.is_empty() {
            return Ok(());
        }

        self.backpatch(list, label)
    }

    /// Pushes a jump whose target is resolved later
    pub fn pending_jump(&mut self) -> TargetList {
        let id = self.push(Instruction::Jump { destination: None });
        TargetList::jump(id)
    }

    pub fn instructions(&self) -> &IndexVec<InstructionId, Instruction> {
        &self.body
    }

    /// Places the prologue before the body and builds the labels table.
    /// Fails if any branch was never resolved or any label never placed.
    pub fn finish(
        self,
        symbol_name: InternedSymbol,
        arguments: Vec<RegisterId>,
        landing_pad_count: usize,
    ) -> Result<ir::FunctionDefinition> {
        let instructions: IndexVec<InstructionId, Instruction> = self
            .prologue
            .into_iter()
            .chain(self.body.raw)
            .collect();

        let mut positions = vec![None; self.next_label];

        for (id, instruction) in instructions.enumerate() {
            match instruction {
                Instruction::Label(label) => positions[label.index()] = Some(id),
                Instruction::Branch {
                    positive: None, ..
                }
                | Instruction::Branch {
                    negative: None, ..
                }
                | Instruction::Jump { destination: None } => {
                    return Err(ice!(LoweringError::UnresolvedBranch(id)));
                }
                _ => {}
            }
        }

        let labels = positions
            .into_iter()
            .enumerate()
            .map(|(label, position)| {
                position.ok_or_else(|| ice!(LoweringError::UnplacedLabel(LabelId::new(label))))
            })
            .collect::<Result<IndexVec<LabelId, InstructionId>>>()?;

        Ok(ir::FunctionDefinition {
            symbol_name,
            registers: self.registers,
            arguments,
            instructions,
            labels,
            landing_pad_count,
        })
    }
}
