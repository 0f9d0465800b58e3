use crate::ir::{FloatWidth, IntegerWidth, Type};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Bytes(pub u64);

impl Bytes {
    pub fn bytes(self) -> u64 {
        self.0
    }

    pub fn bits(self) -> u64 {
        self.bytes() * 8
    }

    /// Rounds up to the next multiple of `alignment`
    pub fn align_to(self, alignment: Bytes) -> Bytes {
        if alignment.0 <= 1 {
            return self;
        }

        Bytes(self.0.div_ceil(alignment.0) * alignment.0)
    }
}

impl IntegerWidth {
    pub fn size(self) -> Bytes {
        match self {
            IntegerWidth::I8 => Bytes(1),
            IntegerWidth::I16 => Bytes(2),
            IntegerWidth::I32 => Bytes(4),
            IntegerWidth::I64 => Bytes(8),
        }
    }
}

impl FloatWidth {
    pub fn size(self) -> Bytes {
        match self {
            FloatWidth::F32 => Bytes(4),
            FloatWidth::F64 => Bytes(8),
        }
    }
}

impl Type {
    /// Size in bytes including trailing padding, as laid out on x86_64
    pub fn size(&self) -> u64 {
        self.layout().0.bytes()
    }

    pub fn alignment(&self) -> u64 {
        self.layout().1.bytes()
    }

    fn layout(&self) -> (Bytes, Bytes) {
        match self {
            Type::Void => (Bytes(0), Bytes(1)),
            Type::Integer(width) => (width.size(), width.size()),
            Type::Float(width) => (width.size(), width.size()),
            Type::Pointer(_) => (Bytes(8), Bytes(8)),
            Type::Struct(s) => {
                let mut offset = Bytes(0);
                let mut alignment = Bytes(1);

                for field in s.fields.iter() {
                    let (size, align) = field.layout();

                    offset = Bytes(offset.align_to(align).0 + size.0);
                    alignment = alignment.max(align);
                }

                (offset.align_to(alignment), alignment)
            }
            // named types are only ever reached through a pointer
            Type::Named(_) => (Bytes(0), Bytes(1)),
        }
    }
}
