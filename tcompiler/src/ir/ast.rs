use std::fmt;

/// A parsed TCode program. `commands[i]` is the node for source line `i`.
#[derive(Debug, Clone)]
pub struct Program {
    pub commands: Vec<Command>,
    pub blocks: Vec<Block>,
    pub methods: Vec<Method>,
}

impl Program {
    pub fn block(&self, id: BlockId) -> &Block {
        &self.blocks[id.0]
    }

    pub fn method(&self, id: MethodId) -> &Method {
        &self.methods[id.0]
    }

    pub fn find_method(&self, name: &str) -> Option<&Method> {
        self.methods.iter().find(|m| m.name == name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockId(pub usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MethodId(pub usize);

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Label(pub String);

impl Label {
    /// The label as a jump target followed by a colon.
    pub fn mark(&self) -> String {
        format!("{}:", self.0)
    }
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One of the work registers R0..R7.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Register(pub u8);

impl Register {
    /// Bank 0 RAM address, the operand form `push`/`pop` accept.
    pub fn direct(self) -> String {
        format!("0{:X}h", self.0)
    }
}

impl fmt::Display for Register {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "R{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BitAddress {
    pub byte: u8,
    pub bit: u8,
}

impl fmt::Display for BitAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0{:02X}h.{}", self.byte, self.bit)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Address {
    Byte(u8),
    Bit(BitAddress),
}

impl Address {
    /// Bytes 20h..2Fh and every SFR on an 8-byte boundary can be bit-addressed.
    pub fn is_bit_addressable(&self) -> bool {
        match self {
            Self::Byte(byte) => (0x20..0x30).contains(byte) || (*byte >= 0x80 && byte % 8 == 0),
            Self::Bit(_) => false,
        }
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Byte(byte) => write!(f, "0{:02X}h", byte),
            Self::Bit(bit) => bit.fmt(f),
        }
    }
}

/// Whether a value lives in a single bit or a whole byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Kind {
    Bit,
    Byte,
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bit => f.write_str("bit"),
            Self::Byte => f.write_str("byte"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VarType {
    Bool,
    Char,
    Int,
    Cint,
}

impl VarType {
    pub fn kind(self) -> Kind {
        match self {
            Self::Bool => Kind::Bit,
            Self::Char | Self::Int | Self::Cint => Kind::Byte,
        }
    }

    pub fn keyword(self) -> &'static str {
        match self {
            Self::Bool => "bool",
            Self::Char => "char",
            Self::Int => "int",
            Self::Cint => "cint",
        }
    }

    pub fn from_keyword(word: &str) -> Option<Self> {
        match word {
            "bool" => Some(Self::Bool),
            "char" => Some(Self::Char),
            "int" => Some(Self::Int),
            "cint" => Some(Self::Cint),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Variable {
    pub name: String,
    pub ty: VarType,
    pub address: Address,
}

impl Variable {
    pub fn kind(&self) -> Kind {
        self.ty.kind()
    }
}

/// An immediate value. Bools are stored as 0/1, cints as their two's complement byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Constant {
    pub ty: VarType,
    pub value: u8,
}

impl Constant {
    pub fn kind(&self) -> Kind {
        self.ty.kind()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operand {
    Variable(Variable),
    Constant(Constant),
}

impl Operand {
    pub fn kind(&self) -> Kind {
        match self {
            Self::Variable(v) => v.kind(),
            Self::Constant(c) => c.kind(),
        }
    }

    pub fn ty(&self) -> VarType {
        match self {
            Self::Variable(v) => v.ty,
            Self::Constant(c) => c.ty,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Expression {
    Operand(Operand),
    Call(MethodCall),
    Operation(Box<Operation>),
}

impl Expression {
    /// `None` for method calls: their result may bind either kind.
    pub fn kind(&self) -> Option<Kind> {
        match self {
            Self::Operand(operand) => Some(operand.kind()),
            Self::Call(_) => None,
            Self::Operation(operation) => operation.kind(),
        }
    }

    pub fn is_signed(&self) -> bool {
        match self {
            Self::Operand(operand) => operand.ty() == VarType::Cint,
            Self::Call(_) => false,
            Self::Operation(operation) => operation.is_signed(),
        }
    }

    pub fn as_operand(&self) -> Option<&Operand> {
        match self {
            Self::Operand(operand) => Some(operand),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Operands {
    pub left: Expression,
    pub right: Expression,
}

impl Operands {
    fn is_signed(&self) -> bool {
        self.left.is_signed() || self.right.is_signed()
    }
}

/// `value << count` / `value >> count`, looping on a borrowed register.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Shift {
    pub operands: Operands,
    pub register: Register,
    pub loop_label: Label,
    pub check_label: Label,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BitIndex {
    Constant(u8),
    Dynamic {
        index: Expression,
        register: Register,
        loop_label: Label,
        check_label: Label,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BitOf {
    pub value: Expression,
    pub bit: BitIndex,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operation {
    And(Operands),
    Or(Operands),
    Not(Expression),
    Add(Operands),
    Subtract(Operands),
    Multiply(Operands),
    Divide(Operands),
    Modulo(Operands),
    Increment(Variable),
    Decrement(Variable),
    ShiftLeft(Shift),
    ShiftRight(Shift),
    BitOf(BitOf),
    Bigger(Operands),
    Smaller(Operands),
    Equal(Operands),
    UnEqual(Operands),
}

impl Operation {
    pub fn kind(&self) -> Option<Kind> {
        match self {
            Self::And(ops) | Self::Or(ops) => ops.left.kind().or(ops.right.kind()),
            Self::Not(value) => value.kind(),
            Self::Add(_)
            | Self::Subtract(_)
            | Self::Multiply(_)
            | Self::Divide(_)
            | Self::Modulo(_)
            | Self::Increment(_)
            | Self::Decrement(_)
            | Self::ShiftLeft(_)
            | Self::ShiftRight(_) => Some(Kind::Byte),
            Self::BitOf(_) | Self::Bigger(_) | Self::Smaller(_) | Self::Equal(_) | Self::UnEqual(_) => {
                Some(Kind::Bit)
            }
        }
    }

    fn is_signed(&self) -> bool {
        match self {
            Self::Add(ops) | Self::Subtract(ops) | Self::Multiply(ops) | Self::Divide(ops) | Self::Modulo(ops) => {
                ops.is_signed()
            }
            Self::ShiftLeft(shift) | Self::ShiftRight(shift) => shift.operands.left.is_signed(),
            Self::Increment(v) | Self::Decrement(v) => v.ty == VarType::Cint,
            Self::Not(value) => value.is_signed(),
            _ => false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodCall {
    pub method: MethodId,
    pub arguments: Vec<Expression>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssignOp {
    Assign,
    Add,
    Subtract,
    Multiply,
    Divide,
    Modulo,
    And,
    Or,
}

impl AssignOp {
    pub fn symbol(self) -> &'static str {
        match self {
            Self::Assign => ":=",
            Self::Add => "+=",
            Self::Subtract => "-=",
            Self::Multiply => "*=",
            Self::Divide => "/=",
            Self::Modulo => "%=",
            Self::And => "&=",
            Self::Or => "|=",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    Variable(Variable),
    /// A single bit of a byte variable, e.g. `flags.3`.
    BitOf { variable: Variable, bit: u8 },
}

impl Target {
    pub fn kind(&self) -> Kind {
        match self {
            Self::Variable(v) => v.kind(),
            Self::BitOf { .. } => Kind::Bit,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Assignment {
    pub target: Target,
    pub op: AssignOp,
    pub value: Expression,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sleep {
    pub duration: Expression,
    pub outer: Register,
    pub inner: Register,
    pub outer_label: Label,
    pub inner_label: Label,
    pub end_label: Label,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Empty,
    Block(BlockId),
    IfBlock { block: BlockId, condition: Expression },
    WhileBlock { block: BlockId, condition: Expression },
    ForTilBlock { block: BlockId, limit: Expression },
    /// Closes the `if` frame and opens its `else` frame.
    Else { if_block: BlockId, block: BlockId },
    EndBlock(BlockId),
    Break(BlockId),
    Method(MethodId),
    EndMethod(MethodId),
    Return(Option<Expression>),
    MethodCall(MethodCall),
    Sleep(Sleep),
    /// `int x`, `bool b := true`, ... The address is recomputed at generation.
    Declaration {
        name: String,
        ty: VarType,
        init: Option<Assignment>,
    },
    Operation(Operation),
    Assignment(Assignment),
    /// A bare variable or constant on its own line.
    Reference(Operand),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BlockKind {
    Plain,
    If { else_label: Option<Label> },
    Else,
    While { top: Label },
    ForTil { top: Label, register: Register },
}

/// A scope frame. `end_label` is assigned when the frame closes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Block {
    pub kind: BlockKind,
    pub variables: Vec<Variable>,
    pub end_label: Option<Label>,
    pub line: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Parameter {
    pub name: String,
    pub ty: VarType,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Method {
    pub name: String,
    pub label: Label,
    pub signature: Vec<Parameter>,
    /// Parameters with their addresses, filled in when the body is parsed.
    pub parameters: Vec<Variable>,
    pub variables: Vec<Variable>,
    pub line: usize,
}
