use std::fmt;

#[derive(Debug, PartialEq, Eq, Clone, Copy, Hash)]
pub enum Segment {
    Constant,
    Local,
    Static,
    Argument,
    This,
    That,
    Pointer,
    Temp,
}

impl Segment {
    pub fn name(self) -> &'static str {
        match self {
            Segment::Constant => "constant",
            Segment::Local => "local",
            Segment::Static => "static",
            Segment::Argument => "argument",
            Segment::This => "this",
            Segment::That => "that",
            Segment::Pointer => "pointer",
            Segment::Temp => "temp",
        }
    }
}

impl fmt::Display for Segment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum ArithmeticOp {
    Add,
    Sub,
    Neg,
    Eq,
    Gt,
    Lt,
    And,
    Or,
    Not,
    ShiftLeft,
    ShiftRight,
}

impl ArithmeticOp {
    pub fn mnemonic(self) -> &'static str {
        match self {
            ArithmeticOp::Add => "add",
            ArithmeticOp::Sub => "sub",
            ArithmeticOp::Neg => "neg",
            ArithmeticOp::Eq => "eq",
            ArithmeticOp::Gt => "gt",
            ArithmeticOp::Lt => "lt",
            ArithmeticOp::And => "and",
            ArithmeticOp::Or => "or",
            ArithmeticOp::Not => "not",
            ArithmeticOp::ShiftLeft => "shiftleft",
            ArithmeticOp::ShiftRight => "shiftright",
        }
    }

    /// Unary operators rewrite the top cell in place.
    pub fn is_unary(self) -> bool {
        matches!(
            self,
            ArithmeticOp::Neg | ArithmeticOp::Not | ArithmeticOp::ShiftLeft | ArithmeticOp::ShiftRight
        )
    }
}

#[derive(Debug, PartialEq, Eq, Clone)]
pub enum Command {
    // Stack Basics
    Push(Segment, u16),
    Pop(Segment, u16),
    Arithmetic(ArithmeticOp),

    // Control
    Label(String),
    Goto(String),
    IfGoto(String),

    // Functions
    Function(String, u16),
    Call(String, u16),
    Return,
}

impl Command {
    /// Net change in stack depth once the command has run.
    ///
    /// For `call` this is the depth seen by the caller after the callee has
    /// returned. `return` unwinds a whole frame and has no fixed effect.
    pub fn stack_effect(&self) -> Option<i32> {
        match self {
            Command::Push(..) => Some(1),
            Command::Pop(..) | Command::IfGoto(_) => Some(-1),
            Command::Arithmetic(op) if op.is_unary() => Some(0),
            Command::Arithmetic(_) => Some(-1),
            Command::Label(_) | Command::Goto(_) => Some(0),
            Command::Function(_, locals) => Some(i32::from(*locals)),
            Command::Call(_, args) => Some(1 - i32::from(*args)),
            Command::Return => None,
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Command::Push(seg, arg) => write!(f, "push {} {}", seg, arg),
            Command::Pop(seg, arg) => write!(f, "pop {} {}", seg, arg),
            Command::Arithmetic(op) => f.write_str(op.mnemonic()),
            Command::Label(sym) => write!(f, "label {}", sym),
            Command::Goto(sym) => write!(f, "goto {}", sym),
            Command::IfGoto(sym) => write!(f, "if-goto {}", sym),
            Command::Function(name, locals) => write!(f, "function {} {}", name, locals),
            Command::Call(name, args) => write!(f, "call {} {}", name, args),
            Command::Return => f.write_str("return"),
        }
    }
}
