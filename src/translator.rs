use std::collections::HashMap;

use log::trace;
use thiserror::Error;

use crate::ast::{ArithmeticOp::*, Command::*, Segment::*, *};

macro_rules! svec {
    ($($x:expr),* $(,)?) => (vec![$($x.to_string()),*]);
}

/// Largest value an address instruction can load.
pub const MAX_IMMEDIATE: u16 = 0x7fff;

/// Return address plus the four saved segment bases.
pub const FRAME_SIZE: u16 = 5;

const TEMP_BASE: u16 = 5;
const TEMP_SIZE: u16 = 8;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CodegenError {
    #[error("cannot pop into the constant segment")]
    PopConstant,

    #[error("{segment} index {index} is out of range (max {max})")]
    IndexOutOfRange { segment: Segment, index: u16, max: u16 },

    #[error("{what} {value} does not fit in an address instruction (max 32767)")]
    ImmediateTooLarge { what: &'static str, value: u32 },

    #[error("label counter `{namespace}` is exhausted")]
    CounterExhausted { namespace: String },
}

impl CodegenError {
    /// Counter misuse is a translator bug, not a problem with the input.
    pub fn is_internal(&self) -> bool {
        matches!(self, CodegenError::CounterExhausted { .. })
    }
}

/// Source of comparison label numbers.
///
/// One counter is shared by every unit of a program. Units translated
/// separately must be given counters with distinct namespaces.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabelCounter {
    namespace: String,
    next: u32,
}

impl Default for LabelCounter {
    fn default() -> Self {
        LabelCounter::new("VM")
    }
}

impl LabelCounter {
    pub fn new(namespace: impl Into<String>) -> Self {
        LabelCounter {
            namespace: namespace.into(),
            next: 0,
        }
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    fn next_sym(&mut self) -> Result<u32, CodegenError> {
        let sym = self.next;
        self.next = sym.checked_add(1).ok_or_else(|| CodegenError::CounterExhausted {
            namespace: self.namespace.clone(),
        })?;
        Ok(sym)
    }
}

fn at_c(arg: impl std::fmt::Display) -> String {
    format!("@{arg}", arg = arg)
}

fn at_s(arg: &str) -> String {
    format!("@{arg}", arg = arg)
}

fn immediate(what: &'static str, value: u32) -> Result<u32, CodegenError> {
    if value > u32::from(MAX_IMMEDIATE) {
        return Err(CodegenError::ImmediateTooLarge { what, value });
    }
    Ok(value)
}

fn segment_offset(segment: Segment, arg: u16) -> Result<u16, CodegenError> {
    if arg > MAX_IMMEDIATE {
        return Err(CodegenError::IndexOutOfRange {
            segment,
            index: arg,
            max: MAX_IMMEDIATE,
        });
    }
    Ok(arg)
}

fn pointer_sym(arg: u16) -> Result<String, CodegenError> {
    match arg {
        0 => Ok("THIS".to_string()),
        1 => Ok("THAT".to_string()),
        _ => Err(CodegenError::IndexOutOfRange {
            segment: Pointer,
            index: arg,
            max: 1,
        }),
    }
}

fn temp_sym(arg: u16) -> Result<String, CodegenError> {
    if arg >= TEMP_SIZE {
        return Err(CodegenError::IndexOutOfRange {
            segment: Temp,
            index: arg,
            max: TEMP_SIZE - 1,
        });
    }
    Ok(format!("R{}", arg + TEMP_BASE))
}

/// Store D on top of the stack and bump SP
fn push_d() -> Vec<String> {
    svec!["@SP", "M=M+1", "A=M-1", "M=D"]
}

/// Push microcode for the four frame-relative segments
fn seg_push(seg_name: &str, seg: &str, arg: u16) -> Vec<String> {
    let mut out = svec![
        format!("// push {} {}", seg_name, arg),
        at_s(seg),
        "D=M",
        at_c(arg),
        "A=D+A", // A = SEG+arg
        "D=M"    // D = value to push
    ];
    out.extend(push_d());
    out
}

fn seg_push_direct(seg_name: &str, arg: u16, label: String) -> Vec<String> {
    let mut out = svec![format!("// push {} {}", seg_name, arg), at_s(&label), "D=M"];
    out.extend(push_d());
    out
}

fn seg_pop(seg_name: &str, seg: &str, arg: u16) -> Vec<String> {
    svec![
        format!("// pop {} {}", seg_name, arg),
        at_s(seg),
        "D=M",
        at_c(arg),
        "D=D+A", // D = SEG+arg
        "@R13",
        "M=D", // Stash the target address in R13
        "@SP",
        "AM=M-1", // SP--, A <- new SP (val to be popped)
        "D=M",
        "@R13",
        "A=M", // At the target address...
        "M=D"  // ... store the popped val
    ]
}

fn seg_pop_direct(seg_name: &str, arg: u16, label: String) -> Vec<String> {
    svec![
        format!("// pop {} {}", seg_name, arg),
        "@SP",
        "AM=M-1",
        "D=M",
        at_s(&label),
        "M=D"
    ]
}

fn simple_un_op(name: &str, comp: &str) -> Vec<String> {
    svec![format!("// {}", name), "@SP", "A=M-1", format!("M={}", comp)]
}

// i.e. no conditions or jumps, just pop and run
fn simple_bin_op(name: &str, comp: &str) -> Vec<String> {
    svec![
        format!("// {}", name),
        "@SP",
        "AM=M-1",              // SP--, looking at top of stack now
        "D=M",                 // Right arg in D
        "A=A-1",               // Looking at second arg of stack, will overwrite
        format!("M={}", comp)  // Op and overwrite second element
    ]
}

/// Tears down the current frame and jumps back to the caller.
///
/// R13 holds the frame base (the callee's LCL) and R14 the return address.
/// The return address is read before `*ARG` is overwritten, since with zero
/// arguments both live in the same cell.
pub fn return_sequence() -> Vec<String> {
    let mut out = svec![
        "// return",
        "@LCL",
        "D=M",
        "@R13",
        "M=D", // frame = LCL
        at_c(FRAME_SIZE),
        "A=D-A",
        "D=M",
        "@R14",
        "M=D", // ret = *(frame - 5)
        "@SP",
        "AM=M-1",
        "D=M",
        "@ARG",
        "A=M",
        "M=D", // *ARG = pop()
        "@ARG",
        "D=M+1",
        "@SP",
        "M=D" // SP = ARG + 1
    ];

    // frame-1 .. frame-4 hold THAT, THIS, ARG, LCL
    for base in ["THAT", "THIS", "ARG", "LCL"] {
        out.extend(svec!["@R13", "AM=M-1", "D=M", at_s(base), "M=D"]);
    }

    out.extend(svec!["@R14", "A=M", "0;JMP"]);
    out
}

/// Per-unit generation state.
///
/// The comparison counter is shared program-wide and survives
/// [`Translator::set_unit`]; return-address counters are kept per
/// unit + function scope.
pub struct Translator {
    unit: String,
    function: Option<String>,
    compare: LabelCounter,
    returns: HashMap<String, u32>,
}

impl Translator {
    pub fn new(unit: impl Into<String>) -> Self {
        Translator::with_counter(unit, LabelCounter::default())
    }

    pub fn with_counter(unit: impl Into<String>, counter: LabelCounter) -> Self {
        Translator {
            unit: unit.into(),
            function: None,
            compare: counter,
            returns: HashMap::new(),
        }
    }

    /// Starts a new compilation unit.
    pub fn set_unit(&mut self, unit: impl Into<String>) {
        self.unit = unit.into();
        self.function = None;
    }

    pub fn unit(&self) -> &str {
        &self.unit
    }

    pub fn counter(&self) -> &LabelCounter {
        &self.compare
    }

    fn scope(&self) -> String {
        match &self.function {
            Some(function) => format!("{}:{}", self.unit, function),
            None => self.unit.clone(),
        }
    }

    fn static_sym(&self, arg: u16) -> String {
        format!("{}.{}", self.unit, arg)
    }

    /// Convert VM label to Hack ASM symbol - for consistency across instructions
    fn label_to_sym(&self, label: &str) -> String {
        format!("{}:LABEL_{}", self.scope(), label)
    }

    fn next_return_sym(&mut self) -> Result<String, CodegenError> {
        let scope = self.scope();
        let count = self.returns.entry(scope.clone()).or_insert(0);
        let sym = *count;
        *count = sym
            .checked_add(1)
            .ok_or_else(|| CodegenError::CounterExhausted { namespace: scope.clone() })?;
        Ok(format!("{}:RET_{}", scope, sym))
    }

    fn push(&self, segment: Segment, arg: u16) -> Result<Vec<String>, CodegenError> {
        let code = match segment {
            Constant => {
                let value = immediate("constant", u32::from(arg))?;
                svec![
                    format!("// push constant {}", arg),
                    at_c(value),
                    "D=A",
                    "@SP",
                    "A=M",
                    "M=D",
                    "@SP",
                    "M=M+1"
                ]
            }
            Local => seg_push("local", "LCL", segment_offset(segment, arg)?),
            Argument => seg_push("argument", "ARG", segment_offset(segment, arg)?),
            This => seg_push("this", "THIS", segment_offset(segment, arg)?),
            That => seg_push("that", "THAT", segment_offset(segment, arg)?),
            Static => seg_push_direct("static", arg, self.static_sym(arg)),
            Temp => seg_push_direct("temp", arg, temp_sym(arg)?),
            Pointer => seg_push_direct("pointer", arg, pointer_sym(arg)?),
        };
        Ok(code)
    }

    fn pop(&self, segment: Segment, arg: u16) -> Result<Vec<String>, CodegenError> {
        let code = match segment {
            Constant => return Err(CodegenError::PopConstant),
            Local => seg_pop("local", "LCL", segment_offset(segment, arg)?),
            Argument => seg_pop("argument", "ARG", segment_offset(segment, arg)?),
            This => seg_pop("this", "THIS", segment_offset(segment, arg)?),
            That => seg_pop("that", "THAT", segment_offset(segment, arg)?),
            Static => seg_pop_direct("static", arg, self.static_sym(arg)),
            Temp => seg_pop_direct("temp", arg, temp_sym(arg)?),
            Pointer => seg_pop_direct("pointer", arg, pointer_sym(arg)?),
        };
        Ok(code)
    }

    /// Pops y, replaces x with -1 if `x <jump> y` holds and 0 otherwise.
    ///
    /// `x - y` is only formed when both operands have the same sign, so it
    /// cannot overflow. Mixed signs are decided by the sign of x alone.
    fn compare(&mut self, cmp_name: &str, jump: &str) -> Result<Vec<String>, CodegenError> {
        let sym = self.compare.next_sym()?;
        let ns = self.compare.namespace();
        let neg_sym = format!("{}:CMPNEG_{}", ns, sym);
        let same_sym = format!("{}:CMPSAME_{}", ns, sym);
        let test_sym = format!("{}:CMPTEST_{}", ns, sym);
        let cmp_sym = format!("{}:CMP_{}", ns, sym);
        let end_sym = format!("{}:ENDCMP_{}", ns, sym);
        Ok(svec![
            format!("// {}", cmp_name),
            "@SP",
            "AM=M-1",
            "D=M",
            "@R13",
            "M=D", // y
            "@SP",
            "A=M-1",
            "D=M", // x
            at_s(&neg_sym),
            "D;JLT",
            "@R13",
            "D=M",
            at_s(&same_sym),
            "D;JGE", // x >= 0, y >= 0
            "D=1",   // x >= 0 > y
            at_s(&test_sym),
            "0;JMP",
            format!("({})", neg_sym),
            "@R13",
            "D=M",
            at_s(&same_sym),
            "D;JLT", // x < 0, y < 0
            "D=-1",  // x < 0 <= y
            at_s(&test_sym),
            "0;JMP",
            format!("({})", same_sym),
            "@R13",
            "D=M",
            "@SP",
            "A=M-1",
            "D=M-D", // x - y
            format!("({})", test_sym),
            at_s(&cmp_sym),
            format!("D;{}", jump),
            "D=0",
            at_s(&end_sym),
            "0;JMP",
            format!("({})", cmp_sym),
            "D=-1",
            format!("({})", end_sym),
            "@SP",
            "A=M-1",
            "M=D"
        ])
    }

    fn arithmetic(&mut self, op: ArithmeticOp) -> Result<Vec<String>, CodegenError> {
        let name = op.mnemonic();
        let code = match op {
            Not => simple_un_op(name, "!M"),
            Neg => simple_un_op(name, "-M"),
            ShiftLeft => simple_un_op(name, "M<<"),
            ShiftRight => simple_un_op(name, "M>>"),
            Add => simple_bin_op(name, "D+M"),
            Sub => simple_bin_op(name, "M-D"),
            And => simple_bin_op(name, "D&M"),
            Or => simple_bin_op(name, "D|M"),
            Eq => self.compare(name, "JEQ")?,
            Gt => self.compare(name, "JGT")?,
            Lt => self.compare(name, "JLT")?,
        };
        Ok(code)
    }

    fn label(&self, label: &str) -> Vec<String> {
        svec![
            format!("// label {}", label),
            format!("({})", self.label_to_sym(label))
        ]
    }

    fn goto(&self, label: &str) -> Vec<String> {
        svec![
            format!("// goto {}", label),
            at_s(&self.label_to_sym(label)),
            "0;JMP" // Unconditional jump
        ]
    }

    fn if_goto(&self, label: &str) -> Vec<String> {
        svec![
            format!("// if-goto {}", label),
            "@SP",
            "AM=M-1",
            "D=M", // Stack popped into D
            at_s(&self.label_to_sym(label)),
            "D;JNE" // False is 0
        ]
    }

    fn function(&mut self, name: &str, locals: u16) -> Vec<String> {
        self.function = Some(name.to_string());

        let mut out = svec![format!("// function {} {}", name, locals), format!("({})", name)];
        for _ in 0..locals {
            out.extend(svec!["@SP", "M=M+1", "A=M-1", "M=0"]);
        }
        out
    }

    /// Saves the caller's frame and transfers control to `function`.
    ///
    /// Pushes the return address then LCL, ARG, THIS, THAT, repositions
    /// ARG to `SP - 5 - n_args` and LCL to `SP`, jumps, and marks the resume
    /// point with a fresh return label.
    pub fn call(&mut self, function: &str, n_args: u16) -> Result<Vec<String>, CodegenError> {
        let offset = immediate("call frame offset", u32::from(n_args) + u32::from(FRAME_SIZE))?;
        let ret = self.next_return_sym()?;

        let mut out = svec![format!("// call {} {}", function, n_args), at_s(&ret), "D=A"];
        out.extend(push_d());
        for base in ["LCL", "ARG", "THIS", "THAT"] {
            out.extend(svec![at_s(base), "D=M"]);
            out.extend(push_d());
        }
        out.extend(svec![
            "@SP",
            "D=M",
            at_c(offset),
            "D=D-A",
            "@ARG",
            "M=D", // ARG = SP - 5 - n
            "@SP",
            "D=M",
            "@LCL",
            "M=D", // LCL = SP
            at_s(function),
            "0;JMP",
            format!("({})", ret)
        ]);
        Ok(out)
    }

    /// Expands one command into a complete instruction group.
    pub fn translate_command(&mut self, command: &Command) -> Result<Vec<String>, CodegenError> {
        trace!("{}: {}", self.unit, command);

        let translated = match command {
            Push(seg, arg) => self.push(*seg, *arg)?,
            Pop(seg, arg) => self.pop(*seg, *arg)?,
            Arithmetic(op) => self.arithmetic(*op)?,
            Label(sym) => self.label(sym),
            Goto(sym) => self.goto(sym),
            IfGoto(sym) => self.if_goto(sym),
            Function(name, locals) => self.function(name, *locals),
            Call(name, args) => self.call(name, *args)?,
            Return => return_sequence(),
        };
        Ok(translated)
    }

    pub fn translate(&mut self, commands: &[Command]) -> Result<Vec<String>, CodegenError> {
        let mut instructions: Vec<String> = vec![];

        for command in commands {
            instructions.extend(self.translate_command(command)?);
        }

        Ok(instructions)
    }
}
