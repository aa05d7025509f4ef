use nom::{
    branch::alt,
    bytes::complete::{is_a, tag},
    character::{
        complete::{digit1, space1},
        is_digit,
    },
    combinator::{map, map_res, value, verify},
    sequence::tuple,
    IResult,
};
use thiserror::Error;

use crate::ast::{ArithmeticOp, Command, Segment};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseErrorKind {
    #[error("unknown command `{0}`")]
    UnknownCommand(String),

    #[error("unknown segment `{0}`")]
    UnknownSegment(String),

    #[error("malformed `{mnemonic}`, expected `{usage}`")]
    Malformed {
        mnemonic: String,
        usage: &'static str,
    },

    #[error("unexpected trailing input `{0}`")]
    TrailingInput(String),

    #[error("cannot pop into the constant segment")]
    PopConstant,
}

impl ParseErrorKind {
    /// Well-formed syntax naming something that cannot be addressed.
    pub fn is_semantic(&self) -> bool {
        matches!(self, ParseErrorKind::UnknownSegment(_) | ParseErrorKind::PopConstant)
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("line {line}: {kind} in `{text}`")]
pub struct ParseError {
    pub line: usize,
    pub text: String,
    pub kind: ParseErrorKind,
}

/// A command together with the 1-based line it was read from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceCommand {
    pub line: usize,
    pub command: Command,
}

fn integer(input: &str) -> IResult<&str, u16> {
    map_res(digit1, |c: &str| c.parse())(input)
}

fn segment(input: &str) -> IResult<&str, Segment> {
    alt((
        value(Segment::Constant, tag("constant")),
        value(Segment::Local, tag("local")),
        value(Segment::Static, tag("static")),
        value(Segment::Argument, tag("argument")),
        value(Segment::This, tag("this")),
        value(Segment::That, tag("that")),
        value(Segment::Pointer, tag("pointer")),
        value(Segment::Temp, tag("temp")),
    ))(input)
}

fn push(input: &str) -> IResult<&str, Command> {
    map(
        tuple((tag("push"), space1, segment, space1, integer)),
        |(_, _, segment, _, arg)| Command::Push(segment, arg),
    )(input)
}

// `pop constant` parses here and is rejected by `parse_line`, so it can be
// reported as a semantic error rather than a generic syntax failure.
fn pop(input: &str) -> IResult<&str, Command> {
    map(
        tuple((tag("pop"), space1, segment, space1, integer)),
        |(_, _, segment, _, arg)| Command::Pop(segment, arg),
    )(input)
}

fn arithmetic(input: &str) -> IResult<&str, Command> {
    map(
        alt((
            value(ArithmeticOp::Add, tag("add")),
            value(ArithmeticOp::Sub, tag("sub")),
            value(ArithmeticOp::Neg, tag("neg")),
            value(ArithmeticOp::Eq, tag("eq")),
            value(ArithmeticOp::Gt, tag("gt")),
            value(ArithmeticOp::Lt, tag("lt")),
            value(ArithmeticOp::And, tag("and")),
            value(ArithmeticOp::Or, tag("or")),
            value(ArithmeticOp::Not, tag("not")),
            value(ArithmeticOp::ShiftLeft, tag("shiftleft")),
            value(ArithmeticOp::ShiftRight, tag("shiftright")),
        )),
        Command::Arithmetic,
    )(input)
}

/// Characters the assembler accepts in a symbol. A symbol may not start
/// with a digit.
pub const SYMBOL_CHARS: &str = "abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ_.$:0123456789";

fn symbol(input: &str) -> IResult<&str, String> {
    map(
        verify(
            is_a(SYMBOL_CHARS),
            |c: &str| !is_digit(c.as_bytes()[0]),
        ),
        |sym: &str| sym.to_string(),
    )(input)
}

fn branching(input: &str) -> IResult<&str, Command> {
    alt((
        map(tuple((tag("label"), space1, symbol)), |(_, _, sym)| Command::Label(sym)),
        map(tuple((tag("goto"), space1, symbol)), |(_, _, sym)| Command::Goto(sym)),
        map(tuple((tag("if-goto"), space1, symbol)), |(_, _, sym)| Command::IfGoto(sym)),
    ))(input)
}

fn function(input: &str) -> IResult<&str, Command> {
    map(
        tuple((tag("function"), space1, symbol, space1, integer)),
        |(_, _, name, _, locals)| Command::Function(name, locals),
    )(input)
}

fn call(input: &str) -> IResult<&str, Command> {
    map(
        tuple((tag("call"), space1, symbol, space1, integer)),
        |(_, _, name, _, args)| Command::Call(name, args),
    )(input)
}

fn ret(input: &str) -> IResult<&str, Command> {
    value(Command::Return, tag("return"))(input)
}

fn usage(mnemonic: &str) -> Option<&'static str> {
    let usage = match mnemonic {
        "push" => "push <segment> <index>",
        "pop" => "pop <segment> <index>",
        "label" => "label <symbol>",
        "goto" => "goto <symbol>",
        "if-goto" => "if-goto <symbol>",
        "function" => "function <name> <locals>",
        "call" => "call <name> <args>",
        "return" => "return",
        "add" | "sub" | "neg" | "eq" | "gt" | "lt" | "and" | "or" | "not" | "shiftleft"
        | "shiftright" => "<operator> with no operands",
        _ => return None,
    };
    Some(usage)
}

/// Works out why `line` failed to parse.
fn diagnose(line: &str) -> ParseErrorKind {
    let mut tokens = line.split_whitespace();
    let mnemonic = tokens.next().unwrap_or_default();
    let Some(usage) = usage(mnemonic) else {
        return ParseErrorKind::UnknownCommand(mnemonic.to_string());
    };

    if mnemonic == "push" || mnemonic == "pop" {
        if let Some(name) = tokens.next() {
            if !matches!(segment(name), Ok(("", _))) {
                return ParseErrorKind::UnknownSegment(name.to_string());
            }
        }
    }

    ParseErrorKind::Malformed {
        mnemonic: mnemonic.to_string(),
        usage,
    }
}

/// Classifies a single comment-free, trimmed, non-empty line.
pub fn parse_line(line: &str) -> Result<Command, ParseErrorKind> {
    match alt((push, pop, arithmetic, branching, function, call, ret))(line) {
        Ok(("", Command::Pop(Segment::Constant, _))) => Err(ParseErrorKind::PopConstant),
        Ok(("", command)) => Ok(command),
        Ok((remainder, _)) if remainder.starts_with(char::is_whitespace) => {
            Err(ParseErrorKind::TrailingInput(remainder.trim().to_string()))
        }
        Ok(_) | Err(_) => Err(diagnose(line)),
    }
}

fn strip_comment(line: &str) -> &str {
    line.split_once("//").map(|(s, _)| s).unwrap_or(line).trim()
}

/// Cursor over the commands of one compilation unit.
///
/// Blank lines and comments are skipped up front; each call to
/// [`Reader::advance`] classifies the next remaining line.
pub struct Reader<'a> {
    lines: Vec<(usize, &'a str)>,
    position: usize,
}

impl<'a> Reader<'a> {
    pub fn new(input: &'a str) -> Self {
        let lines = input
            .lines()
            .enumerate()
            .map(|(index, line)| (index + 1, strip_comment(line)))
            .filter(|(_, line)| !line.is_empty())
            .collect();

        Reader { lines, position: 0 }
    }

    pub fn has_more_commands(&self) -> bool {
        self.position < self.lines.len()
    }

    /// Reads the next command. Past the end this returns `None` and leaves
    /// the cursor where it is.
    pub fn advance(&mut self) -> Option<Result<SourceCommand, ParseError>> {
        let &(line, text) = self.lines.get(self.position)?;
        self.position += 1;

        let parsed = parse_line(text)
            .map(|command| SourceCommand { line, command })
            .map_err(|kind| ParseError {
                line,
                text: text.to_string(),
                kind,
            });
        Some(parsed)
    }
}

impl Iterator for Reader<'_> {
    type Item = Result<SourceCommand, ParseError>;

    fn next(&mut self) -> Option<Self::Item> {
        self.advance()
    }
}

/// Parses a whole unit, stopping at the first malformed line.
pub fn parse(input: &str) -> Result<Vec<Command>, ParseError> {
    Reader::new(input)
        .map(|parsed| parsed.map(|source| source.command))
        .collect()
}
