//! A minimal Hack CPU for running translator output.

#![allow(dead_code)]

use std::collections::HashMap;

pub const SP: usize = 0;
pub const LCL: usize = 1;
pub const ARG: usize = 2;
pub const THIS: usize = 3;
pub const THAT: usize = 4;

pub const TRUE: i16 = -1;
pub const FALSE: i16 = 0;

#[derive(Debug, Clone)]
enum Instr {
    Address(i16),
    Compute {
        dest: String,
        comp: String,
        jump: Option<String>,
    },
}

pub struct Machine {
    pub ram: Vec<i16>,
    rom: Vec<Instr>,
    symbols: HashMap<String, i16>,
    pc: usize,
    a: i16,
    d: i16,
}

fn predefined() -> HashMap<String, i16> {
    let mut symbols = HashMap::new();
    for (name, addr) in [("SP", 0), ("LCL", 1), ("ARG", 2), ("THIS", 3), ("THAT", 4)] {
        symbols.insert(name.to_string(), addr);
    }
    for r in 0..16 {
        symbols.insert(format!("R{}", r), r);
    }
    symbols.insert("SCREEN".to_string(), 16384);
    symbols.insert("KBD".to_string(), 24576);
    symbols
}

impl Machine {
    /// Assembles `asm` into ROM. Labels are bound first, then remaining
    /// symbols are allocated as variables from address 16.
    pub fn load(asm: &[String]) -> Self {
        let mut symbols = predefined();
        let mut code: Vec<&str> = Vec::new();

        for line in asm {
            let line = line.split_once("//").map(|(s, _)| s).unwrap_or(line).trim();
            if line.is_empty() {
                continue;
            }
            if let Some(label) = line.strip_prefix('(').and_then(|l| l.strip_suffix(')')) {
                let previous = symbols.insert(label.to_string(), code.len() as i16);
                assert!(previous.is_none(), "duplicate label {}", label);
            } else {
                code.push(line);
            }
        }

        let mut next_var = 16;
        let mut rom = Vec::with_capacity(code.len());
        for line in code {
            let instr = if let Some(sym) = line.strip_prefix('@') {
                match sym.parse::<i16>() {
                    Ok(value) => {
                        assert!(value >= 0, "negative immediate {}", line);
                        Instr::Address(value)
                    }
                    Err(_) => {
                        let addr = *symbols.entry(sym.to_string()).or_insert_with(|| {
                            next_var += 1;
                            next_var - 1
                        });
                        Instr::Address(addr)
                    }
                }
            } else {
                let (dest, rest) = line.split_once('=').unwrap_or(("", line));
                let (comp, jump) = match rest.split_once(';') {
                    Some((comp, jump)) => (comp, Some(jump.to_string())),
                    None => (rest, None),
                };
                Instr::Compute {
                    dest: dest.to_string(),
                    comp: comp.to_string(),
                    jump,
                }
            };
            rom.push(instr);
        }

        Machine {
            ram: vec![0; 1 << 16],
            rom,
            symbols,
            pc: 0,
            a: 0,
            d: 0,
        }
    }

    /// Loads `asm` with the segment bases used by the standard VM test
    /// scripts.
    pub fn with_frame(asm: &[String]) -> Self {
        let mut machine = Machine::load(asm);
        machine.ram[SP] = 256;
        machine.ram[LCL] = 300;
        machine.ram[ARG] = 400;
        machine.ram[THIS] = 3000;
        machine.ram[THAT] = 3010;
        machine
    }

    pub fn symbol(&self, name: &str) -> Option<i16> {
        self.symbols.get(name).copied()
    }

    pub fn static_cell(&self, name: &str) -> i16 {
        let addr = self.symbol(name).unwrap_or_else(|| panic!("no symbol {}", name));
        self.ram[addr as usize]
    }

    pub fn sp(&self) -> i16 {
        self.ram[SP]
    }

    pub fn top(&self) -> i16 {
        self.ram[(self.ram[SP] - 1) as usize]
    }

    fn eval(&self, comp: &str) -> i16 {
        let a = self.a;
        let d = self.d;
        let m = self.ram[a as u16 as usize];
        match comp {
            "0" => 0,
            "1" => 1,
            "-1" => -1,
            "D" => d,
            "A" => a,
            "M" => m,
            "!D" => !d,
            "!A" => !a,
            "!M" => !m,
            "-D" => d.wrapping_neg(),
            "-A" => a.wrapping_neg(),
            "-M" => m.wrapping_neg(),
            "D+1" => d.wrapping_add(1),
            "A+1" => a.wrapping_add(1),
            "M+1" => m.wrapping_add(1),
            "D-1" => d.wrapping_sub(1),
            "A-1" => a.wrapping_sub(1),
            "M-1" => m.wrapping_sub(1),
            "D+A" => d.wrapping_add(a),
            "D+M" => d.wrapping_add(m),
            "D-A" => d.wrapping_sub(a),
            "D-M" => d.wrapping_sub(m),
            "A-D" => a.wrapping_sub(d),
            "M-D" => m.wrapping_sub(d),
            "D&A" => d & a,
            "D&M" => d & m,
            "D|A" => d | a,
            "D|M" => d | m,
            "D<<" => d.wrapping_shl(1),
            "A<<" => a.wrapping_shl(1),
            "M<<" => m.wrapping_shl(1),
            "D>>" => d >> 1,
            "A>>" => a >> 1,
            "M>>" => m >> 1,
            _ => panic!("unsupported comp `{}`", comp),
        }
    }

    /// Executes one instruction. Returns `false` once the program has run off
    /// the end of ROM or entered a `goto`-to-self halt loop.
    pub fn step(&mut self) -> bool {
        let Some(instr) = self.rom.get(self.pc).cloned() else {
            return false;
        };

        match instr {
            Instr::Address(value) => {
                self.a = value;
                self.pc += 1;
            }
            Instr::Compute { dest, comp, jump } => {
                let value = self.eval(&comp);
                let old_a = self.a;
                if dest.contains('M') {
                    self.ram[old_a as u16 as usize] = value;
                }
                if dest.contains('A') {
                    self.a = value;
                }
                if dest.contains('D') {
                    self.d = value;
                }

                let taken = match jump.as_deref() {
                    None => false,
                    Some("JGT") => value > 0,
                    Some("JEQ") => value == 0,
                    Some("JGE") => value >= 0,
                    Some("JLT") => value < 0,
                    Some("JNE") => value != 0,
                    Some("JLE") => value <= 0,
                    Some("JMP") => true,
                    Some(other) => panic!("unsupported jump `{}`", other),
                };
                if taken {
                    let target = old_a as u16 as usize;
                    if target + 1 == self.pc {
                        return false;
                    }
                    self.pc = target;
                } else {
                    self.pc += 1;
                }
            }
        }
        true
    }

    /// Runs until halt, returning the number of instructions executed.
    pub fn run(&mut self, max_steps: usize) -> usize {
        let mut steps = 0;
        while self.step() {
            steps += 1;
            assert!(steps <= max_steps, "program did not halt in {} steps", max_steps);
        }
        steps
    }
}

/// Translates and loads a single unit.
pub fn machine(unit: &str, source: &str) -> Machine {
    let asm = vmil_translator::translate_source(unit, source).expect("translation failed");
    Machine::with_frame(&asm)
}

/// Runs a single unit to completion with the default frame.
pub fn run(source: &str) -> Machine {
    let mut machine = machine("Test", source);
    machine.run(1_000_000);
    machine
}
