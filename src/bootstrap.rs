//! One-time program initialisation.

use log::debug;

use crate::translator::{CodegenError, Translator, MAX_IMMEDIATE};

/// Unit name used for the bootstrap's own return label.
pub const BOOTSTRAP_UNIT: &str = "__bootstrap";

/// Conventional first stack cell, just above the static area.
pub const DEFAULT_STACK_BASE: u16 = 256;

pub const DEFAULT_ENTRY: &str = "Sys.init";

/// Sets SP to `stack_base` and calls `entry` with no arguments.
pub fn bootstrap(stack_base: u16, entry: &str) -> Result<Vec<String>, CodegenError> {
    if stack_base > MAX_IMMEDIATE {
        return Err(CodegenError::ImmediateTooLarge {
            what: "stack base",
            value: u32::from(stack_base),
        });
    }
    debug!("bootstrap: SP = {}, entry = {}", stack_base, entry);

    let mut out = vec![
        "// bootstrap".to_string(),
        format!("@{}", stack_base),
        "D=A".to_string(),
        "@SP".to_string(),
        "M=D".to_string(),
    ];
    out.extend(Translator::new(BOOTSTRAP_UNIT).call(entry, 0)?);
    Ok(out)
}
