//! `x64_opcodes!` -- the build-time opcode-table generator of §6.4.
//!
//! Not part of the runtime pipeline: its sole output is a header of
//! `Builder` methods (and the `OpcodeSpec` table backing them), generated
//! once from the declarative row list passed to the macro. Modeled
//! directly on `fuel-asm`'s `impl_instructions!`, which plays the same
//! role for that project's bytecode.

mod codegen;
mod input;

use proc_macro::TokenStream;
use syn::parse_macro_input;

use input::OpcodeTable;

/// Expands a flat list of opcode rows into an `OPCODE_TABLE` static and a
/// matching set of `Builder` methods. See `x64-encode/src/opcode_table.rs`
/// for the single call site and the row grammar.
#[proc_macro]
pub fn x64_opcodes(input: TokenStream) -> TokenStream {
    let table = parse_macro_input!(input as OpcodeTable);
    match codegen::generate(&table) {
        Ok(tokens) => tokens.into(),
        Err(err) => err.to_compile_error().into(),
    }
}
