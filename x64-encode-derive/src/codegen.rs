//! Token generation for `x64_opcodes!` rows.
//!
//! Every row lowers to (a) one `OpcodeSpec` table entry, carrying the raw
//! encoding facts, and (b) one typed `Builder` method whose body is a
//! single delegating call into a hand-written runtime helper keyed by the
//! row's operand shape. Keeping the generated bodies to one-line
//! delegations -- rather than inlining ModRM/SIB logic per row -- is a
//! deliberate simplification: the bit-packing itself lives once, by hand,
//! in `encoder.rs`/`builder.rs`, and stays reviewable there.

use proc_macro2::TokenStream;
use quote::quote;

use crate::input::{CodeMap, OpcodeRow, OpcodeTable, Shape};

fn map_tokens(map: CodeMap) -> TokenStream {
    match map {
        CodeMap::None => quote! { crate::CodeMap::None },
        CodeMap::Map0F => quote! { crate::CodeMap::Map0F },
        CodeMap::Map0F38 => quote! { crate::CodeMap::Map0F38 },
        CodeMap::Map0F3A => quote! { crate::CodeMap::Map0F3A },
    }
}

fn digit_tokens(digit: Option<u8>) -> TokenStream {
    match digit {
        Some(d) => quote! { Some(#d) },
        None => quote! { None },
    }
}

fn table_entry(row: &OpcodeRow) -> TokenStream {
    let opcode = row.opcode;
    let map = map_tokens(row.map);
    let digit = digit_tokens(row.digit);
    let sizes = &row.sizes;
    let mnemonic_str = row.mnemonic.to_string();
    let method_str = row.method_name.to_string();
    let relaxable = row.relaxable;
    quote! {
        crate::OpcodeSpec {
            mnemonic: #mnemonic_str,
            method: #method_str,
            opcode: #opcode,
            map: #map,
            digit: #digit,
            sizes: &[#(#sizes),*],
            relaxable: #relaxable,
        }
    }
}

fn method_def(row: &OpcodeRow) -> syn::Result<TokenStream> {
    let name = &row.method_name;
    let doc = &row.doc;
    let opcode = row.opcode;
    let map = map_tokens(row.map);

    let body = match row.shapes.as_slice() {
        [Shape::RmReg, Shape::Reg] => quote! {
            pub fn #name(&mut self, rm: impl Into<crate::RmOperand>, reg: crate::Reg, size: crate::OperandSize) -> &mut Self {
                self.emit_rm_reg(#opcode, #map, size, rm.into(), reg)
            }
        },
        [Shape::Reg, Shape::RmReg] => quote! {
            pub fn #name(&mut self, reg: crate::Reg, rm: impl Into<crate::RmOperand>, size: crate::OperandSize) -> &mut Self {
                self.emit_rm_reg(#opcode, #map, size, rm.into(), reg)
            }
        },
        [Shape::RmReg, Shape::Imm32] => {
            let digit = row.digit.ok_or_else(|| {
                syn::Error::new_spanned(&row.mnemonic, "RmReg/Imm32 form requires `digit[..]`")
            })?;
            quote! {
                pub fn #name(&mut self, rm: impl Into<crate::RmOperand>, imm: i32, size: crate::OperandSize) -> &mut Self {
                    self.emit_rm_imm(#opcode, #map, size, rm.into(), #digit, crate::Immediate::Imm32(imm))
                }
            }
        }
        [Shape::RmReg, Shape::Imm8] => {
            let digit = row.digit.ok_or_else(|| {
                syn::Error::new_spanned(&row.mnemonic, "RmReg/Imm8 form requires `digit[..]`")
            })?;
            quote! {
                pub fn #name(&mut self, rm: impl Into<crate::RmOperand>, imm: i8, size: crate::OperandSize) -> &mut Self {
                    self.emit_rm_imm(#opcode, #map, size, rm.into(), #digit, crate::Immediate::Imm8(imm))
                }
            }
        }
        [Shape::RmOnly] => {
            let digit = row.digit.ok_or_else(|| {
                syn::Error::new_spanned(&row.mnemonic, "RmOnly form requires `digit[..]`")
            })?;
            quote! {
                pub fn #name(&mut self, rm: impl Into<crate::RmOperand>, size: crate::OperandSize) -> &mut Self {
                    self.emit_rm_unary(#opcode, #map, size, rm.into(), #digit)
                }
            }
        }
        [Shape::Reg, Shape::RmReg, Shape::Imm8] => quote! {
            pub fn #name(&mut self, reg: crate::Reg, rm: impl Into<crate::RmOperand>, imm: i8, size: crate::OperandSize) -> &mut Self {
                self.emit_rm_reg_imm(#opcode, #map, size, rm.into(), reg, imm)
            }
        },
        [Shape::Rel] => {
            let relaxable = row.relaxable;
            quote! {
                pub fn #name(&mut self, target: crate::Label) -> &mut Self {
                    self.emit_jump(#opcode, #map, #relaxable, target)
                }
            }
        }
        [] => quote! {
            pub fn #name(&mut self) -> &mut Self {
                self.emit_plain(#opcode, #map)
            }
        },
        other => {
            return Err(syn::Error::new_spanned(
                &row.mnemonic,
                format!("unsupported operand shape combination: {other:?}"),
            ))
        }
    };

    Ok(quote! {
        #[doc = #doc]
        #body
    })
}

pub fn generate(table: &OpcodeTable) -> syn::Result<TokenStream> {
    let mut entries = Vec::new();
    let mut methods = Vec::new();
    for row in &table.rows {
        entries.push(table_entry(row));
        methods.push(method_def(row)?);
    }

    Ok(quote! {
        /// Declarative table of every opcode variant registered through
        /// `x64_opcodes!`, in declaration order. Consulted by tests and by
        /// diagnostics; not on the hot encode path.
        pub static OPCODE_TABLE: &[crate::OpcodeSpec] = &[
            #(#entries),*
        ];

        impl crate::Builder {
            #(#methods)*
        }
    })
}
