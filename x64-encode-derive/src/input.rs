//! Parsing for the `x64_opcodes!` declarative table (§6.4).
//!
//! Mirrors the flat row format of the `impl_instructions!` table this crate
//! is modeled on: one doc string followed by one row of plain tokens per
//! mnemonic variant, rather than a brace-delimited struct literal. Operand
//! shapes and sizes are themselves small bracketed lists of identifiers /
//! integers, matched by string rather than by dedicated keyword tokens --
//! this keeps the grammar forgiving, the same tradeoff the teacher macro
//! makes when it matches argument type idents by `to_string()`.

use syn::{
    bracketed,
    parse::{Parse, ParseStream},
    Ident, LitInt, LitStr, Result,
};

/// One operand's role in the instruction's encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Shape {
    /// Encoded in ModRM.reg, a plain register operand.
    Reg,
    /// Encoded in ModRM.rm (+ SIB/disp as needed): register or memory.
    RmReg,
    /// The sole r/m operand of a unary instruction (ModRM.reg holds a
    /// fixed opcode-extension digit instead of a second operand).
    RmOnly,
    /// An 8-bit immediate.
    Imm8,
    /// A 32-bit immediate.
    Imm32,
    /// A relative branch target (label reference resolved by the Builder).
    Rel,
}

impl Shape {
    fn from_ident(ident: &Ident) -> Result<Self> {
        Ok(match ident.to_string().as_str() {
            "Reg" => Shape::Reg,
            "RmReg" => Shape::RmReg,
            "RmOnly" => Shape::RmOnly,
            "Imm8" => Shape::Imm8,
            "Imm32" => Shape::Imm32,
            "Rel" => Shape::Rel,
            other => {
                return Err(syn::Error::new_spanned(
                    ident,
                    format!("unknown operand shape `{other}`"),
                ))
            }
        })
    }
}

/// One code-map prefix an opcode may require (§3.3, §4.6 step 5).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CodeMap {
    None,
    Map0F,
    Map0F38,
    Map0F3A,
}

impl CodeMap {
    fn from_ident(ident: &Ident) -> Result<Self> {
        Ok(match ident.to_string().as_str() {
            "None" => CodeMap::None,
            "Map0F" => CodeMap::Map0F,
            "Map0F38" => CodeMap::Map0F38,
            "Map0F3A" => CodeMap::Map0F3A,
            other => {
                return Err(syn::Error::new_spanned(
                    ident,
                    format!("unknown code map `{other}`"),
                ))
            }
        })
    }
}

/// A single declarative table row: one mnemonic/operand-shape variant.
#[derive(Debug, Clone)]
pub struct OpcodeRow {
    pub doc: LitStr,
    pub opcode: u8,
    pub map: CodeMap,
    pub mnemonic: Ident,
    pub method_name: Ident,
    pub shapes: Vec<Shape>,
    pub sizes: Vec<u32>,
    pub digit: Option<u8>,
    pub relaxable: bool,
}

fn parse_bracketed_idents(input: ParseStream) -> Result<Vec<Ident>> {
    let content;
    bracketed!(content in input);
    let mut out = Vec::new();
    while !content.is_empty() {
        out.push(content.parse::<Ident>()?);
        if !content.is_empty() {
            content.parse::<syn::Token![,]>()?;
        }
    }
    Ok(out)
}

fn parse_bracketed_ints(input: ParseStream) -> Result<Vec<u32>> {
    let content;
    bracketed!(content in input);
    let mut out = Vec::new();
    while !content.is_empty() {
        out.push(content.parse::<LitInt>()?.base10_parse::<u32>()?);
        if !content.is_empty() {
            content.parse::<syn::Token![,]>()?;
        }
    }
    Ok(out)
}

impl Parse for OpcodeRow {
    fn parse(input: ParseStream) -> Result<Self> {
        let doc: LitStr = input.parse()?;
        let opcode_lit: LitInt = input.parse()?;
        // `LitInt::base10_parse` parses the literal's *value*, regardless
        // of whether it was written in hex (`0x0F`) or decimal -- syn
        // normalizes the digits before we ever see them.
        let opcode = opcode_lit.base10_parse::<u8>()?;
        let map_ident: Ident = input.parse()?;
        let map = CodeMap::from_ident(&map_ident)?;
        let mnemonic: Ident = input.parse()?;
        let method_name: Ident = input.parse()?;

        let shape_idents = parse_bracketed_idents(input)?;
        let shapes = shape_idents
            .iter()
            .map(Shape::from_ident)
            .collect::<Result<Vec<_>>>()?;

        // `sizes` keyword
        let sizes_kw: Ident = input.parse()?;
        if sizes_kw != "sizes" {
            return Err(syn::Error::new_spanned(sizes_kw, "expected `sizes`"));
        }
        let sizes = parse_bracketed_ints(input)?;

        let mut digit = None;
        let mut relaxable = true;
        while input.peek(Ident) {
            let kw: Ident = input.parse()?;
            match kw.to_string().as_str() {
                "digit" => {
                    let d = parse_bracketed_ints(input)?;
                    digit = d.first().map(|v| *v as u8);
                }
                "norelax" => relaxable = false,
                other => {
                    return Err(syn::Error::new_spanned(
                        kw,
                        format!("expected `digit` or `norelax`, found `{other}`"),
                    ))
                }
            }
        }

        Ok(OpcodeRow {
            doc,
            opcode,
            map,
            mnemonic,
            method_name,
            shapes,
            sizes,
            digit,
            relaxable,
        })
    }
}

/// The full declarative table: a flat sequence of rows.
#[derive(Debug, Clone)]
pub struct OpcodeTable {
    pub rows: Vec<OpcodeRow>,
}

impl Parse for OpcodeTable {
    fn parse(input: ParseStream) -> Result<Self> {
        let mut rows = Vec::new();
        while !input.is_empty() {
            rows.push(input.parse::<OpcodeRow>()?);
        }
        Ok(OpcodeTable { rows })
    }
}
