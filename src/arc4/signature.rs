//! ARC-4 method-signature parsing and selector derivation.
//!
//! A signature has the shape `name(arg1,arg2,...)return`, where each arg and
//! the return are ARC-4 canonical type names (nested parenthesised tuples
//! included). The selector is the first four bytes of the SHA-512/256 hash of
//! the canonical signature string.

use sha2::{Digest, Sha512_256};

use crate::error::CodeError;
use crate::source::SourceLocation;
use crate::wtypes::{Arc4Type, TransactionType, WType, arc4_address, arc4_byte, arc4_string};

/// A parsed and resolved method signature.
///
/// Argument types are wtypes rather than ARC-4 types because a signature may
/// also name transaction kinds (`pay`, `axfer`, ...) and the reference types
/// (`account`, `asset`, `application`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Arc4Signature {
    pub method_name: String,
    pub arg_types: Vec<WType>,
    /// `None` means the method returns nothing (`void` in signatures)
    pub return_type: Option<Arc4Type>,
}

impl Arc4Signature {
    /// The canonical signature string, e.g. `hello(uint64,string)uint64`
    pub fn canonical(&self) -> String {
        let args: Vec<String> = self.arg_types.iter().map(signature_type_name).collect();
        let returns = match &self.return_type {
            Some(t) => t.arc4_name(),
            None => "void".into(),
        };
        format!("{}({}){}", self.method_name, args.join(","), returns)
    }

    /// The 4-byte ABI selector of this signature
    pub fn selector(&self) -> [u8; 4] {
        method_selector(&self.canonical())
    }
}

/// First four bytes of SHA-512/256 over the canonical signature string
pub fn method_selector(canonical_signature: &str) -> [u8; 4] {
    let hash = Sha512_256::digest(canonical_signature.as_bytes());
    let mut selector = [0u8; 4];
    selector.copy_from_slice(&hash[..4]);
    selector
}

/// The structural pieces of a signature string: arg list and returns remain
/// unparsed, and either may be absent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SplitSignature {
    pub name: String,
    /// `None` when no arg list was written (arg types are then inferred from
    /// the call site); `Some("")` when it was written but empty
    pub args: Option<String>,
    pub returns: Option<String>,
}

/// Parse a full method signature. When the arg list is omitted the caller
/// must infer argument types itself, so this returns the parsed args only if
/// present.
pub fn parse_method_signature(
    signature: &str,
    loc: Option<SourceLocation>,
) -> Result<(SplitSignature, Option<Vec<WType>>, Option<Arc4Type>), CodeError> {
    let split = split_signature(signature, loc)?;
    let args = match &split.args {
        None => None,
        Some(args) if args.is_empty() => Some(vec![]),
        Some(args) => {
            let mut types = Vec::new();
            for part in split_tuple_types(args, loc)? {
                types.push(signature_type_from_name(&part, loc)?);
            }
            Some(types)
        }
    };
    let returns = match &split.returns {
        None => None,
        Some(r) if r == "void" => None,
        Some(r) => Some(arc4_type_from_name(r, loc)?),
    };
    Ok((split, args, returns))
}

/// Resolve a name appearing in a signature's argument list: a transaction
/// kind, a reference type, or an ARC-4 type
pub fn signature_type_from_name(
    name: &str,
    loc: Option<SourceLocation>,
) -> Result<WType, CodeError> {
    match name {
        "txn" => Ok(WType::GroupTransaction(None)),
        "pay" => Ok(WType::GroupTransaction(Some(TransactionType::Pay))),
        "keyreg" => Ok(WType::GroupTransaction(Some(TransactionType::KeyReg))),
        "acfg" => Ok(WType::GroupTransaction(Some(TransactionType::AssetConfig))),
        "axfer" => Ok(WType::GroupTransaction(Some(TransactionType::AssetTransfer))),
        "afrz" => Ok(WType::GroupTransaction(Some(TransactionType::AssetFreeze))),
        "appl" => Ok(WType::GroupTransaction(Some(TransactionType::ApplicationCall))),
        "account" => Ok(WType::Account),
        "asset" => Ok(WType::Asset),
        "application" => Ok(WType::Application),
        _ => Ok(WType::Arc4(arc4_type_from_name(name, loc)?)),
    }
}

/// Render an argument wtype the way a canonical signature writes it
pub fn signature_type_name(wtype: &WType) -> String {
    match wtype {
        WType::GroupTransaction(kind) | WType::InnerTransaction(kind)
        | WType::InnerTransactionFields(kind) => match kind {
            Some(t) => t.name().to_string(),
            None => "txn".to_string(),
        },
        WType::Account => "account".to_string(),
        WType::Asset => "asset".to_string(),
        WType::Application => "application".to_string(),
        WType::Arc4(arc4) => arc4.arc4_name(),
        other => other.name(),
    }
}

/// Split a signature string into name, arg list, and return type, tracking
/// parenthesis depth. Structural problems are errors; an ill-formed name is
/// reported by the caller so parsing can continue.
pub fn split_signature(
    signature: &str,
    loc: Option<SourceLocation>,
) -> Result<SplitSignature, CodeError> {
    let (name, rest) = match signature.find('(') {
        None => {
            // no parens at all: the whole string is a (possibly bad) name
            return Ok(SplitSignature {
                name: signature.to_string(),
                args: None,
                returns: None,
            });
        }
        Some(idx) => (&signature[..idx], &signature[idx..]),
    };
    let Some(args_len) = balanced_group_len(rest) else {
        return Err(CodeError::new(
            format!(
                "invalid signature, args not well defined: name={name:?}, remaining={:?}",
                &rest[1..]
            ),
            loc,
        ));
    };
    let args = &rest[1..args_len - 1];
    let suffix = &rest[args_len..];

    let returns = if suffix.is_empty() {
        None
    } else if let Some(paren) = suffix.find('(') {
        if paren > 0 {
            // an atom followed by more text
            return Err(CodeError::new(
                format!(
                    "invalid signature, text after returns: name={name:?}, args={args:?}, \
                     returns={:?}, remaining={:?}",
                    &suffix[..paren],
                    &suffix[paren..]
                ),
                loc,
            ));
        }
        let Some(group_len) = balanced_group_len(suffix) else {
            return Err(CodeError::new(
                format!("invalid signature, returns not well defined: name={name:?}"),
                loc,
            ));
        };
        if group_len < suffix.len() {
            return Err(CodeError::new(
                format!(
                    "invalid signature, text after returns: name={name:?}, args={args:?}, \
                     returns={:?}, remaining={:?}",
                    &suffix[..group_len],
                    &suffix[group_len..]
                ),
                loc,
            ));
        }
        Some(suffix.to_string())
    } else {
        Some(suffix.to_string())
    };

    Ok(SplitSignature {
        name: name.to_string(),
        args: Some(args.to_string()),
        returns,
    })
}

// byte length of the balanced "(...)" group `s` starts with, if any
fn balanced_group_len(s: &str) -> Option<usize> {
    let mut level = 0usize;
    for (idx, tok) in s.char_indices() {
        match tok {
            '(' => level += 1,
            ')' => {
                level = level.checked_sub(1)?;
                if level == 0 {
                    return Some(idx + 1);
                }
            }
            _ => {}
        }
    }
    None
}

/// Method names must look like identifiers
pub fn is_valid_method_name(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Split a comma-separated list of ARC-4 type names at the top level,
/// respecting nested tuple parentheses
pub fn split_tuple_types(
    types: &str,
    loc: Option<SourceLocation>,
) -> Result<Vec<String>, CodeError> {
    let mut parts = Vec::new();
    let mut level = 0usize;
    let mut start = 0;
    for (idx, tok) in types.char_indices() {
        match tok {
            '(' => level += 1,
            ')' => {
                level = level
                    .checked_sub(1)
                    .ok_or_else(|| CodeError::new("unbalanced parentheses in type list", loc))?;
            }
            ',' if level == 0 => {
                parts.push(types[start..idx].to_string());
                start = idx + 1;
            }
            _ => {}
        }
    }
    if level != 0 {
        return Err(CodeError::new("unbalanced parentheses in type list", loc));
    }
    parts.push(types[start..].to_string());
    Ok(parts)
}

/// Resolve an ARC-4 canonical type name into its wtype
pub fn arc4_type_from_name(
    name: &str,
    loc: Option<SourceLocation>,
) -> Result<Arc4Type, CodeError> {
    let unknown = || CodeError::new(format!("unknown ARC-4 type: {name:?}"), loc);

    if let Some(inner) = name.strip_suffix("[]") {
        let element = arc4_type_from_name(inner, loc)?;
        return Arc4Type::dynamic_array(crate::wtypes::WType::Arc4(element), loc);
    }
    if let Some(open) = name.rfind('[') {
        let Some(size_text) = name[open + 1..].strip_suffix(']') else {
            return Err(unknown());
        };
        let size: i64 = size_text.parse().map_err(|_| unknown())?;
        let element = arc4_type_from_name(&name[..open], loc)?;
        return Arc4Type::static_array(crate::wtypes::WType::Arc4(element), size, loc);
    }
    if name.starts_with('(') {
        if balanced_group_len(name) != Some(name.len()) {
            return Err(unknown());
        }
        let mut types = Vec::new();
        for part in split_tuple_types(&name[1..name.len() - 1], loc)? {
            types.push(crate::wtypes::WType::Arc4(arc4_type_from_name(&part, loc)?));
        }
        return Arc4Type::tuple(types, loc);
    }
    match name {
        "bool" => Ok(Arc4Type::Bool),
        "byte" => Ok(arc4_byte()),
        "string" => Ok(arc4_string()),
        "address" => Ok(arc4_address()),
        _ => {
            if let Some(bits) = name.strip_prefix("ufixed") {
                let (n, m) = bits.split_once('x').ok_or_else(unknown)?;
                let n: u32 = n.parse().map_err(|_| unknown())?;
                let m: u32 = m.parse().map_err(|_| unknown())?;
                return Arc4Type::ufixed_n_x_m(n, m, loc);
            }
            if let Some(bits) = name.strip_prefix("uint") {
                let n: u32 = bits.parse().map_err(|_| unknown())?;
                return Arc4Type::uint_n(n, loc);
            }
            Err(unknown())
        }
    }
}
