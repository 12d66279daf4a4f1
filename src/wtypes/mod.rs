//! The closed wire-type universe of the compiler.
//!
//! Every value the compiler reasons about carries a wire type ("wtype"):
//! either a native AVM stack value, an aggregate that only exists at compile
//! time, or an ARC-4 encoded value. The set is closed; consumers pattern-match
//! exhaustively rather than downcast.

pub mod queries;

use std::fmt;
use std::hash::{Hash, Hasher};
use std::rc::Rc;

use crate::error::{CodeError, InternalError};
use crate::source::SourceLocation;

/// Maximum byte-string length on the AVM
pub const MAX_BYTES_LENGTH: usize = 4096;
/// Maximum biguint width in bits
pub const MAX_BIGUINT_BITS: u32 = 512;
/// Length of an encoded address string
pub const ENCODED_ADDRESS_LENGTH: usize = 58;
/// Length of a public key hash within a decoded address
pub const PUBLIC_KEY_HASH_LENGTH: usize = 32;
/// Length of the checksum suffix within a decoded address
pub const ADDRESS_CHECKSUM_LENGTH: usize = 4;

/// The two native AVM stack slot types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AvmType {
    Uint64,
    Bytes,
}

impl fmt::Display for AvmType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Uint64 => write!(f, "uint64"),
            Self::Bytes => write!(f, "bytes"),
        }
    }
}

/// Transaction kinds, as used to parameterise transaction-related wtypes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransactionType {
    Pay,
    KeyReg,
    AssetConfig,
    AssetTransfer,
    AssetFreeze,
    ApplicationCall,
}

impl TransactionType {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Pay => "pay",
            Self::KeyReg => "keyreg",
            Self::AssetConfig => "acfg",
            Self::AssetTransfer => "axfer",
            Self::AssetFreeze => "afrz",
            Self::ApplicationCall => "appl",
        }
    }
}

/// A user-declared (native, non-ARC4) struct type
#[derive(Debug)]
pub struct WStructType {
    pub name: String,
    pub fields: Vec<(String, WType)>,
    pub immutable: bool,
}

/// A native array type; always mutable
#[derive(Debug)]
pub struct WArrayType {
    pub element: WType,
}

/// A native tuple type; always immutable
#[derive(Debug)]
pub struct WTupleType {
    pub types: Vec<WType>,
}

/// ARC-4 unsigned integer of `n` bits
#[derive(Debug)]
pub struct Arc4UIntN {
    pub n: u32,
    /// canonical-name alias, e.g. `byte` for `uint8`
    pub alias: Option<String>,
}

/// ARC-4 fixed-point unsigned decimal: `n` bits with `m` decimal digits
#[derive(Debug)]
pub struct Arc4UFixedNxM {
    pub n: u32,
    pub m: u32,
}

/// ARC-4 tuple; immutability is the conjunction of its members'
#[derive(Debug)]
pub struct Arc4TupleType {
    pub types: Vec<Arc4Type>,
    pub immutable: bool,
}

/// ARC-4 dynamic-length array
#[derive(Debug)]
pub struct Arc4DynamicArrayType {
    pub element: Arc4Type,
    pub alias: Option<String>,
    /// native wtype a decode yields, if any (e.g. `string` for `arc4.string`)
    pub native: Option<WType>,
    pub immutable: bool,
}

/// ARC-4 fixed-length array
#[derive(Debug)]
pub struct Arc4StaticArrayType {
    pub element: Arc4Type,
    pub size: usize,
    pub alias: Option<String>,
    pub native: Option<WType>,
    pub immutable: bool,
}

/// ARC-4 struct; encode-only (no decode target)
#[derive(Debug)]
pub struct Arc4StructType {
    pub name: String,
    pub fields: Vec<(String, Arc4Type)>,
    pub immutable: bool,
}

/// The ARC-4 branch of the wtype universe. All variants have scalar class
/// `bytes`: an ARC-4 value is a single encoded byte string on the stack.
#[derive(Debug, Clone)]
pub enum Arc4Type {
    Bool,
    UIntN(Rc<Arc4UIntN>),
    UFixedNxM(Rc<Arc4UFixedNxM>),
    Tuple(Rc<Arc4TupleType>),
    DynamicArray(Rc<Arc4DynamicArrayType>),
    StaticArray(Rc<Arc4StaticArrayType>),
    Struct(Rc<Arc4StructType>),
}

/// The closed wire-type union
#[derive(Debug, Clone)]
pub enum WType {
    Void,
    Bool,
    Uint64,
    BigUInt,
    Bytes,
    String,
    Asset,
    Account,
    Application,
    StateKey,
    BoxKey,
    GroupTransaction(Option<TransactionType>),
    InnerTransaction(Option<TransactionType>),
    InnerTransactionFields(Option<TransactionType>),
    Struct(Rc<WStructType>),
    Array(Rc<WArrayType>),
    Tuple(Rc<WTupleType>),
    Arc4(Arc4Type),
}

impl WType {
    /// Canonical name; drives diagnostics and structural equality
    pub fn name(&self) -> String {
        match self {
            Self::Void => "void".into(),
            Self::Bool => "bool".into(),
            Self::Uint64 => "uint64".into(),
            Self::BigUInt => "biguint".into(),
            Self::Bytes => "bytes".into(),
            Self::String => "string".into(),
            Self::Asset => "asset".into(),
            Self::Account => "account".into(),
            Self::Application => "application".into(),
            Self::StateKey => "state_key".into(),
            Self::BoxKey => "box_key".into(),
            Self::GroupTransaction(t) => txn_related_name("group_transaction", *t),
            Self::InnerTransaction(t) => txn_related_name("inner_transaction", *t),
            Self::InnerTransactionFields(t) => txn_related_name("inner_transaction_fields", *t),
            Self::Struct(s) => s.name.clone(),
            Self::Array(a) => format!("array<{}>", a.element.name()),
            Self::Tuple(t) => {
                let names: Vec<String> = t.types.iter().map(WType::name).collect();
                format!("tuple<{}>", names.join(","))
            }
            Self::Arc4(a) => a.name(),
        }
    }

    /// The unbound AVM stack type, or `None` for aggregates that cannot live
    /// on the stack
    pub fn scalar_type(&self) -> Option<AvmType> {
        match self {
            Self::Void => None,
            Self::Bool | Self::Uint64 | Self::Asset | Self::Application => Some(AvmType::Uint64),
            Self::BigUInt
            | Self::Bytes
            | Self::String
            | Self::Account
            | Self::StateKey
            | Self::BoxKey => Some(AvmType::Bytes),
            Self::GroupTransaction(_) => Some(AvmType::Uint64),
            Self::InnerTransaction(_) | Self::InnerTransactionFields(_) => None,
            Self::Struct(_) | Self::Array(_) | Self::Tuple(_) => None,
            Self::Arc4(_) => Some(AvmType::Bytes),
        }
    }

    /// Ephemeral types are not suitable for naive storage or persistence,
    /// even when their underlying type is a simple stack value
    pub fn is_ephemeral(&self) -> bool {
        matches!(
            self,
            Self::GroupTransaction(_) | Self::InnerTransaction(_) | Self::InnerTransactionFields(_)
        )
    }

    pub fn is_immutable(&self) -> bool {
        match self {
            Self::Array(_) => false,
            Self::Struct(s) => s.immutable,
            Self::Arc4(a) => a.is_immutable(),
            _ => true,
        }
    }

    pub fn is_arc4(&self) -> bool {
        matches!(self, Self::Arc4(_))
    }

    pub fn as_arc4(&self) -> Option<&Arc4Type> {
        match self {
            Self::Arc4(a) => Some(a),
            _ => None,
        }
    }

    /// Construct a native struct type, validating its fields
    pub fn struct_type(
        name: impl Into<String>,
        fields: Vec<(String, WType)>,
        immutable: bool,
        loc: Option<SourceLocation>,
    ) -> Result<Self, CodeError> {
        if fields.is_empty() {
            return Err(CodeError::new("struct needs fields", loc));
        }
        if fields.iter().any(|(_, t)| matches!(t, WType::Void)) {
            return Err(CodeError::new("struct should not contain void types", loc));
        }
        Ok(Self::Struct(Rc::new(WStructType {
            name: name.into(),
            fields,
            immutable,
        })))
    }

    /// Construct a native array type
    pub fn array_type(element: WType, loc: Option<SourceLocation>) -> Result<Self, CodeError> {
        if matches!(element, WType::Void) {
            return Err(CodeError::new("array element type cannot be void", loc));
        }
        Ok(Self::Array(Rc::new(WArrayType { element })))
    }

    /// Construct a native tuple type
    pub fn tuple_type(types: Vec<WType>, loc: Option<SourceLocation>) -> Result<Self, CodeError> {
        if types.is_empty() {
            return Err(CodeError::new("tuple needs types", loc));
        }
        if types.iter().any(|t| matches!(t, WType::Void)) {
            return Err(CodeError::new("tuple should not contain void types", loc));
        }
        Ok(Self::Tuple(Rc::new(WTupleType { types })))
    }
}

fn txn_related_name(base: &str, txn_type: Option<TransactionType>) -> String {
    match txn_type {
        Some(t) => format!("{base}_{}", t.name()),
        None => base.to_string(),
    }
}

impl Arc4Type {
    pub fn name(&self) -> String {
        match self {
            Self::Bool => "arc4.bool".into(),
            Self::UIntN(u) => format!("arc4.uint{}", u.n),
            Self::UFixedNxM(u) => format!("arc4.ufixed{}x{}", u.n, u.m),
            Self::Tuple(t) => {
                let names: Vec<String> = t.types.iter().map(Arc4Type::name).collect();
                format!("arc4.tuple<{}>", names.join(","))
            }
            Self::DynamicArray(a) => format!("arc4.dynamic_array<{}>", a.element.name()),
            Self::StaticArray(a) => {
                format!("arc4.static_array<{}, {}>", a.element.name(), a.size)
            }
            Self::Struct(s) => s.name.clone(),
        }
    }

    /// The ARC-4 canonical name, as used in method signatures. Aliased types
    /// (`byte`, `string`, `address`) render their alias; the alias is
    /// excluded from type equality so aliases unify with their expansions.
    pub fn arc4_name(&self) -> String {
        match self {
            Self::Bool => "bool".into(),
            Self::UIntN(u) => match &u.alias {
                Some(alias) => alias.clone(),
                None => format!("uint{}", u.n),
            },
            Self::UFixedNxM(u) => format!("ufixed{}x{}", u.n, u.m),
            Self::Tuple(t) => tuple_arc4_name(t.types.iter()),
            Self::DynamicArray(a) => match &a.alias {
                Some(alias) => alias.clone(),
                None => format!("{}[]", a.element.arc4_name()),
            },
            Self::StaticArray(a) => match &a.alias {
                Some(alias) => alias.clone(),
                None => format!("{}[{}]", a.element.arc4_name(), a.size),
            },
            Self::Struct(s) => tuple_arc4_name(s.fields.iter().map(|(_, t)| t)),
        }
    }

    /// The native wtype a decode operation yields, if decoding is supported
    pub fn decode_type(&self) -> Option<WType> {
        match self {
            Self::Bool => Some(WType::Bool),
            Self::UIntN(u) => Some(if u.n <= 64 { WType::Uint64 } else { WType::BigUInt }),
            Self::UFixedNxM(_) => None,
            Self::Tuple(t) => {
                let types = t.types.iter().cloned().map(WType::Arc4).collect();
                Some(WType::Tuple(Rc::new(WTupleType { types })))
            }
            Self::DynamicArray(a) => a.native.clone(),
            Self::StaticArray(a) => a.native.clone(),
            // encode-only: see DESIGN.md
            Self::Struct(_) => None,
        }
    }

    /// Whether a value of the given native wtype can be encoded into this
    /// ARC-4 type
    pub fn can_encode_type(&self, wtype: &WType) -> bool {
        if let Some(decode) = self.decode_type()
            && decode == *wtype
        {
            return true;
        }
        match self {
            Self::Bool => matches!(wtype, WType::Bool),
            Self::UIntN(_) => matches!(wtype, WType::Bool | WType::Uint64 | WType::BigUInt),
            Self::UFixedNxM(_) => false,
            Self::Tuple(t) => tuple_can_encode(t.types.iter(), wtype),
            Self::DynamicArray(a) => {
                matches!(&a.native, Some(n) if n == wtype)
                    || (a.element == arc4_byte() && matches!(wtype, WType::Bytes | WType::String))
            }
            Self::StaticArray(a) => matches!(&a.native, Some(n) if n == wtype),
            Self::Struct(s) => tuple_can_encode(s.fields.iter().map(|(_, t)| t), wtype),
        }
    }

    pub fn is_immutable(&self) -> bool {
        match self {
            Self::Bool | Self::UIntN(_) | Self::UFixedNxM(_) => true,
            Self::Tuple(t) => t.immutable,
            Self::DynamicArray(a) => a.immutable,
            Self::StaticArray(a) => a.immutable,
            Self::Struct(s) => s.immutable,
        }
    }

    /// Construct an `arc4.uintN` with the decode target implied by its width
    pub fn uint_n(n: u32, loc: Option<SourceLocation>) -> Result<Self, CodeError> {
        validate_bits(n, loc)?;
        Ok(Self::UIntN(Rc::new(Arc4UIntN { n, alias: None })))
    }

    /// Construct an `arc4.ufixedNxM`
    pub fn ufixed_n_x_m(n: u32, m: u32, loc: Option<SourceLocation>) -> Result<Self, CodeError> {
        validate_bits(n, loc)?;
        if !(1..=160).contains(&m) {
            return Err(CodeError::new(
                "precision must be between 1 and 160 inclusive",
                loc,
            ));
        }
        Ok(Self::UFixedNxM(Rc::new(Arc4UFixedNxM { n, m })))
    }

    /// Construct an ARC-4 tuple from wtypes, requiring every member to be
    /// ARC-4 encoded
    pub fn tuple(types: Vec<WType>, loc: Option<SourceLocation>) -> Result<Self, CodeError> {
        if types.is_empty() {
            return Err(CodeError::new("ARC-4 tuple cannot be empty", loc));
        }
        let mut arc4_types = Vec::with_capacity(types.len());
        let mut immutable = true;
        for (idx, typ) in types.iter().enumerate() {
            let Some(arc4) = typ.as_arc4() else {
                return Err(CodeError::new(
                    format!(
                        "invalid ARC-4 tuple type: type at index {idx} is not an ARC-4 encoded type"
                    ),
                    loc,
                ));
            };
            // counterintuitive but necessary: the encoding is a single bytes
            // value, so a mutable member makes the whole tuple mutable
            immutable = immutable && arc4.is_immutable();
            arc4_types.push(arc4.clone());
        }
        Ok(Self::Tuple(Rc::new(Arc4TupleType {
            types: arc4_types,
            immutable,
        })))
    }

    /// Construct a dynamic array over an ARC-4 element type
    pub fn dynamic_array(element: WType, loc: Option<SourceLocation>) -> Result<Self, CodeError> {
        let Some(element) = element.as_arc4() else {
            return Err(CodeError::new(
                "ARC-4 arrays must have an ARC-4 encoded element type",
                loc,
            ));
        };
        Ok(Self::DynamicArray(Rc::new(Arc4DynamicArrayType {
            element: element.clone(),
            alias: None,
            native: None,
            immutable: false,
        })))
    }

    /// Construct a static array over an ARC-4 element type
    pub fn static_array(
        element: WType,
        size: i64,
        loc: Option<SourceLocation>,
    ) -> Result<Self, CodeError> {
        let Some(element) = element.as_arc4() else {
            return Err(CodeError::new(
                "ARC-4 arrays must have an ARC-4 encoded element type",
                loc,
            ));
        };
        if size < 0 {
            return Err(CodeError::new(
                "ARC-4 static array size must be non-negative",
                loc,
            ));
        }
        Ok(Self::StaticArray(Rc::new(Arc4StaticArrayType {
            element: element.clone(),
            size: size as usize,
            alias: None,
            native: None,
            immutable: false,
        })))
    }

    /// Construct an ARC-4 struct, requiring every field to be ARC-4 encoded
    pub fn struct_type(
        name: impl Into<String>,
        fields: Vec<(String, WType)>,
        immutable: bool,
        loc: Option<SourceLocation>,
    ) -> Result<Self, CodeError> {
        if fields.is_empty() {
            return Err(CodeError::new("ARC-4 struct needs at least one element", loc));
        }
        let mut arc4_fields = Vec::with_capacity(fields.len());
        let mut bad_field_names = Vec::new();
        let mut immutable = immutable;
        for (field_name, field_wtype) in &fields {
            match field_wtype.as_arc4() {
                Some(arc4) => {
                    immutable = immutable && arc4.is_immutable();
                    arc4_fields.push((field_name.clone(), arc4.clone()));
                }
                None => bad_field_names.push(field_name.clone()),
            }
        }
        if !bad_field_names.is_empty() {
            return Err(CodeError::new(
                format!(
                    "invalid ARC-4 struct declaration, the following fields are not \
                     ARC-4 encoded types: {}",
                    bad_field_names.join(", ")
                ),
                loc,
            ));
        }
        Ok(Self::Struct(Rc::new(Arc4StructType {
            name: name.into(),
            fields: arc4_fields,
            immutable,
        })))
    }
}

fn validate_bits(n: u32, loc: Option<SourceLocation>) -> Result<(), CodeError> {
    if n % 8 != 0 {
        return Err(CodeError::new("bit size must be a multiple of 8", loc));
    }
    if !(8..=512).contains(&n) {
        return Err(CodeError::new(
            "bit size must be between 8 and 512 inclusive",
            loc,
        ));
    }
    Ok(())
}

fn tuple_arc4_name<'a>(types: impl Iterator<Item = &'a Arc4Type>) -> String {
    let names: Vec<String> = types.map(Arc4Type::arc4_name).collect();
    format!("({})", names.join(","))
}

fn tuple_can_encode<'a>(
    members: impl ExactSizeIterator<Item = &'a Arc4Type>,
    wtype: &WType,
) -> bool {
    let WType::Tuple(tuple) = wtype else {
        return false;
    };
    if members.len() != tuple.types.len() {
        return false;
    }
    members.zip(&tuple.types).all(|(member, item)| {
        WType::Arc4(member.clone()) == *item || member.can_encode_type(item)
    })
}

/// The `arc4.byte` alias for `arc4.uint8`
pub fn arc4_byte() -> Arc4Type {
    Arc4Type::UIntN(Rc::new(Arc4UIntN {
        n: 8,
        alias: Some("byte".into()),
    }))
}

/// `arc4.string`: a dynamic byte array that decodes to the native `string`
pub fn arc4_string() -> Arc4Type {
    Arc4Type::DynamicArray(Rc::new(Arc4DynamicArrayType {
        element: arc4_byte(),
        alias: Some("string".into()),
        native: Some(WType::String),
        immutable: true,
    }))
}

/// `arc4.address`: a 32-byte static array that decodes to the native `account`
pub fn arc4_address() -> Arc4Type {
    Arc4Type::StaticArray(Rc::new(Arc4StaticArrayType {
        element: arc4_byte(),
        size: PUBLIC_KEY_HASH_LENGTH,
        alias: Some("address".into()),
        native: Some(WType::Account),
        immutable: true,
    }))
}

/// A dynamic byte array that decodes to the native `bytes`
pub fn arc4_dynamic_bytes() -> Arc4Type {
    Arc4Type::DynamicArray(Rc::new(Arc4DynamicArrayType {
        element: arc4_byte(),
        alias: None,
        native: Some(WType::Bytes),
        immutable: false,
    }))
}

/// `arc4.uintN` with an explicit decode target, used by the AVM→ARC-4
/// equivalence mapping. The target must be consistent with the width.
pub fn arc4_uint_n_decoding_to(
    n: u32,
    decode: &WType,
    loc: Option<SourceLocation>,
) -> Result<Arc4Type, InternalError> {
    match decode {
        WType::Uint64 if n > 64 => Err(InternalError::new(
            format!("arc4.uint{n} cannot decode to uint64"),
            loc,
        )),
        WType::Uint64 | WType::BigUInt => {
            Arc4Type::uint_n(n, loc).map_err(|e| InternalError::new(e.message, loc))
        }
        other => Err(InternalError::new(
            format!("arc4.uint{n} cannot decode to {}", other.name()),
            loc,
        )),
    }
}

// Structural equality goes through the canonical name: two wtypes are equal
// iff their names are equal. ARC-4 alias names do not participate, so
// `arc4.byte` and `arc4.uint8` unify.
impl PartialEq for WType {
    fn eq(&self, other: &Self) -> bool {
        self.name() == other.name()
    }
}

impl Eq for WType {}

impl Hash for WType {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.name().hash(state);
    }
}

impl PartialEq for Arc4Type {
    fn eq(&self, other: &Self) -> bool {
        self.name() == other.name()
    }
}

impl Eq for Arc4Type {}

impl Hash for Arc4Type {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.name().hash(state);
    }
}

impl fmt::Display for WType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl fmt::Display for Arc4Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}
