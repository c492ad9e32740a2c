//! Contract ABI codec
//!
//! Covers the subset of the Solidity ABI the agent contracts use: static
//! words (`address`, `uint<N>`, `int<N>`, `bool`, `bytes<N>`), dynamic
//! `string` / `bytes`, dynamic arrays and tuples, in both directions.

use primitive_types::U256;
use sha3::{Digest, Keccak256};
use std::fmt;
use std::str::FromStr;

use crate::errors::ChainError;
use crate::types::Address;

const WORD: usize = 32;

pub fn keccak256(data: &[u8]) -> [u8; 32] {
    let mut hasher = Keccak256::new();
    hasher.update(data);
    let hash = hasher.finalize();
    let mut out = [0u8; 32];
    out.copy_from_slice(&hash);
    out
}

/// Topic 0 of an event, e.g. `AgentRunCreated(address,uint256)`
pub fn event_topic(signature: &str) -> [u8; 32] {
    keccak256(signature.as_bytes())
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParamType {
    Address,
    Uint(usize),
    Int(usize),
    Bool,
    String,
    Bytes,
    FixedBytes(usize),
    Array(Box<ParamType>),
    Tuple(Vec<ParamType>),
}

impl ParamType {
    pub fn is_dynamic(&self) -> bool {
        match self {
            ParamType::String | ParamType::Bytes | ParamType::Array(_) => true,
            ParamType::Tuple(members) => members.iter().any(ParamType::is_dynamic),
            _ => false,
        }
    }

    fn head_size(&self) -> usize {
        match self {
            ParamType::Tuple(members) if !self.is_dynamic() => {
                members.iter().map(ParamType::head_size).sum()
            }
            _ => WORD,
        }
    }
}

impl FromStr for ParamType {
    type Err = ChainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if let Some(inner) = s.strip_suffix("[]") {
            return Ok(ParamType::Array(Box::new(inner.parse()?)));
        }
        if s.starts_with('(') && s.ends_with(')') {
            let members = split_top_level(&s[1..s.len() - 1])?
                .into_iter()
                .map(str::parse)
                .collect::<Result<Vec<_>, _>>()?;
            return Ok(ParamType::Tuple(members));
        }

        match s {
            "address" => Ok(ParamType::Address),
            "bool" => Ok(ParamType::Bool),
            "string" => Ok(ParamType::String),
            "bytes" => Ok(ParamType::Bytes),
            _ => {
                if let Some(bits) = s.strip_prefix("uint") {
                    Ok(ParamType::Uint(parse_bits(s, bits)?))
                } else if let Some(bits) = s.strip_prefix("int") {
                    Ok(ParamType::Int(parse_bits(s, bits)?))
                } else if let Some(len) = s.strip_prefix("bytes") {
                    let len: usize = len
                        .parse()
                        .map_err(|_| ChainError::Abi(format!("unsupported type: {}", s)))?;
                    if len == 0 || len > 32 {
                        return Err(ChainError::Abi(format!("unsupported type: {}", s)));
                    }
                    Ok(ParamType::FixedBytes(len))
                } else {
                    Err(ChainError::Abi(format!("unsupported or unknown type: {}", s)))
                }
            }
        }
    }
}

impl fmt::Display for ParamType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamType::Address => write!(f, "address"),
            ParamType::Uint(bits) => write!(f, "uint{}", bits),
            ParamType::Int(bits) => write!(f, "int{}", bits),
            ParamType::Bool => write!(f, "bool"),
            ParamType::String => write!(f, "string"),
            ParamType::Bytes => write!(f, "bytes"),
            ParamType::FixedBytes(len) => write!(f, "bytes{}", len),
            ParamType::Array(inner) => write!(f, "{}[]", inner),
            ParamType::Tuple(members) => {
                write!(f, "(")?;
                write_list(f, members)?;
                write!(f, ")")
            }
        }
    }
}

fn write_list(f: &mut fmt::Formatter<'_>, types: &[ParamType]) -> fmt::Result {
    for (i, ty) in types.iter().enumerate() {
        if i > 0 {
            write!(f, ",")?;
        }
        write!(f, "{}", ty)?;
    }
    Ok(())
}

fn parse_bits(ty: &str, bits: &str) -> Result<usize, ChainError> {
    if bits.is_empty() {
        return Ok(256);
    }
    let bits: usize = bits
        .parse()
        .map_err(|_| ChainError::Abi(format!("unsupported type: {}", ty)))?;
    if bits == 0 || bits % 8 != 0 || bits > 256 {
        return Err(ChainError::Abi(format!("unsupported integer size: {}", ty)));
    }
    Ok(bits)
}

/// Splits a type list on commas that are not nested inside a tuple
fn split_top_level(s: &str) -> Result<Vec<&str>, ChainError> {
    if s.trim().is_empty() {
        return Ok(Vec::new());
    }
    let mut parts = Vec::new();
    let mut depth = 0usize;
    let mut start = 0;
    for (i, c) in s.char_indices() {
        match c {
            '(' => depth += 1,
            ')' => {
                depth = depth
                    .checked_sub(1)
                    .ok_or_else(|| ChainError::Abi(format!("unbalanced parentheses: {}", s)))?;
            }
            ',' if depth == 0 => {
                parts.push(s[start..i].trim());
                start = i + 1;
            }
            _ => {}
        }
    }
    if depth != 0 {
        return Err(ChainError::Abi(format!("unbalanced parentheses: {}", s)));
    }
    parts.push(s[start..].trim());
    Ok(parts)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token {
    Address(Address),
    Uint(U256),
    Int(i128),
    Bool(bool),
    String(String),
    Bytes(Vec<u8>),
    FixedBytes(Vec<u8>),
    Array(Vec<Token>),
    Tuple(Vec<Token>),
}

impl Token {
    pub fn is_dynamic(&self) -> bool {
        match self {
            Token::String(_) | Token::Bytes(_) | Token::Array(_) => true,
            Token::Tuple(items) => items.iter().any(Token::is_dynamic),
            _ => false,
        }
    }

    fn head_size(&self) -> usize {
        match self {
            Token::Tuple(items) if !self.is_dynamic() => items.iter().map(Token::head_size).sum(),
            _ => WORD,
        }
    }

    /// Whether this value can be encoded as `ty` without truncation
    pub fn type_check(&self, ty: &ParamType) -> bool {
        match (self, ty) {
            (Token::Address(_), ParamType::Address)
            | (Token::Bool(_), ParamType::Bool)
            | (Token::String(_), ParamType::String)
            | (Token::Bytes(_), ParamType::Bytes) => true,
            (Token::Uint(value), ParamType::Uint(bits)) => value.bits() <= *bits,
            (Token::Int(value), ParamType::Int(bits)) => {
                if *bits >= 128 {
                    return true;
                }
                let bound = 1i128 << (bits - 1);
                *value >= -bound && *value < bound
            }
            (Token::FixedBytes(bytes), ParamType::FixedBytes(len)) => bytes.len() <= *len,
            (Token::Array(items), ParamType::Array(inner)) => {
                items.iter().all(|item| item.type_check(inner))
            }
            (Token::Tuple(items), ParamType::Tuple(members)) => {
                items.len() == members.len()
                    && items.iter().zip(members).all(|(item, ty)| item.type_check(ty))
            }
            _ => false,
        }
    }

    pub fn into_string(self) -> Option<String> {
        match self {
            Token::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn into_uint(self) -> Option<U256> {
        match self {
            Token::Uint(v) => Some(v),
            _ => None,
        }
    }

    pub fn into_bool(self) -> Option<bool> {
        match self {
            Token::Bool(b) => Some(b),
            _ => None,
        }
    }

    pub fn into_address(self) -> Option<Address> {
        match self {
            Token::Address(a) => Some(a),
            _ => None,
        }
    }

    pub fn into_array(self) -> Option<Vec<Token>> {
        match self {
            Token::Array(items) => Some(items),
            _ => None,
        }
    }
}

/// Parsed function signature, e.g. `runAgent(uint256,string,uint8)`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Function {
    pub name: String,
    pub inputs: Vec<ParamType>,
}

impl Function {
    pub fn parse(signature: &str) -> Result<Self, ChainError> {
        let signature = signature.trim();
        let open = signature
            .find('(')
            .ok_or_else(|| ChainError::Abi(format!("missing '(' in {}", signature)))?;
        if !signature.ends_with(')') {
            return Err(ChainError::Abi(format!("missing ')' in {}", signature)));
        }
        let name = signature[..open].trim();
        if name.is_empty() {
            return Err(ChainError::Abi(format!("missing function name in {}", signature)));
        }
        let inputs = split_top_level(&signature[open + 1..signature.len() - 1])?
            .into_iter()
            .map(str::parse)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self {
            name: name.to_string(),
            inputs,
        })
    }

    /// Canonical signature used for the selector
    pub fn signature(&self) -> String {
        self.to_string()
    }

    pub fn selector(&self) -> [u8; 4] {
        let hash = keccak256(self.signature().as_bytes());
        [hash[0], hash[1], hash[2], hash[3]]
    }

    /// Selector followed by the encoded arguments
    pub fn encode_input(&self, args: &[Token]) -> Result<Vec<u8>, ChainError> {
        if args.len() != self.inputs.len() {
            return Err(ChainError::Abi(format!(
                "argument count mismatch for {}: expected {}, got {}",
                self.name,
                self.inputs.len(),
                args.len()
            )));
        }
        for (i, (arg, ty)) in args.iter().zip(&self.inputs).enumerate() {
            if !arg.type_check(ty) {
                return Err(ChainError::Abi(format!(
                    "argument {} of {} does not match type {}",
                    i, self.name, ty
                )));
            }
        }
        let mut out = Vec::with_capacity(4 + args.len() * WORD);
        out.extend_from_slice(&self.selector());
        out.extend(encode(args));
        Ok(out)
    }
}

impl fmt::Display for Function {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}(", self.name)?;
        write_list(f, &self.inputs)?;
        write!(f, ")")
    }
}

/// Encodes a list of tokens with the standard head/tail layout
pub fn encode(tokens: &[Token]) -> Vec<u8> {
    let head_len: usize = tokens.iter().map(Token::head_size).sum();
    let mut head = Vec::with_capacity(head_len);
    let mut tail = Vec::new();

    for token in tokens {
        if token.is_dynamic() {
            head.extend_from_slice(&usize_word(head_len + tail.len()));
            tail.extend(encode_token(token));
        } else {
            head.extend(encode_token(token));
        }
    }

    head.extend(tail);
    head
}

fn encode_token(token: &Token) -> Vec<u8> {
    match token {
        Token::Address(addr) => {
            let mut word = [0u8; WORD];
            word[12..].copy_from_slice(addr.as_bytes());
            word.to_vec()
        }
        Token::Uint(value) => {
            let mut word = [0u8; WORD];
            value.to_big_endian(&mut word);
            word.to_vec()
        }
        Token::Int(value) => {
            let mut word = if *value < 0 { [0xffu8; WORD] } else { [0u8; WORD] };
            word[16..].copy_from_slice(&value.to_be_bytes());
            word.to_vec()
        }
        Token::Bool(b) => {
            let mut word = [0u8; WORD];
            if *b {
                word[31] = 1;
            }
            word.to_vec()
        }
        Token::FixedBytes(bytes) => {
            let mut word = bytes.clone();
            word.resize(WORD, 0);
            word
        }
        Token::String(s) => encode_bytes(s.as_bytes()),
        Token::Bytes(bytes) => encode_bytes(bytes),
        Token::Array(items) => {
            let mut out = usize_word(items.len()).to_vec();
            out.extend(encode(items));
            out
        }
        Token::Tuple(items) => encode(items),
    }
}

fn encode_bytes(bytes: &[u8]) -> Vec<u8> {
    let padded = bytes.len().div_ceil(WORD) * WORD;
    let mut out = Vec::with_capacity(WORD + padded);
    out.extend_from_slice(&usize_word(bytes.len()));
    out.extend_from_slice(bytes);
    out.resize(WORD + padded, 0);
    out
}

fn usize_word(value: usize) -> [u8; WORD] {
    let mut word = [0u8; WORD];
    word[24..].copy_from_slice(&(value as u64).to_be_bytes());
    word
}

/// Decodes return data against the expected output types
pub fn decode(types: &[ParamType], data: &[u8]) -> Result<Vec<Token>, ChainError> {
    let mut offset = 0;
    let mut out = Vec::with_capacity(types.len());
    for ty in types {
        if ty.is_dynamic() {
            let pointer = read_usize(data, offset)?;
            out.push(decode_at(ty, data, pointer)?);
            offset += WORD;
        } else {
            out.push(decode_at(ty, data, offset)?);
            offset += ty.head_size();
        }
    }
    Ok(out)
}

fn decode_at(ty: &ParamType, data: &[u8], at: usize) -> Result<Token, ChainError> {
    match ty {
        ParamType::Address => {
            let word = read_word(data, at)?;
            let mut addr = [0u8; 20];
            addr.copy_from_slice(&word[12..]);
            Ok(Token::Address(Address(addr)))
        }
        ParamType::Uint(_) => Ok(Token::Uint(U256::from_big_endian(read_word(data, at)?))),
        ParamType::Int(_) => {
            let word = read_word(data, at)?;
            let mut low = [0u8; 16];
            low.copy_from_slice(&word[16..]);
            Ok(Token::Int(i128::from_be_bytes(low)))
        }
        ParamType::Bool => Ok(Token::Bool(read_word(data, at)?[31] != 0)),
        ParamType::FixedBytes(len) => Ok(Token::FixedBytes(read_word(data, at)?[..*len].to_vec())),
        ParamType::String => {
            let bytes = read_bytes(data, at)?;
            String::from_utf8(bytes)
                .map(Token::String)
                .map_err(|e| ChainError::Abi(format!("invalid utf-8 in string: {}", e)))
        }
        ParamType::Bytes => Ok(Token::Bytes(read_bytes(data, at)?)),
        ParamType::Array(inner) => {
            let len = read_usize(data, at)?;
            let start = at + WORD;
            let remaining = data.len().saturating_sub(start);
            if len > remaining / WORD {
                return Err(ChainError::Abi(format!(
                    "array length {} exceeds available data",
                    len
                )));
            }
            let types = vec![inner.as_ref().clone(); len];
            Ok(Token::Array(decode(&types, &data[start..])?))
        }
        ParamType::Tuple(members) => {
            if at > data.len() {
                return Err(out_of_bounds(at, data.len()));
            }
            Ok(Token::Tuple(decode(members, &data[at..])?))
        }
    }
}

fn read_word(data: &[u8], at: usize) -> Result<&[u8], ChainError> {
    let end = at.checked_add(WORD).ok_or_else(|| out_of_bounds(at, data.len()))?;
    data.get(at..end).ok_or_else(|| out_of_bounds(end, data.len()))
}

fn read_usize(data: &[u8], at: usize) -> Result<usize, ChainError> {
    let word = read_word(data, at)?;
    if word[..24].iter().any(|&b| b != 0) {
        return Err(ChainError::Abi(format!("offset or length at {} is too large", at)));
    }
    let mut low = [0u8; 8];
    low.copy_from_slice(&word[24..]);
    usize::try_from(u64::from_be_bytes(low))
        .map_err(|_| ChainError::Abi(format!("offset or length at {} is too large", at)))
}

fn read_bytes(data: &[u8], at: usize) -> Result<Vec<u8>, ChainError> {
    let len = read_usize(data, at)?;
    let start = at + WORD;
    let end = start
        .checked_add(len)
        .ok_or_else(|| out_of_bounds(start, data.len()))?;
    data.get(start..end)
        .map(<[u8]>::to_vec)
        .ok_or_else(|| out_of_bounds(end, data.len()))
}

fn out_of_bounds(at: usize, len: usize) -> ChainError {
    ChainError::Abi(format!("read past end of data ({} > {})", at, len))
}
