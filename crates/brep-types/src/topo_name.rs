//! Persistent naming for directed uses of edges.
//!
//! A topology name is the only identity the kernel writes into saved
//! documents. Two encodings are in use:
//!
//! - the two-field co-edge form `"<edge topo name>_<is_rev>"`, and
//! - the three-field form `"<edge id>_<edge topo name|null>_<is_rev>"` used by
//!   extraordinary co-edges and the generic co-edge id generator.
//!
//! Decoding is lenient on purpose: names outlive the edges they point at, so a
//! malformed id decodes to `edge_id: None` and lookups treat it as a miss.

use std::convert::Infallible;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Reserved name marking the background (no edge) reference.
pub const BACKGROUND_TOPO_NAME: &str = "background";

/// Token separator in encoded names.
pub const TOPO_NAME_SEPARATOR: char = '_';

/// Token standing in for an absent edge topo name.
pub const NULL_TOKEN: &str = "null";

/// Decoded topology name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "String", from = "String")]
pub struct TopoName {
    /// Numeric edge id. `None` when the id token is not a base-10 integer.
    pub edge_id: Option<i64>,
    /// Optional symbolic name of the edge.
    pub edge_topo_name: Option<String>,
    /// true if the co-edge runs against the edge's curve.
    pub is_rev: bool,
}

impl TopoName {
    pub fn new(edge_id: i64, edge_topo_name: Option<String>, is_rev: bool) -> Self {
        Self {
            edge_id: Some(edge_id),
            edge_topo_name,
            is_rev,
        }
    }

    /// The background sentinel: `{edge_id: -1, edge_topo_name: "background", is_rev: false}`.
    pub fn background() -> Self {
        Self {
            edge_id: Some(-1),
            edge_topo_name: Some(BACKGROUND_TOPO_NAME.to_string()),
            is_rev: false,
        }
    }

    pub fn is_background(&self) -> bool {
        self.edge_id == Some(-1) && self.edge_topo_name.as_deref() == Some(BACKGROUND_TOPO_NAME)
    }

    /// Three-field encoding. An unparsable id is written back as `NaN`.
    pub fn encode(&self) -> String {
        match self.edge_id {
            Some(id) => encode_topo_name(id, self.edge_topo_name.as_deref(), self.is_rev),
            None => format!(
                "NaN{sep}{}{sep}{}",
                self.edge_topo_name.as_deref().unwrap_or(NULL_TOKEN),
                self.is_rev,
                sep = TOPO_NAME_SEPARATOR
            ),
        }
    }

    pub fn decode(s: &str) -> Self {
        decode_topo_name(s)
    }
}

impl fmt::Display for TopoName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.encode())
    }
}

impl FromStr for TopoName {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(decode_topo_name(s))
    }
}

impl From<TopoName> for String {
    fn from(name: TopoName) -> Self {
        name.encode()
    }
}

impl From<String> for TopoName {
    fn from(s: String) -> Self {
        decode_topo_name(&s)
    }
}

/// Decode an encoded topology name.
///
/// Anything starting with `"background"` is the background sentinel. Otherwise
/// the first three `_`-separated tokens are read; missing tokens count as
/// absent and extra tokens are ignored. `is_rev` is a strict match on `"true"`.
pub fn decode_topo_name(s: &str) -> TopoName {
    if s.starts_with(BACKGROUND_TOPO_NAME) {
        return TopoName::background();
    }

    let mut tokens = s.split(TOPO_NAME_SEPARATOR);
    let id_token = tokens.next().unwrap_or_default();
    let name_token = tokens.next();
    let rev_token = tokens.next();

    TopoName {
        edge_id: parse_int_prefix(id_token),
        edge_topo_name: name_token
            .filter(|token| *token != NULL_TOKEN)
            .map(str::to_string),
        is_rev: rev_token == Some("true"),
    }
}

/// Three-field form: `"{edge_id}_{edge_topo_name|null}_{is_rev}"`.
pub fn encode_topo_name(edge_id: i64, edge_topo_name: Option<&str>, is_rev: bool) -> String {
    format!(
        "{edge_id}{sep}{}{sep}{is_rev}",
        edge_topo_name.unwrap_or(NULL_TOKEN),
        sep = TOPO_NAME_SEPARATOR
    )
}

/// Two-field co-edge form: `"{edge_topo_name}_{is_rev}"`.
pub fn encode_coedge_topo_name(edge_topo_name: &str, is_rev: bool) -> String {
    format!("{edge_topo_name}{TOPO_NAME_SEPARATOR}{is_rev}")
}

/// Base-10 integer prefix parse with `parseInt` leniency: leading whitespace
/// and one sign are accepted, trailing garbage is ignored. Returns `None` when
/// no digit is found or the value does not fit in an `i64`.
fn parse_int_prefix(token: &str) -> Option<i64> {
    let trimmed = token.trim_start();
    let (negative, digits) = match trimmed.as_bytes().first() {
        Some(b'-') => (true, &trimmed[1..]),
        Some(b'+') => (false, &trimmed[1..]),
        _ => (false, trimmed),
    };

    let end = digits
        .bytes()
        .position(|b| !b.is_ascii_digit())
        .unwrap_or(digits.len());
    if end == 0 {
        return None;
    }

    let mut value: i64 = 0;
    for b in digits[..end].bytes() {
        let digit = i64::from(b - b'0');
        value = value.checked_mul(10)?;
        value = if negative {
            value.checked_sub(digit)?
        } else {
            value.checked_add(digit)?
        };
    }
    Some(value)
}
