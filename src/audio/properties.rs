//! Decoded device property values.
//!
//! Device properties arrive from the platform as tagged variants. The adapter
//! interprets boolean, string, unsigned-32-bit and identifier variants; any
//! other tag is carried through as [`PropertyValue::Unsupported`] and renders
//! as `"<tag>:?"`. Existing clients rely on that exact placeholder, so it is
//! part of the wire contract.

use std::fmt;

#[derive(Debug, Clone, PartialEq)]
pub enum PropertyValue {
    Bool(bool),
    Text(String),
    U32(u32),
    /// An identifier (GUID-style) value, kept in its string form.
    Id(String),
    /// A variant tag the decoder does not interpret; holds the tag name.
    Unsupported(String),
}

impl fmt::Display for PropertyValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PropertyValue::Bool(value) => write!(f, "{value}"),
            PropertyValue::Text(value) => f.write_str(value),
            PropertyValue::U32(value) => write!(f, "{value}"),
            PropertyValue::Id(value) => f.write_str(value),
            PropertyValue::Unsupported(tag) => write!(f, "{tag}:?"),
        }
    }
}
