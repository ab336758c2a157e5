use bitflags::bitflags;
use serde::{Deserialize, Serialize};
use crate::error::Error;

bitflags! {
    /// Travel direction(s) a signal applies to, seen in line order.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct SignalDirection: u8 {
        const LEFT = 0b01;
        const RIGHT = 0b10;
        const BOTH = Self::LEFT.bits() | Self::RIGHT.bits();
    }
}

impl SignalDirection {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        if *self == Self::LEFT {
            "left"
        } else if *self == Self::RIGHT {
            "right"
        } else {
            "both"
        }
    }
}

impl serde::Serialize for SignalDirection {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> serde::Deserialize<'de> for SignalDirection {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        match s.as_str() {
            "left" => Ok(Self::LEFT),
            "right" => Ok(Self::RIGHT),
            "both" => Ok(Self::BOTH),
            other => Err(serde::de::Error::custom(format!("unknown signal direction {other:?}"))),
        }
    }
}

/// A named operating point on a line (station, stop, block post, junction
/// or siding). `code` is the part of `id` before the `#` track-variant
/// suffix.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OperatingPoint {
    pub id: String,
    pub pos: f64,
    pub code: String,
    pub name: String,
}

impl OperatingPoint {
    /// Build from a `CODE#variant` id and an integer position in 0–100.
    ///
    /// # Errors
    ///
    /// Fails with [`Error::MalformedLocationId`] when the id has no single
    /// `#`, and with [`Error::OutOfRange`] when the position exceeds 100.
    pub fn new(id: &str, pos: u32, name: &str) -> Result<Self, Error> {
        Ok(Self {
            id: id.to_string(),
            pos: normalize_pos(pos)?,
            code: split_code(id)?,
            name: name.to_string(),
        })
    }
}

/// A signal protecting one or both directions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignalPoint {
    pub id: String,
    pub pos: f64,
    pub code: String,
    pub direction: SignalDirection,
}

impl SignalPoint {
    /// Build from a `CODE#variant` id and an integer position in 0–100.
    ///
    /// # Errors
    ///
    /// Same failure modes as [`OperatingPoint::new`].
    pub fn new(id: &str, pos: u32, direction: SignalDirection) -> Result<Self, Error> {
        Ok(Self {
            id: id.to_string(),
            pos: normalize_pos(pos)?,
            code: split_code(id)?,
            direction,
        })
    }
}

/// Track between two locations. Synthesised automatically between adjacent
/// locations that have no explicit open line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OpenLine {
    pub id: String,
    pub pos: f64,
    /// Length in metres, where known
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub length: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tracks: Option<u32>,
}

impl OpenLine {
    /// Build from an id and an integer position in 0–100.
    ///
    /// # Errors
    ///
    /// Fails with [`Error::OutOfRange`] when the position exceeds 100.
    pub fn new(id: &str, pos: u32, length: Option<f64>, tracks: Option<u32>) -> Result<Self, Error> {
        Ok(Self {
            id: id.to_string(),
            pos: normalize_pos(pos)?,
            length,
            tracks,
        })
    }
}

/// One element of a line, ordered by position. The serialized type tags are
/// the short codes the frontend expects.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Element {
    #[serde(rename = "bhf")]
    Station(OperatingPoint),
    #[serde(rename = "hp")]
    Stop(OperatingPoint),
    #[serde(rename = "bk")]
    BlockPost(OperatingPoint),
    #[serde(rename = "abzw")]
    Junction(OperatingPoint),
    #[serde(rename = "anst")]
    Siding(OperatingPoint),
    #[serde(rename = "sig")]
    Signal(SignalPoint),
    #[serde(rename = "str")]
    OpenLine(OpenLine),
}

impl Element {
    #[must_use]
    pub fn id(&self) -> &str {
        match self {
            Element::Station(p) | Element::Stop(p) | Element::BlockPost(p)
            | Element::Junction(p) | Element::Siding(p) => &p.id,
            Element::Signal(s) => &s.id,
            Element::OpenLine(o) => &o.id,
        }
    }

    #[must_use]
    pub fn pos(&self) -> f64 {
        match self {
            Element::Station(p) | Element::Stop(p) | Element::BlockPost(p)
            | Element::Junction(p) | Element::Siding(p) => p.pos,
            Element::Signal(s) => s.pos,
            Element::OpenLine(o) => o.pos,
        }
    }

    /// Location code, for every element that is not an open line
    #[must_use]
    pub fn code(&self) -> Option<&str> {
        match self {
            Element::Station(p) | Element::Stop(p) | Element::BlockPost(p)
            | Element::Junction(p) | Element::Siding(p) => Some(&p.code),
            Element::Signal(s) => Some(&s.code),
            Element::OpenLine(_) => None,
        }
    }

    #[must_use]
    pub fn is_location(&self) -> bool {
        !matches!(self, Element::OpenLine(_))
    }

    #[must_use]
    pub fn as_open_line(&self) -> Option<&OpenLine> {
        match self {
            Element::OpenLine(o) => Some(o),
            _ => None,
        }
    }
}

fn normalize_pos(pos: u32) -> Result<f64, Error> {
    if pos > 100 {
        return Err(Error::OutOfRange(format!("element position {pos} not in 0..=100")));
    }
    Ok(f64::from(pos) / 100.0)
}

fn split_code(id: &str) -> Result<String, Error> {
    let malformed = || Error::MalformedLocationId(id.to_string());

    let (code, variant) = id.split_once('#').ok_or_else(malformed)?;
    if code.is_empty() || variant.is_empty() || variant.contains('#') {
        return Err(malformed());
    }

    Ok(code.to_string())
}
