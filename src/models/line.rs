use std::collections::HashSet;

use crate::error::Error;
use crate::models::{Element, OpenLine};

/// Window bounds are shrunk inward by this much before scanning, so that a
/// caller whose floating-point bound drifted a hair off a location position
/// still gets the same window.
const POS_TOLERANCE: f64 = 1e-9;

/// An ordered arrangement of locations and open-line segments, positions
/// normalised to [0, 1].
#[derive(Debug, Clone, PartialEq)]
pub struct Line {
    pub id: String,
    pub name: String,
    elements: Vec<Element>,
}

impl Line {
    /// Construct a line from its ordered elements.
    ///
    /// Any two consecutive locations at different positions without an
    /// explicit open line between them get a synthesised one at the
    /// midpoint.
    ///
    /// # Errors
    ///
    /// Fails with [`Error::DuplicateElementId`] when two elements (explicit
    /// or synthesised) share an id.
    pub fn load(id: &str, name: &str, elements: Vec<Element>) -> Result<Self, Error> {
        let elements = add_open_lines(elements);

        let mut seen = HashSet::new();
        for element in &elements {
            if !seen.insert(element.id().to_string()) {
                return Err(Error::DuplicateElementId(element.id().to_string()));
            }
        }

        Ok(Self {
            id: id.to_string(),
            name: name.to_string(),
            elements,
        })
    }

    #[must_use]
    pub fn elements(&self) -> &[Element] {
        &self.elements
    }

    /// All non-open-line elements, in line order
    pub fn locations(&self) -> impl Iterator<Item = &Element> + Clone {
        self.elements.iter().filter(|e| e.is_location())
    }

    /// Location codes present on this line, in line order (with repeats)
    #[must_use]
    pub fn location_codes(&self) -> Vec<&str> {
        self.locations().filter_map(Element::code).collect()
    }

    /// The locations with positions inside `[startpos, endpos]`, extended by
    /// one neighbour at each end where no location sits exactly on the
    /// bound.
    ///
    /// The returned iterator is restartable via `Clone` and always yields a
    /// contiguous subrange of [`Line::locations`].
    pub fn locations_extended_between(
        &self,
        startpos: f64,
        endpos: f64,
    ) -> impl Iterator<Item = &Element> + Clone {
        // Shrinking the window inward folds the "bound coincides with a
        // location" case into the neighbour extension: a location exactly on
        // the bound falls outside the shrunk window and is picked up as the
        // neighbour.
        let start = startpos + POS_TOLERANCE;
        let end = endpos - POS_TOLERANCE;

        let locations: Vec<&Element> = self.locations().collect();

        let first_inside = locations.partition_point(|e| e.pos() < start);
        let lo = first_inside.saturating_sub(1);

        // One past the last location inside, then one more for the neighbour
        let first_beyond = locations.partition_point(|e| e.pos() <= end);
        let hi = (first_beyond + 1).min(locations.len());

        locations.into_iter().take(hi).skip(lo)
    }

    /// Deterministic JSON projection for the API boundary
    #[must_use]
    pub fn serialize(&self) -> serde_json::Value {
        serde_json::json!({
            "id": self.id,
            "name": self.name,
            "elements": self.elements,
        })
    }
}

/// Insert a synthesised open line between consecutive locations at different
/// positions, unless one is already there.
fn add_open_lines(elements: Vec<Element>) -> Vec<Element> {
    let mut out: Vec<Element> = Vec::with_capacity(elements.len() * 2);

    for element in elements {
        if let Some(last) = out.last() {
            if last.is_location() && element.is_location() && last.pos() != element.pos() {
                out.push(Element::OpenLine(OpenLine {
                    id: format!("{}_{}", last.id(), element.id()),
                    pos: (last.pos() + element.pos()) / 2.0,
                    length: None,
                    tracks: None,
                }));
            }
        }
        out.push(element);
    }

    out
}
