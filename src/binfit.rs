//! Single-box fit by total volume.
//!
//! This is a placeholder heuristic: it compares volume sums only and stacks
//! every item at the origin. It does not check that the items physically
//! fit, and should not drive real packing decisions.

use serde::{Deserialize, Serialize};

use crate::error::PackError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemSpec {
    pub id: String,
    #[serde(default = "one")]
    pub count: u32,
    pub width: f64,
    pub height: f64,
    pub depth: f64,
    #[serde(default)]
    pub weight: f64,
    #[serde(default)]
    pub flags: Vec<String>,
}

fn one() -> u32 {
    1
}

/// One physical unit to place.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Item {
    pub id: String,
    pub width: f64,
    pub height: f64,
    pub depth: f64,
    pub weight: f64,
    pub flags: Vec<String>,
}

impl Item {
    pub fn volume(&self) -> f64 {
        self.width * self.height * self.depth
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoxSpec {
    pub id: String,
    pub width: f64,
    pub height: f64,
    pub depth: f64,
    #[serde(default)]
    pub box_weight: f64,
}

impl BoxSpec {
    pub fn volume(&self) -> f64 {
        self.width * self.height * self.depth
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PackRequest {
    pub items: Vec<ItemSpec>,
    pub boxes: Vec<BoxSpec>,
    #[serde(default)]
    pub margin: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Placement {
    pub id: String,
    pub x_pos: f64,
    pub y_pos: f64,
    pub z_pos: f64,
    pub x_size: f64,
    pub y_size: f64,
    pub z_size: f64,
    pub weight: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PackedBox {
    pub id: String,
    pub items: Vec<Placement>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PackOutcome {
    pub success: bool,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub packed_boxes: Vec<PackedBox>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub message: Option<String>,
}

fn positive(kind: &'static str, id: &str, field: &'static str, value: f64) -> Result<(), PackError> {
    if value > 0.0 && value.is_finite() {
        Ok(())
    } else {
        Err(PackError::NonPositive {
            kind,
            id: id.to_string(),
            field,
        })
    }
}

fn non_negative(kind: &'static str, id: &str, field: &'static str, value: f64) -> Result<(), PackError> {
    if value >= 0.0 && value.is_finite() {
        Ok(())
    } else {
        Err(PackError::Negative {
            kind,
            id: id.to_string(),
            field,
        })
    }
}

impl PackRequest {
    pub fn validate(&self) -> Result<(), PackError> {
        if self.items.is_empty() {
            return Err(PackError::NoItems);
        }
        if self.boxes.is_empty() {
            return Err(PackError::NoBoxes);
        }
        if !(self.margin >= 0.0 && self.margin.is_finite()) {
            return Err(PackError::NegativeMargin);
        }

        for item in &self.items {
            if item.id.trim().is_empty() {
                return Err(PackError::MissingId { kind: "item" });
            }
            positive("item", &item.id, "width", item.width)?;
            positive("item", &item.id, "height", item.height)?;
            positive("item", &item.id, "depth", item.depth)?;
            non_negative("item", &item.id, "weight", item.weight)?;
            if item.count == 0 {
                return Err(PackError::ZeroCount {
                    id: item.id.clone(),
                });
            }
        }

        for spec in &self.boxes {
            if spec.id.trim().is_empty() {
                return Err(PackError::MissingId { kind: "box" });
            }
            positive("box", &spec.id, "width", spec.width)?;
            positive("box", &spec.id, "height", spec.height)?;
            positive("box", &spec.id, "depth", spec.depth)?;
            non_negative("box", &spec.id, "box_weight", spec.box_weight)?;
        }

        Ok(())
    }
}

/// Repeats every item `count` times.
pub fn expand_items(specs: &[ItemSpec]) -> Vec<Item> {
    specs
        .iter()
        .flat_map(|spec| {
            (0..spec.count).map(move |_| Item {
                id: spec.id.clone(),
                width: spec.width,
                height: spec.height,
                depth: spec.depth,
                weight: spec.weight,
                flags: spec.flags.clone(),
            })
        })
        .collect()
}

/// Shrinks every box by `margin` on each side; boxes with no room left are
/// dropped.
pub fn apply_margin(boxes: &[BoxSpec], margin: f64) -> Vec<BoxSpec> {
    boxes
        .iter()
        .map(|spec| BoxSpec {
            width: spec.width - 2.0 * margin,
            height: spec.height - 2.0 * margin,
            depth: spec.depth - 2.0 * margin,
            ..spec.clone()
        })
        .filter(|spec| spec.width > 0.0 && spec.height > 0.0 && spec.depth > 0.0)
        .collect()
}

/// Picks the smallest box whose volume strictly exceeds the items' total.
pub fn fit_smallest_box(items: &[Item], boxes: &[BoxSpec]) -> Option<PackedBox> {
    let required: f64 = items.iter().map(Item::volume).sum();

    let chosen = boxes
        .iter()
        .filter(|spec| spec.volume() > required)
        .fold(None::<&BoxSpec>, |best, spec| match best {
            Some(current) if current.volume() <= spec.volume() => Some(current),
            _ => Some(spec),
        })?;

    Some(PackedBox {
        id: chosen.id.clone(),
        items: items
            .iter()
            .map(|item| Placement {
                id: item.id.clone(),
                x_pos: 0.0,
                y_pos: 0.0,
                z_pos: 0.0,
                x_size: item.width,
                y_size: item.height,
                z_size: item.depth,
                weight: item.weight,
            })
            .collect(),
    })
}

/// Validates, expands counts, applies the margin and fits.
pub fn pack(request: &PackRequest) -> Result<PackOutcome, PackError> {
    request.validate()?;
    let items = expand_items(&request.items);
    let boxes = apply_margin(&request.boxes, request.margin);

    Ok(match fit_smallest_box(&items, &boxes) {
        Some(packed) => PackOutcome {
            success: true,
            packed_boxes: vec![packed],
            message: None,
        },
        None => PackOutcome {
            success: false,
            packed_boxes: Vec::new(),
            message: Some("Couldn't fit all items into the boxes.".to_string()),
        },
    })
}
