//! Narrowing float tensors to fixed-width integers.
//!
//! Every value is scaled by its slot's role, rounded to nearest and clipped
//! into the target integer range. Clipping is counted, never wrapped.

use std::fmt;
use std::io::{self, Write};

use crate::config::QuantScales;

/// What a tensor is, which decides its scale and integer width.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotRole {
    /// Feature-transformer weights, stored as i16.
    FeatureWeight,
    /// Feature-transformer bias, stored as i32.
    FeatureBias,
    /// Output-stage weights, stored as i8.
    OutputWeight,
    /// Output-stage bias, stored as i32.
    OutputBias,
}

impl SlotRole {
    /// Bytes per stored value.
    pub const fn width(self) -> usize {
        match self {
            SlotRole::FeatureWeight => 2,
            SlotRole::OutputWeight => 1,
            SlotRole::FeatureBias | SlotRole::OutputBias => 4,
        }
    }

    /// Inclusive integer range of the stored type.
    pub const fn range(self) -> (i64, i64) {
        match self {
            SlotRole::FeatureWeight => (i16::MIN as i64, i16::MAX as i64),
            SlotRole::OutputWeight => (i8::MIN as i64, i8::MAX as i64),
            SlotRole::FeatureBias | SlotRole::OutputBias => (i32::MIN as i64, i32::MAX as i64),
        }
    }

    pub const fn is_bias(self) -> bool {
        matches!(self, SlotRole::FeatureBias | SlotRole::OutputBias)
    }

    pub fn scale(self, scales: &QuantScales) -> f32 {
        match self {
            SlotRole::FeatureWeight => scales.feature_weight,
            SlotRole::FeatureBias => scales.feature_bias,
            SlotRole::OutputWeight => scales.output_weight,
            SlotRole::OutputBias => scales.output_bias,
        }
    }
}

/// One tensor in artifact order.
#[derive(Debug, Clone, Copy)]
pub struct ParameterSlot<'a> {
    pub layer: &'static str,
    pub role: SlotRole,
    pub values: &'a [f32],
}

impl<'a> ParameterSlot<'a> {
    pub fn new(layer: &'static str, role: SlotRole, values: &'a [f32]) -> Self {
        Self {
            layer,
            role,
            values,
        }
    }

    /// `"<layer>.weights"` or `"<layer>.bias"`.
    pub fn name(&self) -> String {
        let tensor = if self.role.is_bias() { "bias" } else { "weights" };
        format!("{}.{tensor}", self.layer)
    }

    /// Bytes this slot occupies in an artifact.
    pub fn byte_len(&self) -> usize {
        self.values.len() * self.role.width()
    }
}

/// Scale, round and clip one value. Returns the integer and whether it was clipped.
///
/// NaN becomes 0 and counts as clipped.
pub fn narrow(value: f32, scale: f32, role: SlotRole) -> (i64, bool) {
    let scaled = (f64::from(value) * f64::from(scale)).round();
    if scaled.is_nan() {
        return (0, true);
    }
    let (min, max) = role.range();
    if scaled < min as f64 {
        (min, true)
    } else if scaled > max as f64 {
        (max, true)
    } else {
        (scaled as i64, false)
    }
}

/// Clip counts for one slot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlotReport {
    pub name: String,
    pub role: SlotRole,
    pub total: usize,
    pub clipped: usize,
}

impl SlotReport {
    pub fn clipped_fraction(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            self.clipped as f64 / self.total as f64
        }
    }
}

/// Per-slot clip counts for one export.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QuantizationReport {
    slots: Vec<SlotReport>,
}

impl QuantizationReport {
    pub fn slots(&self) -> &[SlotReport] {
        &self.slots
    }

    pub fn slot(&self, name: &str) -> Option<&SlotReport> {
        self.slots.iter().find(|s| s.name == name)
    }

    pub fn total_values(&self) -> usize {
        self.slots.iter().map(|s| s.total).sum()
    }

    pub fn total_clipped(&self) -> usize {
        self.slots.iter().map(|s| s.clipped).sum()
    }

    pub(crate) fn push(&mut self, slot: SlotReport) {
        self.slots.push(slot);
    }
}

impl fmt::Display for QuantizationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for slot in &self.slots {
            writeln!(
                f,
                "{:<20} {:>10} values {:>8} clipped ({:.4}%)",
                slot.name,
                slot.total,
                slot.clipped,
                slot.clipped_fraction() * 100.0
            )?;
        }
        write!(
            f,
            "total: {} values, {} clipped",
            self.total_values(),
            self.total_clipped()
        )
    }
}

/// Narrow every value of `slot` and write it little-endian at the role's width.
pub fn write_slot<W: Write>(
    slot: &ParameterSlot<'_>,
    scales: &QuantScales,
    writer: &mut W,
) -> io::Result<SlotReport> {
    let scale = slot.role.scale(scales);
    let mut buf = Vec::with_capacity(slot.byte_len());
    let mut clipped = 0usize;

    for &value in slot.values {
        let (q, was_clipped) = narrow(value, scale, slot.role);
        clipped += usize::from(was_clipped);
        // q is already inside the role's range, so the casts are exact
        match slot.role {
            SlotRole::FeatureWeight => buf.extend_from_slice(&(q as i16).to_le_bytes()),
            SlotRole::OutputWeight => buf.extend_from_slice(&(q as i8).to_le_bytes()),
            SlotRole::FeatureBias | SlotRole::OutputBias => {
                buf.extend_from_slice(&(q as i32).to_le_bytes())
            }
        }
    }

    writer.write_all(&buf)?;
    Ok(SlotReport {
        name: slot.name(),
        role: slot.role,
        total: slot.values.len(),
        clipped,
    })
}
