//! Z-order (Morton) code computation and its inverse.
//!
//! A z-order code linearizes the recursive binary partitioning of the unit
//! hypercube: at every level each dimension is halved in turn, and the code
//! records which half the data falls into, bit-interleaved across dimensions
//! (dimension 0 first). Rectangles map to the deepest partition cell that
//! fully contains them; points map to a full-depth cell.
//!
//! Caller contract: coordinates must be pre-normalized into `[0, 1)^d`.
//! Out-of-range input is clamped into the boundary cells, producing bit
//! patterns that are well-defined but carry no spatial meaning. This is not
//! validated at runtime.

use crate::common::Rectangle;
use crate::config::PartitionConfig;
use crate::curve::{BitCode, CurveError};
use crate::errors::ZweepResult;

/// Grid cell number of a coordinate at the given level.
pub(crate) fn cell_of(coord: f64, level: u32) -> u64 {
    let cells = 1u64 << level;
    let scaled = (coord * cells as f64).floor();
    if scaled <= 0.0 {
        0
    } else {
        (scaled as u64).min(cells - 1)
    }
}

fn check_dims(expected: usize, actual: usize) -> Result<(), CurveError> {
    if expected != actual {
        return Err(CurveError::DimensionMismatch { expected, actual });
    }
    Ok(())
}

/// Interleaves full-depth grid cells into a point code.
fn interleave_cells(cells: &[u64], level: u32) -> BitCode {
    let mut code = BitCode::zeros(level * cells.len() as u32);
    let mut pos = 0u32;
    for b in 0..level {
        for cell in cells {
            code.set(pos, (cell >> (level - 1 - b)) & 1 == 1);
            pos += 1;
        }
    }
    code
}

/// Computes the z-order code of a hyper-rectangle.
///
/// For each dimension the lower and upper corner are mapped to grid cells at
/// `max_level`; the dimension agrees down to the level at which both cells
/// share a bit prefix. The rectangle's overall level is the minimum
/// agreement across dimensions, and the resulting code interleaves that many
/// bits from every dimension (`precision = level × dimensions`).
///
/// A rectangle straddling the top-level boundary of any dimension gets the
/// empty code (precision 0).
pub fn z_code(rect: &Rectangle, config: &PartitionConfig) -> ZweepResult<BitCode> {
    check_dims(config.dimensions(), rect.dimensions())?;
    let max_level = config.max_level();
    let dims = config.dimensions();

    let mut cells = Vec::with_capacity(dims);
    let mut level = max_level;
    for d in 0..dims {
        let lo = cell_of(rect.lower()[d], max_level);
        let up = cell_of(rect.upper()[d], max_level);
        let agreement = if lo == up {
            max_level
        } else {
            let highest_diff = 63 - (lo ^ up).leading_zeros();
            max_level - (highest_diff + 1)
        };
        level = level.min(agreement);
        cells.push(lo);
    }

    let mut code = BitCode::zeros(level * dims as u32);
    let mut pos = 0u32;
    for b in 0..level {
        for cell in &cells {
            code.set(pos, (cell >> (max_level - 1 - b)) & 1 == 1);
            pos += 1;
        }
    }
    Ok(code)
}

/// Computes the full-depth z-order code of a point.
///
/// The precision is always `max_level × dimensions`.
pub fn z_code_point(coords: &[f64], config: &PartitionConfig) -> ZweepResult<BitCode> {
    check_dims(config.dimensions(), coords.len())?;
    let cells: Vec<u64> = coords
        .iter()
        .map(|c| cell_of(*c, config.max_level()))
        .collect();
    Ok(interleave_cells(&cells, config.max_level()))
}

/// Interleaves raw fixed-point components directly.
///
/// Each of the first `additional_bits` components is treated as a
/// `(component_precision + 1)`-bit value, the rest as plain
/// `component_precision`-bit values. The extra bits are folded in as
/// *leading* bits: the most significant bit of each widened component is
/// emitted up front, then the remaining `component_precision` bits of every
/// component are interleaved round-robin.
///
/// See [`z_code_folded`] for the alternative trailing-fold encoding; the two
/// disagree whenever `additional_bits > 0` and are both preserved because
/// compatibility with existing encoded data depends on which one was used at
/// write time.
pub fn z_code_from_bits(
    components: &[u64],
    component_precision: u32,
    additional_bits: u32,
) -> ZweepResult<BitCode> {
    let dims = components.len();
    if dims == 0 {
        return Err(CurveError::InvalidInput("no components given".to_string()).into());
    }
    if additional_bits as usize >= dims {
        return Err(CurveError::InvalidInput(format!(
            "additional_bits {} must be smaller than the {} components",
            additional_bits, dims
        ))
        .into());
    }
    if component_precision >= 64 {
        return Err(CurveError::PrecisionOverflow(component_precision).into());
    }

    let mut code = BitCode::new();
    // leading fold: MSB of each widened component first
    for component in components.iter().take(additional_bits as usize) {
        code.push((component >> component_precision) & 1 == 1);
    }
    for r in 0..component_precision {
        for component in components {
            code.push((component >> (component_precision - 1 - r)) & 1 == 1);
        }
    }
    Ok(code)
}

/// The alternative folded encoding of raw fixed-point components.
///
/// `precision` is the total code length; components are widened exactly as
/// in [`z_code_from_bits`] (`precision / dims` bits each, one more for the
/// first `precision % dims`), but the extra bits are folded in as *trailing*
/// bits after the round-robin interleave instead of leading it. Preserved as
/// a documented second encoding; nothing in the engine converts between the
/// two.
pub fn z_code_folded(components: &[u64], precision: u32) -> ZweepResult<BitCode> {
    let dims = components.len();
    if dims == 0 {
        return Err(CurveError::InvalidInput("no components given".to_string()).into());
    }
    let component_precision = precision / dims as u32;
    let additional = (precision % dims as u32) as usize;
    if component_precision >= 64 {
        return Err(CurveError::PrecisionOverflow(component_precision).into());
    }

    let mut code = BitCode::new();
    for r in 0..component_precision {
        for (d, component) in components.iter().enumerate() {
            let width = component_precision + (d < additional) as u32;
            code.push((component >> (width - 1 - r)) & 1 == 1);
        }
    }
    for component in components.iter().take(additional) {
        code.push(component & 1 == 1);
    }
    Ok(code)
}

/// Inverse mapping: the partition cell a code denotes.
///
/// Bits are de-interleaved round-robin (dimension 0 first), so this inverts
/// [`z_code`] and [`z_code_point`], not the raw-component encodings. Codes
/// whose precision is not a multiple of the dimensionality are legal; the
/// leading dimensions simply carry one more bit and get a proportionally
/// narrower cell.
pub fn decode_cell(code: &BitCode, config: &PartitionConfig) -> ZweepResult<Rectangle> {
    let dims = config.dimensions();
    let mut values = vec![0u64; dims];
    let mut widths = vec![0u32; dims];
    for i in 0..code.precision() {
        let d = (i as usize) % dims;
        values[d] = (values[d] << 1) | code.get(i) as u64;
        widths[d] += 1;
    }

    let mut lower = Vec::with_capacity(dims);
    let mut upper = Vec::with_capacity(dims);
    for d in 0..dims {
        let span = (1u64 << widths[d]) as f64;
        lower.push(values[d] as f64 / span);
        upper.push((values[d] + 1) as f64 / span);
    }
    Rectangle::new(&lower, &upper)
}

/// Whether a full-depth point code falls inside a query rectangle's grid
/// region at `max_level`.
pub fn code_in_box(code: &BitCode, rect: &Rectangle, config: &PartitionConfig) -> ZweepResult<bool> {
    check_dims(config.dimensions(), rect.dimensions())?;
    let dims = config.dimensions();
    let max_level = config.max_level();

    let mut values = vec![0u64; dims];
    for i in 0..config.full_precision() {
        let d = (i as usize) % dims;
        values[d] = (values[d] << 1) | code.get(i) as u64;
    }
    for d in 0..dims {
        let min_cell = cell_of(rect.lower()[d], max_level);
        let max_cell = cell_of(rect.upper()[d], max_level);
        if values[d] < min_cell || values[d] > max_cell {
            return Ok(false);
        }
    }
    Ok(true)
}

/// Sets bit `pos` and clears all lower bits.
fn load_min(value: u64, pos: u32) -> u64 {
    let keep_above = if pos + 1 >= 64 { 0 } else { !0u64 << (pos + 1) };
    (value & keep_above) | (1u64 << pos)
}

/// Clears bit `pos` and sets all lower bits.
fn load_max(value: u64, pos: u32) -> u64 {
    let keep_above = if pos + 1 >= 64 { 0 } else { !0u64 << (pos + 1) };
    (value & keep_above) | ((1u64 << pos) - 1)
}

/// The smallest full-depth code strictly greater than `code` that lies
/// inside the query rectangle (the BIGMIN operation).
///
/// `code` is zero-padded to full point depth before the successor is taken,
/// so passing a partition-cell code continues the scan from that cell's
/// lower corner. Returns `None` when no in-box code beyond `code` exists.
pub fn next_in_box(
    code: &BitCode,
    rect: &Rectangle,
    config: &PartitionConfig,
) -> ZweepResult<Option<BitCode>> {
    check_dims(config.dimensions(), rect.dimensions())?;
    let dims = config.dimensions();
    let max_level = config.max_level();
    let full = config.full_precision();
    if code.precision() > full {
        return Err(CurveError::PrecisionOverflow(code.precision()).into());
    }

    let mut padded = code.clone();
    while padded.precision() < full {
        padded.push(false);
    }
    let candidate = match padded.increment() {
        Some(c) => c,
        None => return Ok(None),
    };

    let mut min_cells: Vec<u64> = (0..dims).map(|d| cell_of(rect.lower()[d], max_level)).collect();
    let mut max_cells: Vec<u64> = (0..dims).map(|d| cell_of(rect.upper()[d], max_level)).collect();

    let mut bigmin: Option<BitCode> = None;
    for pos in 0..full {
        let d = (pos as usize) % dims;
        let shift = max_level - 1 - pos / dims as u32;
        let z_bit = candidate.get(pos);
        let min_bit = (min_cells[d] >> shift) & 1 == 1;
        let max_bit = (max_cells[d] >> shift) & 1 == 1;

        match (z_bit, min_bit, max_bit) {
            (false, false, false) => {}
            (false, false, true) => {
                let mut loaded = min_cells.clone();
                loaded[d] = load_min(min_cells[d], shift);
                bigmin = Some(interleave_cells(&loaded, max_level));
                max_cells[d] = load_max(max_cells[d], shift);
            }
            (false, true, true) => {
                return Ok(Some(interleave_cells(&min_cells, max_level)));
            }
            (true, false, false) => {
                return Ok(bigmin);
            }
            (true, false, true) => {
                min_cells[d] = load_min(min_cells[d], shift);
            }
            (true, true, true) => {}
            (_, true, false) => {
                return Err(CurveError::InvalidInput(
                    "query rectangle has inverted bounds".to_string(),
                )
                .into());
            }
        }
    }
    // the candidate itself lies inside the box
    Ok(Some(candidate))
}
