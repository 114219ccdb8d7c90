// Row-major grid resizing shared by the 2D curves
//
// Cells keep their (x, y) position across a resize; cells outside the old
// grid come out as `fill`, cells outside the new grid are dropped.

use crate::error::{IpcError, Result};

/// Make room for `additional` more elements or report an allocation failure
/// for `wanted` elements.
pub fn reserve<T>(vec: &mut Vec<T>, wanted: usize) -> Result<()> {
    let additional = wanted.saturating_sub(vec.len());
    vec.try_reserve(additional)
        .map_err(|_| IpcError::Allocation(wanted))
}

/// Resize a 1D run, new elements set to `fill`.
pub fn resize<T: Copy>(vec: &mut Vec<T>, len: usize, fill: T) -> Result<()> {
    reserve(vec, len)?;
    vec.resize(len, fill);
    Ok(())
}

/// Re-lay a row-major `old.0 x old.1` grid out as `new.0 x new.1`.
pub fn relayout<T: Copy>(
    cells: &mut Vec<T>,
    old: (usize, usize),
    new: (usize, usize),
    fill: T,
) -> Result<()> {
    let (old_nx, old_ny) = old;
    let (new_nx, new_ny) = new;
    debug_assert_eq!(cells.len(), old_nx * old_ny);

    let new_len = new_nx
        .checked_mul(new_ny)
        .ok_or(IpcError::Allocation(usize::MAX))?;
    let rows = old_ny.min(new_ny);

    if new_nx == old_nx {
        // rows stay where they are
        return resize(cells, new_len, fill);
    }

    if new_nx > old_nx {
        if new_len > cells.len() {
            resize(cells, new_len, fill)?;
        }
        // last row first, every destination lies behind all rows not moved yet
        for y in (0..rows).rev() {
            cells.copy_within(y * old_nx..(y + 1) * old_nx, y * new_nx);
            cells[y * new_nx + old_nx..(y + 1) * new_nx].fill(fill);
        }
        cells.truncate(new_len);
    } else {
        for y in 1..rows {
            cells.copy_within(y * old_nx..y * old_nx + new_nx, y * new_nx);
        }
        cells.truncate(rows * new_nx);
        resize(cells, new_len, fill)?;
    }
    Ok(())
}
