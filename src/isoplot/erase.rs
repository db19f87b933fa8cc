//! Id based erasure, the compositing half of the builder.
//!
//! Every operation is bounded by the intersection of the given rect, the eraser's recorded bounds and the grid, cells
//! outside that area are never touched.

use log::trace;

use super::{BuilderId, CellRect, IdSet, IsoPlot};
use crate::error::IsoPlotError;

impl IsoPlot {
    fn erase_region(&self, eraser: BuilderId, rect: CellRect) -> Result<Option<CellRect>, IsoPlotError> {
        let object = self
            .object(eraser)
            .ok_or(IsoPlotError::UnknownBuilderId(eraser))?;
        Ok(object
            .bounds
            .and_then(|bounds| bounds.intersect(&rect))
            .and_then(|region| region.intersect(&self.grid_rect())))
    }

    /// Applies `operation` to every cell in the region, returning the number of cells it changed.
    fn for_each_cell_in<F>(&mut self, region: CellRect, mut operation: F) -> usize
    where
        F: FnMut(&mut super::Cell) -> bool,
    {
        let mut changed = 0;
        for y in region.min.y..=region.max.y {
            for x in region.min.x..=region.max.x {
                let Some(index) = self.index(x, y) else {
                    continue;
                };
                if operation(&mut self.cells[index]) {
                    changed += 1;
                }
            }
        }
        changed
    }

    /// Removes every usage of a `targets` id from the cells the `eraser` occupies, the eraser's own usage stays.
    #[profiling::function]
    pub fn erase_by_builder_id(
        &mut self,
        targets: &IdSet,
        eraser: BuilderId,
        rect: CellRect,
    ) -> Result<usize, IsoPlotError> {
        let Some(region) = self.erase_region(eraser, rect)? else {
            return Ok(0);
        };
        let changed = self.for_each_cell_in(region, |cell| {
            cell.contains(eraser) && cell.remove_where(|usage| usage.id != eraser && targets.contains(usage.id))
        });
        trace!("erase by {}, targets: {:?}, changed {} cells", eraser, targets, changed);
        Ok(changed)
    }

    /// Removes the fill usage of `id`, leaving its edge cells.
    #[profiling::function]
    pub fn erase_background_only_cells(&mut self, id: BuilderId, rect: CellRect) -> Result<usize, IsoPlotError> {
        let Some(region) = self.erase_region(id, rect)? else {
            return Ok(0);
        };
        let changed = self.for_each_cell_in(region, |cell| cell.remove_where(|usage| usage.id == id && usage.tag.is_fill()));
        trace!("erased fill of {}, changed {} cells", id, changed);
        Ok(changed)
    }

    /// Removes `id` from every cell that holds no usage of a `targets` id, so an eraser only survives where there is
    /// something to erase.
    #[profiling::function]
    pub fn erase_if_not_supported(
        &mut self,
        targets: &IdSet,
        id: BuilderId,
        rect: CellRect,
    ) -> Result<usize, IsoPlotError> {
        let Some(region) = self.erase_region(id, rect)? else {
            return Ok(0);
        };
        let changed = self.for_each_cell_in(region, |cell| {
            let supported = cell
                .usages()
                .iter()
                .any(|usage| usage.id != id && targets.contains(usage.id));
            !supported && cell.remove_where(|usage| usage.id == id)
        });
        trace!("removed unsupported {} from {} cells", id, changed);
        Ok(changed)
    }
}
