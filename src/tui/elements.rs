//! Mapping between drawn chart elements and series points.
//!
//! Point markers are identified by an [`ElementId`]. The table is owned by the
//! chart view; the series and the session know nothing about it.

use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ElementId(u32);

#[derive(Debug, Clone, Default)]
pub struct ElementMap {
    by_point: Vec<ElementId>,
    by_element: HashMap<ElementId, usize>,
    cells: HashMap<(u16, u16), ElementId>,
}

impl ElementMap {
    /// One marker per point, `0..points`.
    pub fn for_points(points: usize) -> Self {
        let mut map = Self::default();
        for index in 0..points {
            let id = ElementId(index as u32);
            map.by_point.push(id);
            map.by_element.insert(id, index);
        }
        map
    }

    pub fn len(&self) -> usize {
        self.by_point.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_point.is_empty()
    }

    pub fn element(&self, index: usize) -> Option<ElementId> {
        self.by_point.get(index).copied()
    }

    pub fn point(&self, id: ElementId) -> Option<usize> {
        self.by_element.get(&id).copied()
    }

    /// Forget all cell placements (before a redraw).
    pub fn clear_cells(&mut self) {
        self.cells.clear();
    }

    /// Record the terminal cell a point's marker was drawn at.
    ///
    /// When markers share a cell the first placement is kept.
    pub fn place(&mut self, index: usize, cell: (u16, u16)) {
        if let Some(id) = self.element(index) {
            self.cells.entry(cell).or_insert(id);
        }
    }

    pub fn element_at(&self, cell: (u16, u16)) -> Option<ElementId> {
        self.cells.get(&cell).copied()
    }

    /// Point whose marker occupies `cell`, if any.
    pub fn point_at(&self, cell: (u16, u16)) -> Option<usize> {
        self.element_at(cell).and_then(|id| self.point(id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_both_directions() {
        let map = ElementMap::for_points(3);
        assert_eq!(map.len(), 3);
        let id = map.element(2).unwrap();
        assert_eq!(map.point(id), Some(2));
        assert_eq!(map.element(3), None);
    }

    #[test]
    fn first_placement_wins_a_shared_cell() {
        let mut map = ElementMap::for_points(3);
        map.place(1, (4, 2));
        map.place(2, (4, 2));
        map.place(0, (9, 9));
        assert_eq!(map.point_at((4, 2)), Some(1));
        assert_eq!(map.point_at((9, 9)), Some(0));
        assert_eq!(map.point_at((0, 0)), None);

        map.clear_cells();
        assert_eq!(map.point_at((4, 2)), None);
    }
}
