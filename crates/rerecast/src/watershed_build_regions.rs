use thiserror::Error;

use crate::{AreaType, CompactHeightfield, RegionId};

impl CompactHeightfield {
    /// Builds the region data for the heightfield using watershed partitioning.
    ///
    /// Non-null regions will consist of connected, non-overlapping walkable spans that form a single contour.
    /// Contours will form simple polygons.
    ///
    /// If multiple regions form an area that is smaller than `min_region_area`, then all spans will be
    /// re-assigned to [`RegionId::NONE`].
    ///
    /// Watershed partitioning can result in smaller than necessary regions, especially in diagonal corridors.
    /// `merge_region_area` helps reduce unnecessarily small regions.
    ///
    /// The region data will be available via the [`CompactHeightfield::max_region`]
    /// and [`CompactSpan::region`](crate::CompactSpan::region) fields.
    ///
    /// # Arguments
    ///
    /// - `border_size` - The size of the non-navigable border around the heightfield. [Limit: >=0] [Units: vx]
    /// - `min_region_area` - The minimum number of cells allowed to form isolated island areas. [Limit: >=0] [Units: vx]
    /// - `merge_region_area` - Any regions with a span count smaller than this value will, if possible,
    ///   be merged with larger regions. [Limit: >=0] [Units: vx]
    ///
    /// # Errors
    ///
    /// The distance field must be created using [`CompactHeightfield::build_distance_field`] before attempting to build regions.
    pub fn build_regions(
        &mut self,
        border_size: u16,
        min_region_area: u16,
        merge_region_area: u16,
    ) -> Result<(), RegionError> {
        if self.dist.len() != self.spans.len() {
            return Err(RegionError::MissingDistanceField {
                distances: self.dist.len(),
                spans: self.spans.len(),
            });
        }

        const LOG_NB_STACKS: usize = 3;
        const NB_STACKS: usize = 1 << LOG_NB_STACKS;
        let mut level_stacks: [Vec<LevelStackEntry>; NB_STACKS] = [const { Vec::new() }; NB_STACKS];
        for stack in &mut level_stacks {
            stack.reserve(256);
        }
        let mut stack: Vec<LevelStackEntry> = Vec::with_capacity(256);

        let mut src_reg = vec![RegionId::NONE; self.spans.len()];
        let mut src_dist = vec![0_u16; self.spans.len()];

        let mut region_id = 1_u16;
        let mut level = self.max_distance.saturating_add(1) & !1;

        // Defines how much the watershed "overflows" and simplifies the regions.
        let expand_iters = 8;

        if border_size > 0 {
            // Make sure border will not overflow.
            let border_width = border_size.min(self.width);
            let border_height = border_size.min(self.height);
            let rects = [
                (0, border_width, 0, self.height),
                (self.width - border_width, self.width, 0, self.height),
                (0, self.width, 0, border_height),
                (0, self.width, self.height - border_height, self.height),
            ];
            for (min_x, max_x, min_z, max_z) in rects {
                let region = RegionId::from(region_id) | RegionId::BORDER_REGION;
                self.paint_rect_region(min_x, max_x, min_z, max_z, region, &mut src_reg);
                region_id += 1;
            }
        }
        self.border_size = border_size;

        let mut s_id = NB_STACKS - 1;
        while level > 0 {
            level = level.saturating_sub(2);
            s_id = (s_id + 1) & (NB_STACKS - 1);

            if s_id == 0 {
                self.sort_cells_by_level(level, &src_reg, &mut level_stacks, 1);
            } else {
                // copy left overs from last level
                let (src, dst) = level_stacks.split_at_mut(s_id);
                append_stacks(&src[s_id - 1], &mut dst[0], &src_reg);
            }

            // Expand current regions until no empty connected cells found.
            self.expand_regions(
                expand_iters,
                level,
                &mut src_reg,
                &mut src_dist,
                &mut level_stacks[s_id],
                false,
            );

            // Mark new regions with IDs.
            for j in 0..level_stacks[s_id].len() {
                let entry = level_stacks[s_id][j].clone();
                let Some(i) = entry.index else {
                    continue;
                };
                if src_reg[i] != RegionId::NONE {
                    continue;
                }
                let region = RegionId::from(region_id);
                if self.flood_region(
                    entry.x,
                    entry.z,
                    i,
                    level,
                    region,
                    &mut src_reg,
                    &mut src_dist,
                    &mut stack,
                ) {
                    if region_id >= RegionId::BORDER_REGION.bits() - 1 {
                        return Err(RegionError::TooManyRegions);
                    }
                    region_id += 1;
                }
            }
        }

        // Expand current regions until no empty connected cells found.
        self.expand_regions(
            expand_iters * 8,
            0,
            &mut src_reg,
            &mut src_dist,
            &mut stack,
            true,
        );

        // Merge regions and filter out small regions.
        let max_region =
            self.merge_and_filter_regions(min_region_area, merge_region_area, region_id, &mut src_reg);
        self.max_region = max_region;

        // Write the result out.
        for (span, region) in self.spans.iter_mut().zip(src_reg) {
            span.region = region;
        }
        Ok(())
    }

    fn paint_rect_region(
        &self,
        min_x: u16,
        max_x: u16,
        min_z: u16,
        max_z: u16,
        region: RegionId,
        src_reg: &mut [RegionId],
    ) {
        for z in min_z..max_z {
            for x in min_x..max_x {
                for i in self.cell_at(x, z).index_range() {
                    if self.areas[i].is_walkable() {
                        src_reg[i] = region;
                    }
                }
            }
        }
    }

    /// Buckets the unassigned spans into stacks of descending distance levels, starting at `start_level`.
    fn sort_cells_by_level(
        &self,
        start_level: u16,
        src_reg: &[RegionId],
        stacks: &mut [Vec<LevelStackEntry>],
        log_levels_per_stack: u16,
    ) {
        let start_level = start_level >> log_levels_per_stack;
        for stack in stacks.iter_mut() {
            stack.clear();
        }

        // put all cells in the level range into the appropriate stacks
        for z in 0..self.height {
            for x in 0..self.width {
                for i in self.cell_at(x, z).index_range() {
                    if !self.areas[i].is_walkable() || src_reg[i] != RegionId::NONE {
                        continue;
                    }
                    let level = self.dist[i] >> log_levels_per_stack;
                    let s_id = start_level.saturating_sub(level) as usize;
                    if s_id >= stacks.len() {
                        continue;
                    }
                    stacks[s_id].push(LevelStackEntry {
                        x,
                        z,
                        index: Some(i),
                    });
                }
            }
        }
    }

    /// Grows the existing regions into the unassigned spans of `stack`.
    ///
    /// Each pass assigns a span the region of the neighbor with the smallest propagated distance,
    /// with the lower direction winning ties. Assignments of one pass only become visible to the next pass.
    fn expand_regions(
        &self,
        max_iter: u16,
        level: u16,
        src_reg: &mut [RegionId],
        src_dist: &mut [u16],
        stack: &mut Vec<LevelStackEntry>,
        fill_stack: bool,
    ) {
        if fill_stack {
            // Find cells revealed by the raised level.
            stack.clear();
            for z in 0..self.height {
                for x in 0..self.width {
                    for i in self.cell_at(x, z).index_range() {
                        if self.dist[i] >= level
                            && src_reg[i] == RegionId::NONE
                            && self.areas[i].is_walkable()
                        {
                            stack.push(LevelStackEntry {
                                x,
                                z,
                                index: Some(i),
                            });
                        }
                    }
                }
            }
        } else {
            // use cells in the input stack
            // mark all cells which already have a region
            for entry in stack.iter_mut() {
                if entry.index.is_some_and(|i| src_reg[i] != RegionId::NONE) {
                    entry.index = None;
                }
            }
        }

        let mut dirty_entries = Vec::new();
        let mut iter = 0;
        while !stack.is_empty() {
            let mut failed = 0;
            dirty_entries.clear();

            for entry in stack.iter_mut() {
                let Some(i) = entry.index else {
                    failed += 1;
                    continue;
                };

                let mut r = src_reg[i];
                let mut d2 = u16::MAX;
                let area = self.areas[i];
                for dir in 0..4 {
                    let Some(a_i) = self.neighbor_index(entry.x as i32, entry.z as i32, i, dir)
                    else {
                        continue;
                    };
                    if self.areas[a_i] != area {
                        continue;
                    }
                    let a_region = src_reg[a_i];
                    let a_dist = src_dist[a_i].saturating_add(2);
                    if a_region.is_interior() && a_dist < d2 {
                        r = a_region;
                        d2 = a_dist;
                    }
                }
                if r != RegionId::NONE {
                    // Mark as used
                    entry.index = None;
                    dirty_entries.push(DirtyEntry {
                        index: i,
                        region: r,
                        distance2: d2,
                    });
                } else {
                    failed += 1;
                }
            }

            // Copy entries that differ between src and dst to keep them in sync.
            for dirty_entry in &dirty_entries {
                src_reg[dirty_entry.index] = dirty_entry.region;
                src_dist[dirty_entry.index] = dirty_entry.distance2;
            }

            if failed == stack.len() {
                break;
            }

            if level > 0 {
                iter += 1;
                if iter >= max_iter {
                    break;
                }
            }
        }
    }

    /// Flood fills a new region from the span `i`, covering connected spans down to two levels below `level`.
    /// Returns whether any span ended up in the new region.
    fn flood_region(
        &self,
        x: u16,
        z: u16,
        i: usize,
        level: u16,
        region: RegionId,
        src_reg: &mut [RegionId],
        src_dist: &mut [u16],
        stack: &mut Vec<LevelStackEntry>,
    ) -> bool {
        let area = self.areas[i];

        // Flood fill mark region.
        stack.clear();
        stack.push(LevelStackEntry {
            x,
            z,
            index: Some(i),
        });
        src_reg[i] = region;
        src_dist[i] = 0;

        let lev = level.saturating_sub(2);
        let mut count = 0;

        while let Some(entry) = stack.pop() {
            let Some(ci) = entry.index else {
                continue;
            };
            let (cx, cz) = (entry.x as i32, entry.z as i32);

            // Check if any of the neighbours already have a valid region set.
            let mut neighbor_region = RegionId::NONE;
            for dir in 0..4 {
                // 8 connected
                let Some(con) = self.spans[ci].con(dir) else {
                    continue;
                };
                let (a_x, a_z, a_i) = self.con_indices(cx, cz, dir, con);
                if self.areas[a_i] != area {
                    continue;
                }
                let nr = src_reg[a_i];
                // Do not take borders into account.
                if nr.contains(RegionId::BORDER_REGION) {
                    continue;
                }
                if nr != RegionId::NONE && nr != region {
                    neighbor_region = nr;
                    break;
                }

                let dir2 = (dir + 1) & 0x3;
                if let Some(a_i2) = self.neighbor_index(a_x, a_z, a_i, dir2) {
                    if self.areas[a_i2] != area {
                        continue;
                    }
                    let nr2 = src_reg[a_i2];
                    if nr2 != RegionId::NONE && nr2 != region {
                        neighbor_region = nr2;
                        break;
                    }
                }
            }
            if neighbor_region != RegionId::NONE {
                src_reg[ci] = RegionId::NONE;
                continue;
            }

            count += 1;

            // Expand neighbours.
            for dir in 0..4 {
                let Some(con) = self.spans[ci].con(dir) else {
                    continue;
                };
                let (a_x, a_z, a_i) = self.con_indices(cx, cz, dir, con);
                if self.areas[a_i] != area {
                    continue;
                }
                if self.dist[a_i] >= lev && src_reg[a_i] == RegionId::NONE {
                    src_reg[a_i] = region;
                    src_dist[a_i] = 0;
                    stack.push(LevelStackEntry {
                        x: a_x as u16,
                        z: a_z as u16,
                        index: Some(a_i),
                    });
                }
            }
        }

        count > 0
    }

    /// Removes regions smaller than `min_region_area`, merges regions smaller than `merge_region_area`
    /// into a neighbor and compacts the region ids. Returns the highest region id in use.
    fn merge_and_filter_regions(
        &self,
        min_region_area: u16,
        merge_region_area: u16,
        region_count: u16,
        src_reg: &mut [RegionId],
    ) -> RegionId {
        // Ids below `region_count` have been handed out, including the unused id 0.
        let region_count = region_count as usize;
        let mut regions: Vec<Region> = (0..region_count)
            .map(|i| Region::new(RegionId::from(i as u16)))
            .collect();

        // Find edge of a region and find connections around the contour.
        for z in 0..self.height {
            for x in 0..self.width {
                let cell = *self.cell_at(x, z);
                for i in cell.index_range() {
                    let r = src_reg[i];
                    if r == RegionId::NONE || r.bits() as usize >= region_count {
                        continue;
                    }
                    let reg = &mut regions[r.bits() as usize];
                    reg.span_count += 1;

                    // Update floors.
                    for j in cell.index_range() {
                        if i == j {
                            continue;
                        }
                        let floor_id = src_reg[j];
                        if floor_id == RegionId::NONE || floor_id.bits() as usize >= region_count {
                            continue;
                        }
                        if floor_id == r {
                            reg.overlap = true;
                        }
                        reg.add_unique_floor_region(floor_id);
                    }

                    // Have found contour
                    if !reg.connections.is_empty() {
                        continue;
                    }
                    reg.area = self.areas[i];

                    // Check if this cell is next to a border.
                    let solid_dir =
                        (0..4).find(|&dir| self.is_solid_edge(src_reg, x as i32, z as i32, i, dir));
                    if let Some(dir) = solid_dir {
                        // The cell is at border.
                        // Walk around the contour to find all the neighbours.
                        let (connections, shared_edges) =
                            self.walk_region_contour(x as i32, z as i32, i, dir, src_reg);
                        let reg = &mut regions[r.bits() as usize];
                        reg.connections = connections;
                        reg.shared_edges = shared_edges;
                    }
                }
            }
        }

        // Remove too small regions.
        let mut stack = Vec::with_capacity(32);
        let mut trace = Vec::with_capacity(32);
        for i in 0..region_count {
            {
                let reg = &regions[i];
                if !reg.id.is_interior() || reg.span_count == 0 || reg.visited {
                    continue;
                }
            }

            // Count the total size of all the connected regions.
            // Also keep track of the regions connects to a tile border.
            let mut connects_to_border = false;
            let mut span_count = 0;
            stack.clear();
            trace.clear();

            regions[i].visited = true;
            stack.push(i);

            while let Some(ri) = stack.pop() {
                span_count += regions[ri].span_count;
                trace.push(ri);

                for j in 0..regions[ri].connections.len() {
                    let connection = regions[ri].connections[j];
                    if connection.contains(RegionId::BORDER_REGION) {
                        connects_to_border = true;
                        continue;
                    }
                    let neighbor = &mut regions[connection.bits() as usize];
                    if neighbor.visited || !neighbor.id.is_interior() {
                        continue;
                    }
                    // Visit
                    stack.push(neighbor.id.bits() as usize);
                    neighbor.visited = true;
                }
            }

            // If the accumulated regions size is too small, remove it.
            // Do not remove areas which connect to tile borders
            // as their size cannot be estimated correctly and removing them
            // can potentially remove necessary areas.
            if span_count < min_region_area as usize && !connects_to_border {
                // Kill all visited regions.
                for &j in &trace {
                    regions[j].span_count = 0;
                    regions[j].id = RegionId::NONE;
                }
            }
        }

        // Merge too small regions to neighbour regions.
        loop {
            let mut merge_count = 0;
            for i in 0..region_count {
                let reg = &regions[i];
                if !reg.id.is_interior() || reg.overlap || reg.span_count == 0 {
                    continue;
                }

                // Check to see if the region should be merged.
                if reg.span_count > merge_region_area as usize && reg.is_connected_to_border() {
                    continue;
                }

                // Small region with more than 1 connection.
                // Or region which is not connected to a border at all.
                // Find the neighbour region sharing the longest border with this one.
                let mut best: Option<(u32, usize, RegionId)> = None;
                for &connection in &reg.connections {
                    if connection.contains(RegionId::BORDER_REGION) {
                        continue;
                    }
                    let candidate = &regions[connection.bits() as usize];
                    if !candidate.id.is_interior() || candidate.overlap {
                        continue;
                    }
                    if !reg.can_merge_with(candidate) || !candidate.can_merge_with(reg) {
                        continue;
                    }
                    let key = (reg.shared_edge_count(candidate.id), candidate.span_count, candidate.id);
                    let is_better = best.is_none_or(|(edges, span_count, id)| {
                        key.0 > edges
                            || (key.0 == edges && key.1 < span_count)
                            || (key.0 == edges && key.1 == span_count && key.2 < id)
                    });
                    if is_better {
                        best = Some(key);
                    }
                }

                // Found new id.
                let Some((_, _, merge_id)) = best else {
                    continue;
                };
                let old_id = reg.id;
                let mut source = std::mem::take(&mut regions[i]);
                let merged = regions[merge_id.bits() as usize].merge(&mut source);
                regions[i] = source;
                if !merged {
                    continue;
                }
                // Fixup regions pointing to current region.
                for region in regions.iter_mut() {
                    if !region.id.is_interior() {
                        continue;
                    }
                    // If another region was already merged into current region
                    // change the nid of the previous region too.
                    if region.id == old_id {
                        region.id = merge_id;
                    }
                    // Replace the current region with the new one if the
                    // current regions is neighbour.
                    region.replace_neighbor(old_id, merge_id);
                }
                merge_count += 1;
            }
            if merge_count == 0 {
                break;
            }
        }

        // Compress region Ids.
        for region in &mut regions {
            region.remap = region.id.is_interior();
        }
        let mut region_id_gen = 0_u16;
        for i in 0..region_count {
            if !regions[i].remap {
                continue;
            }
            let old_id = regions[i].id;
            region_id_gen += 1;
            let new_id = RegionId::from(region_id_gen);
            for region in &mut regions[i..] {
                if region.id == old_id {
                    region.id = new_id;
                    region.remap = false;
                }
            }
        }

        // Remap regions.
        for region in src_reg.iter_mut() {
            if !region.contains(RegionId::BORDER_REGION) {
                *region = regions[region.bits() as usize].id;
            }
        }

        let overlap_count = regions.iter().filter(|region| region.overlap).count();
        if overlap_count > 0 {
            tracing::error!("build_regions: {overlap_count} overlapping regions.");
        }

        RegionId::from(region_id_gen)
    }

    /// An edge is solid if the span across it belongs to another region, or there is no span at all.
    fn is_solid_edge(&self, src_reg: &[RegionId], x: i32, z: i32, i: usize, dir: u8) -> bool {
        let r = self
            .neighbor_index(x, z, i, dir)
            .map_or(RegionId::NONE, |a_i| src_reg[a_i]);
        r != src_reg[i]
    }

    /// Walks the outline of the region of span `i`, starting at its solid edge `dir`.
    /// Returns the sequence of neighbouring regions along the outline, and the number of edges shared with each.
    fn walk_region_contour(
        &self,
        mut x: i32,
        mut z: i32,
        mut i: usize,
        mut dir: u8,
        src_reg: &[RegionId],
    ) -> (Vec<RegionId>, Vec<(RegionId, u32)>) {
        let start_dir = dir;
        let start_i = i;

        let mut current_region = self
            .neighbor_index(x, z, i, dir)
            .map_or(RegionId::NONE, |a_i| src_reg[a_i]);
        let mut connections = vec![current_region];
        let mut shared_edges: Vec<(RegionId, u32)> = Vec::new();

        for _ in 0..MAX_CONTOUR_WALK_ITERATIONS {
            if self.is_solid_edge(src_reg, x, z, i, dir) {
                // Choose the edge corner
                let r = self
                    .neighbor_index(x, z, i, dir)
                    .map_or(RegionId::NONE, |a_i| src_reg[a_i]);
                match shared_edges.iter_mut().find(|(id, _)| *id == r) {
                    Some((_, count)) => *count += 1,
                    None => shared_edges.push((r, 1)),
                }
                if r != current_region {
                    current_region = r;
                    connections.push(current_region);
                }
                // Rotate CW
                dir = (dir + 1) & 0x3;
            } else {
                let Some(n_i) = self.neighbor_index(x, z, i, dir) else {
                    // Should not happen.
                    tracing::warn!("build_regions: lost the region outline at ({x}, {z}).");
                    break;
                };
                x += crate::math::dir_offset_x(dir) as i32;
                z += crate::math::dir_offset_z(dir) as i32;
                i = n_i;
                // Rotate CCW
                dir = (dir + 3) & 0x3;
            }

            if start_i == i && start_dir == dir {
                break;
            }
        }

        // Remove adjacent duplicates.
        remove_adjacent_duplicates(&mut connections);
        (connections, shared_edges)
    }
}

/// Walks along a contour are cut off after this many steps.
pub(crate) const MAX_CONTOUR_WALK_ITERATIONS: usize = 40_000;

fn append_stacks(
    src_stack: &[LevelStackEntry],
    dst_stack: &mut Vec<LevelStackEntry>,
    src_reg: &[RegionId],
) {
    for entry in src_stack {
        let Some(i) = entry.index else {
            continue;
        };
        if src_reg[i] != RegionId::NONE {
            continue;
        }
        dst_stack.push(entry.clone());
    }
}

fn remove_adjacent_duplicates(connections: &mut Vec<RegionId>) {
    let mut i = 0;
    while i < connections.len() && connections.len() > 1 {
        let ni = (i + 1) % connections.len();
        if connections[i] == connections[ni] {
            connections.remove(i);
        } else {
            i += 1;
        }
    }
}

/// Errors that can occur when building regions with [`CompactHeightfield::build_regions`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RegionError {
    /// [`CompactHeightfield::build_distance_field`] has not been called.
    #[error(
        "The distance field has {distances} entries for {spans} spans. Call `build_distance_field` first."
    )]
    MissingDistanceField {
        /// The number of entries in the distance field
        distances: usize,
        /// The number of spans in the heightfield
        spans: usize,
    },
    /// Region ids ran into the border flag.
    #[error("Region ID overflow: more than {} regions", RegionId::BORDER_REGION.bits() - 1)]
    TooManyRegions,
}

#[derive(Clone, Debug)]
struct LevelStackEntry {
    x: u16,
    z: u16,
    index: Option<usize>,
}

#[derive(Clone, Debug)]
struct DirtyEntry {
    index: usize,
    region: RegionId,
    distance2: u16,
}

/// Bookkeeping for one region during merging and filtering.
#[derive(Debug, Clone, Default)]
struct Region {
    span_count: usize,
    id: RegionId,
    area: AreaType,
    remap: bool,
    visited: bool,
    overlap: bool,
    /// Neighbouring regions in outline order, adjacent duplicates removed.
    connections: Vec<RegionId>,
    /// Number of outline edges shared with each neighbour.
    shared_edges: Vec<(RegionId, u32)>,
    /// Regions stacked above or below this one.
    floors: Vec<RegionId>,
}

impl Region {
    fn new(id: RegionId) -> Self {
        Self {
            id,
            ..Default::default()
        }
    }

    fn add_unique_floor_region(&mut self, id: RegionId) {
        if !self.floors.contains(&id) {
            self.floors.push(id);
        }
    }

    /// Region is connected to border if one of the neighbours is null id.
    fn is_connected_to_border(&self) -> bool {
        self.connections.contains(&RegionId::NONE)
    }

    fn shared_edge_count(&self, id: RegionId) -> u32 {
        self.shared_edges
            .iter()
            .find(|(neighbor, _)| *neighbor == id)
            .map_or(0, |(_, count)| *count)
    }

    /// Merging is only allowed between regions of the same area that touch along exactly one
    /// stretch of border and are not stacked on top of each other.
    fn can_merge_with(&self, other: &Region) -> bool {
        if self.area != other.area {
            return false;
        }
        let touching_stretches = self
            .connections
            .iter()
            .filter(|&&connection| connection == other.id)
            .count();
        if touching_stretches > 1 {
            return false;
        }
        !self.floors.contains(&other.id)
    }

    /// Merges `other` into `self`. Returns `false` if the regions are not neighbours.
    fn merge(&mut self, other: &mut Region) -> bool {
        let a_id = self.id;
        let b_id = other.id;

        // Find insertion point on A.
        let Some(ins_a) = self.connections.iter().position(|&c| c == b_id) else {
            return false;
        };
        // Find insertion point on B.
        let Some(ins_b) = other.connections.iter().position(|&c| c == a_id) else {
            return false;
        };

        // Merge neighbours.
        let a_con = std::mem::take(&mut self.connections);
        let b_con = &other.connections;
        let a_len = a_con.len();
        let b_len = b_con.len();
        for i in 0..a_len - 1 {
            self.connections.push(a_con[(ins_a + 1 + i) % a_len]);
        }
        for i in 0..b_len - 1 {
            self.connections.push(b_con[(ins_b + 1 + i) % b_len]);
        }
        remove_adjacent_duplicates(&mut self.connections);

        self.shared_edges.retain(|(id, _)| *id != b_id);
        for &(id, count) in &other.shared_edges {
            if id == a_id {
                continue;
            }
            match self.shared_edges.iter_mut().find(|(own, _)| *own == id) {
                Some((_, own_count)) => *own_count += count,
                None => self.shared_edges.push((id, count)),
            }
        }

        for &floor in &other.floors {
            self.add_unique_floor_region(floor);
        }
        self.span_count += other.span_count;
        other.span_count = 0;
        other.connections.clear();
        other.shared_edges.clear();
        true
    }

    fn replace_neighbor(&mut self, old_id: RegionId, new_id: RegionId) {
        let mut neighbor_changed = false;
        for connection in &mut self.connections {
            if *connection == old_id {
                *connection = new_id;
                neighbor_changed = true;
            }
        }
        for floor in &mut self.floors {
            if *floor == old_id {
                *floor = new_id;
            }
        }
        if let Some(old_index) = self.shared_edges.iter().position(|(id, _)| *id == old_id) {
            let (_, old_count) = self.shared_edges.remove(old_index);
            match self.shared_edges.iter_mut().find(|(id, _)| *id == new_id) {
                Some((_, count)) => *count += old_count,
                None => self.shared_edges.push((new_id, old_count)),
            }
        }
        if neighbor_changed {
            remove_adjacent_duplicates(&mut self.connections);
        }
    }
}
