//! Binary mask to polygon regions.
//!
//! Borders and their nesting come from `imageproc`'s Suzuki-Abe contour
//! search, and components from its 8-connected labelling. Each border is
//! then re-walked along pixel edges ("cracks"), so rings have integer
//! vertices on pixel corners and enclose exactly the component's pixels
//! under pixel-center sampling.

use std::collections::HashMap;

use image::{GrayImage, Luma};
use imageproc::contours::{find_contours, BorderType};
use imageproc::region_labelling::{connected_components, Connectivity};

use crate::ir::{Region, Ring};

/// Rings with fewer coordinates than this (a closed triangle plus one
/// point) are dropped.
pub const MIN_RING_COORDINATES: usize = 10;

/// Headings along pixel edges: east, south, west, north.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Heading {
    East,
    South,
    West,
    North,
}

impl Heading {
    const ALL: [Heading; 4] = [Heading::East, Heading::South, Heading::West, Heading::North];

    fn index(self) -> usize {
        self as usize
    }

    fn step(self) -> (i64, i64) {
        match self {
            Heading::East => (1, 0),
            Heading::South => (0, 1),
            Heading::West => (-1, 0),
            Heading::North => (0, -1),
        }
    }

    fn turn_left(self) -> Heading {
        Heading::ALL[(self.index() + 3) % 4]
    }

    fn turn_right(self) -> Heading {
        Heading::ALL[(self.index() + 1) % 4]
    }

    /// Pixels to the right and left of the unit edge leaving `vertex`.
    fn flanking_pixels(self, (vx, vy): (i64, i64)) -> ((i64, i64), (i64, i64)) {
        match self {
            Heading::East => ((vx, vy), (vx, vy - 1)),
            Heading::South => ((vx - 1, vy), (vx, vy)),
            Heading::West => ((vx - 1, vy - 1), (vx - 1, vy)),
            Heading::North => ((vx, vy - 1), (vx - 1, vy - 1)),
        }
    }
}

/// Foreground lookup with everything outside the image counted as
/// background.
struct Grid {
    width: i64,
    height: i64,
    foreground: Vec<bool>,
}

impl Grid {
    fn from_mask(mask: &GrayImage) -> Self {
        Self {
            width: i64::from(mask.width()),
            height: i64::from(mask.height()),
            foreground: mask.pixels().map(|p| p.0[0] > 0).collect(),
        }
    }

    fn is_foreground(&self, (x, y): (i64, i64)) -> bool {
        x >= 0
            && y >= 0
            && x < self.width
            && y < self.height
            && self.foreground[(y * self.width + x) as usize]
    }

    /// Walks one crack loop with foreground on the right, preferring left
    /// turns so diagonal neighbours stay joined. Returns the corner vertices.
    fn follow(&self, start: (i64, i64), heading: Heading) -> Vec<(i64, i64)> {
        let mut corners = Vec::new();
        let mut vertex = start;
        let mut current = heading;
        let mut incoming: Option<Heading> = None;
        loop {
            if incoming != Some(current) {
                corners.push(vertex);
            }
            let (dx, dy) = current.step();
            let next_vertex = (vertex.0 + dx, vertex.1 + dy);
            let (ahead_right, ahead_left) = current.flanking_pixels(next_vertex);
            let next = if self.is_foreground(ahead_left) {
                current.turn_left()
            } else if self.is_foreground(ahead_right) {
                current
            } else {
                current.turn_right()
            };
            incoming = Some(current);
            vertex = next_vertex;
            current = next;
            if vertex == start && current == heading {
                break;
            }
        }
        // The start vertex is only a corner if the loop bends there.
        if incoming == Some(heading) && corners.len() > 1 {
            corners.remove(0);
        }
        corners
    }
}

#[derive(Default)]
struct Traced {
    outer: Option<Ring>,
    holes: Vec<Ring>,
}

/// Traces every foreground (non-zero) component of `mask` into polygon
/// regions.
///
/// Each region is `[outer, hole, ...]` with the outer ring clockwise and the
/// holes counter-clockwise; rings are closed (the first vertex is repeated
/// at the end). Regions come out in raster order of each component's first
/// pixel. Components sitting inside another component's hole become their
/// own regions. Rings shorter than [`MIN_RING_COORDINATES`] are dropped, and
/// so are regions left without rings. An all-background mask yields no
/// regions.
pub fn mask_to_segmentation(mask: &GrayImage) -> Vec<Region> {
    if mask.width() == 0 || mask.height() == 0 {
        return Vec::new();
    }
    // Labelling compares raw values, so every foreground level is folded to one.
    let binary = GrayImage::from_fn(mask.width(), mask.height(), |x, y| {
        Luma([if mask.get_pixel(x, y).0[0] > 0 { 255 } else { 0 }])
    });
    let labels = connected_components(&binary, Connectivity::Eight, Luma([0u8]));
    let grid = Grid::from_mask(&binary);

    let mut slots: HashMap<u32, usize> = HashMap::new();
    let mut traced: Vec<Traced> = Vec::new();
    // An outer border starts at its component's first raster pixel, so the
    // pixel above is background. A hole border starts at a pixel whose east
    // neighbour lies in that hole.
    for contour in find_contours::<i32>(&binary) {
        let Some(start) = contour.points.first() else {
            continue;
        };
        let label = labels.get_pixel(start.x as u32, start.y as u32).0[0];
        let slot = *slots.entry(label).or_insert_with(|| {
            traced.push(Traced::default());
            traced.len() - 1
        });
        let (x, y) = (i64::from(start.x), i64::from(start.y));
        match contour.border_type {
            BorderType::Outer => {
                traced[slot].outer = Some(closed_ring(&grid.follow((x, y), Heading::East)));
            }
            BorderType::Hole => {
                let ring = closed_ring(&grid.follow((x + 1, y), Heading::South));
                traced[slot].holes.push(ring);
            }
        }
    }

    traced
        .into_iter()
        .filter_map(|Traced { outer, holes }| {
            let region: Region = outer
                .into_iter()
                .chain(holes)
                .filter(|ring| ring.len() >= MIN_RING_COORDINATES)
                .collect();
            (!region.is_empty()).then_some(region)
        })
        .collect()
}

fn closed_ring(corners: &[(i64, i64)]) -> Ring {
    let mut ring: Ring = corners
        .iter()
        .flat_map(|&(x, y)| [x as f64, y as f64])
        .collect();
    if let Some(&(x, y)) = corners.first() {
        ring.extend([x as f64, y as f64]);
    }
    ring
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::{is_clockwise, polygon_area};

    fn mask_from_rows(rows: &[&str]) -> GrayImage {
        let height = rows.len() as u32;
        let width = rows.first().map_or(0, |r| r.len()) as u32;
        GrayImage::from_fn(width, height, |x, y| {
            let on = rows[y as usize].as_bytes()[x as usize] == b'#';
            Luma([if on { 255 } else { 0 }])
        })
    }

    #[test]
    fn empty_mask_has_no_regions() {
        assert!(mask_to_segmentation(&GrayImage::new(8, 8)).is_empty());
        assert!(mask_to_segmentation(&GrayImage::new(0, 0)).is_empty());
    }

    #[test]
    fn filled_rectangle_traces_to_its_corners() {
        let mut mask = GrayImage::new(20, 20);
        for y in 5..9 {
            for x in 2..12 {
                mask.put_pixel(x, y, Luma([1]));
            }
        }
        let regions = mask_to_segmentation(&mask);
        assert_eq!(regions.len(), 1);
        assert_eq!(regions[0].len(), 1);
        let ring = &regions[0][0];
        assert_eq!(
            ring,
            &vec![2.0, 5.0, 12.0, 5.0, 12.0, 9.0, 2.0, 9.0, 2.0, 5.0]
        );
        assert!(is_clockwise(ring));
        assert_eq!(polygon_area(ring), 40.0);
    }

    #[test]
    fn hole_is_counter_clockwise() {
        let mask = mask_from_rows(&[
            "#####", //
            "#...#", //
            "#...#", //
            "#...#", //
            "#####",
        ]);
        let regions = mask_to_segmentation(&mask);
        assert_eq!(regions.len(), 1);
        assert_eq!(regions[0].len(), 2);
        assert!(is_clockwise(&regions[0][0]));
        assert!(!is_clockwise(&regions[0][1]));
        assert_eq!(polygon_area(&regions[0][1]), 9.0);
    }

    #[test]
    fn island_in_hole_is_separate_region() {
        let mask = mask_from_rows(&[
            "#######", //
            "#.....#", //
            "#.###.#", //
            "#.###.#", //
            "#.###.#", //
            "#.....#", //
            "#######",
        ]);
        let regions = mask_to_segmentation(&mask);
        assert_eq!(regions.len(), 2);
        assert_eq!(regions[0].len(), 2);
        assert_eq!(regions[1].len(), 1);
        assert_eq!(polygon_area(&regions[1][0]), 9.0);
    }

    #[test]
    fn diagonal_pixels_stay_one_component() {
        let mask = mask_from_rows(&[
            "##..", //
            "##..", //
            "..##", //
            "..##",
        ]);
        let regions = mask_to_segmentation(&mask);
        assert_eq!(regions.len(), 1);
        assert_eq!(regions[0].len(), 1);
        assert_eq!(polygon_area(&regions[0][0]), 8.0);
    }

    #[test]
    fn single_pixel_survives_minimum_length() {
        let mask = mask_from_rows(&["...", ".#.", "..."]);
        let regions = mask_to_segmentation(&mask);
        assert_eq!(
            regions,
            vec![vec![vec![1.0, 1.0, 2.0, 1.0, 2.0, 2.0, 1.0, 2.0, 1.0, 1.0]]]
        );
    }

    #[test]
    fn grey_levels_count_as_one_foreground() {
        let mut mask = GrayImage::new(6, 4);
        for (x, level) in [(1, 40), (2, 255), (3, 7)] {
            mask.put_pixel(x, 1, Luma([level]));
            mask.put_pixel(x, 2, Luma([level]));
        }
        let regions = mask_to_segmentation(&mask);
        assert_eq!(
            regions,
            vec![vec![vec![1.0, 1.0, 4.0, 1.0, 4.0, 3.0, 1.0, 3.0, 1.0, 1.0]]]
        );
    }

    #[test]
    fn two_holes_attach_to_their_component() {
        let mask = mask_from_rows(&[
            "#######", //
            "#.#.#.#", //
            "#######", //
            "..#....", //
            "..#....",
        ]);
        let regions = mask_to_segmentation(&mask);
        assert_eq!(regions.len(), 1);
        assert_eq!(regions[0].len(), 4);
        assert!(regions[0][1..].iter().all(|hole| !is_clockwise(hole)));
        assert!(regions[0][1..].iter().all(|hole| polygon_area(hole) == 1.0));
    }
}
