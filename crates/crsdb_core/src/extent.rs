//! Geographic extents.
//!
//! Longitudes are in degrees within [-180, 180]. A box whose west bound is
//! greater than its east bound crosses the antimeridian.

use crate::ident::ObjectId;

/// Area proxy used for ranking: longitude span in radians times the
/// difference of the sines of the latitude bounds.
pub fn pseudo_area_from_swne(south: f64, west: f64, north: f64, east: f64) -> f64 {
    let mut east = east;
    if west > east {
        east += 360.0;
    }
    let x = (east - west).to_radians();
    let y = north.to_radians().sin() - south.to_radians().sin();
    x * y
}

/// Inclusive, antimeridian aware intersection test on raw bounds.
#[allow(clippy::too_many_arguments)]
pub fn bbox_intersects(
    s1: f64,
    w1: f64,
    n1: f64,
    e1: f64,
    s2: f64,
    w2: f64,
    n2: f64,
    e2: f64,
) -> bool {
    let a = GeographicBoundingBox::new(s1, w1, n1, e1);
    let b = GeographicBoundingBox::new(s2, w2, n2, e2);
    a.intersects(&b)
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeographicBoundingBox {
    pub south: f64,
    pub west: f64,
    pub north: f64,
    pub east: f64,
}

impl GeographicBoundingBox {
    pub const fn new(south: f64, west: f64, north: f64, east: f64) -> Self {
        GeographicBoundingBox {
            south,
            west,
            north,
            east,
        }
    }

    pub const fn world() -> Self {
        GeographicBoundingBox::new(-90.0, -180.0, 90.0, 180.0)
    }

    pub fn crosses_antimeridian(&self) -> bool {
        self.west > self.east
    }

    pub fn pseudo_area(&self) -> f64 {
        pseudo_area_from_swne(self.south, self.west, self.north, self.east)
    }

    /// Longitude intervals not crossing the antimeridian.
    fn lon_intervals(&self) -> Vec<(f64, f64)> {
        if self.crosses_antimeridian() {
            vec![(self.west, 180.0), (-180.0, self.east)]
        } else {
            vec![(self.west, self.east)]
        }
    }

    pub fn intersects(&self, other: &GeographicBoundingBox) -> bool {
        if self.south.max(other.south) > self.north.min(other.north) {
            return false;
        }
        let theirs = other.lon_intervals();
        self.lon_intervals()
            .iter()
            .any(|a| theirs.iter().any(|b| a.0 <= b.1 && b.0 <= a.1))
    }

    /// Intersection of two boxes.
    ///
    /// When the longitude overlap consists of two disjoint pieces that cannot
    /// be expressed as one box, the wider piece is returned.
    pub fn intersection(&self, other: &GeographicBoundingBox) -> Option<GeographicBoundingBox> {
        let south = self.south.max(other.south);
        let north = self.north.min(other.north);
        if south > north {
            return None;
        }

        let theirs = other.lon_intervals();
        let mut pieces: Vec<(f64, f64)> = Vec::new();
        for a in self.lon_intervals() {
            for b in &theirs {
                let lo = a.0.max(b.0);
                let hi = a.1.min(b.1);
                if lo <= hi {
                    pieces.push((lo, hi));
                }
            }
        }

        match pieces.len() {
            0 => None,
            1 => Some(GeographicBoundingBox::new(
                south, pieces[0].0, north, pieces[0].1,
            )),
            _ => {
                let to_dateline = pieces.iter().position(|p| p.1 == 180.0);
                let from_dateline = pieces.iter().position(|p| p.0 == -180.0);
                if let (Some(i), Some(j)) = (to_dateline, from_dateline) {
                    if i != j {
                        return Some(GeographicBoundingBox::new(
                            south,
                            pieces[i].0,
                            north,
                            pieces[j].1,
                        ));
                    }
                }
                pieces
                    .into_iter()
                    .max_by(|a, b| (a.1 - a.0).total_cmp(&(b.1 - b.0)))
                    .map(|p| GeographicBoundingBox::new(south, p.0, north, p.1))
            }
        }
    }
}

/// Extent of validity. An extent without a bounding box is unknown and
/// intersects everything.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Extent {
    pub id: Option<ObjectId>,
    pub description: Option<String>,
    pub bbox: Option<GeographicBoundingBox>,
}

impl Extent {
    pub fn unknown() -> Self {
        Extent::default()
    }

    pub fn world() -> Self {
        Extent {
            id: Some(ObjectId::new("EPSG", "1262")),
            description: Some("World".to_string()),
            bbox: Some(GeographicBoundingBox::world()),
        }
    }

    pub fn from_bbox(bbox: GeographicBoundingBox) -> Self {
        Extent {
            id: None,
            description: None,
            bbox: Some(bbox),
        }
    }

    pub fn is_unknown(&self) -> bool {
        self.bbox.is_none()
    }

    pub fn intersects(&self, other: &Extent) -> bool {
        match (&self.bbox, &other.bbox) {
            (Some(a), Some(b)) => a.intersects(b),
            _ => true,
        }
    }

    /// Intersection, `None` if the extents are disjoint. An unknown side
    /// yields the other side.
    pub fn intersection(&self, other: &Extent) -> Option<Extent> {
        match (&self.bbox, &other.bbox) {
            (Some(a), Some(b)) => {
                let bbox = a.intersection(b)?;
                if bbox == *a {
                    return Some(self.clone());
                }
                if bbox == *b {
                    return Some(other.clone());
                }
                Some(Extent::from_bbox(bbox))
            }
            (Some(_), None) => Some(self.clone()),
            (None, _) => Some(other.clone()),
        }
    }

    pub fn pseudo_area(&self) -> f64 {
        self.bbox.map(|b| b.pseudo_area()).unwrap_or(0.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pseudo_area_world() {
        let area = GeographicBoundingBox::world().pseudo_area();
        assert!((area - 4.0 * std::f64::consts::PI).abs() < 1e-12);
    }

    #[test]
    fn pseudo_area_antimeridian() {
        let crossing = pseudo_area_from_swne(0.0, 170.0, 10.0, -170.0);
        let plain = pseudo_area_from_swne(0.0, -10.0, 10.0, 10.0);
        assert!((crossing - plain).abs() < 1e-12);
    }

    #[test]
    fn intersects_cases() {
        struct TestCase {
            a: GeographicBoundingBox,
            b: GeographicBoundingBox,
            expected: bool,
        }

        let test_cases = [
            // Overlapping.
            TestCase {
                a: GeographicBoundingBox::new(0.0, 0.0, 10.0, 10.0),
                b: GeographicBoundingBox::new(5.0, 5.0, 15.0, 15.0),
                expected: true,
            },
            // Touching edges count.
            TestCase {
                a: GeographicBoundingBox::new(0.0, 0.0, 10.0, 10.0),
                b: GeographicBoundingBox::new(10.0, 10.0, 20.0, 20.0),
                expected: true,
            },
            // Disjoint latitudes.
            TestCase {
                a: GeographicBoundingBox::new(0.0, 0.0, 10.0, 10.0),
                b: GeographicBoundingBox::new(20.0, 0.0, 30.0, 10.0),
                expected: false,
            },
            // Crossing box against a box east of the dateline.
            TestCase {
                a: GeographicBoundingBox::new(-10.0, 170.0, 10.0, -170.0),
                b: GeographicBoundingBox::new(-5.0, -175.0, 5.0, -160.0),
                expected: true,
            },
            // Crossing box against a box at Greenwich.
            TestCase {
                a: GeographicBoundingBox::new(-10.0, 170.0, 10.0, -170.0),
                b: GeographicBoundingBox::new(-5.0, -5.0, 5.0, 5.0),
                expected: false,
            },
        ];

        for case in test_cases {
            assert_eq!(case.expected, case.a.intersects(&case.b), "{:?} {:?}", case.a, case.b);
            assert_eq!(case.expected, case.b.intersects(&case.a), "{:?} {:?}", case.b, case.a);
        }
    }

    #[test]
    fn intersection_across_dateline() {
        let a = GeographicBoundingBox::new(-10.0, 170.0, 10.0, -170.0);
        let b = GeographicBoundingBox::new(-20.0, 160.0, 5.0, -175.0);
        let got = a.intersection(&b).unwrap();
        assert_eq!(GeographicBoundingBox::new(-10.0, 170.0, 5.0, -175.0), got);
    }

    #[test]
    fn intersection_with_world_keeps_box() {
        let germany = Extent::from_bbox(GeographicBoundingBox::new(47.27, 5.87, 55.09, 15.04));
        let got = Extent::world().intersection(&germany).unwrap();
        assert_eq!(germany, got);
    }

    #[test]
    fn unknown_extent_intersects_everything() {
        let unknown = Extent::unknown();
        let somewhere = Extent::from_bbox(GeographicBoundingBox::new(0.0, 0.0, 1.0, 1.0));
        assert!(unknown.intersects(&somewhere));
        assert_eq!(Some(somewhere.clone()), unknown.intersection(&somewhere));
    }
}
