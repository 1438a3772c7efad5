use std::path::{Component, Path, PathBuf};

use chrono::{DateTime, TimeZone, Utc};

/// Axis-aligned rectangle, `[min_x, min_y, max_x, max_y]`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    pub min_x: f64,
    pub min_y: f64,
    pub max_x: f64,
    pub max_y: f64,
}

impl BoundingBox {
    pub fn new(min_x: f64, min_y: f64, max_x: f64, max_y: f64) -> Self {
        Self {
            min_x,
            min_y,
            max_x,
            max_y,
        }
    }

    /// Corners of a north-up raster from its geotransform
    /// `[origin_x, pixel_width, rot_x, origin_y, rot_y, pixel_height]`.
    pub fn from_geo_transform(gt: &[f64; 6], width: usize, height: usize) -> Self {
        let left = gt[0];
        let top = gt[3];
        let right = left + width as f64 * gt[1];
        let bottom = top + height as f64 * gt[5];

        Self::new(
            left.min(right),
            bottom.min(top),
            left.max(right),
            bottom.max(top),
        )
    }

    pub fn union(&self, other: &BoundingBox) -> BoundingBox {
        BoundingBox::new(
            self.min_x.min(other.min_x),
            self.min_y.min(other.min_y),
            self.max_x.max(other.max_x),
            self.max_y.max(other.max_y),
        )
    }

    pub fn width(&self) -> f64 {
        self.max_x - self.min_x
    }

    pub fn height(&self) -> f64 {
        self.max_y - self.min_y
    }

    pub fn to_array(&self) -> [f64; 4] {
        [self.min_x, self.min_y, self.max_x, self.max_y]
    }
}

impl From<[f64; 4]> for BoundingBox {
    fn from(b: [f64; 4]) -> Self {
        BoundingBox::new(b[0], b[1], b[2], b[3])
    }
}

/// Geographic coverage of a raster: its bbox plus the outline ring
/// `[southwest, northwest, northeast, southeast]`.
#[derive(Debug, Clone, PartialEq)]
pub struct Footprint {
    pub bbox: BoundingBox,
    pub ring: [[f64; 2]; 4],
}

impl Footprint {
    pub fn from_bounds(bbox: BoundingBox) -> Self {
        let BoundingBox {
            min_x,
            min_y,
            max_x,
            max_y,
        } = bbox;

        Self {
            bbox,
            ring: [
                [min_x, min_y],
                [min_x, max_y],
                [max_x, max_y],
                [max_x, min_y],
            ],
        }
    }

    /// The ring with its first corner repeated, as GeoJSON expects.
    pub fn closed_ring(&self) -> Vec<[f64; 2]> {
        let mut ring = self.ring.to_vec();
        ring.push(self.ring[0]);
        ring
    }
}

/// Year and optional SSP scenario an item is keyed on.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ItemKey {
    pub year: i32,
    pub scenario: Option<String>,
}

impl ItemKey {
    pub fn new(year: i32, scenario: Option<String>) -> Self {
        Self { year, scenario }
    }

    /// Derives the key from a raster path relative to the catalog input root.
    ///
    /// `{year}/{scenario}/{file}` and `{year}/{file}` are recognised; any other
    /// depth, or a year segment that is not a plain digit string, yields `None`.
    pub fn from_relative_path(relative: &Path) -> Option<Self> {
        let segments: Vec<&str> = relative
            .components()
            .filter_map(|c| match c {
                Component::Normal(s) => s.to_str(),
                _ => None,
            })
            .collect();

        match segments.as_slice() {
            [year, scenario, _file] => Some(Self::new(
                parse_year(year)?,
                Some((*scenario).to_string()),
            )),
            [year, _file] => Some(Self::new(parse_year(year)?, None)),
            _ => None,
        }
    }

    pub fn id(&self) -> String {
        match &self.scenario {
            Some(scenario) => format!("{}-{}", self.year, scenario),
            None => self.year.to_string(),
        }
    }

    /// January 1st of the year, midnight UTC.
    pub fn datetime(&self) -> Option<DateTime<Utc>> {
        Utc.with_ymd_and_hms(self.year, 1, 1, 0, 0, 0).single()
    }

    /// `{year}` or `{year}/{scenario}`.
    pub fn segments(&self) -> Vec<String> {
        let mut segments = vec![self.year.to_string()];
        segments.extend(self.scenario.clone());
        segments
    }

    pub fn relative_dir(&self) -> PathBuf {
        self.segments().iter().collect()
    }
}

/// Accepts only digit strings that format back to themselves.
fn parse_year(segment: &str) -> Option<i32> {
    if segment.is_empty() || !segment.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let year: i32 = segment.parse().ok()?;
    (year.to_string() == segment).then_some(year)
}

/// Running spatial and temporal bounds over a set of items.
///
/// Folding is commutative, so the result does not depend on item order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExtentAccumulator {
    bbox: Option<BoundingBox>,
    interval: Option<[DateTime<Utc>; 2]>,
}

impl ExtentAccumulator {
    pub fn add(self, bbox: &BoundingBox, datetime: DateTime<Utc>) -> Self {
        let bbox = match self.bbox {
            Some(current) => current.union(bbox),
            None => *bbox,
        };
        let interval = match self.interval {
            Some([start, end]) => [start.min(datetime), end.max(datetime)],
            None => [datetime, datetime],
        };

        Self {
            bbox: Some(bbox),
            interval: Some(interval),
        }
    }

    /// `None` when nothing was added.
    pub fn finish(self) -> Option<(BoundingBox, [DateTime<Utc>; 2])> {
        Some((self.bbox?, self.interval?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_footprint_ring_order() {
        let fp = Footprint::from_bounds(BoundingBox::new(-10.0, -5.0, 20.0, 15.0));

        assert_eq!(
            fp.ring,
            [[-10.0, -5.0], [-10.0, 15.0], [20.0, 15.0], [20.0, -5.0]]
        );
        assert_eq!(fp.closed_ring().len(), 5);
        assert_eq!(fp.closed_ring()[4], [-10.0, -5.0]);
    }

    #[test]
    fn test_bounds_from_north_up_geo_transform() {
        let gt = [100.0, 0.5, 0.0, 40.0, 0.0, -0.25];
        let bbox = BoundingBox::from_geo_transform(&gt, 20, 8);

        assert_eq!(bbox, BoundingBox::new(100.0, 38.0, 110.0, 40.0));
    }

    #[test]
    fn test_item_key_from_path_depth() {
        let with_scenario = ItemKey::from_relative_path(Path::new("2005/ssp2/gdp.tif")).unwrap();
        let without = ItemKey::from_relative_path(Path::new("2005/gdp.tif")).unwrap();

        assert_eq!(with_scenario.id(), "2005-ssp2");
        assert_eq!(without.id(), "2005");
        assert_ne!(with_scenario.id(), without.id());

        assert_eq!(ItemKey::from_relative_path(Path::new("a/b/c/d.tif")), None);
        assert_eq!(ItemKey::from_relative_path(Path::new("gdp.tif")), None);
        assert_eq!(ItemKey::from_relative_path(Path::new("latest/gdp.tif")), None);
    }

    #[test]
    fn test_year_segment_must_be_canonical() {
        for segment in ["02000", "+2000", "-5", "2000.0", " 2000", "99999999999"] {
            let path = Path::new(segment).join("gdp.tif");
            assert_eq!(ItemKey::from_relative_path(&path), None, "{}", segment);
        }

        let key = ItemKey::from_relative_path(Path::new("2000/ssp1/gdp.tif")).unwrap();
        assert_eq!(key.id(), "2000-ssp1");
        assert_eq!(key.relative_dir(), Path::new("2000").join("ssp1"));
    }

    #[test]
    fn test_item_key_datetime_and_dir() {
        let key = ItemKey::new(2030, Some("SSP5".to_string()));

        assert_eq!(
            key.datetime().unwrap().to_rfc3339(),
            "2030-01-01T00:00:00+00:00"
        );
        assert_eq!(key.relative_dir(), PathBuf::from("2030").join("SSP5"));
    }

    #[test]
    fn test_extent_fold_is_order_independent() {
        let samples = [
            (BoundingBox::new(-10.0, -5.0, 0.0, 5.0), ItemKey::new(2010, None)),
            (BoundingBox::new(0.0, 0.0, 30.0, 50.0), ItemKey::new(2000, None)),
            (BoundingBox::new(-50.0, -60.0, -40.0, -55.0), ItemKey::new(2005, None)),
        ];

        let forward = samples
            .iter()
            .fold(ExtentAccumulator::default(), |acc, (b, k)| {
                acc.add(b, k.datetime().unwrap())
            });
        let backward = samples
            .iter()
            .rev()
            .fold(ExtentAccumulator::default(), |acc, (b, k)| {
                acc.add(b, k.datetime().unwrap())
            });

        assert_eq!(forward, backward);

        let (bbox, [start, end]) = forward.finish().unwrap();
        assert_eq!(bbox, BoundingBox::new(-50.0, -60.0, 30.0, 50.0));
        assert_eq!(start, ItemKey::new(2000, None).datetime().unwrap());
        assert_eq!(end, ItemKey::new(2010, None).datetime().unwrap());
    }

    #[test]
    fn test_empty_extent_has_no_result() {
        assert_eq!(ExtentAccumulator::default().finish(), None);
    }
}
