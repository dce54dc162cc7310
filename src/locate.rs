use crate::types::{Region, School};
use geo::{BoundingRect, Contains, Point};
use rstar::{RTree, RTreeObject, AABB};
use tracing::info;

// Region position plus its bounding box, for the R-tree
struct RegionEnvelope {
    index: usize,
    aabb: AABB<[f64; 2]>,
}

impl RTreeObject for RegionEnvelope {
    type Envelope = AABB<[f64; 2]>;
    fn envelope(&self) -> Self::Envelope {
        self.aabb
    }
}

/// Point-in-region lookup over a fixed set of regions.
pub struct RegionIndex<'a> {
    regions: &'a [Region],
    tree: RTree<RegionEnvelope>,
}

impl<'a> RegionIndex<'a> {
    pub fn new(regions: &'a [Region]) -> Self {
        let items: Vec<RegionEnvelope> = regions
            .iter()
            .enumerate()
            .filter_map(|(index, region)| {
                let rect = region.geometry.bounding_rect()?;
                Some(RegionEnvelope {
                    index,
                    aabb: AABB::from_corners(
                        [rect.min().x, rect.min().y],
                        [rect.max().x, rect.max().y],
                    ),
                })
            })
            .collect();

        Self {
            regions,
            tree: RTree::bulk_load(items),
        }
    }

    /// First region whose geometry contains `point`.
    pub fn locate(&self, point: &Point<f64>) -> Option<&'a Region> {
        let regions = self.regions;
        let envelope = AABB::from_point([point.x(), point.y()]);
        self.tree
            .locate_in_envelope_intersecting(&envelope)
            .map(|candidate| &regions[candidate.index])
            .find(|region| region.geometry.contains(point))
    }
}

/// Tags each school with the id of the region it sits in. With `clip` set,
/// schools outside every region are dropped.
pub fn assign_regions(schools: Vec<School>, regions: &[Region], clip: bool) -> Vec<School> {
    let index = RegionIndex::new(regions);
    let total = schools.len();

    let located: Vec<School> = schools
        .into_iter()
        .filter_map(|mut school| {
            school.region = index.locate(&school.location).map(|r| r.id.clone());
            if clip && school.region.is_none() {
                None
            } else {
                Some(school)
            }
        })
        .collect();

    info!(kept = located.len(), of = total, clip, "Assigned schools to regions");
    located
}
