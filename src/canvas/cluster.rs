//! Zoom-dependent marker clustering.
//!
//! Markers live in an R-tree over zoom-0 world pixels. Clustering runs per
//! integer zoom level: walking the markers in load order, each unassigned
//! marker collects every unassigned neighbour within `radius_px` at that
//! zoom. Groups of at least `min_points` become a cluster; above `max_zoom`
//! nothing is clustered. Results are kept until the marker set or the zoom
//! level changes.

use crate::config::ClusterConfig;
use crate::geo::{Coordinate, MapProjection};
use crate::map::MarkerEntity;
use rstar::primitives::GeomWithData;
use rstar::RTree;
use std::collections::HashMap;
use std::rc::Rc;
use xxhash_rust::xxh64::xxh64;

type IndexedPoint = GeomWithData<[f64; 2], usize>;

/// A group of markers drawn as one symbol.
#[derive(Debug, Clone, PartialEq)]
pub struct ClusterNode {
    pub id: u64,
    pub center: Coordinate,
    pub count: usize,
    members: Vec<usize>,
}

/// One drawable item at a given zoom.
#[derive(Debug, Clone, PartialEq)]
pub enum ClusterItem {
    /// Index into the loaded markers.
    Marker(usize),
    Cluster(ClusterNode),
}

struct Grouping {
    generation: u64,
    level: i32,
    items: Rc<Vec<ClusterItem>>,
    /// Members of each cluster in `items`, by id.
    members: HashMap<u64, Vec<usize>>,
}

/// Clustering index over the loaded marker set.
pub struct ClusterIndex {
    config: ClusterConfig,
    markers: Vec<MarkerEntity>,
    /// Zoom-0 world pixel of each marker.
    points: Vec<[f64; 2]>,
    tree: RTree<IndexedPoint>,
    generation: u64,
    grouping: Option<Grouping>,
}

impl ClusterIndex {
    pub fn new(config: ClusterConfig) -> Self {
        Self {
            config,
            markers: Vec::new(),
            points: Vec::new(),
            tree: RTree::new(),
            generation: 0,
            grouping: None,
        }
    }

    /// Replaces the indexed markers.
    pub fn load(&mut self, markers: &[MarkerEntity]) {
        self.markers = markers.to_vec();
        self.points = self
            .markers
            .iter()
            .map(|m| {
                let (x, y) = MapProjection::world_pixel(m.coordinate, 0.0);
                [x, y]
            })
            .collect();
        self.tree = RTree::bulk_load(
            self.points
                .iter()
                .enumerate()
                .map(|(i, p)| GeomWithData::new(*p, i))
                .collect(),
        );
        self.generation += 1;
        self.grouping = None;
    }

    pub fn markers(&self) -> &[MarkerEntity] {
        &self.markers
    }

    pub fn marker(&self, index: usize) -> Option<&MarkerEntity> {
        self.markers.get(index)
    }

    /// Groups the markers visible at `zoom`.
    ///
    /// Pending markers below their minimum zoom are left out entirely.
    pub fn clusters(&mut self, zoom: f64) -> Rc<Vec<ClusterItem>> {
        let level = zoom.floor() as i32;
        if let Some(grouping) = &self.grouping {
            if grouping.generation == self.generation && grouping.level == level {
                return Rc::clone(&grouping.items);
            }
        }

        let level_zoom = f64::from(level);
        let eligible: Vec<bool> = self
            .markers
            .iter()
            .map(|m| m.status.visible_at(level_zoom))
            .collect();
        let items = self.group(&eligible, level_zoom);
        let members = items
            .iter()
            .filter_map(|item| match item {
                ClusterItem::Cluster(node) => Some((node.id, node.members.clone())),
                ClusterItem::Marker(_) => None,
            })
            .collect();
        log::debug!(
            "Clustered {} markers into {} items at zoom {}",
            self.markers.len(),
            items.len(),
            level
        );

        let items = Rc::new(items);
        self.grouping = Some(Grouping {
            generation: self.generation,
            level,
            items: Rc::clone(&items),
            members,
        });
        items
    }

    /// Zoom at which the members of `cluster_id` no longer form one cluster.
    ///
    /// Only clusters produced by the last [`ClusterIndex::clusters`] call are
    /// known.
    pub fn expansion_zoom(&self, cluster_id: u64, current_zoom: f64) -> Option<f64> {
        let grouping = self
            .grouping
            .as_ref()
            .filter(|g| g.generation == self.generation)?;
        let members = grouping.members.get(&cluster_id)?;

        let mut eligible = vec![false; self.markers.len()];
        for &i in members {
            eligible[i] = true;
        }

        let mut zoom = current_zoom.floor() + 1.0;
        while zoom <= self.config.max_zoom {
            let split = !matches!(
                self.group(&eligible, zoom).as_slice(),
                [ClusterItem::Cluster(node)] if node.count == members.len()
            );
            if split {
                return Some(zoom);
            }
            zoom += 1.0;
        }
        Some(self.config.max_zoom + 1.0)
    }

    /// Groups the markers flagged in `eligible` at an integer `zoom`.
    fn group(&self, eligible: &[bool], zoom: f64) -> Vec<ClusterItem> {
        let seeds = (0..self.markers.len()).filter(|&i| eligible[i]);
        if zoom > self.config.max_zoom {
            return seeds.map(ClusterItem::Marker).collect();
        }

        // Radius in zoom-0 world pixels.
        let radius = f64::from(self.config.radius_px) / 2f64.powf(zoom);
        let radius_sq = radius * radius;
        let mut assigned = vec![false; self.markers.len()];
        let mut items = Vec::new();

        for a in seeds {
            if assigned[a] {
                continue;
            }
            assigned[a] = true;
            let mut group: Vec<usize> = self
                .tree
                .locate_within_distance(self.points[a], radius_sq)
                .map(|p| p.data)
                .filter(|&b| b != a && eligible[b] && !assigned[b])
                .collect();
            group.sort_unstable();

            if group.len() + 1 >= self.config.min_points.max(2) {
                for &b in &group {
                    assigned[b] = true;
                }
                group.insert(0, a);
                items.push(ClusterItem::Cluster(self.node(group)));
            } else {
                items.push(ClusterItem::Marker(a));
            }
        }
        items
    }

    fn node(&self, members: Vec<usize>) -> ClusterNode {
        let n = members.len() as f64;
        let (lon, lat) = members.iter().fold((0.0, 0.0), |(lon, lat), &i| {
            let c = self.markers[i].coordinate;
            (lon + c.lon, lat + c.lat)
        });

        let mut ids: Vec<&str> = members
            .iter()
            .map(|&i| self.markers[i].id.as_str())
            .collect();
        ids.sort_unstable();
        let id = xxh64(ids.join("\u{1f}").as_bytes(), 0);

        ClusterNode {
            id,
            center: Coordinate::new(lon / n, lat / n),
            count: members.len(),
            members,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::map::MarkerStatus;

    fn gem(id: &str, lon: f64, lat: f64, status: MarkerStatus) -> MarkerEntity {
        MarkerEntity::new(id, Coordinate::new(lon, lat), "food", status)
    }

    fn index(markers: &[MarkerEntity]) -> ClusterIndex {
        let mut index = ClusterIndex::new(ClusterConfig::default());
        index.load(markers);
        index
    }

    fn cluster_count(items: &[ClusterItem]) -> usize {
        items
            .iter()
            .filter(|i| matches!(i, ClusterItem::Cluster(_)))
            .count()
    }

    #[test]
    fn test_nearby_markers_cluster_at_low_zoom() {
        let markers = [
            gem("a", 123.8897, 10.2933, MarkerStatus::Verified),
            gem("b", 123.8868, 10.2925, MarkerStatus::Verified),
            gem("c", 123.8897, 10.2942, MarkerStatus::Verified),
            gem("far", 123.8765, 10.3425, MarkerStatus::Verified),
        ];
        let mut index = index(&markers);

        let items = index.clusters(12.0);
        assert_eq!(cluster_count(&items), 1);
        let node = items
            .iter()
            .find_map(|i| match i {
                ClusterItem::Cluster(n) => Some(n.clone()),
                _ => None,
            })
            .unwrap();
        assert_eq!(node.count, 3);
        assert!(items.contains(&ClusterItem::Marker(3)));

        // Past the clustering limit every marker stands alone.
        assert_eq!(index.clusters(15.0).len(), 4);
    }

    #[test]
    fn test_expansion_zoom_splits_cluster() {
        let markers = [
            gem("a", 123.8897, 10.2933, MarkerStatus::Verified),
            gem("b", 123.8868, 10.2925, MarkerStatus::Verified),
        ];
        let mut index = index(&markers);
        let items = index.clusters(11.0);
        let ClusterItem::Cluster(node) = &items[0] else {
            panic!("expected a cluster, got {:?}", items);
        };

        let zoom = index.expansion_zoom(node.id, 11.0).unwrap();
        assert!(zoom > 11.0 && zoom <= 15.0);

        let mut check = self::index(&markers);
        assert_eq!(cluster_count(&check.clusters(zoom)), 0);
        assert_eq!(index.expansion_zoom(42, 11.0), None);
    }

    #[test]
    fn test_cluster_id_is_stable_across_reloads() {
        let markers = [
            gem("a", 123.8897, 10.2933, MarkerStatus::Verified),
            gem("b", 123.8868, 10.2925, MarkerStatus::Verified),
        ];
        let reversed = [markers[1].clone(), markers[0].clone()];
        let a = index(&markers).clusters(11.0);
        let b = index(&reversed).clusters(11.0);
        match (&a[0], &b[0]) {
            (ClusterItem::Cluster(x), ClusterItem::Cluster(y)) => assert_eq!(x.id, y.id),
            other => panic!("expected clusters, got {:?}", other),
        }
    }

    #[test]
    fn test_grouping_is_reused_until_zoom_level_or_markers_change() {
        let markers = [
            gem("a", 123.8897, 10.2933, MarkerStatus::Verified),
            gem("b", 123.8868, 10.2925, MarkerStatus::Verified),
        ];
        let mut index = index(&markers);

        let first = index.clusters(11.2);
        assert!(Rc::ptr_eq(&first, &index.clusters(11.9)));
        assert!(!Rc::ptr_eq(&first, &index.clusters(12.0)));

        let second = index.clusters(12.0);
        index.load(&markers[..1]);
        let reloaded = index.clusters(12.0);
        assert!(!Rc::ptr_eq(&second, &reloaded));
        assert_eq!(*reloaded, vec![ClusterItem::Marker(0)]);
    }

    #[test]
    fn test_expansion_zoom_unknown_after_reload() {
        let markers = [
            gem("a", 123.8897, 10.2933, MarkerStatus::Verified),
            gem("b", 123.8868, 10.2925, MarkerStatus::Verified),
        ];
        let mut index = index(&markers);
        let items = index.clusters(11.0);
        let ClusterItem::Cluster(node) = &items[0] else {
            panic!("expected a cluster, got {:?}", items);
        };
        index.load(&markers);
        assert_eq!(index.expansion_zoom(node.id, 11.0), None);
    }

    #[test]
    fn test_pending_markers_hidden_below_street_zoom() {
        let markers = [
            gem("pending", 123.8923, 10.3087, MarkerStatus::Pending),
            gem("stale", 123.8956, 10.2978, MarkerStatus::Stale),
        ];
        let mut index = index(&markers);
        assert_eq!(*index.clusters(11.0), vec![ClusterItem::Marker(1)]);
        assert_eq!(index.clusters(16.0).len(), 2);
    }
}
