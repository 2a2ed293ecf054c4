/// OctreeSceneIndex: static loose-placement octree for frustum culling.
///
/// Each proxy is stored in exactly one node: the deepest node whose AABB
/// fully contains the proxy's AABB. A proxy straddling a child boundary
/// stays in the parent. Proxies outside the world bounds go to an overflow
/// list that every query tests individually.
///
/// All 8^d nodes are pre-allocated at construction in depth-first order,
/// so moving a proxy only touches its old and new node.

use glam::Vec3;
use slotmap::SlotMap;
use super::{AABB, Cullable, CullHandle, Frustum, FrustumTest, SceneIndex};

/// Index of the root node in the flat node array
const ROOT: usize = 0;

/// Deepest supported tree (8^8 leaves is already ~19M nodes)
pub const MAX_OCTREE_DEPTH: u32 = 8;

/// Where a proxy currently lives
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Location {
    Node(usize),
    Overflow,
}

struct ProxyEntry {
    proxy: Cullable,
    aabb: AABB,
    location: Location,
}

struct OctreeNode {
    /// World-space bounds of this node
    aabb: AABB,
    /// Index of the first child in the flat array (0 = leaf)
    first_child: usize,
    /// Proxies that fit this node but none of its children
    proxies: Vec<CullHandle>,
}

/// Static octree spatial index
pub struct OctreeSceneIndex {
    nodes: Vec<OctreeNode>,
    max_depth: u32,
    entries: SlotMap<CullHandle, ProxyEntry>,
    overflow: Vec<CullHandle>,
    /// subtree_sizes[d] = node count of a subtree with d remaining levels
    subtree_sizes: Vec<usize>,
}

impl OctreeSceneIndex {
    /// Create an octree over `world_aabb` with `max_depth` levels below the root.
    ///
    /// Depth is clamped to `MAX_OCTREE_DEPTH`. Total nodes = (8^(d+1) - 1) / 7.
    pub fn new(world_aabb: AABB, max_depth: u32) -> Self {
        let max_depth = max_depth.min(MAX_OCTREE_DEPTH);
        let total_nodes = Self::total_node_count(max_depth);
        let mut nodes = Vec::with_capacity(total_nodes);

        Self::build_recursive(&mut nodes, &world_aabb, 0, max_depth);
        debug_assert_eq!(nodes.len(), total_nodes);

        let subtree_sizes: Vec<usize> = (0..=max_depth).map(Self::total_node_count).collect();

        Self {
            nodes,
            max_depth,
            entries: SlotMap::with_key(),
            overflow: Vec::new(),
            subtree_sizes,
        }
    }

    /// World bounds covered by the tree
    pub fn bounds(&self) -> AABB {
        self.nodes[ROOT].aabb
    }

    pub fn max_depth(&self) -> u32 {
        self.max_depth
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Number of proxies outside the world bounds
    pub fn overflow_len(&self) -> usize {
        self.overflow.len()
    }

    fn total_node_count(max_depth: u32) -> usize {
        let mut count = 0usize;
        let mut level_count = 1usize;
        for _ in 0..=max_depth {
            count += level_count;
            level_count *= 8;
        }
        count
    }

    fn build_recursive(nodes: &mut Vec<OctreeNode>, aabb: &AABB, depth: u32, max_depth: u32) {
        let node_index = nodes.len();
        nodes.push(OctreeNode {
            aabb: *aabb,
            first_child: 0,
            proxies: Vec::new(),
        });

        if depth >= max_depth {
            return;
        }

        let center = aabb.center();
        nodes[node_index].first_child = nodes.len();
        for octant in 0..8u8 {
            let child_aabb = Self::octant_aabb(aabb, &center, octant);
            Self::build_recursive(nodes, &child_aabb, depth + 1, max_depth);
        }
    }

    /// Bounds of one octant. Bit layout: bit0 = X, bit1 = Y, bit2 = Z (1 = high half).
    fn octant_aabb(parent: &AABB, center: &Vec3, octant: u8) -> AABB {
        AABB {
            min: Vec3::new(
                if octant & 1 == 0 { parent.min.x } else { center.x },
                if octant & 2 == 0 { parent.min.y } else { center.y },
                if octant & 4 == 0 { parent.min.z } else { center.z },
            ),
            max: Vec3::new(
                if octant & 1 == 0 { center.x } else { parent.max.x },
                if octant & 2 == 0 { center.y } else { parent.max.y },
                if octant & 4 == 0 { center.z } else { parent.max.z },
            ),
        }
    }

    fn point_octant(center: &Vec3, point: &Vec3) -> u8 {
        ((point.x >= center.x) as u8)
            | (((point.y >= center.y) as u8) << 1)
            | (((point.z >= center.z) as u8) << 2)
    }

    fn subtree_offset(&self, octant: u8, remaining_depth: u32) -> usize {
        octant as usize * self.subtree_sizes[remaining_depth as usize]
    }

    /// Where an AABB belongs: the deepest containing node, or the overflow list
    fn target_location(&self, world_aabb: &AABB) -> Location {
        if !self.nodes[ROOT].aabb.contains(world_aabb) {
            return Location::Overflow;
        }

        let mut node_idx = ROOT;
        let mut depth = 0;
        loop {
            let first_child = self.nodes[node_idx].first_child;
            if depth >= self.max_depth || first_child == 0 {
                return Location::Node(node_idx);
            }

            // Both corners in the same octant means the box fits that child
            let center = self.nodes[node_idx].aabb.center();
            let min_oct = Self::point_octant(&center, &world_aabb.min);
            let max_oct = Self::point_octant(&center, &world_aabb.max);
            if min_oct != max_oct {
                return Location::Node(node_idx);
            }

            node_idx = first_child + self.subtree_offset(min_oct, self.max_depth - depth - 1);
            depth += 1;
        }
    }

    fn attach(&mut self, handle: CullHandle, location: Location) {
        match location {
            Location::Node(idx) => self.nodes[idx].proxies.push(handle),
            Location::Overflow => self.overflow.push(handle),
        }
    }

    fn detach(&mut self, handle: CullHandle, location: Location) {
        let list = match location {
            Location::Node(idx) => &mut self.nodes[idx].proxies,
            Location::Overflow => &mut self.overflow,
        };
        if let Some(pos) = list.iter().position(|&h| h == handle) {
            list.swap_remove(pos);
        } else {
            debug_assert!(false, "proxy missing from its recorded location");
        }
    }

    fn test_and_push(&self, handles: &[CullHandle], frustum: &Frustum, results: &mut Vec<Cullable>) {
        for handle in handles {
            if let Some(entry) = self.entries.get(*handle) {
                if frustum.intersects_aabb(&entry.aabb) {
                    results.push(entry.proxy);
                }
            }
        }
    }

    /// 3-way classification per node: Outside prunes, Inside collects the
    /// whole subtree, Partial tests this node's proxies and recurses.
    fn query_recursive(
        &self,
        node_idx: usize,
        frustum: &Frustum,
        classification: FrustumTest,
        results: &mut Vec<Cullable>,
        depth: u32,
    ) {
        let node = &self.nodes[node_idx];

        match classification {
            FrustumTest::Outside => {}
            FrustumTest::Inside => self.collect_all(node_idx, results, depth),
            FrustumTest::Partial => {
                self.test_and_push(&node.proxies, frustum, results);

                if depth < self.max_depth && node.first_child != 0 {
                    for octant in 0..8u8 {
                        let child_idx = node.first_child
                            + self.subtree_offset(octant, self.max_depth - depth - 1);
                        let child_class = frustum.classify_aabb(&self.nodes[child_idx].aabb);
                        self.query_recursive(child_idx, frustum, child_class, results, depth + 1);
                    }
                }
            }
        }
    }

    fn collect_all(&self, node_idx: usize, results: &mut Vec<Cullable>, depth: u32) {
        let node = &self.nodes[node_idx];
        results.extend(
            node.proxies
                .iter()
                .filter_map(|h| self.entries.get(*h).map(|e| e.proxy)),
        );

        if depth < self.max_depth && node.first_child != 0 {
            for octant in 0..8u8 {
                let child_idx = node.first_child
                    + self.subtree_offset(octant, self.max_depth - depth - 1);
                self.collect_all(child_idx, results, depth + 1);
            }
        }
    }
}

// ===== SCENE INDEX TRAIT =====

impl SceneIndex for OctreeSceneIndex {
    fn insert(&mut self, proxy: Cullable, world_aabb: &AABB) -> CullHandle {
        let location = self.target_location(world_aabb);
        let handle = self.entries.insert(ProxyEntry {
            proxy,
            aabb: *world_aabb,
            location,
        });
        self.attach(handle, location);
        handle
    }

    fn move_proxy(&mut self, handle: CullHandle, world_aabb: &AABB) {
        let target = self.target_location(world_aabb);
        let old = match self.entries.get_mut(handle) {
            Some(entry) => {
                entry.aabb = *world_aabb;
                if entry.location == target {
                    return;
                }
                let old = entry.location;
                entry.location = target;
                old
            }
            None => return,
        };
        self.detach(handle, old);
        self.attach(handle, target);
    }

    fn remove(&mut self, handle: CullHandle) -> Option<Cullable> {
        let entry = self.entries.remove(handle)?;
        self.detach(handle, entry.location);
        Some(entry.proxy)
    }

    fn query(&self, frustum: &Frustum, results: &mut Vec<Cullable>) {
        if self.entries.is_empty() {
            return;
        }

        let root_class = frustum.classify_aabb(&self.nodes[ROOT].aabb);
        self.query_recursive(ROOT, frustum, root_class, results, 0);
        self.test_and_push(&self.overflow, frustum, results);
    }

    fn aabb(&self, handle: CullHandle) -> Option<AABB> {
        self.entries.get(handle).map(|e| e.aabb)
    }

    fn proxy(&self, handle: CullHandle) -> Option<Cullable> {
        self.entries.get(handle).map(|e| e.proxy)
    }

    fn len(&self) -> usize {
        self.entries.len()
    }

    fn clear(&mut self) {
        for node in &mut self.nodes {
            node.proxies.clear();
        }
        self.overflow.clear();
        self.entries.clear();
    }
}

#[cfg(test)]
#[path = "octree_scene_index_tests.rs"]
mod tests;
