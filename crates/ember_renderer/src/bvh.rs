//! Bounding Volume Hierarchy (BVH) acceleration structure.
//!
//! The builder's tree is flattened into an array of 32-byte nodes, two per
//! cache line. Node 0 is the root and the children of an internal node always
//! sit in consecutive slots, so only the first child's index is stored.
//! Traversal uses a fixed-size stack on the call stack; the tree depth is
//! checked against its capacity at build time.

use bytemuck::{Pod, Zeroable};
use ember_math::{Aabb, Ray};

use crate::builder::{self, BuildNode};
use crate::error::BuildError;
use crate::geometry::Geometry;
use crate::hit::Hit;

/// Capacity of the traversal stack, and therefore the deepest supported tree.
pub const MAX_DEPTH: usize = 64;

#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
struct Node {
    aabb: Aabb,
    /// Geometry token, only meaningful for leaves
    token: u32,
    /// Index of the first child, zero for leaves (the root is never a child)
    children: u32,
}

const _: () = assert!(std::mem::size_of::<Node>() == 32);

impl Node {
    fn leaf(aabb: Aabb, token: u32) -> Self {
        Self {
            aabb,
            token,
            children: 0,
        }
    }

    fn branch(aabb: Aabb, children: u32) -> Self {
        Self {
            aabb,
            token: 0,
            children,
        }
    }

    #[inline]
    fn is_leaf(&self) -> bool {
        self.children == 0
    }
}

/// Receives leaves during traversal and owns the pruning distance.
trait Visitor {
    fn distance(&self) -> f32;
    fn leaf(&mut self, token: u32);
}

struct Nearest<'a, G> {
    geometry: &'a G,
    ray: &'a Ray,
    hit: &'a mut Hit,
}

impl<G: Geometry> Visitor for Nearest<'_, G> {
    #[inline]
    fn distance(&self) -> f32 {
        self.hit.distance
    }

    #[inline]
    fn leaf(&mut self, token: u32) {
        self.geometry.intersect(self.ray, self.hit, token);
    }
}

struct Cost<'a, G> {
    geometry: &'a G,
    ray: &'a Ray,
    distance: f32,
    cost: u32,
}

impl<G: Geometry> Visitor for Cost<'_, G> {
    #[inline]
    fn distance(&self) -> f32 {
        self.distance
    }

    #[inline]
    fn leaf(&mut self, token: u32) {
        self.cost += self
            .geometry
            .intersection_cost(self.ray, &mut self.distance, token);
    }
}

/// Flattened BVH over a geometry pack. Immutable once built.
pub struct Bvh<G> {
    geometry: G,
    nodes: Vec<Node>,
    max_depth: usize,
}

impl<G: Geometry> Bvh<G> {
    /// Build a hierarchy over `aabbs`, whose leaves resolve to `tokens` in `geometry`.
    pub fn new(geometry: G, aabbs: &[Aabb], tokens: &[u32]) -> Result<Self, BuildError> {
        if aabbs.len() != tokens.len() {
            return Err(BuildError::LengthMismatch {
                boxes: aabbs.len(),
                tokens: tokens.len(),
            });
        }

        let start = std::time::Instant::now();
        let hierarchy = builder::build(aabbs);

        let Some(root) = hierarchy.root else {
            return Ok(Self {
                geometry,
                nodes: Vec::new(),
                max_depth: 0,
            });
        };

        let mut nodes = vec![Node::zeroed(); hierarchy.node_count];
        let mut next = 1;
        let max_depth = flatten(&root, 0, &mut nodes, &mut next, tokens);

        if max_depth > MAX_DEPTH {
            return Err(BuildError::TooDeep {
                depth: max_depth,
                capacity: MAX_DEPTH,
            });
        }

        log::info!(
            "BVH built: {} primitives, {} nodes, depth {} in {:?}",
            aabbs.len(),
            nodes.len(),
            max_depth,
            start.elapsed()
        );

        Ok(Self {
            geometry,
            nodes,
            max_depth,
        })
    }

    pub fn geometry(&self) -> &G {
        &self.geometry
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn max_depth(&self) -> usize {
        self.max_depth
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Bounding box of the whole tree, empty for an empty tree.
    pub fn root_aabb(&self) -> Aabb {
        self.nodes.first().map_or(Aabb::EMPTY, |root| root.aabb)
    }

    /// Raw node memory, 32 bytes per node.
    pub fn as_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.nodes)
    }

    /// Narrow `hit` to the closest surface along `ray` nearer than `hit.distance`.
    ///
    /// Returns true if `hit` was updated.
    pub fn get_intersection(&self, ray: &Ray, hit: &mut Hit) -> bool {
        let before = hit.distance;

        match self.nodes.as_slice() {
            [] => {}
            [root] => {
                // Root is the only node/leaf
                self.geometry.intersect(ray, hit, root.token);
            }
            [root, ..] => {
                let distance = root.aabb.intersect(ray);
                if distance < hit.distance {
                    let mut visitor = Nearest {
                        geometry: &self.geometry,
                        ray,
                        hit: &mut *hit,
                    };
                    self.traverse(ray, distance, &mut visitor);
                }
            }
        }

        hit.distance < before
    }

    /// Number of box and primitive tests spent finding the nearest hit closer
    /// than `distance`, which is narrowed like a hit record would be.
    ///
    /// Follows exactly the same traversal order and pruning as
    /// [`Bvh::get_intersection`], plus the root box test.
    pub fn get_intersection_cost(&self, ray: &Ray, distance: &mut f32) -> u32 {
        let Some(root) = self.nodes.first() else {
            return 0;
        };

        let root_distance = root.aabb.intersect(ray);
        if root_distance >= *distance {
            return 1;
        }

        if root.is_leaf() {
            return 1 + self.geometry.intersection_cost(ray, distance, root.token);
        }

        let mut visitor = Cost {
            geometry: &self.geometry,
            ray,
            distance: *distance,
            cost: 0,
        };
        let tests = self.traverse(ray, root_distance, &mut visitor);

        *distance = visitor.distance;
        1 + tests + visitor.cost
    }

    /// Walk the internal nodes below the root, returning the number of box tests.
    ///
    /// Both children of a popped node are tested. Leaves are handed to the
    /// visitor immediately, nearer child first; internal children are pushed
    /// so that the nearer one is popped first.
    fn traverse<V: Visitor>(&self, ray: &Ray, root_distance: f32, visitor: &mut V) -> u32 {
        let mut stack = [(0u32, 0.0f32); MAX_DEPTH];
        let mut len = 1;
        stack[0] = (0, root_distance);

        let mut tests = 0;

        while len > 0 {
            len -= 1;
            let (index, entry) = stack[len];
            if entry >= visitor.distance() {
                continue;
            }

            let first = self.nodes[index as usize].children;
            let hit0 = self.nodes[first as usize].aabb.intersect(ray);
            let hit1 = self.nodes[first as usize + 1].aabb.intersect(ray);
            tests += 2;

            let (near, far) = if hit0 <= hit1 {
                ((first, hit0), (first + 1, hit1))
            } else {
                ((first + 1, hit1), (first, hit0))
            };

            for (child, distance) in [near, far] {
                let node = &self.nodes[child as usize];
                if node.is_leaf() && distance < visitor.distance() {
                    visitor.leaf(node.token);
                }
            }

            for (child, distance) in [far, near] {
                let node = &self.nodes[child as usize];
                if !node.is_leaf() && distance < visitor.distance() {
                    debug_assert!(len < MAX_DEPTH);
                    stack[len] = (child, distance);
                    len += 1;
                }
            }
        }

        tests
    }
}

/// Write `node` into `slot`, allocating child pairs from `next`. Returns the subtree depth.
fn flatten(
    node: &BuildNode,
    slot: usize,
    nodes: &mut [Node],
    next: &mut usize,
    tokens: &[u32],
) -> usize {
    match node {
        BuildNode::Leaf { aabb, index } => {
            nodes[slot] = Node::leaf(*aabb, tokens[*index]);
            1
        }
        BuildNode::Branch { aabb, children } => {
            let first = *next;
            *next += 2;

            let depth0 = flatten(&children[0], first, nodes, next, tokens);
            let depth1 = flatten(&children[1], first + 1, nodes, next, tokens);

            nodes[slot] = Node::branch(*aabb, first as u32);
            depth0.max(depth1) + 1
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::{GeometryPack, Shape};
    use crate::material::MaterialId;
    use crate::Sphere;
    use ember_math::Vec3;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn sphere_pack(count: usize, seed: u64) -> GeometryPack {
        let mut rng = StdRng::seed_from_u64(seed);
        let shapes = (0..count)
            .map(|_| {
                let center = Vec3::new(
                    rng.gen_range(-20.0..20.0),
                    rng.gen_range(-20.0..20.0),
                    rng.gen_range(-20.0..20.0),
                );
                Shape::Sphere(Sphere::new(center, rng.gen_range(0.2..1.5), MaterialId(0)))
            })
            .collect();
        GeometryPack::new(shapes)
    }

    fn build_bvh(pack: GeometryPack) -> Bvh<GeometryPack> {
        let (aabbs, tokens) = pack.build_inputs();
        Bvh::new(pack, &aabbs, &tokens).unwrap()
    }

    fn random_ray(rng: &mut StdRng) -> Ray {
        let origin = Vec3::new(
            rng.gen_range(-30.0..30.0),
            rng.gen_range(-30.0..30.0),
            rng.gen_range(-30.0..30.0),
        );
        // Aim roughly at the scene so most rays do real work
        let target = Vec3::new(
            rng.gen_range(-15.0..15.0),
            rng.gen_range(-15.0..15.0),
            rng.gen_range(-15.0..15.0),
        );
        Ray::new(origin, target - origin)
    }

    fn brute_force(pack: &GeometryPack, ray: &Ray) -> Hit {
        let mut hit = Hit::default();
        for token in 0..pack.len() as u32 {
            pack.intersect(ray, &mut hit, token);
        }
        hit
    }

    #[test]
    fn test_node_layout() {
        assert_eq!(std::mem::size_of::<Node>(), 32);
        let bvh = build_bvh(sphere_pack(10, 1));
        assert_eq!(bvh.as_bytes().len(), bvh.node_count() * 32);
    }

    #[test]
    fn test_length_mismatch() {
        let pack = sphere_pack(3, 1);
        let (aabbs, _) = pack.build_inputs();
        let result = Bvh::new(pack, &aabbs, &[0, 1]);
        assert_eq!(
            result.err(),
            Some(BuildError::LengthMismatch { boxes: 3, tokens: 2 })
        );
    }

    #[test]
    fn test_empty_tree_queries() {
        let bvh = build_bvh(GeometryPack::default());
        let ray = Ray::new(Vec3::ZERO, Vec3::Z);

        let mut hit = Hit::default();
        assert!(!bvh.get_intersection(&ray, &mut hit));
        assert!(!hit.found());

        let mut distance = f32::INFINITY;
        assert_eq!(bvh.get_intersection_cost(&ray, &mut distance), 0);
        assert!(bvh.root_aabb().is_empty());
    }

    #[test]
    fn test_single_primitive() {
        let pack = GeometryPack::new(vec![Shape::Sphere(Sphere::new(
            Vec3::new(0.0, 0.0, -5.0),
            1.0,
            MaterialId(0),
        ))]);
        let bvh = build_bvh(pack);
        assert_eq!(bvh.node_count(), 1);

        let ray = Ray::new(Vec3::ZERO, -Vec3::Z);
        let mut hit = Hit::default();
        assert!(bvh.get_intersection(&ray, &mut hit));
        assert_eq!(hit.token, Some(0));
        assert!((hit.distance - 4.0).abs() < 1e-4);

        // Missing the primitive's box costs exactly the root test
        let miss = Ray::new(Vec3::ZERO, Vec3::Y);
        let mut distance = f32::INFINITY;
        assert_eq!(bvh.get_intersection_cost(&miss, &mut distance), 1);
    }

    #[test]
    fn test_flat_bounding_invariant() {
        let bvh = build_bvh(sphere_pack(300, 3));
        assert_eq!(bvh.node_count(), 599);

        let mut leaves = 0;
        for node in &bvh.nodes {
            if node.is_leaf() {
                leaves += 1;
                continue;
            }
            let child0 = &bvh.nodes[node.children as usize];
            let child1 = &bvh.nodes[node.children as usize + 1];
            assert!(node.aabb.contains(&child0.aabb));
            assert!(node.aabb.contains(&child1.aabb));
            assert_eq!(node.aabb, child0.aabb.union(&child1.aabb));
        }
        assert_eq!(leaves, 300);
    }

    #[test]
    fn test_matches_brute_force() {
        let bvh = build_bvh(sphere_pack(500, 42));
        let mut rng = StdRng::seed_from_u64(99);

        let mut hits = 0;
        for _ in 0..2000 {
            let ray = random_ray(&mut rng);
            let expected = brute_force(bvh.geometry(), &ray);

            let mut hit = Hit::default();
            let found = bvh.get_intersection(&ray, &mut hit);

            assert_eq!(found, expected.found());
            if expected.found() {
                hits += 1;
                assert!(
                    (hit.distance - expected.distance).abs() < 1e-3,
                    "bvh {} vs brute force {}",
                    hit.distance,
                    expected.distance
                );
                if hit.token != expected.token {
                    // Only acceptable for coincident surfaces
                    assert!((hit.distance - expected.distance).abs() < 1e-5);
                }
            }
        }
        assert!(hits > 100, "too few rays hit the scene: {hits}");
    }

    #[test]
    fn test_never_reports_farther_than_bound() {
        let bvh = build_bvh(sphere_pack(200, 5));
        let mut rng = StdRng::seed_from_u64(6);

        for _ in 0..500 {
            let ray = random_ray(&mut rng);
            let mut hit = Hit::new(2.0);
            bvh.get_intersection(&ray, &mut hit);
            assert!(hit.distance <= 2.0);
            if let Some(token) = hit.token {
                let expected = brute_force(bvh.geometry(), &ray);
                assert!(expected.distance < 2.0);
                assert!(bvh.geometry().shape(token).is_some());
            }
        }
    }

    #[test]
    fn test_cost_bounds() {
        let bvh = build_bvh(sphere_pack(250, 8));
        let upper = 2 * bvh.node_count() as u32 + 1;
        let mut rng = StdRng::seed_from_u64(9);

        for _ in 0..1000 {
            let ray = random_ray(&mut rng);
            let mut distance = f32::INFINITY;
            let cost = bvh.get_intersection_cost(&ray, &mut distance);

            assert!(cost >= 1);
            assert!(cost <= upper, "cost {cost} exceeds {upper}");

            // The narrowed distance is the nearest hit
            let mut hit = Hit::default();
            bvh.get_intersection(&ray, &mut hit);
            assert_eq!(distance, hit.distance);
        }
    }

    #[test]
    fn test_cost_root_miss() {
        let bvh = build_bvh(sphere_pack(50, 2));
        let ray = Ray::new(Vec3::splat(100.0), Vec3::X);
        let mut distance = f32::INFINITY;
        assert_eq!(bvh.get_intersection_cost(&ray, &mut distance), 1);
        assert_eq!(distance, f32::INFINITY);
    }
}
