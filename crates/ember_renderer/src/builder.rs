//! Top-down hierarchy builder.
//!
//! Median split on the longest centroid axis: partition the primitives around
//! the middle centroid, recurse on both halves. Large halves are built on the
//! rayon pool since subtrees share no mutable state.

use ember_math::{Aabb, Vec3};

/// Ranges at least this large build their two halves in parallel.
const PARALLEL_THRESHOLD: usize = 1024;

/// Build-time node - either a branch with two children or a leaf with one primitive.
#[derive(Debug, Clone, PartialEq)]
pub enum BuildNode {
    /// Internal node whose box is the union of its children's boxes.
    Branch {
        aabb: Aabb,
        children: Box<[BuildNode; 2]>,
    },
    /// Leaf referencing one input index.
    Leaf { aabb: Aabb, index: usize },
}

impl BuildNode {
    pub fn aabb(&self) -> &Aabb {
        match self {
            BuildNode::Branch { aabb, .. } | BuildNode::Leaf { aabb, .. } => aabb,
        }
    }

    pub fn is_leaf(&self) -> bool {
        matches!(self, BuildNode::Leaf { .. })
    }
}

/// Output of [`build`]: an optional root and the total node count.
#[derive(Debug, Clone, PartialEq)]
pub struct Hierarchy {
    pub root: Option<BuildNode>,
    pub node_count: usize,
}

impl Hierarchy {
    /// Number of leaves, which always equals the number of inputs.
    pub fn leaf_count(&self) -> usize {
        (self.node_count + 1) / 2
    }
}

/// Build a binary hierarchy over `aabbs`. Zero inputs give an empty hierarchy.
pub fn build(aabbs: &[Aabb]) -> Hierarchy {
    if aabbs.is_empty() {
        return Hierarchy {
            root: None,
            node_count: 0,
        };
    }

    let centroids: Vec<Vec3> = aabbs.iter().map(Aabb::centroid).collect();
    let mut indices: Vec<usize> = (0..aabbs.len()).collect();
    let root = build_range(aabbs, &centroids, &mut indices);

    Hierarchy {
        root: Some(root),
        node_count: aabbs.len() * 2 - 1,
    }
}

fn build_range(aabbs: &[Aabb], centroids: &[Vec3], indices: &mut [usize]) -> BuildNode {
    if indices.len() == 1 {
        let index = indices[0];
        return BuildNode::Leaf {
            aabb: aabbs[index],
            index,
        };
    }

    // Choose split axis based on centroid spread
    let centroid_bounds = indices.iter().fold(Aabb::EMPTY, |mut acc, &i| {
        acc.encapsulate(centroids[i]);
        acc
    });
    let axis = centroid_bounds.longest_axis();

    let mid = indices.len() / 2;
    indices.select_nth_unstable_by(mid, |&a, &b| {
        centroids[a][axis].total_cmp(&centroids[b][axis])
    });

    let (left, right) = indices.split_at_mut(mid);
    let (left, right) = if left.len() + right.len() >= PARALLEL_THRESHOLD {
        rayon::join(
            || build_range(aabbs, centroids, left),
            || build_range(aabbs, centroids, right),
        )
    } else {
        (
            build_range(aabbs, centroids, left),
            build_range(aabbs, centroids, right),
        )
    };

    BuildNode::Branch {
        aabb: left.aabb().union(right.aabb()),
        children: Box::new([left, right]),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn random_boxes(count: usize, seed: u64) -> Vec<Aabb> {
        let mut rng = StdRng::seed_from_u64(seed);
        (0..count)
            .map(|_| {
                let center = Vec3::new(
                    rng.gen_range(-50.0..50.0),
                    rng.gen_range(-50.0..50.0),
                    rng.gen_range(-50.0..50.0),
                );
                let half = Vec3::splat(rng.gen_range(0.1..2.0));
                Aabb::new(center - half, center + half)
            })
            .collect()
    }

    /// Checks the bounding invariant and returns (leaf indices, depth).
    fn check_node(node: &BuildNode, leaves: &mut Vec<usize>) -> usize {
        match node {
            BuildNode::Leaf { index, .. } => {
                leaves.push(*index);
                1
            }
            BuildNode::Branch { aabb, children } => {
                let [left, right] = children.as_ref();
                assert_eq!(*aabb, left.aabb().union(right.aabb()));
                assert!(aabb.contains(left.aabb()));
                assert!(aabb.contains(right.aabb()));
                check_node(left, leaves).max(check_node(right, leaves)) + 1
            }
        }
    }

    #[test]
    fn test_build_empty() {
        let hierarchy = build(&[]);
        assert!(hierarchy.root.is_none());
        assert_eq!(hierarchy.node_count, 0);
    }

    #[test]
    fn test_build_single() {
        let boxes = random_boxes(1, 1);
        let hierarchy = build(&boxes);
        assert!(matches!(hierarchy.root, Some(BuildNode::Leaf { index: 0, .. })));
        assert_eq!(hierarchy.node_count, 1);
    }

    #[test]
    fn test_build_leaves_and_bounds() {
        let boxes = random_boxes(200, 7);
        let hierarchy = build(&boxes);

        let mut leaves = Vec::new();
        let depth = check_node(hierarchy.root.as_ref().unwrap(), &mut leaves);

        leaves.sort_unstable();
        assert_eq!(leaves, (0..200).collect::<Vec<_>>());
        assert_eq!(hierarchy.leaf_count(), 200);

        // Median splits keep the tree balanced
        assert!(depth <= 9, "depth {depth} too large for 200 leaves");
    }

    #[test]
    fn test_build_parallel_matches_invariants() {
        let boxes = random_boxes(PARALLEL_THRESHOLD * 3, 11);
        let hierarchy = build(&boxes);

        let mut leaves = Vec::new();
        check_node(hierarchy.root.as_ref().unwrap(), &mut leaves);
        assert_eq!(leaves.len(), boxes.len());
        assert_eq!(hierarchy.node_count, boxes.len() * 2 - 1);
    }

    #[test]
    fn test_build_identical_centroids() {
        let boxes = vec![Aabb::new(Vec3::ZERO, Vec3::ONE); 33];
        let hierarchy = build(&boxes);

        let mut leaves = Vec::new();
        let depth = check_node(hierarchy.root.as_ref().unwrap(), &mut leaves);
        assert_eq!(leaves.len(), 33);
        assert!(depth <= 7);
    }
}
