//! A single CART tree grown on a bootstrap subsample.
//!
//! Classification trees minimize Gini impurity and keep per-leaf class frequencies; regression
//! trees minimize the sum of squared deviations and keep the raw leaf targets so that a leaf can
//! be sampled from as well as averaged.

use ndarray::ArrayView2;
use rand::rngs::SmallRng;
use rand::seq::index;

/// What a tree is asked to predict.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum TargetKind {
    /// Level codes `0..num_levels`.
    Classes(usize),
    Values,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Leaf {
    /// Normalized class frequencies.
    Classes(Vec<f64>),
    /// Targets of the training rows that ended in this leaf.
    Values(Vec<f64>),
}

impl Leaf {
    pub(crate) fn mean(&self) -> f64 {
        match self {
            Leaf::Values(values) => values.iter().sum::<f64>() / values.len() as f64,
            Leaf::Classes(freqs) => freqs.iter().enumerate().map(|(c, p)| c as f64 * p).sum(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Node {
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },
    Leaf(Leaf),
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Tree {
    nodes: Vec<Node>,
}

impl Tree {
    /// Leaf reached by `x`; values `<= threshold` go left.
    pub(crate) fn leaf(&self, x: &[f64]) -> &Leaf {
        let mut idx = 0;
        loop {
            match &self.nodes[idx] {
                Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => idx = if x[*feature] <= *threshold { *left } else { *right },
                Node::Leaf(leaf) => return leaf,
            }
        }
    }

    #[cfg(test)]
    pub(crate) fn depth(&self) -> usize {
        fn walk(nodes: &[Node], idx: usize) -> usize {
            match &nodes[idx] {
                Node::Split { left, right, .. } => 1 + walk(nodes, *left).max(walk(nodes, *right)),
                Node::Leaf(_) => 0,
            }
        }
        walk(&self.nodes, 0)
    }
}

/// Growth parameters of one tree.
#[derive(Debug, Clone, Copy)]
pub(crate) struct GrowParams {
    pub features_per_split: usize,
    pub min_leaf_size: usize,
    pub max_depth: usize,
}

pub(crate) struct TreeBuilder<'a> {
    features: ArrayView2<'a, f64>,
    target: &'a [f64],
    kind: TargetKind,
    params: GrowParams,
    rng: SmallRng,
    nodes: Vec<Node>,
}

struct Split {
    feature: usize,
    threshold: f64,
    cost: f64,
}

impl<'a> TreeBuilder<'a> {
    /// `target` is already encoded: class codes as `f64` for [`TargetKind::Classes`].
    pub(crate) fn new(
        features: ArrayView2<'a, f64>,
        target: &'a [f64],
        kind: TargetKind,
        params: GrowParams,
        rng: SmallRng,
    ) -> Self {
        Self {
            features,
            target,
            kind,
            params,
            rng,
            nodes: Vec::new(),
        }
    }

    /// Grows a tree on `rows` (indices into the feature matrix, repeats allowed).
    pub(crate) fn grow(mut self, mut rows: Vec<usize>) -> Tree {
        self.grow_node(&mut rows, 0);
        Tree { nodes: self.nodes }
    }

    fn grow_node(&mut self, rows: &mut [usize], depth: usize) -> usize {
        let idx = self.nodes.len();
        let n_features = self.features.ncols();
        let splittable = n_features > 0
            && depth < self.params.max_depth
            && rows.len() >= 2 * self.params.min_leaf_size
            && self.cost(rows) > 0.0;

        let split = if splittable {
            self.best_split(rows)
        } else {
            None
        };
        let Some(split) = split else {
            let leaf = self.make_leaf(rows);
            self.nodes.push(Node::Leaf(leaf));
            return idx;
        };

        // Placeholder, patched once both children exist.
        self.nodes.push(Node::Leaf(Leaf::Values(Vec::new())));
        let feature = split.feature;
        let threshold = split.threshold;
        let n_left = partition(rows, |&r| self.features[[r, feature]] <= threshold);
        let (left_rows, right_rows) = rows.split_at_mut(n_left);
        let left = self.grow_node(left_rows, depth + 1);
        let right = self.grow_node(right_rows, depth + 1);
        self.nodes[idx] = Node::Split {
            feature,
            threshold,
            left,
            right,
        };
        idx
    }

    fn best_split(&mut self, rows: &[usize]) -> Option<Split> {
        let n_features = self.features.ncols();
        let m = self.params.features_per_split.clamp(1, n_features);
        let candidates = index::sample(&mut self.rng, n_features, m).into_vec();
        let parent_cost = self.cost(rows);

        let mut best: Option<Split> = None;
        let mut sorted = rows.to_vec();
        for feature in candidates {
            sorted.sort_unstable_by(|&a, &b| {
                self.features[[a, feature]].total_cmp(&self.features[[b, feature]])
            });
            if let Some(split) = self.scan_feature(feature, &sorted) {
                if best.as_ref().map_or(true, |b| split.cost < b.cost) {
                    best = Some(split);
                }
            }
        }
        best.filter(|b| b.cost < parent_cost - 1e-12)
    }

    /// Scans every threshold between distinct consecutive values of `feature`.
    fn scan_feature(&self, feature: usize, sorted: &[usize]) -> Option<Split> {
        let n = sorted.len();
        let min_leaf = self.params.min_leaf_size;
        let x = |i: usize| self.features[[sorted[i], feature]];
        let mut best: Option<Split> = None;
        let mut consider = |i: usize, cost: f64| {
            // Split between positions i - 1 and i.
            if i < min_leaf || n - i < min_leaf || x(i - 1) >= x(i) {
                return;
            }
            if best.as_ref().map_or(true, |b| cost < b.cost) {
                best = Some(Split {
                    feature,
                    threshold: 0.5 * (x(i - 1) + x(i)),
                    cost,
                });
            }
        };

        match self.kind {
            TargetKind::Classes(k) => {
                let mut left = vec![0.0; k];
                let mut right = class_counts(self.target, sorted, k);
                for i in 1..n {
                    let c = self.target[sorted[i - 1]] as usize;
                    left[c] += 1.0;
                    right[c] -= 1.0;
                    let cost = gini_mass(&left, i as f64) + gini_mass(&right, (n - i) as f64);
                    consider(i, cost);
                }
            }
            TargetKind::Values => {
                let (mut sum_r, mut sq_r) = sums(self.target, sorted);
                let (mut sum_l, mut sq_l) = (0.0, 0.0);
                for i in 1..n {
                    let y = self.target[sorted[i - 1]];
                    sum_l += y;
                    sq_l += y * y;
                    sum_r -= y;
                    sq_r -= y * y;
                    let cost = sse(sum_l, sq_l, i as f64) + sse(sum_r, sq_r, (n - i) as f64);
                    consider(i, cost);
                }
            }
        }
        best
    }

    /// Impurity mass of a node: `n * gini` or the sum of squared deviations.
    fn cost(&self, rows: &[usize]) -> f64 {
        let n = rows.len() as f64;
        match self.kind {
            TargetKind::Classes(k) => gini_mass(&class_counts(self.target, rows, k), n),
            TargetKind::Values => {
                let (sum, sq) = sums(self.target, rows);
                sse(sum, sq, n)
            }
        }
    }

    fn make_leaf(&self, rows: &[usize]) -> Leaf {
        match self.kind {
            TargetKind::Classes(k) => {
                let n = rows.len() as f64;
                Leaf::Classes(
                    class_counts(self.target, rows, k)
                        .into_iter()
                        .map(|c| c / n)
                        .collect(),
                )
            }
            TargetKind::Values => Leaf::Values(rows.iter().map(|&r| self.target[r]).collect()),
        }
    }
}

fn class_counts(target: &[f64], rows: &[usize], k: usize) -> Vec<f64> {
    let mut counts = vec![0.0; k];
    for &r in rows {
        counts[target[r] as usize] += 1.0;
    }
    counts
}

fn gini_mass(counts: &[f64], n: f64) -> f64 {
    if n <= 0.0 {
        return 0.0;
    }
    n - counts.iter().map(|c| c * c).sum::<f64>() / n
}

fn sums(target: &[f64], rows: &[usize]) -> (f64, f64) {
    rows.iter()
        .map(|&r| target[r])
        .fold((0.0, 0.0), |(s, q), y| (s + y, q + y * y))
}

fn sse(sum: f64, sq: f64, n: f64) -> f64 {
    if n <= 0.0 {
        return 0.0;
    }
    (sq - sum * sum / n).max(0.0)
}

/// Moves elements satisfying `pred` to the front; returns how many there are.
fn partition<T, F: FnMut(&T) -> bool>(items: &mut [T], mut pred: F) -> usize {
    let mut next = 0;
    for i in 0..items.len() {
        if pred(&items[i]) {
            items.swap(i, next);
            next += 1;
        }
    }
    next
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;
    use rand::SeedableRng;

    fn params() -> GrowParams {
        GrowParams {
            features_per_split: 1,
            min_leaf_size: 1,
            max_depth: 16,
        }
    }

    #[test]
    fn test_classification_tree_separates_classes() {
        let features = array![[0.0], [0.1], [0.2], [1.0], [1.1], [1.2]];
        let target = [0.0, 0.0, 0.0, 1.0, 1.0, 1.0];
        let tree = TreeBuilder::new(
            features.view(),
            &target,
            TargetKind::Classes(2),
            params(),
            SmallRng::seed_from_u64(42),
        )
        .grow((0..6).collect());

        assert_eq!(tree.depth(), 1);
        assert_eq!(tree.leaf(&[0.05]), &Leaf::Classes(vec![1.0, 0.0]));
        assert_eq!(tree.leaf(&[5.0]), &Leaf::Classes(vec![0.0, 1.0]));
    }

    #[test]
    fn test_regression_tree_leaf_values() {
        let features = array![[1.0], [2.0], [3.0], [10.0], [11.0], [12.0]];
        let target = [1.0, 1.0, 1.0, 5.0, 5.0, 5.0];
        let tree = TreeBuilder::new(
            features.view(),
            &target,
            TargetKind::Values,
            params(),
            SmallRng::seed_from_u64(0),
        )
        .grow((0..6).collect());

        assert_eq!(tree.leaf(&[2.5]).mean(), 1.0);
        assert_eq!(tree.leaf(&[11.5]).mean(), 5.0);
        assert_eq!(tree.leaf(&[0.0]), &Leaf::Values(vec![1.0, 1.0, 1.0]));
    }

    #[test]
    fn test_no_features_gives_single_leaf() {
        let features = ndarray::Array2::<f64>::zeros((4, 0));
        let target = [1.0, 2.0, 3.0, 4.0];
        let tree = TreeBuilder::new(
            features.view(),
            &target,
            TargetKind::Values,
            params(),
            SmallRng::seed_from_u64(0),
        )
        .grow((0..4).collect());
        assert_eq!(tree.depth(), 0);
        assert_eq!(tree.leaf(&[]).mean(), 2.5);
    }

    #[test]
    fn test_min_leaf_size_and_max_depth_limit_growth() {
        let features = array![[0.0], [1.0], [2.0], [3.0], [4.0], [5.0], [6.0], [7.0]];
        let target = [0.0, 1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0];
        let grow = |min_leaf_size, max_depth| {
            TreeBuilder::new(
                features.view(),
                &target,
                TargetKind::Values,
                GrowParams {
                    features_per_split: 1,
                    min_leaf_size,
                    max_depth,
                },
                SmallRng::seed_from_u64(1),
            )
            .grow((0..8).collect())
        };
        assert_eq!(grow(1, 16).depth(), 3);
        assert_eq!(grow(1, 1).depth(), 1);
        assert_eq!(grow(5, 16).depth(), 0);
    }

    #[test]
    fn test_gini_and_sse() {
        assert_eq!(gini_mass(&[2.0, 2.0], 4.0), 2.0);
        assert_eq!(gini_mass(&[4.0, 0.0], 4.0), 0.0);
        assert!((sse(6.0, 14.0, 3.0) - 2.0).abs() < 1e-12);
    }

    #[test]
    fn test_partition() {
        let mut items = [5, 1, 4, 2, 3];
        let n = partition(&mut items, |&x| x <= 2);
        assert_eq!(n, 2);
        let mut left = items[..n].to_vec();
        left.sort();
        assert_eq!(left, vec![1, 2]);
    }
}
