//! Regression tree grown leaf-wise (best-first) to a leaf budget.
//!
//! Numeric features split by threshold, categorical features by one-vs-rest
//! equality on their dictionary code. Missing values (NaN) always follow the
//! right branch.

use ndarray::{Array2, ArrayView1};
use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashMap};

const MIN_GAIN: f64 = 1e-12;

#[derive(Debug, Clone, Copy, PartialEq)]
enum SplitKind {
    /// Left when `x <= threshold`.
    Threshold(f64),
    /// Left when `x == code`.
    Category(f64),
}

#[derive(Debug, Clone)]
enum Node {
    Leaf {
        value: f64,
    },
    Split {
        feature: usize,
        kind: SplitKind,
        left: usize,
        right: usize,
    },
}

/// A fitted regression tree.
#[derive(Debug, Clone)]
pub struct RegressionTree {
    nodes: Vec<Node>,
}

struct BestSplit {
    gain: f64,
    feature: usize,
    kind: SplitKind,
    left: Vec<usize>,
    right: Vec<usize>,
}

/// Pending leaf expansion ordered by split gain.
struct Candidate {
    node: usize,
    split: BestSplit,
}

impl PartialEq for Candidate {
    fn eq(&self, other: &Self) -> bool {
        self.split.gain == other.split.gain
    }
}

impl Eq for Candidate {}

impl PartialOrd for Candidate {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Candidate {
    fn cmp(&self, other: &Self) -> Ordering {
        self.split
            .gain
            .partial_cmp(&other.split.gain)
            .unwrap_or(Ordering::Equal)
    }
}

impl RegressionTree {
    /// Fit a tree to `targets` over the rows listed in `rows`.
    pub fn fit(
        x: &Array2<f64>,
        targets: &[f64],
        rows: &[usize],
        categorical: &[bool],
        max_leaves: usize,
        min_samples_leaf: usize,
    ) -> Self {
        let mut nodes = vec![Node::Leaf {
            value: mean(targets, rows),
        }];
        let mut heap = BinaryHeap::new();
        if let Some(split) = find_best_split(x, targets, rows, categorical, min_samples_leaf) {
            heap.push(Candidate { node: 0, split });
        }

        let mut n_leaves = 1;
        while n_leaves < max_leaves {
            let Some(Candidate { node, split }) = heap.pop() else {
                break;
            };

            let left_id = nodes.len();
            nodes.push(Node::Leaf {
                value: mean(targets, &split.left),
            });
            let right_id = nodes.len();
            nodes.push(Node::Leaf {
                value: mean(targets, &split.right),
            });
            nodes[node] = Node::Split {
                feature: split.feature,
                kind: split.kind,
                left: left_id,
                right: right_id,
            };
            n_leaves += 1;

            for (child, indices) in [(left_id, split.left), (right_id, split.right)] {
                if indices.len() >= 2 * min_samples_leaf {
                    if let Some(split) =
                        find_best_split(x, targets, &indices, categorical, min_samples_leaf)
                    {
                        heap.push(Candidate { node: child, split });
                    }
                }
            }
        }

        Self { nodes }
    }

    /// Predict one feature row.
    pub fn predict_row(&self, row: ArrayView1<f64>) -> f64 {
        let mut node = 0;
        loop {
            match &self.nodes[node] {
                Node::Leaf { value } => return *value,
                Node::Split {
                    feature,
                    kind,
                    left,
                    right,
                } => {
                    let x = row[*feature];
                    // NaN comparisons are false, so missing values go right.
                    let go_left = match kind {
                        SplitKind::Threshold(threshold) => x <= *threshold,
                        SplitKind::Category(code) => x == *code,
                    };
                    node = if go_left { *left } else { *right };
                }
            }
        }
    }

    /// Number of leaves in the fitted tree.
    pub fn n_leaves(&self) -> usize {
        self.nodes
            .iter()
            .filter(|n| matches!(n, Node::Leaf { .. }))
            .count()
    }
}

fn mean(targets: &[f64], rows: &[usize]) -> f64 {
    if rows.is_empty() {
        return 0.0;
    }
    rows.iter().map(|&i| targets[i]).sum::<f64>() / rows.len() as f64
}

/// Variance-reduction gain of a left/right partition, expressed through
/// sums of targets: sum_l^2/n_l + sum_r^2/n_r - sum^2/n.
fn partition_gain(sum_left: f64, n_left: usize, sum_right: f64, n_right: usize) -> f64 {
    let total_sum = sum_left + sum_right;
    let total_n = n_left + n_right;
    sum_left * sum_left / n_left as f64 + sum_right * sum_right / n_right as f64
        - total_sum * total_sum / total_n as f64
}

fn find_best_split(
    x: &Array2<f64>,
    targets: &[f64],
    rows: &[usize],
    categorical: &[bool],
    min_samples_leaf: usize,
) -> Option<BestSplit> {
    if rows.len() < 2 * min_samples_leaf {
        return None;
    }

    let mut best: Option<(f64, usize, SplitKind)> = None;
    for feature in 0..x.ncols() {
        let proposal = if categorical[feature] {
            best_category_split(x, targets, rows, feature, min_samples_leaf)
        } else {
            best_threshold_split(x, targets, rows, feature, min_samples_leaf)
        };
        if let Some((gain, kind)) = proposal {
            if gain > MIN_GAIN && best.as_ref().map(|(g, _, _)| gain > *g).unwrap_or(true) {
                best = Some((gain, feature, kind));
            }
        }
    }

    let (gain, feature, kind) = best?;
    let (left, right) = partition(x, rows, feature, kind);
    Some(BestSplit {
        gain,
        feature,
        kind,
        left,
        right,
    })
}

fn best_threshold_split(
    x: &Array2<f64>,
    targets: &[f64],
    rows: &[usize],
    feature: usize,
    min_samples_leaf: usize,
) -> Option<(f64, SplitKind)> {
    let mut sorted: Vec<(f64, f64)> = Vec::with_capacity(rows.len());
    let mut nan_sum = 0.0;
    let mut nan_n = 0;
    for &i in rows {
        let value = x[[i, feature]];
        if value.is_nan() {
            nan_sum += targets[i];
            nan_n += 1;
        } else {
            sorted.push((value, targets[i]));
        }
    }
    if sorted.len() < 2 {
        return None;
    }
    sorted.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(Ordering::Equal));

    let total_sum: f64 = sorted.iter().map(|(_, t)| t).sum::<f64>() + nan_sum;
    let total_n = sorted.len() + nan_n;

    let mut best: Option<(f64, SplitKind)> = None;
    let mut left_sum = 0.0;
    for p in 1..sorted.len() {
        left_sum += sorted[p - 1].1;
        if sorted[p].0 == sorted[p - 1].0 {
            continue;
        }
        let n_left = p;
        let n_right = total_n - p;
        if n_left < min_samples_leaf || n_right < min_samples_leaf {
            continue;
        }
        let gain = partition_gain(left_sum, n_left, total_sum - left_sum, n_right);
        if best.as_ref().map(|(g, _)| gain > *g).unwrap_or(true) {
            let threshold = (sorted[p - 1].0 + sorted[p].0) / 2.0;
            best = Some((gain, SplitKind::Threshold(threshold)));
        }
    }
    best
}

fn best_category_split(
    x: &Array2<f64>,
    targets: &[f64],
    rows: &[usize],
    feature: usize,
    min_samples_leaf: usize,
) -> Option<(f64, SplitKind)> {
    // Group by dictionary code; NaN rows never join a left group.
    let mut groups: HashMap<u64, (f64, usize, f64)> = HashMap::new();
    let mut total_sum = 0.0;
    for &i in rows {
        total_sum += targets[i];
        let value = x[[i, feature]];
        if value.is_nan() {
            continue;
        }
        let entry = groups.entry(value.to_bits()).or_insert((0.0, 0, value));
        entry.0 += targets[i];
        entry.1 += 1;
    }
    let total_n = rows.len();

    let mut codes: Vec<&(f64, usize, f64)> = groups.values().collect();
    codes.sort_by(|a, b| a.2.partial_cmp(&b.2).unwrap_or(Ordering::Equal));

    let mut best: Option<(f64, SplitKind)> = None;
    for (group_sum, group_n, code) in codes {
        let n_left = *group_n;
        let n_right = total_n - n_left;
        if n_left < min_samples_leaf || n_right < min_samples_leaf {
            continue;
        }
        let gain = partition_gain(*group_sum, n_left, total_sum - group_sum, n_right);
        if best.as_ref().map(|(g, _)| gain > *g).unwrap_or(true) {
            best = Some((gain, SplitKind::Category(*code)));
        }
    }
    best
}

fn partition(
    x: &Array2<f64>,
    rows: &[usize],
    feature: usize,
    kind: SplitKind,
) -> (Vec<usize>, Vec<usize>) {
    let mut left = Vec::new();
    let mut right = Vec::new();
    for &i in rows {
        let value = x[[i, feature]];
        let go_left = match kind {
            SplitKind::Threshold(threshold) => value <= threshold,
            SplitKind::Category(code) => value == code,
        };
        if go_left {
            left.push(i);
        } else {
            right.push(i);
        }
    }
    (left, right)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use ndarray::array;

    #[test]
    fn single_split_separates_two_groups() {
        let x = array![[1.0], [2.0], [10.0], [11.0]];
        let y = vec![1.0, 1.0, 5.0, 5.0];
        let rows: Vec<usize> = (0..4).collect();

        let tree = RegressionTree::fit(&x, &y, &rows, &[false], 2, 1);
        assert_eq!(tree.n_leaves(), 2);
        assert_relative_eq!(tree.predict_row(x.row(0)), 1.0, epsilon = 1e-10);
        assert_relative_eq!(tree.predict_row(x.row(3)), 5.0, epsilon = 1e-10);
    }

    #[test]
    fn leaf_budget_caps_growth() {
        let x = array![[1.0], [2.0], [3.0], [4.0], [5.0], [6.0], [7.0], [8.0]];
        let y: Vec<f64> = (0..8).map(|i| i as f64).collect();
        let rows: Vec<usize> = (0..8).collect();

        let tree = RegressionTree::fit(&x, &y, &rows, &[false], 4, 1);
        assert!(tree.n_leaves() <= 4);
    }

    #[test]
    fn min_samples_leaf_blocks_unbalanced_splits() {
        let x = array![[1.0], [2.0], [3.0], [100.0]];
        let y = vec![0.0, 0.0, 0.0, 10.0];
        let rows: Vec<usize> = (0..4).collect();

        let tree = RegressionTree::fit(&x, &y, &rows, &[false], 8, 2);
        // Isolating the outlier would leave a one-sample leaf, so the best
        // admissible split is two-and-two.
        assert_eq!(tree.n_leaves(), 2);
        assert_relative_eq!(tree.predict_row(x.row(0)), 0.0, epsilon = 1e-10);
        assert_relative_eq!(tree.predict_row(x.row(3)), 5.0, epsilon = 1e-10);
    }

    #[test]
    fn constant_targets_stay_a_stump() {
        let x = array![[1.0], [2.0], [3.0], [4.0]];
        let y = vec![3.0; 4];
        let rows: Vec<usize> = (0..4).collect();

        let tree = RegressionTree::fit(&x, &y, &rows, &[false], 8, 1);
        assert_eq!(tree.n_leaves(), 1);
        assert_relative_eq!(tree.predict_row(x.row(2)), 3.0, epsilon = 1e-10);
    }

    #[test]
    fn categorical_split_is_one_vs_rest() {
        // Code 1.0 has high targets, codes 0 and 2 low; a threshold split
        // on the raw code could not isolate the middle group.
        let x = array![[0.0], [1.0], [2.0], [0.0], [1.0], [2.0]];
        let y = vec![0.0, 10.0, 0.0, 0.0, 10.0, 0.0];
        let rows: Vec<usize> = (0..6).collect();

        let tree = RegressionTree::fit(&x, &y, &rows, &[true], 2, 1);
        assert_relative_eq!(tree.predict_row(x.row(1)), 10.0, epsilon = 1e-10);
        assert_relative_eq!(tree.predict_row(x.row(0)), 0.0, epsilon = 1e-10);
        assert_relative_eq!(tree.predict_row(x.row(2)), 0.0, epsilon = 1e-10);
    }

    #[test]
    fn missing_values_follow_the_right_branch() {
        let x = array![[1.0], [2.0], [10.0], [11.0], [f64::NAN]];
        let y = vec![1.0, 1.0, 5.0, 5.0, 5.0];
        let rows: Vec<usize> = (0..5).collect();

        let tree = RegressionTree::fit(&x, &y, &rows, &[false], 2, 1);
        let nan_row = array![f64::NAN];
        let pred = tree.predict_row(nan_row.view());
        assert_relative_eq!(pred, 5.0, epsilon = 1e-10);
    }

    #[test]
    fn deeper_tree_fits_piecewise_targets() {
        let x = array![[0.0], [1.0], [2.0], [3.0], [4.0], [5.0], [6.0], [7.0]];
        let y = vec![0.0, 0.0, 4.0, 4.0, 8.0, 8.0, 12.0, 12.0];
        let rows: Vec<usize> = (0..8).collect();

        let tree = RegressionTree::fit(&x, &y, &rows, &[false], 4, 1);
        assert_eq!(tree.n_leaves(), 4);
        for (i, &target) in y.iter().enumerate() {
            assert_relative_eq!(tree.predict_row(x.row(i)), target, epsilon = 1e-10);
        }
    }
}
