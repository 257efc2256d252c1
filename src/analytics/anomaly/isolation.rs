//! Isolation Forest
//!
//! ランダム分割木のアンサンブルによる外れ値スコアリング。
//! 乱数シードを固定すれば結果は再現可能。

use super::types::OutlierLabel;
use crate::analytics::config::Contamination;
use crate::error::{Error, Result};
use ndarray::{ArrayView1, ArrayView2, Axis};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::debug;

const EULER_GAMMA: f64 = 0.577_215_664_901_532_9;

/// `n` 点の二分探索木における平均パス長 c(n)
pub fn average_path_length(n: usize) -> f64 {
    match n {
        0 | 1 => 0.0,
        2 => 1.0,
        _ => {
            let n = n as f64;
            2.0 * ((n - 1.0).ln() + EULER_GAMMA) - 2.0 * (n - 1.0) / n
        }
    }
}

#[derive(Debug, Clone)]
enum Node {
    Leaf {
        size: usize,
    },
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },
}

/// 分離木
#[derive(Debug, Clone)]
struct IsolationTree {
    nodes: Vec<Node>,
}

impl IsolationTree {
    fn build(data: &ArrayView2<f64>, indices: Vec<usize>, max_depth: usize, rng: &mut StdRng) -> Self {
        let mut tree = Self { nodes: Vec::new() };
        tree.grow(data, indices, 0, max_depth, rng);
        tree
    }

    fn grow(
        &mut self,
        data: &ArrayView2<f64>,
        indices: Vec<usize>,
        depth: usize,
        max_depth: usize,
        rng: &mut StdRng,
    ) -> usize {
        let id = self.nodes.len();
        self.nodes.push(Node::Leaf {
            size: indices.len(),
        });
        if depth >= max_depth || indices.len() <= 1 {
            return id;
        }

        // ノード内で値が変化する特徴量のみ分割候補
        let candidates: Vec<(usize, f64, f64)> = (0..data.ncols())
            .filter_map(|feature| {
                let (lo, hi) = indices.iter().fold(
                    (f64::INFINITY, f64::NEG_INFINITY),
                    |(lo, hi), &i| {
                        let v = data[[i, feature]];
                        (lo.min(v), hi.max(v))
                    },
                );
                (hi > lo).then_some((feature, lo, hi))
            })
            .collect();
        if candidates.is_empty() {
            return id;
        }

        let (feature, lo, hi) = candidates[rng.gen_range(0..candidates.len())];
        let threshold = rng.gen_range(lo..hi);
        let (left_indices, right_indices): (Vec<usize>, Vec<usize>) = indices
            .into_iter()
            .partition(|&i| data[[i, feature]] <= threshold);

        let left = self.grow(data, left_indices, depth + 1, max_depth, rng);
        let right = self.grow(data, right_indices, depth + 1, max_depth, rng);
        self.nodes[id] = Node::Split {
            feature,
            threshold,
            left,
            right,
        };
        id
    }

    fn path_length(&self, sample: ArrayView1<f64>) -> f64 {
        let mut node = 0;
        let mut depth = 0.0;
        loop {
            match &self.nodes[node] {
                Node::Leaf { size } => return depth + average_path_length(*size),
                Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    node = if sample[*feature] <= *threshold {
                        *left
                    } else {
                        *right
                    };
                    depth += 1.0;
                }
            }
        }
    }
}

/// Isolation Forest
#[derive(Debug, Clone)]
pub struct IsolationForest {
    n_estimators: usize,
    max_samples: usize,
    contamination: Contamination,
    random_state: u64,
    trees: Vec<IsolationTree>,
    sample_size: usize,
}

impl Default for IsolationForest {
    fn default() -> Self {
        Self::new()
    }
}

impl IsolationForest {
    /// 既定値（100本・256サンプル・auto・シード42）で作成
    pub fn new() -> Self {
        Self {
            n_estimators: 100,
            max_samples: 256,
            contamination: Contamination::Auto,
            random_state: 42,
            trees: Vec::new(),
            sample_size: 0,
        }
    }

    pub fn with_n_estimators(mut self, n_estimators: usize) -> Self {
        self.n_estimators = n_estimators;
        self
    }

    pub fn with_max_samples(mut self, max_samples: usize) -> Self {
        self.max_samples = max_samples;
        self
    }

    pub fn with_contamination(mut self, contamination: Contamination) -> Self {
        self.contamination = contamination;
        self
    }

    pub fn with_random_state(mut self, seed: u64) -> Self {
        self.random_state = seed;
        self
    }

    pub fn is_fitted(&self) -> bool {
        !self.trees.is_empty()
    }

    /// 木を構築
    pub fn fit(&mut self, data: ArrayView2<f64>) -> Result<()> {
        let n = data.nrows();
        if n < 2 {
            return Err(Error::InsufficientData(format!(
                "isolation forest needs at least 2 rows, got {}",
                n
            )));
        }
        if self.n_estimators == 0 || self.max_samples < 2 {
            return Err(Error::Config(
                "isolation forest needs n_estimators >= 1 and max_samples >= 2".to_string(),
            ));
        }

        let sample_size = self.max_samples.min(n);
        let max_depth = (sample_size as f64).log2().ceil() as usize;
        let mut rng = StdRng::seed_from_u64(self.random_state);

        self.trees = (0..self.n_estimators)
            .map(|_| {
                let indices = rand::seq::index::sample(&mut rng, n, sample_size).into_vec();
                IsolationTree::build(&data, indices, max_depth, &mut rng)
            })
            .collect();
        self.sample_size = sample_size;

        debug!(
            "Isolation forest fitted: trees={}, sample_size={}, max_depth={}",
            self.trees.len(),
            sample_size,
            max_depth
        );
        Ok(())
    }

    /// 異常スコア s = 2^(-E[h(x)] / c(ψ))（1に近いほど異常）
    pub fn score_samples(&self, data: ArrayView2<f64>) -> Result<Vec<f64>> {
        if !self.is_fitted() {
            return Err(Error::Internal("isolation forest is not fitted".to_string()));
        }

        let normalizer = average_path_length(self.sample_size);
        Ok(data
            .axis_iter(Axis(0))
            .map(|sample| {
                let mean_path = self
                    .trees
                    .iter()
                    .map(|tree| tree.path_length(sample))
                    .sum::<f64>()
                    / self.trees.len() as f64;
                if normalizer > 0.0 {
                    2f64.powf(-mean_path / normalizer)
                } else {
                    0.5
                }
            })
            .collect())
    }

    /// スコアからラベルへの閾値
    pub fn threshold(&self, scores: &[f64]) -> f64 {
        match self.contamination {
            Contamination::Auto => 0.5,
            Contamination::Fraction(p) => quantile(scores, 1.0 - p),
        }
    }

    /// 学習してラベルを返す（全行が同一なら外れ値なし）
    pub fn fit_predict(&mut self, data: ArrayView2<f64>) -> Result<Vec<OutlierLabel>> {
        let n = data.nrows();
        if n < 2 || all_rows_identical(&data) {
            debug!("Isolation forest skipped: {} rows, no variation", n);
            return Ok(vec![OutlierLabel::Inlier; n]);
        }

        self.fit(data)?;
        let scores = self.score_samples(data)?;
        let threshold = self.threshold(&scores);

        Ok(scores
            .iter()
            .map(|&s| {
                if s > threshold {
                    OutlierLabel::Outlier
                } else {
                    OutlierLabel::Inlier
                }
            })
            .collect())
    }
}

fn all_rows_identical(data: &ArrayView2<f64>) -> bool {
    let first = data.row(0);
    data.axis_iter(Axis(0)).all(|row| row == first)
}

/// 線形補間による分位点
fn quantile(values: &[f64], q: f64) -> f64 {
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    let position = q.clamp(0.0, 1.0) * (sorted.len() - 1) as f64;
    let lower = position.floor() as usize;
    let upper = position.ceil() as usize;
    let weight = position - lower as f64;
    sorted[lower] * (1.0 - weight) + sorted[upper] * weight
}
