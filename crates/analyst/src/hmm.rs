//! Inference for a pre-trained Gaussian hidden Markov model
//!
//! The model is trained elsewhere and exported as JSON. Only decoding is
//! supported here: most likely state path (Viterbi) and per-step state
//! posteriors (forward-backward), both in log space.
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ModelError {
    #[error("Failed to read model file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse model: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Malformed model: {0}")]
    Shape(String),
}

/// Per-feature standardization fitted on the training data
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StandardScaler {
    pub mean: Vec<f64>,
    pub scale: Vec<f64>,
}

impl StandardScaler {
    pub fn transform(&self, row: &[f64]) -> Vec<f64> {
        row.iter()
            .zip(self.mean.iter().zip(&self.scale))
            .map(|(x, (mean, scale))| {
                // constant training features are left centred but unscaled
                let scale = if *scale == 0.0 { 1.0 } else { *scale };
                (x - mean) / scale
            })
            .collect()
    }
}

/// Gaussian HMM with diagonal covariances
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegimeModel {
    pub n_components: usize,
    pub start_prob: Vec<f64>,
    pub trans_mat: Vec<Vec<f64>>,
    pub means: Vec<Vec<f64>>,
    /// Diagonal of each state's covariance matrix
    pub covars: Vec<Vec<f64>>,
    pub scaler: StandardScaler,
}

impl RegimeModel {
    pub fn load(path: &Path) -> Result<Self, ModelError> {
        let raw = fs::read_to_string(path).map_err(|source| ModelError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&raw)
    }

    pub fn from_json(raw: &str) -> Result<Self, ModelError> {
        let model: RegimeModel = serde_json::from_str(raw)?;
        model.validate()?;
        Ok(model)
    }

    pub fn n_features(&self) -> usize {
        self.means.first().map(Vec::len).unwrap_or(0)
    }

    fn validate(&self) -> Result<(), ModelError> {
        let n = self.n_components;
        let d = self.n_features();

        if n == 0 || d == 0 {
            return Err(ModelError::Shape("model has no states or features".into()));
        }
        if self.start_prob.len() != n {
            return Err(ModelError::Shape(format!(
                "start_prob has {} entries, expected {}",
                self.start_prob.len(),
                n
            )));
        }
        if self.trans_mat.len() != n || self.trans_mat.iter().any(|row| row.len() != n) {
            return Err(ModelError::Shape(format!("trans_mat must be {n}x{n}")));
        }
        if self.means.len() != n || self.means.iter().any(|row| row.len() != d) {
            return Err(ModelError::Shape(format!("means must be {n}x{d}")));
        }
        if self.covars.len() != n || self.covars.iter().any(|row| row.len() != d) {
            return Err(ModelError::Shape(format!("covars must be {n}x{d}")));
        }
        if self.covars.iter().flatten().any(|v| *v <= 0.0) {
            return Err(ModelError::Shape("covariances must be positive".into()));
        }
        if self.scaler.mean.len() != d || self.scaler.scale.len() != d {
            return Err(ModelError::Shape(format!(
                "scaler must have {d} features"
            )));
        }
        Ok(())
    }

    /// Standardize raw feature rows with the training scaler
    pub fn scale(&self, rows: &[Vec<f64>]) -> Result<Vec<Vec<f64>>, ModelError> {
        let d = self.n_features();
        rows.iter()
            .map(|row| {
                if row.len() != d {
                    return Err(ModelError::Shape(format!(
                        "observation has {} features, expected {}",
                        row.len(),
                        d
                    )));
                }
                Ok(self.scaler.transform(row))
            })
            .collect()
    }

    fn log_emission(&self, state: usize, x: &[f64]) -> f64 {
        x.iter()
            .zip(self.means[state].iter().zip(&self.covars[state]))
            .map(|(x, (mean, var))| -0.5 * ((2.0 * PI * var).ln() + (x - mean).powi(2) / var))
            .sum()
    }

    fn emissions(&self, observations: &[Vec<f64>]) -> Vec<Vec<f64>> {
        observations
            .iter()
            .map(|x| (0..self.n_components).map(|s| self.log_emission(s, x)).collect())
            .collect()
    }

    fn log_trans(&self) -> Vec<Vec<f64>> {
        self.trans_mat
            .iter()
            .map(|row| row.iter().map(|p| p.ln()).collect())
            .collect()
    }

    /// Most likely state sequence for already-scaled observations
    pub fn predict(&self, observations: &[Vec<f64>]) -> Vec<usize> {
        let t_len = observations.len();
        if t_len == 0 {
            return Vec::new();
        }
        let n = self.n_components;
        let emissions = self.emissions(observations);
        let log_trans = self.log_trans();

        let mut delta: Vec<f64> = (0..n)
            .map(|s| self.start_prob[s].ln() + emissions[0][s])
            .collect();
        let mut backpointers = vec![vec![0usize; n]; t_len];

        for t in 1..t_len {
            let mut next = vec![f64::NEG_INFINITY; n];
            for j in 0..n {
                let (best_i, best) = (0..n)
                    .map(|i| (i, delta[i] + log_trans[i][j]))
                    .fold((0, f64::NEG_INFINITY), |acc, cur| if cur.1 > acc.1 { cur } else { acc });
                next[j] = best + emissions[t][j];
                backpointers[t][j] = best_i;
            }
            delta = next;
        }

        let mut state = argmax(&delta);
        let mut path = vec![0usize; t_len];
        path[t_len - 1] = state;
        for t in (1..t_len).rev() {
            state = backpointers[t][state];
            path[t - 1] = state;
        }
        path
    }

    /// Posterior state probabilities for each already-scaled observation
    pub fn predict_proba(&self, observations: &[Vec<f64>]) -> Vec<Vec<f64>> {
        let t_len = observations.len();
        if t_len == 0 {
            return Vec::new();
        }
        let n = self.n_components;
        let emissions = self.emissions(observations);
        let log_trans = self.log_trans();

        let mut alpha = vec![vec![0.0; n]; t_len];
        for s in 0..n {
            alpha[0][s] = self.start_prob[s].ln() + emissions[0][s];
        }
        for t in 1..t_len {
            for j in 0..n {
                let terms: Vec<f64> = (0..n).map(|i| alpha[t - 1][i] + log_trans[i][j]).collect();
                alpha[t][j] = log_sum_exp(&terms) + emissions[t][j];
            }
        }

        let mut beta = vec![vec![0.0; n]; t_len];
        for t in (0..t_len - 1).rev() {
            for i in 0..n {
                let terms: Vec<f64> = (0..n)
                    .map(|j| log_trans[i][j] + emissions[t + 1][j] + beta[t + 1][j])
                    .collect();
                beta[t][i] = log_sum_exp(&terms);
            }
        }

        (0..t_len)
            .map(|t| {
                let joint: Vec<f64> = (0..n).map(|s| alpha[t][s] + beta[t][s]).collect();
                let norm = log_sum_exp(&joint);
                joint.iter().map(|v| (v - norm).exp()).collect()
            })
            .collect()
    }
}

fn argmax(values: &[f64]) -> usize {
    values
        .iter()
        .enumerate()
        .fold((0, f64::NEG_INFINITY), |acc, (i, v)| if *v > acc.1 { (i, *v) } else { acc })
        .0
}

fn log_sum_exp(values: &[f64]) -> f64 {
    let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    if max == f64::NEG_INFINITY {
        return f64::NEG_INFINITY;
    }
    max + values.iter().map(|v| (v - max).exp()).sum::<f64>().ln()
}
