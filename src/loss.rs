//! Loss kinds and the per-sample loss arithmetic shared by the plain
//! and ANN expressions.
//!
//! Samples whose predicted outputs contain a non-finite value are
//! tolerated: they contribute zero to the aggregated sum (the sample
//! count is unchanged), so pathological chromosomes remain cheap to
//! score instead of aborting a search.

use std::fmt;
use std::str::FromStr;

use crate::error::{Error, Result};

/// Supported loss functions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LossKind {
    /// Mean square error: per sample, `Σ_j (ŷ_j − y_j)² / m`.
    Mse,
    /// Cross-entropy with softmax over the outputs: per sample,
    /// `−Σ_j y_j · ln(softmax(ŷ)_j)`.
    CrossEntropy,
}

impl FromStr for LossKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "MSE" => Ok(LossKind::Mse),
            "CE" => Ok(LossKind::CrossEntropy),
            other => Err(Error::Input(format!(
                "unknown loss kind '{other}', expected 'MSE' or 'CE'"
            ))),
        }
    }
}

impl fmt::Display for LossKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LossKind::Mse => write!(f, "MSE"),
            LossKind::CrossEntropy => write!(f, "CE"),
        }
    }
}

/// Check a point/label set against the expression shape.
pub(crate) fn validate_points(
    points: &[Vec<f64>],
    labels: &[Vec<f64>],
    inputs: usize,
    outputs: usize,
) -> Result<()> {
    if points.len() != labels.len() {
        return Err(Error::Input(format!(
            "{} points but {} labels",
            points.len(),
            labels.len()
        )));
    }
    if points.is_empty() {
        return Err(Error::Input("point set is empty".to_string()));
    }
    if let Some(p) = points.iter().find(|p| p.len() != inputs) {
        return Err(Error::Input(format!(
            "point has {} entries, expression has {} inputs",
            p.len(),
            inputs
        )));
    }
    if let Some(l) = labels.iter().find(|l| l.len() != outputs) {
        return Err(Error::Input(format!(
            "label has {} entries, expression has {} outputs",
            l.len(),
            outputs
        )));
    }
    Ok(())
}

/// Numerically stable softmax.
pub(crate) fn softmax(v: &[f64]) -> Vec<f64> {
    let max = v.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let exps: Vec<f64> = v.iter().map(|x| (x - max).exp()).collect();
    let sum: f64 = exps.iter().sum();
    exps.iter().map(|e| e / sum).collect()
}

/// Loss contribution of one sample; zero when the prediction is not finite.
pub(crate) fn sample_loss(predicted: &[f64], label: &[f64], kind: LossKind) -> f64 {
    if !predicted.iter().all(|y| y.is_finite()) {
        return 0.0;
    }
    match kind {
        LossKind::Mse => {
            let m = predicted.len() as f64;
            predicted
                .iter()
                .zip(label)
                .map(|(y_hat, y)| (y_hat - y) * (y_hat - y))
                .sum::<f64>()
                / m
        }
        LossKind::CrossEntropy => {
            let p = softmax(predicted);
            -p.iter()
                .zip(label)
                .map(|(p_j, y_j)| y_j * p_j.ln())
                .sum::<f64>()
        }
    }
}

/// `dL/dŷ` of one sample: the error to seed backpropagation with.
pub(crate) fn output_error(predicted: &[f64], label: &[f64], kind: LossKind) -> Vec<f64> {
    match kind {
        LossKind::Mse => {
            let m = predicted.len() as f64;
            predicted
                .iter()
                .zip(label)
                .map(|(y_hat, y)| 2.0 * (y_hat - y) / m)
                .collect()
        }
        LossKind::CrossEntropy => softmax(predicted)
            .iter()
            .zip(label)
            .map(|(p, y)| p - y)
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_str() {
        assert_eq!("MSE".parse::<LossKind>().unwrap(), LossKind::Mse);
        assert_eq!("CE".parse::<LossKind>().unwrap(), LossKind::CrossEntropy);
        assert!("mse".parse::<LossKind>().is_err());
        assert!("hinge".parse::<LossKind>().is_err());
    }

    #[test]
    fn test_softmax_is_stable() {
        let p = softmax(&[1000.0, 1001.0]);
        assert!(p.iter().all(|x| x.is_finite()));
        assert!((p.iter().sum::<f64>() - 1.0).abs() < 1e-12);
        assert!(p[1] > p[0]);
    }

    #[test]
    fn test_mse_sample() {
        // ((1-0)^2 + (3-1)^2) / 2 = 2.5
        let l = sample_loss(&[1.0, 3.0], &[0.0, 1.0], LossKind::Mse);
        assert!((l - 2.5).abs() < 1e-12);
    }

    #[test]
    fn test_ce_sample() {
        let predicted = [0.2, 1.3];
        let label = [0.3, 0.7];
        let p = softmax(&predicted);
        let expected = -(0.3 * p[0].ln() + 0.7 * p[1].ln());
        let l = sample_loss(&predicted, &label, LossKind::CrossEntropy);
        assert!((l - expected).abs() < 1e-12);
    }

    #[test]
    fn test_non_finite_prediction_contributes_zero() {
        assert_eq!(
            sample_loss(&[f64::NAN, 1.0], &[0.0, 0.0], LossKind::Mse),
            0.0
        );
        assert_eq!(
            sample_loss(&[f64::INFINITY], &[0.0], LossKind::CrossEntropy),
            0.0
        );
    }

    #[test]
    fn test_mse_output_error() {
        let e = output_error(&[1.0, 3.0], &[0.0, 1.0], LossKind::Mse);
        assert!((e[0] - 1.0).abs() < 1e-12);
        assert!((e[1] - 2.0).abs() < 1e-12);
    }

    #[test]
    fn test_ce_output_error_sums_to_zero_for_normalized_labels() {
        // With Σy = 1, Σ(p − y) = 0.
        let e = output_error(&[0.5, -0.2, 1.1], &[0.2, 0.3, 0.5], LossKind::CrossEntropy);
        assert!(e.iter().sum::<f64>().abs() < 1e-12);
    }

    #[test]
    fn test_validate_points() {
        let p = vec![vec![0.0, 1.0]];
        let l = vec![vec![0.0]];
        assert!(validate_points(&p, &l, 2, 1).is_ok());
        assert!(validate_points(&p, &l, 3, 1).is_err());
        assert!(validate_points(&p, &l, 2, 2).is_err());
        assert!(validate_points(&p, &[], 2, 1).is_err());
        assert!(validate_points(&[], &[], 2, 1).is_err());
    }
}
