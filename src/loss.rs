//! Contrastive loss on Soft-DTW distances between embeddings.

use ndarray::{Array2, ArrayView2};

use crate::distance::PointwiseDistance;
use crate::sampling::Relation;
use crate::softdtw::SoftDtw;

/// Margin-based contrastive loss:
///
/// - positive pair: `loss = d`
/// - negative pair: `loss = max(0, margin - d)`
///
/// where `d` is the Soft-DTW value between the two embeddings.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ContrastiveLoss {
    pub margin: f64,
}

/// Loss value with gradients with respect to both embeddings.
#[derive(Debug, Clone, PartialEq)]
pub struct PairLoss {
    pub loss: f64,
    /// Soft-DTW value between the embeddings.
    pub distance: f64,
    pub grad_anchor: Array2<f64>,
    pub grad_partner: Array2<f64>,
}

impl ContrastiveLoss {
    pub fn new(margin: f64) -> crate::Result<Self> {
        if !margin.is_finite() {
            return Err(crate::Error::InvalidParameter {
                name: "margin",
                value: margin.to_string(),
                reason: "must be finite".to_string(),
            });
        }
        Ok(Self { margin })
    }

    /// Loss and its derivative with respect to the distance.
    pub fn from_distance(&self, distance: f64, relation: Relation) -> (f64, f64) {
        match relation {
            Relation::Positive => (distance, 1.0),
            Relation::Negative => {
                let gap = self.margin - distance;
                if gap > 0.0 { (gap, -1.0) } else { (0.0, 0.0) }
            }
        }
    }

    /// Evaluate the loss on two embeddings and chain its gradient through
    /// Soft-DTW.
    ///
    /// # Example
    /// ```
    /// use siamese_sdtw::loss::ContrastiveLoss;
    /// use siamese_sdtw::sampling::Relation;
    /// use siamese_sdtw::softdtw::SoftDtw;
    /// use ndarray::array;
    ///
    /// let sdtw = SoftDtw::new(1.0).unwrap();
    /// let loss = ContrastiveLoss::new(50.0).unwrap();
    /// let a = array![[0.0, 1.0, 2.0]];
    /// let b = array![[4.0, 4.0]];
    ///
    /// let pos = loss.evaluate(&sdtw, a.view(), b.view(), Relation::Positive).unwrap();
    /// assert_eq!(pos.loss, pos.distance);
    ///
    /// let neg = loss.evaluate(&sdtw, a.view(), b.view(), Relation::Negative).unwrap();
    /// assert!((neg.loss - (50.0 - neg.distance)).abs() < 1e-12);
    /// ```
    pub fn evaluate<M: PointwiseDistance>(
        &self,
        engine: &SoftDtw<M>,
        anchor: ArrayView2<f64>,
        partner: ArrayView2<f64>,
        relation: Relation,
    ) -> crate::Result<PairLoss> {
        let out = engine.value_and_grad(anchor, partner)?;
        let (loss, dloss) = self.from_distance(out.value, relation);
        Ok(PairLoss {
            loss,
            distance: out.value,
            grad_anchor: out.grad_x * dloss,
            grad_partner: out.grad_y * dloss,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use ndarray::array;

    #[test]
    fn test_from_distance() {
        let loss = ContrastiveLoss::new(2.0).unwrap();
        assert_eq!(loss.from_distance(0.7, Relation::Positive), (0.7, 1.0));
        assert_eq!(loss.from_distance(0.5, Relation::Negative), (1.5, -1.0));
        assert_eq!(loss.from_distance(3.0, Relation::Negative), (0.0, 0.0));
    }

    #[test]
    fn test_invalid_margin() {
        assert!(ContrastiveLoss::new(f64::NAN).is_err());
    }

    #[test]
    fn test_negative_beyond_margin_has_zero_gradient() {
        let sdtw = SoftDtw::new(1.0).unwrap();
        let loss = ContrastiveLoss::new(1.0).unwrap();
        let a = array![[0.0, 0.0, 0.0]];
        let b = array![[10.0, 10.0]];
        let out = loss.evaluate(&sdtw, a.view(), b.view(), Relation::Negative).unwrap();
        assert_eq!(out.loss, 0.0);
        assert!(out.grad_anchor.iter().all(|&g| g == 0.0));
        assert!(out.grad_partner.iter().all(|&g| g == 0.0));
    }

    #[test]
    fn test_negative_gradient_pushes_apart() {
        let sdtw = SoftDtw::new(1.0).unwrap();
        let loss = ContrastiveLoss::new(100.0).unwrap();
        let a = array![[0.0, 0.0]];
        let b = array![[1.0, 1.0]];
        let pos = loss.evaluate(&sdtw, a.view(), b.view(), Relation::Positive).unwrap();
        let neg = loss.evaluate(&sdtw, a.view(), b.view(), Relation::Negative).unwrap();
        assert_relative_eq!(neg.grad_anchor[(0, 0)], -pos.grad_anchor[(0, 0)]);
        // Moving the anchor towards the partner lowers the positive loss.
        assert!(pos.grad_anchor[(0, 0)] < 0.0);
    }
}
