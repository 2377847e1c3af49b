//! Siamese Training Example
//!
//! Trains a linear encoder on synthetic two-class sequences with a Soft-DTW
//! contrastive loss, then evaluates the embeddings with 1-NN and a linear
//! probe.

use log::info;
use ndarray::Array2;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use siamese_sdtw::encoder::LinearEncoder;
use siamese_sdtw::knn::{KnnClassifier, embed_pool};
use siamese_sdtw::probe::LinearProbe;
use siamese_sdtw::sampling::LabeledPool;
use siamese_sdtw::siamese::{SiameseTrainer, TrainerConfig};
use siamese_sdtw::softdtw::SoftDtw;

/// Noisy sines (label 0) and noisy square waves (label 1), 3 channels.
fn synthetic_pool(per_class: usize, rng: &mut ChaCha8Rng) -> siamese_sdtw::Result<LabeledPool> {
    let mut sequences = Vec::new();
    let mut labels = Vec::new();
    for _ in 0..per_class {
        for label in 0..2 {
            let len = rng.gen_range(24..40);
            let phase: f64 = rng.gen_range(0.0..std::f64::consts::TAU);
            let seq = Array2::from_shape_fn((3, len), |(k, t)| {
                let s = (t as f64 * 0.4 + phase + k as f64).sin();
                let base = if label == 0 { s } else { s.signum() };
                base + rng.gen_range(-0.2..0.2)
            });
            sequences.push(seq);
            labels.push(label);
        }
    }
    LabeledPool::new(sequences, labels)
}

fn main() -> siamese_sdtw::Result<()> {
    env_logger::init();
    info!("Siamese Training Example");

    let mut rng = ChaCha8Rng::seed_from_u64(42);
    let train = synthetic_pool(20, &mut rng)?;
    let test = synthetic_pool(8, &mut rng)?;
    info!("Train: {} sequences, test: {}", train.len(), test.len());

    let config = TrainerConfig::new(1.0)?
        .with_learning_rate(5e-4)
        .with_margin(15.0)
        .with_seed(7);
    let mut trainer = SiameseTrainer::new(LinearEncoder::new(3, 2, 0)?, config)?;

    let knn = KnnClassifier::new(1, SoftDtw::new(1.0)?)?;
    let before = knn.accuracy(
        &embed_pool(trainer.encoder(), &train)?,
        &embed_pool(trainer.encoder(), &test)?,
    )?;
    info!("1-NN accuracy before training: {:.3}", before);

    for (epoch, summary) in trainer.fit(&train, 5)?.iter().enumerate() {
        info!(
            "epoch {}: loss={:.4} pos={:?} neg={:?}",
            epoch + 1,
            summary.mean_loss,
            summary.mean_positive_distance,
            summary.mean_negative_distance
        );
    }

    let encoder = trainer.into_encoder();
    let train_z = embed_pool(&encoder, &train)?;
    let test_z = embed_pool(&encoder, &test)?;
    let after = knn.accuracy(&train_z, &test_z)?;
    info!("1-NN accuracy after training: {:.3}", after);

    // Linear fine-tuning on the frozen encoder
    let probe = LinearProbe::fit(&train_z, 500, 0.1)?;
    info!("Linear probe accuracy: {:.3}", probe.accuracy(&test_z)?);

    Ok(())
}
