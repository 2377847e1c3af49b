use ndarray::ArrayView2;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use super::{LabeledPool, Relation, SelfPairPolicy};

/// An anchor and its sampled partner, borrowed from the pool.
#[derive(Debug, Clone, Copy)]
pub struct Pair<'a> {
    pub anchor_index: usize,
    pub partner_index: usize,
    pub anchor: ArrayView2<'a, f64>,
    pub partner: ArrayView2<'a, f64>,
    pub relation: Relation,
}

impl Pair<'_> {
    pub fn is_positive(&self) -> bool {
        self.relation == Relation::Positive
    }
}

/// Draw a partner index for `anchor` uniformly from the valid candidates.
///
/// # Errors
/// `IndexOutOfRange` if the anchor is not in the pool, `SamplingExhausted`
/// if no index satisfies the relation (for example a negative draw from a
/// single-class pool).
pub fn sample_partner<R: Rng + ?Sized>(
    pool: &LabeledPool,
    anchor: usize,
    relation: Relation,
    policy: SelfPairPolicy,
    rng: &mut R,
) -> crate::Result<usize> {
    let candidates = pool.candidates(anchor, relation, policy)?;
    candidates
        .choose(rng)
        .copied()
        .ok_or(crate::Error::SamplingExhausted { anchor, relation })
}

/// Produce one training pair for `anchor`: a fair coin picks positive or
/// negative, then the partner is sampled.
///
/// Depends only on its arguments, so any iteration strategy (eager list,
/// lazy stream, one generator per worker) can drive it.
pub fn produce_pair<'a, R: Rng + ?Sized>(
    pool: &'a LabeledPool,
    anchor: usize,
    policy: SelfPairPolicy,
    rng: &mut R,
) -> crate::Result<Pair<'a>> {
    let anchor_seq = pool.sequence(anchor)?;
    let relation = if rng.gen_bool(0.5) {
        Relation::Positive
    } else {
        Relation::Negative
    };
    let partner_index = sample_partner(pool, anchor, relation, policy, rng)?;
    Ok(Pair {
        anchor_index: anchor,
        partner_index,
        anchor: anchor_seq,
        partner: pool.sequence(partner_index)?,
        relation,
    })
}

/// Seeded, single-owner pair sampler.
///
/// # Example
/// ```
/// use siamese_sdtw::sampling::{LabeledPool, PairSampler, Relation};
/// use ndarray::Array2;
///
/// let pool = LabeledPool::new(vec![Array2::<f64>::ones((2, 4)); 5], vec![0, 0, 1, 1, 1]).unwrap();
/// let mut sampler = PairSampler::new(7);
/// for _ in 0..20 {
///     let partner = sampler.sample(&pool, 0, Relation::Negative).unwrap();
///     assert!((2..5).contains(&partner));
/// }
/// ```
#[derive(Debug, Clone)]
pub struct PairSampler {
    rng: ChaCha8Rng,
    policy: SelfPairPolicy,
}

impl PairSampler {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: ChaCha8Rng::seed_from_u64(seed),
            policy: SelfPairPolicy::default(),
        }
    }

    /// Sampler for one of several parallel workers.
    ///
    /// Workers sharing a seed draw from independent ChaCha streams, so no
    /// generator is ever shared across threads.
    pub fn for_worker(seed: u64, worker: u64) -> Self {
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        rng.set_stream(worker);
        Self {
            rng,
            policy: SelfPairPolicy::default(),
        }
    }

    pub fn with_policy(mut self, policy: SelfPairPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn policy(&self) -> SelfPairPolicy {
        self.policy
    }

    /// Partner index for `anchor` under an explicit relation.
    pub fn sample(
        &mut self,
        pool: &LabeledPool,
        anchor: usize,
        relation: Relation,
    ) -> crate::Result<usize> {
        sample_partner(pool, anchor, relation, self.policy, &mut self.rng)
    }

    /// Pair for `anchor` with a randomly chosen relation.
    pub fn produce_pair<'a>(
        &mut self,
        pool: &'a LabeledPool,
        anchor: usize,
    ) -> crate::Result<Pair<'a>> {
        produce_pair(pool, anchor, self.policy, &mut self.rng)
    }

    /// One shuffled pass over every anchor in the pool.
    pub fn epoch<'a, 's>(&'s mut self, pool: &'a LabeledPool) -> Epoch<'a, 's> {
        let mut order: Vec<usize> = (0..pool.len()).collect();
        order.shuffle(&mut self.rng);
        Epoch {
            sampler: self,
            pool,
            order,
            next: 0,
        }
    }
}

/// Iterator over one epoch of pairs; see [`PairSampler::epoch`].
///
/// Yields an error item (rather than stopping) for anchors without a valid
/// partner, so the caller decides whether to skip or abort.
#[derive(Debug)]
pub struct Epoch<'a, 's> {
    sampler: &'s mut PairSampler,
    pool: &'a LabeledPool,
    order: Vec<usize>,
    next: usize,
}

impl<'a> Iterator for Epoch<'a, '_> {
    type Item = crate::Result<Pair<'a>>;

    fn next(&mut self) -> Option<Self::Item> {
        let anchor = *self.order.get(self.next)?;
        self.next += 1;
        Some(self.sampler.produce_pair(self.pool, anchor))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.order.len() - self.next;
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for Epoch<'_, '_> {}
