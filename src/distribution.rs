use rand::distributions::Distribution as RandDistribution;
use rand::{Rng, SeedableRng};
use rand_distr::Uniform;
use rand_pcg::Pcg64Mcg;

pub type RngGen = Pcg64Mcg;

/// Builds the generator for one of the driver's random streams.
///
/// The loader and every worker get their own stream index, so their draw
/// sequences stay uncorrelated while the whole run remains reproducible from
/// a single base seed.
pub fn seeded_gen(base_seed: u64, stream: u64) -> RngGen {
    RngGen::seed_from_u64(base_seed.wrapping_add(stream.wrapping_mul(0x9e37_79b9_7f4a_7c15)))
}

pub trait Distribution: Send + Sync {
    fn get_u64(&self, gen: &mut RngGen) -> u64;
}

pub struct UniformDistribution(Uniform<u64>);

impl UniformDistribution {
    pub fn new_inclusive(low: u64, high: u64) -> Self {
        UniformDistribution(Uniform::new_inclusive(low, high))
    }
}

impl Distribution for UniformDistribution {
    fn get_u64(&self, gen: &mut RngGen) -> u64 {
        self.0.sample(gen)
    }
}

/// The TATP non-uniform key distribution:
/// `((uniform(0, a) | uniform(x, y)) % (y - x + 1)) + x`.
///
/// The bitwise OR saturates the low bits covered by `a`, so a deterministic
/// slice of the key space is drawn disproportionately often. The result
/// always lands in `[x, y]`.
pub struct NonUniformDistribution {
    x: u64,
    y: u64,
    mix: Uniform<u64>,
    base: Uniform<u64>,
}

impl NonUniformDistribution {
    pub fn new(a: u64, x: u64, y: u64) -> Self {
        assert!(x >= 1 && x <= y);
        Self {
            x,
            y,
            mix: Uniform::new_inclusive(0, a),
            base: Uniform::new_inclusive(x, y),
        }
    }

    /// Skewed subscriber ids in `[1, n]`, with the mix constant TATP
    /// prescribes for the default subscriber scale.
    pub fn subscriber_ids(n: u64) -> Self {
        Self::new(65535, 1, n)
    }
}

impl Distribution for NonUniformDistribution {
    fn get_u64(&self, gen: &mut RngGen) -> u64 {
        let draw = self.mix.sample(gen) | self.base.sample(gen);
        draw % (self.y - self.x + 1) + self.x
    }
}

/// Maps a single uniform draw through cumulative bins and yields the index of
/// the bin the draw falls into.
pub struct WeightedDistribution {
    cumulative: Vec<u64>,
    range: Uniform<u64>,
}

impl WeightedDistribution {
    pub fn new(weights: &[u64]) -> Self {
        let mut cumulative = Vec::with_capacity(weights.len());
        let mut total = 0;
        for weight in weights {
            total += weight;
            cumulative.push(total);
        }
        assert!(total > 0, "weights must not sum to zero");
        Self {
            cumulative,
            range: Uniform::new(0, total),
        }
    }
}

impl Distribution for WeightedDistribution {
    fn get_u64(&self, gen: &mut RngGen) -> u64 {
        let draw = self.range.sample(gen);
        self.cumulative
            .iter()
            .position(|&bound| draw < bound)
            .unwrap_or(self.cumulative.len() - 1) as u64
    }
}

const UPPERCASE: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ";

pub fn alpha_string(gen: &mut RngGen, len: usize) -> String {
    (0..len)
        .map(|_| UPPERCASE[gen.gen_range(0..UPPERCASE.len())] as char)
        .collect()
}

pub fn numeric_string(gen: &mut RngGen, len: usize) -> String {
    (0..len)
        .map(|_| char::from(b'0' + gen.gen_range(0..10u8)))
        .collect()
}
