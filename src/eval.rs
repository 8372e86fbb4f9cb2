use rand::Rng;

/// Source of rollout draws. Each call returns an integer in `1..=100`.
pub trait Sampler: Send + Sync {
    fn draw(&self) -> u8;
}

/// Uniform draws from the thread-local RNG.
#[derive(Debug, Default, Clone, Copy)]
pub struct RandomSampler;

impl Sampler for RandomSampler {
    fn draw(&self) -> u8 {
        rand::thread_rng().gen_range(1..=100)
    }
}

/// Decides whether a flag is active for a single read.
///
/// A disabled flag is never active and does not consume a draw. An enabled
/// flag is active when a fresh draw in `1..=100` is at most `rollout`, so
/// `0` is never active and `100` always is. Two calls with the same input
/// may disagree; there is no per-subject stickiness.
pub fn evaluate(enabled: bool, rollout: u8, sampler: &dyn Sampler) -> bool {
    if !enabled {
        return false;
    }
    sampler.draw() <= rollout
}
