use tokio::sync::Mutex;

use crate::api::Signal;

/// Produces the raw value for one source tick.
#[cfg_attr(test, mockall::automock)]
pub trait SignalSampler: Send + Sync {
    fn sample(&self) -> f64;
}

/// Uniform values in `[0, 1)`.
#[derive(Debug, Default, Clone, Copy)]
pub struct UniformSampler;

impl SignalSampler for UniformSampler {
    fn sample(&self) -> f64 {
        rand::random::<f64>()
    }
}

/// The only signal a source keeps: the latest one.
pub struct SignalCell {
    sampler: Box<dyn SignalSampler>,
    latest: Mutex<Option<Signal>>,
}

impl SignalCell {
    pub fn new(sampler: Box<dyn SignalSampler>) -> Self {
        Self {
            sampler,
            latest: Mutex::new(None),
        }
    }

    /// Replaces the held signal with a fresh sample stamped with the current time.
    pub async fn tick(&self) -> Signal {
        let signal = Signal::new(self.sampler.sample());
        *self.latest.lock().await = Some(signal);

        tracing::info!(
            "📈 Generated signal: {:.6}, ts: {}",
            signal.value,
            signal.generated_at
        );
        signal
    }

    /// Snapshot of the latest signal; `None` before the first tick.
    pub async fn pull(&self) -> Option<Signal> {
        *self.latest.lock().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[tokio::test]
    async fn test_pull_before_first_tick() {
        let cell = SignalCell::new(Box::new(UniformSampler));
        assert!(cell.pull().await.is_none());
    }

    #[tokio::test]
    async fn test_tick_then_pull_returns_fresh_value() {
        let mut sampler = MockSignalSampler::new();
        sampler.expect_sample().times(1).return_const(0.4);
        let cell = SignalCell::new(Box::new(sampler));

        let before = Utc::now();
        let generated = cell.tick().await;
        let pulled = cell.pull().await.unwrap();

        assert_eq!(pulled, generated);
        assert_eq!(pulled.value, 0.4);
        assert!(pulled.generated_at >= before);
        assert!((Utc::now() - pulled.generated_at).num_milliseconds() < 1000);
    }

    #[tokio::test]
    async fn test_tick_replaces_previous_signal() {
        let mut sampler = MockSignalSampler::new();
        let mut seq = mockall::Sequence::new();
        sampler
            .expect_sample()
            .times(1)
            .in_sequence(&mut seq)
            .return_const(0.1);
        sampler
            .expect_sample()
            .times(1)
            .in_sequence(&mut seq)
            .return_const(0.9);
        let cell = SignalCell::new(Box::new(sampler));

        cell.tick().await;
        cell.tick().await;
        assert_eq!(cell.pull().await.map(|s| s.value), Some(0.9));
    }

    #[test]
    fn test_uniform_sampler_range() {
        let sampler = UniformSampler;
        for _ in 0..1000 {
            let value = sampler.sample();
            assert!((0.0..1.0).contains(&value));
        }
    }
}
