//! Stats/Telemetry Sampler
//!
//! Periodically samples the engine's bandwidth estimate and the buffer ahead
//! of the playhead. Purely observational.

use crate::engine::EngineAdapter;
use crate::media::{buffered_ahead, MediaElement};
use crate::task::TaskSlot;
use crate::types::StatsSample;
use std::sync::Arc;
use std::time::Duration;
use tracing::trace;

/// Receives stats samples
pub type StatsCallback = Arc<dyn Fn(StatsSample) + Send + Sync>;

/// Take one sample; `None` when no engine is active
pub async fn sample(adapter: &EngineAdapter, media: &dyn MediaElement) -> Option<StatsSample> {
    if !adapter.is_active().await {
        return None;
    }
    Some(StatsSample {
        bandwidth_kbps: adapter
            .bandwidth_estimate()
            .await
            .map(|bps| (bps as f64 / 1000.0).round() as u64),
        buffer_sec: buffered_ahead(media),
    })
}

/// Runs the sampling interval while an engine instance exists
pub struct StatsSampler {
    adapter: Arc<EngineAdapter>,
    media: Arc<dyn MediaElement>,
    interval: Duration,
    task: TaskSlot,
}

impl StatsSampler {
    pub fn new(
        adapter: Arc<EngineAdapter>,
        media: Arc<dyn MediaElement>,
        interval: Duration,
    ) -> Self {
        Self {
            adapter,
            media,
            interval,
            task: TaskSlot::new(),
        }
    }

    /// Start sampling into `sink`, replacing any running interval.
    /// The first sample is taken one period after start.
    pub fn start(&self, sink: StatsCallback) {
        let adapter = Arc::clone(&self.adapter);
        let media = Arc::clone(&self.media);
        let period = self.interval;

        self.task.spawn(async move {
            let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + period, period);
            loop {
                ticker.tick().await;
                match sample(&adapter, media.as_ref()).await {
                    Some(stats) => {
                        trace!(?stats, "Stats sample");
                        sink(stats);
                    }
                    None => {
                        trace!("Engine gone, stopping stats");
                        return;
                    }
                }
            }
        });
    }

    pub fn stop(&self) {
        self.task.cancel();
    }

    pub fn is_running(&self) -> bool {
        self.task.is_pending()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;
    use crate::sim::{ScriptedEngineFactory, SimulatedMedia};
    use crate::types::PlaybackSource;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Collect(Mutex<Vec<StatsSample>>);

    fn callback(sink: &Arc<Collect>) -> StatsCallback {
        let sink = sink.clone();
        Arc::new(move |sample: StatsSample| sink.0.lock().unwrap().push(sample))
    }

    async fn sampler() -> (Arc<EngineAdapter>, Arc<SimulatedMedia>, StatsSampler) {
        let factory =
            Arc::new(ScriptedEngineFactory::with_heights(&[720]).with_bandwidth(4_200_000));
        let media = Arc::new(SimulatedMedia::new());
        let adapter = Arc::new(EngineAdapter::new(factory, media.clone(), EngineConfig::default()));
        adapter.initialize(&PlaybackSource::new("x.m3u8")).await.unwrap();
        let sampler = StatsSampler::new(adapter.clone(), media.clone(), Duration::from_secs(5));
        (adapter, media, sampler)
    }

    #[tokio::test(start_paused = true)]
    async fn test_samples_every_period() {
        let (_adapter, media, sampler) = sampler().await;
        media.set_position(10.0);
        media.set_buffered_end(Some(22.5));
        let sink = Arc::new(Collect::default());

        sampler.start(callback(&sink));
        tokio::time::sleep(Duration::from_millis(4900)).await;
        assert!(sink.0.lock().unwrap().is_empty());

        tokio::time::sleep(Duration::from_millis(10_200)).await;
        let samples = sink.0.lock().unwrap().clone();
        assert_eq!(samples.len(), 3);
        assert_eq!(samples[0].bandwidth_kbps, Some(4200));
        assert_eq!(samples[0].buffer_sec, 12.5);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stops_when_engine_destroyed() {
        let (adapter, _media, sampler) = sampler().await;
        let sink = Arc::new(Collect::default());

        sampler.start(callback(&sink));
        tokio::time::sleep(Duration::from_millis(5100)).await;
        adapter.destroy().await;
        tokio::time::sleep(Duration::from_secs(20)).await;

        assert_eq!(sink.0.lock().unwrap().len(), 1);
        assert!(!sampler.is_running());
    }
}
