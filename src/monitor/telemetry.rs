//! Simulated telemetry for the live monitor.

use crate::monitor::frames::{LogEvent, ServerFrame, TelemetrySample};
use chrono::Utc;
use rand::seq::IndexedRandom;
use rand::Rng;

const METHODS: [&str; 4] = ["GET", "POST", "PUT", "DELETE"];
const PATHS: [&str; 4] = ["/api/chat", "/api/projects", "/api/contact", "/api/auth"];
// Weighted towards success
const STATUS_CODES: [u16; 7] = [200, 201, 200, 200, 200, 400, 500];

/// Produces the frames broadcast on each monitor tick
#[derive(Debug, Clone, Copy)]
pub struct TelemetryGenerator {
    log_probability: f64,
}

impl TelemetryGenerator {
    /// `log_probability` must lie in [0, 1]
    pub fn new(log_probability: f64) -> Self {
        Self {
            log_probability: log_probability.clamp(0.0, 1.0),
        }
    }

    pub fn sample<R: Rng + ?Sized>(
        &self,
        rng: &mut R,
        active_connections: usize,
    ) -> TelemetrySample {
        TelemetrySample {
            timestamp: Utc::now(),
            cpu: one_decimal(rng.random_range(10.0..=40.0)),
            memory: one_decimal(rng.random_range(30.0..=60.0)),
            requests_per_sec: rng.random_range(5..=50),
            active_connections,
            status: "healthy".to_string(),
        }
    }

    pub fn log_event<R: Rng + ?Sized>(&self, rng: &mut R) -> LogEvent {
        LogEvent {
            id: rng.random_range(1000..=9999u32).to_string(),
            method: pick(rng, &METHODS).to_string(),
            path: pick(rng, &PATHS).to_string(),
            status: *STATUS_CODES.choose(rng).unwrap_or(&200),
            latency: format!("{}ms", rng.random_range(10..=500u32)),
        }
    }

    /// Frames for one tick: an optional log line, then the stats sample
    pub fn tick<R: Rng + ?Sized>(
        &self,
        rng: &mut R,
        active_connections: usize,
    ) -> Vec<ServerFrame> {
        let mut frames = Vec::with_capacity(2);
        if rng.random_bool(self.log_probability) {
            frames.push(ServerFrame::Log(self.log_event(rng)));
        }
        frames.push(ServerFrame::Stats(self.sample(rng, active_connections)));
        frames
    }
}

impl Default for TelemetryGenerator {
    fn default() -> Self {
        Self::new(0.3)
    }
}

fn pick<'a, R: Rng + ?Sized>(rng: &mut R, options: &'a [&'a str]) -> &'a str {
    options.choose(rng).copied().unwrap_or(options[0])
}

fn one_decimal(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_sample_bounds() {
        let generator = TelemetryGenerator::default();
        let mut rng = StdRng::seed_from_u64(7);

        for _ in 0..2000 {
            let s = generator.sample(&mut rng, 3);
            assert!((10.0..=40.0).contains(&s.cpu), "cpu {}", s.cpu);
            assert!((30.0..=60.0).contains(&s.memory), "memory {}", s.memory);
            assert!((5..=50).contains(&s.requests_per_sec));
            assert_eq!(s.active_connections, 3);
            assert_eq!(s.status, "healthy");
        }
    }

    #[test]
    fn test_log_event_fields() {
        let generator = TelemetryGenerator::default();
        let mut rng = StdRng::seed_from_u64(11);

        for _ in 0..500 {
            let log = generator.log_event(&mut rng);
            let id: u32 = log.id.parse().unwrap();
            assert!((1000..=9999).contains(&id));
            assert!(METHODS.contains(&log.method.as_str()));
            assert!(PATHS.contains(&log.path.as_str()));
            assert!(STATUS_CODES.contains(&log.status));

            let ms: u32 = log.latency.strip_suffix("ms").unwrap().parse().unwrap();
            assert!((10..=500).contains(&ms));
        }
    }

    #[test]
    fn test_tick_orders_log_before_stats() {
        let always = TelemetryGenerator::new(1.0);
        let never = TelemetryGenerator::new(0.0);
        let mut rng = StdRng::seed_from_u64(3);

        let frames = always.tick(&mut rng, 0);
        assert_eq!(frames.len(), 2);
        assert!(matches!(frames[0], ServerFrame::Log(_)));
        assert!(matches!(frames[1], ServerFrame::Stats(_)));

        let frames = never.tick(&mut rng, 0);
        assert_eq!(frames.len(), 1);
        assert!(matches!(frames[0], ServerFrame::Stats(_)));
    }

    #[test]
    fn test_log_rate_roughly_matches_probability() {
        let generator = TelemetryGenerator::new(0.3);
        let mut rng = StdRng::seed_from_u64(99);

        let logs = (0..10_000)
            .filter(|_| generator.tick(&mut rng, 0).len() == 2)
            .count();
        assert!((2500..3500).contains(&logs), "logs {}", logs);
    }
}
