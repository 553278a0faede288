//! Scan orchestrator
//!
//! Drives the end-to-end scan cycle: buffer the incoming frame, decode a
//! code off the latest frame, recognize every configured region across every
//! buffered frame, vote on the observations, and fuse the competing readings
//! into one result. One cycle runs to completion before the next begins; a
//! trigger arriving mid-cycle is declined, not queued.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use crossbeam_channel::{Receiver, Sender};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, trace, warn};
use uuid::Uuid;

use crate::analysis::{aggregate, extract_value, Observation, StableValue, ValueBounds};
use crate::cloud::{CloudReading, CloudVision};
use crate::decode::{CodeDecoder, CodeReading};
use crate::frame::{Frame, FrameRing, RingError};
use crate::region::{self, RegionDescriptor};
use crate::vision::{OcrEngine, OcrError};

/// Orchestrator tuning.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanSettings {
    /// Frames kept for temporal averaging
    pub ring_capacity: usize,
    /// Minimum interval between completed cycles for the same target
    pub cooldown_ms: u64,
    /// Observations that must agree before a value is trusted
    pub stability_threshold: usize,
    /// Retry recognition on a grayscale copy when the direct crop reads empty
    pub grayscale_retry: bool,
    /// Plausibility bounds applied during value extraction
    pub bounds: ValueBounds,
}

impl Default for ScanSettings {
    fn default() -> Self {
        Self {
            ring_capacity: crate::frame::ring::DEFAULT_CAPACITY,
            cooldown_ms: 2_000,
            stability_threshold: crate::analysis::stability::DEFAULT_STABILITY_THRESHOLD,
            grayscale_retry: true,
            bounds: ValueBounds::default(),
        }
    }
}

/// Where a fused counter value came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CounterSource {
    Code,
    Ocr,
    Vision,
}

/// The counter value a cycle settled on.
#[derive(Debug, Clone, Serialize)]
pub struct CounterReading {
    pub value: u64,
    pub source: CounterSource,
    /// 0-100
    pub confidence: f32,
}

/// Free-form hints reported by the cloud vision path.
#[derive(Debug, Clone, Serialize)]
pub struct ScanHints {
    pub location: Option<String>,
    pub machine: Option<String>,
    /// Code content the service claims to have seen (no polygon, so it is
    /// never promoted to a code reading)
    pub code: Option<String>,
}

/// Fused output of one completed scan cycle.
#[derive(Debug, Clone, Serialize)]
pub struct ScanResult {
    /// Unique per cycle
    pub scan_id: Uuid,
    /// Unix timestamp in milliseconds
    pub timestamp_ms: u64,
    /// Code reading from the local decoder, when one was found
    pub code: Option<CodeReading>,
    /// Fused counter value, when any source produced one
    pub counter: Option<CounterReading>,
    /// Cloud-reported hints, when the fallback ran and succeeded
    pub hints: Option<ScanHints>,
}

/// Outcome of an `on_frame` trigger.
///
/// "No result this cycle" is reported distinctly from a low-confidence
/// result - a caller must never mistake a declined trigger for a zero
/// reading.
#[derive(Debug)]
pub enum ScanOutcome {
    /// Cycle ran to completion and fused a result
    Completed(ScanResult),
    /// Cycle ran to completion and recognized nothing
    NothingRecognized,
    /// No cycle ran: the cooldown window is still open
    CooldownActive,
    /// No cycle ran: another cycle is already in flight
    CycleInFlight,
}

/// Counters exposed for the CLI summary line.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct ScanStats {
    pub cycles_completed: u64,
    pub cycles_suppressed: u64,
    pub observations_kept: u64,
    pub observations_dropped: u64,
}

/// Cycle phases, visible for diagnostics while a scan is in flight.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanPhase {
    Idle,
    Buffering,
    Decoding,
    Recognizing,
    Aggregating,
    Fused,
}

/// The scan orchestrator. One instance per logical scan target; internal
/// state is private to the instance and cycles are serialized, so no further
/// locking discipline is required of callers.
pub struct Scanner {
    settings: ScanSettings,
    regions: Vec<RegionDescriptor>,
    ring: Mutex<FrameRing>,
    ocr: OcrEngine,
    decoder: CodeDecoder,
    cloud: Option<CloudVision>,
    in_flight: AtomicBool,
    last_cycle: Mutex<Option<Instant>>,
    phase: Mutex<ScanPhase>,
    stats: Mutex<ScanStats>,
    subscribers: Mutex<Vec<Sender<ScanResult>>>,
}

/// Clears the in-flight flag however the cycle exits.
struct InFlightGuard<'a>(&'a AtomicBool);

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl Scanner {
    pub fn new(
        settings: ScanSettings,
        regions: Vec<RegionDescriptor>,
        ocr: OcrEngine,
        decoder: CodeDecoder,
        cloud: Option<CloudVision>,
    ) -> Result<Self, RingError> {
        let ring = FrameRing::new(settings.ring_capacity)?;
        Ok(Self {
            settings,
            regions,
            ring: Mutex::new(ring),
            ocr,
            decoder,
            cloud,
            in_flight: AtomicBool::new(false),
            last_cycle: Mutex::new(None),
            phase: Mutex::new(ScanPhase::Idle),
            stats: Mutex::new(ScanStats::default()),
            subscribers: Mutex::new(Vec::new()),
        })
    }

    /// Subscribe to fused results. Downstream consumers (notification,
    /// webhook submission, history storage) read these; the channel is the
    /// output boundary of this subsystem.
    pub fn subscribe(&self) -> Receiver<ScanResult> {
        let (tx, rx) = crossbeam_channel::unbounded();
        self.subscribers.lock().push(tx);
        rx
    }

    pub fn stats(&self) -> ScanStats {
        *self.stats.lock()
    }

    pub fn phase(&self) -> ScanPhase {
        *self.phase.lock()
    }

    /// Single entry point for the capture collaborator, invoked at its own
    /// cadence with each new frame.
    pub async fn on_frame(&self, frame: Frame) -> ScanOutcome {
        // A cycle already in flight ignores new frame-ready signals rather
        // than queuing unbounded work.
        if self.in_flight.swap(true, Ordering::Acquire) {
            debug!("trigger declined: cycle in flight");
            return ScanOutcome::CycleInFlight;
        }
        let _guard = InFlightGuard(&self.in_flight);

        // The cooldown is a monotonic gate, not a lock: decline immediately.
        if let Some(at) = *self.last_cycle.lock() {
            if at.elapsed() < Duration::from_millis(self.settings.cooldown_ms) {
                debug!("trigger declined: cooldown active");
                self.stats.lock().cycles_suppressed += 1;
                self.set_phase(ScanPhase::Idle);
                return ScanOutcome::CooldownActive;
            }
        }

        let started = Instant::now();
        let outcome = self.run_cycle(frame).await;

        *self.last_cycle.lock() = Some(Instant::now());
        self.stats.lock().cycles_completed += 1;
        self.set_phase(ScanPhase::Idle);
        debug!(elapsed = ?started.elapsed(), "scan cycle finished");

        outcome
    }

    async fn run_cycle(&self, frame: Frame) -> ScanOutcome {
        self.set_phase(ScanPhase::Buffering);
        let (frames, latest) = {
            let mut ring = self.ring.lock();
            ring.push(frame);
            (ring.snapshot(), ring.latest())
        };
        let Some(latest) = latest else {
            return ScanOutcome::NothingRecognized;
        };
        debug!(
            buffered = frames.len(),
            frame_age = ?latest.timestamp.elapsed(),
            "frame buffered"
        );

        self.set_phase(ScanPhase::Decoding);
        let code = self.decoder.decode(&latest);
        if let Some(reading) = &code {
            debug!(payload_len = reading.payload.len(), "code present in frame");
        }

        self.set_phase(ScanPhase::Recognizing);
        let observations = self.collect_observations(&frames);

        self.set_phase(ScanPhase::Aggregating);
        for obs in &observations {
            trace!(
                region = %obs.region,
                frame_index = obs.frame_index,
                value = obs.value,
                confidence = obs.confidence,
                raw = %obs.raw_text,
                "observation"
            );
        }
        let stable = aggregate(&observations, self.settings.stability_threshold);
        if let Some(s) = &stable {
            debug!(
                value = s.value,
                occurrences = s.occurrences,
                mean_confidence = s.mean_confidence,
                "stable value elected"
            );
        }

        // The cloud path is a rescue, not a second opinion: it only runs
        // when the local pipeline produced no counter at all.
        let local_counter_known =
            stable.is_some() || code.as_ref().is_some_and(|c| c.embedded_counter().is_some());
        let cloud = if !local_counter_known {
            self.try_cloud(&latest).await
        } else {
            None
        };

        self.set_phase(ScanPhase::Fused);
        let (counter, hints) = fuse(&code, &stable, cloud);

        if code.is_none() && counter.is_none() {
            debug!("cycle recognized nothing");
            return ScanOutcome::NothingRecognized;
        }

        let result = ScanResult {
            scan_id: Uuid::new_v4(),
            timestamp_ms: unix_millis(),
            code,
            counter,
            hints,
        };
        info!(
            scan_id = %result.scan_id,
            counter = ?result.counter.as_ref().map(|c| c.value),
            source = ?result.counter.as_ref().map(|c| c.source),
            "scan result fused"
        );

        self.publish(&result);
        ScanOutcome::Completed(result)
    }

    /// The O(regions x frames) hot path. Per-observation failures are
    /// isolated: a bad region or a recognizer hiccup costs one observation,
    /// never the batch.
    fn collect_observations(&self, frames: &[std::sync::Arc<Frame>]) -> Vec<Observation> {
        let mut observations = Vec::new();
        let mut kept = 0u64;
        let mut dropped = 0u64;

        'regions: for descriptor in &self.regions {
            for (frame_index, frame) in frames.iter().enumerate() {
                let crop = match region::extract(frame, descriptor) {
                    Ok(crop) => crop,
                    Err(e) => {
                        // Configuration bug: surface it, never clamp it away.
                        warn!(region = %descriptor.name, error = %e, "region extraction failed");
                        continue;
                    }
                };

                let recognition = match self.ocr.recognize(&crop) {
                    Ok(Some(raw)) => Some(raw),
                    Ok(None) if self.settings.grayscale_retry => {
                        // Secondary path: recognizers are frequently more
                        // robust on grayscale input.
                        match self.ocr.recognize(&region::to_grayscale(&crop)) {
                            Ok(raw) => raw,
                            Err(e) => {
                                warn!(region = %descriptor.name, error = %e, "grayscale retry failed");
                                None
                            }
                        }
                    }
                    Ok(None) => None,
                    Err(OcrError::NotReady) => {
                        // Not an error to the cycle: skip recognition
                        // entirely rather than blocking on initialization.
                        debug!("OCR engine not ready, skipping recognition");
                        break 'regions;
                    }
                    Err(e) => {
                        warn!(region = %descriptor.name, frame_index, error = %e, "recognizer failure");
                        None
                    }
                };

                let Some(raw) = recognition else {
                    continue;
                };

                match extract_value(&raw.text, &self.settings.bounds) {
                    Some(value) => {
                        kept += 1;
                        observations.push(Observation {
                            value,
                            confidence: raw.confidence,
                            region: descriptor.name.clone(),
                            frame_index,
                            raw_text: raw.text,
                        });
                    }
                    None => {
                        dropped += 1;
                        debug!(region = %descriptor.name, raw = %raw.text, "reading failed plausibility filter");
                    }
                }
            }
        }

        let mut stats = self.stats.lock();
        stats.observations_kept += kept;
        stats.observations_dropped += dropped;
        observations
    }

    async fn try_cloud(&self, frame: &Frame) -> Option<CloudReading> {
        let cloud = self.cloud.as_ref()?;
        if !cloud.is_enabled() {
            return None;
        }
        match cloud.analyze(frame).await {
            Ok(reading) => {
                debug!(counter = ?reading.counter, "cloud vision reading");
                Some(reading)
            }
            Err(e) => {
                // Non-fatal by contract: the local result stands on its own.
                warn!(error = %e, "cloud vision fallback failed");
                None
            }
        }
    }

    fn publish(&self, result: &ScanResult) {
        let mut subscribers = self.subscribers.lock();
        subscribers.retain(|tx| tx.send(result.clone()).is_ok());
    }

    fn set_phase(&self, phase: ScanPhase) {
        *self.phase.lock() = phase;
    }

    /// Stop scanning. Tears the OCR engine down (idempotent) and drops the
    /// buffered frames; in-flight recognition finishes on its own cycle.
    pub fn shutdown(&self) {
        self.ocr.terminate();
        self.ring.lock().clear();
        info!("scanner shut down");
    }
}

/// Fusion rule for competing counter readings.
///
/// A stable OCR value beats the code's embedded figure: the code caches a
/// counter that can be stale relative to the live display, while OCR reads
/// the display directly. The cloud reading only exists when neither local
/// source produced a counter, and ranks below both.
fn fuse(
    code: &Option<CodeReading>,
    stable: &Option<StableValue>,
    cloud: Option<CloudReading>,
) -> (Option<CounterReading>, Option<ScanHints>) {
    let counter = if let Some(stable) = stable {
        Some(CounterReading {
            value: stable.value,
            source: CounterSource::Ocr,
            confidence: stable.mean_confidence,
        })
    } else if let Some(embedded) = code.as_ref().and_then(CodeReading::embedded_counter) {
        Some(CounterReading {
            value: embedded,
            source: CounterSource::Code,
            confidence: 100.0,
        })
    } else {
        cloud.as_ref().and_then(|reading| {
            reading.counter.map(|value| CounterReading {
                value,
                source: CounterSource::Vision,
                confidence: reading.confidence.as_confidence(),
            })
        })
    };

    let hints = cloud.map(|reading| ScanHints {
        location: reading.location,
        machine: reading.machine,
        code: reading.code,
    });

    (counter, hints)
}

fn unix_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cloud::ConfidenceTier;
    use crate::decode::DecodeAttempt;
    use crate::vision::{OcrProfile, RawRecognition, TextRecognizer};

    struct FakeRecognizer {
        replies: Mutex<Vec<Option<(String, f32)>>>,
        fallback: Option<(String, f32)>,
    }

    impl FakeRecognizer {
        /// Always recognizes `text` at `confidence`.
        fn steady(text: &str, confidence: f32) -> Box<Self> {
            Box::new(Self {
                replies: Mutex::new(Vec::new()),
                fallback: Some((text.to_string(), confidence)),
            })
        }

        /// Pops canned replies per call (first element first), then falls
        /// back to nothing.
        fn scripted(replies: Vec<Option<(&str, f32)>>) -> Box<Self> {
            Box::new(Self {
                replies: Mutex::new(
                    replies
                        .into_iter()
                        .rev()
                        .map(|r| r.map(|(t, c)| (t.to_string(), c)))
                        .collect(),
                ),
                fallback: None,
            })
        }
    }

    impl TextRecognizer for FakeRecognizer {
        fn name(&self) -> &str {
            "fake"
        }

        fn configure(&mut self, _profile: &OcrProfile) -> Result<(), OcrError> {
            Ok(())
        }

        fn recognize(
            &self,
            _data: &[u8],
            _width: u32,
            _height: u32,
        ) -> Result<Option<RawRecognition>, OcrError> {
            let reply = match self.replies.lock().pop() {
                Some(scripted) => scripted,
                None => self.fallback.clone(),
            };
            Ok(reply.map(|(text, confidence)| RawRecognition { text, confidence }))
        }
    }

    fn full_frame_region() -> Vec<RegionDescriptor> {
        vec![RegionDescriptor {
            name: "counter-main".to_string(),
            x: 0.0,
            y: 0.0,
            width: 1.0,
            height: 1.0,
        }]
    }

    fn dark_frame() -> Frame {
        Frame::new(vec![10u8; 64 * 64 * 4], 64, 64).unwrap()
    }

    async fn scanner_with(
        recognizer: Box<dyn TextRecognizer>,
        settings: ScanSettings,
        regions: Vec<RegionDescriptor>,
    ) -> Scanner {
        let ocr = OcrEngine::new();
        ocr.initialize(recognizer, OcrProfile::default())
            .await
            .unwrap();
        Scanner::new(settings, regions, ocr, CodeDecoder::direct(), None).unwrap()
    }

    fn no_cooldown() -> ScanSettings {
        ScanSettings {
            cooldown_ms: 0,
            ..ScanSettings::default()
        }
    }

    fn code_reading(payload: &str) -> CodeReading {
        CodeReading {
            payload: payload.to_string(),
            polygon: vec![(0.0, 0.0), (10.0, 0.0), (10.0, 10.0), (0.0, 10.0)],
            attempt: DecodeAttempt::Direct,
        }
    }

    fn stable(value: u64, mean_confidence: f32) -> StableValue {
        StableValue {
            value,
            occurrences: 2,
            mean_confidence,
        }
    }

    #[test]
    fn test_fuse_prefers_stable_ocr_over_code() {
        let code = Some(code_reading(r#"{"counter":500000}"#));
        let (counter, _) = fuse(&code, &Some(stable(963373, 70.0)), None);
        let counter = counter.unwrap();
        assert_eq!(counter.value, 963373);
        assert_eq!(counter.source, CounterSource::Ocr);
    }

    #[test]
    fn test_fuse_falls_back_to_embedded_code_counter() {
        let code = Some(code_reading(r#"{"counter":500000}"#));
        let (counter, _) = fuse(&code, &None, None);
        let counter = counter.unwrap();
        assert_eq!(counter.value, 500000);
        assert_eq!(counter.source, CounterSource::Code);
        assert!((counter.confidence - 100.0).abs() < 0.01);
    }

    #[test]
    fn test_fuse_vision_as_last_resort() {
        let cloud = CloudReading {
            code: Some("MACHINE-12".to_string()),
            counter: Some(424242),
            location: Some("basement".to_string()),
            machine: None,
            confidence: ConfidenceTier::Medium,
        };
        let (counter, hints) = fuse(&None, &None, Some(cloud));
        let counter = counter.unwrap();
        assert_eq!(counter.value, 424242);
        assert_eq!(counter.source, CounterSource::Vision);
        assert!((counter.confidence - 60.0).abs() < 0.01);
        let hints = hints.unwrap();
        assert_eq!(hints.location.as_deref(), Some("basement"));
        assert_eq!(hints.code.as_deref(), Some("MACHINE-12"));
    }

    #[test]
    fn test_fuse_nothing() {
        let (counter, hints) = fuse(&None, &None, None);
        assert!(counter.is_none());
        assert!(hints.is_none());
    }

    #[tokio::test]
    async fn test_stable_value_after_two_frames() {
        let scanner = scanner_with(
            FakeRecognizer::steady("963373", 80.0),
            no_cooldown(),
            full_frame_region(),
        )
        .await;

        // One buffered frame -> a single observation -> below threshold
        assert!(matches!(
            scanner.on_frame(dark_frame()).await,
            ScanOutcome::NothingRecognized
        ));

        // Two buffered frames -> two agreeing observations -> stable
        match scanner.on_frame(dark_frame()).await {
            ScanOutcome::Completed(result) => {
                let counter = result.counter.unwrap();
                assert_eq!(counter.value, 963373);
                assert_eq!(counter.source, CounterSource::Ocr);
                assert!(result.code.is_none());
            }
            other => panic!("expected completed cycle, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_cooldown_suppresses_second_trigger() {
        let settings = ScanSettings {
            cooldown_ms: 60_000,
            ..ScanSettings::default()
        };
        let scanner = scanner_with(
            FakeRecognizer::steady("963373", 80.0),
            settings,
            full_frame_region(),
        )
        .await;

        assert!(matches!(
            scanner.on_frame(dark_frame()).await,
            ScanOutcome::NothingRecognized
        ));
        assert!(matches!(
            scanner.on_frame(dark_frame()).await,
            ScanOutcome::CooldownActive
        ));

        let stats = scanner.stats();
        assert_eq!(stats.cycles_completed, 1);
        assert_eq!(stats.cycles_suppressed, 1);
    }

    #[tokio::test]
    async fn test_not_ready_engine_skips_recognition() {
        let scanner = Scanner::new(
            no_cooldown(),
            full_frame_region(),
            OcrEngine::new(),
            CodeDecoder::direct(),
            None,
        )
        .unwrap();

        // Uninitialized engine: the cycle completes without observations
        assert!(matches!(
            scanner.on_frame(dark_frame()).await,
            ScanOutcome::NothingRecognized
        ));
        assert_eq!(scanner.stats().observations_kept, 0);
    }

    #[tokio::test]
    async fn test_grayscale_retry_recovers_observation() {
        let settings = ScanSettings {
            cooldown_ms: 0,
            stability_threshold: 1,
            ..ScanSettings::default()
        };
        // Direct read finds nothing, grayscale retry succeeds
        let scanner = scanner_with(
            FakeRecognizer::scripted(vec![None, Some(("4242", 65.0))]),
            settings,
            full_frame_region(),
        )
        .await;

        match scanner.on_frame(dark_frame()).await {
            ScanOutcome::Completed(result) => {
                assert_eq!(result.counter.unwrap().value, 4242);
            }
            other => panic!("expected completed cycle, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_invalid_region_is_isolated() {
        let mut regions = full_frame_region();
        regions.push(RegionDescriptor {
            name: "misconfigured".to_string(),
            x: 0.9,
            y: 0.0,
            width: 0.5,
            height: 0.5,
        });
        let scanner = scanner_with(
            FakeRecognizer::steady("500123", 75.0),
            no_cooldown(),
            regions,
        )
        .await;

        scanner.on_frame(dark_frame()).await;
        match scanner.on_frame(dark_frame()).await {
            ScanOutcome::Completed(result) => {
                // The bad region contributed nothing; the good one still won
                assert_eq!(result.counter.unwrap().value, 500123);
            }
            other => panic!("expected completed cycle, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_implausible_readings_dropped() {
        // A stray single digit never reaches the stability group
        let scanner = scanner_with(
            FakeRecognizer::steady("7", 99.0),
            no_cooldown(),
            full_frame_region(),
        )
        .await;

        scanner.on_frame(dark_frame()).await;
        assert!(matches!(
            scanner.on_frame(dark_frame()).await,
            ScanOutcome::NothingRecognized
        ));
        assert_eq!(scanner.stats().observations_kept, 0);
        assert!(scanner.stats().observations_dropped > 0);
    }

    #[tokio::test]
    async fn test_subscriber_receives_fused_result() {
        let scanner = scanner_with(
            FakeRecognizer::steady("963373", 80.0),
            no_cooldown(),
            full_frame_region(),
        )
        .await;
        let results = scanner.subscribe();

        scanner.on_frame(dark_frame()).await;
        scanner.on_frame(dark_frame()).await;

        let result = results.try_recv().unwrap();
        assert_eq!(result.counter.unwrap().value, 963373);
        assert!(results.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_shutdown_is_idempotent() {
        let scanner = scanner_with(
            FakeRecognizer::steady("963373", 80.0),
            no_cooldown(),
            full_frame_region(),
        )
        .await;

        scanner.shutdown();
        scanner.shutdown();
        // The engine is gone but the cycle still completes cleanly
        assert!(matches!(
            scanner.on_frame(dark_frame()).await,
            ScanOutcome::NothingRecognized
        ));
    }

    #[tokio::test]
    async fn test_phase_returns_to_idle() {
        let scanner = scanner_with(
            FakeRecognizer::steady("963373", 80.0),
            no_cooldown(),
            full_frame_region(),
        )
        .await;

        assert_eq!(scanner.phase(), ScanPhase::Idle);
        scanner.on_frame(dark_frame()).await;
        assert_eq!(scanner.phase(), ScanPhase::Idle);
    }

    #[tokio::test]
    async fn test_scan_ids_are_unique() {
        let scanner = scanner_with(
            FakeRecognizer::steady("963373", 80.0),
            no_cooldown(),
            full_frame_region(),
        )
        .await;

        scanner.on_frame(dark_frame()).await;
        let first = match scanner.on_frame(dark_frame()).await {
            ScanOutcome::Completed(r) => r.scan_id,
            other => panic!("expected completed cycle, got {other:?}"),
        };
        let second = match scanner.on_frame(dark_frame()).await {
            ScanOutcome::Completed(r) => r.scan_id,
            other => panic!("expected completed cycle, got {other:?}"),
        };
        assert_ne!(first, second);
    }
}
