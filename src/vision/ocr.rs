//! Stateful OCR engine adapter
//!
//! One configured engine instance is constructed by the orchestrator and
//! reused across every recognize call to avoid reinitialization cost.
//! Initialization is asynchronous; until it completes, `recognize` reports
//! `NotReady` so callers can skip the observation instead of blocking.

use std::sync::Arc;

use image::RgbaImage;
use parking_lot::RwLock;
use tracing::{debug, info};

use crate::region::CroppedRegion;

use super::{OcrError, OcrProfile, RawRecognition, TextRecognizer};

enum EngineState {
    Idle,
    Initializing,
    Ready {
        recognizer: Box<dyn TextRecognizer>,
        profile: OcrProfile,
    },
    Terminated,
}

/// Adapter owning one recognizer instance and its applied profile.
///
/// Cheap to clone; clones share the underlying engine state.
#[derive(Clone)]
pub struct OcrEngine {
    state: Arc<RwLock<EngineState>>,
}

impl Default for OcrEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl OcrEngine {
    pub fn new() -> Self {
        Self {
            state: Arc::new(RwLock::new(EngineState::Idle)),
        }
    }

    /// Configure `recognizer` with `profile` and install it.
    ///
    /// Engine setup can be slow (model loads, worker spawns), so it runs on
    /// the blocking pool. A profile change later means calling `terminate`
    /// and initializing again - there are no per-call overrides.
    pub async fn initialize(
        &self,
        mut recognizer: Box<dyn TextRecognizer>,
        profile: OcrProfile,
    ) -> Result<(), OcrError> {
        {
            let mut state = self.state.write();
            if matches!(*state, EngineState::Initializing) {
                return Err(OcrError::Init("initialization already in progress".into()));
            }
            *state = EngineState::Initializing;
        }

        let applied = profile.clone();
        let result = tokio::task::spawn_blocking(move || {
            recognizer.configure(&applied).map(|()| recognizer)
        })
        .await
        .map_err(|e| OcrError::Init(e.to_string()));

        let mut state = self.state.write();
        match result {
            Ok(Ok(recognizer)) => {
                info!(engine = recognizer.name(), profile = %profile.name, "OCR engine ready");
                *state = EngineState::Ready {
                    recognizer,
                    profile,
                };
                Ok(())
            }
            Ok(Err(e)) | Err(e) => {
                *state = EngineState::Idle;
                Err(e)
            }
        }
    }

    /// Whether `recognize` can currently be called.
    pub fn is_ready(&self) -> bool {
        matches!(*self.state.read(), EngineState::Ready { .. })
    }

    /// Recognize text in a cropped region.
    ///
    /// Small crops are upscaled first; segment displays photographed from a
    /// distance often land well under the size recognizers are reliable at.
    pub fn recognize(&self, region: &CroppedRegion) -> Result<Option<RawRecognition>, OcrError> {
        let state = self.state.read();
        let EngineState::Ready {
            recognizer,
            profile,
        } = &*state
        else {
            return Err(OcrError::NotReady);
        };

        let scale = upscale_factor(region.width, region.height, profile.min_recognition_px);
        let recognition = if scale > 1 {
            debug!(
                width = region.width,
                height = region.height,
                scale,
                "auto-upscaling small crop"
            );
            let scaled = upscale(region, scale)
                .ok_or_else(|| OcrError::Engine("crop buffer does not match dimensions".into()))?;
            recognizer.recognize(&scaled.data, scaled.width, scaled.height)?
        } else {
            recognizer.recognize(&region.data, region.width, region.height)?
        };

        Ok(recognition.and_then(|raw| apply_whitelist(raw, &profile.whitelist)))
    }

    /// Tear the engine down. Idempotent: safe to call repeatedly and safe
    /// when no recognition is in progress or the engine was never
    /// initialized. `is_ready` is false afterwards.
    pub fn terminate(&self) {
        let mut state = self.state.write();
        if matches!(*state, EngineState::Ready { .. }) {
            info!("OCR engine terminated");
        }
        *state = EngineState::Terminated;
    }
}

/// Integer upscale factor bringing both dimensions to at least `min_px`,
/// capped at 4x.
fn upscale_factor(width: u32, height: u32, min_px: u32) -> u32 {
    if min_px == 0 || (width >= min_px && height >= min_px) {
        return 1;
    }
    let w_scale = min_px.div_ceil(width.max(1));
    let h_scale = min_px.div_ceil(height.max(1));
    w_scale.max(h_scale).clamp(2, 4)
}

fn upscale(region: &CroppedRegion, scale: u32) -> Option<CroppedRegion> {
    let img = RgbaImage::from_raw(region.width, region.height, region.data.clone())?;
    let scaled = image::imageops::resize(
        &img,
        region.width * scale,
        region.height * scale,
        image::imageops::FilterType::Triangle,
    );
    Some(CroppedRegion {
        width: scaled.width(),
        height: scaled.height(),
        data: scaled.into_raw(),
    })
}

/// Strip characters outside the profile whitelist. An empty whitelist means
/// pass-through. A reading reduced to nothing becomes no-signal.
fn apply_whitelist(raw: RawRecognition, whitelist: &str) -> Option<RawRecognition> {
    if whitelist.is_empty() {
        return Some(raw);
    }
    let text: String = raw.text.chars().filter(|c| whitelist.contains(*c)).collect();
    if text.is_empty() {
        return None;
    }
    Some(RawRecognition {
        text,
        confidence: raw.confidence,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Deterministic recognizer used to exercise the adapter contract.
    struct FakeRecognizer {
        reply: Option<RawRecognition>,
        fail: bool,
    }

    impl FakeRecognizer {
        fn saying(text: &str, confidence: f32) -> Box<Self> {
            Box::new(Self {
                reply: Some(RawRecognition {
                    text: text.to_string(),
                    confidence,
                }),
                fail: false,
            })
        }

        fn failing() -> Box<Self> {
            Box::new(Self {
                reply: None,
                fail: true,
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
            if self.fail {
                return Err(OcrError::Engine("synthetic failure".into()));
            }
            Ok(self.reply.clone())
        }
    }

    fn crop(width: u32, height: u32) -> CroppedRegion {
        CroppedRegion {
            data: vec![0u8; (width * height * 4) as usize],
            width,
            height,
        }
    }

    #[tokio::test]
    async fn test_recognize_before_init_is_not_ready() {
        let engine = OcrEngine::new();
        assert!(!engine.is_ready());
        assert!(matches!(
            engine.recognize(&crop(100, 100)),
            Err(OcrError::NotReady)
        ));
    }

    #[tokio::test]
    async fn test_initialize_then_recognize() {
        let engine = OcrEngine::new();
        engine
            .initialize(FakeRecognizer::saying("963373", 88.0), OcrProfile::default())
            .await
            .unwrap();
        assert!(engine.is_ready());
        let raw = engine.recognize(&crop(100, 100)).unwrap().unwrap();
        assert_eq!(raw.text, "963373");
        assert!((raw.confidence - 88.0).abs() < 0.01);
    }

    #[tokio::test]
    async fn test_whitelist_strips_non_digits() {
        let engine = OcrEngine::new();
        engine
            .initialize(
                FakeRecognizer::saying("kWh 963373", 70.0),
                OcrProfile::default(),
            )
            .await
            .unwrap();
        let raw = engine.recognize(&crop(100, 100)).unwrap().unwrap();
        assert_eq!(raw.text, "963373");
    }

    #[tokio::test]
    async fn test_whitelist_only_noise_becomes_no_signal() {
        let engine = OcrEngine::new();
        engine
            .initialize(FakeRecognizer::saying("kWh", 70.0), OcrProfile::default())
            .await
            .unwrap();
        assert!(engine.recognize(&crop(100, 100)).unwrap().is_none());
    }

    #[tokio::test]
    async fn test_engine_failure_propagates() {
        let engine = OcrEngine::new();
        engine
            .initialize(FakeRecognizer::failing(), OcrProfile::default())
            .await
            .unwrap();
        assert!(matches!(
            engine.recognize(&crop(100, 100)),
            Err(OcrError::Engine(_))
        ));
    }

    #[tokio::test]
    async fn test_terminate_is_idempotent() {
        let engine = OcrEngine::new();
        engine
            .initialize(FakeRecognizer::saying("1", 50.0), OcrProfile::default())
            .await
            .unwrap();
        engine.terminate();
        assert!(!engine.is_ready());
        engine.terminate();
        assert!(!engine.is_ready());
        assert!(matches!(
            engine.recognize(&crop(100, 100)),
            Err(OcrError::NotReady)
        ));
    }

    #[tokio::test]
    async fn test_terminate_without_init_is_safe() {
        let engine = OcrEngine::new();
        engine.terminate();
        engine.terminate();
        assert!(!engine.is_ready());
    }

    #[test]
    fn test_upscale_factor() {
        assert_eq!(upscale_factor(200, 100, 80), 1);
        assert_eq!(upscale_factor(100, 40, 80), 2);
        assert_eq!(upscale_factor(30, 30, 80), 3);
        // Capped at 4 even for tiny crops
        assert_eq!(upscale_factor(5, 5, 80), 4);
        assert_eq!(upscale_factor(100, 100, 0), 1);
    }

    #[test]
    fn test_upscale_doubles_dimensions() {
        let scaled = upscale(&crop(10, 6), 2).unwrap();
        assert_eq!((scaled.width, scaled.height), (20, 12));
        assert_eq!(scaled.data.len(), 20 * 12 * 4);
    }
}
