//! Detection Orchestrator
//!
//! Per-request control flow: validate → decode → estimate → select → check → persist.
//! Each stage maps its own error to exactly one [`DetectionOutcome`]; there
//! are no retries. Decoding, estimation and the store write are blocking and
//! run on tokio's blocking pool so a slow image cannot stall other requests.

use std::sync::Arc;
use std::time::Duration;

use tracing::{error, info};

use super::outcome::{DetectionOutcome, FailureReason, RejectionReason};
use crate::decoder::ImageDecoder;
use crate::estimator::EstimatorHandle;
use crate::storage::DetectionStore;
use crate::types::{DetectionRecord, DetectionRequest, PixelBuffer};

/// Request pipeline with its collaborators injected at construction.
pub struct DetectionOrchestrator {
    decoder: Arc<dyn ImageDecoder>,
    estimator: EstimatorHandle,
    store: Arc<dyn DetectionStore>,
    request_timeout: Option<Duration>,
}

impl DetectionOrchestrator {
    pub fn new(
        decoder: Arc<dyn ImageDecoder>,
        estimator: EstimatorHandle,
        store: Arc<dyn DetectionStore>,
    ) -> Self {
        Self {
            decoder,
            estimator,
            store,
            request_timeout: None,
        }
    }

    /// Bound decoding and estimation per request. `None` lets requests run
    /// to completion.
    pub fn with_request_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Process one request to a terminal outcome.
    ///
    /// The request timeout covers decoding and estimation only. Once the
    /// store write has started it is always awaited, so a request reported
    /// as failed never leaves a record behind.
    pub async fn process(&self, request: DetectionRequest) -> DetectionOutcome {
        let analysed = match self.request_timeout {
            None => self.analyse(request).await,
            Some(limit) => match tokio::time::timeout(limit, self.analyse(request)).await {
                Ok(analysed) => analysed,
                Err(_) => {
                    error!(timeout_secs = limit.as_secs_f64(), "Detection request timed out");
                    return DetectionOutcome::failed(FailureReason::TimedOut);
                }
            },
        };

        match analysed {
            Ok(detection) => self.persist(detection).await,
            Err(outcome) => outcome,
        }
    }

    /// Validate, decode, estimate and select the primary pose.
    async fn analyse(&self, request: DetectionRequest) -> Result<Detection, DetectionOutcome> {
        let Some(image_bytes) = request.image_bytes.filter(|b| !b.is_empty()) else {
            info!("Rejected detection request: no image");
            return Err(DetectionOutcome::rejected(RejectionReason::MissingImage));
        };
        let Some(file_path) = request.file_path else {
            info!("Rejected detection request: no filePath");
            return Err(DetectionOutcome::rejected(RejectionReason::MissingFilePath));
        };

        // Decode
        let decoder = Arc::clone(&self.decoder);
        let decoded = tokio::task::spawn_blocking(move || decoder.decode(&image_bytes)).await;
        let pixels: PixelBuffer = match decoded {
            Ok(Ok(pixels)) => pixels,
            Ok(Err(e)) => {
                error!(error = %e, image_path = %file_path, "Image decode failed");
                return Err(DetectionOutcome::failed(FailureReason::DecodeFailed));
            }
            Err(e) => {
                error!(error = %e, image_path = %file_path, "Image decode worker panicked");
                return Err(DetectionOutcome::failed(FailureReason::DecodeFailed));
            }
        };
        let (width, height) = (pixels.width(), pixels.height());

        // Estimate; the pixel buffer is dropped inside the worker
        let estimator = Arc::clone(&self.estimator);
        let estimated = tokio::task::spawn_blocking(move || estimator.estimate(&pixels)).await;
        let poses = match estimated {
            Ok(Ok(poses)) => poses,
            Ok(Err(e)) => {
                error!(error = %e, image_path = %file_path, width, height, "Pose estimation failed");
                return Err(DetectionOutcome::failed(FailureReason::EstimationFailed));
            }
            Err(e) => {
                error!(error = %e, image_path = %file_path, "Pose estimation worker panicked");
                return Err(DetectionOutcome::failed(FailureReason::EstimationFailed));
            }
        };

        // Select the primary pose
        let candidates = poses.len();
        let Some(primary) = poses.into_iter().next() else {
            info!(image_path = %file_path, width, height, "No pose detected");
            return Err(DetectionOutcome::rejected(RejectionReason::NoPoseDetected));
        };

        let expected = self.estimator.keypoint_count();
        if primary.keypoints.is_empty() || primary.keypoints.len() != expected {
            error!(
                image_path = %file_path,
                keypoints = primary.keypoints.len(),
                expected,
                estimator = self.estimator.name(),
                "Estimator returned a pose with the wrong number of keypoints"
            );
            return Err(DetectionOutcome::failed(FailureReason::EstimationFailed));
        }

        Ok(Detection {
            record: DetectionRecord::new(file_path, primary.keypoints),
            candidates,
        })
    }

    /// Save the record and report the final outcome.
    async fn persist(&self, detection: Detection) -> DetectionOutcome {
        let Detection { record, candidates } = detection;
        let store = Arc::clone(&self.store);
        let saved = tokio::task::spawn_blocking(move || {
            let result = store.save(&record);
            (record, result)
        })
        .await;

        match saved {
            Ok((record, Ok(document_id))) => {
                info!(
                    document_id = %document_id,
                    image_path = %record.image_path,
                    keypoints = record.keypoints.len(),
                    candidates,
                    backend = self.store.backend_name(),
                    "Saved pose detection"
                );
                DetectionOutcome::Success {
                    document_id,
                    image_path: record.image_path,
                    keypoints: record.keypoints,
                }
            }
            Ok((record, Err(e))) => {
                error!(error = %e, image_path = %record.image_path, "Failed to persist detection");
                DetectionOutcome::failed(FailureReason::PersistenceFailed)
            }
            Err(e) => {
                error!(error = %e, "Persistence worker panicked");
                DetectionOutcome::failed(FailureReason::PersistenceFailed)
            }
        }
    }
}

/// A validated detection waiting to be stored.
struct Detection {
    record: DetectionRecord,
    /// Poses the estimator returned before selection
    candidates: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decoder::DecodeError;
    use crate::estimator::{EstimationError, PoseEstimator};
    use crate::storage::{InMemoryDetectionStore, PersistenceError};
    use crate::types::{DocumentId, Keypoint, Pose};
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Treats the bytes as a 1-pixel-high strip; `b"bad"` fails.
    #[derive(Default)]
    struct StripDecoder {
        calls: AtomicUsize,
    }

    impl ImageDecoder for StripDecoder {
        fn decode(&self, bytes: &[u8]) -> Result<PixelBuffer, DecodeError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if bytes == b"bad" {
                return Err(DecodeError::Unsupported);
            }
            let data = bytes.iter().flat_map(|b| [*b, *b, *b, 255]).collect();
            PixelBuffer::from_rgba(bytes.len() as u32, 1, data).ok_or(DecodeError::Empty)
        }
    }

    /// Two candidates per image, keypoints echo the image size; none when the
    /// first pixel is black.
    #[derive(Default)]
    struct EchoEstimator {
        calls: AtomicUsize,
        fail: bool,
    }

    impl PoseEstimator for EchoEstimator {
        fn estimate(&self, image: &PixelBuffer) -> Result<Vec<Pose>, EstimationError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(EstimationError::Inference("boom".to_string()));
            }
            if image.pixel(0, 0).map_or(true, |px| px[0] == 0) {
                return Ok(Vec::new());
            }
            let kp = Keypoint::new("nose", image.width() as f32, image.height() as f32, 0.9);
            Ok(vec![
                Pose::new(vec![kp; 3]),
                Pose::new(vec![Keypoint::new("nose", -1.0, -1.0, 0.1)]),
            ])
        }

        fn keypoint_count(&self) -> usize {
            3
        }

        fn name(&self) -> &'static str {
            "echo"
        }
    }

    struct BrokenStore;

    impl DetectionStore for BrokenStore {
        fn save(&self, _record: &DetectionRecord) -> Result<DocumentId, PersistenceError> {
            Err(PersistenceError::Storage("disk full".to_string()))
        }

        fn backend_name(&self) -> &'static str {
            "Broken"
        }
    }

    struct Harness {
        decoder: Arc<StripDecoder>,
        estimator: Arc<EchoEstimator>,
        store: Arc<InMemoryDetectionStore>,
        orchestrator: DetectionOrchestrator,
    }

    fn harness(estimator: EchoEstimator) -> Harness {
        let decoder = Arc::new(StripDecoder::default());
        let estimator = Arc::new(estimator);
        let store = Arc::new(InMemoryDetectionStore::new());
        let orchestrator = DetectionOrchestrator::new(
            decoder.clone(),
            estimator.clone(),
            store.clone(),
        );
        Harness {
            decoder,
            estimator,
            store,
            orchestrator,
        }
    }

    #[tokio::test]
    async fn test_success_uses_first_pose_and_persists() {
        let h = harness(EchoEstimator::default());
        let outcome = h
            .orchestrator
            .process(DetectionRequest::new(vec![9u8, 9, 9, 9], "shots/a.png"))
            .await;

        let (document_id, image_path, keypoints) = match outcome {
            DetectionOutcome::Success {
                document_id,
                image_path,
                keypoints,
            } => (document_id, image_path, keypoints),
            other => panic!("expected success, got {other:?}"),
        };
        assert_eq!(image_path, "shots/a.png");
        assert_eq!(keypoints.len(), 3);
        assert_eq!(keypoints[0].x, 4.0);

        let stored = h.store.get(&document_id).unwrap().unwrap();
        assert_eq!(stored.image_path, "shots/a.png");
        assert_eq!(stored.keypoints, keypoints);
    }

    #[tokio::test]
    async fn test_missing_file_path_does_no_work() {
        let h = harness(EchoEstimator::default());
        let request = DetectionRequest {
            image_bytes: Some(vec![9u8; 4].into()),
            file_path: None,
        };

        let outcome = h.orchestrator.process(request).await;
        assert_eq!(outcome, DetectionOutcome::rejected(RejectionReason::MissingFilePath));
        assert_eq!(h.decoder.calls.load(Ordering::SeqCst), 0);
        assert_eq!(h.estimator.calls.load(Ordering::SeqCst), 0);
        assert_eq!(h.store.count(), 0);
    }

    #[tokio::test]
    async fn test_missing_or_empty_image() {
        let h = harness(EchoEstimator::default());
        for image_bytes in [None, Some(Vec::<u8>::new().into())] {
            let request = DetectionRequest {
                image_bytes,
                file_path: Some("x.png".to_string()),
            };
            let outcome = h.orchestrator.process(request).await;
            assert_eq!(outcome, DetectionOutcome::rejected(RejectionReason::MissingImage));
        }
        assert_eq!(h.decoder.calls.load(Ordering::SeqCst), 0);
        assert_eq!(h.store.count(), 0);
    }

    #[tokio::test]
    async fn test_both_missing_reports_image_first() {
        let h = harness(EchoEstimator::default());
        let outcome = h.orchestrator.process(DetectionRequest::default()).await;
        assert_eq!(outcome, DetectionOutcome::rejected(RejectionReason::MissingImage));
    }

    #[tokio::test]
    async fn test_no_pose_is_rejection_not_failure() {
        let h = harness(EchoEstimator::default());
        let outcome = h
            .orchestrator
            .process(DetectionRequest::new(vec![0u8, 5, 5], "empty-room.png"))
            .await;

        assert_eq!(outcome, DetectionOutcome::rejected(RejectionReason::NoPoseDetected));
        assert_eq!(h.estimator.calls.load(Ordering::SeqCst), 1);
        assert_eq!(h.store.count(), 0);
    }

    #[tokio::test]
    async fn test_decode_failure() {
        let h = harness(EchoEstimator::default());
        let outcome = h
            .orchestrator
            .process(DetectionRequest::new(b"bad".to_vec(), "notes.png"))
            .await;

        assert_eq!(outcome, DetectionOutcome::failed(FailureReason::DecodeFailed));
        assert_eq!(h.estimator.calls.load(Ordering::SeqCst), 0);
        assert_eq!(h.store.count(), 0);
    }

    #[tokio::test]
    async fn test_estimation_failure() {
        let h = harness(EchoEstimator {
            fail: true,
            ..EchoEstimator::default()
        });
        let outcome = h
            .orchestrator
            .process(DetectionRequest::new(vec![7u8; 2], "a.png"))
            .await;

        assert_eq!(outcome, DetectionOutcome::failed(FailureReason::EstimationFailed));
        assert_eq!(h.store.count(), 0);
    }

    #[tokio::test]
    async fn test_persistence_failure_returns_no_keypoints() {
        let orchestrator = DetectionOrchestrator::new(
            Arc::new(StripDecoder::default()),
            Arc::new(EchoEstimator::default()),
            Arc::new(BrokenStore),
        );
        let outcome = orchestrator
            .process(DetectionRequest::new(vec![7u8; 2], "a.png"))
            .await;

        assert_eq!(outcome, DetectionOutcome::failed(FailureReason::PersistenceFailed));
    }

    #[tokio::test]
    async fn test_empty_file_path_passes_through() {
        let h = harness(EchoEstimator::default());
        let outcome = h
            .orchestrator
            .process(DetectionRequest::new(vec![7u8; 2], ""))
            .await;

        let DetectionOutcome::Success { image_path, .. } = outcome else {
            panic!("expected success");
        };
        assert_eq!(image_path, "");
    }

    #[tokio::test]
    async fn test_timeout() {
        struct SlowDecoder;
        impl ImageDecoder for SlowDecoder {
            fn decode(&self, _bytes: &[u8]) -> Result<PixelBuffer, DecodeError> {
                std::thread::sleep(Duration::from_millis(200));
                Err(DecodeError::Empty)
            }
        }

        let orchestrator = DetectionOrchestrator::new(
            Arc::new(SlowDecoder),
            Arc::new(EchoEstimator::default()),
            Arc::new(InMemoryDetectionStore::new()),
        )
        .with_request_timeout(Some(Duration::from_millis(10)));

        let outcome = orchestrator
            .process(DetectionRequest::new(vec![1u8], "slow.png"))
            .await;
        assert_eq!(outcome, DetectionOutcome::failed(FailureReason::TimedOut));
    }

    /// Reports `declared` keypoints but returns poses with `returned`.
    struct MiscountingEstimator {
        returned: usize,
        declared: usize,
    }

    impl PoseEstimator for MiscountingEstimator {
        fn estimate(&self, _image: &PixelBuffer) -> Result<Vec<Pose>, EstimationError> {
            let kp = Keypoint::new("nose", 1.0, 1.0, 0.9);
            Ok(vec![Pose::new(vec![kp; self.returned])])
        }

        fn keypoint_count(&self) -> usize {
            self.declared
        }

        fn name(&self) -> &'static str {
            "miscounting"
        }
    }

    #[tokio::test]
    async fn test_pose_with_wrong_keypoint_count_is_not_saved() {
        for (returned, declared) in [(0, 17), (16, 17), (18, 17), (0, 0)] {
            let store = Arc::new(InMemoryDetectionStore::new());
            let orchestrator = DetectionOrchestrator::new(
                Arc::new(StripDecoder::default()),
                Arc::new(MiscountingEstimator { returned, declared }),
                store.clone(),
            );
            let outcome = orchestrator
                .process(DetectionRequest::new(vec![7u8; 2], "a.png"))
                .await;

            assert_eq!(
                outcome,
                DetectionOutcome::failed(FailureReason::EstimationFailed),
                "returned {returned}, declared {declared}"
            );
            assert_eq!(store.count(), 0);
        }
    }

    /// Delegates to an in-memory store after a delay.
    struct SlowStore {
        inner: Arc<InMemoryDetectionStore>,
        delay: Duration,
    }

    impl DetectionStore for SlowStore {
        fn save(&self, record: &DetectionRecord) -> Result<DocumentId, PersistenceError> {
            std::thread::sleep(self.delay);
            self.inner.save(record)
        }

        fn backend_name(&self) -> &'static str {
            "Slow"
        }
    }

    #[tokio::test]
    async fn test_slow_save_is_awaited_past_timeout() {
        let inner = Arc::new(InMemoryDetectionStore::new());
        let orchestrator = DetectionOrchestrator::new(
            Arc::new(StripDecoder::default()),
            Arc::new(EchoEstimator::default()),
            Arc::new(SlowStore {
                inner: inner.clone(),
                delay: Duration::from_millis(300),
            }),
        )
        .with_request_timeout(Some(Duration::from_millis(100)));

        let outcome = orchestrator
            .process(DetectionRequest::new(vec![7u8; 2], "slow-save.png"))
            .await;

        let document_id = match outcome {
            DetectionOutcome::Success { document_id, .. } => document_id,
            other => panic!("expected success, got {other:?}"),
        };
        assert_eq!(inner.count(), 1);
        assert!(inner.get(&document_id).unwrap().is_some());
    }

    #[tokio::test]
    async fn test_timed_out_request_leaves_no_record() {
        struct SlowEstimator;
        impl PoseEstimator for SlowEstimator {
            fn estimate(&self, image: &PixelBuffer) -> Result<Vec<Pose>, EstimationError> {
                std::thread::sleep(Duration::from_millis(300));
                EchoEstimator::default().estimate(image)
            }

            fn keypoint_count(&self) -> usize {
                3
            }

            fn name(&self) -> &'static str {
                "slow"
            }
        }

        let store = Arc::new(InMemoryDetectionStore::new());
        let orchestrator = DetectionOrchestrator::new(
            Arc::new(StripDecoder::default()),
            Arc::new(SlowEstimator),
            store.clone(),
        )
        .with_request_timeout(Some(Duration::from_millis(100)));

        let outcome = orchestrator
            .process(DetectionRequest::new(vec![7u8; 2], "slow-estimate.png"))
            .await;
        assert_eq!(outcome, DetectionOutcome::failed(FailureReason::TimedOut));

        // Let the detached estimation worker finish
        tokio::time::sleep(Duration::from_millis(600)).await;
        assert_eq!(store.count(), 0);
    }
}
