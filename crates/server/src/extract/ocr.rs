use async_trait::async_trait;

/// Outcome of one OCR invocation.
#[derive(Debug, Clone, PartialEq)]
pub enum OcrOutcome {
    /// Text was recognized with the given confidence in [0, 1].
    Text { text: String, confidence: f64 },
    /// The provider is not installed/enabled. Extraction degrades, the
    /// document is still processed.
    Unavailable,
}

/// Abstract OCR provider. The core never depends on a concrete engine,
/// only on this contract.
#[async_trait]
pub trait OcrEngine: Send + Sync {
    /// Recognize text in a raster image (JPEG/PNG/WEBP bytes).
    async fn ocr_image(&self, bytes: &[u8]) -> Result<OcrOutcome, String>;

    /// Recognize text in a scanned PDF (no digital text layer).
    async fn ocr_pdf(&self, bytes: &[u8]) -> Result<OcrOutcome, String>;

    /// Engine name for logs and extraction metadata.
    fn name(&self) -> &'static str;
}

/// Engine used when `OCR_ENABLED` is off: always reports unavailability.
pub struct DisabledOcr;

#[async_trait]
impl OcrEngine for DisabledOcr {
    async fn ocr_image(&self, _bytes: &[u8]) -> Result<OcrOutcome, String> {
        Ok(OcrOutcome::Unavailable)
    }

    async fn ocr_pdf(&self, _bytes: &[u8]) -> Result<OcrOutcome, String> {
        Ok(OcrOutcome::Unavailable)
    }

    fn name(&self) -> &'static str {
        "disabled"
    }
}

/// Scripted engine for tests: returns a fixed outcome, or an error.
pub struct MockOcrEngine {
    outcome: Result<OcrOutcome, String>,
}

impl MockOcrEngine {
    pub fn recognizing(text: impl Into<String>, confidence: f64) -> Self {
        Self {
            outcome: Ok(OcrOutcome::Text {
                text: text.into(),
                confidence,
            }),
        }
    }

    pub fn unavailable() -> Self {
        Self {
            outcome: Ok(OcrOutcome::Unavailable),
        }
    }

    pub fn failing(message: impl Into<String>) -> Self {
        Self {
            outcome: Err(message.into()),
        }
    }
}

#[async_trait]
impl OcrEngine for MockOcrEngine {
    async fn ocr_image(&self, _bytes: &[u8]) -> Result<OcrOutcome, String> {
        self.outcome.clone()
    }

    async fn ocr_pdf(&self, _bytes: &[u8]) -> Result<OcrOutcome, String> {
        self.outcome.clone()
    }

    fn name(&self) -> &'static str {
        "mock"
    }
}
