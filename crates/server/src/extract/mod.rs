//! Evidence extraction: document bytes in, structured evidence out.
//!
//! The extractor orchestrates the digital text layer, the abstract OCR
//! provider, and the NLP entity pass. It degrades rather than fails: an
//! unavailable OCR provider produces a valid empty record with a warning.

pub mod nlp;
pub mod ocr;
pub mod pdf;

use serde_json::Value;
use shared_types::{AppError, ExtractedFields};
use std::sync::Arc;
use std::time::Duration;

use nlp::Dictionaries;
use ocr::{OcrEngine, OcrOutcome};

pub const WARN_OCR_UNAVAILABLE: &str = "ocr_unavailable";
pub const WARN_EMPTY_TEXT: &str = "empty_text";
pub const WARN_UNSUPPORTED_CONTENT_TYPE: &str = "unsupported_content_type";

/// How the text in an evidence record was obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtractionMethod {
    DigitalText,
    ImageOcr,
    None,
}

impl ExtractionMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExtractionMethod::DigitalText => "digital_text",
            ExtractionMethod::ImageOcr => "image_ocr",
            ExtractionMethod::None => "none",
        }
    }
}

/// Per-document evidence produced by the extractor.
#[derive(Debug, Clone)]
pub struct EvidenceRecord {
    pub method: ExtractionMethod,
    pub extracted_text: String,
    /// Meaningful only for `ImageOcr`.
    pub ocr_confidence: f64,
    pub page_count: usize,
    pub warnings: Vec<String>,
    pub extracted_fields: ExtractedFields,
}

/// Contract over the OCR and NLP providers. One instance is shared by all
/// pipeline workers.
pub struct EvidenceExtractor {
    ocr: Arc<dyn OcrEngine>,
    dictionaries: Dictionaries,
    timeout: Duration,
}

impl EvidenceExtractor {
    pub fn new(ocr: Arc<dyn OcrEngine>, dictionaries: Dictionaries, timeout: Duration) -> Self {
        Self {
            ocr,
            dictionaries,
            timeout,
        }
    }

    /// Extract text and entities from document bytes.
    ///
    /// Errors only when a provider path hard-fails (including timeout);
    /// provider *unavailability* degrades to a valid empty record instead.
    pub async fn extract(
        &self,
        content_type: &str,
        bytes: &[u8],
        document_type: &str,
    ) -> Result<EvidenceRecord, AppError> {
        let mut record = match content_type {
            "application/pdf" => self.extract_pdf(bytes).await?,
            "image/jpeg" | "image/png" | "image/webp" => self.extract_image(bytes).await?,
            other => EvidenceRecord {
                method: ExtractionMethod::None,
                extracted_text: String::new(),
                ocr_confidence: 0.0,
                page_count: 0,
                warnings: vec![format!("{WARN_UNSUPPORTED_CONTENT_TYPE}:{other}")],
                extracted_fields: ExtractedFields::default(),
            },
        };

        if record.extracted_text.trim().is_empty()
            && !record.warnings.iter().any(|w| w == WARN_EMPTY_TEXT)
        {
            record.warnings.push(WARN_EMPTY_TEXT.to_string());
        }

        let mut fields = nlp::extract_entities(&record.extracted_text, &self.dictionaries);
        attach_metadata(&mut fields, &record, document_type);
        record.extracted_fields = fields;

        Ok(record)
    }

    async fn extract_pdf(&self, bytes: &[u8]) -> Result<EvidenceRecord, AppError> {
        let layer = pdf::extract_text_layer(bytes);
        if !layer.is_empty() {
            return Ok(EvidenceRecord {
                method: ExtractionMethod::DigitalText,
                extracted_text: layer.text,
                ocr_confidence: 0.0,
                page_count: layer.page_count,
                warnings: Vec::new(),
                extracted_fields: ExtractedFields::default(),
            });
        }

        // No digital text layer: scanned PDF, hand the bytes to the OCR
        // provider.
        let page_count = pdf::count_pages(bytes);
        let outcome = self.run_ocr(self.ocr.ocr_pdf(bytes)).await?;
        Ok(self.record_from_ocr(outcome, page_count))
    }

    async fn extract_image(&self, bytes: &[u8]) -> Result<EvidenceRecord, AppError> {
        let outcome = self.run_ocr(self.ocr.ocr_image(bytes)).await?;
        Ok(self.record_from_ocr(outcome, 1))
    }

    async fn run_ocr(
        &self,
        fut: impl std::future::Future<Output = Result<OcrOutcome, String>>,
    ) -> Result<OcrOutcome, AppError> {
        match tokio::time::timeout(self.timeout, fut).await {
            Ok(Ok(outcome)) => Ok(outcome),
            Ok(Err(e)) => Err(AppError::extraction(format!("OCR provider failed: {e}"))),
            Err(_) => Err(AppError::extraction(format!(
                "OCR provider timed out after {}s",
                self.timeout.as_secs()
            ))),
        }
    }

    fn record_from_ocr(&self, outcome: OcrOutcome, page_count: usize) -> EvidenceRecord {
        match outcome {
            OcrOutcome::Text { text, confidence } => EvidenceRecord {
                method: ExtractionMethod::ImageOcr,
                extracted_text: text,
                ocr_confidence: confidence.clamp(0.0, 1.0),
                page_count: page_count.max(1),
                warnings: Vec::new(),
                extracted_fields: ExtractedFields::default(),
            },
            OcrOutcome::Unavailable => EvidenceRecord {
                method: ExtractionMethod::None,
                extracted_text: String::new(),
                ocr_confidence: 0.0,
                page_count,
                warnings: vec![WARN_OCR_UNAVAILABLE.to_string()],
                extracted_fields: ExtractedFields::default(),
            },
        }
    }
}

/// Stash the extraction metadata in the bag's open extension map so it is
/// persisted alongside the entities.
fn attach_metadata(fields: &mut ExtractedFields, record: &EvidenceRecord, document_type: &str) {
    fields
        .extra
        .insert("document_type".into(), Value::from(document_type));
    fields
        .extra
        .insert("extraction_method".into(), Value::from(record.method.as_str()));
    fields
        .extra
        .insert("ocr_confidence".into(), Value::from(record.ocr_confidence));
    fields
        .extra
        .insert("page_count".into(), Value::from(record.page_count as i64));
    fields.extra.insert(
        "char_count".into(),
        Value::from(record.extracted_text.chars().count() as i64),
    );
    fields.extra.insert(
        "warnings".into(),
        Value::from(record.warnings.clone()),
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use ocr::{DisabledOcr, MockOcrEngine};

    fn extractor(engine: Arc<dyn OcrEngine>) -> EvidenceExtractor {
        EvidenceExtractor::new(engine, Dictionaries::default(), Duration::from_secs(5))
    }

    #[tokio::test]
    async fn digital_pdf_text_layer_is_used() {
        let ex = extractor(Arc::new(DisabledOcr));
        let bytes = pdf::build_test_pdf("Passport NO1234567\nName: Ola Nordmann");
        let record = ex.extract("application/pdf", &bytes, "passport").await.unwrap();
        assert_eq!(record.method, ExtractionMethod::DigitalText);
        assert!(record.extracted_text.contains("NO1234567"));
        assert_eq!(record.page_count, 1);
        assert!(record.warnings.is_empty());
        assert!(record
            .extracted_fields
            .identifiers
            .passport
            .contains(&"NO1234567".to_string()));
    }

    #[tokio::test]
    async fn image_with_disabled_ocr_degrades_with_warning() {
        let ex = extractor(Arc::new(DisabledOcr));
        let record = ex
            .extract("image/png", b"fake image bytes", "residence_proof")
            .await
            .unwrap();
        assert_eq!(record.method, ExtractionMethod::None);
        assert!(record.extracted_text.is_empty());
        assert!(record.warnings.iter().any(|w| w == WARN_OCR_UNAVAILABLE));
        assert!(record.warnings.iter().any(|w| w == WARN_EMPTY_TEXT));
        assert_eq!(record.extracted_fields.entity_richness, 0.0);
    }

    #[tokio::test]
    async fn image_ocr_text_feeds_nlp() {
        let engine = MockOcrEngine::recognizing("Botid 7 år i Norge, folkeregistrert 0155 Oslo", 0.9);
        let ex = extractor(Arc::new(engine));
        let record = ex
            .extract("image/jpeg", b"scan", "residence_proof")
            .await
            .unwrap();
        assert_eq!(record.method, ExtractionMethod::ImageOcr);
        assert_eq!(record.ocr_confidence, 0.9);
        assert!(!record.extracted_fields.signals.residency.is_empty());
    }

    #[tokio::test]
    async fn scanned_pdf_falls_back_to_ocr() {
        let engine = MockOcrEngine::recognizing("politiattest utstedt 12.03.2024", 0.8);
        let ex = extractor(Arc::new(engine));
        // A PDF with no text objects at all.
        let bytes = b"%PDF-1.4\n1 0 obj << /Type /Page >> endobj\n%%EOF".to_vec();
        let record = ex.extract("application/pdf", &bytes, "police_clearance").await.unwrap();
        assert_eq!(record.method, ExtractionMethod::ImageOcr);
        assert!(record.extracted_text.contains("politiattest"));
    }

    #[tokio::test]
    async fn provider_error_surfaces_as_extraction_error() {
        let ex = extractor(Arc::new(MockOcrEngine::failing("engine crashed")));
        let err = ex
            .extract("image/webp", b"scan", "id_card")
            .await
            .unwrap_err();
        assert_eq!(err.kind, shared_types::AppErrorKind::ExtractionError);
    }

    #[tokio::test]
    async fn metadata_lands_in_extension_map() {
        let ex = extractor(Arc::new(DisabledOcr));
        let bytes = pdf::build_test_pdf("statsborgerskap søknad");
        let record = ex.extract("application/pdf", &bytes, "application_form").await.unwrap();
        let extra = &record.extracted_fields.extra;
        assert_eq!(extra.get("extraction_method").unwrap(), "digital_text");
        assert_eq!(extra.get("document_type").unwrap(), "application_form");
        assert_eq!(extra.get("page_count").unwrap(), 1);
    }
}
