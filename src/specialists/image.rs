//! 图像诊断专家（脑 MRI、胸片、皮肤病灶）
//!
//! 模型推理由 ImageAnalyzer 提供；专家只负责把结论格式化成回答并声明是否需要人工复核。

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;

use super::{ImageTypeClassifier, Specialist, SpecialistInput, SpecialistOutput};
use crate::core::{AgentId, HistoryEntry, ImageType, TriageError};

const UNCLEAR_IMAGE: &str =
    "The uploaded image is not clear enough to make a diagnosis / the image is not a medical image.";

/// 模型推理结论
#[derive(Debug, Clone, PartialEq)]
pub enum ImageFinding {
    BrainScan {
        tumor_type: Option<String>,
        confidence: f32,
        probabilities: Vec<(String, f32)>,
        recommendation: String,
    },
    ChestXray {
        covid_positive: bool,
    },
    SkinSegmentation {
        mask_ref: String,
    },
    /// 图像无法判读
    Unclear,
}

/// 图像推理后端
#[async_trait]
pub trait ImageAnalyzer: Send + Sync {
    async fn analyze(&self, agent: AgentId, image_ref: &str) -> Result<ImageFinding, TriageError>;
}

/// 未配置模型时使用：每次都报错，由执行器降级
#[derive(Debug, Default, Clone)]
pub struct UnavailableAnalyzer;

#[async_trait]
impl ImageAnalyzer for UnavailableAnalyzer {
    async fn analyze(&self, agent: AgentId, _image_ref: &str) -> Result<ImageFinding, TriageError> {
        Err(TriageError::specialist(agent, "no image model configured"))
    }
}

pub struct ImageDiagnosisSpecialist {
    agent: AgentId,
    analyzer: Arc<dyn ImageAnalyzer>,
    validation: bool,
}

impl ImageDiagnosisSpecialist {
    pub fn new(agent: AgentId, analyzer: Arc<dyn ImageAnalyzer>) -> Self {
        Self {
            agent,
            analyzer,
            validation: true,
        }
    }

    /// 诊断结果是否需要人工复核（默认需要）
    pub fn with_validation(mut self, required: bool) -> Self {
        self.validation = required;
        self
    }

    fn missing_image_notice(&self) -> String {
        let kind = match self.agent {
            AgentId::BrainTumor => "a brain MRI image",
            AgentId::ChestXray => "a chest X-ray image",
            AgentId::SkinLesion => "a skin lesion image",
            _ => "an image",
        };
        format!("No image was provided for analysis. Please upload {kind}.")
    }
}

fn format_finding(finding: &ImageFinding) -> (String, Option<String>) {
    match finding {
        ImageFinding::BrainScan {
            tumor_type: None,
            confidence,
            recommendation,
            ..
        } => (
            format!(
                "Brain MRI Analysis Results:\n\n**Tumor Detection**: NEGATIVE\n**Confidence**: {:.1}%\n**Recommendation**: {}\n\n**Note**: While no tumor was detected, regular medical check-ups are still recommended.",
                confidence * 100.0,
                recommendation
            ),
            None,
        ),
        ImageFinding::BrainScan {
            tumor_type: Some(tumor_type),
            confidence,
            probabilities,
            recommendation,
        } => {
            let detail = probabilities
                .iter()
                .map(|(class, p)| format!("- {}: {:.1}%", class, p * 100.0))
                .collect::<Vec<_>>()
                .join("\n");
            (
                format!(
                    "Brain MRI Analysis Results:\n\n**Tumor Detection**: POSITIVE\n**Tumor Type**: {}\n**Confidence**: {:.1}%\n\n**Detailed Probabilities**:\n{}\n\n**Recommendation**: {}\n\n**Important Note**: This is an AI-assisted analysis. Please consult with a medical professional for proper diagnosis and treatment.",
                    tumor_type,
                    confidence * 100.0,
                    detail,
                    recommendation
                ),
                None,
            )
        }
        ImageFinding::ChestXray { covid_positive: true } => (
            "The analysis of the uploaded chest X-ray image indicates a **POSITIVE** result for **COVID-19**.".into(),
            None,
        ),
        ImageFinding::ChestXray { covid_positive: false } => (
            "The analysis of the uploaded chest X-ray image indicates a **NEGATIVE** result for **COVID-19**, i.e., **NORMAL**.".into(),
            None,
        ),
        ImageFinding::SkinSegmentation { mask_ref } => (
            "Following is the analyzed **segmented** output of the uploaded skin lesion image:".into(),
            Some(mask_ref.clone()),
        ),
        ImageFinding::Unclear => (UNCLEAR_IMAGE.into(), None),
    }
}

#[async_trait]
impl Specialist for ImageDiagnosisSpecialist {
    fn id(&self) -> AgentId {
        self.agent
    }

    async fn run(
        &self,
        input: &SpecialistInput<'_>,
        _history: &[HistoryEntry],
    ) -> Result<SpecialistOutput, TriageError> {
        let Some(image_ref) = input.image_ref else {
            return Ok(SpecialistOutput::text(self.missing_image_notice()));
        };

        let finding = self.analyzer.analyze(self.agent, image_ref).await?;
        let diagnosed = finding != ImageFinding::Unclear;
        let (text, result_image) = format_finding(&finding);
        tracing::info!("{} analyzed {} (diagnosed={})", self.agent, image_ref, diagnosed);

        Ok(SpecialistOutput {
            text,
            needs_validation: self.validation && diagnosed,
            result_image,
            ..Default::default()
        })
    }
}

/// 按文件名关键词判断图像类型（离线运行用）
#[derive(Debug, Default, Clone)]
pub struct FilenameImageClassifier;

#[async_trait]
impl ImageTypeClassifier for FilenameImageClassifier {
    async fn classify(&self, image_ref: &str) -> Result<ImageType, TriageError> {
        let name = Path::new(image_ref)
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or(image_ref)
            .to_lowercase();

        let image_type = if ["mri", "brain"].iter().any(|k| name.contains(k)) {
            ImageType::BrainMri
        } else if ["xray", "x-ray", "x_ray", "chest", "cxr"].iter().any(|k| name.contains(k)) {
            ImageType::ChestXray
        } else if ["skin", "lesion", "derm", "mole"].iter().any(|k| name.contains(k)) {
            ImageType::SkinLesion
        } else {
            ImageType::Other
        };
        Ok(image_type)
    }
}
