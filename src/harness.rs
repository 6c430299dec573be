//! Experiment harness
//!
//! Runs a pipeline over dataset samples one at a time and writes a JSON
//! report. A failing sample becomes a failed record; the batch continues.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt};
use serde::Serialize;
use tracing::{info, warn};

use vire_agents::pipeline::AnalystEntry;
use vire_agents::llm::TokenUsage;
use vire_agents::Pipeline;

use crate::dataset::Sample;

/// Outcome of one sample
#[derive(Debug, Clone, Serialize)]
pub struct SampleResult {
    pub question_id: String,
    pub question: String,
    pub image_caption: String,
    pub rationales: Vec<AnalystEntry>,
    pub final_answer: String,
    pub explanation: String,
    pub gold_answer: String,
    pub gold_explanation: String,
    pub success: bool,
    pub error: Option<String>,
    /// Seconds spent on this sample
    pub processing_time: f64,
    pub token_usage: TokenUsage,
}

/// Whole-experiment summary, as written to disk
#[derive(Debug, Clone, Serialize)]
pub struct ExperimentReport {
    pub experiment_name: String,
    /// `junior`, `senior`, `manager` or `all`
    pub tier: String,
    pub num_samples: usize,
    pub successful: usize,
    pub failed: usize,
    pub timestamp: DateTime<Utc>,
    pub detailed_results: Vec<SampleResult>,
}

impl ExperimentReport {
    /// Write the report to `<dir>/<name>/<name>_results_<timestamp>.json`
    pub fn write_to(&self, results_dir: &Path) -> Result<PathBuf> {
        let dir = results_dir.join(&self.experiment_name);
        fs::create_dir_all(&dir)
            .with_context(|| format!("Failed to create results directory {}", dir.display()))?;

        let file = dir.join(format!(
            "{}_results_{}.json",
            self.experiment_name,
            self.timestamp.format("%Y%m%d_%H%M%S")
        ));
        let json = serde_json::to_string_pretty(self).context("Failed to serialize report")?;
        fs::write(&file, json)
            .with_context(|| format!("Failed to write results file {}", file.display()))?;

        Ok(file)
    }
}

async fn run_sample(pipeline: &Pipeline, sample: Sample) -> SampleResult {
    let started = Instant::now();
    let outcome = pipeline.invoke(sample.question.as_str(), sample.image.clone()).await;
    let processing_time = started.elapsed().as_secs_f64();

    let mut result = SampleResult {
        question_id: sample.question_id,
        question: sample.question,
        image_caption: String::new(),
        rationales: Vec::new(),
        final_answer: String::new(),
        explanation: String::new(),
        gold_answer: sample.gold_answer,
        gold_explanation: sample.gold_explanation,
        success: false,
        error: None,
        processing_time,
        token_usage: TokenUsage::default(),
    };

    match outcome {
        Ok(output) => {
            info!(
                question_id = %result.question_id,
                answer = %output.final_answer,
                gold = %result.gold_answer,
                elapsed_s = processing_time,
                "Sample answered"
            );
            result.image_caption = output.image_caption;
            result.rationales = output.rationales;
            result.final_answer = output.final_answer;
            result.explanation = output.explanation;
            result.token_usage = output.usage;
            result.success = true;
        }
        Err(e) => {
            warn!(question_id = %result.question_id, error = %e, "Sample failed");
            result.error = Some(e.to_string());
        }
    }

    result
}

/// Answer every sample in order and summarize
pub async fn run(
    pipeline: &Pipeline,
    tier: &str,
    experiment_name: &str,
    samples: Vec<Sample>,
) -> ExperimentReport {
    let total = samples.len();
    info!(experiment = experiment_name, tier, samples = total, "Experiment started");

    let detailed_results: Vec<SampleResult> = stream::iter(samples.into_iter().enumerate())
        .then(|(index, sample)| async move {
            info!(sample = index + 1, total, question_id = %sample.question_id, "Processing sample");
            run_sample(pipeline, sample).await
        })
        .collect()
        .await;

    let successful = detailed_results.iter().filter(|r| r.success).count();
    let report = ExperimentReport {
        experiment_name: experiment_name.to_string(),
        tier: tier.to_string(),
        num_samples: detailed_results.len(),
        successful,
        failed: detailed_results.len() - successful,
        timestamp: Utc::now(),
        detailed_results,
    };

    info!(
        experiment = experiment_name,
        successful = report.successful,
        failed = report.failed,
        "Experiment finished"
    );
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use vire_agents::llm::ScriptedProvider;
    use vire_agents::tools::{ToolRegistry, VqaTool};
    use vire_agents::vision::StaticCaptioner;
    use vire_agents::{AnalystTier, ImageRef, PipelineBuilder};

    fn sample(id: &str, question: &str) -> Sample {
        Sample {
            question_id: id.to_string(),
            question: question.to_string(),
            image: ImageRef::from("images/1.jpg"),
            gold_answer: "zebra".to_string(),
            gold_explanation: "It has stripes.".to_string(),
        }
    }

    /// Junior pipeline whose model never calls a tool
    fn pipeline(script: &[&str]) -> Pipeline {
        PipelineBuilder::new()
            .tier(AnalystTier::Junior)
            .llm(Arc::new(ScriptedProvider::from_texts(script.iter().copied())))
            .captioner(Arc::new(StaticCaptioner::new("a zebra in a field")))
            .registry(ToolRegistry::new().with(Arc::new(VqaTool::new("http://127.0.0.1:9"))))
            .build()
            .unwrap()
    }

    #[tokio::test]
    async fn test_failed_sample_does_not_stop_batch() {
        // second sample runs out of script and fails
        let pipeline = pipeline(&["Finish", "Black and white stripes.", "Answer: zebra"]);

        let report = run(
            &pipeline,
            "junior",
            "smoke",
            vec![sample("1", "What animal?"), sample("2", "What animal again?")],
        )
        .await;

        assert_eq!(report.num_samples, 2);
        assert_eq!(report.successful, 1);
        assert_eq!(report.failed, 1);

        let ok = &report.detailed_results[0];
        assert!(ok.success);
        assert_eq!(ok.final_answer, "zebra");
        assert_eq!(ok.image_caption, "a zebra in a field");
        assert_eq!(ok.gold_answer, "zebra");

        let failed = &report.detailed_results[1];
        assert!(!failed.success);
        assert!(failed.error.is_some());
        assert_eq!(failed.final_answer, "");
    }

    #[tokio::test]
    async fn test_report_written_as_json() {
        let pipeline = pipeline(&["Finish", "Stripes.", "Answer: zebra"]);
        let report = run(&pipeline, "junior", "junior_run", vec![sample("7", "Q?")]).await;

        let dir = tempfile::tempdir().unwrap();
        let path = report.write_to(dir.path()).unwrap();

        assert!(path.starts_with(dir.path().join("junior_run")));
        let name = path.file_name().unwrap().to_string_lossy().into_owned();
        assert!(name.starts_with("junior_run_results_"));
        assert!(name.ends_with(".json"));

        let written: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(written["experiment_name"], "junior_run");
        assert_eq!(written["tier"], "junior");
        assert_eq!(written["successful"], 1);
        assert_eq!(written["detailed_results"][0]["question_id"], "7");
        assert_eq!(written["detailed_results"][0]["rationales"][0]["Junior"], "Stripes.");
        assert!(written["detailed_results"][0]["error"].is_null());
        // the scripted model reports no usage
        assert_eq!(written["detailed_results"][0]["token_usage"]["total_tokens"], 0);
    }
}
