use crate::core::batch::PollOptions;
use crate::core::inference::{to_jsonl, InferenceClient};
use crate::core::storage::Bucket;
use crate::domain::model::{BatchJob, InferenceRequest};
use crate::domain::ports::ObjectStore;
use crate::utils::error::Result;
use std::path::Path;

/// 從 CSV 讀取推論輸入，欄位為 `key,prompt,image_uri`（`image_url` 亦可），`mime_type` 可省略
pub fn load_records_csv(path: impl AsRef<Path>) -> Result<Vec<InferenceRequest>> {
    let mut reader = csv::Reader::from_path(path)?;
    let mut records = Vec::new();
    for row in reader.deserialize() {
        records.push(row?);
    }
    Ok(records)
}

/// 批次推論的完整流程：產生輸入 → 上傳 → 提交 → 等待 → 下載結果
pub struct BatchPipeline<S: ObjectStore> {
    bucket: Bucket<S>,
    inference: InferenceClient,
    poll_options: PollOptions,
}

#[derive(Debug, Clone)]
pub struct BatchRunResult {
    pub input_uri: String,
    pub output_uri: String,
    /// Last observed job snapshot; carries the error payload on failure.
    pub job: BatchJob,
    pub downloaded_files: usize,
}

impl BatchRunResult {
    pub fn succeeded(&self) -> bool {
        self.job.state.is_success()
    }
}

impl<S: ObjectStore> BatchPipeline<S> {
    pub fn new(bucket: Bucket<S>, inference: InferenceClient, poll_options: PollOptions) -> Self {
        Self {
            bucket,
            inference,
            poll_options,
        }
    }

    pub fn bucket(&self) -> &Bucket<S> {
        &self.bucket
    }

    /// Runs one batch under `run_prefix` in the bucket. Input is written to
    /// `{run_prefix}/input.jsonl` and predictions land under `{run_prefix}/output`.
    /// Results are downloaded into `local_output_dir` only when the job succeeded.
    pub async fn run(
        &self,
        records: &[InferenceRequest],
        run_prefix: &str,
        local_output_dir: impl AsRef<Path>,
    ) -> Result<BatchRunResult> {
        let run_prefix = run_prefix.trim_end_matches('/');

        tracing::info!("Building batch input for {} records", records.len());
        let lines = self.inference.build_batch_input(records)?;
        let jsonl = to_jsonl(&lines)?;

        let input_key = format!("{}/input.jsonl", run_prefix);
        self.bucket
            .upload_bytes(jsonl.into_bytes(), &input_key, "application/jsonl")
            .await?;

        let input_uri = self.bucket.uri(&input_key);
        let output_uri = self.bucket.uri(&format!("{}/output", run_prefix));
        let submitted = self.inference.submit_batch_job(&input_uri, &output_uri).await?;

        let job = self
            .inference
            .wait_for_batch_job(&submitted.name, &self.poll_options)
            .await?;

        let mut downloaded_files = 0;
        if job.state.is_success() {
            // 實際結果放在 output 底下的子目錄
            let result_uri = job.output_uri.as_deref().unwrap_or(&output_uri);
            let result_prefix = self.bucket.extract_key(result_uri);
            downloaded_files = self
                .bucket
                .download_prefix(&result_prefix, local_output_dir)
                .await?;
        }

        Ok(BatchRunResult {
            input_uri,
            output_uri,
            job,
            downloaded_files,
        })
    }
}
