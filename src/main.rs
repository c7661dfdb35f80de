use clap::Parser;
use cloud_glue::adapters::object_store_from_config;
use cloud_glue::app::pipelines::batch_pipeline::load_records_csv;
use cloud_glue::config::cli::{Command, PollArgs};
use cloud_glue::core::inference::to_jsonl;
use cloud_glue::domain::model::InferenceRequest;
use cloud_glue::domain::ports::ObjectStore;
use cloud_glue::utils::{logger, validation::Validate};
use cloud_glue::{
    AppConfig, BatchPipeline, Bucket, CliConfig, CloudError, InferenceClient, PollOptions,
    Result, SlackNotifier,
};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

#[tokio::main]
async fn main() {
    let _ = dotenvy::dotenv();
    let cli = CliConfig::parse();

    // 初始化日誌
    if cli.json_logs {
        logger::init_json_logger();
    } else {
        logger::init_cli_logger(cli.verbose);
    }
    tracing::debug!("CLI config: {:?}", cli);

    if let Err(e) = run(cli).await {
        tracing::error!("❌ {} (Category: {:?})", e, e.category());
        eprintln!("❌ {}", e);
        eprintln!("💡 {}", e.recovery_suggestion());
        std::process::exit(e.exit_code());
    }
}

fn load_config(cli: &CliConfig) -> Result<AppConfig> {
    let config = match &cli.config {
        Some(path) => AppConfig::from_file(path)?,
        None => AppConfig::from_env()?,
    };
    config.validate()?;
    Ok(config)
}

async fn bucket(config: &AppConfig) -> Result<Bucket<Box<dyn ObjectStore>>> {
    let storage = config.storage()?;
    let store = object_store_from_config(storage).await?;
    Ok(Bucket::new(store, storage.uri_scheme()))
}

/// Ctrl+C 只停止等待，不會取消遠端的 job
fn poll_options(args: &PollArgs) -> PollOptions {
    let token = CancellationToken::new();
    let ctrl_c = token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            ctrl_c.cancel();
        }
    });

    let mut options = PollOptions::every(Duration::from_secs(args.interval)).with_cancellation(token);
    if let Some(timeout) = args.timeout {
        options = options.with_timeout(Duration::from_secs(timeout));
    }
    options
}

async fn run(cli: CliConfig) -> Result<()> {
    let config = load_config(&cli)?;

    match cli.command {
        Command::GetUri { key } => {
            let bucket = bucket(&config).await?;
            let handle = bucket.get(&key);
            println!("{}", handle.uri(config.storage()?.uri_scheme()));
        }
        Command::Download { key, local_path } => {
            bucket(&config).await?.download(&key, &local_path).await?;
            println!("✅ Downloaded {} -> {}", key, local_path.display());
        }
        Command::DownloadPrefix { prefix, local_dir } => {
            let count = bucket(&config)
                .await?
                .download_prefix(&prefix, &local_dir)
                .await?;
            println!("✅ Downloaded {} files -> {}", count, local_dir.display());
        }
        Command::Upload { local_path, key } => {
            let bucket = bucket(&config).await?;
            bucket.upload(&local_path, &key).await?;
            println!("✅ Uploaded {} -> {}", local_path.display(), bucket.uri(&key));
        }
        Command::ExtractKey { uri, strict } => {
            let bucket = bucket(&config).await?;
            if strict {
                let key = bucket.try_extract_key(&uri).ok_or_else(|| {
                    CloudError::validation(format!("{} is not in bucket {}", uri, bucket.name()))
                })?;
                println!("{}", key);
            } else {
                println!("{}", bucket.extract_key(&uri));
            }
        }
        Command::Predict {
            prompt,
            image,
            mime_type,
        } => {
            let client = InferenceClient::from_config(config.inference()?)?;
            let request = InferenceRequest {
                key: None,
                prompt,
                image_uri: image,
                mime_type,
            };
            println!("{}", client.predict(&request).await?);
        }
        Command::BatchInput { csv, output } => {
            let client = InferenceClient::from_config(config.inference()?)?;
            let records = load_records_csv(&csv)?;
            let jsonl = to_jsonl(&client.build_batch_input(&records)?)?;
            match output {
                Some(path) => {
                    tokio::fs::write(&path, jsonl).await?;
                    println!("✅ Wrote {} requests -> {}", records.len(), path.display());
                }
                None => print!("{}", jsonl),
            }
        }
        Command::Submit {
            input_uri,
            output_uri,
        } => {
            let client = InferenceClient::from_config(config.inference()?)?;
            let job = client.submit_batch_job(&input_uri, &output_uri).await?;
            println!("{}", job.name);
        }
        Command::Status { job_name } => {
            let client = InferenceClient::from_config(config.inference()?)?;
            let job = client.get_job_status(&job_name).await?;
            println!("{:?}", job.state);
            if let Some(uri) = &job.output_uri {
                println!("output: {}", uri);
            }
            if let Some(error) = &job.error {
                println!("error: {}", error);
            }
        }
        Command::Wait { job_name, poll } => {
            let client = InferenceClient::from_config(config.inference()?)?;
            let job = client
                .wait_for_batch_job(&job_name, &poll_options(&poll))
                .await?
                .into_result()?;
            println!("✅ {}", job.output_uri.unwrap_or_default());
        }
        Command::Cancel { job_name } => {
            let client = InferenceClient::from_config(config.inference()?)?;
            client.cancel_batch_job(&job_name).await?;
        }
        Command::RunBatch {
            csv,
            run_prefix,
            output_dir,
            poll,
            notify,
        } => {
            let records = load_records_csv(&csv)?;
            let pipeline = BatchPipeline::new(
                bucket(&config).await?,
                InferenceClient::from_config(config.inference()?)?,
                poll_options(&poll),
            );
            let notifier = if notify {
                Some(SlackNotifier::from_config(config.notification()?))
            } else {
                None
            };

            let result = pipeline.run(&records, &run_prefix, &output_dir).await;
            let (message, is_error) = match &result {
                Ok(run) if run.succeeded() => (
                    format!(
                        "Batch job {} succeeded: {} files downloaded to {}",
                        run.job.name,
                        run.downloaded_files,
                        output_dir.display()
                    ),
                    false,
                ),
                Ok(run) => (
                    format!(
                        "Batch job {} ended as {:?}: {}",
                        run.job.name,
                        run.job.state,
                        run.job.error.as_ref().map(|e| e.to_string()).unwrap_or_default()
                    ),
                    true,
                ),
                Err(e) => (format!("Batch run under {} failed: {}", run_prefix, e), true),
            };

            if let Some(notifier) = notifier {
                let response = notifier.send(&message, is_error).await?;
                tracing::debug!("Slack responded with HTTP {}", response.status);
            }

            result?.job.into_result()?;
            println!("✅ {}", message);
        }
        Command::Notify { message, success } => {
            let notifier = SlackNotifier::from_config(config.notification()?);
            let response = notifier.send(&message, !success).await?;
            println!("{} {}", response.status, response.body);
        }
    }

    Ok(())
}
