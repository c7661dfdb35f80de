use cloud_glue::core::JobState;
use cloud_glue::domain::model::InferenceRequest;
use cloud_glue::{CloudError, InferenceClient, InferenceConfig, PollOptions};
use httpmock::prelude::*;
use std::time::Duration;

const JOBS_PATH: &str = "/v1/projects/my-project/locations/global/batchPredictionJobs";
const JOB_NAME: &str = "projects/my-project/locations/global/batchPredictionJobs/123";

fn client(server: &MockServer) -> InferenceClient {
    let mut config = InferenceConfig::new("my-project");
    config.endpoint = Some(server.base_url());
    config.access_token = Some("test-token".to_string());

    InferenceClient::from_config(&config)
        .unwrap()
        .with_response_schema(serde_json::json!({
            "type": "object",
            "properties": {"label": {"type": "string"}},
            "required": ["label"]
        }))
}

#[tokio::test]
async fn test_predict_returns_raw_text() {
    let server = MockServer::start();

    let generate_mock = server.mock(|when, then| {
        when.method(POST)
            .path("/v1/projects/my-project/locations/global/publishers/google/models/gemini-2.5-flash:generateContent")
            .header("authorization", "Bearer test-token")
            .json_body_partial(
                r#"{
                    "contents": [{
                        "role": "user",
                        "parts": [
                            {"text": "What is in the image?"},
                            {"fileData": {"fileUri": "gs://bucket/image.jpg", "mimeType": "image/jpeg"}}
                        ]
                    }],
                    "generationConfig": {
                        "maxOutputTokens": 1024,
                        "temperature": 0.0,
                        "responseMimeType": "application/json",
                        "responseSchema": {"required": ["label"]}
                    }
                }"#,
            );
        then.status(200).json_body(serde_json::json!({
            "candidates": [{
                "content": {
                    "role": "model",
                    "parts": [{"text": "{\"label\":"}, {"text": " \"cat\"}"}]
                },
                "finishReason": "STOP"
            }]
        }));
    });

    let request = InferenceRequest::new("What is in the image?").with_image("gs://bucket/image.jpg");
    let text = client(&server).predict(&request).await.unwrap();

    generate_mock.assert();
    assert_eq!(text, r#"{"label": "cat"}"#);
    let parsed: serde_json::Value = serde_json::from_str(&text).unwrap();
    assert_eq!(parsed["label"], "cat");
}

#[tokio::test]
async fn test_predict_upstream_error() {
    let server = MockServer::start();

    let generate_mock = server.mock(|when, then| {
        when.method(POST).path_contains(":generateContent");
        then.status(429).body("RESOURCE_EXHAUSTED");
    });

    let err = client(&server)
        .predict(&InferenceRequest::new("hello"))
        .await
        .unwrap_err();

    generate_mock.assert();
    match err {
        CloudError::UpstreamError { status, body, .. } => {
            assert_eq!(status, 429);
            assert_eq!(body, "RESOURCE_EXHAUSTED");
        }
        other => panic!("unexpected error: {:?}", other),
    }
}

#[tokio::test]
async fn test_predict_rejects_empty_prompt_without_calling_api() {
    let server = MockServer::start();

    let generate_mock = server.mock(|when, then| {
        when.method(POST).path_contains(":generateContent");
        then.status(200);
    });

    let err = client(&server)
        .predict(&InferenceRequest::new(""))
        .await
        .unwrap_err();

    assert!(matches!(err, CloudError::ValidationError { .. }));
    assert_eq!(generate_mock.hits(), 0);
}

#[tokio::test]
async fn test_submit_batch_job_with_cloud_storage() {
    let server = MockServer::start();

    let submit_mock = server.mock(|when, then| {
        when.method(POST).path(JOBS_PATH).json_body_partial(
            r#"{
                "model": "publishers/google/models/gemini-2.5-flash",
                "inputConfig": {
                    "instancesFormat": "jsonl",
                    "gcsSource": {"uris": ["gs://bucket/input.jsonl"]}
                },
                "outputConfig": {
                    "predictionsFormat": "jsonl",
                    "gcsDestination": {"outputUriPrefix": "gs://bucket/output"}
                }
            }"#,
        );
        then.status(200).json_body(serde_json::json!({
            "name": JOB_NAME,
            "displayName": "cloud-glue-20250101-000000",
            "state": "JOB_STATE_PENDING"
        }));
    });

    let job = client(&server)
        .submit_batch_job("gs://bucket/input.jsonl", "gs://bucket/output")
        .await
        .unwrap();

    submit_mock.assert();
    assert_eq!(job.name, JOB_NAME);
    assert_eq!(job.state, JobState::Pending);
    assert!(job.output_uri.is_none());
}

#[tokio::test]
async fn test_submit_batch_job_with_bigquery() {
    let server = MockServer::start();

    let submit_mock = server.mock(|when, then| {
        when.method(POST).path(JOBS_PATH).json_body_partial(
            r#"{
                "inputConfig": {
                    "instancesFormat": "bigquery",
                    "bigquerySource": {"inputUri": "bq://project.dataset.input"}
                },
                "outputConfig": {
                    "predictionsFormat": "bigquery",
                    "bigqueryDestination": {"outputUri": "bq://project.dataset"}
                }
            }"#,
        );
        then.status(200).json_body(serde_json::json!({
            "name": JOB_NAME,
            "state": "JOB_STATE_QUEUED"
        }));
    });

    let job = client(&server)
        .submit_batch_job("bq://project.dataset.input", "bq://project.dataset")
        .await
        .unwrap();

    submit_mock.assert();
    assert_eq!(job.state, JobState::Queued);
}

#[tokio::test]
async fn test_await_batch_job_succeeded() {
    let server = MockServer::start();

    let status_mock = server.mock(|when, then| {
        when.method(GET).path(format!("/v1/{}", JOB_NAME));
        then.status(200).json_body(serde_json::json!({
            "name": JOB_NAME,
            "state": "JOB_STATE_SUCCEEDED",
            "outputInfo": {"gcsOutputDirectory": "gs://bucket/output/prediction-model-1"}
        }));
    });

    let client = client(&server);
    let succeeded = client
        .await_batch_job(JOB_NAME, &PollOptions::every(Duration::ZERO))
        .await
        .unwrap();
    assert!(succeeded);
    status_mock.assert_hits(1);

    let job = client.get_job_status(JOB_NAME).await.unwrap();
    assert_eq!(
        job.output_uri.as_deref(),
        Some("gs://bucket/output/prediction-model-1")
    );
}

#[tokio::test]
async fn test_await_batch_job_failed_surfaces_error() {
    let server = MockServer::start();

    let status_mock = server.mock(|when, then| {
        when.method(GET).path(format!("/v1/{}", JOB_NAME));
        then.status(200).json_body(serde_json::json!({
            "name": JOB_NAME,
            "state": "JOB_STATE_FAILED",
            "error": {"code": 3, "message": "Invalid JSONL on line 2"}
        }));
    });

    let client = client(&server);
    let options = PollOptions::every(Duration::ZERO);

    assert!(!client.await_batch_job(JOB_NAME, &options).await.unwrap());

    let job = client.wait_for_batch_job(JOB_NAME, &options).await.unwrap();
    status_mock.assert_hits(2);
    assert_eq!(job.state, JobState::Failed);
    let error = job.error.clone().unwrap();
    assert_eq!(error.code, 3);
    assert_eq!(error.message, "Invalid JSONL on line 2");

    let err = job.into_result().unwrap_err();
    assert!(matches!(err, CloudError::JobFailed { ref message, .. } if message.contains("line 2")));
}

#[tokio::test]
async fn test_get_job_status_not_found() {
    let server = MockServer::start();

    server.mock(|when, then| {
        when.method(GET).path(format!("/v1/{}", JOB_NAME));
        then.status(404).body("job not found");
    });

    let err = client(&server).get_job_status(JOB_NAME).await.unwrap_err();
    assert!(matches!(err, CloudError::UpstreamError { status: 404, .. }));
}

#[tokio::test]
async fn test_cancel_batch_job() {
    let server = MockServer::start();

    let cancel_mock = server.mock(|when, then| {
        when.method(POST).path(format!("/v1/{}:cancel", JOB_NAME));
        then.status(200).json_body(serde_json::json!({}));
    });

    tokio_test::assert_ok!(client(&server).cancel_batch_job(JOB_NAME).await);
    cancel_mock.assert();
}
