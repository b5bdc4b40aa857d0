//! Download and upload observables against stubbed HTTP servers.

use std::path::PathBuf;

use bytes::Bytes;
use rxfetch::{
    Destination, DownloadOptions, Error, JsonSerializer, Method, ParameterEncoding, RxProgress,
    Session, StringSerializer, Transfer, UploadSource, suggested_download_destination,
};
use serde_json::json;
use wiremock::matchers::{body_bytes, header, method, path, query_param};
use wiremock::{Mock, MockServer, Request, ResponseTemplate};

const DATA_JSON_CONTENT: &str = r#"{"hello":"world", "foo":"bar", "zero": 0}"#;

async fn json_service() -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_raw(DATA_JSON_CONTENT.as_bytes(), "application/json"),
        )
        .mount(&server)
        .await;
    server
}

#[tokio::test]
async fn test_download_response() {
    let server = json_service().await;
    let dir = tempfile::tempdir().unwrap();
    let file_url = dir.path().join("download.json");

    let request = Session::new()
        .unwrap()
        .download(Method::GET, server.uri())
        .to(Destination::to(&file_url, DownloadOptions::new()));

    let default_response = request.response().first().await.unwrap().unwrap();

    assert_eq!(default_response.response.status_code(), 200);
    assert_eq!(default_response.file, file_url);
    assert_eq!(std::fs::read_to_string(&file_url).unwrap(), DATA_JSON_CONTENT);
}

#[tokio::test]
async fn test_download_response_serialized() {
    let server = json_service().await;
    let dir = tempfile::tempdir().unwrap();
    let file_url = dir.path().join("serialized.json");

    let request = Session::new()
        .unwrap()
        .download(Method::GET, server.uri())
        .to(Destination::to(&file_url, DownloadOptions::new()));

    let json_response = request
        .response_serialized(JsonSerializer)
        .first()
        .await
        .unwrap()
        .unwrap();

    assert_eq!(json_response.response.status_code(), 200);
    assert_eq!(json_response.value["hello"], "world");
    assert!(json_response.file.exists());
}

#[tokio::test]
async fn test_download_without_destination_keeps_temporary_file() {
    let server = json_service().await;

    let download = rxfetch::download(Method::GET, server.uri(), None)
        .first()
        .await
        .unwrap()
        .unwrap();

    assert_eq!(download.response.status_code(), 200);
    assert_eq!(std::fs::read_to_string(&download.file).unwrap(), DATA_JSON_CONTENT);
    std::fs::remove_file(&download.file).unwrap();
}

#[tokio::test]
async fn test_download_destination_sees_response() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/files/report.txt"))
        .respond_with(ResponseTemplate::new(200).set_body_string("report"))
        .mount(&server)
        .await;
    let dir = tempfile::tempdir().unwrap();
    let target = dir.path().join("nested").join("dir");

    let download = Session::new()
        .unwrap()
        .download(Method::GET, format!("{}/files/report.txt", server.uri()))
        .to(suggested_download_destination(&target))
        .response()
        .first()
        .await
        .unwrap()
        .unwrap();

    assert_eq!(download.file, target.join("report.txt"));
    assert_eq!(std::fs::read_to_string(&download.file).unwrap(), "report");
}

#[tokio::test]
async fn test_download_refuses_to_overwrite() {
    let server = json_service().await;
    let dir = tempfile::tempdir().unwrap();
    let file_url = dir.path().join("existing.json");
    std::fs::write(&file_url, "keep me").unwrap();

    let request = Session::new().unwrap().download(Method::GET, server.uri());

    let err = request
        .clone()
        .to(Destination::to(&file_url, DownloadOptions::new()))
        .response()
        .first()
        .await
        .unwrap_err();
    assert!(matches!(&err, Error::DestinationExists(p) if *p == file_url));
    assert_eq!(std::fs::read_to_string(&file_url).unwrap(), "keep me");

    let replaced = request
        .to(Destination::to(
            &file_url,
            DownloadOptions::new().remove_previous_file(true),
        ))
        .response()
        .first()
        .await
        .unwrap()
        .unwrap();
    assert_eq!(std::fs::read_to_string(&replaced.file).unwrap(), DATA_JSON_CONTENT);
}

#[tokio::test]
async fn test_download_progress() {
    let payload = vec![42u8; 200 * 1024];
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(payload.clone()))
        .mount(&server)
        .await;
    let dir = tempfile::tempdir().unwrap();
    let file_url = dir.path().join("payload.bin");

    let items = Session::new()
        .unwrap()
        .download(Method::GET, server.uri())
        .to(Destination::to(&file_url, DownloadOptions::new()))
        .progress()
        .to_vec()
        .await
        .unwrap();

    let (last, ticks) = items.split_last().unwrap();
    let progress: Vec<RxProgress> = ticks.iter().filter_map(Transfer::progress).collect();
    assert_eq!(progress.len(), ticks.len());
    assert!(!progress.is_empty());
    assert!(progress.windows(2).all(|w| w[0].bytes_written <= w[1].bytes_written));
    assert_eq!(
        progress.last().copied(),
        Some(RxProgress::new(payload.len() as i64, payload.len() as i64))
    );

    let download = last.clone().completed().unwrap();
    assert_eq!(std::fs::read(&download.file).unwrap(), payload);
}

#[tokio::test]
async fn test_upload_data() {
    let payload = Bytes::from_static(b"upload me");
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/upload"))
        .and(body_bytes(payload.to_vec()))
        .and(header("content-length", "9"))
        .respond_with(ResponseTemplate::new(200).set_body_string("stored"))
        .expect(1)
        .mount(&server)
        .await;

    let url = format!("{}/upload", server.uri());
    let (response, body) = rxfetch::upload_data(payload, Method::POST, url)
        .first()
        .await
        .unwrap()
        .unwrap();

    assert_eq!(response.status_code(), 200);
    assert_eq!(&body[..], b"stored");
}

#[tokio::test]
async fn test_upload_parameters_go_to_query() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/upload"))
        .and(query_param("token", "abc"))
        .and(body_bytes(b"payload".to_vec()))
        .and(|request: &Request| !request.headers.contains_key("content-type"))
        .respond_with(ResponseTemplate::new(200).set_body_string("stored"))
        .expect(2)
        .mount(&server)
        .await;

    let session = Session::new().unwrap();
    let url = format!("{}/upload", server.uri());
    let params = match json!({ "token": "abc" }) {
        serde_json::Value::Object(map) => map,
        _ => unreachable!(),
    };

    for encoding in [ParameterEncoding::Url, ParameterEncoding::Json] {
        let (response, body) = session
            .upload(Bytes::from_static(b"payload"), Method::POST, &url)
            .parameters(params.clone(), encoding)
            .validate_status([200])
            .response_string()
            .first()
            .await
            .unwrap()
            .unwrap();

        assert_eq!(response.status_code(), 200);
        assert_eq!(body, "stored");
    }
}

#[tokio::test]
async fn test_upload_progress() {
    let payload = vec![1u8; rxfetch::UPLOAD_CHUNK_SIZE * 3 + 17];
    let server = MockServer::start().await;
    Mock::given(method("PUT"))
        .and(body_bytes(payload.clone()))
        .respond_with(ResponseTemplate::new(200).set_body_string("ok"))
        .mount(&server)
        .await;

    let items = Session::new()
        .unwrap()
        .upload(payload.clone(), Method::PUT, server.uri())
        .progress(StringSerializer)
        .to_vec()
        .await
        .unwrap();

    let (last, ticks) = items.split_last().unwrap();
    let progress: Vec<RxProgress> = ticks.iter().filter_map(Transfer::progress).collect();
    assert_eq!(progress.len(), 4);
    assert!(progress.iter().all(|p| p.total_bytes == payload.len() as i64));
    assert!(progress.windows(2).all(|w| w[0].bytes_written < w[1].bytes_written));
    assert_eq!(progress.last().unwrap().bytes_remaining(), 0);

    let (response, text) = last.clone().completed().unwrap();
    assert_eq!(response.status_code(), 200);
    assert_eq!(text, "ok");
}

#[tokio::test]
async fn test_upload_file() {
    let dir = tempfile::tempdir().unwrap();
    let file = dir.path().join("payload.txt");
    std::fs::write(&file, "from disk").unwrap();

    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(body_bytes(b"from disk".to_vec()))
        .respond_with(ResponseTemplate::new(201).set_body_raw(r#"{"ok":true}"#, "application/json"))
        .expect(1)
        .mount(&server)
        .await;

    let (response, json) = Session::new()
        .unwrap()
        .upload(UploadSource::File(file), Method::POST, server.uri())
        .validate()
        .response_json()
        .first()
        .await
        .unwrap()
        .unwrap();

    assert_eq!(response.status_code(), 201);
    assert_eq!(json["ok"], true);
}

#[tokio::test]
async fn test_upload_missing_file_fails() {
    let result = Session::new()
        .unwrap()
        .upload(PathBuf::from("/no/such/file.bin"), Method::POST, "http://127.0.0.1:1/")
        .response_data()
        .first()
        .await;
    assert!(matches!(result, Err(Error::Io(_))));
}
