use super::*;
use axum::{
    extract::{Multipart, Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use shared::protocol::EmployeeGallery;
use tokio::net::TcpListener;

#[derive(Debug, Default, Clone)]
struct CapturedUpload {
    employee_id: String,
    image_names: Vec<String>,
    image_bytes: Vec<Vec<u8>>,
    titles: Vec<String>,
}

#[derive(Clone, Default)]
struct GalleryServerState {
    requests: Arc<Mutex<u32>>,
    uploads: Arc<Mutex<Vec<CapturedUpload>>>,
    fetched_ids: Arc<Mutex<Vec<String>>>,
    upload_records: Arc<Mutex<Vec<StoredImageRecord>>>,
    fetch_records: Arc<Mutex<Vec<StoredImageRecord>>>,
    fail_uploads: Arc<Mutex<bool>>,
    fail_fetches: Arc<Mutex<bool>>,
}

async fn handle_upload(
    State(state): State<GalleryServerState>,
    mut multipart: Multipart,
) -> Result<Json<UploadResponse>, StatusCode> {
    *state.requests.lock().await += 1;
    if *state.fail_uploads.lock().await {
        return Err(StatusCode::INTERNAL_SERVER_ERROR);
    }

    let mut captured = CapturedUpload::default();
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|_| StatusCode::BAD_REQUEST)?
    {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "employeeId" => {
                captured.employee_id = field.text().await.map_err(|_| StatusCode::BAD_REQUEST)?;
            }
            "images" => {
                captured
                    .image_names
                    .push(field.file_name().unwrap_or_default().to_string());
                let bytes = field.bytes().await.map_err(|_| StatusCode::BAD_REQUEST)?;
                captured.image_bytes.push(bytes.to_vec());
            }
            "titles" => {
                captured
                    .titles
                    .push(field.text().await.map_err(|_| StatusCode::BAD_REQUEST)?);
            }
            _ => {}
        }
    }

    let employee_id = captured.employee_id.clone();
    state.uploads.lock().await.push(captured);

    Ok(Json(UploadResponse {
        employee: EmployeeGallery {
            employee_id: Some(EmployeeId::new(employee_id)),
            images: state.upload_records.lock().await.clone(),
        },
    }))
}

async fn handle_fetch(
    State(state): State<GalleryServerState>,
    Path(employee_id): Path<String>,
) -> Result<Json<ImagesResponse>, StatusCode> {
    *state.requests.lock().await += 1;
    state.fetched_ids.lock().await.push(employee_id);
    if *state.fail_fetches.lock().await {
        return Err(StatusCode::INTERNAL_SERVER_ERROR);
    }
    Ok(Json(ImagesResponse {
        images: state.fetch_records.lock().await.clone(),
    }))
}

async fn spawn_gallery_server() -> (String, GalleryServerState) {
    std::env::set_var("NO_PROXY", "127.0.0.1,localhost");
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("local addr");
    let state = GalleryServerState::default();
    let app = Router::new()
        .route("/upload", post(handle_upload))
        .route("/images/:employee_id", get(handle_fetch))
        .with_state(state.clone());
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    (format!("http://{addr}"), state)
}

fn record(title: &str, path: &str) -> StoredImageRecord {
    StoredImageRecord {
        title: title.to_string(),
        path: path.to_string(),
    }
}

fn staged(file_name: &str, bytes: &[u8]) -> StagedImage {
    StagedImage::new(file_name, bytes.to_vec()).with_mime_type("image/png")
}

#[tokio::test]
async fn upload_with_empty_staged_list_is_rejected_before_any_request() {
    let (server_url, state) = spawn_gallery_server().await;
    let client = GalleryClient::with_server_url(server_url);
    client.set_employee_id("E123").await;

    let err = client.upload().await.expect_err("must fail validation");
    assert!(matches!(err, GalleryError::NoStagedImages));
    assert!(err.is_validation());
    assert_eq!(*state.requests.lock().await, 0);
}

#[tokio::test]
async fn upload_with_empty_employee_id_is_rejected_before_any_request() {
    let (server_url, state) = spawn_gallery_server().await;
    let client = GalleryClient::with_server_url(server_url);
    client.stage_images(vec![staged("badge.png", b"png")]).await;

    let err = client.upload().await.expect_err("must fail validation");
    assert!(matches!(err, GalleryError::EmptyEmployeeId));
    assert_eq!(*state.requests.lock().await, 0);
    // The rejected upload must not consume the staged entry.
    assert_eq!(client.staged_images().await.len(), 1);
}

#[tokio::test]
async fn fetch_with_empty_employee_id_is_rejected_before_any_request() {
    let (server_url, state) = spawn_gallery_server().await;
    let client = GalleryClient::with_server_url(server_url);

    let err = client.fetch_images().await.expect_err("must fail validation");
    assert!(matches!(err, GalleryError::EmptyEmployeeId));
    assert!(err.is_validation());
    assert_eq!(*state.requests.lock().await, 0);
}

#[tokio::test]
async fn upload_without_configured_server_url_is_rejected() {
    let client = GalleryClient::new();
    client.set_employee_id("E123").await;
    client.stage_images(vec![staged("badge.png", b"png")]).await;

    let err = client.upload().await.expect_err("must fail validation");
    assert!(matches!(err, GalleryError::ServerUrlMissing));
}

#[tokio::test]
async fn upload_sends_one_title_per_image_defaulting_untitled_entries() {
    let (server_url, state) = spawn_gallery_server().await;
    *state.upload_records.lock().await = vec![
        record("Badge", "uploads/badge.png"),
        record("Untitled", "uploads/photo.jpg"),
    ];

    let client = GalleryClient::with_server_url(server_url);
    client.set_employee_id("E123").await;
    client
        .stage_images(vec![
            staged("badge.png", b"badge-bytes").with_title("Badge"),
            staged("photo.jpg", b"photo-bytes"),
        ])
        .await;

    client.upload().await.expect("upload");

    let uploads = state.uploads.lock().await.clone();
    assert_eq!(uploads.len(), 1);
    let captured = &uploads[0];
    assert_eq!(captured.employee_id, "E123");
    assert_eq!(captured.image_names, vec!["badge.png", "photo.jpg"]);
    assert_eq!(
        captured.image_bytes,
        vec![b"badge-bytes".to_vec(), b"photo-bytes".to_vec()]
    );
    assert_eq!(captured.titles, vec!["Badge", "Untitled"]);
}

#[tokio::test]
async fn successful_upload_replaces_gallery_and_drains_staged_entries() {
    let (server_url, state) = spawn_gallery_server().await;
    let stored = vec![
        record("First", "uploads/a.png"),
        record("Second", "uploads/b.png"),
        record("Third", "uploads/c.png"),
    ];
    *state.upload_records.lock().await = stored.clone();

    let client = GalleryClient::with_server_url(server_url);
    client.set_employee_id("E123").await;
    client
        .stage_images(vec![staged("a.png", b"a"), staged("b.png", b"b")])
        .await;

    let returned = client.upload().await.expect("upload");
    assert_eq!(returned, stored);
    assert_eq!(client.gallery().await, stored);
    assert!(client.staged_images().await.is_empty());
}

#[tokio::test]
async fn failed_upload_leaves_gallery_and_staged_entries_untouched() {
    let (server_url, state) = spawn_gallery_server().await;
    *state.fetch_records.lock().await = vec![record("Existing", "uploads/existing.png")];

    let client = GalleryClient::with_server_url(server_url);
    client.set_employee_id("E123").await;
    // Seed the display list through a successful fetch.
    client.fetch_images().await.expect("seed fetch");
    assert_eq!(client.gallery().await.len(), 1);

    *state.fail_uploads.lock().await = true;
    client.stage_images(vec![staged("new.png", b"new")]).await;

    let err = client.upload().await.expect_err("upload must fail");
    assert!(matches!(err, GalleryError::Transport(_)));
    assert!(!err.is_validation());
    assert_eq!(
        client.gallery().await,
        vec![record("Existing", "uploads/existing.png")]
    );
    assert_eq!(client.staged_images().await.len(), 1);
}

#[tokio::test]
async fn fetch_replaces_gallery_in_server_order() {
    let (server_url, state) = spawn_gallery_server().await;
    let records = vec![
        record("Newest", "uploads/3.png"),
        record("Older", "uploads/2.png"),
        record("Oldest", "uploads/1.png"),
    ];
    *state.fetch_records.lock().await = records.clone();

    let client = GalleryClient::with_server_url(server_url);
    client.set_employee_id("E42").await;

    let fetched = client.fetch_images().await.expect("fetch");
    assert_eq!(fetched, records);
    assert_eq!(client.gallery().await, records);
}

#[tokio::test]
async fn fetch_uses_raw_employee_id_as_path_segment() {
    let (server_url, state) = spawn_gallery_server().await;
    let client = GalleryClient::with_server_url(server_url);
    client.set_employee_id("E999").await;

    client.fetch_images().await.expect("fetch");
    assert_eq!(state.fetched_ids.lock().await.clone(), vec!["E999"]);
}

#[tokio::test]
async fn fetch_with_zero_records_is_a_success_that_empties_the_gallery() {
    let (server_url, state) = spawn_gallery_server().await;
    *state.fetch_records.lock().await = vec![record("Old", "uploads/old.png")];

    let client = GalleryClient::with_server_url(server_url);
    client.set_employee_id("E999").await;
    client.fetch_images().await.expect("seed fetch");
    assert_eq!(client.gallery().await.len(), 1);

    *state.fetch_records.lock().await = Vec::new();
    let fetched = client.fetch_images().await.expect("empty fetch succeeds");
    assert!(fetched.is_empty());
    assert!(client.gallery().await.is_empty());
}

#[tokio::test]
async fn failed_fetch_leaves_gallery_untouched() {
    let (server_url, state) = spawn_gallery_server().await;
    *state.fetch_records.lock().await = vec![record("Kept", "uploads/kept.png")];

    let client = GalleryClient::with_server_url(server_url);
    client.set_employee_id("E123").await;
    client.fetch_images().await.expect("seed fetch");

    *state.fail_fetches.lock().await = true;
    let err = client.fetch_images().await.expect_err("fetch must fail");
    assert!(matches!(err, GalleryError::Transport(_)));
    assert_eq!(
        client.gallery().await,
        vec![record("Kept", "uploads/kept.png")]
    );
}

#[tokio::test]
async fn successful_upload_publishes_completion_and_replacement_events() {
    let (server_url, state) = spawn_gallery_server().await;
    let stored = vec![record("Badge", "uploads/badge.png")];
    *state.upload_records.lock().await = stored.clone();

    let client = GalleryClient::with_server_url(server_url);
    client.set_employee_id("E123").await;
    client.stage_images(vec![staged("badge.png", b"png")]).await;
    let mut rx = client.subscribe_events();

    client.upload().await.expect("upload");

    match rx.recv().await.expect("completion event") {
        GalleryEvent::UploadCompleted { stored: count } => assert_eq!(count, 1),
        other => panic!("unexpected event: {other:?}"),
    }
    match rx.recv().await.expect("replacement event") {
        GalleryEvent::GalleryReplaced { images } => assert_eq!(images, stored),
        other => panic!("unexpected event: {other:?}"),
    }
}

#[tokio::test]
async fn set_staged_title_on_missing_position_is_an_error() {
    let client = GalleryClient::new();
    client.stage_images(vec![staged("only.png", b"png")]).await;

    let err = client
        .set_staged_title(5, "Nope")
        .await
        .expect_err("must fail");
    match err {
        GalleryError::StagedIndexOutOfRange { index, staged } => {
            assert_eq!(index, 5);
            assert_eq!(staged, 1);
        }
        other => panic!("unexpected error variant: {other:?}"),
    }
    assert_eq!(client.staged_images().await[0].title, None);
}

#[tokio::test]
async fn clearing_a_staged_title_restores_the_default_label() {
    let client = GalleryClient::new();
    client.stage_images(vec![staged("badge.png", b"png")]).await;

    client.set_staged_title(0, "Badge").await.expect("set title");
    assert_eq!(
        client.staged_images().await[0].title.as_deref(),
        Some("Badge")
    );

    client.set_staged_title(0, "").await.expect("clear title");
    assert_eq!(client.staged_images().await[0].title, None);
}

#[tokio::test]
async fn remove_staged_drops_exactly_the_addressed_entry() {
    let client = GalleryClient::new();
    client
        .stage_images(vec![staged("a.png", b"a"), staged("b.png", b"b")])
        .await;

    let removed = client.remove_staged(0).await.expect("remove");
    assert_eq!(removed.file_name, "a.png");

    let remaining = client.staged_images().await;
    assert_eq!(remaining.len(), 1);
    assert_eq!(remaining[0].file_name, "b.png");

    let err = client.remove_staged(7).await.expect_err("out of range");
    assert!(matches!(
        err,
        GalleryError::StagedIndexOutOfRange { index: 7, staged: 1 }
    ));
}

#[test]
fn image_url_joins_origin_and_relative_path() {
    assert_eq!(
        image_url("http://localhost:5000", "uploads/badge.png").expect("join"),
        "http://localhost:5000/uploads/badge.png"
    );
    assert_eq!(
        image_url("http://localhost:5000/", "/uploads/badge.png").expect("join"),
        "http://localhost:5000/uploads/badge.png"
    );
    assert_eq!(
        image_url("https://gallery.example.com/api", "uploads/a.png").expect("join"),
        "https://gallery.example.com/api/uploads/a.png"
    );
}

#[test]
fn image_url_rejects_unparseable_server_urls() {
    let err = image_url("not a url", "uploads/a.png").expect_err("must fail");
    assert!(matches!(err, GalleryError::InvalidServerUrl { .. }));
    assert!(err.is_validation());
}
