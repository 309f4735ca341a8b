//! HTTP-level tests for the image to PDF service

use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    response::Response,
    Router,
};
use image::{DynamicImage, GrayImage, ImageOutputFormat, Rgb, RgbImage, Rgba, RgbaImage};
use imgpdf::{create_router, AppState, Config};
use lopdf::Document;
use std::io::Cursor;
use std::path::Path;
use tempfile::TempDir;
use tower::ServiceExt;

const BOUNDARY: &str = "imgpdf-test-boundary";

struct Part {
    field: &'static str,
    file_name: &'static str,
    content_type: &'static str,
    data: Vec<u8>,
}

fn image_part(file_name: &'static str, content_type: &'static str, data: Vec<u8>) -> Part {
    Part {
        field: "images",
        file_name,
        content_type,
        data,
    }
}

fn jpeg_bytes(width: u32, height: u32) -> Vec<u8> {
    let img = DynamicImage::ImageRgb8(RgbImage::from_pixel(width, height, Rgb([200, 40, 40])));
    let mut cursor = Cursor::new(Vec::new());
    img.write_to(&mut cursor, ImageOutputFormat::Jpeg(85)).unwrap();
    cursor.into_inner()
}

fn png_bytes(width: u32, height: u32) -> Vec<u8> {
    let img = DynamicImage::ImageRgba8(RgbaImage::from_pixel(width, height, Rgba([20, 90, 200, 180])));
    let mut cursor = Cursor::new(Vec::new());
    img.write_to(&mut cursor, ImageOutputFormat::Png).unwrap();
    cursor.into_inner()
}

// 1x1 GIF89a.
const TINY_GIF: &[u8] = b"GIF89a\x01\x00\x01\x00\x80\x00\x00\xff\xff\xff\x00\x00\x00!\xf9\x04\x01\x00\x00\x00\x00,\x00\x00\x00\x00\x01\x00\x01\x00\x00\x02\x02D\x01\x00;";

/// Few bytes on disk, lots of pixels once decoded.
fn sparse_png(width: u32, height: u32) -> Vec<u8> {
    let img = DynamicImage::ImageLuma8(GrayImage::new(width, height));
    let mut cursor = Cursor::new(Vec::new());
    img.write_to(&mut cursor, ImageOutputFormat::Png).unwrap();
    cursor.into_inner()
}

fn multipart_body(parts: &[Part]) -> Vec<u8> {
    let mut body = Vec::new();
    for part in parts {
        body.extend_from_slice(format!("--{}\r\n", BOUNDARY).as_bytes());
        body.extend_from_slice(
            format!(
                "Content-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\n",
                part.field, part.file_name
            )
            .as_bytes(),
        );
        body.extend_from_slice(format!("Content-Type: {}\r\n\r\n", part.content_type).as_bytes());
        body.extend_from_slice(&part.data);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{}--\r\n", BOUNDARY).as_bytes());
    body
}

fn convert_request(parts: &[Part]) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/convert")
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={}", BOUNDARY),
        )
        .body(Body::from(multipart_body(parts)))
        .unwrap()
}

struct TestApp {
    _root: TempDir,
    staging_dir: std::path::PathBuf,
    state: AppState,
}

impl TestApp {
    fn new() -> Self {
        Self::with_limit(4)
    }

    fn with_limit(max_concurrent_requests: usize) -> Self {
        Self::with_config(|config| config.max_concurrent_requests = max_concurrent_requests)
    }

    fn with_config(adjust: impl FnOnce(&mut Config)) -> Self {
        let root = tempfile::tempdir().unwrap();
        let staging_dir = root.path().join("staging");
        let public_dir = root.path().join("public");
        std::fs::create_dir_all(&public_dir).unwrap();
        std::fs::write(public_dir.join("styles.css"), "body {}").unwrap();

        let mut config = Config {
            server_host: "127.0.0.1".to_string(),
            staging_dir: staging_dir.clone(),
            public_dir,
            max_concurrent_requests: 4,
            ..Config::default()
        };
        adjust(&mut config);
        config.validate().unwrap();

        Self {
            _root: root,
            staging_dir,
            state: AppState::new(config),
        }
    }

    fn router(&self) -> Router {
        create_router(self.state.clone())
    }

    async fn send(&self, request: Request<Body>) -> Response {
        self.router().oneshot(request).await.unwrap()
    }
}

async fn body_bytes(response: Response) -> Vec<u8> {
    axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap()
        .to_vec()
}

fn page_sizes(pdf: &[u8]) -> Vec<(i64, i64)> {
    let doc = Document::load_mem(pdf).unwrap();
    doc.get_pages()
        .values()
        .map(|page_id| {
            let media_box = doc
                .get_dictionary(*page_id)
                .unwrap()
                .get(b"MediaBox")
                .unwrap()
                .as_array()
                .unwrap();
            (
                media_box[2].as_i64().unwrap(),
                media_box[3].as_i64().unwrap(),
            )
        })
        .collect()
}

fn staged_entries(dir: &Path) -> usize {
    match std::fs::read_dir(dir) {
        Ok(entries) => entries.count(),
        Err(_) => 0,
    }
}

#[tokio::test]
async fn test_jpeg_and_png_become_pages_in_upload_order() {
    let app = TestApp::new();

    let response = app
        .send(convert_request(&[
            image_part("first.jpg", "image/jpeg", jpeg_bytes(800, 600)),
            image_part("second.png", "image/png", png_bytes(300, 300)),
        ]))
        .await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[header::CONTENT_TYPE], "application/pdf");
    assert_eq!(
        response.headers()[header::CONTENT_DISPOSITION],
        "attachment; filename=converted.pdf"
    );
    assert_eq!(response.headers()["x-pages-rendered"], "2");
    assert_eq!(response.headers()["x-images-skipped"], "0");

    let pdf = body_bytes(response).await;
    assert!(pdf.starts_with(b"%PDF-"));
    assert_eq!(page_sizes(&pdf), vec![(800, 600), (300, 300)]);
}

#[tokio::test]
async fn test_corrupted_image_is_skipped() {
    let app = TestApp::new();

    let response = app
        .send(convert_request(&[
            image_part("broken.jpg", "image/jpeg", b"definitely not a jpeg".to_vec()),
            image_part("valid.png", "image/png", png_bytes(120, 80)),
        ]))
        .await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()["x-images-skipped"], "1");

    let pdf = body_bytes(response).await;
    assert_eq!(page_sizes(&pdf), vec![(120, 80)]);
}

#[tokio::test]
async fn test_all_images_failing_to_decode_yields_empty_document() {
    let app = TestApp::new();

    let response = app
        .send(convert_request(&[
            image_part("empty.png", "image/png", Vec::new()),
            image_part("junk.jpg", "image/jpeg", vec![0u8; 64]),
        ]))
        .await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()["x-pages-rendered"], "0");

    let pdf = body_bytes(response).await;
    assert!(page_sizes(&pdf).is_empty());
}

#[tokio::test]
async fn test_no_files_is_bad_request() {
    let app = TestApp::new();

    let response = app
        .send(convert_request(&[Part {
            field: "caption",
            file_name: "note.txt",
            content_type: "text/plain",
            data: b"hello".to_vec(),
        }]))
        .await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(response.headers()[header::CONTENT_TYPE]
        .to_str()
        .unwrap()
        .starts_with("text/plain"));
    let body = body_bytes(response).await;
    assert_eq!(String::from_utf8(body).unwrap(), "No images uploaded");
    assert_eq!(staged_entries(&app.staging_dir), 0);
}

#[tokio::test]
async fn test_disallowed_extension_is_excluded() {
    let app = TestApp::new();

    let only_gif = app
        .send(convert_request(&[image_part("anim.gif", "image/gif", b"GIF89a".to_vec())]))
        .await;
    assert_eq!(only_gif.status(), StatusCode::BAD_REQUEST);

    let mixed = app
        .send(convert_request(&[
            image_part("anim.gif", "image/gif", b"GIF89a".to_vec()),
            image_part("photo.jpeg", "image/jpeg", jpeg_bytes(64, 48)),
        ]))
        .await;
    assert_eq!(mixed.status(), StatusCode::OK);
    // Excluded at the boundary, so it is not counted as a skipped decode.
    assert_eq!(mixed.headers()["x-images-skipped"], "0");

    let pdf = body_bytes(mixed).await;
    assert_eq!(page_sizes(&pdf), vec![(64, 48)]);
}

#[tokio::test]
async fn test_mime_type_must_match_extension_set() {
    let app = TestApp::new();

    let response = app
        .send(convert_request(&[image_part(
            "disguised.png",
            "application/octet-stream",
            png_bytes(10, 10),
        )]))
        .await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_conversion_is_repeatable() {
    let app = TestApp::new();
    let first_jpeg = jpeg_bytes(320, 240);
    let second_png = png_bytes(50, 75);

    let mut runs = Vec::new();
    for _ in 0..2 {
        let response = app
            .send(convert_request(&[
                image_part("a.jpg", "image/jpeg", first_jpeg.clone()),
                image_part("b.png", "image/png", second_png.clone()),
            ]))
            .await;
        assert_eq!(response.status(), StatusCode::OK);
        runs.push(page_sizes(&body_bytes(response).await));
    }

    assert_eq!(runs[0], runs[1]);
    assert_eq!(runs[0], vec![(320, 240), (50, 75)]);
}

#[tokio::test]
async fn test_staging_is_empty_after_every_request() {
    let app = TestApp::new();

    let ok = app
        .send(convert_request(&[image_part("a.png", "image/png", png_bytes(8, 8))]))
        .await;
    assert_eq!(ok.status(), StatusCode::OK);
    assert_eq!(staged_entries(&app.staging_dir), 0);

    let partial = app
        .send(convert_request(&[
            image_part("bad.jpg", "image/jpeg", b"nope".to_vec()),
            image_part("good.jpg", "image/jpeg", jpeg_bytes(16, 16)),
        ]))
        .await;
    assert_eq!(partial.status(), StatusCode::OK);
    assert_eq!(staged_entries(&app.staging_dir), 0);

    let rejected = app
        .send(convert_request(&[image_part("x.bmp", "image/bmp", vec![1, 2, 3])]))
        .await;
    assert_eq!(rejected.status(), StatusCode::BAD_REQUEST);
    assert_eq!(staged_entries(&app.staging_dir), 0);
}

#[tokio::test]
async fn test_malformed_multipart_is_client_error() {
    let app = TestApp::new();

    let request = Request::builder()
        .method("POST")
        .uri("/convert")
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={}", BOUNDARY),
        )
        .body(Body::from("--imgpdf-test-boundary\r\nthis is not a valid part"))
        .unwrap();

    let response = app.send(request).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(staged_entries(&app.staging_dir), 0);
}

#[tokio::test]
async fn test_rate_limit_rejects_when_saturated() {
    let app = TestApp::with_limit(1);
    let _held = app.state.limiter.try_acquire().unwrap();

    let response = app
        .send(convert_request(&[image_part("a.png", "image/png", png_bytes(4, 4))]))
        .await;

    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(app.state.limiter.stats().rejected_requests, 1);
}

#[tokio::test]
async fn test_health_endpoints() {
    let app = TestApp::new();

    let response = app
        .send(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_bytes(response).await, b"OK");

    let response = app
        .send(Request::builder().uri("/health/details").body(Body::empty()).unwrap())
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let details: serde_json::Value = serde_json::from_slice(&body_bytes(response).await).unwrap();
    assert_eq!(details["status"], "healthy");
    assert_eq!(details["rate_limiting"]["available_permits"], 4);
}

#[tokio::test]
async fn test_index_serves_upload_form() {
    let app = TestApp::new();

    let response = app
        .send(Request::builder().uri("/").body(Body::empty()).unwrap())
        .await;
    assert_eq!(response.status(), StatusCode::OK);

    let html = String::from_utf8(body_bytes(response).await).unwrap();
    assert!(html.contains("action=\"/convert\""));
    assert!(html.contains("name=\"images\""));
    assert!(html.contains("multipart/form-data"));
}

#[tokio::test]
async fn test_public_assets_served_but_not_staging() {
    let app = TestApp::new();

    let response = app
        .send(Request::builder().uri("/styles.css").body(Body::empty()).unwrap())
        .await;
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .send(Request::builder().uri("/uploads/anything.png").body(Body::empty()).unwrap())
        .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = app
        .send(Request::builder().uri("/staging").body(Body::empty()).unwrap())
        .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_responses_carry_request_id() {
    let app = TestApp::new();

    let response = app
        .send(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await;
    assert!(response.headers().contains_key("x-request-id"));
}

#[tokio::test]
async fn test_gif_named_png_is_skipped() {
    let app = TestApp::new();

    let response = app
        .send(convert_request(&[
            image_part("x.png", "image/png", TINY_GIF.to_vec()),
            image_part("real.png", "image/png", png_bytes(30, 20)),
        ]))
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()["x-pages-rendered"], "1");
    assert_eq!(response.headers()["x-images-skipped"], "1");
    assert_eq!(page_sizes(&body_bytes(response).await), vec![(30, 20)]);

    let alone = app
        .send(convert_request(&[image_part("x.png", "image/png", TINY_GIF.to_vec())]))
        .await;
    assert_eq!(alone.status(), StatusCode::OK);
    assert_eq!(alone.headers()["x-pages-rendered"], "0");
}

#[tokio::test]
async fn test_oversized_dimensions_are_skipped() {
    let app = TestApp::with_config(|config| {
        config.max_image_pixels = 1_000_000;
        config.max_request_pixels = 1_500_000;
    });

    // 4000x4000 grey compresses to a few kilobytes but is 16M pixels.
    let huge = sparse_png(4_000, 4_000);
    assert!(huge.len() < 256 * 1024);

    let response = app
        .send(convert_request(&[
            image_part("huge.png", "image/png", huge),
            image_part("small.png", "image/png", png_bytes(100, 100)),
        ]))
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()["x-images-skipped"], "1");
    assert_eq!(page_sizes(&body_bytes(response).await), vec![(100, 100)]);
    assert_eq!(staged_entries(&app.staging_dir), 0);
}

#[tokio::test]
async fn test_request_pixel_budget_spans_images() {
    let app = TestApp::with_config(|config| {
        config.max_image_pixels = 1_000_000;
        config.max_request_pixels = 1_500_000;
    });

    // Each fits on its own; the second would take the request past its budget.
    let response = app
        .send(convert_request(&[
            image_part("a.png", "image/png", sparse_png(1_000, 1_000)),
            image_part("b.png", "image/png", sparse_png(1_000, 1_000)),
            image_part("c.png", "image/png", sparse_png(500, 500)),
        ]))
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()["x-pages-rendered"], "2");
    assert_eq!(response.headers()["x-images-skipped"], "1");
    assert_eq!(
        page_sizes(&body_bytes(response).await),
        vec![(1_000, 1_000), (500, 500)]
    );
}

#[tokio::test]
async fn test_page_side_over_pdf_limit_is_skipped() {
    let app = TestApp::new();

    let response = app
        .send(convert_request(&[
            image_part("banner.png", "image/png", sparse_png(14_401, 1)),
            image_part("edge.png", "image/png", sparse_png(14_400, 1)),
        ]))
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()["x-images-skipped"], "1");
    assert_eq!(page_sizes(&body_bytes(response).await), vec![(14_400, 1)]);
}

#[tokio::test]
async fn test_incoming_request_id_is_kept() {
    let app = TestApp::new();

    let mut request = convert_request(&[]);
    request
        .headers_mut()
        .insert("x-request-id", "abc-123".parse().unwrap());

    let response = app.send(request).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(response.headers()["x-request-id"], "abc-123");
}
