//! Pipeline tests against scripted stand-ins for `convert` and `pdfinfo`.
//!
//! Each test writes small `sh` scripts into a temp directory that mimic the
//! tools' command-line contract: the last argument is the output, `null:`
//! prints a connected-components listing, `txt:-` prints a pixel listing,
//! anything else copies a fixture PNG into place. A `file.pdf[N]` argument
//! whose file is gone fails the way ImageMagick does. Every image-tool call is
//! appended to a log so tests can count conversions.
//!
//! Run with:
//!   cargo test --test pipeline

#![cfg(unix)]

use edgequake_pdf2img::{
    convert, convert_from_bytes, convert_page, convert_stream, convert_stream_from_bytes,
    convert_sync, convert_to_file,
    inspect, number_of_pages, split_pages, suggest_margin, suggest_markers,
    ConversionConfigBuilder, ConversionConfig, ConversionProgressCallback, CropRegion,
    ExternalTool, GutterConfig, GutterPosition, PageError, PageSelection, Pdf2ImgError,
};
use futures::StreamExt;
use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, SystemTime};

// ── Fake tools ───────────────────────────────────────────────────────────────

const COMPONENTS: &str = "\
Objects (id: bounding-box centroid area mean-color):
  0: 600x400+0+0 299.5,199.5 230000 srgb(255,255,255)
  1: 580x14+10+120 300.0,127.0 8120 srgb(0,0,0)
  2: 580x12+10+140 300.0,146.0 6960 srgb(0,0,0)
  3: 580x3+10+300 300.0,301.0 1740 srgb(0,0,0)
  4: 580x15+10+260 300.0,267.0 8700 srgb(0,0,0)
";

const PIXELS: &str = "\
# ImageMagick pixel enumeration: 200,3,65535,srgb
30,0: (0,0,0)  #000000  black
80,0: (0,0,0)  #000000  black
150,0: (0,0,0)  #000000  black
30,1: (0,0,0)  #000000  black
80,1: (0,0,0)  #000000  black
150,1: (0,0,0)  #000000  black
30,2: (0,0,0)  #000000  black
80,2: (0,0,0)  #000000  black
81,2: (65535,65535,65535)  #FFFFFF  white
";

struct FakeTools {
    dir: tempfile::TempDir,
    log: PathBuf,
}

impl FakeTools {
    /// `pages` is what `pdfinfo` reports; `fail_page` makes that frame fail.
    fn new(pages: usize, fail_page: Option<usize>) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        let log = root.join("calls.log");
        let fixture = root.join("fixture.png");
        image::RgbImage::new(8, 4).save(&fixture).unwrap();

        let fail_case = fail_page
            .map(|p| {
                format!(
                    "case \"$*\" in *\"[{p}]\"*) echo 'convert: no images defined' >&2; exit 1;; esac\n"
                )
            })
            .unwrap_or_default();

        let convert = format!(
            "printf '%s\\n' \"$*\" >> '{log}'\n\
             for a; do case \"$a\" in *.pdf\\[*\\]) [ -f \"${{a%\\[*\\]}}\" ] || {{ echo 'convert: unable to open image' >&2; exit 1; }};; esac; done\n\
             for last; do :; done\n\
             case \"$last\" in\n\
             null:) cat <<'EOF'\n{COMPONENTS}EOF\n;;\n\
             txt:-) cat <<'EOF'\n{PIXELS}EOF\n;;\n\
             *) {fail_case}cp '{fixture}' \"$last\" ;;\n\
             esac\n",
            log = log.display(),
            fixture = fixture.display(),
        );
        std::fs::write(root.join("convert.sh"), convert).unwrap();

        let pdfinfo = format!(
            "cat <<'EOF'\nTitle:          Fake Survey\nProducer:       test\nPages:          {pages}\nPDF version:    1.4\nEOF\n"
        );
        std::fs::write(root.join("pdfinfo.sh"), pdfinfo).unwrap();

        Self { dir, log }
    }

    fn root(&self) -> &Path {
        self.dir.path()
    }

    fn pdf(&self, name: &str) -> PathBuf {
        let path = self.root().join(name);
        std::fs::write(&path, b"%PDF-1.4\n%fake\n").unwrap();
        path
    }

    fn builder(&self) -> ConversionConfigBuilder {
        ConversionConfig::builder()
            .image_tool(ExternalTool::custom("sh", [self.root().join("convert.sh").display().to_string()]))
            .info_tool(ExternalTool::custom("sh", [self.root().join("pdfinfo.sh").display().to_string()]))
            .concurrency(3)
    }

    fn config(&self) -> ConversionConfig {
        self.builder().build().unwrap()
    }

    fn calls(&self) -> Vec<String> {
        std::fs::read_to_string(&self.log)
            .unwrap_or_default()
            .lines()
            .map(str::to_string)
            .collect()
    }
}

fn set_mtime(path: &Path, at: SystemTime) {
    File::options()
        .append(true)
        .open(path)
        .unwrap()
        .set_modified(at)
        .unwrap();
}

fn file_names(paths: &[PathBuf]) -> Vec<String> {
    paths
        .iter()
        .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
        .collect()
}

// ── Conversion ───────────────────────────────────────────────────────────────

#[tokio::test]
async fn converts_every_page_in_numeric_order() {
    let fake = FakeTools::new(12, None);
    let pdf = fake.pdf("form.pdf");

    let output = convert(pdf.to_str().unwrap(), &fake.config()).await.unwrap();

    let names = file_names(&output.image_paths());
    let expected: Vec<String> = (0..12).map(|i| format!("form-{i}.png")).collect();
    assert_eq!(names, expected);
    assert!(output.image_paths().iter().all(|p| p.parent() == Some(fake.root())));

    assert_eq!(output.stats.total_pages, 12);
    assert_eq!(output.stats.converted_pages, 12);
    assert_eq!(output.stats.reused_pages, 0);
    assert_eq!(output.info.title(), Some("Fake Survey"));
    assert!(output.pages.iter().all(|p| p.regenerated));
    assert_eq!((output.pages[0].width, output.pages[0].height), (Some(8), Some(4)));
    assert_eq!(fake.calls().len(), 12);
}

#[tokio::test]
async fn fresh_images_are_reused_and_stale_ones_regenerated() {
    let fake = FakeTools::new(3, None);
    let pdf = fake.pdf("form.pdf");
    let config = fake.config();

    convert(pdf.to_str().unwrap(), &config).await.unwrap();
    assert_eq!(fake.calls().len(), 3);

    let second = convert(pdf.to_str().unwrap(), &config).await.unwrap();
    assert_eq!(fake.calls().len(), 3, "fresh images must not be regenerated");
    assert_eq!(second.stats.reused_pages, 3);
    assert!(second.pages.iter().all(|p| !p.regenerated));

    // PDF edited after the images were made.
    set_mtime(&pdf, SystemTime::now() + Duration::from_secs(3600));
    let third = convert(pdf.to_str().unwrap(), &config).await.unwrap();
    assert_eq!(fake.calls().len(), 6);
    assert_eq!(third.stats.converted_pages, 3);
}

#[tokio::test]
async fn convert_command_carries_options_and_frame_index() {
    let fake = FakeTools::new(1, None);
    let pdf = fake.pdf("scan.pdf");
    let config = fake
        .builder()
        .convert_option("-density", Some("300"))
        .convert_option("-flatten", None)
        .build()
        .unwrap();

    convert(pdf.to_str().unwrap(), &config).await.unwrap();

    let calls = fake.calls();
    let expected = format!(
        "-density 300 -flatten {}[0] {}",
        pdf.display(),
        fake.root().join("scan-0.png").display()
    );
    assert_eq!(calls, vec![expected]);
}

#[tokio::test]
async fn failed_page_is_reported_without_aborting() {
    let fake = FakeTools::new(3, Some(1));
    let pdf = fake.pdf("form.pdf");

    let output = convert(pdf.to_str().unwrap(), &fake.config()).await.unwrap();

    assert_eq!(output.stats.failed_pages, 1);
    assert_eq!(output.image_paths().len(), 2);
    let err = output.pages[1].error.as_ref().unwrap();
    assert!(matches!(err, PageError::ConvertFailed { page: 1, .. }));
    assert!(err.to_string().contains("Failed to convert page to image"));
    assert!(err.to_string().contains("no images defined"));

    let err = output.into_result().unwrap_err();
    assert!(matches!(err, Pdf2ImgError::PartialFailure { success: 2, failed: 1, total: 3 }));
}

#[tokio::test]
async fn every_page_failing_is_fatal() {
    let fake = FakeTools::new(1, Some(0));
    let pdf = fake.pdf("form.pdf");

    let err = convert(pdf.to_str().unwrap(), &fake.config()).await.unwrap_err();
    assert!(matches!(err, Pdf2ImgError::AllPagesFailed { total: 1, .. }));
}

#[tokio::test]
async fn page_selection_and_output_overrides() {
    let fake = FakeTools::new(5, None);
    let pdf = fake.pdf("form.pdf");
    let out_dir = fake.root().join("nested/out");
    let config = fake
        .builder()
        .pages(PageSelection::Set(vec![5, 2]))
        .output_directory(&out_dir)
        .base_name("page")
        .extension("jpg")
        .build()
        .unwrap();

    let output = convert(pdf.to_str().unwrap(), &config).await.unwrap();

    assert_eq!(file_names(&output.image_paths()), vec!["page-1.jpg", "page-4.jpg"]);
    assert!(out_dir.join("page-4.jpg").is_file());
    assert_eq!(output.stats.selected_pages, 2);
}

#[tokio::test]
async fn selection_beyond_document_is_rejected() {
    let fake = FakeTools::new(2, None);
    let pdf = fake.pdf("form.pdf");
    let config = fake.builder().pages(PageSelection::Single(7)).build().unwrap();

    let err = convert(pdf.to_str().unwrap(), &config).await.unwrap_err();
    assert!(matches!(err, Pdf2ImgError::PageOutOfRange { page: 7, total: 2 }));
}

#[tokio::test]
async fn combined_image_appends_pages_then_removes_them() {
    let fake = FakeTools::new(3, None);
    let pdf = fake.pdf("form.pdf");
    let config = fake.builder().combined_image(true).build().unwrap();

    let output = convert(pdf.to_str().unwrap(), &config).await.unwrap();

    let combined = fake.root().join("form.png");
    assert_eq!(output.combined.as_deref(), Some(combined.as_path()));
    assert_eq!(output.image_paths(), vec![combined.clone()]);
    assert!(combined.is_file());
    assert!(!fake.root().join("form-0.png").exists());

    let append = fake.calls().into_iter().find(|c| c.contains("-append")).unwrap();
    let r = fake.root();
    assert_eq!(
        append,
        format!(
            "{} {} {} -append {}",
            r.join("form-0.png").display(),
            r.join("form-1.png").display(),
            r.join("form-2.png").display(),
            combined.display()
        )
    );
}

#[tokio::test]
async fn combined_image_needs_every_page() {
    let fake = FakeTools::new(3, Some(2));
    let pdf = fake.pdf("form.pdf");
    let config = fake.builder().combined_image(true).build().unwrap();

    let err = convert(pdf.to_str().unwrap(), &config).await.unwrap_err();
    assert!(matches!(err, Pdf2ImgError::PartialFailure { failed: 1, .. }));
    assert!(!fake.calls().iter().any(|c| c.contains("-append")));
}

#[tokio::test]
async fn convert_to_file_writes_combined_image_at_path() {
    let fake = FakeTools::new(2, None);
    let pdf = fake.pdf("form.pdf");
    let target = fake.root().join("out/all-pages.jpg");

    let stats = convert_to_file(pdf.to_str().unwrap(), &target, &fake.config())
        .await
        .unwrap();

    assert_eq!(stats.converted_pages, 2);
    assert!(target.is_file());
    assert!(!fake.root().join("out/all-pages-0.jpg").exists());
}

#[tokio::test]
async fn convert_page_converts_a_single_frame() {
    let fake = FakeTools::new(4, None);
    let pdf = fake.pdf("form.pdf");

    let page = convert_page(&pdf, 3, &fake.config()).await.unwrap();
    assert_eq!(page.path, fake.root().join("form-3.png"));
    assert!(page.regenerated);
    assert!(page.is_ok());

    let again = convert_page(&pdf, 3, &fake.config()).await.unwrap();
    assert!(!again.regenerated);
    assert_eq!(fake.calls().len(), 1);
}

#[tokio::test]
async fn convert_from_bytes_requires_and_uses_output_directory() {
    let fake = FakeTools::new(2, None);
    let bytes = b"%PDF-1.4\n%fake\n";

    let err = convert_from_bytes(bytes, &fake.config()).await.unwrap_err();
    assert!(matches!(err, Pdf2ImgError::InvalidConfig(_)));

    let out = fake.root().join("from-bytes");
    let config = fake.builder().output_directory(&out).base_name("doc").build().unwrap();
    let output = convert_from_bytes(bytes, &config).await.unwrap();
    assert_eq!(file_names(&output.image_paths()), vec!["doc-0.png", "doc-1.png"]);
    assert!(out.join("doc-1.png").is_file());
}

#[tokio::test]
async fn non_pdf_input_is_rejected_before_running_tools() {
    let fake = FakeTools::new(1, None);
    let path = fake.root().join("notes.txt");
    std::fs::write(&path, b"hello").unwrap();

    let err = convert(path.to_str().unwrap(), &fake.config()).await.unwrap_err();
    assert!(matches!(err, Pdf2ImgError::NotAPdf { .. }));
    assert!(fake.calls().is_empty());
}

#[tokio::test]
async fn missing_info_tool_is_reported_with_hint() {
    let fake = FakeTools::new(1, None);
    let pdf = fake.pdf("form.pdf");
    let config = fake
        .builder()
        .info_tool(ExternalTool::custom("/nonexistent/pdfinfo", Vec::<String>::new()))
        .build()
        .unwrap();

    let err = convert(pdf.to_str().unwrap(), &config).await.unwrap_err();
    match err {
        Pdf2ImgError::ToolNotFound { hint, .. } => assert!(hint.contains("poppler")),
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn convert_sync_runs_without_a_runtime() {
    let fake = FakeTools::new(2, None);
    let pdf = fake.pdf("form.pdf");
    let output = convert_sync(pdf.to_str().unwrap(), &fake.config()).unwrap();
    assert_eq!(output.image_paths().len(), 2);
}

// ── Progress and streaming ───────────────────────────────────────────────────

#[derive(Default)]
struct Counting {
    started: AtomicUsize,
    completed: AtomicUsize,
    reused: AtomicUsize,
    errors: AtomicUsize,
    total: AtomicUsize,
    success: AtomicUsize,
}

impl ConversionProgressCallback for Counting {
    fn on_conversion_start(&self, total_pages: usize) {
        self.total.store(total_pages, Ordering::SeqCst);
    }
    fn on_page_start(&self, _page: usize, _total: usize) {
        self.started.fetch_add(1, Ordering::SeqCst);
    }
    fn on_page_complete(&self, _page: usize, _total: usize, _path: &Path, regenerated: bool) {
        self.completed.fetch_add(1, Ordering::SeqCst);
        if !regenerated {
            self.reused.fetch_add(1, Ordering::SeqCst);
        }
    }
    fn on_page_error(&self, _page: usize, _total: usize, _error: &str) {
        self.errors.fetch_add(1, Ordering::SeqCst);
    }
    fn on_conversion_complete(&self, _total: usize, success: usize) {
        self.success.store(success, Ordering::SeqCst);
    }
}

#[tokio::test]
async fn progress_callback_sees_every_page() {
    let fake = FakeTools::new(4, Some(2));
    let pdf = fake.pdf("form.pdf");
    let counting = Arc::new(Counting::default());
    let config = fake.builder().progress_callback(counting.clone()).build().unwrap();

    convert(pdf.to_str().unwrap(), &config).await.unwrap();

    assert_eq!(counting.total.load(Ordering::SeqCst), 4);
    assert_eq!(counting.started.load(Ordering::SeqCst), 4);
    assert_eq!(counting.completed.load(Ordering::SeqCst), 3);
    assert_eq!(counting.errors.load(Ordering::SeqCst), 1);
    assert_eq!(counting.success.load(Ordering::SeqCst), 3);
    assert_eq!(counting.reused.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn stream_yields_pages_and_errors() {
    let fake = FakeTools::new(5, Some(3));
    let pdf = fake.pdf("form.pdf");

    let stream = convert_stream(pdf.to_str().unwrap(), &fake.config()).await.unwrap();
    let items: Vec<_> = stream.collect().await;

    assert_eq!(items.len(), 5);
    let mut ok: Vec<usize> = items.iter().filter_map(|r| r.as_ref().ok()).map(|p| p.page).collect();
    ok.sort_unstable();
    assert_eq!(ok, vec![0, 1, 2, 4]);
    let errs: Vec<usize> = items.iter().filter_map(|r| r.as_ref().err()).map(PageError::page).collect();
    assert_eq!(errs, vec![3]);
}

#[tokio::test]
async fn stream_from_bytes_keeps_temp_pdf_until_done() {
    let fake = FakeTools::new(6, None);
    let out = fake.root().join("streamed");
    let config = fake.builder().output_directory(&out).base_name("doc").concurrency(2).build().unwrap();

    let stream = convert_stream_from_bytes(b"%PDF-1.4\n%fake\n", &config).await.unwrap();
    let items: Vec<_> = stream.collect().await;

    assert_eq!(items.len(), 6);
    for item in &items {
        let page = item.as_ref().unwrap();
        assert!(page.path.is_file(), "{} missing", page.path.display());
    }
    assert_eq!(fake.calls().len(), 6);
}

#[tokio::test]
async fn stream_reports_completion_after_last_page() {
    let fake = FakeTools::new(4, Some(1));
    let pdf = fake.pdf("form.pdf");
    let counting = Arc::new(Counting::default());
    let config = fake.builder().progress_callback(counting.clone()).build().unwrap();

    let mut stream = convert_stream(pdf.to_str().unwrap(), &config).await.unwrap();
    let mut seen = 0;
    while let Some(_page) = stream.next().await {
        seen += 1;
        assert_eq!(counting.success.load(Ordering::SeqCst), 0, "completion fired early");
    }

    assert_eq!(seen, 4);
    assert_eq!(counting.total.load(Ordering::SeqCst), 4);
    assert_eq!(counting.errors.load(Ordering::SeqCst), 1);
    assert_eq!(counting.success.load(Ordering::SeqCst), 3);
}

// ── Info and split ───────────────────────────────────────────────────────────

#[tokio::test]
async fn inspect_and_page_count() {
    let fake = FakeTools::new(7, None);
    let pdf = fake.pdf("form.pdf");

    let info = inspect(pdf.to_str().unwrap(), &fake.config()).await.unwrap();
    assert_eq!(info.page_count(), Some(7));
    assert_eq!(info.pdf_version(), Some("1.4"));
    assert_eq!(number_of_pages(pdf.to_str().unwrap(), &fake.config()).await.unwrap(), 7);
}

#[tokio::test]
async fn split_pages_writes_once_then_reuses() {
    let fake = FakeTools::new(9, None);
    let pdf = fake.pdf("book.pdf");
    let config = fake.builder().base_name("part").extension("pdf").build().unwrap();

    let out = split_pages(pdf.to_str().unwrap(), "3-6", None, &config).await.unwrap();
    assert_eq!(out, fake.root().join("part.pdf"));
    assert_eq!(fake.calls(), vec![format!("{}[3-6] {}", pdf.display(), out.display())]);

    let out = split_pages(pdf.to_str().unwrap(), "1,3,7", Some(2), &config).await.unwrap();
    assert_eq!(out, fake.root().join("part-2.pdf"));
    assert_eq!(fake.calls().len(), 2);

    split_pages(pdf.to_str().unwrap(), "1,3,7", Some(2), &config).await.unwrap();
    assert_eq!(fake.calls().len(), 2, "up-to-date output must be reused");
}

#[tokio::test]
async fn split_pages_rejects_bad_list() {
    let fake = FakeTools::new(9, None);
    let pdf = fake.pdf("book.pdf");
    let err = split_pages(pdf.to_str().unwrap(), "3-", None, &fake.config())
        .await
        .unwrap_err();
    assert!(matches!(err, Pdf2ImgError::InvalidPageList(_)));
}

// ── Analysis ─────────────────────────────────────────────────────────────────

#[tokio::test]
async fn suggest_markers_clusters_component_rows() {
    let fake = FakeTools::new(1, None);
    let scan = fake.root().join("fixture.png");
    let crop = CropRegion::new(277, 2111, 0, 0);

    let markers = suggest_markers(scan.to_str().unwrap(), Some(crop), &fake.config())
        .await
        .unwrap();

    // 140 merges into 120; the 3px-high component at 300 is a ghost.
    assert_eq!(markers, vec![120, 260]);
    let call = &fake.calls()[0];
    assert!(call.starts_with(&format!("{} -crop 277x2111+0+0 +repage -strip", scan.display())));
    assert!(call.ends_with("-connected-components 8 null:"));
}

#[tokio::test]
async fn suggest_markers_defaults_to_whole_image() {
    let fake = FakeTools::new(1, None);
    let scan = fake.root().join("fixture.png");

    suggest_markers(scan.to_str().unwrap(), None, &fake.config())
        .await
        .unwrap();
    assert!(fake.calls()[0].contains("-crop 8x4+0+0"));
}

#[tokio::test]
async fn suggest_margin_finds_column_in_every_row() {
    let fake = FakeTools::new(1, None);
    let scan = fake.root().join("fixture.png");
    let crop = CropRegion::new(200, 3, 0, 0);

    let pos = suggest_margin(scan.to_str().unwrap(), Some(crop), &fake.config())
        .await
        .unwrap();

    // Column 30 is a ghost, 150 misses a row, 80 is in all three.
    assert_eq!(pos, GutterPosition::Detected(100));
    assert_eq!(
        fake.calls()[0],
        format!("-crop 200x3+0+0 +repage {} txt:-", scan.display())
    );
}

#[tokio::test]
async fn suggest_margin_falls_back_to_width_share() {
    let fake = FakeTools::new(1, None);
    let scan = fake.root().join("fixture.png");
    let config = fake
        .builder()
        .gutter(GutterConfig {
            override_fraction: Some(0.25),
            ..Default::default()
        })
        .build()
        .unwrap();

    // Ten rows: no column appears in all of them.
    let crop = CropRegion::new(200, 10, 0, 0);
    let pos = suggest_margin(scan.to_str().unwrap(), Some(crop), &config)
        .await
        .unwrap();
    assert_eq!(pos, GutterPosition::Fallback(50));
}
