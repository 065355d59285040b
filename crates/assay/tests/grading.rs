use anyhow::Result;
use assay::{
    AggregationPolicy, AssayConfig, ComparatorSettings, GradeError, Grader, GradingRequest, ResponsiveComparator,
    ScoreBand, ViewportOutcome,
};
use core::time::Duration;
use pixel_diff::Bitmap;
use probe::{FunctionalStrategy, parse_scenarios};
use sandbox::memory::{MemoryDocument, MemoryHandle, MemoryRasterizer, MemorySandbox};
use sandbox::{SandboxError, SandboxHandle as _, Submission, ViewportPreset};

const RED: [u8; 4] = [255, 0, 0, 255];

/// Marker in a submission's script that makes it paint solid red below 400px.
const BROKEN_ON_MOBILE: &str = "// broken-mobile";

fn init_logging() {
    let _log_init: Result<(), _> = env_logger::builder().is_test(true).try_init();
}

/// Reference pages are blank; submissions carrying the marker render solid
/// red on narrow viewports.
fn paint(handle: &MemoryHandle, width: u32, height: u32) -> Result<Bitmap, SandboxError> {
    if handle.submission().js.contains(BROKEN_ON_MOBILE) && handle.viewport().width < 400 {
        return Ok(Bitmap::filled(width, height, RED));
    }
    Ok(Bitmap::white(width, height))
}

fn add_from_input(document: &mut MemoryDocument) {
    let (Some(input), Some(list)) = (document.find("#todo-input"), document.find("#todo-list")) else {
        return;
    };
    let text = document.value(input).unwrap_or_default().to_owned();
    document.append(list, "li.item", &text);
    document.set_value(input, "");
}

fn todo_document(_: &Submission) -> MemoryDocument {
    let mut document = MemoryDocument::new();
    let root = document.root();
    let input = document.append(root, "input#todo-input", "");
    document.set_value(input, "Buy milk");
    document.append(root, "button#add-button", "Add");
    document.append(root, "ul#todo-list", "");
    document.on_click("#add-button", add_from_input);
    document
}

fn quick_config() -> AssayConfig {
    AssayConfig {
        settle_ms: 1,
        step_timeout_ms: 1_000,
        ..AssayConfig::new()
    }
}

fn request(policy: AggregationPolicy) -> Result<GradingRequest> {
    let scenarios = parse_scenarios(
        r##"[{"name":"add","steps":[
            {"type":"click","selector":"#add-button"},
            {"type":"check","selector":"#todo-list","expectItems":1,"itemSelector":"li"}
        ]}]"##,
    )?;
    Ok(GradingRequest {
        submission: Submission::new("<ul id=\"todo-list\"></ul>", "", BROKEN_ON_MOBILE),
        reference: Submission::new("<ul id=\"todo-list\"></ul>", "", ""),
        strategy: FunctionalStrategy::Scenarios(scenarios),
        policy,
    })
}

#[tokio::test]
async fn failing_viewport_is_excluded_from_the_means() -> Result<()> {
    init_logging();
    let sandbox = MemorySandbox::new(todo_document);
    let rasterizer = MemoryRasterizer::new(paint).failing_on("Tablet");
    let comparator = ResponsiveComparator::new(&sandbox, &rasterizer, ComparatorSettings::default());
    let submission = Submission::new("", "", BROKEN_ON_MOBILE);

    let report = comparator
        .compare(&submission, &Submission::default(), &ViewportPreset::reference_set())
        .await;

    let names: Vec<&str> = report.viewports.iter().map(ViewportOutcome::viewport).collect();
    assert_eq!(names, ["Mobile", "Tablet", "Desktop"]);
    assert_eq!(report.valid_comparisons, 2);
    assert!(matches!(
        &report.viewports[1],
        ViewportOutcome::Errored { error, .. } if error.contains("injected capture failure")
    ));

    let mobile = report.viewports[0].score().map(|score| (score.pixel_match_score, score.resemble_score));
    assert_eq!(mobile, Some((0, 0)));
    let overall = report.overall.ok_or_else(|| anyhow::anyhow!("expected valid comparisons"))?;
    assert_eq!((overall.pixel, overall.resemblance, overall.combined), (50, 50, 50));
    assert_eq!(overall.layout, Some(100));
    Ok(())
}

#[tokio::test]
async fn four_metric_grade_combines_every_score() -> Result<()> {
    init_logging();
    let sandbox = MemorySandbox::new(todo_document);
    let rasterizer = MemoryRasterizer::new(paint).failing_on("Tablet");
    let grader = Grader::new(&sandbox, &rasterizer, quick_config());

    let report = grader.grade(&request(AggregationPolicy::four_metric())?).await?;

    assert_eq!(report.functional.score, Some(100));
    assert_eq!(report.score.visual_pixel, Some(50));
    assert_eq!(report.score.visual_resemblance, Some(50));
    assert_eq!(report.score.layout, Some(100));
    assert_eq!(report.score.total, Some(75));
    assert_eq!(report.score.band, Some(ScoreBand::Warn));
    assert_eq!(report.score.policy, "four_metric");
    Ok(())
}

#[tokio::test]
async fn two_metric_grade_uses_the_visual_mean() -> Result<()> {
    init_logging();
    let sandbox = MemorySandbox::new(todo_document);
    let rasterizer = MemoryRasterizer::new(paint).failing_on("Tablet");
    let grader = Grader::new(&sandbox, &rasterizer, quick_config());

    let report = grader.grade(&request(AggregationPolicy::two_metric())?).await?;

    assert_eq!(report.score.visual, Some(50));
    assert_eq!(report.score.total, Some(80));
    assert_eq!(report.score.band, Some(ScoreBand::Pass));
    Ok(())
}

#[tokio::test]
async fn disabled_layout_pass_leaves_four_metric_total_unmeasured() -> Result<()> {
    init_logging();
    let sandbox = MemorySandbox::new(todo_document);
    let rasterizer = MemoryRasterizer::blank();
    let config = AssayConfig {
        layout_enabled: false,
        ..quick_config()
    };
    let grader = Grader::new(&sandbox, &rasterizer, config);

    let report = grader.grade(&request(AggregationPolicy::four_metric())?).await?;

    assert_eq!(report.score.visual_pixel, Some(100));
    assert_eq!(report.score.layout, None);
    assert_eq!(report.score.total, None);
    assert!(report.responsive.viewports.iter().all(|outcome| {
        outcome
            .score()
            .is_some_and(|score| score.layout.is_none() && score.layout_score.is_none())
    }));
    Ok(())
}

#[tokio::test]
async fn no_valid_comparisons_returns_the_partial_report() -> Result<()> {
    init_logging();
    let sandbox = MemorySandbox::new(todo_document);
    let rasterizer = MemoryRasterizer::blank()
        .failing_on("Mobile")
        .failing_on("Tablet")
        .failing_on("Desktop");
    let grader = Grader::new(&sandbox, &rasterizer, quick_config());

    let outcome = grader.grade(&request(AggregationPolicy::four_metric())?).await;

    let report = match outcome {
        Err(GradeError::NoValidComparisons { report }) => report,
        other => anyhow::bail!("expected NoValidComparisons, got {other:?}"),
    };
    assert_eq!(report.responsive.valid_comparisons, 0);
    assert!(report.responsive.overall.is_none());
    assert_eq!(report.score.functional, Some(100));
    assert_eq!(report.score.visual_pixel, None);
    assert_eq!(report.score.total, None);
    Ok(())
}

#[tokio::test]
async fn unrenderable_functional_run_leaves_the_total_unmeasured() -> Result<()> {
    init_logging();
    let sandbox = MemorySandbox::new(todo_document).failing_on("Desktop");
    let rasterizer = MemoryRasterizer::new(paint);

    let four = Grader::new(&sandbox, &rasterizer, quick_config())
        .grade(&request(AggregationPolicy::four_metric())?)
        .await?;
    assert_eq!(four.functional.score, None);
    assert!(four.functional.error.is_some());
    assert_eq!(four.score.functional, None);
    assert_eq!(four.responsive.valid_comparisons, 2);
    assert_eq!(four.score.visual_pixel, Some(50));
    assert_eq!(four.score.total, None);
    assert_eq!(four.score.band, None);

    let two = Grader::new(&sandbox, &rasterizer, quick_config())
        .grade(&request(AggregationPolicy::two_metric())?)
        .await?;
    assert_eq!(two.score.visual, Some(50));
    assert_eq!(two.score.total, None);
    Ok(())
}

/// Layout-normalized pages carry `data-original-src` where an image was.
fn layout_capture_fails(handle: &MemoryHandle, width: u32, height: u32) -> Result<Bitmap, SandboxError> {
    if handle.submission().html.contains("data-original-src") {
        return Err(SandboxError::Capture("layout capture failed".to_owned()));
    }
    Ok(Bitmap::white(width, height))
}

#[tokio::test]
async fn failed_layout_pass_keeps_the_visual_scores() -> Result<()> {
    init_logging();
    let sandbox = MemorySandbox::new(todo_document);
    let rasterizer = MemoryRasterizer::new(layout_capture_fails);
    let comparator = ResponsiveComparator::new(&sandbox, &rasterizer, ComparatorSettings::default());
    let page = Submission::new("<img src=\"cat.png\" width=\"40\" height=\"30\">", "", "");

    let report = comparator
        .compare(&page, &page, &[ViewportPreset::new("Mobile", 360, 640)])
        .await;

    assert_eq!(report.valid_comparisons, 1);
    let score = report.viewports[0]
        .score()
        .ok_or_else(|| anyhow::anyhow!("expected a compared viewport"))?;
    assert_eq!((score.pixel_match_score, score.resemble_score), (100, 100));
    assert!(score.layout.is_none());
    assert_eq!(score.layout_score, None);
    assert_eq!(score.layout_error.as_deref(), Some("capture failed: layout capture failed"));
    let overall = report.overall.ok_or_else(|| anyhow::anyhow!("expected valid comparisons"))?;
    assert_eq!(overall.pixel, 100);
    assert_eq!(overall.layout, None);
    Ok(())
}

#[tokio::test]
async fn slow_captures_time_out_per_viewport() -> Result<()> {
    init_logging();
    let sandbox = MemorySandbox::new(todo_document);
    let rasterizer = MemoryRasterizer::blank().with_delay(Duration::from_millis(200));
    let settings = ComparatorSettings {
        capture_timeout: Duration::from_millis(5),
        ..ComparatorSettings::default()
    };
    let comparator = ResponsiveComparator::new(&sandbox, &rasterizer, settings);

    let report = comparator
        .compare(
            &Submission::default(),
            &Submission::default(),
            &[ViewportPreset::new("Mobile", 360, 640)],
        )
        .await;

    assert_eq!(report.valid_comparisons, 0);
    assert!(matches!(
        &report.viewports[0],
        ViewportOutcome::Errored { error, .. } if error.starts_with("capture timed out")
    ));
    Ok(())
}

#[tokio::test]
async fn invalid_requests_fail_before_rendering() -> Result<()> {
    init_logging();
    let sandbox = MemorySandbox::new(todo_document);
    let rasterizer = MemoryRasterizer::blank();

    let bad_threshold = AssayConfig {
        threshold: 2.0,
        ..quick_config()
    };
    let outcome = Grader::new(&sandbox, &rasterizer, bad_threshold)
        .grade(&request(AggregationPolicy::four_metric())?)
        .await;
    assert!(matches!(outcome, Err(GradeError::InvalidConfig(_))));

    let empty_strategy = GradingRequest {
        strategy: FunctionalStrategy::Scenarios(Vec::new()),
        ..request(AggregationPolicy::two_metric())?
    };
    let strategy_outcome = Grader::new(&sandbox, &rasterizer, quick_config())
        .grade(&empty_strategy)
        .await;
    assert!(matches!(strategy_outcome, Err(GradeError::Probe(_))));
    assert_eq!(sandbox.render_count(), 0);
    Ok(())
}

#[tokio::test]
async fn artifacts_are_written_per_viewport_and_mode() -> Result<()> {
    init_logging();
    let sandbox = MemorySandbox::new(todo_document);
    let rasterizer = MemoryRasterizer::new(paint).failing_on("Tablet");
    let grader = Grader::new(&sandbox, &rasterizer, quick_config());
    let report = grader.grade(&request(AggregationPolicy::four_metric())?).await?;

    let dir = tempfile::tempdir()?;
    let written = report.write_artifacts(dir.path())?;

    let names: Vec<String> = written
        .iter()
        .filter_map(|path| path.file_name())
        .map(|name| name.to_string_lossy().into_owned())
        .collect();
    assert_eq!(
        names,
        [
            "mobile.raw.diff.png",
            "mobile.layout.diff.png",
            "desktop.raw.diff.png",
            "desktop.layout.diff.png"
        ]
    );
    assert!(written.iter().all(|path| path.is_file()));
    Ok(())
}
