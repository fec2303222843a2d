//! Library-level conversion tests against stub OpenSCAD scripts.

#![cfg(unix)]

mod common;

use common::*;
use std::time::{Duration, Instant};
use svg2stl::pipeline::locate::locate_tool;
use svg2stl::{
    check_tool, convert, convert_from_bytes, ConversionConfig, Converter, ErrorKind, Svg2StlError,
};

// ── Helpers ──────────────────────────────────────────────────────────────────

struct Fixture {
    tools: tempfile::TempDir,
    work: tempfile::TempDir,
    tool: std::path::PathBuf,
}

impl Fixture {
    fn new(script: &str) -> Self {
        let tools = tempfile::tempdir().unwrap();
        let tool = write_stub(tools.path(), "openscad", script);
        let work = tempfile::tempdir().unwrap();
        Self {
            tools,
            work,
            tool,
        }
    }

    fn svg(&self, name: &str, content: &str) -> std::path::PathBuf {
        let path = self.work.path().join(name);
        std::fs::write(&path, content).unwrap();
        path
    }
}

// ── Success ──────────────────────────────────────────────────────────────────

#[tokio::test]
async fn converts_with_a_working_tool() {
    let fx = Fixture::new(SUCCEEDS);
    let svg = fx.svg("logo.svg", LOGO_SVG);
    let stl = fx.work.path().join("logo.stl");

    let output = convert(&svg, &stl, &config_for(&fx.tool)).await.unwrap();

    assert_eq!(output.output_path, stl);
    assert_eq!(output.tool_path, fx.tool);
    let mesh = std::fs::read_to_string(&stl).unwrap();
    assert_eq!(output.output_bytes, mesh.len() as u64);
    assert!(mesh.starts_with("solid stub"), "{mesh}");

    // The descriptor imports the document by bare name and runs from its directory.
    assert!(mesh.contains("import(\"logo.svg\", center = true);"), "{mesh}");
    assert!(mesh.contains("linear_extrude(height = 5, center = false, convexity = 10)"));
    let cwd = fx.work.path().canonicalize().unwrap();
    assert!(mesh.contains(&format!("cwd: {}", cwd.display())), "{mesh}");

    // Only the document and the mesh remain; the descriptor is gone.
    assert_eq!(file_names(fx.work.path()), ["logo.stl", "logo.svg"]);
}

#[tokio::test]
async fn height_and_full_render_reach_the_tool() {
    let fx = Fixture::new(SUCCEEDS);
    let svg = fx.svg("badge.svg", LOGO_SVG);
    let stl = fx.work.path().join("badge.stl");
    let config = ConversionConfig::builder()
        .tool_candidates([&fx.tool])
        .extrude_height(2.5)
        .full_render(true)
        .build()
        .unwrap();

    convert(&svg, &stl, &config).await.unwrap();

    let mesh = std::fs::read_to_string(&stl).unwrap();
    assert!(mesh.contains("// Extrude height: 2.5mm"), "{mesh}");
    assert!(mesh.contains("--render"), "{mesh}");
    let args = mesh.lines().find(|l| l.starts_with("args:")).unwrap();
    assert!(args.contains(&format!("-o {}", stl.display())), "{args}");
}

#[tokio::test]
async fn converts_from_bytes() {
    let fx = Fixture::new(SUCCEEDS);
    let stl = convert_from_bytes(LOGO_SVG.as_bytes(), "nested/dir/logo.svg", &config_for(&fx.tool))
        .await
        .unwrap();
    let text = String::from_utf8(stl).unwrap();
    assert!(text.starts_with("solid stub"));
    assert!(text.contains("import(\"logo.svg\""), "{text}");
}

// ── Failures ─────────────────────────────────────────────────────────────────

#[tokio::test]
async fn non_zero_exit_carries_stderr() {
    let fx = Fixture::new(FAILS);
    let svg = fx.svg("logo.svg", LOGO_SVG);

    let err = convert(&svg, fx.work.path().join("logo.stl"), &config_for(&fx.tool))
        .await
        .unwrap_err();

    match &err {
        Svg2StlError::ToolFailed { exit_code, detail } => {
            assert_eq!(*exit_code, Some(1));
            assert!(detail.contains("ERROR: stub exploded"), "{detail}");
        }
        other => panic!("expected ToolFailed, got {other:?}"),
    }
    assert_eq!(err.kind(), ErrorKind::Execution);
    assert_eq!(file_names(fx.work.path()), ["logo.svg"]);
}

#[tokio::test]
async fn clean_exit_without_output_is_a_failure() {
    let fx = Fixture::new(SILENT);
    let svg = fx.svg("logo.svg", LOGO_SVG);

    let err = convert(&svg, fx.work.path().join("logo.stl"), &config_for(&fx.tool))
        .await
        .unwrap_err();

    assert!(
        matches!(&err, Svg2StlError::MissingOutput { detail, .. } if detail.contains("nothing to do")),
        "{err:?}"
    );
    assert_eq!(err.kind(), ErrorKind::Execution);
    assert_eq!(file_names(fx.work.path()), ["logo.svg"]);
}

#[tokio::test]
async fn invalid_documents_never_reach_the_tool() {
    let fx = Fixture::new(SUCCEEDS);
    let config = config_for(&fx.tool);

    let html = fx.svg("page.svg", "<html><body/></html>");
    let err = convert(&html, fx.work.path().join("page.stl"), &config)
        .await
        .unwrap_err();
    assert_eq!(err.to_string(), "File is not a valid SVG");
    assert_eq!(err.kind(), ErrorKind::Input);

    let broken = fx.svg("broken.svg", "<svg><g></svg>");
    let err = convert(&broken, fx.work.path().join("broken.stl"), &config)
        .await
        .unwrap_err();
    assert!(err.to_string().starts_with("Invalid SVG file:"), "{err}");

    assert_eq!(file_names(fx.work.path()), ["broken.svg", "page.svg"]);
}

#[tokio::test]
async fn timeout_kills_the_tool() {
    let fx = Fixture::new("");
    let pid_file = fx.tools.path().join("stub.pid");
    let tool = write_stub(fx.tools.path(), "openscad-hangs", &hangs(&pid_file));
    let svg = fx.svg("logo.svg", LOGO_SVG);
    let config = ConversionConfig::builder()
        .tool_candidates([&tool])
        .tool_timeout_secs(1)
        .build()
        .unwrap();

    let start = Instant::now();
    let err = convert(&svg, fx.work.path().join("logo.stl"), &config)
        .await
        .unwrap_err();

    assert!(matches!(err, Svg2StlError::Timeout { secs: 1 }), "{err:?}");
    assert_eq!(err.kind(), ErrorKind::Timeout);
    assert!(start.elapsed() < Duration::from_secs(10));
    assert_eq!(file_names(fx.work.path()), ["logo.svg"]);

    #[cfg(target_os = "linux")]
    {
        let pid = std::fs::read_to_string(&pid_file).unwrap();
        let proc_entry = std::path::Path::new("/proc").join(pid.trim());
        assert!(!proc_entry.exists(), "stub {} is still running", pid.trim());
    }
}

#[tokio::test]
async fn timeout_kills_what_the_tool_started() {
    let fx = Fixture::new("");
    let pid_file = fx.tools.path().join("sleeper.pid");
    let tool = write_stub(fx.tools.path(), "openscad-wrapper", &forks_and_hangs(&pid_file));
    let svg = fx.svg("logo.svg", LOGO_SVG);
    let config = ConversionConfig::builder()
        .tool_candidates([&tool])
        .tool_timeout_secs(1)
        .build()
        .unwrap();

    let err = convert(&svg, fx.work.path().join("logo.stl"), &config)
        .await
        .unwrap_err();

    assert!(matches!(err, Svg2StlError::Timeout { secs: 1 }), "{err:?}");
    assert_eq!(file_names(fx.work.path()), ["logo.svg"]);
    #[cfg(target_os = "linux")]
    assert_exits(&pid_file).await;
}

#[tokio::test]
async fn background_job_does_not_stall_a_failure() {
    let fx = Fixture::new("");
    let pid_file = fx.tools.path().join("sleeper.pid");
    let tool = write_stub(fx.tools.path(), "openscad-leaky", &fails_leaving_a_job(&pid_file));
    let svg = fx.svg("logo.svg", LOGO_SVG);
    let config = ConversionConfig::builder()
        .tool_candidates([&tool])
        .tool_timeout_secs(1)
        .build()
        .unwrap();

    let start = Instant::now();
    let err = convert(&svg, fx.work.path().join("logo.stl"), &config)
        .await
        .unwrap_err();

    assert!(start.elapsed() < Duration::from_secs(5), "{:?}", start.elapsed());
    match &err {
        Svg2StlError::ToolFailed { exit_code, detail } => {
            assert_eq!(*exit_code, Some(1));
            assert!(detail.contains("ERROR: gave up early"), "{detail}");
        }
        other => panic!("expected ToolFailed, got {other:?}"),
    }
    #[cfg(target_os = "linux")]
    assert_exits(&pid_file).await;
}

// ── Locating ─────────────────────────────────────────────────────────────────

#[tokio::test]
async fn locator_falls_through_to_the_first_working_candidate() {
    let tools = tempfile::tempdir().unwrap();
    let broken = write_stub(tools.path(), "openscad-broken", BROKEN);
    let good = write_stub(tools.path(), "openscad-good", SUCCEEDS);
    let config = ConversionConfig::builder()
        .tool_candidates([
            tools.path().join("not-installed"),
            broken,
            good.clone(),
        ])
        .build()
        .unwrap();

    assert_eq!(locate_tool(&config).await, Some(good.clone()));
    let status = check_tool(&config).await;
    assert!(status.available);
    assert_eq!(status.path, Some(good));
}

#[tokio::test]
async fn explicit_tool_path_wins() {
    let tools = tempfile::tempdir().unwrap();
    let fallback = write_stub(tools.path(), "openscad-fallback", SUCCEEDS);
    let preferred = write_stub(tools.path(), "openscad-preferred", SUCCEEDS);
    let config = ConversionConfig::builder()
        .tool_candidates([fallback])
        .tool_path(&preferred)
        .build()
        .unwrap();

    assert_eq!(locate_tool(&config).await, Some(preferred));
}

#[tokio::test]
async fn converter_remembers_the_tool() {
    let fx = Fixture::new(SUCCEEDS);
    let converter = Converter::new(config_for(&fx.tool));
    assert!(converter.tool_status().await.available);

    // Once found, the location is not probed again.
    std::fs::remove_file(&fx.tool).unwrap();
    assert!(converter.tool_status().await.available);
    assert!(!check_tool(converter.config()).await.available);
}
