#![cfg(unix)]

use image::DynamicImage;
use partgen_infer::{CommandModel, InferenceRequest, MediaType, ReplayModel, ViewImage, VisionModel};
use std::path::{Path, PathBuf};

fn view(label: &str) -> ViewImage {
    ViewImage::from_image(
        label,
        Path::new("front.jpg"),
        MediaType::Jpeg,
        DynamicImage::new_rgb8(3, 2),
    )
    .expect("encode view")
}

fn request<'a>(views: &'a [ViewImage], errors: &'a [String]) -> InferenceRequest<'a> {
    InferenceRequest {
        prompt: "describe the part",
        views,
        previous_errors: errors,
        attempt: 2,
    }
}

fn scratch(tag: &str) -> PathBuf {
    std::env::temp_dir().join(format!("partgen-backends-{tag}-{}", std::process::id()))
}

#[test]
fn command_receives_prompt_prepared_views_and_attempt() {
    // $0 is "sh", views follow as $1..
    let script = r#"prompt=$(cat); head -c 8 "$1" | od -An -c | tr -d ' \n' > "$1.magic"; printf '%s|%s|%s' "$PARTGEN_ATTEMPT" "$1" "$prompt""#;
    let dir = scratch("prompt");
    let mut model = CommandModel::new("sh")
        .with_args(["-c".to_string(), script.to_string(), "sh".to_string()])
        .with_scratch_dir(&dir);

    let views = [view("side1")];
    let errors = ["width: must be positive".to_string()];
    let out = model.infer(request(&views, &errors)).expect("command output");

    let mut parts = out.splitn(3, '|');
    assert_eq!(Some("2"), parts.next());
    let staged = PathBuf::from(parts.next().expect("view path"));
    assert_eq!(dir.join("side1.png"), staged);
    let prompt = parts.next().expect("prompt");
    assert!(prompt.starts_with("describe the part"));
    assert!(prompt.contains("width: must be positive"));

    // The program saw the re-encoded PNG, and the staged copy is gone.
    let magic = std::fs::read_to_string(dir.join("side1.png.magic")).expect("magic");
    assert!(magic.contains("PNG"), "{magic}");
    assert!(!staged.exists());
}

#[test]
fn command_failure_carries_stderr() {
    let mut model = CommandModel::new("sh")
        .with_args([
            "-c".to_string(),
            "cat >/dev/null; echo 'bad api key' >&2; exit 3".to_string(),
        ])
        .with_scratch_dir(scratch("stderr"));
    let views = [view("side1")];
    let err = model.infer(request(&views, &[])).expect_err("non-zero exit");
    assert!(err.contains("bad api key"), "{err}");
}

#[test]
fn program_that_ignores_stdin_still_reports() {
    let mut model = CommandModel::new("sh")
        .with_args(["-c".to_string(), "exit 0".to_string()])
        .with_scratch_dir(scratch("early"));
    let views = [view("side1")];
    let prompt = "x".repeat(1 << 20);
    let request = InferenceRequest {
        prompt: &prompt,
        views: &views,
        previous_errors: &[],
        attempt: 1,
    };
    // Either the pipe breaks or the empty answer comes back; neither hangs.
    match model.infer(request) {
        Ok(answer) => assert!(answer.is_empty()),
        Err(err) => assert!(err.contains("write prompt"), "{err}"),
    }
}

#[test]
fn replay_reads_a_recorded_answer() {
    let path = std::env::temp_dir().join(format!("partgen-replay-{}.json", std::process::id()));
    std::fs::write(&path, "{\"width\": 1}").expect("write");
    let mut model = ReplayModel::from_file(&path).expect("read");
    let views = [view("side1")];
    assert_eq!("{\"width\": 1}", model.infer(request(&views, &[])).expect("first"));
    assert!(model.infer(request(&views, &[])).is_err());
}

#[test]
fn repeating_replay_never_runs_out() {
    let mut model = ReplayModel::repeating("{\"width\": 2}".to_string());
    let views = [view("side1")];
    for _ in 0..3 {
        assert_eq!("{\"width\": 2}", model.infer(request(&views, &[])).expect("answer"));
    }
}
