mod common;
mod utils;

use anyhow::Result;
use common::TestEnvironment;
use std::fs;

const DIALOG: &str = "# Demo talk\n\n## Intro\nA: Hello.\nB(8): Hi there.\n";
const VOICES: &str = "[voices]\ndefault = 3\n\n[voices.speakers]\nA = 1\n";

fn dialog_project() -> Result<TestEnvironment> {
    let env = TestEnvironment::new()?;
    env.write("project.toml", VOICES)?;
    env.write("script/dialog.md", DIALOG)?;
    Ok(env)
}

#[test]
fn test_dialog_to_timeline_and_visuals() -> Result<()> {
    let env = dialog_project()?;
    let project = env.project_arg();

    let output = utils::run_vidgen_command(&env, &["compile-dialog", &project])?;
    assert_eq!(
        output.exit_code, 0,
        "compile-dialog failed: {}",
        output.stderr
    );

    let segments = env.read_json("script/segments.json")?;
    assert_eq!(segments[0]["id"], "0001_a");
    assert_eq!(segments[0]["speaker"], 1);
    assert_eq!(segments[0]["text"], "Hello.");
    assert_eq!(segments[1]["id"], "0002_b");
    assert_eq!(segments[1]["speaker"], 8);
    assert_eq!(segments[1]["section"], "Intro");

    env.write_clip("0001_a", 5000)?;
    env.write_clip("0002_b", 3200)?;
    let output = utils::run_vidgen_command(&env, &["build-timeline", &project, "--concat-audio"])?;
    assert_eq!(
        output.exit_code, 0,
        "build-timeline failed: {}",
        output.stderr
    );

    let segments = env.read_json("script/segments.json")?;
    assert_eq!(segments[0]["start"].as_f64(), Some(0.0));
    assert_eq!(segments[0]["end"].as_f64(), Some(5.0));
    assert_eq!(segments[1]["start"].as_f64(), Some(5.0));
    assert_eq!(segments[1]["end"].as_f64(), Some(8.2));

    let timeline = env.read_json("script/timeline.json")?;
    assert_eq!(timeline["master"]["duration_sec"].as_f64(), Some(8.2));
    assert_eq!(timeline["items"][1]["clip"], "audio/0002_b.wav");
    assert!(env.project().join("export/master.wav").is_file());

    env.write("assets/images/0001_a.png", "png")?;
    env.write("assets/images/0002_b.jpg", "jpg")?;
    let output = utils::run_vidgen_command(&env, &["assign-visuals", &project])?;
    assert_eq!(
        output.exit_code, 0,
        "assign-visuals failed: {}",
        output.stderr
    );

    let log = env.read_json("assets/images/assignments.json")?;
    assert_eq!(log["items"][0]["kind"], "existing-image");
    assert_eq!(log["items"][0]["rationale"], "explicit");
    assert_eq!(log["items"][1]["asset_path"], "assets/images/0002_b.jpg");

    let segments = env.read_json("script/segments.json")?;
    assert_eq!(segments[1]["visual"], "assets/images/0002_b.jpg");

    let output = utils::run_vidgen_command(&env, &["check", &project])?;
    assert_eq!(output.exit_code, 0, "check failed: {}", output.stderr);

    Ok(())
}

#[test]
fn test_unmapped_label_fails_without_writing_segments() -> Result<()> {
    let env = TestEnvironment::new()?;
    env.write("project.toml", "[voices.speakers]\nA = 1\n")?;
    env.write("script/dialog.md", "## Intro\nA: fine\nC: test\n")?;

    let output = utils::run_vidgen_command(&env, &["compile-dialog", &env.project_arg()])?;
    assert_eq!(output.exit_code, 1);
    assert!(output.stderr.contains("`C`"), "stderr: {}", output.stderr);
    assert!(
        output.stderr.contains("known labels: A"),
        "stderr: {}",
        output.stderr
    );
    assert!(!env.project().join("script/segments.json").exists());

    Ok(())
}

#[test]
fn test_recompile_keeps_timing_and_speakers() -> Result<()> {
    let env = dialog_project()?;
    let project = env.project_arg();

    assert_eq!(
        utils::run_vidgen_command(&env, &["compile-dialog", &project])?.exit_code,
        0
    );
    let output = utils::run_vidgen_command(
        &env,
        &["assign-speakers", &project, "--speakers", "4,5", "--all"],
    )?;
    assert_eq!(
        output.exit_code, 0,
        "assign-speakers failed: {}",
        output.stderr
    );

    env.write_clip("0001_a", 1000)?;
    env.write_clip("0002_b", 1000)?;
    assert_eq!(
        utils::run_vidgen_command(&env, &["build-timeline", &project])?.exit_code,
        0
    );

    let output = utils::run_vidgen_command(&env, &["compile-dialog", &project])?;
    assert_eq!(output.exit_code, 0, "recompile failed: {}", output.stderr);

    let segments = env.read_json("script/segments.json")?;
    assert_eq!(segments[0]["speaker"], 4);
    assert_eq!(segments[1]["speaker"], 5);
    assert_eq!(segments[1]["end"].as_f64(), Some(2.0));

    let output = utils::run_vidgen_command(&env, &["compile-dialog", &project, "--force"])?;
    assert_eq!(output.exit_code, 0);
    let segments = env.read_json("script/segments.json")?;
    assert_eq!(segments[0]["speaker"], 1);
    assert!(segments[1].get("end").is_none());

    Ok(())
}

#[test]
fn test_assign_speakers_is_idempotent_without_all() -> Result<()> {
    let env = TestEnvironment::new()?;
    env.write(
        "source/article.md",
        "Intro text.\n\n## Part\n\nMore text.\n\n## End\n\nLast.\n",
    )?;
    let project = env.project_arg();

    assert_eq!(
        utils::run_vidgen_command(&env, &["segment-article", &project])?.exit_code,
        0
    );

    let output = utils::run_vidgen_command(
        &env,
        &[
            "--output",
            "json",
            "assign-speakers",
            &project,
            "--speakers",
            "1,8",
        ],
    )?;
    assert_eq!(
        output.exit_code, 0,
        "assign-speakers failed: {}",
        output.stderr
    );
    let events = utils::json_events(&output.stdout);
    let assigned = events
        .iter()
        .find(|e| e["code"] == "video.speakers.assigned")
        .expect("assignment event");
    assert_eq!(assigned["data"]["updated"], 3);

    let output = utils::run_vidgen_command(
        &env,
        &[
            "--output",
            "json",
            "assign-speakers",
            &project,
            "--speakers",
            "5",
        ],
    )?;
    let events = utils::json_events(&output.stdout);
    let assigned = events
        .iter()
        .find(|e| e["code"] == "video.speakers.assigned")
        .expect("assignment event");
    assert_eq!(assigned["data"]["updated"], 0);

    let speakers: Vec<_> = env
        .read_json("script/segments.json")?
        .as_array()
        .expect("segment list")
        .iter()
        .map(|s| s["speaker"].as_u64())
        .collect();
    assert_eq!(speakers, vec![Some(1), Some(8), Some(1)]);

    Ok(())
}

#[test]
fn test_missing_clip_fails_and_leaves_segments() -> Result<()> {
    let env = dialog_project()?;
    let project = env.project_arg();
    assert_eq!(
        utils::run_vidgen_command(&env, &["compile-dialog", &project])?.exit_code,
        0
    );
    let before = fs::read_to_string(env.project().join("script/segments.json"))?;

    env.write_clip("0001_a", 1000)?;
    let output = utils::run_vidgen_command(&env, &["build-timeline", &project])?;
    assert_eq!(output.exit_code, 1);
    assert!(
        output.stderr.contains("0002_b"),
        "stderr: {}",
        output.stderr
    );

    let after = fs::read_to_string(env.project().join("script/segments.json"))?;
    assert_eq!(before, after);
    assert!(!env.project().join("script/timeline.json").exists());

    Ok(())
}

#[test]
fn test_article_figures_match_by_position() -> Result<()> {
    let env = TestEnvironment::new()?;
    env.write(
        "source/article.md",
        "---\ntitle: Demo\n---\nOpening words.\n\n## Setup\n\nInstall it.\n\n![diagram](images/setup.png)\n\n## Usage\n\nRun it.\n",
    )?;
    env.write("source/images/setup.png", "png")?;
    env.write("assets/images/0001_demo.png", "png")?;
    env.write("assets/images/0003_usage.png", "png")?;
    let project = env.project_arg();

    let output = utils::run_vidgen_command(&env, &["segment-article", &project])?;
    assert_eq!(
        output.exit_code, 0,
        "segment-article failed: {}",
        output.stderr
    );

    let output = utils::run_vidgen_command(&env, &["assign-visuals", &project])?;
    assert_eq!(
        output.exit_code, 0,
        "assign-visuals failed: {}",
        output.stderr
    );

    let log = env.read_json("assets/images/assignments.json")?;
    let rationales: Vec<_> = log["items"]
        .as_array()
        .expect("assignment items")
        .iter()
        .map(|item| item["rationale"].as_str().unwrap_or_default().to_string())
        .collect();
    assert_eq!(rationales, vec!["explicit", "figure-position", "explicit"]);
    assert_eq!(log["items"][1]["asset_path"], "source/images/setup.png");

    Ok(())
}

#[test]
fn test_check_rejects_overlapping_timing() -> Result<()> {
    let env = TestEnvironment::new()?;
    env.write(
        "script/segments.json",
        r#"[{"id": "0001_a", "text": "One.", "start": 0.0, "end": 3.0},
            {"id": "0002_b", "text": "Two.", "start": 2.0, "end": 4.0}]"#,
    )?;

    let output = utils::run_vidgen_command(&env, &["check", &env.project_arg()])?;
    assert_eq!(output.exit_code, 1);
    assert!(
        output.stderr.contains("0002_b"),
        "stderr: {}",
        output.stderr
    );

    Ok(())
}
