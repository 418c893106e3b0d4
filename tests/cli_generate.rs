mod api_stub;

use std::path::Path;

use api_stub::{ApiStub, ApiStubConfig, Route, TextBehavior};
use serde_json::Value;

fn generate(stub: &ApiStub, cache_dir: &Path, extra: &[&str]) -> assert_cmd::assert::Assert {
    let mut cmd = assert_cmd::cargo::cargo_bin_cmd!("besselchu");
    cmd.envs(stub.env())
        .args(["generate", "--today", "2025-01-01", "--cache-dir"])
        .arg(cache_dir)
        .args(extra);
    cmd.assert()
}

#[test]
fn reels_scene_failure_leaves_only_that_scene_without_image() -> anyhow::Result<()> {
    let stub = ApiStub::spawn(ApiStubConfig {
        failing_image_marker: Some("Scene 2 prompt".to_owned()),
        ..ApiStubConfig::default()
    });
    let temp = tempfile::TempDir::new()?;
    let out_dir = temp.path().join("out");

    let output = generate(
        &stub,
        &temp.path().join("cache"),
        &[
            "--book",
            "1",
            "--type",
            "reels_script",
            "--json",
            "--out-dir",
            out_dir.to_str().unwrap(),
        ],
    )
    .success()
    .get_output()
    .stdout
    .clone();
    let content: Value = serde_json::from_slice(&output)?;

    assert_eq!(content["type"], "reels_script");
    let scenes = content["scenes"].as_array().unwrap();
    assert_eq!(scenes.len(), 4);
    for (index, scene) in scenes.iter().enumerate() {
        assert_eq!(scene["sceneNumber"], index as u64 + 1);
        if index == 1 {
            assert!(scene.get("imageUrl").is_none(), "failed scene must stay untouched");
        } else {
            assert_eq!(
                scene["imageUrl"],
                format!("data:image/png;base64,{}", api_stub::STUB_IMAGE_BASE64)
            );
        }
    }
    assert!(
        content["content"]
            .as_str()
            .unwrap()
            .starts_with("[0-5s] Scene 1\nVisual: Visual 1\nAudio: Audio 1\n\n[5-10s] Scene 2")
    );
    assert_eq!(content["originalCoverUrl"], stub.cover_url(1));

    assert_eq!(stub.hits(Route::Cover), 1, "reference image is fetched once per batch");
    assert_eq!(stub.hits(Route::Gemini), 4);
    assert_eq!(stub.hits(Route::GeminiWithReference), 4);

    assert!(out_dir.join("content.json").exists());
    assert!(out_dir.join("scene-1.png").exists());
    assert!(!out_dir.join("scene-2.png").exists());
    assert!(out_dir.join("scene-3.png").exists());
    assert!(out_dir.join("scene-4.png").exists());
    Ok(())
}

#[test]
fn post_by_book_id_gets_caption_hashtags_and_image() -> anyhow::Result<()> {
    let stub = ApiStub::spawn(ApiStubConfig::default());
    let temp = tempfile::TempDir::new()?;
    let cache_dir = temp.path().join("cache");

    let mut list = assert_cmd::cargo::cargo_bin_cmd!("besselchu");
    let listed = list
        .envs(stub.env())
        .args(["bestsellers", "--json", "--today", "2025-01-01", "--cache-dir"])
        .arg(&cache_dir)
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let listed: Value = serde_json::from_slice(&listed)?;
    let title = listed["books"][1]["title"].as_str().unwrap().to_owned();
    let isbn = listed["books"][1]["isbn"].as_str().unwrap().to_owned();
    let id = besselchu::model::BookId::for_book(&title, Some(&isbn));

    let output = generate(
        &stub,
        &cache_dir,
        &["--book", id.as_str(), "--type", "post", "--json"],
    )
    .success()
    .get_output()
    .stdout
    .clone();
    let content: Value = serde_json::from_slice(&output)?;

    assert_eq!(content["type"], "instagram_post");
    assert_eq!(
        content["content"],
        "이번 주 베스트셀러를 소개합니다.\n\n#책추천 #베스트셀러"
    );
    assert_eq!(content["hashtags"], serde_json::json!(["#책추천", "#베스트셀러"]));
    assert_eq!(content["imagePrompt"], "A book on a wooden desk with soft light");
    assert!(content["imageUrl"].as_str().unwrap().starts_with("data:image/png;base64,"));
    assert_eq!(stub.hits(Route::Aladin), 1);
    assert_eq!(stub.hits(Route::Gemini), 1);
    Ok(())
}

#[test]
fn invalid_model_json_degrades_to_raw_text() -> anyhow::Result<()> {
    let stub = ApiStub::spawn(ApiStubConfig {
        text: TextBehavior::InvalidJson,
        ..ApiStubConfig::default()
    });
    let temp = tempfile::TempDir::new()?;

    let output = generate(
        &stub,
        temp.path(),
        &["--book", "1", "--type", "reels_script", "--json"],
    )
    .success()
    .get_output()
    .stdout
    .clone();
    let content: Value = serde_json::from_slice(&output)?;

    assert_eq!(content["content"], "this is not json");
    assert!(content.get("scenes").is_none());
    assert!(content.get("imagePrompt").is_none());
    assert_eq!(stub.hits(Route::Gemini), 0);
    Ok(())
}

#[test]
fn text_api_failure_is_reported() -> anyhow::Result<()> {
    let stub = ApiStub::spawn(ApiStubConfig {
        text: TextBehavior::ServerError,
        ..ApiStubConfig::default()
    });
    let temp = tempfile::TempDir::new()?;

    generate(&stub, temp.path(), &["--book", "1", "--type", "post"])
        .failure()
        .stderr(predicates::str::contains("Failed to generate content"));
    assert_eq!(stub.hits(Route::Gemini), 0);
    Ok(())
}

#[test]
fn no_images_skips_image_api() -> anyhow::Result<()> {
    let stub = ApiStub::spawn(ApiStubConfig::default());
    let temp = tempfile::TempDir::new()?;

    generate(
        &stub,
        temp.path(),
        &["--book", "2", "--type", "reels", "--no-images"],
    )
    .success()
    .stdout(predicates::str::contains("[0-5s] Scene 1"));
    assert_eq!(stub.hits(Route::Gemini), 0);
    assert_eq!(stub.hits(Route::Cover), 0);
    Ok(())
}

#[test]
fn unknown_rank_is_an_error() -> anyhow::Result<()> {
    let stub = ApiStub::spawn(ApiStubConfig::default());
    let temp = tempfile::TempDir::new()?;

    generate(&stub, temp.path(), &["--book", "11", "--type", "post"])
        .failure()
        .stderr(predicates::str::contains("no book at rank 11"));
    assert_eq!(stub.hits(Route::Responses), 0);
    Ok(())
}

#[test]
fn image_command_writes_file() -> anyhow::Result<()> {
    let stub = ApiStub::spawn(ApiStubConfig::default());
    let temp = tempfile::TempDir::new()?;
    let out = temp.path().join("cover-shot.png");

    let mut cmd = assert_cmd::cargo::cargo_bin_cmd!("besselchu");
    cmd.envs(stub.env())
        .args([
            "image",
            "--prompt",
            "A cozy reading nook",
            "--reference-url",
            &stub.cover_url(1),
            "--subject",
            "Stub Book 1",
            "--aspect",
            "vertical",
            "--out",
            out.to_str().unwrap(),
        ])
        .assert()
        .success();

    assert!(out.exists());
    assert_eq!(stub.hits(Route::Cover), 1);
    assert_eq!(stub.hits(Route::GeminiWithReference), 1);
    Ok(())
}
