#![allow(deprecated)]
use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

fn dt(dir: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("dt").unwrap();
    cmd.current_dir(dir.path())
        .env("DT_ROOT", dir.path())
        .env_remove("DT_COACH_ENDPOINT");
    cmd
}

fn init_with_project(dir: &TempDir) {
    dt(dir)
        .args(["init", "--name", "Commute"])
        .assert()
        .success();
}

fn json(cmd: &mut Command) -> serde_json::Value {
    let out = cmd.arg("--json").output().unwrap();
    assert!(
        out.status.success(),
        "command failed: {}",
        String::from_utf8_lossy(&out.stderr)
    );
    serde_json::from_slice(&out.stdout).unwrap()
}

fn write_reply(dir: &TempDir, name: &str, body: &str) -> std::path::PathBuf {
    let path = dir.path().join(name);
    std::fs::write(&path, body).unwrap();
    path
}

const THREE_OBSERVATIONS: &str = r#"💾 **JSON action**
```json:action
{"type":"RECORD_OBSERVATION","data":{"content":"Riders refresh three apps","category":"behavior"}}
```
```json:action
{"type":"RECORD_OBSERVATION","data":{"content":"Nobody trusts the posted timetable","category":"pain_point"}}
```
```json:action
{"type":"RECORD_OBSERVATION","data":{"content":"People want to know if they can grab a coffee","category":"need"}}
```
🗣️ **conversation**
That is a rich set of observations. How do riders feel while they wait?"#;

// ---------------------------------------------------------------------------
// dt init
// ---------------------------------------------------------------------------

#[test]
fn init_creates_workspace() {
    let dir = TempDir::new().unwrap();
    dt(&dir).arg("init").assert().success();
    assert!(dir.path().join(".dt/config.yaml").exists());
    assert!(dir.path().join(".dt/responses").is_dir());
}

#[test]
fn init_is_idempotent() {
    let dir = TempDir::new().unwrap();
    dt(&dir).arg("init").assert().success();
    dt(&dir)
        .arg("init")
        .assert()
        .success()
        .stdout(predicate::str::contains("exists:  .dt/config.yaml"));
}

#[test]
fn commands_require_init() {
    let dir = TempDir::new().unwrap();
    dt(&dir)
        .arg("status")
        .assert()
        .failure()
        .stderr(predicate::str::contains("not initialized"));
}

#[test]
fn status_without_project_fails() {
    let dir = TempDir::new().unwrap();
    dt(&dir).arg("init").assert().success();
    dt(&dir)
        .arg("status")
        .assert()
        .failure()
        .stderr(predicate::str::contains("no current project"));
}

// ---------------------------------------------------------------------------
// dt project
// ---------------------------------------------------------------------------

#[test]
fn project_new_list_switch_delete() {
    let dir = TempDir::new().unwrap();
    init_with_project(&dir);
    let second = json(dt(&dir).args(["project", "new", "Grocery run"]));
    let second_id = second["id"].as_str().unwrap().to_string();

    let listed = json(dt(&dir).args(["project", "list"]));
    assert_eq!(listed["projects"].as_array().unwrap().len(), 2);
    assert_eq!(listed["projects"][0]["name"], "Grocery run");
    assert_eq!(listed["current"], second_id.as_str());

    let first_id = listed["projects"][1]["id"].as_str().unwrap().to_string();
    dt(&dir)
        .args(["project", "switch", &first_id[..8]])
        .assert()
        .success()
        .stdout(predicate::str::contains("Commute"));

    dt(&dir)
        .args(["project", "delete", &second_id])
        .assert()
        .success();
    let listed = json(dt(&dir).args(["project", "list"]));
    assert_eq!(listed["projects"].as_array().unwrap().len(), 1);
    assert_eq!(listed["current"], first_id.as_str());
}

#[test]
fn project_rename_updates_current() {
    let dir = TempDir::new().unwrap();
    init_with_project(&dir);
    dt(&dir)
        .args(["project", "rename", "Morning commute", "--description", "Bus riders"])
        .assert()
        .success();
    let status = json(dt(&dir).arg("status"));
    assert_eq!(status["name"], "Morning commute");
}

#[test]
fn switch_to_unknown_project_fails() {
    let dir = TempDir::new().unwrap();
    init_with_project(&dir);
    dt(&dir)
        .args(["project", "switch", "nope"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("project not found"));
}

// ---------------------------------------------------------------------------
// dt ingest / advance / stage / coach
// ---------------------------------------------------------------------------

#[test]
fn ingest_records_artifacts_and_cleans_message() {
    let dir = TempDir::new().unwrap();
    init_with_project(&dir);
    dt(&dir).args(["coach", "empathy"]).assert().success();
    let reply = write_reply(&dir, "reply.md", THREE_OBSERVATIONS);

    dt(&dir)
        .arg("ingest")
        .arg(&reply)
        .assert()
        .success()
        .stdout(predicate::str::contains("RECORD_OBSERVATION"));

    let listed = json(dt(&dir).args(["artifact", "list", "observations"]));
    assert_eq!(listed.as_array().unwrap().len(), 3);

    let history = json(dt(&dir).arg("history"));
    let reply = &history.as_array().unwrap()[0];
    assert_eq!(reply["role"], "assistant");
    assert_eq!(reply["coachType"], "empathy");
    assert_eq!(
        reply["content"],
        "That is a rich set of observations. How do riders feel while they wait?"
    );

    let status = json(dt(&dir).arg("status"));
    assert_eq!(status["completion"]["empathize"], 100.0);
    assert_eq!(status["can_advance"], true);
}

#[test]
fn advance_is_gated_unless_forced() {
    let dir = TempDir::new().unwrap();
    init_with_project(&dir);
    dt(&dir)
        .arg("advance")
        .assert()
        .failure()
        .stderr(predicate::str::contains("3 more needed"));

    let moved = json(dt(&dir).args(["advance", "--force"]));
    assert_eq!(moved["to"], "define");
    assert_eq!(moved["active_coach"], "define");
}

#[test]
fn advance_after_target_met() {
    let dir = TempDir::new().unwrap();
    init_with_project(&dir);
    let reply = write_reply(&dir, "reply.md", THREE_OBSERVATIONS);
    dt(&dir).arg("ingest").arg(&reply).assert().success();
    dt(&dir).arg("advance").assert().success();

    let status = json(dt(&dir).arg("status"));
    assert_eq!(status["current_stage"], "define");
    let progress = status["stage_progress"].as_array().unwrap();
    assert_eq!(progress[0]["status"], "completed");
    assert_eq!(progress[1]["status"], "in_progress");
}

#[test]
fn ingested_advance_moves_stage() {
    let dir = TempDir::new().unwrap();
    init_with_project(&dir);
    dt(&dir).args(["stage", "define"]).assert().success();
    let reply = write_reply(
        &dir,
        "advance.md",
        "Great POV, let's generate ideas!\n{\"action\": \"ADVANCE_STAGE\"}",
    );
    dt(&dir).arg("ingest").arg(&reply).assert().success();

    let status = json(dt(&dir).arg("status"));
    assert_eq!(status["current_stage"], "ideate");
    assert_eq!(status["active_coach"], "ideate");
    let history = json(dt(&dir).arg("history"));
    assert_eq!(history[0]["coachType"], "define");
}

#[test]
fn invalid_stage_and_coach_fail() {
    let dir = TempDir::new().unwrap();
    init_with_project(&dir);
    dt(&dir)
        .args(["stage", "launch"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("unknown stage"));
    dt(&dir)
        .args(["coach", "mentor"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("unknown coach"));
}

// ---------------------------------------------------------------------------
// dt artifact
// ---------------------------------------------------------------------------

#[test]
fn artifact_toggle_soft_deletes_and_restores() {
    let dir = TempDir::new().unwrap();
    init_with_project(&dir);
    let reply = write_reply(&dir, "reply.md", THREE_OBSERVATIONS);
    dt(&dir).arg("ingest").arg(&reply).assert().success();

    let listed = json(dt(&dir).args(["artifact", "list", "observation"]));
    let id = listed[0]["id"].as_str().unwrap().to_string();

    let toggled = json(dt(&dir).args(["artifact", "toggle", "observation", &id]));
    assert_eq!(toggled["is_active"], false);

    let active = json(dt(&dir).args(["artifact", "list", "observation"]));
    assert_eq!(active.as_array().unwrap().len(), 2);
    let all = json(dt(&dir).args(["artifact", "list", "observation", "--all"]));
    assert_eq!(all.as_array().unwrap().len(), 3);

    // Soft-deleted records still count toward the stage target.
    let status = json(dt(&dir).arg("status"));
    assert_eq!(status["completion"]["empathize"], 100.0);

    let restored = json(dt(&dir).args(["artifact", "toggle", "observation", &id]));
    assert_eq!(restored["is_active"], true);
}

#[test]
fn artifact_toggle_unknown_id_fails() {
    let dir = TempDir::new().unwrap();
    init_with_project(&dir);
    dt(&dir)
        .args(["artifact", "toggle", "idea", "missing"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("no idea with id"));
}

#[test]
fn survey_responses_are_recorded_and_soft_deleted() {
    let dir = TempDir::new().unwrap();
    init_with_project(&dir);
    let reply = write_reply(
        &dir,
        "survey.md",
        "```json:action\n{\"type\":\"RECORD_SURVEY\",\"data\":{\"question\":\"How long do you usually wait?\",\"type\":\"rating\"}}\n```\nSend it out.",
    );
    dt(&dir).arg("ingest").arg(&reply).assert().success();
    let surveys = json(dt(&dir).args(["artifact", "list", "survey"]));
    let survey = surveys[0]["id"].as_str().unwrap().to_string();

    let recorded = json(dt(&dir).args(["artifact", "respond", &survey[..8], "Lin", "4"]));
    assert_eq!(recorded["survey"], survey.as_str());
    let id = recorded["id"].as_str().unwrap().to_string();

    let responses = json(dt(&dir).args(["artifact", "list", "survey_response"]));
    assert_eq!(responses[0]["summary"], "Lin: 4");

    let toggled = json(dt(&dir).args(["artifact", "toggle", "survey_response", &id]));
    assert_eq!(toggled["is_active"], false);
    let active = json(dt(&dir).args(["artifact", "list", "survey_response"]));
    assert!(active.as_array().unwrap().is_empty());
}

#[test]
fn respond_to_unknown_survey_fails() {
    let dir = TempDir::new().unwrap();
    init_with_project(&dir);
    dt(&dir)
        .args(["artifact", "respond", "missing", "Lin", "yes"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("no survey with id"));
}

// ---------------------------------------------------------------------------
// dt chat / retry
// ---------------------------------------------------------------------------

#[test]
fn chat_round_trip_against_endpoint() {
    let dir = TempDir::new().unwrap();
    init_with_project(&dir);
    dt(&dir).args(["stage", "ideate"]).assert().success();

    let mut server = mockito::Server::new();
    let mock = server
        .mock("POST", "/api/chat")
        .match_body(mockito::Matcher::PartialJson(serde_json::json!({
            "messages": [{"role": "user", "content": "What if stops had screens?"}],
        })))
        .with_status(200)
        .with_body(
            "```json:action\n{\"type\":\"RECORD_IDEA\",\"data\":{\"title\":\"Live screens\",\"description\":\"Arrival boards at every stop\"}}\n```\nLove it. What else?",
        )
        .create();

    let out = json(dt(&dir).args([
        "chat",
        "What if stops had screens?",
        "--endpoint",
        &format!("{}/api/chat", server.url()),
    ]));
    mock.assert();
    assert_eq!(out["reply"], "Love it. What else?");
    assert_eq!(out["directives"][0]["type"], "RECORD_IDEA");

    let ideas = json(dt(&dir).args(["artifact", "list", "idea"]));
    assert_eq!(ideas.as_array().unwrap().len(), 1);

    let responses: Vec<_> = std::fs::read_dir(dir.path().join(".dt/responses"))
        .unwrap()
        .collect();
    assert_eq!(responses.len(), 1);
}

#[test]
fn chat_failure_keeps_user_message() {
    let dir = TempDir::new().unwrap();
    init_with_project(&dir);

    let mut server = mockito::Server::new();
    server
        .mock("POST", "/api/chat")
        .with_status(500)
        .with_body("boom")
        .create();

    dt(&dir)
        .args(["chat", "hello"])
        .env("DT_COACH_ENDPOINT", format!("{}/api/chat", server.url()))
        .assert()
        .failure()
        .stderr(predicate::str::contains("HTTP error! status: 500"));

    let history = json(dt(&dir).arg("history"));
    assert_eq!(history.as_array().unwrap().len(), 1);
    assert_eq!(history[0]["role"], "user");
}

#[test]
fn retry_refuses_non_recording_coach() {
    let dir = TempDir::new().unwrap();
    init_with_project(&dir);
    dt(&dir)
        .args(["retry", "Riders refresh three apps"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("does not record artifacts"));
}

#[test]
fn retry_prints_only_what_was_recorded() {
    let dir = TempDir::new().unwrap();
    init_with_project(&dir);
    dt(&dir).args(["coach", "empathy"]).assert().success();
    let reply = write_reply(&dir, "reply.md", THREE_OBSERVATIONS);
    dt(&dir).arg("ingest").arg(&reply).assert().success();

    let mut server = mockito::Server::new();
    server
        .mock("POST", "/api/chat")
        .with_status(200)
        .with_body(
            "```json:action\n{\"type\":\"RECORD_OBSERVATION\",\"data\":{\"content\":\"Riders shelter in shops\"}}\n```",
        )
        .create();

    dt(&dir)
        .args(["retry", "Riders shelter in shops"])
        .env("DT_COACH_ENDPOINT", format!("{}/api/chat", server.url()))
        .assert()
        .success()
        .stdout(predicate::str::contains("[recorded: RECORD_OBSERVATION]"))
        .stdout(predicate::str::contains("rich set").not());

    let history = json(dt(&dir).arg("history"));
    assert_eq!(history.as_array().unwrap().len(), 1);
    let observations = json(dt(&dir).args(["artifact", "list", "observation"]));
    assert_eq!(observations.as_array().unwrap().len(), 4);
}

// ---------------------------------------------------------------------------
// dt config
// ---------------------------------------------------------------------------

#[test]
fn default_config_is_valid() {
    let dir = TempDir::new().unwrap();
    dt(&dir).arg("init").assert().success();
    dt(&dir)
        .args(["config", "validate"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Config is valid"));
}

#[test]
fn invalid_endpoint_fails_validation() {
    let dir = TempDir::new().unwrap();
    dt(&dir).arg("init").assert().success();
    std::fs::write(
        dir.path().join(".dt/config.yaml"),
        "version: 1\ncoach:\n  endpoint: ftp://example.com\n",
    )
    .unwrap();
    dt(&dir)
        .args(["config", "validate"])
        .assert()
        .failure()
        .stdout(predicate::str::contains("[error]"));
}
