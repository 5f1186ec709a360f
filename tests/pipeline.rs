mod support;

use provisio::pipeline::{FailedStep, write_banner, write_report};
use provisio::{DeployError, Pipeline, RunSummary, Target};
use support::{ScriptedRemote, exited, printed};

fn pipeline() -> Pipeline {
    Pipeline::new(Target::new("https://github.com/user/repo.git"))
}

fn expected_commands(pipeline: &Pipeline) -> Vec<String> {
    let plan = pipeline.plan();
    plan.steps()
        .chain(std::iter::once(&plan.health_check))
        .map(|s| s.command.clone())
        .collect()
}

#[test]
fn issues_every_command_in_plan_order() {
    let pipeline = pipeline();
    let mut remote = ScriptedRemote::succeeding();
    let mut out: Vec<u8> = Vec::new();

    let summary = pipeline.run(&mut remote, &mut out).unwrap();

    assert_eq!(remote.commands(), expected_commands(&pipeline));
    assert_eq!(summary.dispatched, 19);
    assert!(summary.all_succeeded());
}

#[test]
fn each_step_uses_its_own_timeout() {
    let pipeline = pipeline();
    let mut remote = ScriptedRemote::succeeding();
    let mut out: Vec<u8> = Vec::new();

    pipeline.run(&mut remote, &mut out).unwrap();

    let expected: Vec<_> = pipeline
        .plan()
        .steps()
        .chain(std::iter::once(&pipeline.plan().health_check))
        .map(provisio::Step::timeout)
        .collect();
    let actual: Vec<_> = remote.calls.iter().map(|(_, t)| *t).collect();
    assert_eq!(actual, expected);
}

#[test]
fn health_check_runs_once_and_last() {
    let pipeline = pipeline();
    let mut remote = ScriptedRemote::succeeding();
    let mut out: Vec<u8> = Vec::new();

    pipeline.run(&mut remote, &mut out).unwrap();

    let health = &pipeline.plan().health_check.command;
    let commands = remote.commands();
    assert_eq!(commands.iter().filter(|c| **c == health.as_str()).count(), 1);
    assert_eq!(commands.last(), Some(&health.as_str()));
}

#[test]
fn continues_past_failing_steps() {
    let pipeline = pipeline();
    let mut remote = ScriptedRemote::failing(1, "E: dpkg was interrupted");
    let mut out: Vec<u8> = Vec::new();

    let summary = pipeline.run(&mut remote, &mut out).unwrap();

    assert_eq!(remote.commands(), expected_commands(&pipeline));
    assert_eq!(summary.dispatched, 19);
    assert_eq!(summary.failed.len(), 19);
    assert!(printed(&out).contains("Error: E: dpkg was interrupted"));
}

#[test]
fn records_which_steps_failed() {
    let pipeline = pipeline();
    let mut remote = ScriptedRemote::new(|cmd| {
        if cmd.contains("npm run build") {
            Ok(exited(2, "", "tsc: error"))
        } else {
            Ok(exited(0, "", ""))
        }
    });
    let mut out: Vec<u8> = Vec::new();

    let summary = pipeline.run(&mut remote, &mut out).unwrap();

    assert_eq!(
        summary.failed,
        vec![FailedStep {
            command: "cd /opt/claude-dev-hub/app && npm run build 2>&1 | tail -10".into(),
            status: 2,
        }]
    );
    assert_eq!(summary.dispatched, 19);
}

#[test]
fn fail_fast_stops_at_first_failure() {
    let pipeline = pipeline().fail_fast(true);
    let mut remote = ScriptedRemote::new(|cmd| {
        if cmd.starts_with("apt install -y git") {
            Ok(exited(100, "", ""))
        } else {
            Ok(exited(0, "", ""))
        }
    });
    let mut out: Vec<u8> = Vec::new();

    let err = pipeline.run(&mut remote, &mut out).unwrap_err();

    assert!(matches!(
        err,
        DeployError::StepFailed { ref command, status: 100 }
            if command == "apt install -y git 2>&1 | tail -3"
    ));
    assert_eq!(remote.calls.len(), 5);
    assert!(!printed(&out).contains("[Checking status...]"));
}

#[test]
fn timeout_aborts_the_sequence() {
    let pipeline = pipeline();
    let mut remote = ScriptedRemote::new(|cmd| {
        if cmd.contains("npm install 2>&1") {
            Err(DeployError::Timeout {
                command: cmd.to_string(),
                seconds: 300,
            })
        } else {
            Ok(exited(0, "", ""))
        }
    });
    let mut out: Vec<u8> = Vec::new();

    let err = pipeline.run(&mut remote, &mut out).unwrap_err();

    assert!(err.is_timeout());
    let health = pipeline.plan().health_check.command.as_str();
    assert!(!remote.commands().contains(&health));
    assert!(printed(&out).contains("[9/10] Installing dependencies and building..."));
}

#[test]
fn run_and_close_closes_after_a_complete_run() {
    let pipeline = pipeline();
    let mut remote = ScriptedRemote::failing(1, "E: broken");
    let mut out: Vec<u8> = Vec::new();

    let summary = pipeline.run_and_close(&mut remote, &mut out).unwrap();

    assert!(!summary.all_succeeded());
    assert_eq!(remote.closes, 1);
}

#[test]
fn run_and_close_closes_when_a_step_times_out() {
    let pipeline = pipeline();
    let mut remote = ScriptedRemote::new(|cmd| {
        if cmd.starts_with("apt update") {
            Err(DeployError::Timeout {
                command: cmd.to_string(),
                seconds: 600,
            })
        } else {
            Ok(exited(0, "", ""))
        }
    });
    let mut out: Vec<u8> = Vec::new();

    let err = pipeline.run_and_close(&mut remote, &mut out).unwrap_err();

    assert!(err.is_timeout());
    assert_eq!(remote.calls.len(), 1);
    assert_eq!(remote.closes, 1);
}

#[test]
fn run_and_close_closes_on_fail_fast() {
    let pipeline = pipeline().fail_fast(true);
    let mut remote = ScriptedRemote::failing(100, "");
    let mut out: Vec<u8> = Vec::new();

    let err = pipeline.run_and_close(&mut remote, &mut out).unwrap_err();

    assert!(matches!(err, DeployError::StepFailed { status: 100, .. }));
    assert_eq!(remote.closes, 1);
}

#[test]
fn prints_numbered_progress() {
    let pipeline = pipeline();
    let mut remote = ScriptedRemote::succeeding();
    let mut out: Vec<u8> = Vec::new();

    pipeline.run(&mut remote, &mut out).unwrap();
    let shown = printed(&out);

    assert!(shown.starts_with("\n[1/10] Updating system packages...\n\n>>> apt update"));
    assert!(shown.contains("\n[10/10] Configuring and starting services...\n"));
    let progress = shown.find("[Checking status...]").expect("status line");
    let last_phase = shown.find("[10/10]").expect("last phase");
    assert!(last_phase < progress);
}

#[test]
fn dry_run_text_lists_every_command() {
    let pipeline = pipeline();
    let mut out: Vec<u8> = Vec::new();

    pipeline.write_plan(&mut out, false).unwrap();
    let shown = printed(&out);

    assert!(shown.starts_with("=== Dry run: no changes will be made ==="));
    for command in expected_commands(&pipeline) {
        assert!(shown.contains(&command), "missing {command}");
    }
    assert!(shown.contains("(timeout 600s)"));
}

#[test]
fn dry_run_json_serializes_the_plan() {
    let pipeline = pipeline();
    let mut out: Vec<u8> = Vec::new();

    pipeline.write_plan(&mut out, true).unwrap();
    let value: serde_json::Value = serde_json::from_slice(&out).unwrap();

    assert_eq!(value["phases"].as_array().map(Vec::len), Some(10));
    assert_eq!(value["phases"][3]["title"], "Installing Git");
    assert_eq!(value["phases"][3]["steps"][0]["timeout_secs"], 60);
    assert_eq!(value["health_check"]["timeout_secs"], 300);
}

#[test]
fn banner_names_the_app() {
    let mut out: Vec<u8> = Vec::new();

    write_banner(&mut out, &Target::new("repo").app_name("hub")).unwrap();

    assert!(printed(&out).contains("hub - Remote Server Setup"));
}

#[test]
fn report_lists_failures() {
    let summary = RunSummary {
        dispatched: 19,
        failed: vec![FailedStep {
            command: "pm2 save".into(),
            status: 1,
        }],
    };
    let mut out: Vec<u8> = Vec::new();

    write_report(&mut out, "203.0.113.10", &summary).unwrap();
    let shown = printed(&out);

    assert!(shown.contains("SETUP COMPLETE!"));
    assert!(shown.contains("http://203.0.113.10"));
    assert!(shown.contains("1 of 19 commands exited non-zero:"));
    assert!(shown.contains("  [exit 1] pm2 save"));
}

#[test]
fn report_without_failures_has_no_failure_list() {
    let summary = RunSummary {
        dispatched: 19,
        failed: Vec::new(),
    };
    let mut out: Vec<u8> = Vec::new();

    write_report(&mut out, "example.org", &summary).unwrap();

    assert!(!printed(&out).contains("non-zero"));
}
