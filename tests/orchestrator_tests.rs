// Paired run orchestration against real subprocesses
//
// Benchmarks are shell scripts in a scratch directory. Tests are serialized
// because they write executables and spawn children at the same time.

mod utils;

use pairbench::aggregate::Ratio;
use pairbench::case::{BenchmarkCase, Variant};
use pairbench::json_output::read_records;
use pairbench::orchestrator::{CaseOutcome, CaseState, Orchestrator, RESULT_CSV, RESULT_JSON};
use pairbench::runner::ExitOutcome;
use serial_test::serial;
use std::fs;
use std::time::Duration;
use tempfile::TempDir;
use utils::{direct_settings, write_pair, write_script, write_sequenced, write_steady};

#[test]
#[serial]
fn test_outlier_iteration_trimmed_end_to_end() {
    let root = TempDir::new().unwrap();
    write_sequenced(
        root.path(),
        "X",
        2048,
        &["0:00.100", "0:00.110", "0:00.120", "0:00.900", "0:00.105"],
    );
    write_steady(root.path(), "X.inst", 4096, "0:00.200");

    let cases = vec![BenchmarkCase::new("X", "", root.path())];
    let run = Orchestrator::new(direct_settings(5))
        .run_branch("baseline", "baseline", root.path(), &cases)
        .unwrap();

    assert!(run.failed.is_empty());
    assert_eq!(run.records.len(), 1);
    let record = &run.records[0];
    assert!((record.original_time - 111.67).abs() < 0.01);
    assert_eq!(record.instrument_time, 200.0);
    assert_eq!(record.memory_overhead, Ratio::Value(2.0));
    assert_eq!(record.branch, "baseline");

    let out = root.path().join("output-baseline");
    for i in 0..5 {
        assert!(out.join(format!("X_{i}.out")).is_file());
        assert!(out.join(format!("X.inst_{i}.out")).is_file());
    }
    let csv = fs::read_to_string(out.join(RESULT_CSV)).unwrap();
    assert!(csv.starts_with("benchmark,original_memory,original_time"));
    assert!(csv.lines().nth(1).unwrap().starts_with("X,2048,"));
    assert_eq!(read_records(&out.join(RESULT_JSON)).unwrap(), run.records);
}

#[test]
#[serial]
fn test_parameters_passed_as_arguments() {
    let root = TempDir::new().unwrap();
    let body = "echo \"args: $*\"\necho \"Memory Usage: 10 Time: 0:00.$1\"";
    write_script(root.path(), "c_md.par", body);
    write_script(root.path(), "c_md.par.inst", body);

    let case = BenchmarkCase::new("c_md.par", "25 2256 2", root.path());
    let outcome = Orchestrator::new(direct_settings(1)).run_case(&case, root.path());

    assert_eq!(outcome.state(), CaseState::Success);
    let text = fs::read_to_string(&outcome.artifacts()[0].path).unwrap();
    assert!(text.contains("args: 25 2256 2"));
}

#[test]
#[serial]
fn test_failing_variant_excludes_case() {
    let root = TempDir::new().unwrap();
    write_pair(root.path(), "good", (100, "0:01.00"), (150, "0:01.50"));
    write_steady(root.path(), "bad", 100, "0:01.00");
    // Instrumented build crashes after printing a measurement
    write_script(
        root.path(),
        "bad.inst",
        "echo \"Memory Usage: 100 Time: 0:09.00\"\nexit 3",
    );

    let cases = vec![
        BenchmarkCase::new("bad", "", root.path()),
        BenchmarkCase::new("good", "", root.path()),
    ];
    let run = Orchestrator::new(direct_settings(3))
        .run_branch("main", "main", root.path(), &cases)
        .unwrap();

    assert_eq!(run.records.len(), 1);
    assert_eq!(run.records[0].benchmark, "good");
    assert_eq!(run.records[0].time_overhead, Ratio::Value(1.5));

    let (name, failure) = &run.failed[0];
    assert_eq!(name, "bad");
    assert_eq!(failure.variant, Variant::Instrumented);
    assert_eq!(failure.iteration, 0);
    assert_eq!(failure.status, ExitOutcome::Exited(3));

    // Artifacts of the failing iteration are kept, later iterations never ran
    let out = root.path().join("output-main");
    assert!(out.join("bad_0.out").is_file());
    assert!(out.join("bad.inst_0.out").is_file());
    assert!(!out.join("bad_1.out").exists());

    let csv = fs::read_to_string(out.join(RESULT_CSV)).unwrap();
    assert!(!csv.contains("bad"));
}

#[test]
#[serial]
fn test_failure_in_later_iteration_discards_earlier_samples() {
    let root = TempDir::new().unwrap();
    write_steady(root.path(), "flaky", 100, "0:01.00");
    write_script(
        root.path(),
        "flaky.inst",
        r#"f="$0.count"
n=$(cat "$f" 2>/dev/null || echo 0)
echo $((n + 1)) > "$f"
echo "Memory Usage: 100 Time: 0:01.00"
[ "$n" -lt 2 ]"#,
    );

    let case = BenchmarkCase::new("flaky", "", root.path());
    let outcome = Orchestrator::new(direct_settings(5)).run_case(&case, root.path());

    match outcome {
        CaseOutcome::Failed { artifacts, failure } => {
            assert_eq!(failure.iteration, 2);
            assert_eq!(artifacts.len(), 6);
        }
        CaseOutcome::Success { .. } => panic!("third instrumented run should fail the case"),
    }
}

#[test]
#[serial]
fn test_timeout_kills_and_fails_case() {
    let root = TempDir::new().unwrap();
    write_script(root.path(), "hang", "echo started\nsleep 30");
    write_steady(root.path(), "hang.inst", 1, "0:00.01");

    let mut settings = direct_settings(2);
    settings.timeout = Duration::from_millis(300);
    let case = BenchmarkCase::new("hang", "", root.path());

    let start = std::time::Instant::now();
    let outcome = Orchestrator::new(settings).run_case(&case, root.path());
    assert!(start.elapsed() < Duration::from_secs(10));

    match outcome {
        CaseOutcome::Failed { failure, .. } => {
            assert_eq!(failure.status, ExitOutcome::TimedOut);
            assert_eq!(failure.variant, Variant::Original);
        }
        CaseOutcome::Success { .. } => panic!("hanging case must time out"),
    }
}

#[test]
#[serial]
fn test_no_successful_cases_writes_no_result() {
    let root = TempDir::new().unwrap();
    write_script(root.path(), "dead", "exit 1");
    write_script(root.path(), "dead.inst", "exit 1");

    let cases = vec![BenchmarkCase::new("dead", "", root.path())];
    let run = Orchestrator::new(direct_settings(2))
        .run_branch("main", "main", root.path(), &cases)
        .unwrap();

    assert!(run.records.is_empty());
    assert_eq!(run.failed.len(), 1);
    assert!(!run.output_dir.join(RESULT_CSV).exists());
}

#[test]
#[serial]
fn test_clean_exit_without_measurement_is_no_data() {
    let root = TempDir::new().unwrap();
    write_script(root.path(), "quiet", "true");
    write_script(root.path(), "quiet.inst", "true");

    let cases = vec![BenchmarkCase::new("quiet", "", root.path())];
    let run = Orchestrator::new(direct_settings(2))
        .run_branch("main", "main", root.path(), &cases)
        .unwrap();

    assert!(run.records.is_empty());
    assert!(run.failed.is_empty());
    assert_eq!(run.no_data, vec!["quiet".to_string()]);
}

#[test]
#[serial]
fn test_output_dir_is_recreated() {
    let root = TempDir::new().unwrap();
    write_pair(root.path(), "a", (1, "0:00.10"), (1, "0:00.10"));
    let stale = root.path().join("output-main");
    fs::create_dir_all(&stale).unwrap();
    fs::write(stale.join("old_7.out"), "stale").unwrap();

    let cases = vec![BenchmarkCase::new("a", "", root.path())];
    Orchestrator::new(direct_settings(1))
        .run_branch("main", "main", root.path(), &cases)
        .unwrap();

    assert!(!stale.join("old_7.out").exists());
    assert!(stale.join("a_0.out").exists());
}

#[test]
#[serial]
fn test_wrapper_and_env_reach_benchmark() {
    let root = TempDir::new().unwrap();
    let body = "echo \"Memory Usage: $OMP_NUM_THREADS Time: 0:00.50\"";
    write_script(root.path(), "env_echo", body);
    write_script(root.path(), "env_echo.inst", body);

    let mut settings = direct_settings(1).with_env("OMP_NUM_THREADS", "8");
    settings.time_wrapper = vec!["env".to_string()];
    let cases = vec![BenchmarkCase::new("env_echo", "", root.path())];
    let run = Orchestrator::new(settings)
        .run_branch("main", "main", root.path(), &cases)
        .unwrap();

    assert_eq!(run.records[0].original_memory, 8.0);
}

#[test]
#[serial]
fn test_collect_counters_runs_instrumented_once() {
    let root = TempDir::new().unwrap();
    write_script(root.path(), "DRB001-antidep1.inst", "echo \"Check Access Function Call: 42\"");
    write_script(root.path(), "DRB001-antidep1", "exit 9");

    let out = TempDir::new().unwrap();
    let cases = vec![BenchmarkCase::new("DRB001-antidep1", "", root.path())];
    let artifacts = Orchestrator::new(direct_settings(5)).collect_counters(&cases, out.path());

    assert_eq!(artifacts.len(), 1);
    assert!(artifacts[0].status.is_success());
    let text = fs::read_to_string(out.path().join("DRB001-antidep1.inst.out")).unwrap();
    assert_eq!(text.trim(), "Check Access Function Call: 42");
}

#[test]
#[serial]
fn test_failed_counter_run_is_set_aside() {
    let root = TempDir::new().unwrap();
    write_script(
        root.path(),
        "DRB002-antidep1.inst",
        "echo \"Check Access Function Call: 300\"\nexit 139",
    );

    let out = TempDir::new().unwrap();
    let cases = vec![BenchmarkCase::new("DRB002-antidep1", "", root.path())];
    let artifacts = Orchestrator::new(direct_settings(1)).collect_counters(&cases, out.path());

    assert_eq!(artifacts[0].status, ExitOutcome::Exited(139));
    let failed = out.path().join("DRB002-antidep1.inst.out.failed");
    assert_eq!(artifacts[0].path, failed);
    assert!(!out.path().join("DRB002-antidep1.inst.out").exists());
    // Output is still there for inspection
    assert!(fs::read_to_string(&failed).unwrap().contains("300"));
}

#[test]
#[serial]
fn test_variants_alternate_in_iteration_order() {
    let root = TempDir::new().unwrap();
    let log = root.path().join("order.log");
    // An overlapping invocation would interleave its start/end lines
    let body = format!(
        r#"name=$(basename "$0")
echo "$name start" >> "{log}"
sleep 0.1
echo "$name end" >> "{log}"
echo "Memory Usage: 1 Time: 0:00.10""#,
        log = log.display()
    );
    write_script(root.path(), "X", &body);
    write_script(root.path(), "X.inst", &body);

    let case = BenchmarkCase::new("X", "", root.path());
    let outcome = Orchestrator::new(direct_settings(3)).run_case(&case, root.path());
    assert_eq!(outcome.state(), CaseState::Success);

    let order = fs::read_to_string(&log).unwrap();
    let order: Vec<&str> = order.lines().collect();
    let expected: Vec<String> = ["X", "X.inst", "X", "X.inst", "X", "X.inst"]
        .iter()
        .flat_map(|name| [format!("{name} start"), format!("{name} end")])
        .collect();
    assert_eq!(order, expected);

    let recorded: Vec<(Variant, u32)> = outcome
        .artifacts()
        .iter()
        .map(|a| (a.variant, a.iteration))
        .collect();
    assert_eq!(
        recorded,
        vec![
            (Variant::Original, 0),
            (Variant::Instrumented, 0),
            (Variant::Original, 1),
            (Variant::Instrumented, 1),
            (Variant::Original, 2),
            (Variant::Instrumented, 2),
        ]
    );
}
