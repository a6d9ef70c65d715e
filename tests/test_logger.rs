// tests/test_logger.rs
use rs_log_ng::loggers::LogLevel;
use rs_log_ng::loggers::sink::{FILE_APP, FILE_DEBUG, FILE_ERROR, FILE_INFO, FILE_PANIC, FILE_STDERR, FILE_WARN};
use rs_log_ng::{LogConfig, Logger, LoggerBuilder};
use serde_json::Value;
use std::fs;
use std::path::Path;

use rs_log_ng::{debug, error, info, panic_log, warn};

/// Writes `doc` as `logger.yaml` inside `dir` and returns its path.
fn write_config(dir: &Path, doc: &str) -> String {
    let path = dir.join("logger.yaml");
    fs::write(&path, doc).expect("write config");
    path.display().to_string()
}

fn read(dir: &Path, name: &str) -> String {
    fs::read_to_string(dir.join(name)).unwrap_or_default()
}

fn json_lines(text: &str) -> Vec<Value> {
    text.lines()
        .map(|l| serde_json::from_str(l).expect("every line is a JSON object"))
        .collect()
}

#[test]
fn separated_mode_routes_each_level_to_its_own_file() {
    let tmp = tempfile::tempdir().unwrap();
    let cfg = write_config(
        tmp.path(),
        "encoder: console\nseparate_levels: true\nshow_goroutine: false\nlog_level: debug\nencode_level: Capital\n",
    );
    let logs = tmp.path().join("logs");
    let logger = Logger::create(&cfg, &logs.display().to_string()).unwrap();

    logger.debug("msg-debug-1");
    logger.info("x");
    logger.warn("y");
    logger.error("msg-error-1");
    logger.panic("msg-panic-1");

    let info_log = read(&logs, FILE_INFO);
    let warn_log = read(&logs, FILE_WARN);
    assert!(info_log.contains("INFO") && info_log.contains(" x\n"), "{}", info_log);
    assert!(!info_log.contains(" y\n"));
    assert!(warn_log.contains("WARN") && warn_log.contains(" y\n"), "{}", warn_log);
    assert!(!warn_log.contains(" x\n"));

    let expected = [
        (FILE_DEBUG, "msg-debug-1"),
        (FILE_ERROR, "msg-error-1"),
        (FILE_PANIC, "msg-panic-1"),
    ];
    for (file, msg) in expected {
        let content = read(&logs, file);
        let records: Vec<&str> = content.lines().filter(|l| l.contains("msg-")).collect();
        assert_eq!(records.len(), 1, "{} should hold one record: {}", file, content);
        assert!(records[0].contains(msg));
    }
    for file in [FILE_INFO, FILE_WARN] {
        assert!(!read(&logs, file).contains("msg-"));
    }

    let failure = read(&logs, FILE_STDERR);
    assert!(failure.contains("msg-panic-1"), "panic record must reach the failure stream");
    assert!(!failure.contains("msg-error-1"));
}

#[test]
fn unified_mode_honors_minimum_level() {
    let tmp = tempfile::tempdir().unwrap();
    let cfg = write_config(tmp.path(), "encoder: json\nseparate_levels: false\nlog_level: \"warn\"\n");
    let logs = tmp.path().join("app");
    let logger = Logger::create(&cfg, &logs.display().to_string()).unwrap();

    logger.debug("a");
    logger.info("b");
    logger.warn("c");
    logger.error("d");

    let records = json_lines(&read(&logs, FILE_APP));
    let messages: Vec<&str> = records.iter().map(|r| r["message"].as_str().unwrap()).collect();
    assert_eq!(messages, vec!["c", "d"]);
    assert_eq!(records[0]["level"], "warn");
    assert!(!logs.join(FILE_INFO).exists());
    assert!(!logs.join(FILE_STDERR).exists());
}

#[test]
fn separated_mode_writes_debug_without_log_level() {
    let tmp = tempfile::tempdir().unwrap();
    let cfg = write_config(tmp.path(), "encoder: console\nseparate_levels: true\n");
    let logs = tmp.path().join("logs");
    let logger = Logger::create(&cfg, &logs.display().to_string()).unwrap();

    assert!(logger.enabled(LogLevel::Debug));
    logger.debug("dbg-record");
    logger.info("info-record");

    assert!(read(&logs, FILE_DEBUG).contains("dbg-record"), "debug record missing from debug.log");
    assert!(read(&logs, FILE_INFO).contains("info-record"));
    assert!(!read(&logs, FILE_INFO).contains("dbg-record"));
}

#[test]
fn unified_default_minimum_is_info() {
    let tmp = tempfile::tempdir().unwrap();
    let cfg = write_config(tmp.path(), "encoder: console\nseparate_levels: false\n");
    let logs = tmp.path().join("logs");
    let logger = Logger::create(&cfg, &logs.display().to_string()).unwrap();

    assert_eq!(logger.min_level(), LogLevel::Info);
    logger.debug("hidden");
    logger.info("shown");

    let app = read(&logs, FILE_APP);
    assert!(!app.contains("hidden"));
    assert!(app.contains("shown"));
}

#[test]
fn identity_tag_present_only_when_enabled() {
    let tmp = tempfile::tempdir().unwrap();
    let on = write_config(tmp.path(), "encoder: json\nshow_goroutine: true\n");
    let on_dir = tmp.path().join("on");
    let logger = Logger::create(&on, &on_dir.display().to_string()).unwrap();
    logger.info("tagged");
    logger.warn("tagged too");

    for file in [FILE_INFO, FILE_WARN] {
        for record in json_lines(&read(&on_dir, file)) {
            let id = record["context_id"].as_str().expect("context_id field");
            assert!(!id.is_empty());
        }
    }

    let off = write_config(tmp.path(), "encoder: json\nshow_goroutine: false\n");
    let off_dir = tmp.path().join("off");
    let logger = Logger::create(&off, &off_dir.display().to_string()).unwrap();
    logger.info("plain");
    let record = &json_lines(&read(&off_dir, FILE_INFO))[0];
    assert!(record.get("context_id").is_none());
}

#[test]
fn json_record_shape_and_caller() {
    let tmp = tempfile::tempdir().unwrap();
    let cfg = write_config(
        tmp.path(),
        "encoder: json\nshow_line: true\nencode_level: Capital\nstacktrace_key: trace\n",
    );
    let logs = tmp.path().join("logs");
    let logger = LoggerBuilder::new(LogConfig::load(&cfg, &logs.display().to_string()).unwrap())
        .with_name("billing")
        .build()
        .unwrap();

    logger.info("This is an info message from new logger");
    logger.panic("fell over");

    let record = &json_lines(&read(&logs, FILE_INFO))[0];
    assert_eq!(record["level"], "INFO");
    assert_eq!(record["logger"], "billing");
    assert_eq!(record["message"], "This is an info message from new logger");
    assert!(record["caller"].as_str().unwrap().starts_with("tests/test_logger.rs:"));
    let time = record["time"].as_str().unwrap();
    assert!(time.starts_with('[') && time.ends_with(']') && time.len() == 25, "{}", time);

    let panic_record = &json_lines(&read(&logs, FILE_PANIC))[0];
    assert!(panic_record.get("trace").is_some());
    assert!(panic_record.get("stacktrace").is_none());
}

#[test]
fn macros_attach_structured_fields() {
    let tmp = tempfile::tempdir().unwrap();
    let cfg = write_config(tmp.path(), "encoder: json\nseparate_levels: false\nlog_level: debug\n");
    let logs = tmp.path().join("logs");
    let logger = Logger::create(&cfg, &logs.display().to_string()).unwrap();

    debug!(logger, "debug message", "k" => "v2");
    info!(logger, "info message", "k" => "v3");
    warn!(logger, "warn message", "attempt" => 4);
    error!(logger, "error message", "error" => "boom");
    panic_log!(logger, "panic message");

    let records = json_lines(&read(&logs, FILE_APP));
    assert_eq!(records.len(), 5);
    assert_eq!(records[1]["k"], "v3");
    assert_eq!(records[2]["attempt"], 4);
    assert_eq!(records[3]["error"], "boom");
    assert_eq!(records[4]["level"], "panic");
}

#[test]
fn macro_fields_keep_the_record_message() {
    let tmp = tempfile::tempdir().unwrap();
    let cfg = write_config(tmp.path(), "encoder: json\nseparate_levels: false\n");
    let logs = tmp.path().join("logs");
    let logger = Logger::create(&cfg, &logs.display().to_string()).unwrap();

    info!(logger, "real message", "message" => "user field", "level" => "nope");

    let record = &json_lines(&read(&logs, FILE_APP))[0];
    assert_eq!(record["message"], "real message");
    assert_eq!(record["level"], "info");
    assert_eq!(record["fields.message"], "user field");
    assert_eq!(record["fields.level"], "nope");
}

#[test]
fn printf_formats_at_info() {
    let tmp = tempfile::tempdir().unwrap();
    let cfg = write_config(tmp.path(), "encoder: console\nencode_level: Capital\n");
    let logs = tmp.path().join("logs");
    let logger = Logger::create(&cfg, &logs.display().to_string()).unwrap();

    let username = "testuser";
    let login_time = "2024-01-01 12:00:00";
    logger.printf(format_args!("用户 {} 登录成功，时间: {}", username, login_time));

    let content = read(&logs, FILE_INFO);
    assert!(content.contains("INFO"));
    assert!(content.contains("用户 testuser 登录成功，时间: 2024-01-01 12:00:00"));
}

#[test]
fn high_performance_buffers_until_sync() {
    let tmp = tempfile::tempdir().unwrap();
    let cfg = write_config(
        tmp.path(),
        "encoder: json\nhigh_performance: true\nseparate_levels: true\nshow_line: true\n",
    );
    let logs = tmp.path().join("fast");
    let logger = Logger::create(&cfg, &logs.display().to_string()).unwrap();

    logger.info("fast path");
    logger.sync();

    let records = json_lines(&read(&logs, FILE_APP));
    assert_eq!(records.len(), 1);
    assert!(records[0].get("caller").is_none(), "fast path skips call sites");
    assert!(!logs.join(FILE_INFO).exists());
}

#[test]
fn high_performance_errors_reach_disk_without_sync() {
    let tmp = tempfile::tempdir().unwrap();
    let cfg = write_config(tmp.path(), "encoder: json\nhigh_performance: true\n");
    let logs = tmp.path().join("fast");
    let logger = Logger::create(&cfg, &logs.display().to_string()).unwrap();

    logger.info("buffered");
    logger.error("important-error");

    let app = read(&logs, FILE_APP);
    assert!(app.contains("important-error"), "{}", app);
    // Everything ahead of the error went out with it.
    assert!(app.contains("buffered"));
}

#[test]
fn path_and_directory_are_concatenated() {
    let tmp = tempfile::tempdir().unwrap();
    let base = tmp.path().display().to_string();
    let cfg = write_config(tmp.path(), &format!("encoder: console\npath: \"{}\"\n", base));

    let logger = Logger::create(&cfg, "/nested/logs").unwrap();
    logger.info("deep");

    assert!(read(&tmp.path().join("nested/logs"), FILE_INFO).contains("deep"));
}

#[test]
fn log_stdout_still_writes_files() {
    let tmp = tempfile::tempdir().unwrap();
    let cfg = write_config(tmp.path(), "encoder: console\nlog_stdout: true\n");
    let logs = tmp.path().join("logs");
    let logger = Logger::create(&cfg, &logs.display().to_string()).unwrap();

    logger.warn("mirrored");

    assert!(read(&logs, FILE_WARN).contains("mirrored"));
    assert_eq!(logger.write_errors(), 0);
}
