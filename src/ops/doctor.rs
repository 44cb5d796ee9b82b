//! Environment health checks.
//!
//! The `doctor` command performs fast environment checks to verify that
//! the tools an install run depends on are available and that the home
//! base is usable.
//!
//! ## Checks Performed
//!
//! - Shell availability (`sh`, used to run configure scripts)
//! - Build tool availability (`make`)
//! - Home base directory writability
//! - Configuration file parseability

use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;
use std::process::Command;
use std::time::{Duration, Instant};

use anyhow::Result;

use crate::util::process::find_executable;
use crate::util::{Config, GlobalContext};

/// Result of a single health check.
#[derive(Debug, Clone)]
pub struct CheckResult {
    /// Name of the check
    pub name: String,

    /// Whether the check passed
    pub passed: bool,

    /// Human-readable status message
    pub message: String,

    /// Path to the tool (if applicable)
    pub path: Option<PathBuf>,

    /// Version string (if applicable)
    pub version: Option<String>,

    /// How long the check took
    pub duration: Duration,

    /// Whether this check is required or optional
    pub required: bool,
}

impl CheckResult {
    /// Create a passing check result.
    pub fn pass(name: impl Into<String>, message: impl Into<String>) -> Self {
        CheckResult {
            name: name.into(),
            passed: true,
            message: message.into(),
            path: None,
            version: None,
            duration: Duration::ZERO,
            required: true,
        }
    }

    /// Create a failing check result.
    pub fn fail(name: impl Into<String>, message: impl Into<String>) -> Self {
        CheckResult {
            name: name.into(),
            passed: false,
            message: message.into(),
            path: None,
            version: None,
            duration: Duration::ZERO,
            required: true,
        }
    }

    /// Mark this check as optional.
    pub fn optional(mut self) -> Self {
        self.required = false;
        self
    }

    /// Set the tool path.
    pub fn with_path(mut self, path: PathBuf) -> Self {
        self.path = Some(path);
        self
    }

    /// Set the version.
    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = Some(version.into());
        self
    }

    /// Set the duration.
    pub fn with_duration(mut self, duration: Duration) -> Self {
        self.duration = duration;
        self
    }
}

/// Summary of all health checks.
#[derive(Debug, Clone)]
pub struct DoctorReport {
    /// Individual check results
    pub checks: Vec<CheckResult>,

    /// Total time taken
    pub total_duration: Duration,

    /// Environment information
    pub environment: HashMap<String, String>,
}

impl DoctorReport {
    /// Create a new empty report.
    pub fn new() -> Self {
        DoctorReport {
            checks: Vec::new(),
            total_duration: Duration::ZERO,
            environment: HashMap::new(),
        }
    }

    /// Add a check result.
    pub fn add(&mut self, check: CheckResult) {
        self.checks.push(check);
    }

    /// Check if all required checks passed.
    pub fn all_required_passed(&self) -> bool {
        self.checks.iter().filter(|c| c.required).all(|c| c.passed)
    }

    /// Get the count of passed checks.
    pub fn passed_count(&self) -> usize {
        self.checks.iter().filter(|c| c.passed).count()
    }

    /// Get the count of failed checks.
    pub fn failed_count(&self) -> usize {
        self.checks.iter().filter(|c| !c.passed).count()
    }

    /// Get the count of required failed checks.
    pub fn required_failed_count(&self) -> usize {
        self.checks
            .iter()
            .filter(|c| c.required && !c.passed)
            .count()
    }
}

impl Default for DoctorReport {
    fn default() -> Self {
        Self::new()
    }
}

/// Run all health checks. Individual problems land in the report; the
/// call itself only fails on internal errors.
pub fn doctor(ctx: &GlobalContext) -> Result<DoctorReport> {
    let start = Instant::now();
    let mut report = DoctorReport::new();

    // Collect environment info
    report
        .environment
        .insert("os".to_string(), std::env::consts::OS.to_string());
    report
        .environment
        .insert("arch".to_string(), std::env::consts::ARCH.to_string());
    report
        .environment
        .insert("home".to_string(), ctx.home().display().to_string());

    report.add(check_shell());
    report.add(check_make());
    report.add(check_home(ctx));
    report.add(check_config(ctx));

    report.total_duration = start.elapsed();
    Ok(report)
}

/// Check for a shell to run configure scripts with.
fn check_shell() -> CheckResult {
    let start = Instant::now();

    match find_executable("sh") {
        Some(path) => CheckResult::pass("Shell", "sh is available")
            .with_path(path)
            .with_duration(start.elapsed()),
        None => CheckResult::fail("Shell", "sh not found (needed to run configure scripts)")
            .with_duration(start.elapsed()),
    }
}

/// Check for make.
fn check_make() -> CheckResult {
    let start = Instant::now();

    match find_executable("make") {
        Some(path) => {
            let mut result = CheckResult::pass("Build Tool", "make is available").with_path(path);
            if let Some(version) = probe_version("make", "--version") {
                result = result.with_version(version);
            }
            result.with_duration(start.elapsed())
        }
        None => CheckResult::fail("Build Tool", "make not found (default build step)")
            .with_duration(start.elapsed()),
    }
}

/// Check that the home base can be created and written to.
fn check_home(ctx: &GlobalContext) -> CheckResult {
    let start = Instant::now();
    let home = ctx.home();

    let probe = home.join(".doctor-probe");
    let outcome = fs::create_dir_all(home)
        .and_then(|_| fs::write(&probe, b"probe"))
        .and_then(|_| fs::remove_file(&probe));

    match outcome {
        Ok(_) => CheckResult::pass("Home Directory", format!("{} is writable", home.display()))
            .with_path(home.to_path_buf())
            .with_duration(start.elapsed()),
        Err(e) => CheckResult::fail(
            "Home Directory",
            format!("{} is not writable: {}", home.display(), e),
        )
        .with_duration(start.elapsed()),
    }
}

/// Check that the configuration file, when present, parses.
fn check_config(ctx: &GlobalContext) -> CheckResult {
    let start = Instant::now();
    let path = ctx.config_path();

    if !path.exists() {
        return CheckResult::pass("Configuration", "no configuration file (defaults in use)")
            .with_duration(start.elapsed())
            .optional();
    }

    match Config::load(&path) {
        Ok(_) => CheckResult::pass("Configuration", format!("loaded {}", path.display()))
            .with_path(path)
            .with_duration(start.elapsed())
            .optional(),
        Err(e) => CheckResult::fail("Configuration", format!("{:#}", e))
            .with_duration(start.elapsed())
            .optional(),
    }
}

/// First line of a tool's version output.
fn probe_version(program: &str, flag: &str) -> Option<String> {
    let output = Command::new(program).arg(flag).output().ok()?;
    if !output.status.success() {
        return None;
    }

    let text = String::from_utf8_lossy(&output.stdout);
    text.lines()
        .next()
        .map(|line| line.trim().to_string())
        .filter(|line| !line.is_empty())
}

/// Format the doctor report for display.
pub fn format_report(report: &DoctorReport, verbose: bool) -> String {
    use std::fmt::Write;

    let mut output = String::new();

    writeln!(output, "Capstan Doctor").unwrap();
    writeln!(output, "==============\n").unwrap();

    // Environment
    if verbose {
        writeln!(output, "Environment:").unwrap();
        writeln!(
            output,
            "  OS: {} ({})",
            report
                .environment
                .get("os")
                .unwrap_or(&"unknown".to_string()),
            report
                .environment
                .get("arch")
                .unwrap_or(&"unknown".to_string())
        )
        .unwrap();
        if let Some(home) = report.environment.get("home") {
            writeln!(output, "  Home: {}", home).unwrap();
        }
        writeln!(output).unwrap();
    }

    // Checks
    writeln!(output, "Checks:").unwrap();
    for check in &report.checks {
        let status = if check.passed { "[OK]" } else { "[!!]" };
        let required = if check.required { "" } else { " (optional)" };

        writeln!(output, "  {} {}{}", status, check.name, required).unwrap();

        if verbose {
            writeln!(output, "      {}", check.message).unwrap();
            if let Some(path) = &check.path {
                writeln!(output, "      Path: {}", path.display()).unwrap();
            }
            if let Some(version) = &check.version {
                writeln!(output, "      Version: {}", version).unwrap();
            }
        }
    }

    writeln!(output).unwrap();

    // Summary
    let passed = report.passed_count();
    let failed = report.failed_count();
    let required_failed = report.required_failed_count();

    writeln!(output, "Summary: {} passed, {} failed", passed, failed).unwrap();

    if required_failed > 0 {
        writeln!(
            output,
            "\nWarning: {} required check(s) failed. Installs may not work.",
            required_failed
        )
        .unwrap();
    } else if failed > 0 {
        writeln!(
            output,
            "\nAll required checks passed. {} optional check(s) failed.",
            failed
        )
        .unwrap();
    } else {
        writeln!(output, "\nAll checks passed. Capstan is ready to use.").unwrap();
    }

    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_check_result_pass() {
        let result = CheckResult::pass("test", "passed");
        assert!(result.passed);
        assert!(result.required);
    }

    #[test]
    fn test_check_result_optional() {
        let result = CheckResult::pass("test", "passed").optional();
        assert!(result.passed);
        assert!(!result.required);
    }

    #[test]
    fn test_doctor_report_all_passed() {
        let mut report = DoctorReport::new();
        report.add(CheckResult::pass("check1", "ok"));
        report.add(CheckResult::pass("check2", "ok"));

        assert!(report.all_required_passed());
        assert_eq!(report.passed_count(), 2);
        assert_eq!(report.failed_count(), 0);
    }

    #[test]
    fn test_doctor_report_required_failure() {
        let mut report = DoctorReport::new();
        report.add(CheckResult::pass("check1", "ok"));
        report.add(CheckResult::fail("check2", "missing"));
        report.add(CheckResult::fail("check3", "missing").optional());

        assert!(!report.all_required_passed());
        assert_eq!(report.required_failed_count(), 1);
        assert_eq!(report.failed_count(), 2);
    }

    #[test]
    fn test_doctor_runs_all_checks() {
        let tmp = TempDir::new().unwrap();
        let ctx = GlobalContext::with_home(tmp.path().join("home")).unwrap();

        let report = doctor(&ctx).unwrap();

        assert_eq!(report.checks.len(), 4);
        let home_check = report
            .checks
            .iter()
            .find(|c| c.name == "Home Directory")
            .unwrap();
        assert!(home_check.passed);
    }

    #[test]
    fn test_format_report_summary() {
        let mut report = DoctorReport::new();
        report.add(CheckResult::pass("Shell", "sh is available"));
        report.add(CheckResult::fail("Build Tool", "make not found"));

        let text = format_report(&report, false);

        assert!(text.contains("Capstan Doctor"));
        assert!(text.contains("[OK] Shell"));
        assert!(text.contains("[!!] Build Tool"));
        assert!(text.contains("Summary: 1 passed, 1 failed"));
    }
}
