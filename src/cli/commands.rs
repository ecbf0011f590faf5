//! CLI command implementations
//!
//! All command functions return `CliResult<ExitCode>` instead of calling
//! `process::exit`. Error handling and exits happen in the top-level `run()`.

use std::collections::HashMap;
use std::io::IsTerminal;
use std::path::{Path, PathBuf};

use crate::backend::writer::{FileStatus, WriteMode};
use crate::config::Config;
use crate::frontend::diagnostics::{self, Diagnostic, DiagnosticSink};
use crate::frontend::source;
use crate::pipeline::{self, Action, RunReport};

use super::{CliError, CliResult, ExitCode};

// ============================================================================
// Diagnostic rendering
// ============================================================================

/// Renders each diagnostic to stderr as it is reported, with the source line it points at.
pub struct StderrSink {
    color: bool,
    sources: HashMap<PathBuf, Option<String>>,
}

impl StderrSink {
    pub fn new() -> Self {
        Self {
            color: std::io::stderr().is_terminal(),
            sources: HashMap::new(),
        }
    }

    fn source(&mut self, path: &Path) -> Option<&str> {
        self.sources
            .entry(path.to_path_buf())
            .or_insert_with(|| source::read_source(path).ok())
            .as_deref()
    }
}

impl Default for StderrSink {
    fn default() -> Self {
        Self::new()
    }
}

impl DiagnosticSink for StderrSink {
    fn report(&mut self, diagnostic: Diagnostic) {
        let color = self.color;
        let text = self.source(&diagnostic.position.file).map(str::to_string);
        eprint!("{}", diagnostics::render(&diagnostic, text.as_deref(), color));
    }
}

fn run_pass(paths: &[PathBuf], config: &Config, action: Action) -> CliResult<RunReport> {
    let mut sink = StderrSink::new();
    pipeline::run(paths, config, action, &mut sink).map_err(|e| CliError::failure(format!("Error: {e}")))
}

fn exit_code(report: &RunReport) -> ExitCode {
    if report.succeeded() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}

// ============================================================================
// Commands
// ============================================================================

/// Generate files for every annotated record under `paths`.
pub fn generate(paths: &[PathBuf], config: &Config) -> CliResult<ExitCode> {
    let report = run_pass(paths, config, Action::Persist(WriteMode::Write))?;

    let changed = report
        .generated
        .iter()
        .filter(|g| matches!(g.status, Some(FileStatus::Created | FileStatus::Updated)))
        .count();
    println!(
        "Generated {} file(s), {} unchanged",
        changed,
        report.generated.len() - changed
    );
    if !report.succeeded() {
        eprintln!("{} error(s)", report.diagnostics);
    }
    Ok(exit_code(&report))
}

/// Compare generated files under `paths` with what `generate` would write.
pub fn check(paths: &[PathBuf], config: &Config) -> CliResult<ExitCode> {
    let report = run_pass(paths, config, Action::Persist(WriteMode::Check))?;
    if report.succeeded() {
        println!("{} generated file(s) up to date", report.generated.len());
    } else {
        eprintln!("{} error(s)", report.diagnostics);
    }
    Ok(exit_code(&report))
}

/// Print the generated output for every annotated record of one file (debug).
pub fn emit(file: &Path, config: &Config) -> CliResult<ExitCode> {
    let report = run_pass(&[file.to_path_buf()], config, Action::Preview)?;
    for generated in &report.generated {
        println!("// ==> {}", generated.path.display());
        print!("{}", generated.text);
    }
    Ok(exit_code(&report))
}

/// Print the parsed directives and inferred wire types of one file (debug).
pub fn directives(file: &Path, config: &Config) -> CliResult<ExitCode> {
    let mut sink = StderrSink::new();
    let mut collected = diagnostics::Diagnostics::new();
    let records = pipeline::scan(&[file.to_path_buf()], config, &mut collected)
        .map_err(|e| CliError::failure(format!("Error: {e}")))?;

    print!("{}", pipeline::describe_records(&records));
    let failed = !collected.is_empty();
    for diagnostic in collected.into_vec() {
        sink.report(diagnostic);
    }
    Ok(if failed { ExitCode::FAILURE } else { ExitCode::SUCCESS })
}
