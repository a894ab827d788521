//! Fixture runner for `.test.toml` files.
//!
//! ```toml
//! description = "column type is readable as a string"
//! [vars]
//! owner = "dba"
//! [[expect]]
//! path = "table.users.column.id.type"
//! value = "int"
//! [document]
//! [[document.blocks]]
//! type = "table"
//! labels = ["users"]
//! ```

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use evaluator::{EvalContext, Value};
use schemacfg::Document;

use crate::loader::toml_to_value;

const FIXTURE_SUFFIX: &str = ".test.toml";

#[derive(Debug, Deserialize)]
pub struct Expectation {
    /// Dotted path into the evaluation context.
    pub path: String,

    /// Expected value. The actual value is converted to the expected value's
    /// type before comparing, so literals can be checked as strings.
    #[serde(default)]
    pub value: Option<toml::Value>,

    /// Expect a (typed) null at `path`.
    #[serde(default)]
    pub null: bool,
}

#[derive(Debug, Deserialize)]
pub struct Fixture {
    /// Human-readable test description.
    #[serde(default)]
    pub description: Option<String>,

    /// Input variable overrides.
    #[serde(default)]
    pub vars: BTreeMap<String, toml::Value>,

    /// Expected evaluation error; its Display string must contain this substring.
    #[serde(default)]
    pub expect_error: Option<String>,

    #[serde(default)]
    pub expect: Vec<Expectation>,

    pub document: Document,
}

pub enum TestOutcome {
    Pass,
    Fail(String),
}

pub struct TestResult {
    pub path: PathBuf,
    pub description: Option<String>,
    pub outcome: TestOutcome,
}

impl TestResult {
    fn label(&self) -> String {
        self.description.clone().unwrap_or_else(|| {
            self.path
                .file_name()
                .and_then(|s| s.to_str())
                .map(|s| s.trim_end_matches(FIXTURE_SUFFIX).to_string())
                .unwrap_or_else(|| "?".to_string())
        })
    }
}

fn run_single_test(path: &Path) -> TestResult {
    let fixture = std::fs::read_to_string(path)
        .map_err(|e| format!("cannot read file: {}", e))
        .and_then(|content| {
            toml::from_str::<Fixture>(&content).map_err(|e| format!("fixture error: {}", e))
        });
    match fixture {
        Ok(fixture) => TestResult {
            path: path.to_path_buf(),
            description: fixture.description.clone(),
            outcome: match check_fixture(&fixture) {
                None => TestOutcome::Pass,
                Some(reason) => TestOutcome::Fail(reason),
            },
        },
        Err(reason) => TestResult {
            path: path.to_path_buf(),
            description: None,
            outcome: TestOutcome::Fail(reason),
        },
    }
}

/// Evaluate a fixture. Returns `Some(reason)` on mismatch.
fn check_fixture(fixture: &Fixture) -> Option<String> {
    let overrides: BTreeMap<String, Value> = fixture
        .vars
        .iter()
        .map(|(name, value)| (name.clone(), toml_to_value(value)))
        .collect();

    let mut ctx = EvalContext::new();
    let result = evaluator::evaluate_document(&mut ctx, &fixture.document, &overrides);

    match (&fixture.expect_error, result) {
        (Some(expected), Err(err)) => {
            let err = err.to_string();
            if !err.contains(expected.as_str()) {
                return Some(format!(
                    "expected error containing \"{}\", got: {}",
                    expected, err
                ));
            }
        }
        (Some(expected), Ok(())) => {
            return Some(format!(
                "expected error containing \"{}\", but evaluation succeeded",
                expected
            ));
        }
        (None, Err(err)) => return Some(format!("unexpected evaluation error: {}", err)),
        (None, Ok(())) => {}
    }

    fixture
        .expect
        .iter()
        .enumerate()
        .find_map(|(i, expectation)| check_expectation(&ctx, expectation).map(|r| format!("expect[{}]: {}", i, r)))
}

fn check_expectation(ctx: &EvalContext, expectation: &Expectation) -> Option<String> {
    let Some(actual) = ctx.lookup(&expectation.path) else {
        return Some(format!("nothing is bound at \"{}\"", expectation.path));
    };

    if expectation.null {
        return (!actual.is_null()).then(|| {
            format!("expected null at \"{}\", got: {}", expectation.path, actual)
        });
    }

    let expected = toml_to_value(expectation.value.as_ref()?);
    match evaluator::convert(ctx.types(), actual.clone(), &expected.ty()) {
        Ok(converted) if converted == expected => None,
        Ok(converted) => Some(format!(
            "value mismatch at \"{}\"\n  expected: {}\n  actual:   {}",
            expectation.path, expected, converted
        )),
        Err(e) => Some(format!(
            "value at \"{}\" ({}) does not convert to {}: {}",
            expectation.path,
            actual,
            expected.ty(),
            e
        )),
    }
}

/// Discover fixtures grouped by category (subfolder relative to root).
/// Files directly in `root` get category "" (uncategorized).
fn discover_categorized(root: &Path) -> BTreeMap<String, Vec<PathBuf>> {
    let mut categories: BTreeMap<String, Vec<PathBuf>> = BTreeMap::new();
    collect_tests(root, root, &mut categories);
    for files in categories.values_mut() {
        files.sort();
    }
    categories
}

fn collect_tests(dir: &Path, root: &Path, out: &mut BTreeMap<String, Vec<PathBuf>>) {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return;
    };
    for path in entries.flatten().map(|entry| entry.path()) {
        if path.is_dir() {
            collect_tests(&path, root, out);
            continue;
        }
        let is_fixture = path
            .file_name()
            .and_then(|n| n.to_str())
            .is_some_and(|n| n.ends_with(FIXTURE_SUFFIX));
        if is_fixture {
            let category = path
                .parent()
                .and_then(|p| p.strip_prefix(root).ok())
                .map(|p| p.to_string_lossy().replace('\\', "/"))
                .unwrap_or_default();
            out.entry(category).or_default().push(path);
        }
    }
}

fn category_label(category: &str) -> &str {
    if category.is_empty() { "(root)" } else { category }
}

/// List available categories for the given test path.
pub fn list_categories(path: &Path) {
    if path.is_file() {
        eprintln!("(single file, no categories)");
        return;
    }

    let categories = discover_categorized(path);
    if categories.is_empty() {
        eprintln!("no {} files found in {}", FIXTURE_SUFFIX, path.display());
        return;
    }

    eprintln!("available categories:");
    for (cat, files) in &categories {
        eprintln!("  {} ({} tests)", category_label(cat), files.len());
    }
}

/// Keep the categories matching `requested` (a category or any of its
/// subfolders). Everything is kept when nothing is requested.
fn select_categories(
    all: BTreeMap<String, Vec<PathBuf>>,
    requested: &[String],
) -> BTreeMap<String, Vec<PathBuf>> {
    if requested.is_empty() {
        return all;
    }
    for req in requested {
        let req = req.trim_matches('/');
        if !all.keys().any(|cat| in_category(cat, req)) {
            eprintln!(
                "warning: category '{}' not found (available: {})",
                req,
                all.keys()
                    .map(|k| category_label(k))
                    .collect::<Vec<_>>()
                    .join(", ")
            );
        }
    }
    all.into_iter()
        .filter(|(cat, _)| {
            requested
                .iter()
                .any(|req| in_category(cat, req.trim_matches('/')))
        })
        .collect()
}

fn in_category(category: &str, requested: &str) -> bool {
    category == requested || category.starts_with(&format!("{}/", requested))
}

struct Style {
    no_color: bool,
}

impl Style {
    fn paint(&self, text: &str, code: &str) -> String {
        if self.no_color {
            text.to_string()
        } else {
            format!("\x1b[{}m{}\x1b[0m", code, text)
        }
    }

    fn pass(&self) -> String {
        self.paint("PASS", "32")
    }

    fn fail(&self) -> String {
        self.paint("FAIL", "31")
    }

    fn bold(&self, text: &str) -> String {
        self.paint(text, "1")
    }
}

/// Run all fixtures under `path` (or a single file).
/// If `categories` is non-empty, only run tests in those categories.
/// Returns exit code: 0 = all pass, 1 = any failure.
pub fn run_tests(path: &Path, no_color: bool, categories: &[String]) -> i32 {
    let style = Style { no_color };

    let single_file = path.is_file();
    let selected = if single_file {
        BTreeMap::from([(String::new(), vec![path.to_path_buf()])])
    } else {
        let all = discover_categorized(path);
        if all.is_empty() {
            eprintln!("no {} files found in {}", FIXTURE_SUFFIX, path.display());
            return 1;
        }
        select_categories(all, categories)
    };
    if selected.is_empty() {
        eprintln!("no matching categories found");
        return 1;
    }

    let mut passed = 0usize;
    let mut failures: Vec<TestResult> = Vec::new();

    for (cat, files) in &selected {
        if !single_file {
            eprintln!();
            eprintln!("{}", style.bold(category_label(cat)));
        }
        for file in files {
            let result = run_single_test(file);
            match result.outcome {
                TestOutcome::Pass => {
                    passed += 1;
                    eprintln!("  {}  {}", style.pass(), result.label());
                }
                TestOutcome::Fail(_) => {
                    eprintln!("  {}  {}", style.fail(), result.label());
                    failures.push(result);
                }
            }
        }
    }

    if !failures.is_empty() {
        eprintln!();
        eprintln!("failures:");
        for f in &failures {
            eprintln!();
            eprintln!("  --- {} ---", f.path.display());
            if let TestOutcome::Fail(reason) = &f.outcome {
                for line in reason.lines() {
                    eprintln!("  {}", line);
                }
            }
        }
    }

    eprintln!();
    if failures.is_empty() {
        eprintln!("test result: {}. {} passed, 0 failed", style.paint("ok", "32"), passed);
        0
    } else {
        eprintln!(
            "test result: {}. {} passed, {} failed (of {})",
            style.paint("FAILED", "31"),
            passed,
            failures.len(),
            passed + failures.len()
        );
        1
    }
}
