use std::error::Error as _;
use std::fs;
use std::path::Path;
use std::sync::{Arc, Mutex};

use taskkit_core::ops::{
    read_version, write_version, BumpVersion, GitCommit, GitTag, ReplaceInFiles, ShellCommand,
};
use taskkit_core::release::bump_version;
use taskkit_core::{
    BumpType, Error, Executor, Operation, RegistryBuilder, RunOptions, RunReporter,
};
use tempfile::TempDir;

const NO_DEPS: [&str; 0] = [];

#[derive(Default)]
struct CapturingReporter {
    lines: Mutex<Vec<(String, bool)>>,
    bumps: Mutex<Vec<(String, String, String)>>,
}

impl RunReporter for CapturingReporter {
    fn task_output(&self, _task: &str, line: &str, is_stderr: bool) {
        self.lines.lock().unwrap().push((line.to_string(), is_stderr));
    }

    fn version_bumped(&self, file: &str, old: &str, new: &str) {
        self.bumps
            .lock()
            .unwrap()
            .push((file.to_string(), old.to_string(), new.to_string()));
    }
}

fn run_single(
    dir: &Path,
    operation: Arc<dyn Operation>,
    bump: BumpType,
) -> (taskkit_core::Result<()>, Arc<CapturingReporter>) {
    let mut builder = RegistryBuilder::new();
    builder.register("task", NO_DEPS, operation).unwrap();
    let reporter = Arc::new(CapturingReporter::default());
    let executor = Executor::new(Arc::new(builder.build().unwrap()))
        .with_options(RunOptions {
            project_root: dir.to_path_buf(),
            bump,
            ..Default::default()
        })
        .with_reporter(reporter.clone());

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap();
    let result = runtime.block_on(executor.run_named("task")).map(|_| ());
    (result, reporter)
}

#[test]
fn test_read_and_write_json_version() {
    let dir = TempDir::new().unwrap();
    let manifest = dir.path().join("package.json");
    fs::write(
        &manifest,
        "{\n  \"name\": \"widget\",\n  \"version\": \"1.2.3\",\n  \"main\": \"index.js\"\n}\n",
    )
    .unwrap();

    assert_eq!(read_version(&manifest).unwrap(), "1.2.3");
    assert_eq!(write_version(&manifest, "1.3.0").unwrap(), "1.2.3");

    let content = fs::read_to_string(&manifest).unwrap();
    let name = content.find("\"name\"").unwrap();
    let version = content.find("\"version\": \"1.3.0\"").unwrap();
    let main = content.find("\"main\"").unwrap();
    assert!(name < version && version < main);
    assert!(content.ends_with('\n'));
}

#[test]
fn test_read_toml_version() {
    let dir = TempDir::new().unwrap();
    let cargo = dir.path().join("Cargo.toml");
    fs::write(&cargo, "[package]\nname = \"widget\"\nversion = \"0.4.1\"\n").unwrap();
    assert_eq!(read_version(&cargo).unwrap(), "0.4.1");

    let plain = dir.path().join("meta.toml");
    fs::write(&plain, "version = \"2.0.0\"\n").unwrap();
    assert_eq!(read_version(&plain).unwrap(), "2.0.0");
}

#[test]
fn test_missing_version_field() {
    let dir = TempDir::new().unwrap();
    let manifest = dir.path().join("package.json");
    fs::write(&manifest, "{\"name\": \"widget\"}").unwrap();

    assert!(matches!(read_version(&manifest), Err(Error::Operation(_))));
}

#[test]
fn test_unsupported_manifest() {
    let dir = TempDir::new().unwrap();
    let manifest = dir.path().join("VERSION");
    fs::write(&manifest, "1.0.0").unwrap();

    assert!(read_version(&manifest).is_err());
}

#[test]
fn test_bump_version_operation() {
    let dir = TempDir::new().unwrap();
    fs::write(
        dir.path().join("package.json"),
        "{\"name\": \"widget\", \"version\": \"1.2.3\"}",
    )
    .unwrap();
    fs::write(
        dir.path().join("Cargo.toml"),
        "[package]\nname = \"widget\"\nversion = \"1.2.3\"\n",
    )
    .unwrap();

    let op = Arc::new(BumpVersion::new(["package.json", "Cargo.toml"]));
    let (result, reporter) = run_single(dir.path(), op, BumpType::Minor);
    result.unwrap();

    assert_eq!(read_version(&dir.path().join("package.json")).unwrap(), "1.3.0");
    assert_eq!(read_version(&dir.path().join("Cargo.toml")).unwrap(), "1.3.0");

    let bumps = reporter.bumps.lock().unwrap();
    assert_eq!(
        bumps[0],
        ("package.json".to_string(), "1.2.3".to_string(), "1.3.0".to_string())
    );
    assert_eq!(bumps.len(), 2);
}

#[test]
fn test_bump_version_invalid_semver() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("package.json"), "{\"version\": \"latest\"}").unwrap();

    let op = Arc::new(BumpVersion::new(["package.json"]));
    let (result, _) = run_single(dir.path(), op, BumpType::Patch);

    let err = result.unwrap_err();
    assert!(matches!(err, Error::TaskFailed { .. }));
    assert!(err.source().unwrap().to_string().contains("Invalid version"));
}

#[test]
fn test_bump_version_overflow_is_an_error() {
    let max = u64::MAX;

    let err = bump_version(&format!("{}.0.0", max), BumpType::Major).unwrap_err();
    assert!(matches!(err, Error::Release(_)));
    assert!(bump_version(&format!("1.{}.0", max), BumpType::Minor).is_err());
    assert!(bump_version(&format!("1.0.{}", max), BumpType::Patch).is_err());
    assert_eq!(
        bump_version(&format!("1.{}.7", max), BumpType::Major).unwrap(),
        "2.0.0"
    );
}

#[test]
fn test_bump_version_no_matching_files() {
    let dir = TempDir::new().unwrap();

    let op = Arc::new(BumpVersion::new(["*.json"]));
    let (result, _) = run_single(dir.path(), op, BumpType::Patch);

    assert!(result.is_err());
}

#[test]
fn test_replace_expands_version() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("package.json"), "{\"version\": \"2.1.0\"}").unwrap();
    fs::write(
        dir.path().join("README.md"),
        "Download https://cdn.example.com/widget@1.0.0/widget.js\nor widget@1.0.0.zip\n",
    )
    .unwrap();

    let op = ReplaceInFiles::new(["README.md"], r"widget@\d+\.\d+\.\d+", "widget@{version}").unwrap();
    let (result, reporter) = run_single(dir.path(), Arc::new(op), BumpType::Patch);
    result.unwrap();

    let readme = fs::read_to_string(dir.path().join("README.md")).unwrap();
    assert_eq!(
        readme,
        "Download https://cdn.example.com/widget@2.1.0/widget.js\nor widget@2.1.0.zip\n"
    );
    let lines = reporter.lines.lock().unwrap();
    assert_eq!(lines[0].0, "README.md: 2 replacement(s)");
}

#[test]
fn test_replace_with_captures_and_globs() {
    let dir = TempDir::new().unwrap();
    fs::create_dir(dir.path().join("docs")).unwrap();
    fs::write(dir.path().join("docs/a.md"), "colour colours").unwrap();
    fs::write(dir.path().join("docs/b.md"), "no match here").unwrap();

    let op = ReplaceInFiles::new(["docs/*.md"], r"colour(s?)", "color$1").unwrap();
    let (result, _) = run_single(dir.path(), Arc::new(op), BumpType::Patch);
    result.unwrap();

    assert_eq!(fs::read_to_string(dir.path().join("docs/a.md")).unwrap(), "color colors");
    assert_eq!(fs::read_to_string(dir.path().join("docs/b.md")).unwrap(), "no match here");
}

#[test]
fn test_replace_rejects_invalid_pattern() {
    assert!(matches!(
        ReplaceInFiles::new(["README.md"], "(", "x"),
        Err(Error::Operation(_))
    ));
}

#[test]
fn test_shell_command_streams_output() {
    let dir = TempDir::new().unwrap();

    let op = Arc::new(ShellCommand::new("echo hello && echo oops 1>&2"));
    let (result, reporter) = run_single(dir.path(), op, BumpType::Patch);
    result.unwrap();

    let lines = reporter.lines.lock().unwrap();
    assert!(lines.contains(&("hello".to_string(), false)));
    assert!(lines.contains(&("oops".to_string(), true)));
}

#[test]
fn test_shell_command_runs_in_project_root() {
    let dir = TempDir::new().unwrap();

    let op = Arc::new(ShellCommand::new("touch marker.txt"));
    let (result, _) = run_single(dir.path(), op, BumpType::Patch);
    result.unwrap();

    assert!(dir.path().join("marker.txt").exists());
}

#[test]
fn test_shell_command_failure_includes_stderr() {
    let dir = TempDir::new().unwrap();

    let op = Arc::new(ShellCommand::new("echo 'lint: 3 problems' 1>&2; exit 3"));
    let (result, _) = run_single(dir.path(), op, BumpType::Patch);

    let err = result.unwrap_err();
    assert_eq!(err.failing_task(), Some("task"));
    let cause = err.source().unwrap().to_string();
    assert!(cause.contains("exited"));
    assert!(cause.contains("lint: 3 problems"));
}

#[test]
fn test_shell_command_tolerates_invalid_utf8_output() {
    let dir = TempDir::new().unwrap();

    let op = Arc::new(ShellCommand::new(r"printf 'built \377\n'; printf 'done'; exit 0"));
    let (result, reporter) = run_single(dir.path(), op, BumpType::Patch);
    result.unwrap();

    let lines = reporter.lines.lock().unwrap();
    assert_eq!(
        *lines,
        vec![
            ("built \u{FFFD}".to_string(), false),
            ("done".to_string(), false),
        ]
    );
}

#[test]
fn test_shell_command_rejects_multiline() {
    let dir = TempDir::new().unwrap();

    let op = Arc::new(ShellCommand::new("echo a\necho b"));
    let (result, _) = run_single(dir.path(), op, BumpType::Patch);

    assert!(result.is_err());
}

fn init_repo(dir: &Path) -> git2::Repository {
    let repo = git2::Repository::init(dir).unwrap();
    {
        let mut config = repo.config().unwrap();
        config.set_str("user.name", "Release Bot").unwrap();
        config.set_str("user.email", "release@example.com").unwrap();
    }
    repo
}

#[test]
fn test_git_commit_and_tag() {
    let dir = TempDir::new().unwrap();
    let repo = init_repo(dir.path());
    fs::write(dir.path().join("package.json"), "{\"version\": \"3.0.0\"}").unwrap();

    let commit = Arc::new(GitCommit::new(["package.json"], "Release v{version}"));
    let (result, _) = run_single(dir.path(), commit, BumpType::Patch);
    result.unwrap();

    let head = repo.head().unwrap().peel_to_commit().unwrap();
    assert_eq!(head.message().map(str::trim), Some("Release v3.0.0"));
    assert_eq!(head.author().name(), Some("Release Bot"));
    assert!(head.tree().unwrap().get_name("package.json").is_some());

    let tag = Arc::new(GitTag::new("v{version}", "Version {version}"));
    let (result, _) = run_single(dir.path(), tag, BumpType::Patch);
    result.unwrap();

    let reference = repo.find_reference("refs/tags/v3.0.0").unwrap();
    let tag = reference.peel_to_tag().unwrap();
    assert_eq!(tag.message().map(str::trim), Some("Version 3.0.0"));
    assert_eq!(tag.target_id(), head.id());
}
