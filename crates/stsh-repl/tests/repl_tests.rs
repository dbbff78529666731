//! Scripts run through the REPL. Output is checked through `> file`
//! redirects since the REPL prints straight to stdout.

use std::path::Path;

use rstest::rstest;
use stsh_kernel::Environment;
use stsh_repl::config::ReplConfig;
use stsh_repl::printer::PrintOutcome;
use stsh_repl::Repl;

fn repl() -> Repl {
    Repl::new(&ReplConfig::default()).without_paging()
}

fn written(dir: &Path, name: &str) -> String {
    std::fs::read_to_string(dir.join(name)).unwrap()
}

#[rstest]
#[case::range("1..3", "123")]
#[case::closure("1..3 | { x -> x * x }", "149")]
#[case::strings("'a' 'b' + 'c'", "abc")]
#[case::records("{ n: 1 }", r#"{"n":1}"#)]
#[case::version("$STSH_VERSION", env!("CARGO_PKG_VERSION"))]
fn lines_write_raw_values(#[case] line: &str, #[case] expected: &str) {
    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("out.txt");
    let line = format!("{line} > {}", out.display());
    assert_eq!(repl().run_line(&line).unwrap(), PrintOutcome::Done);
    assert_eq!(written(dir.path(), "out.txt"), expected);
}

#[test]
fn scripts_share_bindings_between_lines() {
    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("out.txt");
    let script = format!(
        "#!/usr/bin/env stsh\n# squares\n$sq = {{ x -> x * x }}\n\n1..3 | $sq > {}\n",
        out.display()
    );
    assert_eq!(repl().run_script(&script).unwrap(), PrintOutcome::Done);
    assert_eq!(written(dir.path(), "out.txt"), "149");
}

#[test]
fn scripts_stop_at_exit() {
    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("never.txt");
    let script = format!("exit 7\n1 > {}\n", out.display());
    assert_eq!(repl().run_script(&script).unwrap(), PrintOutcome::Exit(7));
    assert!(!out.exists());
}

#[test]
fn scripts_stop_at_errors() {
    let script = "1 + 'a'\nexit 0\n";
    assert_eq!(repl().run_script(script).unwrap(), PrintOutcome::Failed);
}

#[test]
fn startup_scripts_predefine_streams() {
    let dir = tempfile::tempdir().unwrap();
    let startup = dir.path().join("config.st");
    std::fs::write(&startup, "# defaults\n$greeting = 'hi'\n").unwrap();

    let repl = repl();
    repl.load_startup(&startup);
    assert!(repl.env().get("greeting").is_some());

    let out = dir.path().join("out.txt");
    let line = format!("$greeting > {}", out.display());
    repl.run_line(&line).unwrap();
    assert_eq!(written(dir.path(), "out.txt"), "hi");
}

#[test]
fn missing_startup_scripts_are_ignored() {
    let dir = tempfile::tempdir().unwrap();
    let repl = repl();
    repl.load_startup(&dir.path().join("config.st"));
    assert!(repl.env().get("greeting").is_none());
}
