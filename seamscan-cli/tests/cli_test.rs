use anyhow::Result;
use assert_cmd::Command;
use predicates::prelude::*;
use std::fs::File;
use std::io::Write;
use std::path::PathBuf;
use tempfile::{tempdir, TempDir};

fn create_corpus(dir: &TempDir, name: &str, content: &[u8]) -> Result<PathBuf> {
    let path = dir.path().join(name);
    let mut file = File::create(&path)?;
    file.write_all(content)?;
    Ok(path)
}

fn seamscan(dir: &TempDir) -> Result<Command> {
    let mut cmd = Command::cargo_bin("seamscan")?;
    cmd.current_dir(dir.path()).env_remove("RUST_LOG");
    Ok(cmd)
}

#[test]
fn test_overlapping_matches_across_two_workers() -> Result<()> {
    let dir = tempdir()?;
    let path = create_corpus(&dir, "corpus.txt", b"aaaaa")?;

    seamscan(&dir)?
        .args(["-j", "2", "aa"])
        .arg(&path)
        .assert()
        .success()
        .stdout("0\n1\n2\n3\n");
    Ok(())
}

#[test]
fn test_repeated_pattern_three_workers() -> Result<()> {
    let dir = tempdir()?;
    let path = create_corpus(&dir, "corpus.txt", b"abcabcabc")?;

    seamscan(&dir)?
        .args(["--workers", "3", "--algorithm", "kmp", "abc"])
        .arg(&path)
        .assert()
        .success()
        .stdout("0\n3\n6\n");
    Ok(())
}

#[test]
fn test_no_match_prints_nothing() -> Result<()> {
    let dir = tempdir()?;
    let path = create_corpus(&dir, "corpus.txt", b"hello")?;

    seamscan(&dir)?
        .args(["-j", "4", "xyz"])
        .arg(&path)
        .assert()
        .success()
        .stdout(predicate::str::is_empty());
    Ok(())
}

#[test]
fn test_pattern_longer_than_corpus_fails() -> Result<()> {
    let dir = tempdir()?;
    let path = create_corpus(&dir, "corpus.txt", b"abcd")?;

    seamscan(&dir)?
        .args(["-j", "2", "abcde"])
        .arg(&path)
        .assert()
        .code(1)
        .stdout(predicate::str::is_empty())
        .stderr(predicate::str::contains("Pattern is larger than the corpus"))
        .stderr(predicate::str::contains("pattern is 5 bytes, corpus is 4 bytes"));
    Ok(())
}

#[test]
fn test_missing_arguments_is_usage_error() -> Result<()> {
    let dir = tempdir()?;

    seamscan(&dir)?
        .arg("only-a-pattern")
        .assert()
        .code(1)
        .stdout(predicate::str::is_empty())
        .stderr(predicate::str::contains("Usage: seamscan"));
    Ok(())
}

#[test]
fn test_help_exits_cleanly() -> Result<()> {
    let dir = tempdir()?;

    seamscan(&dir)?
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("--workers"));
    Ok(())
}

#[test]
fn test_missing_file_fails() -> Result<()> {
    let dir = tempdir()?;

    seamscan(&dir)?
        .args(["needle", "missing.txt"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("File not found"));
    Ok(())
}

#[test]
fn test_stats_only() -> Result<()> {
    let dir = tempdir()?;
    let path = create_corpus(&dir, "corpus.txt", b"the cat sat on the mat")?;

    seamscan(&dir)?
        .args(["--stats", "-j", "3", "the"])
        .arg(&path)
        .assert()
        .success()
        .stdout("Found 2 matches with 3 workers\n");
    Ok(())
}

#[test]
fn test_json_output() -> Result<()> {
    let dir = tempdir()?;
    let path = create_corpus(&dir, "corpus.txt", b"aaaaa")?;

    seamscan(&dir)?
        .args(["--json", "-j", "2", "aa"])
        .arg(&path)
        .assert()
        .success()
        .stdout(predicate::str::contains("\"offsets\""))
        .stdout(predicate::str::contains("\"worker_counts\""))
        .stdout(predicate::str::contains("\"corpus_len\": 5"));
    Ok(())
}

#[test]
fn test_config_file_sets_defaults() -> Result<()> {
    let dir = tempdir()?;
    let path = create_corpus(&dir, "corpus.txt", b"abab")?;
    let config = create_corpus(
        &dir,
        "seamscan.yaml",
        b"worker_count: 2\neof_sentinel: trailing-byte\nstats_only: true\n",
    )?;

    // The trailing "ab" touches the sentinel byte
    seamscan(&dir)?
        .arg("--config")
        .arg(&config)
        .arg("ab")
        .arg(&path)
        .assert()
        .success()
        .stdout("Found 1 matches with 2 workers\n");

    // Command-line values win over the file
    seamscan(&dir)?
        .arg("--config")
        .arg(&config)
        .args(["--eof-sentinel", "none", "-j", "4", "ab"])
        .arg(&path)
        .assert()
        .success()
        .stdout("Found 2 matches with 4 workers\n");
    Ok(())
}

#[test]
fn test_local_config_is_picked_up() -> Result<()> {
    let dir = tempdir()?;
    let path = create_corpus(&dir, "corpus.txt", b"xyxyxy")?;
    create_corpus(&dir, ".seamscan.yaml", b"worker_count: 5\nstats_only: true\n")?;

    seamscan(&dir)?
        .arg("xy")
        .arg(&path)
        .assert()
        .success()
        .stdout("Found 3 matches with 5 workers\n");
    Ok(())
}

#[test]
fn test_invalid_algorithm_is_usage_error() -> Result<()> {
    let dir = tempdir()?;
    let path = create_corpus(&dir, "corpus.txt", b"abc")?;

    seamscan(&dir)?
        .args(["--algorithm", "regex", "a"])
        .arg(&path)
        .assert()
        .code(1)
        .stderr(predicate::str::contains("Usage: seamscan"));
    Ok(())
}

#[cfg(unix)]
#[test]
fn test_non_utf8_pattern() -> Result<()> {
    use std::ffi::OsStr;
    use std::os::unix::ffi::OsStrExt;

    let dir = tempdir()?;
    let path = create_corpus(&dir, "corpus.bin", &[0x41, 0xff, 0x42, 0xff])?;

    seamscan(&dir)?
        .args(["-j", "2"])
        .arg(OsStr::from_bytes(&[0xff]))
        .arg(&path)
        .assert()
        .success()
        .stdout("1\n3\n");
    Ok(())
}

#[test]
fn test_usage_error_names_the_bad_value() -> Result<()> {
    let dir = tempdir()?;
    let path = create_corpus(&dir, "corpus.txt", b"abc")?;

    seamscan(&dir)?
        .args(["-j", "0", "a"])
        .arg(&path)
        .assert()
        .code(1)
        .stderr(predicate::str::contains("'0'"))
        .stderr(predicate::str::contains("--workers"))
        .stderr(predicate::str::contains("Usage: seamscan"));
    Ok(())
}
