// Test intent: launch tunables are read from the environment, and invalid
// values fall back to the defaults instead of failing.

use std::process::Command;

use r2cfft::launch::{DEFAULT_BLOCK_SIZE, DEFAULT_MAX_GRID_DIM};
use r2cfft::LaunchConfig;

#[test]
fn print_launch_config() {
    let cfg = LaunchConfig::from_env();
    println!("launch-config: {} {} {}", cfg.block_size, cfg.threads, cfg.max_grid_dim);
}

fn run_with_env(vars: &[(&str, &str)]) -> (usize, usize, usize) {
    let exe = std::env::current_exe().unwrap();
    let mut cmd = Command::new(&exe);
    cmd.env_remove("R2CFFT_BLOCK_SIZE")
        .env_remove("R2CFFT_THREADS")
        .env_remove("R2CFFT_MAX_GRID_DIM");
    for (k, v) in vars {
        cmd.env(k, v);
    }
    let output = cmd
        .args(["--exact", "print_launch_config", "--nocapture"])
        .output()
        .expect("run launch config test");
    assert!(output.status.success());
    let stdout = String::from_utf8(output.stdout).unwrap();
    stdout
        .lines()
        .rev()
        .find_map(|l| {
            let (_, rest) = l.split_once("launch-config:")?;
            let mut it = rest.split_whitespace().map(|t| t.parse::<usize>().ok());
            Some((it.next()??, it.next()??, it.next()??))
        })
        .unwrap()
}

#[test]
fn env_sets_block_size_threads_and_limit() {
    let (bs, threads, limit) = run_with_env(&[
        ("R2CFFT_BLOCK_SIZE", "32"),
        ("R2CFFT_THREADS", "3"),
        ("R2CFFT_MAX_GRID_DIM", "1024"),
    ]);
    assert_eq!(bs, 32);
    assert_eq!(threads, 3);
    assert_eq!(limit, 1024);
}

#[test]
fn unset_env_uses_defaults() {
    let (bs, threads, limit) = run_with_env(&[]);
    assert_eq!(bs, DEFAULT_BLOCK_SIZE);
    assert_eq!(threads, 0);
    assert_eq!(limit, DEFAULT_MAX_GRID_DIM);
}

#[test]
fn invalid_env_value_falls_back() {
    let (bs, _, limit) = run_with_env(&[
        ("R2CFFT_BLOCK_SIZE", "not-a-number"),
        ("R2CFFT_MAX_GRID_DIM", "0"),
    ]);
    assert_eq!(bs, DEFAULT_BLOCK_SIZE);
    assert_eq!(limit, DEFAULT_MAX_GRID_DIM);
}
