use std::{env, process::Command, str::from_utf8};

/// Output of a successful command, trimmed.
fn command_output(program: &str, args: &[&str]) -> Option<String> {
    let output = Command::new(program).args(args).output().ok()?;
    if !output.status.success() {
        return None;
    }
    from_utf8(&output.stdout)
        .ok()
        .map(|text| text.trim().to_owned())
}

fn main() {
    let rustc = env::var("RUSTC").unwrap_or_else(|_| "rustc".to_owned());
    let package_version = env::var("CARGO_PKG_VERSION").unwrap_or_default();

    let version = command_output("git", &["describe", "--tags", "--match=v[0-9]*", "--dirty=-d"])
        .map(|tag| tag.trim_start_matches('v').to_owned())
        .unwrap_or(package_version);

    let rustc_version = command_output(&rustc, &["--version"]).unwrap_or_default();

    println!("cargo:rustc-env=TALLYSAT_VERSION={}", version);
    println!("cargo:rustc-env=TALLYSAT_RUSTC_VERSION={}", rustc_version);
    println!(
        "cargo:rustc-env=TALLYSAT_PROFILE={}",
        env::var("PROFILE").unwrap_or_default()
    );
}
