use std::process::Command;

fn main() {
    if let Ok(target) = std::env::var("TARGET") {
        println!("cargo:rustc-env=SERIALRW_BUILD_TARGET={target}");
    }
    println!("cargo:rerun-if-env-changed=TARGET");

    let rustc = std::env::var("RUSTC").unwrap_or_else(|_| "rustc".to_string());
    if let Some(version) = command_output(&rustc, &["--version"]) {
        println!("cargo:rustc-env=RUSTC_VERSION={version}");
    }
    if let Some(hash) = command_output("git", &["rev-parse", "--short", "HEAD"]) {
        println!("cargo:rustc-env=GIT_HASH={hash}");
    }
    println!("cargo:rerun-if-env-changed=RUSTC");
}

fn command_output(program: &str, args: &[&str]) -> Option<String> {
    let output = Command::new(program).args(args).output().ok()?;
    if !output.status.success() {
        return None;
    }
    let text = String::from_utf8(output.stdout).ok()?;
    let text = text.trim();
    (!text.is_empty()).then(|| text.to_string())
}
