use std::process::Command;

/// Trimmed stdout of a successful command.
fn capture(program: &str, args: &[&str]) -> Option<String> {
    let output = Command::new(program).args(args).output().ok()?;
    if !output.status.success() {
        return None;
    }
    let text = String::from_utf8(output.stdout).ok()?;
    let text = text.trim();
    (!text.is_empty()).then(|| text.to_string())
}

fn stamp(key: &str, value: Option<String>) {
    println!(
        "cargo:rustc-env={}={}",
        key,
        value.unwrap_or_else(|| "unknown".to_string())
    );
}

fn main() {
    stamp(
        "LIBRARIAN_COMMIT_SHA",
        std::env::var("LIBRARIAN_COMMIT_SHA")
            .ok()
            .or_else(|| capture("git", &["rev-parse", "--short", "HEAD"])),
    );

    // Reproducible builds pin the date through SOURCE_DATE_EPOCH.
    let date = match std::env::var("SOURCE_DATE_EPOCH") {
        Ok(epoch) => capture("date", &["-u", "-d", &format!("@{}", epoch), "+%Y-%m-%d"]),
        Err(_) => capture("date", &["-u", "+%Y-%m-%d"]),
    };
    stamp("LIBRARIAN_BUILD_DATE", date);

    let rustc = std::env::var("RUSTC").unwrap_or_else(|_| "rustc".to_string());
    // "rustc 1.82.0 (f6e511eec 2024-10-15)" -> "1.82.0"
    let rustc_version = capture(&rustc, &["--version"]).and_then(|v| {
        v.strip_prefix("rustc ")
            .and_then(|rest| rest.split_whitespace().next())
            .map(str::to_string)
    });
    stamp("LIBRARIAN_RUSTC_VERSION", rustc_version);

    println!("cargo:rerun-if-changed=.git/HEAD");
    println!("cargo:rerun-if-env-changed=LIBRARIAN_COMMIT_SHA");
    println!("cargo:rerun-if-env-changed=SOURCE_DATE_EPOCH");
}
