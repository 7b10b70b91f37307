// sqltools-service task runner (cargo xtask pattern)

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use xshell::{Shell, cmd};

const BINARY: &str = "sqltools-service";

fn main() -> Result<()> {
    let sh = Shell::new()?;
    let args: Vec<_> = std::env::args().skip(1).collect();

    match args.first().map(|s| s.as_str()) {
        Some("build") => build(&sh, args.iter().any(|a| a == "--release")),
        Some("test") => test(&sh, &args[1..]),
        Some("format") => format(&sh, args.iter().any(|a| a == "--check")),
        Some("clippy") => clippy(&sh),
        Some("run") => run(&sh, &args[1..]),
        Some("clean") => clean(&sh),
        Some("ci") => ci(&sh),
        Some("dist") => dist(&sh),
        _ => {
            print_help();
            Ok(())
        },
    }
}

fn print_help() {
    println!("sqltools-service - Build Commands:");
    println!();
    println!("Usage: cargo xtask <COMMAND> [OPTIONS]");
    println!();
    println!("Commands:");
    println!("  build [--release]   Build the service");
    println!("  test [FILTER]       Run the test suite, optionally filtered");
    println!("  format [--check]    Format code (check mode doesn't modify)");
    println!("  clippy              Run clippy checks");
    println!("  run [ARGS...]       Run the service, e.g. run --config conf/config.toml");
    println!("  clean               Remove build artifacts");
    println!("  ci                  Format check, clippy, test");
    println!("  dist                Release build packaged as build/dist/*.tar.gz");
}

fn build(sh: &Shell, release: bool) -> Result<()> {
    let _dir = sh.push_dir(project_root().join("backend"));

    if release {
        println!("🦀 Building {} (release)...", BINARY);
        cmd!(sh, "cargo build --release").run().context("Release build failed")?;
    } else {
        println!("🦀 Building {}...", BINARY);
        cmd!(sh, "cargo build").run().context("Build failed")?;
    }

    println!("✅ Build complete");
    Ok(())
}

/// Filters are passed through to the test harness
fn test(sh: &Shell, filters: &[String]) -> Result<()> {
    println!("🧪 Running tests...");
    let _dir = sh.push_dir(project_root().join("backend"));

    cmd!(sh, "cargo test -- {filters...}").run().context("Tests failed")?;

    println!("✅ All tests passed");
    Ok(())
}

fn format(sh: &Shell, check: bool) -> Result<()> {
    let _dir = sh.push_dir(project_root());

    if check {
        cmd!(sh, "cargo fmt --all -- --check").run().context("Rust code is not formatted")?;
        println!("✅ Rust code is properly formatted");
    } else {
        cmd!(sh, "cargo fmt --all").run().context("Failed to format Rust code")?;
        println!("✅ Rust code formatted");
    }

    Ok(())
}

fn clippy(sh: &Shell) -> Result<()> {
    let _dir = sh.push_dir(project_root().join("backend"));

    cmd!(sh, "cargo clippy --all-targets -- --deny warnings --allow clippy::uninlined-format-args")
        .run()
        .context("Clippy checks failed")?;

    println!("✅ Clippy checks passed");
    Ok(())
}

fn run(sh: &Shell, args: &[String]) -> Result<()> {
    let _dir = sh.push_dir(project_root().join("backend"));

    cmd!(sh, "cargo run --bin {BINARY} -- {args...}")
        .run()
        .context("Failed to run service")?;

    Ok(())
}

fn clean(sh: &Shell) -> Result<()> {
    println!("🧹 Cleaning build artifacts...");
    let project = project_root();

    let _dir = sh.push_dir(&project);
    cmd!(sh, "cargo clean").run()?;

    let build_dir = project.join("build");
    if build_dir.exists() {
        sh.remove_path(&build_dir)?;
    }

    println!("✅ Clean complete");
    Ok(())
}

fn ci(sh: &Shell) -> Result<()> {
    println!("📝 [1/3] Checking code format...");
    format(sh, true)?;

    println!("🔍 [2/3] Running clippy checks...");
    clippy(sh)?;

    println!("🧪 [3/3] Running tests...");
    test(sh, &[])?;

    println!("🎉 CI pipeline completed successfully!");
    Ok(())
}

/// bin/, conf/config.toml and logs/ in a timestamped tarball
fn dist(sh: &Shell) -> Result<()> {
    build(sh, true)?;

    let project = project_root();
    let dist_dir = project.join("build/dist");
    sh.create_dir(dist_dir.join("bin"))?;
    sh.create_dir(dist_dir.join("conf"))?;
    sh.create_dir(dist_dir.join("logs"))?;

    sh.copy_file(project.join("target/release").join(BINARY), dist_dir.join("bin"))?;
    write_default_config(&dist_dir)?;

    let timestamp = chrono::Local::now().format("%Y%m%d_%H%M%S");
    let package_name = format!("{}-{}.tar.gz", BINARY, timestamp);

    let _dir = sh.push_dir(&dist_dir);
    cmd!(sh, "tar czf {package_name} bin conf logs").run().context("Failed to create tarball")?;

    let package_path = dist_dir.join(&package_name);
    println!("✅ Distribution package created: {}", package_path.display());
    println!("   Size: {} KB", std::fs::metadata(&package_path)?.len() / 1024);

    Ok(())
}

fn write_default_config(dist_dir: &Path) -> Result<()> {
    let config = r#"[server]
host = "0.0.0.0"
port = 8080

[logging]
level = "info,sqltools_service=debug"
file = "logs/sqltools-service.log"

[showplan]
max_payload_bytes = "64MB"
isolate_statement_failures = true
default_locale = "en"
"#;

    std::fs::write(dist_dir.join("conf/config.toml"), config).context("Failed to create config file")?;
    Ok(())
}

fn project_root() -> PathBuf {
    let manifest_dir = Path::new(env!("CARGO_MANIFEST_DIR"));
    manifest_dir.parent().unwrap_or(manifest_dir).to_path_buf()
}
