use std::fs;
use std::io::{Seek, Write};
use std::path::{Path, PathBuf};
use std::process::{exit, Command};

use clap::{Parser, Subcommand};
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipWriter};

const LAMBDA_PACKAGE: &str = "key_rotation_lambda";
const LAMBDA_BINARY: &str = "rotation_reminder";
/// Entry name the `provided.*` Lambda runtimes execute.
const BOOTSTRAP_ENTRY: &str = "bootstrap";

#[derive(Parser)]
#[command(name = "xtask", about = "Tasks for the key rotation reminder workspace")]
struct Cli {
    #[command(subcommand)]
    command: Task,
}

#[derive(Subcommand)]
enum Task {
    /// Test the core and lambda crates
    Test,
    /// fmt check, clippy with warnings denied, then tests
    Ci,
    /// Build `rotation_reminder` and zip it as `bootstrap`
    LambdaPackage {
        #[arg(
            long,
            env = "REMINDER_LAMBDA_TARGET",
            default_value = "x86_64-unknown-linux-gnu"
        )]
        target: String,
        /// Package the unoptimized build
        #[arg(long)]
        debug: bool,
        #[arg(long, default_value = "dist")]
        out_dir: PathBuf,
    },
}

fn cargo(args: &[&str]) -> Result<(), String> {
    eprintln!("+ cargo {}", args.join(" "));
    let status = Command::new("cargo")
        .args(args)
        .status()
        .map_err(|error| format!("could not start cargo: {error}"))?;
    if status.success() {
        Ok(())
    } else {
        Err(format!("cargo {} exited with {status}", args[0]))
    }
}

fn test_workspace() -> Result<(), String> {
    cargo(&["test", "-p", "key_rotation_core"])?;
    cargo(&["test", "-p", LAMBDA_PACKAGE])
}

fn ci() -> Result<(), String> {
    cargo(&["fmt", "--all", "--", "--check"])?;
    cargo(&["clippy", "--workspace", "--all-targets", "--", "-D", "warnings"])?;
    test_workspace()
}

fn built_binary(target: &str, debug: bool) -> PathBuf {
    let profile_dir = if debug { "debug" } else { "release" };
    Path::new("target")
        .join(target)
        .join(profile_dir)
        .join(LAMBDA_BINARY)
}

fn write_bootstrap_zip<W: Write + Seek>(sink: W, binary: &[u8]) -> zip::result::ZipResult<W> {
    let mut archive = ZipWriter::new(sink);
    let options = FileOptions::default()
        .compression_method(CompressionMethod::Deflated)
        .unix_permissions(0o755);
    archive.start_file(BOOTSTRAP_ENTRY, options)?;
    archive.write_all(binary)?;
    archive.finish()
}

fn lambda_package(target: &str, debug: bool, out_dir: &Path) -> Result<PathBuf, String> {
    let mut build = vec![
        "build",
        "-p",
        LAMBDA_PACKAGE,
        "--bin",
        LAMBDA_BINARY,
        "--target",
        target,
    ];
    if !debug {
        build.push("--release");
    }
    cargo(&build)?;

    let binary_path = built_binary(target, debug);
    let binary = fs::read(&binary_path)
        .map_err(|error| format!("cannot read {}: {error}", binary_path.display()))?;

    fs::create_dir_all(out_dir)
        .map_err(|error| format!("cannot create {}: {error}", out_dir.display()))?;
    let zip_path = out_dir.join(format!("{LAMBDA_BINARY}.zip"));
    let file = fs::File::create(&zip_path)
        .map_err(|error| format!("cannot create {}: {error}", zip_path.display()))?;
    write_bootstrap_zip(file, &binary)
        .map_err(|error| format!("cannot write {}: {error}", zip_path.display()))?;

    Ok(zip_path)
}

fn main() {
    let result = match Cli::parse().command {
        Task::Test => test_workspace(),
        Task::Ci => ci(),
        Task::LambdaPackage {
            target,
            debug,
            out_dir,
        } => lambda_package(&target, debug, &out_dir)
            .map(|zip_path| eprintln!("packaged {}", zip_path.display())),
    };

    if let Err(error) = result {
        eprintln!("xtask failed: {error}");
        exit(1);
    }
}
