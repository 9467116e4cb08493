use anyhow::{Context, Result, anyhow, bail};
use std::{
    env, fs,
    path::{Path, PathBuf},
    process::{Command, Stdio},
};

/// SpacetimeDB database name the terrain module is published under.
const MODULE_NAME: &str = "terrain";

/// Directory the generated client bindings are written to.
const BINDINGS_DIR: &str = "./client/src/module_bindings";

/// Usage:
///   cargo run -p xtask -- spacetime publish-generate
///   cargo run -p xtask -- spacetime generate
///
/// `publish-generate` builds `backend` as a wasm module (temporarily switching
/// its `[lib].crate-type` to `cdylib`), publishes it to the local server as
/// `terrain` with `--delete-data`, and regenerates the client bindings.
/// `generate` only regenerates the bindings. `backend/Cargo.toml` is restored
/// afterwards, even on failure.
fn main() -> Result<()> {
    let mut args = env::args().skip(1);
    let Some(cmd) = args.next() else {
        print_usage();
        bail!("missing command");
    };

    match cmd.as_str() {
        "spacetime" => {
            let Some(sub) = args.next() else {
                print_usage();
                bail!("missing subcommand for `spacetime`");
            };
            match sub.as_str() {
                "publish-generate" => with_cdylib_backend(|root| {
                    run_spacetime_publish(root)?;
                    run_spacetime_generate(root)
                }),
                "generate" => with_cdylib_backend(run_spacetime_generate),
                other => {
                    print_usage();
                    bail!("unknown `spacetime` subcommand: {other}");
                }
            }
        }
        "help" | "--help" | "-h" => {
            print_usage();
            Ok(())
        }
        other => {
            print_usage();
            bail!("unknown command: {other}");
        }
    }
}

fn print_usage() {
    eprintln!(
        r#"xtask

Usage:
  cargo run -p xtask -- spacetime publish-generate
  cargo run -p xtask -- spacetime generate

Commands:
  spacetime publish-generate   Publish the terrain module (wipes its data), then regenerate bindings
  spacetime generate           Regenerate client bindings only
"#
    );
}

/// Walks up from the xtask executable to the directory holding `backend/`
/// and `client/` next to a `Cargo.toml`.
fn project_root() -> Result<PathBuf> {
    let exe = env::current_exe().context("failed to locate current executable")?;
    let mut dir = exe
        .parent()
        .ok_or_else(|| anyhow!("current_exe has no parent directory"))?;

    loop {
        if dir.join("Cargo.toml").is_file()
            && dir.join("backend").is_dir()
            && dir.join("client").is_dir()
        {
            return Ok(dir.to_path_buf());
        }
        match dir.parent() {
            Some(parent) => dir = parent,
            None => break,
        }
    }

    bail!("could not find the workspace root (Cargo.toml with backend/ and client/ beside it)");
}

/// RAII guard that restores a file to its original contents when dropped.
struct RestoreFile {
    path: PathBuf,
    original: String,
    restored: bool,
}

impl RestoreFile {
    fn capture(path: PathBuf) -> Result<Self> {
        let original = fs::read_to_string(&path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        Ok(Self {
            path,
            original,
            restored: false,
        })
    }

    fn write(&self, contents: &str) -> Result<()> {
        fs::write(&self.path, contents)
            .with_context(|| format!("failed to write {}", self.path.display()))
    }

    fn restore(mut self) -> Result<()> {
        self.write(&self.original)?;
        self.restored = true;
        Ok(())
    }
}

impl Drop for RestoreFile {
    fn drop(&mut self) {
        if self.restored {
            return;
        }
        // Best-effort restore. We can't bubble errors in Drop.
        let _ = fs::write(&self.path, &self.original);
    }
}

/// Runs `task` while `backend/Cargo.toml` declares a `cdylib`, then puts the
/// manifest back.
fn with_cdylib_backend(task: impl FnOnce(&Path) -> Result<()>) -> Result<()> {
    let root = project_root()?;
    let guard = RestoreFile::capture(root.join("backend").join("Cargo.toml"))?;

    let patched = set_backend_crate_type_cdylib(&guard.original)
        .context("failed to patch backend/Cargo.toml to crate-type=[\"cdylib\"]")?;
    guard.write(&patched)?;

    task(&root)?;

    guard.restore()
}

fn set_backend_crate_type_cdylib(original: &str) -> Result<String> {
    let mut doc = original
        .parse::<toml_edit::DocumentMut>()
        .context("failed to parse backend/Cargo.toml as TOML")?;

    if !doc.as_table().contains_key("lib") {
        doc["lib"] = toml_edit::table();
    }

    let mut arr = toml_edit::Array::default();
    arr.push("cdylib");

    doc["lib"]["crate-type"] = toml_edit::value(arr);

    Ok(doc.to_string())
}

fn run_spacetime_publish(project_root: &Path) -> Result<()> {
    let mut cmd = Command::new(spacetime_exe()?);
    cmd.current_dir(project_root).args([
        "publish",
        "-s",
        "local",
        "-p",
        "./backend",
        MODULE_NAME,
        "--delete-data",
    ]);
    run_checked(cmd, "spacetime publish")
}

fn run_spacetime_generate(project_root: &Path) -> Result<()> {
    let mut cmd = Command::new(spacetime_exe()?);
    cmd.current_dir(project_root).args([
        "generate",
        "--lang",
        "rust",
        "-p",
        "./backend",
        "-o",
        BINDINGS_DIR,
    ]);
    run_checked(cmd, "spacetime generate")
}

/// `SPACETIME_BIN` overrides the CLI found on `PATH`.
fn spacetime_exe() -> Result<PathBuf> {
    Ok(env::var_os("SPACETIME_BIN")
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("spacetime")))
}

fn run_checked(mut cmd: Command, label: &str) -> Result<()> {
    cmd.stdin(Stdio::inherit())
        .stdout(Stdio::inherit())
        .stderr(Stdio::inherit());

    let status = cmd
        .status()
        .with_context(|| format!("failed to spawn `{label}`"))?;

    if !status.success() {
        bail!("{label} failed with exit code: {:?}", status.code());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn patch_switches_crate_type_and_keeps_the_rest() {
        let original = "[package]\nname = \"backend\" # module\n\n[lib]\ncrate-type = [\"rlib\"]\n";

        let patched = set_backend_crate_type_cdylib(original).unwrap();

        assert!(patched.contains("crate-type = [\"cdylib\"]"));
        assert!(patched.contains("name = \"backend\" # module"));
    }

    #[test]
    fn patch_adds_missing_lib_table() {
        let patched = set_backend_crate_type_cdylib("[package]\nname = \"backend\"\n").unwrap();
        let doc = patched.parse::<toml_edit::DocumentMut>().unwrap();

        assert_eq!(doc["lib"]["crate-type"][0].as_str(), Some("cdylib"));
    }
}
