use std::path::Path;

use crate::config::Config;

pub fn check(cfg: &Config, data_dir: &Path) -> anyhow::Result<()> {
    let mut errors: Vec<String> = Vec::new();

    // Check 1: data dir writable
    let marker = data_dir.join(".write-check");
    match std::fs::create_dir_all(data_dir).and_then(|_| std::fs::write(&marker, b"")) {
        Ok(()) => {
            let _ = std::fs::remove_file(&marker);
        }
        Err(e) => errors.push(format!(
            "cannot write to {}: {e}\n  \
             → pass --data-dir pointing at a writable directory",
            data_dir.display()
        )),
    }

    // Check 2: pinentry binary found
    match std::process::Command::new(&cfg.pinentry)
        .arg("--version")
        .output()
    {
        Ok(_) => {}
        Err(e) => errors.push(format!(
            "pinentry binary not found: '{}': {e}\n  \
             → install pinentry or pass --pinentry <path>",
            cfg.pinentry
        )),
    }

    if errors.is_empty() {
        return Ok(());
    }

    for err in &errors {
        tracing::error!("{err}");
        eprintln!("ERROR: {err}");
    }
    anyhow::bail!("{} preflight check(s) failed", errors.len());
}
