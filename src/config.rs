use std::path::PathBuf;

pub const RP_NAME: &str = "biokey wallet";
/// Platform-enforced limit on one verification prompt.
pub const UV_TIMEOUT_SECS: u64 = 60;
pub const TICK_MILLIS: u64 = 1000;

#[derive(clap::Parser, Debug, Clone)]
#[command(name = "biokey", version, about)]
pub struct Config {
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,
    /// Directory for the session record and credentials. Defaults to the XDG data dir.
    #[arg(long, global = true)]
    pub data_dir: Option<PathBuf>,
    #[arg(long, default_value = "pinentry", global = true)]
    pub pinentry: String,
    #[arg(long, default_value = "biokey.local", global = true)]
    pub rp_id: String,
    /// Account label bound to newly enrolled credentials.
    #[arg(long, default_value = "biokey-user", global = true)]
    pub label: String,
    /// Only enroll after an assertion when no usable credential exists.
    #[arg(long, global = true)]
    pub strict_fallback: bool,
    #[command(subcommand)]
    pub command: Command,
}

#[derive(clap::Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Obtain a signing key, prompting for verification if none is cached.
    Unlock,
    /// Show the cached address and remaining time.
    Status,
    /// Print the cached key hand-off as JSON for an external signer.
    Key,
    /// Clear the cached key but remember the credential.
    Lock,
    /// Clear everything, including which credential to use.
    Forget {
        /// Also delete the credential from the local authenticator.
        #[arg(long)]
        purge_credential: bool,
    },
    /// Show a live countdown until the cached key expires.
    Watch,
}

impl Config {
    pub fn resolve_data_dir(&self) -> anyhow::Result<PathBuf> {
        match &self.data_dir {
            Some(dir) => Ok(dir.clone()),
            None => Ok(directories::ProjectDirs::from("", "", "biokey")
                .ok_or_else(|| anyhow::anyhow!("cannot determine XDG data dir"))?
                .data_dir()
                .to_path_buf()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[test]
    fn test_parse_forget_with_global_flags() {
        let cfg = Config::parse_from(["biokey", "-vv", "forget", "--purge-credential", "--label", "alice"]);
        assert_eq!(cfg.verbose, 2);
        assert_eq!(cfg.label, "alice");
        assert_eq!(cfg.command, Command::Forget { purge_credential: true });
    }

    #[test]
    fn test_defaults() {
        let cfg = Config::parse_from(["biokey", "unlock"]);
        assert_eq!(cfg.rp_id, "biokey.local");
        assert_eq!(cfg.pinentry, "pinentry");
        assert!(!cfg.strict_fallback);
        assert_eq!(cfg.command, Command::Unlock);
    }
}
