use std::{path::PathBuf, time::Duration};

use anyhow::{bail, Context as _};
use clap::ArgMatches;

use crate::orchestrator::Backoff;

#[derive(Debug, Clone)]
pub(crate) struct Context {
    /// Stripped from post paths to form ledger identifiers and canonical URLs.
    pub post_root: PathBuf,
    /// Relative to `post_root`.
    pub post_dirs: Vec<PathBuf>,
    pub ledger_path: PathBuf,
    /// Without trailing slash.
    pub site_url: String,
    pub api_base: String,
    pub backoff: Backoff,
}

impl Context {
    pub fn from_matches(matches: &ArgMatches) -> anyhow::Result<Self> {
        let post_root: &PathBuf = matches.get_one("post_root").context("post_root")?;
        let post_dirs: Vec<PathBuf> = matches
            .get_many::<PathBuf>("post_dir")
            .context("post_dir")?
            .cloned()
            .collect();
        let ledger_path: &PathBuf = matches.get_one("ledger").context("ledger")?;
        if ledger_path.is_dir() {
            bail!("ledger must be a file path, not a directory.");
        }
        let site_url: &String = matches.get_one("site_url").context("site_url")?;
        let api_base: &String = matches.get_one("api_base").context("api_base")?;
        let default_backoff = Backoff::default();
        let delay = |name: &str, default: Duration| {
            matches
                .get_one::<u64>(name)
                .map_or(default, |ms| Duration::from_millis(*ms))
        };

        Ok(Self {
            post_root: post_root.to_owned(),
            post_dirs,
            ledger_path: ledger_path.to_owned(),
            site_url: site_url.trim_end_matches('/').to_string(),
            api_base: api_base.to_owned(),
            backoff: Backoff {
                after_success: delay("success_delay_ms", default_backoff.after_success),
                after_failure: delay("failure_delay_ms", default_backoff.after_failure),
            },
        })
    }

    /// Publishing scans `post_root`; ledger-only work does not need it.
    pub fn ensure_post_root(&self) -> anyhow::Result<()> {
        if !self.post_root.is_dir() {
            bail!("post_root must be a directory: {:?}", self.post_root);
        }
        Ok(())
    }
}
