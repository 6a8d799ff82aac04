use std::path::PathBuf;

use chrono::Utc;
use clap::{command, value_parser, Arg, ArgAction, Command};
use context::Context;
use ledger::Ledger;
use log::{info, warn};
use publisher::MediumPublisher;

mod context;
mod eligibility;
mod identifier;
mod ledger;
mod loader;
mod orchestrator;
mod publisher;

const TOKEN_ENV: &str = "MEDIUM_TOKEN";

fn cli() -> Command {
    command!()
        .after_help(
            "Posts are submitted as drafts. The ledger is rewritten at the end of a run: \
             posts published by an interrupted run are submitted again next time.",
        )
        .args(&[
            Arg::new("post_root")
                .help("Directory the ledger identifiers and canonical URLs are relative to")
                .value_parser(value_parser!(PathBuf))
                .default_value("src/pages"),
            Arg::new("post_dir")
                .short('d')
                .long("post-dir")
                .help("Post directory under post_root. Can be repeated.")
                .action(ArgAction::Append)
                .value_parser(value_parser!(PathBuf))
                .default_values(["posts/stonks/web", "posts/stonks/ta"]),
            Arg::new("ledger")
                .short('l')
                .long("ledger")
                .help("File of already published articles, one per line")
                .value_parser(value_parser!(PathBuf))
                .default_value("scripts/medium_articles.txt"),
            Arg::new("site_url")
                .long("site-url")
                .help("Base URL of the blog, used for canonical and image URLs")
                .default_value("https://friendlyuser.github.io"),
            Arg::new("api_base")
                .long("api-base")
                .help("Base URL of the Medium API")
                .default_value("https://api.medium.com"),
            Arg::new("success_delay_ms")
                .long("success-delay-ms")
                .help("Pause after a successful submission [default: 500]")
                .value_parser(value_parser!(u64)),
            Arg::new("failure_delay_ms")
                .long("failure-delay-ms")
                .help("Pause after a failed submission [default: 5000]")
                .value_parser(value_parser!(u64)),
            Arg::new("normalize_only")
                .long("normalize-only")
                .help("Rewrite the ledger with normalized identifiers and exit without publishing")
                .action(ArgAction::SetTrue),
        ])
}

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let matches = cli().get_matches();
    let ctx = Context::from_matches(&matches)?;

    if matches.get_flag("normalize_only") {
        let ledger = Ledger::load(&ctx.ledger_path, &ctx.site_url)?;
        ledger.save(&ctx.ledger_path)?;
        info!("Normalized {} entries in {:?}", ledger.len(), ctx.ledger_path);
        return Ok(());
    }

    ctx.ensure_post_root()?;
    let token = std::env::var(TOKEN_ENV).ok();
    if token.is_none() {
        warn!("{TOKEN_ENV} is not set. every submission will fail.");
    }
    let publisher = MediumPublisher::new(&ctx.api_base, token)?;

    let report = orchestrator::run(&ctx, &publisher, Utc::now())?;
    info!(
        "Done. published: {}, failed: {}, already published: {}, scheduled: {}, invalid: {}",
        report.published.len(),
        report.failed.len(),
        report.already_published,
        report.scheduled,
        report.invalid
    );
    for id in report.failed.iter() {
        warn!("Not published (will retry next run): {id}");
    }

    Ok(())
}
