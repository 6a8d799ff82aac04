//! One publishing run: load the ledger, scan posts, publish what is due, persist.
//!
//! Delivery is at-least-once. The ledger is rewritten only at the end of a run, so posts
//! published by a run that is killed midway are submitted again by the next one.

use std::{thread, time::Duration};

use anyhow::Context as _;
use chrono::{DateTime, Utc};
use log::{debug, info, warn};

use crate::{
    context::Context,
    eligibility::{self, Eligibility},
    identifier::ArticleId,
    ledger::Ledger,
    loader::{self, LoadedPost},
    publisher::{PublishRequest, Publisher},
};

/// Pauses after each publish attempt, to stay under the API's rate limit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Backoff {
    pub after_success: Duration,
    pub after_failure: Duration,
}

impl Default for Backoff {
    fn default() -> Self {
        Self {
            after_success: Duration::from_millis(500),
            after_failure: Duration::from_secs(5),
        }
    }
}

#[derive(Debug, Default)]
pub(crate) struct RunReport {
    pub published: Vec<ArticleId>,
    pub failed: Vec<ArticleId>,
    pub already_published: usize,
    pub scheduled: usize,
    pub invalid: usize,
}

/// Publishes every post that is due and not yet in `ledger`, recording the successes.
///
/// Failed posts stay out of the ledger so the next run picks them up again.
pub(crate) fn reconcile<P, I>(
    mut ledger: Ledger,
    posts: I,
    publisher: &P,
    site_url: &str,
    backoff: Backoff,
    now: DateTime<Utc>,
) -> (Ledger, RunReport)
where
    P: Publisher + ?Sized,
    I: IntoIterator<Item = anyhow::Result<LoadedPost>>,
{
    let mut report = RunReport::default();

    for post in posts {
        let post = match post {
            Ok(post) => post,
            Err(e) => {
                warn!("Skipping post: {e:#}");
                report.invalid += 1;
                continue;
            }
        };

        match eligibility::check(&post, &ledger, now) {
            Eligibility::AlreadyPublished => {
                debug!("{} is already published", post.id);
                report.already_published += 1;
            }
            Eligibility::Scheduled(date) => {
                info!("{} is scheduled for {date}. not yet due", post.id);
                report.scheduled += 1;
            }
            Eligibility::Eligible => {
                info!("Publishing {} ({:?})", post.id, post.path);
                let request = PublishRequest::build(&post, site_url);
                if publisher.publish(&request) {
                    ledger.insert(post.id.clone());
                    report.published.push(post.id);
                    thread::sleep(backoff.after_success);
                } else {
                    report.failed.push(post.id);
                    thread::sleep(backoff.after_failure);
                }
            }
        }
    }

    (ledger, report)
}

/// A ledger that cannot be written is the only fatal error once scanning has started.
pub(crate) fn run<P: Publisher + ?Sized>(
    ctx: &Context,
    publisher: &P,
    now: DateTime<Utc>,
) -> anyhow::Result<RunReport> {
    let ledger = Ledger::load(&ctx.ledger_path, &ctx.site_url)?;
    info!(
        "Loaded {} published articles from {:?}",
        ledger.len(),
        ctx.ledger_path
    );

    let posts = loader::scan(&ctx.post_root, &ctx.post_dirs);
    let (ledger, report) = reconcile(ledger, posts, publisher, &ctx.site_url, ctx.backoff, now);

    ledger
        .save(&ctx.ledger_path)
        .with_context(|| format!("while saving ledger {:?}", ctx.ledger_path))?;
    debug!("Saved {} entries to {:?}", ledger.len(), ctx.ledger_path);

    Ok(report)
}

#[cfg(test)]
mod tests {
    use std::{
        cell::RefCell,
        collections::VecDeque,
        path::{Path, PathBuf},
        time::Instant,
    };

    use chrono::TimeZone;

    use super::*;

    /// Records every request; answers from `outcomes`, then `true`.
    #[derive(Default)]
    struct FakePublisher {
        outcomes: RefCell<VecDeque<bool>>,
        calls: RefCell<Vec<PublishRequest>>,
    }

    impl FakePublisher {
        fn failing_once() -> Self {
            Self {
                outcomes: RefCell::new(VecDeque::from([false])),
                ..Default::default()
            }
        }

        fn titles(&self) -> Vec<String> {
            self.calls.borrow().iter().map(|r| r.title.clone()).collect()
        }
    }

    impl Publisher for FakePublisher {
        fn publish(&self, request: &PublishRequest) -> bool {
            self.calls.borrow_mut().push(request.clone());
            self.outcomes.borrow_mut().pop_front().unwrap_or(true)
        }
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap()
    }

    fn context(root: &Path) -> Context {
        Context {
            post_root: root.join("src").join("pages"),
            post_dirs: vec![PathBuf::from("posts/stonks/web"), PathBuf::from("posts/stonks/ta")],
            ledger_path: root.join("scripts").join("medium_articles.txt"),
            site_url: "https://friendlyuser.github.io".to_string(),
            api_base: "http://127.0.0.1:9".to_string(),
            backoff: Backoff {
                after_success: Duration::ZERO,
                after_failure: Duration::ZERO,
            },
        }
    }

    fn write_post(ctx: &Context, dir: &str, name: &str, title: &str, pub_date: Option<&str>) {
        let dir = ctx.post_root.join(dir);
        std::fs::create_dir_all(&dir).unwrap();
        let date = pub_date.map_or(String::new(), |d| format!("pubDate: {d}\n"));
        std::fs::write(
            dir.join(name),
            format!("---\ntitle: {title}\ntags: [stocks]\n{date}---\nbody of {title}\n"),
        )
        .unwrap();
    }

    fn ledger_lines(ctx: &Context) -> Vec<String> {
        std::fs::read_to_string(&ctx.ledger_path)
            .unwrap()
            .lines()
            .map(str::to_string)
            .collect()
    }

    #[test]
    fn publishes_due_posts_and_skips_scheduled() {
        let tmp = tempfile::tempdir().unwrap();
        let ctx = context(tmp.path());
        write_post(&ctx, "posts/stonks/web", "a.md", "A", Some("2023-01-01"));
        write_post(&ctx, "posts/stonks/web", "b.md", "B", Some("2999-01-01"));

        let publisher = FakePublisher::default();
        let report = run(&ctx, &publisher, now()).unwrap();

        assert_eq!(publisher.titles(), vec!["A"]);
        assert_eq!(ledger_lines(&ctx), vec!["/posts/stonks/web/a.md"]);
        assert_eq!(report.published.len(), 1);
        assert_eq!(report.scheduled, 1);
        assert!(report.failed.is_empty());

        let calls = publisher.calls.borrow();
        assert_eq!(
            calls[0].canonical_url,
            "https://friendlyuser.github.io/posts/stonks/web/a"
        );
        assert_eq!(calls[0].publish_status, "draft");
    }

    #[test]
    fn second_run_is_idempotent() {
        let tmp = tempfile::tempdir().unwrap();
        let ctx = context(tmp.path());
        write_post(&ctx, "posts/stonks/web", "a.md", "A", None);
        write_post(&ctx, "posts/stonks/ta", "c.md", "C", Some("2024-05-31"));

        let first = FakePublisher::default();
        run(&ctx, &first, now()).unwrap();
        assert_eq!(first.titles(), vec!["A", "C"]);
        let after_first = ledger_lines(&ctx);

        let second = FakePublisher::default();
        let report = run(&ctx, &second, now()).unwrap();
        assert!(second.calls.borrow().is_empty());
        assert_eq!(report.already_published, 2);
        assert_eq!(ledger_lines(&ctx), after_first);
    }

    #[test]
    fn failed_post_stays_out_of_ledger_and_backs_off() {
        let tmp = tempfile::tempdir().unwrap();
        let mut ctx = context(tmp.path());
        ctx.backoff.after_failure = Duration::from_millis(200);
        write_post(&ctx, "posts/stonks/web", "a.md", "A", None);
        write_post(&ctx, "posts/stonks/web", "b.md", "B", None);

        let publisher = FakePublisher::failing_once();
        let started = Instant::now();
        let report = run(&ctx, &publisher, now()).unwrap();

        assert!(started.elapsed() >= Duration::from_millis(200));
        assert_eq!(publisher.titles(), vec!["A", "B"]);
        assert_eq!(report.failed.len(), 1);
        assert_eq!(ledger_lines(&ctx), vec!["/posts/stonks/web/b.md"]);

        // retried next run, and recorded exactly once
        let retry = FakePublisher::default();
        run(&ctx, &retry, now()).unwrap();
        assert_eq!(retry.titles(), vec!["A"]);
        assert_eq!(
            ledger_lines(&ctx),
            vec!["/posts/stonks/web/b.md", "/posts/stonks/web/a.md"]
        );
    }

    #[test]
    fn windows_style_ledger_entries_match_scanned_posts() {
        let tmp = tempfile::tempdir().unwrap();
        let ctx = context(tmp.path());
        write_post(&ctx, "posts/stonks/web", "a.md", "A", None);
        std::fs::create_dir_all(ctx.ledger_path.parent().unwrap()).unwrap();
        std::fs::write(&ctx.ledger_path, "\\posts\\stonks\\web\\a.md\n").unwrap();

        let publisher = FakePublisher::default();
        run(&ctx, &publisher, now()).unwrap();

        assert!(publisher.calls.borrow().is_empty());
        assert_eq!(ledger_lines(&ctx), vec!["/posts/stonks/web/a.md"]);
    }

    #[test]
    fn malformed_post_does_not_stop_the_run() {
        let tmp = tempfile::tempdir().unwrap();
        let ctx = context(tmp.path());
        let web = ctx.post_root.join("posts/stonks/web");
        std::fs::create_dir_all(&web).unwrap();
        std::fs::write(web.join("0-broken.md"), "no front matter").unwrap();
        write_post(&ctx, "posts/stonks/web", "a.md", "A", None);

        let publisher = FakePublisher::default();
        let report = run(&ctx, &publisher, now()).unwrap();

        assert_eq!(report.invalid, 1);
        assert_eq!(publisher.titles(), vec!["A"]);
    }

    #[test]
    fn unreadable_ledger_stops_before_publishing() {
        let tmp = tempfile::tempdir().unwrap();
        let mut ctx = context(tmp.path());
        write_post(&ctx, "posts/stonks/web", "a.md", "A", None);
        // a directory where the ledger file should be
        ctx.ledger_path = tmp.path().join("ledger_dir");
        std::fs::create_dir_all(ctx.ledger_path.join("inner")).unwrap();

        let publisher = FakePublisher::default();
        assert!(run(&ctx, &publisher, now()).is_err());
        assert!(publisher.calls.borrow().is_empty());
    }

    #[test]
    fn unwritable_ledger_fails_the_run_after_publishing() {
        let tmp = tempfile::tempdir().unwrap();
        let mut ctx = context(tmp.path());
        write_post(&ctx, "posts/stonks/web", "a.md", "A", None);
        // parent is a regular file: load sees no ledger, save cannot create one
        let not_a_dir = tmp.path().join("afile");
        std::fs::write(&not_a_dir, "").unwrap();
        ctx.ledger_path = not_a_dir.join("ledger.txt");

        let publisher = FakePublisher::default();
        let err = run(&ctx, &publisher, now()).unwrap_err();

        assert_eq!(publisher.titles(), vec!["A"]);
        assert!(format!("{err:#}").contains("while saving ledger"));
        assert_eq!(std::fs::read_to_string(&not_a_dir).unwrap(), "");
    }
}
