//! Live dashboard
//!
//! Prints an initial snapshot, then a fresh line whenever a repository's
//! status changes. Updates come from three places:
//! - the path watcher (immediate re-fetch of the changed repository)
//! - the periodic refresher (re-fetch of everything)
//! - stdin commands (`<n>` selects a repository and shows its pull requests,
//!   `r` refreshes everything, `q` quits)

use crate::refresh::{PeriodicRefresher, RefreshTick};
use crate::render;
use crate::session::{ReviewResult, Session, StatusResult};
use crate::system_config::{self, SystemConfig};
use crate::util;
use anyhow::{Context, Result};
use owo_colors::OwoColorize;
use std::io::BufRead;
use std::path::PathBuf;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use vigil_core::{Delivery, FetchScheduler};
use watcher::PathWatcher;

/// A line typed on stdin
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Select(usize),
    RefreshAll,
    Quit,
    Help,
}

/// Parse one line of input; blank lines are `None`.
pub fn parse_command(line: &str) -> Option<Command> {
    let line = line.trim();
    match line {
        "" => None,
        "q" | "quit" => Some(Command::Quit),
        "r" | "refresh" => Some(Command::RefreshAll),
        _ => match line.parse() {
            Ok(index) => Some(Command::Select(index)),
            Err(_) => Some(Command::Help),
        },
    }
}

type StatusUpdate = (usize, Delivery<StatusResult>);
type DetailResult = (usize, Option<ReviewResult>);

/// Fetch schedulers for every view on the dashboard
struct Dashboard {
    session: Session,
    /// One scheduler per repository line
    status_views: Vec<FetchScheduler<StatusResult>>,
    /// The selected repository's detail pane
    detail: FetchScheduler<DetailResult>,
    detail_delay: Duration,
    selected: Option<usize>,
}

impl Dashboard {
    fn new(
        session: Session,
        config: &SystemConfig,
    ) -> (
        Self,
        mpsc::UnboundedReceiver<StatusUpdate>,
        mpsc::UnboundedReceiver<Delivery<DetailResult>>,
    ) {
        let (updates_tx, updates) = mpsc::unbounded_channel();

        let status_views = (0..session.repos().len())
            .map(|index| {
                let (view, mut deliveries) = FetchScheduler::new();
                let updates_tx = updates_tx.clone();
                tokio::spawn(async move {
                    while let Some(delivery) = deliveries.recv().await {
                        if updates_tx.send((index, delivery)).is_err() {
                            break;
                        }
                    }
                });
                view
            })
            .collect::<Vec<_>>();

        let (detail, details) = FetchScheduler::new();

        let dashboard = Self {
            session,
            status_views,
            detail,
            detail_delay: config.fetch.debounce(),
            selected: None,
        };
        (dashboard, updates, details)
    }

    /// Re-read one repository's status now.
    fn refresh(&self, index: usize) {
        let (Some(view), Some(repo)) = (self.status_views.get(index), self.session.repo(index))
        else {
            return;
        };
        let session = self.session.clone();
        let repo = repo.to_path_buf();
        view.immediate(move || async move { session.refresh_status(&repo).await });
    }

    fn refresh_all(&self) {
        for index in 0..self.status_views.len() {
            self.refresh(index);
        }
    }

    /// Move the selection; the detail fetch waits for the selection to settle.
    fn select(&mut self, index: usize) -> bool {
        let Some(repo) = self.session.repo(index) else {
            return false;
        };
        self.selected = Some(index);

        let session = self.session.clone();
        let repo = repo.to_path_buf();
        self.detail.trigger(self.detail_delay, move || async move {
            (index, session.reviews(&repo).await)
        });
        true
    }

    fn shutdown(&self) {
        self.detail.dispose();
        for view in &self.status_views {
            view.dispose();
        }
    }
}

pub async fn run(paths: Vec<PathBuf>) -> Result<()> {
    let config = system_config::load().context("Failed to load configuration")?;
    let repos = util::resolve_repos(&paths, &config)?;
    if repos.is_empty() {
        anyhow::bail!(
            "No repositories to watch. Pass paths, or set `repos` / `roots` in the config file."
        );
    }

    let session = Session::new(&config, repos);

    // Initial snapshot
    println!("{}", "Repository Status".bold());
    println!("{}", render::RULE);
    let reports = session.snapshot().await;
    for (index, report) in reports.iter().enumerate() {
        println!("{}", render::status_line(index, &report.path, &report.status));
    }
    println!("{}", render::summary_line(&reports).dimmed());
    println!("{}", render::help_text());

    let (mut dashboard, mut updates, mut details) = Dashboard::new(session.clone(), &config);

    // Repository change notifications
    let (watcher, mut changes) = if config.watch.enabled {
        let (watcher, changes) =
            PathWatcher::new(config.watch.clone()).context("Failed to start watcher")?;
        let watched = watcher.watch(session.repos());
        info!(watched, total = session.repos().len(), "watching repositories");
        (Some(watcher), changes)
    } else {
        (None, mpsc::unbounded_channel().1)
    };
    let mut watching = watcher.is_some();

    // Periodic refresh
    let (tick_tx, mut ticks) = mpsc::channel::<RefreshTick>(1);
    let mut ticking = match config.refresh.interval() {
        Some(interval) => {
            tokio::spawn(PeriodicRefresher::new(interval, tick_tx).run());
            true
        }
        None => false,
    };

    // Stdin is read on a plain thread: a blocked read must not hold up shutdown
    let (line_tx, mut lines) = mpsc::unbounded_channel::<String>();
    std::thread::spawn(move || {
        for line in std::io::stdin().lock().lines() {
            let Ok(line) = line else { break };
            if line_tx.send(line).is_err() {
                break;
            }
        }
    });
    let mut reading = true;

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                debug!("interrupted");
                break;
            }

            change = changes.recv(), if watching => match change {
                Some(path) => match session.index_of(&path) {
                    Some(index) => {
                        debug!(path = %path.display(), "repository changed");
                        dashboard.refresh(index);
                    }
                    None => warn!(path = %path.display(), "change for unknown repository"),
                },
                None => watching = false,
            },

            tick = ticks.recv(), if ticking => match tick {
                Some(tick) => {
                    debug!(sequence = tick.sequence, "periodic refresh");
                    dashboard.refresh_all();
                }
                None => ticking = false,
            },

            line = lines.recv(), if reading => match line.as_deref().map(parse_command) {
                Some(Some(Command::Quit)) => break,
                Some(Some(Command::RefreshAll)) => {
                    println!("{}", "Refreshing...".dimmed());
                    dashboard.refresh_all();
                }
                Some(Some(Command::Select(index))) => {
                    if dashboard.select(index) {
                        println!("{} [{}]", "Selected".dimmed(), index);
                    } else {
                        println!("{} {}", "No repository at".yellow(), index);
                    }
                }
                Some(Some(Command::Help)) => println!("{}", render::help_text()),
                Some(None) => {}
                None => reading = false,
            },

            Some((index, delivery)) = updates.recv() => {
                if let Some(repo) = session.repo(index) {
                    println!("{}", render::status_line(index, repo, &delivery.value));
                }
            }

            Some(delivery) = details.recv() => {
                let (index, reviews) = delivery.value;
                // A stale selection can still complete between keystrokes
                if dashboard.selected == Some(index) {
                    if let Some(repo) = session.repo(index) {
                        for line in render::review_lines(repo, reviews.as_ref()) {
                            println!("{}", line);
                        }
                    }
                }
            }
        }
    }

    dashboard.shutdown();
    if let Some(watcher) = watcher {
        watcher.close();
    }
    Ok(())
}
