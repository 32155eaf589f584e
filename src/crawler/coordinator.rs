//! Crawler coordinator - main crawl orchestration logic
//!
//! The coordinator owns the frontier and a bounded pool of workers. Each
//! worker advances one task through the lifecycle (rate limit, cache, fetch,
//! extract, discover) and posts its result back; the coordinator records the
//! manifest entry and queues whatever the worker admitted.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use url::Url;

use crate::cache::{Fingerprint, ResponseCache};
use crate::config::{validate, Config};
use crate::crawler::parser::{discover_links, is_html};
use crate::crawler::report::{CrawlReport, ManifestEntry};
use crate::crawler::scheduler::{CrawlTask, Frontier};
use crate::crawler::{is_transient_status, HttpFetcher, RateLimiter, Request, Response};
use crate::extract::{ExtractedRecord, Extractor};
use crate::robots::RobotsPolicy;
use crate::state::{Admission, FailureCause, SkipReason, TaskOutcome, TaskState, VisitedSet};
use crate::url::{host_key, normalize_parsed, DomainScope};
use crate::{HarvestError, Result};

/// Everything a worker needs, shared across the pool
#[derive(Debug)]
struct CrawlContext {
    fetcher: Arc<HttpFetcher>,
    limiter: Arc<RateLimiter>,
    robots: Option<RobotsPolicy>,
    cache: Arc<ResponseCache>,
    extractor: Arc<Extractor>,
    visited: VisitedSet,
    scope: DomainScope,
    max_depth: u32,
    max_tasks: usize,
    max_retries: u32,
    fetch_timeout: Duration,
    token: CancellationToken,
}

/// Result of offering a URL to the crawl
#[derive(Debug)]
enum Admitted {
    /// Scheduled; goes to the frontier
    Task(CrawlTask),
    /// Settled without fetching (robots denial, duplicate, task limit)
    Entry(ManifestEntry),
}

/// What a worker hands back for one task
#[derive(Debug)]
enum WorkerResult {
    Done {
        entry: ManifestEntry,
        records: Vec<ExtractedRecord>,
        admitted: Vec<Admitted>,
    },
    /// Transient failure; the task is Scheduled again
    Retry(CrawlTask),
    /// Cancelled before the request was granted; the task is untouched
    Requeue(CrawlTask),
}

/// Main crawler coordinator structure
#[derive(Debug)]
pub struct Coordinator {
    ctx: Arc<CrawlContext>,
    seeds: Vec<Url>,
    worker_count: usize,
    crawl_timeout: Option<Duration>,
}

impl Coordinator {
    /// Creates a new coordinator instance
    ///
    /// Validates the configuration and builds every component. Nothing
    /// touches the network until `run`.
    ///
    /// # Arguments
    ///
    /// * `config` - The crawler configuration
    ///
    /// # Returns
    ///
    /// * `Ok(Coordinator)` - Ready to run
    /// * `Err(HarvestError)` - Invalid configuration or the cache could not be opened
    pub fn new(config: Config) -> Result<Self> {
        validate(&config)?;
        let cache = ResponseCache::from_config(&config.cache)?;
        Self::with_cache(config, Arc::new(cache))
    }

    /// Creates a coordinator that uses an existing response cache
    pub fn with_cache(config: Config, cache: Arc<ResponseCache>) -> Result<Self> {
        validate(&config)?;

        let seeds = config
            .seeds
            .iter()
            .map(|s| Url::parse(s))
            .collect::<std::result::Result<Vec<_>, _>>()?;

        let crawler = &config.crawler;
        let user_agent = config.user_agent.user_agent_string();
        let fetcher = Arc::new(HttpFetcher::from_config(&config)?);

        let robots = crawler.respect_robots.then(|| {
            RobotsPolicy::new(Arc::clone(&fetcher), &user_agent, crawler.fetch_timeout())
        });

        let ctx = CrawlContext {
            limiter: Arc::new(RateLimiter::new(crawler.min_delay(), crawler.max_delay())),
            robots,
            cache,
            extractor: Arc::new(Extractor::from_config(&config.extract)?),
            visited: VisitedSet::new(),
            scope: DomainScope::new(&crawler.allowed_domains, &seeds),
            max_depth: crawler.max_depth,
            max_tasks: crawler.max_tasks as usize,
            max_retries: crawler.max_retries,
            fetch_timeout: crawler.fetch_timeout(),
            token: CancellationToken::new(),
            fetcher,
        };

        Ok(Self {
            ctx: Arc::new(ctx),
            seeds,
            worker_count: crawler.worker_count.max(1) as usize,
            crawl_timeout: crawler.crawl_timeout(),
        })
    }

    /// Token that cancels the crawl when triggered
    pub fn cancellation_token(&self) -> CancellationToken {
        self.ctx.token.clone()
    }

    pub fn rate_limiter(&self) -> Arc<RateLimiter> {
        Arc::clone(&self.ctx.limiter)
    }

    pub fn cache(&self) -> Arc<ResponseCache> {
        Arc::clone(&self.ctx.cache)
    }

    pub fn extractor(&self) -> Arc<Extractor> {
        Arc::clone(&self.ctx.extractor)
    }

    /// Runs the crawl to completion or cancellation
    ///
    /// Per-task failures are recorded in the manifest. The only error
    /// returned is an invalid lifecycle transition, which is a bug.
    pub async fn run(self) -> Result<CrawlReport> {
        let started_at = Utc::now();
        let ctx = self.ctx;
        let mut run = RunState::default();

        tracing::info!(
            "Starting crawl: {} seeds, {} workers, max depth {}, max tasks {}",
            self.seeds.len(),
            self.worker_count,
            ctx.max_depth,
            ctx.max_tasks
        );

        for seed in self.seeds {
            if let Some(admitted) = admit(&ctx, seed, 0, None).await? {
                run.accept(admitted);
            }
        }

        // a timeout too large for the clock means no deadline
        let deadline = self
            .crawl_timeout
            .and_then(|timeout| tokio::time::Instant::now().checked_add(timeout));
        let timer = async move {
            match deadline {
                Some(at) => tokio::time::sleep_until(at).await,
                None => std::future::pending().await,
            }
        };
        tokio::pin!(timer);

        let mut jobs: JoinSet<Result<WorkerResult>> = JoinSet::new();

        loop {
            while !ctx.token.is_cancelled() && jobs.len() < self.worker_count {
                let Some(task) = run.frontier.pop() else {
                    break;
                };
                let ctx = Arc::clone(&ctx);
                jobs.spawn(async move { process_task(&ctx, task).await });
            }

            if jobs.is_empty() {
                if ctx.token.is_cancelled() {
                    tracing::info!("Crawl cancelled, {} tasks left queued", run.frontier.len());
                } else {
                    tracing::info!("Frontier is empty, crawl complete");
                }
                break;
            }

            tokio::select! {
                joined = jobs.join_next() => match joined {
                    Some(Ok(result)) => run.settle(result?),
                    Some(Err(e)) => tracing::error!("Worker task failed: {}", e),
                    None => {}
                },
                _ = ctx.token.cancelled(), if !ctx.token.is_cancelled() => {
                    tracing::info!("Cancellation requested, waiting for {} in-flight tasks", jobs.len());
                }
                _ = &mut timer, if !ctx.token.is_cancelled() => {
                    tracing::warn!("Crawl timeout reached, cancelling remaining work");
                    ctx.token.cancel();
                }
            }
        }

        let report = CrawlReport {
            records: run.records,
            manifest: run.manifest,
            remaining: run.frontier.drain(),
            cancelled: ctx.token.is_cancelled(),
            started_at,
            finished_at: Utc::now(),
        };

        tracing::info!(
            "Crawl finished: {} succeeded, {} failed, {} skipped, {} duplicates, {} records",
            report.succeeded(),
            report.failed(),
            report.skipped(),
            report.duplicates(),
            report.records.len()
        );

        Ok(report)
    }
}

/// Coordinator-side bookkeeping for one run
#[derive(Debug, Default)]
struct RunState {
    frontier: Frontier,
    manifest: Vec<ManifestEntry>,
    records: Vec<ExtractedRecord>,
    /// URLs that already have (or will get) a manifest entry
    reported: HashSet<String>,
}

impl RunState {
    fn accept(&mut self, admitted: Admitted) {
        match admitted {
            Admitted::Task(task) => {
                self.reported.insert(task.key().to_string());
                self.frontier.push(task);
            }
            Admitted::Entry(entry) => {
                // A link seen on many pages is reported once
                if self.reported.insert(entry.url.clone()) {
                    self.manifest.push(entry);
                }
            }
        }
    }

    fn settle(&mut self, result: WorkerResult) {
        match result {
            WorkerResult::Done {
                entry,
                records,
                admitted,
            } => {
                self.records.extend(records);
                self.manifest.push(entry);
                for a in admitted {
                    self.accept(a);
                }

                if self.manifest.len() % 10 == 0 {
                    tracing::info!(
                        "Progress: {} URLs settled, {} records, {} queued",
                        self.manifest.len(),
                        self.records.len(),
                        self.frontier.len()
                    );
                }
            }
            WorkerResult::Retry(task) | WorkerResult::Requeue(task) => self.frontier.push(task),
        }
    }
}

/// Moves a discovered URL through the robots check and the visited set
///
/// # Returns
///
/// * `Ok(Some(Admitted::Task))` - Scheduled
/// * `Ok(Some(Admitted::Entry))` - Settled without a fetch
/// * `Ok(None)` - The URL could not be normalized
async fn admit(
    ctx: &CrawlContext,
    raw: Url,
    depth: u32,
    parent: Option<String>,
) -> Result<Option<Admitted>> {
    let mut listed = raw.clone();
    listed.set_fragment(None);

    let url = match normalize_parsed(raw) {
        Ok(url) => url,
        Err(e) => {
            tracing::debug!("Failed to normalize URL {}: {}", listed, e);
            return Ok(None);
        }
    };

    let mut task = CrawlTask::discovered(url, depth, parent);
    let settled = |task: &CrawlTask, outcome: TaskOutcome| {
        Admitted::Entry(ManifestEntry::unfetched(
            listed.as_str(),
            depth,
            task.parent.clone(),
            outcome,
        ))
    };

    // At capacity a new URL is refused without consulting robots.txt
    if ctx.visited.is_full(ctx.max_tasks) && !ctx.visited.contains(task.key()) {
        task.transition(TaskState::Skipped)?;
        tracing::debug!("Task limit reached, skipping {}", task.url);
        return Ok(Some(settled(&task, TaskOutcome::Skipped(SkipReason::TaskLimit))));
    }

    if let Some(robots) = &ctx.robots {
        if !robots.is_allowed(&task.url, robots.user_agent()).await {
            task.transition(TaskState::Skipped)?;
            tracing::info!("URL {} disallowed by robots.txt", task.url);
            return Ok(Some(settled(
                &task,
                TaskOutcome::Skipped(SkipReason::PolicyDenied),
            )));
        }
    }
    task.transition(TaskState::PolicyChecked)?;

    match ctx.visited.try_schedule(task.key(), ctx.max_tasks) {
        Admission::Scheduled => {
            task.transition(TaskState::Scheduled)?;
            tracing::debug!("Scheduled {} at depth {}", task.url, depth);
            Ok(Some(Admitted::Task(task)))
        }
        Admission::Duplicate => {
            task.transition(TaskState::Duplicate)?;
            tracing::trace!("Already visited: {}", task.url);
            Ok(Some(settled(&task, TaskOutcome::Duplicate)))
        }
        Admission::LimitReached => {
            task.transition(TaskState::Skipped)?;
            tracing::debug!("Task limit reached, skipping {}", task.url);
            Ok(Some(settled(&task, TaskOutcome::Skipped(SkipReason::TaskLimit))))
        }
    }
}

/// Advances one Scheduled task as far as it can go
async fn process_task(ctx: &CrawlContext, mut task: CrawlTask) -> Result<WorkerResult> {
    let host = host_key(&task.url).unwrap_or_default();

    if let Some(robots) = &ctx.robots {
        if let Some(delay) = robots.crawl_delay(&task.url).await {
            ctx.limiter.set_crawl_delay(&host, delay);
        }
    }

    tokio::select! {
        biased;
        _ = ctx.token.cancelled() => return Ok(WorkerResult::Requeue(task)),
        _ = ctx.limiter.acquire(&host) => {}
    }

    let request = Request::get(task.url.clone());
    let fingerprint = Fingerprint::of(&request);

    if let Some(response) = ctx.cache.get(&fingerprint) {
        tracing::debug!("Cache hit for {}", task.url);
        task.transition(TaskState::Succeeded)?;
        return complete(ctx, &task, &response, true).await;
    }

    task.transition(TaskState::Fetching)?;
    tracing::debug!("Fetching {} (attempt {})", task.url, task.retry_count + 1);

    match ctx.fetcher.fetch(&request, ctx.fetch_timeout).await {
        Ok(response) if response.is_success() => {
            ctx.limiter.record_success(&host);
            if let Err(e) = ctx
                .cache
                .put(&fingerprint, task.key(), &response, ctx.cache.default_ttl())
            {
                tracing::warn!("Failed to cache response for {}: {}", task.url, e);
            }
            task.transition(TaskState::Succeeded)?;
            complete(ctx, &task, &response, false).await
        }
        Ok(response) if is_transient_status(response.status) => retry_or_fail(
            ctx,
            task,
            &host,
            FailureCause::HttpStatus(response.status),
            Some(response.status),
        ),
        Ok(response) => {
            task.transition(TaskState::Failed)?;
            let err = HarvestError::HttpStatus {
                url: task.url.to_string(),
                status: response.status,
            };
            tracing::warn!("{}", err);
            Ok(failed(
                &task,
                FailureCause::HttpStatus(response.status),
                Some(response.status),
            ))
        }
        Err(e) if e.is_transient() => {
            retry_or_fail(ctx, task, &host, FailureCause::Fetch(e), None)
        }
        Err(e) => {
            task.transition(TaskState::Failed)?;
            tracing::warn!("Fetch failed for {}: {}", task.url, e);
            Ok(failed(&task, FailureCause::Fetch(e), None))
        }
    }
}

/// Backs the host off and either reschedules the task or fails it
fn retry_or_fail(
    ctx: &CrawlContext,
    mut task: CrawlTask,
    host: &str,
    cause: FailureCause,
    status: Option<u16>,
) -> Result<WorkerResult> {
    ctx.limiter.penalize(host);

    if task.retry_count >= ctx.max_retries {
        task.transition(TaskState::Failed)?;
        tracing::error!(
            "Giving up on {} after {} retries: {}",
            task.url,
            task.retry_count,
            cause
        );
        return Ok(failed(&task, cause, status));
    }

    task.transition(TaskState::Retrying)?;
    task.retry_count += 1;
    tracing::warn!(
        "Retrying {} ({}), retry {}/{}",
        task.url,
        cause,
        task.retry_count,
        ctx.max_retries
    );
    task.transition(TaskState::Scheduled)?;
    Ok(WorkerResult::Retry(task))
}

fn failed(task: &CrawlTask, cause: FailureCause, status: Option<u16>) -> WorkerResult {
    let mut entry = ManifestEntry::unfetched(
        task.key(),
        task.depth,
        task.parent.clone(),
        TaskOutcome::Failed(cause),
    );
    entry.status = status;
    entry.retries = task.retry_count;

    WorkerResult::Done {
        entry,
        records: Vec::new(),
        admitted: Vec::new(),
    }
}

/// Extracts records and follows links from a Succeeded task's response
async fn complete(
    ctx: &CrawlContext,
    task: &CrawlTask,
    response: &Response,
    from_cache: bool,
) -> Result<WorkerResult> {
    let mut entry =
        ManifestEntry::unfetched(task.key(), task.depth, task.parent.clone(), TaskOutcome::Succeeded);
    entry.status = Some(response.status);
    entry.retries = task.retry_count;
    entry.from_cache = from_cache;

    let mut records = Vec::new();
    let mut admitted = Vec::new();

    if !(200..300).contains(&response.status) || !is_html(response.content_type()) {
        tracing::debug!("Not processing {}: status {}", task.url, response.status);
        return Ok(WorkerResult::Done {
            entry,
            records,
            admitted,
        });
    }

    let body = response.text();

    if !ctx.extractor.is_empty() {
        for result in ctx.extractor.extract_items(&body, task.key()) {
            match result {
                Ok(record) => records.push(record),
                Err(e) => {
                    tracing::warn!("Extraction failed for {}: {}", task.url, e);
                    entry.extraction_errors.push(e);
                }
            }
        }
        entry.records = records.len();
    }

    if task.depth < ctx.max_depth {
        let base = Url::parse(&response.final_url).unwrap_or_else(|_| task.url.clone());
        let links: Vec<Url> = discover_links(&body, &base)
            .into_iter()
            .filter(|link| ctx.scope.allows(link))
            .collect();
        tracing::trace!("Found {} in-scope links on {}", links.len(), task.url);

        for link in links {
            if let Some(a) = admit(ctx, link, task.depth + 1, Some(task.key().to_string())).await? {
                admitted.push(a);
            }
        }
    }

    Ok(WorkerResult::Done {
        entry,
        records,
        admitted,
    })
}
