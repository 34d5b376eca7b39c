use crate::config::LinkConfig;
use crate::error::{Result, SkillcError};
use crate::finding::Finding;
use crate::skill::Skill;
use crate::types::{Checker, Severity};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

// ---------------------------------------------------------------------------
// LinkOptions
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct LinkOptions {
    pub concurrency: usize,
    pub timeout: Duration,
    pub retries: u32,
    pub backoff: Duration,
    /// Overall wall-clock budget; `None` waits for every probe.
    pub budget: Option<Duration>,
    pub ignore: Vec<Regex>,
    pub user_agent: String,
}

impl LinkOptions {
    pub fn from_config(cfg: &LinkConfig) -> Result<Self> {
        let ignore = cfg
            .ignore
            .iter()
            .map(|p| {
                Regex::new(p).map_err(|e| {
                    SkillcError::InvalidConfig(format!("links.ignore pattern '{p}': {e}"))
                })
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self {
            concurrency: cfg.concurrency.max(1),
            timeout: Duration::from_millis(cfg.timeout_ms),
            retries: cfg.retries,
            backoff: Duration::from_millis(cfg.backoff_ms),
            budget: (cfg.budget_secs > 0).then(|| Duration::from_secs(cfg.budget_secs)),
            ignore,
            user_agent: cfg.user_agent.clone(),
        })
    }
}

// ---------------------------------------------------------------------------
// Report types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum LinkStatus {
    Healthy { code: u16 },
    Broken { code: u16 },
    Unreachable { error: String },
    Ignored,
    /// The budget ran out before this probe finished.
    NotChecked,
}

impl LinkStatus {
    pub fn is_failure(&self) -> bool {
        matches!(self, LinkStatus::Broken { .. } | LinkStatus::Unreachable { .. })
    }

    fn describe(&self) -> String {
        match self {
            LinkStatus::Healthy { code } | LinkStatus::Broken { code } => format!("HTTP {code}"),
            LinkStatus::Unreachable { error } => error.clone(),
            LinkStatus::Ignored => "ignored".to_string(),
            LinkStatus::NotChecked => "not checked".to_string(),
        }
    }
}

/// A rule that cites a URL.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinkRef {
    pub skill: String,
    pub rule_id: String,
    pub path: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UrlReport {
    pub url: String,
    #[serde(flatten)]
    pub status: LinkStatus,
    pub attempts: u32,
    pub references: Vec<LinkRef>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LinkReport {
    /// Every unique URL, in order of first appearance across the corpus.
    pub urls: Vec<UrlReport>,
    pub findings: Vec<Finding>,
}

impl LinkReport {
    pub fn healthy(&self) -> usize {
        self.urls
            .iter()
            .filter(|u| matches!(u.status, LinkStatus::Healthy { .. }))
            .count()
    }
}

// ---------------------------------------------------------------------------
// LinkChecker
// ---------------------------------------------------------------------------

pub struct LinkChecker {
    client: reqwest::Client,
    options: LinkOptions,
}

impl LinkChecker {
    pub fn new(options: LinkOptions) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(options.timeout)
            .redirect(reqwest::redirect::Policy::none())
            .user_agent(options.user_agent.clone())
            .build()
            .map_err(|e| SkillcError::Http(e.to_string()))?;
        Ok(Self { client, options })
    }

    /// Unique URLs (exact, case-sensitive match) with every rule citing them.
    pub fn collect(skills: &[Skill]) -> Vec<(String, Vec<LinkRef>)> {
        let mut order: Vec<(String, Vec<LinkRef>)> = Vec::new();
        let mut index: HashMap<String, usize> = HashMap::new();
        for skill in skills {
            for rule in &skill.rules {
                for url in &rule.reference_urls {
                    let reference = LinkRef {
                        skill: skill.name.clone(),
                        rule_id: rule.id.clone(),
                        path: rule.path.display().to_string(),
                    };
                    let i = *index.entry(url.clone()).or_insert_with(|| {
                        order.push((url.clone(), Vec::new()));
                        order.len() - 1
                    });
                    if !order[i].1.contains(&reference) {
                        order[i].1.push(reference);
                    }
                }
            }
        }
        order
    }

    /// Probe every unique URL with at most `concurrency` requests in flight.
    ///
    /// Each probe has its own timeout, so one stalled host never holds up
    /// the rest. When the budget expires, unfinished probes are aborted and
    /// reported as not checked; finished results are kept.
    pub async fn check(&self, skills: &[Skill]) -> LinkReport {
        let targets = Self::collect(skills);
        let mut outcomes: Vec<Option<(LinkStatus, u32)>> = vec![None; targets.len()];

        let semaphore = Arc::new(Semaphore::new(self.options.concurrency));
        let mut set = JoinSet::new();
        for (i, (url, _)) in targets.iter().enumerate() {
            if self.options.ignore.iter().any(|re| re.is_match(url)) {
                outcomes[i] = Some((LinkStatus::Ignored, 0));
                continue;
            }
            let client = self.client.clone();
            let options = self.options.clone();
            let semaphore = semaphore.clone();
            let url = url.clone();
            set.spawn(async move {
                let Ok(_permit) = semaphore.acquire_owned().await else {
                    return (i, (LinkStatus::NotChecked, 0));
                };
                (i, probe(&client, &url, &options).await)
            });
        }

        let deadline = self
            .options
            .budget
            .map(|budget| tokio::time::Instant::now() + budget);
        loop {
            let next = match deadline {
                Some(deadline) => {
                    let waited = tokio::time::timeout_at(deadline, set.join_next()).await;
                    match waited {
                        Ok(next) => next,
                        Err(_) => {
                            tracing::warn!(
                                pending = set.len(),
                                "link check budget exhausted; aborting remaining probes"
                            );
                            set.abort_all();
                            break;
                        }
                    }
                }
                None => set.join_next().await,
            };
            match next {
                None => break,
                Some(Ok((i, outcome))) => outcomes[i] = Some(outcome),
                Some(Err(e)) => tracing::warn!(error = %e, "link probe task failed"),
            }
        }

        let mut report = LinkReport::default();
        for ((url, references), outcome) in targets.into_iter().zip(outcomes) {
            let (status, attempts) = outcome.unwrap_or((LinkStatus::NotChecked, 0));
            if let Some(finding) = finding_for(&url, &status, attempts, &references) {
                report.findings.push(finding);
            }
            report.urls.push(UrlReport {
                url,
                status,
                attempts,
                references,
            });
        }
        report
    }
}

/// Probe one URL, retrying transient failures (network errors, 5xx, 429)
/// with exponential backoff. Other 4xx answers fail at once.
async fn probe(client: &reqwest::Client, url: &str, options: &LinkOptions) -> (LinkStatus, u32) {
    let mut attempt = 0;
    loop {
        attempt += 1;
        let status = match request(client, url).await {
            Ok(code) if (200..400).contains(&code) => {
                tracing::debug!(url, code, attempt, "link healthy");
                return (LinkStatus::Healthy { code }, attempt);
            }
            Ok(code) if code == 429 || code >= 500 => LinkStatus::Broken { code },
            Ok(code) => {
                tracing::debug!(url, code, "link broken");
                return (LinkStatus::Broken { code }, attempt);
            }
            Err(e) => LinkStatus::Unreachable {
                error: e.without_url().to_string(),
            },
        };

        if attempt > options.retries {
            tracing::debug!(url, attempt, status = %status.describe(), "link failed after retries");
            return (status, attempt);
        }
        let delay = options.backoff.saturating_mul(1 << (attempt - 1).min(16));
        tokio::time::sleep(delay).await;
    }
}

/// HEAD first; servers that refuse HEAD get a GET.
async fn request(client: &reqwest::Client, url: &str) -> reqwest::Result<u16> {
    let code = client.head(url).send().await?.status().as_u16();
    if code == 405 || code == 501 {
        return Ok(client.get(url).send().await?.status().as_u16());
    }
    Ok(code)
}

/// One finding per URL, however many rules cite it.
fn finding_for(
    url: &str,
    status: &LinkStatus,
    attempts: u32,
    references: &[LinkRef],
) -> Option<Finding> {
    let (severity, message) = match status {
        LinkStatus::Broken { .. } | LinkStatus::Unreachable { .. } => (
            Severity::P2,
            format!(
                "reference URL is unhealthy ({}) after {attempts} attempt(s)",
                status.describe()
            ),
        ),
        LinkStatus::NotChecked => (
            Severity::P3,
            "reference URL was not checked within the link-check budget".to_string(),
        ),
        LinkStatus::Healthy { .. } | LinkStatus::Ignored => return None,
    };
    let first = references.first()?;
    let mut finding = Finding::new(
        severity,
        Checker::ReferenceLinkChecker,
        &first.skill,
        &first.rule_id,
        message,
    )
    .with_evidence(url);
    for r in references {
        finding = finding.with_evidence(r.path.clone());
    }
    Some(finding)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
