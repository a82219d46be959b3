/// Supported consoles and how to find tenant ids on each of them
use serde::{Deserialize, Serialize};
use url::Url;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SiteKind {
    /// Workflow-orchestration dashboard (Temporal)
    Workflow,
    /// Database console (Supabase dashboard)
    Database,
    /// Observability tool (Grafana)
    Observability,
}

impl SiteKind {
    pub const ALL: [SiteKind; 3] = [SiteKind::Workflow, SiteKind::Database, SiteKind::Observability];

    pub fn id(&self) -> &'static str {
        match self {
            SiteKind::Workflow => "workflow",
            SiteKind::Database => "database",
            SiteKind::Observability => "observability",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            SiteKind::Workflow => "Temporal workflows",
            SiteKind::Database => "Supabase database console",
            SiteKind::Observability => "Grafana",
        }
    }
}

/// Host rule: exact host, or any subdomain when written as `*.suffix`
#[derive(Debug, Clone, PartialEq)]
pub struct HostPattern {
    pub host: &'static str,
    pub port: Option<u16>,
    pub path_prefix: Option<&'static str>,
}

impl HostPattern {
    const fn host(host: &'static str) -> Self {
        HostPattern {
            host,
            port: None,
            path_prefix: None,
        }
    }

    const fn local(port: u16) -> Self {
        HostPattern {
            host: "localhost",
            port: Some(port),
            path_prefix: None,
        }
    }

    pub fn matches(&self, url: &Url) -> bool {
        let Some(host) = url.host_str() else {
            return false;
        };
        let host = host.to_lowercase();

        let host_ok = match self.host.strip_prefix("*.") {
            Some(suffix) => host
                .strip_suffix(suffix)
                .is_some_and(|rest| rest.ends_with('.')),
            None => host == self.host,
        };
        let port_ok = self.port.is_none() || url.port_or_known_default() == self.port;
        let path_ok = self
            .path_prefix
            .is_none_or(|prefix| url.path().starts_with(prefix));

        host_ok && port_ok && path_ok
    }
}

/// Everything the DOM watcher needs to know about one console
#[derive(Debug, Clone, PartialEq)]
pub struct SiteProfile {
    pub kind: SiteKind,
    pub hosts: Vec<HostPattern>,
    /// Element the watcher waits for and observes
    pub root_selector: &'static str,
    /// Elements whose text may carry tenant ids
    pub target_selectors: Vec<&'static str>,
    pub debounce_ms: i32,
    pub root_retries: u32,
    pub retry_interval_ms: i32,
    /// Label unmapped UUIDs with the unknown-tenant sentinel
    pub annotate_unknown: bool,
}

impl SiteProfile {
    pub fn for_kind(kind: SiteKind) -> SiteProfile {
        match kind {
            SiteKind::Workflow => SiteProfile {
                kind,
                hosts: vec![
                    HostPattern::host("cloud.temporal.io"),
                    HostPattern::host("*.web.tmprl.cloud"),
                    HostPattern::local(8233),
                ],
                root_selector: "main",
                target_selectors: vec![
                    "table td a",
                    "table td span",
                    "[data-testid='workflow-id']",
                    "[data-testid='namespace']",
                    "h1",
                ],
                debounce_ms: 250,
                root_retries: 20,
                retry_interval_ms: 500,
                annotate_unknown: false,
            },
            SiteKind::Database => SiteProfile {
                kind,
                hosts: vec![HostPattern {
                    host: "supabase.com",
                    port: None,
                    path_prefix: Some("/dashboard"),
                }],
                root_selector: "#__next",
                target_selectors: vec![
                    "[role='gridcell']",
                    "table td",
                    ".sql-result-cell",
                ],
                debounce_ms: 400,
                root_retries: 30,
                retry_interval_ms: 500,
                annotate_unknown: true,
            },
            SiteKind::Observability => SiteProfile {
                kind,
                hosts: vec![HostPattern::host("*.grafana.net"), HostPattern::local(3000)],
                root_selector: "#reactRoot",
                target_selectors: vec![
                    "[data-testid='data-testid table body'] [role='cell']",
                    ".log-row-message",
                    "[data-testid='data-testid Panel header title']",
                    "td",
                ],
                debounce_ms: 500,
                root_retries: 40,
                retry_interval_ms: 750,
                annotate_unknown: false,
            },
        }
    }

    pub fn all() -> Vec<SiteProfile> {
        SiteKind::ALL.iter().map(|kind| Self::for_kind(*kind)).collect()
    }

    pub fn matches(&self, url: &Url) -> bool {
        self.hosts.iter().any(|pattern| pattern.matches(url))
    }
}

/// Pick the profile for the page at `url`, if it is one of ours
pub fn detect_site(url: &str) -> Option<SiteProfile> {
    let url = Url::parse(url).ok()?;
    SiteProfile::all().into_iter().find(|profile| profile.matches(&url))
}
