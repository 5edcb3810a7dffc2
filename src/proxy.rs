// src/proxy.rs

//! Propagation of the host's proxy environment variables into image builds
//! and containers.

use std::collections::BTreeMap;

/// Proxy variables, by their lowercase name.
pub const PROXY_VARIABLES: [&str; 4] = ["http_proxy", "https_proxy", "ftp_proxy", "no_proxy"];

/// Proxy settings captured from the host environment.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProxyEnvironment {
    host: BTreeMap<String, String>,
}

impl ProxyEnvironment {
    /// Capture the proxy variables of the current process.
    pub fn from_process() -> Self {
        Self::from_vars(std::env::vars())
    }

    /// Capture the proxy variables from an arbitrary set of variables.
    pub fn from_vars<I, K, V>(vars: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let host = vars
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .filter(|(k, _)| PROXY_VARIABLES.contains(&k.to_lowercase().as_str()))
            .collect();

        Self { host }
    }

    pub fn is_empty(&self) -> bool {
        self.host.is_empty()
    }

    /// Variables to pass on, in both lowercase and uppercase form.
    ///
    /// A variable set in only one case is passed on in both. `extra_no_proxy`
    /// (typically the names of the task's containers) is appended to
    /// `no_proxy` whenever any proxy is configured at all.
    pub fn variables(&self, extra_no_proxy: &[String]) -> BTreeMap<String, String> {
        let mut out = BTreeMap::new();
        if self.host.is_empty() {
            return out;
        }

        for lower in PROXY_VARIABLES {
            let upper = lower.to_uppercase();
            let lower_value = self.host.get(lower).cloned();
            let upper_value = self.host.get(&upper).cloned();

            let (lower_value, upper_value) = match (lower_value, upper_value) {
                (Some(l), Some(u)) => (l, u),
                (Some(v), None) | (None, Some(v)) => (v.clone(), v),
                (None, None) if lower == "no_proxy" && !extra_no_proxy.is_empty() => {
                    (String::new(), String::new())
                }
                (None, None) => continue,
            };

            let (lower_value, upper_value) = if lower == "no_proxy" {
                (
                    append_entries(&lower_value, extra_no_proxy),
                    append_entries(&upper_value, extra_no_proxy),
                )
            } else {
                (lower_value, upper_value)
            };

            out.insert(lower.to_string(), lower_value);
            out.insert(upper, upper_value);
        }

        out
    }
}

fn append_entries(existing: &str, extra: &[String]) -> String {
    existing
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .chain(extra.iter().cloned())
        .collect::<Vec<_>>()
        .join(",")
}
