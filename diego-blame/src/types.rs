use derive_more::{AsRef, Deref, Display, Into};
use serde::Deserialize;

/// Opaque identifier of one deployed application
#[derive(
    Clone,
    Eq,
    PartialEq,
    Ord,
    PartialOrd,
    Hash,
    Debug,
    AsRef,
    Deref,
    Display,
    Into,
    Deserialize,
)]
#[serde(try_from = "String")]
pub struct AppGuid(String);

#[derive(Debug, thiserror::Error)]
#[error("Application GUID must not be blank")]
pub struct BlankAppGuid;

impl AppGuid {
    pub fn new<T: AsRef<str>>(s: T) -> Option<Self> {
        let inner = s.as_ref().trim();
        if inner.is_empty() {
            None
        } else {
            Some(Self(inner.to_owned()))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for AppGuid {
    type Error = BlankAppGuid;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value).ok_or(BlankAppGuid)
    }
}

impl AsRef<str> for AppGuid {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug, Display)]
#[display(fmt = "{}")]
pub enum InstanceState {
    #[display(fmt = "{}", "self.as_str()")]
    Running,
    #[display(fmt = "{}", "self.as_str()")]
    Starting,
    #[display(fmt = "{}", "self.as_str()")]
    Down,
    #[display(fmt = "{}", "self.as_str()")]
    Crashed,
    #[display(fmt = "{}", "self.as_str()")]
    Other(String),
}

impl InstanceState {
    pub fn as_str(&self) -> &str {
        use InstanceState::*;
        match self {
            Running => "RUNNING",
            Starting => "STARTING",
            Down => "DOWN",
            Crashed => "CRASHED",
            Other(s) => s.as_str(),
        }
    }
}

impl From<&str> for InstanceState {
    fn from(value: &str) -> Self {
        use InstanceState::*;
        match value.to_ascii_uppercase().as_str() {
            "RUNNING" => Running,
            "STARTING" => Starting,
            "DOWN" => Down,
            "CRASHED" => Crashed,
            _ => Other(value.to_owned()),
        }
    }
}

impl From<String> for InstanceState {
    fn from(value: String) -> Self {
        InstanceState::from(value.as_str())
    }
}

/// One application instance, as reported by the statistics endpoint
#[derive(Clone, PartialEq, Debug)]
pub struct InstanceStatRecord {
    pub app_guid: AppGuid,
    pub app_name: String,
    pub instance_index: u32,
    pub state: InstanceState,
    pub host: String,
    pub port: u16,
    pub mem_used: u64,
    pub mem_quota: u64,
    pub disk_used: u64,
    pub disk_quota: u64,
    pub cpu: f64,
    pub uptime_secs: u64,
    pub uris: Vec<String>,
    pub org_name: String,
    pub space_name: String,
}

impl InstanceStatRecord {
    /// Used memory over the memory quota.
    ///
    /// A zero quota yields a ratio of zero. Used values above the quota are
    /// passed through, so the ratio can exceed one.
    pub fn mem_ratio(&self) -> f64 {
        if self.mem_quota == 0 {
            0.0
        } else {
            self.mem_used as f64 / self.mem_quota as f64
        }
    }

    pub fn host_port(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn name_and_index(&self) -> String {
        format!("{}/{}", self.app_name, self.instance_index)
    }
}

#[cfg(test)]
pub(crate) mod test_records {
    use super::*;

    pub(crate) fn record(
        name: &str,
        index: u32,
        host: &str,
        used: u64,
        quota: u64,
    ) -> InstanceStatRecord {
        InstanceStatRecord {
            app_guid: AppGuid::new(format!("{name}-guid")).unwrap(),
            app_name: name.to_owned(),
            instance_index: index,
            state: InstanceState::Running,
            host: host.to_owned(),
            port: 61000 + index as u16,
            mem_used: used,
            mem_quota: quota,
            disk_used: 0,
            disk_quota: 0,
            cpu: 0.0,
            uptime_secs: 0,
            uris: Vec::new(),
            org_name: String::new(),
            space_name: String::new(),
        }
    }
}
