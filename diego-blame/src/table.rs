use crate::types::InstanceStatRecord;
use human_bytes::human_bytes;
use itertools::Itertools;
use std::borrow::Cow;
use std::io::{self, Write};
use tabwriter::TabWriter;

pub const TABWRITER_HEADER: &str = "app name/instance\tState\tHost:Port\tOrg\tSpace\tDisk-Usage\tDisk-Quota\tMem-Usage\tMem-Quota\tCPU-Usage\tUptime\tURIs";

impl InstanceStatRecord {
    pub(crate) fn tabwriter_writeln<W: Write>(&self, w: &mut W) -> Result<(), io::Error> {
        writeln!(
            w,
            "{name}\t{state}\t{host_port}\t{org}\t{space}\t{disk_usage}\t{disk_quota}\t{mem_usage}\t{mem_quota}\t{cpu_p:.02}%\t{uptime}\t{uris}",
            name = cell(&self.name_and_index()),
            state = cell(self.state.as_str()),
            host_port = cell(&self.host_port()),
            org = cell(&self.org_name),
            space = cell(&self.space_name),
            disk_usage = human_bytes(self.disk_used as f64),
            disk_quota = human_bytes(self.disk_quota as f64),
            mem_usage = human_bytes(self.mem_used as f64),
            mem_quota = human_bytes(self.mem_quota as f64),
            cpu_p = self.cpu * 100.0,
            uptime = format_uptime(self.uptime_secs),
            uris = cell(&self.uris.iter().join(", ")),
        )
    }
}

/// Write the header and one aligned row per record, in the given order
pub fn render<W: Write>(records: &[InstanceStatRecord], out: W) -> io::Result<()> {
    let mut tw = TabWriter::new(out).padding(2);
    writeln!(tw, "{TABWRITER_HEADER}")?;
    for record in records {
        record.tabwriter_writeln(&mut tw)?;
    }
    tw.flush()
}

// Stray tabs or newlines in API-provided strings would break the columns
fn cell(s: &str) -> Cow<'_, str> {
    if s.contains(['\t', '\n', '\r']) {
        Cow::Owned(s.replace(['\t', '\n', '\r'], " "))
    } else {
        Cow::Borrowed(s)
    }
}

pub fn format_uptime(secs: u64) -> String {
    let days = secs / 86400;
    let hours = (secs % 86400) / 3600;
    let mins = (secs % 3600) / 60;

    if days > 0 {
        format!("{days}d {hours}h {mins}m")
    } else if hours > 0 {
        format!("{hours}h {mins}m")
    } else {
        format!("{mins}m")
    }
}
