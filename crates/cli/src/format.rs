//! Output formatting for archive commands.

use mpirt::archive::{ArchiveListing, InjectReport};

/// How results are printed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputMode {
    Human,
    Json,
}

impl OutputMode {
    pub fn from_flag(json: bool) -> Self {
        if json {
            OutputMode::Json
        } else {
            OutputMode::Human
        }
    }
}

pub fn format_inject_report(report: &InjectReport, mode: OutputMode) -> Result<String, serde_json::Error> {
    if mode == OutputMode::Json {
        return serde_json::to_string_pretty(report);
    }

    let mut out = format!(
        "Injected {} MPI runtime into {}\n",
        report.platform,
        report.archive.display()
    );
    for entry in &report.copied {
        out.push_str(&format!("  + {}\n", entry));
    }
    for warning in &report.warnings {
        out.push_str(&format!("  ! {}\n", warning));
    }
    out.push_str(&format!("digest: {}", report.digest));
    Ok(out)
}

pub fn format_listing(listing: &ArchiveListing, mode: OutputMode) -> Result<String, serde_json::Error> {
    if mode == OutputMode::Json {
        return serde_json::to_string_pretty(listing);
    }

    let mut out = format!("{}\n", listing.archive.display());
    for entry in &listing.entries {
        if entry.is_dir {
            out.push_str(&format!("  {:>12}  {}/\n", "", entry.path));
        } else {
            out.push_str(&format!("  {:>12}  {}\n", entry.size, entry.path));
        }
    }
    out.push_str(&format!(
        "{} file(s), {} byte(s), digest {}",
        listing.file_count(),
        listing.total_size(),
        listing.digest
    ));
    Ok(out)
}
