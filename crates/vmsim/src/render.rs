//! Text and JSON renderers for the introspection commands.

use std::io::Write;
use std::path::Path;

use anyhow::Result;
use colored::*;
use serde::Serialize;
use types::{Access, FaultCause, NR_PDES_PER_PAGE, NR_PTES_PER_PAGE, Pfn, Pid, Vpn};
use vm::{PageTable, Stats, TlbEntry};

/// Output format selected on the command line.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum Format {
    #[default]
    Text,
    Json,
}

#[derive(Debug, Clone, Serialize)]
pub struct PteView {
    pub pd: usize,
    pub pte: usize,
    pub vpn: u32,
    pub valid: bool,
    pub perms: String,
    pub original: String,
    pub pfn: u32,
}

#[derive(Debug, Clone, Serialize)]
pub struct PageTableView {
    pub pid: Pid,
    pub directories: usize,
    pub entries: Vec<PteView>,
}

#[derive(Debug, Clone, Serialize)]
pub struct FrameView {
    pub pfn: u32,
    pub mapcount: u32,
}

#[derive(Debug, Clone, Serialize)]
pub struct TlbView {
    pub vpn: u32,
    pub pfn: u32,
    pub perms: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct FaultsView {
    pub directory_absent: u64,
    pub entry_invalid: u64,
    pub copy_on_write: u64,
    pub permission_violation: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct StatsView {
    pub tlb_hits: u64,
    pub tlb_misses: u64,
    pub walks: u64,
    pub failed_walks: u64,
    pub faults: FaultsView,
    pub repaired: u64,
    pub cow_copies: u64,
    pub frames_allocated: u64,
    pub frames_freed: u64,
    pub switches: u64,
    pub forks: u64,
}

impl From<&Stats> for StatsView {
    fn from(stats: &Stats) -> Self {
        Self {
            tlb_hits: stats.tlb_hits,
            tlb_misses: stats.tlb_misses,
            walks: stats.walks,
            failed_walks: stats.failed_walks,
            faults: FaultsView {
                directory_absent: stats.faults_of(FaultCause::DirectoryAbsent),
                entry_invalid: stats.faults_of(FaultCause::EntryInvalid),
                copy_on_write: stats.faults_of(FaultCause::CopyOnWrite),
                permission_violation: stats.faults_of(FaultCause::PermissionViolation),
            },
            repaired: stats.repaired,
            cow_copies: stats.cow_copies,
            frames_allocated: stats.frames_allocated,
            frames_freed: stats.frames_freed,
            switches: stats.switches,
            forks: stats.forks,
        }
    }
}

/// Page table of `pid`. Invalid entries are listed only when `verbose`.
pub fn page_table<W: Write>(
    out: &mut W,
    format: Format,
    pid: Pid,
    table: &PageTable,
    verbose: bool,
) -> Result<()> {
    match format {
        Format::Text => {
            writeln!(out)?;
            writeln!(out, "*** PID {} ***", pid)?;
            for pd in (0..NR_PDES_PER_PAGE).filter(|pd| table.has_directory(*pd)) {
                for index in 0..NR_PTES_PER_PAGE {
                    let Some(pte) = table.resolve(Vpn::from_indices(pd, index)) else {
                        continue;
                    };
                    if !verbose && !pte.valid {
                        continue;
                    }
                    let valid = if pte.valid { 'v' } else { ' ' };
                    let r = if pte.valid && pte.perms.allows(Access::Read) {
                        'r'
                    } else {
                        ' '
                    };
                    let w = if pte.perms.can_write() { 'w' } else { ' ' };
                    writeln!(out, "{:02}:{:02} | {} {}{} | {:<3}", pd, index, valid, r, w, pte.pfn)?;
                }
                writeln!(out)?;
            }
        }
        Format::Json => {
            let entries = table
                .entries()
                .filter(|(_, pte)| verbose || pte.valid)
                .map(|(vpn, pte)| PteView {
                    pd: vpn.pd_index(),
                    pte: vpn.pte_index(),
                    vpn: vpn.as_u32(),
                    valid: pte.valid,
                    perms: pte.perms.to_string(),
                    original: pte.original.to_string(),
                    pfn: pte.pfn.as_u32(),
                })
                .collect();
            let view = PageTableView {
                pid,
                directories: table.directory_count(),
                entries,
            };
            writeln!(out, "{}", serde_json::to_string(&view)?)?;
        }
    }
    Ok(())
}

/// Frames with a non-zero mapcount.
pub fn frames<W: Write>(out: &mut W, format: Format, in_use: &[(Pfn, u32)]) -> Result<()> {
    match format {
        Format::Text => {
            for (pfn, count) in in_use {
                writeln!(out, "{:>3}: {}", pfn, count)?;
            }
            writeln!(out)?;
        }
        Format::Json => {
            let view: Vec<FrameView> = in_use
                .iter()
                .map(|(pfn, mapcount)| FrameView {
                    pfn: pfn.as_u32(),
                    mapcount: *mapcount,
                })
                .collect();
            writeln!(out, "{}", serde_json::to_string(&view)?)?;
        }
    }
    Ok(())
}

pub fn tlb<W: Write>(out: &mut W, format: Format, entries: &[TlbEntry]) -> Result<()> {
    match format {
        Format::Text => {
            for entry in entries {
                writeln!(out, "{} | {:>3} -> {:<3}", entry.perms, entry.vpn, entry.pfn)?;
            }
        }
        Format::Json => {
            let view: Vec<TlbView> = entries
                .iter()
                .map(|entry| TlbView {
                    vpn: entry.vpn.as_u32(),
                    pfn: entry.pfn.as_u32(),
                    perms: entry.perms.to_string(),
                })
                .collect();
            writeln!(out, "{}", serde_json::to_string(&view)?)?;
        }
    }
    Ok(())
}

pub fn stats<W: Write>(out: &mut W, format: Format, stats: &Stats) -> Result<()> {
    let view = StatsView::from(stats);
    match format {
        Format::Text => {
            writeln!(out, "tlb        : {} hits, {} misses", view.tlb_hits, view.tlb_misses)?;
            writeln!(out, "walks      : {} ({} failed)", view.walks, view.failed_walks)?;
            for cause in FaultCause::ALL {
                writeln!(out, "fault      : {} x{}", cause, stats.faults_of(cause))?;
            }
            writeln!(out, "repaired   : {} ({} copies)", view.repaired, view.cow_copies)?;
            writeln!(
                out,
                "frames     : {} allocated, {} freed",
                view.frames_allocated, view.frames_freed
            )?;
            writeln!(out, "switches   : {} ({} forks)", view.switches, view.forks)?;
        }
        Format::Json => {
            writeln!(out, "{}", serde_json::to_string(&view)?)?;
        }
    }
    Ok(())
}

/// Start-up text. Nothing when `quiet`; a trace file gets a single line,
/// an interactive session gets the full banner.
pub fn banner<W: Write>(out: &mut W, quiet: bool, trace: Option<&Path>) -> Result<()> {
    if quiet {
        return Ok(());
    }
    if let Some(path) = trace {
        writeln!(out, "Use file \"{}\" for input.", path.display())?;
        return Ok(());
    }
    writeln!(out, "{}", "*******************************************************".blue())?;
    writeln!(out, "{}", "            V M     S I M U L A T O R".bold())?;
    writeln!(out, "{}", "*******************************************************".blue())?;
    writeln!(out, "Use stdin for input.")?;
    writeln!(out, "Type 'help' or '?' for help.")?;
    writeln!(out)?;
    Ok(())
}
