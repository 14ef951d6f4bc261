use std::fs::File;
use std::io::{self, BufRead, BufReader, Write};
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{ArgAction, Parser};
use colored::*;
use vmsim::{Format, Options, Runner, logger, render};

/// Paging simulator: replays a trace of alloc/free/access/switch commands
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Trace file to replay; reads stdin when omitted
    trace: Option<PathBuf>,

    /// Enable the TLB and show whether each access hit (o) or missed (x)
    #[arg(short, long)]
    tlb: bool,

    /// Run quietly: no banner, no prompt, hide invalid entries in `show`
    #[arg(short, long)]
    quiet: bool,

    /// Raise the log level (repeat for more)
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,

    /// Output format for show, frames, tlb and stats
    #[arg(long, value_enum, default_value_t = Format::Text)]
    format: Format,

    /// Verify frame reference counts after every command
    #[arg(long)]
    check: bool,

    /// Print event counters when the run ends
    #[arg(long)]
    stats: bool,

    /// PID of the initial process
    #[arg(long, default_value_t = 0)]
    init_pid: u32,
}

fn main() {
    if let Err(e) = run() {
        eprintln!("{} {:#}", "Error:".red().bold(), e);
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let args = Args::parse();
    logger::init(logger::level_for(args.verbose)).context("Failed to install logger")?;

    let input: Box<dyn BufRead> = match &args.trace {
        Some(path) => {
            let file = File::open(path)
                .with_context(|| format!("No input file {}", path.display()))?;
            Box::new(BufReader::new(file))
        }
        None => Box::new(io::stdin().lock()),
    };
    let mut stdout = io::stdout().lock();
    render::banner(&mut stdout, args.quiet, args.trace.as_deref())?;

    let options = Options {
        tlb: args.tlb,
        format: args.format,
        check: args.check,
        init_pid: args.init_pid,
        ..Options::for_input(args.quiet, args.trace.is_some())
    };
    let mut runner = Runner::new(options, stdout);
    runner.run(input, options.verbose)?;

    if args.stats {
        let stats = runner.stats();
        let out = runner.out();
        writeln!(out)?;
        writeln!(out, "{}", "Statistics".bold().green())?;
        render::stats(out, args.format, &stats)?;
    }
    Ok(())
}
