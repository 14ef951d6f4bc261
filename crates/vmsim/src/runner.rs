//! Executes trace commands against a [`Simulator`] and prints the results.

use std::cell::RefCell;
use std::io::{BufRead, Write};
use std::rc::Rc;

use anyhow::{Context, Result, anyhow};
use log::info;
use types::{Access, Perms, Pid, VmError, Vpn};
use vm::{Config, Simulator, Stats, StatsMeter};

use crate::render::{self, Format};
use crate::trace::{self, Command};

/// Front-end switches, mostly straight from the command line.
#[derive(Debug, Clone, Copy, Default)]
pub struct Options {
    /// Run with the TLB and mark each access as a hit (`o`) or miss (`x`).
    pub tlb: bool,
    /// Prompt before each line and list invalid entries in `show`.
    pub verbose: bool,
    pub format: Format,
    /// Audit frame accounting after every command.
    pub check: bool,
    pub init_pid: Pid,
}

impl Options {
    /// Options for reading a trace file (`from_file`) or stdin. Only an
    /// interactive stdin session is verbose: it prompts and `show` lists
    /// invalid entries.
    pub fn for_input(quiet: bool, from_file: bool) -> Self {
        Self {
            verbose: !quiet && !from_file,
            ..Self::default()
        }
    }
}

/// Whether the trace should keep going after a command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Stop,
}

pub struct Runner<W: Write> {
    sim: Simulator,
    stats: Rc<RefCell<Stats>>,
    options: Options,
    out: W,
}

impl<W: Write> Runner<W> {
    pub fn new(options: Options, out: W) -> Self {
        let config = Config::default()
            .with_tlb(options.tlb)
            .with_init_pid(options.init_pid);
        let meter = StatsMeter::default();
        let stats = meter.handle();
        Self {
            sim: Simulator::with_meter(config, Box::new(meter)),
            stats,
            options,
            out,
        }
    }

    pub fn simulator(&self) -> &Simulator {
        &self.sim
    }

    pub fn stats(&self) -> Stats {
        self.stats.borrow().clone()
    }

    pub fn out(&mut self) -> &mut W {
        &mut self.out
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    /// Feed every line of `input` through the simulator until EOF, `exit`,
    /// or a failed `alloc`. Prints `"<pid> >> "` before each line when
    /// `prompt` is set.
    pub fn run<R: BufRead>(&mut self, mut input: R, prompt: bool) -> Result<()> {
        let mut line = String::new();
        loop {
            if prompt {
                write!(self.out, "{} >> ", self.sim.current_pid())?;
                self.out.flush()?;
            }
            line.clear();
            if input.read_line(&mut line).context("failed to read trace")? == 0 {
                break;
            }
            if self.execute_line(&line)? == Flow::Stop {
                break;
            }
        }
        self.out.flush()?;
        Ok(())
    }

    /// Parse and execute one line. Malformed lines are reported and skipped.
    pub fn execute_line(&mut self, line: &str) -> Result<Flow> {
        match trace::parse_line(line) {
            Ok(Some(command)) => self.execute(command),
            Ok(None) => Ok(Flow::Continue),
            Err(err) => {
                writeln!(self.out, "{}", err)?;
                Ok(Flow::Continue)
            }
        }
    }

    /// Execute one command. Only accounting corruption and I/O failures are
    /// returned as errors; everything else is printed.
    pub fn execute(&mut self, command: Command) -> Result<Flow> {
        let flow = match command {
            Command::Exit => return Ok(Flow::Stop),
            Command::Help => {
                write!(self.out, "{}", trace::HELP)?;
                Flow::Continue
            }
            Command::Show => {
                let pid = self.sim.current_pid();
                render::page_table(
                    &mut self.out,
                    self.options.format,
                    pid,
                    self.sim.current_page_table(),
                    self.options.verbose,
                )?;
                Flow::Continue
            }
            Command::Frames => {
                render::frames(&mut self.out, self.options.format, &self.sim.frames_in_use())?;
                Flow::Continue
            }
            Command::Tlb => {
                render::tlb(&mut self.out, self.options.format, &self.sim.tlb_entries())?;
                Flow::Continue
            }
            Command::Stats => {
                let stats = self.stats();
                render::stats(&mut self.out, self.options.format, &stats)?;
                Flow::Continue
            }
            Command::Check => {
                self.sim.check_invariants().map_err(fatal)?;
                writeln!(self.out, "ok")?;
                Flow::Continue
            }
            Command::Switch(pid) => {
                let outcome = self.sim.switch(pid).map_err(fatal)?;
                info!("switch to {}: {:?}", pid, outcome);
                Flow::Continue
            }
            Command::Kill(pid) => {
                match self.sim.reap(pid) {
                    Ok(released) => {
                        writeln!(self.out, "kill {} ({} pages released)", pid, released.len())?
                    }
                    Err(err) => self.report(err)?,
                }
                Flow::Continue
            }
            Command::Alloc { vpn, perms } => self.alloc(vpn, perms)?,
            Command::Free(vpn) => {
                match self.sim.free(vpn) {
                    Ok(pfn) => writeln!(self.out, "free {} (pfn {})", vpn, pfn)?,
                    Err(err) => self.report(err)?,
                }
                Flow::Continue
            }
            Command::Access { vpn, access } => {
                self.access(vpn, access)?;
                Flow::Continue
            }
            Command::Store { vpn, offset, data } => {
                match self.sim.write_bytes(vpn, offset, &data) {
                    Ok(t) => writeln!(
                        self.out,
                        "store {} bytes at {}+{} (pfn {})",
                        data.len(),
                        vpn,
                        offset,
                        t.pfn
                    )?,
                    Err(err) => self.report(err)?,
                }
                Flow::Continue
            }
            Command::Load { vpn, offset, len } => {
                match self.sim.read_bytes(vpn, offset, len) {
                    Ok(bytes) => writeln!(self.out, "load {}+{}: {}", vpn, offset, hex::encode(bytes))?,
                    Err(err) => self.report(err)?,
                }
                Flow::Continue
            }
        };

        if self.options.check {
            self.sim.check_invariants().map_err(fatal)?;
        }
        Ok(flow)
    }

    fn alloc(&mut self, vpn: Vpn, perms: Perms) -> Result<Flow> {
        match self.sim.alloc(vpn, perms) {
            Ok(pfn) => {
                writeln!(self.out, "alloc {:>3} --> {:<3}", vpn, pfn)?;
                Ok(Flow::Continue)
            }
            Err(err) => {
                self.report(err)?;
                Ok(Flow::Stop)
            }
        }
    }

    fn access(&mut self, vpn: Vpn, access: Access) -> Result<()> {
        match self.sim.access(vpn, access) {
            Ok(t) => {
                if self.options.tlb {
                    write!(self.out, "{} |", if t.from_tlb { 'o' } else { 'x' })?;
                }
                writeln!(self.out, " {:>3} --> {:<3}", vpn, t.pfn)?;
            }
            Err(VmError::TranslationFailed { vpn, .. }) => {
                writeln!(self.out, "Unable to access {}", vpn)?;
            }
            Err(err) => self.report(err)?,
        }
        Ok(())
    }

    /// Print a recoverable error; fatal ones abort the run.
    fn report(&mut self, err: VmError) -> Result<()> {
        if err.is_fatal() {
            return Err(fatal(err));
        }
        writeln!(self.out, "{}", err)?;
        Ok(())
    }
}

fn fatal(err: VmError) -> anyhow::Error {
    anyhow!(err).context(format!("simulation halted (code {:#04x})", err.code()))
}
