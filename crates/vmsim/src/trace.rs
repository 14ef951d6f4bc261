//! Trace language: one command per line, case-insensitive.

use anyhow::{Context, Result, bail};
use types::{Access, Perms, Pid, Vpn};

/// A parsed trace command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Help,
    Exit,
    Show,
    Frames,
    Tlb,
    Stats,
    Check,
    Switch(Pid),
    Free(Vpn),
    Kill(Pid),
    Access { vpn: Vpn, access: Access },
    Alloc { vpn: Vpn, perms: Perms },
    Store { vpn: Vpn, offset: usize, data: Vec<u8> },
    Load { vpn: Vpn, offset: usize, len: usize },
}

pub const HELP: &str = "\
  help | ?     : Print out this help message
  exit         : Exit the simulation

  switch [pid] : Do context switch to pid @pid
                 Fork @pid if there is no process with the pid
  kill [pid]   : Tear down the parked process @pid
  show         : Show the page table of the current process
  frames       : Show the status for each page frame
  tlb          : Show TLB entries
  stats        : Show event counters
  check        : Audit frame reference counts

  alloc [vpn] r|w          : Allocate a page according to the rw flag
  free [vpn]               : Deallocate the page at VPN @vpn
  access [vpn] r|w         : Access VPN @vpn for read or write
  read [vpn]               : Equivalent to access @vpn r
  write [vpn]              : Equivalent to access @vpn w
  store [vpn] [off] [hex]  : Write bytes into the page at VPN @vpn
  load [vpn] [off] [len]   : Read bytes from the page at VPN @vpn
";

/// Parse one trace line. Blank lines and `#` comments yield `None`.
pub fn parse_line(line: &str) -> Result<Option<Command>> {
    let line = line.trim();
    if line.starts_with('#') {
        return Ok(None);
    }
    let line = line.to_lowercase();
    let tokens: Vec<&str> = line.split_whitespace().collect();

    let command = match tokens.as_slice() {
        [] => return Ok(None),
        ["help" | "?"] => Command::Help,
        ["exit"] => Command::Exit,
        ["show"] => Command::Show,
        ["frames"] => Command::Frames,
        ["tlb"] => Command::Tlb,
        ["stats"] => Command::Stats,
        ["check"] => Command::Check,
        ["switch" | "s", pid] => Command::Switch(parse_number(pid)?),
        ["kill", pid] => Command::Kill(parse_number(pid)?),
        ["free" | "f", vpn] => Command::Free(parse_vpn(vpn)?),
        ["read" | "r", vpn] => Command::Access {
            vpn: parse_vpn(vpn)?,
            access: Access::Read,
        },
        ["write" | "w", vpn] => Command::Access {
            vpn: parse_vpn(vpn)?,
            access: Access::Write,
        },
        ["alloc" | "a", vpn, flags] => Command::Alloc {
            vpn: parse_vpn(vpn)?,
            perms: parse_perms(flags),
        },
        ["access", vpn, flags] => Command::Access {
            vpn: parse_vpn(vpn)?,
            access: Access::from_perms(parse_perms(flags)),
        },
        ["store", vpn, offset, data] => {
            let digits = data.strip_prefix("0x").unwrap_or(data);
            Command::Store {
                vpn: parse_vpn(vpn)?,
                offset: parse_number(offset)? as usize,
                data: hex::decode(digits).with_context(|| format!("invalid hex data {}", data))?,
            }
        }
        ["load", vpn, offset, len] => Command::Load {
            vpn: parse_vpn(vpn)?,
            offset: parse_number(offset)? as usize,
            len: parse_number(len)? as usize,
        },
        [name, ..] => bail!("Unknown command {}", name),
    };
    Ok(Some(command))
}

/// Unsigned number in decimal or with a `0x`, `0o` or `0b` prefix. A bare
/// leading `0` means octal, as with C's `strtol(.., 0)`.
pub fn parse_number(token: &str) -> Result<u32> {
    let lower = token.to_ascii_lowercase();
    let (digits, radix) = if let Some(rest) = lower.strip_prefix("0x") {
        (rest, 16)
    } else if let Some(rest) = lower.strip_prefix("0o") {
        (rest, 8)
    } else if let Some(rest) = lower.strip_prefix("0b") {
        (rest, 2)
    } else if lower.len() > 1 && lower.starts_with('0') {
        (&lower[1..], 8)
    } else {
        (lower.as_str(), 10)
    };
    u32::from_str_radix(digits, radix).with_context(|| format!("invalid number {}", token))
}

fn parse_vpn(token: &str) -> Result<Vpn> {
    parse_number(token).map(Vpn)
}

/// Permission flag such as `r`, `w` or `rw`. Read access is always granted.
pub fn parse_perms(flags: &str) -> Perms {
    flags.chars().fold(Perms::READ, |perms, c| match c {
        'w' | 'W' => perms | Perms::WRITE,
        _ => perms,
    })
}
