use std::path::Path;

use anyhow::Context;
use log::LevelFilter;
use types::{Access, Perms, Vpn};
use vmsim::trace::{parse_line, parse_number, parse_perms};
use vmsim::{Command, Flow, Format, Options, Runner, logger, render};

fn replay(options: Options, trace: &str) -> String {
    let mut runner = Runner::new(options, Vec::new());
    runner.run(trace.as_bytes(), false).unwrap();
    String::from_utf8(runner.into_inner()).unwrap()
}

/// Replay the way the binary does for the given input source.
fn replay_input(quiet: bool, from_file: bool, trace: &str) -> String {
    let options = Options::for_input(quiet, from_file);
    let mut runner = Runner::new(options, Vec::new());
    runner.run(trace.as_bytes(), options.verbose).unwrap();
    String::from_utf8(runner.into_inner()).unwrap()
}

#[test]
fn test_parse_numbers() {
    assert_eq!(parse_number("12").unwrap(), 12);
    assert_eq!(parse_number("0x1f").unwrap(), 31);
    assert_eq!(parse_number("0X1F").unwrap(), 31);
    assert_eq!(parse_number("0o17").unwrap(), 15);
    assert_eq!(parse_number("0b101").unwrap(), 5);
    assert!(parse_number("twelve").is_err());
    assert!(parse_number("-1").is_err());
    assert!(parse_number("0x").is_err());
}

#[test]
fn test_parse_perms_always_read() {
    assert_eq!(parse_perms("r"), Perms::READ);
    assert_eq!(parse_perms("w"), Perms::RW);
    assert_eq!(parse_perms("rw"), Perms::RW);
    assert_eq!(parse_perms("x"), Perms::READ);
}

#[test]
fn test_parse_commands() {
    assert_eq!(parse_line("").unwrap(), None);
    assert_eq!(parse_line("   \n").unwrap(), None);
    assert_eq!(parse_line("# alloc 1 rw").unwrap(), None);
    assert_eq!(parse_line("?").unwrap(), Some(Command::Help));
    assert_eq!(parse_line("SHOW\n").unwrap(), Some(Command::Show));
    assert_eq!(parse_line("s 0x3").unwrap(), Some(Command::Switch(3)));
    assert_eq!(parse_line("f 9").unwrap(), Some(Command::Free(Vpn(9))));
    assert_eq!(
        parse_line("a 10 W").unwrap(),
        Some(Command::Alloc {
            vpn: Vpn(10),
            perms: Perms::RW,
        })
    );
    assert_eq!(
        parse_line("access 4 rw").unwrap(),
        Some(Command::Access {
            vpn: Vpn(4),
            access: Access::Write,
        })
    );
    assert_eq!(
        parse_line("r 4").unwrap(),
        Some(Command::Access {
            vpn: Vpn(4),
            access: Access::Read,
        })
    );
    assert_eq!(
        parse_line("store 2 8 0xCAFE").unwrap(),
        Some(Command::Store {
            vpn: Vpn(2),
            offset: 8,
            data: vec![0xca, 0xfe],
        })
    );
    assert_eq!(
        parse_line("load 2 8 2").unwrap(),
        Some(Command::Load {
            vpn: Vpn(2),
            offset: 8,
            len: 2,
        })
    );
}

#[test]
fn test_parse_rejects_bad_lines() {
    let err = parse_line("frob 1").unwrap_err();
    assert_eq!(err.to_string(), "Unknown command frob");
    assert!(parse_line("alloc 3").is_err());
    assert!(parse_line("free x").is_err());
    assert!(parse_line("store 1 0 abc").is_err());
}

#[test]
fn test_alloc_access_fork_trace() {
    let trace = "\
alloc 1 rw
alloc 2 r
write 1
read 2
write 2
switch 1
write 1
free 2
free 7
frames
";
    let expected = concat!(
        "alloc   1 --> 0  \n",
        "alloc   2 --> 1  \n",
        "   1 --> 0  \n",
        "   2 --> 1  \n",
        "Unable to access 2\n",
        "   1 --> 2  \n",
        "free 2 (pfn 1)\n",
        "7 is not allocated\n",
        "  0: 1\n",
        "  1: 1\n",
        "  2: 1\n",
        "\n",
    );
    assert_eq!(replay(Options::default(), trace), expected);
}

#[test]
fn test_failed_alloc_ends_trace() {
    let trace = "alloc 1 r\nalloc 1 w\nalloc 3 r\n";
    assert_eq!(
        replay(Options::default(), trace),
        "alloc   1 --> 0  \n1 is already allocated to 0\n"
    );
}

#[test]
fn test_exit_stops() {
    assert_eq!(replay(Options::default(), "exit\nalloc 1 r\n"), "");
}

#[test]
fn test_tlb_markers() {
    let options = Options {
        tlb: true,
        ..Options::default()
    };
    let trace = "alloc 4 rw\nread 4\nread 4\nswitch 1\nread 4\n";
    assert_eq!(
        replay(options, trace),
        "alloc   4 --> 0  \nx |   4 --> 0  \no |   4 --> 0  \nx |   4 --> 0  \n"
    );
}

#[test]
fn test_show_hides_invalid_entries_unless_verbose() {
    let trace = "alloc 17 rw\nalloc 3 r\nshow\n";
    let quiet = replay(Options::default(), trace);
    assert!(quiet.ends_with("\n*** PID 0 ***\n00:03 | v r  | 1  \n\n01:01 | v rw | 0  \n\n"));

    let verbose = replay(
        Options {
            verbose: true,
            ..Options::default()
        },
        trace,
    );
    assert!(verbose.contains("00:00 |      | 0  \n"));
    assert!(verbose.contains("01:01 | v rw | 0  \n"));
}

#[test]
fn test_json_frames_and_tlb() {
    let options = Options {
        tlb: true,
        format: Format::Json,
        ..Options::default()
    };
    let out = replay(options, "alloc 0 rw\nread 0\nframes\ntlb\n");
    let lines: Vec<&str> = out.lines().collect();
    assert_eq!(lines[2], r#"[{"pfn":0,"mapcount":1}]"#);
    assert_eq!(lines[3], r#"[{"vpn":0,"pfn":0,"perms":"rw"}]"#);
}

#[test]
fn test_store_and_load() {
    let trace = "alloc 0 rw\nstore 0 4 DEADbeef\nswitch 1\nload 0 4 4\nload 0 4095 2\n";
    assert_eq!(
        replay(Options::default(), trace),
        "alloc   0 --> 0  \n\
         store 4 bytes at 0+4 (pfn 0)\n\
         load 0+4: deadbeef\n\
         2 bytes at offset 4095 cross the page end\n"
    );
}

#[test]
fn test_kill() {
    let trace = "alloc 0 rw\nswitch 1\nswitch 0\nkill 1\nkill 0\nkill 5\nframes\n";
    assert_eq!(
        replay(Options::default(), trace),
        "alloc   0 --> 0  \n\
         kill 1 (1 pages released)\n\
         pid 0 is the current process\n\
         no process with pid 5\n  0: 1\n\n"
    );
}

#[test]
fn test_unknown_command_is_skipped() {
    assert_eq!(
        replay(Options::default(), "frob\nalloc 2 r\n"),
        "Unknown command frob\nalloc   2 --> 0  \n"
    );
}

#[test]
fn test_prompt_shows_current_pid() {
    let mut runner = Runner::new(Options::default(), Vec::new());
    runner.run("switch 3\n".as_bytes(), true).unwrap();
    assert_eq!(String::from_utf8(runner.into_inner()).unwrap(), "0 >> 3 >> ");
}

#[test]
fn test_check_and_stats() {
    let options = Options {
        tlb: true,
        check: true,
        ..Options::default()
    };
    let mut runner = Runner::new(options, Vec::new());
    let trace = "alloc 0 rw\nread 0\nswitch 1\nwrite 0\ncheck\n";
    runner.run(trace.as_bytes(), false).unwrap();

    let stats = runner.stats();
    assert_eq!(stats.forks, 1);
    assert_eq!(stats.cow_copies, 1);
    assert_eq!(stats.frames_allocated, 2);
    assert!(runner.simulator().check_invariants().is_ok());
    assert!(String::from_utf8(runner.into_inner()).unwrap().ends_with("ok\n"));
}

#[test]
fn test_execute_returns_flow() {
    let mut runner = Runner::new(Options::default(), Vec::new());
    assert_eq!(runner.execute_line("alloc 1 r").unwrap(), Flow::Continue);
    assert_eq!(runner.execute_line("a 1 r").unwrap(), Flow::Stop);
    assert_eq!(runner.execute(Command::Exit).unwrap(), Flow::Stop);
}

#[test]
fn test_leading_zero_is_octal() {
    assert_eq!(parse_number("010").unwrap(), 8);
    assert_eq!(parse_number("0").unwrap(), 0);
    assert_eq!(parse_number("007").unwrap(), 7);
    assert!(parse_number("08").is_err());
    assert_eq!(
        parse_line("alloc 010 r").unwrap(),
        Some(Command::Alloc {
            vpn: Vpn(8),
            perms: Perms::READ,
        })
    );
}

#[test]
fn test_file_input_is_not_verbose() {
    assert!(!Options::for_input(false, true).verbose);
    assert!(!Options::for_input(true, false).verbose);
    assert!(Options::for_input(false, false).verbose);

    assert_eq!(
        replay_input(false, true, "alloc 1 r\nshow\n"),
        "alloc   1 --> 0  \n\n*** PID 0 ***\n00:01 | v r  | 0  \n\n"
    );
}

#[test]
fn test_stdin_prompts_even_when_piped() {
    let out = replay_input(false, false, "alloc 1 r\nswitch 2\n");
    assert_eq!(out, "0 >> alloc   1 --> 0  \n0 >> 2 >> ");
    assert_eq!(replay_input(true, false, "alloc 1 r\n"), "alloc   1 --> 0  \n");
}

#[test]
fn test_banner() {
    let mut out = Vec::new();
    render::banner(&mut out, true, None).unwrap();
    assert!(out.is_empty());

    let mut out = Vec::new();
    render::banner(&mut out, false, Some(Path::new("run.trace"))).unwrap();
    assert_eq!(String::from_utf8(out).unwrap(), "Use file \"run.trace\" for input.\n");

    let mut out = Vec::new();
    render::banner(&mut out, false, None).unwrap();
    let text = String::from_utf8(out).unwrap();
    assert!(text.contains("Use stdin for input.\n"));
    assert!(text.contains("Type 'help' or '?' for help.\n"));
}

#[test]
fn test_logger_installs_once() {
    assert_eq!(logger::level_for(0), LevelFilter::Warn);
    assert_eq!(logger::level_for(2), LevelFilter::Debug);
    assert_eq!(logger::level_for(9), LevelFilter::Trace);

    logger::init(LevelFilter::Warn).context("first install").unwrap();
    let err = logger::init(LevelFilter::Warn)
        .context("logger already installed")
        .unwrap_err();
    assert_eq!(err.to_string(), "logger already installed");
}
