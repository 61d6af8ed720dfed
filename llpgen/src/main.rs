use std::{
    env,
    fs::{self, File},
    io::{Read, Write, stderr, stdin},
    path::Path,
    process,
};

use getopts::Options;
use llpgrammar::{Diagnostic, ErrorReport, Severity};
use llptable::{GenerateError, Generated, generate};

mod diagnostics;

use crate::diagnostics::SpannedDiagnosticFormatter;

/// Exit status when the grammar is unreadable or not LLP(1,1).
const EXIT_GRAMMAR: i32 = 1;
/// Exit status when table generation finds itself in an inconsistent state.
const EXIT_INTERNAL: i32 = 2;

/// The exit status for a failed run of [generate].
fn exit_status<StorageT>(e: &GenerateError<StorageT>) -> i32 {
    match e {
        GenerateError::GrammarParse | GenerateError::InvalidGrammar => EXIT_GRAMMAR,
        GenerateError::Internal(_) => EXIT_INTERNAL,
    }
}

fn usage(prog: &str, opts: &Options, msg: &str) -> ! {
    let path = Path::new(prog);
    let leaf = path
        .file_name()
        .and_then(|m| m.to_str())
        .unwrap_or("llpgen");
    if !msg.is_empty() {
        writeln!(stderr(), "{}", msg).ok();
    }
    let brief = format!("Usage: {} [options] <grammar.llp>", leaf);
    writeln!(stderr(), "{}", opts.usage(&brief)).ok();
    process::exit(EXIT_GRAMMAR);
}

fn read_file(path: &str) -> String {
    let mut s = String::new();
    let r = if path == "-" {
        stdin().read_to_string(&mut s)
    } else {
        File::open(path).and_then(|mut f| f.read_to_string(&mut s))
    };
    if let Err(e) = r {
        writeln!(stderr(), "Can't read {}: {}", path, e).ok();
        process::exit(EXIT_GRAMMAR);
    }
    s
}

/// Prints each diagnostic as soon as it is reported.
struct PrintingReport<'a> {
    formatter: SpannedDiagnosticFormatter<'a>,
    quiet: bool,
    errors: usize,
    warnings: usize,
}

impl ErrorReport for PrintingReport<'_> {
    fn report(&mut self, d: Diagnostic) {
        match d.severity {
            Severity::Error => self.errors += 1,
            Severity::Warning => {
                self.warnings += 1;
                if self.quiet {
                    return;
                }
            }
        }
        eprintln!("{}\n", self.formatter.format_diagnostic(&d));
    }

    fn has_errors(&self) -> bool {
        self.errors > 0
    }

    fn finish(&mut self) {
        log::info!("{} error(s), {} warning(s)", self.errors, self.warnings);
    }
}

fn main() {
    let args: Vec<String> = env::args().collect();
    let prog = &args[0];
    let mut opts = Options::new();
    opts.optflag("h", "help", "Print this help")
        .optopt("o", "output", "Write the generated Rust to FILE (default: stdout)", "FILE")
        .optflag("q", "quiet", "Don't print warnings")
        .optflagmulti("v", "verbose", "Log progress to stderr (repeat for more detail)")
        .optflag("", "verbose-grammar", "Print the grammar's productions")
        .optflag("", "verbose-sets", "Print FIRST, FOLLOW, LAST, and BEFORE sets")
        .optflag("", "verbose-ll", "Print the LL(1) table as CSV")
        .optflag("", "verbose-stacks", "Print the trailing stacks of each rule")
        .optflag("", "verbose-llp", "Print the LLP table as CSV");
    let matches = match opts.parse(&args[1..]) {
        Ok(m) => m,
        Err(f) => usage(prog, &opts, f.to_string().as_str()),
    };

    if matches.opt_present("h") {
        usage(prog, &opts, "");
    }
    if matches.free.len() != 1 {
        usage(prog, &opts, "Expected exactly one grammar file.");
    }

    env_logger::Builder::new()
        .filter_level(match matches.opt_count("v") {
            0 => log::LevelFilter::Warn,
            1 => log::LevelFilter::Info,
            2 => log::LevelFilter::Debug,
            _ => log::LevelFilter::Trace,
        })
        .format_timestamp(None)
        .init();

    let grm_path = &matches.free[0];
    let src = read_file(grm_path);
    let display_path = if grm_path == "-" { "<stdin>" } else { grm_path.as_str() };
    let formatter = match SpannedDiagnosticFormatter::new(&src, Path::new(display_path)) {
        Ok(f) => f,
        Err(()) => {
            writeln!(stderr(), "Can't index the lines of {}", display_path).ok();
            process::exit(EXIT_GRAMMAR);
        }
    };
    let mut report = PrintingReport {
        formatter,
        quiet: matches.opt_present("q"),
        errors: 0,
        warnings: 0,
    };

    let g: Generated<u32> = match generate(&src, &mut report) {
        Ok(g) => g,
        Err(e) => {
            if let GenerateError::Internal(ref ie) = e {
                writeln!(stderr(), "Internal error: {}", ie).ok();
            } else {
                writeln!(stderr(), "{}: {}", display_path, e).ok();
            }
            process::exit(exit_status(&e));
        }
    };

    if matches.opt_present("verbose-grammar") {
        eprintln!("Grammar:\n{}", g.grammar.pp());
    }
    if matches.opt_present("verbose-sets") {
        eprintln!("Terminal sets:\n{}", g.sets.pp(&g.grammar));
    }
    if matches.opt_present("verbose-ll") {
        eprintln!("LL(1) table:\n{}", g.ll_table.dump_csv(&g.grammar));
    }
    if matches.opt_present("verbose-stacks") {
        eprintln!("Trailing stacks:\n{}", g.stacks.pp(&g.grammar));
    }
    if matches.opt_present("verbose-llp") {
        eprintln!("LLP table:\n{}", g.llp_table.dump_csv(&g.grammar));
    }

    let out = match g.tables.to_rust() {
        Ok(s) => s,
        Err(e) => {
            writeln!(stderr(), "{}: {}", display_path, e).ok();
            process::exit(EXIT_GRAMMAR);
        }
    };
    let written = match matches.opt_str("o") {
        Some(p) => fs::write(&p, out),
        None => std::io::stdout().write_all(out.as_bytes()),
    };
    if let Err(e) = written {
        writeln!(stderr(), "Can't write output: {}", e).ok();
        process::exit(EXIT_GRAMMAR);
    }
}

#[cfg(test)]
mod test {
    use llpgrammar::{Diagnostics, TIdx};
    use llptable::{GenerateError, InternalError, InternalErrorKind, generate};

    use super::{EXIT_GRAMMAR, EXIT_INTERNAL, exit_status};

    fn status(src: &str) -> i32 {
        let mut diags = Diagnostics::new();
        match generate::<u32>(src, &mut diags) {
            Ok(_) => 0,
            Err(e) => exit_status(&e),
        }
    }

    #[test]
    fn test_exit_status() {
        assert_eq!(
            status("%start S; %left_delim '('; %right_delim ')'; S -> '(' E ')'; E -> 'a';"),
            0
        );
        assert_eq!(status("%start S; %left_delim '('; S -> '(' X ')'"), EXIT_GRAMMAR);
        assert_eq!(
            status(
                "%start S; %left_delim '('; %right_delim ')';
                 S -> '(' E ')'; E [E1] -> 'a'; E [E2] -> 'a' 'b';"
            ),
            EXIT_GRAMMAR
        );
        let internal = GenerateError::Internal(InternalError {
            kind: InternalErrorKind::StackExhausted {
                lookahead: TIdx(0u32),
            },
        });
        assert_eq!(exit_status(&internal), EXIT_INTERNAL);
    }
}
