use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;

use sad_docx_tools::validate::{check_document, exit_code, report_lines};

/// Check that every image reference in a .docx resolves to a relationship and a media part.
#[derive(Parser, Debug)]
#[command(name = "sad-docx-validate")]
struct Args {
    /// Path to .docx
    docx: PathBuf,
}

fn main() -> ExitCode {
    sad_docx_tools::init_logging();
    let args = Args::parse();

    let report = match check_document(&args.docx) {
        Ok(report) => report,
        Err(e) => {
            eprintln!("{}: {}", args.docx.display(), e);
            return ExitCode::from(1);
        }
    };
    for line in report_lines(&args.docx, &report) {
        println!("{line}");
    }
    ExitCode::from(exit_code(&report))
}
