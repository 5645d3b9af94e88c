use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Context;
use clap::Parser;

use sad_docx_generator::ReportContent;
use sad_docx_tools::office::DEFAULT_SOFFICE;
use sad_docx_tools::submission::{build_submission, caption_titles, SubmissionOptions};

/// Package deliverables: the final document as PDF plus renamed diagram exports, zipped.
#[derive(Parser, Debug)]
#[command(name = "sad-docx-package")]
struct Args {
    /// Input .docx
    #[arg(long, default_value = "SAD-Final.docx")]
    docx: PathBuf,

    /// Directory holding the `*-vp` diagram exports
    #[arg(long, default_value = "diagrams")]
    diagrams_dir: PathBuf,

    /// Student number of the first member
    #[arg(long)]
    student1: String,

    /// Student number of the second member
    #[arg(long)]
    student2: String,

    /// PDF title (without extension)
    #[arg(long, default_value = "سند_معماری_نرم\u{200c}افزار")]
    doc_title: String,

    /// Staging directory, recreated on every run
    #[arg(long, default_value = "dist/phase2")]
    out_dir: PathBuf,

    /// Zip archive path
    #[arg(long, default_value = "dist/phase2.zip")]
    zip: PathBuf,

    /// Report content used for diagram titles (defaults to the built-in report)
    #[arg(long, env = "SAD_CONTENT")]
    content: Option<PathBuf>,

    /// LibreOffice executable
    #[arg(long, default_value = DEFAULT_SOFFICE, env = "SOFFICE")]
    soffice: String,
}

fn run(args: Args) -> anyhow::Result<ExitCode> {
    let content = match &args.content {
        Some(path) => ReportContent::from_json_file(path)
            .with_context(|| format!("Failed to load report content from {}", path.display()))?,
        None => ReportContent::builtin().context("Built-in report content is invalid")?,
    };
    let captions = caption_titles(&content);

    let opts = SubmissionOptions {
        docx: args.docx,
        diagrams_dir: args.diagrams_dir,
        student1: args.student1,
        student2: args.student2,
        doc_title: args.doc_title,
        out_dir: args.out_dir,
        zip: args.zip,
        soffice: args.soffice,
    };
    match build_submission(&opts, &captions) {
        Ok(summary) => {
            println!("Wrote folder: {}", opts.out_dir.display());
            println!("Wrote zip: {}", summary.zip.display());
            Ok(ExitCode::SUCCESS)
        }
        Err(e) => {
            eprintln!("{e}");
            Ok(ExitCode::from(e.exit_code()))
        }
    }
}

fn main() -> anyhow::Result<ExitCode> {
    sad_docx_tools::init_logging();
    run(Args::parse())
}
