use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use clap::Parser;

use sad_docx_tools::office::{update_fields, UpdateFieldsOptions, DEFAULT_SOFFICE};

/// Update the TOC and fields of a .docx using headless LibreOffice over UNO.
#[derive(Parser, Debug)]
#[command(name = "sad-docx-update-toc")]
struct Args {
    /// Input .docx
    input: PathBuf,

    /// Output .docx (default: overwrite input)
    #[arg(long)]
    output: Option<PathBuf>,

    #[arg(long, default_value = "127.0.0.1")]
    host: String,

    #[arg(long, default_value_t = 2002)]
    port: u16,

    /// Seconds to wait for LibreOffice to accept connections
    #[arg(long, default_value_t = 20.0)]
    timeout_s: f64,

    /// LibreOffice executable
    #[arg(long, default_value = DEFAULT_SOFFICE, env = "SOFFICE")]
    soffice: String,

    /// Python interpreter with the `uno` module
    #[arg(long, default_value = "python3", env = "SAD_UNO_PYTHON")]
    python: String,
}

fn main() -> ExitCode {
    sad_docx_tools::init_logging();
    let args = Args::parse();

    let opts = UpdateFieldsOptions {
        input: args.input,
        output: args.output,
        host: args.host,
        port: args.port,
        timeout: Duration::from_secs_f64(args.timeout_s.max(0.0)),
        soffice: args.soffice,
        python: args.python,
    };
    match update_fields(&opts) {
        Ok(_) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{e}");
            ExitCode::from(e.exit_code())
        }
    }
}
