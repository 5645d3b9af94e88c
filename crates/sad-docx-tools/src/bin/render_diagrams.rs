use std::path::PathBuf;

use anyhow::{anyhow, Context};
use clap::Parser;
use tracing::info;

use sad_docx_tools::render::{
    find_mermaid_js, find_on_path, render_all, RenderOptions, BROWSER_CANDIDATES,
};

/// Render Mermaid (.mmd) diagrams to PNG with a headless Chrome/Chromium.
#[derive(Parser, Debug)]
#[command(name = "sad-docx-render-diagrams")]
struct Args {
    /// Folder containing .mmd files
    #[arg(long, default_value = "diagrams/mermaid")]
    src_dir: PathBuf,

    /// Output folder for .png files
    #[arg(long, default_value = "diagrams")]
    out_dir: PathBuf,

    /// Browser viewport width
    #[arg(long, default_value_t = 2200)]
    width: u32,

    /// Browser viewport height
    #[arg(long, default_value_t = 2000)]
    height: u32,

    /// Virtual time given to Mermaid to render
    #[arg(long, default_value_t = 5000)]
    time_budget_ms: u32,

    /// Browser executable (defaults to the first Chrome/Chromium on PATH)
    #[arg(long, env = "CHROME")]
    browser: Option<PathBuf>,

    /// mermaid.min.js to load (defaults to a copy found in editor extensions)
    #[arg(long, env = "MERMAID_JS")]
    mermaid_js: Option<PathBuf>,
}

fn main() -> anyhow::Result<()> {
    sad_docx_tools::init_logging();
    let args = Args::parse();

    let browser = args
        .browser
        .or_else(|| find_on_path(BROWSER_CANDIDATES))
        .ok_or_else(|| anyhow!("Chrome/Chromium not found on PATH (tried {})", BROWSER_CANDIDATES.join(", ")))?;
    let mermaid_js = match args.mermaid_js {
        Some(path) => path,
        None => dirs::home_dir()
            .and_then(|home| find_mermaid_js(&home))
            .ok_or_else(|| {
                anyhow!("mermaid.min.js not found; install a Mermaid-capable editor extension or pass --mermaid-js")
            })?,
    };
    info!("Browser: {}", browser.display());
    info!("Mermaid: {}", mermaid_js.display());

    let opts = RenderOptions {
        width: args.width,
        height: args.height,
        time_budget_ms: args.time_budget_ms,
    };
    let written = render_all(&browser, &mermaid_js, &args.src_dir, &args.out_dir, opts)
        .with_context(|| format!("Failed to render diagrams from {}", args.src_dir.display()))?;
    for path in written {
        println!("OK: {}", path.display());
    }
    Ok(())
}
