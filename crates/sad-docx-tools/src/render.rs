//! Mermaid sources rendered to PNG through a headless Chrome/Chromium.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

use image::imageops::{self, FilterType};
use image::{ImageFormat, Rgb, RgbImage};
use tempfile::TempDir;
use tracing::{debug, info, warn};
use url::Url;
use walkdir::WalkDir;

use crate::error::{Result, ToolError};
use crate::office::run_quiet;

/// Browsers tried on `PATH`, in order.
pub const BROWSER_CANDIDATES: &[&str] = &["google-chrome", "chromium", "chromium-browser"];

/// `mermaid.min.js` inside editor extensions known to bundle it, relative to home.
const KNOWN_MERMAID_PATHS: &[&str] = &[
    ".vscode/extensions/shd101wyy.markdown-preview-enhanced-0.8.20/crossnote/dependencies/mermaid/mermaid.min.js",
    ".vscode/extensions/hediet.vscode-drawio-1.9.0/drawio/src/main/webapp/js/mermaid/mermaid.min.js",
];
const EXTENSION_ROOTS: &[&str] = &[".vscode/extensions", ".vscode-server/extensions"];
const MERMAID_FILE: &str = "mermaid.min.js";

pub const CROP_PADDING: u32 = 28;
pub const MIN_WIDTH: u32 = 1600;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RenderOptions {
    /// Browser viewport.
    pub width: u32,
    pub height: u32,
    /// Virtual time the page gets for Mermaid to lay the diagram out.
    pub time_budget_ms: u32,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            width: 2200,
            height: 2000,
            time_budget_ms: 5000,
        }
    }
}

/// First executable named in `names` found on `PATH`.
pub fn find_on_path(names: &[&str]) -> Option<PathBuf> {
    let path = env::var_os("PATH")?;
    names.iter().find_map(|name| {
        env::split_paths(&path)
            .map(|dir| dir.join(name))
            .find(|candidate| candidate.is_file())
    })
}

/// Locate `mermaid.min.js` under `home`: the known extension paths first,
/// then any copy below the editor extension roots.
pub fn find_mermaid_js(home: &Path) -> Option<PathBuf> {
    if let Some(known) = KNOWN_MERMAID_PATHS
        .iter()
        .map(|rel| home.join(rel))
        .find(|p| p.is_file())
    {
        return Some(known);
    }
    EXTENSION_ROOTS
        .iter()
        .map(|root| home.join(root))
        .filter(|root| root.is_dir())
        .find_map(|root| {
            WalkDir::new(root)
                .sort_by_file_name()
                .into_iter()
                .filter_map(|entry| entry.ok())
                .find(|entry| entry.file_type().is_file() && entry.file_name() == MERMAID_FILE)
                .map(|entry| entry.into_path())
        })
}

/// `*.mmd` files directly in `dir`, sorted by name.
pub fn mermaid_sources(dir: &Path) -> Result<Vec<PathBuf>> {
    if !dir.is_dir() {
        return Err(ToolError::MissingInput(dir.to_path_buf()));
    }
    let mut sources: Vec<PathBuf> = fs::read_dir(dir)?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| p.is_file() && p.extension().is_some_and(|ext| ext == "mmd"))
        .collect();
    sources.sort();
    Ok(sources)
}

/// The page Chrome screenshots. The Mermaid source is HTML-escaped so
/// tokens like `<<interface>>` stay text.
pub fn diagram_html(code: &str, mermaid_js: &Url) -> String {
    let code = html_escape::encode_text(code);
    format!(
        r#"<!doctype html>
<html>
  <head>
    <meta charset="utf-8" />
    <meta name="viewport" content="width=device-width, initial-scale=1" />
    <style>
      html, body {{ margin: 0; padding: 0; background: #fff; }}
      .wrap {{ padding: 40px; }}
      .mermaid {{ font-family: DejaVu Sans, Arial, sans-serif; }}
    </style>
  </head>
  <body>
    <div class="wrap">
      <div class="mermaid">
{code}
      </div>
    </div>
    <script src="{mermaid_js}"></script>
    <script>
      mermaid.initialize({{ startOnLoad: true, securityLevel: "strict", theme: "default" }});
    </script>
  </body>
</html>
"#
    )
}

/// Crop to the bounding box of non-white pixels plus `padding`, clamped to
/// the image. An all-white image is returned unchanged.
pub fn crop_to_content(img: &RgbImage, padding: u32) -> RgbImage {
    let white = Rgb([255, 255, 255]);
    let mut bounds: Option<(u32, u32, u32, u32)> = None;
    for (x, y, px) in img.enumerate_pixels() {
        if *px == white {
            continue;
        }
        bounds = Some(match bounds {
            None => (x, y, x, y),
            Some((x0, y0, x1, y1)) => (x0.min(x), y0.min(y), x1.max(x), y1.max(y)),
        });
    }
    let Some((x0, y0, x1, y1)) = bounds else {
        return img.clone();
    };
    let x0 = x0.saturating_sub(padding);
    let y0 = y0.saturating_sub(padding);
    let x1 = (x1 + padding).min(img.width() - 1);
    let y1 = (y1 + padding).min(img.height() - 1);
    imageops::crop_imm(img, x0, y0, x1 - x0 + 1, y1 - y0 + 1).to_image()
}

/// Scale up (Lanczos) to `min_width` when narrower, keeping the aspect ratio.
pub fn upscale_to_min_width(img: RgbImage, min_width: u32) -> RgbImage {
    if img.width() >= min_width {
        return img;
    }
    let height = (u64::from(img.height()) * u64::from(min_width) / u64::from(img.width().max(1))) as u32;
    imageops::resize(&img, min_width, height.max(1), FilterType::Lanczos3)
}

fn screenshot(browser: &Path, page: &Url, raw_png: &Path, opts: RenderOptions) -> Result<()> {
    let mut args = vec![
        "--headless=new".to_string(),
        "--no-sandbox".to_string(),
        "--disable-gpu".to_string(),
        "--disable-dev-shm-usage".to_string(),
        "--no-first-run".to_string(),
        "--no-default-browser-check".to_string(),
        "--hide-scrollbars".to_string(),
        format!("--window-size={},{}", opts.width, opts.height),
        format!("--virtual-time-budget={}", opts.time_budget_ms),
        format!("--screenshot={}", raw_png.display()),
        page.to_string(),
    ];
    match run_quiet(Command::new(browser).args(&args)) {
        Err(ToolError::CommandFailed { .. }) => {
            // Newer headless mode crashes intermittently in some sandboxes.
            warn!("Browser failed in --headless=new, retrying with --headless");
            args[0] = "--headless".to_string();
            run_quiet(Command::new(browser).args(&args))
        }
        other => other,
    }
}

/// Render one Mermaid file to `out_png`.
pub fn render_one(
    browser: &Path,
    mermaid_js: &Path,
    src: &Path,
    out_png: &Path,
    opts: RenderOptions,
) -> Result<()> {
    let code = fs::read_to_string(src)?;
    let script_url = Url::from_file_path(fs::canonicalize(mermaid_js)?)
        .map_err(|()| ToolError::MissingInput(mermaid_js.to_path_buf()))?;

    let work = TempDir::with_prefix("mermaid-render-")?;
    let page = work.path().join("diagram.html");
    let raw_png = work.path().join("raw.png");
    fs::write(&page, diagram_html(&code, &script_url))?;
    let page_url = Url::from_file_path(&page).map_err(|()| ToolError::MissingInput(page.clone()))?;

    screenshot(browser, &page_url, &raw_png, opts)?;
    if !raw_png.is_file() {
        return Err(ToolError::MissingOutput {
            program: browser.display().to_string(),
            path: raw_png,
        });
    }

    let img = image::open(&raw_png)?.to_rgb8();
    let img = upscale_to_min_width(crop_to_content(&img, CROP_PADDING), MIN_WIDTH);
    if let Some(parent) = out_png.parent() {
        fs::create_dir_all(parent)?;
    }
    img.save_with_format(out_png, ImageFormat::Png)?;
    debug!("Rendered {} ({}x{})", out_png.display(), img.width(), img.height());
    Ok(())
}

/// Render every `*.mmd` in `src_dir` to `<out_dir>/<stem>.png`.
pub fn render_all(
    browser: &Path,
    mermaid_js: &Path,
    src_dir: &Path,
    out_dir: &Path,
    opts: RenderOptions,
) -> Result<Vec<PathBuf>> {
    let sources = mermaid_sources(src_dir)?;
    if sources.is_empty() {
        return Err(ToolError::MissingInput(src_dir.join("*.mmd")));
    }
    let mut written = Vec::with_capacity(sources.len());
    for src in sources {
        let mut name = src.file_stem().unwrap_or_default().to_os_string();
        name.push(".png");
        let out = out_dir.join(name);
        render_one(browser, mermaid_js, &src, &out, opts)?;
        info!("{} -> {}", src.display(), out.display());
        written.push(out);
    }
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_html_escapes_mermaid_source() {
        let url = Url::parse("file:///opt/mermaid.min.js").unwrap();
        let html = diagram_html("classDiagram\n  class A {\n    <<interface>>\n  }\n  A --> B : a & b", &url);
        assert!(html.contains("&lt;&lt;interface&gt;&gt;"));
        assert!(html.contains("a &amp; b"));
        assert!(html.contains(r#"<script src="file:///opt/mermaid.min.js">"#));
        assert!(!html.contains("<<interface>>"));
    }

    #[test]
    fn test_crop_keeps_padding_and_clamps() {
        let mut img = RgbImage::from_pixel(200, 100, Rgb([255, 255, 255]));
        img.put_pixel(50, 40, Rgb([0, 0, 0]));
        img.put_pixel(60, 45, Rgb([0, 0, 0]));
        let cropped = crop_to_content(&img, 28);
        assert_eq!(cropped.dimensions(), (11 + 56, 6 + 56));
        assert_eq!(*cropped.get_pixel(28, 28), Rgb([0, 0, 0]));

        img.put_pixel(199, 0, Rgb([1, 2, 3]));
        let cropped = crop_to_content(&img, 28);
        assert_eq!(cropped.dimensions(), (200 - 22, 45 + 28 + 1));
    }

    #[test]
    fn test_crop_all_white_is_identity() {
        let img = RgbImage::from_pixel(10, 10, Rgb([255, 255, 255]));
        assert_eq!(crop_to_content(&img, 28), img);
    }

    #[test]
    fn test_upscale_only_when_narrow() {
        let narrow = RgbImage::new(800, 300);
        let up = upscale_to_min_width(narrow, MIN_WIDTH);
        assert_eq!(up.dimensions(), (1600, 600));

        let wide = RgbImage::new(1700, 100);
        assert_eq!(upscale_to_min_width(wide, MIN_WIDTH).dimensions(), (1700, 100));
    }

    #[test]
    fn test_mermaid_js_discovery() {
        let home = TempDir::new().unwrap();
        assert_eq!(find_mermaid_js(home.path()), None);

        let nested = home.path().join(".vscode-server/extensions/some.ext-1.0/dist");
        fs::create_dir_all(&nested).unwrap();
        fs::write(nested.join(MERMAID_FILE), "// mermaid").unwrap();
        assert_eq!(find_mermaid_js(home.path()), Some(nested.join(MERMAID_FILE)));

        let known = home.path().join(KNOWN_MERMAID_PATHS[1]);
        fs::create_dir_all(known.parent().unwrap()).unwrap();
        fs::write(&known, "// mermaid").unwrap();
        assert_eq!(find_mermaid_js(home.path()), Some(known));
    }

    #[test]
    fn test_mermaid_sources_sorted() {
        let dir = TempDir::new().unwrap();
        for name in ["b.mmd", "a.mmd", "notes.txt"] {
            fs::write(dir.path().join(name), "graph TD").unwrap();
        }
        let names: Vec<String> = mermaid_sources(dir.path())
            .unwrap()
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["a.mmd", "b.mmd"]);
        assert!(matches!(
            mermaid_sources(&dir.path().join("absent")),
            Err(ToolError::MissingInput(_))
        ));
    }

    #[cfg(unix)]
    mod browser {
        use super::*;
        use crate::test_support::{fake_program, logged_calls};
        use pretty_assertions::assert_eq;

        struct Setup {
            dir: TempDir,
            log: PathBuf,
            mermaid_js: PathBuf,
            src: PathBuf,
        }

        fn setup() -> Setup {
            let dir = TempDir::new().unwrap();
            let mermaid_js = dir.path().join(MERMAID_FILE);
            fs::write(&mermaid_js, "// mermaid").unwrap();
            let src = dir.path().join("context.mmd");
            fs::write(&src, "graph TD\n  A --> B").unwrap();
            RgbImage::from_pixel(40, 20, Rgb([255, 255, 255]))
                .save_with_format(dir.path().join("shot.png"), ImageFormat::Png)
                .unwrap();
            let log = dir.path().join("calls.log");
            Setup {
                dir,
                log,
                mermaid_js,
                src,
            }
        }

        /// A browser that logs its first argument, runs `gate`, then copies a
        /// fixed screenshot to the `--screenshot=` target.
        fn fake_browser(setup: &Setup, gate: &str) -> PathBuf {
            let body = [
                format!("echo \"$1\" >> '{}'", setup.log.display()),
                gate.to_string(),
                "for arg in \"$@\"; do".to_string(),
                "  case \"$arg\" in".to_string(),
                format!(
                    "    --screenshot=*) cp '{}' \"${{arg#--screenshot=}}\" ;;",
                    setup.dir.path().join("shot.png").display()
                ),
                "  esac".to_string(),
                "done".to_string(),
            ]
            .join("\n");
            fake_program(setup.dir.path(), "chrome", &body)
        }

        #[test]
        fn test_retries_once_with_legacy_headless() {
            let setup = setup();
            let browser = fake_browser(&setup, "[ \"$1\" = \"--headless=new\" ] && exit 1");
            let out = setup.dir.path().join("out/context.png");

            render_one(&browser, &setup.mermaid_js, &setup.src, &out, RenderOptions::default())
                .unwrap();
            assert_eq!(logged_calls(&setup.log), vec!["--headless=new", "--headless"]);
            let img = image::open(&out).unwrap();
            assert_eq!((img.width(), img.height()), (1600, 800));
        }

        #[test]
        fn test_gives_up_after_second_failure() {
            let setup = setup();
            let browser = fake_browser(&setup, "exit 1");
            let out = setup.dir.path().join("out/context.png");

            let err = render_one(&browser, &setup.mermaid_js, &setup.src, &out, RenderOptions::default())
                .unwrap_err();
            assert!(matches!(err, ToolError::CommandFailed { .. }));
            assert_eq!(logged_calls(&setup.log), vec!["--headless=new", "--headless"]);
            assert!(!out.exists());
        }

        #[test]
        fn test_first_success_is_not_retried() {
            let setup = setup();
            let browser = fake_browser(&setup, ":");
            let out = setup.dir.path().join("context.png");

            render_one(&browser, &setup.mermaid_js, &setup.src, &out, RenderOptions::default())
                .unwrap();
            assert_eq!(logged_calls(&setup.log), vec!["--headless=new"]);
        }
    }
}
