//! Headless LibreOffice: PDF conversion and field/TOC refresh over UNO.

use std::fs;
use std::net::{TcpStream, ToSocketAddrs};
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use tempfile::TempDir;
use tracing::{debug, info, warn};
use url::Url;

use crate::error::{Result, ToolError};

pub const DEFAULT_SOFFICE: &str = "soffice";

/// Flags shared by every headless office invocation.
const HEADLESS_ARGS: &[&str] = &[
    "--headless",
    "--nologo",
    "--nolockcheck",
    "--nodefault",
    "--norestore",
    "--invisible",
];

const POLL_INTERVAL: Duration = Duration::from_millis(200);
const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

/// UNO client run by [`update_fields`]; it loads the document, updates every
/// index and field, stores it and asks the office to exit.
pub const UPDATE_FIELDS_SCRIPT: &str = include_str!("../scripts/update_toc.py");

/// Run a command to completion with its output discarded.
pub(crate) fn run_quiet(command: &mut Command) -> Result<()> {
    let program = command.get_program().to_string_lossy().into_owned();
    debug!("Running {:?}", command);
    let status = command
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => ToolError::ToolNotFound(program.clone()),
            _ => ToolError::Io(e),
        })?;
    if status.success() {
        Ok(())
    } else {
        Err(ToolError::CommandFailed { program, status })
    }
}

/// Convert a document to PDF in `out_dir`; returns the PDF path.
pub fn convert_to_pdf(soffice: &str, document: &Path, out_dir: &Path) -> Result<PathBuf> {
    fs::create_dir_all(out_dir)?;
    run_quiet(
        Command::new(soffice)
            .args(HEADLESS_ARGS)
            .arg("--convert-to")
            .arg("pdf")
            .arg(document)
            .arg("--outdir")
            .arg(out_dir),
    )?;

    let mut name = document.file_stem().unwrap_or_default().to_os_string();
    name.push(".pdf");
    let pdf = out_dir.join(name);
    if !pdf.is_file() {
        return Err(ToolError::MissingOutput {
            program: soffice.to_string(),
            path: pdf,
        });
    }
    info!("Converted {} to {}", document.display(), pdf.display());
    Ok(pdf)
}

/// Poll a TCP connect to `host:port` until it succeeds or `timeout` elapses.
pub fn wait_for_port(host: &str, port: u16, timeout: Duration) -> Result<()> {
    let deadline = Instant::now() + timeout;
    loop {
        let connected = (host, port)
            .to_socket_addrs()
            .map(|addrs| {
                addrs
                    .into_iter()
                    .any(|addr| TcpStream::connect_timeout(&addr, POLL_INTERVAL).is_ok())
            })
            .unwrap_or(false);
        if connected {
            debug!("{}:{} is accepting connections", host, port);
            return Ok(());
        }
        if Instant::now() >= deadline {
            return Err(ToolError::Timeout {
                what: format!("{host}:{port}"),
                timeout,
            });
        }
        thread::sleep(POLL_INTERVAL);
    }
}

/// A running office process, stopped on drop: given a grace period to exit
/// on its own, then killed.
struct OfficeProcess {
    child: Child,
}

impl Drop for OfficeProcess {
    fn drop(&mut self) {
        shut_down(&mut self.child, SHUTDOWN_GRACE);
    }
}

/// Give `child` up to `grace` to exit, then kill and reap it.
/// Returns whether it had to be killed.
fn shut_down(child: &mut Child, grace: Duration) -> bool {
    let deadline = Instant::now() + grace;
    while Instant::now() < deadline {
        match child.try_wait() {
            Ok(Some(_)) => return false,
            Ok(None) => thread::sleep(POLL_INTERVAL),
            Err(e) => {
                warn!("Could not poll office process: {}", e);
                break;
            }
        }
    }
    warn!("Office process still running, killing it");
    let _ = child.kill();
    let _ = child.wait();
    true
}

/// Options for [`update_fields`].
#[derive(Debug, Clone)]
pub struct UpdateFieldsOptions {
    pub input: PathBuf,
    /// Defaults to overwriting the input.
    pub output: Option<PathBuf>,
    pub host: String,
    pub port: u16,
    pub timeout: Duration,
    pub soffice: String,
    pub python: String,
}

/// Refresh the table of contents and all fields of a document by loading it
/// in a headless office listening on a local socket.
pub fn update_fields(opts: &UpdateFieldsOptions) -> Result<PathBuf> {
    if !opts.input.is_file() {
        return Err(ToolError::MissingInput(opts.input.clone()));
    }
    let input = fs::canonicalize(&opts.input)?;
    let output = match &opts.output {
        Some(path) => absolute(path)?,
        None => input.clone(),
    };

    let work = TempDir::with_prefix("sad-docx-office-")?;
    let profile = work.path().join("profile");
    fs::create_dir_all(&profile)?;
    let profile_url = Url::from_directory_path(&profile)
        .map_err(|()| std::io::Error::other(format!("not a directory path: {}", profile.display())))?;
    let script = work.path().join("update_toc.py");
    fs::write(&script, UPDATE_FIELDS_SCRIPT)?;

    let child = Command::new(&opts.soffice)
        .args(HEADLESS_ARGS)
        .arg(format!(
            "--accept=socket,host={},port={};urp;",
            opts.host, opts.port
        ))
        .arg(format!("-env:UserInstallation={profile_url}"))
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
        .map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => ToolError::ToolNotFound(opts.soffice.clone()),
            _ => ToolError::Io(e),
        })?;
    let _office = OfficeProcess { child };

    wait_for_port(&opts.host, opts.port, opts.timeout)?;
    run_quiet(
        Command::new(&opts.python)
            .arg(&script)
            .arg("--host")
            .arg(&opts.host)
            .arg("--port")
            .arg(opts.port.to_string())
            .arg("--input")
            .arg(&input)
            .arg("--output")
            .arg(&output),
    )?;
    info!("Fields updated in {}", output.display());
    Ok(output)
}

fn absolute(path: &Path) -> Result<PathBuf> {
    if path.is_absolute() {
        Ok(path.to_path_buf())
    } else {
        Ok(std::env::current_dir()?.join(path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::TcpListener;

    #[test]
    fn test_wait_for_open_port() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        wait_for_port("127.0.0.1", port, Duration::from_secs(2)).unwrap();
    }

    #[test]
    fn test_wait_for_closed_port_times_out() {
        let port = {
            let listener = TcpListener::bind("127.0.0.1:0").unwrap();
            listener.local_addr().unwrap().port()
        };
        let started = Instant::now();
        let err = wait_for_port("127.0.0.1", port, Duration::from_millis(300)).unwrap_err();
        assert!(matches!(err, ToolError::Timeout { .. }));
        assert!(started.elapsed() >= Duration::from_millis(300));
    }

    #[test]
    fn test_update_fields_requires_input() {
        let opts = UpdateFieldsOptions {
            input: PathBuf::from("/nonexistent/SAD-Final.docx"),
            output: None,
            host: "127.0.0.1".to_string(),
            port: 2002,
            timeout: Duration::from_secs(1),
            soffice: DEFAULT_SOFFICE.to_string(),
            python: "python3".to_string(),
        };
        let err = update_fields(&opts).unwrap_err();
        assert!(matches!(err, ToolError::MissingInput(_)));
        assert_eq!(err.exit_code(), 2);
    }

    #[test]
    fn test_missing_program_is_reported() {
        let err = run_quiet(&mut Command::new("sad-docx-no-such-program")).unwrap_err();
        assert!(matches!(err, ToolError::ToolNotFound(_)));
    }

    #[cfg(unix)]
    mod processes {
        use super::*;
        use crate::test_support::fake_program;
        use pretty_assertions::assert_eq;

        #[test]
        fn test_convert_without_pdf_is_missing_output() {
            let dir = TempDir::new().unwrap();
            let soffice = fake_program(dir.path(), "soffice", "exit 0");
            let doc = dir.path().join("SAD-Final.docx");
            fs::write(&doc, b"docx").unwrap();

            let out = dir.path().join("out");
            let err = convert_to_pdf(soffice.to_str().unwrap(), &doc, &out).unwrap_err();
            match err {
                ToolError::MissingOutput { path, .. } => assert_eq!(path, out.join("SAD-Final.pdf")),
                other => panic!("unexpected error: {other}"),
            }
        }

        #[test]
        fn test_convert_finds_pdf_named_after_document() {
            let dir = TempDir::new().unwrap();
            let out = dir.path().join("out");
            let soffice = fake_program(
                dir.path(),
                "soffice",
                &format!("touch '{}'", out.join("SAD.v2.pdf").display()),
            );
            let doc = dir.path().join("SAD.v2.docx");
            fs::write(&doc, b"docx").unwrap();

            let pdf = convert_to_pdf(soffice.to_str().unwrap(), &doc, &out).unwrap();
            assert_eq!(pdf, out.join("SAD.v2.pdf"));
        }

        #[test]
        fn test_convert_failure_keeps_exit_status() {
            let dir = TempDir::new().unwrap();
            let soffice = fake_program(dir.path(), "soffice", "exit 5");
            let err = convert_to_pdf(soffice.to_str().unwrap(), &dir.path().join("a.docx"), dir.path())
                .unwrap_err();
            assert!(matches!(err, ToolError::CommandFailed { .. }));
            assert_eq!(err.exit_code(), 5);
        }

        #[test]
        fn test_shut_down_kills_after_grace() {
            let mut child = Command::new("sleep").arg("30").spawn().unwrap();
            let started = Instant::now();
            assert!(shut_down(&mut child, Duration::from_millis(300)));
            let elapsed = started.elapsed();
            assert!(elapsed >= Duration::from_millis(300));
            assert!(elapsed < Duration::from_secs(10));
            assert!(child.try_wait().unwrap().is_some());
        }

        #[test]
        fn test_shut_down_leaves_exited_process_alone() {
            let mut child = Command::new("true").spawn().unwrap();
            assert!(!shut_down(&mut child, Duration::from_secs(5)));
        }
    }

    #[test]
    fn test_script_is_bundled() {
        assert!(UPDATE_FIELDS_SCRIPT.contains("getDocumentIndexes"));
    }
}
