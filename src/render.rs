use anyhow::{anyhow, Context, Result};
use image::RgbaImage;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::tempdir;
use tracing::debug;

/// Renders the first page of the PDF to an RGBA bitmap at the given DPI by
/// invoking an external renderer in a request-local temp directory. The
/// directory (input file and rendered page included) is removed when the
/// tempdir handle drops, on success and failure alike.
///
/// The external process is blocking and has no timeout.
pub(crate) fn render_first_page(
    pdf_bytes: &[u8],
    dpi: u32,
    command: Option<&str>,
) -> Result<RgbaImage> {
    let dir = tempdir().with_context(|| "failed to create temp dir for rendering")?;
    let input_path = dir.path().join("input.pdf");
    fs::write(&input_path, pdf_bytes).with_context(|| "failed to write temp pdf")?;

    let command = match command {
        Some(value) => value.to_string(),
        None if command_exists("pdftoppm") => "pdftoppm".to_string(),
        None if command_exists("mutool") => "mutool".to_string(),
        None => {
            return Err(anyhow!(
                "page rendering requires pdftoppm or mutool (install poppler or mupdf)"
            ));
        }
    };
    debug!("rendering page 1 at {} dpi via {}", dpi, command);

    let output = if command_is_mutool(&command) {
        Command::new(&command)
            .arg("draw")
            .arg("-r")
            .arg(dpi.to_string())
            .arg("-o")
            .arg(dir.path().join("page-%03d.png"))
            .arg(&input_path)
            .arg("1")
            .output()
            .with_context(|| format!("failed to run {}", command))?
    } else {
        Command::new(&command)
            .arg("-png")
            .arg("-r")
            .arg(dpi.to_string())
            .arg("-f")
            .arg("1")
            .arg("-l")
            .arg("1")
            .arg(&input_path)
            .arg(dir.path().join("page"))
            .output()
            .with_context(|| format!("failed to run {}", command))?
    };
    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(anyhow!("{} failed: {}", command, stderr.trim()));
    }

    let page_path = find_rendered_page(dir.path())?;
    let image = image::open(&page_path)
        .with_context(|| "failed to decode rendered page")?
        .to_rgba8();
    Ok(image)
}

fn command_is_mutool(command: &str) -> bool {
    Path::new(command)
        .file_stem()
        .and_then(|stem| stem.to_str())
        .map(|stem| stem.eq_ignore_ascii_case("mutool"))
        .unwrap_or(false)
}

fn find_rendered_page(dir: &Path) -> Result<PathBuf> {
    let mut entries: Vec<_> = fs::read_dir(dir)
        .with_context(|| "failed to read render temp directory")?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| {
            path.file_name()
                .and_then(|name| name.to_str())
                .map(|name| name.starts_with("page"))
                .unwrap_or(false)
                && path
                    .extension()
                    .and_then(|ext| ext.to_str())
                    .map(|ext| ext.eq_ignore_ascii_case("png"))
                    .unwrap_or(false)
        })
        .collect();
    entries.sort();
    entries
        .into_iter()
        .next()
        .ok_or_else(|| anyhow!("renderer produced no page image"))
}

pub(crate) fn command_exists(cmd: &str) -> bool {
    let path = Path::new(cmd);
    if path.components().count() > 1 {
        return is_executable(path);
    }

    let path_var = match env::var_os("PATH") {
        Some(value) => value,
        None => return false,
    };

    for dir in env::split_paths(&path_var) {
        if is_executable(&dir.join(cmd)) {
            return true;
        }
    }
    false
}

fn is_executable(path: &Path) -> bool {
    let metadata = match fs::metadata(path) {
        Ok(value) => value,
        Err(_) => return false,
    };
    if !metadata.is_file() {
        return false;
    }
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        metadata.permissions().mode() & 0o111 != 0
    }
    #[cfg(not(unix))]
    {
        true
    }
}
