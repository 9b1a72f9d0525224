use anyhow::Result;
use reqwest::Response;
use std::ffi::OsString;
use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Streams the body of `response` to `output`.
///
/// Bytes land in `<output>.partial` first and the file is renamed once the body is complete,
/// so an interrupted download never leaves a truncated file at `output`. Returns the number
/// of bytes written.
pub async fn write_response(mut response: Response, output: &Path, overwrite: bool) -> Result<u64> {
    if output.exists() && !overwrite {
        return Err(io::Error::new(
            io::ErrorKind::AlreadyExists,
            format!("{} exists", output.display()),
        )
        .into());
    }

    let partial = partial_path(output);
    let mut partial_file = File::create(&partial)?;
    let mut byte_count: u64 = 0;

    while let Some(bytes) = response.chunk().await? {
        partial_file.write_all(&bytes)?;
        byte_count += bytes.len() as u64;
    }
    partial_file.flush()?;
    drop(partial_file);
    debug!("Wrote {} bytes to {}", byte_count, partial.display());

    fs::rename(&partial, output)?;

    Ok(byte_count)
}

fn partial_path(output: &Path) -> PathBuf {
    let mut name = OsString::from(output.as_os_str());
    name.push(".partial");
    PathBuf::from(name)
}
