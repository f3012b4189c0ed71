// Upload command handler: parse arguments, check the image file, ask the API
// for an upload ticket, then push the bytes. Every outcome is reported on
// `out` and mapped to a process exit code; the caller decides when to exit.

use anyhow::Context;
use clap::error::ErrorKind;
use clap::Parser;
use reqwest::Method;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::ffi::OsString;
use std::fmt::Display;
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::api::{OperationResult, Operations};
use crate::error::{UploadError, EXIT_OK, EXIT_USAGE};

pub const PLUGIN_NAME: &str = "image-upload";

/// Largest image the API accepts: 5 GiB of compressed data.
pub const MAX_UPLOAD_SIZE: u64 = 5 * 1024 * 1024 * 1024;

/// Operation that creates the image record and returns a pre-signed URL.
pub const UPLOAD_OPERATION: &str = "images/upload";

/// Upload a disk image to your account's Machine Images
#[derive(Parser, Debug)]
#[command(name = PLUGIN_NAME, version, long_about = None)]
pub struct UploadArgs {
    /// Label for the new Image. If omitted, the filename will be used.
    #[arg(long, value_name = "LABEL")]
    pub label: Option<String>,

    /// A description for this Image. Blank if omitted.
    #[arg(long, value_name = "DESC")]
    pub description: Option<String>,

    /// The region to upload the image to. Defaults to your configured default region.
    #[arg(long, value_name = "REGION")]
    pub region: Option<String>,

    /// The image file to upload. Should be a raw disk image compressed with gzip.
    #[arg(value_name = "FILE")]
    pub file: PathBuf,
}

/// Credentials plus the API capability, supplied by whoever hosts the
/// command. The handler only borrows it.
pub struct PluginContext<C> {
    pub token: String,
    pub client: C,
    pub default_region: Option<String>,
}

impl<C: Operations> PluginContext<C> {
    pub fn new(token: impl Into<String>, client: C) -> Self {
        Self {
            token: token.into(),
            client,
            default_region: None,
        }
    }

    pub fn with_default_region(mut self, region: Option<String>) -> Self {
        self.default_region = region;
        self
    }

    /// Issue one API operation authenticated with this context's token.
    pub fn call_operation(
        &self,
        method: Method,
        operation: &str,
        body: &Value,
    ) -> anyhow::Result<OperationResult> {
        self.client
            .call_operation(&self.token, method, operation, body)
    }
}

/// Body of the `images/upload` operation.
#[derive(Serialize, Debug, PartialEq)]
pub struct UploadRequest {
    pub label: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl UploadRequest {
    fn from_args(args: &UploadArgs, path: &Path, default_region: Option<&str>) -> Self {
        let label = args.label.clone().unwrap_or_else(|| {
            path.file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_else(|| args.file.display().to_string())
        });

        Self {
            label,
            region: args
                .region
                .clone()
                .or_else(|| default_region.map(str::to_string)),
            description: args.description.clone(),
        }
    }
}

#[derive(Deserialize, Debug)]
struct UploadTicket {
    upload_to: String,
    image: ImageSummary,
}

// Only `upload_to` and `image` are required; the summary fields are cosmetic.
#[derive(Deserialize, Debug)]
struct ImageSummary {
    #[serde(default)]
    id: Option<Value>,
    #[serde(default)]
    label: Option<String>,
}

/// Run the upload command and return the process exit code.
///
/// `args` excludes the program name. Help output, validation failures and
/// API errors are all written to `out`.
pub fn call<I, T, C, W>(args: I, ctx: &PluginContext<C>, out: &mut W) -> i32
where
    I: IntoIterator<Item = T>,
    T: Into<OsString>,
    C: Operations,
    W: Write,
{
    match parse_args(args, out) {
        Ok(parsed) => execute(&parsed, ctx, out),
        Err(code) => code,
    }
}

/// Parse the command line without touching configuration or the network.
///
/// Help and usage errors are written to `out`; the `Err` value is the exit
/// code to stop with (0 for help, 2 for a usage error).
pub fn parse_args<I, T, W>(args: I, out: &mut W) -> Result<UploadArgs, i32>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString>,
    W: Write,
{
    let argv = std::iter::once(OsString::from(PLUGIN_NAME)).chain(args.into_iter().map(Into::into));
    UploadArgs::try_parse_from(argv).map_err(|err| {
        report(out, &err);
        match err.kind() {
            ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => EXIT_OK,
            _ => EXIT_USAGE,
        }
    })
}

/// Run an already parsed upload and return the process exit code.
pub fn execute<C: Operations, W: Write>(
    args: &UploadArgs,
    ctx: &PluginContext<C>,
    out: &mut W,
) -> i32 {
    match run(args, ctx, out) {
        Ok(()) => EXIT_OK,
        Err(err) => {
            tracing::debug!(error = ?err, "upload command failed");
            report(out, format_args!("{err}\n"));
            err.exit_code()
        }
    }
}

/// Final messages have nowhere else to go, so a failed write is only logged.
fn report<W: Write>(out: &mut W, msg: impl Display) {
    if let Err(e) = write!(out, "{msg}") {
        tracing::debug!(error = %e, "failed to write command output");
    }
}

fn run<C: Operations, W: Write>(
    args: &UploadArgs,
    ctx: &PluginContext<C>,
    out: &mut W,
) -> Result<(), UploadError> {
    let path = expand_home(&args.file);
    let shown = path.display().to_string();
    let size = check_file(&path, &shown)?;
    tracing::debug!(path = %shown, size, "image file accepted");

    let request = UploadRequest::from_args(args, &path, ctx.default_region.as_deref());
    let body = serde_json::to_value(&request).context("Failed to encode upload request")?;
    tracing::info!(label = %request.label, region = ?request.region, "requesting upload URL");

    let (status, resp) = ctx.call_operation(Method::POST, UPLOAD_OPERATION, &body)?;
    check_status(status, resp.as_ref())?;

    let ticket: UploadTicket = resp
        .and_then(|value| serde_json::from_value(value).ok())
        .ok_or(UploadError::MalformedResponse)?;

    writeln!(out, "Uploading {}:", shown).context("Failed to write output")?;
    let (status, resp) = ctx
        .client
        .upload_image_data(&ticket.upload_to, &path, size)?;
    if !(200..300).contains(&status) {
        return Err(UploadError::Failed { status, body: resp });
    }

    let label = ticket.image.label.as_deref().unwrap_or(&request.label);
    let summary = match &ticket.image.id {
        Some(Value::String(id)) => format!("Image {} ({})", id, label),
        Some(id) if !id.is_null() => format!("Image {} ({})", id, label),
        _ => format!("Image {}", label),
    };
    writeln!(out, "Done.").context("Failed to write output")?;
    writeln!(
        out,
        "{} is being processed and will be available shortly.",
        summary
    )
    .context("Failed to write output")?;

    Ok(())
}

/// Map the status of the upload-ticket request to a terminal error, if any.
fn check_status(status: u16, body: Option<&Value>) -> Result<(), UploadError> {
    match status {
        401 => Err(UploadError::Unauthorized),
        404 => Err(UploadError::NotInBeta),
        200..=299 => Ok(()),
        _ => Err(UploadError::Failed {
            status,
            body: body.cloned(),
        }),
    }
}

/// Returns the file size when `path` is a regular file small enough to upload.
fn check_file(path: &Path, shown: &str) -> Result<u64, UploadError> {
    let meta = match std::fs::metadata(path) {
        Ok(meta) if meta.is_file() => meta,
        _ => return Err(UploadError::NoFile(shown.to_string())),
    };

    if meta.len() > MAX_UPLOAD_SIZE {
        return Err(UploadError::TooLarge(shown.to_string()));
    }

    Ok(meta.len())
}

/// Expand a leading `~` component to the user's home directory.
fn expand_home(file: &Path) -> PathBuf {
    let Ok(rest) = file.strip_prefix("~") else {
        return file.to_path_buf();
    };

    match dirs::home_dir() {
        Some(home) if rest.as_os_str().is_empty() => home,
        Some(home) => home.join(rest),
        None => file.to_path_buf(),
    }
}
