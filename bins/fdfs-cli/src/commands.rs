//! Subcommands and their handlers.

use std::path::PathBuf;

use anyhow::Context;
use clap::Subcommand;
use fdfs_client::{Client, DownloadContent, DownloadFileResponse, UploadFileResponse};
use serde::Serialize;

use crate::output::Printer;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Upload a local file.
    Upload {
        path: PathBuf,
        /// Create an appender file that can be extended with `append`.
        #[arg(long)]
        appender: bool,
    },

    /// Upload a local file as a slave of an existing file.
    UploadSlave {
        path: PathBuf,
        /// File id of the master file.
        master: String,
        /// Suffix added to the master's name, e.g. `_150x150`.
        prefix: String,
    },

    /// Append a local file to an appender file.
    Append { path: PathBuf, file_id: String },

    /// Download a file to a local path.
    Download {
        file_id: String,
        path: PathBuf,
        #[arg(long, default_value_t = 0)]
        offset: u64,
        /// Bytes to read; 0 reads to the end.
        #[arg(long, default_value_t = 0)]
        size: u64,
    },

    /// Write a file's content to stdout.
    Cat {
        file_id: String,
        #[arg(long, default_value_t = 0)]
        offset: u64,
        #[arg(long, default_value_t = 0)]
        size: u64,
    },

    Delete { file_id: String },
}

#[derive(Serialize)]
struct Uploaded {
    group_name: String,
    remote_file_id: String,
}

impl From<UploadFileResponse> for Uploaded {
    fn from(rsp: UploadFileResponse) -> Self {
        Self {
            group_name: rsp.group_name,
            remote_file_id: rsp.remote_file_id,
        }
    }
}

#[derive(Serialize)]
struct Downloaded {
    remote_file_id: String,
    path: Option<PathBuf>,
    size: u64,
}

impl From<DownloadFileResponse> for Downloaded {
    fn from(rsp: DownloadFileResponse) -> Self {
        let path = match rsp.content {
            DownloadContent::File(path) => Some(path),
            DownloadContent::Buffer(_) => None,
        };
        Self {
            remote_file_id: rsp.remote_file_id,
            path,
            size: rsp.download_size,
        }
    }
}

#[derive(Serialize)]
struct Done<'a> {
    file_id: &'a str,
    result: &'static str,
}

impl Command {
    pub async fn run(self, client: &Client, printer: &mut Printer) -> anyhow::Result<()> {
        match self {
            Command::Upload { path, appender } => {
                let rsp = if appender {
                    client.upload_appender_by_filename(&path).await?
                } else {
                    client.upload_by_filename(&path).await?
                };
                printer.print(&Uploaded::from(rsp))?;
            }
            Command::UploadSlave {
                path,
                master,
                prefix,
            } => {
                let rsp = client
                    .upload_slave_by_filename(&path, &master, &prefix)
                    .await?;
                printer.print(&Uploaded::from(rsp))?;
            }
            Command::Append { path, file_id } => {
                client.append_by_filename(&path, &file_id).await?;
                printer.print(&Done {
                    file_id: &file_id,
                    result: "appended",
                })?;
            }
            Command::Download {
                file_id,
                path,
                offset,
                size,
            } => {
                let rsp = client
                    .download_to_file(&path, &file_id, offset, size)
                    .await?;
                printer.print(&Downloaded::from(rsp))?;
            }
            Command::Cat {
                file_id,
                offset,
                size,
            } => {
                let rsp = client.download_to_buffer(&file_id, offset, size).await?;
                if let DownloadContent::Buffer(data) = rsp.content {
                    use std::io::Write;
                    let mut stdout = std::io::stdout().lock();
                    stdout.write_all(&data).context("writing to stdout")?;
                    stdout.flush()?;
                }
            }
            Command::Delete { file_id } => {
                client.delete_file(&file_id).await?;
                printer.print(&Done {
                    file_id: &file_id,
                    result: "deleted",
                })?;
            }
        }
        Ok(())
    }
}
