use crate::http::{is_partial, ObjectOps};
use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
pub struct DownloadTask {
    item_id: String,
    url: String,
    output: PathBuf,
}
impl DownloadTask {
    pub fn new(item_id: &str, url: &str, output: &Path) -> Self {
        DownloadTask {
            item_id: item_id.to_string(),
            url: url.to_string(),
            output: output.to_path_buf(),
        }
    }

    /// Task writing the file named by the last path segment of `url` into `dir`.
    pub fn into_dir(item_id: &str, url: &str, dir: &Path) -> Result<Self> {
        let parsed = url::Url::parse(url)?;
        let file_name = parsed
            .path_segments()
            .and_then(|mut segments| segments.next_back())
            .filter(|name| !name.is_empty())
            .ok_or(anyhow!("No file name in download url: {}", url))?;
        Ok(Self::new(item_id, url, &dir.join(file_name)))
    }

    pub fn output(&self) -> &Path {
        &self.output
    }
}

#[derive(Deserialize, Serialize, Debug, Default, PartialEq)]
pub struct DownloadPlan {
    tasks: Vec<DownloadTask>,
}

impl DownloadPlan {
    pub fn new(tasks: Vec<DownloadTask>) -> Self {
        Self { tasks }
    }

    pub fn tasks(&self) -> &[DownloadTask] {
        &self.tasks
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    pub fn read<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        let plan: Self = serde_json::from_str(&content)?;
        Ok(plan)
    }

    pub fn write<P: AsRef<Path>>(self: &Self, path: P) -> Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        fs::write(path, content)?;
        Ok(())
    }

    pub async fn execute(self: &Self, remote: &impl ObjectOps) -> Result<()> {
        for task in self.tasks.iter() {
            info!("Downloading item {} to {}", task.item_id, task.output.display());
            try_download(remote, &task.url, &task.output).await?;
        }
        Ok(())
    }
}

pub async fn try_download(remote: &impl ObjectOps, url: &str, output: &Path) -> Result<()> {
    // Check if the output file already exists; return early if so
    if output.exists() {
        info!("Output file already exists: {}", output.display());
        return Ok(());
    }

    // Make parent directories as necessary
    if let Some(parent_dir) = output.parent() {
        if !parent_dir.as_os_str().is_empty() && !parent_dir.exists() {
            fs::create_dir_all(parent_dir)?;
        }
    }

    // Check if partial file exists and get its size
    let mut partial = output.as_os_str().to_owned();
    partial.push(".partial");
    let partial = PathBuf::from(partial);
    let mut partial_file = OpenOptions::new()
        .read(true)
        .create(true)
        .append(true)
        .open(&partial)?;
    let mut byte_count = partial_file.metadata()?.len();

    let total_size = remote.head_object(url).await?;

    if let Some(total_size) = total_size {
        let progress = (byte_count as f64 / total_size as f64) * 100.;
        if progress > 0.0 {
            info!("Resuming download from {:.2}% completion", progress);
        }
    }

    if total_size.map_or(true, |total| byte_count < total) {
        let mut response = remote.get_object_range(url, byte_count).await?;

        // the server ignored the range; start over
        if byte_count > 0 && !is_partial(&response) {
            debug!("Range request not honoured, restarting {}", output.display());
            partial_file.set_len(0)?;
            byte_count = 0;
        }

        while let Some(bytes) = response.chunk().await? {
            partial_file.write_all(&bytes)?;
            byte_count += bytes.len() as u64;
        }
    }

    info!("Download complete ({} bytes)", byte_count);
    // Rename the file to remove .partial suffix
    fs::rename(partial, output)?;

    Ok(())
}
