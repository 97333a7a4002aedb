use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::info;

use salesignal_common::{CorrelationRecord, PipelineError, SaleEvent, SocialPost};

pub const FEATURES_FILE: &str = "nft_features.jsonl";
pub const POSTS_FILE: &str = "raw_posts.jsonl";

/// Destination for merged records. Must accept zero-filled records.
pub trait RecordSink: Send {
    fn append(&mut self, record: &CorrelationRecord) -> Result<(), PipelineError>;

    /// Raw posts behind a record. Ignored unless the sink exports posts.
    fn append_posts(&mut self, _sale: &SaleEvent, _posts: &[SocialPost]) -> Result<(), PipelineError> {
        Ok(())
    }

    fn flush(&mut self) -> Result<(), PipelineError> {
        Ok(())
    }
}

/// One JSON object per line, appended so reruns extend the dataset.
pub struct JsonlSink {
    dir: PathBuf,
    features: BufWriter<File>,
    posts: Option<BufWriter<File>>,
    records_written: usize,
    posts_written: usize,
}

#[derive(Serialize)]
struct PostRow<'a> {
    sale_collection: &'a str,
    sale_nft_name: &'a str,
    sale_sold_at: &'a str,
    /// Negative for posts after the sale.
    hours_before_sale: f64,
    #[serde(flatten)]
    post: &'a SocialPost,
}

fn sink_error(path: &Path, err: impl std::fmt::Display) -> PipelineError {
    PipelineError::Sink(format!("{}: {err}", path.display()))
}

fn open_append(path: &Path) -> Result<BufWriter<File>, PipelineError> {
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map(BufWriter::new)
        .map_err(|e| sink_error(path, e))
}

impl JsonlSink {
    /// Open (or create) the output files under `dir`.
    pub fn create(dir: impl AsRef<Path>, export_posts: bool) -> Result<Self, PipelineError> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir).map_err(|e| sink_error(&dir, e))?;

        let features = open_append(&dir.join(FEATURES_FILE))?;
        let posts = if export_posts {
            Some(open_append(&dir.join(POSTS_FILE))?)
        } else {
            None
        };

        info!(dir = %dir.display(), export_posts, "Writing records");
        Ok(Self {
            dir,
            features,
            posts,
            records_written: 0,
            posts_written: 0,
        })
    }

    pub fn records_written(&self) -> usize {
        self.records_written
    }

    pub fn posts_written(&self) -> usize {
        self.posts_written
    }

    fn write_line<T: Serialize>(
        writer: &mut BufWriter<File>,
        path: &Path,
        value: &T,
    ) -> Result<(), PipelineError> {
        serde_json::to_writer(&mut *writer, value).map_err(|e| sink_error(path, e))?;
        writer.write_all(b"\n").map_err(|e| sink_error(path, e))
    }
}

impl RecordSink for JsonlSink {
    fn append(&mut self, record: &CorrelationRecord) -> Result<(), PipelineError> {
        let path = self.dir.join(FEATURES_FILE);
        Self::write_line(&mut self.features, &path, record)?;
        self.records_written += 1;
        Ok(())
    }

    fn append_posts(&mut self, sale: &SaleEvent, posts: &[SocialPost]) -> Result<(), PipelineError> {
        let Some(writer) = self.posts.as_mut() else {
            return Ok(());
        };
        let key = sale.key();
        let path = self.dir.join(POSTS_FILE);
        for post in posts {
            let seconds = (sale.sold_at - post.created_at).num_seconds();
            let row = PostRow {
                sale_collection: &key.collection,
                sale_nft_name: &key.name,
                sale_sold_at: &key.sold_at,
                hours_before_sale: (seconds as f64 / 36.0).round() / 100.0,
                post,
            };
            Self::write_line(writer, &path, &row)?;
            self.posts_written += 1;
        }
        Ok(())
    }

    fn flush(&mut self) -> Result<(), PipelineError> {
        self.features
            .flush()
            .map_err(|e| sink_error(&self.dir.join(FEATURES_FILE), e))?;
        if let Some(writer) = self.posts.as_mut() {
            writer
                .flush()
                .map_err(|e| sink_error(&self.dir.join(POSTS_FILE), e))?;
        }
        Ok(())
    }
}

impl Drop for JsonlSink {
    fn drop(&mut self) {
        let _ = self.flush();
    }
}
