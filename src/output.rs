use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::Path;

use anyhow::Context;
use clap::ValueEnum;
use serde::Serialize;

use crate::types::{NeighborRow, RecommendationRow, UserRecommendation};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum OutputFormat {
    /// Console listing: user, ranked neighbors, recommendation.
    #[default]
    Text,
    /// neighbors.csv and recommendations.csv in an output directory.
    Csv,
    /// One JSON object per user.
    Json,
}

pub trait ResultSink {
    fn write(&mut self, rec: &UserRecommendation) -> anyhow::Result<()>;

    fn finish(&mut self) -> anyhow::Result<()> {
        Ok(())
    }
}

pub struct TextSink<W: Write> {
    out: W,
}

impl<W: Write> TextSink<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write> ResultSink for TextSink<W> {
    fn write(&mut self, rec: &UserRecommendation) -> anyhow::Result<()> {
        writeln!(self.out, "User: {}", rec.user_id)?;
        for (rank, neighbor) in rec.neighbors.iter().enumerate() {
            writeln!(self.out, "{} {}", rank + 1, neighbor.user_id)?;
        }
        writeln!(self.out, "Recommendation: {}", rec.business_id)?;
        writeln!(self.out)?;
        Ok(())
    }

    fn finish(&mut self) -> anyhow::Result<()> {
        self.out.flush()?;
        Ok(())
    }
}

#[derive(Serialize)]
struct JsonNeighbor<'a> {
    rank: usize,
    neighbor_id: &'a str,
    score: f64,
}

#[derive(Serialize)]
struct JsonRecord<'a> {
    user_id: &'a str,
    neighbors: Vec<JsonNeighbor<'a>>,
    recommended_business_id: &'a str,
    score: f64,
}

pub struct JsonSink<W: Write> {
    out: W,
}

impl<W: Write> JsonSink<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write> ResultSink for JsonSink<W> {
    fn write(&mut self, rec: &UserRecommendation) -> anyhow::Result<()> {
        let record = JsonRecord {
            user_id: &rec.user_id,
            neighbors: rec
                .neighbors
                .iter()
                .enumerate()
                .map(|(i, n)| JsonNeighbor {
                    rank: i + 1,
                    neighbor_id: &n.user_id,
                    score: n.score,
                })
                .collect(),
            recommended_business_id: &rec.business_id,
            score: rec.score,
        };
        serde_json::to_writer(&mut self.out, &record)?;
        writeln!(self.out)?;
        Ok(())
    }

    fn finish(&mut self) -> anyhow::Result<()> {
        self.out.flush()?;
        Ok(())
    }
}

/// Two csv streams: one row per (user, rank, neighbor) and one row per
/// recommendation.
pub struct CsvSink<W: Write> {
    neighbors: csv::Writer<W>,
    recommendations: csv::Writer<W>,
}

impl<W: Write> CsvSink<W> {
    pub fn new(neighbors: W, recommendations: W) -> Self {
        Self {
            neighbors: csv::Writer::from_writer(neighbors),
            recommendations: csv::Writer::from_writer(recommendations),
        }
    }
}

impl CsvSink<BufWriter<File>> {
    pub fn create(dir: &Path) -> anyhow::Result<Self> {
        fs::create_dir_all(dir)
            .with_context(|| format!("creating output directory {}", dir.display()))?;
        let open = |name: &str| -> anyhow::Result<BufWriter<File>> {
            let path = dir.join(name);
            let file =
                File::create(&path).with_context(|| format!("creating {}", path.display()))?;
            Ok(BufWriter::new(file))
        };
        Ok(Self::new(open("neighbors.csv")?, open("recommendations.csv")?))
    }
}

impl<W: Write> ResultSink for CsvSink<W> {
    fn write(&mut self, rec: &UserRecommendation) -> anyhow::Result<()> {
        for (i, n) in rec.neighbors.iter().enumerate() {
            self.neighbors.serialize(NeighborRow {
                user_id: &rec.user_id,
                rank: i + 1,
                neighbor_id: &n.user_id,
                score: n.score,
            })?;
        }
        self.recommendations.serialize(RecommendationRow {
            user_id: &rec.user_id,
            recommended_business_id: &rec.business_id,
            score: rec.score,
        })?;
        Ok(())
    }

    fn finish(&mut self) -> anyhow::Result<()> {
        self.neighbors.flush()?;
        self.recommendations.flush()?;
        Ok(())
    }
}
