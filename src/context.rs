//! Per-export compiler state.
//!
//! One [`CompileContext`] is created per export and threaded through every
//! builder call: the label namespace, input registry, ledger, and artifact
//! list never outlive a single compile and are never shared across exports.

use std::path::{Path, PathBuf};

use crate::{
    core::Canvas,
    error::{CinegraphError, CinegraphResult},
    gaps::FillPolicy,
    graph::FilterGraph,
    ledger::TransitionLedger,
};

#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct CompileConfig {
    pub width: u32,
    pub height: u32,
    pub fps: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fill: Option<FillPolicy>,
    /// Target end of the nominal timeline; enables trailing-gap detection.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeline_end: Option<f64>,
    /// Maximum overlay stages per FFmpeg invocation; above this the export
    /// is split into strictly sequential passes.
    #[serde(default = "default_overlay_batch")]
    pub overlay_batch_size: usize,
    /// Directory for generated artifacts (gradient images, subtitle
    /// documents, routed text files, inter-pass temporaries).
    #[serde(default = "default_temp_dir")]
    pub temp_dir: PathBuf,
}

impl CompileConfig {
    pub fn new(width: u32, height: u32, fps: u32) -> Self {
        Self {
            width,
            height,
            fps,
            fill: None,
            timeline_end: None,
            overlay_batch_size: default_overlay_batch(),
            temp_dir: default_temp_dir(),
        }
    }

    pub fn canvas(&self) -> Canvas {
        Canvas {
            width: self.width,
            height: self.height,
        }
    }

    pub fn validate(&self) -> CinegraphResult<()> {
        if self.width == 0 || self.height == 0 {
            return Err(CinegraphError::validation(
                "output width/height must be non-zero",
            ));
        }
        if !self.width.is_multiple_of(2) || !self.height.is_multiple_of(2) {
            // Default output targets yuv420p, which needs even dimensions.
            return Err(CinegraphError::validation(
                "output width/height must be even (required for yuv420p output)",
            ));
        }
        if self.fps == 0 {
            return Err(CinegraphError::validation("output fps must be non-zero"));
        }
        if self.overlay_batch_size == 0 {
            return Err(CinegraphError::validation(
                "overlay_batch_size must be at least 1",
            ));
        }
        Ok(())
    }
}

fn default_overlay_batch() -> usize {
    20
}

fn default_temp_dir() -> PathBuf {
    std::env::temp_dir().join("cinegraph")
}

#[derive(Debug, Default)]
pub struct CompileContext {
    pub graph: FilterGraph,
    pub ledger: TransitionLedger,
    inputs: Vec<PathBuf>,
    artifacts: Vec<PathBuf>,
    text_file_counter: u64,
    subtitle_doc_counter: u64,
}

impl CompileContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Context for the next render pass of the same export: fresh graph
    /// and input registry, but the ledger and artifact name counters carry
    /// over so files written by different passes never collide.
    pub fn next_pass(&self) -> Self {
        Self {
            graph: FilterGraph::new(),
            ledger: self.ledger.clone(),
            inputs: Vec::new(),
            artifacts: Vec::new(),
            text_file_counter: self.text_file_counter,
            subtitle_doc_counter: self.subtitle_doc_counter,
        }
    }

    /// Register an `-i` input, reusing the index when the same path was
    /// already added.
    pub fn add_input(&mut self, path: &Path) -> usize {
        if let Some(idx) = self.inputs.iter().position(|p| p == path) {
            return idx;
        }
        self.inputs.push(path.to_path_buf());
        self.inputs.len() - 1
    }

    pub fn inputs(&self) -> &[PathBuf] {
        &self.inputs
    }

    /// Record a generated file the caller must delete after the export.
    pub fn add_artifact(&mut self, path: PathBuf) {
        if !self.artifacts.contains(&path) {
            self.artifacts.push(path);
        }
    }

    pub fn artifacts(&self) -> &[PathBuf] {
        &self.artifacts
    }

    pub fn take_artifacts(&mut self) -> Vec<PathBuf> {
        std::mem::take(&mut self.artifacts)
    }

    /// Deterministic name for the next routed text file.
    pub fn next_text_file(&mut self, dir: &Path) -> PathBuf {
        let path = dir.join(format!("text-{}.txt", self.text_file_counter));
        self.text_file_counter += 1;
        path
    }

    /// Deterministic file stem for the next subtitle document.
    pub fn next_subtitle_stem(&mut self) -> String {
        let stem = format!("subs-{}", self.subtitle_doc_counter);
        self.subtitle_doc_counter += 1;
        stem
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inputs_are_deduplicated() {
        let mut ctx = CompileContext::new();
        assert_eq!(ctx.add_input(Path::new("a.mp4")), 0);
        assert_eq!(ctx.add_input(Path::new("b.mp4")), 1);
        assert_eq!(ctx.add_input(Path::new("a.mp4")), 0);
        assert_eq!(ctx.inputs().len(), 2);
    }

    #[test]
    fn config_rejects_odd_dimensions() {
        let mut cfg = CompileConfig::new(1281, 720, 30);
        assert!(cfg.validate().is_err());
        cfg.width = 1280;
        cfg.validate().unwrap();
    }

    #[test]
    fn text_file_names_are_sequential() {
        let mut ctx = CompileContext::new();
        let dir = Path::new("/tmp/x");
        assert_eq!(ctx.next_text_file(dir), dir.join("text-0.txt"));
        assert_eq!(ctx.next_text_file(dir), dir.join("text-1.txt"));
    }

    #[test]
    fn next_pass_carries_name_counters_and_ledger() {
        let mut ctx = CompileContext::new();
        let dir = Path::new("/tmp/x");
        ctx.next_text_file(dir);
        ctx.next_subtitle_stem();
        ctx.ledger.record(0.0, 0.0).unwrap();
        ctx.add_input(Path::new("a.mp4"));

        let mut next = ctx.next_pass();
        assert_eq!(next.next_text_file(dir), dir.join("text-1.txt"));
        assert_eq!(next.next_subtitle_stem(), "subs-1");
        assert_eq!(next.ledger.entries().len(), 1);
        assert!(next.inputs().is_empty());
        assert!(next.graph.is_empty());
    }
}
