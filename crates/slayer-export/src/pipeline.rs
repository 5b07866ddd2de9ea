//! Export entry points and the file-save boundary

use std::collections::BTreeMap;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use slayer_codec::CharacterAnalysis;
use slayer_types::{AnnotationStore, Dot};
use tracing::{error, info, instrument, warn};

use crate::config::ExportConfig;
use crate::error::ExportError;
use crate::markup::{IdGenerator, MarkupBuilder, MarkupPage};
use crate::pdf::{DocumentAssembler, ExportObserver, ExportScope};
use crate::render::SourceDocument;
use crate::schedule::write_schedule;

/// Asks the person running the export to accept character substitutions
pub trait ConfirmationGate {
    fn confirm(&mut self, analysis: &CharacterAnalysis) -> bool;
}

impl<F> ConfirmationGate for F
where
    F: FnMut(&CharacterAnalysis) -> bool,
{
    fn confirm(&mut self, analysis: &CharacterAnalysis) -> bool {
        self(analysis)
    }
}

/// Where finished artifacts go
///
/// A save either stores the whole artifact or nothing.
pub trait ArtifactSink {
    fn save(&mut self, name: &str, bytes: &[u8]) -> io::Result<()>;
}

/// Writes artifacts into a directory via a temporary file and rename
#[derive(Debug, Clone)]
pub struct DirectorySink {
    root: PathBuf,
}

impl DirectorySink {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl ArtifactSink for DirectorySink {
    fn save(&mut self, name: &str, bytes: &[u8]) -> io::Result<()> {
        fs::create_dir_all(&self.root)?;
        let target = self.root.join(name);
        let partial = self.root.join(format!(".{}.partial", name));

        let result = fs::File::create(&partial)
            .and_then(|mut file| {
                file.write_all(bytes)?;
                file.sync_all()
            })
            .and_then(|()| fs::rename(&partial, &target));
        if result.is_err() {
            let _ = fs::remove_file(&partial);
        }
        result
    }
}

/// Keeps artifacts in memory, keyed by file name
#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    artifacts: BTreeMap<String, Vec<u8>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<&[u8]> {
        self.artifacts.get(name).map(Vec::as_slice)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.artifacts.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.artifacts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.artifacts.is_empty()
    }
}

impl ArtifactSink for MemorySink {
    fn save(&mut self, name: &str, bytes: &[u8]) -> io::Result<()> {
        self.artifacts.insert(name.to_string(), bytes.to_vec());
        Ok(())
    }
}

/// Project name made safe for use as a file name stem
pub fn file_stem(project_name: &str) -> String {
    let cleaned: String = project_name
        .trim()
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();
    if cleaned.is_empty() {
        "Mapping_Slayer".to_string()
    } else {
        cleaned
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MarkupReport {
    pub file_name: String,
    pub annotations: usize,
    /// File name of the character change log, when one was written
    pub change_log: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PdfReport {
    pub file_name: String,
    pub page_count: usize,
    pub chunk_page_counts: Vec<usize>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScheduleReport {
    pub file_name: String,
    pub rows: usize,
}

/// Runs exports against one snapshot of the project
pub struct ExportPipeline<'a> {
    store: &'a dyn AnnotationStore,
    source: Option<&'a dyn SourceDocument>,
    config: ExportConfig,
    now: DateTime<Utc>,
    id_seed: Option<u64>,
}

impl<'a> ExportPipeline<'a> {
    pub fn new(
        store: &'a dyn AnnotationStore,
        source: Option<&'a dyn SourceDocument>,
        config: ExportConfig,
    ) -> Result<Self, ExportError> {
        config.validate()?;
        Ok(Self {
            store,
            source,
            config,
            now: Utc::now(),
            id_seed: None,
        })
    }

    /// Fix the clock used for timestamps and file names
    pub fn at(mut self, now: DateTime<Utc>) -> Self {
        self.now = now;
        self
    }

    /// Generate annotation ids from a fixed seed
    pub fn with_id_seed(mut self, seed: u64) -> Self {
        self.id_seed = Some(seed);
        self
    }

    pub fn config(&self) -> &ExportConfig {
        &self.config
    }

    fn source(&self) -> Result<&'a dyn SourceDocument, ExportError> {
        self.source.ok_or(ExportError::NoSourceDocument)
    }

    fn stem(&self) -> String {
        file_stem(&self.config.project_name)
    }

    fn visible_dots(&self, source: &dyn SourceDocument) -> Vec<&'a Dot> {
        (1..=source.page_count())
            .flat_map(|page| self.store.visible_dots(page))
            .collect()
    }

    fn page_label(&self, page: u32) -> String {
        self.store
            .page_label(page)
            .map(str::to_string)
            .unwrap_or_else(|| page.to_string())
    }

    /// Vendor markup for every page, gated on character substitutions
    #[instrument(skip_all, fields(project = %self.config.project_name))]
    pub fn export_markup(
        &self,
        gate: &mut dyn ConfirmationGate,
        sink: &mut dyn ArtifactSink,
    ) -> Result<MarkupReport, ExportError> {
        self.run_markup(gate, sink).map_err(|e| {
            if !matches!(e, ExportError::Cancelled) {
                error!(error = %e, "Markup export failed");
            }
            e
        })
    }

    fn run_markup(
        &self,
        gate: &mut dyn ConfirmationGate,
        sink: &mut dyn ArtifactSink,
    ) -> Result<MarkupReport, ExportError> {
        let source = self.source()?;
        let dots = self.visible_dots(source);
        if dots.is_empty() {
            return Err(ExportError::NothingToExport);
        }

        let table = &self.config.substitutions;
        let analysis = table.analyze(dots.iter().copied());
        let change_log = if analysis.is_empty() {
            None
        } else {
            if !gate.confirm(&analysis) {
                info!(changes = analysis.changes.len(), "Character substitutions declined");
                return Err(ExportError::Cancelled);
            }
            let generated_on = self.now.format("%-m/%-d/%Y, %-I:%M:%S %p").to_string();
            let name = format!(
                "{}_Revu_Export_Character_Changes_{}.txt",
                self.stem(),
                self.now.format("%Y-%m-%dT%H%M%S")
            );
            Some((name, analysis.render_log(&self.config.project_name, &generated_on)))
        };

        let mut pages = Vec::with_capacity(source.page_count() as usize);
        for page in 1..=source.page_count() {
            let (width, height) = source
                .page_size(page)
                .map_err(|source| ExportError::Render { page, source })?;
            let dots = self
                .store
                .visible_dots(page)
                .into_iter()
                .map(|dot| table.sanitize_dot(dot))
                .collect();
            pages.push(MarkupPage {
                number: page,
                label: self.page_label(page),
                width,
                height,
                dots,
            });
        }

        let ids = match self.id_seed {
            Some(seed) => IdGenerator::seeded(seed),
            None => IdGenerator::new(),
        };
        let xml = MarkupBuilder::new(self.store, &self.config, self.now)
            .with_ids(ids)
            .build(&pages)?;

        if let Some((name, log)) = &change_log {
            sink.save(name, log.as_bytes())?;
            warn!(
                file = %name,
                changes = analysis.changes.len(),
                "Characters substituted for markup export"
            );
        }
        let file_name = format!("{}_Bluebeam.bax", self.stem());
        sink.save(&file_name, xml.as_bytes())?;
        info!(file = %file_name, annotations = dots.len(), "Markup exported");

        Ok(MarkupReport {
            file_name,
            annotations: dots.len(),
            change_log: change_log.map(|(name, _)| name),
        })
    }

    /// Paginated document for the requested scope
    #[instrument(skip_all, fields(project = %self.config.project_name, scope = ?scope))]
    pub fn export_pdf(
        &self,
        scope: ExportScope,
        observer: &mut dyn ExportObserver,
        sink: &mut dyn ArtifactSink,
    ) -> Result<PdfReport, ExportError> {
        let result = self.source().and_then(|source| {
            let created_on = self.now.format("%-m/%-d/%Y").to_string();
            DocumentAssembler::new(self.store, source, &self.config).assemble(
                scope,
                &created_on,
                observer,
            )
        });
        let assembled = result.map_err(|e| {
            error!(stage = ?e.stage(), error = %e, "PDF export failed");
            e
        })?;

        let file_name = format!("{}{}.pdf", self.stem(), scope.file_suffix(self.store));
        sink.save(&file_name, &assembled.bytes)?;
        info!(file = %file_name, pages = assembled.page_count, "PDF exported");

        Ok(PdfReport {
            file_name,
            page_count: assembled.page_count,
            chunk_page_counts: assembled.chunk_page_counts,
        })
    }

    /// Message schedule of every visible dot
    #[instrument(skip_all, fields(project = %self.config.project_name))]
    pub fn export_schedule(
        &self,
        sink: &mut dyn ArtifactSink,
    ) -> Result<ScheduleReport, ExportError> {
        let result = self.source().and_then(|source| {
            let dots = self.visible_dots(source);
            if dots.is_empty() {
                return Err(ExportError::NothingToExport);
            }
            let mut bytes = Vec::new();
            let rows = write_schedule(&mut bytes, &dots, self.store)?;
            Ok((bytes, rows))
        });
        let (bytes, rows) = result.map_err(|e| {
            error!(error = %e, "Schedule export failed");
            e
        })?;

        let file_name = format!("{}_MessageSchedule.csv", self.stem());
        sink.save(&file_name, &bytes)?;
        info!(file = %file_name, rows, "Schedule exported");
        Ok(ScheduleReport { file_name, rows })
    }
}
