//! `rosterlink merge` / `rosterlink compare` — config-driven roster merge.

use std::path::{Path, PathBuf};

use rosterlink_config::ai::ResolvedAIConfig;
use rosterlink_config::settings::Settings;
use rosterlink_merge::config::SourceConfig;
use rosterlink_merge::model::{HeaderList, MappingOrigin, MappingType, MergeReport, MergeSources, Table};
use rosterlink_merge::{resolve_mapping, MappingCache, MergeConfig, MergeError, OfflineOracle, Oracle, Requirement};
use rosterlink_oracle::ChatOracle;

use crate::exit_codes::{EXIT_MERGE_WRITE, EXIT_USAGE};
use crate::CliError;

/// A parsed merge config plus the directory its relative paths resolve against.
struct LoadedConfig {
    config: MergeConfig,
    base_dir: PathBuf,
}

impl LoadedConfig {
    fn load(path: &Path) -> Result<Self, CliError> {
        let text = std::fs::read_to_string(path).map_err(|e| CliError {
            code: EXIT_USAGE,
            message: format!("cannot read config {}: {e}", path.display()),
            hint: None,
        })?;
        let config = MergeConfig::from_toml(&text).map_err(CliError::merge)?;
        let base_dir = path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));
        Ok(Self { config, base_dir })
    }

    fn resolve(&self, file: &str) -> PathBuf {
        let p = Path::new(file);
        if p.is_absolute() {
            p.to_path_buf()
        } else {
            self.base_dir.join(p)
        }
    }

    fn headers(&self, source: &SourceConfig) -> Result<HeaderList, MergeError> {
        let path = self.resolve(&source.file);
        rosterlink_io::extract_headers(&path, source.header_row, source.sheet.as_deref()).ok_or_else(|| {
            MergeError::ExtractionFailure {
                source: path.display().to_string(),
                reason: format!("no header labels on row {}", source.header_row + 1),
            }
        })
    }

    fn table(&self, source: &SourceConfig) -> Result<Table, MergeError> {
        let path = self.resolve(&source.file);
        rosterlink_io::read_table(&path, source.header_row, source.sheet.as_deref()).map_err(|reason| {
            MergeError::ExtractionFailure {
                source: path.display().to_string(),
                reason,
            }
        })
    }

    fn sources(&self) -> Result<MergeSources, MergeError> {
        let s = &self.config.sources;
        Ok(MergeSources {
            canonical: self.headers(&s.canonical)?,
            secondary: self.table(&s.secondary)?,
            enrichment: self.table(&s.enrichment)?,
        })
    }

    fn cache(&self, settings: &Settings, no_cache: bool) -> MappingCache {
        if no_cache {
            return MappingCache::in_memory();
        }
        let path = match self.config.cache.path.as_deref() {
            Some(p) => self.resolve(p),
            None => settings.effective_cache_path(),
        };
        log::debug!("mapping cache: {}", path.display());
        MappingCache::open(path)
    }

    fn default_output(&self) -> PathBuf {
        let dir = match self.config.output.dir.as_deref() {
            Some(d) => self.resolve(d),
            None => self
                .resolve(&self.config.sources.canonical.file)
                .parent()
                .map(Path::to_path_buf)
                .unwrap_or_else(|| self.base_dir.clone()),
        };
        let stamp = chrono::Local::now().format("%Y%m%d_%H%M%S");
        dir.join(format!("{}_{stamp}.xlsx", self.config.output.prefix))
    }

    fn title(&self) -> Option<String> {
        let canonical = &self.config.sources.canonical;
        if !self.config.output.keep_title || canonical.header_row == 0 {
            return None;
        }
        let path = self.resolve(&canonical.file);
        match rosterlink_io::read_title(&path, canonical.sheet.as_deref()) {
            Ok(title) => title,
            Err(e) => {
                log::warn!("cannot read title row of {}: {e}", path.display());
                None
            }
        }
    }
}

/// The configured classification service, or an offline stand-in when AI is
/// not set up. The stand-in still lets a warm cache carry the run.
fn build_oracle(settings: &Settings, key_label: &str) -> Box<dyn Oracle> {
    let ai = ResolvedAIConfig::from_settings(&settings.ai);
    match ChatOracle::from_config(&ai, key_label) {
        Ok(oracle) => Box::new(oracle),
        Err(e) => {
            log::info!("classification service unavailable ({e}); only cached mappings will be used");
            Box::new(OfflineOracle)
        }
    }
}

// ============================================================================
// merge
// ============================================================================

pub fn cmd_merge(
    config_path: PathBuf,
    output: Option<PathBuf>,
    no_cache: bool,
    json_output: bool,
) -> Result<(), CliError> {
    let loaded = LoadedConfig::load(&config_path)?;
    let settings = Settings::load();

    let sources = loaded.sources().map_err(CliError::merge)?;
    let mut cache = loaded.cache(&settings, no_cache);
    let oracle = build_oracle(&settings, &loaded.config.columns.natural_key);

    let (table, mut report) =
        rosterlink_merge::run(&loaded.config, &sources, &mut cache, oracle.as_ref()).map_err(CliError::merge)?;

    let output_path = output.unwrap_or_else(|| loaded.default_output());
    if let Some(parent) = output_path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|e| CliError {
            code: EXIT_MERGE_WRITE,
            message: format!("cannot create {}: {e}", parent.display()),
            hint: None,
        })?;
    }
    let options = rosterlink_io::WriteOptions { title: loaded.title() };
    rosterlink_io::write_table(&output_path, &table, &options).map_err(|e| CliError {
        code: EXIT_MERGE_WRITE,
        message: format!("cannot write {}: {e}", output_path.display()),
        hint: None,
    })?;
    report.output = Some(output_path.display().to_string());

    if json_output {
        let json = serde_json::to_string_pretty(&report)
            .map_err(|e| CliError::io(format!("JSON serialization error: {e}")))?;
        println!("{json}");
    }
    print_summary(&report);
    Ok(())
}

fn print_summary(report: &MergeReport) {
    let s = &report.stats;
    for m in &report.mappings {
        let origin = match m.origin {
            MappingOrigin::Cache => "cache",
            MappingOrigin::Oracle => "oracle",
        };
        eprintln!("mapping {}: {} columns ({})", m.mapping_type, m.mapping.len(), origin);
    }
    eprintln!(
        "merged {} rows: {} columns projected, {}/{} enrichment rows joined, {} dropped",
        s.rows, s.projected_columns, s.joined_rows, s.enrichment_rows, s.dropped_rows,
    );
    if !s.duplicate_keys.is_empty() {
        eprintln!("duplicate keys (last row won): {}", s.duplicate_keys.join(", "));
    }
    if s.dates_local + s.dates_oracle > 0 {
        eprintln!("dates normalized: {} locally, {} by oracle", s.dates_local, s.dates_oracle);
    }
    if let Some(path) = &report.output {
        eprintln!("wrote {path}");
    }
}

// ============================================================================
// compare
// ============================================================================

pub fn cmd_compare(config_path: PathBuf, pair: String, raw: bool, no_cache: bool) -> Result<(), CliError> {
    let mapping_type: MappingType = pair.parse().map_err(|_| {
        CliError::args(format!("unknown pair '{pair}'"))
            .with_hint("expected one of: 1_to_2, 1_to_3, 2_to_3")
    })?;

    let loaded = LoadedConfig::load(&config_path)?;
    let settings = Settings::load();
    let s = &loaded.config.sources;

    let (left, right) = match mapping_type {
        MappingType::CanonicalSecondary => (&s.canonical, &s.secondary),
        MappingType::CanonicalEnrichment => (&s.canonical, &s.enrichment),
        MappingType::SecondaryEnrichment => (&s.secondary, &s.enrichment),
    };
    let left = loaded.headers(left).map_err(CliError::merge)?;
    let right = loaded.headers(right).map_err(CliError::merge)?;

    let oracle = build_oracle(&settings, &loaded.config.columns.natural_key);

    if raw {
        let answer = oracle
            .classify(&left, &right, mapping_type)
            .map_err(|reason| CliError::merge(MergeError::OracleUnavailable { mapping: mapping_type, reason }))?;
        println!("{}", answer.trim_end());
        return Ok(());
    }

    let mut cache = loaded.cache(&settings, no_cache);
    let resolved = resolve_mapping(
        &mut cache,
        oracle.as_ref(),
        &left,
        &right,
        mapping_type,
        Requirement::default(),
    )
    .map_err(CliError::merge)?;

    let (left_label, right_label) = mapping_type.table_labels();
    for (source, target) in resolved.mapping.iter() {
        println!(
            "{left_label}的第{}列 ({}) 对应 {right_label}的第{}列 ({})",
            target + 1,
            left.get(target).map(String::as_str).unwrap_or(""),
            source + 1,
            right.get(source).map(String::as_str).unwrap_or(""),
        );
    }
    eprintln!(
        "{} correspondences ({})",
        resolved.mapping.len(),
        match resolved.origin {
            MappingOrigin::Cache => "cache",
            MappingOrigin::Oracle => "oracle",
        }
    );
    Ok(())
}
