//! Package archive validation
//!
//! Validates untrusted `.h5p` zip archives before anything is written to
//! persistent storage. Structural checks (path escapes, size ceilings)
//! protect the filesystem itself and abort immediately; everything else
//! accumulates into one issue set so an uploader sees every problem in a
//! single round trip. A package with a non-empty issue set is rejected
//! wholesale; there is no partial acceptance.

use async_trait::async_trait;
use h5p_registry_core::{
    manifest, DependencyRelation, IssueKind, LibraryMetadata, LibraryName, PackageManifest,
    ValidationIssue, LIBRARY_DESCRIPTOR_FILE, PACKAGE_MANIFEST_FILE,
};
use std::collections::{BTreeMap, HashSet};
use std::io::Read;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, instrument};
use zip::ZipArchive;

use crate::error::{ServiceError, ServiceResult};

/// Top-level archive directory holding the content subtree
const CONTENT_DIR: &str = "content";

/// File extensions allowed for content assets
const CONTENT_EXTENSIONS: &[&str] = &[
    "bmp", "csv", "diff", "doc", "docx", "eot", "gif", "jpeg", "jpg", "json", "m4a", "md", "mp3",
    "mp4", "odp", "ods", "odt", "ogg", "otf", "patch", "pdf", "png", "ppt", "pptx", "rtf", "svg",
    "swf", "textile", "tif", "tiff", "ttf", "txt", "vtt", "wav", "webm", "webvtt", "woff",
    "woff2", "xls", "xlsx", "xml",
];

/// Extensions additionally allowed inside library directories
const LIBRARY_EXTENSIONS: &[&str] = &["js", "css"];

/// Size ceilings and whitelists applied to every archive
#[derive(Debug, Clone)]
pub struct ValidatorConfig {
    /// Largest single entry accepted, in bytes
    pub max_file_size: u64,

    /// Largest archive accepted (sum of uncompressed entry sizes), in bytes
    pub max_total_size: u64,

    /// Lower-case extensions accepted under `content/`
    pub content_whitelist: HashSet<String>,

    /// Lower-case extensions accepted inside library directories
    pub library_whitelist: HashSet<String>,
}

impl Default for ValidatorConfig {
    fn default() -> Self {
        let content_whitelist: HashSet<String> =
            CONTENT_EXTENSIONS.iter().map(|s| s.to_string()).collect();
        let mut library_whitelist = content_whitelist.clone();
        library_whitelist.extend(LIBRARY_EXTENSIONS.iter().map(|s| s.to_string()));
        Self {
            max_file_size: 256 * 1024 * 1024,
            max_total_size: 1024 * 1024 * 1024,
            content_whitelist,
            library_whitelist,
        }
    }
}

/// Which validation passes to run
#[derive(Debug, Clone, Copy)]
pub struct ValidationOptions {
    /// Validate candidate library directories
    pub check_libraries: bool,
    /// Validate the package manifest and content subtree
    pub check_content: bool,
}

impl Default for ValidationOptions {
    fn default() -> Self {
        Self {
            check_libraries: true,
            check_content: true,
        }
    }
}

/// Read-only view of the already-installed libraries, used to resolve
/// dependency edges that are not satisfied inside the archive itself
#[async_trait]
pub trait InstalledLibraryIndex: Send + Sync {
    /// Check whether a library is installed
    async fn is_installed(&self, library: &LibraryName) -> ServiceResult<bool>;
}

/// An index with nothing installed; every dependency must then be satisfied
/// inside the archive
pub struct NoInstalledLibraries;

#[async_trait]
impl InstalledLibraryIndex for NoInstalledLibraries {
    async fn is_installed(&self, _library: &LibraryName) -> ServiceResult<bool> {
        Ok(false)
    }
}

/// Validates untrusted package archives
pub struct PackageValidator {
    config: ValidatorConfig,
    installed: Arc<dyn InstalledLibraryIndex>,
}

impl PackageValidator {
    /// Create a validator with explicit configuration
    pub fn new(config: ValidatorConfig, installed: Arc<dyn InstalledLibraryIndex>) -> Self {
        Self { config, installed }
    }

    /// Create a validator with the default ceilings and whitelists
    pub fn with_defaults(installed: Arc<dyn InstalledLibraryIndex>) -> Self {
        Self::new(ValidatorConfig::default(), installed)
    }

    /// Validate one package archive
    ///
    /// Returns `Ok(())` only when the archive produced no issues at all.
    /// Structural problems abort with [`ServiceError::Structural`] before
    /// any descriptor is parsed; all other problems accumulate into
    /// [`ServiceError::Validation`].
    #[instrument(skip_all, fields(archive = %archive_path.display()))]
    pub async fn validate(
        &self,
        archive_path: &Path,
        options: ValidationOptions,
    ) -> ServiceResult<()> {
        let path = archive_path.to_path_buf();
        let max_file_size = self.config.max_file_size;
        let max_total_size = self.config.max_total_size;
        let scanned =
            tokio::task::spawn_blocking(move || scan_archive(&path, max_file_size, max_total_size))
                .await
                .map_err(|e| ServiceError::Archive(format!("archive scan failed: {}", e)))??;

        let mut issues = Vec::new();

        for stray in &scanned.stray_entries {
            issues.push(ValidationIssue::new(
                IssueKind::UnexpectedEntry,
                stray,
                "top-level entries must be h5p.json, content/, or a library directory",
            ));
        }

        if options.check_content {
            self.check_content(&scanned, &mut issues);
        }

        if options.check_libraries {
            self.check_libraries(&scanned, &mut issues).await?;
        }

        if issues.is_empty() {
            debug!("package accepted");
            Ok(())
        } else {
            debug!(count = issues.len(), "package rejected");
            Err(ServiceError::Validation { issues })
        }
    }

    /// Manifest and content-subtree checks
    fn check_content(&self, scanned: &ScannedArchive, issues: &mut Vec<ValidationIssue>) {
        match &scanned.manifest {
            None => issues.push(ValidationIssue::new(
                IssueKind::MissingDescriptor,
                PACKAGE_MANIFEST_FILE,
                "package manifest is required",
            )),
            Some(bytes) => match PackageManifest::from_json(bytes) {
                Err(error) => issues.push(ValidationIssue::new(
                    IssueKind::MalformedDescriptor,
                    PACKAGE_MANIFEST_FILE,
                    error.to_string(),
                )),
                Ok(parsed) => self.check_manifest(&parsed, issues),
            },
        }

        for file in &scanned.content_files {
            if !has_allowed_extension(file, &self.config.content_whitelist) {
                issues.push(ValidationIssue::new(
                    IssueKind::DisallowedExtension,
                    file,
                    "extension is not on the content whitelist",
                ));
            }
        }
    }

    fn check_manifest(&self, parsed: &PackageManifest, issues: &mut Vec<ValidationIssue>) {
        if parsed.main_library.is_empty() {
            issues.push(ValidationIssue::new(
                IssueKind::ManifestField,
                PACKAGE_MANIFEST_FILE,
                "mainLibrary must not be empty",
            ));
        } else if parsed.main_library_dependency().is_none() {
            issues.push(ValidationIssue::new(
                IssueKind::ManifestField,
                PACKAGE_MANIFEST_FILE,
                "preloadedDependencies must include the main library",
            ));
        }

        if let Some(license) = &parsed.license {
            if !manifest::is_allowed_license(license) {
                issues.push(ValidationIssue::new(
                    IssueKind::DisallowedLicense,
                    PACKAGE_MANIFEST_FILE,
                    format!("license '{}' is not an allowed value", license),
                ));
            }
        }

        if !manifest::is_valid_language_code(&parsed.language) {
            issues.push(ValidationIssue::new(
                IssueKind::ManifestField,
                PACKAGE_MANIFEST_FILE,
                format!("'{}' is not a valid language code", parsed.language),
            ));
        }

        if let Some(default_language) = &parsed.default_language {
            if !manifest::is_valid_language_code(default_language) {
                issues.push(ValidationIssue::new(
                    IssueKind::ManifestField,
                    PACKAGE_MANIFEST_FILE,
                    format!("'{}' is not a valid language code", default_language),
                ));
            }
        }
    }

    /// Candidate library directory checks
    async fn check_libraries(
        &self,
        scanned: &ScannedArchive,
        issues: &mut Vec<ValidationIssue>,
    ) -> ServiceResult<()> {
        // parse every descriptor first so dependency edges can resolve to
        // other libraries in the same archive
        let mut declared: HashSet<LibraryName> = HashSet::new();
        let mut parsed: Vec<(&String, LibraryMetadata)> = Vec::new();

        for (directory, candidate) in &scanned.libraries {
            if !LibraryName::is_valid_directory_name(directory) {
                issues.push(ValidationIssue::new(
                    IssueKind::InvalidDirectoryName,
                    directory,
                    "directory name contains disallowed characters",
                ));
                continue;
            }
            let descriptor_path = format!("{}/{}", directory, LIBRARY_DESCRIPTOR_FILE);
            match &candidate.descriptor {
                None => issues.push(ValidationIssue::new(
                    IssueKind::MissingDescriptor,
                    descriptor_path,
                    "library directory has no descriptor",
                )),
                Some(bytes) => match LibraryMetadata::from_json(bytes) {
                    Err(error) => issues.push(ValidationIssue::new(
                        IssueKind::MalformedDescriptor,
                        descriptor_path,
                        error.to_string(),
                    )),
                    Ok(metadata) => {
                        if &metadata.directory_name() != directory {
                            issues.push(ValidationIssue::new(
                                IssueKind::IdentityMismatch,
                                directory,
                                format!("descriptor declares {}", metadata.directory_name()),
                            ));
                        }
                        declared.insert(metadata.name());
                        parsed.push((directory, metadata));
                    }
                },
            }
        }

        for (directory, metadata) in &parsed {
            let Some(candidate) = scanned.libraries.get(*directory) else {
                continue;
            };
            let entry_set: HashSet<&str> = candidate.entries.iter().map(String::as_str).collect();

            for entry in &candidate.entries {
                if !has_allowed_extension(entry, &self.config.library_whitelist) {
                    issues.push(ValidationIssue::new(
                        IssueKind::DisallowedExtension,
                        entry,
                        "extension is not on the library whitelist",
                    ));
                }
            }

            for reference in metadata.required_files() {
                let expected = format!("{}/{}", directory, reference.path.trim_start_matches("./"));
                if !entry_set.contains(expected.as_str()) {
                    issues.push(ValidationIssue::new(
                        IssueKind::MissingAssetFile,
                        expected,
                        "referenced by the descriptor but absent from the archive",
                    ));
                }
            }

            for relation in DependencyRelation::ALL {
                for dependency in metadata.dependencies(relation) {
                    if declared.contains(dependency) {
                        continue;
                    }
                    if self.installed.is_installed(dependency).await? {
                        continue;
                    }
                    issues.push(ValidationIssue::new(
                        IssueKind::MissingDependency,
                        directory.as_str(),
                        format!(
                            "{} dependency {} is neither in the package nor installed",
                            relation, dependency
                        ),
                    ));
                }
            }
        }

        Ok(())
    }
}

struct CandidateLibrary {
    entries: Vec<String>,
    descriptor: Option<Vec<u8>>,
}

struct ScannedArchive {
    content_files: Vec<String>,
    stray_entries: Vec<String>,
    manifest: Option<Vec<u8>>,
    libraries: BTreeMap<String, CandidateLibrary>,
}

/// Normalize an archive entry path, returning `None` when the path escapes
/// the extraction root
fn normalize_entry_path(raw: &str) -> Option<String> {
    if raw.starts_with('/') || raw.contains('\0') {
        return None;
    }
    let mut components: Vec<&str> = Vec::new();
    for component in raw.split('/') {
        match component {
            "" | "." => continue,
            ".." => {
                if components.pop().is_none() {
                    return None;
                }
            }
            other => components.push(other),
        }
    }
    Some(components.join("/"))
}

/// Enumerate the archive, enforce the structural checks, and read the
/// descriptors needed by the semantic passes
///
/// Runs on a blocking thread; nothing here parses or writes content.
fn scan_archive(
    path: &Path,
    max_file_size: u64,
    max_total_size: u64,
) -> ServiceResult<ScannedArchive> {
    let file = std::fs::File::open(path)?;
    let mut archive = ZipArchive::new(file)?;

    let mut content_files = Vec::new();
    let mut stray_entries = Vec::new();
    let mut has_manifest = false;
    let mut libraries: BTreeMap<String, CandidateLibrary> = BTreeMap::new();
    let mut total: u64 = 0;

    for index in 0..archive.len() {
        let entry = archive.by_index(index)?;
        let raw = entry.name().replace('\\', "/");
        let normalized = normalize_entry_path(&raw).ok_or_else(|| ServiceError::Structural {
            path: raw.clone(),
            message: "entry path escapes the extraction root".to_string(),
        })?;
        if entry.is_dir() || normalized.is_empty() {
            continue;
        }

        let size = entry.size();
        if size > max_file_size {
            return Err(ServiceError::Structural {
                path: normalized,
                message: format!(
                    "entry size {} exceeds the per-file ceiling of {}",
                    size, max_file_size
                ),
            });
        }
        total = total.saturating_add(size);
        if total > max_total_size {
            return Err(ServiceError::Structural {
                path: normalized,
                message: format!("archive exceeds the total size ceiling of {}", max_total_size),
            });
        }

        let top_level = normalized.split_once('/').map(|(first, _)| first.to_string());
        match top_level {
            None => {
                if normalized == PACKAGE_MANIFEST_FILE {
                    has_manifest = true;
                } else {
                    stray_entries.push(normalized);
                }
            }
            Some(first) if first == CONTENT_DIR => content_files.push(normalized),
            Some(directory) => {
                libraries
                    .entry(directory)
                    .or_insert_with(|| CandidateLibrary {
                        entries: Vec::new(),
                        descriptor: None,
                    })
                    .entries
                    .push(normalized);
            }
        }
    }

    let manifest = if has_manifest {
        Some(read_entry(&mut archive, PACKAGE_MANIFEST_FILE, max_file_size)?)
    } else {
        None
    };

    for (directory, candidate) in libraries.iter_mut() {
        let descriptor_path = format!("{}/{}", directory, LIBRARY_DESCRIPTOR_FILE);
        if candidate.entries.iter().any(|e| e == &descriptor_path) {
            candidate.descriptor = Some(read_entry(&mut archive, &descriptor_path, max_file_size)?);
        }
    }

    Ok(ScannedArchive {
        content_files,
        stray_entries,
        manifest,
        libraries,
    })
}

fn read_entry(
    archive: &mut ZipArchive<std::fs::File>,
    name: &str,
    limit: u64,
) -> ServiceResult<Vec<u8>> {
    let entry = archive.by_name(name)?;
    let mut buffer = Vec::new();
    entry.take(limit).read_to_end(&mut buffer)?;
    Ok(buffer)
}

fn has_allowed_extension(path: &str, whitelist: &HashSet<String>) -> bool {
    let file_name = path.rsplit('/').next().unwrap_or(path);
    match file_name.rsplit_once('.') {
        Some((stem, extension)) if !stem.is_empty() => {
            whitelist.contains(&extension.to_ascii_lowercase())
        }
        _ => false,
    }
}
