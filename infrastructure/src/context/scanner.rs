//! Local file system scanner
//!
//! # Detection
//!
//! | Fact | Signal |
//! |---|---|
//! | `has_tests` | a `test`/`tests`/`spec`/`__tests__` directory, or `*.test.*`, `*.spec.*`, `*_test.*` files |
//! | `has_ci` | `.github/workflows`, `.gitlab-ci.yml`, `Jenkinsfile`, ... |
//! | `has_docker` | `Dockerfile` or a compose file |
//! | `has_frontend` | `.tsx`, `.jsx`, `.vue`, `.svelte`, `.html` or `.css` sources |
//! | `has_database` | `.sql` files, a `migrations` directory, or a database crate/package in a manifest |
//! | `has_api` | `api`/`routes`/`controllers`/`handlers` directories, or a web framework in a manifest |
//! | `has_layers` | at least two layer directories (`domain`, `application`, `infrastructure`, ...) |

use gatekeeper_domain::AssessmentContext;
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, warn};

/// Files beyond this are not scanned.
const MAX_FILES: usize = 20_000;
/// Files above this size are counted but not read for line counts.
const MAX_LINE_COUNT_BYTES: u64 = 1024 * 1024;

const SKIP_DIRS: [&str; 20] = [
    "node_modules", "venv", ".venv", "env", "__pycache__", ".git", ".svn", ".hg", "dist",
    "build", "target", "out", ".idea", ".vscode", ".vs", "coverage", ".nyc_output", "vendor",
    ".next", ".gatekeeper",
];

const LANGUAGES: [(&str, &str); 21] = [
    ("py", "Python"),
    ("js", "JavaScript"),
    ("ts", "TypeScript"),
    ("tsx", "TypeScript React"),
    ("jsx", "JavaScript React"),
    ("java", "Java"),
    ("go", "Go"),
    ("rs", "Rust"),
    ("rb", "Ruby"),
    ("php", "PHP"),
    ("cs", "C#"),
    ("cpp", "C++"),
    ("c", "C"),
    ("swift", "Swift"),
    ("kt", "Kotlin"),
    ("sql", "SQL"),
    ("html", "HTML"),
    ("css", "CSS"),
    ("scss", "SCSS"),
    ("vue", "Vue"),
    ("svelte", "Svelte"),
];

const MANIFESTS: [&str; 10] = [
    "package.json",
    "requirements.txt",
    "Pipfile",
    "pyproject.toml",
    "Gemfile",
    "go.mod",
    "Cargo.toml",
    "pom.xml",
    "build.gradle",
    "composer.json",
];

const CI_PATHS: [&str; 7] = [
    ".github/workflows",
    ".gitlab-ci.yml",
    "Jenkinsfile",
    ".circleci",
    ".travis.yml",
    "azure-pipelines.yml",
    "bitbucket-pipelines.yml",
];

const DATABASE_MARKERS: [&str; 12] = [
    "sqlx", "diesel", "postgres", "mysql", "sqlite", "sqlalchemy", "prisma", "mongoose",
    "typeorm", "sequelize", "psycopg", "mongodb",
];

const API_MARKERS: [&str; 10] = [
    "express", "fastify", "@nestjs/core", "fastapi", "flask", "django", "axum", "actix-web",
    "gin-gonic", "spring-boot",
];

const LAYER_DIRS: [&str; 9] = [
    "domain",
    "application",
    "infrastructure",
    "presentation",
    "services",
    "repositories",
    "controllers",
    "models",
    "handlers",
];

const FRONTEND_EXTENSIONS: [&str; 6] = ["tsx", "jsx", "vue", "svelte", "html", "css"];

#[derive(Error, Debug)]
pub enum ScanError {
    #[error("Source path not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error("Source path is not a directory: {}", .0.display())]
    NotADirectory(PathBuf),

    #[error("Failed to read {}: {}", .0.display(), .1)]
    Io(PathBuf, std::io::Error),
}

/// What one scan found.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SourceScan {
    pub root: PathBuf,
    /// Paths relative to the root, `/`-separated.
    pub files: Vec<String>,
    pub lines_by_language: BTreeMap<String, u64>,
    pub manifests: Vec<String>,
    pub facts: BTreeSet<String>,
    pub truncated: bool,
}

impl SourceScan {
    pub fn total_lines(&self) -> u64 {
        self.lines_by_language.values().sum()
    }

    /// Markdown overview handed to assessor agents.
    pub fn summary(&self) -> String {
        let mut out = format!("## Codebase\n\nSource: {}\n", self.root.display());
        out.push_str(&format!(
            "Files: {}{} ({} source lines)\n",
            self.files.len(),
            if self.truncated { "+" } else { "" },
            self.total_lines()
        ));

        if !self.lines_by_language.is_empty() {
            let mut languages: Vec<_> = self.lines_by_language.iter().collect();
            languages.sort_by(|a, b| b.1.cmp(a.1).then(a.0.cmp(b.0)));
            let listed: Vec<String> = languages
                .iter()
                .map(|(lang, lines)| format!("{lang} ({lines})"))
                .collect();
            out.push_str(&format!("Languages: {}\n", listed.join(", ")));
        }
        if !self.manifests.is_empty() {
            out.push_str(&format!("Manifests: {}\n", self.manifests.join(", ")));
        }
        if !self.facts.is_empty() {
            let facts: Vec<&str> = self.facts.iter().map(String::as_str).collect();
            out.push_str(&format!("Detected: {}\n", facts.join(", ")));
        }
        out
    }

    pub fn to_context(&self, project_id: &str) -> AssessmentContext {
        let mut context = AssessmentContext::new(project_id, self.root.to_string_lossy())
            .with_summary(self.summary());
        context.facts = self.facts.clone();
        context
    }
}

/// Scanner that reads from the local file system.
#[derive(Debug, Clone, Default)]
pub struct SourceScanner;

impl SourceScanner {
    pub fn new() -> Self {
        Self
    }

    pub fn scan(&self, root: &Path) -> Result<SourceScan, ScanError> {
        if !root.exists() {
            return Err(ScanError::NotFound(root.to_path_buf()));
        }
        if !root.is_dir() {
            return Err(ScanError::NotADirectory(root.to_path_buf()));
        }

        let mut scan = SourceScan {
            root: root.to_path_buf(),
            ..Default::default()
        };
        let mut dirs = BTreeSet::new();
        walk(root, root, &mut scan, &mut dirs)?;
        scan.files.sort();

        for manifest in MANIFESTS {
            if root.join(manifest).is_file() {
                scan.manifests.push(manifest.to_string());
            }
        }
        let manifest_text = self.manifest_text(root, &scan.manifests);
        detect_facts(root, &mut scan, &dirs, &manifest_text);

        debug!(
            "Scanned {} files under {:?}, facts: {:?}",
            scan.files.len(),
            root,
            scan.facts
        );
        Ok(scan)
    }

    /// Scan and convert into an assessment context in one go.
    pub fn assessment_context(
        &self,
        project_id: &str,
        root: &Path,
    ) -> Result<AssessmentContext, ScanError> {
        Ok(self.scan(root)?.to_context(project_id))
    }

    fn manifest_text(&self, root: &Path, manifests: &[String]) -> String {
        manifests
            .iter()
            .filter_map(|name| match fs::read_to_string(root.join(name)) {
                Ok(content) => Some(content.to_lowercase()),
                Err(e) => {
                    warn!("Failed to read manifest {}: {}", name, e);
                    None
                }
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Recursive walk collecting files and the lowercase names of every directory.
fn walk(
    root: &Path,
    dir: &Path,
    scan: &mut SourceScan,
    dirs: &mut BTreeSet<String>,
) -> Result<(), ScanError> {
    let entries = fs::read_dir(dir).map_err(|e| ScanError::Io(dir.to_path_buf(), e))?;
    for entry in entries {
        let entry = entry.map_err(|e| ScanError::Io(dir.to_path_buf(), e))?;
        let path = entry.path();
        let name = entry.file_name().to_string_lossy().into_owned();
        let Ok(file_type) = entry.file_type() else {
            continue;
        };

        if file_type.is_dir() {
            if SKIP_DIRS.contains(&name.as_str()) {
                continue;
            }
            dirs.insert(name.to_lowercase());
            walk(root, &path, scan, dirs)?;
        } else if file_type.is_file() {
            if scan.files.len() >= MAX_FILES {
                scan.truncated = true;
                return Ok(());
            }
            let relative = path
                .strip_prefix(root)
                .unwrap_or(&path)
                .to_string_lossy()
                .replace('\\', "/");
            if let Some(language) = language_of(&path) {
                *scan.lines_by_language.entry(language.to_string()).or_default() +=
                    count_lines(&path);
            }
            scan.files.push(relative);
        }
    }
    Ok(())
}

fn extension(path: &Path) -> Option<String> {
    path.extension().map(|e| e.to_string_lossy().to_lowercase())
}

fn language_of(path: &Path) -> Option<&'static str> {
    let ext = extension(path)?;
    LANGUAGES
        .iter()
        .find(|(e, _)| *e == ext)
        .map(|(_, language)| *language)
}

fn count_lines(path: &Path) -> u64 {
    let too_big = fs::metadata(path)
        .map(|m| m.len() > MAX_LINE_COUNT_BYTES)
        .unwrap_or(true);
    if too_big {
        return 0;
    }
    fs::read(path)
        .map(|bytes| String::from_utf8_lossy(&bytes).lines().count() as u64)
        .unwrap_or(0)
}

fn is_test_path(relative: &str) -> bool {
    let lower = relative.to_lowercase();
    let in_test_dir = lower
        .split('/')
        .rev()
        .skip(1)
        .any(|part| matches!(part, "test" | "tests" | "spec" | "specs" | "__tests__"));
    let file = lower.rsplit('/').next().unwrap_or(&lower);
    in_test_dir
        || file.contains(".test.")
        || file.contains(".spec.")
        || file.contains("_test.")
        || file.starts_with("test_")
}

fn detect_facts(root: &Path, scan: &mut SourceScan, dirs: &BTreeSet<String>, manifest_text: &str) {
    let mut facts = BTreeSet::new();
    let extensions: BTreeSet<String> = scan
        .files
        .iter()
        .filter_map(|f| extension(Path::new(f)))
        .collect();

    if scan.files.iter().any(|f| is_test_path(f)) {
        facts.insert("has_tests");
    }
    if CI_PATHS.iter().any(|p| root.join(p).exists()) {
        facts.insert("has_ci");
    }
    if ["Dockerfile", "docker-compose.yml", "docker-compose.yaml", "compose.yaml"]
        .iter()
        .any(|p| root.join(p).is_file())
    {
        facts.insert("has_docker");
    }
    if FRONTEND_EXTENSIONS.iter().any(|e| extensions.contains(*e)) {
        facts.insert("has_frontend");
    }
    if extensions.contains("sql")
        || dirs.contains("migrations")
        || DATABASE_MARKERS.iter().any(|m| manifest_text.contains(m))
    {
        facts.insert("has_database");
    }
    if ["api", "routes", "controllers", "handlers"]
        .iter()
        .any(|d| dirs.contains(*d))
        || API_MARKERS.iter().any(|m| manifest_text.contains(m))
    {
        facts.insert("has_api");
    }
    if LAYER_DIRS.iter().filter(|d| dirs.contains(**d)).count() >= 2 {
        facts.insert("has_layers");
    }

    scan.facts = facts.into_iter().map(str::to_string).collect();
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    fn write(root: &Path, relative: &str, content: &str) {
        let path = root.join(relative);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    #[test]
    fn test_detects_facts_from_layout_and_manifests() {
        let dir = tempdir().unwrap();
        let root = dir.path();
        write(root, "Cargo.toml", "[dependencies]\naxum = \"0.7\"\nsqlx = \"0.8\"\n");
        write(root, "src/domain/order.rs", "pub struct Order;\n");
        write(root, "src/infrastructure/db.rs", "fn connect() {}\nfn close() {}\n");
        write(root, "tests/order_flow.rs", "#[test]\nfn flow() {}\n");
        write(root, ".github/workflows/ci.yml", "on: push\n");

        let scan = SourceScanner::new().scan(root).unwrap();
        let facts: Vec<&str> = scan.facts.iter().map(String::as_str).collect();
        assert_eq!(
            facts,
            vec!["has_api", "has_ci", "has_database", "has_layers", "has_tests"]
        );
        assert_eq!(scan.lines_by_language.get("Rust"), Some(&5));
        assert_eq!(scan.manifests, vec!["Cargo.toml".to_string()]);
    }

    #[test]
    fn test_skips_dependency_directories() {
        let dir = tempdir().unwrap();
        let root = dir.path();
        write(root, "index.html", "<html></html>\n");
        write(root, "node_modules/react/index.test.js", "test()\n");
        write(root, "target/debug/build.rs", "fn main() {}\n");

        let scan = SourceScanner::new().scan(root).unwrap();
        assert_eq!(scan.files, vec!["index.html".to_string()]);
        assert!(scan.facts.contains("has_frontend"));
        assert!(!scan.facts.contains("has_tests"));
    }

    #[test]
    fn test_context_carries_facts_and_summary() {
        let dir = tempdir().unwrap();
        let root = dir.path();
        write(root, "app/checkout.test.ts", "it('works', () => {})\n");
        write(root, "Dockerfile", "FROM node:20\n");

        let context = SourceScanner::new().assessment_context("shop", root).unwrap();
        assert_eq!(context.project_id, "shop");
        assert!(context.facts.contains("has_tests"));
        assert!(context.facts.contains("has_docker"));
        assert!(context.summary.contains("Files: 2"));
        assert!(context.summary.contains("Detected: has_docker, has_tests"));
    }

    #[test]
    fn test_missing_source_is_an_error() {
        let dir = tempdir().unwrap();
        let missing = dir.path().join("nope");
        assert!(matches!(
            SourceScanner::new().scan(&missing),
            Err(ScanError::NotFound(_))
        ));

        let file = dir.path().join("file.txt");
        fs::write(&file, "x").unwrap();
        assert!(matches!(
            SourceScanner::new().scan(&file),
            Err(ScanError::NotADirectory(_))
        ));
    }

    #[test]
    fn test_test_path_detection() {
        assert!(is_test_path("tests/flow.rs"));
        assert!(is_test_path("src/__tests__/a.js"));
        assert!(is_test_path("pkg/order_test.go"));
        assert!(is_test_path("test_orders.py"));
        assert!(!is_test_path("src/contest.rs"));
        assert!(!is_test_path("tests"));
    }
}
