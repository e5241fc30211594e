//! Discovery of provider records from resources shipped with the program.
//!
//! Every extension point owns one resource path, `<directory>/<identity>`.
//! Any number of roots may carry a file at that path, one per packaged
//! module. Each file holds one record per line:
//!
//! ```text
//! # comment
//! json=flow.sample.JsonConverter   # named record
//! flow.sample.XmlConverter         # named by the implementation
//! ```
//!
//! Problems are isolated per record: a record that fails to parse or
//! resolve is logged and skipped, and discovery carries on with the rest.

use std::borrow::Cow;
use std::fs;
use std::io;
use std::path::PathBuf;

use indexmap::IndexMap;
use thiserror::Error;
use tracing::{debug, instrument, warn};

use crate::catalog::{Factory, FactoryCatalog};
use crate::Error;

/// Resource directory probed below every root.
pub const DEFAULT_DIRECTORY: &str = "META-INF/flow-engine";

/// A single discovery record, as parsed from a resource line.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProviderRecord {
    /// `None` for bare records, which take the implementation's name.
    pub name: Option<String>,
    pub factory_ref: String,
    pub location: String,
    pub line: usize,
}

/// A discovery record that was rejected.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
#[error("{location}:{line}: {kind}")]
pub struct RecordError {
    pub location: String,
    /// 1-based line number, 0 if the whole resource could not be read.
    pub line: usize,
    pub kind: RecordErrorKind,
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum RecordErrorKind {
    #[error("missing extension name before '='")]
    MissingName,

    #[error("missing factory reference")]
    MissingFactory,

    #[error("factory {0} could not be resolved")]
    Unresolved(String),

    #[error("factory {factory} does not implement {point}")]
    Incompatible { factory: String, point: String },

    #[error("factory {0} declares no extension name")]
    Unnamed(String),

    #[error("unable to read resource: {0}")]
    Io(String),
}

/// Parses the contents of one resource into records, in line order.
pub fn parse_records(location: &str, contents: &str) -> Vec<Result<ProviderRecord, RecordError>> {
    contents
        .lines()
        .enumerate()
        .filter_map(|(idx, raw)| {
            let line = match raw.find('#') {
                Some(pos) => &raw[..pos],
                None => raw,
            }
            .trim();

            if line.is_empty() {
                return None;
            }

            let err = |kind| RecordError {
                location: location.to_string(),
                line: idx + 1,
                kind,
            };

            let (name, factory_ref) = match line.split_once('=') {
                Some(("", _)) => return Some(Err(err(RecordErrorKind::MissingName))),
                Some((name, factory_ref)) => (Some(name.trim()), factory_ref.trim()),
                None => (None, line),
            };

            if factory_ref.is_empty() {
                return Some(Err(err(RecordErrorKind::MissingFactory)));
            }

            Some(Ok(ProviderRecord {
                name: name.map(str::to_string),
                factory_ref: factory_ref.to_string(),
                location: location.to_string(),
                line: idx + 1,
            }))
        })
        .collect()
}

/// A resource found at one root.
#[derive(Debug)]
pub struct Resource {
    pub location: String,
    pub contents: io::Result<String>,
}

/// Somewhere discovery resources can be read from.
pub trait ResourceSource: Send + Sync {
    /// Returns the resource at `path` for every root carrying one. Roots
    /// without the resource are left out, roots that fail to read are
    /// returned with the error.
    fn resources(&self, path: &str) -> Vec<Resource>;
}

/// Reads resources from a list of directories on the filesystem.
#[derive(Clone, Debug, Default)]
pub struct DirectorySource {
    roots: Vec<PathBuf>,
}

impl DirectorySource {
    pub fn new(roots: impl IntoIterator<Item = impl Into<PathBuf>>) -> Self {
        Self {
            roots: roots.into_iter().map(Into::into).collect(),
        }
    }

    pub fn roots(&self) -> &[PathBuf] {
        &self.roots
    }
}

impl ResourceSource for DirectorySource {
    fn resources(&self, path: &str) -> Vec<Resource> {
        self.roots
            .iter()
            .filter_map(|root| {
                let file = root.join(path);
                let location = file.display().to_string();
                // invalid UTF-8 is replaced, so it only taints the lines carrying it
                let contents = fs::read(&file).map(|bytes| match String::from_utf8(bytes) {
                    Ok(contents) => contents,
                    Err(e) => {
                        warn!(
                            location = %location,
                            "resource is not valid UTF-8, replacing invalid bytes"
                        );
                        String::from_utf8_lossy(e.as_bytes()).into_owned()
                    }
                });
                match contents {
                    Err(e) if e.kind() == io::ErrorKind::NotFound => None,
                    contents => Some(Resource { location, contents }),
                }
            })
            .collect()
    }
}

/// Resources compiled into the program, e.g. with `include_str!`.
#[derive(Clone, Debug, Default)]
pub struct StaticSource {
    entries: Vec<StaticEntry>,
}

#[derive(Clone, Debug)]
struct StaticEntry {
    module: Cow<'static, str>,
    path: Cow<'static, str>,
    contents: Cow<'static, str>,
}

impl StaticSource {
    /// Adds the resource `path` as shipped by `module`.
    pub fn with(
        mut self,
        module: impl Into<Cow<'static, str>>,
        path: impl Into<Cow<'static, str>>,
        contents: impl Into<Cow<'static, str>>,
    ) -> Self {
        self.entries.push(StaticEntry {
            module: module.into(),
            path: path.into(),
            contents: contents.into(),
        });
        self
    }
}

impl ResourceSource for StaticSource {
    fn resources(&self, path: &str) -> Vec<Resource> {
        self.entries
            .iter()
            .filter(|entry| entry.path == path)
            .map(|entry| Resource {
                location: format!("{}!/{}", entry.module, entry.path),
                contents: Ok(entry.contents.to_string()),
            })
            .collect()
    }
}

/// The outcome of discovering the implementations of one extension point.
#[derive(Debug)]
pub struct Discovery<T: ?Sized + 'static> {
    /// Accepted factories by name, in the order first seen.
    pub factories: IndexMap<String, Factory<T>>,
    pub errors: Vec<RecordError>,
}

/// Reads every resource at `path` from `sources` and resolves the records
/// found against `catalog`.
///
/// Never fails as a whole. Rejected records end up in
/// [Discovery::errors] and are logged. A later record for an already seen
/// name replaces the earlier one.
#[instrument(skip_all, fields(resource.path = %path))]
pub fn discover<T: ?Sized + Send + Sync + 'static>(
    path: &str,
    sources: &[&dyn ResourceSource],
    catalog: &FactoryCatalog,
) -> Discovery<T> {
    let mut discovery = Discovery {
        factories: IndexMap::new(),
        errors: Vec::new(),
    };

    for resource in sources.iter().flat_map(|source| source.resources(path)) {
        let contents = match resource.contents {
            Ok(contents) => contents,
            Err(e) => {
                discovery.reject(RecordError {
                    location: resource.location,
                    line: 0,
                    kind: RecordErrorKind::Io(e.to_string()),
                });
                continue;
            }
        };

        for record in parse_records(&resource.location, &contents) {
            match record.and_then(|record| resolve_record(record, catalog)) {
                Ok((name, factory)) => discovery.accept(name, factory),
                Err(e) => discovery.reject(e),
            }
        }
    }

    debug!(
        accepted = discovery.factories.len(),
        rejected = discovery.errors.len(),
        "discovery finished"
    );
    discovery
}

fn resolve_record<T: ?Sized + Send + Sync + 'static>(
    record: ProviderRecord,
    catalog: &FactoryCatalog,
) -> Result<(String, Factory<T>), RecordError> {
    let err = |kind| RecordError {
        location: record.location.clone(),
        line: record.line,
        kind,
    };

    let factory = catalog.resolve::<T>(&record.factory_ref).map_err(|e| {
        err(match e {
            Error::IncompatibleFactory { factory, point } => RecordErrorKind::Incompatible {
                factory,
                point: point.to_string(),
            },
            _ => RecordErrorKind::Unresolved(record.factory_ref.clone()),
        })
    })?;

    let name = match record.name.as_deref().or(factory.name()) {
        Some(name) => name.to_string(),
        None => return Err(err(RecordErrorKind::Unnamed(record.factory_ref.clone()))),
    };

    Ok((name, factory))
}

impl<T: ?Sized + 'static> Discovery<T> {
    fn accept(&mut self, name: String, factory: Factory<T>) {
        if let Some(previous) = self.factories.get(&name) {
            if previous.factory_ref() != factory.factory_ref() {
                warn!(
                    name = %name,
                    previous = previous.factory_ref(),
                    factory = factory.factory_ref(),
                    "extension name declared twice, later record wins"
                );
            }
        }
        self.factories.insert(name, factory);
    }

    fn reject(&mut self, e: RecordError) {
        warn!(location = %e.location, line = e.line, err = %e.kind, "skipping discovery record");
        self.errors.push(e);
    }
}

#[cfg(test)]
mod tests {
    use std::fs;
    use std::sync::Arc;

    use pretty_assertions::assert_eq;
    use rstest::rstest;
    use tempfile::TempDir;

    use super::{
        discover, parse_records, DirectorySource, ProviderRecord, RecordErrorKind,
        ResourceSource, StaticSource, DEFAULT_DIRECTORY,
    };
    use crate::catalog::{Factory, FactoryCatalog};

    trait Codec: Send + Sync {}
    trait Other: Send + Sync {}

    struct Plain;
    impl Codec for Plain {}
    impl Other for Plain {}

    const PATH: &str = "META-INF/flow-engine/test.Codec";

    fn catalog() -> FactoryCatalog {
        let catalog = FactoryCatalog::default();
        catalog.insert(Factory::<dyn Codec>::from_fn("test.Plain", || {
            Ok(Arc::new(Plain) as Arc<dyn Codec>)
        }));
        catalog.insert(
            Factory::<dyn Codec>::from_fn("test.Named", || Ok(Arc::new(Plain) as Arc<dyn Codec>))
                .with_name("named"),
        );
        catalog.insert(Factory::<dyn Other>::from_fn("test.OtherOnly", || {
            Ok(Arc::new(Plain) as Arc<dyn Other>)
        }));
        catalog
    }

    fn record(name: Option<&str>, factory_ref: &str, line: usize) -> ProviderRecord {
        ProviderRecord {
            name: name.map(str::to_string),
            factory_ref: factory_ref.to_string(),
            location: "res".to_string(),
            line,
        }
    }

    #[rstest]
    #[case::named("json=a.Json", record(Some("json"), "a.Json", 1))]
    #[case::bare("a.Json", record(None, "a.Json", 1))]
    #[case::padded("  json =  a.Json  ", record(Some("json"), "a.Json", 1))]
    #[case::trailing_comment("json=a.Json # the default", record(Some("json"), "a.Json", 1))]
    fn parse_valid(#[case] line: &str, #[case] expected: ProviderRecord) {
        let records = parse_records("res", line);
        assert_eq!(vec![Ok(expected)], records);
    }

    #[rstest]
    #[case::leading_equals("=a.Json", RecordErrorKind::MissingName)]
    #[case::empty_factory("json=", RecordErrorKind::MissingFactory)]
    #[case::comment_only_factory("json= # nothing", RecordErrorKind::MissingFactory)]
    fn parse_malformed(#[case] line: &str, #[case] expected: RecordErrorKind) {
        let records = parse_records("res", line);
        assert_eq!(1, records.len());
        assert_eq!(expected, records[0].clone().expect_err("must be rejected").kind);
    }

    #[test]
    fn parse_skips_comments_and_blanks() {
        let contents = "# header\n\n   \njson=a.Json\n  # indented comment\nb.Xml\n";
        let records = parse_records("res", contents);
        assert_eq!(
            vec![
                Ok(record(Some("json"), "a.Json", 4)),
                Ok(record(None, "b.Xml", 6))
            ],
            records
        );
    }

    #[test]
    fn discover_skips_bad_records() {
        let source = StaticSource::default().with(
            "module",
            PATH,
            "plain=test.Plain\n=broken\nmissing=test.Missing\nother=test.OtherOnly\ntest.Plain\ntest.Named\n",
        );
        let discovery = discover::<dyn Codec>(PATH, &[&source], &catalog());

        assert_eq!(
            vec!["plain", "named"],
            discovery.factories.keys().collect::<Vec<_>>()
        );

        let kinds: Vec<_> = discovery.errors.iter().map(|e| e.kind.clone()).collect();
        assert_eq!(4, kinds.len());
        assert_eq!(RecordErrorKind::MissingName, kinds[0]);
        assert_eq!(RecordErrorKind::Unresolved("test.Missing".into()), kinds[1]);
        assert!(matches!(kinds[2], RecordErrorKind::Incompatible { ref factory, .. } if factory == "test.OtherOnly"));
        assert_eq!(RecordErrorKind::Unnamed("test.Plain".into()), kinds[3]);
        assert_eq!(5, discovery.errors[3].line);
    }

    #[test]
    fn discover_merges_roots_in_order() {
        let first = StaticSource::default().with("a", PATH, "plain=test.Plain\n");
        let second = StaticSource::default()
            .with("b", PATH, "test.Named\nplain=test.Named\n")
            .with("b", "META-INF/flow-engine/test.Unrelated", "x=test.Plain\n");

        let discovery = discover::<dyn Codec>(PATH, &[&first, &second], &catalog());

        assert!(discovery.errors.is_empty());
        assert_eq!(
            vec!["plain", "named"],
            discovery.factories.keys().collect::<Vec<_>>()
        );
        // the later record for "plain" replaced the earlier one
        assert_eq!("test.Named", discovery.factories["plain"].factory_ref());
    }

    #[test]
    fn directory_source_reads_every_root() {
        let root_a = TempDir::new().unwrap();
        let root_b = TempDir::new().unwrap();
        let root_empty = TempDir::new().unwrap();
        for (root, contents) in [(&root_a, "plain=test.Plain\n"), (&root_b, "test.Named\n")] {
            let dir = root.path().join(DEFAULT_DIRECTORY);
            fs::create_dir_all(&dir).unwrap();
            fs::write(dir.join("test.Codec"), contents).unwrap();
        }

        let source = DirectorySource::new([root_a.path(), root_empty.path(), root_b.path()]);
        assert_eq!(2, source.resources(PATH).len());

        let discovery = discover::<dyn Codec>(PATH, &[&source], &catalog());
        assert!(discovery.errors.is_empty());
        assert_eq!(
            vec!["plain", "named"],
            discovery.factories.keys().collect::<Vec<_>>()
        );
    }

    #[test]
    fn directory_source_invalid_utf8_keeps_other_lines() {
        let root = TempDir::new().unwrap();
        let dir = root.path().join(DEFAULT_DIRECTORY);
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join("test.Codec"), b"plain=test.Plain\nbad\xff=test.Named\n").unwrap();

        let source = DirectorySource::new([root.path()]);
        let discovery = discover::<dyn Codec>(PATH, &[&source], &catalog());

        assert!(discovery.errors.is_empty());
        assert_eq!(
            vec!["plain", "bad\u{FFFD}"],
            discovery.factories.keys().collect::<Vec<_>>()
        );
        assert_eq!("test.Plain", discovery.factories["plain"].factory_ref());
    }

    #[test]
    fn directory_source_unreadable_root_is_isolated() {
        let good = TempDir::new().unwrap();
        let dir = good.path().join(DEFAULT_DIRECTORY);
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join("test.Codec"), "plain=test.Plain\n").unwrap();

        // a directory where a file is expected can't be read as a string
        let bad = TempDir::new().unwrap();
        fs::create_dir_all(bad.path().join(PATH)).unwrap();

        let source = DirectorySource::new([bad.path(), good.path()]);
        let discovery = discover::<dyn Codec>(PATH, &[&source], &catalog());

        assert_eq!(1, discovery.errors.len());
        assert!(matches!(discovery.errors[0].kind, RecordErrorKind::Io(_)));
        assert_eq!(0, discovery.errors[0].line);
        assert!(discovery.factories.contains_key("plain"));
    }
}
