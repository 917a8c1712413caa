use apkvin_package::*;
use flate2::write::GzEncoder;
use flate2::Compression;
use pretty_assertions::assert_eq;
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use tempfile::TempDir;

const MAIN: &str = "https://mirror.test/alpine/v3.15/main/x86_64";
const COMMUNITY: &str = "https://mirror.test/alpine/v3.15/community/x86_64";

const MAIN_INDEX: &str = "\
P:musl
V:1.2.2-r7
L:MIT
p:so:libc.musl-x86_64.so.1=1

P:libbar
V:0.9.0
L:MIT
D:so:libc.musl-x86_64.so.1

P:libbar
V:1.2.0
L:MIT
D:so:libc.musl-x86_64.so.1

P:openssl
V:1.9.0
L:OpenSSL
p:so:libssl.so.3=3.0.0

P:libfoo
V:2.1.0-r1
L:MIT
D:libbar>=1.0 so:libc.musl-x86_64.so.1 musl !conflicting-pkg

P:broken
V:not a version!
L:MIT
";

const COMMUNITY_INDEX: &str = "\
P:curl
V:7.80.0-r0
L:curl
D:so:libssl.so.3>=3.0.0 libfoo

P:orphan
V:1.0
L:MIT
D:does-not-exist
";

/// Gzip tar holding a single `APKINDEX` member.
fn write_index(dir: &Path, file: &str, text: &str) -> PathBuf {
    let mut builder = tar::Builder::new(GzEncoder::new(Vec::new(), Compression::default()));
    let mut header = tar::Header::new_gnu();
    header.set_size(text.len() as u64);
    header.set_mode(0o644);
    header.set_cksum();
    builder
        .append_data(&mut header, "APKINDEX", text.as_bytes())
        .unwrap();
    let bytes = builder.into_inner().unwrap().finish().unwrap();

    let path = dir.join(file);
    fs::write(&path, bytes).unwrap();
    path
}

/// Writes the package name as the archive body. Fails for chosen names.
struct FakeFetcher {
    scratch: PathBuf,
    calls: AtomicUsize,
    fail: HashSet<String>,
    fetched: Mutex<Vec<PathBuf>>,
}

impl FakeFetcher {
    fn new(scratch: &Path) -> Self {
        Self {
            scratch: scratch.to_path_buf(),
            calls: AtomicUsize::new(0),
            fail: HashSet::new(),
            fetched: Mutex::new(Vec::new()),
        }
    }

    fn failing(mut self, name: &str) -> Self {
        self.fail.insert(name.to_string());
        self
    }
}

impl ArtifactFetcher for FakeFetcher {
    fn fetch(&self, package: &Package) -> std::result::Result<LocalArtifact, FetchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail.contains(&package.name) {
            return Err(FetchError::Io(std::io::Error::other("connection reset")));
        }
        let path = self.scratch.join(package.archive_name());
        fs::write(&path, package.name.as_bytes())?;
        self.fetched.lock().unwrap().push(path.clone());
        Ok(LocalArtifact::new(path))
    }
}

struct Fixture {
    _indexes: TempDir,
    out: TempDir,
    scratch: TempDir,
    source: FileIndexSource,
}

impl Fixture {
    fn new() -> Self {
        let indexes = TempDir::new().unwrap();
        let main = write_index(indexes.path(), "main.tar.gz", MAIN_INDEX);
        let community = write_index(indexes.path(), "community.tar.gz", COMMUNITY_INDEX);
        let source = FileIndexSource::new()
            .with_archive(MAIN, main)
            .with_archive(COMMUNITY, community);

        Self {
            _indexes: indexes,
            out: TempDir::new().unwrap(),
            scratch: TempDir::new().unwrap(),
            source,
        }
    }

    fn repositories() -> Vec<String> {
        vec![MAIN.to_string(), COMMUNITY.to_string()]
    }

    fn manifest(&self, name: &str, version: &str) -> Manifest {
        Manifest::from_file(&self.out.path().join(name).join(version).join(MANIFEST_FILE))
            .unwrap()
    }
}

fn dep(name: &str, version: &str) -> Dep {
    Dep(name.to_string(), version.to_string())
}

mod index_loading {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_malformed_record_is_dropped() {
        let fx = Fixture::new();
        let fetcher = FakeFetcher::new(fx.scratch.path());
        let pipeline = Pipeline::new(fx.source.clone(), Synthesizer::new(fx.out.path(), &fetcher));

        let loaded = pipeline.build_index(&Fixture::repositories()).unwrap();
        assert_eq!(loaded.index.len(), 7);
        assert_eq!(
            loaded.dropped.keys().cloned().collect::<Vec<_>>(),
            vec!["broken-not a version!".to_string()]
        );
        assert!(matches!(
            loaded.dropped.values().next(),
            Some(ParseError::InvalidVersion { .. })
        ));
    }

    #[test]
    fn test_unreachable_repository_is_skipped() {
        let fx = Fixture::new();
        let fetcher = FakeFetcher::new(fx.scratch.path());
        let pipeline = Pipeline::new(fx.source.clone(), Synthesizer::new(fx.out.path(), &fetcher));

        let repositories = vec!["https://mirror.test/gone".to_string(), MAIN.to_string()];
        let loaded = pipeline.build_index(&repositories).unwrap();
        assert_eq!(loaded.unreachable, vec!["https://mirror.test/gone".to_string()]);
        assert_eq!(loaded.index.lookup("libbar").len(), 2);
    }

    #[test]
    fn test_no_index_data_is_fatal() {
        let fx = Fixture::new();
        let fetcher = FakeFetcher::new(fx.scratch.path());
        let pipeline = Pipeline::new(FileIndexSource::new(), Synthesizer::new(fx.out.path(), &fetcher));

        let err = pipeline.build_index(&Fixture::repositories()).unwrap_err();
        assert!(matches!(err, PipelineError::NoIndexData(2)));
    }

    #[test]
    fn test_provides_span_repositories() {
        let fx = Fixture::new();
        let fetcher = FakeFetcher::new(fx.scratch.path());
        let pipeline = Pipeline::new(fx.source.clone(), Synthesizer::new(fx.out.path(), &fetcher));

        let loaded = pipeline.build_index(&Fixture::repositories()).unwrap();
        let resolver = Resolver::new(&loaded.index);
        let chosen = resolver
            .resolve(&Constraint::parse("so:libssl.so.3>=3.0.0").unwrap())
            .unwrap()
            .unwrap();
        assert_eq!(chosen.name, "openssl");
        assert_eq!(chosen.repository, MAIN);
    }
}

mod generation {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_full_run() {
        let fx = Fixture::new();
        let fetcher = FakeFetcher::new(fx.scratch.path());
        let pipeline = Pipeline::new(fx.source.clone(), Synthesizer::new(fx.out.path(), &fetcher));

        let report = pipeline
            .generate(&Fixture::repositories(), &NoProgress)
            .unwrap();

        // musl, libbar x2, openssl, libfoo, curl written; orphan failed.
        assert_eq!(report.written, 6);
        assert_eq!(report.skipped, 0);
        assert_eq!(report.dropped.len(), 1);
        assert_eq!(
            report.failures.keys().cloned().collect::<Vec<_>>(),
            vec!["orphan-1.0".to_string()]
        );
        assert!(matches!(
            report.failures.get("orphan-1.0"),
            Some(PackageError::Resolve(ResolveError::UnknownDependency(name))) if name == "does-not-exist"
        ));
        assert!(report.has_errors());
        assert!(!fx.out.path().join("orphan").exists());

        let libfoo = fx.manifest("libfoo", "2.1.0-r1");
        assert_eq!(libfoo.provides, "libfoo");
        assert_eq!(libfoo.tarball, format!("{}/libfoo-2.1.0-r1.apk", MAIN));
        // musl is reached twice (via its so: provide and by name) and kept once.
        assert_eq!(
            libfoo.default_deps(),
            &[dep("libbar", "1.2.0"), dep("musl", "1.2.2-r7")]
        );

        let curl = fx.manifest("curl", "7.80.0-r0");
        assert_eq!(
            curl.default_deps(),
            &[dep("openssl", "1.9.0"), dep("libfoo", "2.1.0-r1")]
        );
        assert_eq!(
            curl.checksum,
            checksum(&write_body(fx.scratch.path(), "curl")).unwrap()
        );
    }

    fn write_body(dir: &Path, body: &str) -> PathBuf {
        let path = dir.join("expected");
        fs::write(&path, body).unwrap();
        path
    }

    #[test]
    fn test_second_run_writes_nothing() {
        let fx = Fixture::new();
        let fetcher = FakeFetcher::new(fx.scratch.path());
        let pipeline = Pipeline::new(fx.source.clone(), Synthesizer::new(fx.out.path(), &fetcher));

        let first = pipeline
            .generate(&Fixture::repositories(), &NoProgress)
            .unwrap();
        let calls = fetcher.calls.load(Ordering::SeqCst);
        let before = fs::read_to_string(fx.out.path().join("libfoo/2.1.0-r1/manifest.toml")).unwrap();

        let second = pipeline
            .generate(&Fixture::repositories(), &NoProgress)
            .unwrap();

        assert_eq!(first.written, 6);
        assert_eq!(second.written, 0);
        assert_eq!(second.skipped, 6);
        assert_eq!(fetcher.calls.load(Ordering::SeqCst), calls);
        assert_eq!(
            fs::read_to_string(fx.out.path().join("libfoo/2.1.0-r1/manifest.toml")).unwrap(),
            before
        );
    }

    #[test]
    fn test_fetch_failure_is_isolated() {
        let fx = Fixture::new();
        let fetcher = FakeFetcher::new(fx.scratch.path()).failing("openssl");
        let pipeline = Pipeline::new(fx.source.clone(), Synthesizer::new(fx.out.path(), &fetcher));

        let report = pipeline
            .generate(&Fixture::repositories(), &NoProgress)
            .unwrap();

        assert!(matches!(
            report.failures.get("openssl-1.9.0"),
            Some(PackageError::Fetch(_))
        ));
        // curl still points at openssl even though openssl has no manifest.
        assert_eq!(report.written, 5);
        assert_eq!(fx.manifest("curl", "7.80.0-r0").default_deps()[0], dep("openssl", "1.9.0"));
    }

    #[test]
    fn test_downloads_removed_after_write_failure() {
        let fx = Fixture::new();
        let fetcher = FakeFetcher::new(fx.scratch.path());
        let pipeline = Pipeline::new(fx.source.clone(), Synthesizer::new(fx.out.path(), &fetcher));

        // A file where musl's directory should go makes the write fail.
        fs::write(fx.out.path().join("musl"), "in the way").unwrap();

        let report = pipeline
            .generate(&Fixture::repositories(), &NoProgress)
            .unwrap();

        assert!(matches!(
            report.failures.get("musl-1.2.2-r7"),
            Some(PackageError::Io(_))
        ));
        for path in fetcher.fetched.lock().unwrap().iter() {
            assert!(!path.exists(), "{} left behind", path.display());
        }
    }

    #[test]
    fn test_parallel_run_matches_sequential() {
        let fx = Fixture::new();
        let fetcher = FakeFetcher::new(fx.scratch.path());
        let pipeline = Pipeline::new(fx.source.clone(), Synthesizer::new(fx.out.path(), &fetcher))
            .with_jobs(4);

        let report = pipeline
            .generate(&Fixture::repositories(), &NoProgress)
            .unwrap();

        assert_eq!(report.written, 6);
        assert_eq!(report.processed(), 7);
        assert_eq!(
            fx.manifest("libfoo", "2.1.0-r1").default_deps(),
            &[dep("libbar", "1.2.0"), dep("musl", "1.2.2-r7")]
        );
    }

    #[test]
    fn test_progress_sees_every_package() {
        struct Counting {
            total: AtomicUsize,
            advanced: AtomicUsize,
            finished: AtomicUsize,
        }

        impl Progress for Counting {
            fn start(&self, total: usize) {
                self.total.store(total, Ordering::SeqCst);
            }
            fn advance(&self, _package: &str) {
                self.advanced.fetch_add(1, Ordering::SeqCst);
            }
            fn finish(&self) {
                self.finished.fetch_add(1, Ordering::SeqCst);
            }
        }

        let fx = Fixture::new();
        let fetcher = FakeFetcher::new(fx.scratch.path());
        let pipeline = Pipeline::new(fx.source.clone(), Synthesizer::new(fx.out.path(), &fetcher))
            .with_jobs(2);
        let progress = Counting {
            total: AtomicUsize::new(0),
            advanced: AtomicUsize::new(0),
            finished: AtomicUsize::new(0),
        };

        pipeline
            .generate(&Fixture::repositories(), &progress)
            .unwrap();

        assert_eq!(progress.total.load(Ordering::SeqCst), 7);
        assert_eq!(progress.advanced.load(Ordering::SeqCst), 7);
        assert_eq!(progress.finished.load(Ordering::SeqCst), 1);
    }
}
