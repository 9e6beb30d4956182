// SPDX-License-Identifier: GPL-3.0-only

//! Publish stored results into a bundle directory
//!
//! Every result marked for bundling is linked (or copied) into the bundle
//! directory as `<basename>-<build id>`, optionally gzip compressed and
//! accompanied by a `.sha256` file.

use std::collections::HashMap;
use std::fs::{self, File};
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};

use flate2::Compression;
use flate2::write::GzEncoder;
use sha2::{Digest, Sha256};
use tracing::{debug, info};

use crate::error::{Result, ResultError};
use crate::store::ResultStore;

/// Name of the dumped [`ResultStore`] inside a build's target directory
pub const RESULT_FILE_NAME: &str = "image.result";

#[derive(Debug, Clone)]
pub struct BundleRequest {
    /// Directory holding the build output and its result file
    pub target_dir: PathBuf,
    pub bundle_dir: PathBuf,
    pub build_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BundledFile {
    pub key: String,
    pub path: PathBuf,
    /// Hex sha256 of `path`, when requested by the result record
    pub checksum: Option<String>,
}

/// Bundle all results found in the request's target directory
pub fn bundle(request: &BundleRequest) -> Result<Vec<BundledFile>> {
    if request.build_id.trim().is_empty() {
        return Err(ResultError::Bundle {
            reason: "build id must not be empty".to_string(),
        });
    }

    if same_directory(&request.target_dir, &request.bundle_dir) {
        return Err(ResultError::Bundle {
            reason: format!(
                "bundle directory {:?} must differ from target directory",
                request.bundle_dir
            ),
        });
    }

    let store = ResultStore::load(&request.target_dir.join(RESULT_FILE_NAME))?;

    fs::create_dir_all(&request.bundle_dir).map_err(|source| ResultError::Io {
        path: request.bundle_dir.clone(),
        source,
    })?;

    info!("Bundle build results into {:?}", request.bundle_dir);
    let mut bundled = Vec::new();
    // Output paths written by this run, mapped to the result key owning them
    let mut written: HashMap<PathBuf, &str> = HashMap::new();
    for (key, record) in store.get_results() {
        if !record.use_for_bundle {
            debug!("Skipping {} for bundle", key);
            continue;
        }

        let source = Path::new(&record.filename);
        let mut path = request
            .bundle_dir
            .join(format!("{}-{}", record.basename(), request.build_id));

        let mut outputs = vec![path.clone()];
        if record.compress {
            outputs.push(gz_path(&path));
        }
        for output in &outputs {
            if let Some(owner) = written.get(output) {
                return Err(ResultError::Bundle {
                    reason: format!(
                        "results '{}' and '{}' both bundle to {:?}",
                        owner, key, output
                    ),
                });
            }
        }
        for output in outputs {
            written.insert(output, key);
        }

        link_or_copy(source, &path)?;

        if record.compress {
            path = compress(&path)?;
        }

        let checksum = if record.shasum {
            Some(write_checksum(&path)?)
        } else {
            None
        };

        info!("--> {}: {:?}", key, path);
        bundled.push(BundledFile {
            key: key.clone(),
            path,
            checksum,
        });
    }

    Ok(bundled)
}

fn same_directory(a: &Path, b: &Path) -> bool {
    let a = fs::canonicalize(a).unwrap_or_else(|_| a.to_path_buf());
    let b = fs::canonicalize(b).unwrap_or_else(|_| b.to_path_buf());
    a == b
}

fn io_error(path: &Path) -> impl FnOnce(io::Error) -> ResultError + '_ {
    move |source| ResultError::Io {
        path: path.to_path_buf(),
        source,
    }
}

fn link_or_copy(source: &Path, destination: &Path) -> Result<()> {
    if destination.exists() {
        fs::remove_file(destination).map_err(io_error(destination))?;
    }

    if let Err(e) = fs::hard_link(source, destination) {
        debug!("Hard link {:?} failed ({}), copying instead", source, e);
        fs::copy(source, destination).map_err(io_error(source))?;
    }

    Ok(())
}

fn gz_path(path: &Path) -> PathBuf {
    let mut compressed = path.as_os_str().to_owned();
    compressed.push(".gz");
    PathBuf::from(compressed)
}

/// Gzip `path` to `<path>.gz` and remove the uncompressed file
fn compress(path: &Path) -> Result<PathBuf> {
    let compressed = gz_path(path);

    let mut input = File::open(path).map_err(io_error(path))?;
    let output = File::create(&compressed).map_err(io_error(&compressed))?;
    let mut encoder = GzEncoder::new(output, Compression::default());
    io::copy(&mut input, &mut encoder).map_err(io_error(&compressed))?;
    encoder
        .finish()
        .and_then(|mut file| file.flush())
        .map_err(io_error(&compressed))?;

    fs::remove_file(path).map_err(io_error(path))?;
    Ok(compressed)
}

/// Write `<path>.sha256` in `sha256sum` format and return the digest
fn write_checksum(path: &Path) -> Result<String> {
    let mut file = File::open(path).map_err(io_error(path))?;
    let mut hasher = Sha256::new();
    let mut buffer = [0u8; 64 * 1024];
    loop {
        let read = file.read(&mut buffer).map_err(io_error(path))?;
        if read == 0 {
            break;
        }
        hasher.update(&buffer[..read]);
    }
    let digest = hex::encode(hasher.finalize());

    let file_name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();
    let mut checksum_path = path.as_os_str().to_owned();
    checksum_path.push(".sha256");
    let checksum_path = PathBuf::from(checksum_path);

    fs::write(&checksum_path, format!("{}  {}\n", digest, file_name))
        .map_err(io_error(&checksum_path))?;

    Ok(digest)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use flate2::read::GzDecoder;
    use image_types::ResultFileOptions;

    use super::*;
    use crate::config::Unconstrained;

    // sha256 of "data"
    const DATA_SHA256: &str = "3a6eb0790f39ac87c94f3856b2dd2c5d110e6811602261a9a923d3bb23adc8b7";

    struct Build {
        _scratch: tempfile::TempDir,
        target_dir: PathBuf,
        bundle_dir: PathBuf,
    }

    fn build(records: &[(&str, &str, ResultFileOptions)]) -> Build {
        let scratch = tempfile::tempdir().unwrap();
        let target_dir = scratch.path().join("target_dir");
        let bundle_dir = scratch.path().join("bundle_dir");
        fs::create_dir(&target_dir).unwrap();

        let mut store = ResultStore::new(Arc::new(Unconstrained));
        for (key, name, options) in records {
            let file = target_dir.join(name);
            if let Some(parent) = file.parent() {
                fs::create_dir_all(parent).unwrap();
            }
            fs::write(&file, b"data").unwrap();
            store
                .add(key, &file.to_string_lossy(), *options)
                .unwrap();
        }
        store.dump(&target_dir.join(RESULT_FILE_NAME)).unwrap();

        Build {
            _scratch: scratch,
            target_dir,
            bundle_dir,
        }
    }

    fn request(build: &Build) -> BundleRequest {
        BundleRequest {
            target_dir: build.target_dir.clone(),
            bundle_dir: build.bundle_dir.clone(),
            build_id: "Build_42".to_string(),
        }
    }

    #[test]
    fn bundles_compressed_result_with_checksum() {
        let build = build(&[("keyname", "filename-1.2.3", ResultFileOptions::compressed())]);

        let bundled = bundle(&request(&build)).unwrap();

        let expected = build.bundle_dir.join("filename-1.2.3-Build_42.gz");
        assert_eq!(bundled.len(), 1);
        assert_eq!(bundled[0].key, "keyname");
        assert_eq!(bundled[0].path, expected);
        assert!(!build.bundle_dir.join("filename-1.2.3-Build_42").exists());

        let mut decoded = String::new();
        GzDecoder::new(File::open(&expected).unwrap())
            .read_to_string(&mut decoded)
            .unwrap();
        assert_eq!(decoded, "data");

        let checksum = fs::read_to_string(build.bundle_dir.join("filename-1.2.3-Build_42.gz.sha256"))
            .unwrap();
        let digest = bundled[0].checksum.clone().unwrap();
        assert_eq!(checksum, format!("{}  filename-1.2.3-Build_42.gz\n", digest));
        assert!(build.target_dir.join("filename-1.2.3").exists());
    }

    #[test]
    fn plain_result_is_linked_with_checksum() {
        let build = build(&[("disk_image", "disk.raw", ResultFileOptions::default())]);

        let bundled = bundle(&request(&build)).unwrap();

        let expected = build.bundle_dir.join("disk.raw-Build_42");
        assert_eq!(fs::read(&expected).unwrap(), b"data");
        assert_eq!(bundled[0].checksum.as_deref(), Some(DATA_SHA256));
        assert_eq!(
            fs::read_to_string(build.bundle_dir.join("disk.raw-Build_42.sha256")).unwrap(),
            format!("{}  disk.raw-Build_42\n", DATA_SHA256)
        );
    }

    #[test]
    fn honours_bundle_flags() {
        let build = build(&[
            (
                "image_packages",
                "disk.packages",
                ResultFileOptions {
                    use_for_bundle: false,
                    compress: false,
                    shasum: false,
                },
            ),
            (
                "image_verified",
                "disk.verified",
                ResultFileOptions {
                    use_for_bundle: true,
                    compress: false,
                    shasum: false,
                },
            ),
        ]);

        let bundled = bundle(&request(&build)).unwrap();

        assert_eq!(bundled.len(), 1);
        assert_eq!(bundled[0].key, "image_verified");
        assert_eq!(bundled[0].checksum, None);
        assert!(!build.bundle_dir.join("disk.packages-Build_42").exists());
        assert!(!build.bundle_dir.join("disk.verified-Build_42.sha256").exists());
    }

    #[test]
    fn rebundling_replaces_previous_output() {
        let build = build(&[("disk_image", "disk.raw", ResultFileOptions::default())]);

        bundle(&request(&build)).unwrap();
        let bundled = bundle(&request(&build)).unwrap();

        assert_eq!(fs::read(&bundled[0].path).unwrap(), b"data");
    }

    #[test]
    fn results_sharing_a_basename_are_rejected() {
        let build = build(&[
            ("first", "a/disk.raw", ResultFileOptions::default()),
            ("second", "b/disk.raw", ResultFileOptions::default()),
        ]);
        fs::write(build.target_dir.join("a/disk.raw"), b"AAAA").unwrap();
        fs::write(build.target_dir.join("b/disk.raw"), b"BBBB").unwrap();
        let mut request = request(&build);
        request.build_id = "B1".to_string();

        let error = bundle(&request).unwrap_err();

        match error {
            ResultError::Bundle { reason } => {
                assert!(reason.contains("'first'"), "{reason}");
                assert!(reason.contains("'second'"), "{reason}");
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(
            fs::read(build.bundle_dir.join("disk.raw-B1")).unwrap(),
            b"AAAA"
        );
    }

    #[test]
    fn compressed_result_still_claims_its_plain_name() {
        let build = build(&[
            ("archive", "disk.raw", ResultFileOptions::compressed()),
            ("plain", "x/disk.raw", ResultFileOptions::default()),
        ]);

        assert!(matches!(
            bundle(&request(&build)).unwrap_err(),
            ResultError::Bundle { .. }
        ));
    }

    #[test]
    fn bundle_dir_must_differ_from_target_dir() {
        let build = build(&[]);
        let mut request = request(&build);
        request.bundle_dir = build.target_dir.clone();

        let error = bundle(&request).unwrap_err();
        assert!(matches!(error, ResultError::Bundle { .. }));
    }

    #[test]
    fn requires_build_id() {
        let build = build(&[]);
        let mut request = request(&build);
        request.build_id = String::new();

        assert!(matches!(
            bundle(&request).unwrap_err(),
            ResultError::Bundle { .. }
        ));
    }

    #[test]
    fn missing_result_file_is_not_found() {
        let scratch = tempfile::tempdir().unwrap();
        let request = BundleRequest {
            target_dir: scratch.path().join("target_dir"),
            bundle_dir: scratch.path().join("bundle_dir"),
            build_id: "Build_42".to_string(),
        };

        assert!(matches!(
            bundle(&request).unwrap_err(),
            ResultError::NotFound { .. }
        ));
    }
}
