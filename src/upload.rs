//! Encoding of file uploads as a GraphQL multipart request.
//!
//! A multipart request carries three kinds of parts:
//!
//! - `operations`: the usual `{"variables": …, "query": …}` JSON, with each
//!   file slot set to `null`;
//! - `map`: a JSON object from upload index (`"0"`, `"1"`, …) to a
//!   one-element list holding the path of the slot the file fills, e.g.
//!   `["variables.image"]` or `["variables.images.1"]`;
//! - one file part per index, named by that index.
//!
//! [`build_map`] and [`pack_files`] both number files through
//! [`FileMap::flatten`], so index `i` in the map always describes the `i`-th
//! packed file.

use crate::variables::FileMap;
use crate::{Error, Result};
use bytes::Bytes;
use serde_json::{Map, Value};

/// A file read into memory and ready to be sent as a multipart part.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilePayload {
    /// The file name sent with the part.
    pub filename: String,
    /// The full file content.
    pub content: Bytes,
    /// The MIME type guessed from the file name, if any.
    pub content_type: Option<String>,
}

/// Builds the `map` part of a multipart request.
///
/// # Examples
///
/// ```
/// use kirjava::{build_map, partition, InMemoryFile, Variables};
/// use serde_json::{json, Value};
///
/// let mut variables = Variables::new();
/// variables.insert("image", InMemoryFile::new("a.txt", "hi"));
///
/// let split = partition(Some(&variables));
/// assert_eq!(
///     Value::Object(build_map(&split.files)),
///     json!({"0": ["variables.image"]})
/// );
/// ```
pub fn build_map(files: &FileMap) -> Map<String, Value> {
    files
        .flatten()
        .enumerate()
        .map(|(index, (path, _))| (index.to_string(), Value::Array(vec![Value::String(path)])))
        .collect()
}

/// Reads every file into memory, keyed by upload index.
///
/// Each file is read exactly once. The MIME type is guessed from the file
/// name and left empty when the extension is unknown.
///
/// # Errors
///
/// Returns [`Error::FileRead`] if any file cannot be read.
pub fn pack_files(files: &FileMap) -> Result<Vec<(String, FilePayload)>> {
    files
        .flatten()
        .enumerate()
        .map(|(index, (_, file))| {
            let filename = file.name().to_string();
            let content = file.read().map_err(|source| Error::FileRead {
                name: filename.clone(),
                source,
            })?;
            let content_type = guess_content_type(&filename);
            Ok((
                index.to_string(),
                FilePayload {
                    filename,
                    content,
                    content_type,
                },
            ))
        })
        .collect()
}

/// Guesses a MIME type from a file name's extension.
pub fn guess_content_type(filename: &str) -> Option<String> {
    mime_guess::from_path(filename)
        .first()
        .map(|mime| mime.essence_str().to_string())
}

/// A fully encoded multipart GraphQL request.
#[derive(Debug, Clone)]
pub struct MultipartUpload {
    /// The JSON-encoded operation, with file slots set to `null`.
    pub operations: String,
    /// The JSON-encoded upload map.
    pub map: String,
    /// The packed files, keyed by upload index.
    pub files: Vec<(String, FilePayload)>,
}

impl MultipartUpload {
    /// Encodes `operations` together with the files found by partitioning.
    ///
    /// # Errors
    ///
    /// Returns an error if the map cannot be encoded or a file cannot be read.
    pub fn new(operations: String, files: &FileMap) -> Result<Self> {
        let map = serde_json::to_string(&build_map(files))?;
        let files = pack_files(files)?;
        Ok(Self {
            operations,
            map,
            files,
        })
    }

    /// Builds a `reqwest` form for one attempt.
    ///
    /// Forms are consumed when sent, so every retry builds a fresh one. File
    /// parts share the packed content instead of copying it.
    pub(crate) fn to_form(&self) -> Result<reqwest::multipart::Form> {
        let mut form = reqwest::multipart::Form::new()
            .text("operations", self.operations.clone())
            .text("map", self.map.clone());

        for (index, payload) in &self.files {
            let length = payload.content.len() as u64;
            let body = reqwest::Body::from(payload.content.clone());
            let mut part = reqwest::multipart::Part::stream_with_length(body, length)
                .file_name(payload.filename.clone());
            if let Some(content_type) = &payload.content_type {
                part = part.mime_str(content_type).map_err(|e| {
                    Error::ConfigurationError(format!("Invalid MIME type {content_type}: {e}"))
                })?;
            }
            form = form.part(index.clone(), part);
        }

        Ok(form)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::variables::{partition, FileSource, InMemoryFile, Variable, Variables};
    use serde_json::json;
    use std::io;

    struct UnreadableFile;

    impl FileSource for UnreadableFile {
        fn name(&self) -> &str {
            "locked.bin"
        }

        fn read(&self) -> io::Result<Bytes> {
            Err(io::Error::new(io::ErrorKind::PermissionDenied, "locked"))
        }
    }

    fn file(name: &str) -> InMemoryFile {
        InMemoryFile::new(name, format!("content of {name}"))
    }

    fn mixed_files() -> FileMap {
        let mut variables = Variables::new();
        variables.insert("image1", file("file1.txt"));
        variables.insert("images", Variable::files([file("file2.txt"), file("file3.txt")]));
        variables.insert("caption", "ignored");
        variables.insert("image2", file("file4.txt"));
        partition(Some(&variables)).files
    }

    #[test]
    fn test_map_for_single_files() {
        let mut variables = Variables::new();
        variables.insert("image1", file("x.png"));
        variables.insert("image2", file("y.png"));
        let files = partition(Some(&variables)).files;

        assert_eq!(
            Value::Object(build_map(&files)),
            json!({"0": ["variables.image1"], "1": ["variables.image2"]})
        );
    }

    #[test]
    fn test_map_for_file_lists() {
        assert_eq!(
            Value::Object(build_map(&mixed_files())),
            json!({
                "0": ["variables.image1"],
                "1": ["variables.images.0"],
                "2": ["variables.images.1"],
                "3": ["variables.image2"],
            })
        );
    }

    #[test]
    fn test_pack_files_reads_content_and_guesses_type() {
        let packed = pack_files(&mixed_files()).unwrap();

        let expected: Vec<(String, FilePayload)> = (1..=4)
            .map(|n| {
                let name = format!("file{n}.txt");
                (
                    (n - 1).to_string(),
                    FilePayload {
                        content: Bytes::from(format!("content of {name}")),
                        filename: name,
                        content_type: Some("text/plain".to_string()),
                    },
                )
            })
            .collect();

        assert_eq!(packed, expected);
    }

    #[test]
    fn test_map_and_pack_are_aligned() {
        let files = mixed_files();
        let map = build_map(&files);
        let packed = pack_files(&files).unwrap();

        assert_eq!(map.len(), packed.len());
        for ((map_index, path), (pack_index, payload)) in map.iter().zip(&packed) {
            assert_eq!(map_index, pack_index);
            let path = path[0].as_str().unwrap();
            match path {
                "variables.image1" => assert_eq!(payload.filename, "file1.txt"),
                "variables.images.0" => assert_eq!(payload.filename, "file2.txt"),
                "variables.images.1" => assert_eq!(payload.filename, "file3.txt"),
                "variables.image2" => assert_eq!(payload.filename, "file4.txt"),
                other => panic!("Unexpected path {other}"),
            }
        }
    }

    #[test]
    fn test_unknown_extension_has_no_content_type() {
        assert_eq!(guess_content_type("blob.unknownext"), None);
        assert_eq!(guess_content_type("README"), None);
        assert_eq!(guess_content_type("photo.png").as_deref(), Some("image/png"));
    }

    #[test]
    fn test_unreadable_file_reports_name() {
        let mut variables = Variables::new();
        variables.insert("secret", Variable::file(UnreadableFile));
        let files = partition(Some(&variables)).files;

        match pack_files(&files) {
            Err(Error::FileRead { name, source }) => {
                assert_eq!(name, "locked.bin");
                assert_eq!(source.kind(), io::ErrorKind::PermissionDenied);
            }
            other => panic!("Expected FileRead, got {:?}", other),
        }
    }

    #[test]
    fn test_multipart_upload_encodes_map() {
        let mut variables = Variables::new();
        variables.insert("image", file("a.txt"));
        let split = partition(Some(&variables));

        let upload = MultipartUpload::new("{}".to_string(), &split.files).unwrap();

        assert_eq!(upload.map, r#"{"0":["variables.image"]}"#);
        assert_eq!(upload.files.len(), 1);
        assert_eq!(upload.files[0].1.filename, "a.txt");
    }

    #[test]
    fn test_packed_content_is_shared_with_source() {
        let content = Bytes::from_static(b"large payload");
        let mut variables = Variables::new();
        variables.insert("blob", InMemoryFile::new("blob.bin", content.clone()));
        let split = partition(Some(&variables));

        let upload = MultipartUpload::new("{}".to_string(), &split.files).unwrap();

        assert_eq!(upload.files[0].1.content.as_ptr(), content.as_ptr());
        assert!(upload.to_form().is_ok());
        assert!(upload.to_form().is_ok());
    }
}
