//! GraphQL variables and the file values that may be embedded in them.
//!
//! A variable is either plain JSON, a single file, or a list of files. Files
//! are split out of the variables by [`partition`] before the operation is
//! encoded: the JSON payload carries `null` in each file slot and the files
//! themselves travel as parts of a multipart upload.

use bytes::Bytes;
use indexmap::IndexMap;
use serde_json::{Map, Value};
use std::fmt;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Something that can be uploaded as a file variable.
///
/// Implementors expose a file name (used for the multipart part and for
/// guessing its MIME type) and can be read into memory. Reading happens once
/// per call, when the upload is packed.
pub trait FileSource: Send + Sync {
    /// The file name sent with the upload.
    fn name(&self) -> &str;

    /// Reads the full content of the file.
    fn read(&self) -> io::Result<Bytes>;
}

/// A shared handle to a [`FileSource`].
pub type FileRef = Arc<dyn FileSource>;

/// A file whose content is already in memory.
///
/// # Examples
///
/// ```
/// use kirjava::{FileSource, InMemoryFile};
///
/// let file = InMemoryFile::new("notes.txt", "hello");
/// assert_eq!(file.name(), "notes.txt");
/// assert_eq!(file.read().unwrap(), &b"hello"[..]);
/// ```
#[derive(Debug, Clone)]
pub struct InMemoryFile {
    name: String,
    content: Bytes,
}

impl InMemoryFile {
    /// Creates a file named `name` holding `content`.
    pub fn new(name: impl Into<String>, content: impl Into<Bytes>) -> Self {
        Self {
            name: name.into(),
            content: content.into(),
        }
    }
}

impl FileSource for InMemoryFile {
    fn name(&self) -> &str {
        &self.name
    }

    fn read(&self) -> io::Result<Bytes> {
        Ok(self.content.clone())
    }
}

/// A file on the local filesystem, read when the upload is packed.
///
/// The upload name is the final component of the path.
#[derive(Debug, Clone)]
pub struct PathFile {
    path: PathBuf,
    name: String,
}

impl PathFile {
    /// Creates a file source for `path`.
    pub fn new(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref().to_path_buf();
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        Self { path, name }
    }

    /// Overrides the name sent with the upload.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// The path this source reads from.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl FileSource for PathFile {
    fn name(&self) -> &str {
        &self.name
    }

    fn read(&self) -> io::Result<Bytes> {
        std::fs::read(&self.path).map(Bytes::from)
    }
}

/// The value of a single GraphQL variable.
///
/// A list can hold files or JSON, never both: a mixed list has no
/// representation here, so it cannot reach the upload encoder.
#[derive(Clone)]
pub enum Variable {
    /// Plain JSON data.
    Value(Value),
    /// A single file, sent as `variables.<key>`.
    File(FileRef),
    /// A list of files, sent as `variables.<key>.<index>`.
    Files(Vec<FileRef>),
}

impl Variable {
    /// Creates a single-file variable.
    pub fn file(source: impl FileSource + 'static) -> Self {
        Variable::File(Arc::new(source))
    }

    /// Creates a file-list variable.
    pub fn files<I, F>(sources: I) -> Self
    where
        I: IntoIterator<Item = F>,
        F: FileSource + 'static,
    {
        Variable::Files(
            sources
                .into_iter()
                .map(|s| Arc::new(s) as FileRef)
                .collect(),
        )
    }

    /// Returns `true` if this variable carries at least one file.
    pub fn is_file_like(&self) -> bool {
        match self {
            Variable::Value(_) => false,
            Variable::File(_) => true,
            Variable::Files(files) => !files.is_empty(),
        }
    }
}

impl fmt::Debug for Variable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Variable::Value(value) => f.debug_tuple("Value").field(value).finish(),
            Variable::File(file) => f.debug_tuple("File").field(&file.name()).finish(),
            Variable::Files(files) => f
                .debug_tuple("Files")
                .field(&files.iter().map(|file| file.name()).collect::<Vec<_>>())
                .finish(),
        }
    }
}

impl From<Value> for Variable {
    fn from(value: Value) -> Self {
        Variable::Value(value)
    }
}

impl From<&str> for Variable {
    fn from(value: &str) -> Self {
        Variable::Value(Value::from(value))
    }
}

impl From<String> for Variable {
    fn from(value: String) -> Self {
        Variable::Value(Value::from(value))
    }
}

impl From<i64> for Variable {
    fn from(value: i64) -> Self {
        Variable::Value(Value::from(value))
    }
}

impl From<f64> for Variable {
    fn from(value: f64) -> Self {
        Variable::Value(Value::from(value))
    }
}

impl From<bool> for Variable {
    fn from(value: bool) -> Self {
        Variable::Value(Value::from(value))
    }
}

impl From<FileRef> for Variable {
    fn from(file: FileRef) -> Self {
        Variable::File(file)
    }
}

impl From<InMemoryFile> for Variable {
    fn from(file: InMemoryFile) -> Self {
        Variable::file(file)
    }
}

impl From<PathFile> for Variable {
    fn from(file: PathFile) -> Self {
        Variable::file(file)
    }
}

/// An insertion-ordered mapping of variable names to values.
///
/// Iteration order decides the order in which files are numbered in the
/// upload map, so it is always the order in which keys were first inserted.
///
/// # Examples
///
/// ```
/// use kirjava::{InMemoryFile, Variable, Variables};
///
/// let mut variables = Variables::new();
/// variables.insert("title", "Holiday");
/// variables.insert("image", InMemoryFile::new("beach.png", vec![0u8; 4]));
///
/// let keys: Vec<_> = variables.keys().collect();
/// assert_eq!(keys, ["title", "image"]);
/// assert!(variables.get("image").unwrap().is_file_like());
/// ```
#[derive(Debug, Clone, Default)]
pub struct Variables {
    entries: IndexMap<String, Variable>,
}

impl Variables {
    /// Creates an empty set of variables.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets `key` to `value`, keeping the key's original position if it
    /// was already present.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Variable>) {
        self.entries.insert(key.into(), value.into());
    }

    /// Returns the value for `key`.
    pub fn get(&self, key: &str) -> Option<&Variable> {
        self.entries.get(key)
    }

    /// Returns the number of variables.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if there are no variables.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterates over the variables in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Variable)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Iterates over the variable names in insertion order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }
}

impl<K, V> FromIterator<(K, V)> for Variables
where
    K: Into<String>,
    V: Into<Variable>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            entries: iter
                .into_iter()
                .map(|(key, value)| (key.into(), value.into()))
                .collect(),
        }
    }
}

impl From<Map<String, Value>> for Variables {
    fn from(map: Map<String, Value>) -> Self {
        map.into_iter().collect()
    }
}

/// The file part of a variable, as split out by [`partition`].
#[derive(Clone)]
pub enum FileSlot {
    /// A single file.
    Single(FileRef),
    /// A list of files, in list order.
    List(Vec<FileRef>),
}

impl fmt::Debug for FileSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FileSlot::Single(file) => f.debug_tuple("Single").field(&file.name()).finish(),
            FileSlot::List(files) => f
                .debug_tuple("List")
                .field(&files.iter().map(|file| file.name()).collect::<Vec<_>>())
                .finish(),
        }
    }
}

/// Files taken out of a set of variables, keyed by variable name in the
/// order they were found.
#[derive(Debug, Clone, Default)]
pub struct FileMap {
    entries: IndexMap<String, FileSlot>,
}

impl FileMap {
    /// Returns the number of file-carrying variables.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if no variable carried a file.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Returns the files taken out of variable `key`.
    pub fn get(&self, key: &str) -> Option<&FileSlot> {
        self.entries.get(key)
    }

    /// Iterates over the file slots in variable order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &FileSlot)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Iterates over every individual file with its `variables.` path, in
    /// upload index order.
    ///
    /// A single file yields `variables.<key>`; each element of a list
    /// yields `variables.<key>.<index>`.
    pub fn flatten(&self) -> impl Iterator<Item = (String, &FileRef)> {
        self.entries
            .iter()
            .flat_map(|(key, slot)| match slot {
                FileSlot::Single(file) => vec![(format!("variables.{key}"), file)],
                FileSlot::List(files) => files
                    .iter()
                    .enumerate()
                    .map(|(i, file)| (format!("variables.{key}.{i}"), file))
                    .collect::<Vec<_>>(),
            })
    }

    pub(crate) fn insert(&mut self, key: impl Into<String>, slot: FileSlot) {
        self.entries.insert(key.into(), slot);
    }
}

impl FromIterator<(String, FileSlot)> for FileMap {
    fn from_iter<I: IntoIterator<Item = (String, FileSlot)>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}

/// Variables split into their JSON payload and their files.
#[derive(Debug, Clone, Default)]
pub struct Partitioned {
    /// The JSON variables, with `null` wherever a file was taken out.
    ///
    /// `None` when no variables were given at all.
    pub variables: Option<Map<String, Value>>,
    /// The files, keyed by variable name.
    pub files: FileMap,
}

/// Splits file values out of `variables`.
///
/// A single file becomes `null`; a non-empty list of files becomes a list of
/// `null` of the same length. Every other value passes through unchanged.
///
/// # Examples
///
/// ```
/// use kirjava::{partition, InMemoryFile, Variable, Variables};
/// use serde_json::json;
///
/// let mut variables = Variables::new();
/// variables.insert("caption", "Sunset");
/// variables.insert(
///     "photos",
///     Variable::files([InMemoryFile::new("a.jpg", "a"), InMemoryFile::new("b.jpg", "b")]),
/// );
///
/// let split = partition(Some(&variables));
/// assert_eq!(
///     serde_json::Value::Object(split.variables.unwrap()),
///     json!({"caption": "Sunset", "photos": [null, null]})
/// );
/// assert_eq!(split.files.len(), 1);
/// ```
pub fn partition(variables: Option<&Variables>) -> Partitioned {
    let Some(variables) = variables else {
        return Partitioned::default();
    };

    let mut sanitized = Map::with_capacity(variables.len());
    let mut files = FileMap::default();

    for (key, value) in variables.iter() {
        let json = match value {
            Variable::Value(value) => value.clone(),
            Variable::File(file) => {
                files.insert(key, FileSlot::Single(Arc::clone(file)));
                Value::Null
            }
            Variable::Files(list) if list.is_empty() => Value::Array(Vec::new()),
            Variable::Files(list) => {
                files.insert(key, FileSlot::List(list.clone()));
                Value::Array(vec![Value::Null; list.len()])
            }
        };
        sanitized.insert(key.to_string(), json);
    }

    Partitioned {
        variables: Some(sanitized),
        files,
    }
}
