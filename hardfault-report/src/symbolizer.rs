//! Turns code addresses into function names and source locations

use std::{
    cell::RefCell,
    collections::HashMap,
    io,
    path::{Path, PathBuf},
    process::{Command, ExitStatus, Stdio},
};

use addr2line::Loader;

use crate::cortexm::{self, format_word};

/// What the addr2line family prints for anything it does not know.
const UNKNOWN: &str = "??";

/// An error occurred while resolving addresses.
#[derive(Debug, thiserror::Error)]
pub enum SymbolizerError {
    /// The firmware image does not exist.
    #[error("debug-symbol image `{}` does not exist", .0.display())]
    MissingImage(PathBuf),
    /// The firmware image path names a directory or something else that is not a file.
    #[error("debug-symbol image `{}` is not a file", .0.display())]
    NotAFile(PathBuf),
    /// The external symbolizer could not be started.
    #[error("failed to launch symbolizer `{}`", tool.display())]
    Launch {
        tool: PathBuf,
        #[source]
        source: io::Error,
    },
    /// The external symbolizer ran but reported a failure.
    #[error("symbolizer exited with {status}: {stderr}")]
    ToolFailed { status: ExitStatus, stderr: String },
    /// The external symbolizer printed something other than a function and a location line.
    #[error("unexpected symbolizer output {0:?}")]
    MalformedOutput(String),
    /// The firmware image could not be opened as an object file with debug information.
    #[error("failed to load debug information from `{}`: {message}", image.display())]
    DebugInfo { image: PathBuf, message: String },
    /// Reading the debug information for one address failed.
    #[error("lookup of {address:#010x} failed: {message}")]
    Lookup { address: u32, message: String },
}

impl SymbolizerError {
    fn launch(tool: &Path, source: io::Error) -> Self {
        SymbolizerError::Launch {
            tool: tool.to_owned(),
            source,
        }
    }
}

fn check_image(image: &Path) -> Result<(), SymbolizerError> {
    if !image.exists() {
        return Err(SymbolizerError::MissingImage(image.to_owned()));
    }
    if !image.is_file() {
        return Err(SymbolizerError::NotAFile(image.to_owned()));
    }
    Ok(())
}

/// Source level information about a code address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SymbolInfo {
    pub function_name: String,
    /// Last component of `file_path`.
    pub file_name: String,
    /// Empty when the location is unknown.
    pub file_path: String,
    /// `0` when the line is unknown.
    pub line: u32,
}

impl SymbolInfo {
    pub fn new(function_name: impl Into<String>, file_path: impl Into<String>, line: u32) -> Self {
        let file_path = file_path.into();
        let file_name = file_path
            .rsplit(['/', '\\'])
            .next()
            .unwrap_or_default()
            .to_owned();

        Self {
            function_name: function_name.into(),
            file_name,
            file_path,
            line,
        }
    }

    /// `file:line`, or an empty string when the location is unknown.
    pub fn location(&self, full_paths: bool) -> String {
        if self.file_path.is_empty() {
            return String::new();
        }

        let file = if full_paths {
            &self.file_path
        } else {
            &self.file_name
        };
        format!("{file}:{}", self.line)
    }
}

/// Maps code addresses to source level information.
///
/// `Ok(None)` means the address is not covered by the image. Errors only concern the one lookup;
/// callers treat both as "unresolved" and carry on.
pub trait Symbolizer {
    fn resolve(&self, address: u32) -> Result<Option<SymbolInfo>, SymbolizerError>;
}

impl<S: Symbolizer + ?Sized> Symbolizer for &S {
    fn resolve(&self, address: u32) -> Result<Option<SymbolInfo>, SymbolizerError> {
        (**self).resolve(address)
    }
}

impl<S: Symbolizer + ?Sized> Symbolizer for Box<S> {
    fn resolve(&self, address: u32) -> Result<Option<SymbolInfo>, SymbolizerError> {
        (**self).resolve(address)
    }
}

/// Runs an external addr2line compatible tool, e.g. `arm-none-eabi-addr2line`, once per address.
#[derive(Debug, Clone)]
pub struct Addr2LineTool {
    tool: PathBuf,
    image: PathBuf,
}

impl Addr2LineTool {
    /// Fails if `image` does not exist or `tool` cannot be started at all.
    pub fn new(
        tool: impl Into<PathBuf>,
        image: impl Into<PathBuf>,
    ) -> Result<Self, SymbolizerError> {
        let tool = tool.into();
        let image = image.into();
        check_image(&image)?;

        Command::new(&tool)
            .arg("--version")
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .map_err(|source| SymbolizerError::launch(&tool, source))?;

        Ok(Self { tool, image })
    }
}

impl Symbolizer for Addr2LineTool {
    fn resolve(&self, address: u32) -> Result<Option<SymbolInfo>, SymbolizerError> {
        let address = format_word(address);
        tracing::debug!("{} -e {} -f -C {address}", self.tool.display(), self.image.display());

        let output = Command::new(&self.tool)
            .arg("-e")
            .arg(&self.image)
            .args(["-f", "-C", &address])
            .stdin(Stdio::null())
            .output()
            .map_err(|source| SymbolizerError::launch(&self.tool, source))?;

        if !output.status.success() {
            return Err(SymbolizerError::ToolFailed {
                status: output.status,
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_owned(),
            });
        }

        parse_addr2line_output(&String::from_utf8_lossy(&output.stdout))
    }
}

/// Parses the two lines `addr2line -f` prints per address: the function, then `path:line`.
pub fn parse_addr2line_output(output: &str) -> Result<Option<SymbolInfo>, SymbolizerError> {
    let mut lines = output.lines().map(str::trim);
    let (Some(function), Some(location)) = (lines.next(), lines.next()) else {
        return Err(SymbolizerError::MalformedOutput(output.to_owned()));
    };

    if function.is_empty() || function == UNKNOWN {
        return Ok(None);
    }

    // e.g. `main.c:42 (discriminator 3)`
    let location = location
        .split_once(" (discriminator")
        .map_or(location, |(location, _)| location);
    let Some((path, line)) = location.rsplit_once(':') else {
        return Err(SymbolizerError::MalformedOutput(output.to_owned()));
    };

    let path = if path == UNKNOWN { "" } else { path };
    // `?` when only the file is known
    let line = line.parse().unwrap_or(0);

    Ok(Some(SymbolInfo::new(function, path, line)))
}

/// Resolves addresses in process from the DWARF sections of the image, falling back to the
/// symbol table for the function name.
pub struct DebugInfoSymbolizer {
    loader: Loader,
}

impl DebugInfoSymbolizer {
    pub fn new(image: impl AsRef<Path>) -> Result<Self, SymbolizerError> {
        let image = image.as_ref();
        check_image(image)?;

        let loader = Loader::new(image).map_err(|err| SymbolizerError::DebugInfo {
            image: image.to_owned(),
            message: err.to_string(),
        })?;

        Ok(Self { loader })
    }

    fn function_name(
        &self,
        address: u32,
        lookup_address: u64,
    ) -> Result<Option<String>, SymbolizerError> {
        let lookup_error = |message: String| SymbolizerError::Lookup { address, message };

        let mut frames = self
            .loader
            .find_frames(lookup_address)
            .map_err(|err| lookup_error(err.to_string()))?;
        let innermost = frames.next().map_err(|err| lookup_error(err.to_string()))?;

        Ok(innermost
            .and_then(|frame| {
                frame
                    .function
                    .and_then(|name| name.demangle().map(|name| name.into_owned()).ok())
            })
            .or_else(|| {
                self.loader
                    .find_symbol(lookup_address)
                    .map(|symbol| symbol.to_string())
            }))
    }
}

impl Symbolizer for DebugInfoSymbolizer {
    fn resolve(&self, address: u32) -> Result<Option<SymbolInfo>, SymbolizerError> {
        let lookup_address = if cortexm::is_thumb_bit_set(address) {
            let cleared = cortexm::clear_thumb_bit(address);
            tracing::trace!("looking up {address:#010x} as {cleared:#010x}");
            u64::from(cleared)
        } else {
            u64::from(address)
        };

        let Some(function_name) = self.function_name(address, lookup_address)? else {
            return Ok(None);
        };

        let location = self
            .loader
            .find_location(lookup_address)
            .map_err(|err| SymbolizerError::Lookup {
                address,
                message: err.to_string(),
            })?;
        let (path, line) = location
            .and_then(|location| Some((location.file?, location.line.unwrap_or(0))))
            .unwrap_or(("", 0));

        Ok(Some(SymbolInfo::new(function_name, path, line)))
    }
}

/// Remembers every answer of the wrapped symbolizer, so repeated addresses are looked up once.
///
/// Failed lookups are not remembered.
pub struct CachingSymbolizer<S> {
    inner: S,
    cache: RefCell<HashMap<u32, Option<SymbolInfo>>>,
}

impl<S: Symbolizer> CachingSymbolizer<S> {
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            cache: RefCell::new(HashMap::new()),
        }
    }
}

impl<S: Symbolizer> Symbolizer for CachingSymbolizer<S> {
    fn resolve(&self, address: u32) -> Result<Option<SymbolInfo>, SymbolizerError> {
        if let Some(cached) = self.cache.borrow().get(&address) {
            return Ok(cached.clone());
        }

        let resolved = self.inner.resolve(address)?;
        self.cache.borrow_mut().insert(address, resolved.clone());
        Ok(resolved)
    }
}
