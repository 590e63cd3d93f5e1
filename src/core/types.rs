use super::error::{FileError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs::OpenOptions;
use std::str::FromStr;

/// How a managed file is opened
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OpenMode {
    /// Read an existing file (restart state, initial configuration)
    Read,
    /// Create or truncate, fresh run
    Write,
    /// Create or continue at the end, restarted run
    Append,
}

impl OpenMode {
    pub fn options(self) -> OpenOptions {
        let mut options = OpenOptions::new();
        match self {
            OpenMode::Read => {
                options.read(true);
            }
            OpenMode::Write => {
                options.read(true).write(true).create(true).truncate(true);
            }
            OpenMode::Append => {
                options.read(true).append(true).create(true);
            }
        }
        options
    }

    /// Mode used to get a handle back on a file without losing its content
    pub fn preserving(self) -> Self {
        match self {
            OpenMode::Read => OpenMode::Read,
            OpenMode::Write | OpenMode::Append => OpenMode::Append,
        }
    }
}

/// Statistical ensemble of the run, embedded in every file name
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Ensemble {
    Canonical,
    GrandCanonical,
}

impl Ensemble {
    pub fn as_str(&self) -> &'static str {
        match self {
            Ensemble::Canonical => "canonical",
            Ensemble::GrandCanonical => "grand_canonical",
        }
    }
}

impl fmt::Display for Ensemble {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Ensemble {
    type Err = FileError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "canonical" | "ce" => Ok(Ensemble::Canonical),
            "grand_canonical" | "gce" => Ok(Ensemble::GrandCanonical),
            other => Err(FileError::config(format!("unknown ensemble '{}'", other))),
        }
    }
}

macro_rules! file_kinds {
    ($($variant:ident => $name:literal),+ $(,)?) => {
        /// Logical role of an output or input file
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(rename_all = "snake_case")]
        pub enum FileKind {
            $($variant),+
        }

        impl FileKind {
            pub const ALL: &'static [FileKind] = &[$(FileKind::$variant),+];

            pub fn as_str(&self) -> &'static str {
                match self {
                    $(FileKind::$variant => $name),+
                }
            }
        }

        impl FromStr for FileKind {
            type Err = FileError;

            fn from_str(s: &str) -> Result<Self> {
                match s {
                    $($name => Ok(FileKind::$variant),)+
                    other => Err(FileError::config(format!("unknown file type '{}'", other))),
                }
            }
        }
    };
}

file_kinds! {
    Log => "log",
    Estimator => "estimator",
    Super => "super",
    State => "state",
    Init => "init",
    Fixed => "fixed",
    Worldline => "worldline",
    PermCycle => "perm_cycle",
    Obdm => "obdm",
    Pair => "pair",
    Radial => "radial",
    Worm => "worm",
    Number => "number",
    Position => "position",
    WindDens => "wind_dens",
    Debug => "debug",
    CylEstimator => "cyl_estimator",
    CylSuper => "cyl_super",
    CylNumber => "cyl_number",
    CylObdm => "cyl_obdm",
    CylPair => "cyl_pair",
    CylPotential => "cyl_potential",
}

impl FileKind {
    /// Files measured in the cylinder sub-geometry live in their own directory
    pub fn is_cylinder(&self) -> bool {
        self.as_str().starts_with("cyl_")
    }

    /// Files read as input rather than produced by the run
    pub fn is_input(&self) -> bool {
        matches!(self, FileKind::Init | FileKind::Fixed)
    }
}

impl fmt::Display for FileKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
