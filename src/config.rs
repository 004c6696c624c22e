use std::path::{Path, PathBuf};

use itertools::Itertools;
use serde::{Deserialize, Serialize};

use crate::error::Error;

/// The control node helper and the device it should attach to.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ControlNode {
    /// Path to the helper executable which owns the serial device.
    pub helper: PathBuf,

    /// The device path handed to the helper.
    /// Likely "/dev/ttyACMx" or "COMx".
    pub tty: String,
}

/// A firmware console to scan.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Console {
    /// The console's device path.
    pub tty: String,

    /// Baud rate for the console.
    pub baud: u32,
}

/// The configuration used for running against a gateway.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// The control node, if this gateway has one.
    pub control_node: Option<ControlNode>,

    /// The firmware consoles available for scanning.
    pub consoles: Vec<Console>,
}

impl Config {
    fn ron() -> ron::Options {
        ron::Options::default()
            .with_default_extension(ron::extensions::Extensions::IMPLICIT_SOME)
            .with_default_extension(ron::extensions::Extensions::UNWRAP_NEWTYPES)
    }

    /// Deserialize a .ron file's contents.
    /// Panics if the input is not valid .ron.
    pub fn deserialize(input: &str) -> Self {
        Self::ron().from_str::<Config>(input).unwrap()
    }

    /// An example configuration with some fields filled in.
    pub fn example() -> Self {
        Self {
            control_node: Some(ControlNode {
                helper: "/usr/bin/control-node-serial".into(),
                tty: "/dev/ttyCN0".into(),
            }),
            consoles: vec![
                Console {
                    tty: "/dev/ttyON0".into(),
                    baud: 500_000,
                },
                Console {
                    tty: "/dev/ttyON1".into(),
                    baud: 115_200,
                },
            ],
        }
    }

    /// Serialize the configuration in a "pretty" (i.e. non-compact) fashion.
    pub fn serialize_pretty(&self) -> String {
        Self::ron()
            .to_string_pretty(self, ron::ser::PrettyConfig::default())
            .unwrap()
    }

    /// Setup a new configuration from a RON file.
    pub fn new_from_path<P: AsRef<Path>>(p: P) -> Self {
        let s = std::fs::read_to_string(p).unwrap();

        Self::deserialize(&s)
    }

    /// The configured baud rate for a console tty, if it is known.
    pub fn console_baud(&self, tty: &str) -> Option<u32> {
        self.consoles
            .iter()
            .find(|console| console.tty == tty)
            .map(|console| console.baud)
    }

    fn check_control_node(&self) -> Result<(), Error> {
        let Some(control_node) = &self.control_node else {
            return Ok(());
        };

        if control_node.helper.as_os_str().is_empty() {
            return Err(Error::BadConfig(
                "A control node needs a helper executable path".to_string(),
            ));
        }
        if control_node.tty.is_empty() {
            return Err(Error::BadConfig(
                "A control node needs a tty to attach its helper to".to_string(),
            ));
        }

        Ok(())
    }

    fn check_console_bauds(&self) -> Result<(), Error> {
        for console in &self.consoles {
            if console.baud == 0 {
                return Err(Error::BadConfig(format!(
                    "The console `{}` has a baud rate of zero",
                    console.tty
                )));
            }
        }

        Ok(())
    }

    fn check_duplicate_consoles(&self) -> Result<(), Error> {
        let duplicates = self
            .consoles
            .iter()
            .map(|console| &console.tty)
            .duplicates()
            .collect::<Vec<_>>();

        if duplicates.is_empty() {
            Ok(())
        } else {
            Err(Error::BadConfig(format!(
                "A console can only be scanned by one owner. Duplicates: {duplicates:?}"
            )))
        }
    }

    /// Check the configuration's invariants.
    pub fn validate(&self) -> Result<(), Error> {
        self.check_control_node()?;
        self.check_console_bauds()?;
        self.check_duplicate_consoles()?;

        Ok(())
    }
}
