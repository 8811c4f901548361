//! Configuration file support
//!
//! Everything has a default, so an empty file (or no file) gives the
//! standard rules. Dates are quoted ISO strings:
//!
//! ```toml
//! [parse]
//! date_mode = "strict"
//! row_tolerance = 3.0
//!
//! [night]
//! min_date = "2022-03-30"
//! windows = [
//!     { start = "22:00", end = "24:59" },
//!     { start = "04:00", end = "06:00" },
//! ]
//!
//! [night.tariff]
//! rate_after = 0.062
//! tiers = [{ until = "2025-04-25", rate = 0.05 }]
//! ```

use crate::night::NightConfig;
use crate::table::ParseOptions;
use crate::Error;
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub parse: ParseOptions,
    pub night: NightConfig,
}

impl Config {
    pub fn from_toml_str(text: &str) -> Result<Self, Error> {
        let config: Config = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, Error> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    fn validate(&self) -> Result<(), Error> {
        if self.parse.row_tolerance < 0.0 || self.parse.column_tolerance < 0.0 {
            return Err(Error::Config("tolerances must not be negative".into()));
        }
        if let Some(w) = self.night.windows.iter().find(|w| w.end < w.start) {
            return Err(Error::Config(format!(
                "night window {}-{} ends before it starts; \
                 write it as two windows ending at 24:59 and starting at 01:00",
                w.start, w.end
            )));
        }
        if self
            .night
            .tariff
            .tiers
            .windows(2)
            .any(|pair| pair[0].until >= pair[1].until)
        {
            return Err(Error::Config("tariff tiers must be sorted by date".into()));
        }
        Ok(())
    }
}
