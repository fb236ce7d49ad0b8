/*
Copyright 2024-2025 The Canonica Authors

Licensed under the Apache License, Version 2.0 (the "License");
you may not use this file except in compliance with the License.
You may obtain a copy of the License at

     https://www.apache.org/licenses/LICENSE-2.0

Unless required by applicable law or agreed to in writing, software
distributed under the License is distributed on an "AS IS" BASIS,
WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
See the License for the specific language governing permissions and
limitations under the License.
*/

//! Composition-root errors and the §6 "Exit codes from errors" mapping.

use snafu::Snafu;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum Error {
    #[snafu(display("{source}"))]
    Config { source: canonica_config::ConfigError },

    #[snafu(display("{source}"))]
    Core { source: canonica_core::error::Error },

    #[snafu(display("unable to read config file {path}: {source}"))]
    ReadConfig { path: String, source: std::io::Error },
}

impl From<canonica_config::ConfigError> for Error {
    fn from(source: canonica_config::ConfigError) -> Self {
        Error::Config { source }
    }
}

impl From<canonica_core::error::Error> for Error {
    fn from(source: canonica_core::error::Error) -> Self {
        Error::Core { source }
    }
}

impl Error {
    /// §6: validation=1, auth=2, engine=3, internal=4. Config-layer errors
    /// are all shapes of misconfiguration, so they map to validation.
    pub fn exit_code(&self) -> i32 {
        match self {
            Error::Config { .. } => 1,
            Error::Core { source } => source.code() as i32,
            Error::ReadConfig { .. } => 4,
        }
    }
}
