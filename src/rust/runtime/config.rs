// Copyright (c) Microsoft Corporation.
// Licensed under the MIT license.

//======================================================================================================================
// Imports
//======================================================================================================================

use crate::runtime::{
    fail::Fail,
    memory::{
        BackingKind,
        DEFAULT_HEADROOM,
        DEFAULT_SEGMENT_SIZE,
    },
};
use ::std::{
    fs::File,
    io::Read,
    ops::Index,
    str::FromStr,
};
use ::yaml_rust::{
    Yaml,
    YamlLoader,
};

//======================================================================================================================
// Constants
//======================================================================================================================

// Packet buffer options.
mod packet_buffer_config {
    pub const SECTION_NAME: &str = "packet_buffer";
    // Backing strategy used for new buffers ("heap" or "segmented").
    pub const BACKING: &str = "backing";
    // Data bytes described by each native segment.
    pub const SEGMENT_SIZE: &str = "segment_size";
    // Headroom reserved by default constructors.
    pub const DEFAULT_HEADROOM: &str = "default_headroom";
}

//======================================================================================================================
// Structures
//======================================================================================================================

/// Packet buffer configuration.
#[derive(Clone, Debug)]
pub struct Config(pub Yaml);

//======================================================================================================================
// Associated Functions
//======================================================================================================================

/// Common associated functions for packet buffer configuration object.
impl Config {
    /// Reads a configuration file into a [Config] object.
    pub fn new(config_path: &str) -> Result<Self, Fail> {
        let mut config_s: String = String::new();
        File::open(config_path)?.read_to_string(&mut config_s)?;
        Self::from_yaml_str(&config_s)
    }

    /// Parses a YAML document into a [Config] object.
    pub fn from_yaml_str(config_s: &str) -> Result<Self, Fail> {
        let config: Vec<Yaml> = YamlLoader::load_from_str(config_s)?;
        let config_obj: &Yaml = match &config[..] {
            &[ref c] => c,
            _ => return Err(Fail::new(libc::EINVAL, "Wrong number of config objects")),
        };

        Ok(Self(config_obj.clone()))
    }

    /// Returns a configuration holding no options, so every getter reports its default.
    pub fn empty() -> Self {
        Self(Yaml::Hash(Default::default()))
    }

    /// Reads the backing strategy from the environment variable first and then the underlying configuration file.
    pub fn backing(&self) -> Result<BackingKind, Fail> {
        if let Some(kind) = Self::get_typed_env_option(packet_buffer_config::BACKING)? {
            return Ok(kind);
        }
        match self.get_packet_buffer_config() {
            Some(section) if !section.index(packet_buffer_config::BACKING).is_badvalue() => {
                Self::get_typed_str_option(section, packet_buffer_config::BACKING, |val: &str| val.parse().ok())
            },
            _ => Ok(BackingKind::Heap),
        }
    }

    /// Reads the native segment size. The value must fit the 16-bit length fields of a segment descriptor.
    pub fn segment_size(&self) -> Result<u16, Fail> {
        let size: u16 = if let Some(size) = Self::get_typed_env_option(packet_buffer_config::SEGMENT_SIZE)? {
            size
        } else {
            match self.get_packet_buffer_config() {
                Some(section) if !section.index(packet_buffer_config::SEGMENT_SIZE).is_badvalue() => {
                    Self::get_int_option(section, packet_buffer_config::SEGMENT_SIZE)?
                },
                _ => DEFAULT_SEGMENT_SIZE,
            }
        };

        if size == 0 {
            let cause: &str = "segment size must be non-zero";
            error!("segment_size(): {}", cause);
            return Err(Fail::new(libc::EINVAL, cause));
        }
        Ok(size)
    }

    /// Reads the headroom reserved by default packet constructors.
    pub fn default_headroom(&self) -> Result<usize, Fail> {
        if let Some(headroom) = Self::get_typed_env_option(packet_buffer_config::DEFAULT_HEADROOM)? {
            return Ok(headroom);
        }
        match self.get_packet_buffer_config() {
            Some(section) if !section.index(packet_buffer_config::DEFAULT_HEADROOM).is_badvalue() => {
                Self::get_int_option(section, packet_buffer_config::DEFAULT_HEADROOM)
            },
            _ => Ok(DEFAULT_HEADROOM),
        }
    }

    //======================================================================================================================
    // Static Functions
    //======================================================================================================================

    /// The packet buffer section is optional. When absent, every option takes its default.
    fn get_packet_buffer_config(&self) -> Option<&Yaml> {
        let section: &Yaml = self.0.index(packet_buffer_config::SECTION_NAME);
        match section {
            Yaml::Hash(_) => Some(section),
            _ => None,
        }
    }

    /// Index `yaml` to find the value at `index`, validating that the index exists.
    fn get_option<'a>(yaml: &'a Yaml, index: &str) -> Result<&'a Yaml, Fail> {
        match yaml.index(index) {
            Yaml::BadValue => {
                let message: String = format!("missing configuration option \"{}\"", index);
                Err(Fail::new(libc::EINVAL, message.as_str()))
            },
            value => Ok(value),
        }
    }

    /// Index `yaml` to find the value at `index`, validating that it exists and that the receiver returns Some(_).
    fn get_typed_option<'a, T, Fn>(yaml: &'a Yaml, index: &str, receiver: Fn) -> Result<T, Fail>
    where
        Fn: FnOnce(&'a Yaml) -> Option<T>,
    {
        let option: &'a Yaml = Self::get_option(yaml, index)?;
        match receiver(option) {
            Some(value) => Ok(value),
            None => {
                let message: String = format!("parameter {} has unexpected type", index);
                Err(Fail::new(libc::EINVAL, message.as_str()))
            },
        }
    }

    /// Index `yaml` to find value at `index`, validating it as a string.
    fn get_typed_str_option<T, Fn>(yaml: &Yaml, index: &str, parser: Fn) -> Result<T, Fail>
    where
        Fn: FnOnce(&str) -> Option<T>,
    {
        let option: &Yaml = Self::get_option(yaml, index)?;
        if let Some(value) = option.as_str() {
            if let Some(value) = parser(value) {
                return Ok(value);
            }
        }
        let message: String = format!("parameter {} has unexpected type", index);
        Err(Fail::new(libc::EINVAL, message.as_str()))
    }

    /// Get value where the environment value overrides the config file if it exists.
    fn get_typed_env_option<T: FromStr>(index: &str) -> Result<Option<T>, Fail> {
        // Check for the environment variable.
        if let Ok(var) = ::std::env::var(index.to_uppercase()) {
            if let Ok(value) = var.as_str().parse() {
                return Ok(Some(value));
            } else {
                let message: String = format!("parameter {} has unexpected type", index);
                return Err(Fail::new(libc::EINVAL, message.as_str()));
            }
        }
        Ok(None)
    }

    /// Similar to `get_typed_option` using `Yaml::as_i64` as the receiver, but additionally verifies that the
    /// destination type may hold the i64 value.
    fn get_int_option<T: TryFrom<i64>>(yaml: &Yaml, index: &str) -> Result<T, Fail> {
        let val: i64 = Self::get_typed_option(yaml, index, &Yaml::as_i64)?;
        match T::try_from(val) {
            Ok(val) => Ok(val),
            _ => {
                let message: String = format!("parameter \"{}\" is out of range", index);
                Err(Fail::new(libc::ERANGE, message.as_str()))
            },
        }
    }
}

//======================================================================================================================
// Unit Tests
//======================================================================================================================
