//! Configuration file wrangling
// (c) 2024 Ross Younger

use super::{Configuration, BASE_CONFIG_FILENAME};

use anyhow::Result;
use figment::{
    providers::{Format, Serialized, Toml},
    value::Value,
    Figment, Metadata, Provider,
};
use serde::Deserialize;
use std::{
    fmt::Display,
    path::{Path, PathBuf},
};
use struct_field_names_as_array::FieldNamesAsSlice;
use tabled::{settings::style::Style, Table, Tabled};

use tracing::{trace, warn};

// PATHS /////////////////////////////////////////////////////////////////////////////////////////////////////

fn user_config_path() -> Result<PathBuf> {
    // ~/.<filename>
    let mut d = dirs::home_dir()
        .ok_or_else(|| anyhow::anyhow!("could not determine home directory"))?;
    d.push(format!(".{BASE_CONFIG_FILENAME}"));
    Ok(d)
}

fn system_config_path() -> PathBuf {
    // /etc/<filename>
    let mut p = PathBuf::from("/etc");
    p.push(BASE_CONFIG_FILENAME);
    p
}

// SYSTEM DEFAULTS //////////////////////////////////////////////////////////////////////////////////////////////

/// A [figment::Provider](https://docs.rs/figment/latest/figment/trait.Provider.html) that holds
/// the hard-wired defaults
#[derive(Default)]
struct SystemDefault {}

impl SystemDefault {
    const META_NAME: &'static str = "default";
}

impl Provider for SystemDefault {
    fn metadata(&self) -> Metadata {
        figment::Metadata::named(Self::META_NAME)
    }

    fn data(
        &self,
    ) -> std::result::Result<
        figment::value::Map<figment::Profile, figment::value::Dict>,
        figment::Error,
    > {
        Serialized::defaults(Configuration::default()).data()
    }
}

// CONFIG MANAGER /////////////////////////////////////////////////////////////////////////////////////////////

/// Processes and merges all possible configuration sources.
///
/// In priority order: command line, user file, system file, defaults.
#[derive(Debug, Default)]
pub struct Manager {
    /// Configuration data
    data: Figment,
}

fn add_file_if_present(f: Figment, path: &Path) -> Figment {
    if !path.exists() {
        trace!("configuration file {path:?} not present");
        return f;
    }
    f.merge(Toml::file(path))
}

impl Manager {
    /// Initialises this structure, reading the system and user configuration files.
    #[must_use]
    pub fn new() -> Self {
        let mut data = Figment::new().merge(SystemDefault::default());
        data = add_file_if_present(data, &system_config_path());
        match user_config_path() {
            Ok(p) => data = add_file_if_present(data, &p),
            Err(e) => warn!("could not determine user configuration file path: {e}"),
        }
        // N.B. This may leave data in a fused-error state, if a file isn't parseable. get() reports it.
        Self { data }
    }

    /// Returns the list of configuration files we would read, whether or not they exist.
    #[must_use]
    pub fn config_files() -> Vec<String> {
        [Ok(system_config_path()), user_config_path()]
            .into_iter()
            .filter_map(std::result::Result::ok)
            .map(|p| p.to_string_lossy().into_owned())
            .collect()
    }

    /// Testing/internal constructor, does not read files from system
    #[must_use]
    pub(crate) fn without_files() -> Self {
        Self {
            data: Figment::new().merge(SystemDefault::default()),
        }
    }

    /// Merges in a data set, which is some sort of [figment::Provider](https://docs.rs/figment/latest/figment/trait.Provider.html).
    ///
    /// The command line arrives here as a `Configuration_Optional`.
    pub fn merge_provider<T>(&mut self, provider: T)
    where
        T: Provider,
    {
        let f = std::mem::take(&mut self.data);
        self.data = f.merge(provider);
    }

    /// Merges in a data set from a TOML file
    pub fn merge_toml_file<T>(&mut self, toml: T)
    where
        T: AsRef<Path>,
    {
        self.merge_provider(Toml::file_exact(toml.as_ref()));
    }

    /// Attempts to extract a particular struct from the data.
    pub fn get<'de, T>(&self) -> Result<T, figment::Error>
    where
        T: Deserialize<'de>,
    {
        self.data.extract::<T>()
    }
}

// PRETTY PRINT SUPPORT ///////////////////////////////////////////////////////////////////////////////////////

#[derive(Tabled)]
struct PrettyConfig {
    field: String,
    value: String,
    source: String,
}

impl PrettyConfig {
    fn render_source(meta: Option<&Metadata>) -> String {
        meta.map_or_else(String::new, |m| {
            m.source
                .as_ref()
                .map_or_else(|| m.name.to_string(), figment::Source::to_string)
        })
    }

    fn render_value(value: &Value) -> String {
        match value {
            Value::String(_tag, s) => s.to_string(),
            Value::Char(_tag, c) => c.to_string(),
            Value::Bool(_tag, b) => b.to_string(),
            Value::Num(_tag, num) => num
                .to_i128()
                .map(|i| i.to_string())
                .or_else(|| num.to_u128().map(|u| u.to_string()))
                .or_else(|| num.to_f64().map(|f| f.to_string()))
                .unwrap_or_else(|| "<number>".into()),
            Value::Empty(_tag, _) => "<empty>".into(),
            Value::Dict(_tag, _) => "<table>".into(),
            Value::Array(_tag, vec) => format!(
                "[{}]",
                vec.iter()
                    .map(PrettyConfig::render_value)
                    .collect::<Vec<_>>()
                    .join(",")
            ),
        }
    }

    fn new(field: &str, value: &Value, meta: Option<&Metadata>) -> Self {
        Self {
            field: field.into(),
            value: PrettyConfig::render_value(value),
            source: PrettyConfig::render_source(meta),
        }
    }
}

impl Display for Manager {
    /// Formats the known fields, their current values and where each came from.
    /// Unrecognised fields in configuration files are listed with a warning.
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let data = match self.data.data() {
            Ok(d) => d,
            Err(e) => return write!(f, "error: {e}"),
        };
        let Some(data) = data.get(&figment::Profile::Default) else {
            return Ok(());
        };

        let mut rows = Vec::<PrettyConfig>::new();
        for field in data.keys() {
            let meta = self.data.find_metadata(field);
            if !Configuration::FIELD_NAMES_AS_SLICE.contains(&field.as_str()) {
                warn!(
                    "unrecognised field `{field}` in {}",
                    PrettyConfig::render_source(meta)
                );
                continue;
            }
            match self.data.find_value(field) {
                Ok(v) => rows.push(PrettyConfig::new(field, &v, meta)),
                Err(e) => writeln!(f, "error on field {field}: {e}")?,
            }
        }
        write!(f, "{}", Table::new(rows).with(Style::sharp()))
    }
}

#[cfg(test)]
mod test {
    use crate::config::{Configuration, Configuration_Optional, Manager};
    use crate::util::make_test_tempfile;
    use assertables::assert_contains;

    #[test]
    fn defaults() {
        let mgr = Manager::without_files();
        let result: Configuration = mgr.get().unwrap();
        assert_eq!(Configuration::default(), result);
    }

    #[test]
    fn cli_overrides_default() {
        let entered = Configuration_Optional {
            trials: Some(5),
            ..Default::default()
        };
        let expected = Configuration {
            trials: 5,
            ..Default::default()
        };

        let mut mgr = Manager::without_files();
        mgr.merge_provider(entered);
        assert_eq!(expected, mgr.get::<Configuration>().unwrap());
    }

    #[test]
    fn cli_overrides_file() {
        let (path, _tempdir) = make_test_tempfile(
            r#"
            step = 250
            trials = 7
            iperf = "/opt/iperf2/bin/iperf"
            "#,
            "test.toml",
        );
        let fake_cli = Configuration_Optional {
            trials: Some(2),
            ..Default::default()
        };
        let mut mgr = Manager::without_files();
        mgr.merge_toml_file(path);
        mgr.merge_provider(fake_cli);
        let result = mgr.get::<Configuration>().unwrap();
        assert_eq!(result.step, 250);
        assert_eq!(result.trials, 2);
        assert_eq!(result.iperf, "/opt/iperf2/bin/iperf");
        assert_eq!(result.min_mtu, 1500);
    }

    #[test]
    fn show_config_lists_sources() {
        let (path, _tempdir) = make_test_tempfile("mtu_ceiling = 7000\nunused__ = 1\n", "test.toml");
        let mut mgr = Manager::without_files();
        mgr.merge_toml_file(&path);
        let shown = mgr.to_string();
        assert_contains!(shown, "mtu_ceiling");
        assert_contains!(shown, "7000");
        assert_contains!(shown, "test.toml");
        assert!(!shown.contains("unused__"));
    }

    #[test]
    fn unparseable_toml() {
        let (path, _tempdir) = make_test_tempfile(
            r"
            a = 1
            trials 3 # this line is a syntax error
            ",
            "test.toml",
        );
        let mut mgr = Manager::without_files();
        mgr.merge_toml_file(path);
        assert!(mgr.get::<Configuration>().is_err());
    }

    #[test]
    fn type_error() {
        let (path, _tempdir) = make_test_tempfile("min_mtu = \"big\"\n", "test.toml");
        let mut mgr = Manager::without_files();
        mgr.merge_toml_file(path);
        let err = mgr.get::<Configuration>().unwrap_err();
        assert_contains!(err.to_string(), "min_mtu");
    }

    #[test]
    fn ssh_options_array() {
        let (path, _tempdir) =
            make_test_tempfile(r#"ssh_options = ["-i", "/dev/null"]"#, "test.toml");
        let mut mgr = Manager::without_files();
        mgr.merge_toml_file(path);
        let result = mgr.get::<Configuration>().unwrap();
        assert_eq!(result.ssh_options, vec!["-i", "/dev/null"]);
    }
}
