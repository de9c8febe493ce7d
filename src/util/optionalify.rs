//! Macro deriving an all-`Option` twin of a configuration struct
// (c) 2024 Ross Younger

#![allow(meta_variable_misuse)] // false positives in these macro definitions

use derive_deftly::define_derive_deftly;
use figment::value::{Dict, Value};

/// Helper function for `figment::Provider` implementation
///
/// If the given `arg` is not None, inserts it into `dict` with key `arg_name`.
pub fn insert_if_some<T>(
    dict: &mut Dict,
    arg_name: &str,
    arg: Option<T>,
) -> Result<(), figment::Error>
where
    T: serde::Serialize,
{
    if let Some(a) = arg {
        let _ = dict.insert(arg_name.to_string(), Value::serialize(a)?);
    }
    Ok(())
}

define_derive_deftly! {
    /// Derives a twin of a configuration struct in which every field is an `Option`.
    ///
    /// The twin is what the command line parses into: anything the user did not enter stays `None`,
    /// so lower-priority sources (configuration files, hard-wired defaults) show through when the
    /// twin is merged into a [`figment`](https://docs.rs/figment/) as a `Provider`.
    ///
    /// The twin:
    /// * is named `{OriginalName}_Optional`
    /// * has the same fields and field attributes, with each type wrapped in [`std::option::Option`]
    /// * carries the same struct attributes, plus `#[derive(Default)]` unless the original is marked
    ///   `#[deftly(already_has_default)]`
    /// * has the original's visibility, unless overridden with `#[deftly(visibility = ...)]`
    ///
    /// <div class="warning">
    /// Attributes to be cloned must appear <i>after</i> the <code>Optionalify</code> derive:
    /// </div>
    ///
    /// ```
    /// use derive_deftly::Deftly;
    /// use mtubench::util::derive_deftly_template_Optionalify;
    /// #[derive(Deftly)]
    /// #[derive_deftly(Optionalify)]
    /// #[derive(Debug, Clone, serde::Serialize)]
    /// struct Settings {
    ///     trials: u16,
    /// }
    /// ```
    ///
    /// Use `#[derive_deftly(Optionalify[dbg])]` to see the expansion at compile time.
    export Optionalify for struct, expect items:
    ${define OPTIONAL_TYPE ${paste $tdeftype _Optional}}

    /// Auto-derived struct variant
    ///
    #[allow(non_camel_case_types)]
    ${tattrs}
    ${if not(tmeta(already_has_default)){
        #[derive(Default)]
    }}
    ${if tmeta(visibility) {
        ${tmeta(visibility) as token_stream}
    } else {
        ${tvis}
    }}
    struct $OPTIONAL_TYPE {
        $(
            ${fattrs}
            ${fvis} $fname: Option<$ftype>,
            // Yes, if $ftype is Option<T>, the derived struct ends up with Option<Option<T>>. That's OK.
        )
    }

    impl figment::Provider for $OPTIONAL_TYPE {
        fn metadata(&self) -> figment::Metadata {
            figment::Metadata::named("command-line").interpolater(|_profile, path| {
                use heck::ToKebabCase;
                let key = path.last().map_or("<unknown>".to_string(), |s| s.to_kebab_case());
                format!("--{key}")
            })
        }

        fn data(&self) -> Result<figment::value::Map<figment::Profile, figment::value::Dict>, figment::Error> {
            use $crate::util::insert_if_some;
            use figment::{Profile, value::{Dict, Map}};
            let mut dict = Dict::new();

            $(
                insert_if_some(&mut dict, stringify!($fname), self.${fname}.clone())?;
            )

            let mut profile_map = Map::new();
            let _ = profile_map.insert(Profile::Global, dict);

            Ok(profile_map)
        }
    }
}

#[allow(clippy::module_name_repetitions)]
pub use derive_deftly_template_Optionalify;
