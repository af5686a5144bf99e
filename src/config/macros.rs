//! Configuration macros for zero-repetition config definitions
//!
//! `config_struct!` defines a configuration structure with embedded defaults
//! in a single declaration.

/// Define a configuration struct with embedded defaults
///
/// Each field is declared with its type and default value. The macro
/// generates the struct with public fields, the `Default` implementation and
/// serde support with `#[serde(default)]`, so a TOML file only needs the keys
/// it overrides.
///
/// # Example
/// ```
/// pass_secure_live::config_struct! {
///     pub struct PoolConfig {
///         workers: usize = 5,
///         enabled: bool = true,
///     }
/// }
///
/// let config: PoolConfig = toml::from_str("workers = 8").unwrap();
/// assert_eq!(config.workers, 8);
/// assert!(config.enabled);
/// ```
#[macro_export]
macro_rules! config_struct {
    (
        $(#[$meta:meta])*
        $vis:vis struct $name:ident {
            $(
                $(#[$field_meta:meta])*
                $field_name:ident: $field_type:ty = $default_value:expr
            ),*
            $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
        #[serde(default)]
        $vis struct $name {
            $(
                $(#[$field_meta])*
                pub $field_name: $field_type,
            )*
        }

        impl Default for $name {
            fn default() -> Self {
                Self {
                    $(
                        $field_name: $default_value,
                    )*
                }
            }
        }
    };
}
